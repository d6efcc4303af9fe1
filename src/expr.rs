//! Match expression trees.
//!
//! A parsed match expression is a tree of field comparisons joined by `&&` and
//! `||`. Negation is never stored: `!` is pushed down to the comparisons while
//! parsing, so every tree is in negation normal form.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::symtab::{Level, Symbol};

mod parser;

pub use parser::parse;
pub(crate) use parser::parse_field_reference;

/// Relational operator.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Relop {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Relop {
    pub fn as_str(&self) -> &'static str {
        match self {
            Relop::Eq => "==",
            Relop::Ne => "!=",
            Relop::Lt => "<",
            Relop::Le => "<=",
            Relop::Gt => ">",
            Relop::Ge => ">=",
        }
    }

    /// The operator that holds exactly when `self` does not.
    pub fn invert(self) -> Relop {
        match self {
            Relop::Eq => Relop::Ne,
            Relop::Ne => Relop::Eq,
            Relop::Lt => Relop::Ge,
            Relop::Le => Relop::Gt,
            Relop::Gt => Relop::Le,
            Relop::Ge => Relop::Lt,
        }
    }

    /// The operator with its operands swapped: `a < b` iff `b > a`.
    pub fn turn(self) -> Relop {
        match self {
            Relop::Lt => Relop::Gt,
            Relop::Le => Relop::Ge,
            Relop::Gt => Relop::Lt,
            Relop::Ge => Relop::Le,
            Relop::Eq | Relop::Ne => self,
        }
    }

    pub fn is_equality(self) -> bool {
        matches!(self, Relop::Eq | Relop::Ne)
    }
}

impl fmt::Display for Relop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CmpValue {
    String(String),
    /// `value` and `mask` are already shifted to the compared bits of the field.
    Integer { value: u128, mask: u128 },
}

/// A single `field relop constant` comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cmp {
    pub symbol: Arc<Symbol>,
    pub relop: Relop,
    pub value: CmpValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Cmp(Cmp),
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Boolean(bool),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Junction {
    And,
    Or,
}

impl Expr {
    pub fn and(a: Expr, b: Expr) -> Expr {
        Expr::combine(Junction::And, a, b)
    }

    pub fn or(a: Expr, b: Expr) -> Expr {
        Expr::combine(Junction::Or, a, b)
    }

    /// Joins `a` and `b`, flattening operands that already use `junction`.
    pub(crate) fn combine(junction: Junction, a: Expr, b: Expr) -> Expr {
        let mut operands = match (junction, a) {
            (Junction::And, Expr::And(sub)) | (Junction::Or, Expr::Or(sub)) => sub,
            (_, other) => vec![other],
        };
        match (junction, b) {
            (Junction::And, Expr::And(sub)) | (Junction::Or, Expr::Or(sub)) => operands.extend(sub),
            (_, other) => operands.push(other),
        }
        match junction {
            Junction::And => Expr::And(operands),
            Junction::Or => Expr::Or(operands),
        }
    }

    /// Logical negation, pushed down to the leaves.
    pub fn not(self) -> Expr {
        match self {
            Expr::Cmp(mut cmp) => {
                cmp.relop = cmp.relop.invert();
                Expr::Cmp(cmp)
            }
            Expr::And(operands) => Expr::Or(operands.into_iter().map(Expr::not).collect()),
            Expr::Or(operands) => Expr::And(operands.into_iter().map(Expr::not).collect()),
            Expr::Boolean(b) => Expr::Boolean(!b),
        }
    }

    /// The most restrictive level of any field the expression compares.
    ///
    /// Comparisons against nominal fields are nominal; all other comparisons,
    /// and constant Booleans, are Boolean.
    pub fn level(&self) -> Level {
        match self {
            Expr::Cmp(cmp) if cmp.symbol.level == Level::Nominal => Level::Nominal,
            Expr::Cmp(_) | Expr::Boolean(_) => Level::Boolean,
            Expr::And(operands) | Expr::Or(operands) => operands
                .iter()
                .map(Expr::level)
                .fold(Level::Ordinal, Level::min),
        }
    }

    /// Names of all symbols compared, in order of appearance, without duplicates.
    pub fn symbols(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_symbols(&mut names);
        names
    }

    fn collect_symbols<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            Expr::Cmp(cmp) => {
                if !names.contains(&cmp.symbol.name.as_str()) {
                    names.push(&cmp.symbol.name);
                }
            }
            Expr::And(operands) | Expr::Or(operands) => {
                for e in operands {
                    e.collect_symbols(names);
                }
            }
            Expr::Boolean(_) => {}
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Cmp(cmp) => cmp.fmt(f),
            Expr::And(operands) => fmt_junction(operands, "&&", f),
            Expr::Or(operands) => fmt_junction(operands, "||", f),
            Expr::Boolean(b) => f.write_str(if *b { "1" } else { "0" }),
        }
    }
}

fn fmt_junction(operands: &[Expr], op: &str, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, e) in operands.iter().enumerate() {
        if i > 0 {
            write!(f, " {op} ")?;
        }
        match e {
            Expr::And(_) | Expr::Or(_) => write!(f, "({e})")?,
            _ => write!(f, "{e}")?,
        }
    }
    Ok(())
}

impl fmt::Display for Cmp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = &self.symbol.name;
        let (value, mask) = match &self.value {
            CmpValue::String(s) => {
                let quoted = serde_json::to_string(s).map_err(|_| fmt::Error)?;
                return write!(f, "{name} {} {quoted}", self.relop);
            }
            CmpValue::Integer { value, mask } => (*value, *mask),
        };

        if mask == 0 {
            return write!(f, "{name} {} {value:#x}/{mask:#x}", self.relop);
        }

        let width = self.symbol.width;
        let ofs = mask.trailing_zeros().min(width);
        let n_bits = (mask >> ofs).trailing_ones().min(width - ofs);
        let contiguous = mask == ones(n_bits) << ofs;

        if n_bits == 1 && contiguous && self.relop.is_equality() {
            let set = (value >> ofs) & 1 == 1;
            if set == (self.relop == Relop::Ne) {
                f.write_str("!")?;
            }
            f.write_str(name)?;
            if width > 1 {
                write!(f, "[{ofs}]")?;
            }
            return Ok(());
        }

        f.write_str(name)?;
        if !contiguous {
            return write!(f, " {} {value:#x}/{mask:#x}", self.relop);
        }
        if n_bits != width {
            if n_bits == 1 {
                write!(f, "[{ofs}]")?;
            } else {
                write!(f, "[{}..{}]", ofs, ofs + n_bits - 1)?;
            }
        }
        write!(f, " {} {:#x}", self.relop, value >> ofs)
    }
}

/// Low `n` bits set.
pub(crate) fn ones(n: u32) -> u128 {
    if n >= 128 {
        u128::MAX
    } else {
        (1u128 << n) - 1
    }
}
