//! Symbol table for match expressions.
//!
//! Every name usable in a match expression is a [`Symbol`]: a full field, a
//! string field, a subfield of another field, or a predicate that abbreviates
//! a whole expression. Definitions that do not parse are logged and skipped, so
//! a partially broken table still answers lookups for the symbols it has.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use log::{debug, warn};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::diagnostics::MatchError;
use crate::expr::{self, Expr};
use crate::syntax::{tokenize, TokenKind};
use crate::validate::Validation;

mod builtin;

/// The OVN logical-flow symbol table, built on first use.
pub static OVN_SYMTAB: Lazy<SymbolTable> = Lazy::new(SymbolTable::ovn);

/// Widest field a symbol may declare.
pub const MAX_FIELD_WIDTH: u32 = 128;

/// How a field may be compared, ordered from most to least restrictive.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    /// Only exact equality makes sense (e.g. `eth.type`, string fields).
    Nominal,
    /// A single bit, or a predicate over ordinal fields.
    Boolean,
    /// Bitwise-maskable; supports subfields and ordering comparisons.
    Ordinal,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Nominal => "nominal",
            Level::Boolean => "Boolean",
            Level::Ordinal => "ordinal",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    /// Width in bits; 0 for string fields.
    pub width: u32,
    pub level: Level,
    /// Expression that must hold for the field to be meaningful.
    pub prereqs: Option<String>,
    /// Subfield reference or predicate body this symbol stands for.
    pub expansion: Option<String>,
    pub must_crossproduct: bool,
}

impl Symbol {
    pub fn is_string(&self) -> bool {
        self.width == 0
    }

    /// A nominal symbol standing for an expansion. These may only be tested
    /// positively.
    pub fn is_predicate(&self) -> bool {
        self.level == Level::Nominal && self.expansion.is_some()
    }
}

#[derive(Debug, Error)]
pub enum SymtabError {
    #[error("symbol {0} is already defined")]
    Duplicate(String),

    #[error("`{0}' is not a valid symbol name")]
    InvalidName(String),

    #[error("field {name} has invalid width {width}")]
    InvalidWidth { name: String, width: u32 },

    #[error("{text}: error parsing {name} {what} ({source})")]
    Definition {
        name: String,
        what: &'static str,
        text: String,
        #[source]
        source: MatchError,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid symbol table JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid symbol table YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Symbol(#[from] SymtabError),
}

/// Serializable description of one symbol, as accepted by
/// [`SymbolTable::from_json`] and [`SymbolTable::from_yaml`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SymbolDef {
    Field {
        name: String,
        width: u32,
        /// Fully maskable fields are ordinal, others nominal.
        #[serde(default)]
        maskable: bool,
        #[serde(default)]
        prereqs: Option<String>,
        #[serde(default)]
        must_crossproduct: bool,
    },
    String {
        name: String,
        #[serde(default)]
        prereqs: Option<String>,
    },
    Subfield {
        name: String,
        #[serde(default)]
        prereqs: Option<String>,
        /// e.g. `xreg0[32..63]`
        subfield: String,
    },
    Predicate {
        name: String,
        expansion: String,
    },
}

impl SymbolDef {
    pub fn name(&self) -> &str {
        match self {
            SymbolDef::Field { name, .. }
            | SymbolDef::String { name, .. }
            | SymbolDef::Subfield { name, .. }
            | SymbolDef::Predicate { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: BTreeMap<String, Arc<Symbol>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The OVN logical-flow table. Rejected built-ins are logged and left out.
    pub fn ovn() -> Self {
        let mut table = Self::new();
        for def in builtin::definitions() {
            if let Err(err) = table.define(def) {
                debug!("skipping built-in symbol: {err}");
            }
        }
        table
    }

    /// Builds a table from `defs` in order, failing on the first rejected one.
    pub fn from_defs(defs: impl IntoIterator<Item = SymbolDef>) -> Result<Self, SymtabError> {
        let mut table = Self::new();
        for def in defs {
            table.define(def)?;
        }
        Ok(table)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let defs: Vec<SymbolDef> = serde_json::from_str(text)?;
        Ok(Self::from_defs(defs)?)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let defs: Vec<SymbolDef> = serde_yaml::from_str(text)?;
        Ok(Self::from_defs(defs)?)
    }

    pub fn define(&mut self, def: SymbolDef) -> Result<&Symbol, SymtabError> {
        match def {
            SymbolDef::Field {
                name,
                width,
                maskable,
                prereqs,
                must_crossproduct,
            } => self.add_field(&name, width, maskable, prereqs.as_deref(), must_crossproduct),
            SymbolDef::String { name, prereqs } => self.add_string(&name, prereqs.as_deref()),
            SymbolDef::Subfield {
                name,
                prereqs,
                subfield,
            } => self.add_subfield(&name, prereqs.as_deref(), &subfield),
            SymbolDef::Predicate { name, expansion } => self.add_predicate(&name, &expansion),
        }
    }

    pub fn add_field(
        &mut self,
        name: &str,
        width: u32,
        maskable: bool,
        prereqs: Option<&str>,
        must_crossproduct: bool,
    ) -> Result<&Symbol, SymtabError> {
        if width == 0 || width > MAX_FIELD_WIDTH {
            warn!("field {name} has invalid width {width}");
            return Err(SymtabError::InvalidWidth {
                name: name.to_string(),
                width,
            });
        }
        let level = if maskable { Level::Ordinal } else { Level::Nominal };
        self.add_symbol(Symbol {
            name: name.to_string(),
            width,
            level,
            prereqs: prereqs.map(str::to_string),
            expansion: None,
            must_crossproduct,
        })
    }

    pub fn add_string(&mut self, name: &str, prereqs: Option<&str>) -> Result<&Symbol, SymtabError> {
        self.add_symbol(Symbol {
            name: name.to_string(),
            width: 0,
            level: Level::Nominal,
            prereqs: prereqs.map(str::to_string),
            expansion: None,
            must_crossproduct: false,
        })
    }

    /// Defines `name` as bits of an existing field, e.g. `xreg0[32..63]`.
    pub fn add_subfield(
        &mut self,
        name: &str,
        prereqs: Option<&str>,
        subfield: &str,
    ) -> Result<&Symbol, SymtabError> {
        let field = expr::parse_field_reference(self, subfield).map_err(|source| {
            warn!("{subfield}: error parsing {name} subfield ({source})");
            SymtabError::Definition {
                name: name.to_string(),
                what: "subfield",
                text: subfield.to_string(),
                source,
            }
        })?;

        let level = field.symbol.level;
        if level != Level::Ordinal {
            warn!(
                "can't define {name} as subfield of {level} field {}",
                field.symbol.name
            );
        }

        self.add_symbol(Symbol {
            name: name.to_string(),
            width: field.n_bits,
            level,
            prereqs: prereqs.map(str::to_string),
            expansion: Some(subfield.to_string()),
            must_crossproduct: false,
        })
    }

    /// Defines `name` as a 1-bit abbreviation for `expansion`.
    pub fn add_predicate(&mut self, name: &str, expansion: &str) -> Result<&Symbol, SymtabError> {
        let parsed = self.parse(expansion).map_err(|source| {
            warn!("{expansion}: error parsing {name} expansion ({source})");
            SymtabError::Definition {
                name: name.to_string(),
                what: "expansion",
                text: expansion.to_string(),
                source,
            }
        })?;

        self.add_symbol(Symbol {
            name: name.to_string(),
            width: 1,
            level: parsed.level(),
            prereqs: None,
            expansion: Some(expansion.to_string()),
            must_crossproduct: false,
        })
    }

    fn add_symbol(&mut self, symbol: Symbol) -> Result<&Symbol, SymtabError> {
        if !is_identifier(&symbol.name) {
            warn!("`{}' is not a valid symbol name", symbol.name);
            return Err(SymtabError::InvalidName(symbol.name));
        }
        if self.symbols.contains_key(&symbol.name) {
            warn!("symbol {} is already defined", symbol.name);
            return Err(SymtabError::Duplicate(symbol.name));
        }
        let name = symbol.name.clone();
        let entry = self.symbols.entry(name).or_insert_with(|| Arc::new(symbol));
        Ok(&**entry)
    }

    pub fn lookup(&self, name: &str) -> Option<&Arc<Symbol>> {
        self.symbols.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Parses `source` against this table.
    pub fn parse(&self, source: &str) -> Result<Expr, MatchError> {
        expr::parse(self, source)
    }

    pub fn validate(&self, source: &str) -> Validation {
        Validation::from(self.parse(source))
    }
}

/// True if `name` lexes as exactly one identifier.
fn is_identifier(name: &str) -> bool {
    matches!(
        tokenize(name).as_slice(),
        [first, last] if first.kind == TokenKind::Id(name.to_string()) && last.kind == TokenKind::End
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup<'a>(table: &'a SymbolTable, name: &str) -> &'a Symbol {
        table.lookup(name).map(|s| s.as_ref()).unwrap_or_else(|| panic!("missing {name}"))
    }

    #[test]
    fn builtin_levels_and_widths() {
        let table = SymbolTable::ovn();

        let inport = lookup(&table, "inport");
        assert!(inport.is_string());
        assert_eq!(inport.level, Level::Nominal);

        assert_eq!(lookup(&table, "eth.src").level, Level::Ordinal);
        assert_eq!(lookup(&table, "eth.src").width, 48);
        assert_eq!(lookup(&table, "eth.type").level, Level::Nominal);
        assert!(lookup(&table, "eth.type").must_crossproduct);

        let reg0 = lookup(&table, "reg0");
        assert_eq!(reg0.width, 32);
        assert_eq!(reg0.level, Level::Ordinal);
        assert_eq!(reg0.expansion.as_deref(), Some("xreg0[32..63]"));

        assert_eq!(lookup(&table, "vlan.pcp").width, 3);
        assert_eq!(lookup(&table, "vlan.vid").width, 12);
    }

    #[test]
    fn predicate_levels() {
        let table = SymbolTable::ovn();
        for name in ["ip4", "ip6", "ip", "icmp4", "icmp", "arp", "nd", "tcp", "udp", "sctp"] {
            let symbol = lookup(&table, name);
            assert!(symbol.is_predicate(), "{name}");
            assert_eq!(symbol.level, Level::Nominal, "{name}");
        }
        for name in ["vlan.present", "ip.is_frag", "ip.later_frag", "ip.first_frag"] {
            assert_eq!(lookup(&table, name).level, Level::Boolean, "{name}");
            assert!(!lookup(&table, name).is_predicate(), "{name}");
        }
    }

    #[test]
    fn negative_testing_symbols_are_present() {
        let table = SymbolTable::ovn();
        for name in ["bad_prereq", "self_recurse", "mutual_recurse_1", "mutual_recurse_2", "big_string"] {
            assert!(table.contains(name), "{name}");
        }
        assert_eq!(lookup(&table, "bad_prereq").prereqs.as_deref(), Some("xyzzy"));
    }

    #[test]
    fn duplicate_and_invalid_names_rejected() {
        let mut table = SymbolTable::new();
        assert!(table.add_field("f", 8, true, None, false).is_ok());
        assert!(matches!(
            table.add_field("f", 8, true, None, false),
            Err(SymtabError::Duplicate(name)) if name == "f"
        ));
        assert!(matches!(table.add_string("2bad", None), Err(SymtabError::InvalidName(_))));
        assert!(matches!(table.add_string("a b", None), Err(SymtabError::InvalidName(_))));
        assert!(matches!(
            table.add_field("wide", 129, true, None, false),
            Err(SymtabError::InvalidWidth { width: 129, .. })
        ));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn bad_definitions_are_skipped() {
        let mut table = SymbolTable::new();
        table.add_field("f", 8, false, None, false).unwrap();

        let err = table.add_predicate("p", "g == 1").unwrap_err();
        assert_eq!(
            err.to_string(),
            "g == 1: error parsing p expansion (Syntax error at `g' expecting field name.)"
        );
        let err = table.add_subfield("sub", None, "f[0..9]").unwrap_err();
        assert!(matches!(err, SymtabError::Definition { what: "subfield", .. }));
        assert!(!table.contains("p"));
        assert!(!table.contains("sub"));
    }

    #[test]
    fn subfield_of_nominal_field_keeps_level() {
        let mut table = SymbolTable::new();
        table.add_field("f", 8, false, None, false).unwrap();
        let sub = table.add_subfield("whole", None, "f[0..7]").unwrap();
        assert_eq!(sub.level, Level::Nominal);
        assert_eq!(sub.width, 8);
        assert!(sub.is_predicate());
    }

    #[test]
    fn definitions_from_json() {
        let table = SymbolTable::from_json(
            r#"[
                {"kind": "string", "name": "port"},
                {"kind": "field", "name": "reg", "width": 32, "maskable": true},
                {"kind": "subfield", "name": "reg.lo", "subfield": "reg[0..15]"},
                {"kind": "predicate", "name": "lo_set", "expansion": "reg.lo != 0"}
            ]"#,
        )
        .unwrap();
        assert_eq!(table.len(), 4);
        assert_eq!(lookup(&table, "reg.lo").width, 16);
        assert_eq!(lookup(&table, "lo_set").level, Level::Boolean);
        assert!(table.validate(r#"port == "p1" && lo_set"#).is_valid());
    }

    #[test]
    fn definitions_from_yaml() {
        let table = SymbolTable::from_yaml(
            "- kind: field\n  name: proto\n  width: 8\n- kind: predicate\n  name: tcp\n  expansion: proto == 6\n",
        )
        .unwrap();
        assert_eq!(lookup(&table, "proto").level, Level::Nominal);
        assert_eq!(lookup(&table, "tcp").level, Level::Nominal);
    }

    #[test]
    fn config_errors() {
        assert!(matches!(SymbolTable::from_json("{"), Err(ConfigError::Json(_))));
        assert!(matches!(
            SymbolTable::from_yaml("- kind: bogus\n  name: x\n"),
            Err(ConfigError::Yaml(_))
        ));
        assert!(matches!(
            SymbolTable::from_json(r#"[{"kind": "predicate", "name": "p", "expansion": "nope"}]"#),
            Err(ConfigError::Symbol(SymtabError::Definition { .. }))
        ));
    }

    #[test]
    fn symbol_defs_serialize_with_kind_tag() {
        let def = SymbolDef::String {
            name: "inport".into(),
            prereqs: None,
        };
        let json = serde_json::to_value(&def).unwrap();
        assert_eq!(json["kind"], "string");
        assert_eq!(def.name(), "inport");
    }
}
