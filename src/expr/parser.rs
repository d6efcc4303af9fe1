//! Match Expression Parser
//!
//! Recursive descent over the token list produced by the lexer. Parsing stops
//! at the first problem; that problem is the diagnostic reported to the user.
//!
//! ```text
//! expr     := not ( ('&&' not)+ | ('||' not)+ )?
//! not      := '!' primary | primary
//! primary  := '(' expr ')'
//!           | field [relop constset]
//!           | constset relop field [relop constset]
//!           | '0' | '1'
//! field    := ID [ '[' INT [ '..' INT ] ']' ]
//! constset := constant | '{' constant (','? constant)* '}'
//! ```

use std::sync::Arc;

use log::debug;

use super::{ones, Cmp, CmpValue, Expr, Junction, Relop};
use crate::diagnostics::{Expected, Found, MatchError, SyntaxProblem};
use crate::symtab::{Level, Symbol, SymbolTable};
use crate::syntax::{tokenize, Constant, Format, Span, Token, TokenKind};

type Result<T> = std::result::Result<T, MatchError>;

/// Deepest allowed nesting of parentheses.
pub(crate) const MAX_PAREN_DEPTH: usize = 100;

// ============================================================================
// PUBLIC API
// ============================================================================

/// Parses `source` as a complete match expression over `symtab`.
pub fn parse(symtab: &SymbolTable, source: &str) -> Result<Expr> {
    let mut parser = Parser::new(symtab, source);
    let expr = parser
        .parse_expr()
        .and_then(|expr| parser.expect_end().map(|()| expr));
    if let Err(err) = &expr {
        debug!("rejected match {source:?}: {err}");
    }
    expr
}

/// A reference to all or part of a field.
#[derive(Debug, Clone)]
pub(crate) struct FieldRef {
    pub symbol: Arc<Symbol>,
    pub ofs: u32,
    pub n_bits: u32,
    pub span: Span,
}

/// Parses a lone field reference such as `xreg0[32..63]`.
pub(crate) fn parse_field_reference(symtab: &SymbolTable, source: &str) -> Result<FieldRef> {
    let mut parser = Parser::new(symtab, source);
    let field = parser.parse_field()?;
    parser.expect_end()?;
    Ok(field)
}

// ============================================================================
// PARSER STATE
// ============================================================================

struct Parser<'a> {
    source: &'a str,
    symtab: &'a SymbolTable,
    tokens: Vec<Token>,
    pos: usize,
    /// True inside an odd number of `!` operators.
    not: bool,
    paren_depth: usize,
}

impl<'a> Parser<'a> {
    fn new(symtab: &'a SymbolTable, source: &'a str) -> Self {
        Self {
            source,
            symtab,
            tokens: tokenize(source),
            pos: 0,
            not: false,
            paren_depth: 0,
        }
    }

    fn token(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn kind(&self) -> &TokenKind {
        &self.token().kind
    }

    /// Moves to the next token; stays put at End.
    fn advance(&mut self) {
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.kind() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, expected: Expected) -> Result<()> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.syntax_error(SyntaxProblem::Expecting(expected)))
        }
    }

    fn expect_end(&self) -> Result<()> {
        match self.kind() {
            TokenKind::End => Ok(()),
            _ => Err(self.syntax_error(SyntaxProblem::Expecting(Expected::EndOfInput))),
        }
    }

    /// Span from byte `start` through the end of the last consumed token.
    fn span_from(&self, start: usize) -> Span {
        let end = match self.pos.checked_sub(1) {
            Some(prev) => self.tokens[prev].span.end,
            None => start,
        };
        Span::new(start, end.max(start))
    }

    /// Error at the current token. Lexer errors take precedence, since the
    /// token itself is what is wrong.
    fn syntax_error(&self, problem: SyntaxProblem) -> MatchError {
        let token = self.token();
        match &token.kind {
            TokenKind::Error(message) => MatchError::Lexical {
                message: message.clone(),
                span: token.span,
            },
            TokenKind::End => MatchError::Syntax {
                found: Found::EndOfInput,
                problem,
                span: token.span,
            },
            _ => MatchError::Syntax {
                found: Found::Token(token.span.slice(self.source).to_string()),
                problem,
                span: token.span,
            },
        }
    }

    // ========================================================================
    // EXPRESSIONS
    // ========================================================================

    fn parse_expr(&mut self) -> Result<Expr> {
        let mut expr = self.parse_not()?;

        let (op, junction) = match self.kind() {
            TokenKind::LogAnd => (TokenKind::LogAnd, Junction::And),
            TokenKind::LogOr => (TokenKind::LogOr, Junction::Or),
            _ => return Ok(expr),
        };
        self.advance();
        loop {
            let next = self.parse_not()?;
            expr = Expr::combine(junction, expr, next);
            if !self.eat(&op) {
                break;
            }
        }

        if matches!(self.kind(), TokenKind::LogAnd | TokenKind::LogOr) {
            return Err(self.syntax_error(SyntaxProblem::MixedConnectives));
        }
        Ok(expr)
    }

    fn parse_not(&mut self) -> Result<Expr> {
        let start = self.token().span.start;
        if !self.eat(&TokenKind::LogNot) {
            return self.parse_primary().map(|(expr, _)| expr);
        }

        self.not = !self.not;
        let primary = self.parse_primary();
        self.not = !self.not;

        let (expr, atomic) = primary?;
        if !atomic {
            return Err(MatchError::semantic(
                "Missing parentheses around operand of !.",
                self.span_from(start),
            ));
        }
        Ok(expr.not())
    }

    /// Returns the expression and whether it is atomic, i.e. may follow `!`
    /// without parentheses.
    fn parse_primary(&mut self) -> Result<(Expr, bool)> {
        let start = self.token().span.start;

        if let TokenKind::LParen = self.kind() {
            if self.paren_depth >= MAX_PAREN_DEPTH {
                return Err(MatchError::semantic("Parentheses nested too deeply.", self.token().span));
            }
            self.advance();
            self.paren_depth += 1;
            let expr = self.parse_expr();
            self.paren_depth -= 1;
            let expr = expr?;
            self.expect(&TokenKind::RParen, Expected::CloseParen)?;
            return Ok((expr, true));
        }

        if let TokenKind::Id(_) = self.kind() {
            let field = self.parse_field()?;
            let Some(relop) = self.relop() else {
                // A bare field means `field != 0`.
                if field.n_bits > 1 && !self.not {
                    return Err(MatchError::semantic(
                        "Explicit `!= 0' is required for inequality test of multibit field against 0.",
                        field.span,
                    ));
                }
                let zero = ConstantSet::implicit_zero(field.span);
                return Ok((self.make_cmp(&field, Relop::Ne, zero)?, true));
            };
            self.advance();
            let set = self.parse_constant_set()?;
            return Ok((self.make_cmp(&field, relop, set)?, false));
        }

        let first = self.parse_constant_set()?;
        if self.relop().is_none() {
            if let Some(b) = first.as_boolean() {
                return Ok((Expr::Boolean(b), true));
            }
        }

        let r1 = self.parse_relop()?;
        let field = self.parse_field()?;
        let Some(r2) = self.relop() else {
            return Ok((self.make_cmp(&field, r1.turn(), first)?, false));
        };
        self.advance();
        let second = self.parse_constant_set()?;

        let ascending = matches!(r1, Relop::Lt | Relop::Le) && matches!(r2, Relop::Lt | Relop::Le);
        let descending = matches!(r1, Relop::Gt | Relop::Ge) && matches!(r2, Relop::Gt | Relop::Ge);
        if !ascending && !descending {
            return Err(MatchError::semantic(
                "Range expressions must have the form `x < field < y' or `x > field > y', \
                 with each `<' optionally replaced by `<=' or `>' by `>=').",
                self.span_from(start),
            ));
        }

        let low = self.make_cmp(&field, r1.turn(), first)?;
        let high = self.make_cmp(&field, r2, second)?;
        Ok((Expr::and(low, high), false))
    }

    // ========================================================================
    // FIELDS, OPERATORS, CONSTANTS
    // ========================================================================

    fn parse_field(&mut self) -> Result<FieldRef> {
        let symbol = match self.kind() {
            TokenKind::Id(name) => self.symtab.lookup(name).cloned(),
            _ => None,
        };
        let Some(symbol) = symbol else {
            return Err(self.syntax_error(SyntaxProblem::Expecting(Expected::FieldName)));
        };
        let start = self.token().span.start;
        self.advance();

        if !self.eat(&TokenKind::LSquare) {
            return Ok(FieldRef {
                ofs: 0,
                n_bits: symbol.width,
                span: self.span_from(start),
                symbol,
            });
        }

        if symbol.is_string() {
            return Err(MatchError::semantic(
                format!("Cannot select subfield of string field {}.", symbol.name),
                self.span_from(start),
            ));
        }

        let low = self.parse_small_int()?;
        let high = if self.eat(&TokenKind::Ellipsis) {
            self.parse_small_int()?
        } else {
            low
        };
        self.expect(&TokenKind::RSquare, Expected::CloseSquare)?;
        let span = self.span_from(start);

        if low > high {
            return Err(MatchError::semantic(
                format!("Invalid bit range {low} to {high}."),
                span,
            ));
        }
        if high >= symbol.width {
            return Err(MatchError::semantic(
                format!(
                    "Cannot select bits {low} to {high} of {}-bit field {}.",
                    symbol.width, symbol.name
                ),
                span,
            ));
        }
        if symbol.level == Level::Nominal && (low != 0 || high != symbol.width - 1) {
            return Err(MatchError::semantic(
                format!("Cannot select subfield of nominal field {}.", symbol.name),
                span,
            ));
        }

        Ok(FieldRef {
            symbol,
            ofs: low,
            n_bits: high - low + 1,
            span,
        })
    }

    /// A plain decimal that fits in an `i32`, as used for bit indexes.
    fn parse_small_int(&mut self) -> Result<u32> {
        let value = match self.kind() {
            TokenKind::Integer(Constant {
                value,
                format: Format::Decimal,
                mask: None,
            }) => u32::try_from(*value).ok().filter(|v| *v <= i32::MAX as u32),
            _ => None,
        };
        match value {
            Some(value) => {
                self.advance();
                Ok(value)
            }
            None => Err(self.syntax_error(SyntaxProblem::Expecting(Expected::SmallInteger))),
        }
    }

    fn relop(&self) -> Option<Relop> {
        let relop = match self.kind() {
            TokenKind::Eq => Relop::Eq,
            TokenKind::Ne => Relop::Ne,
            TokenKind::Lt => Relop::Lt,
            TokenKind::Le => Relop::Le,
            TokenKind::Gt => Relop::Gt,
            TokenKind::Ge => Relop::Ge,
            _ => return None,
        };
        Some(relop)
    }

    fn parse_relop(&mut self) -> Result<Relop> {
        match self.relop() {
            Some(relop) => {
                self.advance();
                Ok(relop)
            }
            None => Err(self.syntax_error(SyntaxProblem::Expecting(Expected::RelationalOperator))),
        }
    }

    fn parse_constant_set(&mut self) -> Result<ConstantSet> {
        let start = self.token().span.start;
        let in_curlies = self.eat(&TokenKind::LCurly);
        let first = self.parse_constant(None)?;
        let mut rest = Vec::new();

        if in_curlies {
            loop {
                self.eat(&TokenKind::Comma);
                if self.eat(&TokenKind::RCurly) {
                    break;
                }
                rest.push(self.parse_constant(Some(&first))?);
            }
        }

        Ok(ConstantSet {
            first,
            rest,
            in_curlies,
            span: self.span_from(start),
        })
    }

    /// Parses one constant, which must have the same type as `first` if given.
    fn parse_constant(&mut self, first: Option<&SetValue>) -> Result<SetValue> {
        let value = match self.kind() {
            TokenKind::String(s) => SetValue::String(s.clone()),
            TokenKind::Integer(c) => SetValue::Integer(*c),
            _ => return Err(self.syntax_error(SyntaxProblem::Expecting(Expected::Constant))),
        };

        match first {
            Some(SetValue::Integer(_)) if !matches!(value, SetValue::Integer(_)) => {
                return Err(self.syntax_error(SyntaxProblem::Expecting(Expected::Integer)));
            }
            Some(SetValue::String(_)) if !matches!(value, SetValue::String(_)) => {
                return Err(self.syntax_error(SyntaxProblem::Expecting(Expected::String)));
            }
            _ => {}
        }

        self.advance();
        Ok(value)
    }

    // ========================================================================
    // COMPARISONS
    // ========================================================================

    fn make_cmp(&self, field: &FieldRef, relop: Relop, set: ConstantSet) -> Result<Expr> {
        let symbol = &field.symbol;
        self.type_check(field, &set)?;

        if !relop.is_equality() {
            if set.in_curlies {
                return Err(MatchError::semantic(
                    "Only == and != operators may be used with value sets.",
                    set.span,
                ));
            }
            if matches!(symbol.level, Level::Nominal | Level::Boolean) {
                return Err(MatchError::semantic(
                    format!(
                        "Only == and != operators may be used with {} field {}.",
                        symbol.level, symbol.name
                    ),
                    field.span.join(set.span),
                ));
            }
            if set.has_masked_value() {
                return Err(MatchError::semantic(
                    "Only == and != operators may be used with masked constants.  Consider using \
                     subfields instead (e.g. eth.src[0..15] > 0x1111 in place of \
                     eth.src > 00:00:00:00:11:11/00:00:00:00:ff:ff).",
                    set.span,
                ));
            }
        }

        if symbol.level == Level::Nominal {
            if symbol.is_predicate() {
                for value in set.iter() {
                    let SetValue::Integer(c) = value else { continue };
                    let positive = (c.value & 1 == 1) ^ (relop == Relop::Ne) ^ self.not;
                    if !positive {
                        let name = &symbol.name;
                        return Err(MatchError::semantic(
                            format!(
                                "Nominal predicate {name} may only be tested positively, \
                                 e.g. `{name}' or `{name} == 1' but not `!{name}' or `{name} == 0'."
                            ),
                            field.span.join(set.span),
                        ));
                    }
                }
            } else {
                let required = if self.not { Relop::Ne } else { Relop::Eq };
                if relop != required {
                    return Err(MatchError::semantic(
                        format!(
                            "Nominal field {} may only be tested for equality \
                             (taking enclosing `!' operators into account).",
                            symbol.name
                        ),
                        field.span.join(set.span),
                    ));
                }
            }
        }

        // `f == {a, b}` means `f == a || f == b`; `f != {a, b}` means both differ.
        let junction = if relop == Relop::Eq { Junction::Or } else { Junction::And };
        let first = Expr::Cmp(cmp_value(field, relop, set.first));
        Ok(set.rest.into_iter().fold(first, |acc, value| {
            Expr::combine(junction, acc, Expr::Cmp(cmp_value(field, relop, value)))
        }))
    }

    fn type_check(&self, field: &FieldRef, set: &ConstantSet) -> Result<()> {
        let symbol = &field.symbol;
        let string_set = matches!(set.first, SetValue::String(_));
        if string_set != symbol.is_string() {
            return Err(MatchError::semantic(
                format!(
                    "{} field {} is not compatible with {} constant.",
                    if symbol.is_string() { "String" } else { "Integer" },
                    symbol.name,
                    if string_set { "string" } else { "integer" },
                ),
                field.span.join(set.span),
            ));
        }

        for value in set.iter() {
            let SetValue::Integer(c) = value else { continue };
            let width = c.width();
            if width > field.n_bits {
                return Err(MatchError::semantic(
                    format!(
                        "{width}-bit constant is not compatible with {}-bit field {}.",
                        field.n_bits, symbol.name
                    ),
                    set.span,
                ));
            }
        }
        Ok(())
    }
}

fn cmp_value(field: &FieldRef, relop: Relop, value: SetValue) -> Cmp {
    let value = match value {
        SetValue::String(s) => CmpValue::String(s),
        SetValue::Integer(c) => CmpValue::Integer {
            value: (c.value & ones(field.n_bits)) << field.ofs,
            mask: (c.mask.unwrap_or(u128::MAX) & ones(field.n_bits)) << field.ofs,
        },
    };
    Cmp {
        symbol: Arc::clone(&field.symbol),
        relop,
        value,
    }
}

// ============================================================================
// CONSTANT SETS
// ============================================================================

#[derive(Debug, Clone)]
enum SetValue {
    Integer(Constant),
    String(String),
}

/// One constant, or a `{...}` list of constants of the same type. Never empty.
#[derive(Debug, Clone)]
struct ConstantSet {
    first: SetValue,
    rest: Vec<SetValue>,
    in_curlies: bool,
    span: Span,
}

impl ConstantSet {
    /// The `0` in the `!= 0` implied by a bare field name.
    fn implicit_zero(span: Span) -> Self {
        Self {
            first: SetValue::Integer(Constant::new(0, Format::Hexadecimal)),
            rest: Vec::new(),
            in_curlies: false,
            span,
        }
    }

    fn iter(&self) -> impl Iterator<Item = &SetValue> {
        std::iter::once(&self.first).chain(&self.rest)
    }

    /// A lone, unmasked decimal `0` or `1` is a Boolean literal.
    fn as_boolean(&self) -> Option<bool> {
        if self.in_curlies || !self.rest.is_empty() {
            return None;
        }
        match self.first {
            SetValue::Integer(Constant {
                value,
                format: Format::Decimal,
                mask: None,
            }) if value <= 1 => Some(value == 1),
            _ => None,
        }
    }

    fn has_masked_value(&self) -> bool {
        self.iter()
            .any(|v| matches!(v, SetValue::Integer(c) if c.is_masked()))
    }
}
