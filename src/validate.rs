//! Validation entry points.
//!
//! [`validate`] and [`parse_match`] check a string against the built-in OVN
//! symbol table; use [`SymbolTable::validate`](crate::SymbolTable::validate)
//! for a custom table.

use serde::{Deserialize, Serialize};

use crate::diagnostics::MatchError;
use crate::expr::Expr;
use crate::symtab::OVN_SYMTAB;

/// Outcome of validating one match expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum Validation {
    Valid,
    /// Diagnostic for the first problem found.
    Invalid(String),
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid)
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Validation::Valid => None,
            Validation::Invalid(message) => Some(message),
        }
    }

    /// `None` when valid, otherwise the diagnostic.
    pub fn into_error(self) -> Option<String> {
        match self {
            Validation::Valid => None,
            Validation::Invalid(message) => Some(message),
        }
    }
}

impl From<Result<Expr, MatchError>> for Validation {
    fn from(result: Result<Expr, MatchError>) -> Self {
        match result {
            Ok(_) => Validation::Valid,
            Err(err) => Validation::Invalid(err.to_string()),
        }
    }
}

/// Parses `source` against the built-in OVN symbol table.
pub fn parse(source: &str) -> Result<Expr, MatchError> {
    OVN_SYMTAB.parse(source)
}

pub fn validate(source: &str) -> Validation {
    OVN_SYMTAB.validate(source)
}

/// Returns `None` if `source` is a valid match expression, otherwise the
/// diagnostic for its first problem.
pub fn parse_match(source: &str) -> Option<String> {
    validate(source).into_error()
}
