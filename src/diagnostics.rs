//! Diagnostics for match expressions.
//!
//! [`MatchError`] is the only failure a parse can produce. Its `Display` output
//! is the user-facing diagnostic string; its [`miette::Diagnostic`] impl adds a
//! code, a help line and a label over the offending span so callers can render
//! a source-annotated report with [`MatchError::to_report`].

use std::fmt;

use miette::{Diagnostic, LabeledSpan, NamedSource, Report};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::syntax::Span;

/// The syntactic category the parser wanted at the point of failure.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Expected {
    FieldName,
    Constant,
    RelationalOperator,
    SmallInteger,
    Integer,
    String,
    CloseParen,
    CloseSquare,
    EndOfInput,
}

impl fmt::Display for Expected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Expected::FieldName => "field name",
            Expected::Constant => "constant",
            Expected::RelationalOperator => "relational operator",
            Expected::SmallInteger => "small integer",
            Expected::Integer => "integer",
            Expected::String => "string",
            Expected::CloseParen => "`)'",
            Expected::CloseSquare => "`]'",
            Expected::EndOfInput => "end of input",
        };
        f.write_str(text)
    }
}

/// What went wrong at a syntax error.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyntaxProblem {
    Expecting(Expected),
    /// `a && b || c` without parentheses.
    MixedConnectives,
}

impl fmt::Display for SyntaxProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyntaxProblem::Expecting(expected) => write!(f, "expecting {expected}."),
            SyntaxProblem::MixedConnectives => {
                f.write_str("&& and || must be parenthesized when used together.")
            }
        }
    }
}

/// The token found where a syntax error was detected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Found {
    /// Source text of the offending token.
    Token(String),
    EndOfInput,
}

impl fmt::Display for Found {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Found::Token(text) => write!(f, "`{text}'"),
            Found::EndOfInput => f.write_str("end of input"),
        }
    }
}

/// Coarse classification of a [`MatchError`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Lexical,
    Syntax,
    Semantic,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Lexical => "lexical",
            ErrorKind::Syntax => "syntax",
            ErrorKind::Semantic => "semantic",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The first problem found in a match expression.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum MatchError {
    /// The parser reached a token the lexer could not make sense of.
    #[error("{message}")]
    Lexical { message: String, span: Span },

    #[error("Syntax error at {found} {problem}")]
    Syntax {
        found: Found,
        problem: SyntaxProblem,
        span: Span,
    },

    /// Well-formed input that does not make sense against the symbol table.
    #[error("{message}")]
    Semantic { message: String, span: Span },
}

impl MatchError {
    pub fn semantic(message: impl Into<String>, span: Span) -> Self {
        MatchError::Semantic {
            message: message.into(),
            span,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            MatchError::Lexical { .. } => ErrorKind::Lexical,
            MatchError::Syntax { .. } => ErrorKind::Syntax,
            MatchError::Semantic { .. } => ErrorKind::Semantic,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            MatchError::Lexical { span, .. }
            | MatchError::Syntax { span, .. }
            | MatchError::Semantic { span, .. } => *span,
        }
    }

    /// The category the parser expected, for "expecting" syntax errors.
    pub fn expected(&self) -> Option<Expected> {
        match self {
            MatchError::Syntax {
                problem: SyntaxProblem::Expecting(expected),
                ..
            } => Some(*expected),
            _ => None,
        }
    }

    /// Wraps the error in a report that renders `source` around the span.
    pub fn to_report(&self, source: &str) -> Report {
        Report::new(self.clone()).with_source_code(NamedSource::new("match", source.to_string()))
    }
}

impl Diagnostic for MatchError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(format!("ovn_match::{}", self.kind())))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let help = match self {
            MatchError::Syntax {
                problem: SyntaxProblem::MixedConnectives,
                ..
            } => "group the operands, e.g. `(a && b) || c'",
            MatchError::Syntax {
                problem: SyntaxProblem::Expecting(Expected::FieldName),
                ..
            } => "field names must be defined in the symbol table",
            _ => return None,
        };
        Some(Box::new(help))
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let span = self.span();
        let text = match self {
            MatchError::Syntax { problem, .. } => match problem {
                SyntaxProblem::Expecting(expected) => format!("expected {expected}"),
                SyntaxProblem::MixedConnectives => "mixed && and ||".to_string(),
            },
            MatchError::Lexical { .. } => "invalid token".to_string(),
            MatchError::Semantic { .. } => "here".to_string(),
        };
        let label = LabeledSpan::new(Some(text), span.start, span.len());
        Some(Box::new(std::iter::once(label)))
    }
}
