//! Parser and validator for OVN logical-flow match expressions such as
//! `outport == "lp1" && ip4 && udp.dst == 53`.
//!
//! ```rust
//! use ovn_match::{parse_match, validate, Validation};
//!
//! assert_eq!(validate("ip4 && udp"), Validation::Valid);
//! assert_eq!(
//!     parse_match("a").as_deref(),
//!     Some("Syntax error at `a' expecting field name.")
//! );
//! ```

pub use crate::diagnostics::{ErrorKind, Expected, Found, MatchError, SyntaxProblem};
pub use crate::expr::{Cmp, CmpValue, Expr, Relop};
pub use crate::symtab::{ConfigError, Level, Symbol, SymbolDef, SymbolTable, SymtabError, OVN_SYMTAB};
pub use crate::syntax::Span;
pub use crate::validate::{parse, parse_match, validate, Validation};

pub mod diagnostics;
pub mod expr;
pub mod symtab;
pub mod syntax;
pub mod validate;
