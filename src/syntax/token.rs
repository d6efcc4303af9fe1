use serde::{Deserialize, Serialize};

use super::Span;

/// How an integer constant was written.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Format {
    Decimal,
    Hexadecimal,
    Ipv4,
    Ipv6,
    Ethernet,
}

/// An integer constant, optionally masked (`value/mask`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Constant {
    pub value: u128,
    pub format: Format,
    pub mask: Option<u128>,
}

impl Constant {
    pub fn new(value: u128, format: Format) -> Self {
        Self {
            value,
            format,
            mask: None,
        }
    }

    pub fn is_masked(&self) -> bool {
        self.mask.is_some()
    }

    /// Number of significant bits needed to hold the constant.
    ///
    /// Masked constants are as wide as their mask; addresses are as wide as
    /// their address family regardless of value.
    pub fn width(&self) -> u32 {
        if let Some(mask) = self.mask {
            return bit_width(mask);
        }
        match self.format {
            Format::Decimal | Format::Hexadecimal => bit_width(self.value),
            Format::Ipv4 => 32,
            Format::Ipv6 => 128,
            Format::Ethernet => 48,
        }
    }
}

pub(crate) fn bit_width(value: u128) -> u32 {
    128 - value.leading_zeros()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenKind {
    End,
    Id(String),
    String(String),
    Integer(Constant),
    /// Lexical failure; carries the message shown to the user.
    Error(String),

    LParen,
    RParen,
    LCurly,
    RCurly,
    LSquare,
    RSquare,

    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,

    LogNot,
    LogAnd,
    LogOr,

    Ellipsis,
    Comma,
    Semicolon,
    Equals,
    Exchange,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_width() {
        assert_eq!(Constant::new(0, Format::Decimal).width(), 0);
        assert_eq!(Constant::new(1, Format::Decimal).width(), 1);
        assert_eq!(Constant::new(0x800, Format::Hexadecimal).width(), 12);
        assert_eq!(Constant::new(1, Format::Ipv4).width(), 32);
        assert_eq!(Constant::new(1, Format::Ethernet).width(), 48);
        assert_eq!(Constant::new(u128::MAX, Format::Ipv6).width(), 128);

        let masked = Constant {
            value: 0x10,
            format: Format::Hexadecimal,
            mask: Some(0xff),
        };
        assert_eq!(masked.width(), 8);
    }
}
