//! Match Expression Lexer
//!
//! Scanning is done by the pest grammar in `lexer.pest`; this module turns the
//! scanned pairs into [`Token`]s, interpreting numeric constants, masks and
//! string escapes. Every lexical failure becomes a [`TokenKind::Error`] token,
//! so the token list always ends with exactly one [`TokenKind::End`].

use std::fmt::Write as _;
use std::net::{Ipv4Addr, Ipv6Addr};

use log::{error, trace};
use pest::{iterators::Pair, Parser};
use pest_derive::Parser;

use super::token::{Constant, Format, Token, TokenKind};
use super::Span;

#[derive(Parser)]
#[grammar = "syntax/lexer.pest"]
struct LexGrammar;

/// Longest textual form of an IPv6 address, including the terminator.
const INET6_ADDRSTRLEN: usize = 46;

// ============================================================================
// PUBLIC API
// ============================================================================

/// Splits `source` into tokens. The last token is always [`TokenKind::End`].
pub fn tokenize(source: &str) -> Vec<Token> {
    let mut tokens = match LexGrammar::parse(Rule::input, source) {
        Ok(mut pairs) => pairs
            .next()
            .map(|input| {
                input
                    .into_inner()
                    .filter(|pair| pair.as_rule() != Rule::EOI)
                    .map(lex_token)
                    .collect()
            })
            .unwrap_or_default(),
        Err(err) => {
            // The grammar has a catch-all rule, so this only fires on a grammar bug.
            error!("lexical grammar rejected input {source:?}: {err}");
            vec![Token::new(
                TokenKind::Error("Invalid input.".to_string()),
                Span::new(0, source.len()),
            )]
        }
    };
    tokens.push(Token::new(TokenKind::End, Span::point(source.len())));
    trace!("lexed {} tokens from {source:?}", tokens.len());
    tokens
}

// ============================================================================
// TOKEN BUILDERS
// ============================================================================

fn lex_token(pair: Pair<Rule>) -> Token {
    let span = Span::from(pair.as_span());
    let kind = match pair.as_rule() {
        Rule::id => TokenKind::Id(pair.as_str().to_string()),
        Rule::string => lex_string(pair.as_str()),
        Rule::open_string => lex_error("Input ends inside quoted string."),
        Rule::open_comment => lex_error("`/*' without matching `*/'."),
        Rule::number => lex_number(pair),
        Rule::punct => lex_punct(pair.as_str()),
        Rule::stray => lex_stray(pair.as_str()),
        rule => lex_error(format!("Unexpected lexical rule {rule:?}.")),
    };
    Token::new(kind, span)
}

fn lex_error(message: impl Into<String>) -> TokenKind {
    TokenKind::Error(message.into())
}

fn lex_punct(text: &str) -> TokenKind {
    use TokenKind::*;
    match text {
        "(" => LParen,
        ")" => RParen,
        "{" => LCurly,
        "}" => RCurly,
        "[" => LSquare,
        "]" => RSquare,
        "==" => Eq,
        "!=" => Ne,
        "<" => Lt,
        "<=" => Le,
        ">" => Gt,
        ">=" => Ge,
        "!" => LogNot,
        "&&" => LogAnd,
        "||" => LogOr,
        ".." => Ellipsis,
        "," => Comma,
        ";" => Semicolon,
        "=" => Equals,
        "<->" => Exchange,
        "&" => lex_error("`&' is only valid as part of `&&'."),
        "|" => lex_error("`|' is only valid as part of `||'."),
        "." => lex_error("`.' is only valid as part of `..' or a number."),
        "/" => lex_error("`/' is only valid as part of `//' or `/*'."),
        other => lex_error(format!("Unexpected punctuation `{other}'.")),
    }
}

fn lex_stray(text: &str) -> TokenKind {
    let Some(c) = text.chars().next() else {
        return lex_error("Invalid input.");
    };
    if c.is_ascii_graphic() {
        lex_error(format!("Invalid character `{c}' in input."))
    } else {
        let mut utf8 = [0u8; 4];
        let byte = c.encode_utf8(&mut utf8).as_bytes()[0];
        lex_error(format!("Invalid byte 0x{byte:x} in input."))
    }
}

/// Decodes a quoted string using JSON escape rules.
fn lex_string(quoted: &str) -> TokenKind {
    let body = quoted
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(quoted);

    // JSON forbids raw control characters; re-escape them so they pass through.
    let mut json = String::with_capacity(quoted.len() + 2);
    json.push('"');
    let mut escaped = false;
    for c in body.chars() {
        if c < ' ' {
            if escaped {
                return lex_error("Invalid escape sequence in quoted string.");
            }
            let _ = write!(json, "\\u{:04x}", u32::from(c));
        } else {
            json.push(c);
        }
        escaped = !escaped && c == '\\';
    }
    json.push('"');

    match serde_json::from_str::<String>(&json) {
        Ok(s) => TokenKind::String(s),
        Err(err) => {
            trace!("bad string constant {quoted:?}: {err}");
            lex_error("Invalid escape sequence in quoted string.")
        }
    }
}

fn lex_number(pair: Pair<Rule>) -> TokenKind {
    let mut inner = pair.into_inner();
    let value = inner.next().map(|p| p.as_str()).unwrap_or("");
    let mask = inner.next().map(|p| p.as_str());

    let constant = parse_integer(value).and_then(|constant| match mask {
        Some(mask) => apply_mask(constant, mask),
        None => Ok(constant),
    });
    match constant {
        Ok(constant) => TokenKind::Integer(constant),
        Err(message) => TokenKind::Error(message),
    }
}

// ============================================================================
// NUMERIC CONSTANTS
// ============================================================================

fn parse_integer(word: &str) -> Result<Constant, String> {
    if word.is_empty() {
        return Err("Integer constant expected.".into());
    }
    if let Some(mac) = parse_ethernet(word) {
        return Ok(Constant::new(mac, Format::Ethernet));
    }
    if word.bytes().all(|b| b.is_ascii_digit()) {
        if word.len() > 1 && word.starts_with('0') {
            return Err("Decimal constants must not have leading zeros.".into());
        }
        return word
            .parse::<u64>()
            .map(|n| Constant::new(u128::from(n), Format::Decimal))
            .map_err(|_| "Decimal constants must be less than 2**64.".into());
    }
    if let Some(digits) = word.strip_prefix("0x").or_else(|| word.strip_prefix("0X")) {
        if digits.is_empty() {
            return Err(format!("Hex digits expected following {word}."));
        }
        return parse_hex(digits).map(|n| Constant::new(n, Format::Hexadecimal));
    }
    if word.len() < INET6_ADDRSTRLEN {
        if let Ok(ip) = word.parse::<Ipv4Addr>() {
            return Ok(Constant::new(u128::from(u32::from(ip)), Format::Ipv4));
        }
        if let Ok(ip) = word.parse::<Ipv6Addr>() {
            return Ok(Constant::new(u128::from(ip), Format::Ipv6));
        }
    }
    Err("Invalid numeric constant.".into())
}

/// `xx:xx:xx:xx:xx:xx`, exactly two hex digits per octet.
fn parse_ethernet(word: &str) -> Option<u128> {
    if word.len() != 17 {
        return None;
    }
    let mut mac = 0u128;
    let mut octets = 0;
    for octet in word.split(':') {
        if octet.len() != 2 || !octet.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        mac = (mac << 8) | u128::from(u8::from_str_radix(octet, 16).ok()?);
        octets += 1;
    }
    (octets == 6).then_some(mac)
}

fn parse_hex(digits: &str) -> Result<u128, String> {
    let mut value = 0u128;
    for (i, c) in digits.chars().rev().enumerate() {
        let hexit = c
            .to_digit(16)
            .ok_or_else(|| "Invalid syntax in hexadecimal constant.".to_string())?;
        if hexit == 0 {
            continue;
        }
        if i >= 32 {
            return Err("Hexadecimal constant requires more than 128 bits.".into());
        }
        value |= u128::from(hexit) << (4 * i);
    }
    Ok(value)
}

fn apply_mask(mut constant: Constant, word: &str) -> Result<Constant, String> {
    let mask = parse_integer(word)?;

    let bits = if constant.format == mask.format {
        mask.value
    } else if constant.format == Format::Ipv4 && mask.format == Format::Decimal && mask.value <= 32 {
        prefix_mask(mask.value as u32, 32)
    } else if constant.format == Format::Ipv6 && mask.format == Format::Decimal && mask.value <= 128 {
        prefix_mask(mask.value as u32, 128)
    } else if constant.format == Format::Decimal && mask.format == Format::Hexadecimal && constant.value == 0 {
        constant.format = Format::Hexadecimal;
        mask.value
    } else {
        return Err("Value and mask have incompatible formats.".into());
    };

    if constant.value & !bits != 0 {
        return Err("Value contains unmasked 1-bits.".into());
    }
    constant.mask = Some(bits);
    Ok(constant)
}

/// The `prefix` high-order bits of a `width`-bit value.
fn prefix_mask(prefix: u32, width: u32) -> u128 {
    if prefix == 0 {
        return 0;
    }
    let ones = u128::MAX >> (128 - prefix);
    ones << (width - prefix)
}
