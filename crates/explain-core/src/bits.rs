//! Flag-set and enumeration printers and parsers.
//!
//! A table maps symbolic names to values. Printing renders a value as
//! `NAME | NAME | 0x40` with any unnamed residue in hex; parsing accepts
//! the same shape, plus `+` as an alternative to `|` and C-style numeric
//! literals (`0x1f`, `017`, `42`).

use std::fmt::Write;

use crate::buffer::StringBuffer;
use crate::error::{ExplainError, Result};
use crate::fuzzy::{self, FUZZY_THRESHOLD};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitName {
    pub name: &'static str,
    pub value: i64,
}

impl BitName {
    pub const fn new(name: &'static str, value: i64) -> Self {
        Self { name, value }
    }
}

/// Print `value` as the `|`-joined names of the set bits it covers.
///
/// Entries are tried in table order and each consumes its bits, so a
/// multi-bit name listed before its parts wins. Zero prints the table's
/// zero-valued name if it has one, else `0`.
pub fn print_bits(sb: &mut StringBuffer, value: i64, table: &[BitName]) {
    if value == 0 {
        match table.iter().find(|b| b.value == 0) {
            Some(b) => sb.push_str(b.name),
            None => sb.push_char('0'),
        }
        return;
    }
    let mut rest = value;
    let mut first = true;
    for b in table {
        if b.value != 0 && rest & b.value == b.value {
            if !first {
                sb.push_str(" | ");
            }
            sb.push_str(b.name);
            first = false;
            rest &= !b.value;
        }
    }
    if rest != 0 {
        if !first {
            sb.push_str(" | ");
        }
        let _ = write!(sb, "{:#x}", rest);
    }
}

/// Print the name whose value equals `value`, else the number.
pub fn print_enum(sb: &mut StringBuffer, value: i64, table: &[BitName]) {
    match table.iter().find(|b| b.value == value) {
        Some(b) => sb.push_str(b.name),
        None => {
            let _ = write!(sb, "{}", value);
        }
    }
}

/// Parse a C-style integer literal.
pub fn parse_number(text: &str) -> Option<i64> {
    let t = text.trim();
    let (neg, t) = match t.strip_prefix('-') {
        Some(r) => (true, r),
        None => (false, t),
    };
    let v = if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()?
    } else if t.len() > 1 && t.starts_with('0') {
        i64::from_str_radix(&t[1..], 8).ok()?
    } else {
        t.parse::<i64>().ok()?
    };
    Some(if neg { -v } else { v })
}

/// Evaluate `text` against `table`.
///
/// `caption` names the thing being parsed in the error, e.g. "open flags".
pub fn parse(text: &str, table: &[BitName], caption: &str) -> Result<i64> {
    let mut result = 0i64;
    for token in text.split(|c: char| c == '|' || c == '+').map(str::trim) {
        if token.is_empty() {
            return Err(ExplainError::ParseBits {
                caption: caption.to_string(),
                token: text.to_string(),
                suggestion: None,
            });
        }
        let v = match table.iter().find(|b| b.name == token) {
            Some(b) => b.value,
            None => match parse_number(token) {
                Some(v) => v,
                None => {
                    let guess = fuzzy::best_match(token, table.iter(), |b| b.name, FUZZY_THRESHOLD);
                    return Err(ExplainError::ParseBits {
                        caption: caption.to_string(),
                        token: token.to_string(),
                        suggestion: guess.map(|g| g.name),
                    });
                }
            },
        };
        result |= v;
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &[BitName] = &[
        BitName::new("NONE", 0),
        BitName::new("BOTH", 0x3),
        BitName::new("A", 0x1),
        BitName::new("B", 0x2),
        BitName::new("C", 0x4),
    ];

    fn render(v: i64) -> String {
        let mut sb = StringBuffer::new(128);
        print_bits(&mut sb, v, TABLE);
        sb.into_string()
    }

    #[test]
    fn test_print_bits() {
        assert_eq!(render(0), "NONE");
        assert_eq!(render(0x1), "A");
        assert_eq!(render(0x3), "BOTH");
        assert_eq!(render(0x5), "A | C");
        assert_eq!(render(0x44), "C | 0x40");
    }

    #[test]
    fn test_print_enum() {
        let mut sb = StringBuffer::new(64);
        print_enum(&mut sb, 4, TABLE);
        sb.push_char(' ');
        print_enum(&mut sb, 9, TABLE);
        assert_eq!(sb.as_str(), "C 9");
    }

    #[test]
    fn test_parse_numbers() {
        assert_eq!(parse_number("0x1f"), Some(31));
        assert_eq!(parse_number("017"), Some(15));
        assert_eq!(parse_number("0"), Some(0));
        assert_eq!(parse_number("-3"), Some(-3));
        assert_eq!(parse_number("08"), None);
    }

    #[test]
    fn test_parse_expression() {
        assert_eq!(parse("A | C", TABLE, "test").ok(), Some(5));
        assert_eq!(parse("B+0x40", TABLE, "test").ok(), Some(0x42));
        assert_eq!(parse("NONE", TABLE, "test").ok(), Some(0));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse("", TABLE, "test").is_err());
        assert!(parse("A |", TABLE, "test").is_err());
        let err = parse("BOTTH", TABLE, "test flags").unwrap_err();
        assert_eq!(
            err.to_string(),
            "unable to interpret test flags \"BOTTH\" (did you mean \"BOTH\"?)"
        );
    }
}
