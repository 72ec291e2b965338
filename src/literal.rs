//! Decoding of raw literal tokens into typed values.
//!
//! The grammar only checks the rough shape of a token (quotes, prefixes,
//! character classes). Everything else, escapes, base64, hex digits, number
//! ranges, timestamp offsets, is checked here.

use base64::prelude::*;
use chrono::{DateTime, Utc};

use crate::error::LiteralError;
use crate::tree::{IndexStep, Literal, Stop};

/// Which grammar rule produced a literal token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    String,
    Number,
    Bool,
    Timestamp,
    Binary,
    Hex,
    Set,
}

pub fn decode_literal(kind: TokenKind, lexeme: &str) -> Result<Literal, LiteralError> {
    match kind {
        TokenKind::String => decode_string(lexeme).map(Literal::String),
        TokenKind::Number => decode_number(lexeme),
        TokenKind::Bool => match lexeme {
            "true" => Ok(Literal::Bool(true)),
            "false" => Ok(Literal::Bool(false)),
            _ => Err(LiteralError::InvalidBoolean {
                lexeme: lexeme.to_string(),
            }),
        },
        TokenKind::Timestamp => decode_timestamp(lexeme).map(Literal::Timestamp),
        TokenKind::Binary => {
            let body = quoted_body(lexeme, "b")?;
            BASE64_STANDARD
                .decode(body)
                .map(Literal::Bytes)
                .map_err(|e| LiteralError::InvalidBinary {
                    lexeme: lexeme.to_string(),
                    reason: e.to_string(),
                })
        }
        TokenKind::Hex => {
            let body = quoted_body(lexeme, "h")?;
            if body.len() % 2 != 0 {
                return Err(LiteralError::OddHexLength {
                    lexeme: lexeme.to_string(),
                });
            }
            hex::decode(body)
                .map(Literal::Bytes)
                .map_err(|e| LiteralError::InvalidHex {
                    lexeme: lexeme.to_string(),
                    reason: e.to_string(),
                })
        }
        TokenKind::Set => Err(LiteralError::UnsupportedSet {
            lexeme: lexeme.to_string(),
        }),
    }
}

/// Decode a `'...'` string literal, resolving `\'` and `\\`
pub fn decode_string(lexeme: &str) -> Result<String, LiteralError> {
    let body = quoted_body(lexeme, "")?;
    let mut out = String::with_capacity(body.len());
    // offsets are reported relative to the whole lexeme, past the open quote
    let mut chars = body.char_indices().map(|(i, c)| (i + 1, c));

    while let Some((offset, c)) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some((_, c @ ('\'' | '\\'))) => out.push(c),
                Some((_, c)) => {
                    return Err(LiteralError::InvalidEscape {
                        lexeme: lexeme.to_string(),
                        char: c,
                        offset,
                    })
                }
                None => {
                    return Err(LiteralError::UnterminatedEscape {
                        lexeme: lexeme.to_string(),
                    })
                }
            },
            '\'' => {
                return Err(LiteralError::UnescapedQuote {
                    lexeme: lexeme.to_string(),
                    offset,
                })
            }
            c => out.push(c),
        }
    }

    Ok(out)
}

/// Decode a `t'...'` timestamp. STIX requires an uppercase `T` separator and
/// a literal `Z` offset.
pub fn decode_timestamp(lexeme: &str) -> Result<DateTime<Utc>, LiteralError> {
    let body = quoted_body(lexeme, "t")?;
    let invalid = |reason: &str| LiteralError::InvalidTimestamp {
        lexeme: lexeme.to_string(),
        reason: reason.to_string(),
    };

    if body.ends_with('z') {
        return Err(invalid("UTC designator must be an uppercase Z"));
    }
    if !body.ends_with('Z') {
        // distinguish a real offset from garbage
        return match DateTime::parse_from_rfc3339(body) {
            Ok(dt) if dt.offset().local_minus_utc() == 0 => {
                Err(invalid("UTC designator must be Z"))
            }
            Ok(_) => Err(LiteralError::NonUtcTimestamp {
                lexeme: lexeme.to_string(),
            }),
            Err(e) => Err(invalid(&e.to_string())),
        };
    }

    if body.as_bytes().get(10) != Some(&b'T') {
        return Err(invalid("date and time must be separated by an uppercase T"));
    }

    parse_utc(lexeme, body)
}

/// RFC3339 parse that only admits a zero UTC offset
pub(crate) fn parse_utc(lexeme: &str, text: &str) -> Result<DateTime<Utc>, LiteralError> {
    let parsed =
        DateTime::parse_from_rfc3339(text).map_err(|e| LiteralError::InvalidTimestamp {
            lexeme: lexeme.to_string(),
            reason: e.to_string(),
        })?;

    if parsed.offset().local_minus_utc() != 0 {
        return Err(LiteralError::NonUtcTimestamp {
            lexeme: lexeme.to_string(),
        });
    }

    Ok(parsed.with_timezone(&Utc))
}

fn decode_number(lexeme: &str) -> Result<Literal, LiteralError> {
    let invalid = |reason: String| LiteralError::InvalidNumber {
        lexeme: lexeme.to_string(),
        reason,
    };
    let text = lexeme.strip_prefix('+').unwrap_or(lexeme);

    if text.contains(['.', 'e', 'E']) {
        // keep f64's own parser from accepting inf and nan spellings
        if !text
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
        {
            return Err(invalid("not a decimal number".to_string()));
        }
        let f: f64 = text.parse().map_err(|e| invalid(format!("{}", e)))?;
        if !f.is_finite() {
            return Err(invalid("out of range for a 64-bit float".to_string()));
        }
        Ok(Literal::Float(f))
    } else {
        text.parse::<i64>()
            .map(Literal::Int)
            .map_err(|e| invalid(e.to_string()))
    }
}

/// Decode a list index, with or without its brackets: `1`, `*`, `1:4`,
/// `1:4:2`. Only the stop position may hold the `*` wildcard.
pub fn decode_index(text: &str) -> Result<IndexStep, LiteralError> {
    let invalid = |reason: &str| LiteralError::InvalidIndex {
        lexeme: text.to_string(),
        reason: reason.to_string(),
    };

    let body = text
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .unwrap_or(text)
        .trim();

    let int = |part: &str| -> Result<Option<i64>, LiteralError> {
        let part = part.trim();
        if part.is_empty() {
            return Ok(None);
        }
        if part == "*" {
            return Err(invalid("wildcard is only allowed as the stop position"));
        }
        part.parse::<i64>()
            .map(Some)
            .map_err(|e| invalid(&e.to_string()))
    };

    let stop = |part: &str| -> Result<Option<Stop>, LiteralError> {
        match part.trim() {
            "*" => Ok(Some(Stop::Wildcard)),
            part => Ok(int(part)?.map(Stop::Index)),
        }
    };

    let parts: Vec<&str> = body.split(':').collect();
    match parts.as_slice() {
        [s] => Ok(IndexStep {
            start: None,
            stop: stop(s)?,
            step: None,
        }),
        [a, s] => Ok(IndexStep {
            start: int(a)?,
            stop: stop(s)?,
            step: None,
        }),
        [a, s, st] => Ok(IndexStep {
            start: int(a)?,
            stop: stop(s)?,
            step: int(st)?,
        }),
        _ => Err(invalid("at most three components are allowed")),
    }
}

/// Strip `prefix'` and the closing `'`
fn quoted_body<'a>(lexeme: &'a str, prefix: &str) -> Result<&'a str, LiteralError> {
    lexeme
        .strip_prefix(prefix)
        .and_then(|l| l.strip_prefix('\''))
        .and_then(|l| l.strip_suffix('\''))
        .ok_or_else(|| LiteralError::Unquoted {
            lexeme: lexeme.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn strings_resolve_escapes() {
        assert_eq!(
            decode_literal(TokenKind::String, r"'it\'s a \\ path'"),
            Ok(Literal::String(r"it's a \ path".to_string()))
        );
        assert_eq!(
            decode_literal(TokenKind::String, "''"),
            Ok(Literal::String(String::new()))
        );
    }

    #[test]
    fn string_escape_errors() {
        assert_eq!(
            decode_string(r"'a\nb'"),
            Err(LiteralError::InvalidEscape {
                lexeme: r"'a\nb'".to_string(),
                char: 'n',
                offset: 2,
            })
        );
        assert!(matches!(
            decode_string(r"'abc\'"),
            Err(LiteralError::UnterminatedEscape { .. })
        ));
        assert!(matches!(
            decode_string("'a'b'"),
            Err(LiteralError::UnescapedQuote { offset: 2, .. })
        ));
        assert!(matches!(
            decode_string("abc"),
            Err(LiteralError::Unquoted { .. })
        ));
    }

    #[test]
    fn timestamps_must_be_utc() {
        assert_eq!(
            decode_literal(TokenKind::Timestamp, "t'2017-06-29T00:00:00Z'"),
            Ok(Literal::Timestamp(
                Utc.with_ymd_and_hms(2017, 6, 29, 0, 0, 0).unwrap()
            ))
        );
        assert!(matches!(
            decode_timestamp("t'2017-06-29T00:00:00.123Z'"),
            Ok(ts) if ts.timestamp_subsec_millis() == 123
        ));
        assert!(matches!(
            decode_timestamp("t'2017-06-29T00:00:00+01:00'"),
            Err(LiteralError::NonUtcTimestamp { .. })
        ));
        assert!(matches!(
            decode_timestamp("t'2017-06-29t00:00:00Z'"),
            Err(LiteralError::InvalidTimestamp { .. })
        ));
        assert!(matches!(
            decode_timestamp("t'2017-06-29T00:00:00z'"),
            Err(LiteralError::InvalidTimestamp { .. })
        ));
        assert!(matches!(
            decode_timestamp("t'2017-06-29T00:00:00+00:00'"),
            Err(LiteralError::InvalidTimestamp { .. })
        ));
        assert!(matches!(
            decode_timestamp("t'2017-13-29T00:00:00Z'"),
            Err(LiteralError::InvalidTimestamp { .. })
        ));
    }

    #[test]
    fn binary_and_hex() {
        assert_eq!(
            decode_literal(TokenKind::Binary, "b'aGVsbG8='"),
            Ok(Literal::Bytes(b"hello".to_vec()))
        );
        assert!(matches!(
            decode_literal(TokenKind::Binary, "b'a$=='"),
            Err(LiteralError::InvalidBinary { .. })
        ));
        assert_eq!(
            decode_literal(TokenKind::Hex, "h'ff00'"),
            Ok(Literal::Bytes(vec![0xff, 0x00]))
        );
        assert!(matches!(
            decode_literal(TokenKind::Hex, "h'fff'"),
            Err(LiteralError::OddHexLength { .. })
        ));
        assert!(matches!(
            decode_literal(TokenKind::Hex, "h'zz'"),
            Err(LiteralError::InvalidHex { .. })
        ));
    }

    #[test]
    fn numbers_and_booleans() {
        assert_eq!(decode_literal(TokenKind::Number, "42"), Ok(Literal::Int(42)));
        assert_eq!(decode_literal(TokenKind::Number, "+7"), Ok(Literal::Int(7)));
        assert_eq!(decode_literal(TokenKind::Number, "-3"), Ok(Literal::Int(-3)));
        assert_eq!(
            decode_literal(TokenKind::Number, "7.0"),
            Ok(Literal::Float(7.0))
        );
        assert_eq!(
            decode_literal(TokenKind::Number, "1e3"),
            Ok(Literal::Float(1000.0))
        );
        assert!(matches!(
            decode_literal(TokenKind::Number, "99999999999999999999"),
            Err(LiteralError::InvalidNumber { .. })
        ));
        assert!(matches!(
            decode_literal(TokenKind::Number, "1e999"),
            Err(LiteralError::InvalidNumber { .. })
        ));
        assert_eq!(
            decode_literal(TokenKind::Bool, "true"),
            Ok(Literal::Bool(true))
        );
        assert!(matches!(
            decode_literal(TokenKind::Bool, "True"),
            Err(LiteralError::InvalidBoolean { .. })
        ));
        assert!(matches!(
            decode_literal(TokenKind::Set, "('a', 'b')"),
            Err(LiteralError::UnsupportedSet { .. })
        ));
    }

    #[test]
    fn index_steps() {
        assert_eq!(
            decode_index("[12]"),
            Ok(IndexStep {
                start: None,
                stop: Some(Stop::Index(12)),
                step: None
            })
        );
        assert_eq!(
            decode_index("*"),
            Ok(IndexStep {
                start: None,
                stop: Some(Stop::Wildcard),
                step: None
            })
        );
        assert_eq!(
            decode_index("1:-1:2"),
            Ok(IndexStep {
                start: Some(1),
                stop: Some(Stop::Index(-1)),
                step: Some(2)
            })
        );
        assert_eq!(
            decode_index(":4"),
            Ok(IndexStep {
                start: None,
                stop: Some(Stop::Index(4)),
                step: None
            })
        );
        assert!(decode_index("*:2").is_err());
        assert!(decode_index("1:2:3:4").is_err());
        assert!(decode_index("x").is_err());
    }
}
