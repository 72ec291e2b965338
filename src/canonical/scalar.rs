use std::sync::OnceLock;

use base64::prelude::*;
use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;

use super::document::{Scalar, ScalarStyle};
use crate::error::{EncodingError, LiteralError};
use crate::literal::parse_utc;
use crate::tree::Literal;

const BINARY_TAG: &str = "!!binary";

// characters that cannot start a plain scalar
const INDICATORS: &[char] = &[
    '-', '?', ':', ',', '[', ']', '{', '}', '#', '&', '*', '!', '|', '>', '<', '=', '\'', '"',
    '%', '@', '`',
];

const RESERVED: &[&str] = &[
    "true", "false", "null", "~", "yes", "no", "on", "off", "y", "n",
];

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static pattern is valid"))
}

/// Anything a YAML reader could take for a number
fn number_like() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    regex(
        &CELL,
        r"^[-+]?(0b[01_]+|0o?[0-7_]+|0x[0-9a-fA-F_]+|[0-9][0-9_]*(:[0-5]?[0-9])+(\.[0-9_]*)?|(\.[0-9_]+|[0-9][0-9_]*(\.[0-9_]*)?)([eE][-+]?[0-9]+)?|\.(inf|Inf|INF))$|^\.(nan|NaN|NAN)$",
    )
}

fn date_like() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    regex(&CELL, r"^[0-9]{4}-[0-9]{1,2}-[0-9]{1,2}")
}

fn int_value() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    regex(&CELL, r"^[-+]?[0-9]+$")
}

fn float_value() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    regex(
        &CELL,
        r"^[-+]?(\.[0-9]+|[0-9]+(\.[0-9]*)?)([eE][-+]?[0-9]+)?$|^[-+]?\.(inf|Inf|INF)$|^\.(nan|NaN|NAN)$",
    )
}

fn timestamp_value() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    regex(
        &CELL,
        r"^(?P<date>[0-9]{4}-[0-9]{2}-[0-9]{2})(?:[Tt]|[ \t]+)(?P<time>[0-9]{2}:[0-9]{2}:[0-9]{2}(?:\.[0-9]+)?)[ \t]*(?P<tz>Z|z|[-+][0-9]{2}(?::?[0-9]{2})?)?$",
    )
}

fn needs_quotes(s: &str) -> bool {
    s.is_empty()
        || s.starts_with(char::is_whitespace)
        || s.ends_with(char::is_whitespace)
        || s.starts_with(INDICATORS)
        || s.ends_with(':')
        || s.contains(": ")
        || s.contains(" #")
        || s.contains([',', '[', ']', '{', '}'])
        || RESERVED.iter().any(|r| r.eq_ignore_ascii_case(s))
        || number_like().is_match(s)
        || date_like().is_match(s)
}

/// Render a string so that it reads back as the same string
pub(crate) fn render_str(s: &str) -> String {
    if s.chars().any(char::is_control) {
        double_quoted(s)
    } else if needs_quotes(s) {
        format!("'{}'", s.replace('\'', "''"))
    } else {
        s.to_string()
    }
}

fn double_quoted(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            c if c.is_control() => out.push_str(&format!("\\u{:04X}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

pub(crate) fn render_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

pub(crate) fn render_literal(value: &Literal) -> Result<String, EncodingError> {
    Ok(match value {
        Literal::String(s) => render_str(s),
        Literal::Bool(b) => b.to_string(),
        Literal::Int(i) => i.to_string(),
        Literal::Float(f) if !f.is_finite() => {
            return Err(EncodingError::NonFiniteFloat { value: *f })
        }
        // Debug keeps the `.0`, so the value reads back as a float
        Literal::Float(f) => format!("{:?}", f),
        Literal::Timestamp(ts) => render_timestamp(ts),
        Literal::Bytes(b) if b.is_empty() => format!("{} ''", BINARY_TAG),
        Literal::Bytes(b) => format!("{} {}", BINARY_TAG, BASE64_STANDARD.encode(b)),
    })
}

/// Resolve a `value` scalar: quoted scalars are strings, `!!binary` is
/// bytes, and plain scalars are tried as boolean, integer, float and
/// timestamp before falling back to a string.
pub(crate) fn resolve_literal(scalar: &Scalar) -> Result<Literal, LiteralError> {
    if scalar.tag.as_deref() == Some(BINARY_TAG) {
        let body: String = scalar.text.chars().filter(|c| !c.is_whitespace()).collect();
        return BASE64_STANDARD
            .decode(body)
            .map(Literal::Bytes)
            .map_err(|e| LiteralError::InvalidBinary {
                lexeme: scalar.text.clone(),
                reason: e.to_string(),
            });
    }

    if scalar.style != ScalarStyle::Plain {
        return Ok(Literal::String(scalar.text.clone()));
    }

    let text = scalar.text.as_str();
    let invalid_number = |reason: String| LiteralError::InvalidNumber {
        lexeme: text.to_string(),
        reason,
    };

    match text {
        "true" => return Ok(Literal::Bool(true)),
        "false" => return Ok(Literal::Bool(false)),
        _ => {}
    }

    if int_value().is_match(text) {
        let digits = text.strip_prefix('+').unwrap_or(text);
        return digits
            .parse::<i64>()
            .map(Literal::Int)
            .map_err(|e| invalid_number(e.to_string()));
    }

    if float_value().is_match(text) {
        let f: f64 = text
            .parse()
            .map_err(|e: std::num::ParseFloatError| invalid_number(e.to_string()))?;
        if !f.is_finite() {
            return Err(invalid_number("non-finite floats are not supported".to_string()));
        }
        return Ok(Literal::Float(f));
    }

    if timestamp_value().is_match(text) {
        return resolve_timestamp(scalar).map(Literal::Timestamp);
    }

    Ok(Literal::String(text.to_string()))
}

/// Read a timestamp scalar, tolerating the separators YAML allows. A missing
/// offset means UTC; any non-zero offset is rejected.
pub(crate) fn resolve_timestamp(scalar: &Scalar) -> Result<DateTime<Utc>, LiteralError> {
    let text = scalar.text.as_str();
    let caps = timestamp_value()
        .captures(text)
        .ok_or_else(|| LiteralError::InvalidTimestamp {
            lexeme: text.to_string(),
            reason: "expected an RFC3339 timestamp".to_string(),
        })?;

    let offset = match caps.name("tz").map(|m| m.as_str()) {
        None | Some("Z" | "z") => "Z".to_string(),
        Some(tz) => {
            let (sign, rest) = tz.split_at(1);
            let digits: String = rest.chars().filter(char::is_ascii_digit).collect();
            let (hours, minutes) = digits.split_at(2.min(digits.len()));
            format!(
                "{}{}:{}",
                sign,
                hours,
                if minutes.is_empty() { "00" } else { minutes }
            )
        }
    };

    let normalized = format!("{}T{}{}", &caps["date"], &caps["time"], offset);
    parse_utc(text, &normalized)
}
