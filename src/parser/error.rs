use miette::{Diagnostic, SourceSpan};
use pest::error::{ErrorVariant, InputLocation, LineColLocation};
use thiserror::Error;

use super::raw::Rule;

/// Pattern text rejected by the grammar
#[derive(Debug, Clone, PartialEq, Eq, Diagnostic, Error)]
#[error("Syntax error at line {line}, column {col}")]
#[diagnostic(code(stixtree::syntax))]
pub struct GrammarError {
    #[source_code]
    pub src: String,
    #[label("{expected_msg}")]
    pub span: SourceSpan,
    #[help]
    pub help: Option<String>,
    pub expected_msg: String,
    pub line: usize,
    pub col: usize,
}

/// Convert pest Rule enum to user-friendly names
fn rule_to_friendly_name(rule: &Rule) -> &'static str {
    match rule {
        Rule::pattern => "pattern",
        Rule::observation_expressions => "observation expression",
        Rule::followedby => "FOLLOWEDBY",
        Rule::obs_or | Rule::cmp_or => "OR",
        Rule::obs_and | Rule::cmp_and => "AND",
        Rule::observation => "observation ([...])",
        Rule::observation_group => "parenthesized observation expression",
        Rule::start_stop_qualifier => "START/STOP qualifier",
        Rule::within_qualifier => "WITHIN qualifier",
        Rule::repeats_qualifier => "REPEATS qualifier",
        Rule::kw_start => "START",
        Rule::kw_stop => "STOP",
        Rule::kw_within => "WITHIN",
        Rule::kw_seconds => "SECONDS",
        Rule::kw_repeats => "REPEATS",
        Rule::kw_times => "TIMES",
        Rule::comparison_expression => "comparison expression",
        Rule::comparison_group => "parenthesized comparison expression",
        Rule::comparison => "comparison",
        Rule::negation => "NOT",
        Rule::equality_operator => "= or !=",
        Rule::order_operator => "<, <=, > or >=",
        Rule::set_operator => "IN",
        Rule::string_operator => "LIKE, MATCHES, ISSUBSET or ISSUPERSET",
        Rule::object_path => "object path (type:property)",
        Rule::index_path_step => "list index",
        Rule::index_body => "index or *",
        Rule::object_type => "object type",
        Rule::identifier => "property name",
        Rule::set_literal => "set literal",
        Rule::string_literal => "string literal",
        Rule::timestamp_literal => "timestamp literal (t'...')",
        Rule::binary_literal => "binary literal (b'...')",
        Rule::hex_literal => "hex literal (h'...')",
        Rule::float_literal => "float",
        Rule::int_literal => "integer",
        Rule::bool_literal => "boolean",
        Rule::EOI => "end of input",
        _ => "input",
    }
}

/// Generate contextual help text based on error patterns
fn generate_help_text(positives: &[Rule], found_eoi: bool) -> Option<String> {
    if positives.is_empty() {
        return None;
    }

    if positives.contains(&Rule::observation) && found_eoi {
        return Some(
            "Pattern is incomplete. Add an observation such as [file:name = 'a.exe']".to_string(),
        );
    }

    if positives.contains(&Rule::object_path) || positives.contains(&Rule::object_type) {
        return Some("Comparisons start with an object path, like: ipv4-addr:value".to_string());
    }

    if positives.contains(&Rule::equality_operator) || positives.contains(&Rule::order_operator) {
        return Some("Expected a comparison operator followed by a value".to_string());
    }

    if positives.contains(&Rule::int_literal) && positives.len() == 1 {
        return Some("WITHIN and REPEATS take a whole number".to_string());
    }

    if positives.contains(&Rule::EOI) {
        return Some("Unexpected input. Check for unbalanced brackets, parentheses or quotes.".to_string());
    }

    None
}

/// Pest points at a position or a span; miette needs a non-empty span to
/// draw its label, so positions at the end of input step back one char.
fn label_span(location: &InputLocation, len: usize) -> SourceSpan {
    match *location {
        InputLocation::Pos(pos) if pos < len => (pos, 1).into(),
        InputLocation::Pos(pos) if pos > 0 => (pos - 1, 1).into(),
        InputLocation::Pos(_) => (0, 0).into(),
        InputLocation::Span((start, end)) => (start, end.saturating_sub(start).max(1)).into(),
    }
}

fn expected_message(positives: &[Rule]) -> String {
    let mut names: Vec<&str> = positives.iter().map(rule_to_friendly_name).collect();
    names.dedup();
    match names.as_slice() {
        [] => "Unexpected input".to_string(),
        [one] => format!("Expected {}", one),
        few if few.len() <= 3 => format!("Expected one of: {}", few.join(", ")),
        many => format!("Expected one of: {}, ...", many[..3].join(", ")),
    }
}

impl GrammarError {
    pub fn from_pest(pest_err: Box<pest::error::Error<Rule>>, src: String) -> Self {
        let span = label_span(&pest_err.location, src.len());
        let (line, col) = match pest_err.line_col {
            LineColLocation::Pos(at) | LineColLocation::Span(at, _) => at,
        };

        let (expected_msg, help) = match &pest_err.variant {
            ErrorVariant::ParsingError { positives, .. } => {
                let at_end = match pest_err.location {
                    InputLocation::Pos(p) | InputLocation::Span((_, p)) => p >= src.len(),
                };
                (
                    expected_message(positives),
                    generate_help_text(positives, at_end),
                )
            }
            ErrorVariant::CustomError { message } => (message.clone(), None),
        };

        GrammarError {
            src,
            span,
            help,
            expected_msg,
            line,
            col,
        }
    }
}
