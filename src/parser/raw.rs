use pest::{iterators::Pair, Parser};
use pest_derive::Parser;

use super::error::GrammarError;
use crate::error::{PatternError, StructuralError};

#[derive(Parser)]
#[grammar = "parser/grammar.pest"]
pub struct RawParser;

impl RawParser {
    /// Run the grammar over pattern text, returning the `pattern` node
    pub fn parse_pattern(input: &str, max_depth: usize) -> Result<Pair<'_, Rule>, PatternError> {
        check_depth(input, max_depth)?;

        let mut pairs = Self::parse(Rule::pattern, input)
            .map_err(|e| GrammarError::from_pest(Box::new(e), input.to_string()))?;

        pairs
            .next()
            .ok_or_else(|| StructuralError::internal("Grammar guarantees pattern exists").into())
    }
}

/// Reject inputs whose bracket/parenthesis nesting exceeds `max_depth`
/// before the grammar (which recurses per nesting level) sees them.
/// Quoted literals are skipped.
pub(crate) fn check_depth(input: &str, max_depth: usize) -> Result<(), StructuralError> {
    let mut depth = 0usize;
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                // skip to the closing quote, honoring backslash escapes
                while let Some(c) = chars.next() {
                    match c {
                        '\\' => {
                            chars.next();
                        }
                        '\'' => break,
                        _ => {}
                    }
                }
            }
            '[' | '(' => {
                depth += 1;
                if depth > max_depth {
                    return Err(StructuralError::NestingTooDeep { limit: max_depth });
                }
            }
            ']' | ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }

    Ok(())
}
