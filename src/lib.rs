//! Normalize STIX2 pattern expressions into pattern trees.
//!
//! ```
//! let tree = stixtree::parse_pattern("[file:name = 'test.exe'] WITHIN 10 SECONDS").unwrap();
//! let text = stixtree::encode(&tree).unwrap();
//! assert_eq!(stixtree::decode(&text).unwrap(), tree);
//! ```

pub mod canonical;
pub mod config;
pub mod error;
pub mod literal;
pub mod parser;
pub mod tree;

use slog::{o, Logger};

pub use canonical::{decode_with, encode};
pub use config::{Config, DEFAULT_MAX_DEPTH};
pub use error::{EncodingError, GrammarError, LiteralError, PatternError, StructuralError};
pub use literal::{decode_index, decode_literal, TokenKind};
pub use tree::{
    Comparison, ComparisonExpression, ComparisonJoin, ComparisonNode, IndexStep, Literal,
    Observation, ObservationExpression, ObservationJoin, ObservationNode, PathComponent,
    PatternTree, Qualifier, Stop, TimeUnit,
};

use parser::RawParser;

fn discard() -> Logger {
    Logger::root(slog::Discard, o!())
}

/// Parse STIX2 pattern text into a pattern tree with the default limits
pub fn parse_pattern(text: &str) -> Result<PatternTree, PatternError> {
    parse_pattern_with(&discard(), text, &Config::default())
}

pub fn parse_pattern_with(
    logger: &Logger,
    text: &str,
    config: &Config,
) -> Result<PatternTree, PatternError> {
    let pattern = RawParser::parse_pattern(text, config.max_depth)?;
    parser::build(logger, pattern)
}

/// Decode canonical text with the default limits
pub fn decode(text: &str) -> Result<PatternTree, PatternError> {
    decode_with(&discard(), text, &Config::default())
}
