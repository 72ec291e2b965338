//! Canonical text form of a pattern tree.
//!
//! The form is a small YAML subset: one single-key mapping per node naming
//! its variant, every field present (blank when absent), two-space
//! indentation. `encode` and `decode` are inverses on every tree the
//! encoder accepts.

pub mod decode;
pub mod document;
pub mod encode;
mod scalar;

use slog::{debug, Logger};

use crate::config::Config;
use crate::error::PatternError;
use crate::tree::PatternTree;

pub use decode::decode_document;
pub use document::read_document;
pub use encode::encode;

/// Collection levels the document reader allows per tree level: the
/// variant mapping, its fields, the `expressions` sequence and one more
/// for paths and index steps.
const LEVELS_PER_NODE: usize = 4;

pub fn decode_with(
    logger: &Logger,
    text: &str,
    config: &Config,
) -> Result<PatternTree, PatternError> {
    debug!(logger, "reading canonical document"; "bytes" => text.len());
    let document = read_document(
        text,
        config.max_depth.saturating_mul(LEVELS_PER_NODE),
        config.max_depth,
    )?;
    decode_document(logger, &document)
}
