/// Nesting limit applied when none is configured
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Limits shared by the pattern parser and the canonical decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Deepest bracket/parenthesis nesting accepted in pattern text, and the
    /// deepest tree accepted by the canonical decoder
    pub max_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl Config {
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self { max_depth }
    }
}
