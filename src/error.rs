use miette::Diagnostic;
use thiserror::Error;

pub use crate::parser::error::GrammarError;

/// A token that could not be decoded into a typed literal
#[derive(Debug, Clone, PartialEq, Eq, Diagnostic, Error)]
pub enum LiteralError {
    #[error("Invalid escape sequence '\\{char}' at offset {offset} in {lexeme}")]
    #[diagnostic(
        code(stixtree::literal::invalid_escape),
        help("String literals only support the escapes \\' and \\\\")
    )]
    InvalidEscape {
        lexeme: String,
        char: char,
        offset: usize,
    },

    #[error("Unterminated escape sequence in {lexeme}")]
    #[diagnostic(code(stixtree::literal::unterminated_escape))]
    UnterminatedEscape { lexeme: String },

    #[error("Unescaped quote at offset {offset} in {lexeme}")]
    #[diagnostic(
        code(stixtree::literal::unescaped_quote),
        help("Write interior quotes as \\'")
    )]
    UnescapedQuote { lexeme: String, offset: usize },

    #[error("Expected a quoted literal, found {lexeme}")]
    #[diagnostic(code(stixtree::literal::unquoted))]
    Unquoted { lexeme: String },

    #[error("Timestamp {lexeme} is not in UTC")]
    #[diagnostic(
        code(stixtree::literal::non_utc_timestamp),
        help("Timestamps must carry a UTC offset of zero, e.g. 2017-06-29T00:00:00Z")
    )]
    NonUtcTimestamp { lexeme: String },

    #[error("Invalid timestamp {lexeme}: {reason}")]
    #[diagnostic(code(stixtree::literal::invalid_timestamp))]
    InvalidTimestamp { lexeme: String, reason: String },

    #[error("Invalid base64 in binary literal {lexeme}: {reason}")]
    #[diagnostic(code(stixtree::literal::invalid_binary))]
    InvalidBinary { lexeme: String, reason: String },

    #[error("Hex literal {lexeme} has an odd number of digits")]
    #[diagnostic(code(stixtree::literal::odd_hex_length))]
    OddHexLength { lexeme: String },

    #[error("Invalid hex literal {lexeme}: {reason}")]
    #[diagnostic(code(stixtree::literal::invalid_hex))]
    InvalidHex { lexeme: String, reason: String },

    #[error("Invalid boolean {lexeme}")]
    #[diagnostic(
        code(stixtree::literal::invalid_boolean),
        help("Booleans are written in lower case: true, false")
    )]
    InvalidBoolean { lexeme: String },

    #[error("Invalid number {lexeme}: {reason}")]
    #[diagnostic(code(stixtree::literal::invalid_number))]
    InvalidNumber { lexeme: String, reason: String },

    #[error("Set literal {lexeme} cannot be represented in a pattern tree")]
    #[diagnostic(code(stixtree::literal::unsupported_set))]
    UnsupportedSet { lexeme: String },

    #[error("Invalid index {lexeme}: {reason}")]
    #[diagnostic(
        code(stixtree::literal::invalid_index),
        help("Indexes are written [stop], [*], [start:stop] or [start:stop:step]")
    )]
    InvalidIndex { lexeme: String, reason: String },
}

/// A node that violates the shape rules of a pattern tree
#[derive(Debug, Clone, PartialEq, Eq, Diagnostic, Error)]
pub enum StructuralError {
    #[error("{node} joined by {join} needs at least 2 expressions, found {found}")]
    #[diagnostic(code(stixtree::structure::join_arity))]
    JoinArity {
        node: &'static str,
        join: &'static str,
        found: usize,
    },

    #[error("{node} has no expressions")]
    #[diagnostic(code(stixtree::structure::empty_expressions))]
    EmptyExpressions { node: &'static str },

    #[error("observation has {found} expressions but no join")]
    #[diagnostic(
        code(stixtree::structure::missing_join),
        help("Set join to AND or OR")
    )]
    MissingJoin { found: usize },

    #[error("observation joined by {join} has a single expression")]
    #[diagnostic(
        code(stixtree::structure::superfluous_join),
        help("Leave join blank for an observation with one expression")
    )]
    SuperfluousJoin { join: &'static str },

    #[error("qualifiers are not allowed on a {node}")]
    #[diagnostic(
        code(stixtree::structure::qualifier_placement),
        help("Qualifiers attach to observations and observation expressions")
    )]
    QualifierOnComparison { node: &'static str },

    #[error("objects {{{}}} do not match the object types of the comparisons {{{}}}", .declared.join(", "), .derived.join(", "))]
    #[diagnostic(
        code(stixtree::structure::objects_mismatch),
        help("objects must list exactly the object types used by the observation's comparisons")
    )]
    ObjectsMismatch {
        declared: Vec<String>,
        derived: Vec<String>,
    },

    #[error("object type '{object}' is listed twice in objects")]
    #[diagnostic(code(stixtree::structure::duplicate_object))]
    DuplicateObject { object: String },

    #[error("unknown {context} '{variant}', expected one of: {expected}")]
    #[diagnostic(code(stixtree::structure::unknown_variant))]
    UnknownVariant {
        context: &'static str,
        variant: String,
        expected: &'static str,
    },

    #[error("{context} must be a mapping with exactly one key naming its kind, found {found} keys")]
    #[diagnostic(code(stixtree::structure::not_single_key))]
    NotSingleKey { context: &'static str, found: usize },

    #[error("unknown field '{field}' in {node}")]
    #[diagnostic(code(stixtree::structure::unknown_field))]
    UnknownField { node: &'static str, field: String },

    #[error("field '{field}' appears twice in {node}")]
    #[diagnostic(code(stixtree::structure::duplicate_field))]
    DuplicateField { node: &'static str, field: String },

    #[error("missing field '{field}' in {node}")]
    #[diagnostic(code(stixtree::structure::missing_field))]
    MissingField {
        node: &'static str,
        field: &'static str,
    },

    #[error("field '{field}' in {node} must be {expected}")]
    #[diagnostic(code(stixtree::structure::unexpected_shape))]
    UnexpectedShape {
        node: &'static str,
        field: &'static str,
        expected: &'static str,
    },

    #[error("unknown join '{join}' in {node}, expected one of: {expected}")]
    #[diagnostic(code(stixtree::structure::unknown_join))]
    UnknownJoin {
        node: &'static str,
        join: String,
        expected: &'static str,
    },

    #[error("unknown time unit '{unit}'")]
    #[diagnostic(
        code(stixtree::structure::unknown_unit),
        help("The only supported unit is SECONDS")
    )]
    UnknownUnit { unit: String },

    #[error("invalid {qualifier} value '{value}': {reason}")]
    #[diagnostic(code(stixtree::structure::invalid_qualifier_value))]
    InvalidQualifierValue {
        qualifier: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("comparison path is empty")]
    #[diagnostic(code(stixtree::structure::empty_path))]
    EmptyPath,

    #[error("nesting depth exceeds the limit of {limit}")]
    #[diagnostic(
        code(stixtree::structure::nesting_too_deep),
        help("Raise the limit with --max-depth if the input is trusted")
    )]
    NestingTooDeep { limit: usize },

    #[error("line {line}: {message}")]
    #[diagnostic(code(stixtree::structure::syntax))]
    Syntax { line: usize, message: String },

    #[error("internal builder error: {message}")]
    #[diagnostic(code(stixtree::structure::internal))]
    Internal { message: String },
}

impl StructuralError {
    pub(crate) fn syntax(line: usize, message: impl Into<String>) -> Self {
        StructuralError::Syntax {
            line,
            message: message.into(),
        }
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        StructuralError::Internal {
            message: message.into(),
        }
    }
}

/// A tree that has no canonical text form
#[derive(Debug, Clone, PartialEq, Diagnostic, Error)]
pub enum EncodingError {
    #[error("float literal {value} has no canonical text form")]
    #[diagnostic(
        code(stixtree::encode::non_finite_float),
        help("Only finite floats can be encoded")
    )]
    NonFiniteFloat { value: f64 },
}

/// Every way parsing a pattern or decoding canonical text can fail
#[derive(Debug, Diagnostic, Error)]
pub enum PatternError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Grammar(#[from] GrammarError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Literal(#[from] LiteralError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Structural(#[from] StructuralError),
}
