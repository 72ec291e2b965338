pub mod builder;
pub mod error;
pub mod raw;

pub use builder::build;
pub use error::GrammarError;
pub use raw::{RawParser, Rule};
