pub mod agent;
pub mod prompt;
pub mod time;
pub mod tools;

pub use agent::{Assistant, FALLBACK_OUTPUT};
pub use time::{TimeNormalizer, TimeParseError};
