//! Client for OpenAI compatible chat completion APIs with tool calling.

mod chat;
mod core;

pub use self::chat::chat;
pub use self::core::*;
