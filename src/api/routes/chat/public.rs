//! Public types for the chat API
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub output: String,
}

impl ChatResponse {
    pub fn new(output: &str) -> Self {
        Self {
            output: output.into(),
        }
    }
}
