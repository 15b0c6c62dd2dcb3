//! Error types for postgate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PostgateError {
    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Publish error: {0}")]
    Publish(String),

    #[error("Conversation error: {0}")]
    Conversation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PostgateError>;
