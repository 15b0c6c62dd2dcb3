//! Text oracle clients for postgate.
//!
//! Every provider implements [`LlmClient`]; [`build_llm_client`] wraps the
//! chosen one in retry and concurrency limits.

pub mod anthropic;
pub mod client;
pub mod config;
pub mod gemini;
pub mod openai;
pub mod retry;

pub use anthropic::AnthropicClient;
pub use client::{ChatMessage, LlmClient, LlmRequest, LlmResponse, Role, TokenUsage};
pub use config::{build_llm_client, LlmConfig, LlmProvider, SemaphoredClient};
pub use gemini::GeminiClient;
pub use openai::OpenAiClient;
pub use retry::{RetryConfig, RetryingClient};
