//! LLM module for kakeibo
//!
//! Completion providers, the prompt templates, and the JSON request helper
//! that holds every reply to its schema.

mod azure;
mod client;
mod gemini;
pub mod prompts;

pub use azure::AzureOpenAiClient;
pub use client::{build_provider, request_json, CompletionRequest, LlmProvider};
pub use gemini::GeminiClient;
