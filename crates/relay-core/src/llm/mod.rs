//! Local language-model client
//!
//! Supports the llama.cpp native completion endpoint and OpenAI-compatible
//! text completions.

mod client;
mod types;

pub use client::{CompletionModel, LlmClient};
pub use types::*;
