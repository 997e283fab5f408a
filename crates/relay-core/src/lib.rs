//! relay-core: shared pieces of the WhatsApp LLM relay
//!
//! Configuration, the local language-model client, and the per-sender
//! conversation state that feeds the reply generator.

pub mod config;
pub mod conversation;
pub mod error;
pub mod llm;

pub use config::{
    BroadcastConfig, Config, ConversationConfig, LlmConfig, LlmProvider, ServerConfig,
    WhatsAppConfig,
};
pub use conversation::{
    ConversationStore, Reply, ReplyGenerator, ReplySource, FALLBACK_REPLY, STOP_SEQUENCES,
};
pub use error::{Error, Result};
pub use llm::{CompletionModel, CompletionParams, LlmClient};
