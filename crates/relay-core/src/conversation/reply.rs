//! Reply generation from per-sender history

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, error};

use crate::config::Config;
use crate::llm::{CompletionModel, CompletionParams};

use super::store::ConversationStore;

/// Sent instead of a model reply when the completion call fails
pub const FALLBACK_REPLY: &str = "Sorry, I hit a small snag generating that. Mind rephrasing?";

/// Keeps the model from writing both sides of the dialogue
pub const STOP_SEQUENCES: [&str; 2] = ["User:", "Assistant:"];

/// Where a reply's text came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplySource {
    Model,
    Fallback,
}

/// Generated reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub source: ReplySource,
}

impl Reply {
    pub fn is_fallback(&self) -> bool {
        self.source == ReplySource::Fallback
    }
}

/// Assemble the completion prompt
pub fn build_prompt(system_prompt: &str, history: &str, user_text: &str) -> String {
    format!(
        "{}\n{}\nUser: {}\nAssistant:",
        system_prompt, history, user_text
    )
}

/// Turns inbound text into a reply using the sender's transcript as context
pub struct ReplyGenerator {
    model: Arc<dyn CompletionModel>,
    store: Arc<ConversationStore>,
    system_prompt: String,
    params: CompletionParams,
    inference_slots: Semaphore,
}

impl ReplyGenerator {
    pub fn new(
        model: Arc<dyn CompletionModel>,
        store: Arc<ConversationStore>,
        system_prompt: impl Into<String>,
        params: CompletionParams,
    ) -> Self {
        Self {
            model,
            store,
            system_prompt: system_prompt.into(),
            params,
            inference_slots: Semaphore::new(Semaphore::MAX_PERMITS),
        }
    }

    /// Cap concurrent completion calls across all senders.
    ///
    /// A slot is taken only once the sender's transcript lock is held, so a
    /// sender queued behind its own earlier message never occupies one.
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.inference_slots = Semaphore::new(max_in_flight.clamp(1, Semaphore::MAX_PERMITS));
        self
    }

    /// Build a generator with a fresh store sized from config
    pub fn from_config(model: Arc<dyn CompletionModel>, config: &Config) -> Self {
        let store = Arc::new(ConversationStore::new(config.conversation.history_cap));
        let params = CompletionParams {
            max_tokens: config.llm.max_tokens,
            temperature: config.llm.temperature,
            stop: Vec::new(),
        }
        .with_stop(STOP_SEQUENCES);

        Self::new(model, store, config.conversation.system_prompt.clone(), params)
            .with_max_in_flight(config.server.max_in_flight)
    }

    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    /// Generate a reply for `sender`. Never fails: a model error yields
    /// [`FALLBACK_REPLY`], which is not written to the transcript.
    pub async fn generate(&self, sender: &str, user_text: &str) -> Reply {
        let mut conversation = self.store.lock(sender).await;
        let prompt = build_prompt(&self.system_prompt, conversation.history(), user_text);
        debug!("Prompt for {} is {} chars", sender, prompt.len());

        // never closed, so acquire cannot fail
        let slot = self.inference_slots.acquire().await.ok();
        let result = self.model.complete(&prompt, &self.params).await;
        drop(slot);

        match result {
            Ok(text) => {
                let text = text.trim().to_string();
                conversation.record(user_text, &text);
                Reply {
                    text,
                    source: ReplySource::Model,
                }
            }
            Err(e) => {
                error!("[LLM ERROR] {}", e);
                Reply {
                    text: FALLBACK_REPLY.to_string(),
                    source: ReplySource::Fallback,
                }
            }
        }
    }
}
