//! Per-sender conversation memory and reply generation

mod reply;
mod store;

pub use reply::{build_prompt, Reply, ReplyGenerator, ReplySource, FALLBACK_REPLY, STOP_SEQUENCES};
pub use store::{ConversationGuard, ConversationStore};
