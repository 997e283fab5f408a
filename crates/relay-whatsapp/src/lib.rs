//! relay-whatsapp: WhatsApp Cloud API side of the relay
//!
//! Outbound template/text sends, the webhook server that receives
//! inbound events, and the dispatcher that turns an inbound message into
//! a model-generated reply.

pub mod api;
pub mod bot;
pub mod error;
pub mod handler;
pub mod queue;
pub mod types;
pub mod webhook;

pub use api::{MessageSender, SendReceipt, WhatsAppApi};
pub use bot::WhatsAppBot;
pub use error::{Result, WhatsAppError};
pub use handler::{DispatchOutcome, MessageHandler};
pub use queue::DispatchQueue;
pub use types::{extract_user_text, InboundMessage, WebhookEvent};
pub use webhook::{WebhookServer, WebhookState};
