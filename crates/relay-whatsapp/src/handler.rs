//! Incoming event dispatcher

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, info};

use relay_core::{Reply, ReplyGenerator};

use crate::api::MessageSender;
use crate::error::{Result, WhatsAppError};
use crate::types::{extract_user_text, WebhookEvent};

/// What a webhook delivery amounted to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A reply was generated and delivered
    Replied { to: String, reply: Reply },
    /// Delivery/read receipts only
    StatusUpdate { count: usize },
    /// Neither messages nor statuses
    NoMessages,
}

/// Turns inbound webhook payloads into replies
pub struct MessageHandler {
    sender: Arc<dyn MessageSender>,
    replies: Arc<ReplyGenerator>,
}

impl MessageHandler {
    pub fn new(sender: Arc<dyn MessageSender>, replies: Arc<ReplyGenerator>) -> Self {
        Self { sender, replies }
    }

    pub fn replies(&self) -> &Arc<ReplyGenerator> {
        &self.replies
    }

    /// Process one webhook payload.
    ///
    /// Messages are checked before statuses, so a delivery carrying both
    /// still gets a reply.
    pub async fn process_incoming(&self, payload: &Value) -> Result<DispatchOutcome> {
        let event = WebhookEvent::deserialize(payload)?;
        let value = event.first_value()?;

        if let Some(messages) = &value.messages {
            let msg = messages
                .first()
                .ok_or_else(|| WhatsAppError::InvalidPayload("empty messages array".to_string()))?;
            let sender = msg
                .from
                .as_deref()
                .filter(|s| !s.is_empty())
                .ok_or_else(|| WhatsAppError::InvalidPayload("message has no sender".to_string()))?;

            let user_text = extract_user_text(msg);
            info!("[customer {}]: {}", sender, user_text);

            let reply = self.replies.generate(sender, &user_text).await;
            self.sender.send_text(sender, &reply.text).await?;

            return Ok(DispatchOutcome::Replied {
                to: sender.to_string(),
                reply,
            });
        }

        if let Some(statuses) = &value.statuses {
            for status in statuses {
                debug!(
                    "[WEBHOOK] status update: {} -> {}",
                    status.recipient_id.as_deref().unwrap_or("?"),
                    status.status.as_deref().unwrap_or("?")
                );
            }
            return Ok(DispatchOutcome::StatusUpdate {
                count: statuses.len(),
            });
        }

        Ok(DispatchOutcome::NoMessages)
    }

    /// Process and log; errors end here
    pub async fn handle(&self, payload: &Value) -> Option<DispatchOutcome> {
        match self.process_incoming(payload).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!("[ERROR] {}", e);
                None
            }
        }
    }
}
