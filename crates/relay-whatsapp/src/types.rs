//! Inbound webhook event shapes
//!
//! Every field is optional: the provider adds and omits keys freely, and a
//! missing field must never fail deserialization on its own.

use serde::Deserialize;

use crate::error::{Result, WhatsAppError};

/// Top-level webhook delivery
#[derive(Debug, Deserialize, Default)]
pub struct WebhookEvent {
    pub object: Option<String>,
    #[serde(default)]
    pub entry: Vec<Entry>,
}

#[derive(Debug, Deserialize, Default)]
pub struct Entry {
    pub id: Option<String>,
    #[serde(default)]
    pub changes: Vec<Change>,
}

#[derive(Debug, Deserialize, Default)]
pub struct Change {
    pub field: Option<String>,
    pub value: Option<ChangeValue>,
}

/// The `value` object carrying messages or delivery statuses
#[derive(Debug, Deserialize, Default)]
pub struct ChangeValue {
    pub messaging_product: Option<String>,
    pub messages: Option<Vec<InboundMessage>>,
    pub statuses: Option<Vec<StatusUpdate>>,
}

#[derive(Debug, Deserialize, Default)]
pub struct InboundMessage {
    pub from: Option<String>,
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub text: Option<TextContent>,
    pub interactive: Option<Interactive>,
}

#[derive(Debug, Deserialize, Default)]
pub struct TextContent {
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct Interactive {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub button_reply: Option<ReplyOption>,
    pub list_reply: Option<ReplyOption>,
}

/// A tapped button or chosen list row
#[derive(Debug, Deserialize, Default)]
pub struct ReplyOption {
    pub id: Option<String>,
    pub title: Option<String>,
}

impl ReplyOption {
    /// Title, else id, else empty
    pub fn label(&self) -> String {
        [self.title.as_deref(), self.id.as_deref()]
            .into_iter()
            .flatten()
            .find(|s| !s.is_empty())
            .unwrap_or_default()
            .to_string()
    }
}

/// Delivery/read receipt
#[derive(Debug, Deserialize, Default)]
pub struct StatusUpdate {
    pub id: Option<String>,
    pub status: Option<String>,
    pub recipient_id: Option<String>,
}

impl WebhookEvent {
    /// `entry[0].changes[0].value`
    pub fn first_value(&self) -> Result<&ChangeValue> {
        let entry = self
            .entry
            .first()
            .ok_or_else(|| WhatsAppError::InvalidPayload("no entry".to_string()))?;
        let change = entry
            .changes
            .first()
            .ok_or_else(|| WhatsAppError::InvalidPayload("no changes in entry".to_string()))?;
        change
            .value
            .as_ref()
            .ok_or_else(|| WhatsAppError::InvalidPayload("change has no value".to_string()))
    }
}

/// Display text for an inbound message.
///
/// Plain text yields its body, interactive replies their title (or id).
/// Anything else becomes a `[type]` placeholder.
pub fn extract_user_text(msg: &InboundMessage) -> String {
    let kind = msg.kind.as_deref().filter(|k| !k.is_empty());

    match kind {
        Some("text") => {
            if let Some(text) = &msg.text {
                return text.body.clone();
            }
        }
        Some("interactive") => {
            if let Some(interactive) = &msg.interactive {
                let option = match interactive.kind.as_deref() {
                    Some("button_reply") => Some(interactive.button_reply.as_ref()),
                    Some("list_reply") => Some(interactive.list_reply.as_ref()),
                    _ => None,
                };
                if let Some(option) = option {
                    return option.map(ReplyOption::label).unwrap_or_default();
                }
            }
        }
        _ => {}
    }

    format!("[{}]", kind.unwrap_or("unknown"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(value: serde_json::Value) -> InboundMessage {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_extract_text() {
        let msg = message(json!({
            "from": "15551230001",
            "id": "wamid.A",
            "type": "text",
            "text": {"body": "What are your hours?"}
        }));
        assert_eq!(extract_user_text(&msg), "What are your hours?");
    }

    #[test]
    fn test_extract_button_reply() {
        let msg = message(json!({
            "from": "15551230001",
            "type": "interactive",
            "interactive": {
                "type": "button_reply",
                "button_reply": {"id": "btn_yes", "title": "Yes please"}
            }
        }));
        assert_eq!(extract_user_text(&msg), "Yes please");
    }

    #[test]
    fn test_extract_list_reply_falls_back_to_id() {
        let msg = message(json!({
            "type": "interactive",
            "interactive": {
                "type": "list_reply",
                "list_reply": {"id": "row_2", "title": ""}
            }
        }));
        assert_eq!(extract_user_text(&msg), "row_2");
    }

    #[test]
    fn test_extract_interactive_without_option_is_empty() {
        let msg = message(json!({
            "type": "interactive",
            "interactive": {"type": "button_reply"}
        }));
        assert_eq!(extract_user_text(&msg), "");
    }

    #[test]
    fn test_extract_placeholders() {
        let image = message(json!({"type": "image", "image": {"id": "media.1"}}));
        assert_eq!(extract_user_text(&image), "[image]");

        let untyped = message(json!({"from": "1"}));
        assert_eq!(extract_user_text(&untyped), "[unknown]");

        let text_without_body = message(json!({"type": "text"}));
        assert_eq!(extract_user_text(&text_without_body), "[text]");

        let unknown_interactive = message(json!({
            "type": "interactive",
            "interactive": {"type": "nfm_reply"}
        }));
        assert_eq!(extract_user_text(&unknown_interactive), "[interactive]");
    }

    #[test]
    fn test_first_value() {
        let event: WebhookEvent = serde_json::from_value(json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "id": "WABA_ID",
                "changes": [{
                    "field": "messages",
                    "value": {
                        "messaging_product": "whatsapp",
                        "statuses": [{"id": "wamid.B", "status": "read", "recipient_id": "1555"}]
                    }
                }]
            }]
        }))
        .unwrap();

        let value = event.first_value().unwrap();
        assert!(value.messages.is_none());
        assert_eq!(value.statuses.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn test_first_value_missing_parts() {
        let empty: WebhookEvent = serde_json::from_value(json!({"entry": []})).unwrap();
        assert!(matches!(empty.first_value(), Err(WhatsAppError::InvalidPayload(_))));

        let no_changes: WebhookEvent =
            serde_json::from_value(json!({"entry": [{"id": "x"}]})).unwrap();
        assert!(no_changes.first_value().is_err());

        let no_value: WebhookEvent =
            serde_json::from_value(json!({"entry": [{"changes": [{"field": "messages"}]}]}))
                .unwrap();
        assert!(no_value.first_value().is_err());
    }
}
