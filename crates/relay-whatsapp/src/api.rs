//! WhatsApp Cloud API client (outbound messages)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{info, warn};

use relay_core::WhatsAppConfig;

use crate::error::{Result, WhatsAppError};

/// Anything that can deliver the two outbound message shapes
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Send the configured template to `to`
    async fn send_template(&self, to: &str) -> Result<SendReceipt>;

    /// Send free text to `to`
    async fn send_text(&self, to: &str, body: &str) -> Result<SendReceipt>;
}

/// Raw provider response to a successful send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    pub status: u16,
    pub body: String,
}

/// Graph API client bound to one sender phone number
#[derive(Debug, Clone)]
pub struct WhatsAppApi {
    client: Client,
    messages_url: String,
    access_token: String,
    template_name: String,
    template_lang: String,
}

// =============================================================================
// Outbound payloads
// =============================================================================

#[derive(Debug, Serialize)]
struct OutboundMessage<'a> {
    messaging_product: &'static str,
    to: &'a str,
    #[serde(flatten)]
    content: OutboundContent<'a>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum OutboundContent<'a> {
    Template { template: TemplateRef<'a> },
    Text { text: TextBody<'a> },
}

#[derive(Debug, Serialize)]
struct TemplateRef<'a> {
    name: &'a str,
    language: TemplateLanguage<'a>,
}

#[derive(Debug, Serialize)]
struct TemplateLanguage<'a> {
    code: &'a str,
}

#[derive(Debug, Serialize)]
struct TextBody<'a> {
    body: &'a str,
}

impl<'a> OutboundMessage<'a> {
    fn new(to: &'a str, content: OutboundContent<'a>) -> Self {
        Self {
            messaging_product: "whatsapp",
            to,
            content,
        }
    }
}

impl WhatsAppApi {
    /// Create a new client from config
    pub fn new(config: &WhatsAppConfig) -> Result<Self> {
        if config.phone_number_id.trim().is_empty() {
            return Err(WhatsAppError::Config("phone_number_id is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| WhatsAppError::Config(e.to_string()))?;

        let messages_url = format!(
            "{}/{}/{}/messages",
            config.api_base_url.trim_end_matches('/'),
            config.api_version,
            config.phone_number_id
        );

        Ok(Self {
            client,
            messages_url,
            access_token: config.access_token.clone(),
            template_name: config.template_name.clone(),
            template_lang: config.template_lang.clone(),
        })
    }

    pub fn messages_url(&self) -> &str {
        &self.messages_url
    }

    pub fn template_name(&self) -> &str {
        &self.template_name
    }

    /// POST a payload and log the raw response; non-2xx becomes `Delivery`
    async fn post_message(
        &self,
        payload: &OutboundMessage<'_>,
        label: &str,
    ) -> Result<SendReceipt> {
        let response = self
            .client
            .post(&self.messages_url)
            .bearer_auth(&self.access_token)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            warn!("[{} RESPONSE] {}: {}", label, status.as_u16(), body);
            return Err(WhatsAppError::Delivery {
                status: status.as_u16(),
                body,
            });
        }

        info!("[{} RESPONSE] {}: {}", label, status.as_u16(), body);
        Ok(SendReceipt {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl MessageSender for WhatsAppApi {
    async fn send_template(&self, to: &str) -> Result<SendReceipt> {
        info!("[client {}]: Sending {}", to, self.template_name);

        let payload = OutboundMessage::new(
            to,
            OutboundContent::Template {
                template: TemplateRef {
                    name: &self.template_name,
                    language: TemplateLanguage {
                        code: &self.template_lang,
                    },
                },
            },
        );

        self.post_message(&payload, "TEMPLATE").await
    }

    async fn send_text(&self, to: &str, body: &str) -> Result<SendReceipt> {
        info!("[client {}]: {}", to, body);

        let payload = OutboundMessage::new(to, OutboundContent::Text { text: TextBody { body } });

        self.post_message(&payload, "MESSAGE").await
    }
}
