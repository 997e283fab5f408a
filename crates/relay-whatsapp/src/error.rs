//! Error types for relay-whatsapp

use thiserror::Error;

/// relay-whatsapp error type
#[derive(Error, Debug)]
pub enum WhatsAppError {
    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),

    #[error("Delivery failed: {status} - {body}")]
    Delivery { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Webhook signature verification failed")]
    SignatureVerificationFailed,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Server error: {0}")]
    Server(String),
}

impl From<reqwest::Error> for WhatsAppError {
    fn from(err: reqwest::Error) -> Self {
        WhatsAppError::Http(err.to_string())
    }
}

impl From<serde_json::Error> for WhatsAppError {
    fn from(err: serde_json::Error) -> Self {
        WhatsAppError::InvalidPayload(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, WhatsAppError>;
