//! Error types for relay-gateway

use std::fmt;

/// Unified startup error
///
/// Wraps each library crate's error so startup failures keep their origin.
#[derive(Debug)]
pub enum GatewayError {
    /// Configuration or model client
    Core(relay_core::Error),
    /// WhatsApp client or webhook server
    WhatsApp(relay_whatsapp::WhatsAppError),
    /// Contact spreadsheet
    Contacts(relay_contacts::ContactsError),
    /// Bad command line
    Usage(String),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Core(e) => write!(f, "Core error: {}", e),
            Self::WhatsApp(e) => write!(f, "WhatsApp error: {}", e),
            Self::Contacts(e) => write!(f, "Contacts error: {}", e),
            Self::Usage(e) => write!(f, "Usage error: {}", e),
        }
    }
}

impl std::error::Error for GatewayError {}

impl From<relay_core::Error> for GatewayError {
    fn from(e: relay_core::Error) -> Self {
        Self::Core(e)
    }
}

impl From<relay_whatsapp::WhatsAppError> for GatewayError {
    fn from(e: relay_whatsapp::WhatsAppError) -> Self {
        Self::WhatsApp(e)
    }
}

impl From<relay_contacts::ContactsError> for GatewayError {
    fn from(e: relay_contacts::ContactsError) -> Self {
        Self::Contacts(e)
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, GatewayError>;
