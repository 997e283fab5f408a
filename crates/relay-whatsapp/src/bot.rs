//! WhatsApp relay wrapper

use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use relay_core::{CompletionModel, Config, ReplyGenerator};

use crate::api::WhatsAppApi;
use crate::error::{Result, WhatsAppError};
use crate::handler::MessageHandler;
use crate::queue::DispatchQueue;
use crate::webhook::{WebhookServer, WebhookState};

/// Application context: API client, reply generator and server settings,
/// built once at startup and shared with every request.
pub struct WhatsAppBot {
    api: Arc<WhatsAppApi>,
    handler: Arc<MessageHandler>,
    verify_token: String,
    app_secret: Option<String>,
    addr: SocketAddr,
    queue_capacity: usize,
}

impl WhatsAppBot {
    /// Build the relay from config and a completion model
    pub fn from_config(config: &Config, model: Arc<dyn CompletionModel>) -> Result<Self> {
        let api = Arc::new(WhatsAppApi::new(&config.whatsapp)?);
        let replies = Arc::new(ReplyGenerator::from_config(model, config));
        let handler = Arc::new(MessageHandler::new(api.clone(), replies));

        let ip: IpAddr = config.server.host.parse().map_err(|e| {
            WhatsAppError::Config(format!("invalid host {}: {}", config.server.host, e))
        })?;

        Ok(Self {
            api,
            handler,
            verify_token: config.whatsapp.verify_token.clone(),
            app_secret: config.whatsapp.app_secret.clone(),
            addr: SocketAddr::new(ip, config.server.port),
            queue_capacity: config.server.queue_capacity,
        })
    }

    /// Get the API client for direct use (bulk sends)
    pub fn api(&self) -> Arc<WhatsAppApi> {
        Arc::clone(&self.api)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Start the dispatch workers and the webhook server
    pub async fn start<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let queue = DispatchQueue::spawn(self.handler, self.queue_capacity);
        let state = WebhookState {
            verify_token: self.verify_token,
            app_secret: self.app_secret,
            queue,
        };

        WebhookServer::new(self.addr, state).start(shutdown).await
    }
}
