//! Completion HTTP client
//!
//! Talks to a locally running model server. The model weights and runtime
//! live outside this process.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{LlmConfig, LlmProvider};
use crate::error::{Error, Result};

use super::types::*;

/// A blocking-style text completion: prompt in, generated text out.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn complete(&self, prompt: &str, params: &CompletionParams) -> Result<String>;
}

/// Local model server client
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    base_url: String,
    provider: LlmProvider,
    model: Option<String>,
    api_key: Option<String>,
}

impl LlmClient {
    /// Create a new client from config
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(Error::Http)?;

        let base_url = match &config.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => match config.provider {
                LlmProvider::LlamaCpp => "http://127.0.0.1:8080".to_string(),
                LlmProvider::OpenAi => "http://127.0.0.1:8080/v1".to_string(),
            },
        };

        Ok(Self {
            client,
            base_url,
            provider: config.provider.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn provider(&self) -> &LlmProvider {
        &self.provider
    }

    fn post(&self, url: &str) -> reqwest::RequestBuilder {
        let request = self.client.post(url);
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    /// llama.cpp native endpoint
    async fn complete_llamacpp(&self, prompt: &str, params: &CompletionParams) -> Result<String> {
        let url = format!("{}/completion", self.base_url);
        debug!("Sending completion request to llama.cpp: {}", url);

        let response = self
            .post(&url)
            .json(&LlamaCppRequest::new(prompt, params))
            .send()
            .await
            .map_err(Error::Http)?;

        let status = response.status();
        let body = response.text().await.map_err(Error::Http)?;

        if !status.is_success() {
            warn!("llama.cpp error: {} - {}", status, body);
            return Err(Error::Inference(format!("{}: {}", status, body)));
        }

        let parsed: LlamaCppResponse = serde_json::from_str(&body).map_err(|e| {
            Error::Inference(format!("Failed to parse response: {} - {}", e, body))
        })?;

        info!(
            "llama.cpp response: tokens={}",
            parsed.tokens_predicted.unwrap_or(0)
        );

        Ok(parsed.content)
    }

    /// OpenAI-compatible text completions
    async fn complete_openai(&self, prompt: &str, params: &CompletionParams) -> Result<String> {
        let url = format!("{}/completions", self.base_url);
        debug!("Sending completion request to OpenAI-compatible API: {}", url);

        let request = OpenAiCompletionRequest {
            model: self.model.as_deref(),
            prompt,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            stop: &params.stop,
        };

        let response = self
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(Error::Http)?;

        let status = response.status();
        let body = response.text().await.map_err(Error::Http)?;

        if !status.is_success() {
            warn!("OpenAI API error: {} - {}", status, body);
            return Err(Error::Inference(format!("{}: {}", status, body)));
        }

        let parsed: OpenAiCompletionResponse = serde_json::from_str(&body).map_err(|e| {
            Error::Inference(format!("Failed to parse response: {} - {}", e, body))
        })?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::Inference("Response contained no choices".to_string()))?;

        info!(
            "OpenAI API response: finish_reason={:?}, tokens={}",
            choice.finish_reason,
            parsed.usage.map(|u| u.completion_tokens).unwrap_or(0)
        );

        Ok(choice.text)
    }
}

#[async_trait]
impl CompletionModel for LlmClient {
    async fn complete(&self, prompt: &str, params: &CompletionParams) -> Result<String> {
        match self.provider {
            LlmProvider::LlamaCpp => self.complete_llamacpp(prompt, params).await,
            LlmProvider::OpenAi => self.complete_openai(prompt, params).await,
        }
    }
}
