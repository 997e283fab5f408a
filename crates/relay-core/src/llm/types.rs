//! Request and response shapes for completion servers

use serde::{Deserialize, Serialize};

/// Sampling parameters for a single completion call
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionParams {
    pub max_tokens: u32,
    pub temperature: f32,
    pub stop: Vec<String>,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            max_tokens: 256,
            temperature: 0.7,
            stop: Vec::new(),
        }
    }
}

impl CompletionParams {
    pub fn with_stop<I, S>(mut self, stop: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stop = stop.into_iter().map(Into::into).collect();
        self
    }
}

// =============================================================================
// llama.cpp server (`POST /completion`)
// =============================================================================

#[derive(Debug, Serialize)]
pub(crate) struct LlamaCppRequest<'a> {
    pub prompt: &'a str,
    pub n_predict: u32,
    pub temperature: f32,
    pub stop: &'a [String],
    pub stream: bool,
}

impl<'a> LlamaCppRequest<'a> {
    pub fn new(prompt: &'a str, params: &'a CompletionParams) -> Self {
        Self {
            prompt,
            n_predict: params.max_tokens,
            temperature: params.temperature,
            stop: &params.stop,
            stream: false,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct LlamaCppResponse {
    pub content: String,
    #[serde(default)]
    pub tokens_predicted: Option<u64>,
}

// =============================================================================
// OpenAI-compatible (`POST /completions`)
// =============================================================================

#[derive(Debug, Serialize)]
pub(crate) struct OpenAiCompletionRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<&'a str>,
    pub prompt: &'a str,
    pub max_tokens: u32,
    pub temperature: f32,
    #[serde(skip_serializing_if = "no_stop")]
    pub stop: &'a [String],
}

fn no_stop(stop: &&[String]) -> bool {
    stop.is_empty()
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiCompletionResponse {
    #[serde(default)]
    pub choices: Vec<OpenAiChoice>,
    #[serde(default)]
    pub usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiChoice {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiUsage {
    #[serde(default)]
    pub completion_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llamacpp_request_shape() {
        let params = CompletionParams::default().with_stop(["User:", "Assistant:"]);
        let request = LlamaCppRequest::new("Hi", &params);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["prompt"], "Hi");
        assert_eq!(json["n_predict"], 256);
        assert_eq!(json["stop"], serde_json::json!(["User:", "Assistant:"]));
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn test_openai_request_omits_empty_fields() {
        let params = CompletionParams::default();
        let request = OpenAiCompletionRequest {
            model: None,
            prompt: "Hi",
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            stop: &params.stop,
        };
        let json = serde_json::to_value(&request).unwrap();

        assert!(json.get("model").is_none());
        assert!(json.get("stop").is_none());
        assert_eq!(json["max_tokens"], 256);
    }
}
