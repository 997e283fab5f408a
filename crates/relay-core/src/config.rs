//! Configuration management
//!
//! Settings are resolved in this order:
//! 1. Environment variables
//! 2. `relay.toml` in the working directory
//! 3. Default values
//!
//! Inside the TOML file, `${VAR_NAME}` is expanded from the environment.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// Default config file looked up by [`Config::load`]
pub const CONFIG_FILE: &str = "relay.toml";

/// Language-model server flavour
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// llama.cpp `server` native completion endpoint
    #[default]
    LlamaCpp,
    /// OpenAI-compatible text completions (llama.cpp, vLLM, LM Studio, ...)
    OpenAi,
}

impl LlmProvider {
    fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "openai" | "openai-compatible" | "vllm" | "lmstudio" => LlmProvider::OpenAi,
            _ => LlmProvider::LlamaCpp,
        }
    }
}

/// WhatsApp Cloud API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppConfig {
    /// Bearer token for the Graph API
    #[serde(skip_serializing)]
    pub access_token: String,

    /// Sender phone-number id (part of the messages endpoint path)
    pub phone_number_id: String,

    /// Secret echoed back during webhook verification
    #[serde(skip_serializing)]
    pub verify_token: String,

    /// Template sent during the bulk broadcast
    pub template_name: String,

    /// Template language code
    pub template_lang: String,

    /// App secret for `X-Hub-Signature-256` checks; unset disables them
    #[serde(skip_serializing)]
    pub app_secret: Option<String>,

    pub api_base_url: String,
    pub api_version: String,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            phone_number_id: String::new(),
            verify_token: default_verify_token(),
            template_name: default_template_name(),
            template_lang: default_template_lang(),
            app_secret: None,
            api_base_url: default_api_base_url(),
            api_version: default_api_version(),
        }
    }
}

/// Local language-model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProvider,

    /// Server base URL; a provider-specific local default applies when unset
    pub base_url: Option<String>,

    /// Model name, only sent to OpenAI-compatible servers
    pub model: Option<String>,

    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::LlamaCpp,
            base_url: None,
            model: None,
            api_key: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Conversation memory settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Maximum transcript length per sender, in characters
    pub history_cap: usize,

    /// Persona line that opens every prompt
    pub system_prompt: String,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            history_cap: default_history_cap(),
            system_prompt: default_system_prompt(),
        }
    }
}

/// Webhook server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,

    /// Upper bound on dispatches running at once
    pub max_in_flight: usize,

    /// Events waiting for a free dispatch slot before new ones are dropped
    pub queue_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_in_flight: default_max_in_flight(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// Startup broadcast settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastConfig {
    pub contacts_path: String,
    pub enabled: bool,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            contacts_path: default_contacts_path(),
            enabled: true,
        }
    }
}

/// Main configuration for the relay
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub whatsapp: WhatsAppConfig,
    pub llm: LlmConfig,
    pub conversation: ConversationConfig,
    pub server: ServerConfig,
    pub broadcast: BroadcastConfig,
}

fn default_verify_token() -> String {
    "testtoken".to_string()
}

fn default_template_name() -> String {
    "hello_world".to_string()
}

fn default_template_lang() -> String {
    "en_US".to_string()
}

fn default_api_base_url() -> String {
    "https://graph.facebook.com".to_string()
}

fn default_api_version() -> String {
    "v22.0".to_string()
}

fn default_max_tokens() -> u32 {
    256
}

fn default_temperature() -> f32 {
    0.7
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_history_cap() -> usize {
    4000
}

fn default_system_prompt() -> String {
    "You are a friendly, concise assistant.".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_max_in_flight() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    64
}

fn default_contacts_path() -> String {
    "contacts.xlsx".to_string()
}

impl Config {
    /// Expand `${VAR_NAME}` references from the environment.
    ///
    /// A variable that is not set expands to an empty string.
    fn expand_env_vars(value: &str) -> String {
        let mut result = String::new();
        let mut chars = value.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '$' && chars.peek() == Some(&'{') {
                chars.next();

                let mut var_name = String::new();
                for c in chars.by_ref() {
                    if c == '}' {
                        break;
                    }
                    var_name.push(c);
                }

                if let Ok(env_value) = std::env::var(&var_name) {
                    result.push_str(&env_value);
                }
            } else {
                result.push(c);
            }
        }

        result
    }

    /// Load configuration from a TOML file, then apply environment overrides.
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let toml_content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let mut cfg = Self::parse_toml(&toml_content)?;
        cfg.apply_env_overrides();
        cfg.validate()?;

        Ok(cfg)
    }

    /// Load `relay.toml` if present, otherwise the environment alone.
    pub fn load() -> Result<Self> {
        if Path::new(CONFIG_FILE).exists() {
            return Self::from_toml_file(CONFIG_FILE);
        }

        Self::from_env()
    }

    /// Load configuration from environment variables over defaults.
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();
        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Expand and parse TOML text without consulting env overrides.
    fn parse_toml(content: &str) -> Result<Self> {
        let expanded = Self::expand_env_vars(content);
        let toml: TomlConfig = toml::from_str(&expanded)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))?;
        Ok(Self::from_toml_config(toml))
    }

    fn from_toml_config(toml: TomlConfig) -> Self {
        let wa = toml.whatsapp.unwrap_or_default();
        let whatsapp = WhatsAppConfig {
            access_token: wa.access_token.unwrap_or_default(),
            phone_number_id: wa.phone_number_id.unwrap_or_default(),
            verify_token: wa.verify_token.unwrap_or_else(default_verify_token),
            template_name: wa.template_name.unwrap_or_else(default_template_name),
            template_lang: wa.template_lang.unwrap_or_else(default_template_lang),
            app_secret: wa.app_secret.filter(|s| !s.is_empty()),
            api_base_url: wa.api_base_url.unwrap_or_else(default_api_base_url),
            api_version: wa.api_version.unwrap_or_else(default_api_version),
        };

        let llm = toml.llm.unwrap_or_default();
        let llm = LlmConfig {
            provider: llm
                .provider
                .as_deref()
                .map(LlmProvider::parse)
                .unwrap_or_default(),
            base_url: llm.base_url.filter(|s| !s.is_empty()),
            model: llm.model.filter(|s| !s.is_empty()),
            api_key: llm.api_key.filter(|s| !s.is_empty()),
            max_tokens: llm.max_tokens.unwrap_or_else(default_max_tokens),
            temperature: llm.temperature.unwrap_or_else(default_temperature),
            timeout_secs: llm.timeout_secs.unwrap_or_else(default_timeout_secs),
        };

        let conv = toml.conversation.unwrap_or_default();
        let conversation = ConversationConfig {
            history_cap: conv.history_cap.unwrap_or_else(default_history_cap),
            system_prompt: conv.system_prompt.unwrap_or_else(default_system_prompt),
        };

        let srv = toml.server.unwrap_or_default();
        let server = ServerConfig {
            host: srv.host.unwrap_or_else(default_host),
            port: srv.port.unwrap_or_else(default_port),
            max_in_flight: srv.max_in_flight.unwrap_or_else(default_max_in_flight),
            queue_capacity: srv.queue_capacity.unwrap_or_else(default_queue_capacity),
        };

        let bc = toml.broadcast.unwrap_or_default();
        let broadcast = BroadcastConfig {
            contacts_path: bc.contacts_path.unwrap_or_else(default_contacts_path),
            enabled: bc.enabled.unwrap_or(true),
        };

        Config {
            whatsapp,
            llm,
            conversation,
            server,
            broadcast,
        }
    }

    /// Override settings from the environment
    fn apply_env_overrides(&mut self) {
        if let Some(v) = env_string("META_TOKEN") {
            self.whatsapp.access_token = v;
        }
        if let Some(v) = env_string("PHONE_NUMBER_ID") {
            self.whatsapp.phone_number_id = v;
        }
        if let Some(v) = env_string("VERIFY_TOKEN") {
            self.whatsapp.verify_token = v;
        }
        if let Some(v) = env_string("TEMPLATE_NAME") {
            self.whatsapp.template_name = v;
        }
        if let Some(v) = env_string("TEMPLATE_LANG") {
            self.whatsapp.template_lang = v;
        }
        if let Some(v) = env_string("APP_SECRET") {
            self.whatsapp.app_secret = Some(v);
        }
        if let Some(v) = env_string("GRAPH_API_URL") {
            self.whatsapp.api_base_url = v;
        }
        if let Some(v) = env_string("GRAPH_API_VERSION") {
            self.whatsapp.api_version = v;
        }

        if let Some(v) = env_string("LLM_PROVIDER") {
            self.llm.provider = LlmProvider::parse(&v);
        }
        if let Some(v) = env_string("LLM_BASE_URL") {
            self.llm.base_url = Some(v);
        }
        if let Some(v) = env_string("LLM_MODEL") {
            self.llm.model = Some(v);
        }
        if let Some(v) = env_string("LLM_API_KEY") {
            self.llm.api_key = Some(v);
        }
        if let Some(v) = env_parsed("LLM_MAX_TOKENS") {
            self.llm.max_tokens = v;
        }
        if let Some(v) = env_parsed("LLM_TEMPERATURE") {
            self.llm.temperature = v;
        }
        if let Some(v) = env_parsed("LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = v;
        }

        if let Some(v) = env_parsed("HISTORY_CAP") {
            self.conversation.history_cap = v;
        }
        if let Some(v) = env_string("SYSTEM_PROMPT") {
            self.conversation.system_prompt = v;
        }

        if let Some(v) = env_string("SERVER_HOST") {
            self.server.host = v;
        }
        if let Some(v) = env_parsed("SERVER_PORT") {
            self.server.port = v;
        }
        if let Some(v) = env_parsed("MAX_IN_FLIGHT") {
            self.server.max_in_flight = v;
        }
        if let Some(v) = env_parsed("QUEUE_CAPACITY") {
            self.server.queue_capacity = v;
        }

        if let Some(v) = env_string("CONTACTS_PATH") {
            self.broadcast.contacts_path = v;
        }
        if let Some(v) = env_string("BROADCAST_ENABLED") {
            match parse_flag(&v) {
                Some(enabled) => self.broadcast.enabled = enabled,
                None => tracing::warn!("Ignoring unparsable value for BROADCAST_ENABLED: {}", v),
            }
        }
    }

    /// Reject configurations the relay cannot start with
    pub fn validate(&self) -> Result<()> {
        if self.whatsapp.access_token.trim().is_empty() {
            return Err(Error::Config("META_TOKEN not set".to_string()));
        }
        if self.whatsapp.phone_number_id.trim().is_empty() {
            return Err(Error::Config("PHONE_NUMBER_ID not set".to_string()));
        }
        if self.server.max_in_flight == 0 {
            return Err(Error::Config("max_in_flight must be at least 1".to_string()));
        }
        if self.server.queue_capacity == 0 {
            return Err(Error::Config("queue_capacity must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Non-empty environment variable
fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Environment variable parsed into `T`; unparsable values are ignored
/// Accepts the usual spellings of an on/off switch
fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env_string(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Ignoring unparsable value for {}: {}", key, raw);
            None
        }
    }
}

// ============================================================================
// TOML file structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct TomlConfig {
    whatsapp: Option<TomlWhatsAppConfig>,
    llm: Option<TomlLlmConfig>,
    conversation: Option<TomlConversationConfig>,
    server: Option<TomlServerConfig>,
    broadcast: Option<TomlBroadcastConfig>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlWhatsAppConfig {
    access_token: Option<String>,
    phone_number_id: Option<String>,
    verify_token: Option<String>,
    template_name: Option<String>,
    template_lang: Option<String>,
    app_secret: Option<String>,
    api_base_url: Option<String>,
    api_version: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlLlmConfig {
    provider: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    api_key: Option<String>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlConversationConfig {
    history_cap: Option<usize>,
    system_prompt: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlServerConfig {
    host: Option<String>,
    port: Option<u16>,
    max_in_flight: Option<usize>,
    queue_capacity: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlBroadcastConfig {
    contacts_path: Option<String>,
    enabled: Option<bool>,
}
