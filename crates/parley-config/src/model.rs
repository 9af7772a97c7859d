// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Parley relay agent.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Base policy text used when no system prompt is configured.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are a helpful assistant integrated into a Telegram bot.
Respond using Telegram text formatting rules.
Keep every response under 4096 characters.
Do not send greetings every time.
";

/// Top-level Parley configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ParleyConfig {
    /// Bot identity, policy text and fixed replies.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Telegram transport settings.
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Chat-completion provider settings.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Conversation context settings.
    #[serde(default)]
    pub context: ContextConfig,

    /// Authorization registry storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Bot identity and behavior configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Display name the model is told to use. `None` omits the declaration.
    #[serde(default)]
    pub name: Option<String>,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Inline base policy text. Overridden by `system_prompt_file` if both set.
    #[serde(default)]
    pub system_prompt: Option<String>,

    /// Path to a file containing the base policy text.
    /// Takes precedence over `system_prompt` if both are set.
    #[serde(default)]
    pub system_prompt_file: Option<String>,

    /// Reply sent when the provider rate-limits a request.
    #[serde(default = "default_rate_limit_reply")]
    pub rate_limit_reply: String,

    /// Reply sent when the provider fails or returns an unusable completion.
    #[serde(default = "default_error_reply")]
    pub error_reply: String,

    /// Reply confirming a successful `/register`.
    #[serde(default = "default_registered_reply")]
    pub registered_reply: String,

    /// Reply confirming `/unregister`.
    #[serde(default = "default_unregistered_reply")]
    pub unregistered_reply: String,

    /// Reply confirming `/clear`.
    #[serde(default = "default_cleared_reply")]
    pub cleared_reply: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: None,
            log_level: default_log_level(),
            system_prompt: None,
            system_prompt_file: None,
            rate_limit_reply: default_rate_limit_reply(),
            error_reply: default_error_reply(),
            registered_reply: default_registered_reply(),
            unregistered_reply: default_unregistered_reply(),
            cleared_reply: default_cleared_reply(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_rate_limit_reply() -> String {
    "Too many requests right now. Please try again later.".to_string()
}

fn default_error_reply() -> String {
    "Something went wrong while processing your request.".to_string()
}

fn default_registered_reply() -> String {
    "This chat is now authorized.".to_string()
}

fn default_unregistered_reply() -> String {
    "This chat is no longer authorized.".to_string()
}

fn default_cleared_reply() -> String {
    "Conversation context cleared.".to_string()
}

/// How the Telegram adapter receives updates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TelegramMode {
    #[default]
    Polling,
    Webhook,
}

/// Telegram transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TelegramConfig {
    /// Telegram Bot API token. `None` disables the Telegram transport.
    #[serde(default)]
    pub bot_token: Option<String>,

    /// Update delivery mode.
    #[serde(default)]
    pub mode: TelegramMode,

    /// Regex matched at the start of a group message to address the bot.
    #[serde(default = "default_group_trigger")]
    pub group_trigger: String,

    /// Shared secret required by `/register`. `None` disables registration.
    #[serde(default)]
    pub registration_secret: Option<String>,

    /// Public domain the webhook is reachable at.
    #[serde(default)]
    pub webhook_domain: Option<String>,

    /// Address the webhook listener binds to.
    #[serde(default = "default_webhook_listen")]
    pub webhook_listen: String,

    /// Port the webhook listener binds to and advertises.
    #[serde(default = "default_webhook_port")]
    pub webhook_port: u16,

    /// Secret token Telegram echoes on every webhook call.
    #[serde(default)]
    pub webhook_secret_token: Option<String>,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            mode: TelegramMode::default(),
            group_trigger: default_group_trigger(),
            registration_secret: None,
            webhook_domain: None,
            webhook_listen: default_webhook_listen(),
            webhook_port: default_webhook_port(),
            webhook_secret_token: None,
        }
    }
}

impl TelegramConfig {
    /// Returns the public webhook URL, if a domain is configured.
    pub fn webhook_url(&self) -> Option<String> {
        self.webhook_domain
            .as_ref()
            .map(|domain| format!("https://{domain}:{}", self.webhook_port))
    }
}

fn default_group_trigger() -> String {
    "!ai".to_string()
}

fn default_webhook_listen() -> String {
    "0.0.0.0".to_string()
}

fn default_webhook_port() -> u16 {
    8443
}

/// OpenAI-compatible chat-completion provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// API base URL; `/chat/completions` is appended.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key. `None` requires the `OPENAI_API_KEY` environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model identifier sent with every request.
    #[serde(default = "default_model")]
    pub model: String,

    /// Detail hint attached to image content (auto, low, high).
    #[serde(default = "default_image_detail")]
    pub image_detail: String,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            model: default_model(),
            image_detail: default_image_detail(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_image_detail() -> String {
    "auto".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

/// Conversation context configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ContextConfig {
    /// Maximum number of turns retained per chat (oldest evicted first).
    #[serde(default = "default_context_length")]
    pub length: usize,

    /// Seconds of inactivity after which a chat's context is discarded.
    #[serde(default = "default_context_timeout_secs")]
    pub timeout_secs: u64,

    /// Seconds between sweeps that drop stale contexts from memory.
    #[serde(default = "default_purge_interval_secs")]
    pub purge_interval_secs: u64,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            length: default_context_length(),
            timeout_secs: default_context_timeout_secs(),
            purge_interval_secs: default_purge_interval_secs(),
        }
    }
}

fn default_context_length() -> usize {
    5
}

fn default_context_timeout_secs() -> u64 {
    600
}

fn default_purge_interval_secs() -> u64 {
    60
}

/// Authorization registry storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database holding authorized chats.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("parley").join("auth.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("auth.db"))
        .to_string_lossy()
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = ParleyConfig::default();
        assert_eq!(config.context.length, 5);
        assert_eq!(config.context.timeout_secs, 600);
        assert_eq!(config.telegram.mode, TelegramMode::Polling);
        assert_eq!(config.telegram.webhook_port, 8443);
        assert!(config.agent.name.is_none());
        assert!(config.storage.database_path.ends_with("auth.db"));
    }

    #[test]
    fn webhook_url_uses_domain_and_port() {
        let telegram = TelegramConfig {
            webhook_domain: Some("bot.example.com".into()),
            webhook_port: 88,
            ..Default::default()
        };
        assert_eq!(
            telegram.webhook_url().as_deref(),
            Some("https://bot.example.com:88")
        );
        assert_eq!(TelegramConfig::default().webhook_url(), None);
    }
}
