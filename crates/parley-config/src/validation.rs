// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks semantic constraints serde cannot express: positive sizes and
//! durations, a compilable group trigger, a parseable provider URL, and a
//! complete webhook setup when webhook mode is selected.

use std::str::FromStr;

use parley_core::ImageDetail;

use crate::diagnostic::ConfigError;
use crate::model::{ParleyConfig, TelegramMode};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every violation instead of stopping at the first one.
pub fn validate_config(config: &ParleyConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.agent.log_level.as_str()) {
        errors.push(ConfigError::validation(format!(
            "agent.log_level `{}` must be one of: {}",
            config.agent.log_level,
            LOG_LEVELS.join(", ")
        )));
    }

    if config.context.length < 1 {
        errors.push(ConfigError::validation(
            "context.length must be at least 1",
        ));
    }

    if config.context.timeout_secs < 1 {
        errors.push(ConfigError::validation(
            "context.timeout_secs must be at least 1",
        ));
    }

    if config.context.purge_interval_secs < 1 {
        errors.push(ConfigError::validation(
            "context.purge_interval_secs must be at least 1",
        ));
    }

    if let Err(e) = regex::Regex::new(&config.telegram.group_trigger) {
        errors.push(ConfigError::validation(format!(
            "telegram.group_trigger is not a valid regular expression: {e}"
        )));
    }

    if config.telegram.mode == TelegramMode::Webhook {
        if config
            .telegram
            .webhook_domain
            .as_deref()
            .is_none_or(|d| d.trim().is_empty())
        {
            errors.push(ConfigError::validation(
                "telegram.webhook_domain is required when telegram.mode = \"webhook\"",
            ));
        }
        if config
            .telegram
            .webhook_secret_token
            .as_deref()
            .is_none_or(|s| s.trim().is_empty())
        {
            errors.push(ConfigError::validation(
                "telegram.webhook_secret_token is required when telegram.mode = \"webhook\"",
            ));
        }
        if config.telegram.webhook_listen.parse::<std::net::IpAddr>().is_err() {
            errors.push(ConfigError::validation(format!(
                "telegram.webhook_listen `{}` is not a valid IP address",
                config.telegram.webhook_listen
            )));
        }
    }

    if let Err(e) = reqwest::Url::parse(&config.provider.base_url) {
        errors.push(ConfigError::validation(format!(
            "provider.base_url `{}` is not a valid URL: {e}",
            config.provider.base_url
        )));
    }

    if ImageDetail::from_str(&config.provider.image_detail).is_err() {
        errors.push(ConfigError::validation(format!(
            "provider.image_detail `{}` must be one of: auto, low, high",
            config.provider.image_detail
        )));
    }

    if config.provider.timeout_secs < 1 {
        errors.push(ConfigError::validation(
            "provider.timeout_secs must be at least 1",
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation(
            "storage.database_path must not be empty",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(config: &ParleyConfig) -> Vec<String> {
        validate_config(config)
            .err()
            .unwrap_or_default()
            .iter()
            .map(|e| e.to_string())
            .collect()
    }

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&ParleyConfig::default()).is_ok());
    }

    #[test]
    fn zero_context_length_rejected() {
        let mut config = ParleyConfig::default();
        config.context.length = 0;
        let msgs = messages(&config);
        assert!(msgs.iter().any(|m| m.contains("context.length")));
    }

    #[test]
    fn bad_trigger_regex_rejected() {
        let mut config = ParleyConfig::default();
        config.telegram.group_trigger = "(unclosed".into();
        let msgs = messages(&config);
        assert!(msgs.iter().any(|m| m.contains("group_trigger")));
    }

    #[test]
    fn webhook_mode_requires_domain_and_secret() {
        let mut config = ParleyConfig::default();
        config.telegram.mode = TelegramMode::Webhook;
        let msgs = messages(&config);
        assert!(msgs.iter().any(|m| m.contains("webhook_domain")));
        assert!(msgs.iter().any(|m| m.contains("webhook_secret_token")));

        config.telegram.webhook_domain = Some("bot.example.com".into());
        config.telegram.webhook_secret_token = Some("s3cret".into());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn collects_all_errors() {
        let mut config = ParleyConfig::default();
        config.context.length = 0;
        config.context.timeout_secs = 0;
        config.provider.base_url = "not a url".into();
        config.provider.image_detail = "ultra".into();
        config.storage.database_path = "  ".into();
        assert_eq!(messages(&config).len(), 5);
    }
}
