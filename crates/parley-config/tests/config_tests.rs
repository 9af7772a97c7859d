// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Parley configuration system.

use parley_config::diagnostic::ConfigError;
use parley_config::model::{ParleyConfig, TelegramMode};
use parley_config::{load_and_validate_str, load_config_from_str};

#[test]
fn full_toml_deserializes() {
    let toml = r#"
[agent]
name = "Parley"
log_level = "debug"
system_prompt = "Be brief."
rate_limit_reply = "slow down"

[telegram]
bot_token = "123:ABC"
mode = "webhook"
group_trigger = "^!bot"
registration_secret = "open-sesame"
webhook_domain = "bot.example.com"
webhook_port = 88
webhook_secret_token = "tok"

[provider]
base_url = "http://localhost:8080/v1"
api_key = "sk-test"
model = "gpt-4o"
image_detail = "low"
timeout_secs = 30

[context]
length = 8
timeout_secs = 120
purge_interval_secs = 10

[storage]
database_path = "/tmp/parley-test.db"
"#;

    let config = load_and_validate_str(toml).expect("valid config");
    assert_eq!(config.agent.name.as_deref(), Some("Parley"));
    assert_eq!(config.agent.log_level, "debug");
    assert_eq!(config.agent.system_prompt.as_deref(), Some("Be brief."));
    assert_eq!(config.agent.rate_limit_reply, "slow down");
    assert_eq!(config.telegram.mode, TelegramMode::Webhook);
    assert_eq!(config.telegram.group_trigger, "^!bot");
    assert_eq!(
        config.telegram.webhook_url().as_deref(),
        Some("https://bot.example.com:88")
    );
    assert_eq!(config.provider.model, "gpt-4o");
    assert_eq!(config.provider.image_detail, "low");
    assert_eq!(config.context.length, 8);
    assert_eq!(config.context.timeout_secs, 120);
    assert_eq!(config.storage.database_path, "/tmp/parley-test.db");
}

#[test]
fn empty_toml_uses_defaults() {
    let config = load_config_from_str("").expect("empty TOML should use defaults");
    assert!(config.agent.name.is_none());
    assert_eq!(config.agent.log_level, "info");
    assert!(config.telegram.bot_token.is_none());
    assert_eq!(config.telegram.group_trigger, "!ai");
    assert_eq!(config.provider.base_url, "https://api.openai.com/v1");
    assert_eq!(config.context.length, 5);
    assert_eq!(config.context.timeout_secs, 600);
}

#[test]
fn unknown_key_gets_suggestion() {
    let toml = r#"
[context]
lenght = 3
"#;

    let errors = load_and_validate_str(toml).expect_err("unknown key must be rejected");
    let unknown = errors
        .iter()
        .find_map(|e| match e {
            ConfigError::UnknownKey {
                key, suggestion, ..
            } => Some((key.clone(), suggestion.clone())),
            _ => None,
        })
        .expect("an UnknownKey diagnostic");
    assert_eq!(unknown.0, "lenght");
    assert_eq!(unknown.1.as_deref(), Some("length"));
}

#[test]
fn unknown_section_rejected() {
    let err = load_config_from_str("[anthropic]\napi_key = \"x\"\n")
        .expect_err("unknown section must be rejected");
    assert!(err.to_string().contains("anthropic"));
}

#[test]
fn wrong_type_reports_invalid_type() {
    let errors = load_and_validate_str("[context]\nlength = \"five\"\n")
        .expect_err("string length must be rejected");
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidType { .. })),
        "got: {errors:?}"
    );
}

#[test]
fn validation_errors_surface_through_loader() {
    let errors = load_and_validate_str("[telegram]\nmode = \"webhook\"\n")
        .expect_err("incomplete webhook config must fail");
    assert!(errors.len() >= 2);
    assert!(
        errors
            .iter()
            .all(|e| matches!(e, ConfigError::Validation { .. }))
    );
}

#[test]
fn dotted_overrides_merge_over_toml() {
    use figment::{
        Figment,
        providers::{Format, Serialized, Toml},
    };

    let config: ParleyConfig = Figment::new()
        .merge(Serialized::defaults(ParleyConfig::default()))
        .merge(Toml::string("[telegram]\nbot_token = \"from-toml\"\n"))
        .merge(("telegram.bot_token", "from-env"))
        .extract()
        .expect("should merge override");
    assert_eq!(config.telegram.bot_token.as_deref(), Some("from-env"));
}

#[test]
fn missing_config_file_is_skipped() {
    use figment::{
        Figment,
        providers::{Format, Serialized, Toml},
    };

    let config: ParleyConfig = Figment::new()
        .merge(Serialized::defaults(ParleyConfig::default()))
        .merge(Toml::file("/nonexistent/path/parley.toml"))
        .extract()
        .expect("missing file should be skipped");
    assert_eq!(config.context.length, 5);
}
