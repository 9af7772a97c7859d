// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Loads the operator's base policy text.

use parley_config::model::{AgentConfig, DEFAULT_SYSTEM_PROMPT};
use tracing::{info, warn};

/// Resolves the base policy text: file, then inline text, then the built-in default.
///
/// An unreadable or empty file falls through to the next source.
pub async fn load_base_policy(config: &AgentConfig) -> String {
    if let Some(path) = &config.system_prompt_file {
        match tokio::fs::read_to_string(path).await {
            Ok(content) if !content.trim().is_empty() => {
                info!(path = path.as_str(), "loaded system prompt from file");
                return content.trim().to_string();
            }
            Ok(_) => warn!(path = path.as_str(), "system prompt file is empty, falling back"),
            Err(e) => warn!(
                path = path.as_str(),
                error = %e,
                "failed to read system prompt file, falling back"
            ),
        }
    }

    if let Some(prompt) = &config.system_prompt
        && !prompt.trim().is_empty()
    {
        return prompt.clone();
    }

    DEFAULT_SYSTEM_PROMPT.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_takes_precedence_over_inline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.md");
        std::fs::write(&path, "  From file.  \n").unwrap();

        let config = AgentConfig {
            system_prompt: Some("Inline.".into()),
            system_prompt_file: Some(path.display().to_string()),
            ..Default::default()
        };
        assert_eq!(load_base_policy(&config).await, "From file.");
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn missing_file_falls_back_to_inline() {
        let config = AgentConfig {
            system_prompt: Some("Inline.".into()),
            system_prompt_file: Some("/nonexistent/policy.md".into()),
            ..Default::default()
        };
        assert_eq!(load_base_policy(&config).await, "Inline.");
        assert!(logs_contain("failed to read system prompt file"));
    }

    #[tokio::test]
    async fn default_when_nothing_configured() {
        let config = AgentConfig::default();
        assert_eq!(load_base_policy(&config).await, DEFAULT_SYSTEM_PROMPT);
    }
}
