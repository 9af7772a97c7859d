// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI-compatible chat-completion provider for the Parley relay agent.
//!
//! This crate implements [`ProviderAdapter`] for any endpoint speaking the
//! Chat Completions wire format, including vision content parts.

pub mod client;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use parley_config::model::ProviderConfig;
use parley_core::{
    AdapterType, Choice, ContentBlock, ConversationTurn, HealthStatus, ParleyError, PluginAdapter,
    ProviderAdapter, ProviderRequest, ProviderResponse, Role,
};
use tracing::{debug, info, warn};

use crate::client::OpenAiClient;
use crate::types::{ApiContent, ApiMessage, ChatCompletionRequest, ContentPart, ImageUrl};

/// Environment variable consulted when no API key is configured.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Chat-completion provider implementing [`ProviderAdapter`].
///
/// API key resolution order: config -> `OPENAI_API_KEY` env var -> error.
pub struct OpenAiProvider {
    client: OpenAiClient,
}

impl OpenAiProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, ParleyError> {
        let api_key = resolve_api_key(config.api_key.as_deref())?;
        let client = OpenAiClient::new(
            &api_key,
            &config.base_url,
            Duration::from_secs(config.timeout_secs),
        )?;

        info!(
            model = config.model.as_str(),
            endpoint = client.endpoint(),
            "chat-completion provider initialized"
        );
        Ok(Self { client })
    }

    /// Creates a provider with an existing client.
    pub fn with_client(client: OpenAiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PluginAdapter for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        // No probe request: it would spend tokens.
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ParleyError> {
        debug!("chat-completion provider shutting down");
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiProvider {
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ParleyError> {
        let api_request = to_api_request(&request);
        let response = self.client.complete(&api_request).await?;

        let choices = response
            .choices
            .into_iter()
            .map(|c| Choice {
                role: c.message.role.parse().unwrap_or_else(|_| {
                    warn!(role = c.message.role.as_str(), "unexpected completion role");
                    Role::Assistant
                }),
                content: c.message.content,
            })
            .collect();

        Ok(ProviderResponse {
            id: response.id,
            model: response.model,
            choices,
        })
    }
}

/// Converts a provider-neutral request into the wire format.
fn to_api_request(request: &ProviderRequest) -> ChatCompletionRequest {
    ChatCompletionRequest {
        model: request.model.clone(),
        messages: request.turns.iter().map(to_api_message).collect(),
    }
}

fn to_api_message(turn: &ConversationTurn) -> ApiMessage {
    let content = match turn.content.as_slice() {
        [ContentBlock::Text { text }] => ApiContent::Text(text.clone()),
        blocks if turn.role != Role::User => ApiContent::Text(
            blocks
                .iter()
                .filter_map(ContentBlock::as_text)
                .collect::<Vec<_>>()
                .join("\n"),
        ),
        blocks => ApiContent::Parts(blocks.iter().map(to_content_part).collect()),
    };
    ApiMessage {
        role: turn.role.to_string(),
        content,
    }
}

fn to_content_part(block: &ContentBlock) -> ContentPart {
    match block {
        ContentBlock::Text { text } => ContentPart::Text { text: text.clone() },
        ContentBlock::Image { url, detail } => ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: url.clone(),
                detail: detail.to_string(),
            },
        },
    }
}

fn resolve_api_key(config_key: Option<&str>) -> Result<String, ParleyError> {
    if let Some(key) = config_key
        && !key.is_empty()
    {
        return Ok(key.to_string());
    }

    std::env::var(API_KEY_ENV)
        .ok()
        .filter(|key| !key.is_empty())
        .ok_or_else(|| {
            ParleyError::Config(format!(
                "provider API key not found. Set provider.api_key in config or {API_KEY_ENV} environment variable."
            ))
        })
}
