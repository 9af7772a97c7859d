// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock model provider for deterministic testing.
//!
//! `MockProvider` implements `ProviderAdapter` with scripted replies and
//! records every request it receives.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use parley_core::{
    AdapterType, Choice, HealthStatus, ParleyError, PluginAdapter, ProviderAdapter,
    ProviderRequest, ProviderResponse, Role,
};

/// One scripted provider outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockReply {
    /// A completion with this content.
    Text(String),
    /// A completion whose only choice has no content.
    Empty,
    /// A rate-limit rejection.
    RateLimited,
    /// A provider failure with this message.
    Fail(String),
}

impl MockReply {
    pub fn text(text: impl Into<String>) -> Self {
        MockReply::Text(text.into())
    }
}

/// A mock model provider that returns scripted replies.
///
/// Replies are popped from a FIFO queue. When the queue is empty,
/// a default "mock response" text is returned.
pub struct MockProvider {
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    requests: Arc<Mutex<Vec<ProviderRequest>>>,
    delay: Option<Duration>,
}

impl MockProvider {
    /// Create a new mock provider with an empty reply queue.
    pub fn new() -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
            delay: None,
        }
    }

    /// Create a mock provider pre-loaded with the given text replies.
    pub fn with_responses(responses: Vec<String>) -> Self {
        let provider = Self::new();
        let replies = responses.into_iter().map(MockReply::Text).collect();
        Self {
            replies: Arc::new(Mutex::new(replies)),
            ..provider
        }
    }

    /// Makes every completion take `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Add a reply to the end of the queue.
    pub async fn push(&self, reply: MockReply) {
        self.replies.lock().await.push_back(reply);
    }

    pub async fn push_text(&self, text: &str) {
        self.push(MockReply::text(text)).await;
    }

    /// Every request received so far, in arrival order.
    pub async fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().await.clone()
    }

    async fn next_reply(&self) -> MockReply {
        self.replies
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| MockReply::text("mock response"))
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockProvider {
    fn name(&self) -> &str {
        "mock-provider"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ParleyError> {
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for MockProvider {
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ParleyError> {
        let model = request.model.clone();
        self.requests.lock().await.push(request);
        let reply = self.next_reply().await;

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let content = match reply {
            MockReply::Text(text) => Some(text),
            MockReply::Empty => None,
            MockReply::RateLimited => return Err(ParleyError::RateLimited { retry_after: None }),
            MockReply::Fail(message) => {
                return Err(ParleyError::Provider {
                    message,
                    source: None,
                });
            }
        };

        Ok(ProviderResponse {
            id: format!("mock-resp-{}", uuid::Uuid::new_v4()),
            model,
            choices: vec![Choice {
                role: Role::Assistant,
                content,
            }],
        })
    }
}
