// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles a complete dispatcher with mock adapters, a temp
//! SQLite authorization registry and a manual clock. Provides `dispatch()`
//! to drive the full message pipeline in tests.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use parley_agent::{ContentResolver, DispatchOutcome, Dispatcher, DispatcherSettings, GroupTrigger};
use parley_config::ParleyConfig;
use parley_config::model::{AgentConfig, ContextConfig, StorageConfig, TelegramConfig};
use parley_context::{ContextSettings, ContextStore, ManualClock, load_base_policy};
use parley_core::{
    AuthRegistry, ChatId, ChatKind, ImageDetail, InboundMessage, ParleyError, Sender,
};
use parley_storage::SqliteAuthRegistry;

use crate::mock_channel::MockChannel;
use crate::mock_provider::MockProvider;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    responses: Vec<String>,
    system_prompt: Option<String>,
    bot_name: Option<String>,
    context_length: usize,
    context_timeout_secs: u64,
    registration_secret: Option<String>,
    authorized: Vec<i64>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        let context = ContextConfig::default();
        Self {
            responses: Vec::new(),
            system_prompt: None,
            bot_name: None,
            context_length: context.length,
            context_timeout_secs: context.timeout_secs,
            registration_secret: None,
            authorized: Vec::new(),
        }
    }

    /// Set mock provider responses.
    pub fn with_mock_responses(mut self, responses: Vec<String>) -> Self {
        self.responses = responses;
        self
    }

    /// Set a custom base policy.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_bot_name(mut self, name: impl Into<String>) -> Self {
        self.bot_name = Some(name.into());
        self
    }

    pub fn with_context_length(mut self, length: usize) -> Self {
        self.context_length = length;
        self
    }

    pub fn with_context_timeout(mut self, secs: u64) -> Self {
        self.context_timeout_secs = secs;
        self
    }

    pub fn with_registration_secret(mut self, secret: impl Into<String>) -> Self {
        self.registration_secret = Some(secret.into());
        self
    }

    /// Chats authorized in the registry before the harness is returned.
    pub fn with_authorized(mut self, chats: &[i64]) -> Self {
        self.authorized = chats.to_vec();
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, ParleyError> {
        let temp_dir = tempfile::TempDir::new().map_err(ParleyError::storage)?;
        let db_path = temp_dir.path().join("auth.db").to_string_lossy().into_owned();

        let config = ParleyConfig {
            agent: AgentConfig {
                name: self.bot_name,
                system_prompt: self
                    .system_prompt
                    .or(Some("You are a test assistant.".to_string())),
                ..AgentConfig::default()
            },
            telegram: TelegramConfig {
                registration_secret: self.registration_secret,
                ..TelegramConfig::default()
            },
            context: ContextConfig {
                length: self.context_length,
                timeout_secs: self.context_timeout_secs,
                ..ContextConfig::default()
            },
            storage: StorageConfig {
                database_path: db_path,
            },
            ..ParleyConfig::default()
        };

        let registry = Arc::new(SqliteAuthRegistry::new(&config.storage));
        registry.initialize().await?;
        for chat in &self.authorized {
            registry.authorize(ChatId(*chat)).await?;
        }

        let mock_provider = Arc::new(if self.responses.is_empty() {
            MockProvider::new()
        } else {
            MockProvider::with_responses(self.responses)
        });
        let mock_channel = Arc::new(MockChannel::new());

        let clock = Arc::new(ManualClock::new(Utc::now()));
        let base_policy = load_base_policy(&config.agent).await;
        let contexts = Arc::new(ContextStore::new(
            ContextSettings::from_config(&config.context, base_policy, config.agent.name.clone()),
            clock.clone(),
        ));
        let resolver = ContentResolver::new(
            mock_channel.clone(),
            GroupTrigger::new(&config.telegram.group_trigger)?,
            ImageDetail::from_str(&config.provider.image_detail).unwrap_or_default(),
        );
        let dispatcher = Arc::new(Dispatcher::new(
            mock_channel.clone(),
            mock_provider.clone(),
            registry.clone(),
            contexts,
            resolver,
            DispatcherSettings::from_config(&config),
        ));

        Ok(TestHarness {
            mock_provider,
            mock_channel,
            registry,
            clock,
            dispatcher,
            config,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment with mock adapters and temp storage.
pub struct TestHarness {
    /// The mock model provider.
    pub mock_provider: Arc<MockProvider>,
    /// The mock channel adapter.
    pub mock_channel: Arc<MockChannel>,
    /// SQLite registry (temp DB, cleaned up on drop).
    pub registry: Arc<SqliteAuthRegistry>,
    /// Clock driving context expiry.
    pub clock: Arc<ManualClock>,
    pub dispatcher: Arc<Dispatcher>,
    pub config: ParleyConfig,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Runs one message through the dispatcher.
    pub async fn dispatch(&self, msg: InboundMessage) -> Result<DispatchOutcome, ParleyError> {
        self.dispatcher.dispatch(msg).await
    }

    /// Sends a private text message and returns the reply text, if any was sent.
    pub async fn send_private(&self, chat_id: i64, text: &str) -> Result<Option<String>, ParleyError> {
        let before = self.mock_channel.sent_count().await;
        self.dispatch(private_message(chat_id, text)).await?;
        let sent = self.mock_channel.sent_messages().await;
        Ok(sent.get(before..).and_then(|s| s.last()).map(|m| m.text.clone()))
    }

    /// Moves the context clock forward.
    pub fn advance_secs(&self, secs: i64) {
        self.clock.advance(TimeDelta::seconds(secs));
    }
}

/// A text message in a private chat whose id equals the sender's user id.
pub fn private_message(chat_id: i64, text: &str) -> InboundMessage {
    InboundMessage {
        id: uuid::Uuid::new_v4().to_string(),
        chat_id: ChatId(chat_id),
        chat_kind: ChatKind::Private,
        chat_title: None,
        sender: Sender {
            id: Some(chat_id),
            username: Some("tester".into()),
            display_name: Some("Test User".into()),
        },
        text: Some(text.into()),
        caption: None,
        photos: Vec::new(),
        sticker: None,
        reply_to: None,
        timestamp: Utc::now(),
    }
}

/// A text message from `username` in the group "test group".
pub fn group_message(chat_id: i64, username: &str, text: &str) -> InboundMessage {
    InboundMessage {
        chat_kind: ChatKind::Group,
        chat_title: Some("test group".into()),
        sender: Sender {
            id: Some(1000),
            username: Some(username.into()),
            display_name: None,
        },
        ..private_message(chat_id, text)
    }
}
