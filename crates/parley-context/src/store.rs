// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Concurrent registry of live conversation contexts.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parley_config::model::ContextConfig;
use parley_core::{ChatId, ChatKind, ConversationTurn, Sender};
use tokio::sync::Mutex;
use tracing::debug;

use crate::clock::Clock;
use crate::conversation::ConversationContext;
use crate::prompt::{self, PromptInputs, RosterMember};

/// A context shared between the store and the task currently serving its chat.
pub type SharedContext = Arc<Mutex<ConversationContext>>;

/// Static inputs of every prompt, fixed for the life of the store.
#[derive(Debug, Clone)]
pub struct ContextSettings {
    pub capacity: usize,
    pub timeout: Duration,
    pub base_policy: String,
    pub bot_name: Option<String>,
}

impl ContextSettings {
    pub fn from_config(
        config: &ContextConfig,
        base_policy: impl Into<String>,
        bot_name: Option<String>,
    ) -> Self {
        Self {
            capacity: config.length,
            timeout: Duration::from_secs(config.timeout_secs),
            base_policy: base_policy.into(),
            bot_name,
        }
    }
}

/// Per-render metadata about the message being answered.
#[derive(Debug, Clone, Copy)]
pub struct RenderInputs<'a> {
    pub chat_kind: ChatKind,
    pub speaker: &'a Sender,
    pub chat_title: Option<&'a str>,
}

/// Owns every live [`ConversationContext`], keyed by chat.
///
/// Contexts live in process memory only. A context idle for at least the
/// configured timeout is treated as absent: the next [`get_or_create`]
/// replaces it with an empty one.
///
/// [`get_or_create`]: ContextStore::get_or_create
pub struct ContextStore {
    contexts: DashMap<ChatId, SharedContext>,
    settings: ContextSettings,
    clock: Arc<dyn Clock>,
}

impl ContextStore {
    pub fn new(settings: ContextSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            contexts: DashMap::new(),
            settings,
            clock,
        }
    }

    pub fn settings(&self) -> &ContextSettings {
        &self.settings
    }

    /// Returns the live context for `chat_id`, creating a fresh one when it is
    /// absent or stale.
    pub async fn get_or_create(&self, chat_id: ChatId) -> SharedContext {
        let now = self.clock.now();
        let existing = self.contexts.get(&chat_id).map(|e| Arc::clone(e.value()));
        if let Some(existing) = existing {
            if !existing.lock().await.is_stale(now, self.settings.timeout) {
                return existing;
            }
            debug!(chat_id = %chat_id, "context stale, replacing");
        }

        let fresh = Arc::new(Mutex::new(ConversationContext::new(
            chat_id,
            self.settings.capacity,
            now,
        )));
        self.contexts.insert(chat_id, Arc::clone(&fresh));
        debug!(chat_id = %chat_id, "context created");
        fresh
    }

    /// Appends a turn to `context` at the current time.
    pub fn append(&self, context: &mut ConversationContext, turn: ConversationTurn) {
        context.push(turn, self.clock.now());
    }

    /// Produces the model input: a freshly built system turn followed by the buffer.
    ///
    /// In group chats the speaker is added to the roster first. The prompt is
    /// cached on the context; the buffer itself is not touched.
    pub fn render(
        &self,
        context: &mut ConversationContext,
        inputs: RenderInputs<'_>,
    ) -> Vec<ConversationTurn> {
        if inputs.chat_kind.is_group() {
            context.observe_member(RosterMember::from(inputs.speaker));
        }

        let system = prompt::build(&PromptInputs {
            base_policy: &self.settings.base_policy,
            bot_name: self.settings.bot_name.as_deref(),
            chat_kind: inputs.chat_kind,
            speaker: Some(inputs.speaker),
            chat_title: inputs.chat_title,
            roster: context.roster(),
        });
        context.set_system_prompt(system.clone());

        let mut turns = Vec::with_capacity(context.len() + 1);
        turns.push(ConversationTurn::system(system));
        turns.extend(context.turns().cloned());
        turns
    }

    /// Drops the context of `chat_id`. Returns whether one existed.
    pub fn clear(&self, chat_id: ChatId) -> bool {
        self.contexts.remove(&chat_id).is_some()
    }

    /// Removes every stale context and returns how many were dropped.
    ///
    /// Contexts locked by an in-flight message are skipped.
    pub fn purge_stale(&self) -> usize {
        let now = self.clock.now();
        let timeout = self.settings.timeout;
        let before = self.contexts.len();
        self.contexts.retain(|_, ctx| match ctx.try_lock() {
            Ok(guard) => !guard.is_stale(now, timeout),
            Err(_) => true,
        });
        let purged = before.saturating_sub(self.contexts.len());
        if purged > 0 {
            debug!(purged, remaining = self.contexts.len(), "purged stale contexts");
        }
        purged
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    pub fn contains(&self, chat_id: ChatId) -> bool {
        self.contexts.contains_key(&chat_id)
    }

    /// Clones the current state of a chat's context, if one is registered.
    pub async fn snapshot(&self, chat_id: ChatId) -> Option<ConversationContext> {
        let shared = self.contexts.get(&chat_id).map(|e| Arc::clone(e.value()))?;
        let guard = shared.lock().await;
        Some(guard.clone())
    }
}
