// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Agent loop and message dispatch for the Parley relay agent.
//!
//! The [`AgentLoop`] is the central coordinator that:
//! - Receives messages from a channel adapter
//! - Routes them to per-chat workers so each chat is served one message at a time
//! - Periodically purges stale conversation contexts and idle workers
//! - Drains in-flight work on shutdown
//!
//! Each message is handled by the [`Dispatcher`] state machine.

pub mod commands;
pub mod content;
pub mod dispatcher;
pub mod shutdown;
mod worker;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parley_config::model::ContextConfig;
use parley_core::{ChannelAdapter, ChatId, InboundMessage, ParleyError};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

pub use content::{ContentResolver, GroupTrigger};
pub use dispatcher::{
    AbortReason, CommandOutcome, DispatchOutcome, DispatchState, Dispatcher, DispatcherSettings,
    Replies,
};

use crate::worker::WorkerHandle;

/// How long shutdown waits for in-flight messages.
const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Receives inbound messages and fans them out to per-chat workers.
pub struct AgentLoop {
    channel: Arc<dyn ChannelAdapter>,
    dispatcher: Arc<Dispatcher>,
    workers: HashMap<ChatId, WorkerHandle>,
    tracker: TaskTracker,
    idle_timeout: Duration,
    purge_interval: Duration,
    drain_timeout: Duration,
}

impl AgentLoop {
    /// Workers idle for the context timeout are retired; stale contexts are
    /// purged every `purge_interval_secs`.
    pub fn new(
        channel: Arc<dyn ChannelAdapter>,
        dispatcher: Arc<Dispatcher>,
        config: &ContextConfig,
    ) -> Self {
        Self {
            channel,
            dispatcher,
            workers: HashMap::new(),
            tracker: TaskTracker::new(),
            idle_timeout: Duration::from_secs(config.timeout_secs),
            purge_interval: Duration::from_secs(config.purge_interval_secs.max(1)),
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }

    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Number of chats that currently have a worker.
    pub fn active_workers(&self) -> usize {
        self.workers.len()
    }

    /// Runs until `cancel` fires or the channel closes, then drains workers.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<(), ParleyError> {
        info!("agent loop running");

        let mut purge = tokio::time::interval(self.purge_interval);
        purge.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let channel = Arc::clone(&self.channel);

        loop {
            tokio::select! {
                msg = channel.receive() => {
                    match msg {
                        Ok(inbound) => self.route(inbound),
                        Err(e) => {
                            error!(error = %e, "channel receive error");
                            if e.to_string().contains("closed") {
                                break;
                            }
                        }
                    }
                }
                _ = purge.tick() => self.sweep(),
                _ = cancel.cancelled() => {
                    info!("shutdown signal received, stopping agent loop");
                    break;
                }
            }
        }

        // Dropping the senders lets each worker finish its queue and exit.
        self.workers.clear();
        shutdown::drain_workers(&self.tracker, self.drain_timeout).await;

        info!("agent loop stopped");
        Ok(())
    }

    fn route(&mut self, msg: InboundMessage) {
        let chat_id = msg.chat_id;
        let msg = match self.workers.get_mut(&chat_id) {
            Some(worker) => match worker.route(msg) {
                Ok(()) => return,
                Err(msg) => {
                    debug!(chat_id = %chat_id, "chat worker gone, restarting");
                    msg
                }
            },
            None => msg,
        };

        let mut worker = WorkerHandle::start(chat_id, Arc::clone(&self.dispatcher), &self.tracker);
        if worker.route(msg).is_err() {
            warn!(chat_id = %chat_id, "new chat worker rejected message");
            return;
        }
        self.workers.insert(chat_id, worker);
    }

    fn sweep(&mut self) {
        self.dispatcher.contexts().purge_stale();

        let before = self.workers.len();
        let idle_timeout = self.idle_timeout;
        self.workers.retain(|_, worker| !worker.is_idle(idle_timeout));
        let retired = before - self.workers.len();
        if retired > 0 {
            debug!(retired, active = self.workers.len(), "retired idle chat workers");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_context::{ContextSettings, ContextStore, ManualClock};
    use parley_core::{ChatKind, ImageDetail, Role, Sender};
    use parley_test_utils::{MockChannel, MockProvider, MockRegistry};

    fn build(
        channel: Arc<MockChannel>,
        provider: Arc<MockProvider>,
        chats: &[i64],
    ) -> Arc<Dispatcher> {
        let contexts = Arc::new(ContextStore::new(
            ContextSettings {
                capacity: 10,
                timeout: Duration::from_secs(600),
                base_policy: "Policy.".into(),
                bot_name: None,
            },
            Arc::new(ManualClock::default()),
        ));
        let resolver = ContentResolver::new(
            channel.clone(),
            GroupTrigger::new("!ai").unwrap(),
            ImageDetail::Auto,
        );
        let settings = DispatcherSettings::from_config(&parley_config::ParleyConfig::default());
        Arc::new(Dispatcher::new(
            channel,
            provider,
            Arc::new(MockRegistry::with_chats(chats)),
            contexts,
            resolver,
            settings,
        ))
    }

    fn private(chat_id: i64, id: &str, text: &str) -> InboundMessage {
        InboundMessage {
            id: id.into(),
            chat_id: ChatId(chat_id),
            chat_kind: ChatKind::Private,
            chat_title: None,
            sender: Sender::default(),
            text: Some(text.into()),
            caption: None,
            photos: Vec::new(),
            sticker: None,
            reply_to: None,
            timestamp: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn messages_of_one_chat_are_processed_in_order() {
        let channel = Arc::new(MockChannel::new());
        let provider = Arc::new(MockProvider::new().with_delay(Duration::from_millis(20)));
        provider.push_text("A1").await;
        provider.push_text("A2").await;
        let dispatcher = build(channel.clone(), provider.clone(), &[1]);

        channel.inject_message(private(1, "m1", "U1")).await;
        channel.inject_message(private(1, "m2", "U2")).await;

        let mut agent = AgentLoop::new(channel.clone(), dispatcher, &ContextConfig::default());
        let cancel = CancellationToken::new();
        let handle = {
            let cancel = cancel.clone();
            tokio::spawn(async move { agent.run(cancel).await })
        };

        assert!(channel.wait_for_sent(2, Duration::from_secs(5)).await);
        cancel.cancel();
        handle.await.unwrap().unwrap();

        let requests = provider.requests().await;
        assert_eq!(requests.len(), 2);
        let second: Vec<(Role, String)> = requests[1]
            .turns
            .iter()
            .skip(1)
            .map(|t| (t.role, t.text()))
            .collect();
        assert_eq!(
            second,
            vec![
                (Role::User, "U1".to_string()),
                (Role::Assistant, "A1".to_string()),
                (Role::User, "U2".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn different_chats_are_served_concurrently() {
        let channel = Arc::new(MockChannel::new());
        let provider = Arc::new(MockProvider::new().with_delay(Duration::from_millis(200)));
        let dispatcher = build(channel.clone(), provider.clone(), &[1, 2, 3]);

        for chat in 1..=3 {
            channel.inject_message(private(chat, "m", "hello")).await;
        }

        let mut agent = AgentLoop::new(channel.clone(), dispatcher, &ContextConfig::default());
        let cancel = CancellationToken::new();
        let started = std::time::Instant::now();
        let handle = {
            let cancel = cancel.clone();
            tokio::spawn(async move { agent.run(cancel).await })
        };

        assert!(channel.wait_for_sent(3, Duration::from_secs(5)).await);
        assert!(started.elapsed() < Duration::from_millis(550));
        cancel.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn loop_stops_when_channel_closes() {
        let channel = Arc::new(MockChannel::new());
        let provider = Arc::new(MockProvider::new());
        let dispatcher = build(channel.clone(), provider, &[]);
        channel.close().await;

        let mut agent = AgentLoop::new(channel, dispatcher, &ContextConfig::default())
            .with_drain_timeout(Duration::from_millis(50));
        agent.run(CancellationToken::new()).await.unwrap();
        assert_eq!(agent.active_workers(), 0);
    }

    #[tokio::test]
    async fn idle_workers_are_retired_and_recreated() {
        let channel = Arc::new(MockChannel::new());
        let provider = Arc::new(MockProvider::new());
        let dispatcher = build(channel.clone(), provider, &[1]);
        let config = ContextConfig {
            timeout_secs: 0,
            ..ContextConfig::default()
        };
        let mut agent = AgentLoop::new(channel.clone(), dispatcher, &config);

        agent.route(private(1, "m1", "hi"));
        assert_eq!(agent.active_workers(), 1);
        assert!(channel.wait_for_sent(1, Duration::from_secs(5)).await);
        // Let the worker settle its pending counter after delivery.
        tokio::time::sleep(Duration::from_millis(20)).await;

        agent.sweep();
        assert_eq!(agent.active_workers(), 0);

        agent.route(private(1, "m2", "again"));
        assert_eq!(agent.active_workers(), 1);
        assert!(channel.wait_for_sent(2, Duration::from_secs(5)).await);
    }
}
