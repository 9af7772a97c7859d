// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory [`ChannelAdapter`] that records everything the dispatcher sends.
//!
//! `MockChannel` implements `ChannelAdapter` with injectable inbound messages,
//! captured outbound messages, a typing log and an in-memory media store.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use parley_core::types::MediaRef;
use parley_core::{
    AdapterType, ChannelAdapter, ChatId, HealthStatus, InboundMessage, MessageId,
    OutboundMessage, ParleyError, PluginAdapter,
};

/// A scripted stand-in for the Telegram transport.
///
/// Provides two queues:
/// - **inbound**: `inject_message()` queues what `receive()` hands out, in order
/// - **sent**: every `send()` is logged for `sent_messages()`
pub struct MockChannel {
    inbound: Arc<Mutex<VecDeque<InboundMessage>>>,
    sent: Arc<Mutex<Vec<OutboundMessage>>>,
    typing: Arc<Mutex<Vec<ChatId>>>,
    media: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    fetched: Arc<Mutex<Vec<String>>>,
    notify: Arc<Notify>,
    sent_notify: Arc<Notify>,
    closed: AtomicBool,
}

impl MockChannel {
    /// An open channel with nothing queued.
    pub fn new() -> Self {
        Self {
            inbound: Arc::new(Mutex::new(VecDeque::new())),
            sent: Arc::new(Mutex::new(Vec::new())),
            typing: Arc::new(Mutex::new(Vec::new())),
            media: Arc::new(Mutex::new(HashMap::new())),
            fetched: Arc::new(Mutex::new(Vec::new())),
            notify: Arc::new(Notify::new()),
            sent_notify: Arc::new(Notify::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Queues `msg` for the next `receive()`.
    pub async fn inject_message(&self, msg: InboundMessage) {
        self.inbound.lock().await.push_back(msg);
        self.notify.notify_one();
    }

    /// Makes `receive()` fail with a "channel closed" error once the queue is drained.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    /// Snapshot of the sent log.
    pub async fn sent_messages(&self) -> Vec<OutboundMessage> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    /// Empties the sent log.
    pub async fn clear_sent(&self) {
        self.sent.lock().await.clear();
    }

    /// Waits until at least `count` messages were sent. Returns `false` on timeout.
    pub async fn wait_for_sent(&self, count: usize, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, async {
            while self.sent_count().await < count {
                self.sent_notify.notified().await;
            }
        })
        .await
        .is_ok()
    }

    /// Chats that received a typing indicator, in order.
    pub async fn typing(&self) -> Vec<ChatId> {
        self.typing.lock().await.clone()
    }

    /// Registers bytes served by `fetch_media()` for `file_id`.
    pub async fn add_media(&self, file_id: impl Into<String>, bytes: Vec<u8>) {
        self.media.lock().await.insert(file_id.into(), bytes);
    }

    /// File ids successfully fetched so far.
    pub async fn fetched(&self) -> Vec<String> {
        self.fetched.lock().await.clone()
    }
}

impl Default for MockChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockChannel {
    fn name(&self) -> &str {
        "mock-channel"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ParleyError> {
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for MockChannel {
    async fn connect(&mut self) -> Result<(), ParleyError> {
        Ok(())
    }

    async fn receive(&self) -> Result<InboundMessage, ParleyError> {
        loop {
            {
                let mut queue = self.inbound.lock().await;
                if let Some(msg) = queue.pop_front() {
                    return Ok(msg);
                }
            }
            if self.closed.load(Ordering::SeqCst) {
                return Err(ParleyError::Channel {
                    message: "mock channel closed".into(),
                    source: None,
                });
            }
            self.notify.notified().await;
        }
    }

    async fn send(&self, msg: OutboundMessage) -> Result<MessageId, ParleyError> {
        let id = format!("mock-msg-{}", uuid::Uuid::new_v4());
        self.sent.lock().await.push(msg);
        self.sent_notify.notify_one();
        Ok(MessageId(id))
    }

    async fn send_typing(&self, chat_id: ChatId) -> Result<(), ParleyError> {
        self.typing.lock().await.push(chat_id);
        Ok(())
    }

    async fn fetch_media(&self, media: &MediaRef) -> Result<Vec<u8>, ParleyError> {
        let bytes = self.media.lock().await.get(&media.file_id).cloned();
        match bytes {
            Some(bytes) => {
                self.fetched.lock().await.push(media.file_id.clone());
                Ok(bytes)
            }
            None => Err(ParleyError::Channel {
                message: format!("no media registered for `{}`", media.file_id),
                source: None,
            }),
        }
    }
}
