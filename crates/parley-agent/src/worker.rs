// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-chat workers: one queue and one task per active chat.
//!
//! A chat's messages are dispatched one at a time in receipt order. Workers
//! of different chats run concurrently.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parley_core::{ChatId, InboundMessage};
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;
use tracing::{debug, error};

use crate::dispatcher::{DispatchOutcome, Dispatcher};

/// The loop's handle on a running chat worker.
pub(crate) struct WorkerHandle {
    tx: mpsc::UnboundedSender<InboundMessage>,
    /// Messages routed but not yet fully dispatched.
    pending: Arc<AtomicUsize>,
    last_routed: Instant,
}

impl WorkerHandle {
    /// Spawns the worker task on `tracker` and returns its handle.
    pub(crate) fn start(chat_id: ChatId, dispatcher: Arc<Dispatcher>, tracker: &TaskTracker) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));
        tracker.spawn(run(chat_id, rx, dispatcher, Arc::clone(&pending)));
        debug!(chat_id = %chat_id, "chat worker started");
        Self {
            tx,
            pending,
            last_routed: Instant::now(),
        }
    }

    /// Queues a message. Gives the message back if the worker is gone.
    pub(crate) fn route(&mut self, msg: InboundMessage) -> Result<(), InboundMessage> {
        self.pending.fetch_add(1, Ordering::SeqCst);
        match self.tx.send(msg) {
            Ok(()) => {
                self.last_routed = Instant::now();
                Ok(())
            }
            Err(mpsc::error::SendError(msg)) => {
                self.pending.fetch_sub(1, Ordering::SeqCst);
                Err(msg)
            }
        }
    }

    /// True when the worker has nothing queued or running and has seen no
    /// message for at least `idle_timeout`. Dropping an idle handle ends the
    /// worker without losing messages.
    pub(crate) fn is_idle(&self, idle_timeout: Duration) -> bool {
        self.pending.load(Ordering::SeqCst) == 0 && self.last_routed.elapsed() >= idle_timeout
    }
}

async fn run(
    chat_id: ChatId,
    mut rx: mpsc::UnboundedReceiver<InboundMessage>,
    dispatcher: Arc<Dispatcher>,
    pending: Arc<AtomicUsize>,
) {
    while let Some(msg) = rx.recv().await {
        let message_id = msg.id.clone();
        match dispatcher.dispatch(msg).await {
            Ok(DispatchOutcome::Aborted { at, reason }) => debug!(
                chat_id = %chat_id,
                message_id = message_id.as_str(),
                %at,
                ?reason,
                "message aborted"
            ),
            Ok(outcome) => debug!(
                chat_id = %chat_id,
                message_id = message_id.as_str(),
                ?outcome,
                "message handled"
            ),
            Err(e) => error!(
                chat_id = %chat_id,
                message_id = message_id.as_str(),
                error = %e,
                "failed to dispatch message"
            ),
        }
        pending.fetch_sub(1, Ordering::SeqCst);
    }
    debug!(chat_id = %chat_id, "chat worker stopped");
}
