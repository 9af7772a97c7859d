// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel adapter trait for chat transports (Telegram, test doubles).

use async_trait::async_trait;

use crate::error::ParleyError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ChatId, InboundMessage, MediaRef, MessageId, OutboundMessage};

/// Adapter for a bidirectional chat transport.
///
/// The transport delivers inbound messages, accepts outbound text, and
/// resolves media references into bytes on demand.
#[async_trait]
pub trait ChannelAdapter: PluginAdapter {
    /// Establishes a connection to the messaging platform.
    async fn connect(&mut self) -> Result<(), ParleyError>;

    /// Receives the next inbound message from the channel.
    async fn receive(&self) -> Result<InboundMessage, ParleyError>;

    /// Sends a message through the channel.
    ///
    /// Implementations that support rich formatting must fall back to plain
    /// text when the formatted send is rejected, instead of failing.
    async fn send(&self, msg: OutboundMessage) -> Result<MessageId, ParleyError>;

    /// Shows a typing indicator in the chat. Default: no-op.
    async fn send_typing(&self, _chat_id: ChatId) -> Result<(), ParleyError> {
        Ok(())
    }

    /// Downloads the bytes behind a media reference.
    async fn fetch_media(&self, media: &MediaRef) -> Result<Vec<u8>, ParleyError>;
}
