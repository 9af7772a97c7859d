// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authorization registry trait: the durable set of chats allowed to talk to the bot.

use async_trait::async_trait;

use crate::error::ParleyError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{AuthorizationRecord, ChatId};

/// Durable registry of authorized chats.
///
/// Every conversation-affecting operation is gated on [`is_authorized`].
/// Storage failures are returned as errors and must never be read as "authorized".
///
/// [`is_authorized`]: AuthRegistry::is_authorized
#[async_trait]
pub trait AuthRegistry: PluginAdapter {
    /// Prepares the backing store (directories, schema migrations).
    async fn initialize(&self) -> Result<(), ParleyError>;

    /// Returns true iff a record exists for `chat_id`.
    async fn is_authorized(&self, chat_id: ChatId) -> Result<bool, ParleyError>;

    /// Inserts a record for `chat_id`, refreshing `authorized_at` if it already exists.
    async fn authorize(&self, chat_id: ChatId) -> Result<(), ParleyError>;

    /// Removes the record for `chat_id`. Missing records are not an error.
    async fn deauthorize(&self, chat_id: ChatId) -> Result<(), ParleyError>;

    /// Returns a snapshot of all records.
    async fn list_authorized(&self) -> Result<Vec<AuthorizationRecord>, ParleyError>;
}
