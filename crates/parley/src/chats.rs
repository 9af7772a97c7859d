// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `parley chats` command implementations.

use parley_config::ParleyConfig;
use parley_core::{AuthRegistry, ChatId, ParleyError};
use parley_storage::SqliteAuthRegistry;

async fn open_registry(config: &ParleyConfig) -> Result<SqliteAuthRegistry, ParleyError> {
    let registry = SqliteAuthRegistry::new(&config.storage);
    registry.initialize().await?;
    Ok(registry)
}

/// Prints every authorized chat with the time it was authorized.
pub async fn list(config: &ParleyConfig) -> Result<(), ParleyError> {
    let registry = open_registry(config).await?;
    let chats = registry.list_authorized().await?;
    if chats.is_empty() {
        println!("no authorized chats");
        return Ok(());
    }
    for record in chats {
        println!("{:>16}  {}", record.chat_id.0, record.authorized_at);
    }
    Ok(())
}

pub async fn add(config: &ParleyConfig, chat_id: i64) -> Result<(), ParleyError> {
    open_registry(config).await?.authorize(ChatId(chat_id)).await?;
    println!("authorized chat {chat_id}");
    Ok(())
}

pub async fn remove(config: &ParleyConfig, chat_id: i64) -> Result<(), ParleyError> {
    open_registry(config).await?.deauthorize(ChatId(chat_id)).await?;
    println!("revoked chat {chat_id}");
    Ok(())
}
