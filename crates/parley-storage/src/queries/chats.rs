// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queries over the `chats` authorization table.

use parley_core::{AuthorizationRecord, ChatId, ParleyError};
use rusqlite::params;

use crate::database::{Database, map_tr_err};

/// Inserts or refreshes the authorization record for a chat.
pub async fn upsert_chat(
    db: &Database,
    chat_id: ChatId,
    authorized_at: String,
) -> Result<(), ParleyError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO chats (chat_id, authorized_at) VALUES (?1, ?2)
                 ON CONFLICT(chat_id) DO UPDATE SET authorized_at = excluded.authorized_at",
                params![chat_id.0, authorized_at],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Deletes the record for a chat. Returns whether a row was removed.
pub async fn delete_chat(db: &Database, chat_id: ChatId) -> Result<bool, ParleyError> {
    db.connection()
        .call(move |conn| {
            let removed = conn.execute("DELETE FROM chats WHERE chat_id = ?1", params![chat_id.0])?;
            Ok(removed > 0)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn chat_exists(db: &Database, chat_id: ChatId) -> Result<bool, ParleyError> {
    db.connection()
        .call(move |conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM chats WHERE chat_id = ?1)",
                params![chat_id.0],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
        .await
        .map_err(map_tr_err)
}

/// Lists every authorized chat ordered by chat id.
pub async fn list_chats(db: &Database) -> Result<Vec<AuthorizationRecord>, ParleyError> {
    db.connection()
        .call(|conn| {
            let mut stmt =
                conn.prepare("SELECT chat_id, authorized_at FROM chats ORDER BY chat_id")?;
            let rows = stmt.query_map([], |row| {
                Ok(AuthorizationRecord {
                    chat_id: ChatId(row.get(0)?),
                    authorized_at: row.get(1)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}
