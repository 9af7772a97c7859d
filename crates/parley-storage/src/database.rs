// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scoped SQLite handle.
//!
//! A [`Database`] lives for one logical registry operation: it is opened,
//! used through tokio-rusqlite's background thread, then closed.

use std::path::Path;

use parley_core::ParleyError;
use tracing::debug;

/// Convert a tokio-rusqlite error into `ParleyError::Storage`.
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> ParleyError {
    ParleyError::storage(e)
}

/// An open connection to the registry database.
///
/// Clones share the same background connection.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Opens the database file, creating it if needed.
    ///
    /// Does not run migrations; see [`Database::migrate`].
    pub async fn open(path: &str) -> Result<Self, ParleyError> {
        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(ParleyError::storage)?;
        conn.call(|conn| -> Result<(), rusqlite::Error> {
            conn.execute_batch("PRAGMA busy_timeout = 5000;")?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;
        debug!(path, "database opened");
        Ok(Self { conn })
    }

    /// Creates the parent directory of `path` when it does not exist yet.
    pub async fn ensure_parent_dir(path: &str) -> Result<(), ParleyError> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(ParleyError::storage)?;
        }
        Ok(())
    }

    /// Applies pending schema migrations.
    pub async fn migrate(&self) -> Result<(), ParleyError> {
        self.conn
            .call(|conn| crate::migrations::run_migrations(conn))
            .await
            .map_err(ParleyError::storage)
    }

    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Closes the connection, waiting for the background thread to finish.
    pub async fn close(self) -> Result<(), ParleyError> {
        self.conn.close().await.map_err(ParleyError::storage)
    }
}
