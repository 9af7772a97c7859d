// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the AuthRegistry trait.

use async_trait::async_trait;
use tracing::{debug, info};

use parley_config::model::StorageConfig;
use parley_core::{
    AdapterType, AuthRegistry, AuthorizationRecord, ChatId, HealthStatus, ParleyError,
    PluginAdapter,
};

use crate::database::{Database, map_tr_err};
use crate::queries;

/// SQLite-backed authorization registry.
///
/// Holds only the database path. Each operation opens its own [`Database`]
/// and closes it before returning, so no handle outlives a call.
pub struct SqliteAuthRegistry {
    path: String,
}

impl SqliteAuthRegistry {
    pub fn new(config: &StorageConfig) -> Self {
        Self::from_path(config.database_path.clone())
    }

    pub fn from_path(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Opens the database, runs `op`, and closes the handle whatever the outcome.
    async fn scoped<T, F, Fut>(&self, op: F) -> Result<T, ParleyError>
    where
        F: FnOnce(Database) -> Fut,
        Fut: std::future::Future<Output = Result<T, ParleyError>>,
    {
        let db = Database::open(&self.path).await?;
        let result = op(db.clone()).await;
        let closed = db.close().await;
        let value = result?;
        closed?;
        Ok(value)
    }
}

fn now_timestamp() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

#[async_trait]
impl PluginAdapter for SqliteAuthRegistry {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Registry
    }

    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        self.scoped(|db| async move {
            db.connection()
                .call(|conn| -> Result<(), rusqlite::Error> {
                    conn.execute_batch("SELECT 1;")?;
                    Ok(())
                })
                .await
                .map_err(map_tr_err)
        })
        .await?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ParleyError> {
        // No handle is held between operations.
        Ok(())
    }
}

#[async_trait]
impl AuthRegistry for SqliteAuthRegistry {
    async fn initialize(&self) -> Result<(), ParleyError> {
        Database::ensure_parent_dir(&self.path).await?;
        self.scoped(|db| async move { db.migrate().await }).await?;
        info!(path = %self.path, "authorization registry initialized");
        Ok(())
    }

    async fn is_authorized(&self, chat_id: ChatId) -> Result<bool, ParleyError> {
        self.scoped(|db| async move { queries::chats::chat_exists(&db, chat_id).await })
            .await
    }

    async fn authorize(&self, chat_id: ChatId) -> Result<(), ParleyError> {
        let authorized_at = now_timestamp();
        self.scoped(|db| async move {
            queries::chats::upsert_chat(&db, chat_id, authorized_at).await
        })
        .await?;
        info!(chat_id = %chat_id, "chat authorized");
        Ok(())
    }

    async fn deauthorize(&self, chat_id: ChatId) -> Result<(), ParleyError> {
        let removed = self
            .scoped(|db| async move { queries::chats::delete_chat(&db, chat_id).await })
            .await?;
        if removed {
            info!(chat_id = %chat_id, "chat deauthorized");
        } else {
            debug!(chat_id = %chat_id, "deauthorize: chat was not authorized");
        }
        Ok(())
    }

    async fn list_authorized(&self) -> Result<Vec<AuthorizationRecord>, ParleyError> {
        self.scoped(|db| async move { queries::chats::list_chats(&db).await })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn registry_in(dir: &tempfile::TempDir) -> SqliteAuthRegistry {
        let path = dir.path().join("auth.db");
        let registry = SqliteAuthRegistry::from_path(path.to_str().unwrap());
        registry.initialize().await.unwrap();
        registry
    }

    #[tokio::test]
    async fn identity_is_registry() {
        let registry = SqliteAuthRegistry::from_path("unused.db");
        assert_eq!(registry.name(), "sqlite");
        assert_eq!(registry.adapter_type(), AdapterType::Registry);
    }

    #[tokio::test]
    async fn authorization_lifecycle() {
        let dir = tempdir().unwrap();
        let registry = registry_in(&dir).await;
        let chat = ChatId(42);

        assert!(!registry.is_authorized(chat).await.unwrap());
        registry.authorize(chat).await.unwrap();
        assert!(registry.is_authorized(chat).await.unwrap());
        registry.deauthorize(chat).await.unwrap();
        assert!(!registry.is_authorized(chat).await.unwrap());
    }

    #[tokio::test]
    async fn authorize_is_idempotent_and_refreshes_timestamp() {
        let dir = tempdir().unwrap();
        let registry = registry_in(&dir).await;

        registry.authorize(ChatId(7)).await.unwrap();
        let first = registry.list_authorized().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        registry.authorize(ChatId(7)).await.unwrap();
        let second = registry.list_authorized().await.unwrap();

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert!(second[0].authorized_at > first[0].authorized_at);
    }

    #[tokio::test]
    async fn deauthorize_missing_chat_is_ok() {
        let dir = tempdir().unwrap();
        let registry = registry_in(&dir).await;
        registry.deauthorize(ChatId(-100)).await.unwrap();
    }

    #[tokio::test]
    async fn list_is_ordered_by_chat_id() {
        let dir = tempdir().unwrap();
        let registry = registry_in(&dir).await;
        for id in [5, -3, 12] {
            registry.authorize(ChatId(id)).await.unwrap();
        }
        let ids: Vec<i64> = registry
            .list_authorized()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.chat_id.0)
            .collect();
        assert_eq!(ids, vec![-3, 5, 12]);
    }

    #[tokio::test]
    async fn grants_survive_a_new_registry_instance() {
        let dir = tempdir().unwrap();
        let registry = registry_in(&dir).await;
        registry.authorize(ChatId(1)).await.unwrap();
        drop(registry);

        let reopened = registry_in(&dir).await;
        assert!(reopened.is_authorized(ChatId(1)).await.unwrap());
    }

    #[tokio::test]
    async fn initialize_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/deeper/auth.db");
        let registry = SqliteAuthRegistry::from_path(path.to_str().unwrap());
        registry.initialize().await.unwrap();
        assert!(path.exists());
        assert_eq!(
            registry.health_check().await.unwrap(),
            HealthStatus::Healthy
        );
    }

    #[tokio::test]
    async fn missing_schema_fails_closed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("uninitialized.db");
        let registry = SqliteAuthRegistry::from_path(path.to_str().unwrap());

        let err = registry.is_authorized(ChatId(1)).await.unwrap_err();
        assert!(matches!(err, ParleyError::Storage { .. }));
    }

    #[tokio::test]
    async fn unreachable_path_is_storage_error() {
        let dir = tempdir().unwrap();
        // A directory cannot be opened as a database file.
        let registry = SqliteAuthRegistry::from_path(dir.path().to_str().unwrap());
        let err = registry.is_authorized(ChatId(1)).await.unwrap_err();
        assert!(matches!(err, ParleyError::Storage { .. }));
    }
}
