// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory authorization registry for tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use parley_core::{
    AdapterType, AuthRegistry, AuthorizationRecord, ChatId, HealthStatus, ParleyError,
    PluginAdapter,
};

/// A registry held in memory. `set_failing(true)` makes every operation
/// return a storage error, emulating an unreadable database.
#[derive(Default)]
pub struct MockRegistry {
    chats: Mutex<BTreeMap<ChatId, String>>,
    failing: AtomicBool,
}

impl MockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with `chats` already authorized.
    pub fn with_chats(chats: &[i64]) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            chats: Mutex::new(chats.iter().map(|&id| (ChatId(id), now.clone())).collect()),
            failing: AtomicBool::new(false),
        }
    }

    /// A registry whose every operation fails.
    pub fn failing() -> Self {
        let registry = Self::default();
        registry.set_failing(true);
        registry
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), ParleyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ParleyError::storage(std::io::Error::other("disk I/O error")));
        }
        Ok(())
    }
}

#[async_trait]
impl PluginAdapter for MockRegistry {
    fn name(&self) -> &str {
        "mock-registry"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Registry
    }

    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Ok(HealthStatus::Unhealthy("registry failing".into()));
        }
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ParleyError> {
        Ok(())
    }
}

#[async_trait]
impl AuthRegistry for MockRegistry {
    async fn initialize(&self) -> Result<(), ParleyError> {
        self.check()
    }

    async fn is_authorized(&self, chat_id: ChatId) -> Result<bool, ParleyError> {
        self.check()?;
        Ok(self.chats.lock().await.contains_key(&chat_id))
    }

    async fn authorize(&self, chat_id: ChatId) -> Result<(), ParleyError> {
        self.check()?;
        self.chats
            .lock()
            .await
            .insert(chat_id, chrono::Utc::now().to_rfc3339());
        Ok(())
    }

    async fn deauthorize(&self, chat_id: ChatId) -> Result<(), ParleyError> {
        self.check()?;
        self.chats.lock().await.remove(&chat_id);
        Ok(())
    }

    async fn list_authorized(&self) -> Result<Vec<AuthorizationRecord>, ParleyError> {
        self.check()?;
        Ok(self
            .chats
            .lock()
            .await
            .iter()
            .map(|(chat_id, at)| AuthorizationRecord {
                chat_id: *chat_id,
                authorized_at: at.clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn authorize_and_revoke() {
        let registry = MockRegistry::with_chats(&[2]);
        registry.authorize(ChatId(1)).await.unwrap();
        let ids: Vec<ChatId> = registry
            .list_authorized()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.chat_id)
            .collect();
        assert_eq!(ids, vec![ChatId(1), ChatId(2)]);

        registry.deauthorize(ChatId(2)).await.unwrap();
        assert!(!registry.is_authorized(ChatId(2)).await.unwrap());
    }

    #[tokio::test]
    async fn failing_registry_reports_storage_errors() {
        let registry = MockRegistry::failing();
        assert!(matches!(
            registry.is_authorized(ChatId(1)).await.unwrap_err(),
            ParleyError::Storage { .. }
        ));
        registry.set_failing(false);
        assert!(!registry.is_authorized(ChatId(1)).await.unwrap());
    }
}
