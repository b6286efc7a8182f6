//! Live views over cached secrets.
//!
//! A [`SecretView`] is a long-lived handle over one cache entry. Every access
//! checks whether the entry is due for a refresh and performs it in the
//! caller's task; a failed refresh is logged and the previous value keeps
//! being served. Consumers poll [`SyncedSecret::version`] to notice content
//! changes without comparing values.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

use crate::errors::Result;
use crate::secrets::cache::SecretEntry;
use crate::secrets::store::SecretStore;
use crate::secrets::types::{SecretContents, SecretKey};
use crate::validation::validate_key_name;

/// Capability set shared by raw secret views and derived certificate views.
#[async_trait]
pub trait SyncedSecret: Send + Sync {
    /// Are the underlying contents older than the TTL? Stale contents are
    /// still served; this is a freshness signal, not an error.
    fn is_stale(&self) -> bool;

    /// Have contents ever been loaded?
    fn is_valid(&self) -> bool;

    /// Change marker: consumers rebuild derived artifacts when it moves.
    async fn version(&self) -> u32;
}

/// A live handle over one cached secret.
#[derive(Debug)]
pub struct SecretView {
    store: Arc<SecretStore>,
    key: SecretKey,
    entry: Arc<SecretEntry>,
}

impl SecretView {
    pub(crate) fn new(store: Arc<SecretStore>, key: SecretKey, entry: Arc<SecretEntry>) -> Self {
        Self { store, key, entry }
    }

    pub fn key(&self) -> &SecretKey {
        &self.key
    }

    /// Refresh in the caller's task when due. Failures keep the old value.
    async fn check_up_to_date(&self) {
        if !self.entry.needs_refresh(Instant::now(), self.store.ttl()) {
            return;
        }
        match self
            .store
            .secret_entry(
                &self.key.category,
                &self.key.name,
                self.key.vault_id.as_deref(),
                self.key.version.as_deref(),
            )
            .await
        {
            Ok(entry) => {
                // Entries are stable identities, so the refreshed entry is
                // the one this view already holds.
                debug_assert!(Arc::ptr_eq(&entry, &self.entry));
            }
            Err(e) => {
                warn!(secret = %self.key, error = %e, "failed to update secret");
            }
        }
    }

    /// A snapshot of the current contents.
    pub async fn tree(&self) -> Option<Arc<SecretContents>> {
        self.check_up_to_date().await;
        self.entry.contents()
    }

    /// Value bytes for one key of the secret.
    pub async fn value(&self, key: &str) -> Result<Option<Vec<u8>>> {
        validate_key_name(key)?;
        self.check_up_to_date().await;
        Ok(self.entry.contents().and_then(|contents| contents.get(key).map(<[u8]>::to_vec)))
    }

    /// Value for one key of the secret, decoded as UTF-8 text.
    pub async fn value_str(&self, key: &str) -> Result<Option<String>> {
        validate_key_name(key)?;
        self.check_up_to_date().await;
        Ok(self
            .entry
            .contents()
            .and_then(|contents| contents.get_str(key).map(str::to_string)))
    }
}

#[async_trait]
impl SyncedSecret for SecretView {
    fn is_stale(&self) -> bool {
        self.entry.is_stale(Instant::now(), self.store.ttl())
    }

    fn is_valid(&self) -> bool {
        self.entry.has_contents()
    }

    async fn version(&self) -> u32 {
        self.check_up_to_date().await;
        self.entry.content_hash()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;

    async fn write_key(mount: &Path, category: &str, name: &str, key: &str, value: &[u8]) {
        let dir = mount.join(category).join(name);
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join(key), value).await.unwrap();
    }

    async fn store_with_mount(mount: &Path) -> Arc<SecretStore> {
        let store = SecretStore::new();
        store.set_mount(Some(mount));
        store
    }

    #[tokio::test]
    async fn test_view_reads_local_secret() {
        let mount = TempDir::new().unwrap();
        write_key(mount.path(), "appA", "db", "password", b"hunter2").await;
        let store = store_with_mount(mount.path()).await;

        let view = store.resolve_secret("appA", "db", None, None).await.unwrap();
        assert!(view.is_valid());
        assert!(!view.is_stale());
        assert_eq!(view.value("password").await.unwrap(), Some(b"hunter2".to_vec()));
        assert_eq!(view.value_str("password").await.unwrap(), Some("hunter2".to_string()));
        assert_eq!(view.value("missing").await.unwrap(), None);
        assert_ne!(view.version().await, 0);
    }

    #[tokio::test]
    async fn test_view_over_missing_secret_is_invalid_not_error() {
        let mount = TempDir::new().unwrap();
        let store = store_with_mount(mount.path()).await;

        let view = store.resolve_secret("appA", "absent", None, None).await.unwrap();
        assert!(!view.is_valid());
        assert!(view.tree().await.is_none());
        assert_eq!(view.value("k").await.unwrap(), None);
        assert_eq!(view.version().await, 0);
    }

    #[tokio::test]
    async fn test_view_rejects_invalid_key_names() {
        let mount = TempDir::new().unwrap();
        write_key(mount.path(), "appA", "db", "password", b"x").await;
        let store = store_with_mount(mount.path()).await;

        let view = store.resolve_secret("appA", "db", None, None).await.unwrap();
        assert!(view.value("../escape").await.is_err());
        assert!(view.value_str("").await.is_err());
    }

    #[tokio::test]
    async fn test_view_version_follows_contents() {
        let mount = TempDir::new().unwrap();
        write_key(mount.path(), "appA", "db", "password", b"v1").await;
        let store = store_with_mount(mount.path()).await;
        store.set_ttl(Duration::from_millis(20));

        let view = store.resolve_secret("appA", "db", None, None).await.unwrap();
        let first = view.version().await;
        assert_eq!(view.value_str("password").await.unwrap(), Some("v1".to_string()));

        write_key(mount.path(), "appA", "db", "password", b"v2").await;
        tokio::time::sleep(Duration::from_millis(40)).await;

        let second = view.version().await;
        assert_ne!(first, second);
        assert_eq!(view.value_str("password").await.unwrap(), Some("v2".to_string()));
    }

    #[tokio::test]
    async fn test_view_serves_cached_value_within_ttl() {
        let mount = TempDir::new().unwrap();
        write_key(mount.path(), "appA", "db", "password", b"v1").await;
        let store = store_with_mount(mount.path()).await;

        let view = store.resolve_secret("appA", "db", None, None).await.unwrap();
        assert_eq!(view.value_str("password").await.unwrap(), Some("v1".to_string()));

        // The file changes, but the default TTL keeps the cached value.
        write_key(mount.path(), "appA", "db", "password", b"v2").await;
        assert_eq!(view.value_str("password").await.unwrap(), Some("v1".to_string()));
    }

    #[tokio::test]
    async fn test_views_share_one_entry() {
        let mount = TempDir::new().unwrap();
        write_key(mount.path(), "appA", "db", "password", b"v1").await;
        let store = store_with_mount(mount.path()).await;

        let a = store.resolve_secret("appA", "db", None, None).await.unwrap();
        let b = store.resolve_secret("appA", "db", None, None).await.unwrap();
        assert!(Arc::ptr_eq(&a.entry, &b.entry));
    }
}
