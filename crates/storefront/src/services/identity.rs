//! Identity resolution: phone-number login and session restore.
//!
//! There are no passwords. Logging in with a phone number either finds the
//! profile registered to it or creates one, and the resolved identity is
//! written to the session cache so the next process start can pick it up
//! without a remote call.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use community_mart_core::Phone;

use super::session_cache::{SessionCache, SessionCacheError};
use crate::db::ProfileRepository;
use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::models::Identity;
use crate::store::{BackendError, DataStore};

/// Session cache key holding the serialized identity.
pub const IDENTITY_KEY: &str = "identity";

/// Resolves phone numbers to identities and persists the result.
#[derive(Clone)]
pub struct IdentityResolver {
    store: Arc<dyn DataStore>,
    cache: Arc<dyn SessionCache>,
}

impl IdentityResolver {
    /// Create a resolver over a data store and a session cache.
    #[must_use]
    pub fn new(store: Arc<dyn DataStore>, cache: Arc<dyn SessionCache>) -> Self {
        Self { store, cache }
    }

    /// Log in as `phone`, creating the identity on first use and updating
    /// its display name if it changed.
    ///
    /// The identity is then written to the session cache; failing to write
    /// it is logged and does not fail the login.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidPhone` if the phone is not a mainland mobile
    /// number, `AppError::Validation` if the name is blank, or
    /// `AppError::Backend` if the data API call fails.
    #[instrument(skip(self, phone, display_name))]
    pub async fn resolve(&self, phone: &str, display_name: &str) -> Result<Identity> {
        let phone = Phone::parse(phone)?;
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(AppError::Validation("display name must not be blank".to_string()));
        }

        let identity = self.find_or_create(&phone, display_name).await?;

        if let Err(e) = self.persist(&identity).await {
            warn!(error = %e, "Failed to persist identity to session cache");
        }

        set_sentry_user(&identity.id, Some(&identity.full_name));
        info!(user_id = %identity.id, phone = %identity.phone.masked(), "Logged in");
        Ok(identity)
    }

    async fn find_or_create(&self, phone: &Phone, display_name: &str) -> Result<Identity> {
        let profiles = ProfileRepository::new(self.store.as_ref());

        if let Some(existing) = profiles.find_by_phone(phone).await? {
            if existing.full_name == display_name {
                return Ok(existing);
            }
            return Ok(profiles.update_name(existing.id, display_name).await?);
        }

        match profiles.create(phone, display_name).await {
            Ok(created) => Ok(created),
            // Another session registered the same phone between our lookup and insert
            Err(BackendError::Api { status: 409, .. }) => {
                let existing = profiles.find_by_phone(phone).await?.ok_or_else(|| {
                    AppError::Backend(BackendError::UnexpectedShape(
                        "profile conflict reported but no profile found".to_string(),
                    ))
                })?;
                if existing.full_name == display_name {
                    Ok(existing)
                } else {
                    Ok(profiles.update_name(existing.id, display_name).await?)
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn persist(&self, identity: &Identity) -> std::result::Result<(), SessionCacheError> {
        let value = serde_json::to_string(identity).map_err(|e| SessionCacheError::Corrupt {
            key: IDENTITY_KEY.to_string(),
            reason: e.to_string(),
        })?;
        self.cache.store(IDENTITY_KEY, &value).await
    }

    /// Restore the identity saved by the last login, without a remote call.
    ///
    /// An entry that does not decode is removed and treated as absent. An
    /// entry that cannot be read is treated as absent and left in place.
    #[instrument(skip(self))]
    pub async fn restore(&self) -> Option<Identity> {
        let parsed = match self.cache.load(IDENTITY_KEY).await {
            Ok(Some(raw)) => {
                serde_json::from_str::<Identity>(&raw).map_err(|e| SessionCacheError::Corrupt {
                    key: IDENTITY_KEY.to_string(),
                    reason: e.to_string(),
                })
            }
            Ok(None) => return None,
            Err(e @ SessionCacheError::Corrupt { .. }) => Err(e),
            Err(e) => {
                warn!(error = %e, "Failed to read session cache; starting logged out");
                return None;
            }
        };

        match parsed {
            Ok(identity) => {
                set_sentry_user(&identity.id, Some(&identity.full_name));
                info!(user_id = %identity.id, "Session restored");
                Some(identity)
            }
            Err(corrupt) => {
                warn!(error = %corrupt, "Discarding corrupt session entry");
                if let Err(e) = self.cache.remove(IDENTITY_KEY).await {
                    warn!(error = %e, "Failed to remove corrupt session entry");
                }
                None
            }
        }
    }

    /// Forget the saved identity. No remote call is made.
    #[instrument(skip(self))]
    pub async fn forget(&self) {
        if let Err(e) = self.cache.remove(IDENTITY_KEY).await {
            warn!(error = %e, "Failed to clear session cache");
        }
        clear_sentry_user();
        info!("Logged out");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use serde_json::Value;
    use uuid::Uuid;

    use super::*;
    use crate::services::session_cache::{FileSessionCache, MemorySessionCache};
    use crate::store::{MemoryStore, Operation, Query, tables};

    fn resolver(store: &Arc<MemoryStore>, cache: &Arc<MemorySessionCache>) -> IdentityResolver {
        IdentityResolver::new(store.clone(), cache.clone())
    }

    /// A cache whose every operation fails.
    struct BrokenCache;

    #[async_trait]
    impl SessionCache for BrokenCache {
        async fn load(&self, _: &str) -> std::result::Result<Option<String>, SessionCacheError> {
            Err(SessionCacheError::InvalidKey("broken".to_string()))
        }
        async fn store(&self, _: &str, _: &str) -> std::result::Result<(), SessionCacheError> {
            Err(SessionCacheError::InvalidKey("broken".to_string()))
        }
        async fn remove(&self, _: &str) -> std::result::Result<(), SessionCacheError> {
            Err(SessionCacheError::InvalidKey("broken".to_string()))
        }
    }

    #[tokio::test]
    async fn test_first_login_creates_then_renames() {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(MemorySessionCache::new());
        let resolver = resolver(&store, &cache);

        let alice = resolver.resolve("13800000000", "Alice").await.unwrap();
        assert_eq!(alice.full_name, "Alice");
        assert_eq!(store.rows(tables::PROFILES).len(), 1);

        let bob = resolver.resolve("13800000000", "Bob").await.unwrap();
        assert_eq!(bob.id, alice.id);
        assert_eq!(bob.phone, alice.phone);
        assert_eq!(bob.full_name, "Bob");
        assert_eq!(store.rows(tables::PROFILES).len(), 1);
    }

    #[tokio::test]
    async fn test_unchanged_login_makes_no_write() {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(MemorySessionCache::new());
        let resolver = resolver(&store, &cache);

        let first = resolver.resolve("13800000000", "Alice").await.unwrap();
        let before = store.request_count();
        let again = resolver.resolve("13800000000", "Alice").await.unwrap();

        assert_eq!(again, first);
        // lookup only
        assert_eq!(store.request_count(), before + 1);
    }

    #[tokio::test]
    async fn test_validation_happens_before_any_request() {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(MemorySessionCache::new());
        let resolver = resolver(&store, &cache);

        for phone in ["12800000000", "1380000000", "1380000000a", "", " 13800000000", "13800000000\n"] {
            let err = resolver.resolve(phone, "Alice").await.unwrap_err();
            assert!(matches!(err, AppError::InvalidPhone(_)), "{phone}: {err}");
        }
        let err = resolver.resolve("13800000000", "   ").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        assert_eq!(store.request_count(), 0);
    }

    #[tokio::test]
    async fn test_backend_failure_surfaces_and_nothing_cached() {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(MemorySessionCache::new());
        store.fail_next(Operation::Select, tables::PROFILES);

        let err = resolver(&store, &cache)
            .resolve("13800000000", "Alice")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Backend(_)));
        assert!(!cache.contains(IDENTITY_KEY));
    }

    #[tokio::test]
    async fn test_restore_uses_cache_without_remote_calls() {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(MemorySessionCache::new());
        let identity = resolver(&store, &cache)
            .resolve("13800000000", "Alice")
            .await
            .unwrap();

        let fresh_store = Arc::new(MemoryStore::new());
        let restored = resolver(&fresh_store, &cache).restore().await.unwrap();

        assert_eq!(restored, identity);
        assert_eq!(fresh_store.request_count(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_discarded() {
        let store = Arc::new(MemoryStore::new());

        for raw in ["{not json", r#"{"id":"x"}"#, r#"{"id":"00000000-0000-0000-0000-000000000001","phone":"123","full_name":"A","created_at":"2026-10-18T00:00:00Z"}"#] {
            let cache = Arc::new(MemorySessionCache::with_entry(IDENTITY_KEY, raw));
            assert!(resolver(&store, &cache).restore().await.is_none());
            assert!(!cache.contains(IDENTITY_KEY));
        }
        assert_eq!(store.request_count(), 0);
    }

    #[tokio::test]
    async fn test_unreadable_session_file_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(format!("{IDENTITY_KEY}.json"));
        std::fs::write(&path, [0xff, 0xfe, 0x7b]).unwrap();

        let store = Arc::new(MemoryStore::new());
        let resolver = IdentityResolver::new(store.clone(), Arc::new(FileSessionCache::new(dir.path())));

        assert!(resolver.restore().await.is_none());
        assert!(!path.exists());
        assert_eq!(store.request_count(), 0);
    }

    #[tokio::test]
    async fn test_cache_failures_are_not_fatal() {
        let store = Arc::new(MemoryStore::new());
        let resolver = IdentityResolver::new(store.clone(), Arc::new(BrokenCache));

        assert!(resolver.resolve("13800000000", "Alice").await.is_ok());
        assert!(resolver.restore().await.is_none());
        resolver.forget().await;
    }

    #[tokio::test]
    async fn test_forget_clears_entry() {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(MemorySessionCache::new());
        let resolver = resolver(&store, &cache);

        resolver.resolve("13800000000", "Alice").await.unwrap();
        assert!(cache.contains(IDENTITY_KEY));

        let before = store.request_count();
        resolver.forget().await;
        assert!(!cache.contains(IDENTITY_KEY));
        assert_eq!(store.request_count(), before);
    }

    /// Serves stale (empty) results to the first profile lookup, as if
    /// another session registered the phone right after we looked.
    struct StaleLookup {
        inner: MemoryStore,
        stale: AtomicBool,
    }

    #[async_trait]
    impl DataStore for StaleLookup {
        async fn select(
            &self,
            table: &str,
            query: &Query,
        ) -> std::result::Result<Vec<Value>, BackendError> {
            if self.stale.swap(false, Ordering::SeqCst) {
                return Ok(Vec::new());
            }
            self.inner.select(table, query).await
        }
        async fn insert(&self, table: &str, row: Value) -> std::result::Result<Value, BackendError> {
            self.inner.insert(table, row).await
        }
        async fn update(
            &self,
            table: &str,
            id: Uuid,
            changes: Value,
        ) -> std::result::Result<Value, BackendError> {
            self.inner.update(table, id, changes).await
        }
        async fn delete(&self, table: &str, id: Uuid) -> std::result::Result<(), BackendError> {
            self.inner.delete(table, id).await
        }
    }

    #[tokio::test]
    async fn test_conflicting_insert_falls_back_to_lookup() {
        let inner = MemoryStore::new();
        inner.unique(tables::PROFILES, &["phone"]);
        let racer = ProfileRepository::new(&inner)
            .create(&Phone::parse("13800000000").unwrap(), "Alice")
            .await
            .unwrap();

        let store = Arc::new(StaleLookup {
            inner,
            stale: AtomicBool::new(true),
        });
        let resolver = IdentityResolver::new(store.clone(), Arc::new(MemorySessionCache::new()));

        let resolved = resolver.resolve("13800000000", "Bob").await.unwrap();
        assert_eq!(resolved.id, racer.id);
        assert_eq!(resolved.full_name, "Bob");
        assert_eq!(store.inner.rows(tables::PROFILES).len(), 1);
    }
}
