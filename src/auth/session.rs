//! Session storage capability and the impersonation-handoff invalidator.
//!
//! The storage medium is owned by the surrounding application; this module
//! only defines the `SessionStore` capability it must provide and the rule
//! for when the prior session's artifacts are cleared.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::params::ADMIN_USER_ID;

/// Result type for session store operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors that can occur during session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session backend error: {0}")]
    Backend(String),
}

/// Storage for caller-visible session artifacts.
///
/// Implementations must be thread-safe and handle concurrent access.
/// `clear` removes every listed key in one call; clearing keys that are
/// already absent is a no-op.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Store a value under a key.
    async fn put(&self, key: &str, value: String) -> SessionResult<()>;

    /// Get the value stored under a key.
    async fn get(&self, key: &str) -> SessionResult<Option<String>>;

    /// Remove every listed key.
    async fn clear(&self, keys: &[String]) -> SessionResult<()>;
}

/// In-memory session store (single-node only).
#[derive(Default)]
pub struct MemorySessionStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn put(&self, key: &str, value: String) -> SessionResult<()> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn get(&self, key: &str) -> SessionResult<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn clear(&self, keys: &[String]) -> SessionResult<()> {
        let mut entries = self.entries.write().await;
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }
}

/// Clears prior session artifacts on an admin-impersonation handoff.
///
/// An operator switching "view as" identity arrives with a non-sentinel
/// `adminUserId` parameter; the previous identity's session must not leak
/// into the new one.
pub struct SessionInvalidator {
    store: Arc<dyn SessionStore>,
    keys: Vec<String>,
}

impl SessionInvalidator {
    /// Create an invalidator that clears `keys` from `store` when triggered.
    pub fn new(store: Arc<dyn SessionStore>, keys: Vec<String>) -> Self {
        Self { store, keys }
    }

    /// Whether the parameters signal an impersonation handoff.
    ///
    /// The values `"0"` and `"-1"` mean "no admin / not applicable", not
    /// "admin id zero". Comparison is string-then-numeric to match the
    /// upstream's loose contract: literal sentinel strings are checked
    /// first, then any value that parses numerically to 0 or -1 is also a
    /// sentinel. Values that don't parse compare unequal to both sentinels
    /// and trigger.
    pub fn is_impersonation_handoff(params: &HashMap<String, String>) -> bool {
        let Some(raw) = params.get(ADMIN_USER_ID) else {
            return false;
        };
        if raw.is_empty() || raw == "0" || raw == "-1" {
            return false;
        }
        match raw.parse::<f64>() {
            Ok(n) if n == 0.0 || n == -1.0 => false,
            _ => true,
        }
    }

    /// Clear the prior session if the parameters demand it.
    ///
    /// Returns whether a clear was performed. The not-triggered path is
    /// silent, and store failures are absorbed: this step has no failure
    /// mode visible to the caller.
    pub async fn invalidate_if_stale(&self, params: &HashMap<String, String>) -> bool {
        if !Self::is_impersonation_handoff(params) {
            return false;
        }

        tracing::info!("Admin impersonation handoff detected, clearing prior session");

        if let Err(e) = self.store.clear(&self.keys).await {
            tracing::warn!(error = %e, "Failed to clear prior session artifacts");
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn params_with_admin(value: &str) -> HashMap<String, String> {
        HashMap::from([(ADMIN_USER_ID.to_string(), value.to_string())])
    }

    fn test_keys() -> Vec<String> {
        vec!["sessionId".to_string(), "authToken".to_string()]
    }

    #[rstest]
    #[case("0")]
    #[case("-1")]
    #[case("0.0")]
    #[case("-1.0")]
    #[case("")]
    fn test_sentinel_values_do_not_trigger(#[case] value: &str) {
        assert!(!SessionInvalidator::is_impersonation_handoff(&params_with_admin(value)));
    }

    #[rstest]
    #[case("7")]
    #[case("42")]
    #[case("-2")]
    #[case("007")]
    fn test_non_sentinel_numeric_values_trigger(#[case] value: &str) {
        assert!(SessionInvalidator::is_impersonation_handoff(&params_with_admin(value)));
    }

    #[test]
    fn test_absent_key_does_not_trigger() {
        assert!(!SessionInvalidator::is_impersonation_handoff(&HashMap::new()));
    }

    #[test]
    fn test_unparseable_value_triggers() {
        // matches the upstream's loose inequality: NaN-like values compare
        // unequal to both sentinels
        assert!(SessionInvalidator::is_impersonation_handoff(&params_with_admin("abc")));
    }

    #[tokio::test]
    async fn test_triggered_invalidation_clears_all_keys() {
        let store = Arc::new(MemorySessionStore::new());
        store.put("sessionId", "old-session".into()).await.unwrap();
        store.put("authToken", "old-token".into()).await.unwrap();
        store.put("unrelated", "survives".into()).await.unwrap();

        let invalidator = SessionInvalidator::new(store.clone(), test_keys());
        let cleared = invalidator.invalidate_if_stale(&params_with_admin("7")).await;

        assert!(cleared);
        assert!(store.get("sessionId").await.unwrap().is_none());
        assert!(store.get("authToken").await.unwrap().is_none());
        assert_eq!(store.get("unrelated").await.unwrap().as_deref(), Some("survives"));
    }

    #[tokio::test]
    async fn test_sentinel_leaves_session_intact() {
        let store = Arc::new(MemorySessionStore::new());
        store.put("sessionId", "current".into()).await.unwrap();

        let invalidator = SessionInvalidator::new(store.clone(), test_keys());
        let cleared = invalidator.invalidate_if_stale(&params_with_admin("0")).await;

        assert!(!cleared);
        assert_eq!(store.get("sessionId").await.unwrap().as_deref(), Some("current"));
    }

    #[tokio::test]
    async fn test_clearing_empty_store_is_noop() {
        let store = Arc::new(MemorySessionStore::new());
        let invalidator = SessionInvalidator::new(store, test_keys());

        assert!(invalidator.invalidate_if_stale(&params_with_admin("7")).await);
    }

    /// Store whose clear always fails.
    struct BrokenStore;

    #[async_trait]
    impl SessionStore for BrokenStore {
        async fn put(&self, _key: &str, _value: String) -> SessionResult<()> {
            Err(SessionError::Backend("store offline".into()))
        }

        async fn get(&self, _key: &str) -> SessionResult<Option<String>> {
            Err(SessionError::Backend("store offline".into()))
        }

        async fn clear(&self, _keys: &[String]) -> SessionResult<()> {
            Err(SessionError::Backend("store offline".into()))
        }
    }

    #[tokio::test]
    async fn test_store_failure_is_absorbed() {
        let invalidator = SessionInvalidator::new(Arc::new(BrokenStore), test_keys());

        // no failure mode visible to the caller
        assert!(invalidator.invalidate_if_stale(&params_with_admin("7")).await);
    }
}
