//! Persisted authentication flag and behavioral baseline.
//!
//! Both live in the key-value store. An absent key means "not yet
//! configured", which drives the initial view: auth, then onboarding,
//! then home.

use std::sync::Arc;

use tracing::{info, warn};

use sentinel_core::error::SentinelError;
use sentinel_core::types::{Profile, View};

use crate::kv::KeyValueStore;

/// Key holding the local authentication flag (`"true"` when set).
pub const AUTH_KEY: &str = "lifeax_auth";
/// Key holding the JSON-serialized profile.
pub const BASELINE_KEY: &str = "sentinel_baseline";

/// Read/write access to the persisted profile and auth flag.
#[derive(Clone)]
pub struct ProfileStore {
    kv: Arc<dyn KeyValueStore>,
}

impl ProfileStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Whether the local auth flag is set.
    pub fn is_authenticated(&self) -> Result<bool, SentinelError> {
        Ok(self.kv.get(AUTH_KEY)?.as_deref() == Some("true"))
    }

    /// Set the local auth flag.
    ///
    /// This is a local gate, not a credential check: both fields only need
    /// to be non-empty.
    pub fn authenticate(&self, login_id: &str, access_code: &str) -> Result<(), SentinelError> {
        if login_id.trim().is_empty() || access_code.trim().is_empty() {
            return Err(SentinelError::Validation(
                "identity handle and access code are required".to_string(),
            ));
        }
        self.kv.set(AUTH_KEY, "true")?;
        info!("Local identity flag set");
        Ok(())
    }

    /// Load the saved profile, if any.
    pub fn load_profile(&self) -> Result<Option<Profile>, SentinelError> {
        match self.kv.get(BASELINE_KEY)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Persist a completed profile.
    pub fn save_profile(&self, profile: &Profile) -> Result<(), SentinelError> {
        profile.validate()?;
        let raw = serde_json::to_string(profile)?;
        self.kv.set(BASELINE_KEY, &raw)?;
        info!(name = %profile.name, "Baseline saved");
        Ok(())
    }

    /// The view to show on startup.
    ///
    /// An unreadable baseline is treated like a missing one so the user is
    /// sent back through onboarding.
    pub fn initial_view(&self) -> Result<View, SentinelError> {
        if !self.is_authenticated()? {
            return Ok(View::Auth);
        }
        match self.load_profile() {
            Ok(Some(_)) => Ok(View::Home),
            Ok(None) => Ok(View::Onboarding),
            Err(SentinelError::Serialization(e)) => {
                warn!(error = %e, "Stored baseline is unreadable");
                Ok(View::Onboarding)
            }
            Err(e) => Err(e),
        }
    }

    /// Delete every persisted record.
    pub fn purge(&self) -> Result<(), SentinelError> {
        self.kv.clear()
    }
}

impl std::fmt::Debug for ProfileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileStore").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::kv::SqliteKvStore;
    use sentinel_core::types::AuthorityPreference;

    fn make_store() -> (ProfileStore, Arc<SqliteKvStore>) {
        let kv = Arc::new(SqliteKvStore::new(Arc::new(Database::in_memory().unwrap())));
        (ProfileStore::new(kv.clone()), kv)
    }

    fn complete_profile() -> Profile {
        Profile {
            name: "Ada".to_string(),
            primary_goal: "Ship v1".to_string(),
            main_blocker: "Meetings".to_string(),
            authority_preference: AuthorityPreference::Advisor,
            ..Profile::default()
        }
    }

    #[test]
    fn test_fresh_store_routes_to_auth() {
        let (store, _) = make_store();
        assert!(!store.is_authenticated().unwrap());
        assert_eq!(store.initial_view().unwrap(), View::Auth);
    }

    #[test]
    fn test_authenticated_without_baseline_routes_to_onboarding() {
        let (store, _) = make_store();
        store.authenticate("ada", "1234").unwrap();
        assert!(store.is_authenticated().unwrap());
        assert_eq!(store.initial_view().unwrap(), View::Onboarding);
    }

    #[test]
    fn test_authenticated_with_baseline_routes_home() {
        let (store, _) = make_store();
        store.authenticate("ada", "1234").unwrap();
        store.save_profile(&complete_profile()).unwrap();
        assert_eq!(store.initial_view().unwrap(), View::Home);
    }

    #[test]
    fn test_baseline_without_auth_still_routes_to_auth() {
        let (store, _) = make_store();
        store.save_profile(&complete_profile()).unwrap();
        assert_eq!(store.initial_view().unwrap(), View::Auth);
    }

    #[test]
    fn test_authenticate_requires_both_fields() {
        let (store, _) = make_store();
        assert!(store.authenticate("", "code").is_err());
        assert!(store.authenticate("ada", "  ").is_err());
        assert!(!store.is_authenticated().unwrap());
    }

    #[test]
    fn test_auth_flag_must_be_literal_true() {
        let (store, kv) = make_store();
        kv.set(AUTH_KEY, "yes").unwrap();
        assert!(!store.is_authenticated().unwrap());
        kv.set(AUTH_KEY, "true").unwrap();
        assert!(store.is_authenticated().unwrap());
    }

    #[test]
    fn test_profile_roundtrip_through_store() {
        let (store, _) = make_store();
        assert!(store.load_profile().unwrap().is_none());
        store.save_profile(&complete_profile()).unwrap();
        assert_eq!(store.load_profile().unwrap(), Some(complete_profile()));
    }

    #[test]
    fn test_baseline_is_stored_as_camel_case_json() {
        let (store, kv) = make_store();
        store.save_profile(&complete_profile()).unwrap();
        let raw = kv.get(BASELINE_KEY).unwrap().unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["primaryGoal"], "Ship v1");
        assert_eq!(json["authorityPreference"], "advisor");
    }

    #[test]
    fn test_save_incomplete_profile_rejected() {
        let (store, _) = make_store();
        let result = store.save_profile(&Profile::default());
        assert!(matches!(result, Err(SentinelError::Validation(_))));
        assert!(store.load_profile().unwrap().is_none());
    }

    #[test]
    fn test_corrupt_baseline_routes_to_onboarding() {
        let (store, kv) = make_store();
        store.authenticate("ada", "1234").unwrap();
        kv.set(BASELINE_KEY, "{not json").unwrap();
        assert!(store.load_profile().is_err());
        assert_eq!(store.initial_view().unwrap(), View::Onboarding);
    }

    #[test]
    fn test_purge_clears_everything() {
        let (store, _) = make_store();
        store.authenticate("ada", "1234").unwrap();
        store.save_profile(&complete_profile()).unwrap();
        store.purge().unwrap();
        assert!(!store.is_authenticated().unwrap());
        assert!(store.load_profile().unwrap().is_none());
        assert_eq!(store.initial_view().unwrap(), View::Auth);
    }
}
