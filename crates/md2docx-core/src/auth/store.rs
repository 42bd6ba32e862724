use anyhow::Result;
use tracing::{debug, warn};

use crate::config::Config;

use super::bundle::{
    CredentialBundle, ACCESS_TOKEN_KEY, ALL_KEYS, REFRESH_TOKEN_KEY, TOKEN_EXPIRY_KEY,
    USER_INFO_KEY,
};
use super::cookies::{CookieOptions, CookieStorage, FileCookieJar};

/// Durable owner of the credential bundle.
///
/// When no storage medium exists (no resolvable data directory) the store is
/// *unavailable*: writes and clears silently do nothing and reads are absent.
pub struct CredentialStore {
    jar: Option<Box<dyn CookieStorage>>,
    default_options: CookieOptions,
}

impl CredentialStore {
    pub fn new(jar: impl CookieStorage + 'static, default_options: CookieOptions) -> Self {
        Self {
            jar: Some(Box::new(jar)),
            default_options,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            jar: None,
            default_options: CookieOptions::default(),
        }
    }

    /// File-backed store in the configured storage directory
    pub fn from_config(config: &Config) -> Self {
        match config.storage_dir() {
            Ok(dir) => {
                debug!(?dir, "Credential storage configured");
                Self::new(FileCookieJar::new(dir), config.cookie_options())
            }
            Err(e) => {
                debug!(error = %e, "No storage directory, credential store unavailable");
                Self::unavailable()
            }
        }
    }

    pub fn is_available(&self) -> bool {
        self.jar.is_some()
    }

    pub fn default_options(&self) -> CookieOptions {
        self.default_options
    }

    /// Persist a bundle.
    ///
    /// The jar has no multi-entry transaction, so the expiry entry is removed
    /// first and written last: until the final write lands, no read can pair
    /// the new token with any expiry, and `read` requires both.
    pub fn write(&self, bundle: &CredentialBundle, options: &CookieOptions) -> Result<()> {
        let Some(jar) = self.jar.as_deref() else {
            return Ok(());
        };

        jar.remove(TOKEN_EXPIRY_KEY)?;
        jar.set(ACCESS_TOKEN_KEY, &bundle.access_token, options)?;

        match bundle.refresh_token {
            Some(ref token) => jar.set(REFRESH_TOKEN_KEY, token, options)?,
            None => jar.remove(REFRESH_TOKEN_KEY)?,
        }

        match bundle.user_info {
            Some(ref user) => jar.set(USER_INFO_KEY, &serde_json::to_string(user)?, options)?,
            None => jar.remove(USER_INFO_KEY)?,
        }

        jar.set(TOKEN_EXPIRY_KEY, &bundle.expires_at.to_string(), options)?;
        debug!(
            has_refresh = bundle.refresh_token.is_some(),
            has_user = bundle.user_info.is_some(),
            expires_at = bundle.expires_at,
            "Credentials written"
        );
        Ok(())
    }

    /// Read the stored bundle. Missing, partial or unreadable data is `None`.
    pub fn read(&self) -> Option<CredentialBundle> {
        let jar = self.jar.as_deref()?;
        match Self::read_from(jar) {
            Ok(bundle) => bundle,
            Err(e) => {
                warn!(error = %e, "Failed to read credentials");
                None
            }
        }
    }

    fn read_from(jar: &dyn CookieStorage) -> Result<Option<CredentialBundle>> {
        let Some(access_token) = jar.get(ACCESS_TOKEN_KEY)?.filter(|t| !t.is_empty()) else {
            return Ok(None);
        };
        let Some(expiry) = jar.get(TOKEN_EXPIRY_KEY)? else {
            return Ok(None);
        };
        let Ok(expires_at) = expiry.trim().parse::<i64>() else {
            warn!("Stored token expiry is not an integer");
            return Ok(None);
        };

        let refresh_token = jar.get(REFRESH_TOKEN_KEY)?.filter(|t| !t.is_empty());
        let user_info = jar
            .get(USER_INFO_KEY)?
            .and_then(|raw| match serde_json::from_str(&raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(error = %e, "Stored user info is not valid JSON");
                    None
                }
            });

        Ok(Some(CredentialBundle {
            access_token,
            refresh_token,
            user_info,
            expires_at,
        }))
    }

    /// Remove every credential entry. Clearing an empty store is a no-op.
    pub fn clear(&self) -> Result<()> {
        let Some(jar) = self.jar.as_deref() else {
            return Ok(());
        };
        for key in ALL_KEYS {
            jar.remove(key)?;
        }
        debug!("Credentials cleared");
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use chrono::Utc;
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;
    use crate::auth::cookies::MemoryCookieJar;

    fn memory_store() -> CredentialStore {
        CredentialStore::new(MemoryCookieJar::new(), CookieOptions::default())
    }

    fn full_bundle() -> CredentialBundle {
        CredentialBundle::issued_at(
            "A".to_string(),
            Some("R".to_string()),
            Some(json!({"name": "u", "id": 7, "tags": ["x", "y"]})),
            Utc::now(),
        )
    }

    #[test]
    fn test_roundtrip_full_bundle() {
        let store = memory_store();
        let bundle = full_bundle();
        store.write(&bundle, &store.default_options()).unwrap();
        assert_eq!(store.read(), Some(bundle));
    }

    #[test]
    fn test_roundtrip_through_file_jar() {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::new(
            FileCookieJar::new(dir.path().to_path_buf()),
            CookieOptions::default(),
        );
        let bundle = full_bundle();
        store.write(&bundle, &store.default_options()).unwrap();
        assert_eq!(store.read(), Some(bundle));
    }

    #[test]
    fn test_write_minimal_bundle_drops_stale_optional_fields() {
        let store = memory_store();
        store.write(&full_bundle(), &store.default_options()).unwrap();

        let minimal = CredentialBundle::issued_at("B".to_string(), None, None, Utc::now());
        store.write(&minimal, &store.default_options()).unwrap();

        let read = store.read().unwrap();
        assert_eq!(read.access_token, "B");
        assert_eq!(read.refresh_token, None);
        assert_eq!(read.user_info, None);
    }

    #[test]
    fn test_read_empty_store_is_absent() {
        assert_eq!(memory_store().read(), None);
    }

    #[test]
    fn test_token_without_expiry_is_absent() {
        let jar = MemoryCookieJar::new();
        jar.set(ACCESS_TOKEN_KEY, "A", &CookieOptions::default()).unwrap();
        let store = CredentialStore::new(jar, CookieOptions::default());
        assert_eq!(store.read(), None);
    }

    #[test]
    fn test_non_numeric_expiry_is_absent() {
        let jar = MemoryCookieJar::new();
        jar.set(ACCESS_TOKEN_KEY, "A", &CookieOptions::default()).unwrap();
        jar.set(TOKEN_EXPIRY_KEY, "soon", &CookieOptions::default()).unwrap();
        let store = CredentialStore::new(jar, CookieOptions::default());
        assert_eq!(store.read(), None);
    }

    #[test]
    fn test_malformed_user_info_is_dropped() {
        let jar = MemoryCookieJar::new();
        let options = CookieOptions::default();
        jar.set(ACCESS_TOKEN_KEY, "A", &options).unwrap();
        jar.set(USER_INFO_KEY, "{not json", &options).unwrap();
        jar.set(TOKEN_EXPIRY_KEY, "123", &options).unwrap();
        let store = CredentialStore::new(jar, options);

        let read = store.read().unwrap();
        assert_eq!(read.user_info, None);
        assert_eq!(read.expires_at, 123);
    }

    #[test]
    fn test_clear_is_idempotent() {
        let store = memory_store();
        store.write(&full_bundle(), &store.default_options()).unwrap();
        store.clear().unwrap();
        assert_eq!(store.read(), None);
        store.clear().unwrap();
        assert_eq!(store.read(), None);
    }

    #[test]
    fn test_unavailable_store_is_silent() {
        let store = CredentialStore::unavailable();
        assert!(!store.is_available());
        store.write(&full_bundle(), &store.default_options()).unwrap();
        assert_eq!(store.read(), None);
        store.clear().unwrap();
    }

    /// Records the order of operations reaching the medium.
    #[derive(Default)]
    struct RecordingJar {
        inner: MemoryCookieJar,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl CookieStorage for RecordingJar {
        fn get(&self, name: &str) -> Result<Option<String>> {
            self.inner.get(name)
        }

        fn set(&self, name: &str, value: &str, options: &CookieOptions) -> Result<()> {
            self.log.lock().unwrap().push(format!("set {}", name));
            self.inner.set(name, value, options)
        }

        fn remove(&self, name: &str) -> Result<()> {
            self.log.lock().unwrap().push(format!("remove {}", name));
            self.inner.remove(name)
        }
    }

    #[test]
    fn test_write_orders_expiry_last() {
        let jar = RecordingJar::default();
        let log = jar.log.clone();
        let store = CredentialStore::new(jar, CookieOptions::default());
        store.write(&full_bundle(), &store.default_options()).unwrap();

        let log = log.lock().unwrap();
        assert_eq!(log.first().map(String::as_str), Some("remove tokenExpiry"));
        assert_eq!(log.last().map(String::as_str), Some("set tokenExpiry"));
        assert_eq!(log.iter().filter(|op| op.ends_with("tokenExpiry")).count(), 2);
    }

    #[test]
    fn test_clear_removes_each_entry_once_expiry_first() {
        let jar = RecordingJar::default();
        let log = jar.log.clone();
        let store = CredentialStore::new(jar, CookieOptions::default());
        store.write(&full_bundle(), &store.default_options()).unwrap();
        log.lock().unwrap().clear();

        store.clear().unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "remove tokenExpiry",
                "remove googleAccessToken",
                "remove googleRefreshToken",
                "remove userInfo",
            ]
        );
    }

    #[test]
    fn test_corrupt_jar_does_not_block_login_or_logout() {
        let dir = TempDir::new().unwrap();
        let jar = FileCookieJar::new(dir.path().to_path_buf());
        std::fs::write(jar.path(), "{truncated").unwrap();
        let store = CredentialStore::new(jar, CookieOptions::default());

        assert_eq!(store.read(), None);
        store.write(&full_bundle(), &store.default_options()).unwrap();
        store.clear().unwrap();
        assert_eq!(store.read(), None);

        let bundle = full_bundle();
        store.write(&bundle, &store.default_options()).unwrap();
        assert_eq!(store.read(), Some(bundle));
    }

    /// Fails every `set` after the first `n`.
    struct FailingJar {
        inner: MemoryCookieJar,
        remaining: Mutex<usize>,
    }

    impl CookieStorage for FailingJar {
        fn get(&self, name: &str) -> Result<Option<String>> {
            self.inner.get(name)
        }

        fn set(&self, name: &str, value: &str, options: &CookieOptions) -> Result<()> {
            let mut remaining = self.remaining.lock().unwrap();
            if *remaining == 0 {
                anyhow::bail!("disk full");
            }
            *remaining -= 1;
            self.inner.set(name, value, options)
        }

        fn remove(&self, name: &str) -> Result<()> {
            self.inner.remove(name)
        }
    }

    #[test]
    fn test_interrupted_write_never_reads_as_valid_pairing() {
        let store = CredentialStore::new(
            FailingJar {
                inner: MemoryCookieJar::new(),
                remaining: Mutex::new(0),
            },
            CookieOptions::default(),
        );
        assert!(store.write(&full_bundle(), &store.default_options()).is_err());
        assert_eq!(store.read(), None);

        let store = CredentialStore::new(
            FailingJar {
                inner: MemoryCookieJar::new(),
                remaining: Mutex::new(3),
            },
            CookieOptions::default(),
        );
        assert!(store.write(&full_bundle(), &store.default_options()).is_err());
        assert_eq!(store.read(), None);
    }

    #[test]
    fn test_overwrite_replaces_prior_session_without_mixing() {
        let jar = FailingJar {
            inner: MemoryCookieJar::new(),
            remaining: Mutex::new(4),
        };
        let store = CredentialStore::new(jar, CookieOptions::default());
        let first = full_bundle();
        store.write(&first, &store.default_options()).unwrap();
        assert_eq!(store.read(), Some(first));

        // Budget exhausted: the second write fails after removing the old expiry
        let second = CredentialBundle::issued_at("B".to_string(), None, None, Utc::now());
        assert!(store.write(&second, &store.default_options()).is_err());
        assert_eq!(store.read(), None);
    }
}
