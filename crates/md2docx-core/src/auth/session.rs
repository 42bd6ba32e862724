use chrono::{DateTime, Utc};

use super::bundle::CredentialBundle;
use super::store::CredentialStore;

/// Read-only view answering "is the user currently authenticated".
///
/// Validity is never stored; it is recomputed from the persisted bundle and
/// the current time on every call. Cheap enough to call on every frame.
#[derive(Clone, Copy)]
pub struct SessionState<'a> {
    store: &'a CredentialStore,
}

impl<'a> SessionState<'a> {
    pub fn new(store: &'a CredentialStore) -> Self {
        Self { store }
    }

    pub fn is_authenticated(&self) -> bool {
        self.is_authenticated_at(Utc::now())
    }

    pub fn is_authenticated_at(&self, now: DateTime<Utc>) -> bool {
        is_valid(self.store.read().as_ref(), now)
    }

    /// The stored bundle, only if it is currently valid
    pub fn bundle(&self) -> Option<CredentialBundle> {
        let now = Utc::now();
        self.store.read().filter(|b| b.is_valid_at(now))
    }

    /// Bearer credential for protected calls
    pub fn access_token(&self) -> Option<String> {
        self.bundle().map(|b| b.access_token)
    }

    pub fn minutes_until_expiry(&self) -> Option<i64> {
        let now = Utc::now();
        self.bundle().map(|b| b.minutes_until_expiry(now))
    }

    pub fn display_name(&self) -> Option<String> {
        self.bundle().and_then(|b| b.display_name())
    }
}

/// The single session validity rule: token present and `now < expiresAt`.
pub fn is_valid(bundle: Option<&CredentialBundle>, now: DateTime<Utc>) -> bool {
    bundle.map(|b| b.is_valid_at(now)).unwrap_or(false)
}
