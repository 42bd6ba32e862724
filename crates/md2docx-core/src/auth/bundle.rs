use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

/// Client-side session lifetime in milliseconds, counted from the moment the
/// code exchange completes. Provider-issued `expires_in` is not consulted.
pub const SESSION_TTL_MS: i64 = 3_600_000;

/// Persisted entry names.
pub const ACCESS_TOKEN_KEY: &str = "googleAccessToken";
pub const REFRESH_TOKEN_KEY: &str = "googleRefreshToken";
pub const USER_INFO_KEY: &str = "userInfo";
pub const TOKEN_EXPIRY_KEY: &str = "tokenExpiry";

/// Every persisted entry, expiry first so a partial clear never leaves a
/// valid session behind.
pub const ALL_KEYS: [&str; 4] = [
    TOKEN_EXPIRY_KEY,
    ACCESS_TOKEN_KEY,
    REFRESH_TOKEN_KEY,
    USER_INFO_KEY,
];

/// Credentials persisted after a successful exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct CredentialBundle {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub user_info: Option<Value>,
    /// Absolute expiry, epoch milliseconds.
    pub expires_at: i64,
}

impl CredentialBundle {
    /// Build a bundle whose expiry is `now + SESSION_TTL_MS`.
    pub fn issued_at(
        access_token: String,
        refresh_token: Option<String>,
        user_info: Option<Value>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            user_info,
            expires_at: now.timestamp_millis() + SESSION_TTL_MS,
        }
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.access_token.is_empty() && now.timestamp_millis() < self.expires_at
    }

    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.expires_at).single()
    }

    /// Minutes remaining until expiry (for display), never negative
    pub fn minutes_until_expiry(&self, now: DateTime<Utc>) -> i64 {
        ((self.expires_at - now.timestamp_millis()) / 60_000).max(0)
    }

    /// Best-effort display name from the stored profile payload
    pub fn display_name(&self) -> Option<String> {
        let user = self.user_info.as_ref()?;
        ["name", "email"]
            .iter()
            .filter_map(|field| user.get(field).and_then(Value::as_str))
            .find(|s| !s.is_empty())
            .map(str::to_string)
    }
}
