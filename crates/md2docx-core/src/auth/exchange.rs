//! One-shot authorization code exchange against the backend.
//!
//! The backend relays the code to the identity provider and answers with
//! `{access_token, refresh_token?, user?}`. Providers are inconsistent about
//! the optional fields, so the response is normalized here and the presence
//! of the access token is checked at this boundary.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::bundle::CredentialBundle;

/// Backend endpoint receiving the authorization code
const CALLBACK_PATH: &str = "/auth/google/callback";

/// Exchange request timeout in seconds.
pub const EXCHANGE_TIMEOUT_SECS: u64 = 10;

/// Shown when the server gives no usable message
pub const GENERIC_AUTH_FAILURE: &str = "Authentication failed. Please try again.";

pub const MISSING_CODE_MESSAGE: &str = "No authorization code found";

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("No authorization code found")]
    MissingCode,

    #[error("Authorization code is empty")]
    EmptyCode,

    #[error("Authorization code was already exchanged")]
    CodeReused,

    #[error("Exchange request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("Exchange rejected with status {status}")]
    Rejected {
        status: StatusCode,
        message: Option<String>,
    },

    #[error("Invalid exchange response: {0}")]
    Protocol(String),
}

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AuthError::Timeout
        } else {
            AuthError::Network(e)
        }
    }
}

impl AuthError {
    /// Message suitable for the error view.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::MissingCode => MISSING_CODE_MESSAGE.to_string(),
            AuthError::Rejected {
                message: Some(message),
                ..
            } if !message.trim().is_empty() => message.clone(),
            _ => GENERIC_AUTH_FAILURE.to_string(),
        }
    }
}

#[derive(Serialize)]
struct ExchangeRequest<'a> {
    code: &'a str,
}

#[derive(Debug, Deserialize)]
struct ExchangeResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    user: Option<Value>,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Normalized exchange result, before an expiry has been assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub user_info: Option<Value>,
}

impl TokenGrant {
    /// Stamp the grant with the fixed client-side TTL
    pub fn into_bundle(self, completed_at: DateTime<Utc>) -> CredentialBundle {
        CredentialBundle::issued_at(
            self.access_token,
            self.refresh_token,
            self.user_info,
            completed_at,
        )
    }
}

/// Trades authorization codes for credentials.
///
/// Never retries: a code is single-use, so any failure is terminal for it.
/// Codes seen by this instance are remembered and a second attempt with the
/// same code is refused without a network call. The remembered set is never
/// pruned and grows by one entry per exchange for the life of the instance.
pub struct AuthorizationExchange {
    client: Client,
    base_url: String,
    consumed: Mutex<HashSet<String>>,
}

impl AuthorizationExchange {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(EXCHANGE_TIMEOUT_SECS))
    }

    /// Exchange client with a custom request timeout
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            consumed: Mutex::new(HashSet::new()),
        })
    }

    pub async fn exchange(&self, code: &str) -> Result<TokenGrant, AuthError> {
        if code.is_empty() {
            return Err(AuthError::EmptyCode);
        }
        if !self.mark_consumed(code) {
            warn!("Refusing to exchange an authorization code twice");
            return Err(AuthError::CodeReused);
        }

        let url = format!("{}{}", self.base_url, CALLBACK_PATH);
        debug!(url = %url, "Exchanging authorization code");

        let response = self
            .client
            .post(&url)
            .json(&ExchangeRequest { code })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.message);
            warn!(%status, server_message = ?message, "Code exchange rejected");
            return Err(AuthError::Rejected { status, message });
        }

        let grant = Self::parse_grant(&body)?;
        info!(
            has_refresh = grant.refresh_token.is_some(),
            has_user = grant.user_info.is_some(),
            "Authorization code exchanged"
        );
        Ok(grant)
    }

    fn parse_grant(body: &str) -> Result<TokenGrant, AuthError> {
        let parsed: ExchangeResponse = serde_json::from_str(body)
            .map_err(|e| AuthError::Protocol(format!("malformed body: {}", e)))?;

        let access_token = parsed
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::Protocol("missing access_token".to_string()))?;

        if let Some(expires_in) = parsed.expires_in {
            debug!(expires_in, "Provider expiry ignored in favour of fixed session TTL");
        }

        Ok(TokenGrant {
            access_token,
            refresh_token: parsed.refresh_token.filter(|t| !t.is_empty()),
            user_info: parsed.user.filter(|u| !u.is_null()),
        })
    }

    /// Returns false if the code had already been consumed
    fn mark_consumed(&self, code: &str) -> bool {
        match self.consumed.lock() {
            Ok(mut consumed) => consumed.insert(code.to_string()),
            Err(poisoned) => poisoned.into_inner().insert(code.to_string()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
