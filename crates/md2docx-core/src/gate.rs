//! The application shell's use of the session.
//!
//! `SessionGate` starts login, logs out, and fronts every protected backend
//! call with a local authentication check so an expired or missing session
//! never reaches the network.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError};
use crate::auth::{CredentialStore, Navigator, SessionState, HOME_ROUTE};
use crate::models::{ConversionResult, GoogleDoc};

pub const LOGIN_FAILURE_MESSAGE: &str = "Failed to initiate login";

#[derive(Error, Debug)]
pub enum GateError {
    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("No download link available")]
    NoDownloadLink,

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl GateError {
    /// Message for the shell's error line, with a per-action fallback for
    /// backend failures that carry no server message.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            GateError::Api(e) => e.server_message().unwrap_or(fallback).to_string(),
            other => other.to_string(),
        }
    }
}

pub struct SessionGate {
    store: Arc<CredentialStore>,
    api: ApiClient,
    navigator: Arc<dyn Navigator>,
}

impl SessionGate {
    pub fn new(store: Arc<CredentialStore>, api: ApiClient, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            store,
            api,
            navigator,
        }
    }

    pub fn session(&self) -> SessionState<'_> {
        SessionState::new(&self.store)
    }

    pub fn is_authenticated(&self) -> bool {
        self.session().is_authenticated()
    }

    /// Fetch the provider authorization URL and navigate to it.
    pub async fn login(&self) -> Result<String, GateError> {
        let auth_url = self.api.initiate_login().await.map_err(|e| {
            warn!(error = %e, "Failed to initiate login");
            e
        })?;
        info!("Opening provider login");
        self.navigator.open_external(&auth_url);
        Ok(auth_url)
    }

    /// Clear stored credentials and return home. Safe on an empty store.
    pub fn logout(&self) {
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear credentials");
        }
        info!("Logged out");
        self.navigator.push(HOME_ROUTE);
    }

    /// Client carrying the current bearer credential, or a local refusal.
    fn authorized(&self) -> Result<ApiClient, GateError> {
        match self.session().access_token() {
            Some(token) => Ok(self.api.with_token(token)),
            None => {
                debug!("Blocked protected call without a valid session");
                Err(GateError::NotAuthenticated)
            }
        }
    }

    pub async fn list_documents(&self) -> Result<Vec<GoogleDoc>, GateError> {
        let api = self.authorized()?;
        Ok(api.list_documents().await?)
    }

    pub async fn convert_documents(&self) -> Result<ConversionResult, GateError> {
        let api = self.authorized()?;
        Ok(api.convert_documents().await?)
    }

    /// Download the archive produced by `conversion`.
    pub async fn download_archive(
        &self,
        conversion: Option<&ConversionResult>,
    ) -> Result<Vec<u8>, GateError> {
        if !conversion.map(ConversionResult::has_archive).unwrap_or(false) {
            return Err(GateError::NoDownloadLink);
        }
        let api = self.authorized()?;
        Ok(api.download_archive().await?)
    }
}

// ============================================================================
// Tests
// ============================================================================
