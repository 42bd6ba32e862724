//! Redirect landing logic: extract the code, exchange it, persist the
//! credentials and navigate home.
//!
//! Each redirect arrival mounts one `CallbackController`. Its state machine
//! runs at most once (`run` consumes the controller) and every transition
//! after the network suspension is gated on the mount still being alive, so
//! a torn-down callback screen never writes credentials or navigates.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use reqwest::Url;
use tokio::sync::watch;
use tracing::{debug, error, info};

use super::exchange::{AuthError, AuthorizationExchange};
use super::store::CredentialStore;

pub const HOME_ROUTE: &str = "/";
pub const CALLBACK_ROUTE: &str = "/oauth/callback";

/// Shown when the exchange succeeded but the credentials could not be saved
pub const PERSIST_FAILURE_MESSAGE: &str = "Failed to save credentials";

/// Base used to resolve redirect input that is only a path or query string
const REDIRECT_BASE: &str = "http://localhost/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackState {
    Extracting,
    Exchanging,
    Persisting,
    Redirecting,
    Failed(String),
}

impl CallbackState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CallbackState::Redirecting | CallbackState::Failed(_))
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            CallbackState::Failed(message) => Some(message),
            _ => None,
        }
    }
}

/// How a controller run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    Redirected,
    Failed(String),
    /// Torn down before completion; no effects were applied after teardown.
    Abandoned,
}

/// Route changes requested by the session lifecycle.
pub trait Navigator: Send + Sync {
    /// In-app navigation to a route
    fn push(&self, route: &str);

    /// Re-evaluate authentication-dependent state
    fn refresh(&self);

    /// Full navigation away from the application (provider login page)
    fn open_external(&self, url: &str);
}

/// Pull the `code` query parameter out of a redirect URL.
///
/// Accepts a full URL, a path with query (`/oauth/callback?code=..`) or a bare
/// query string (`?code=..`). An empty `code` counts as absent.
pub fn extract_code(redirect: &str) -> Option<String> {
    let redirect = redirect.trim();
    let url = Url::parse(redirect)
        .or_else(|_| Url::parse(REDIRECT_BASE).and_then(|base| base.join(redirect)))
        .ok()?;

    url.query_pairs()
        .find(|(key, _)| key == "code")
        .map(|(_, value)| value.into_owned())
        .filter(|code| !code.is_empty())
}

/// Liveness of one callback mount. Dropping the handle unmounts.
#[derive(Debug)]
pub struct MountHandle {
    mounted: Arc<AtomicBool>,
}

impl MountHandle {
    pub fn unmount(&self) {
        if self.mounted.swap(false, Ordering::SeqCst) {
            debug!("Callback unmounted");
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }
}

impl Drop for MountHandle {
    fn drop(&mut self) {
        self.unmount();
    }
}

pub struct CallbackController {
    redirect: String,
    exchange: Arc<AuthorizationExchange>,
    store: Arc<CredentialStore>,
    navigator: Arc<dyn Navigator>,
    mounted: Arc<AtomicBool>,
    state: watch::Sender<CallbackState>,
}

impl CallbackController {
    /// Mount a controller for one redirect arrival.
    ///
    /// Returns the controller, the handle that keeps it mounted, and a
    /// receiver for rendering the current state.
    pub fn mount(
        redirect: impl Into<String>,
        exchange: Arc<AuthorizationExchange>,
        store: Arc<CredentialStore>,
        navigator: Arc<dyn Navigator>,
    ) -> (Self, MountHandle, watch::Receiver<CallbackState>) {
        let mounted = Arc::new(AtomicBool::new(true));
        let (state, rx) = watch::channel(CallbackState::Extracting);

        let controller = Self {
            redirect: redirect.into(),
            exchange,
            store,
            navigator,
            mounted: mounted.clone(),
            state,
        };

        (controller, MountHandle { mounted }, rx)
    }

    fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    /// Publish a new state if still mounted. Returns false once torn down.
    fn transition(&self, next: CallbackState) -> bool {
        if !self.is_mounted() {
            debug!(state = ?next, "Suppressed transition on unmounted callback");
            return false;
        }
        debug!(state = ?next, "Callback transition");
        self.state.send_replace(next);
        true
    }

    fn fail(&self, message: String) -> CallbackOutcome {
        if self.transition(CallbackState::Failed(message.clone())) {
            CallbackOutcome::Failed(message)
        } else {
            CallbackOutcome::Abandoned
        }
    }

    /// Drive the state machine to a terminal state.
    pub async fn run(self) -> CallbackOutcome {
        if !self.is_mounted() {
            return CallbackOutcome::Abandoned;
        }

        // EXTRACTING
        let Some(code) = extract_code(&self.redirect) else {
            info!("Callback reached without an authorization code");
            return self.fail(AuthError::MissingCode.user_message());
        };

        // EXCHANGING
        if !self.transition(CallbackState::Exchanging) {
            return CallbackOutcome::Abandoned;
        }
        let result = self.exchange.exchange(&code).await;

        if !self.is_mounted() {
            info!(
                succeeded = result.is_ok(),
                "Callback torn down during exchange, discarding result"
            );
            return CallbackOutcome::Abandoned;
        }

        let grant = match result {
            Ok(grant) => grant,
            Err(e) => {
                error!(error = %e, "Authentication error");
                return self.fail(e.user_message());
            }
        };

        // PERSISTING
        if !self.transition(CallbackState::Persisting) {
            return CallbackOutcome::Abandoned;
        }
        let bundle = grant.into_bundle(Utc::now());
        if let Err(e) = self.store.write(&bundle, &self.store.default_options()) {
            error!(error = %e, "Failed to persist credentials");
            if let Err(e) = self.store.clear() {
                error!(error = %e, "Failed to roll back partial credentials");
            }
            return self.fail(PERSIST_FAILURE_MESSAGE.to_string());
        }

        // REDIRECTING
        if !self.transition(CallbackState::Redirecting) {
            return CallbackOutcome::Abandoned;
        }
        info!("Login complete, returning home");
        self.navigator.push(HOME_ROUTE);
        self.navigator.refresh();
        CallbackOutcome::Redirected
    }
}
