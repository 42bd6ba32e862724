//! Authentication module for the OAuth2 session lifecycle.
//!
//! This module provides:
//! - `CredentialBundle`: tokens, profile and computed expiry
//! - `CredentialStore`: durable persistence over a cookie jar
//! - `SessionState`: derived "is the user authenticated" view
//! - `AuthorizationExchange`: one-shot code-for-token exchange
//! - `CallbackController`: redirect landing state machine
//!
//! Sessions expire one hour after the exchange completes.

pub mod bundle;
pub mod callback;
pub mod cookies;
pub mod exchange;
pub mod session;
pub mod store;

pub use bundle::{CredentialBundle, SESSION_TTL_MS};
pub use callback::{
    extract_code, CallbackController, CallbackOutcome, CallbackState, MountHandle, Navigator,
    CALLBACK_ROUTE, HOME_ROUTE,
};
pub use cookies::{CookieOptions, CookieStorage, FileCookieJar, MemoryCookieJar, SameSite};
pub use exchange::{AuthError, AuthorizationExchange, TokenGrant};
pub use session::SessionState;
pub use store::CredentialStore;
