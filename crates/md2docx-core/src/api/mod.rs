//! REST API client module for the conversion backend.
//!
//! This module provides the `ApiClient` for starting the Google login flow
//! and for the document listing, conversion and archive download calls.
//!
//! Document calls authenticate with the stored access token as a bearer
//! credential.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;
