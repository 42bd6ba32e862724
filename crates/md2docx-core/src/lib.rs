//! md2docx core library.
//!
//! This crate owns everything the terminal client needs that is not
//! presentation:
//!
//! - `auth`: OAuth2 callback handling, credential persistence and session validity
//! - `gate`: the application shell's login/logout and protected-action guard
//! - `api`: REST client for the conversion backend
//! - `config`: application configuration and directory resolution

pub mod api;
pub mod auth;
pub mod config;
pub mod gate;
pub mod models;

pub use config::Config;
pub use gate::{GateError, SessionGate};
