//! API server for kiln.
//!
//! Provides the HTTP REST API for requesting builds, generating artifacts
//! and managing the component catalog.

pub mod error;
pub mod routes;
pub mod services;
pub mod state;

pub use state::AppState;
