//! API routes.

pub mod builds;
pub mod components;
pub mod engines;
pub mod health;
pub mod templates;

use crate::AppState;
use axum::Router;

/// Build the main API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/build", builds::router())
        .nest("/engine", engines::router())
        .nest("/component", components::router())
        .nest("/template", templates::router())
        .merge(health::router())
        .with_state(state)
}
