//! Command template endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use kiln_core::{CommandTemplate, NewCommandTemplate};

use crate::AppState;
use crate::error::ApiError;
use crate::services::catalog;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_templates).post(create_template))
        .route("/{name}", get(get_template))
}

async fn list_templates(
    State(state): State<AppState>,
) -> Result<Json<Vec<CommandTemplate>>, ApiError> {
    Ok(Json(state.templates.list().await?))
}

async fn create_template(
    State(state): State<AppState>,
    Json(req): Json<NewCommandTemplate>,
) -> Result<(StatusCode, Json<CommandTemplate>), ApiError> {
    let template = catalog::create_template(&state, req).await?;
    Ok((StatusCode::CREATED, Json(template)))
}

async fn get_template(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<CommandTemplate>, ApiError> {
    Ok(Json(state.templates.get_by_name(&name).await?))
}
