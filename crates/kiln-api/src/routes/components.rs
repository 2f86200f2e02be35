//! Component catalog endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use kiln_core::{Component, NewComponent};

use crate::AppState;
use crate::error::ApiError;
use crate::services::catalog;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_components).post(create_component))
        .route("/{name}", get(get_component).delete(delete_component))
}

async fn list_components(State(state): State<AppState>) -> Result<Json<Vec<Component>>, ApiError> {
    Ok(Json(state.components.list().await?))
}

async fn create_component(
    State(state): State<AppState>,
    Json(req): Json<NewComponent>,
) -> Result<(StatusCode, Json<Component>), ApiError> {
    let component = catalog::create_component(&state, req).await?;
    Ok((StatusCode::CREATED, Json(component)))
}

async fn get_component(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Component>, ApiError> {
    Ok(Json(state.components.get_by_name(&name).await?))
}

async fn delete_component(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    catalog::delete_component(&state, &name).await?;
    Ok(StatusCode::NO_CONTENT)
}
