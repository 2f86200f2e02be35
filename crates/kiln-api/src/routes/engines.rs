//! Artifact engine endpoints.

use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use kiln_core::ResourceId;
use std::collections::BTreeMap;

use crate::AppState;
use crate::error::ApiError;
use crate::services::artifacts;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/all", get(list_engines))
        .route("/generate", get(generate))
}

async fn list_engines(State(state): State<AppState>) -> Json<Vec<&'static str>> {
    Json(state.engines.engine_names())
}

/// `?engineName=docker&componentId=<id>&componentId=<id>&osType=ubuntu`
///
/// Every parameter other than `engineName` and `componentId` goes into the
/// build spec.
async fn generate(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Response, ApiError> {
    let mut engine_name = None;
    let mut components: Vec<ResourceId> = Vec::new();
    let mut spec = BTreeMap::new();
    for (key, value) in params {
        match key.as_str() {
            "engineName" => engine_name = Some(value),
            "componentId" => components.push(value.parse()?),
            _ => {
                spec.insert(key, value);
            }
        }
    }
    let engine_name = engine_name.ok_or_else(|| ApiError::bad_request("engineName is required"))?;

    let artifact = artifacts::generate(&state, &engine_name, &components, &spec).await?;
    let disposition = format!("attachment; filename=\"{}\"", artifact.file_name);

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        artifact.content,
    )
        .into_response())
}
