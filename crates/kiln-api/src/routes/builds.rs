//! Build endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use kiln_core::{BuildRecord, BuildStatus, LogEntry, ResourceId};
use serde::Serialize;

use crate::AppState;
use crate::error::ApiError;
use crate::services::builds;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/component/{name}/branch/{branch}",
            get(list_builds).post(request_builds),
        )
        .route("/{id}", get(get_build).delete(delete_build))
        .route("/{id}/logs", get(build_logs))
        .route("/{id}/release", post(release_build))
}

#[derive(Debug, Serialize)]
struct BuildSummary {
    id: ResourceId,
    branch_name: String,
    build_os: String,
    build_status: BuildStatus,
    builder_name: Option<String>,
    locked_by: Option<String>,
    last_process_time: DateTime<Utc>,
    created_date: DateTime<Utc>,
}

impl From<BuildRecord> for BuildSummary {
    fn from(b: BuildRecord) -> Self {
        Self {
            id: b.id,
            branch_name: b.branch_name,
            build_os: b.build_os,
            build_status: b.build_status,
            builder_name: b.build_info.builder_name,
            locked_by: b.locked_by,
            last_process_time: b.last_process_time,
            created_date: b.created_date,
        }
    }
}

fn parse_id(id: &str) -> Result<ResourceId, ApiError> {
    Ok(id.parse()?)
}

async fn request_builds(
    State(state): State<AppState>,
    Path((name, branch)): Path<(String, String)>,
) -> Result<(StatusCode, Json<Vec<ResourceId>>), ApiError> {
    let created = builds::request_builds(&state, &name, &branch, "api").await?;
    let ids = created.into_iter().map(|b| b.id).collect();
    Ok((StatusCode::CREATED, Json(ids)))
}

async fn list_builds(
    State(state): State<AppState>,
    Path((name, branch)): Path<(String, String)>,
) -> Result<Json<Vec<BuildSummary>>, ApiError> {
    let builds = builds::list_builds(&state, &name, &branch).await?;
    Ok(Json(builds.into_iter().map(BuildSummary::from).collect()))
}

async fn get_build(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BuildRecord>, ApiError> {
    Ok(Json(builds::get_build(&state, parse_id(&id)?).await?))
}

async fn delete_build(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    builds::delete_build(&state, parse_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn build_logs(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<LogEntry>>, ApiError> {
    Ok(Json(builds::build_logs(&state, parse_id(&id)?).await?))
}

async fn release_build(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BuildRecord>, ApiError> {
    Ok(Json(builds::force_release(&state, parse_id(&id)?, "api").await?))
}
