//! Build requests, lookups, deletion and operational release.

use kiln_core::{BuildRecord, Error, LogEntry, NewBuild, ResourceId, Result};
use tracing::info;

use crate::AppState;

/// Create one PENDING build per build OS of the component.
///
/// Fails before anything is written if the branch is unknown or the
/// component cannot be built.
pub async fn request_builds(
    state: &AppState,
    component_name: &str,
    branch: &str,
    requested_by: &str,
) -> Result<Vec<BuildRecord>> {
    let component = state.components.get_by_name(component_name).await?;

    if !component.has_branch(branch) {
        return Err(Error::NotFound(format!(
            "branch '{}' of component '{}'",
            branch, component.name
        )));
    }
    if component.repository_url.is_none() {
        return Err(Error::PreconditionFailed(format!(
            "component '{}' has no repository URL",
            component.name
        )));
    }
    if component.build_os.is_empty() {
        return Err(Error::PreconditionFailed(format!(
            "component '{}' has no build OS configured",
            component.name
        )));
    }

    let new: Vec<NewBuild> = component
        .build_os
        .iter()
        .map(|os| NewBuild {
            component_id: component.id,
            branch_name: branch.to_string(),
            build_os: os.clone(),
            created_by: requested_by.to_string(),
        })
        .collect();

    let builds = state.builds.create_many(new).await?;
    info!(
        component = %component.name,
        branch,
        count = builds.len(),
        "Requested builds"
    );
    Ok(builds)
}

pub async fn list_builds(
    state: &AppState,
    component_name: &str,
    branch: &str,
) -> Result<Vec<BuildRecord>> {
    let component = state.components.get_by_name(component_name).await?;
    Ok(state.builds.list_for_branch(component.id, branch).await?)
}

pub async fn get_build(state: &AppState, id: ResourceId) -> Result<BuildRecord> {
    Ok(state.builds.get_by_id(id).await?)
}

pub async fn build_logs(state: &AppState, id: ResourceId) -> Result<Vec<LogEntry>> {
    state.builds.get_by_id(id).await?;
    Ok(state.logs.list_for_build(id).await?)
}

/// Delete a build and its log lines.
///
/// The delete is version-checked, so it can collide with a worker
/// claiming or releasing the build; those collisions are retried.
pub async fn delete_build(state: &AppState, id: ResourceId) -> Result<()> {
    state
        .retry
        .run(|| async move {
            let build = state.builds.get_by_id(id).await?;
            state.logs.delete_for_build(id).await?;
            state.builds.delete(id, build.version).await
        })
        .await?;
    info!(build_id = %id, "Deleted build");
    Ok(())
}

/// Return a stuck IN_PROGRESS build to PENDING.
pub async fn force_release(
    state: &AppState,
    id: ResourceId,
    released_by: &str,
) -> Result<BuildRecord> {
    let build = state.builds.get_by_id(id).await?;
    if !state.queue.force_release(id, released_by).await? {
        return Err(Error::PreconditionFailed(format!(
            "build {} is {}, only IN_PROGRESS builds can be released",
            id, build.build_status
        )));
    }
    info!(build_id = %id, released_by, "Force released build");
    Ok(state.builds.get_by_id(id).await?)
}
