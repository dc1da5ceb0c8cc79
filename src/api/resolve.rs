//! Resolution endpoints: each returns the ordered link candidates for an
//! artifact as JSON, for the presentation layer to render.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

use super::error::ApiError;
use crate::github::types::Repository;
use crate::resolver::ResolvedArtifact;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CheckSuiteQuery {
    pub check_suite_id: Option<i64>,
}

/// GET /:owner/:repo/workflows/:workflow/:branch/:artifact
pub async fn by_branch(
    State(state): State<Arc<AppState>>,
    Path((owner, repo, workflow, branch, artifact)): Path<(String, String, String, String, String)>,
) -> Result<Json<ResolvedArtifact>, ApiError> {
    let resolved = state
        .resolver
        .by_branch(&owner, &repo, &workflow, &branch, &artifact)
        .await?;
    Ok(Json(resolved))
}

/// GET /:owner/:repo/actions/runs/:run_id/:artifact
pub async fn by_run(
    State(state): State<Arc<AppState>>,
    Path((owner, repo, run_id, artifact)): Path<(String, String, i64, String)>,
    Query(query): Query<CheckSuiteQuery>,
) -> Result<Json<ResolvedArtifact>, ApiError> {
    let resolved = state
        .resolver
        .by_run(&owner, &repo, run_id, &artifact, query.check_suite_id)
        .await?;
    Ok(Json(resolved))
}

/// GET /:owner/:repo/actions/artifacts/:artifact_id
pub async fn by_artifact(
    State(state): State<Arc<AppState>>,
    Path((owner, repo, artifact_id)): Path<(String, String, i64)>,
    Query(query): Query<CheckSuiteQuery>,
) -> Result<Json<ResolvedArtifact>, ApiError> {
    let resolved = state
        .resolver
        .by_artifact(&owner, &repo, artifact_id, query.check_suite_id)
        .await?;
    Ok(Json(resolved))
}

/// GET /installations/:owner/repositories
///
/// Lists what the owner's installation can currently reach. The token is
/// refreshed unconditionally: the grant may have narrowed since the cached
/// token was minted, and a stale token would still honor revoked access.
pub async fn installation_repositories(
    State(state): State<Arc<AppState>>,
    Path(owner): Path<String>,
) -> Result<Json<Vec<Repository>>, ApiError> {
    let installation_id = state.directory.read(&owner).await?.ok_or_else(|| {
        ApiError::not_found(format!("no installation recorded for {owner}"))
    })?;
    let token = state.authority.token(installation_id, true).await?;
    let repositories = state.github.list_installation_repositories(&token).await?;
    Ok(Json(repositories))
}
