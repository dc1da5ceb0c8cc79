//! Response types for the slice of the GitHub REST API this service uses.

use serde::{Deserialize, Serialize};

/// A user or organization account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub login: String,
    pub id: i64,
}

/// A GitHub App installation on one account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Installation {
    pub id: i64,
    pub account: Account,
}

/// A repository accessible to an installation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub id: i64,
    pub name: String,
    pub full_name: String,
    pub private: bool,
    pub html_url: String,
}

/// A single workflow run. Ephemeral: fetched per request, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: i64,
    pub event: String,
    pub head_branch: Option<String>,
    /// The run's check suite; its trailing path segment is the suite id.
    pub check_suite_url: String,
}

/// A build artifact attached to a workflow run. Names are not unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub id: i64,
    pub name: String,
    pub size_in_bytes: i64,
    pub expired: bool,
}

/// Body of `POST /app/installations/{id}/access_tokens`.
#[derive(Debug, Deserialize)]
pub struct AccessTokenResponse {
    pub token: String,
    pub expires_at: Option<String>,
}

/// Body of the OAuth code exchange. GitHub reports rejections as a 200
/// with an `error` field rather than a failure status.
#[derive(Debug, Deserialize)]
pub struct OAuthExchangeResponse {
    pub access_token: Option<String>,
    pub error: Option<String>,
}

// Paginated list envelopes. `/app/installations` returns a bare array and
// needs no wrapper; the rest nest their items under a named field.

#[derive(Debug, Deserialize)]
pub struct InstallationsPage {
    pub installations: Vec<Installation>,
}

#[derive(Debug, Deserialize)]
pub struct RepositoriesPage {
    pub repositories: Vec<Repository>,
}

#[derive(Debug, Deserialize)]
pub struct WorkflowRunsPage {
    pub workflow_runs: Vec<WorkflowRun>,
}

#[derive(Debug, Deserialize)]
pub struct ArtifactsPage {
    pub artifacts: Vec<Artifact>,
}
