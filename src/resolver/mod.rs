//! Three-stage artifact resolution: branch → run → artifact.
//!
//! Each stage produces an ordered list of link candidates. The ordering is
//! a contract: earlier links are more specific and ephemeral, later links
//! more stable and navigable. Presentation may reverse the order, but
//! resolution always emits it in this sequence.

use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::directory::InstallationDirectory;
use crate::error::{Error, Result};
use crate::github::{AppAuthority, Credential, GitHubApi};

/// One download or deep-link candidate.
#[derive(Debug, Clone, Serialize)]
pub struct Link {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Whether the link leaves this service (GitHub UI, signed storage URL).
    #[serde(rename = "isExternal")]
    pub external: bool,
}

impl Link {
    fn new(url: String, title: &str, external: bool) -> Self {
        Self {
            url,
            title: Some(title.to_string()),
            external,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedArtifact {
    pub title: String,
    pub links: Vec<Link>,
}

pub struct ArtifactResolver {
    public_url: String,
    directory: Arc<InstallationDirectory>,
    authority: Arc<AppAuthority>,
    api: Arc<dyn GitHubApi>,
}

impl ArtifactResolver {
    pub fn new(
        public_url: String,
        directory: Arc<InstallationDirectory>,
        authority: Arc<AppAuthority>,
        api: Arc<dyn GitHubApi>,
    ) -> Self {
        Self {
            public_url: public_url.trim_end_matches('/').to_string(),
            directory,
            authority,
            api,
        }
    }

    /// Installation credential for the repository owner, via directory
    /// lookup. Owners without a recorded installation cannot be served.
    async fn tenant_token(&self, owner: &str) -> Result<Credential> {
        let installation_id = self
            .directory
            .read(owner)
            .await?
            .ok_or_else(|| Error::MissingTenant(owner.to_string()))?;
        self.authority.token(installation_id, false).await
    }

    /// Resolves one artifact by id. Links: the ephemeral signed download
    /// URL, this service's stable per-artifact URL, and (when the check
    /// suite is known) the GitHub UI page for the artifact.
    pub async fn by_artifact(
        &self,
        owner: &str,
        repo: &str,
        artifact_id: i64,
        check_suite_id: Option<i64>,
    ) -> Result<ResolvedArtifact> {
        let token = self.tenant_token(owner).await?;
        let download_url = self
            .api
            .artifact_download_url(owner, repo, artifact_id, &token)
            .await?;
        debug!(owner, repo, artifact_id, "resolved ephemeral artifact URL");

        let mut links = vec![
            Link::new(
                download_url,
                "direct download link (expires in less than a minute)",
                true,
            ),
            Link::new(
                format!(
                    "{}/{owner}/{repo}/actions/artifacts/{artifact_id}.zip",
                    self.public_url
                ),
                "stable link for this artifact",
                false,
            ),
        ];
        if let Some(check_suite_id) = check_suite_id {
            links.push(Link::new(
                format!(
                    "https://github.com/{owner}/{repo}/suites/{check_suite_id}/artifacts/{artifact_id}"
                ),
                "view artifact on GitHub",
                true,
            ));
        }

        Ok(ResolvedArtifact {
            title: format!("{owner}/{repo} artifact #{artifact_id}"),
            links,
        })
    }

    /// Resolves the first artifact (server order) of a run whose name
    /// matches; artifact names are not unique upstream, first match wins.
    pub async fn by_run(
        &self,
        owner: &str,
        repo: &str,
        run_id: i64,
        artifact_name: &str,
        check_suite_id: Option<i64>,
    ) -> Result<ResolvedArtifact> {
        let token = self.tenant_token(owner).await?;
        let artifacts = self
            .api
            .list_run_artifacts(owner, repo, run_id, &token)
            .await?;
        let artifact = artifacts
            .iter()
            .find(|artifact| artifact.name == artifact_name)
            .ok_or_else(|| Error::NotFound("no artifacts for run".to_string()))?;

        let mut resolved = self
            .by_artifact(owner, repo, artifact.id, check_suite_id)
            .await?;
        resolved.links.push(Link::new(
            format!(
                "{}/{owner}/{repo}/actions/runs/{run_id}/{}",
                self.public_url,
                zip_name(artifact_name)
            ),
            "stable link for this run",
            false,
        ));
        resolved.links.push(Link::new(
            format!("https://github.com/{owner}/{repo}/actions/runs/{run_id}#artifacts"),
            "view run on GitHub",
            true,
        ));
        resolved.title = format!("{} from run #{run_id}", artifact.name);
        Ok(resolved)
    }

    /// Resolves the newest successful push-triggered run of a workflow on
    /// a branch, then its artifact by name.
    pub async fn by_branch(
        &self,
        owner: &str,
        repo: &str,
        workflow: &str,
        branch: &str,
        artifact_name: &str,
    ) -> Result<ResolvedArtifact> {
        let workflow = normalize_workflow(workflow);
        let token = self.tenant_token(owner).await?;
        // Only the newest run matters; ask for a single-run page.
        let runs = self
            .api
            .list_workflow_runs(owner, repo, &workflow, branch, 1, &token)
            .await?;
        let run = runs.first().ok_or_else(|| {
            Error::NotFound("no artifacts for workflow and branch".to_string())
        })?;
        let check_suite_id = check_suite_id_from_url(&run.check_suite_url);

        let mut resolved = self
            .by_run(owner, repo, run.id, artifact_name, check_suite_id)
            .await?;
        resolved.links.push(Link::new(
            format!(
                "{}/{owner}/{repo}/workflows/{workflow}/{branch}/{}",
                self.public_url,
                zip_name(artifact_name)
            ),
            "stable link for this branch",
            false,
        ));
        resolved.links.push(Link::new(
            format!(
                "https://github.com/{owner}/{repo}/actions?query=event:push is:success workflow:{workflow} branch:{branch}"
            ),
            "browse runs on GitHub",
            true,
        ));
        Ok(resolved)
    }
}

/// Bare workflow names refer to files under `.github/workflows`; numeric
/// workflow ids pass through untouched.
fn normalize_workflow(workflow: &str) -> String {
    if workflow.chars().all(|c| c.is_ascii_digit()) || workflow.ends_with(".yml") {
        workflow.to_string()
    } else {
        format!("{workflow}.yml")
    }
}

/// Stable links end in `.zip`; artifact names may or may not already.
fn zip_name(artifact_name: &str) -> String {
    if artifact_name.ends_with(".zip") {
        artifact_name.to_string()
    } else {
        format!("{artifact_name}.zip")
    }
}

/// The check suite id is the trailing path segment of a run's
/// `check_suite_url`.
fn check_suite_id_from_url(url: &str) -> Option<i64> {
    url.rsplit('/').next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TtlCache;
    use crate::config::GitHubConfig;
    use crate::directory::DIRECTORY_CACHE_TTL;
    use crate::github::testing::FakeGitHub;
    use crate::github::types::{Artifact, WorkflowRun};
    use crate::github::TOKEN_CACHE_TTL;
    use sqlx::sqlite::SqlitePoolOptions;

    #[test]
    fn test_workflow_normalization() {
        assert_eq!(normalize_workflow("42"), "42");
        assert_eq!(normalize_workflow("build"), "build.yml");
        assert_eq!(normalize_workflow("build.yml"), "build.yml");
    }

    #[test]
    fn test_zip_name_suffix() {
        assert_eq!(zip_name("out"), "out.zip");
        assert_eq!(zip_name("out.zip"), "out.zip");
    }

    #[test]
    fn test_check_suite_id_extraction() {
        assert_eq!(
            check_suite_id_from_url("https://api.github.com/repos/o/r/check-suites/1234"),
            Some(1234)
        );
        assert_eq!(check_suite_id_from_url("not-a-url"), None);
    }

    fn fake_with_one_run() -> FakeGitHub {
        FakeGitHub {
            runs: vec![WorkflowRun {
                id: 77,
                event: "push".to_string(),
                head_branch: Some("main".to_string()),
                check_suite_url: "https://api.github.com/repos/o/r/check-suites/1234".to_string(),
            }],
            artifacts: vec![Artifact {
                id: 9,
                name: "out.zip".to_string(),
                size_in_bytes: 1024,
                expired: false,
            }],
            ..FakeGitHub::default()
        }
    }

    async fn resolver_with(fake: FakeGitHub) -> (ArtifactResolver, Arc<FakeGitHub>) {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::db::run_migrations(&pool).await.unwrap();

        let directory = Arc::new(InstallationDirectory::new(
            pool,
            TtlCache::new(DIRECTORY_CACHE_TTL),
        ));
        directory.write("o", 55).await.unwrap();
        directory.mark_ready();

        let fake = Arc::new(fake);
        let jwt_cache = TtlCache::new(TOKEN_CACHE_TTL);
        jwt_cache.insert(7, "seeded-jwt".to_string());
        let authority = Arc::new(AppAuthority::new(
            GitHubConfig {
                app_id: 7,
                private_key_path: "/nonexistent/app_key.pem".into(),
                client_id: "Iv1.test".to_string(),
                client_secret: "secret".to_string(),
            },
            fake.clone(),
            jwt_cache,
            TtlCache::new(TOKEN_CACHE_TTL),
        ));

        let resolver = ArtifactResolver::new(
            "https://artilink.example".to_string(),
            directory,
            authority,
            fake.clone(),
        );
        (resolver, fake)
    }

    #[tokio::test]
    async fn test_by_branch_link_ordering() {
        let (resolver, fake) = resolver_with(fake_with_one_run()).await;
        let resolved = resolver
            .by_branch("o", "r", "build", "main", "out.zip")
            .await
            .unwrap();

        let urls: Vec<&str> = resolved.links.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://artifacts.example/signed/download.zip",
                "https://artilink.example/o/r/actions/artifacts/9.zip",
                "https://github.com/o/r/suites/1234/artifacts/9",
                "https://artilink.example/o/r/actions/runs/77/out.zip",
                "https://github.com/o/r/actions/runs/77#artifacts",
                "https://artilink.example/o/r/workflows/build.yml/main/out.zip",
                "https://github.com/o/r/actions?query=event:push is:success workflow:build.yml branch:main",
            ]
        );

        // Ordering contract: ephemeral first, browse-runs last.
        assert_eq!(urls[0], "https://artifacts.example/signed/download.zip");
        assert!(urls
            .last()
            .unwrap()
            .contains("event:push is:success workflow:build.yml branch:main"));

        assert_eq!(resolved.title, "out.zip from run #77");

        // The run listing saw the normalized workflow file name.
        assert_eq!(
            fake.run_queries.lock().unwrap().as_slice(),
            ["build.yml@main"]
        );
    }

    #[tokio::test]
    async fn test_by_artifact_without_check_suite_has_no_deep_link() {
        let (resolver, _fake) = resolver_with(fake_with_one_run()).await;
        let resolved = resolver.by_artifact("o", "r", 9, None).await.unwrap();
        assert_eq!(resolved.links.len(), 2);
        assert!(resolved.links.iter().all(|l| !l.url.contains("/suites/")));
    }

    #[tokio::test]
    async fn test_by_artifact_with_check_suite_appends_deep_link() {
        let (resolver, _fake) = resolver_with(fake_with_one_run()).await;
        let resolved = resolver.by_artifact("o", "r", 9, Some(1234)).await.unwrap();
        assert_eq!(resolved.links.len(), 3);
        assert_eq!(
            resolved.links[2].url,
            "https://github.com/o/r/suites/1234/artifacts/9"
        );
    }

    #[tokio::test]
    async fn test_by_run_picks_first_matching_name() {
        let mut fake = fake_with_one_run();
        fake.artifacts = vec![
            Artifact {
                id: 8,
                name: "other.zip".to_string(),
                size_in_bytes: 1,
                expired: false,
            },
            Artifact {
                id: 9,
                name: "out.zip".to_string(),
                size_in_bytes: 1024,
                expired: false,
            },
            Artifact {
                id: 10,
                name: "out.zip".to_string(),
                size_in_bytes: 2048,
                expired: false,
            },
        ];
        let (resolver, _fake) = resolver_with(fake).await;
        let resolved = resolver.by_run("o", "r", 77, "out.zip", None).await.unwrap();
        // First match in server order wins: artifact 9, not 10.
        assert!(resolved.links[1].url.ends_with("/actions/artifacts/9.zip"));
    }

    #[tokio::test]
    async fn test_by_run_without_matching_artifact_is_not_found() {
        let (resolver, _fake) = resolver_with(fake_with_one_run()).await;
        let err = resolver
            .by_run("o", "r", 77, "missing.zip", None)
            .await
            .unwrap_err();
        match err {
            Error::NotFound(message) => assert_eq!(message, "no artifacts for run"),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_by_branch_without_runs_is_not_found() {
        let mut fake = fake_with_one_run();
        fake.runs.clear();
        let (resolver, _fake) = resolver_with(fake).await;
        let err = resolver
            .by_branch("o", "r", "build", "main", "out.zip")
            .await
            .unwrap_err();
        match err {
            Error::NotFound(message) => {
                assert_eq!(message, "no artifacts for workflow and branch")
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_owner_is_missing_tenant() {
        let (resolver, _fake) = resolver_with(fake_with_one_run()).await;
        let err = resolver
            .by_artifact("stranger", "r", 9, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingTenant(owner) if owner == "stranger"));
    }
}
