//! Source-of-truth repository access (GitHub) and webhook event
//! normalization.

use async_trait::async_trait;
use serde::Deserialize;
use service_core::error::AppError;

use crate::config::SourceConfig;

/// Reads document bodies and the content tree from the source repository.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Raw markdown body for one repository path.
    async fn fetch_file(&self, path: &str) -> Result<String, AppError>;
    /// Every content path in the source tree, for a full resync.
    async fn list_content_paths(&self) -> Result<Vec<String>, AppError>;
}

/// Inbound push event as GitHub sends it. Parsed only after signature
/// verification.
#[derive(Debug, Clone, Deserialize)]
pub struct PushEventPayload {
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub after: Option<String>,
    #[serde(default)]
    pub commits: Vec<PushCommit>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushCommit {
    #[serde(default)]
    pub added: Vec<String>,
    #[serde(default)]
    pub modified: Vec<String>,
    #[serde(default)]
    pub removed: Vec<String>,
}

/// Push event reduced to what the pipeline needs, isolating it from the
/// source repository's wire format.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedPush {
    pub branch: String,
    pub revision: Option<String>,
    pub changed_paths: Vec<String>,
    pub removed_paths: Vec<String>,
}

impl NormalizedPush {
    pub fn from_payload(payload: &PushEventPayload) -> Self {
        let branch = payload
            .git_ref
            .strip_prefix("refs/heads/")
            .unwrap_or(&payload.git_ref)
            .to_string();

        let mut changed_paths = Vec::new();
        let mut removed_paths = Vec::new();
        for commit in &payload.commits {
            for path in commit.added.iter().chain(commit.modified.iter()) {
                if !changed_paths.contains(path) {
                    changed_paths.push(path.clone());
                }
            }
            for path in &commit.removed {
                if !removed_paths.contains(path) {
                    removed_paths.push(path.clone());
                }
            }
        }
        // A path re-added in a later commit is a change, not a removal.
        removed_paths.retain(|p| !changed_paths.contains(p));

        Self {
            branch,
            revision: payload.after.clone(),
            changed_paths,
            removed_paths,
        }
    }
}

/// True for markdown documents under the configured content root.
pub fn is_content_path(path: &str, content_root: &str) -> bool {
    path.starts_with(&format!("{}/", content_root)) && path.ends_with(".md")
}

/// Filter an event down to content-relevant paths only.
pub fn select_changed_paths(event: &NormalizedPush, content_root: &str) -> Vec<String> {
    event
        .changed_paths
        .iter()
        .filter(|p| is_content_path(p, content_root))
        .cloned()
        .collect()
}

pub fn select_removed_paths(event: &NormalizedPush, content_root: &str) -> Vec<String> {
    event
        .removed_paths
        .iter()
        .filter(|p| is_content_path(p, content_root))
        .cloned()
        .collect()
}

/// GitHub-backed fetcher using the contents and git-trees APIs.
pub struct GithubFetcher {
    client: reqwest::Client,
    api_base: String,
    repo: String,
    branch: String,
    token: String,
    content_root: String,
}

impl GithubFetcher {
    pub fn new(config: &SourceConfig) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .user_agent("content-gateway")
            .build()
            .map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            repo: config.repo.clone(),
            branch: config.branch.clone(),
            token: config.token.clone(),
            content_root: config.content_root.clone(),
        })
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.token.is_empty() {
            req
        } else {
            req.bearer_auth(&self.token)
        }
    }
}

#[derive(Debug, Deserialize)]
struct TreeResponse {
    tree: Vec<TreeEntry>,
}

#[derive(Debug, Deserialize)]
struct TreeEntry {
    path: String,
    #[serde(rename = "type")]
    entry_type: String,
}

#[async_trait]
impl SourceFetcher for GithubFetcher {
    async fn fetch_file(&self, path: &str) -> Result<String, AppError> {
        let url = format!(
            "{}/repos/{}/contents/{}?ref={}",
            self.api_base, self.repo, path, self.branch
        );

        let response = self
            .authorize(self.client.get(&url))
            .header("Accept", "application/vnd.github.raw")
            .send()
            .await
            .map_err(|e| AppError::UpstreamError(format!("Source fetch failed for {}: {}", path, e)))?;

        match response.status() {
            reqwest::StatusCode::OK => response.text().await.map_err(|e| {
                AppError::UpstreamError(format!("Source body read failed for {}: {}", path, e))
            }),
            reqwest::StatusCode::NOT_FOUND => Err(AppError::NotFound(anyhow::anyhow!(
                "Source file not found: {}",
                path
            ))),
            status => Err(AppError::UpstreamError(format!(
                "Source returned {} for {}",
                status, path
            ))),
        }
    }

    async fn list_content_paths(&self) -> Result<Vec<String>, AppError> {
        let url = format!(
            "{}/repos/{}/git/trees/{}?recursive=1",
            self.api_base, self.repo, self.branch
        );

        let response = self
            .authorize(self.client.get(&url))
            .header("Accept", "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| AppError::UpstreamError(format!("Source tree listing failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::UpstreamError(format!(
                "Source returned {} for tree listing",
                response.status()
            )));
        }

        let tree: TreeResponse = response.json().await.map_err(|e| {
            AppError::UpstreamError(format!("Source tree response was not valid JSON: {}", e))
        })?;

        Ok(tree
            .tree
            .into_iter()
            .filter(|e| e.entry_type == "blob" && is_content_path(&e.path, &self.content_root))
            .map(|e| e.path)
            .collect())
    }
}
