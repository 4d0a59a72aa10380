//! External collaborators: content fetch, release directory, commit sink.
//!
//! 外部协作者：内容获取、发布目录与提交。
//!
//! | Item | Description |
//! |------|-------------|
//! | [`ContentSource`] | Raw file bytes at a ref |
//! | [`ReleaseDirectory`] | Releases and release notes per repository |
//! | [`CommitSink`] | Direct commit or pull request with new file content |
//! | [`GithubTransport`] | All three over the GitHub REST API |
//! | [`MemoryTransport`] | All three in memory, for tests and offline use |
//!
//! Every call takes a [`CancellationToken`]; a cancelled token ends the call
//! with [`FetchError::Cancelled`]. No call retries on its own.

mod http;
mod memory;

pub use http::GithubTransport;
pub use memory::MemoryTransport;

use crate::types::{Release, Releases};
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Transport-level failures.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("HTTP {status} for {resource}: {message}")]
    Status {
        status: u16,
        resource: String,
        message: String,
    },

    #[error("Failed to decode {resource}: {reason}")]
    Decode { resource: String, reason: String },

    #[error("Request cancelled")]
    Cancelled,

    #[error("Transport error: {0}")]
    Other(String),
}

impl FetchError {
    pub fn not_found(resource: impl Into<String>) -> Self {
        FetchError::NotFound {
            resource: resource.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::NotFound { .. })
            || matches!(self, FetchError::Status { status: 404, .. })
    }
}

/// `owner/name` of a repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// A file at a ref (tag, branch or commit).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentLocation {
    pub repo: RepoRef,
    pub path: String,
    pub reference: String,
}

impl ContentLocation {
    pub fn new(repo: RepoRef, path: impl Into<String>, reference: impl Into<String>) -> Self {
        Self {
            repo,
            path: path.into(),
            reference: reference.into(),
        }
    }
}

impl fmt::Display for ContentLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.repo, self.path, self.reference)
    }
}

#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Raw bytes of the file at `location`.
    async fn fetch(
        &self,
        location: &ContentLocation,
        cancel: &CancellationToken,
    ) -> Result<Bytes, FetchError>;
}

#[async_trait]
pub trait ReleaseDirectory: Send + Sync {
    /// Published releases of `repo`, newest first.
    async fn releases(
        &self,
        repo: &RepoRef,
        cancel: &CancellationToken,
    ) -> Result<Releases, FetchError>;

    async fn latest_release(
        &self,
        repo: &RepoRef,
        cancel: &CancellationToken,
    ) -> Result<Release, FetchError> {
        self.releases(repo, cancel)
            .await?
            .latest()
            .cloned()
            .ok_or_else(|| FetchError::not_found(format!("latest release of {}", repo)))
    }

    /// Release notes for the changes between tags `base` and `head`.
    async fn release_notes(
        &self,
        repo: &RepoRef,
        base: &str,
        head: &str,
        cancel: &CancellationToken,
    ) -> Result<String, FetchError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitAuthor {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CommitMode {
    /// Commit straight onto the base branch.
    Direct,
    /// Commit onto a new branch and open a pull request against the base branch.
    PullRequest { branch: String, title: String, body: String },
}

/// New content for one file plus everything needed to record it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRequest {
    pub repo: RepoRef,
    pub path: String,
    pub content: Bytes,
    pub base_branch: String,
    pub author: CommitAuthor,
    pub message: String,
    pub mode: CommitMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommitOutcome {
    Committed { branch: String },
    PullRequestOpened { url: String },
}

#[async_trait]
pub trait CommitSink: Send + Sync {
    async fn submit(
        &self,
        request: &CommitRequest,
        cancel: &CancellationToken,
    ) -> Result<CommitOutcome, FetchError>;
}

/// Run `fut` unless `cancel` fires first.
pub(crate) async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T, FetchError>
where
    F: Future<Output = Result<T, FetchError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(FetchError::Cancelled),
        result = fut => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_display() {
        let location = ContentLocation::new(
            RepoRef::new("acme", "platform-chart"),
            "charts/services/values.yaml",
            "v1.2.0",
        );
        assert_eq!(
            location.to_string(),
            "acme/platform-chart/charts/services/values.yaml@v1.2.0"
        );
    }

    #[tokio::test]
    async fn test_cancellable_short_circuits() {
        let token = CancellationToken::new();
        token.cancel();
        let result: Result<(), FetchError> =
            cancellable(&token, futures::future::pending()).await;
        assert!(matches!(result, Err(FetchError::Cancelled)));
    }
}
