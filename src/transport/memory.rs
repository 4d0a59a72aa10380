use super::{
    cancellable, CommitMode, CommitOutcome, CommitRequest, CommitSink, ContentLocation,
    ContentSource, FetchError, ReleaseDirectory, RepoRef,
};
use crate::types::{Release, Releases};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// In-memory transport for tests and offline runs.
///
/// Resources registered with [`MemoryTransport::fail_on`] answer with an
/// HTTP 500 style error; everything unregistered is not found.
#[derive(Default)]
pub struct MemoryTransport {
    contents: RwLock<HashMap<ContentLocation, Bytes>>,
    releases: RwLock<HashMap<RepoRef, Vec<Release>>>,
    notes: RwLock<HashMap<(RepoRef, String, String), String>>,
    failures: RwLock<HashMap<String, String>>,
    commits: RwLock<Vec<CommitRequest>>,
    latency: RwLock<HashMap<String, Duration>>,
    calls: AtomicUsize,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content(self, location: ContentLocation, content: impl Into<Bytes>) -> Self {
        self.insert_content(location, content);
        self
    }

    pub fn insert_content(&self, location: ContentLocation, content: impl Into<Bytes>) {
        self.contents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(location, content.into());
    }

    pub fn with_release(self, repo: RepoRef, release: Release) -> Self {
        self.releases
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(repo)
            .or_default()
            .push(release);
        self
    }

    pub fn with_notes(
        self,
        repo: RepoRef,
        base: impl Into<String>,
        head: impl Into<String>,
        notes: impl Into<String>,
    ) -> Self {
        self.notes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((repo, base.into(), head.into()), notes.into());
        self
    }

    /// Make calls for `resource` fail. `resource` is the display form of a
    /// [`ContentLocation`] or [`RepoRef`].
    pub fn fail_on(self, resource: impl Into<String>, message: impl Into<String>) -> Self {
        self.failures
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(resource.into(), message.into());
        self
    }

    /// Delay answers for `resource` by `delay`.
    pub fn with_latency(self, resource: impl Into<String>, delay: Duration) -> Self {
        self.latency
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(resource.into(), delay);
        self
    }

    /// Requests received by the commit sink, in order.
    pub fn commits(&self) -> Vec<CommitRequest> {
        self.commits
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of collaborator calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn enter(&self, resource: &str) -> Result<(), FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self
            .latency
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(resource)
            .copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let failure = self
            .failures
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(resource)
            .cloned();
        match failure {
            Some(message) => Err(FetchError::Status {
                status: 500,
                resource: resource.to_string(),
                message,
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ContentSource for MemoryTransport {
    async fn fetch(
        &self,
        location: &ContentLocation,
        cancel: &CancellationToken,
    ) -> Result<Bytes, FetchError> {
        let resource = location.to_string();
        cancellable(cancel, self.enter(&resource)).await?;
        self.contents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(location)
            .cloned()
            .ok_or_else(|| FetchError::not_found(resource))
    }
}

#[async_trait]
impl ReleaseDirectory for MemoryTransport {
    async fn releases(
        &self,
        repo: &RepoRef,
        cancel: &CancellationToken,
    ) -> Result<Releases, FetchError> {
        let resource = repo.to_string();
        cancellable(cancel, self.enter(&resource)).await?;
        self.releases
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(repo)
            .map(|releases| Releases::new(releases.clone()))
            .ok_or_else(|| FetchError::not_found(format!("releases of {}", resource)))
    }

    async fn release_notes(
        &self,
        repo: &RepoRef,
        base: &str,
        head: &str,
        cancel: &CancellationToken,
    ) -> Result<String, FetchError> {
        let resource = repo.to_string();
        cancellable(cancel, self.enter(&resource)).await?;
        self.notes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(repo.clone(), base.to_string(), head.to_string()))
            .cloned()
            .ok_or_else(|| {
                FetchError::not_found(format!("release notes of {} {}..{}", resource, base, head))
            })
    }
}

#[async_trait]
impl CommitSink for MemoryTransport {
    async fn submit(
        &self,
        request: &CommitRequest,
        cancel: &CancellationToken,
    ) -> Result<CommitOutcome, FetchError> {
        cancellable(cancel, self.enter(&request.repo.to_string())).await?;
        let mut commits = self.commits.write().unwrap_or_else(PoisonError::into_inner);
        commits.push(request.clone());
        Ok(match &request.mode {
            CommitMode::Direct => CommitOutcome::Committed {
                branch: request.base_branch.clone(),
            },
            CommitMode::PullRequest { .. } => CommitOutcome::PullRequestOpened {
                url: format!("memory://{}/pull/{}", request.repo, commits.len()),
            },
        })
    }
}
