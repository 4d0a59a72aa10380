//! Reconciliation workflow: fetch manifests and releases, compare, bump.
//!
//! 协调流程：并发获取清单与发布信息，比较快照，提交版本更新。
//!
//! | Item | Description |
//! |------|-------------|
//! | [`Reconciler::compare_versions`] | Diff the manifests of two platform releases |
//! | [`Reconciler::latest_snapshot`] | Manifest at the newest platform release |
//! | [`Reconciler::available_releases`] | Upstream releases newer than each service's pin |
//! | [`Reconciler::changelogs`] | Release notes for a comparison, per repository |
//! | [`Reconciler::bump_services`] | Rewrite pins and hand the result to a [`CommitSink`] |
//! | [`FanOut`] | Bounded concurrent fetches with one result per input |
//! | [`ServiceMappingTable`] | Service name to repository lookup |
//!
//! Only collaborator calls run concurrently. Parsing, decoding and comparing
//! happen after the join, on already fetched bytes.

pub mod fan_out;
mod mapping;

pub use fan_out::{first_failure, FanOut};
pub use mapping::{kebab_case, RepoTarget, ServiceMappingTable};

use crate::compare::{self, ComparisonResult};
use crate::config::{PlatformConfig, ReconcilerConfig};
use crate::manifest::{ManifestDocument, ServiceEdit};
use crate::transport::{
    CommitAuthor, CommitMode, CommitOutcome, CommitRequest, CommitSink, ContentLocation,
    ContentSource, FetchError, ReleaseDirectory, RepoRef,
};
use crate::types::{PlatformSnapshot, Release, Releases, ServiceEntry, ServiceMap};
use crate::{Error, ErrorContext, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Upstream releases of one service newer than the version it is pinned to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceReleases {
    pub service: String,
    pub repo: RepoRef,
    /// Release matching the pinned version.
    pub current: Release,
    /// Newer releases, newest first.
    pub available: Releases,
}

/// Result of [`Reconciler::bump_services`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BumpOutcome {
    /// Platform release the manifest was read at.
    pub base_release: Release,
    pub edits: Vec<ServiceEdit>,
    /// `None` when the manifest already matched and nothing was submitted.
    pub commit: Option<CommitOutcome>,
}

enum ChangelogJob {
    Notes { repo: RepoRef, base: String, head: String },
    Accumulated { repo: RepoRef, tag: String },
}

impl ChangelogJob {
    fn repo(&self) -> &RepoRef {
        match self {
            ChangelogJob::Notes { repo, .. } | ChangelogJob::Accumulated { repo, .. } => repo,
        }
    }
}

/// Drives the reconciliation operations against external collaborators.
pub struct Reconciler {
    content: Arc<dyn ContentSource>,
    releases: Arc<dyn ReleaseDirectory>,
    mappings: ServiceMappingTable,
    config: ReconcilerConfig,
    cancel: CancellationToken,
}

impl Reconciler {
    /// Build a reconciler; the service mapping table comes from
    /// `config.services`.
    pub fn new(
        config: ReconcilerConfig,
        content: Arc<dyn ContentSource>,
        releases: Arc<dyn ReleaseDirectory>,
    ) -> Result<Self> {
        config.validate()?;
        let mappings = ServiceMappingTable::new(config.github.org.clone(), &config.services)?;
        Ok(Self::with_mappings(config, mappings, content, releases))
    }

    pub fn with_mappings(
        config: ReconcilerConfig,
        mappings: ServiceMappingTable,
        content: Arc<dyn ContentSource>,
        releases: Arc<dyn ReleaseDirectory>,
    ) -> Self {
        Self {
            content,
            releases,
            mappings,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Use `token` for every collaborator call made from now on.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    pub fn mappings(&self) -> &ServiceMappingTable {
        &self.mappings
    }

    fn fan_out(&self) -> FanOut {
        FanOut::new(self.config.fetch_concurrency, self.cancel.clone())
    }

    fn platform_repo(&self, platform: &PlatformConfig) -> RepoRef {
        RepoRef::new(self.config.github.org.clone(), platform.repo.clone())
    }

    fn manifest_location(&self, platform: &PlatformConfig, reference: &str) -> ContentLocation {
        ContentLocation::new(
            self.platform_repo(platform),
            platform.manifest_path.clone(),
            reference,
        )
    }

    /// Releases of the platform's chart repository, newest first.
    pub async fn platform_releases(&self, platform: &str) -> Result<Releases> {
        let platform = self.config.platform(platform)?;
        let repo = self.platform_repo(platform);
        self.releases
            .releases(&repo, &self.cancel)
            .await
            .map_err(|e| Error::reconciliation("platform_releases", repo.to_string(), e))
    }

    /// Manifest of `platform` as of `release`.
    pub async fn snapshot_at(&self, platform: &str, release: &Release) -> Result<PlatformSnapshot> {
        let platform = self.config.platform(platform)?;
        let location = self.manifest_location(platform, &release.version);
        let bytes = self
            .content
            .fetch(&location, &self.cancel)
            .await
            .map_err(|e| Error::reconciliation("snapshot", location.to_string(), e))?;
        snapshot_from_bytes(release.clone(), &bytes)
            .map_err(|e| Error::reconciliation("snapshot", location.to_string(), e))
    }

    /// Manifest of `platform` at its newest release.
    pub async fn latest_snapshot(&self, platform: &str) -> Result<PlatformSnapshot> {
        let config = self.config.platform(platform)?;
        let repo = self.platform_repo(config);
        let release = self
            .releases
            .latest_release(&repo, &self.cancel)
            .await
            .map_err(|e| Error::reconciliation("latest_snapshot", repo.to_string(), e))?;
        self.snapshot_at(platform, &release).await
    }

    /// Diff the manifests of `platform` at versions `v1` and `v2`, looking
    /// the release metadata up in the platform's release list.
    pub async fn compare_versions(
        &self,
        platform: &str,
        v1: &str,
        v2: &str,
    ) -> Result<ComparisonResult> {
        let releases = self.platform_releases(platform).await?;
        self.compare_with_releases(platform, &releases, v1, v2).await
    }

    /// Same as [`Reconciler::compare_versions`] with a release list the
    /// caller already holds.
    ///
    /// Both manifests are fetched concurrently. The first failure in
    /// argument order is reported, whichever finished first.
    pub async fn compare_with_releases(
        &self,
        platform: &str,
        releases: &Releases,
        v1: &str,
        v2: &str,
    ) -> Result<ComparisonResult> {
        let config = self.config.platform(platform)?;
        let repo = self.platform_repo(config);

        let mut targets = Vec::with_capacity(2);
        for version in [v1, v2] {
            let release = releases.by_version(version).cloned().ok_or_else(|| {
                Error::reconciliation(
                    "compare",
                    version,
                    FetchError::not_found(format!("release {} of {}", version, repo)),
                )
            })?;
            targets.push((self.manifest_location(config, version), release));
        }
        let subjects: Vec<String> = targets.iter().map(|(loc, _)| loc.to_string()).collect();

        let content = Arc::clone(&self.content);
        let fetched = self
            .fan_out()
            .run(targets, |(location, release), cancel| {
                let content = Arc::clone(&content);
                async move {
                    let bytes = content.fetch(&location, &cancel).await?;
                    Ok::<_, Error>((release, bytes))
                }
            })
            .await;
        let fetched = first_failure(fetched, "compare", &subjects)?;

        let mut snapshots = Vec::with_capacity(2);
        for ((release, bytes), subject) in fetched.into_iter().zip(&subjects) {
            let snapshot = snapshot_from_bytes(release, &bytes)
                .map_err(|e| Error::reconciliation("compare", subject.clone(), e))?;
            snapshots.push(snapshot);
        }
        let [a, b]: [PlatformSnapshot; 2] = snapshots
            .try_into()
            .map_err(|_| Error::runtime_with_context("expected two snapshots", ErrorContext::new()))?;

        let result = compare::compare(&a, &b);
        info!(
            platform = %platform,
            from = %result.initial_version(),
            to = %result.final_version(),
            changed = result.changed.len(),
            inserted = result.inserted.len(),
            deleted = result.deleted.len(),
            "compared platform releases"
        );
        Ok(result)
    }

    /// For each service, the upstream releases published strictly after the
    /// release its current version points at. One release-directory call per
    /// service, all in flight together up to the fan-out limit.
    pub async fn available_releases(&self, services: &[ServiceEntry]) -> Result<Vec<ServiceReleases>> {
        let inputs: Vec<(ServiceEntry, RepoTarget)> = services
            .iter()
            .map(|s| (s.clone(), self.mappings.resolve(&s.name)))
            .collect();
        let subjects: Vec<String> = services.iter().map(|s| s.name.clone()).collect();

        let directory = Arc::clone(&self.releases);
        let results = self
            .fan_out()
            .run(inputs, |(service, target), cancel| {
                let directory = Arc::clone(&directory);
                async move {
                    let releases = directory.releases(&target.repo, &cancel).await?;
                    let tag = target.tag_for(&service.version);
                    let current = releases.by_version(&tag).cloned().ok_or_else(|| {
                        FetchError::not_found(format!("release {} of {}", tag, target.repo))
                    })?;
                    let available = releases.newer_than(&current);
                    debug!(
                        service = %service.name,
                        current = %current.version,
                        available = available.len(),
                        "resolved available releases"
                    );
                    Ok::<_, Error>(ServiceReleases {
                        service: service.name,
                        repo: target.repo,
                        current,
                        available,
                    })
                }
            })
            .await;

        first_failure(results, "available_releases", &subjects)
    }

    /// Changelog text per repository for everything `diff` touches.
    ///
    /// Changed services get the release notes between their old and new tag;
    /// inserted services get the body of their release followed by every
    /// older release body. When several services share a repository, the
    /// first one (changed before inserted, then by name) decides.
    pub async fn changelogs(&self, diff: &ComparisonResult) -> Result<BTreeMap<String, String>> {
        let mut jobs: Vec<ChangelogJob> = Vec::new();
        let mut subjects: Vec<String> = Vec::new();
        let mut seen: HashSet<RepoRef> = HashSet::new();

        for (name, change) in &diff.changed {
            let target = self.mappings.resolve(name);
            if seen.insert(target.repo.clone()) {
                subjects.push(name.clone());
                jobs.push(ChangelogJob::Notes {
                    base: target.tag_for(&change.from),
                    head: target.tag_for(&change.to),
                    repo: target.repo,
                });
            }
        }
        for (name, entry) in &diff.inserted {
            let target = self.mappings.resolve(name);
            if seen.insert(target.repo.clone()) {
                subjects.push(name.clone());
                jobs.push(ChangelogJob::Accumulated {
                    tag: target.tag_for(&entry.version),
                    repo: target.repo,
                });
            }
        }

        let directory = Arc::clone(&self.releases);
        let results = self
            .fan_out()
            .run(jobs, |job, cancel| {
                let directory = Arc::clone(&directory);
                async move {
                    let key = job.repo().name.clone();
                    let text = match job {
                        ChangelogJob::Notes { repo, base, head } => {
                            directory.release_notes(&repo, &base, &head, &cancel).await?
                        }
                        ChangelogJob::Accumulated { repo, tag } => {
                            let releases = directory.releases(&repo, &cancel).await?;
                            if releases.by_version(&tag).is_none() {
                                return Err(Error::from(FetchError::not_found(format!(
                                    "release {} of {}",
                                    tag, repo
                                ))));
                            }
                            releases
                                .up_to(&tag)
                                .iter()
                                .map(|r| r.changelog.as_str())
                                .collect::<String>()
                        }
                    };
                    Ok::<_, Error>((key, text))
                }
            })
            .await;

        Ok(first_failure(results, "changelogs", &subjects)?
            .into_iter()
            .collect())
    }

    /// Pin `updates` in the manifest of `platform` at its newest release and
    /// submit the rewritten file to `sink`.
    ///
    /// Nothing is submitted when any step fails or when the manifest already
    /// matches. Platforms configured with `direct_commit` commit to the main
    /// branch; the rest get a pull request from a fresh branch.
    pub async fn bump_services(
        &self,
        platform: &str,
        updates: &ServiceMap,
        sink: &dyn CommitSink,
    ) -> Result<BumpOutcome> {
        let config = self.config.platform(platform)?;
        let repo = self.platform_repo(config);
        let wrap = |e: Error| Error::reconciliation("bump_services", platform, e);

        let base_release = self
            .releases
            .latest_release(&repo, &self.cancel)
            .await
            .map_err(|e| wrap(e.into()))?;
        let location = self.manifest_location(config, &base_release.version);
        let bytes = self
            .content
            .fetch(&location, &self.cancel)
            .await
            .map_err(|e| wrap(e.into()))?;

        let mut document = ManifestDocument::parse(&bytes).map_err(|e| wrap(e.into()))?;
        let edits = document.replace(updates).map_err(|e| wrap(e.into()))?;
        if edits.is_empty() {
            info!(platform = %platform, release = %base_release.version, "manifest already up to date");
            return Ok(BumpOutcome {
                base_release,
                edits,
                commit: None,
            });
        }

        let request = self.commit_request(config, repo, Bytes::from(document.content()), &edits);
        let outcome = sink
            .submit(&request, &self.cancel)
            .await
            .map_err(|e| wrap(e.into()))?;
        info!(platform = %platform, edits = edits.len(), outcome = ?outcome, "submitted service bump");

        Ok(BumpOutcome {
            base_release,
            edits,
            commit: Some(outcome),
        })
    }

    fn commit_request(
        &self,
        platform: &PlatformConfig,
        repo: RepoRef,
        content: Bytes,
        edits: &[ServiceEdit],
    ) -> CommitRequest {
        let github = &self.config.github;
        let message = github.bump_services_commit_message();
        let mode = if platform.direct_commit {
            CommitMode::Direct
        } else {
            CommitMode::PullRequest {
                branch: format!(
                    "chore/bump-services-{}",
                    chrono::Utc::now().format("%Y%m%d%H%M%S")
                ),
                title: message.clone(),
                body: edits
                    .iter()
                    .map(|edit| format!("- {}\n", edit))
                    .collect(),
            }
        };
        CommitRequest {
            repo,
            path: platform.manifest_path.clone(),
            content,
            base_branch: github.main_branch.clone(),
            author: CommitAuthor {
                name: github.author_name.clone(),
                email: github.author_email.clone(),
            },
            message,
            mode,
        }
    }
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("org", &self.config.github.org)
            .field("platforms", &self.config.platforms.len())
            .field("mappings", &self.mappings)
            .finish()
    }
}

fn snapshot_from_bytes(release: Release, bytes: &[u8]) -> Result<PlatformSnapshot> {
    let services = ManifestDocument::parse(bytes)?.load()?;
    Ok(PlatformSnapshot::new(release, services))
}
