use super::{
    cancellable, CommitMode, CommitOutcome, CommitRequest, CommitSink, ContentLocation,
    ContentSource, FetchError, ReleaseDirectory, RepoRef,
};
use crate::config::{ReconcilerConfig, DEFAULT_HTTP_POOL_MAX_IDLE_PER_HOST};
use crate::types::{Release, Releases};
use crate::{Error, ErrorContext};
use async_trait::async_trait;
use base64::Engine as _;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

const JSON_MEDIA_TYPE: &str = "application/vnd.github+json";
const API_VERSION_HEADER: &str = "x-github-api-version";
const API_VERSION: &str = "2022-11-28";
const PAGE_SIZE: usize = 100;
const MAX_RELEASE_PAGES: usize = 10;

/// GitHub REST implementation of the transport collaborators.
pub struct GithubTransport {
    client: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

impl GithubTransport {
    pub fn new(config: &ReconcilerConfig) -> crate::Result<Self> {
        Self::build(
            &config.api_base_url,
            config.token.clone(),
            config.http_timeout(),
            config.http_pool_max_idle_per_host,
        )
    }

    pub fn with_base_url(
        base_url: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> crate::Result<Self> {
        Self::build(base_url, token, timeout, DEFAULT_HTTP_POOL_MAX_IDLE_PER_HOST)
    }

    fn build(
        base_url: &str,
        token: Option<String>,
        timeout: Duration,
        pool_max_idle_per_host: usize,
    ) -> crate::Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid API base URL '{}'", base_url),
                ErrorContext::new()
                    .with_field_path("api_base_url")
                    .with_details(e.to_string()),
            )
        })?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(pool_max_idle_per_host)
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .build()
            .map_err(|e| Error::Fetch(FetchError::Other(e.to_string())))?;

        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, FetchError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| FetchError::Other(format!("cannot extend base URL {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn repo_endpoint(&self, repo: &RepoRef, rest: &[&str]) -> Result<Url, FetchError> {
        let mut segments = vec!["repos", repo.owner.as_str(), repo.name.as_str()];
        segments.extend_from_slice(rest);
        self.endpoint(&segments)
    }

    fn contents_endpoint(&self, repo: &RepoRef, path: &str) -> Result<Url, FetchError> {
        let mut rest = vec!["contents"];
        rest.extend(path.split('/').filter(|s| !s.is_empty()));
        self.repo_endpoint(repo, &rest)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let mut req = self
            .client
            .request(method, url)
            .header(USER_AGENT, concat!("pinsync/", env!("CARGO_PKG_VERSION")))
            .header(ACCEPT, JSON_MEDIA_TYPE)
            .header(API_VERSION_HEADER, API_VERSION);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        req
    }

    async fn send(&self, req: RequestBuilder, resource: &str) -> Result<Response, FetchError> {
        let resp = req.send().await?;
        let status = resp.status();
        debug!(resource, status = status.as_u16(), "github response");
        if status.is_success() {
            return Ok(resp);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::not_found(resource));
        }
        let body = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiMessage>(&body)
            .map(|m| m.message)
            .unwrap_or(body);
        Err(FetchError::Status {
            status: status.as_u16(),
            resource: resource.to_string(),
            message,
        })
    }

    async fn json<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
        resource: &str,
    ) -> Result<T, FetchError> {
        let resp = self.send(req, resource).await?;
        resp.json::<T>().await.map_err(|e| FetchError::Decode {
            resource: resource.to_string(),
            reason: e.to_string(),
        })
    }

    async fn file(&self, location: &ContentLocation) -> Result<ContentsFile, FetchError> {
        let mut url = self.contents_endpoint(&location.repo, &location.path)?;
        url.query_pairs_mut().append_pair("ref", &location.reference);
        self.json(self.request(Method::GET, url), &location.to_string())
            .await
    }

    async fn file_sha(&self, location: &ContentLocation) -> Result<Option<String>, FetchError> {
        match self.file(location).await {
            Ok(file) => Ok(Some(file.sha)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn put_file(&self, request: &CommitRequest, branch: &str) -> Result<(), FetchError> {
        let location = ContentLocation::new(request.repo.clone(), &request.path, branch);
        let sha = self.file_sha(&location).await?;
        let body = PutContents {
            message: &request.message,
            content: base64::engine::general_purpose::STANDARD.encode(&request.content),
            sha,
            branch,
            committer: Person {
                name: &request.author.name,
                email: &request.author.email,
            },
        };
        let url = self.contents_endpoint(&request.repo, &request.path)?;
        self.send(self.request(Method::PUT, url).json(&body), &location.to_string())
            .await?;
        Ok(())
    }

    async fn open_pull_request(
        &self,
        request: &CommitRequest,
        branch: &str,
        title: &str,
        body: &str,
    ) -> Result<CommitOutcome, FetchError> {
        let repo = &request.repo;
        let mut segments = vec!["git", "ref", "heads"];
        segments.extend(request.base_branch.split('/'));
        let url = self.repo_endpoint(repo, &segments)?;
        let head: GitRef = self
            .json(
                self.request(Method::GET, url),
                &format!("{} heads/{}", repo, request.base_branch),
            )
            .await?;

        let url = self.repo_endpoint(repo, &["git", "refs"])?;
        let new_ref = NewRef {
            r#ref: format!("refs/heads/{}", branch),
            sha: head.object.sha,
        };
        self.send(
            self.request(Method::POST, url).json(&new_ref),
            &format!("{} {}", repo, new_ref.r#ref),
        )
        .await?;

        self.put_file(request, branch).await?;

        let url = self.repo_endpoint(repo, &["pulls"])?;
        let pull = NewPull {
            title,
            body,
            head: branch,
            base: &request.base_branch,
        };
        let created: PullRequest = self
            .json(
                self.request(Method::POST, url).json(&pull),
                &format!("{} pull request", repo),
            )
            .await?;
        Ok(CommitOutcome::PullRequestOpened {
            url: created.html_url,
        })
    }
}

#[async_trait]
impl ContentSource for GithubTransport {
    async fn fetch(
        &self,
        location: &ContentLocation,
        cancel: &CancellationToken,
    ) -> Result<Bytes, FetchError> {
        let file = cancellable(cancel, self.file(location)).await?;
        file.decode(&location.to_string())
    }
}

#[async_trait]
impl ReleaseDirectory for GithubTransport {
    async fn releases(
        &self,
        repo: &RepoRef,
        cancel: &CancellationToken,
    ) -> Result<Releases, FetchError> {
        let resource = format!("releases of {}", repo);
        let mut all = Vec::new();
        for page in 1..=MAX_RELEASE_PAGES {
            let mut url = self.repo_endpoint(repo, &["releases"])?;
            url.query_pairs_mut()
                .append_pair("per_page", &PAGE_SIZE.to_string())
                .append_pair("page", &page.to_string());
            let batch: Vec<GithubRelease> =
                cancellable(cancel, self.json(self.request(Method::GET, url), &resource)).await?;
            let done = batch.len() < PAGE_SIZE;
            all.extend(
                batch
                    .into_iter()
                    .filter(|r| !r.draft)
                    .map(|r| r.into_release(&repo.name)),
            );
            if done {
                break;
            }
        }
        Ok(Releases::new(all))
    }

    async fn latest_release(
        &self,
        repo: &RepoRef,
        cancel: &CancellationToken,
    ) -> Result<Release, FetchError> {
        let url = self.repo_endpoint(repo, &["releases", "latest"])?;
        let release: GithubRelease = cancellable(
            cancel,
            self.json(
                self.request(Method::GET, url),
                &format!("latest release of {}", repo),
            ),
        )
        .await?;
        Ok(release.into_release(&repo.name))
    }

    async fn release_notes(
        &self,
        repo: &RepoRef,
        base: &str,
        head: &str,
        cancel: &CancellationToken,
    ) -> Result<String, FetchError> {
        let url = self.repo_endpoint(repo, &["releases", "generate-notes"])?;
        let body = GenerateNotes {
            tag_name: head,
            previous_tag_name: base,
        };
        let notes: ReleaseNotes = cancellable(
            cancel,
            self.json(
                self.request(Method::POST, url).json(&body),
                &format!("release notes of {} {}..{}", repo, base, head),
            ),
        )
        .await?;
        Ok(notes.body)
    }
}

#[async_trait]
impl CommitSink for GithubTransport {
    async fn submit(
        &self,
        request: &CommitRequest,
        cancel: &CancellationToken,
    ) -> Result<CommitOutcome, FetchError> {
        match &request.mode {
            CommitMode::Direct => {
                cancellable(cancel, self.put_file(request, &request.base_branch)).await?;
                Ok(CommitOutcome::Committed {
                    branch: request.base_branch.clone(),
                })
            }
            CommitMode::PullRequest {
                branch,
                title,
                body,
            } => {
                cancellable(
                    cancel,
                    self.open_pull_request(request, branch, title, body),
                )
                .await
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ContentsFile {
    sha: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: String,
}

impl ContentsFile {
    fn decode(self, resource: &str) -> Result<Bytes, FetchError> {
        if self.encoding != "base64" {
            return Err(FetchError::Decode {
                resource: resource.to_string(),
                reason: format!("unsupported content encoding '{}'", self.encoding),
            });
        }
        let compact: String = self.content.split_whitespace().collect();
        base64::engine::general_purpose::STANDARD
            .decode(compact)
            .map(Bytes::from)
            .map_err(|e| FetchError::Decode {
                resource: resource.to_string(),
                reason: e.to_string(),
            })
    }
}

#[derive(Debug, Deserialize)]
struct GithubRelease {
    tag_name: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    html_url: String,
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

impl GithubRelease {
    fn into_release(self, repo: &str) -> Release {
        Release {
            name: self
                .name
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| repo.to_string()),
            version: self.tag_name,
            changelog: self.body.unwrap_or_default(),
            url: self.html_url,
            published_at: self.published_at.or(self.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateNotes<'a> {
    tag_name: &'a str,
    previous_tag_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct ReleaseNotes {
    #[serde(default)]
    body: String,
}

#[derive(Debug, Serialize)]
struct Person<'a> {
    name: &'a str,
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct PutContents<'a> {
    message: &'a str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<String>,
    branch: &'a str,
    committer: Person<'a>,
}

#[derive(Debug, Deserialize)]
struct GitRef {
    object: GitObject,
}

#[derive(Debug, Deserialize)]
struct GitObject {
    sha: String,
}

#[derive(Debug, Serialize)]
struct NewRef {
    r#ref: String,
    sha: String,
}

#[derive(Debug, Serialize)]
struct NewPull<'a> {
    title: &'a str,
    body: &'a str,
    head: &'a str,
    base: &'a str,
}

#[derive(Debug, Deserialize)]
struct PullRequest {
    html_url: String,
}
