//! Reconciler configuration
//!
//! Loaded from YAML, then adjusted by environment variables:
//!
//! ```yaml
//! github:
//!   org: acme
//!   main_branch: main
//!   author_name: Release Bot
//!   author_email: release-bot@acme.dev
//! platforms:
//!   - name: web
//!     repo: web-platform-chart
//!     direct_commit: false
//! services:
//!   - pattern: "^payments"
//!     repo: payments-monorepo
//!     multi_tag: true
//! ```

use crate::manifest::DEFAULT_MANIFEST_PATH;
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const ENV_TOKEN: &str = "PINSYNC_GITHUB_TOKEN";
pub const ENV_GITHUB_TOKEN: &str = "GITHUB_TOKEN";
pub const ENV_HTTP_TIMEOUT_SECS: &str = "PINSYNC_HTTP_TIMEOUT_SECS";
pub const ENV_FETCH_CONCURRENCY: &str = "PINSYNC_FETCH_CONCURRENCY";
pub const ENV_API_BASE_URL: &str = "PINSYNC_API_BASE_URL";
pub const ENV_HTTP_POOL_MAX_IDLE_PER_HOST: &str = "PINSYNC_HTTP_POOL_MAX_IDLE_PER_HOST";

pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_FETCH_CONCURRENCY: usize = 8;
pub const DEFAULT_HTTP_POOL_MAX_IDLE_PER_HOST: usize = 8;

fn default_main_branch() -> String {
    "main".to_string()
}

fn default_author_name() -> String {
    "pinsync".to_string()
}

fn default_author_email() -> String {
    "pinsync@users.noreply.github.com".to_string()
}

fn default_message_prefix() -> String {
    "chore(autocommit)".to_string()
}

fn default_bump_message() -> String {
    "bump service versions".to_string()
}

fn default_manifest_path() -> String {
    DEFAULT_MANIFEST_PATH.to_string()
}

fn default_timeout() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}

fn default_concurrency() -> usize {
    DEFAULT_FETCH_CONCURRENCY
}

fn default_pool_max_idle() -> usize {
    DEFAULT_HTTP_POOL_MAX_IDLE_PER_HOST
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

/// Source-control account and commit identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GithubConfig {
    /// Owner of every platform and service repository.
    #[serde(default)]
    pub org: String,
    #[serde(default = "default_main_branch")]
    pub main_branch: String,
    #[serde(default = "default_author_name")]
    pub author_name: String,
    #[serde(default = "default_author_email")]
    pub author_email: String,
    /// Conventional-commit style prefix, e.g. `chore(autocommit)`.
    #[serde(default = "default_message_prefix")]
    pub message_prefix: String,
    #[serde(default = "default_bump_message")]
    pub bump_services_message: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            org: String::new(),
            main_branch: default_main_branch(),
            author_name: default_author_name(),
            author_email: default_author_email(),
            message_prefix: default_message_prefix(),
            bump_services_message: default_bump_message(),
        }
    }
}

impl GithubConfig {
    pub fn bump_services_commit_message(&self) -> String {
        format!("{}: {}", self.message_prefix, self.bump_services_message)
    }
}

/// A platform whose chart repository holds a service manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformConfig {
    pub name: String,
    /// Chart repository name under [`GithubConfig::org`].
    pub repo: String,
    #[serde(default = "default_manifest_path")]
    pub manifest_path: String,
    /// Commit straight to the main branch instead of opening a pull request.
    #[serde(default)]
    pub direct_commit: bool,
}

impl PlatformConfig {
    pub fn new(name: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            repo: repo.into(),
            manifest_path: default_manifest_path(),
            direct_commit: false,
        }
    }

    pub fn with_manifest_path(mut self, path: impl Into<String>) -> Self {
        self.manifest_path = path.into();
        self
    }

    pub fn with_direct_commit(mut self, direct: bool) -> Self {
        self.direct_commit = direct;
        self
    }
}

/// Maps service names matching `pattern` to a repository other than the
/// kebab-cased service name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceMapping {
    pub pattern: String,
    pub repo: String,
    /// Repository hosts several services; tags look like `<service>-<version>`.
    #[serde(default, alias = "multi-tag")]
    pub multi_tag: bool,
}

impl ServiceMapping {
    pub fn new(pattern: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            repo: repo.into(),
            multi_tag: false,
        }
    }

    pub fn multi_tag(mut self) -> Self {
        self.multi_tag = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    #[serde(default)]
    pub github: GithubConfig,
    #[serde(default)]
    pub platforms: Vec<PlatformConfig>,
    /// Checked in order; the last matching entry wins.
    #[serde(default)]
    pub services: Vec<ServiceMapping>,
    #[serde(default = "default_timeout")]
    pub http_timeout_secs: u64,
    #[serde(default = "default_concurrency")]
    pub fetch_concurrency: usize,
    /// Idle keep-alive connections the HTTP client holds per host.
    #[serde(default = "default_pool_max_idle")]
    pub http_pool_max_idle_per_host: usize,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default, skip_serializing)]
    pub token: Option<String>,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            github: GithubConfig::default(),
            platforms: Vec::new(),
            services: Vec::new(),
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            fetch_concurrency: DEFAULT_FETCH_CONCURRENCY,
            http_pool_max_idle_per_host: DEFAULT_HTTP_POOL_MAX_IDLE_PER_HOST,
            api_base_url: default_api_base_url(),
            token: None,
        }
    }
}

impl ReconcilerConfig {
    pub fn new(org: impl Into<String>) -> Self {
        let mut config = Self::default();
        config.github.org = org.into();
        config
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::configuration_with_context(
                format!("failed to read {}", path.display()),
                ErrorContext::new()
                    .with_details(e.to_string())
                    .with_source("config_loader"),
            )
        })?;
        Self::from_yaml_str(&content)
    }

    /// Apply `PINSYNC_*` (and `GITHUB_TOKEN`) environment overrides.
    pub fn with_env_overrides(self) -> Self {
        self.apply_env(|key| std::env::var(key).ok())
    }

    fn apply_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(token) = lookup(ENV_TOKEN).or_else(|| lookup(ENV_GITHUB_TOKEN)) {
            if !token.is_empty() {
                self.token = Some(token);
            }
        }
        if let Some(secs) = lookup(ENV_HTTP_TIMEOUT_SECS).and_then(|s| s.parse::<u64>().ok()) {
            self.http_timeout_secs = secs;
        }
        if let Some(limit) = lookup(ENV_FETCH_CONCURRENCY).and_then(|s| s.parse::<usize>().ok()) {
            self.fetch_concurrency = limit.max(1);
        }
        if let Some(idle) =
            lookup(ENV_HTTP_POOL_MAX_IDLE_PER_HOST).and_then(|s| s.parse::<usize>().ok())
        {
            self.http_pool_max_idle_per_host = idle;
        }
        if let Some(url) = lookup(ENV_API_BASE_URL) {
            self.api_base_url = url;
        }
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_platform(mut self, platform: PlatformConfig) -> Self {
        self.platforms.push(platform);
        self
    }

    pub fn with_service_mapping(mut self, mapping: ServiceMapping) -> Self {
        self.services.push(mapping);
        self
    }

    pub fn with_fetch_concurrency(mut self, limit: usize) -> Self {
        self.fetch_concurrency = limit.max(1);
        self
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn platform(&self, name: &str) -> Result<&PlatformConfig> {
        self.platforms.iter().find(|p| p.name == name).ok_or_else(|| {
            Error::configuration_with_context(
                format!("unknown platform '{}'", name),
                ErrorContext::new()
                    .with_field_path("platforms")
                    .with_details(format!(
                        "known platforms: {}",
                        self.platforms
                            .iter()
                            .map(|p| p.name.as_str())
                            .collect::<Vec<_>>()
                            .join(", ")
                    )),
            )
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.fetch_concurrency == 0 {
            return Err(Error::configuration_with_context(
                "fetch_concurrency must be at least 1",
                ErrorContext::new().with_field_path("fetch_concurrency"),
            ));
        }
        for (i, platform) in self.platforms.iter().enumerate() {
            if platform.repo.is_empty() {
                return Err(Error::configuration_with_context(
                    format!("platform '{}' has no repository", platform.name),
                    ErrorContext::new().with_field_path(format!("platforms[{}].repo", i)),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SAMPLE: &str = r#"
github:
  org: acme
platforms:
  - name: web
    repo: web-platform-chart
services:
  - pattern: "^payments"
    repo: payments-monorepo
    multi-tag: true
"#;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = ReconcilerConfig::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(config.github.main_branch, "main");
        assert_eq!(config.platforms[0].manifest_path, DEFAULT_MANIFEST_PATH);
        assert!(!config.platforms[0].direct_commit);
        assert!(config.services[0].multi_tag);
        assert_eq!(config.fetch_concurrency, DEFAULT_FETCH_CONCURRENCY);
        assert_eq!(config.http_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_GITHUB_TOKEN, "fallback"),
            (ENV_FETCH_CONCURRENCY, "0"),
            (ENV_HTTP_TIMEOUT_SECS, "5"),
            (ENV_HTTP_POOL_MAX_IDLE_PER_HOST, "2"),
        ]
        .into_iter()
        .collect();
        let config = ReconcilerConfig::default()
            .apply_env(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.token.as_deref(), Some("fallback"));
        assert_eq!(config.fetch_concurrency, 1);
        assert_eq!(config.http_timeout_secs, 5);
        assert_eq!(config.http_pool_max_idle_per_host, 2);
    }

    #[test]
    fn test_unparsable_env_values_are_ignored() {
        let config = ReconcilerConfig::default().apply_env(|key| {
            (key == ENV_HTTP_POOL_MAX_IDLE_PER_HOST).then(|| "many".to_string())
        });
        assert_eq!(
            config.http_pool_max_idle_per_host,
            DEFAULT_HTTP_POOL_MAX_IDLE_PER_HOST
        );
    }

    #[test]
    fn test_token_is_never_serialized() {
        let config = ReconcilerConfig::new("acme").with_token("secret");
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(!yaml.contains("secret"));
    }

    #[test]
    fn test_unknown_platform() {
        let config = ReconcilerConfig::from_yaml_str(SAMPLE).unwrap();
        let err = config.platform("mobile").unwrap_err();
        assert!(err.to_string().contains("unknown platform 'mobile'"));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let err = ReconcilerConfig::from_yaml_str("fetch_concurrency: 0\n").unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }
}
