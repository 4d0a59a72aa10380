//! Service name to repository lookup

use crate::config::ServiceMapping;
use crate::transport::RepoRef;
use crate::{Error, ErrorContext, Result};
use regex::Regex;

/// Kebab-case form of a service name: word boundaries from case changes,
/// digits-to-letters transitions, and `_`, `-`, `.` or whitespace separators.
///
/// ```
/// use pinsync::reconcile::kebab_case;
///
/// assert_eq!(kebab_case("PaymentsAPI"), "payments-api");
/// assert_eq!(kebab_case("user_profile service"), "user-profile-service");
/// ```
pub fn kebab_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if c == '_' || c == '-' || c == '.' || c.is_whitespace() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        if c.is_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            // "fooBar" | "HTTPServer" at the 'S'
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower) {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }

    words.join("-").to_lowercase()
}

/// Where the releases of one service live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoTarget {
    pub repo: RepoRef,
    /// Repository shared by several services; tags carry a service prefix.
    pub multi_tag: bool,
    tag_prefix: String,
}

impl RepoTarget {
    /// Release tag naming `version` of this service.
    pub fn tag_for(&self, version: &str) -> String {
        if self.multi_tag {
            format!("{}-{}", self.tag_prefix, version)
        } else {
            version.to_string()
        }
    }
}

struct CompiledMapping {
    pattern: Regex,
    repo: String,
    multi_tag: bool,
}

/// Explicit lookup table from service-name patterns to repositories.
///
/// Services no pattern matches live in a repository named after the
/// kebab-cased service name. When several patterns match, the one declared
/// last wins.
pub struct ServiceMappingTable {
    owner: String,
    mappings: Vec<CompiledMapping>,
}

impl ServiceMappingTable {
    pub fn new(owner: impl Into<String>, mappings: &[ServiceMapping]) -> Result<Self> {
        let mappings = mappings
            .iter()
            .enumerate()
            .map(|(i, m)| {
                let pattern = Regex::new(&m.pattern).map_err(|e| {
                    Error::configuration_with_context(
                        format!("invalid service pattern '{}'", m.pattern),
                        ErrorContext::new()
                            .with_field_path(format!("services[{}].pattern", i))
                            .with_details(e.to_string())
                            .with_source("mapping_table"),
                    )
                })?;
                Ok(CompiledMapping {
                    pattern,
                    repo: m.repo.clone(),
                    multi_tag: m.multi_tag,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            owner: owner.into(),
            mappings,
        })
    }

    /// Table without patterns; every service maps to its kebab-cased name.
    pub fn empty(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            mappings: Vec::new(),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    pub fn resolve(&self, service: &str) -> RepoTarget {
        let kebab = kebab_case(service);
        let (repo, multi_tag) = self
            .mappings
            .iter()
            .rev()
            .find(|m| m.pattern.is_match(service))
            .map(|m| (m.repo.to_lowercase(), m.multi_tag))
            .unwrap_or_else(|| (kebab.clone(), false));

        RepoTarget {
            repo: RepoRef::new(self.owner.clone(), repo),
            multi_tag,
            tag_prefix: kebab,
        }
    }
}

impl std::fmt::Debug for ServiceMappingTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceMappingTable")
            .field("owner", &self.owner)
            .field(
                "patterns",
                &self.mappings.iter().map(|m| m.pattern.as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kebab_case() {
        assert_eq!(kebab_case("api"), "api");
        assert_eq!(kebab_case("userService"), "user-service");
        assert_eq!(kebab_case("HTTPServer"), "http-server");
        assert_eq!(kebab_case("auth_v2"), "auth-v2");
        assert_eq!(kebab_case("Worker2Go"), "worker2-go");
        assert_eq!(kebab_case("  billing--core "), "billing-core");
    }

    #[test]
    fn test_default_repository_is_kebab_name() {
        let table = ServiceMappingTable::empty("acme");
        let target = table.resolve("PaymentGateway");
        assert_eq!(target.repo, RepoRef::new("acme", "payment-gateway"));
        assert!(!target.multi_tag);
        assert_eq!(target.tag_for("v1.2.0"), "v1.2.0");
    }

    #[test]
    fn test_last_matching_pattern_wins() {
        let table = ServiceMappingTable::new(
            "acme",
            &[
                ServiceMapping::new("^payments", "payments-legacy"),
                ServiceMapping::new("^payments.*Worker$", "Payments-Mono").multi_tag(),
            ],
        )
        .unwrap();

        let worker = table.resolve("paymentsRefundWorker");
        assert_eq!(worker.repo.name, "payments-mono");
        assert!(worker.multi_tag);
        assert_eq!(worker.tag_for("v3"), "payments-refund-worker-v3");

        let api = table.resolve("paymentsApi");
        assert_eq!(api.repo.name, "payments-legacy");
        assert!(!api.multi_tag);
    }

    #[test]
    fn test_invalid_pattern_is_configuration_error() {
        let err = ServiceMappingTable::new(
            "acme",
            &[
                ServiceMapping::new("^ok$", "ok"),
                ServiceMapping::new("(unclosed", "broken"),
            ],
        )
        .unwrap_err();
        let context = err.context().unwrap();
        assert_eq!(context.field_path.as_deref(), Some("services[1].pattern"));
    }
}
