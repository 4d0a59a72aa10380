//! Three-way snapshot diff.

use super::model::{ComparisonResult, VersionChange};
use crate::types::PlatformSnapshot;
use std::collections::BTreeMap;
use tracing::debug;

/// Compare two snapshots.
///
/// The snapshot with the earlier publish date is treated as the starting
/// point whatever the argument order. When the dates are equal, or either
/// one is missing, `a` comes first. Services present in both with the same
/// version appear in none of the result sets.
pub fn compare(a: &PlatformSnapshot, b: &PlatformSnapshot) -> ComparisonResult {
    let swap = matches!(
        (a.release.published_at, b.release.published_at),
        (Some(first), Some(second)) if first > second
    );
    let (initial, last) = if swap { (b, a) } else { (a, b) };

    let mut deleted = initial.services.clone();
    let mut inserted = last.services.clone();
    let mut changed = BTreeMap::new();

    for (name, before) in &initial.services {
        let Some(after) = inserted.remove(name) else {
            continue;
        };
        deleted.remove(name);
        if before.version != after.version {
            changed.insert(
                name.clone(),
                VersionChange {
                    from: before.version.clone(),
                    to: after.version,
                },
            );
        }
    }

    debug!(
        from = %initial.release.version,
        to = %last.release.version,
        changed = changed.len(),
        inserted = inserted.len(),
        deleted = deleted.len(),
        "compared snapshots"
    );

    ComparisonResult {
        initial_release: initial.release.clone(),
        final_release: last.release.clone(),
        changed,
        inserted,
        deleted,
        disable_color: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{service_map, Release};
    use chrono::{TimeZone, Utc};

    fn snapshot(version: &str, day: u32, services: &[(&str, &str)]) -> PlatformSnapshot {
        PlatformSnapshot::new(
            Release::new(version).published(Utc.with_ymd_and_hms(2024, 5, day, 0, 0, 0).unwrap()),
            service_map(services.iter().copied()),
        )
    }

    #[test]
    fn test_partition() {
        let a = snapshot("v1", 1, &[("same", "1"), ("bumped", "1"), ("gone", "1")]);
        let b = snapshot("v2", 2, &[("same", "1"), ("bumped", "2"), ("new", "1")]);
        let diff = compare(&a, &b);
        assert_eq!(diff.changed.keys().collect::<Vec<_>>(), vec!["bumped"]);
        assert_eq!(diff.inserted.keys().collect::<Vec<_>>(), vec!["new"]);
        assert_eq!(diff.deleted.keys().collect::<Vec<_>>(), vec!["gone"]);
        assert!(!diff.touched().contains("same"));
    }

    #[test]
    fn test_argument_order_does_not_matter() {
        let a = snapshot("v1", 1, &[("svc", "1")]);
        let b = snapshot("v2", 9, &[("svc", "2")]);
        assert_eq!(compare(&a, &b), compare(&b, &a));
        assert_eq!(compare(&b, &a).initial_version(), "v1");
    }

    #[test]
    fn test_undated_snapshots_keep_argument_order() {
        let a = PlatformSnapshot::new(Release::new("x"), service_map([("svc", "1")]));
        let b = PlatformSnapshot::new(Release::new("y"), service_map([("svc", "2")]));
        let diff = compare(&b, &a);
        assert_eq!(diff.initial_version(), "y");
        assert_eq!(diff.changed["svc"], VersionChange { from: "2".into(), to: "1".into() });
    }

    #[test]
    fn test_one_undated_snapshot_keeps_argument_order() {
        let dated = snapshot("v1", 3, &[("svc", "1")]);
        let undated = PlatformSnapshot::new(Release::new("nightly"), service_map([("svc", "2")]));
        assert_eq!(compare(&dated, &undated).initial_version(), "v1");
        assert_eq!(compare(&undated, &dated).initial_version(), "nightly");
    }

    #[test]
    fn test_identical_snapshots_are_empty() {
        let a = snapshot("v1", 1, &[("svc", "1")]);
        assert!(compare(&a, &a).is_empty());
    }
}
