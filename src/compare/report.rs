//! Text report for a [`ComparisonResult`].

use super::model::ComparisonResult;
use colored::Colorize;

#[derive(Clone, Copy)]
enum Tone {
    Heading,
    Added,
    Removed,
}

fn paint(text: &str, tone: Tone, color: bool) -> String {
    if !color {
        return text.to_string();
    }
    match tone {
        Tone::Heading => text.bold().to_string(),
        Tone::Added => text.green().to_string(),
        Tone::Removed => text.red().to_string(),
    }
}

/// Render `result` as plain text, optionally with ANSI colors.
pub fn render(result: &ComparisonResult, color: bool) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "{} {} → {}\n",
        paint("Platform release:", Tone::Heading, color),
        result.initial_version(),
        result.final_version()
    ));

    if result.is_empty() {
        out.push_str("\nNo service version changes.\n");
        return out;
    }

    if !result.changed.is_empty() {
        out.push_str(&format!("\n{}\n", paint("Changed:", Tone::Heading, color)));
        for (name, change) in &result.changed {
            out.push_str(&format!(
                "  {}: {} → {}\n",
                name,
                paint(&change.from, Tone::Removed, color),
                paint(&change.to, Tone::Added, color)
            ));
        }
    }

    if !result.inserted.is_empty() {
        out.push_str(&format!("\n{}\n", paint("Inserted:", Tone::Heading, color)));
        for entry in result.inserted.values() {
            out.push_str(&format!(
                "  {} {}: {}\n",
                paint("+", Tone::Added, color),
                entry.name,
                entry.version
            ));
        }
    }

    if !result.deleted.is_empty() {
        out.push_str(&format!("\n{}\n", paint("Deleted:", Tone::Heading, color)));
        for entry in result.deleted.values() {
            out.push_str(&format!(
                "  {} {}: {}\n",
                paint("-", Tone::Removed, color),
                entry.name,
                entry.version
            ));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use crate::compare::compare;
    use crate::types::{service_map, PlatformSnapshot, Release};
    use chrono::{TimeZone, Utc};

    fn diff() -> crate::compare::ComparisonResult {
        let a = PlatformSnapshot::new(
            Release::new("v1.0.0").published(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
            service_map([("api", "v1"), ("legacy", "v0.9")]),
        );
        let b = PlatformSnapshot::new(
            Release::new("v1.1.0").published(Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()),
            service_map([("api", "v2"), ("worker", "v1")]),
        );
        compare(&a, &b)
    }

    #[test]
    fn test_plain_report() {
        let expected = "\
Platform release: v1.0.0 → v1.1.0

Changed:
  api: v1 → v2

Inserted:
  + worker: v1

Deleted:
  - legacy: v0.9
";
        assert_eq!(diff().render(false), expected);
        assert_eq!(diff().without_color().to_string(), expected);
    }

    #[test]
    fn test_colored_report_has_escapes() {
        colored::control::set_override(true);
        let report = diff().render(true);
        colored::control::unset_override();
        assert!(report.contains("\u{1b}["));
        assert!(report.contains("api"));
    }

    #[test]
    fn test_empty_report() {
        let snapshot = PlatformSnapshot::new(Release::new("v1"), service_map([("a", "1")]));
        let report = compare(&snapshot, &snapshot).render(false);
        assert!(report.ends_with("No service version changes.\n"));
    }
}
