//! Subscriber setup for binaries and tests.
//!
//! The library itself only emits `tracing` events; nothing is printed unless
//! a subscriber is installed, e.g. through [`init`].

use std::sync::Once;
use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "pinsync=info";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Profile {
    /// Human-readable, multi-field output
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
    /// Single-line output without targets
    Compact,
}

static INIT_ONCE: Once = Once::new();

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber for `profile`. Later calls are no-ops, and
/// an already installed subscriber (from a test harness, say) is left alone.
pub fn init(profile: Profile) {
    INIT_ONCE.call_once(|| {
        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_writer(std::io::stderr);
        let _ = match profile {
            Profile::Pretty => builder.try_init(),
            Profile::Json => builder.json().try_init(),
            Profile::Compact => builder.compact().with_target(false).try_init(),
        };
    });
}
