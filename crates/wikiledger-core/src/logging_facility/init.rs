//! Subscriber installation for the binary

use std::sync::Once;
use tracing_subscriber::{util::SubscriberInitExt, EnvFilter};

/// Environment variable selecting the output profile (`json` or `pretty`)
pub const PROFILE_ENV: &str = "WIKILEDGER_LOG";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Human-readable lines on stderr, `wikiledger=debug`
    Development,
    /// JSON lines on stderr, `wikiledger=info`
    Production,
    /// Bare registry; tests attach a capture layer via `init_test_capture()`
    Test,
}

impl Profile {
    /// `json` selects `Production`; anything else is human-readable.
    pub fn from_env() -> Self {
        match std::env::var(PROFILE_ENV).as_deref() {
            Ok("json") => Profile::Production,
            _ => Profile::Development,
        }
    }
}

/// `RUST_LOG` when set, otherwise the profile default.
fn filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

static INIT: Once = Once::new();

/// Install the global subscriber for `profile`. Later calls do nothing.
///
/// Logs go to stderr so command output on stdout stays machine-readable.
pub fn init(profile: Profile) {
    INIT.call_once(|| match profile {
        Profile::Development => tracing_subscriber::fmt()
            .with_env_filter(filter("wikiledger=debug"))
            .with_writer(std::io::stderr)
            .init(),
        Profile::Production => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter("wikiledger=info"))
            .with_writer(std::io::stderr)
            .init(),
        Profile::Test => tracing_subscriber::registry().init(),
    });
}
