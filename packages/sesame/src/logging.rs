//! Structured logging setup.
//!
//! The library only emits `tracing` events; installing a subscriber is up to
//! the application. [`init`] installs a formatter driven by `RUST_LOG`:
//! - `RUST_LOG=sesame=debug` - Log every rejected token with its reason
//! - `RUST_LOG=sesame=info` - Log configuration loads and reloads
//! - `RUST_LOG=sesame=warn` - Only tokens that need to be regenerated

use std::sync::Once;
use tracing_subscriber::EnvFilter;

static INIT_LOGGER: Once = Once::new();

/// Number of token characters kept when a token appears in a log line
pub const REDACTED_PREFIX_LEN: usize = 8;

/// Initialize logging (should be called once at application startup)
pub fn init() {
    INIT_LOGGER.call_once(|| {
        let installed = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_target(true)
            .try_init()
            .is_ok();
        if installed {
            tracing::info!("Structured logging initialized");
        }
    });
}

/// Initialize logging for test environments
///
/// Output goes through the test harness capture. Safe to call from every test.
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Shorten a token for logging so that log lines can't be replayed
#[must_use]
pub fn redact(token: &str) -> String {
    match token.char_indices().nth(REDACTED_PREFIX_LEN) {
        Some((end, _)) => format!("{}...", &token[..end]),
        None => token.to_string(),
    }
}
