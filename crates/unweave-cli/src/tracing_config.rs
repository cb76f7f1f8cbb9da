//! Tracing configuration for debugging reconstruction passes.
//!
//! Two output formats, controlled by `UNWEAVE_LOG_FORMAT`:
//!
//! - `text` (default): standard `tracing-subscriber` flat output
//! - `json`: one JSON object per event, machine-readable
//!
//! ```bash
//! UNWEAVE_LOG=debug unweave bundle.js
//! UNWEAVE_LOG=unweave_unpack=trace UNWEAVE_LOG_FORMAT=json unweave bundle.js
//! ```
//!
//! The subscriber is only initialised when `UNWEAVE_LOG` (or `RUST_LOG`)
//! is set, so there is zero overhead in normal runs.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Build an `EnvFilter` from `UNWEAVE_LOG`, falling back to `RUST_LOG`.
fn build_filter() -> EnvFilter {
    if let Ok(val) = std::env::var("UNWEAVE_LOG") {
        EnvFilter::builder().parse_lossy(val)
    } else {
        EnvFilter::from_default_env()
    }
}

/// Initialise the global tracing subscriber.
///
/// All output goes to stderr so it never interferes with stdout
/// (module listings and the summary line).
pub fn init_tracing() {
    let has_unweave_log = std::env::var("UNWEAVE_LOG").is_ok();
    let has_rust_log = std::env::var("RUST_LOG").is_ok();
    if !has_unweave_log && !has_rust_log {
        return;
    }

    let filter = build_filter();
    let json = std::env::var("UNWEAVE_LOG_FORMAT")
        .is_ok_and(|format| format.eq_ignore_ascii_case("json"));

    if json {
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr);
        tracing_subscriber::registry()
            .with(filter)
            .with(json_layer)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}
