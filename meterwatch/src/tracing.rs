//! Logging setup and the prelude used throughout the crate.
//!
//! Modules pull the usual macros in with
//! `use crate::tracing::prelude::*;` so the subscriber backend stays a
//! single-file decision.

use std::env;

use tracing_subscriber::{EnvFilter, fmt::time::LocalTime, prelude::*};

pub mod prelude {
    pub use ::tracing::{debug, error, info, trace, warn};
}

const DEFAULT_FILTER: &str = "info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber.
///
/// Under systemd (`JOURNAL_STREAM` is set) events go to journald with
/// structured fields intact. Anywhere else, or if the journal socket
/// can't be reached, they're formatted to stdout with local
/// timestamps. `RUST_LOG` overrides the default `info` filter in both
/// cases.
pub fn init_journald_or_stdout() {
    if env::var_os("JOURNAL_STREAM").is_some() {
        match tracing_journald::layer() {
            Ok(journald) => {
                tracing_subscriber::registry()
                    .with(env_filter())
                    .with(journald)
                    .init();
                return;
            }
            Err(e) => eprintln!("journald unavailable, logging to stdout: {e}"),
        }
    }

    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().with_timer(LocalTime::rfc_3339()))
        .init();
}
