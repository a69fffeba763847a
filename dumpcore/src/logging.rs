//! Diagnostic tracing for dumpcore.
//!
//! Output goes to stderr so stdout stays reserved for command results
//! (destination paths, JSON, script output).

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Env var checked before `RUST_LOG`.
pub const LOG_ENV: &str = "DUMPCORE_LOG";

/// Filter used when neither env var is set, by `-v` count.
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "dumpcore=info,warn",
        2 => "dumpcore=debug,info",
        _ => "trace",
    }
}

fn filter_for(verbosity: u8) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)))
}

/// Install the stderr subscriber.
///
/// `DUMPCORE_LOG` wins over `RUST_LOG`; with neither set the level follows
/// `verbosity`, e.g. `dumpcore -vv dump --dest ./cores`.
pub fn init(verbosity: u8) {
    tracing_subscriber::registry()
        .with(filter_for(verbosity))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbosity > 1)
                .compact(),
        )
        .init();
}
