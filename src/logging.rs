//! Logging setup for the `bt` binary.
//!
//! Diagnostics always go to stderr so stdout stays clean for `--json`
//! output. `RUST_LOG`, when set, overrides the verbosity flags.

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

static INIT: OnceCell<()> = OnceCell::new();

/// Default filter directive for a verbosity level.
#[must_use]
pub fn default_directive(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber. Later calls are no-ops.
///
/// # Errors
///
/// Returns an error if the filter cannot be parsed or a subscriber was
/// already installed by someone else.
pub fn init_logging(verbose: u8, quiet: bool, json: bool) -> anyhow::Result<()> {
    INIT.get_or_try_init(|| {
        let filter = match std::env::var("RUST_LOG") {
            Ok(spec) if !spec.trim().is_empty() => EnvFilter::try_new(spec)?,
            _ => EnvFilter::try_new(default_directive(verbose, quiet))?,
        };

        let registry = tracing_subscriber::registry().with(filter);
        if json {
            registry
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .try_init()?;
        } else {
            registry
                .with(
                    fmt::layer()
                        .with_target(verbose > 1)
                        .with_writer(std::io::stderr),
                )
                .try_init()?;
        }
        Ok::<(), anyhow::Error>(())
    })
    .map(|_| ())
}
