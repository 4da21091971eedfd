#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Application bootstrap for the `seedcast` binary.
//!
//! The binary itself ships no download engine; the engine seam
//! ([`seedcast_engine::Engine`]) is provided by an adapter crate that
//! embeds this library and calls [`run_with_engine`]. Running the bare
//! binary reports the missing adapter and exits non-zero.

pub mod cli;
pub mod error;
pub mod telemetry;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use seedcast_engine::Engine;
use seedcast_session::{SessionController, SessionOptions};
use tracing::info;

pub use error::{AppError, AppResult};

use cli::Cli;

/// Parse the command line, install logging, and run one session.
///
/// # Errors
///
/// Fails when telemetry cannot be installed, when no engine adapter is
/// linked into the build, or when the session itself fails.
pub async fn run_app() -> AppResult<ExitCode> {
    let cli = Cli::parse();
    telemetry::init_logging(cli.quiet).map_err(|source| AppError::Telemetry { source })?;
    let engine = linked_engine()?;
    run_with_engine(engine, &cli.locator, cli.session_options()).await
}

/// Run one session against an injected engine. This is the entry point for
/// adapter crates and tests.
///
/// # Errors
///
/// Fails when signal handlers cannot be installed or the session ends with
/// a fatal error.
pub async fn run_with_engine(
    engine: Arc<dyn Engine>,
    locator: &str,
    options: SessionOptions,
) -> AppResult<ExitCode> {
    let graceful = arm_signals(&options);
    let controller = SessionController::new(engine, options);
    if graceful {
        controller
            .shutdown_coordinator()
            .install_signal_handlers()
            .map_err(|source| AppError::Signals { source })?;
    }

    let outcome = controller
        .run(locator)
        .await
        .map_err(|source| AppError::Session { source })?;
    info!(?outcome, "session finished");
    Ok(ExitCode::SUCCESS)
}

/// Diagnostic banner for fatal errors, printed once at process exit.
pub fn report_fatal(err: &AppError) {
    eprintln!("ERROR: {err}");
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        eprintln!("  caused by: {cause}");
        source = cause.source();
    }
    eprintln!(
        "seedcast {} on {}-{}",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    );
    eprintln!("If you believe this is a bug in seedcast, please report it:");
    eprintln!("  https://github.com/seedcast/seedcast/issues");
}

/// Graceful signal handling is armed only when no fixed destination was
/// given. With `--out` set an interrupt should stop the write immediately,
/// so the default signal disposition is kept.
fn arm_signals(options: &SessionOptions) -> bool {
    options.destination.is_none()
}

fn linked_engine() -> AppResult<Arc<dyn Engine>> {
    // No adapter is compiled into the stock binary.
    Err(AppError::MissingDependency {
        operation: "add_or_seed",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn signals_are_armed_only_without_a_fixed_destination() {
        let streaming = SessionOptions::default();
        assert!(arm_signals(&streaming));

        let fixed = SessionOptions {
            destination: Some(PathBuf::from("/tmp/dl")),
            ..SessionOptions::default()
        };
        assert!(!arm_signals(&fixed));
    }
}
