//! # Design
//!
//! - Centralize application-level errors for bootstrap and the session run.
//! - Keep error messages constant while carrying context fields for
//!   debugging.
//! - Preserve source errors without re-logging at call sites.

use std::io;

use seedcast_session::SessionError;
use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Source subscriber installation error.
        #[source]
        source: tracing_subscriber::util::TryInitError,
    },
    /// No torrent engine adapter is linked into this build.
    #[error("no torrent engine is available in this build")]
    MissingDependency {
        /// Operation that needed the engine.
        operation: &'static str,
    },
    /// Signal handler installation failed.
    #[error("signal handler installation failed")]
    Signals {
        /// Source IO error.
        #[source]
        source: io::Error,
    },
    /// The session ended with a fatal error.
    #[error("session failed")]
    Session {
        /// Source session error.
        #[source]
        source: SessionError,
    },
}
