//! # Design
//!
//! - Centralize session-level errors across the controller, selector,
//!   dispatcher, and shutdown path.
//! - Keep error messages constant while carrying context fields for
//!   debugging.
//! - Preserve source errors without re-logging at call sites.
//!
//! Every fatal category funnels to one error-reporting exit path in the
//! binary; nothing here is retried. A user interrupt during the selection
//! prompt is deliberately not an error (see `SessionOutcome::Cancelled`).

use std::io;

use seedcast_engine::{EngineError, LocatorError};
use thiserror::Error;

/// Result alias for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Session-level error type.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The locator string matched no recognized identifier shape.
    #[error("unrecognized locator")]
    LocatorParse {
        /// Raw locator input.
        input: String,
        /// Source classification error.
        #[source]
        source: LocatorError,
    },
    /// An engine operation failed; forwarded, never retried.
    #[error("engine operation failed")]
    EngineFatal {
        /// Operation identifier.
        operation: &'static str,
        /// Source engine error.
        #[source]
        source: EngineError,
    },
    /// The engine reported a fatal error on its event stream.
    #[error("engine reported fatal error")]
    EngineReported {
        /// Engine-supplied failure message.
        message: String,
    },
    /// No playback candidate launched and no device was discovered.
    #[error("playback launch failed")]
    PlaybackLaunch {
        /// Target name from the player table.
        target: &'static str,
        /// Last launch failure observed.
        reason: String,
    },
    /// A second playback dispatch was requested for the same session.
    #[error("playback already dispatched")]
    DispatchConflict {
        /// Target name of the conflicting request.
        target: &'static str,
    },
    /// Engine release failed during teardown; cleanup still completed as
    /// far as possible.
    #[error("shutdown teardown failed")]
    ShutdownTeardown {
        /// Source engine error.
        #[source]
        source: EngineError,
    },
    /// Terminal interaction failed (raw mode, cursor control, drawing).
    #[error("terminal operation failed")]
    Terminal {
        /// Operation identifier.
        operation: &'static str,
        /// Source IO error.
        #[source]
        source: io::Error,
    },
}

impl SessionError {
    pub(crate) const fn engine(operation: &'static str, source: EngineError) -> Self {
        Self::EngineFatal { operation, source }
    }

    pub(crate) const fn terminal(operation: &'static str, source: io::Error) -> Self {
        Self::Terminal { operation, source }
    }
}
