//! Error types for the engine seam.

use thiserror::Error;

/// Primary error type for engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine refused the locator outright.
    #[error("engine rejected locator")]
    Rejected {
        /// Human-readable rejection reason.
        reason: String,
    },
    /// An engine operation failed after admission.
    #[error("engine operation failed")]
    Operation {
        /// Operation identifier.
        operation: &'static str,
        /// Engine-reported failure message.
        message: String,
    },
    /// Operation is not supported by the underlying engine.
    #[error("engine operation not supported")]
    Unsupported {
        /// Operation identifier.
        operation: &'static str,
    },
}

/// Convenience alias for engine operation results.
pub type EngineResult<T> = Result<T, EngineError>;

/// Failure to classify a session locator string.
#[derive(Debug, Error)]
pub enum LocatorError {
    /// The input matched no recognized locator shape.
    #[error("unrecognized locator")]
    Unrecognized {
        /// Raw input that failed classification.
        input: String,
    },
    /// The input looked like a URL but failed to parse.
    #[error("invalid url locator")]
    InvalidUrl {
        /// Raw input that failed parsing.
        input: String,
        /// URL parse failure.
        #[source]
        source: url::ParseError,
    },
}
