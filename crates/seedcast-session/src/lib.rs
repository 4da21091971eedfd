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

//! Interactive session control for a torrent engine.
//!
//! This crate owns everything between the CLI surface and the engine seam:
//! the per-run [`Session`] record and its lifecycle state machine, file
//! selection, playback dispatch to local players and discovered devices,
//! the live telemetry dashboard, and coordinated shutdown.
//!
//! # Design
//!
//! - One `Session` per process run, owned by the [`SessionController`];
//!   no module-level mutable state.
//! - Every subsystem is reached through the controller, which alone
//!   applies state transitions.
//! - Shutdown is a first-class coordinator, not scattered signal hooks;
//!   the first trigger wins and teardown runs exactly once.

pub mod controller;
pub mod dashboard;
pub mod error;
pub mod fmt;
pub mod playback;
pub mod select;
pub mod session;
pub mod shutdown;

pub use controller::{SessionController, SessionOutcome};
pub use dashboard::{DashboardConfig, TelemetryRenderer};
pub use error::{SessionError, SessionResult};
pub use playback::{DeviceBrowser, DiscoveredDevice, PlaybackDispatcher, PlayerChoice};
pub use select::{Selection, default_index, select};
pub use session::{ActiveMode, Session, SessionOptions, SessionState};
pub use shutdown::{ShutdownCoordinator, ShutdownSignal};
