//! Engine-agnostic interfaces and DTOs for the seedcast session layer.
//!
//! The download engine (peer wire protocol, piece verification, disk
//! storage, HTTP range serving) is an external collaborator. This crate
//! defines the seam the session layer consumes: a pair of object-safe
//! traits plus read-only snapshot types, so the controller and dashboard
//! never depend on a concrete engine implementation.

mod error;
mod model;

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use seedcast_events::EventStream;

pub use error::{EngineError, EngineResult, LocatorError};
pub use model::{
    AddOptions, BlockState, FileDescriptor, Locator, PeerSnapshot, PieceSnapshot, SwarmSnapshot,
};

/// Entry point into the external download engine.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Hand a locator to the engine. Download locators start fetching;
    /// plain content paths are seeded. Readiness arrives asynchronously on
    /// the handle's event stream.
    async fn add_or_seed(
        &self,
        locator: Locator,
        options: AddOptions,
    ) -> EngineResult<Arc<dyn EngineHandle>>;

    /// Release every engine resource. Called exactly once during teardown.
    async fn shutdown(&self) -> EngineResult<()>;
}

/// Handle to one torrent inside the engine.
///
/// Snapshot accessors read already-published, eventually-consistent
/// counters and never block on engine progress; the dashboard calls them
/// on every render tick.
#[async_trait]
pub trait EngineHandle: Send + Sync {
    /// Subscribe to the engine's lifecycle events for this torrent.
    fn subscribe(&self) -> EventStream;

    /// Torrent display name, once metadata is known.
    fn name(&self) -> Option<String>;

    /// Hex info hash, once known.
    fn info_hash(&self) -> Option<String>;

    /// Total payload length in bytes; zero before metadata.
    fn total_length(&self) -> u64;

    /// Number of pieces; zero before metadata.
    fn piece_count(&self) -> u64;

    /// Snapshot of the file list. Empty before metadata.
    fn files(&self) -> Vec<FileDescriptor>;

    /// Swarm-wide byte counters plus one row per connected wire.
    fn swarm(&self) -> SwarmSnapshot;

    /// Per-piece verification and block state, for verbose rendering.
    fn pieces(&self) -> Vec<PieceSnapshot>;

    /// Whether local data is fully downloaded and verified.
    fn is_complete(&self) -> bool;

    /// Number of connections the local HTTP endpoint has accepted.
    fn served_connections(&self) -> u64;

    /// Mark a file for prioritized delivery.
    async fn select_file(&self, index: usize) -> EngineResult<()>;

    /// Start the local HTTP serving endpoint and return its bound address.
    async fn create_server(&self, port: u16) -> EngineResult<SocketAddr>;
}
