//! Snapshot DTOs and the locator model shared across the workspace.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::LocatorError;

/// Identifier handed to the engine at session start.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Locator {
    /// Magnet-style URI.
    Magnet {
        /// Full magnet URI including the scheme.
        uri: String,
    },
    /// Remote URL to a `.torrent` file.
    HttpUrl {
        /// Parsed remote URL.
        url: Url,
    },
    /// Filesystem path to a `.torrent` file.
    TorrentFile {
        /// Path to the metainfo file.
        path: PathBuf,
    },
    /// Bare hex info hash.
    InfoHash {
        /// Lowercase 40-character hex digest.
        hash: String,
    },
    /// Filesystem path to content that should be seeded.
    SeedPath {
        /// Path to the file or folder of content.
        path: PathBuf,
    },
}

impl Locator {
    /// Classify a raw identifier string.
    ///
    /// Recognized shapes, in order: magnet URI, http(s) URL, 40-character
    /// hex info hash, path to a `.torrent` file, existing filesystem path
    /// (seed mode). Anything else is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`LocatorError`] when the input matches no recognized shape
    /// or carries a malformed URL.
    pub fn parse(input: &str) -> Result<Self, LocatorError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(LocatorError::Unrecognized {
                input: input.to_owned(),
            });
        }

        if trimmed.to_ascii_lowercase().starts_with("magnet:") {
            return Ok(Self::Magnet {
                uri: trimmed.to_owned(),
            });
        }

        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            let url = Url::parse(trimmed).map_err(|source| LocatorError::InvalidUrl {
                input: trimmed.to_owned(),
                source,
            })?;
            return Ok(Self::HttpUrl { url });
        }

        if trimmed.len() == 40 && trimmed.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Ok(Self::InfoHash {
                hash: trimmed.to_ascii_lowercase(),
            });
        }

        let path = Path::new(trimmed);
        if path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("torrent"))
        {
            return Ok(Self::TorrentFile {
                path: path.to_owned(),
            });
        }

        if path.exists() {
            return Ok(Self::SeedPath {
                path: path.to_owned(),
            });
        }

        Err(LocatorError::Unrecognized {
            input: input.to_owned(),
        })
    }

    /// Whether the locator seeds existing content rather than downloading.
    #[must_use]
    pub const fn is_seed(&self) -> bool {
        matches!(self, Self::SeedPath { .. })
    }
}

/// Optional knobs applied alongside locator admission.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AddOptions {
    /// Download destination directory; engine default when absent.
    pub destination: Option<PathBuf>,
}

/// One file inside a multi-file torrent. Read-only snapshot requested once
/// per selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileDescriptor {
    /// Position in the torrent's file list.
    pub index: usize,
    /// Display name (path within the torrent).
    pub name: String,
    /// Length in bytes.
    pub length: u64,
}

/// One peer connection, as published by the engine per render tick.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PeerSnapshot {
    /// Remote address; `None` for incoming wires without a resolved peer.
    pub address: Option<SocketAddr>,
    /// Bytes downloaded from this wire.
    pub downloaded: u64,
    /// Instantaneous download speed, bytes per second.
    pub download_speed: u64,
    /// Instantaneous upload speed, bytes per second.
    pub upload_speed: u64,
    /// Whether the peer is currently choking us.
    pub choking: bool,
    /// Outstanding piece-request indices.
    pub requests: Vec<u64>,
    /// Which pieces the peer advertises; empty before metadata.
    pub bitfield: Vec<bool>,
}

/// Swarm-wide counters plus one row per wire.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SwarmSnapshot {
    /// Cumulative bytes downloaded this session.
    pub downloaded: u64,
    /// Cumulative bytes uploaded this session.
    pub uploaded: u64,
    /// Aggregate download speed, bytes per second.
    pub download_speed: u64,
    /// Connected wires.
    pub wires: Vec<PeerSnapshot>,
}

/// Transfer/verification state of one block within a piece.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BlockState {
    /// Not yet requested.
    Blank,
    /// Requested from a wire, not yet written.
    Reserved,
    /// Written to the piece buffer.
    Written,
}

/// Verification state of one piece, exposed for verbose rendering only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PieceSnapshot {
    /// Whether the piece hash has been verified.
    pub verified: bool,
    /// Per-block transfer state.
    pub blocks: Vec<BlockState>,
    /// Bytes currently buffered in memory for this piece.
    pub buffered_bytes: u64,
}

impl PieceSnapshot {
    /// Whether no block has been reserved or written yet.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.blocks.iter().all(|block| *block == BlockState::Blank)
    }
}
