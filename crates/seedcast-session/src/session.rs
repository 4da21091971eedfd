//! The session record and its lifecycle state machine.
//!
//! One `Session` exists per process run. It is owned exclusively by the
//! `SessionController`; the dashboard and the playback dispatcher receive
//! read-only views of it and request transitions through the controller
//! rather than mutating state themselves.

use std::path::PathBuf;
use std::time::Instant;

use uuid::Uuid;

use crate::playback::PlayerChoice;

/// What the session is doing while `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveMode {
    /// Fetching remote data while serving what is already local.
    Downloading,
    /// Local data is verified-complete; only serving.
    Seeding,
}

/// Lifecycle states, in transition order. The orthogonal terminating flag
/// lives on [`Session`] and can interrupt any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Locator accepted, engine handle not yet registered.
    Initializing,
    /// Registered; waiting for torrent metadata from the swarm.
    AwaitingMetadata,
    /// Checking existing on-disk data against the piece hashes.
    Verifying,
    /// Metadata known and the local serving endpoint is up.
    Ready,
    /// Transferring, with the mode recorded alongside.
    Active(ActiveMode),
    /// All local data downloaded and verified.
    Completed,
}

impl SessionState {
    const fn rank(self) -> u8 {
        match self {
            Self::Initializing => 0,
            Self::AwaitingMetadata => 1,
            Self::Verifying => 2,
            Self::Ready => 3,
            Self::Active(_) => 4,
            Self::Completed => 5,
        }
    }
}

/// Options supplied by the CLI surface at session start.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Download destination directory.
    pub destination: Option<PathBuf>,
    /// Explicit file index; used verbatim when present.
    pub explicit_index: Option<usize>,
    /// Whether the user asked to pick the file interactively.
    pub interactive_select: bool,
    /// Suppress the dashboard and incidental output.
    pub quiet: bool,
    /// Render per-piece block rows on each tick.
    pub verbose: bool,
    /// Subtitle file handed to subprocess targets that support one.
    pub subtitles: Option<PathBuf>,
    /// Port for the local HTTP serving endpoint.
    pub port: u16,
    /// Playback target, at most one per session.
    pub player: Option<PlayerChoice>,
    /// Whether stdin is an interactive terminal.
    pub is_tty: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            destination: None,
            explicit_index: None,
            interactive_select: false,
            quiet: false,
            verbose: false,
            subtitles: None,
            port: 8000,
            player: None,
            is_tty: false,
        }
    }
}

/// Per-run session record. Replaces the module-level mutable globals of
/// older streaming CLIs with one explicit value passed to every component.
#[derive(Debug)]
pub struct Session {
    /// Unique id for log correlation.
    pub id: Uuid,
    /// Raw locator string as the user supplied it.
    pub locator: String,
    /// Destination directory, when downloading to a fixed place.
    pub destination: Option<PathBuf>,
    state: SessionState,
    terminating: bool,
    /// Index chosen by the selector, once selection has run.
    pub selected_file: Option<usize>,
    /// Active playback target name, once dispatched.
    pub player: Option<&'static str>,
    /// Computed access URL for the selected file.
    pub access_url: Option<String>,
    started: Instant,
}

impl Session {
    /// Fresh record in `Initializing`, clock started.
    #[must_use]
    pub fn new(locator: &str, destination: Option<PathBuf>) -> Self {
        Self {
            id: Uuid::new_v4(),
            locator: locator.to_owned(),
            destination,
            state: SessionState::Initializing,
            terminating: false,
            selected_file: None,
            player: None,
            access_url: None,
            started: Instant::now(),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Apply a forward transition. Regressions are ignored, keeping the
    /// state machine monotonic even when engine events interleave oddly
    /// with render ticks. Returns whether the transition was applied.
    pub fn advance(&mut self, next: SessionState) -> bool {
        if next.rank() < self.state.rank() {
            return false;
        }
        self.state = next;
        true
    }

    /// Raise the orthogonal terminating flag. Valid from any state.
    pub fn request_termination(&mut self) {
        self.terminating = true;
    }

    /// Whether termination has been requested.
    #[must_use]
    pub const fn is_terminating(&self) -> bool {
        self.terminating
    }

    /// Seconds elapsed since the session started.
    #[must_use]
    pub fn runtime_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    /// When the session began, for dashboard elapsed-time rendering.
    #[must_use]
    pub const fn started(&self) -> Instant {
        self.started
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_are_monotonic() {
        let mut session = Session::new("magnet:?xt=urn:btih:00", None);
        assert!(session.advance(SessionState::AwaitingMetadata));
        assert!(session.advance(SessionState::Ready));
        assert!(
            !session.advance(SessionState::Verifying),
            "regression must be ignored"
        );
        assert_eq!(session.state(), SessionState::Ready);

        assert!(session.advance(SessionState::Active(ActiveMode::Downloading)));
        assert!(session.advance(SessionState::Completed));
    }

    #[test]
    fn terminating_is_orthogonal_to_state() {
        let mut session = Session::new("magnet:?xt=urn:btih:00", None);
        assert!(!session.is_terminating());
        session.request_termination();
        assert!(session.is_terminating());

        // Termination does not disturb the lifecycle state itself.
        assert_eq!(session.state(), SessionState::Initializing);
        assert!(session.advance(SessionState::AwaitingMetadata));
        assert!(session.is_terminating());
    }

    #[test]
    fn active_mode_reapplication_is_allowed() {
        let mut session = Session::new("demo", None);
        session.advance(SessionState::Active(ActiveMode::Downloading));
        assert!(session.advance(SessionState::Active(ActiveMode::Seeding)));
        assert_eq!(
            session.state(),
            SessionState::Active(ActiveMode::Seeding),
            "same-rank transition refreshes the mode"
        );
    }
}
