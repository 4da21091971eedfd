//! Command-line surface.

use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use seedcast_session::{PlayerChoice, SessionOptions};

/// Stream, download, or seed a torrent with a live terminal dashboard.
#[derive(Debug, Parser)]
#[command(name = "seedcast", version, about)]
pub struct Cli {
    /// Magnet link, info hash, http(s) URL, .torrent file, or a local path
    /// to seed.
    pub locator: String,

    /// Download destination directory.
    #[arg(short = 'o', long = "out")]
    pub out: Option<PathBuf>,

    /// Act on this file index instead of the largest file.
    #[arg(short = 'i', long = "index")]
    pub index: Option<usize>,

    /// Pick the file interactively (lists files when stdin is not a
    /// terminal).
    #[arg(short = 's', long = "select")]
    pub select: bool,

    /// Suppress the dashboard and incidental output.
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,

    /// Render per-piece block rows on the dashboard.
    #[arg(long)]
    pub verbose: bool,

    /// Subtitle file handed to the player.
    #[arg(short = 't', long = "subtitles")]
    pub subtitles: Option<PathBuf>,

    /// Port for the local HTTP serving endpoint.
    #[arg(short = 'p', long = "port", default_value_t = 8000)]
    pub port: u16,

    /// Playback target to hand the stream to.
    #[arg(long, value_enum)]
    pub player: Option<PlayerArg>,
}

/// Playback targets accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PlayerArg {
    /// Cast to an Airplay renderer.
    Airplay,
    /// Cast to a Chromecast.
    Chromecast,
    /// Launch MPlayer locally.
    Mplayer,
    /// Launch mpv locally.
    Mpv,
    /// Launch OMXPlayer locally.
    Omx,
    /// Launch VLC locally.
    Vlc,
    /// Cast to an XBMC/Kodi renderer.
    Xbmc,
}

impl PlayerArg {
    /// The session-layer choice this flag value maps to.
    #[must_use]
    pub const fn choice(self) -> PlayerChoice {
        match self {
            Self::Airplay => PlayerChoice::Airplay,
            Self::Chromecast => PlayerChoice::Chromecast,
            Self::Mplayer => PlayerChoice::Mplayer,
            Self::Mpv => PlayerChoice::Mpv,
            Self::Omx => PlayerChoice::Omx,
            Self::Vlc => PlayerChoice::Vlc,
            Self::Xbmc => PlayerChoice::Xbmc,
        }
    }
}

impl Cli {
    /// Translate parsed flags into session options. A non-terminal stdout
    /// implies quiet; the dashboard is never painted into a pipe.
    #[must_use]
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            destination: self.out.clone(),
            explicit_index: self.index,
            interactive_select: self.select,
            quiet: self.quiet || !std::io::stdout().is_terminal(),
            verbose: self.verbose,
            subtitles: self.subtitles.clone(),
            port: self.port,
            player: self.player.map(PlayerArg::choice),
            is_tty: std::io::stdin().is_terminal(),
        }
    }
}
