//! Playback target table and dispatch.
//!
//! Targets are a declarative table selected by a single enumerated choice,
//! so mutual exclusion holds by construction; the dispatcher still guards
//! against a second dispatch within one session. Subprocess targets walk an
//! ordered candidate list of executable paths (PATH name first, then
//! platform install locations) until one launches. Discovery targets take
//! the first device a scan reports and never re-discover after a
//! disconnect.

mod ssdp;

use std::io;
use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::{SessionError, SessionResult};

pub use ssdp::SsdpBrowser;

/// How long a discovery scan waits for the first device.
const DISCOVERY_WINDOW: Duration = Duration::from_secs(10);

/// Enumerated playback target choice exposed on the CLI surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerChoice {
    /// Cast to an Airplay renderer on the LAN.
    Airplay,
    /// Cast to a Chromecast on the LAN.
    Chromecast,
    /// Launch a local MPlayer process.
    Mplayer,
    /// Launch a local mpv process.
    Mpv,
    /// Launch a local OMXPlayer process.
    Omx,
    /// Launch a local VLC process.
    Vlc,
    /// Cast to an XBMC/Kodi renderer on the LAN.
    Xbmc,
}

impl PlayerChoice {
    /// Display name from the target table.
    #[must_use]
    pub fn name(self) -> &'static str {
        self.target().name
    }

    /// Discovery targets stream over the LAN, so the access URL must use a
    /// routable address instead of localhost.
    #[must_use]
    pub fn wants_lan_url(self) -> bool {
        matches!(self.target().kind, TargetKind::DiscoveryBrowse { .. })
    }

    /// The table row backing this choice.
    #[must_use]
    pub fn target(self) -> &'static PlayerTarget {
        match self {
            Self::Airplay => &AIRPLAY,
            Self::Chromecast => &CHROMECAST,
            Self::Mplayer => &MPLAYER,
            Self::Mpv => &MPV,
            Self::Omx => &OMX,
            Self::Vlc => &VLC,
            Self::Xbmc => &XBMC,
        }
    }
}

/// How a target is invoked.
#[derive(Debug)]
pub enum TargetKind {
    /// Launch a local player process.
    Subprocess {
        /// Executable candidates, tried in order.
        candidates: &'static [&'static str],
        /// Fixed arguments placed before the access URL.
        args: &'static [&'static str],
        /// Subtitle flag template; a trailing `=` means the path is
        /// concatenated into a single argument. Targets without a template
        /// silently skip subtitle injection.
        subtitle_flag: Option<&'static str>,
    },
    /// Scan for a device and hand it the access URL.
    DiscoveryBrowse {
        /// SSDP search target advertised by compatible devices.
        search_target: &'static str,
    },
}

/// One row of the static player table.
#[derive(Debug)]
pub struct PlayerTarget {
    /// Display name, also used in launch error messages.
    pub name: &'static str,
    /// Invocation strategy.
    pub kind: TargetKind,
}

static VLC: PlayerTarget = PlayerTarget {
    name: "VLC",
    kind: TargetKind::Subprocess {
        candidates: &[
            "vlc",
            "/Applications/VLC.app/Contents/MacOS/VLC",
            "~/Applications/VLC.app/Contents/MacOS/VLC",
            r"C:\Program Files\VideoLAN\VLC\vlc.exe",
            r"C:\Program Files (x86)\VideoLAN\VLC\vlc.exe",
        ],
        args: &["--play-and-exit"],
        subtitle_flag: Some("--sub-file="),
    },
};

static MPLAYER: PlayerTarget = PlayerTarget {
    name: "MPlayer",
    kind: TargetKind::Subprocess {
        candidates: &["mplayer"],
        args: &["-ontop", "-really-quiet", "-noidx", "-loop", "0"],
        subtitle_flag: Some("-sub"),
    },
};

static MPV: PlayerTarget = PlayerTarget {
    name: "mpv",
    kind: TargetKind::Subprocess {
        candidates: &["mpv"],
        args: &["--ontop", "--really-quiet", "--loop=no"],
        subtitle_flag: Some("--sub-file="),
    },
};

static OMX: PlayerTarget = PlayerTarget {
    name: "OMXPlayer",
    kind: TargetKind::Subprocess {
        candidates: &["omxplayer"],
        args: &["-r", "-o", "hdmi"],
        subtitle_flag: Some("--subtitles"),
    },
};

static AIRPLAY: PlayerTarget = PlayerTarget {
    name: "Airplay",
    kind: TargetKind::DiscoveryBrowse {
        search_target: "urn:schemas-upnp-org:device:MediaRenderer:1",
    },
};

static CHROMECAST: PlayerTarget = PlayerTarget {
    name: "Chromecast",
    kind: TargetKind::DiscoveryBrowse {
        search_target: "urn:dial-multiscreen-org:service:dial:1",
    },
};

static XBMC: PlayerTarget = PlayerTarget {
    name: "XBMC",
    kind: TargetKind::DiscoveryBrowse {
        search_target: "urn:schemas-upnp-org:device:MediaRenderer:1",
    },
};

/// A device reported by a discovery scan.
#[derive(Debug, Clone)]
pub struct DiscoveredDevice {
    /// Address the device responded from.
    pub address: std::net::SocketAddr,
    /// Control endpoint advertised by the device, when present.
    pub location: Option<String>,
}

/// Device discovery seam, stubbed in tests.
#[async_trait]
pub trait DeviceBrowser: Send + Sync {
    /// Scan for the first device matching `search_target` within `window`.
    ///
    /// # Errors
    ///
    /// Fails when the scan socket cannot be opened or read.
    async fn discover_first(
        &self,
        search_target: &str,
        window: Duration,
    ) -> io::Result<Option<DiscoveredDevice>>;

    /// Connect to the device and hand it the access URL.
    ///
    /// # Errors
    ///
    /// Fails when the device rejects or never answers the play request.
    async fn play(&self, device: &DiscoveredDevice, url: &str) -> io::Result<()>;
}

/// Signal that playback has run its course: the subprocess exited, or the
/// discovery target accepted the URL.
pub struct PlaybackHandle {
    /// Target name from the player table.
    pub target: &'static str,
    finished: oneshot::Receiver<()>,
}

impl PlaybackHandle {
    /// Wait for the playback-finished signal. Cancel-safe.
    pub async fn finished(&mut self) {
        let _ = (&mut self.finished).await;
    }
}

/// Launches or connects to exactly one playback target per session.
pub struct PlaybackDispatcher {
    browser: Arc<dyn DeviceBrowser>,
    dispatched: AtomicBool,
}

impl PlaybackDispatcher {
    /// Dispatcher backed by the real SSDP browser.
    #[must_use]
    pub fn new() -> Self {
        Self::with_browser(Arc::new(SsdpBrowser::new()))
    }

    /// Construct with an injected browser; used by tests.
    #[must_use]
    pub fn with_browser(browser: Arc<dyn DeviceBrowser>) -> Self {
        Self {
            browser,
            dispatched: AtomicBool::new(false),
        }
    }

    /// Dispatch the access URL to the chosen target.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::DispatchConflict`] on a second call within
    /// the same session and [`SessionError::PlaybackLaunch`] when no
    /// candidate executable spawns or no device is discovered.
    pub async fn dispatch(
        &self,
        choice: PlayerChoice,
        url: &str,
        subtitle: Option<&Path>,
    ) -> SessionResult<PlaybackHandle> {
        let target = choice.target();
        if self.dispatched.swap(true, Ordering::SeqCst) {
            return Err(SessionError::DispatchConflict {
                target: target.name,
            });
        }

        match &target.kind {
            TargetKind::Subprocess {
                candidates,
                args,
                subtitle_flag,
            } => launch_subprocess(target.name, candidates, args, *subtitle_flag, url, subtitle),
            TargetKind::DiscoveryBrowse { search_target } => {
                self.browse_and_play(target.name, search_target, url).await
            }
        }
    }

    async fn browse_and_play(
        &self,
        target: &'static str,
        search_target: &str,
        url: &str,
    ) -> SessionResult<PlaybackHandle> {
        let device = self
            .browser
            .discover_first(search_target, DISCOVERY_WINDOW)
            .await
            .map_err(|err| SessionError::PlaybackLaunch {
                target,
                reason: format!("discovery failed: {err}"),
            })?
            .ok_or_else(|| SessionError::PlaybackLaunch {
                target,
                reason: "no device discovered within the scan window".to_owned(),
            })?;

        debug!(target, address = %device.address, "device discovered, issuing play");
        self.browser
            .play(&device, url)
            .await
            .map_err(|err| SessionError::PlaybackLaunch {
                target,
                reason: format!("play request failed: {err}"),
            })?;

        // Hand-off complete; the device streams from the local endpoint
        // from here on. A later disconnect does not trigger re-discovery.
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(());
        Ok(PlaybackHandle {
            target,
            finished: rx,
        })
    }
}

impl Default for PlaybackDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn launch_subprocess(
    target: &'static str,
    candidates: &[&str],
    args: &[&str],
    subtitle_flag: Option<&str>,
    url: &str,
    subtitle: Option<&Path>,
) -> SessionResult<PlaybackHandle> {
    let mut last_failure = None;

    for candidate in candidates {
        let executable = expand_home(candidate);
        let mut command = Command::new(&executable);
        command
            .args(args)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        match (subtitle, subtitle_flag) {
            (Some(path), Some(flag)) if flag.ends_with('=') => {
                command.arg(format!("{flag}{}", path.display()));
            }
            (Some(path), Some(flag)) => {
                command.arg(flag).arg(path);
            }
            (Some(_), None) => {
                debug!(target, "target has no subtitle flag, skipping subtitle");
            }
            (None, _) => {}
        }

        match command.spawn() {
            Ok(mut child) => {
                debug!(target, %executable, "player process launched");
                let (tx, rx) = oneshot::channel();
                tokio::spawn(async move {
                    match child.wait().await {
                        Ok(status) => debug!(%status, "player process exited"),
                        Err(err) => debug!(error = %err, "failed to reap player process"),
                    }
                    let _ = tx.send(());
                });
                return Ok(PlaybackHandle {
                    target,
                    finished: rx,
                });
            }
            Err(err) => {
                debug!(target, %executable, error = %err, "candidate failed to spawn");
                last_failure = Some(err);
            }
        }
    }

    Err(SessionError::PlaybackLaunch {
        target,
        reason: last_failure.map_or_else(
            || "no candidate executables configured".to_owned(),
            |err| format!("no candidate executable launched: {err}"),
        ),
    })
}

fn expand_home(candidate: &str) -> String {
    candidate.strip_prefix("~/").map_or_else(
        || candidate.to_owned(),
        |rest| {
            std::env::var("HOME").map_or_else(
                |_| candidate.to_owned(),
                |home| format!("{home}/{rest}"),
            )
        },
    )
}

/// Compose the access URL for the selected file index. Discovery targets
/// receive a LAN-routable address; local players use the loopback name.
#[must_use]
pub fn access_url(player: Option<PlayerChoice>, port: u16, index: usize) -> String {
    let lan = player.is_some_and(PlayerChoice::wants_lan_url);
    if lan {
        format!("http://{}:{port}/{index}", lan_address())
    } else {
        format!("http://localhost:{port}/{index}")
    }
}

/// Best-effort LAN address: the kernel picks the outbound interface for a
/// datagram socket without sending any traffic.
fn lan_address() -> IpAddr {
    UdpSocket::bind(("0.0.0.0", 0))
        .and_then(|socket| {
            socket.connect(("192.0.2.1", 80))?;
            socket.local_addr()
        })
        .map_or(IpAddr::V4(Ipv4Addr::LOCALHOST), |addr| addr.ip())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::sync::Mutex;

    struct StubBrowser {
        device: Option<DiscoveredDevice>,
        played: Mutex<Vec<String>>,
    }

    impl StubBrowser {
        fn with_device() -> Self {
            Self {
                device: Some(DiscoveredDevice {
                    address: SocketAddr::from(([192, 168, 1, 50], 8009)),
                    location: Some("http://192.168.1.50:8008/apps".to_owned()),
                }),
                played: Mutex::new(Vec::new()),
            }
        }

        fn empty() -> Self {
            Self {
                device: None,
                played: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl DeviceBrowser for StubBrowser {
        async fn discover_first(
            &self,
            _search_target: &str,
            _window: Duration,
        ) -> io::Result<Option<DiscoveredDevice>> {
            Ok(self.device.clone())
        }

        async fn play(&self, _device: &DiscoveredDevice, url: &str) -> io::Result<()> {
            self.played.lock().expect("played mutex").push(url.to_owned());
            Ok(())
        }
    }

    #[tokio::test]
    async fn discovery_target_plays_on_first_device() -> anyhow::Result<()> {
        let browser = Arc::new(StubBrowser::with_device());
        let dispatcher = PlaybackDispatcher::with_browser(browser.clone());

        let mut handle = dispatcher
            .dispatch(PlayerChoice::Chromecast, "http://10.0.0.2:8000/0", None)
            .await?;
        assert_eq!(handle.target, "Chromecast");

        let played = browser.played.lock().expect("played mutex").clone();
        assert_eq!(played, vec!["http://10.0.0.2:8000/0".to_owned()]);

        // Hand-off complete means the finished signal is already pending.
        handle.finished().await;
        Ok(())
    }

    #[tokio::test]
    async fn discovery_without_device_is_a_launch_error() {
        let dispatcher = PlaybackDispatcher::with_browser(Arc::new(StubBrowser::empty()));
        let result = dispatcher
            .dispatch(PlayerChoice::Airplay, "http://10.0.0.2:8000/0", None)
            .await;
        assert!(matches!(
            result,
            Err(SessionError::PlaybackLaunch { target: "Airplay", .. })
        ));
    }

    #[tokio::test]
    async fn second_dispatch_is_a_configuration_error() -> anyhow::Result<()> {
        let dispatcher = PlaybackDispatcher::with_browser(Arc::new(StubBrowser::with_device()));
        dispatcher
            .dispatch(PlayerChoice::Xbmc, "http://10.0.0.2:8000/0", None)
            .await?;

        let second = dispatcher
            .dispatch(PlayerChoice::Vlc, "http://10.0.0.2:8000/0", None)
            .await;
        assert!(matches!(
            second,
            Err(SessionError::DispatchConflict { target: "VLC" })
        ));
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn subprocess_launch_walks_candidates_until_one_spawns() -> anyhow::Result<()> {
        let mut handle = launch_subprocess(
            "demo-player",
            &["/nonexistent/player-binary", "true"],
            &[],
            None,
            "http://localhost:8000/0",
            None,
        )?;
        handle.finished().await;
        Ok(())
    }

    #[tokio::test]
    async fn subprocess_launch_with_no_viable_candidate_fails() {
        let result = launch_subprocess(
            "demo-player",
            &["/nonexistent/player-binary"],
            &[],
            None,
            "http://localhost:8000/0",
            None,
        );
        assert!(matches!(
            result,
            Err(SessionError::PlaybackLaunch { target: "demo-player", .. })
        ));
    }

    #[test]
    fn access_url_uses_loopback_for_local_players() {
        assert_eq!(
            access_url(Some(PlayerChoice::Vlc), 8000, 2),
            "http://localhost:8000/2"
        );
        assert_eq!(access_url(None, 9000, 0), "http://localhost:9000/0");
        assert!(!access_url(Some(PlayerChoice::Chromecast), 8000, 1)
            .contains("localhost"));
    }

    #[test]
    fn every_choice_resolves_a_table_row() {
        for choice in [
            PlayerChoice::Airplay,
            PlayerChoice::Chromecast,
            PlayerChoice::Mplayer,
            PlayerChoice::Mpv,
            PlayerChoice::Omx,
            PlayerChoice::Vlc,
            PlayerChoice::Xbmc,
        ] {
            assert!(!choice.name().is_empty());
            if let TargetKind::Subprocess { candidates, .. } = &choice.target().kind {
                assert!(!candidates.is_empty());
            }
        }
    }
}
