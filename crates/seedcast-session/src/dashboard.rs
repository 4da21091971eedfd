//! Live telemetry dashboard.
//!
//! Every tick rebuilds the full frame from a fresh engine snapshot and
//! repaints the terminal from the top, so a dropped frame never leaves
//! stale rows behind. Frame composition is pure string work; the render
//! task owns the terminal writes and the hotswap subscription.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use crossterm::{
    cursor::MoveTo,
    queue,
    terminal::{self, Clear, ClearType},
};
use seedcast_engine::{BlockState, EngineHandle, PeerSnapshot, PieceSnapshot};
use seedcast_events::Event;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::fmt::{bytes_to_f64, human_bytes, human_duration};

/// Redraw cadence.
const TICK: Duration = Duration::from_millis(500);

/// Rows kept free below the peer table for the frame footer.
const FOOTER_ROWS: usize = 4;

/// Static facts the renderer displays alongside engine snapshots.
#[derive(Debug, Clone, Default)]
pub struct DashboardConfig {
    /// Render per-piece block rows on every tick.
    pub verbose: bool,
    /// Active playback target name, when one was dispatched.
    pub player: Option<&'static str>,
    /// Access URL of the local serving endpoint.
    pub access_url: Option<String>,
    /// Fixed download destination, when one was given.
    pub destination: Option<PathBuf>,
}

/// Periodic full-redraw renderer. `start` and `stop` are idempotent.
pub struct TelemetryRenderer {
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TelemetryRenderer {
    /// Renderer with no running task.
    #[must_use]
    pub fn new() -> Self {
        Self {
            task: Mutex::new(None),
        }
    }

    /// Begin the redraw loop. A second call while running is a no-op and
    /// returns `false`.
    ///
    /// # Panics
    ///
    /// Panics when the internal task slot mutex was poisoned.
    pub fn start(
        &self,
        handle: Arc<dyn EngineHandle>,
        config: DashboardConfig,
        started: std::time::Instant,
    ) -> bool {
        let mut slot = self.task.lock().expect("renderer task lock");
        if slot.is_some() {
            return false;
        }
        *slot = Some(tokio::spawn(render_loop(handle, config, started)));
        true
    }

    /// Stop repainting. Safe to call before `start` or more than once.
    ///
    /// # Panics
    ///
    /// Panics when the internal task slot mutex was poisoned.
    pub fn stop(&self) {
        if let Some(task) = self.task.lock().expect("renderer task lock").take() {
            task.abort();
            debug!("telemetry renderer stopped");
        }
    }
}

impl Default for TelemetryRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TelemetryRenderer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn render_loop(
    handle: Arc<dyn EngineHandle>,
    config: DashboardConfig,
    started: std::time::Instant,
) {
    let mut events = handle.subscribe();
    let mut hotswaps: u64 = 0;
    let mut interval = tokio::time::interval(TICK);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let rows = terminal::size().map_or(24, |(_, rows)| usize::from(rows));
                let frame = compose(
                    &FrameStats::capture(handle.as_ref()),
                    &config,
                    hotswaps,
                    started.elapsed().as_secs(),
                    rows,
                );
                if paint(&frame).is_err() {
                    // Terminal went away; keep counting, stop painting.
                    return;
                }
            }
            envelope = events.next() => {
                match envelope {
                    Some(envelope) => {
                        if matches!(envelope.event, Event::Hotswap { .. }) {
                            hotswaps += 1;
                        }
                    }
                    None => return,
                }
            }
        }
    }
}

fn paint(frame: &[String]) -> std::io::Result<()> {
    let mut out = std::io::stdout().lock();
    queue!(out, MoveTo(0, 0), Clear(ClearType::All))?;
    for line in frame {
        out.write_all(line.as_bytes())?;
        out.write_all(b"\r\n")?;
    }
    out.flush()
}

/// One tick's worth of engine state, captured before composing.
pub(crate) struct FrameStats {
    pub name: Option<String>,
    pub info_hash: Option<String>,
    pub total_length: u64,
    pub piece_count: u64,
    pub downloaded: u64,
    pub uploaded: u64,
    pub download_speed: u64,
    pub complete: bool,
    pub peers: Vec<PeerSnapshot>,
    pub pieces: Vec<PieceSnapshot>,
}

impl FrameStats {
    fn capture(handle: &dyn EngineHandle) -> Self {
        let swarm = handle.swarm();
        Self {
            name: handle.name(),
            info_hash: handle.info_hash(),
            total_length: handle.total_length(),
            piece_count: handle.piece_count(),
            downloaded: swarm.downloaded,
            uploaded: swarm.uploaded,
            download_speed: swarm.download_speed,
            complete: handle.is_complete(),
            peers: swarm.wires,
            pieces: handle.pieces(),
        }
    }
}

pub(crate) fn compose(
    stats: &FrameStats,
    config: &DashboardConfig,
    hotswaps: u64,
    runtime_secs: u64,
    rows: usize,
) -> Vec<String> {
    let mut frame = Vec::new();

    if let Some(player) = config.player {
        frame.push(format!("Streaming to {player}"));
    }
    if let Some(url) = &config.access_url {
        frame.push(format!("server running at {url}"));
    }
    if let Some(destination) = &config.destination {
        frame.push(format!("downloading to {}", destination.display()));
    }

    frame.push(String::new());
    let verb = if stats.complete { "seeding" } else { "downloading" };
    let name = stats.name.as_deref().unwrap_or("(metadata pending)");
    frame.push(format!("{verb}: {name}"));
    if stats.complete && let Some(hash) = &stats.info_hash {
        frame.push(format!("info hash: {hash}"));
    }

    let unchoked = stats.peers.iter().filter(|peer| !peer.choking).count();
    frame.push(format!(
        "speed: {}/s  downloaded: {}/{}  uploaded: {}  peers: {unchoked}/{}  hotswaps: {hotswaps}",
        human_bytes(stats.download_speed),
        human_bytes(stats.downloaded),
        human_bytes(stats.total_length),
        human_bytes(stats.uploaded),
        stats.peers.len(),
    ));
    frame.push(format!(
        "time remaining: {}  total time: {}",
        eta_label(stats.total_length, stats.downloaded, stats.download_speed),
        human_duration(runtime_secs),
    ));
    frame.push(rule());

    if config.verbose {
        compose_pieces(stats, &mut frame);
    }

    let available = rows
        .saturating_sub(frame.len())
        .saturating_sub(FOOTER_ROWS)
        .max(1);
    for peer in stats.peers.iter().take(available) {
        frame.push(peer_row(peer, stats.piece_count));
    }
    if stats.peers.len() > available {
        frame.push(rule());
        frame.push(format!("... and {} more", stats.peers.len() - available));
    }

    frame.push(rule());
    frame
}

fn compose_pieces(stats: &FrameStats, frame: &mut Vec<String>) {
    let mut buffered: u64 = 0;
    for (index, piece) in stats.pieces.iter().enumerate() {
        buffered += piece.buffered_bytes;
        if piece.verified || piece.is_blank() {
            continue;
        }
        frame.push(format!("{index:>4} {}", block_bar(&piece.blocks)));
    }
    frame.push(format!("storage mem: {}", human_bytes(buffered)));
    frame.push(rule());
}

fn block_bar(blocks: &[BlockState]) -> String {
    blocks
        .iter()
        .map(|block| match block {
            BlockState::Blank => '░',
            BlockState::Reserved => '▒',
            BlockState::Written => '█',
        })
        .collect()
}

fn peer_row(peer: &PeerSnapshot, piece_count: u64) -> String {
    let requests = peer
        .requests
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    let address = peer
        .address
        .map_or_else(|| "Unknown".to_owned(), |address| address.to_string());
    format!(
        "{:>4} {address:<21} {:>10} {:>10}/s {:>10}/s {:<8} {requests}",
        peer_progress(&peer.bitfield, piece_count),
        human_bytes(peer.downloaded),
        human_bytes(peer.download_speed),
        human_bytes(peer.upload_speed),
        if peer.choking { "choked" } else { "" },
    )
}

/// Per-peer progress label: percentage of pieces held, or `S` once a peer
/// advertises every piece.
pub(crate) fn peer_progress(bitfield: &[bool], piece_count: u64) -> String {
    if piece_count == 0 {
        return "?".to_owned();
    }
    let held = bitfield.iter().filter(|bit| **bit).count() as u64;
    if held >= piece_count {
        "S".to_owned()
    } else {
        format!("{}%", held * 100 / piece_count)
    }
}

pub(crate) fn eta_label(total: u64, downloaded: u64, speed: u64) -> String {
    let remaining = total.saturating_sub(downloaded);
    if remaining == 0 {
        return "done".to_owned();
    }
    if speed == 0 {
        return "unknown".to_owned();
    }
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "remaining/speed fits u64 for any realistic transfer"
    )]
    let secs = (bytes_to_f64(remaining) / bytes_to_f64(speed)).ceil() as u64;
    human_duration(secs)
}

fn rule() -> String {
    "─".repeat(80)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    fn peer(choking: bool, bitfield: Vec<bool>) -> PeerSnapshot {
        PeerSnapshot {
            address: Some(SocketAddr::from(([10, 0, 0, 7], 51413))),
            downloaded: 4096,
            download_speed: 1024,
            upload_speed: 0,
            choking,
            requests: vec![3, 9],
            bitfield,
        }
    }

    fn stats(peers: Vec<PeerSnapshot>) -> FrameStats {
        FrameStats {
            name: Some("ubuntu-24.04.iso".to_owned()),
            info_hash: Some("aaaabbbbccccddddeeeeffff0000111122223333".to_owned()),
            total_length: 1_000_000,
            piece_count: 4,
            downloaded: 250_000,
            uploaded: 10_000,
            download_speed: 50_000,
            complete: false,
            peers,
            pieces: Vec::new(),
        }
    }

    #[test]
    fn peer_progress_reports_seed_sentinel() {
        assert_eq!(peer_progress(&[true, true, true, true], 4), "S");
        assert_eq!(peer_progress(&[true, false, false, false], 4), "25%");
        assert_eq!(peer_progress(&[], 0), "?");
    }

    #[test]
    fn eta_handles_stalled_and_finished_transfers() {
        assert_eq!(eta_label(100, 100, 0), "done");
        assert_eq!(eta_label(100, 40, 0), "unknown");
        assert_eq!(eta_label(1000, 0, 100), "10s");
    }

    #[test]
    fn frame_counts_only_unchoked_peers_as_active() {
        let frame = compose(
            &stats(vec![
                peer(false, vec![true, true, true, true]),
                peer(true, vec![false, false, false, false]),
            ]),
            &DashboardConfig::default(),
            2,
            61,
            24,
        );
        let summary = frame
            .iter()
            .find(|line| line.starts_with("speed:"))
            .expect("summary line");
        assert!(summary.contains("peers: 1/2"), "{summary}");
        assert!(summary.contains("hotswaps: 2"), "{summary}");
        assert!(frame.iter().any(|line| line == "downloading: ubuntu-24.04.iso"));
        assert!(frame.iter().any(|line| line.contains("total time: 1m 1s")));
    }

    #[test]
    fn completed_frame_shows_seeding_and_info_hash() {
        let mut complete = stats(Vec::new());
        complete.complete = true;
        complete.downloaded = complete.total_length;
        let frame = compose(&complete, &DashboardConfig::default(), 0, 5, 24);
        assert!(frame.iter().any(|line| line.starts_with("seeding:")));
        assert!(frame
            .iter()
            .any(|line| line == "info hash: aaaabbbbccccddddeeeeffff0000111122223333"));
    }

    #[test]
    fn frame_header_reflects_configured_surfaces() {
        let config = DashboardConfig {
            verbose: false,
            player: Some("VLC"),
            access_url: Some("http://localhost:8000/0".to_owned()),
            destination: Some(PathBuf::from("/tmp/downloads")),
        };
        let frame = compose(&stats(Vec::new()), &config, 0, 1, 24);
        assert_eq!(frame[0], "Streaming to VLC");
        assert_eq!(frame[1], "server running at http://localhost:8000/0");
        assert_eq!(frame[2], "downloading to /tmp/downloads");
    }

    #[test]
    fn peer_table_truncates_to_terminal_height() {
        let peers = (0..30).map(|_| peer(false, vec![true; 4])).collect();
        let frame = compose(&stats(peers), &DashboardConfig::default(), 0, 1, 12);
        let more = frame
            .iter()
            .find(|line| line.starts_with("... and "))
            .expect("truncation marker");
        assert!(more.ends_with("more"));
        assert!(frame.len() <= 16);
    }

    #[test]
    fn verbose_frame_renders_block_bars_for_partial_pieces() {
        let mut verbose_stats = stats(Vec::new());
        verbose_stats.pieces = vec![
            PieceSnapshot {
                verified: true,
                blocks: vec![BlockState::Written; 4],
                buffered_bytes: 0,
            },
            PieceSnapshot {
                verified: false,
                blocks: vec![
                    BlockState::Written,
                    BlockState::Reserved,
                    BlockState::Blank,
                    BlockState::Blank,
                ],
                buffered_bytes: 32_768,
            },
        ];
        let config = DashboardConfig {
            verbose: true,
            ..DashboardConfig::default()
        };
        let frame = compose(&verbose_stats, &config, 0, 1, 40);
        assert!(frame.iter().any(|line| line.ends_with("█▒░░")));
        assert!(frame.iter().any(|line| line.starts_with("storage mem: ")));
        // Verified pieces never get a bar.
        assert_eq!(
            frame.iter().filter(|line| line.contains('░')).count(),
            1
        );
    }
}
