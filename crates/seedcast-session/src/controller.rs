//! Session orchestration.
//!
//! The controller owns the [`Session`] record and drives it through two
//! phases. Phase one pumps engine events until the torrent is ready,
//! painting transient one-line status updates. Phase two starts the local
//! serving endpoint, runs selection and playback dispatch, starts the
//! dashboard, then waits for whichever comes first: completion with
//! nothing left to serve, playback finishing, or a shutdown trigger.

use std::io::{self, Write};
use std::sync::Arc;

use crossterm::QueueableCommand;
use crossterm::cursor::MoveToColumn;
use crossterm::terminal::{Clear, ClearType};
use seedcast_engine::{AddOptions, Engine, EngineHandle, Locator, SwarmSnapshot};
use seedcast_events::{Event, EventStream};
use tracing::{debug, info};

use crate::dashboard::{DashboardConfig, TelemetryRenderer};
use crate::error::{SessionError, SessionResult};
use crate::fmt::human_duration;
use crate::playback::{DeviceBrowser, PlaybackDispatcher, PlaybackHandle, access_url};
use crate::select::{Selection, default_index, select};
use crate::session::{ActiveMode, Session, SessionOptions, SessionState};
use crate::shutdown::{ShutdownCoordinator, ShutdownSignal};

/// How a session ended, for exit-code mapping at the binary surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Transfer finished and nothing was left to play or serve.
    Completed,
    /// The user backed out of the selection prompt, or asked for a listing.
    Cancelled,
    /// A shutdown trigger (signal or programmatic) ended the session.
    Terminated,
}

/// Owns one [`Session`] and every subsystem acting on it.
pub struct SessionController {
    engine: Arc<dyn Engine>,
    options: SessionOptions,
    dispatcher: PlaybackDispatcher,
    renderer: TelemetryRenderer,
    shutdown: ShutdownCoordinator,
}

impl SessionController {
    /// Controller with the default playback dispatcher and a fresh
    /// shutdown coordinator.
    #[must_use]
    pub fn new(engine: Arc<dyn Engine>, options: SessionOptions) -> Self {
        Self {
            engine,
            options,
            dispatcher: PlaybackDispatcher::new(),
            renderer: TelemetryRenderer::new(),
            shutdown: ShutdownCoordinator::new(),
        }
    }

    /// Swap in a device browser; used by tests to avoid network discovery.
    #[must_use]
    pub fn with_browser(mut self, browser: Arc<dyn DeviceBrowser>) -> Self {
        self.dispatcher = PlaybackDispatcher::with_browser(browser);
        self
    }

    /// The coordinator that ends this session. Clone it to wire up signal
    /// handlers or to terminate programmatically.
    #[must_use]
    pub fn shutdown_coordinator(&self) -> ShutdownCoordinator {
        self.shutdown.clone()
    }

    /// Run one session to completion.
    ///
    /// # Errors
    ///
    /// Fails on an unrecognized locator, a fatal engine error, a playback
    /// launch that finds no target, or a teardown failure.
    #[expect(
        clippy::too_many_lines,
        reason = "one linear script per session keeps the ordering auditable"
    )]
    pub async fn run(self, input: &str) -> SessionResult<SessionOutcome> {
        let locator = Locator::parse(input).map_err(|source| SessionError::LocatorParse {
            input: input.to_owned(),
            source,
        })?;
        let seed_mode = locator.is_seed();
        let mut session = Session::new(input, self.options.destination.clone());
        debug!(session = %session.id, locator = input, seed_mode, "session starting");

        let handle = self
            .engine
            .add_or_seed(
                locator,
                AddOptions {
                    destination: self.options.destination.clone(),
                },
            )
            .await
            .map_err(|source| SessionError::engine("add_or_seed", source))?;

        let mut events = handle.subscribe();
        let mut signal = self.shutdown.signal();

        let ready = self
            .pump_until_ready(&mut session, &mut events, &mut signal)
            .await?;
        if !ready {
            session.request_termination();
            return self.teardown(SessionOutcome::Terminated).await;
        }

        let mut playback: Option<PlaybackHandle> = None;
        if seed_mode {
            session.advance(SessionState::Ready);
            session.advance(SessionState::Active(ActiveMode::Seeding));
            if let Some(hash) = handle.info_hash() {
                info!(info_hash = %hash, "seeding");
            }
        } else {
            // Serving starts as part of entering Ready; selection may hold
            // a prompt open for a long time and clients can stream the
            // default meanwhile.
            let bound = handle
                .create_server(self.options.port)
                .await
                .map_err(|source| SessionError::engine("create_server", source))?;
            session.advance(SessionState::Ready);
            debug!(%bound, "serving endpoint up");

            let files = handle.files();
            let selection = select(
                &files,
                self.options.explicit_index,
                self.options.interactive_select,
                self.options.is_tty,
            )
            .await?;
            let index = match selection {
                Selection::Terminate => {
                    session.request_termination();
                    return self.teardown(SessionOutcome::Cancelled).await;
                }
                Selection::Index(index) => index,
            };
            // The engine prioritizes the largest file on its own; an
            // explicit select call is only needed to override that.
            if Some(index) != default_index(&files) {
                handle
                    .select_file(index)
                    .await
                    .map_err(|source| SessionError::engine("select_file", source))?;
            }
            session.selected_file = Some(index);

            let url = access_url(self.options.player, bound.port(), index);
            debug!(%url, "access url composed");
            session.access_url = Some(url.clone());

            if let Some(choice) = self.options.player {
                let launched = self
                    .dispatcher
                    .dispatch(choice, &url, self.options.subtitles.as_deref())
                    .await?;
                session.player = Some(launched.target);
                playback = Some(launched);
            }

            let mode = if handle.is_complete() {
                ActiveMode::Seeding
            } else {
                ActiveMode::Downloading
            };
            session.advance(SessionState::Active(mode));
        }

        if !self.options.quiet
            && !self.renderer.start(
                handle.clone(),
                DashboardConfig {
                    verbose: self.options.verbose,
                    player: session.player,
                    access_url: session.access_url.clone(),
                    destination: session.destination.clone(),
                },
                session.started(),
            )
        {
            debug!("telemetry renderer was already running");
        }

        let outcome = loop {
            tokio::select! {
                () = signal.triggered() => {
                    session.request_termination();
                    break SessionOutcome::Terminated;
                }
                () = async {
                    if let Some(launched) = playback.as_mut() {
                        launched.finished().await;
                    }
                }, if playback.is_some() => {
                    debug!("playback finished");
                    playback = None;
                    session.player = None;
                    if exit_ready(&session, handle.as_ref()) {
                        break SessionOutcome::Completed;
                    }
                }
                envelope = events.next() => {
                    let Some(envelope) = envelope else {
                        session.request_termination();
                        break SessionOutcome::Terminated;
                    };
                    match envelope.event {
                        Event::Done => {
                            session.advance(SessionState::Completed);
                            let finished = exit_ready(&session, handle.as_ref());
                            if !self.options.quiet {
                                if finished {
                                    // A final repaint would wipe the summary.
                                    self.renderer.stop();
                                }
                                self.status(&done_summary(
                                    &handle.swarm(),
                                    session.runtime_secs(),
                                ));
                                self.status_end();
                            }
                            debug!(runtime_secs = session.runtime_secs(), "transfer complete");
                            if finished {
                                break SessionOutcome::Completed;
                            }
                        }
                        Event::EngineError { message } => {
                            self.renderer.stop();
                            if let Err(err) = self.engine.shutdown().await {
                                debug!(error = %err, "engine release failed after fatal error");
                            }
                            return Err(SessionError::EngineReported { message });
                        }
                        Event::Hotswap { .. }
                        | Event::InfoHash { .. }
                        | Event::WireJoined { .. }
                        | Event::Metadata { .. }
                        | Event::Verifying { .. }
                        | Event::Ready => {}
                    }
                }
            }
        };

        self.teardown(outcome).await
    }

    /// Phase one: wait for readiness, echoing progress as single
    /// overwritten lines. Returns `false` when shutdown fired first.
    async fn pump_until_ready(
        &self,
        session: &mut Session,
        events: &mut EventStream,
        signal: &mut ShutdownSignal,
    ) -> SessionResult<bool> {
        let mut wires: usize = 0;
        let mut metadata_known = false;

        let ready = loop {
            tokio::select! {
                () = signal.triggered() => break false,
                envelope = events.next() => {
                    let Some(envelope) = envelope else {
                        return Err(SessionError::EngineReported {
                            message: "event stream closed before the torrent was ready".to_owned(),
                        });
                    };
                    match envelope.event {
                        Event::InfoHash { info_hash } => {
                            session.advance(SessionState::AwaitingMetadata);
                            debug!(%info_hash, "torrent registered");
                            self.status(&format!("fetching torrent metadata from {wires} peers"));
                        }
                        Event::WireJoined { total_wires } => {
                            wires = total_wires;
                            if !metadata_known {
                                self.status(&format!("fetching torrent metadata from {wires} peers"));
                            }
                        }
                        Event::Metadata { name } => {
                            metadata_known = true;
                            debug!(%name, "metadata fetched");
                            self.status(&format!("fetched metadata: {name}"));
                        }
                        Event::Verifying { percent_done, percent_verified } => {
                            session.advance(SessionState::Verifying);
                            self.status(&format!(
                                "verifying existing torrent data: {percent_done:.0}% ({percent_verified:.0}% verified)"
                            ));
                        }
                        Event::Ready => break true,
                        Event::EngineError { message } => {
                            self.status_end();
                            return Err(SessionError::EngineReported { message });
                        }
                        Event::Hotswap { .. } | Event::Done => {}
                    }
                }
            }
        };
        self.status_end();
        Ok(ready)
    }

    async fn teardown(&self, outcome: SessionOutcome) -> SessionResult<SessionOutcome> {
        self.renderer.stop();
        if outcome == SessionOutcome::Terminated {
            // Releasing the engine can take a while; tell the user before
            // it starts, not after.
            let _ = write_exit_notice(io::stderr());
        }
        self.engine
            .shutdown()
            .await
            .map_err(|source| SessionError::ShutdownTeardown { source })?;
        debug!(?outcome, "session torn down");
        Ok(outcome)
    }

    fn status(&self, text: &str) {
        if self.options.quiet {
            return;
        }
        let mut out = io::stdout();
        let painted = out
            .queue(MoveToColumn(0))
            .and_then(|out| out.queue(Clear(ClearType::CurrentLine)))
            .and_then(|out| {
                out.write_all(text.as_bytes())?;
                out.flush()
            });
        if let Err(err) = painted {
            debug!(error = %err, "status line write failed");
        }
    }

    fn status_end(&self) {
        if !self.options.quiet {
            let mut out = io::stdout();
            let _ = out.write_all(b"\n");
            let _ = out.flush();
        }
    }
}

/// The session can exit on its own once the transfer is complete, nothing
/// is playing, and no client is still streaming from the local endpoint.
fn exit_ready(session: &Session, handle: &dyn EngineHandle) -> bool {
    session.state() == SessionState::Completed
        && session.player.is_none()
        && handle.served_connections() == 0
}

/// One-line completion summary: wires that actually delivered data over
/// wires seen, plus the total runtime.
fn done_summary(swarm: &SwarmSnapshot, runtime_secs: u64) -> String {
    let active = swarm
        .wires
        .iter()
        .filter(|wire| wire.downloaded > 0)
        .count();
    let total = swarm.wires.len();
    let runtime = human_duration(runtime_secs);
    format!("torrent downloaded successfully from {active}/{total} peers in {runtime}")
}

fn write_exit_notice(mut out: impl Write) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "seedcast is gracefully exiting...")
}
