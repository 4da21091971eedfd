//! End-to-end session flows against a scripted engine.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use seedcast_engine::{
    AddOptions, Engine, EngineHandle, EngineResult, FileDescriptor, Locator, PieceSnapshot,
    SwarmSnapshot,
};
use seedcast_events::{Event, EventBus, EventStream};
use seedcast_session::playback::DiscoveredDevice;
use seedcast_session::{
    DeviceBrowser, PlayerChoice, SessionController, SessionError, SessionOptions, SessionOutcome,
};

const MAGNET: &str = "magnet:?xt=urn:btih:aaaabbbbccccddddeeeeffff0000111122223333";

struct StubHandle {
    bus: EventBus,
    files: Vec<FileDescriptor>,
    complete: AtomicBool,
    selected: Mutex<Option<usize>>,
    calls: Mutex<Vec<&'static str>>,
}

impl StubHandle {
    fn new(files: Vec<FileDescriptor>) -> Self {
        Self {
            bus: EventBus::new(),
            files,
            complete: AtomicBool::new(false),
            selected: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn single_file() -> Self {
        Self::new(vec![FileDescriptor {
            index: 0,
            name: "movie.mkv".to_owned(),
            length: 700_000_000,
        }])
    }
}

#[async_trait]
impl EngineHandle for StubHandle {
    fn subscribe(&self) -> EventStream {
        self.bus.subscribe(None)
    }

    fn name(&self) -> Option<String> {
        Some("movie.mkv".to_owned())
    }

    fn info_hash(&self) -> Option<String> {
        Some("aaaabbbbccccddddeeeeffff0000111122223333".to_owned())
    }

    fn total_length(&self) -> u64 {
        self.files.iter().map(|file| file.length).sum()
    }

    fn piece_count(&self) -> u64 {
        64
    }

    fn files(&self) -> Vec<FileDescriptor> {
        self.files.clone()
    }

    fn swarm(&self) -> SwarmSnapshot {
        SwarmSnapshot::default()
    }

    fn pieces(&self) -> Vec<PieceSnapshot> {
        Vec::new()
    }

    fn is_complete(&self) -> bool {
        self.complete.load(Ordering::SeqCst)
    }

    fn served_connections(&self) -> u64 {
        0
    }

    async fn select_file(&self, index: usize) -> EngineResult<()> {
        self.calls.lock().expect("calls lock").push("select_file");
        *self.selected.lock().expect("selected lock") = Some(index);
        Ok(())
    }

    async fn create_server(&self, port: u16) -> EngineResult<SocketAddr> {
        self.calls.lock().expect("calls lock").push("create_server");
        Ok(SocketAddr::from(([127, 0, 0, 1], port)))
    }
}

struct StubEngine {
    handle: Arc<StubHandle>,
    shutdowns: AtomicU64,
}

impl StubEngine {
    fn new(handle: Arc<StubHandle>) -> Arc<Self> {
        Arc::new(Self {
            handle,
            shutdowns: AtomicU64::new(0),
        })
    }
}

#[async_trait]
impl Engine for StubEngine {
    async fn add_or_seed(
        &self,
        _locator: Locator,
        _options: AddOptions,
    ) -> EngineResult<Arc<dyn EngineHandle>> {
        Ok(self.handle.clone())
    }

    async fn shutdown(&self) -> EngineResult<()> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct StubBrowser {
    played: Mutex<Vec<String>>,
}

#[async_trait]
impl DeviceBrowser for StubBrowser {
    async fn discover_first(
        &self,
        _search_target: &str,
        _window: Duration,
    ) -> std::io::Result<Option<DiscoveredDevice>> {
        Ok(Some(DiscoveredDevice {
            address: SocketAddr::from(([192, 168, 1, 40], 8009)),
            location: None,
        }))
    }

    async fn play(&self, _device: &DiscoveredDevice, url: &str) -> std::io::Result<()> {
        self.played.lock().expect("played lock").push(url.to_owned());
        Ok(())
    }
}

fn quiet_options() -> SessionOptions {
    SessionOptions {
        quiet: true,
        ..SessionOptions::default()
    }
}

#[tokio::test]
async fn completed_download_runs_to_a_clean_exit() -> anyhow::Result<()> {
    let handle = Arc::new(StubHandle::single_file());
    handle.bus.publish(Event::InfoHash {
        info_hash: "aaaabbbbccccddddeeeeffff0000111122223333".to_owned(),
    });
    handle.bus.publish(Event::WireJoined { total_wires: 3 });
    handle.bus.publish(Event::Metadata {
        name: "movie.mkv".to_owned(),
    });
    handle.bus.publish(Event::Ready);
    handle.complete.store(true, Ordering::SeqCst);
    handle.bus.publish(Event::Done);

    let engine = StubEngine::new(handle.clone());
    let controller = SessionController::new(engine.clone(), quiet_options());
    let outcome = controller.run(MAGNET).await?;

    assert_eq!(outcome, SessionOutcome::Completed);
    // The engine already prioritizes the default file, so picking it must
    // not produce a redundant select call.
    assert_eq!(*handle.selected.lock().expect("selected lock"), None);
    assert_eq!(handle.calls(), vec!["create_server"]);
    assert_eq!(engine.shutdowns.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn explicit_index_overrides_the_largest_file_default() -> anyhow::Result<()> {
    let handle = Arc::new(StubHandle::new(vec![
        FileDescriptor {
            index: 0,
            name: "sample.mkv".to_owned(),
            length: 900_000_000,
        },
        FileDescriptor {
            index: 1,
            name: "episode-1.mkv".to_owned(),
            length: 400_000_000,
        },
        FileDescriptor {
            index: 2,
            name: "episode-2.mkv".to_owned(),
            length: 400_000_001,
        },
    ]));
    handle.bus.publish(Event::Ready);
    handle.complete.store(true, Ordering::SeqCst);
    handle.bus.publish(Event::Done);

    let engine = StubEngine::new(handle.clone());
    let options = SessionOptions {
        explicit_index: Some(1),
        ..quiet_options()
    };
    let outcome = SessionController::new(engine, options).run(MAGNET).await?;

    assert_eq!(outcome, SessionOutcome::Completed);
    assert_eq!(*handle.selected.lock().expect("selected lock"), Some(1));
    // Serving is part of readiness and must precede any select call.
    assert_eq!(handle.calls(), vec!["create_server", "select_file"]);
    Ok(())
}

#[tokio::test]
async fn shutdown_before_ready_terminates_gracefully() -> anyhow::Result<()> {
    let handle = Arc::new(StubHandle::single_file());
    handle.bus.publish(Event::InfoHash {
        info_hash: "aaaabbbbccccddddeeeeffff0000111122223333".to_owned(),
    });

    let engine = StubEngine::new(handle);
    let controller = SessionController::new(engine.clone(), quiet_options());
    let coordinator = controller.shutdown_coordinator();

    let run = tokio::spawn(controller.run(MAGNET));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(coordinator.trigger("test interrupt"));

    let outcome = tokio::time::timeout(Duration::from_secs(2), run).await???;
    assert_eq!(outcome, SessionOutcome::Terminated);
    assert_eq!(engine.shutdowns.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn interactive_selection_without_a_terminal_lists_and_cancels() -> anyhow::Result<()> {
    let handle = Arc::new(StubHandle::new(vec![
        FileDescriptor {
            index: 0,
            name: "a.mkv".to_owned(),
            length: 10,
        },
        FileDescriptor {
            index: 1,
            name: "b.mkv".to_owned(),
            length: 20,
        },
    ]));
    handle.bus.publish(Event::Ready);

    let engine = StubEngine::new(handle.clone());
    let options = SessionOptions {
        interactive_select: true,
        is_tty: false,
        ..quiet_options()
    };
    let outcome = SessionController::new(engine.clone(), options)
        .run(MAGNET)
        .await?;

    assert_eq!(outcome, SessionOutcome::Cancelled);
    assert_eq!(*handle.selected.lock().expect("selected lock"), None);
    // The endpoint comes up on readiness even when selection then cancels.
    assert_eq!(handle.calls(), vec!["create_server"]);
    assert_eq!(engine.shutdowns.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn fatal_engine_event_surfaces_as_an_error() {
    let handle = Arc::new(StubHandle::single_file());
    handle.bus.publish(Event::InfoHash {
        info_hash: "aaaabbbbccccddddeeeeffff0000111122223333".to_owned(),
    });
    handle.bus.publish(Event::EngineError {
        message: "tracker rejected announce".to_owned(),
    });

    let engine = StubEngine::new(handle);
    let result = SessionController::new(engine, quiet_options())
        .run(MAGNET)
        .await;

    match result {
        Err(SessionError::EngineReported { message }) => {
            assert_eq!(message, "tracker rejected announce");
        }
        other => panic!("expected engine error, got {other:?}"),
    }
}

#[tokio::test]
async fn cast_playback_receives_a_lan_url_and_session_completes() -> anyhow::Result<()> {
    let handle = Arc::new(StubHandle::single_file());
    handle.bus.publish(Event::Ready);
    handle.complete.store(true, Ordering::SeqCst);
    handle.bus.publish(Event::Done);

    let engine = StubEngine::new(handle);
    let browser = Arc::new(StubBrowser {
        played: Mutex::new(Vec::new()),
    });
    let options = SessionOptions {
        player: Some(PlayerChoice::Chromecast),
        ..quiet_options()
    };
    let outcome = SessionController::new(engine, options)
        .with_browser(browser.clone())
        .run(MAGNET)
        .await?;

    assert_eq!(outcome, SessionOutcome::Completed);
    let played = browser.played.lock().expect("played lock").clone();
    assert_eq!(played.len(), 1);
    assert!(played[0].ends_with("/0"), "{}", played[0]);
    assert!(!played[0].contains("localhost"), "{}", played[0]);
    Ok(())
}
