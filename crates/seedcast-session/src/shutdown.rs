//! Coordinated session shutdown.
//!
//! One coordinator owns the terminate decision for a session. The first
//! trigger wins, whether it came from a signal, the selector, or playback
//! finishing; later triggers are absorbed so teardown never runs twice.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info};

/// Shared terminate switch for one session. Cheap to clone.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    fired: Arc<AtomicBool>,
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownCoordinator {
    /// Coordinator in the untriggered state.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            fired: Arc::new(AtomicBool::new(false)),
            tx: Arc::new(tx),
        }
    }

    /// Request termination. Returns `true` only for the first caller.
    #[must_use = "the return tells whether this call won the trigger race"]
    pub fn trigger(&self, reason: &str) -> bool {
        if self.fired.swap(true, Ordering::SeqCst) {
            debug!(reason, "shutdown already in progress");
            return false;
        }
        info!(reason, "shutting down gracefully");
        let _ = self.tx.send(true);
        true
    }

    /// Whether shutdown has already been requested.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// A waitable view of the shutdown state.
    #[must_use]
    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// Route SIGINT and SIGTERM into the coordinator. Repeated signals
    /// after the first are absorbed by [`trigger`](Self::trigger).
    ///
    /// # Errors
    ///
    /// Fails when the process signal listeners cannot be registered.
    #[cfg(unix)]
    pub fn install_signal_handlers(&self) -> std::io::Result<()> {
        use tokio::signal::unix::{signal, SignalKind};

        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut terminate = signal(SignalKind::terminate())?;
        let coordinator = self.clone();
        tokio::spawn(async move {
            loop {
                let reason = tokio::select! {
                    _ = interrupt.recv() => "SIGINT",
                    _ = terminate.recv() => "SIGTERM",
                };
                let _ = coordinator.trigger(reason);
            }
        });
        Ok(())
    }

    /// Route ctrl-c into the coordinator.
    ///
    /// # Errors
    ///
    /// Fails when the ctrl-c listener cannot be registered.
    #[cfg(not(unix))]
    pub fn install_signal_handlers(&self) -> std::io::Result<()> {
        let coordinator = self.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = coordinator.trigger("ctrl-c");
            }
        });
        Ok(())
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Waitable view handed to tasks that should stop on shutdown.
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Resolve once shutdown has been triggered. Cancel-safe; resolves
    /// immediately when triggered before the wait began.
    pub async fn triggered(&mut self) {
        // wait_for only errs when the sender is dropped, which cannot
        // outlive the coordinator holding it.
        let _ = self.rx.wait_for(|fired| *fired).await;
    }
}
