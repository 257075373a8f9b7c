//! Periodic status ticker for long walks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use ambit_core::stats::{StatsSink, WalkProgress};

const TICK_PERIOD: Duration = Duration::from_secs(2);

/// A worker thread that reports walk progress every two seconds until the
/// walk signals completion through the close channel.
pub(crate) struct Ticker {
    stop_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl Ticker {
    pub(crate) fn start(
        stats: Option<Arc<dyn StatsSink>>,
        inodes: Arc<AtomicU64>,
        current_path: Arc<Mutex<String>>,
    ) -> Self {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let handle = std::thread::spawn(move || {
            let mut last = inodes.load(Ordering::Relaxed);
            loop {
                match stop_rx.recv_timeout(TICK_PERIOD) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => {}
                }
                let visited = inodes.load(Ordering::Relaxed);
                let path = current_path
                    .lock()
                    .map(|p| p.clone())
                    .unwrap_or_default();
                let progress = WalkProgress {
                    inodes_visited: visited,
                    delta: visited.saturating_sub(last),
                    current_path: path,
                };
                last = visited;
                match &stats {
                    Some(sink) => sink.progress(&progress),
                    None => tracing::info!(
                        "Scan progress: {} inodes visited (+{}), at {}",
                        progress.inodes_visited,
                        progress.delta,
                        progress.current_path
                    ),
                }
            }
        });
        Self { stop_tx, handle }
    }

    /// Signal the worker and wait for it to exit.
    pub(crate) fn stop(self) {
        let _ = self.stop_tx.send(());
        let _ = self.handle.join();
    }
}
