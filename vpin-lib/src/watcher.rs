//! Watches the highscore persistence files for changes.
//!
//! Observes the NVRAM directory and the directory holding `VPReg.stg`
//! (non-recursively) and forwards debounced change events for `*.nv`
//! files and the store file itself. The games rewrite these files in
//! bursts during gameplay transitions, so events for the same path within
//! the debounce window collapse into one `modified` event.
//!
//! Lifecycle: `Idle → Running → Stopping → Stopped`. Starting twice is a
//! no-op; any operation after `Stopped` fails with
//! [`WatcherError::NotRunning`]. The bridge thread polls its channel with
//! the debounce window as timeout, so a stop request is honored within
//! one window plus one I/O quantum.

use std::path::{Path, PathBuf};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use notify::RecursiveMode;
use notify_debouncer_mini::{DebouncedEvent, DebouncedEventKind, new_debouncer};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

use vpin_core::ChangeEvent;

/// Events for the same path within this window collapse into one.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(250);

const VPREG_STG: &str = "VPReg.stg";

#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("watcher is not running")]
    NotRunning,

    #[error("watch setup failed: {0}")]
    Notify(#[from] notify::Error),

    #[error("failed to spawn watcher thread: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

/// Observer of the NVRAM folder and the registry-backed store.
pub struct HighscoreFilesWatcher {
    dirs: Vec<PathBuf>,
    sink: UnboundedSender<ChangeEvent>,
    state: Arc<Mutex<WatchState>>,
    thread: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl HighscoreFilesWatcher {
    /// `dirs` are watched non-recursively once [`start`](Self::start) is
    /// called; filtered events are forwarded into `sink`.
    pub fn new(dirs: Vec<PathBuf>, sink: UnboundedSender<ChangeEvent>) -> Self {
        Self {
            dirs,
            sink,
            state: Arc::new(Mutex::new(WatchState::Idle)),
            thread: Mutex::new(None),
        }
    }

    pub fn state(&self) -> WatchState {
        *self.state.lock().unwrap()
    }

    /// Spawn the observer. No-op when already running; fails once stopped.
    pub fn start(&self) -> Result<(), WatcherError> {
        let mut state = self.state.lock().unwrap();
        match *state {
            WatchState::Running => return Ok(()),
            WatchState::Stopping | WatchState::Stopped => return Err(WatcherError::NotRunning),
            WatchState::Idle => {}
        }

        let (tx, rx) = std::sync::mpsc::channel();
        let mut debouncer = new_debouncer(DEBOUNCE_WINDOW, tx)?;
        for dir in &self.dirs {
            if dir.is_dir() {
                debouncer.watcher().watch(dir, RecursiveMode::NonRecursive)?;
                log::debug!("Watching {} for highscore changes", dir.display());
            } else {
                log::warn!("Not watching missing directory {}", dir.display());
            }
        }

        let shared_state = Arc::clone(&self.state);
        let sink = self.sink.clone();
        let handle = std::thread::Builder::new()
            .name("highscore-watcher".to_string())
            .spawn(move || {
                // The debouncer lives on this thread; dropping it on exit
                // tears down the underlying OS watches.
                let _debouncer = debouncer;
                loop {
                    match rx.recv_timeout(DEBOUNCE_WINDOW) {
                        Ok(Ok(events)) => forward(&sink, events),
                        // Watch errors do not stop the watcher.
                        Ok(Err(error)) => log::warn!("File watch error: {error}"),
                        Err(RecvTimeoutError::Timeout) => {}
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                    if *shared_state.lock().unwrap() == WatchState::Stopping {
                        // Drain whatever the debouncer already emitted.
                        while let Ok(Ok(events)) = rx.try_recv() {
                            forward(&sink, events);
                        }
                        break;
                    }
                }
                *shared_state.lock().unwrap() = WatchState::Stopped;
            })?;

        *self.thread.lock().unwrap() = Some(handle);
        *state = WatchState::Running;
        Ok(())
    }

    /// `set_running(true)` is [`start`](Self::start); `set_running(false)`
    /// requests an orderly stop and waits for the observer to drain.
    pub fn set_running(&self, running: bool) -> Result<(), WatcherError> {
        if running {
            return self.start();
        }
        {
            let mut state = self.state.lock().unwrap();
            match *state {
                WatchState::Running => *state = WatchState::Stopping,
                WatchState::Stopping => {}
                WatchState::Idle | WatchState::Stopped => return Err(WatcherError::NotRunning),
            }
        }
        if let Some(handle) = self.thread.lock().unwrap().take() {
            let _ = handle.join();
        }
        Ok(())
    }

    pub fn stop(&self) -> Result<(), WatcherError> {
        self.set_running(false)
    }
}

fn forward(sink: &UnboundedSender<ChangeEvent>, events: Vec<DebouncedEvent>) {
    for event in events {
        // AnyContinuous marks an ongoing burst; the final Any follows.
        if !matches!(event.kind, DebouncedEventKind::Any) {
            continue;
        }
        if !is_watched_file(&event.path) {
            continue;
        }
        log::debug!("Highscore file changed: {}", event.path.display());
        if sink.send(ChangeEvent::modified(event.path)).is_err() {
            return;
        }
    }
}

/// Only `*.nv` files and the shared `VPReg.stg` store are of interest.
pub(crate) fn is_watched_file(path: &Path) -> bool {
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        if name.eq_ignore_ascii_case(VPREG_STG) {
            return true;
        }
    }
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("nv"))
        .unwrap_or(false)
}
