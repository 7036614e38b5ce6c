//! Maps file changes to affected tables and fans out notifications.
//!
//! One long-lived task consumes watcher events. Per event it refreshes
//! source presence, finds the affected games, and serializes
//! invalidate → reload → notify for each of them; a `VPReg.stg` change
//! touches every cached table and is reloaded through a bounded worker
//! pool instead of all at once. Subscribers sit behind their own bounded
//! queue and worker task, so a slow subscriber lags (dropping its oldest
//! events with a warning) without ever blocking event consumption.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;

use vpin_core::{ChangeEvent, Game, HighscoreChangedEvent};

use crate::cache::HighscoreCache;
use crate::catalog::GameCatalog;
use crate::resolver::HighscoreResolver;
use crate::worker_pool::WorkerPool;

/// Concurrent reloads after a shared-store change.
pub const DEFAULT_RELOAD_PARALLELISM: usize = 2;

/// Bounded queue length per subscriber.
const SUBSCRIBER_QUEUE: usize = 16;

const VPREG_STG: &str = "VPReg.stg";

/// Receives highscore change notifications.
///
/// Callbacks run on a dedicated worker task per listener, never on the
/// watcher thread.
pub trait HighscoreChangeListener: Send + Sync {
    fn highscore_changed(&self, event: &HighscoreChangedEvent);

    /// Terminal notification during orderly shutdown.
    fn shutting_down(&self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

#[derive(Clone)]
enum Notification {
    Changed(HighscoreChangedEvent),
    ShuttingDown,
}

struct SubscriberEntry {
    id: ListenerId,
    tx: broadcast::Sender<Notification>,
}

struct DispatchInner {
    cache: Arc<HighscoreCache>,
    resolver: Arc<HighscoreResolver>,
    catalog: Arc<dyn GameCatalog>,
    subscribers: Mutex<Vec<SubscriberEntry>>,
    reload_parallelism: usize,
}

/// Drives reloads and subscriber fan-out for watcher events.
pub struct ChangeDispatcher {
    inner: Arc<DispatchInner>,
    next_listener_id: AtomicU64,
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ChangeDispatcher {
    /// Spawn the dispatch task over `events`.
    pub fn spawn(
        cache: Arc<HighscoreCache>,
        resolver: Arc<HighscoreResolver>,
        catalog: Arc<dyn GameCatalog>,
        events: UnboundedReceiver<ChangeEvent>,
        reload_parallelism: usize,
    ) -> Self {
        let inner = Arc::new(DispatchInner {
            cache,
            resolver,
            catalog,
            subscribers: Mutex::new(Vec::new()),
            reload_parallelism: reload_parallelism.max(1),
        });
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run(inner.clone(), events, shutdown_rx));
        Self {
            inner,
            next_listener_id: AtomicU64::new(1),
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            task: Mutex::new(Some(task)),
        }
    }

    /// Register a listener; it gets its own queue and worker task.
    pub fn add_listener(&self, listener: Arc<dyn HighscoreChangeListener>) -> ListenerId {
        let id = ListenerId(self.next_listener_id.fetch_add(1, Ordering::Relaxed));
        let (tx, mut rx) = broadcast::channel::<Notification>(SUBSCRIBER_QUEUE);
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(Notification::Changed(event)) => listener.highscore_changed(&event),
                    Ok(Notification::ShuttingDown) => {
                        listener.shutting_down();
                        break;
                    }
                    Err(broadcast::error::RecvError::Lagged(count)) => {
                        log::warn!("Slow highscore subscriber dropped {count} queued events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        self.inner.subscribers.lock().unwrap().push(SubscriberEntry { id, tx });
        id
    }

    /// Deregister; honored no later than the next event. The listener's
    /// worker drains what is already queued, then exits.
    pub fn remove_listener(&self, id: ListenerId) {
        self.inner.subscribers.lock().unwrap().retain(|entry| entry.id != id);
    }

    /// Drain queued events, deliver the terminal notification, and stop.
    pub async fn shutdown(&self) {
        if let Some(tx) = self.shutdown_tx.lock().unwrap().take() {
            let _ = tx.send(());
        }
        let task = self.task.lock().unwrap().take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}

async fn run(
    inner: Arc<DispatchInner>,
    mut events: UnboundedReceiver<ChangeEvent>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            maybe = events.recv() => match maybe {
                Some(event) => inner.handle_event(event).await,
                None => break,
            },
            _ = &mut shutdown_rx => {
                while let Ok(event) = events.try_recv() {
                    inner.handle_event(event).await;
                }
                break;
            }
        }
    }
    inner.publish(Notification::ShuttingDown);
}

impl DispatchInner {
    async fn handle_event(self: &Arc<Self>, event: ChangeEvent) {
        self.resolver.refresh();

        let affected = affected_games(&*self.catalog, &self.cache, &event.path);
        if affected.is_empty() {
            log::debug!("No games affected by change of {}", event.path.display());
            return;
        }
        log::info!(
            "{} affects {} game(s)",
            event.path.display(),
            affected.len()
        );

        if let [game] = affected.as_slice() {
            self.reload_and_notify(game.clone()).await;
            return;
        }

        let inner = self.clone();
        WorkerPool::start(self.reload_parallelism, affected, move |game| {
            let inner = inner.clone();
            async move { inner.reload_and_notify(game).await }
        })
        .join()
        .await;
    }

    /// The serialized per-game sequence: invalidate, reload, notify.
    async fn reload_and_notify(&self, game: Game) {
        let previous = self.cache.peek(game.id).flatten();
        self.cache.invalidate(game.id);
        let current = match self
            .cache
            .get_or_load(game.id, || self.resolver.load_highscore(&game))
            .await
        {
            Ok(current) => current,
            Err(err) => {
                log::warn!("Highscore reload of {game} failed: {err}");
                None
            }
        };
        self.publish(Notification::Changed(HighscoreChangedEvent {
            game_id: game.id,
            previous,
            current,
        }));
    }

    fn publish(&self, notification: Notification) {
        // Copy-on-write snapshot: senders cloned under the lock, delivery
        // outside of it.
        let senders: Vec<broadcast::Sender<Notification>> = {
            let subscribers = self.subscribers.lock().unwrap();
            subscribers.iter().map(|entry| entry.tx.clone()).collect()
        };
        for tx in senders {
            // A send error just means the worker already exited.
            let _ = tx.send(notification.clone());
        }
    }
}

/// Which games does a change of `path` concern?
///
/// `*.nv` maps to the single game whose ROM matches the filename stem.
/// The shared store maps to every table currently resident in the cache;
/// tables nobody asked about yet are resolved lazily on their next read
/// instead of being decoded wholesale.
fn affected_games(catalog: &dyn GameCatalog, cache: &HighscoreCache, path: &Path) -> Vec<Game> {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    if name.eq_ignore_ascii_case(VPREG_STG) {
        let cached = cache.cached_ids();
        return catalog.games().into_iter().filter(|g| cached.contains(&g.id)).collect();
    }
    path.file_stem()
        .and_then(|s| s.to_str())
        .and_then(|stem| catalog.find_by_rom_stem(stem))
        .into_iter()
        .collect()
}
