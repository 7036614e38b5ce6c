//! Facade over the tracking pipeline.
//!
//! Owns the cache, resolver, watcher and dispatcher, and exposes the
//! read path (`get_highscore`), the subscription registry and the
//! lifecycle. Construct it inside a multi-threaded tokio runtime; the
//! dispatcher task starts immediately, the file watcher only on
//! [`start`](HighscoreManager::start).

use std::sync::Arc;

use tokio::sync::mpsc;

use vpin_core::{Game, GameId, Highscore, HighscoreError};

use crate::Services;
use crate::cache::HighscoreCache;
use crate::dispatcher::{
    ChangeDispatcher, DEFAULT_RELOAD_PARALLELISM, HighscoreChangeListener, ListenerId,
};
use crate::resolver::HighscoreResolver;
use crate::watcher::{HighscoreFilesWatcher, WatchState, WatcherError};

pub struct HighscoreManager {
    cache: Arc<HighscoreCache>,
    resolver: Arc<HighscoreResolver>,
    watcher: HighscoreFilesWatcher,
    dispatcher: ChangeDispatcher,
}

impl HighscoreManager {
    pub fn new(services: Services) -> Self {
        Self::with_reload_parallelism(services, DEFAULT_RELOAD_PARALLELISM)
    }

    pub fn with_reload_parallelism(services: Services, reload_parallelism: usize) -> Self {
        let cache = Arc::new(HighscoreCache::new());
        let resolver = Arc::new(HighscoreResolver::new(
            services.paths.clone(),
            services.runner.clone(),
        ));

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let mut watch_dirs = vec![services.paths.nvram_folder()];
        if let Some(store_dir) = services.paths.reg_backed_store_file().parent() {
            watch_dirs.push(store_dir.to_path_buf());
        }
        let watcher = HighscoreFilesWatcher::new(watch_dirs, events_tx);
        let dispatcher = ChangeDispatcher::spawn(
            cache.clone(),
            resolver.clone(),
            services.catalog.clone(),
            events_rx,
            reload_parallelism,
        );

        Self { cache, resolver, watcher, dispatcher }
    }

    /// Begin observing the highscore files.
    pub fn start(&self) -> Result<(), WatcherError> {
        self.watcher.start()
    }

    pub fn watch_state(&self) -> WatchState {
        self.watcher.state()
    }

    /// Current highscore of `game`, cached after the first read.
    ///
    /// Tables without a ROM token resolve to `None` without touching the
    /// cache or the decoder. Transient decoder trouble also yields `None`,
    /// but leaves no cache entry behind so the next call retries.
    pub async fn get_highscore(&self, game: &Game) -> Option<Highscore> {
        if !game.is_trackable() {
            return None;
        }
        match self
            .cache
            .get_or_load(game.id, || self.resolver.load_highscore(game))
            .await
        {
            Ok(highscore) => highscore,
            // Already warned once at the decoder; stay quiet per lookup.
            Err(HighscoreError::DecoderUnavailable(_)) => None,
            Err(err) => {
                log::warn!("Highscore lookup of {game} failed: {err}");
                None
            }
        }
    }

    /// Drop the cached entry for `game` after re-checking source presence.
    pub fn invalidate(&self, game: &Game) {
        self.resolver.refresh();
        self.cache.invalidate(game.id);
    }

    pub fn invalidate_all(&self) {
        self.resolver.refresh();
        self.cache.invalidate_all();
    }

    pub fn add_listener(&self, listener: Arc<dyn HighscoreChangeListener>) -> ListenerId {
        self.dispatcher.add_listener(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) {
        self.dispatcher.remove_listener(id)
    }

    /// Cached entry without loading, for observability.
    pub fn peek_cached(&self, id: GameId) -> Option<Option<Highscore>> {
        self.cache.peek(id)
    }

    pub fn cache(&self) -> &HighscoreCache {
        &self.cache
    }

    /// Orderly shutdown: stop the watcher, drain pending dispatches and
    /// deliver the terminal notification to subscribers.
    pub async fn shutdown(&self) {
        // Stopping joins the bridge thread, which can take up to one
        // debounce window; keep that wait off the async worker threads.
        // NotRunning just means the watcher was never started.
        let _ = tokio::task::block_in_place(|| self.watcher.set_running(false));
        self.dispatcher.shutdown().await;
    }
}
