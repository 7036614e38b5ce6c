//! Highscore tracking core for a virtual-pinball cabinet.
//!
//! Resolves where each table persists its highscores (per-table NVRAM file
//! or the shared `VPReg.stg` store), decodes them through the external
//! PINemHi decoder, caches the results per table, watches the persistence
//! files for changes and fans change notifications out to subscribers.
//!
//! The entry point is [`HighscoreManager`], constructed from a [`Services`]
//! context so tests can inject fake paths, command runners and catalogs.

use std::sync::Arc;

pub mod cache;
pub mod catalog;
pub mod command;
pub mod decoder;
pub mod dispatcher;
pub mod manager;
pub mod parser;
pub mod paths;
pub mod resolver;
pub mod watcher;
pub mod worker_pool;

pub use cache::HighscoreCache;
pub use catalog::{GameCatalog, InMemoryCatalog, scan_tables};
pub use command::{CommandOutput, CommandRunner, ProcessRunner};
pub use decoder::Decoder;
pub use dispatcher::{ChangeDispatcher, HighscoreChangeListener, ListenerId};
pub use manager::HighscoreManager;
pub use paths::{InstallPaths, Paths};
pub use resolver::HighscoreResolver;
pub use watcher::{HighscoreFilesWatcher, WatchState, WatcherError};

/// Shared service context handed to constructors.
///
/// Replaces process-wide singletons: production wires the real
/// implementations once at startup, tests inject fakes.
#[derive(Clone)]
pub struct Services {
    pub paths: Arc<dyn Paths>,
    pub runner: Arc<dyn CommandRunner>,
    pub catalog: Arc<dyn GameCatalog>,
}
