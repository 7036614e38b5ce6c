//! Source selection and load orchestration.
//!
//! For each table the resolver decides which persistence source applies
//! and drives the decoder and parser. Precedence is authoritative: an
//! existing NVRAM file wins over a registry-backed store entry, and a
//! chosen source that decodes to nothing does not fall back to the other.

use std::sync::{Arc, Mutex};

use vpin_core::{Game, Highscore, HighscoreError, HighscoreSource};

use crate::command::CommandRunner;
use crate::decoder::Decoder;
use crate::parser;
use crate::paths::Paths;

#[derive(Debug, Clone, Copy, Default)]
struct SourcePresence {
    nvram_folder: bool,
    reg_store: bool,
}

pub struct HighscoreResolver {
    paths: Arc<dyn Paths>,
    decoder: Decoder,
    presence: Mutex<SourcePresence>,
}

impl HighscoreResolver {
    pub fn new(paths: Arc<dyn Paths>, runner: Arc<dyn CommandRunner>) -> Self {
        let resolver = Self {
            decoder: Decoder::new(paths.clone(), runner),
            paths,
            presence: Mutex::new(SourcePresence::default()),
        };
        resolver.refresh();
        resolver
    }

    pub fn with_decode_timeout(mut self, timeout: tokio::time::Duration) -> Self {
        self.decoder = self.decoder.with_timeout(timeout);
        self
    }

    /// Rescan source presence. Cheap: two metadata lookups, no contents.
    pub fn refresh(&self) {
        let presence = SourcePresence {
            nvram_folder: self.paths.nvram_folder().is_dir(),
            reg_store: self.paths.reg_backed_store_file().is_file(),
        };
        log::debug!(
            "Highscore sources refreshed: nvram folder {}, VPReg store {}",
            if presence.nvram_folder { "present" } else { "missing" },
            if presence.reg_store { "present" } else { "missing" },
        );
        *self.presence.lock().unwrap() = presence;
    }

    /// Which source applies to this game, if any.
    pub fn select_source(&self, game: &Game) -> Option<HighscoreSource> {
        if !game.is_trackable() {
            return None;
        }
        if game.nvram_file.is_file() {
            return Some(HighscoreSource::Nvram { path: game.nvram_file.clone() });
        }
        let reg_store = self.presence.lock().unwrap().reg_store;
        if reg_store && self.decoder.has_reg_entry(&game.display_name) {
            return Some(HighscoreSource::RegBackedStore {
                game_display_name: game.display_name.clone(),
            });
        }
        None
    }

    /// Load the current highscore for `game`, never returning a stale value.
    ///
    /// `Ok(None)` covers the definitive misses (no ROM, no source, decoder
    /// output without scores); transient decoder trouble surfaces as `Err`.
    pub async fn load_highscore(&self, game: &Game) -> Result<Option<Highscore>, HighscoreError> {
        if !game.is_trackable() {
            return Ok(None);
        }
        let Some(source) = self.select_source(game) else {
            log::debug!("No highscore source for {game}");
            return Ok(None);
        };

        let output = self.decoder.decode(&source).await?;
        match parser::parse(&output.raw, game.id, &output.source_path) {
            Some(highscore) => {
                log::debug!(
                    "Loaded {} scores for {game} from {}",
                    highscore.scores.len(),
                    source.describe()
                );
                Ok(Some(highscore))
            }
            None => {
                // No fallback to the other source here: precedence decided.
                log::debug!("No scores in decoder output for {game} ({})", source.describe());
                Ok(None)
            }
        }
    }
}
