use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable per-process identifier of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GameId(pub u32);

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A playable table known to the catalog.
///
/// The tracking core consumes games but never mutates them. A game with an
/// empty `rom` has no machine-readable highscore storage and is skipped by
/// the core without consulting any source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    /// Short ASCII ROM token (e.g. "hpgof"). May be empty.
    pub rom: String,
    pub display_name: String,
    pub vpx_file: PathBuf,
    /// `<nvram folder>/<rom>.nv`, derived at catalog build time.
    pub nvram_file: PathBuf,
    pub rom_file: Option<PathBuf>,
    pub last_played: Option<DateTime<Utc>>,
    pub number_plays: u32,
}

impl Game {
    /// Whether the core can track highscores for this table at all.
    pub fn is_trackable(&self) -> bool {
        !self.rom.is_empty()
    }

    /// Last-played time, defaulting to now when the table was never launched.
    pub fn last_played_or_now(&self) -> DateTime<Utc> {
        self.last_played.unwrap_or_else(Utc::now)
    }
}

impl fmt::Display for Game {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.display_name, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(rom: &str) -> Game {
        Game {
            id: GameId(1),
            rom: rom.to_string(),
            display_name: "Test Table".to_string(),
            vpx_file: PathBuf::from("tables/test.vpx"),
            nvram_file: PathBuf::from("nvram/test.nv"),
            rom_file: None,
            last_played: None,
            number_plays: 0,
        }
    }

    #[test]
    fn empty_rom_is_not_trackable() {
        assert!(!game("").is_trackable());
        assert!(game("hpgof").is_trackable());
    }
}
