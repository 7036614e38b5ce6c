use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::game::GameId;

/// One row of a score table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    /// 1-based rank, contiguous within a [`Highscore`].
    pub rank: u32,
    /// Player initials, 1–8 non-whitespace characters.
    pub initials: String,
    pub points: u64,
    /// When the score was achieved, for sources that record it.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Score {
    pub fn new(rank: u32, initials: impl Into<String>, points: u64) -> Self {
        Self { rank, initials: initials.into(), points, timestamp: None }
    }
}

/// The resolved highscore record of a single table.
///
/// Immutable once built; replaced wholesale on reload. Carries the decoder's
/// verbatim output in `raw` for display and debugging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Highscore {
    pub game_id: GameId,
    /// Non-empty, ranks renumbered 1..N.
    pub scores: Vec<Score>,
    /// Untouched decoder output.
    pub raw: String,
    /// File the scores were decoded from.
    pub source_path: PathBuf,
    pub loaded_at: DateTime<Utc>,
}

impl Highscore {
    /// Initials of the rank-1 entry.
    pub fn user_initials(&self) -> Option<&str> {
        self.scores.first().map(|s| s.initials.as_str())
    }

    /// Top score points, if any.
    pub fn top_points(&self) -> Option<u64> {
        self.scores.first().map(|s| s.points)
    }
}
