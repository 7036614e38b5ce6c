use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::game::GameId;
use crate::highscore::Highscore;

/// What happened to a watched file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
}

/// A debounced filesystem change on one of the watched highscore files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
    pub at: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn modified(path: PathBuf) -> Self {
        Self { path, kind: ChangeKind::Modified, at: Utc::now() }
    }
}

/// Delivered to subscribers after a reload triggered by a file change.
///
/// Either side may be `None`: a highscore appearing for the first time has
/// no `previous`, a deleted source yields no `current`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighscoreChangedEvent {
    pub game_id: GameId,
    pub previous: Option<Highscore>,
    pub current: Option<Highscore>,
}
