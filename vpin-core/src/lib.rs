//! Data model for the virtual-pinball highscore service.
//!
//! This crate defines the types shared between the tracking core and its
//! frontends without any I/O or runtime dependencies: games, highscores,
//! change events, and the error taxonomy.

pub mod error;
pub mod event;
pub mod game;
pub mod highscore;
pub mod source;

pub use error::HighscoreError;
pub use event::{ChangeEvent, ChangeKind, HighscoreChangedEvent};
pub use game::{Game, GameId};
pub use highscore::{Highscore, Score};
pub use source::HighscoreSource;
