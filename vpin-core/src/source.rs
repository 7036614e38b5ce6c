use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where a table's highscores are persisted on disk.
///
/// Selection precedence is authoritative: when the NVRAM file exists it is
/// used even if the registry-backed store also carries an entry for the
/// table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HighscoreSource {
    /// Per-table MAME NVRAM file `<nvram folder>/<rom>.nv`.
    Nvram { path: PathBuf },
    /// Entry in the shared `VPReg.stg` store, keyed by display name and
    /// read through its pre-extracted per-table text file.
    RegBackedStore { game_display_name: String },
}

impl HighscoreSource {
    /// Short description for log lines.
    pub fn describe(&self) -> String {
        match self {
            HighscoreSource::Nvram { path } => format!("nvram:{}", path.display()),
            HighscoreSource::RegBackedStore { game_display_name } => {
                format!("vpreg:{game_display_name}")
            }
        }
    }
}
