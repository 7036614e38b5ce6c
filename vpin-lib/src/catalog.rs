//! Table enumeration.
//!
//! The catalog is a consumed collaborator: in a full cabinet setup it is
//! fed from the frontend's database. [`scan_tables`] offers a filesystem
//! bootstrap that lists `*.vpx` files and derives NVRAM paths, which is
//! enough for the CLI and for tests.

use std::io;
use std::path::Path;

use vpin_core::{Game, GameId};

/// Lookup interface over the known tables.
pub trait GameCatalog: Send + Sync {
    fn games(&self) -> Vec<Game>;

    /// Game whose `rom` equals the given filename stem, case-insensitive.
    fn find_by_rom_stem(&self, stem: &str) -> Option<Game>;

    fn find_by_display_name(&self, name: &str) -> Option<Game>;
}

/// Catalog over a fixed list of games.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    games: Vec<Game>,
}

impl InMemoryCatalog {
    pub fn new(games: Vec<Game>) -> Self {
        Self { games }
    }
}

impl GameCatalog for InMemoryCatalog {
    fn games(&self) -> Vec<Game> {
        self.games.clone()
    }

    fn find_by_rom_stem(&self, stem: &str) -> Option<Game> {
        self.games
            .iter()
            .find(|g| !g.rom.is_empty() && g.rom.eq_ignore_ascii_case(stem))
            .cloned()
    }

    fn find_by_display_name(&self, name: &str) -> Option<Game> {
        self.games.iter().find(|g| g.display_name == name).cloned()
    }
}

/// Build a catalog by scanning the tables folder for `*.vpx` files.
///
/// The ROM token is derived from the table filename (lowercased stem); a
/// frontend-database-backed catalog supplies the real mapping where one is
/// available. Entries are sorted and ids assigned in that order.
pub fn scan_tables(tables_folder: &Path, nvram_folder: &Path) -> io::Result<InMemoryCatalog> {
    let mut table_files: Vec<_> = std::fs::read_dir(tables_folder)?
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .map(|e| e.eq_ignore_ascii_case("vpx"))
                    .unwrap_or(false)
        })
        .collect();
    table_files.sort();

    let games = table_files
        .iter()
        .enumerate()
        .filter_map(|(i, path)| {
            let stem = path.file_stem()?.to_str()?;
            let rom = stem.to_lowercase();
            Some(Game {
                id: GameId(i as u32 + 1),
                nvram_file: nvram_folder.join(format!("{rom}.nv")),
                rom,
                display_name: stem.to_string(),
                vpx_file: path.clone(),
                rom_file: None,
                last_played: None,
                number_plays: 0,
            })
        })
        .collect();

    Ok(InMemoryCatalog::new(games))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn rom_stem_lookup_is_case_insensitive() {
        let catalog = InMemoryCatalog::new(vec![Game {
            id: GameId(3),
            rom: "hpgof".into(),
            display_name: "Haunted Pinball".into(),
            vpx_file: "tables/hpgof.vpx".into(),
            nvram_file: "nvram/hpgof.nv".into(),
            rom_file: None,
            last_played: None,
            number_plays: 0,
        }]);
        assert_eq!(catalog.find_by_rom_stem("HPGOF").map(|g| g.id), Some(GameId(3)));
        assert!(catalog.find_by_rom_stem("other").is_none());
        assert!(catalog.find_by_display_name("Haunted Pinball").is_some());
    }

    #[test]
    fn scan_assigns_ids_in_sorted_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Beta.vpx"), b"").unwrap();
        fs::write(dir.path().join("Alpha.vpx"), b"").unwrap();
        fs::write(dir.path().join("readme.txt"), b"").unwrap();

        let catalog = scan_tables(dir.path(), Path::new("nvram")).unwrap();
        let games = catalog.games();
        assert_eq!(games.len(), 2);
        assert_eq!(games[0].display_name, "Alpha");
        assert_eq!(games[0].id, GameId(1));
        assert_eq!(games[0].nvram_file, Path::new("nvram").join("alpha.nv"));
        assert_eq!(games[1].display_name, "Beta");
    }
}
