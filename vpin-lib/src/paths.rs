//! File locations of the Visual Pinball installation and the decoder.
//!
//! The tracking core only ever asks a [`Paths`] implementation for absolute
//! locations; it never guesses at directory layout itself. [`InstallPaths`]
//! is the production implementation, rooted at a Visual Pinball
//! installation folder; tests substitute tempdir-backed fakes.

use std::fs;
use std::path::{Path, PathBuf};

/// Absolute file locations consumed by the tracking core.
pub trait Paths: Send + Sync {
    /// Directory holding per-table `<rom>.nv` files.
    fn nvram_folder(&self) -> PathBuf;

    /// The shared `VPReg.stg` store file.
    fn reg_backed_store_file(&self) -> PathBuf;

    /// Directory of pre-extracted per-table text files from `VPReg.stg`.
    fn extracted_reg_store_folder(&self) -> PathBuf;

    /// The external decoder executable.
    fn decoder_executable(&self) -> PathBuf;

    /// The decoder's ini file (its `VP=` line must point at the NVRAM folder).
    fn decoder_config_file(&self) -> PathBuf;
}

const VPREG_STG: &str = "VPReg.stg";
const DECODER_COMMAND: &str = "PINemHi.exe";
const DECODER_INI: &str = "pinemhi.ini";

/// Production [`Paths`] derived from a Visual Pinball installation folder.
#[derive(Debug, Clone)]
pub struct InstallPaths {
    visual_pinball_folder: PathBuf,
    decoder_folder: PathBuf,
    extracted_reg_folder: PathBuf,
}

impl InstallPaths {
    /// Standard layout relative to the Visual Pinball installation folder,
    /// with the decoder and the extracted store in the working directory.
    pub fn new(visual_pinball_folder: impl Into<PathBuf>) -> Self {
        Self {
            visual_pinball_folder: visual_pinball_folder.into(),
            decoder_folder: PathBuf::from("pinemhi"),
            extracted_reg_folder: PathBuf::from("VPReg"),
        }
    }

    pub fn with_decoder_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.decoder_folder = folder.into();
        self
    }

    pub fn with_extracted_reg_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.extracted_reg_folder = folder.into();
        self
    }

    pub fn visual_pinball_folder(&self) -> &Path {
        &self.visual_pinball_folder
    }

    pub fn mame_folder(&self) -> PathBuf {
        self.visual_pinball_folder.join("VPinMAME")
    }

    pub fn rom_folder(&self) -> PathBuf {
        self.mame_folder().join("roms")
    }

    pub fn tables_folder(&self) -> PathBuf {
        self.visual_pinball_folder.join("Tables")
    }

    /// Multi-line, column-aligned report of every resolved location with an
    /// `[OK]` / `[NOT FOUND]` / `[NOT READABLE]` marker, logged at startup.
    pub fn installation_overview(&self) -> String {
        let rows = [
            ("Visual Pinball Folder", self.visual_pinball_folder.clone()),
            ("Visual Pinball Tables Folder", self.tables_folder()),
            ("Mame Folder", self.mame_folder()),
            ("ROM Folder", self.rom_folder()),
            ("NVRam Folder", self.nvram_folder()),
            ("VPReg Store", self.reg_backed_store_file()),
            ("Extracted VPReg Folder", self.extracted_reg_store_folder()),
            ("Decoder Command", self.decoder_executable()),
            ("Decoder Config", self.decoder_config_file()),
        ];
        rows.iter()
            .map(|(label, path)| format_path_row(label, path))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Paths for InstallPaths {
    fn nvram_folder(&self) -> PathBuf {
        self.mame_folder().join("nvram")
    }

    fn reg_backed_store_file(&self) -> PathBuf {
        self.visual_pinball_folder.join("User").join(VPREG_STG)
    }

    fn extracted_reg_store_folder(&self) -> PathBuf {
        self.extracted_reg_folder.clone()
    }

    fn decoder_executable(&self) -> PathBuf {
        self.decoder_folder.join(DECODER_COMMAND)
    }

    fn decoder_config_file(&self) -> PathBuf {
        self.decoder_folder.join(DECODER_INI)
    }
}

fn format_path_row(label: &str, path: &Path) -> String {
    let mut row = format!("{label}:");
    while row.len() < 33 {
        row.push(' ');
    }
    row.push_str(&path.display().to_string());
    while row.len() < 89 {
        row.push(' ');
    }
    row.push_str(marker(path));
    row
}

fn marker(path: &Path) -> &'static str {
    if !path.exists() {
        "   [NOT FOUND]"
    } else if !is_readable(path) {
        "[NOT READABLE]"
    } else {
        "          [OK]"
    }
}

fn is_readable(path: &Path) -> bool {
    if path.is_dir() {
        fs::read_dir(path).is_ok()
    } else {
        fs::File::open(path).is_ok()
    }
}
