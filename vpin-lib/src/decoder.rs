//! Decoder adapter: one call per (rom, source) pair.
//!
//! NVRAM files are decoded by spawning the external PINemHi executable in
//! its install directory with the bare `.nv` filename as the only
//! argument. The decoder finds the file through the `VP=` line of its ini,
//! which is checked (and, on mismatch, rewritten) before the first
//! invocation of the process. Registry-backed tables skip the subprocess:
//! their scores were extracted from `VPReg.stg` into per-table text files
//! by a separate step and are read directly.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;
use tokio::time::Duration;

use vpin_core::{HighscoreError, HighscoreSource};

use crate::command::CommandRunner;
use crate::paths::Paths;

/// Default time budget for one decoder invocation.
pub const DEFAULT_DECODE_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest stderr excerpt carried in a [`HighscoreError::DecoderFailed`].
const STDERR_EXCERPT_LEN: usize = 200;

/// Raw decoder output and the file it was produced from.
#[derive(Debug, Clone)]
pub struct DecoderOutput {
    pub raw: String,
    pub source_path: PathBuf,
}

/// Invokes the external decoder (or reads the extracted store) once per
/// request. No retries at this layer.
pub struct Decoder {
    paths: Arc<dyn Paths>,
    runner: Arc<dyn CommandRunner>,
    timeout: Duration,
    /// NVRAM folder the ini was last verified against. The ini is a
    /// process-local resource; re-checked only when this path changes.
    config_synced: Mutex<Option<PathBuf>>,
    missing_warned: AtomicBool,
}

impl Decoder {
    pub fn new(paths: Arc<dyn Paths>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            paths,
            runner,
            timeout: DEFAULT_DECODE_TIMEOUT,
            config_synced: Mutex::new(None),
            missing_warned: AtomicBool::new(false),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn decode(&self, source: &HighscoreSource) -> Result<DecoderOutput, HighscoreError> {
        match source {
            HighscoreSource::Nvram { path } => self.decode_nvram(path).await,
            HighscoreSource::RegBackedStore { game_display_name } => {
                self.read_extracted(game_display_name).await
            }
        }
    }

    /// Whether the extracted store has an entry for this display name.
    pub fn has_reg_entry(&self, game_display_name: &str) -> bool {
        extracted_entry_file(
            &self.paths.extracted_reg_store_folder().join(game_display_name),
        )
        .is_some()
    }

    async fn decode_nvram(&self, path: &Path) -> Result<DecoderOutput, HighscoreError> {
        let exe = self.paths.decoder_executable();
        if !exe.exists() {
            return Err(self.unavailable(&exe));
        }
        self.ensure_config().await?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or(HighscoreError::SourceMissing)?;
        let working_dir = exe.parent().unwrap_or(Path::new(".")).to_path_buf();

        let output = self
            .runner
            .run(&exe, &[file_name], &working_dir, self.timeout)
            .await
            .map_err(|e| {
                if e.kind() == io::ErrorKind::NotFound {
                    self.unavailable(&exe)
                } else {
                    HighscoreError::Io(e)
                }
            })?;

        if output.timed_out {
            return Err(HighscoreError::DecoderTimeout { timeout_secs: self.timeout.as_secs() });
        }
        if !output.succeeded() {
            return Err(HighscoreError::DecoderFailed {
                exit_code: output.exit_code,
                stderr: excerpt(&output.stderr),
            });
        }
        Ok(DecoderOutput { raw: output.stdout, source_path: path.to_path_buf() })
    }

    async fn read_extracted(&self, game_display_name: &str) -> Result<DecoderOutput, HighscoreError> {
        let entry_dir = self.paths.extracted_reg_store_folder().join(game_display_name);
        let file = extracted_entry_file(&entry_dir).ok_or(HighscoreError::SourceMissing)?;
        let raw = tokio::fs::read_to_string(&file).await?;
        Ok(DecoderOutput { raw, source_path: file })
    }

    /// Make sure the decoder ini's `VP=` line points at the NVRAM folder.
    ///
    /// Rewrites only that line, leaves every other byte untouched, and
    /// writes nothing when the value already matches. Verified at most
    /// once per process while the NVRAM path is unchanged.
    async fn ensure_config(&self) -> Result<(), HighscoreError> {
        let nvram = self.paths.nvram_folder();
        let mut synced = self.config_synced.lock().await;
        if synced.as_deref() == Some(nvram.as_path()) {
            return Ok(());
        }

        let config = self.paths.decoder_config_file();
        let contents = tokio::fs::read_to_string(&config).await?;

        let mut changed = false;
        let updated: Vec<String> = contents
            .split('\n')
            .map(|line| {
                let Some(value) = line.strip_prefix("VP=") else {
                    return line.to_string();
                };
                let crlf = value.ends_with('\r');
                let current = value.trim_end_matches('\r').trim_end_matches(['\\', '/']);
                if Path::new(current) == nvram {
                    return line.to_string();
                }
                changed = true;
                let mut rewritten = format!("VP={}", nvram.display());
                if crlf {
                    rewritten.push('\r');
                }
                rewritten
            })
            .collect();

        if changed {
            tokio::fs::write(&config, updated.join("\n")).await?;
            log::info!("Written updates to {}", config.display());
        }

        *synced = Some(nvram);
        Ok(())
    }

    fn unavailable(&self, exe: &Path) -> HighscoreError {
        // Warn on first miss only; every later lookup fails quietly.
        if !self.missing_warned.swap(true, Ordering::Relaxed) {
            log::warn!("highscore decoder not found at {}", exe.display());
        }
        HighscoreError::DecoderUnavailable(exe.display().to_string())
    }
}

/// First regular file (sorted) inside a per-table extraction directory.
fn extracted_entry_file(entry_dir: &Path) -> Option<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(entry_dir)
        .ok()?
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    files.into_iter().next()
}

fn excerpt(stderr: &str) -> String {
    let trimmed = stderr.trim();
    trimmed.chars().take(STDERR_EXCERPT_LEN).collect()
}
