use thiserror::Error;

/// Errors raised while resolving a table's highscore.
///
/// Callers distinguish two families: definitive misses (`RomEmpty`,
/// `SourceMissing`, `ParseEmpty`) which may be cached as "known absent",
/// and transient failures which must leave the cache slot empty so the
/// next lookup retries.
#[derive(Debug, Error)]
pub enum HighscoreError {
    /// The game has no ROM token; highscore tracking does not apply.
    #[error("game has no ROM name")]
    RomEmpty,

    /// Neither an NVRAM file nor a registry-backed store entry exists.
    #[error("no highscore source found")]
    SourceMissing,

    /// The decoder executable is missing.
    #[error("highscore decoder not found: {0}")]
    DecoderUnavailable(String),

    /// The decoder ran but reported failure (non-zero exit or stderr output).
    #[error("highscore decoder failed (exit code {exit_code}): {stderr}")]
    DecoderFailed { exit_code: i32, stderr: String },

    /// The decoder did not finish within the configured timeout.
    #[error("highscore decoder timed out after {timeout_secs}s")]
    DecoderTimeout { timeout_secs: u64 },

    /// Decoder output contained no score rows.
    #[error("decoder output contained no scores")]
    ParseEmpty,

    /// I/O error while reading a source or configuration file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HighscoreError {
    /// Transient errors never create a negative-cache entry; the next
    /// lookup retries.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            HighscoreError::DecoderUnavailable(_)
                | HighscoreError::DecoderFailed { .. }
                | HighscoreError::DecoderTimeout { .. }
                | HighscoreError::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn definitive_misses_are_not_transient() {
        assert!(!HighscoreError::RomEmpty.is_transient());
        assert!(!HighscoreError::SourceMissing.is_transient());
        assert!(!HighscoreError::ParseEmpty.is_transient());
    }

    #[test]
    fn decoder_errors_are_transient() {
        assert!(HighscoreError::DecoderUnavailable("PINemHi.exe".into()).is_transient());
        assert!(
            HighscoreError::DecoderFailed { exit_code: 1, stderr: "boom".into() }.is_transient()
        );
        assert!(HighscoreError::DecoderTimeout { timeout_secs: 10 }.is_transient());
    }
}
