//! Error types for the preprocessing pipeline.

use thiserror::Error;

/// Errors surfaced by the preprocessing pipeline.
///
/// Processing is deterministic and stateless, so there is no retry or
/// recovery path: every error propagates immediately to the caller and no
/// partial results are produced.
#[derive(Debug, Error)]
pub enum PreprocessError {
    /// Input waveform has an unsupported or inconsistent shape
    /// (zero channels, unequal channel lengths, empty where data is required).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Sample-rate conversion failed.
    #[error("resampling failed: {0}")]
    Resample(String),

    /// WAV read/write error.
    #[error("wav i/o error: {0}")]
    Wav(#[from] hound::Error),

    /// Tensor conversion error.
    #[error(transparent)]
    Tensor(#[from] candle_core::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PreprocessError>;
