//! Error types for FrameBridge

use thiserror::Error;

/// Result type alias for FrameBridge operations
pub type Result<T> = std::result::Result<T, Error>;

/// FrameBridge error type
///
/// None of these reach the embedding caller directly: the `FrameBridge`
/// boundary turns every failure into an empty or zeroed result. They exist
/// so the internal `try_*` paths can propagate with `?` and log a reason.
#[derive(Error, Debug)]
pub enum Error {
    // Encoder errors
    #[error("Encoder initialization failed: {0}")]
    EncoderInit(String),

    #[error("Invalid encoder configuration: {0}")]
    InvalidEncoderConfig(String),

    #[error("Encoder not initialized")]
    EncoderNotInitialized,

    #[error("Encoding failed: {0}")]
    EncodingFailed(String),

    // Decoder errors
    #[error("Decoder initialization failed: {0}")]
    DecoderInit(String),

    #[error("Decoding failed: {0}")]
    DecodingFailed(String),

    #[error("Decoder slot {0} is out of range")]
    InvalidSlot(i32),

    #[error("Decoder slot {0} is empty")]
    SlotEmpty(usize),

    #[error("No complete picture available")]
    NoPicture,

    // Buffer errors
    #[error("Failed to allocate {0} bytes")]
    Allocation(usize),

    #[error("Invalid dimensions: {0}")]
    InvalidDimensions(String),

    #[error("Buffer too small: need {needed} bytes, got {actual}")]
    BufferTooSmall { needed: usize, actual: usize },

    // General errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Check if the next call can reasonably succeed without reconfiguring
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::EncodingFailed(_)
                | Error::DecodingFailed(_)
                | Error::NoPicture
                | Error::BufferTooSmall { .. }
        )
    }

    /// Check if this only means "nothing to hand back this call"
    pub fn is_no_output(&self) -> bool {
        matches!(self, Error::NoPicture)
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(e: toml::ser::Error) -> Self {
        Error::Config(e.to_string())
    }
}
