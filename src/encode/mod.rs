//! Video encoding module
//!
//! One outbound stream: a single encoder session with a fixed
//! latency-oriented configuration.

mod session;

pub use session::EncoderSession;

/// Encoder statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncoderStats {
    /// Frames the engine accepted
    pub frames_encoded: u64,
    /// Frames the engine rejected
    pub frames_failed: u64,
    /// Frames reported as key frames
    pub key_frames: u64,
    /// Explicit key frame requests
    pub key_frames_requested: u64,
    /// Total bitstream bytes produced
    pub bytes_output: u64,
}

impl EncoderStats {
    /// Mean encoded frame size in bytes
    pub fn avg_frame_bytes(&self) -> f64 {
        if self.frames_encoded == 0 {
            0.0
        } else {
            self.bytes_output as f64 / self.frames_encoded as f64
        }
    }
}
