//! FrameBridge — H.264 boundary layer for real-time video pipelines
//!
//! Sits between a packed-RGBA frame pipeline and an H.264 engine.
//!
//! # Features
//!
//! - **Convert**: fixed-point BT.601 RGBA ↔ I420, direct or table-driven
//! - **Encode**: one low-latency encoder session, key frames on demand
//! - **Decode**: 32 independent decoder slots addressed by index
//! - **Buffers**: grow-only scratch regions reused across frames
//!
//! # Example
//!
//! ```rust,no_run
//! use framebridge::{BridgeConfig, FrameBridge};
//!
//! fn main() -> framebridge::Result<()> {
//!     let mut bridge = FrameBridge::new(BridgeConfig::default())?;
//!     bridge.configure_encoder(640, 480, 1_000_000);
//!     bridge.init_decoder_slot(0);
//!
//!     let frame = vec![0u8; 640 * 480 * 4];
//!     let bitstream = bridge.encode_packed(&frame, 640, 480).to_vec();
//!     if let Some(decoded) = bridge.decode_to_packed(0, &bitstream) {
//!         println!("{}x{}", decoded.width, decoded.height);
//!         bridge.release_frame(Some(decoded));
//!     }
//!     Ok(())
//! }
//! ```

pub mod bridge;
pub mod buffer;
pub mod config;
pub mod decode;
pub mod encode;
pub mod engine;
pub mod error;
pub mod processing;
pub mod types;

// Re-exports for convenience
pub use bridge::{BridgeStats, DecodeStats, EncodedBitstream, FrameBridge};
pub use config::{BridgeConfig, ChromaSampling, ConversionPath, EncoderConfig, MAX_DECODER_SLOTS};
pub use error::{Error, Result};
pub use processing::ColorConverter;
pub use types::{FrameInfo, FrameKind, PackedFrame, PlanarLayout, PlanarRef, Resolution};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Check if a compression backend is compiled in
pub fn is_codec_available() -> bool {
    engine::is_available()
}
