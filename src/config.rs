//! Configuration types for FrameBridge

use crate::error::{Error, Result};
use crate::types::Resolution;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Number of decoder slots the table can hold
pub const MAX_DECODER_SLOTS: usize = 32;

/// Top-level bridge configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Encoder session to configure at startup (None = configure later)
    pub encoder: Option<EncoderConfig>,
    /// Decoder slot table settings
    pub decoder: DecoderConfig,
    /// Pixel conversion settings
    pub conversion: ConversionConfig,
    /// Scratch buffer pre-sizing
    pub pool: PoolConfig,
}

impl BridgeConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Render configuration as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn with_encoder(mut self, encoder: EncoderConfig) -> Self {
        self.encoder = Some(encoder);
        self
    }

    pub fn with_decoder_slots(mut self, slots: usize) -> Self {
        self.decoder.slots = slots;
        self
    }

    pub fn with_chroma_sampling(mut self, chroma: ChromaSampling) -> Self {
        self.conversion.chroma = chroma;
        self
    }

    pub fn with_conversion_path(mut self, path: ConversionPath) -> Self {
        self.conversion.path = path;
        self
    }

    /// Reject values no session could run with
    pub fn validate(&self) -> Result<()> {
        if let Some(encoder) = &self.encoder {
            encoder.validate()?;
        }
        if self.decoder.slots > MAX_DECODER_SLOTS {
            return Err(Error::Config(format!(
                "decoder.slots = {} exceeds capacity {}",
                self.decoder.slots, MAX_DECODER_SLOTS
            )));
        }
        Ok(())
    }
}

/// Encoder configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Picture width in pixels (even)
    pub width: u32,
    /// Picture height in pixels (even)
    pub height: u32,
    /// Target bitrate in bits per second
    pub bitrate_bps: u32,
    /// Frame rate hint for rate control
    #[serde(default = "default_frame_rate")]
    pub max_frame_rate: f32,
    /// Latency tuning; not configurable, always `EncoderTuning::LOW_LATENCY`
    #[serde(skip, default = "EncoderTuning::low_latency")]
    pub tuning: EncoderTuning,
}

fn default_frame_rate() -> f32 {
    30.0
}

impl EncoderConfig {
    pub fn new(width: u32, height: u32, bitrate_bps: u32) -> Self {
        Self {
            width,
            height,
            bitrate_bps,
            max_frame_rate: default_frame_rate(),
            tuning: EncoderTuning::LOW_LATENCY,
        }
    }

    pub fn with_frame_rate(mut self, fps: f32) -> Self {
        self.max_frame_rate = fps;
        self
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    /// Check dimensions and bitrate before an engine is created
    pub fn validate(&self) -> Result<()> {
        let res = self.resolution();
        if res.is_empty() || !res.is_even() {
            return Err(Error::InvalidEncoderConfig(format!(
                "resolution {} must be non-zero and even",
                res
            )));
        }
        if self.bitrate_bps == 0 {
            return Err(Error::InvalidEncoderConfig("bitrate must be non-zero".into()));
        }
        if !(self.max_frame_rate > 0.0) {
            return Err(Error::InvalidEncoderConfig(format!(
                "frame rate {} must be positive",
                self.max_frame_rate
            )));
        }
        Ok(())
    }
}

/// Fixed latency-oriented encoder flags.
///
/// Every session runs with the same tuning: real-time usage, average-bitrate
/// rate control and every analysis pass that adds per-frame latency disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderTuning {
    pub usage: UsageProfile,
    pub rate_control: RateControl,
    pub adaptive_quantization: bool,
    pub background_detection: bool,
    pub scene_change_detection: bool,
    pub complexity: Complexity,
}

impl EncoderTuning {
    pub const LOW_LATENCY: Self = Self {
        usage: UsageProfile::RealTimeCamera,
        rate_control: RateControl::AverageBitrate,
        adaptive_quantization: false,
        background_detection: false,
        scene_change_detection: false,
        complexity: Complexity::Low,
    };

    fn low_latency() -> Self {
        Self::LOW_LATENCY
    }
}

impl Default for EncoderTuning {
    fn default() -> Self {
        Self::LOW_LATENCY
    }
}

/// Encoder usage profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageProfile {
    /// Live camera video, real-time
    RealTimeCamera,
}

/// Rate control mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateControl {
    /// Hold the average bitrate at the target
    AverageBitrate,
}

/// Algorithmic complexity (speed vs efficiency)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Complexity {
    Low,
}

/// Decoder slot table configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Slots to initialize at startup (clamped to `MAX_DECODER_SLOTS`)
    pub slots: usize,
    /// Concealment policy when a reference is lost
    pub error_concealment: ErrorConcealment,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            slots: 0,
            error_concealment: ErrorConcealment::FrameCopy,
        }
    }
}

/// Decoder error-concealment policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorConcealment {
    /// No concealment
    Disabled,
    /// Copy the previous frame over lost regions
    #[default]
    FrameCopy,
}

/// Pixel conversion configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ConversionConfig {
    /// Direct arithmetic or lookup tables
    pub path: ConversionPath,
    /// How chroma is taken from each 2x2 block
    pub chroma: ChromaSampling,
}

/// Which implementation converts pixels. Both produce identical bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ConversionPath {
    /// Straight per-pixel arithmetic
    Direct,
    /// Precomputed 256-entry product tables
    #[default]
    Table,
}

/// Chroma subsampling policy for RGBA -> I420
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ChromaSampling {
    /// Use the block's top-left pixel only (bit-compatible with existing streams)
    #[default]
    TopLeft,
    /// Rounded mean of the block's available pixels
    BoxAverage,
}

/// Scratch buffer pre-sizing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PoolConfig {
    /// Bytes to reserve for the planar staging buffer up front
    pub planar_capacity: usize,
    /// Bytes to reserve for the bitstream assembly buffer up front
    pub bitstream_capacity: usize,
}
