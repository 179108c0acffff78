//! OpenH264 software codec backend
//!
//! Wraps the `openh264` crate's encoder and decoder behind the engine traits.

use super::{DecodeEngine, EncodeEngine, EncodedFrame, EngineFactory};
use crate::buffer::BitstreamAssembler;
use crate::config::{
    Complexity as TuningComplexity, DecoderConfig, EncoderConfig, ErrorConcealment, RateControl,
    UsageProfile,
};
use crate::error::{Error, Result};
use crate::types::{FrameKind, PlanarRef, Resolution};

use openh264::decoder::{Decoder, DecoderConfig as H264DecoderConfig};
use openh264::encoder::{
    BitRate, Complexity, Encoder, EncoderConfig as H264EncoderConfig, FrameRate, FrameType,
    RateControlMode, UsageType,
};
use openh264::formats::{YUVSlices, YUVSource};
use openh264::OpenH264API;
use std::ffi::c_int;

// Mirrors openh264-sys2's DECODER_OPTION_ERROR_CON_IDC, ERROR_CON_DISABLE and
// ERROR_CON_FRAME_COPY (codec_app_def.h), which the safe crate does not re-export
const DECODER_OPTION_ERROR_CON_IDC: c_int = 8;
const ERROR_CON_DISABLE: c_int = 0;
const ERROR_CON_FRAME_COPY: c_int = 1;

/// Smallest picture side OpenH264 encodes; smaller input produces no output
pub const MIN_DIMENSION: u32 = 16;

/// Reject pictures the engine cannot take: odd sides or below one macroblock
fn check_dimensions(res: Resolution) -> std::result::Result<(), String> {
    if res.width < MIN_DIMENSION || res.height < MIN_DIMENSION {
        return Err(format!("{} is below the {}px minimum", res, MIN_DIMENSION));
    }
    if !res.is_even() {
        return Err(format!("{} has an odd side", res));
    }
    Ok(())
}

/// Factory for OpenH264 engines (bundled source build)
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenH264Factory;

impl EngineFactory for OpenH264Factory {
    fn name(&self) -> &'static str {
        "openh264"
    }

    fn create_encoder(&self, config: &EncoderConfig) -> Result<Box<dyn EncodeEngine>> {
        Ok(Box::new(OpenH264Encoder::new(config)?))
    }

    fn create_decoder(&self, config: &DecoderConfig) -> Result<Box<dyn DecodeEngine>> {
        Ok(Box::new(OpenH264Decoder::new(config)?))
    }
}

/// Map the fixed session tuning onto OpenH264 parameters
fn encoder_params(config: &EncoderConfig) -> H264EncoderConfig {
    let tuning = config.tuning;

    let usage = match tuning.usage {
        UsageProfile::RealTimeCamera => UsageType::CameraVideoRealTime,
    };
    let rate_control = match tuning.rate_control {
        RateControl::AverageBitrate => RateControlMode::Bitrate,
    };
    let complexity = match tuning.complexity {
        TuningComplexity::Low => Complexity::Low,
    };

    // Real-time camera usage with long-term references off keeps a single
    // reference picture for a single-layer stream.
    H264EncoderConfig::new()
        .usage_type(usage)
        .bitrate(BitRate::from_bps(config.bitrate_bps))
        .rate_control_mode(rate_control)
        .max_frame_rate(FrameRate::from_hz(config.max_frame_rate))
        .adaptive_quantization(tuning.adaptive_quantization)
        .background_detection(tuning.background_detection)
        .scene_change_detect(tuning.scene_change_detection)
        .complexity(complexity)
        .long_term_reference(false)
}

/// H.264 encoder wrapping OpenH264
pub struct OpenH264Encoder {
    encoder: Encoder,
    resolution: Resolution,
}

impl OpenH264Encoder {
    pub fn new(config: &EncoderConfig) -> Result<Self> {
        check_dimensions(config.resolution()).map_err(Error::InvalidEncoderConfig)?;

        let api = OpenH264API::from_source();
        let encoder = Encoder::with_api_config(api, encoder_params(config))
            .map_err(|e| Error::EncoderInit(e.to_string()))?;

        tracing::info!(
            width = config.width,
            height = config.height,
            bitrate = config.bitrate_bps,
            "OpenH264 encoder created"
        );

        Ok(Self {
            encoder,
            resolution: config.resolution(),
        })
    }
}

impl EncodeEngine for OpenH264Encoder {
    fn encode(
        &mut self,
        picture: &PlanarRef<'_>,
        out: &mut BitstreamAssembler<'_>,
    ) -> Result<EncodedFrame> {
        let res = picture.resolution();
        check_dimensions(res).map_err(Error::InvalidDimensions)?;

        let (w, h) = (res.width as usize, res.height as usize);
        let (y_stride, uv_stride) = (picture.y_stride(), picture.uv_stride());
        let (y_len, uv_len) = (y_stride * h, uv_stride * (h / 2));

        // YUVSlices asserts exact plane lengths, so trim to whole rows here
        let (Some(y), Some(u), Some(v)) = (
            picture.y().get(..y_len),
            picture.u().get(..uv_len),
            picture.v().get(..uv_len),
        ) else {
            return Err(Error::InvalidDimensions(format!(
                "planes too short for {} at strides {}/{}",
                res, y_stride, uv_stride
            )));
        };

        if res != self.resolution {
            tracing::debug!(from = %self.resolution, to = %res, "Encoder input resolution changed");
            self.resolution = res;
        }

        let yuv = YUVSlices::new(
            (y, u, v),
            (w, h),
            (y_stride, uv_stride, uv_stride),
        );

        let bitstream = self
            .encoder
            .encode(&yuv)
            .map_err(|e| Error::EncodingFailed(e.to_string()))?;

        let kind = match bitstream.frame_type() {
            FrameType::IDR | FrameType::I => FrameKind::Key,
            FrameType::Skip => FrameKind::Skipped,
            _ => FrameKind::Predicted,
        };

        let layers: Vec<_> = (0..bitstream.num_layers())
            .filter_map(|i| bitstream.layer(i))
            .collect();
        let units: Vec<Vec<&[u8]>> = layers
            .iter()
            .map(|layer| {
                (0..layer.nal_count())
                    .filter_map(|n| layer.nal_unit(n))
                    .collect()
            })
            .collect();

        let size = out.assemble(&units)?;
        Ok(EncodedFrame { size, kind })
    }

    fn force_key_frame(&mut self) {
        self.encoder.force_intra_frame();
    }
}

/// H.264 decoder wrapping OpenH264
pub struct OpenH264Decoder {
    decoder: Decoder,
}

impl OpenH264Decoder {
    pub fn new(config: &DecoderConfig) -> Result<Self> {
        let api = OpenH264API::from_source();
        let mut decoder = Decoder::with_api_config(api, H264DecoderConfig::new())
            .map_err(|e| Error::DecoderInit(e.to_string()))?;

        let mut idc: c_int = match config.error_concealment {
            ErrorConcealment::Disabled => ERROR_CON_DISABLE,
            ErrorConcealment::FrameCopy => ERROR_CON_FRAME_COPY,
        };

        let rv = unsafe {
            let raw = decoder.raw_api();
            raw.set_option(
                DECODER_OPTION_ERROR_CON_IDC,
                std::ptr::addr_of_mut!(idc).cast(),
            )
        };
        if rv != 0 {
            return Err(Error::DecoderInit(format!(
                "setting error concealment returned {}",
                rv
            )));
        }

        Ok(Self { decoder })
    }
}

impl DecodeEngine for OpenH264Decoder {
    fn decode(
        &mut self,
        bitstream: &[u8],
        sink: &mut dyn FnMut(&PlanarRef<'_>) -> Result<()>,
    ) -> Result<bool> {
        let decoded = self
            .decoder
            .decode(bitstream)
            .map_err(|e| Error::DecodingFailed(e.to_string()))?;

        let Some(yuv) = decoded else {
            return Ok(false);
        };

        let (w, h) = yuv.dimensions();
        let (y_stride, uv_stride, _) = yuv.strides();
        let picture = PlanarRef::new(
            yuv.y(),
            yuv.u(),
            yuv.v(),
            Resolution::new(w as u32, h as u32),
            y_stride,
            uv_stride,
        )?;

        sink(&picture)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::ScratchBuffer;
    use crate::types::PlanarLayout;

    #[test]
    fn test_dimension_limits() {
        assert!(check_dimensions(Resolution::new(16, 16)).is_ok());
        assert!(check_dimensions(Resolution::new(64, 48)).is_ok());
        assert!(check_dimensions(Resolution::new(4, 2)).is_err());
        assert!(check_dimensions(Resolution::new(64, 8)).is_err());
        assert!(check_dimensions(Resolution::new(64, 63)).is_err());
        assert!(check_dimensions(Resolution::new(63, 64)).is_err());
    }

    #[test]
    fn test_encoder_rejects_tiny_session() {
        let result = OpenH264Factory.create_encoder(&EncoderConfig::new(4, 2, 100_000));
        assert!(matches!(result, Err(Error::InvalidEncoderConfig(_))));
    }

    #[test]
    fn test_odd_height_picture_rejected() {
        let mut encoder = OpenH264Encoder::new(&EncoderConfig::new(64, 64, 100_000)).unwrap();

        let layout = PlanarLayout::new(64, 63);
        let planes = vec![16u8; layout.total_len()];
        let picture = layout.view(&planes).unwrap();

        let mut buf = ScratchBuffer::new();
        let mut out = BitstreamAssembler::new(&mut buf);
        assert!(matches!(
            encoder.encode(&picture, &mut out),
            Err(Error::InvalidDimensions(_))
        ));
        assert_eq!(buf.capacity(), 0);
    }
}
