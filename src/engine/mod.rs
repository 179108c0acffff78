//! Compression engine boundary
//!
//! The bridge never encodes or decodes itself. It talks to an engine through
//! the traits below; `openh264` provides the concrete H.264 backend.

#[cfg(feature = "openh264")]
pub mod openh264;

#[cfg(test)]
pub(crate) mod testing;

use crate::buffer::BitstreamAssembler;
use crate::config::{DecoderConfig, EncoderConfig};
use crate::error::{Error, Result};
use crate::types::{FrameKind, PlanarRef};

/// Result of one encode submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedFrame {
    /// Bytes written to the assembler (0 = no output this frame)
    pub size: usize,
    /// Picture type reported by the engine
    pub kind: FrameKind,
}

/// An encoder instance owned by the session
pub trait EncodeEngine {
    /// Encode one planar picture.
    ///
    /// On success the engine hands its layers to `out` in layer-then-unit
    /// order. On failure `out` must not be touched.
    fn encode(
        &mut self,
        picture: &PlanarRef<'_>,
        out: &mut BitstreamAssembler<'_>,
    ) -> Result<EncodedFrame>;

    /// Make the next encoded picture a key frame
    fn force_key_frame(&mut self);
}

/// A decoder instance owned by a slot
pub trait DecodeEngine {
    /// Feed bitstream bytes.
    ///
    /// When a complete picture is available it is passed to `sink` (planes
    /// borrow engine memory and only live for the call) and `Ok(true)` is
    /// returned. `Ok(false)` means no picture yet.
    fn decode(
        &mut self,
        bitstream: &[u8],
        sink: &mut dyn FnMut(&PlanarRef<'_>) -> Result<()>,
    ) -> Result<bool>;
}

/// Creates engine instances
pub trait EngineFactory {
    /// Backend name for logging
    fn name(&self) -> &'static str;

    fn create_encoder(&self, config: &EncoderConfig) -> Result<Box<dyn EncodeEngine>>;

    fn create_decoder(&self, config: &DecoderConfig) -> Result<Box<dyn DecodeEngine>>;
}

/// Check whether a compression backend was compiled in
pub fn is_available() -> bool {
    cfg!(feature = "openh264")
}

/// The default backend for this build
pub fn default_factory() -> Result<Box<dyn EngineFactory>> {
    #[cfg(feature = "openh264")]
    {
        Ok(Box::new(openh264::OpenH264Factory))
    }

    #[cfg(not(feature = "openh264"))]
    {
        Err(Error::EncoderInit(
            "no compression backend compiled in (enable the `openh264` feature)".into(),
        ))
    }
}

/// Factory used when no backend is compiled in; every creation fails
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableFactory;

impl EngineFactory for UnavailableFactory {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn create_encoder(&self, _config: &EncoderConfig) -> Result<Box<dyn EncodeEngine>> {
        Err(Error::EncoderInit("no compression backend available".into()))
    }

    fn create_decoder(&self, _config: &DecoderConfig) -> Result<Box<dyn DecodeEngine>> {
        Err(Error::DecoderInit("no compression backend available".into()))
    }
}
