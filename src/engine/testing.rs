//! Loopback engine for tests
//!
//! The "bitstream" is a small header followed by the raw I420 planes, so a
//! decode reproduces the encoded picture exactly. Decoded pictures are handed
//! out with padded strides to exercise stride handling.

use super::{DecodeEngine, EncodeEngine, EncodedFrame, EngineFactory};
use crate::buffer::BitstreamAssembler;
use crate::config::{DecoderConfig, EncoderConfig};
use crate::error::{Error, Result};
use crate::types::{FrameKind, PlanarRef, Resolution};
use std::cell::Cell;
use std::rc::Rc;

const MAGIC: u8 = 0xB5;
const HEADER_LEN: usize = 10;
const STRIDE_PADDING: usize = 16;

/// Shared counters so tests can observe engine lifecycles
#[derive(Debug, Default)]
pub struct Counters {
    pub encoders_created: Cell<u32>,
    pub decoders_created: Cell<u32>,
    pub decoders_dropped: Cell<u32>,
}

#[derive(Debug, Default, Clone)]
pub struct LoopbackFactory {
    pub counters: Rc<Counters>,
    /// Fail decoder creation once this many decoders exist
    pub decoder_limit: Option<u32>,
    pub fail_encoder: bool,
    /// Encoders reject every frame
    pub fail_encodes: bool,
}

impl LoopbackFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_after(decoders: u32) -> Self {
        Self {
            decoder_limit: Some(decoders),
            ..Self::default()
        }
    }
}

impl EngineFactory for LoopbackFactory {
    fn name(&self) -> &'static str {
        "loopback"
    }

    fn create_encoder(&self, _config: &EncoderConfig) -> Result<Box<dyn EncodeEngine>> {
        if self.fail_encoder {
            return Err(Error::EncoderInit("loopback refused".into()));
        }
        let c = &self.counters.encoders_created;
        c.set(c.get() + 1);
        Ok(Box::new(LoopbackEncoder {
            frames: 0,
            force_key: false,
            fail: self.fail_encodes,
        }))
    }

    fn create_decoder(&self, _config: &DecoderConfig) -> Result<Box<dyn DecodeEngine>> {
        let c = &self.counters.decoders_created;
        if let Some(limit) = self.decoder_limit {
            if c.get() >= limit {
                return Err(Error::DecoderInit("loopback refused".into()));
            }
        }
        c.set(c.get() + 1);
        Ok(Box::new(LoopbackDecoder {
            counters: Rc::clone(&self.counters),
            scratch: Vec::new(),
        }))
    }
}

pub struct LoopbackEncoder {
    frames: u64,
    force_key: bool,
    fail: bool,
}

impl EncodeEngine for LoopbackEncoder {
    fn encode(
        &mut self,
        picture: &PlanarRef<'_>,
        out: &mut BitstreamAssembler<'_>,
    ) -> Result<EncodedFrame> {
        if self.fail {
            return Err(Error::EncodingFailed("loopback failure".into()));
        }

        let kind = if self.frames == 0 || self.force_key {
            FrameKind::Key
        } else {
            FrameKind::Predicted
        };
        self.force_key = false;
        self.frames += 1;

        let res = picture.resolution();
        let mut header = [0u8; HEADER_LEN];
        header[0] = MAGIC;
        header[1] = kind.is_key() as u8;
        header[2..6].copy_from_slice(&res.width.to_le_bytes());
        header[6..10].copy_from_slice(&res.height.to_le_bytes());

        let layout = picture.layout();
        let mut planes = vec![0u8; layout.total_len()];
        crate::processing::convert::pack_planar(picture, &mut planes)?;

        let size = out.assemble(&[vec![&header[..]], vec![&planes[..]]])?;
        Ok(EncodedFrame { size, kind })
    }

    fn force_key_frame(&mut self) {
        self.force_key = true;
    }
}

pub struct LoopbackDecoder {
    counters: Rc<Counters>,
    scratch: Vec<u8>,
}

impl Drop for LoopbackDecoder {
    fn drop(&mut self) {
        let c = &self.counters.decoders_dropped;
        c.set(c.get() + 1);
    }
}

impl DecodeEngine for LoopbackDecoder {
    fn decode(
        &mut self,
        bitstream: &[u8],
        sink: &mut dyn FnMut(&PlanarRef<'_>) -> Result<()>,
    ) -> Result<bool> {
        if bitstream.is_empty() {
            return Ok(false);
        }
        if bitstream.len() < HEADER_LEN || bitstream[0] != MAGIC {
            return Err(Error::DecodingFailed("not a loopback stream".into()));
        }

        let width = u32::from_le_bytes([bitstream[2], bitstream[3], bitstream[4], bitstream[5]]);
        let height = u32::from_le_bytes([bitstream[6], bitstream[7], bitstream[8], bitstream[9]]);
        let res = Resolution::new(width, height);
        if res.is_empty() {
            return Err(Error::DecodingFailed("empty loopback picture".into()));
        }
        let layout = crate::types::PlanarLayout::new(width, height);
        let (y, u, v) = layout.split(&bitstream[HEADER_LEN..])?;

        // Re-lay the planes with padded rows, the way a real decoder would
        let y_stride = layout.width + STRIDE_PADDING;
        let uv_stride = layout.chroma_width() + STRIDE_PADDING;
        let y_len = y_stride * layout.height;
        let uv_len = uv_stride * layout.chroma_height();
        self.scratch.clear();
        self.scratch.resize(y_len + 2 * uv_len, 0xEE);

        for (row, src) in y.chunks_exact(layout.width).enumerate() {
            self.scratch[row * y_stride..row * y_stride + layout.width].copy_from_slice(src);
        }
        let cw = layout.chroma_width();
        for (row, (su, sv)) in u.chunks_exact(cw).zip(v.chunks_exact(cw)).enumerate() {
            let base = y_len + row * uv_stride;
            self.scratch[base..base + cw].copy_from_slice(su);
            let base = y_len + uv_len + row * uv_stride;
            self.scratch[base..base + cw].copy_from_slice(sv);
        }

        let (py, rest) = self.scratch.split_at(y_len);
        let (pu, pv) = rest.split_at(uv_len);
        let picture = PlanarRef::new(py, pu, pv, res, y_stride, uv_stride)?;
        sink(&picture)?;
        Ok(true)
    }
}

/// Whether a loopback stream carries a key frame
pub fn is_key(bitstream: &[u8]) -> bool {
    bitstream.len() >= HEADER_LEN && bitstream[0] == MAGIC && bitstream[1] == 1
}
