//! Frame bridge
//!
//! Composes conversion, scratch buffers, the encoder session and the decoder
//! slot table into the operations the embedding pipeline calls:
//!
//! - encode: RGBA or I420 in, H.264 bitstream out
//! - decode: bitstream in (per slot), RGBA or tight I420 out
//!
//! Every operation has a `try_*` form returning `Result`. The plain forms keep
//! the boundary contract: failure is an empty slice, `None`, `false` or a
//! zeroed `FrameInfo`, never an error value.

use crate::buffer::{BitstreamAssembler, BufferKind, ScratchBufferPool};
use crate::config::{BridgeConfig, EncoderConfig};
use crate::decode::DecoderSlotTable;
use crate::encode::{EncoderSession, EncoderStats};
use crate::engine::{self, EngineFactory, UnavailableFactory};
use crate::error::{Error, Result};
use crate::processing::ColorConverter;
use crate::types::{FrameInfo, FrameKind, PackedFrame, PlanarLayout, Resolution};

/// Bitstream produced by one encode call, borrowed from the bridge
#[derive(Debug, Clone, Copy)]
pub struct EncodedBitstream<'a> {
    /// Concatenated NAL units; empty if the engine produced nothing
    pub data: &'a [u8],
    /// Picture type reported by the engine
    pub kind: FrameKind,
}

/// Decode-side counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeStats {
    /// Pictures handed back to the caller
    pub frames_decoded: u64,
    /// Calls where the engine had no complete picture yet
    pub no_picture: u64,
    /// Calls rejected by the engine or by output checks
    pub failures: u64,
}

/// Snapshot of bridge statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BridgeStats {
    pub encoder: EncoderStats,
    pub decoder: DecodeStats,
    pub planar_capacity: usize,
    pub bitstream_capacity: usize,
}

/// Owns every piece of per-process codec state
pub struct FrameBridge {
    factory: Box<dyn EngineFactory>,
    converter: ColorConverter,
    pool: ScratchBufferPool,
    slots: DecoderSlotTable,
    session: EncoderSession,
    decode_stats: DecodeStats,
    frame_rate: f32,
}

impl FrameBridge {
    /// Create a bridge on the default compression backend.
    ///
    /// Without a compiled-in backend the bridge still converts, but every
    /// engine creation fails.
    pub fn new(config: BridgeConfig) -> Result<Self> {
        let factory = engine::default_factory().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "No compression backend, engines unavailable");
            Box::new(UnavailableFactory)
        });
        Self::with_factory(config, factory)
    }

    /// Create a bridge on a specific backend
    pub fn with_factory(config: BridgeConfig, factory: Box<dyn EngineFactory>) -> Result<Self> {
        config.validate()?;

        let mut bridge = Self {
            converter: ColorConverter::new(config.conversion),
            pool: ScratchBufferPool::with_capacity(
                config.pool.planar_capacity,
                config.pool.bitstream_capacity,
            ),
            slots: DecoderSlotTable::new(config.decoder.clone()),
            session: EncoderSession::new(),
            decode_stats: DecodeStats::default(),
            frame_rate: config
                .encoder
                .as_ref()
                .map(|e| e.max_frame_rate)
                .unwrap_or(30.0),
            factory,
        };

        if let Some(encoder) = config.encoder {
            bridge.try_configure_encoder(encoder)?;
        }
        if config.decoder.slots > 0 {
            bridge
                .slots
                .reinit_all(bridge.factory.as_ref(), config.decoder.slots as i32)?;
        }

        tracing::info!(
            backend = bridge.factory.name(),
            slots = bridge.slots.capacity(),
            "Frame bridge created"
        );
        Ok(bridge)
    }

    // ----- Encoder session -----

    /// Replace the encoder session. Returns false on any failure.
    pub fn configure_encoder(&mut self, width: u32, height: u32, bitrate_bps: u32) -> bool {
        let config = EncoderConfig::new(width, height, bitrate_bps).with_frame_rate(self.frame_rate);
        self.try_configure_encoder(config).is_ok()
    }

    pub fn try_configure_encoder(&mut self, config: EncoderConfig) -> Result<()> {
        self.frame_rate = config.max_frame_rate;
        self.session.configure(self.factory.as_ref(), config)
    }

    /// Force the next encoded frame to be a key frame (no-op without a session)
    pub fn request_key_frame(&mut self) {
        self.session.request_key_frame();
    }

    // ----- Decoder slots -----

    /// Reinitialize slots `[0, count)`, tearing down all others
    pub fn init_decoder_pool(&mut self, count: i32) -> bool {
        self.slots.reinit_all(self.factory.as_ref(), count).is_ok()
    }

    pub fn init_decoder_slot(&mut self, index: i32) -> bool {
        self.slots.init_slot(self.factory.as_ref(), index).is_ok()
    }

    pub fn deinit_decoder_slot(&mut self, index: i32) {
        self.slots.deinit_slot(index);
    }

    // ----- Encode -----

    /// Convert packed RGBA to I420 and encode it. Empty on failure.
    pub fn encode_packed(&mut self, pixels: &[u8], width: u32, height: u32) -> &[u8] {
        match self.try_encode_packed(pixels, width, height) {
            Ok(encoded) => encoded.data,
            Err(e) => {
                tracing::debug!(error = %e, "encode_packed produced no output");
                &[]
            }
        }
    }

    pub fn try_encode_packed(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> Result<EncodedBitstream<'_>> {
        if !self.session.is_configured() {
            return Err(Error::EncoderNotInitialized);
        }

        let res = Resolution::new(width, height);
        let layout = PlanarLayout::new(width, height);
        let (planar, bitstream) = self.pool.split_mut();

        let staging = planar.try_acquire(layout.total_len())?;
        self.converter.rgba_to_i420(pixels, res, staging)?;
        let picture = layout.view(staging)?;

        let mut assembler = BitstreamAssembler::new(bitstream);
        let frame = self.session.encode(&picture, &mut assembler)?;

        Ok(EncodedBitstream {
            data: bitstream.get(frame.size),
            kind: frame.kind,
        })
    }

    /// Encode a caller-supplied tight I420 buffer. Empty on failure.
    pub fn encode_planar(&mut self, planar: &[u8], width: u32, height: u32) -> &[u8] {
        match self.try_encode_planar(planar, width, height) {
            Ok(encoded) => encoded.data,
            Err(e) => {
                tracing::debug!(error = %e, "encode_planar produced no output");
                &[]
            }
        }
    }

    pub fn try_encode_planar(
        &mut self,
        planar: &[u8],
        width: u32,
        height: u32,
    ) -> Result<EncodedBitstream<'_>> {
        if !self.session.is_configured() {
            return Err(Error::EncoderNotInitialized);
        }

        let picture = PlanarLayout::new(width, height).view(planar)?;
        let bitstream = self.pool.buffer_mut(BufferKind::Bitstream);

        let mut assembler = BitstreamAssembler::new(bitstream);
        let frame = self.session.encode(&picture, &mut assembler)?;

        Ok(EncodedBitstream {
            data: bitstream.get(frame.size),
            kind: frame.kind,
        })
    }

    // ----- Decode -----

    /// Decode into a newly allocated RGBA frame the caller owns.
    ///
    /// Hand it back with `release_frame` (or just drop it).
    pub fn decode_to_packed(&mut self, slot: i32, bitstream: &[u8]) -> Option<PackedFrame> {
        self.try_decode_to_packed(slot, bitstream)
            .map_err(|e| tracing::debug!(slot, error = %e, "decode_to_packed produced no output"))
            .ok()
    }

    pub fn try_decode_to_packed(&mut self, slot: i32, bitstream: &[u8]) -> Result<PackedFrame> {
        let engine = self.slots.engine_mut(slot)?;
        let converter = &self.converter;

        let mut frame = None;
        let produced = engine.decode(bitstream, &mut |picture| {
            let res = picture.resolution();
            let len = res.rgba_len();
            let mut data = Vec::new();
            data.try_reserve_exact(len)
                .map_err(|_| Error::Allocation(len))?;
            data.resize(len, 0);
            converter.i420_to_rgba(picture, &mut data)?;

            frame = Some(PackedFrame {
                data,
                width: res.width,
                height: res.height,
            });
            Ok(())
        });

        self.record_decode(produced)?;
        frame.ok_or(Error::NoPicture)
    }

    /// Decode into a caller-owned RGBA buffer. Zeroed `FrameInfo` on failure.
    pub fn decode_to_packed_into(&mut self, slot: i32, bitstream: &[u8], dst: &mut [u8]) -> FrameInfo {
        self.try_decode_to_packed_into(slot, bitstream, dst)
            .unwrap_or_else(|e| {
                tracing::debug!(slot, error = %e, "decode_to_packed_into produced no output");
                FrameInfo::EMPTY
            })
    }

    pub fn try_decode_to_packed_into(
        &mut self,
        slot: i32,
        bitstream: &[u8],
        dst: &mut [u8],
    ) -> Result<FrameInfo> {
        let engine = self.slots.engine_mut(slot)?;
        let converter = &self.converter;

        let mut info = FrameInfo::EMPTY;
        let produced = engine.decode(bitstream, &mut |picture| {
            converter.i420_to_rgba(picture, dst)?;
            info = picture.resolution().into();
            Ok(())
        });

        self.record_decode(produced)?;
        Ok(info)
    }

    /// Decode into a caller-owned tight I420 buffer. Zeroed `FrameInfo` on failure.
    pub fn decode_to_planar_into(&mut self, slot: i32, bitstream: &[u8], dst: &mut [u8]) -> FrameInfo {
        self.try_decode_to_planar_into(slot, bitstream, dst)
            .unwrap_or_else(|e| {
                tracing::debug!(slot, error = %e, "decode_to_planar_into produced no output");
                FrameInfo::EMPTY
            })
    }

    pub fn try_decode_to_planar_into(
        &mut self,
        slot: i32,
        bitstream: &[u8],
        dst: &mut [u8],
    ) -> Result<FrameInfo> {
        let engine = self.slots.engine_mut(slot)?;
        let converter = &self.converter;

        let mut info = FrameInfo::EMPTY;
        let produced = engine.decode(bitstream, &mut |picture| {
            converter.pack_planar(picture, dst)?;
            info = picture.resolution().into();
            Ok(())
        });

        self.record_decode(produced)?;
        Ok(info)
    }

    /// Release a frame returned by `decode_to_packed`. `None` is a no-op.
    pub fn release_frame(&mut self, frame: Option<PackedFrame>) {
        if let Some(frame) = frame {
            tracing::trace!(bytes = frame.size_bytes(), "Released decoded frame");
        }
    }

    fn record_decode(&mut self, produced: Result<bool>) -> Result<()> {
        match produced {
            Ok(true) => {
                self.decode_stats.frames_decoded += 1;
                Ok(())
            }
            Ok(false) => {
                self.decode_stats.no_picture += 1;
                Err(Error::NoPicture)
            }
            Err(e) => {
                self.decode_stats.failures += 1;
                Err(e)
            }
        }
    }

    // ----- Introspection -----

    pub fn stats(&self) -> BridgeStats {
        BridgeStats {
            encoder: self.session.stats().clone(),
            decoder: self.decode_stats.clone(),
            planar_capacity: self.pool.capacity(BufferKind::Planar),
            bitstream_capacity: self.pool.capacity(BufferKind::Bitstream),
        }
    }

    pub fn backend(&self) -> &'static str {
        self.factory.name()
    }

    pub fn converter(&self) -> &ColorConverter {
        &self.converter
    }

    pub fn pool(&self) -> &ScratchBufferPool {
        &self.pool
    }

    pub fn slots(&self) -> &DecoderSlotTable {
        &self.slots
    }

    pub fn session(&self) -> &EncoderSession {
        &self.session
    }
}

impl std::fmt::Debug for FrameBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameBridge")
            .field("backend", &self.factory.name())
            .field("session", &self.session)
            .field("slots", &self.slots)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChromaSampling, ConversionPath};
    use crate::decode::SlotState;
    use crate::engine::testing::{self, LoopbackFactory};

    fn loopback_bridge(config: BridgeConfig) -> (FrameBridge, LoopbackFactory) {
        let factory = LoopbackFactory::new();
        let bridge = FrameBridge::with_factory(config, Box::new(factory.clone())).unwrap();
        (bridge, factory)
    }

    fn solid_rgba(width: u32, height: u32, r: u8, g: u8, b: u8) -> Vec<u8> {
        let mut data = Vec::new();
        for _ in 0..width * height {
            data.extend_from_slice(&[r, g, b, 255]);
        }
        data
    }

    #[test]
    fn test_encode_without_session_is_empty() {
        let (mut bridge, _) = loopback_bridge(BridgeConfig::default());
        let frame = solid_rgba(4, 2, 0, 0, 0);

        assert!(bridge.encode_packed(&frame, 4, 2).is_empty());
        assert!(bridge.encode_planar(&[16u8; 12], 4, 2).is_empty());
        assert_eq!(bridge.stats().planar_capacity, 0);
        bridge.request_key_frame();
    }

    #[test]
    fn test_white_frame_round_trip() {
        let (mut bridge, _) = loopback_bridge(BridgeConfig::default());
        assert!(bridge.configure_encoder(4, 2, 100_000));
        assert!(bridge.init_decoder_slot(0));

        let white = solid_rgba(4, 2, 255, 255, 255);
        let bitstream = bridge.encode_packed(&white, 4, 2).to_vec();
        assert!(!bitstream.is_empty());

        let frame = bridge.decode_to_packed(0, &bitstream).unwrap();
        assert_eq!((frame.width, frame.height), (4, 2));
        assert_eq!(frame.data.len(), 4 * 2 * 4);
        for px in frame.data.chunks_exact(4) {
            assert_eq!(px, &[255, 255, 255, 255]);
        }
        bridge.release_frame(Some(frame));
        bridge.release_frame(None);

        let mut planar = vec![0u8; 12];
        let info = bridge.decode_to_planar_into(0, &bitstream, &mut planar);
        assert_eq!(info, FrameInfo { width: 4, height: 2 });
        assert_eq!(&planar[..8], &[235; 8]);
        assert_eq!(&planar[8..], &[128; 4]);
    }

    #[test]
    fn test_packed_round_trip_into_caller_buffer() {
        let config = BridgeConfig::default()
            .with_conversion_path(ConversionPath::Direct)
            .with_chroma_sampling(ChromaSampling::BoxAverage);
        let (mut bridge, _) = loopback_bridge(config);
        bridge.configure_encoder(8, 4, 100_000);
        bridge.init_decoder_pool(2);

        let grey = solid_rgba(8, 4, 90, 90, 90);
        let bitstream = bridge.encode_packed(&grey, 8, 4).to_vec();

        let mut dst = vec![0u8; 8 * 4 * 4];
        let info = bridge.decode_to_packed_into(1, &bitstream, &mut dst);
        assert_eq!(info.resolution(), Resolution::new(8, 4));
        for px in dst.chunks_exact(4) {
            assert!((px[0] as i32 - 90).abs() <= 1, "got {}", px[0]);
            assert_eq!(px[0], px[1]);
            assert_eq!(px[1], px[2]);
            assert_eq!(px[3], 255);
        }

        // Too small a destination yields nothing
        let mut small = vec![0u8; 16];
        assert!(bridge.decode_to_packed_into(1, &bitstream, &mut small).is_empty());
        assert_eq!(bridge.stats().decoder.failures, 1);
    }

    #[test]
    fn test_key_frame_request() {
        let (mut bridge, _) = loopback_bridge(BridgeConfig::default());
        bridge.configure_encoder(4, 4, 100_000);
        let black = solid_rgba(4, 4, 0, 0, 0);

        assert!(testing::is_key(bridge.encode_packed(&black, 4, 4)));
        assert!(!testing::is_key(bridge.encode_packed(&black, 4, 4)));

        bridge.request_key_frame();
        let encoded = bridge.try_encode_packed(&black, 4, 4).unwrap();
        assert!(encoded.kind.is_key());
        assert!(testing::is_key(encoded.data));
        assert_eq!(bridge.stats().encoder.key_frames, 2);
    }

    #[test]
    fn test_staging_buffer_reused_across_frames() {
        let (mut bridge, _) = loopback_bridge(BridgeConfig::default());
        bridge.configure_encoder(16, 16, 100_000);
        let frame = solid_rgba(16, 16, 10, 20, 30);

        bridge.encode_packed(&frame, 16, 16);
        let planar_ptr = bridge.pool().buffer(BufferKind::Planar).as_ptr();
        let bitstream_ptr = bridge.pool().buffer(BufferKind::Bitstream).as_ptr();

        for _ in 0..5 {
            assert!(!bridge.encode_packed(&frame, 16, 16).is_empty());
        }
        // A smaller frame fits in the existing regions
        bridge.encode_packed(&solid_rgba(8, 8, 0, 0, 0), 8, 8);

        let pool = bridge.pool();
        assert_eq!(pool.buffer(BufferKind::Planar).as_ptr(), planar_ptr);
        assert_eq!(pool.buffer(BufferKind::Bitstream).as_ptr(), bitstream_ptr);
        assert_eq!(pool.buffer(BufferKind::Planar).reallocations(), 1);
        assert_eq!(pool.capacity(BufferKind::Planar), 16 * 16 * 3 / 2);
    }

    #[test]
    fn test_failed_submission_leaves_bitstream_buffer() {
        let factory = LoopbackFactory {
            fail_encodes: true,
            ..LoopbackFactory::new()
        };
        let mut bridge =
            FrameBridge::with_factory(BridgeConfig::default(), Box::new(factory)).unwrap();
        bridge.configure_encoder(4, 4, 100_000);

        assert!(bridge.encode_packed(&solid_rgba(4, 4, 1, 2, 3), 4, 4).is_empty());
        let stats = bridge.stats();
        assert_eq!(stats.bitstream_capacity, 0);
        assert_eq!(stats.planar_capacity, 24);
        assert_eq!(stats.encoder.frames_failed, 1);
    }

    #[test]
    fn test_encode_planar_submits_directly() {
        let (mut bridge, _) = loopback_bridge(BridgeConfig::default());
        bridge.configure_encoder(4, 2, 100_000);
        bridge.init_decoder_slot(0);

        let planar: Vec<u8> = (0..12).map(|i| 100 + i as u8).collect();
        let bitstream = bridge.encode_planar(&planar, 4, 2).to_vec();
        assert_eq!(bridge.stats().planar_capacity, 0);

        let mut back = vec![0u8; 12];
        bridge.decode_to_planar_into(0, &bitstream, &mut back);
        assert_eq!(back, planar);

        // Short planar input is rejected
        assert!(bridge.encode_planar(&planar[..11], 4, 2).is_empty());
    }

    #[test]
    fn test_decode_on_bad_slots() {
        let (mut bridge, _) = loopback_bridge(BridgeConfig::default());
        bridge.configure_encoder(4, 2, 100_000);
        let bitstream = bridge.encode_packed(&solid_rgba(4, 2, 0, 0, 0), 4, 2).to_vec();

        assert!(bridge.decode_to_packed(0, &bitstream).is_none());
        assert!(bridge.decode_to_packed(-1, &bitstream).is_none());
        assert!(bridge.decode_to_packed(32, &bitstream).is_none());
        assert!(!bridge.init_decoder_slot(-1));
        assert!(!bridge.init_decoder_slot(32));
        assert_eq!(bridge.slots().ready_count(), 0);

        let mut dst = vec![0u8; 32];
        assert_eq!(
            bridge.decode_to_packed_into(5, &bitstream, &mut dst),
            FrameInfo::EMPTY
        );
    }

    #[test]
    fn test_garbage_and_empty_input() {
        let (mut bridge, _) = loopback_bridge(BridgeConfig::default());
        assert!(bridge.init_decoder_slot(0));

        let garbage = [0x13u8, 0x37, 0xde, 0xad, 0xbe, 0xef, 0x00, 0x01, 0x02, 0x03];
        let mut dst = vec![0u8; 64];
        assert!(bridge.decode_to_packed_into(0, &garbage, &mut dst).is_empty());
        assert!(bridge.decode_to_packed(0, &[]).is_none());

        let stats = bridge.stats().decoder;
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.no_picture, 1);
        assert_eq!(stats.frames_decoded, 0);
    }

    #[test]
    fn test_deinit_twice() {
        let (mut bridge, factory) = loopback_bridge(BridgeConfig::default());
        bridge.init_decoder_slot(7);
        bridge.deinit_decoder_slot(7);
        bridge.deinit_decoder_slot(7);
        assert_eq!(bridge.slots().state(7), SlotState::Empty);
        assert_eq!(factory.counters.decoders_dropped.get(), 1);
    }

    #[test]
    fn test_bridge_from_config() {
        let config = BridgeConfig::default()
            .with_encoder(EncoderConfig::new(32, 32, 250_000).with_frame_rate(60.0))
            .with_decoder_slots(3);
        let (mut bridge, factory) = loopback_bridge(config);

        assert!(bridge.session().is_configured());
        assert_eq!(bridge.slots().ready_count(), 3);
        assert_eq!(factory.counters.decoders_created.get(), 3);

        // Reconfiguring by dimensions keeps the configured frame rate
        assert!(bridge.configure_encoder(64, 64, 100_000));
        assert_eq!(bridge.session().config().unwrap().max_frame_rate, 60.0);
        assert!(!bridge.configure_encoder(63, 64, 100_000));
        assert!(!bridge.session().is_configured());
    }
}
