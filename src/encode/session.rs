//! Single outbound encoder session

use crate::buffer::BitstreamAssembler;
use crate::config::EncoderConfig;
use crate::engine::{EncodeEngine, EncodedFrame, EngineFactory};
use crate::error::{Error, Result};
use crate::types::PlanarRef;

use super::EncoderStats;

struct ActiveEncoder {
    engine: Box<dyn EncodeEngine>,
    config: EncoderConfig,
}

/// The one live compression-engine instance.
///
/// Reconfiguring always tears down and recreates; the engine is never
/// mutated in place.
#[derive(Default)]
pub struct EncoderSession {
    active: Option<ActiveEncoder>,
    stats: EncoderStats,
}

impl EncoderSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the session with one at the given resolution and bitrate.
    ///
    /// Any failure leaves no session at all.
    pub fn configure(&mut self, factory: &dyn EngineFactory, config: EncoderConfig) -> Result<()> {
        self.teardown();
        config.validate()?;

        let engine = factory.create_encoder(&config).map_err(|e| {
            tracing::warn!(error = %e, "Failed to create encoder");
            e
        })?;

        tracing::info!(
            width = config.width,
            height = config.height,
            bitrate = config.bitrate_bps,
            backend = factory.name(),
            "Encoder session configured"
        );

        self.active = Some(ActiveEncoder { engine, config });
        self.stats = EncoderStats::default();
        Ok(())
    }

    /// Drop the current session, if any
    pub fn teardown(&mut self) {
        if self.active.take().is_some() {
            tracing::debug!("Encoder session torn down");
        }
    }

    pub fn is_configured(&self) -> bool {
        self.active.is_some()
    }

    pub fn config(&self) -> Option<&EncoderConfig> {
        self.active.as_ref().map(|a| &a.config)
    }

    /// Make the next encoded frame a key frame. Returns false without a session.
    pub fn request_key_frame(&mut self) -> bool {
        match &mut self.active {
            Some(active) => {
                active.engine.force_key_frame();
                self.stats.key_frames_requested += 1;
                tracing::debug!("Key frame requested");
                true
            }
            None => false,
        }
    }

    /// Submit one picture to the engine
    pub fn encode(
        &mut self,
        picture: &PlanarRef<'_>,
        out: &mut BitstreamAssembler<'_>,
    ) -> Result<EncodedFrame> {
        let active = self.active.as_mut().ok_or(Error::EncoderNotInitialized)?;

        match active.engine.encode(picture, out) {
            Ok(frame) => {
                self.stats.frames_encoded += 1;
                self.stats.bytes_output += frame.size as u64;
                if frame.kind.is_key() {
                    self.stats.key_frames += 1;
                }
                tracing::trace!(size = frame.size, kind = ?frame.kind, "Encoded frame");
                Ok(frame)
            }
            Err(e) => {
                self.stats.frames_failed += 1;
                tracing::warn!(error = %e, "Encode failed");
                Err(e)
            }
        }
    }

    pub fn stats(&self) -> &EncoderStats {
        &self.stats
    }
}

impl std::fmt::Debug for EncoderSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncoderSession")
            .field("config", &self.config())
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::ScratchBuffer;
    use crate::engine::testing::LoopbackFactory;
    use crate::types::PlanarLayout;

    #[test]
    fn test_unconfigured_session() {
        let mut session = EncoderSession::new();
        assert!(!session.is_configured());
        assert!(!session.request_key_frame());

        let planes = vec![0u8; 6];
        let pic = PlanarLayout::new(2, 2).view(&planes).unwrap();
        let mut buf = ScratchBuffer::new();
        let mut out = BitstreamAssembler::new(&mut buf);
        assert!(matches!(
            session.encode(&pic, &mut out),
            Err(Error::EncoderNotInitialized)
        ));
    }

    #[test]
    fn test_reconfigure_recreates_engine() {
        let factory = LoopbackFactory::new();
        let mut session = EncoderSession::new();

        session.configure(&factory, EncoderConfig::new(64, 64, 100_000)).unwrap();
        session.configure(&factory, EncoderConfig::new(128, 96, 200_000)).unwrap();

        assert_eq!(factory.counters.encoders_created.get(), 2);
        assert_eq!(session.config().unwrap().width, 128);
        assert!(session.request_key_frame());
        assert_eq!(session.stats().key_frames_requested, 1);
    }

    #[test]
    fn test_failed_configure_leaves_no_session() {
        let good = LoopbackFactory::new();
        let bad = LoopbackFactory {
            fail_encoder: true,
            ..LoopbackFactory::new()
        };
        let mut session = EncoderSession::new();
        session.configure(&good, EncoderConfig::new(64, 64, 100_000)).unwrap();

        assert!(session.configure(&bad, EncoderConfig::new(64, 64, 100_000)).is_err());
        assert!(!session.is_configured());

        // Invalid parameters never reach the factory
        assert!(matches!(
            session.configure(&good, EncoderConfig::new(65, 64, 100_000)),
            Err(Error::InvalidEncoderConfig(_))
        ));
        assert!(!session.is_configured());
        assert_eq!(good.counters.encoders_created.get(), 1);
    }
}
