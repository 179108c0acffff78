//! Video processing module
//!
//! Provides the pixel-format transforms between packed RGBA and planar I420:
//! - Reference per-pixel conversion (`convert`)
//! - Table-driven conversion (`lut`), byte-identical to the reference
//! - Strided-to-tight planar repacking

pub mod convert;
pub mod lut;

pub use lut::ConversionTables;

use crate::config::{ChromaSampling, ConversionConfig, ConversionPath};
use crate::error::Result;
use crate::types::{PlanarRef, Resolution};
use std::cell::OnceCell;

/// Colorspace converter.
///
/// Holds the conversion settings and the lookup tables, which are built the
/// first time the table path runs and kept for the converter's lifetime.
#[derive(Default)]
pub struct ColorConverter {
    config: ConversionConfig,
    tables: OnceCell<Box<ConversionTables>>,
}

impl ColorConverter {
    pub fn new(config: ConversionConfig) -> Self {
        Self {
            config,
            tables: OnceCell::new(),
        }
    }

    pub fn config(&self) -> ConversionConfig {
        self.config
    }

    pub fn chroma_sampling(&self) -> ChromaSampling {
        self.config.chroma
    }

    /// Whether the lookup tables have been built yet
    pub fn tables_ready(&self) -> bool {
        self.tables.get().is_some()
    }

    fn tables(&self) -> &ConversionTables {
        self.tables.get_or_init(|| {
            tracing::debug!("Building colorspace lookup tables");
            Box::new(ConversionTables::new())
        })
    }

    /// Packed RGBA -> tight I420 (`out` sized by `PlanarLayout::total_len`)
    pub fn rgba_to_i420(&self, rgba: &[u8], res: Resolution, out: &mut [u8]) -> Result<()> {
        match self.config.path {
            ConversionPath::Direct => convert::rgba_to_i420(rgba, res, self.config.chroma, out),
            ConversionPath::Table => {
                lut::rgba_to_i420(self.tables(), rgba, res, self.config.chroma, out)
            }
        }
    }

    /// Strided I420 -> packed RGBA
    pub fn i420_to_rgba(&self, picture: &PlanarRef<'_>, out: &mut [u8]) -> Result<()> {
        match self.config.path {
            ConversionPath::Direct => convert::i420_to_rgba(picture, out),
            ConversionPath::Table => lut::i420_to_rgba(self.tables(), picture, out),
        }
    }

    /// Strided I420 -> tight I420
    pub fn pack_planar(&self, picture: &PlanarRef<'_>, out: &mut [u8]) -> Result<()> {
        convert::pack_planar(picture, out)
    }
}
