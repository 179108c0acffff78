//! Common types used throughout FrameBridge

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Bytes per pixel of a packed RGBA frame
pub const RGBA_BYTES_PER_PIXEL: usize = 4;

/// Video resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub const VGA: Self = Self::new(640, 480);
    pub const HD_720P: Self = Self::new(1280, 720);
    pub const FHD_1080P: Self = Self::new(1920, 1080);

    /// Calculate total pixels
    pub fn pixels(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Both dimensions non-zero
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Both dimensions even, as 2x2 chroma blocks require for encoding
    pub fn is_even(&self) -> bool {
        self.width % 2 == 0 && self.height % 2 == 0
    }

    /// Size of a packed RGBA frame at this resolution
    pub fn rgba_len(&self) -> usize {
        self.pixels() * RGBA_BYTES_PER_PIXEL
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Kind of picture the encoder produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Full frame, decodable without references (IDR)
    Key,
    /// Predicted from earlier frames
    Predicted,
    /// Encoder dropped the frame (rate control)
    Skipped,
}

impl FrameKind {
    pub fn is_key(&self) -> bool {
        matches!(self, FrameKind::Key)
    }
}

/// Dimensions of a decoded frame. Zeroed when nothing was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameInfo {
    pub width: u32,
    pub height: u32,
}

impl FrameInfo {
    /// The "no output" value
    pub const EMPTY: Self = Self { width: 0, height: 0 };

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }
}

impl From<Resolution> for FrameInfo {
    fn from(res: Resolution) -> Self {
        Self {
            width: res.width,
            height: res.height,
        }
    }
}

/// An owned, packed RGBA frame handed to the caller
#[derive(Debug, Clone)]
pub struct PackedFrame {
    /// RGBA bytes, row-major, `width * height * 4` long
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl PackedFrame {
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    /// Calculate frame size in bytes
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }
}

/// Plane sizes of a tightly packed I420 buffer (Y, then U, then V, no padding)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanarLayout {
    pub width: usize,
    pub height: usize,
}

impl PlanarLayout {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width as usize,
            height: height as usize,
        }
    }

    /// Chroma plane width, rounded up for odd widths
    pub fn chroma_width(&self) -> usize {
        self.width.div_ceil(2)
    }

    /// Chroma plane height, rounded up for odd heights
    pub fn chroma_height(&self) -> usize {
        self.height.div_ceil(2)
    }

    pub fn y_len(&self) -> usize {
        self.width * self.height
    }

    pub fn chroma_len(&self) -> usize {
        self.chroma_width() * self.chroma_height()
    }

    /// Total bytes; `width * height * 3 / 2` for even dimensions
    pub fn total_len(&self) -> usize {
        self.y_len() + 2 * self.chroma_len()
    }

    /// Split a tight buffer into its Y, U and V planes
    pub fn split<'a>(&self, data: &'a [u8]) -> Result<(&'a [u8], &'a [u8], &'a [u8])> {
        self.check_len(data.len())?;
        let (y, rest) = data.split_at(self.y_len());
        let (u, rest) = rest.split_at(self.chroma_len());
        Ok((y, u, &rest[..self.chroma_len()]))
    }

    /// Split a tight buffer into mutable Y, U and V planes
    pub fn split_mut<'a>(
        &self,
        data: &'a mut [u8],
    ) -> Result<(&'a mut [u8], &'a mut [u8], &'a mut [u8])> {
        self.check_len(data.len())?;
        let chroma = self.chroma_len();
        let (y, rest) = data.split_at_mut(self.y_len());
        let (u, rest) = rest.split_at_mut(chroma);
        Ok((y, u, &mut rest[..chroma]))
    }

    /// Borrow a tight buffer as a planar picture
    pub fn view<'a>(&self, data: &'a [u8]) -> Result<PlanarRef<'a>> {
        let (y, u, v) = self.split(data)?;
        PlanarRef::new(
            y,
            u,
            v,
            Resolution::new(self.width as u32, self.height as u32),
            self.width,
            self.chroma_width(),
        )
    }

    fn check_len(&self, actual: usize) -> Result<()> {
        let needed = self.total_len();
        if actual < needed {
            return Err(Error::BufferTooSmall { needed, actual });
        }
        Ok(())
    }
}

/// Borrowed I420 picture with independent row strides.
///
/// Construction checks that every plane is long enough for its stride and
/// height, so converters can index without further bounds reasoning.
#[derive(Debug, Clone, Copy)]
pub struct PlanarRef<'a> {
    y: &'a [u8],
    u: &'a [u8],
    v: &'a [u8],
    resolution: Resolution,
    y_stride: usize,
    uv_stride: usize,
}

impl<'a> PlanarRef<'a> {
    pub fn new(
        y: &'a [u8],
        u: &'a [u8],
        v: &'a [u8],
        resolution: Resolution,
        y_stride: usize,
        uv_stride: usize,
    ) -> Result<Self> {
        if resolution.is_empty() {
            return Err(Error::InvalidDimensions(format!(
                "empty picture {}",
                resolution
            )));
        }

        let width = resolution.width as usize;
        let height = resolution.height as usize;
        let chroma_width = width.div_ceil(2);
        let chroma_height = height.div_ceil(2);

        if y_stride < width || uv_stride < chroma_width {
            return Err(Error::InvalidDimensions(format!(
                "strides {}/{} narrower than {}",
                y_stride, uv_stride, resolution
            )));
        }

        let y_needed = y_stride * (height - 1) + width;
        let uv_needed = uv_stride * (chroma_height - 1) + chroma_width;
        if y.len() < y_needed {
            return Err(Error::BufferTooSmall {
                needed: y_needed,
                actual: y.len(),
            });
        }
        if u.len() < uv_needed || v.len() < uv_needed {
            return Err(Error::BufferTooSmall {
                needed: uv_needed,
                actual: u.len().min(v.len()),
            });
        }

        Ok(Self {
            y,
            u,
            v,
            resolution,
            y_stride,
            uv_stride,
        })
    }

    pub fn y(&self) -> &'a [u8] {
        self.y
    }

    pub fn u(&self) -> &'a [u8] {
        self.u
    }

    pub fn v(&self) -> &'a [u8] {
        self.v
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn y_stride(&self) -> usize {
        self.y_stride
    }

    pub fn uv_stride(&self) -> usize {
        self.uv_stride
    }

    pub fn layout(&self) -> PlanarLayout {
        PlanarLayout::new(self.resolution.width, self.resolution.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_sizes() {
        let layout = PlanarLayout::new(64, 48);
        assert_eq!(layout.y_len(), 64 * 48);
        assert_eq!(layout.chroma_len(), 32 * 24);
        assert_eq!(layout.total_len(), 64 * 48 * 3 / 2);

        // Odd dimensions round the chroma planes up
        let odd = PlanarLayout::new(5, 3);
        assert_eq!(odd.chroma_width(), 3);
        assert_eq!(odd.chroma_height(), 2);
        assert_eq!(odd.total_len(), 15 + 2 * 6);
    }

    #[test]
    fn test_layout_split_rejects_short_buffer() {
        let layout = PlanarLayout::new(4, 4);
        let data = vec![0u8; layout.total_len() - 1];
        assert!(matches!(
            layout.split(&data),
            Err(Error::BufferTooSmall { needed: 24, actual: 23 })
        ));
    }

    #[test]
    fn test_planar_ref_accepts_padded_strides() {
        // 4x2 picture stored with 8-byte luma rows and 4-byte chroma rows
        let y = vec![0u8; 8 + 4];
        let u = vec![0u8; 2];
        let v = vec![0u8; 2];
        let pic = PlanarRef::new(&y, &u, &v, Resolution::new(4, 2), 8, 4).unwrap();
        assert_eq!(pic.y_stride(), 8);
        assert_eq!(pic.uv_stride(), 4);
    }

    #[test]
    fn test_planar_ref_rejects_narrow_stride() {
        let y = vec![0u8; 64];
        let u = vec![0u8; 16];
        let v = vec![0u8; 16];
        assert!(PlanarRef::new(&y, &u, &v, Resolution::new(8, 8), 4, 4).is_err());
        assert!(PlanarRef::new(&y, &u, &v, Resolution::new(0, 8), 8, 4).is_err());
    }

    #[test]
    fn test_frame_info_empty() {
        assert!(FrameInfo::EMPTY.is_empty());
        assert!(!FrameInfo::from(Resolution::new(2, 2)).is_empty());
        assert_eq!(Resolution::new(4, 2).rgba_len(), 32);
    }
}
