//! Fixed-point BT.601 colorspace conversion
//!
//! Reference (per-pixel arithmetic) RGBA <-> I420 transforms, plus repacking
//! of strided planes into a tight I420 buffer. The table-driven variants in
//! `lut.rs` must produce the same bytes as these.

use crate::config::ChromaSampling;
use crate::error::{Error, Result};
use crate::types::{PlanarLayout, PlanarRef, Resolution, RGBA_BYTES_PER_PIXEL};

/// Saturate to a byte
#[inline(always)]
pub(crate) fn clamp8(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

#[inline(always)]
pub(crate) fn luma(r: i32, g: i32, b: i32) -> u8 {
    clamp8(((66 * r + 129 * g + 25 * b + 128) >> 8) + 16)
}

#[inline(always)]
pub(crate) fn chroma_u(r: i32, g: i32, b: i32) -> u8 {
    clamp8(((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128)
}

#[inline(always)]
pub(crate) fn chroma_v(r: i32, g: i32, b: i32) -> u8 {
    clamp8(((112 * r - 94 * g - 18 * b + 128) >> 8) + 128)
}

/// Check that an RGBA input covers the resolution
pub(crate) fn check_rgba(rgba: &[u8], res: Resolution) -> Result<()> {
    if res.is_empty() {
        return Err(Error::InvalidDimensions(format!("empty frame {}", res)));
    }
    let needed = res.rgba_len();
    if rgba.len() < needed {
        return Err(Error::BufferTooSmall {
            needed,
            actual: rgba.len(),
        });
    }
    Ok(())
}

/// RGB of the pixel at (row, col)
#[inline(always)]
pub(crate) fn rgb_at(rgba: &[u8], width: usize, row: usize, col: usize) -> (i32, i32, i32) {
    let i = (row * width + col) * RGBA_BYTES_PER_PIXEL;
    (rgba[i] as i32, rgba[i + 1] as i32, rgba[i + 2] as i32)
}

/// RGB used for the chroma sample of the 2x2 block whose top-left is (row, col)
#[inline]
pub(crate) fn block_rgb(
    rgba: &[u8],
    width: usize,
    height: usize,
    row: usize,
    col: usize,
    sampling: ChromaSampling,
) -> (i32, i32, i32) {
    match sampling {
        ChromaSampling::TopLeft => rgb_at(rgba, width, row, col),
        ChromaSampling::BoxAverage => {
            let (mut r, mut g, mut b, mut n) = (0, 0, 0, 0);
            for dr in 0..2 {
                for dc in 0..2 {
                    if row + dr < height && col + dc < width {
                        let (pr, pg, pb) = rgb_at(rgba, width, row + dr, col + dc);
                        r += pr;
                        g += pg;
                        b += pb;
                        n += 1;
                    }
                }
            }
            ((r + n / 2) / n, (g + n / 2) / n, (b + n / 2) / n)
        }
    }
}

/// Convert packed RGBA into a tight I420 buffer, one pixel at a time.
///
/// `out` must hold at least `PlanarLayout::total_len()` bytes.
pub fn rgba_to_i420(
    rgba: &[u8],
    res: Resolution,
    sampling: ChromaSampling,
    out: &mut [u8],
) -> Result<()> {
    check_rgba(rgba, res)?;
    let layout = PlanarLayout::new(res.width, res.height);
    let (y_plane, u_plane, v_plane) = layout.split_mut(out)?;

    let width = layout.width;
    let height = layout.height;
    let chroma_width = layout.chroma_width();

    for row in 0..height {
        for col in 0..width {
            let (r, g, b) = rgb_at(rgba, width, row, col);
            y_plane[row * width + col] = luma(r, g, b);

            if row % 2 == 0 && col % 2 == 0 {
                let (r, g, b) = block_rgb(rgba, width, height, row, col, sampling);
                let ci = (row / 2) * chroma_width + col / 2;
                u_plane[ci] = chroma_u(r, g, b);
                v_plane[ci] = chroma_v(r, g, b);
            }
        }
    }

    Ok(())
}

/// Convert a (possibly strided) I420 picture to packed RGBA.
///
/// Chroma is upsampled nearest-neighbour; alpha is always 255.
pub fn i420_to_rgba(picture: &PlanarRef<'_>, out: &mut [u8]) -> Result<()> {
    let res = picture.resolution();
    let needed = res.rgba_len();
    if out.len() < needed {
        return Err(Error::BufferTooSmall {
            needed,
            actual: out.len(),
        });
    }

    let (y_plane, u_plane, v_plane) = (picture.y(), picture.u(), picture.v());
    let y_stride = picture.y_stride();
    let uv_stride = picture.uv_stride();

    let mut px = out[..needed].chunks_exact_mut(RGBA_BYTES_PER_PIXEL);
    for row in 0..res.height as usize {
        for col in 0..res.width as usize {
            let ci = (row / 2) * uv_stride + col / 2;
            let c = 298 * (y_plane[row * y_stride + col] as i32 - 16);
            let d = u_plane[ci] as i32 - 128;
            let e = v_plane[ci] as i32 - 128;

            if let Some(dst) = px.next() {
                dst[0] = clamp8((c + 409 * e + 128) >> 8);
                dst[1] = clamp8((c - 100 * d - 208 * e + 128) >> 8);
                dst[2] = clamp8((c + 516 * d + 128) >> 8);
                dst[3] = 255;
            }
        }
    }

    Ok(())
}

/// Copy strided planes into a tight I420 buffer (no row padding)
pub fn pack_planar(picture: &PlanarRef<'_>, out: &mut [u8]) -> Result<()> {
    let layout = picture.layout();
    let (y_out, u_out, v_out) = layout.split_mut(out)?;

    copy_plane(picture.y(), picture.y_stride(), y_out, layout.width, layout.height);
    let (cw, ch) = (layout.chroma_width(), layout.chroma_height());
    copy_plane(picture.u(), picture.uv_stride(), u_out, cw, ch);
    copy_plane(picture.v(), picture.uv_stride(), v_out, cw, ch);

    Ok(())
}

fn copy_plane(src: &[u8], stride: usize, dst: &mut [u8], width: usize, height: usize) {
    for (row, dst_row) in dst.chunks_exact_mut(width).take(height).enumerate() {
        let start = row * stride;
        dst_row.copy_from_slice(&src[start..start + width]);
    }
}
