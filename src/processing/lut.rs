//! Table-driven colorspace conversion
//!
//! Same fixed-point math as `convert.rs`, with every per-channel product
//! looked up from 256-entry tables. Output is byte-identical to the
//! reference path for both chroma sampling modes.

use super::convert::{block_rgb, check_rgba, clamp8, rgb_at};
use crate::config::ChromaSampling;
use crate::error::{Error, Result};
use crate::types::{PlanarLayout, PlanarRef, Resolution, RGBA_BYTES_PER_PIXEL};

type Table = [i32; 256];

fn table(f: impl Fn(i32) -> i32) -> Table {
    std::array::from_fn(|v| f(v as i32))
}

/// Precomputed coefficient products for both conversion directions
pub struct ConversionTables {
    // RGBA -> I420
    y_r: Table,
    y_g: Table,
    y_b: Table,
    u_r: Table,
    u_g: Table,
    u_b: Table,
    v_r: Table,
    v_g: Table,
    v_b: Table,
    // I420 -> RGBA
    luma: Table,
    r_v: Table,
    g_u: Table,
    g_v: Table,
    b_u: Table,
}

impl ConversionTables {
    pub fn new() -> Self {
        Self {
            y_r: table(|v| 66 * v),
            y_g: table(|v| 129 * v),
            y_b: table(|v| 25 * v),
            u_r: table(|v| -38 * v),
            u_g: table(|v| -74 * v),
            u_b: table(|v| 112 * v),
            v_r: table(|v| 112 * v),
            v_g: table(|v| -94 * v),
            v_b: table(|v| -18 * v),
            luma: table(|v| 298 * (v - 16)),
            r_v: table(|v| 409 * (v - 128)),
            g_u: table(|v| 100 * (v - 128)),
            g_v: table(|v| 208 * (v - 128)),
            b_u: table(|v| 516 * (v - 128)),
        }
    }

    #[inline(always)]
    fn y(&self, r: usize, g: usize, b: usize) -> u8 {
        clamp8(((self.y_r[r] + self.y_g[g] + self.y_b[b] + 128) >> 8) + 16)
    }

    #[inline(always)]
    fn u(&self, r: usize, g: usize, b: usize) -> u8 {
        clamp8(((self.u_r[r] + self.u_g[g] + self.u_b[b] + 128) >> 8) + 128)
    }

    #[inline(always)]
    fn v(&self, r: usize, g: usize, b: usize) -> u8 {
        clamp8(((self.v_r[r] + self.v_g[g] + self.v_b[b] + 128) >> 8) + 128)
    }
}

impl Default for ConversionTables {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert packed RGBA into a tight I420 buffer, walking 2x2 blocks.
///
/// Trailing odd rows/columns are handled by skipping the missing pixels.
pub fn rgba_to_i420(
    tables: &ConversionTables,
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

    for row in (0..height).step_by(2) {
        for col in (0..width).step_by(2) {
            for dr in 0..2 {
                let r_row = row + dr;
                if r_row >= height {
                    break;
                }
                for dc in 0..2 {
                    let c_col = col + dc;
                    if c_col >= width {
                        break;
                    }
                    let i = (r_row * width + c_col) * RGBA_BYTES_PER_PIXEL;
                    y_plane[r_row * width + c_col] = tables.y(
                        rgba[i] as usize,
                        rgba[i + 1] as usize,
                        rgba[i + 2] as usize,
                    );
                }
            }

            let (r, g, b) = match sampling {
                ChromaSampling::TopLeft => rgb_at(rgba, width, row, col),
                ChromaSampling::BoxAverage => block_rgb(rgba, width, height, row, col, sampling),
            };
            let ci = (row / 2) * chroma_width + col / 2;
            u_plane[ci] = tables.u(r as usize, g as usize, b as usize);
            v_plane[ci] = tables.v(r as usize, g as usize, b as usize);
        }
    }

    Ok(())
}

/// Convert a (possibly strided) I420 picture to packed RGBA via tables
pub fn i420_to_rgba(
    tables: &ConversionTables,
    picture: &PlanarRef<'_>,
    out: &mut [u8],
) -> Result<()> {
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
    let width = res.width as usize;

    for (row, dst_row) in out[..needed]
        .chunks_exact_mut(width * RGBA_BYTES_PER_PIXEL)
        .enumerate()
    {
        let y_row = &y_plane[row * y_stride..row * y_stride + width];
        let uv_start = (row / 2) * uv_stride;

        for (col, dst) in dst_row.chunks_exact_mut(RGBA_BYTES_PER_PIXEL).enumerate() {
            let u = u_plane[uv_start + col / 2] as usize;
            let v = v_plane[uv_start + col / 2] as usize;
            let c = tables.luma[y_row[col] as usize];

            dst[0] = clamp8((c + tables.r_v[v] + 128) >> 8);
            dst[1] = clamp8((c - tables.g_u[u] - tables.g_v[v] + 128) >> 8);
            dst[2] = clamp8((c + tables.b_u[u] + 128) >> 8);
            dst[3] = 255;
        }
    }

    Ok(())
}
