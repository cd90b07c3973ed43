//! Texture resource compiler
//!
//! An upload converts caller pixels into the GPU's texel layout in one
//! pass: format conversion into a linear staging image, box-filtered mip
//! generation down to 1x1, and per-level swizzling into a single contiguous
//! allocation. Extents must be powers of two; the full chain is always
//! generated so any min filter is valid.

use pyrite_core::{GlError, Result};
use pyrite_hw::{swizzle, AddressSpace};
use tracing::debug;

use crate::objects::TextureObject;
use crate::types::BaseFormat;

/// Mip level count for a base level of `2^width_shift` x `2^height_shift`.
pub fn mip_levels(width_shift: u32, height_shift: u32) -> u32 {
    width_shift.max(height_shift) + 1
}

/// Total bytes of the full mip chain, each level's extents clamped to 1.
pub fn mip_chain_bytes(width: u32, height: u32, bytes_per_pixel: usize) -> usize {
    let levels = mip_levels(width.trailing_zeros(), height.trailing_zeros());
    (0..levels)
        .map(|level| {
            let w = (width >> level).max(1) as usize;
            let h = (height >> level).max(1) as usize;
            w * h * bytes_per_pixel
        })
        .sum()
}

fn log2_extent(extent: u32) -> Result<u32> {
    if extent == 0 || !extent.is_power_of_two() {
        return Err(GlError::NonPowerOfTwo(extent));
    }
    Ok(extent.trailing_zeros())
}

/// Convert one source row into GPU texels.
///
/// RGB is widened to a padded 4-byte texel with the channels reordered to
/// the rasterizer's B, G, R, X layout; the pad byte reads back as opaque.
/// The other formats are stored as given.
fn convert_row(format: BaseFormat, src: &[u8], dst: &mut [u8], width: usize) {
    match format {
        BaseFormat::Rgb => {
            for x in 0..width {
                let s = &src[x * 3..x * 3 + 3];
                let d = &mut dst[x * 4..x * 4 + 4];
                d[0] = s[2];
                d[1] = s[1];
                d[2] = s[0];
                d[3] = 0xFF;
            }
        }
        _ => {
            let bpp = format.bytes_per_pixel();
            dst[..width * bpp].copy_from_slice(&src[..width * bpp]);
        }
    }
}

/// Average a 2x2 texel quad per channel, writing the half-resolution image
/// over the front of `pixels`.
fn downsample_in_place(
    pixels: &mut [u8],
    src_width: usize,
    src_height: usize,
    src_pitch: usize,
    bytes_per_pixel: usize,
) {
    let dst_width = (src_width / 2).max(1);
    let dst_height = (src_height / 2).max(1);
    let dst_pitch = dst_width * bytes_per_pixel;
    // quad steps collapse to single-texel steps on a degenerate axis
    let x_step = if src_width > 1 { 2 } else { 1 };
    let y_step = if src_height > 1 { 2 } else { 1 };
    for y in 0..dst_height {
        for x in 0..dst_width {
            for c in 0..bytes_per_pixel {
                let s00 = pixels[y * y_step * src_pitch + x * x_step * bytes_per_pixel + c];
                let s01 = pixels[y * y_step * src_pitch
                    + (x * x_step + x_step - 1) * bytes_per_pixel
                    + c];
                let s10 = pixels[(y * y_step + y_step - 1) * src_pitch
                    + x * x_step * bytes_per_pixel
                    + c];
                let s11 = pixels[(y * y_step + y_step - 1) * src_pitch
                    + (x * x_step + x_step - 1) * bytes_per_pixel
                    + c];
                let sum = s00 as u32 + s01 as u32 + s10 as u32 + s11 as u32;
                pixels[y * dst_pitch + x * bytes_per_pixel + c] = (sum / 4) as u8;
            }
        }
    }
}

/// Compile caller pixels into the texture object's GPU image.
///
/// `pixels` is tightly packed `width * height` rows in the source layout of
/// `format`. On success the object holds the swizzled full mip chain and a
/// fresh GPU address.
pub fn upload(
    space: &mut AddressSpace,
    tx: &mut TextureObject,
    width: u32,
    height: u32,
    format: BaseFormat,
    pixels: &[u8],
) -> Result<()> {
    let width_shift = log2_extent(width)?;
    let height_shift = log2_extent(height)?;

    let src_bpp = format.source_bytes_per_pixel();
    let needed = width as usize * height as usize * src_bpp;
    if pixels.len() < needed {
        return Err(GlError::ArrayOutOfBounds { needed, size: pixels.len() });
    }

    let bpp = format.bytes_per_pixel();
    let levels = mip_levels(width_shift, height_shift);
    let total = mip_chain_bytes(width, height, bpp);

    // linear staging image, reused as the downsample scratch
    let mut staging = vec![0u8; width as usize * height as usize * bpp];
    for y in 0..height as usize {
        convert_row(
            format,
            &pixels[y * width as usize * src_bpp..],
            &mut staging[y * width as usize * bpp..],
            width as usize,
        );
    }

    let mut data = vec![0u8; total];
    let mut offset = 0usize;
    let (mut w, mut h) = (width as usize, height as usize);
    for level in 0..levels {
        let level_bytes = w * h * bpp;
        swizzle::swizzle_rect(
            &staging,
            w as u32,
            h as u32,
            &mut data[offset..offset + level_bytes],
            w * bpp,
            bpp,
        );
        offset += level_bytes;
        if level + 1 < levels {
            downsample_in_place(&mut staging, w, h, w * bpp, bpp);
            w = (w / 2).max(1);
            h = (h / 2).max(1);
        }
    }

    tx.gpu_addr = space.alloc(total, 64)?;
    tx.width = width;
    tx.height = height;
    tx.width_shift = width_shift;
    tx.height_shift = height_shift;
    tx.pitch = width as usize * bpp;
    tx.format = format;
    tx.mip_levels = levels;
    tx.data = data;
    debug!(width, height, ?format, levels, total, "texture uploaded");
    Ok(())
}
