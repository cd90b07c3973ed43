//! Tiled (swizzled) texture layout
//!
//! Texture levels live in GPU memory with their texel address bits
//! interleaved: the low bits of x and y alternate (Morton order) for as many
//! bits as the smaller extent provides, and the remaining bits of the longer
//! axis are appended above them. Both extents must be powers of two.

/// Swizzled texel index for `(x, y)` in a `2^log2_width` by `2^log2_height`
/// level.
pub fn swizzle_offset(x: u32, y: u32, log2_width: u32, log2_height: u32) -> u32 {
    let shared = log2_width.min(log2_height);
    let mut offset = 0u32;
    for bit in 0..shared {
        offset |= ((x >> bit) & 1) << (2 * bit);
        offset |= ((y >> bit) & 1) << (2 * bit + 1);
    }
    let rest = if log2_width > log2_height {
        x >> shared
    } else {
        y >> shared
    };
    offset | (rest << (2 * shared))
}

/// Copy a linear `width` x `height` image into swizzled order.
///
/// `src` is read with `src_pitch` bytes per row; `dst` must hold
/// `width * height * bytes_per_pixel` bytes. Extents must be powers of two;
/// callers validate before uploading.
pub fn swizzle_rect(
    src: &[u8],
    width: u32,
    height: u32,
    dst: &mut [u8],
    src_pitch: usize,
    bytes_per_pixel: usize,
) {
    debug_assert!(width.is_power_of_two() && height.is_power_of_two());
    let log2_width = width.trailing_zeros();
    let log2_height = height.trailing_zeros();
    for y in 0..height {
        for x in 0..width {
            let src_at = y as usize * src_pitch + x as usize * bytes_per_pixel;
            let dst_at =
                swizzle_offset(x, y, log2_width, log2_height) as usize * bytes_per_pixel;
            dst[dst_at..dst_at + bytes_per_pixel]
                .copy_from_slice(&src[src_at..src_at + bytes_per_pixel]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_interleave() {
        // 4x4: bit pattern y1 x1 y0 x0
        assert_eq!(swizzle_offset(0, 0, 2, 2), 0);
        assert_eq!(swizzle_offset(1, 0, 2, 2), 1);
        assert_eq!(swizzle_offset(0, 1, 2, 2), 2);
        assert_eq!(swizzle_offset(3, 3, 2, 2), 15);
        assert_eq!(swizzle_offset(2, 1, 2, 2), 0b0110);
    }

    #[test]
    fn test_rect_appends_high_bits() {
        // 8x2: one shared bit, x's high bits ride above the interleave
        assert_eq!(swizzle_offset(1, 0, 3, 1), 1);
        assert_eq!(swizzle_offset(0, 1, 3, 1), 2);
        assert_eq!(swizzle_offset(2, 0, 3, 1), 4);
        assert_eq!(swizzle_offset(7, 1, 3, 1), 0b1111);
    }

    #[test]
    fn test_offset_is_a_bijection() {
        let (w, h) = (8u32, 4u32);
        let mut seen = vec![false; (w * h) as usize];
        for y in 0..h {
            for x in 0..w {
                let at = swizzle_offset(x, y, 3, 2) as usize;
                assert!(at < seen.len());
                assert!(!seen[at], "collision at ({x},{y})");
                seen[at] = true;
            }
        }
    }

    #[test]
    fn test_swizzle_rect_moves_texels() {
        // 2x2 single-byte texels laid out linearly 0..4
        let src = [10u8, 11, 12, 13];
        let mut dst = [0u8; 4];
        swizzle_rect(&src, 2, 2, &mut dst, 2, 1);
        assert_eq!(dst, [10, 11, 12, 13]);

        // 4x1: degenerate interleave is the identity as well
        let src = [1u8, 2, 3, 4];
        let mut dst = [0u8; 4];
        swizzle_rect(&src, 4, 1, &mut dst, 4, 1);
        assert_eq!(dst, [1, 2, 3, 4]);
    }

    #[test]
    fn test_swizzle_rect_4x4() {
        let mut src = [0u8; 16];
        for (i, t) in src.iter_mut().enumerate() {
            *t = i as u8;
        }
        let mut dst = [0u8; 16];
        swizzle_rect(&src, 4, 4, &mut dst, 4, 1);
        // texel (2,2) -> y1 x1 y0 x0 = 0b1100
        assert_eq!(dst[0b1100], 10);
        // texel (3,0) -> 0b0101
        assert_eq!(dst[0b0101], 3);
    }
}
