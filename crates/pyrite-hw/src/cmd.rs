//! GPU method table and register field encodings
//!
//! Methods are 32-bit addresses in the rasterizer's register file, written
//! one data word at a time through the push buffer. Multi-word registers
//! (colors, vectors, matrices) occupy consecutive addresses in 4-byte steps.
//! The packers below build the bitfield words for the registers that are not
//! plain floats or booleans.

use bitflags::bitflags;

// Surface and clear state
pub const CLEAR_SURFACE: u32 = 0x0100;
pub const SET_COLOR_CLEAR_VALUE: u32 = 0x0104;
pub const SET_ZSTENCIL_CLEAR_VALUE: u32 = 0x0108;
pub const SET_CLEAR_RECT_HORIZONTAL: u32 = 0x010C;
pub const SET_CLEAR_RECT_VERTICAL: u32 = 0x0110;
pub const SET_COLOR_MASK: u32 = 0x0114;

// Fragment and raster tests
pub const SET_ALPHA_TEST_ENABLE: u32 = 0x0200;
pub const SET_ALPHA_FUNC: u32 = 0x0204;
pub const SET_ALPHA_REF: u32 = 0x0208;
pub const SET_BLEND_ENABLE: u32 = 0x020C;
pub const SET_BLEND_FUNC_SFACTOR: u32 = 0x0210;
pub const SET_BLEND_FUNC_DFACTOR: u32 = 0x0214;
pub const SET_DEPTH_TEST_ENABLE: u32 = 0x0218;
pub const SET_DEPTH_FUNC: u32 = 0x021C;
pub const SET_DEPTH_MASK: u32 = 0x0220;
pub const SET_STENCIL_TEST_ENABLE: u32 = 0x0224;
pub const SET_STENCIL_FUNC: u32 = 0x0228;
pub const SET_STENCIL_FUNC_REF: u32 = 0x022C;
pub const SET_STENCIL_FUNC_MASK: u32 = 0x0230;
pub const SET_STENCIL_OP_FAIL: u32 = 0x0234;
pub const SET_STENCIL_OP_ZFAIL: u32 = 0x0238;
pub const SET_STENCIL_OP_ZPASS: u32 = 0x023C;
pub const SET_STENCIL_MASK: u32 = 0x0240;
pub const SET_CULL_FACE_ENABLE: u32 = 0x0244;
pub const SET_CULL_FACE: u32 = 0x0248;
pub const SET_FRONT_FACE: u32 = 0x024C;
pub const SET_NORMALIZATION_ENABLE: u32 = 0x0250;
pub const SET_POLY_OFFSET_FILL_ENABLE: u32 = 0x0254;
pub const SET_POLYGON_OFFSET_FACTOR: u32 = 0x0258;
pub const SET_POLYGON_OFFSET_UNITS: u32 = 0x025C;
pub const SET_POINT_SIZE: u32 = 0x0260;
pub const SET_POINT_SPRITE_ENABLE: u32 = 0x0264;

// Lighting
pub const SET_LIGHTING_ENABLE: u32 = 0x0300;
pub const SET_TWO_SIDE_LIGHT_ENABLE: u32 = 0x0304;
pub const SET_LIGHT_CONTROL: u32 = 0x0308;
pub const SET_COLOR_MATERIAL: u32 = 0x030C;
pub const SET_SCENE_AMBIENT_COLOR: u32 = 0x0310; // 3 words
pub const SET_BACK_SCENE_AMBIENT_COLOR: u32 = 0x031C; // 3 words
pub const SET_MATERIAL_EMISSION: u32 = 0x0328; // 3 words
pub const SET_BACK_MATERIAL_EMISSION: u32 = 0x0334; // 3 words
pub const SET_MATERIAL_ALPHA: u32 = 0x0340;
pub const SET_BACK_MATERIAL_ALPHA: u32 = 0x0344;
pub const SET_SPECULAR_EXPONENT: u32 = 0x0348;
pub const SET_BACK_SPECULAR_EXPONENT: u32 = 0x034C;
pub const SET_LIGHT_ENABLE_MASK: u32 = 0x0350;

// Per-light register block, 3 words per color / vector unless noted
pub const LIGHT_BLOCK_BASE: u32 = 0x0400;
pub const LIGHT_BLOCK_STRIDE: u32 = 0x80;
pub const LIGHT_AMBIENT_COLOR: u32 = 0x00;
pub const LIGHT_DIFFUSE_COLOR: u32 = 0x0C;
pub const LIGHT_SPECULAR_COLOR: u32 = 0x18;
pub const LIGHT_BACK_AMBIENT_COLOR: u32 = 0x24;
pub const LIGHT_BACK_DIFFUSE_COLOR: u32 = 0x30;
pub const LIGHT_BACK_SPECULAR_COLOR: u32 = 0x3C;
pub const LIGHT_INFINITE_DIRECTION: u32 = 0x48;
pub const LIGHT_LOCAL_POSITION: u32 = 0x54;
pub const LIGHT_LOCAL_ATTENUATION: u32 = 0x60;
pub const LIGHT_SPOT_FALLOFF: u32 = 0x6C; // exponent, cos cutoff, unused
pub const LIGHT_SPOT_DIRECTION: u32 = 0x78; // 4 words

/// Base address of the register block for one hardware light.
pub const fn light_base(index: u32) -> u32 {
    LIGHT_BLOCK_BASE + index * LIGHT_BLOCK_STRIDE
}

// Transform state, 16 words per matrix
pub const SET_MODEL_VIEW_MATRIX: u32 = 0x0900;
pub const SET_INVERSE_MODEL_VIEW_MATRIX: u32 = 0x0940;
pub const SET_PROJECTION_MATRIX: u32 = 0x0980;
pub const SET_COMPOSITE_MATRIX: u32 = 0x09C0;
pub const SET_VIEWPORT_OFFSET: u32 = 0x0A00; // 4 words
pub const SET_VIEWPORT_SCALE: u32 = 0x0A10; // 4 words
pub const SET_TEXTURE_MATRIX: u32 = 0x0A40; // 16 words, stride 0x40 per unit
pub const TEXTURE_MATRIX_STRIDE: u32 = 0x40;

// Per-unit texture sampler block
pub const TEXTURE_BLOCK_BASE: u32 = 0x0C00;
pub const TEXTURE_BLOCK_STRIDE: u32 = 0x40;
pub const TEXTURE_OFFSET: u32 = 0x00;
pub const TEXTURE_FORMAT: u32 = 0x04;
pub const TEXTURE_ADDRESS: u32 = 0x08;
pub const TEXTURE_CONTROL: u32 = 0x0C;
pub const TEXTURE_FILTER: u32 = 0x10;
pub const TEXTURE_MATRIX_ENABLE: u32 = 0x14;
pub const TEXGEN_S: u32 = 0x18;
pub const TEXGEN_T: u32 = 0x1C;
pub const TEXGEN_R: u32 = 0x20;
pub const TEXGEN_Q: u32 = 0x24;

/// Base address of the sampler register block for one texture unit.
pub const fn texture_base(unit: u32) -> u32 {
    TEXTURE_BLOCK_BASE + unit * TEXTURE_BLOCK_STRIDE
}

pub const SET_SHADER_STAGE_PROGRAM: u32 = 0x0D00;

// Register combiner
pub const SET_COMBINER_CONTROL: u32 = 0x0D10;
pub const SET_COMBINER_FINAL0: u32 = 0x0D14;
pub const SET_COMBINER_FINAL1: u32 = 0x0D18;
pub const SET_COMBINER_FACTOR: u32 = 0x0D20; // stride 4, 8 stages
pub const SET_COMBINER_COLOR_ICW: u32 = 0x0D40;
pub const SET_COMBINER_COLOR_OCW: u32 = 0x0D60;
pub const SET_COMBINER_ALPHA_ICW: u32 = 0x0D80;
pub const SET_COMBINER_ALPHA_OCW: u32 = 0x0DA0;
pub const MAX_COMBINER_STAGES: u32 = 8;

// Vertex attributes and draw commands
pub const SET_VERTEX_ARRAY_FORMAT: u32 = 0x1700; // stride 4, 16 slots
pub const SET_VERTEX_ARRAY_OFFSET: u32 = 0x1740; // stride 4, 16 slots
pub const SET_VERTEX_DATA4F: u32 = 0x1780; // 4 words, stride 0x10 per slot
pub const SET_BEGIN_END: u32 = 0x1900;
pub const DRAW_ARRAYS_BATCH: u32 = 0x1904;
pub const ARRAY_ELEMENT16: u32 = 0x1908; // two indices per word
pub const ARRAY_ELEMENT32: u32 = 0x190C; // one index per word

pub const MAX_VERTEX_ATTRIBS: u32 = 16;
/// Largest vertex count one `DRAW_ARRAYS_BATCH` word can cover.
pub const DRAW_BATCH_MAX: u32 = 256;

// Primitive codes for SET_BEGIN_END
pub const PRIMITIVE_END: u32 = 0;
pub const PRIMITIVE_POINTS: u32 = 1;
pub const PRIMITIVE_TRIANGLES: u32 = 4;
pub const PRIMITIVE_TRIANGLE_STRIP: u32 = 6;

// Attribute element type codes for SET_VERTEX_ARRAY_FORMAT
pub const ATTRIB_TYPE_UNSIGNED_BYTE: u32 = 1;
pub const ATTRIB_TYPE_SHORT: u32 = 2;
pub const ATTRIB_TYPE_FLOAT: u32 = 4;

// Shader stage program codes
pub const STAGE_NONE: u32 = 0;
pub const STAGE_2D_PROJECTIVE: u32 = 1;
pub const STAGE_CLIP_PLANE: u32 = 2;

// Texgen codes
pub const TEXGEN_DISABLE: u32 = 0;
pub const TEXGEN_SPHERE_MAP: u32 = 1;

// Combiner source register codes (4 bits)
pub const RC_ZERO: u8 = 0x0;
pub const RC_CONSTANT0: u8 = 0x1;
pub const RC_FOG: u8 = 0x3;
pub const RC_PRIMARY_COLOR: u8 = 0x4;
pub const RC_SECONDARY_COLOR: u8 = 0x5;
pub const RC_TEXTURE0: u8 = 0x8; // add the unit index
pub const RC_SPARE0: u8 = 0xC;

// Combiner output register codes for the OCW destination fields
pub const RC_DISCARD: u8 = 0x0;
pub const OUT_SPARE0: u8 = 0xC;

// Light classification codes, 2 bits each in SET_LIGHT_ENABLE_MASK
pub const LIGHT_OFF: u8 = 0;
pub const LIGHT_MODE_INFINITE: u8 = 1;
pub const LIGHT_MODE_LOCAL: u8 = 2;
pub const LIGHT_MODE_SPOT: u8 = 3;

bitflags! {
    /// Planes selected by `CLEAR_SURFACE`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ClearSurface: u32 {
        const Z = 0x01;
        const STENCIL = 0x02;
        const COLOR = 0xF0;
    }
}

bitflags! {
    /// Channel write enables for `SET_COLOR_MASK`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ColorMask: u32 {
        const BLUE = 0x0000_0001;
        const GREEN = 0x0000_0100;
        const RED = 0x0001_0000;
        const ALPHA = 0x0100_0000;
    }
}

/// One input field of a combiner input control word.
///
/// Bits 0..=3 select the source register, bit 4 selects the alpha channel
/// of that register, bit 5 maps the input through `1 - x`.
pub const fn pack_combiner_input(source: u8, alpha: bool, invert: bool) -> u32 {
    (source & 0x0F) as u32 | ((alpha as u32) << 4) | ((invert as u32) << 5)
}

/// Pack an input control word from its four pre-packed input fields.
///
/// The stage computes `a*b + c*d`; `a` occupies the top byte and `d` the
/// bottom byte.
pub const fn pack_icw(a: u32, b: u32, c: u32, d: u32) -> u32 {
    (a << 24) | (b << 16) | (c << 8) | d
}

/// Pack an output control word.
///
/// Destination register codes for the `a*b` product, the `c*d` product and
/// the `a*b + c*d` sum. A destination of [`RC_DISCARD`] drops that result.
pub const fn pack_ocw(ab_dst: u8, cd_dst: u8, sum_dst: u8) -> u32 {
    ((sum_dst as u32) << 8) | ((ab_dst as u32) << 4) | cd_dst as u32
}

/// Pack the final combiner word selecting the fragment RGB source.
pub const fn pack_final0(d_source: u8, d_alpha: bool) -> u32 {
    pack_combiner_input(d_source, d_alpha, false)
}

/// Pack the final combiner word selecting the fragment alpha source.
pub const fn pack_final1(g_source: u8, g_alpha: bool) -> u32 {
    pack_combiner_input(g_source, g_alpha, false) << 24
}

/// Pack a stage constant color into an X8R8G8B8 factor word.
///
/// Components are clamped to `[0, 1]` before quantization.
pub fn pack_factor(color: [f32; 4]) -> u32 {
    let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0 + 0.5) as u32;
    (q(color[3]) << 24) | (q(color[0]) << 16) | (q(color[1]) << 8) | q(color[2])
}

/// Pack a vertex attribute format word: element type, component count and
/// byte stride.
pub const fn pack_array_format(ty: u32, size: u32, stride: u32) -> u32 {
    ty | (size << 4) | (stride << 8)
}

/// Pack one `DRAW_ARRAYS_BATCH` word covering `count` vertices starting at
/// `first`. `count` must be in `1..=DRAW_BATCH_MAX`.
pub const fn pack_draw_batch(first: u32, count: u32) -> u32 {
    ((count - 1) << 24) | (first & 0x00FF_FFFF)
}

/// Pack two 16-bit indices into one `ARRAY_ELEMENT16` word.
pub const fn pack_element_pair(i0: u16, i1: u16) -> u32 {
    ((i1 as u32) << 16) | i0 as u32
}

/// Pack a texture format word: base format code, mip level count and the
/// log2 extents of the base level.
pub const fn pack_texture_format(
    format: u32,
    mip_levels: u32,
    width_shift: u32,
    height_shift: u32,
) -> u32 {
    format | (mip_levels << 8) | (width_shift << 16) | (height_shift << 20)
}

/// Pack a texture address word from the per-axis wrap codes.
pub const fn pack_texture_address(wrap_s: u32, wrap_t: u32) -> u32 {
    wrap_s | (wrap_t << 8)
}

/// Pack a texture control word: sampler enable and the LOD clamp range.
pub const fn pack_texture_control(enable: bool, min_lod: u32, max_lod: u32) -> u32 {
    ((enable as u32) << 30) | (min_lod << 18) | (max_lod << 6)
}

/// Pack a texture filter word from the min and mag filter codes.
pub const fn pack_texture_filter(min: u32, mag: u32) -> u32 {
    min | (mag << 24)
}

/// Pack the shader stage program word from the four per-unit stage codes.
pub const fn pack_shader_stages(stages: [u32; 4]) -> u32 {
    stages[0] | (stages[1] << 5) | (stages[2] << 10) | (stages[3] << 15)
}

/// Pack the light enable mask: two classification bits per light, light 0
/// in the lowest bits.
pub const fn pack_light_mask(modes: [u8; 8]) -> u32 {
    let mut word = 0u32;
    let mut i = 0;
    while i < 8 {
        word |= (modes[i] as u32 & 0x3) << (2 * i);
        i += 1;
    }
    word
}

/// Pack the color material word: one bit per tracked channel, front face in
/// the low nibble, back face in the high nibble. Channel order is emission,
/// ambient, diffuse, specular.
pub const fn pack_color_material(front: [bool; 4], back: [bool; 4]) -> u32 {
    let mut word = 0u32;
    let mut i = 0;
    while i < 4 {
        word |= (front[i] as u32) << i;
        word |= (back[i] as u32) << (4 + i);
        i += 1;
    }
    word
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_combiner_input_fields() {
        assert_eq!(pack_combiner_input(RC_ZERO, false, false), 0x00);
        assert_eq!(pack_combiner_input(RC_ZERO, false, true), 0x20);
        assert_eq!(pack_combiner_input(RC_PRIMARY_COLOR, true, false), 0x14);
        assert_eq!(pack_combiner_input(RC_TEXTURE0 + 2, false, false), 0x0A);
    }

    #[test]
    fn test_pack_icw_byte_order() {
        let a = pack_combiner_input(RC_TEXTURE0, false, false);
        let b = pack_combiner_input(RC_ZERO, false, true);
        let icw = pack_icw(a, b, 0, 0);
        assert_eq!(icw, 0x0820_0000);
    }

    #[test]
    fn test_pack_ocw_destinations() {
        assert_eq!(pack_ocw(OUT_SPARE0, RC_DISCARD, RC_DISCARD), 0x0C0);
        assert_eq!(pack_ocw(RC_DISCARD, RC_DISCARD, OUT_SPARE0), 0xC00);
    }

    #[test]
    fn test_pack_factor_clamps() {
        assert_eq!(pack_factor([1.0, 0.0, 0.0, 1.0]), 0xFFFF_0000);
        assert_eq!(pack_factor([2.0, -1.0, 1.0, 0.0]), 0x00FF_00FF);
    }

    #[test]
    fn test_pack_draw_batch() {
        assert_eq!(pack_draw_batch(0, 256), 0xFF00_0000);
        assert_eq!(pack_draw_batch(10, 1), 0x0000_000A);
    }

    #[test]
    fn test_pack_light_mask() {
        let mut modes = [LIGHT_OFF; 8];
        modes[0] = LIGHT_MODE_INFINITE;
        modes[7] = LIGHT_MODE_SPOT;
        assert_eq!(pack_light_mask(modes), (3 << 14) | 1);
    }

    #[test]
    fn test_pack_element_pair() {
        assert_eq!(pack_element_pair(1, 2), 0x0002_0001);
    }
}
