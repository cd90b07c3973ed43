//! API-level enums and their hardware mappings
//!
//! Every mapping is an exhaustive match. Variants the hardware cannot
//! express fail hard with [`GlError::Unsupported`]; there is no silent
//! fall-through to a default register value.

use bitflags::bitflags;
use pyrite_core::{GlError, Result};
use pyrite_hw::cmd;

/// Primitive topologies accepted by the draw entry points.
///
/// Lines and fans are recognized API values the rasterizer has no command
/// for, so they fail fast before any state is committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Points,
    Lines,
    LineLoop,
    LineStrip,
    Triangles,
    TriangleStrip,
    TriangleFan,
}

impl Primitive {
    pub fn to_hw(self) -> Result<u32> {
        match self {
            Primitive::Points => Ok(cmd::PRIMITIVE_POINTS),
            Primitive::Triangles => Ok(cmd::PRIMITIVE_TRIANGLES),
            Primitive::TriangleStrip => Ok(cmd::PRIMITIVE_TRIANGLE_STRIP),
            Primitive::Lines | Primitive::LineLoop | Primitive::LineStrip => {
                Err(GlError::Unsupported("line primitives"))
            }
            Primitive::TriangleFan => Err(GlError::Unsupported("triangle fans")),
        }
    }
}

/// Element types for vertex attribute arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    UnsignedByte,
    Short,
    Float,
}

impl ElementType {
    pub fn byte_size(self) -> usize {
        match self {
            ElementType::UnsignedByte => 1,
            ElementType::Short => 2,
            ElementType::Float => 4,
        }
    }

    pub fn to_hw(self) -> u32 {
        match self {
            ElementType::UnsignedByte => cmd::ATTRIB_TYPE_UNSIGNED_BYTE,
            ElementType::Short => cmd::ATTRIB_TYPE_SHORT,
            ElementType::Float => cmd::ATTRIB_TYPE_FLOAT,
        }
    }
}

/// Index element types for `draw_elements`. Only 16-bit indices exist in
/// the command stream; 32-bit indices fail fast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    UnsignedShort,
    UnsignedInt,
}

/// Comparison functions shared by the depth, alpha and stencil tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareFunc {
    Never,
    Less,
    Equal,
    LessOrEqual,
    Greater,
    NotEqual,
    GreaterOrEqual,
    Always,
}

impl CompareFunc {
    pub fn to_hw(self) -> u32 {
        match self {
            CompareFunc::Never => 0x200,
            CompareFunc::Less => 0x201,
            CompareFunc::Equal => 0x202,
            CompareFunc::LessOrEqual => 0x203,
            CompareFunc::Greater => 0x204,
            CompareFunc::NotEqual => 0x205,
            CompareFunc::GreaterOrEqual => 0x206,
            CompareFunc::Always => 0x207,
        }
    }
}

/// Stencil operations. Only keep and replace are wired to the hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StencilOp {
    Keep,
    Zero,
    Replace,
    Incr,
    Decr,
    Invert,
}

impl StencilOp {
    pub fn to_hw(self) -> Result<u32> {
        match self {
            StencilOp::Keep => Ok(0x1E00),
            StencilOp::Replace => Ok(0x1E01),
            StencilOp::Zero
            | StencilOp::Incr
            | StencilOp::Decr
            | StencilOp::Invert => Err(GlError::Unsupported("stencil op")),
        }
    }
}

/// Blend factors. The wired set covers the standard alpha-blend pair plus
/// additive blending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
}

impl BlendFactor {
    pub fn to_hw(self) -> Result<u32> {
        match self {
            BlendFactor::One => Ok(1),
            BlendFactor::SrcAlpha => Ok(0x302),
            BlendFactor::OneMinusSrcAlpha => Ok(0x303),
            BlendFactor::Zero
            | BlendFactor::SrcColor
            | BlendFactor::OneMinusSrcColor
            | BlendFactor::DstAlpha
            | BlendFactor::OneMinusDstAlpha => Err(GlError::Unsupported("blend factor")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullFaceMode {
    Front,
    Back,
    FrontAndBack,
}

impl CullFaceMode {
    pub fn to_hw(self) -> u32 {
        match self {
            CullFaceMode::Front => 0x404,
            CullFaceMode::Back => 0x405,
            CullFaceMode::FrontAndBack => 0x408,
        }
    }
}

/// Front face winding. The rasterizer's winding sense is flipped relative
/// to the API, so the mapping crosses over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontFace {
    Cw,
    Ccw,
}

impl FrontFace {
    pub fn to_hw(self) -> u32 {
        match self {
            FrontFace::Cw => 0x901,
            FrontFace::Ccw => 0x900,
        }
    }
}

/// Texture minification and magnification filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFilter {
    Nearest,
    Linear,
    NearestMipmapNearest,
    LinearMipmapNearest,
    NearestMipmapLinear,
    LinearMipmapLinear,
}

impl TextureFilter {
    pub fn to_hw(self) -> u32 {
        match self {
            TextureFilter::Nearest => 1,
            TextureFilter::Linear => 2,
            TextureFilter::NearestMipmapNearest => 3,
            TextureFilter::LinearMipmapNearest => 4,
            TextureFilter::NearestMipmapLinear => 5,
            TextureFilter::LinearMipmapLinear => 6,
        }
    }

    /// Whether the filter samples from mip levels beyond the base.
    pub fn uses_mipmaps(self) -> bool {
        !matches!(self, TextureFilter::Nearest | TextureFilter::Linear)
    }
}

/// Texture coordinate wrap modes. Border and mirror wraps are recognized
/// but unwired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureWrap {
    Repeat,
    ClampToEdge,
    ClampToBorder,
    MirroredRepeat,
}

impl TextureWrap {
    pub fn to_hw(self) -> Result<u32> {
        match self {
            TextureWrap::Repeat => Ok(1),
            TextureWrap::ClampToEdge => Ok(3),
            TextureWrap::ClampToBorder | TextureWrap::MirroredRepeat => {
                Err(GlError::Unsupported("texture wrap mode"))
            }
        }
    }
}

/// Base internal formats for texture uploads.
///
/// RGB data has no 3-byte texel format in hardware; it is widened to a
/// padded 4-byte texel at upload time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseFormat {
    Luminance,
    LuminanceAlpha,
    Rgb,
    Rgba,
}

impl BaseFormat {
    /// Bytes per texel as stored in GPU memory.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            BaseFormat::Luminance => 1,
            BaseFormat::LuminanceAlpha => 2,
            BaseFormat::Rgb => 4,
            BaseFormat::Rgba => 4,
        }
    }

    /// Bytes per texel in the caller's linear pixel data.
    pub fn source_bytes_per_pixel(self) -> usize {
        match self {
            BaseFormat::Rgb => 3,
            other => other.bytes_per_pixel(),
        }
    }

    /// Whether samples from this format carry a meaningful alpha channel.
    pub fn has_alpha(self) -> bool {
        matches!(self, BaseFormat::LuminanceAlpha | BaseFormat::Rgba)
    }

    pub fn to_hw(self) -> u32 {
        match self {
            BaseFormat::Luminance => 0x01,
            BaseFormat::LuminanceAlpha => 0x02,
            BaseFormat::Rgb => 0x07, // padded X8R8G8B8
            BaseFormat::Rgba => 0x06,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixMode {
    ModelView,
    Projection,
    Texture,
}

/// Texture environment functions. Decal, blend and add are in the soft
/// tier: setting them logs once and leaves the previous mode in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TexEnvMode {
    Replace,
    Modulate,
    Combine,
    Decal,
    Blend,
    Add,
}

/// Combine-mode functions. Three are wired; the rest fail hard at compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombineFunc {
    Replace,
    Modulate,
    Interpolate,
    Add,
    AddSigned,
    Subtract,
}

/// Combine-mode argument sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombineSource {
    Texture,
    Constant,
    PrimaryColor,
    Previous,
}

/// Combine-mode argument operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombineOperand {
    SrcColor,
    OneMinusSrcColor,
    SrcAlpha,
    OneMinusSrcAlpha,
}

impl CombineOperand {
    pub fn takes_alpha(self) -> bool {
        matches!(self, CombineOperand::SrcAlpha | CombineOperand::OneMinusSrcAlpha)
    }

    pub fn inverts(self) -> bool {
        matches!(
            self,
            CombineOperand::OneMinusSrcColor | CombineOperand::OneMinusSrcAlpha
        )
    }
}

/// Channels a color-material binding can track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMaterialMode {
    Emission,
    Ambient,
    Diffuse,
    Specular,
    AmbientAndDiffuse,
}

/// Face selector for material calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceSel {
    Front,
    Back,
    FrontAndBack,
}

impl FaceSel {
    /// Indices into per-face state arrays (front = 0, back = 1).
    pub fn indices(self) -> &'static [usize] {
        match self {
            FaceSel::Front => &[0],
            FaceSel::Back => &[1],
            FaceSel::FrontAndBack => &[0, 1],
        }
    }
}

/// Texture coordinate generation modes. Only sphere mapping is wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TexGenMode {
    SphereMap,
    ObjectLinear,
    EyeLinear,
    ReflectionMap,
    NormalMap,
}

impl TexGenMode {
    pub fn to_hw(self) -> Result<u32> {
        match self {
            TexGenMode::SphereMap => Ok(cmd::TEXGEN_SPHERE_MAP),
            TexGenMode::ObjectLinear
            | TexGenMode::EyeLinear
            | TexGenMode::ReflectionMap
            | TexGenMode::NormalMap => Err(GlError::Unsupported("texgen mode")),
        }
    }
}

/// Texgen coordinate selector. Only S and T are generated; R and Q are
/// recognized API values with no hardware path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TexCoordAxis {
    S,
    T,
    R,
    Q,
}

/// Client-side array selectors for enable/disable of array state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientArray {
    Vertex,
    Color,
    Normal,
    TexCoord,
}

/// Buffer binding targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferTarget {
    Array,
    ElementArray,
}

/// Server-side capabilities toggled by enable/disable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cap {
    AlphaTest,
    Blend,
    ColorMaterial,
    CullFace,
    DepthTest,
    Lighting,
    Light(usize),
    Normalize,
    PointSprite,
    PolygonOffsetFill,
    StencilTest,
    Texture2d,
    TexGenS,
    TexGenT,
    ClipPlane(usize),
}

/// Integer state queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Query {
    MaxTextureSize,
    MaxTextureUnits,
    MatrixMode,
}

bitflags! {
    /// Buffers selected by `clear`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ClearMask: u32 {
        const COLOR = 0x4000;
        const DEPTH = 0x0100;
        const STENCIL = 0x0400;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_mapping_fails_fast() {
        assert!(Primitive::Triangles.to_hw().is_ok());
        assert!(Primitive::TriangleStrip.to_hw().is_ok());
        assert_eq!(
            Primitive::LineStrip.to_hw(),
            Err(GlError::Unsupported("line primitives"))
        );
        assert_eq!(
            Primitive::TriangleFan.to_hw(),
            Err(GlError::Unsupported("triangle fans"))
        );
    }

    #[test]
    fn test_element_sizes() {
        assert_eq!(ElementType::UnsignedByte.byte_size(), 1);
        assert_eq!(ElementType::Short.byte_size(), 2);
        assert_eq!(ElementType::Float.byte_size(), 4);
    }

    #[test]
    fn test_rgb_widened_to_four_bytes() {
        assert_eq!(BaseFormat::Rgb.source_bytes_per_pixel(), 3);
        assert_eq!(BaseFormat::Rgb.bytes_per_pixel(), 4);
        assert!(!BaseFormat::Rgb.has_alpha());
        assert!(BaseFormat::LuminanceAlpha.has_alpha());
    }

    #[test]
    fn test_front_face_mapping_is_crossed() {
        assert_ne!(FrontFace::Cw.to_hw(), FrontFace::Ccw.to_hw());
        assert_eq!(FrontFace::Cw.to_hw(), 0x901);
    }

    #[test]
    fn test_unwired_blend_factor() {
        assert!(BlendFactor::SrcAlpha.to_hw().is_ok());
        assert!(BlendFactor::DstAlpha.to_hw().is_err());
    }

    #[test]
    fn test_combine_operand_flags() {
        assert!(CombineOperand::OneMinusSrcAlpha.takes_alpha());
        assert!(CombineOperand::OneMinusSrcAlpha.inverts());
        assert!(!CombineOperand::SrcColor.takes_alpha());
        assert!(!CombineOperand::SrcColor.inverts());
    }
}
