//! Shadowed API state
//!
//! Everything an API call can set between draws lives here, with the GL ES
//! 1.1 initial values. The draw dispatcher reads this store; nothing in it
//! touches the hardware directly.

use crate::objects::Handle;
use crate::types::{
    ColorMaterialMode, CombineFunc, CombineOperand, CombineSource, ElementType, TexEnvMode,
    TexGenMode,
};

pub const MAX_TEXTURE_UNITS: usize = 4;
pub const MAX_LIGHTS: usize = 8;
pub const MAX_CLIP_PLANES: usize = 3;

/// Texture environment of one unit.
#[derive(Debug, Clone, Copy)]
pub struct TexEnv {
    pub mode: TexEnvMode,
    pub color: [f32; 4],
    pub combine_rgb: CombineFunc,
    pub combine_alpha: CombineFunc,
    pub src_rgb: [CombineSource; 3],
    pub src_alpha: [CombineSource; 3],
    pub operand_rgb: [CombineOperand; 3],
    pub operand_alpha: [CombineOperand; 3],
}

impl Default for TexEnv {
    fn default() -> Self {
        Self {
            mode: TexEnvMode::Modulate,
            color: [0.0; 4],
            combine_rgb: CombineFunc::Modulate,
            combine_alpha: CombineFunc::Modulate,
            src_rgb: [
                CombineSource::Texture,
                CombineSource::Previous,
                CombineSource::Constant,
            ],
            src_alpha: [
                CombineSource::Texture,
                CombineSource::Previous,
                CombineSource::Constant,
            ],
            operand_rgb: [
                CombineOperand::SrcColor,
                CombineOperand::SrcColor,
                CombineOperand::SrcAlpha,
            ],
            operand_alpha: [CombineOperand::SrcAlpha; 3],
        }
    }
}

/// One texture unit: sampler binding, texgen and environment.
#[derive(Debug, Clone, Copy)]
pub struct TextureUnit {
    pub enabled: bool,
    pub binding: Handle,
    pub texgen_s_enabled: bool,
    pub texgen_t_enabled: bool,
    pub texgen_s: TexGenMode,
    pub texgen_t: TexGenMode,
    pub env: TexEnv,
}

impl Default for TextureUnit {
    fn default() -> Self {
        Self {
            enabled: false,
            binding: 0,
            texgen_s_enabled: false,
            texgen_t_enabled: false,
            texgen_s: TexGenMode::SphereMap,
            texgen_t: TexGenMode::SphereMap,
            env: TexEnv::default(),
        }
    }
}

/// Where an enabled attribute's elements come from.
#[derive(Debug, Clone)]
pub enum AttribSource {
    /// Nothing bound yet
    None,
    /// Elements in a buffer object, starting at a byte offset
    Buffer { handle: Handle, offset: usize },
    /// Elements copied out of caller memory at pointer-set time
    Client(Vec<u8>),
}

/// One vertex attribute binding plus its constant fallback value.
#[derive(Debug, Clone)]
pub struct AttribBinding {
    pub enabled: bool,
    pub ty: ElementType,
    pub size: u32,
    pub stride: usize,
    pub source: AttribSource,
    /// Used when the array is disabled
    pub value: [f32; 4],
}

impl Default for AttribBinding {
    fn default() -> Self {
        Self {
            enabled: false,
            ty: ElementType::Float,
            size: 4,
            stride: 0,
            source: AttribSource::None,
            value: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

impl AttribBinding {
    /// Byte stride between consecutive elements; 0 means tightly packed.
    pub fn effective_stride(&self) -> usize {
        if self.stride != 0 {
            self.stride
        } else {
            self.size as usize * self.ty.byte_size()
        }
    }

    /// Bytes occupied by one element.
    pub fn element_bytes(&self) -> usize {
        self.size as usize * self.ty.byte_size()
    }
}

/// One light source, position already transformed to eye space.
#[derive(Debug, Clone, Copy)]
pub struct Light {
    pub enabled: bool,
    /// Position is directional (w was 0) or positional, fixed at set time
    pub directional: bool,
    pub position: [f32; 3],
    pub ambient: [f32; 4],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
    pub spot_direction: [f32; 3],
    pub spot_exponent: f32,
    /// Degrees; 180 means no cone
    pub spot_cutoff: f32,
    /// Constant, linear, quadratic
    pub attenuation: [f32; 3],
}

impl Default for Light {
    fn default() -> Self {
        Self {
            enabled: false,
            directional: true,
            position: [0.0, 0.0, 1.0],
            ambient: [0.0, 0.0, 0.0, 1.0],
            diffuse: [0.0, 0.0, 0.0, 1.0],
            specular: [0.0, 0.0, 0.0, 1.0],
            spot_direction: [0.0, 0.0, -1.0],
            spot_exponent: 0.0,
            spot_cutoff: 180.0,
            attenuation: [1.0, 0.0, 0.0],
        }
    }
}

/// Per-face material.
#[derive(Debug, Clone, Copy)]
pub struct Material {
    pub emission: [f32; 4],
    pub ambient: [f32; 4],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
    pub shininess: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            emission: [0.0, 0.0, 0.0, 1.0],
            ambient: [0.2, 0.2, 0.2, 1.0],
            diffuse: [0.8, 0.8, 0.8, 1.0],
            specular: [0.0, 0.0, 0.0, 1.0],
            shininess: 0.0,
        }
    }
}

/// One user clip plane, equation already in eye space.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClipPlane {
    pub enabled: bool,
    pub equation: [f32; 4],
}

/// The whole shadowed state store.
#[derive(Debug, Clone)]
pub struct GlState {
    pub units: [TextureUnit; MAX_TEXTURE_UNITS],
    pub active_unit: usize,
    pub client_active_unit: usize,

    pub vertex_array: AttribBinding,
    pub color_array: AttribBinding,
    pub normal_array: AttribBinding,
    pub texcoord_arrays: [AttribBinding; MAX_TEXTURE_UNITS],
    pub array_buffer: Handle,
    pub element_array_buffer: Handle,

    pub lighting_enabled: bool,
    pub lights: [Light; MAX_LIGHTS],
    pub light_model_ambient: [f32; 4],
    pub two_sided: bool,
    pub color_material_enabled: bool,
    /// Tracked channel per face (front, back)
    pub color_material: [ColorMaterialMode; 2],
    /// Front and back materials
    pub materials: [Material; 2],

    pub normalize_enabled: bool,
    pub clip_planes: [ClipPlane; MAX_CLIP_PLANES],
}

impl GlState {
    pub fn new() -> Self {
        let mut lights = [Light::default(); MAX_LIGHTS];
        // light 0 starts white, the rest black
        lights[0].diffuse = [1.0, 1.0, 1.0, 1.0];
        lights[0].specular = [1.0, 1.0, 1.0, 1.0];

        let mut color_array = AttribBinding::default();
        color_array.value = [1.0, 1.0, 1.0, 1.0];
        let mut normal_array = AttribBinding::default();
        normal_array.value = [0.0, 0.0, 1.0, 0.0];

        Self {
            units: Default::default(),
            active_unit: 0,
            client_active_unit: 0,
            vertex_array: AttribBinding::default(),
            color_array,
            normal_array,
            texcoord_arrays: Default::default(),
            array_buffer: 0,
            element_array_buffer: 0,
            lighting_enabled: false,
            lights,
            light_model_ambient: [0.2, 0.2, 0.2, 1.0],
            two_sided: false,
            color_material_enabled: false,
            color_material: [ColorMaterialMode::AmbientAndDiffuse; 2],
            materials: [Material::default(); 2],
            normalize_enabled: false,
            clip_planes: [ClipPlane::default(); MAX_CLIP_PLANES],
        }
    }
}

impl Default for GlState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_light_colors() {
        let state = GlState::new();
        assert_eq!(state.lights[0].diffuse, [1.0, 1.0, 1.0, 1.0]);
        assert_eq!(state.lights[1].diffuse, [0.0, 0.0, 0.0, 1.0]);
        assert!(state.lights.iter().all(|l| !l.enabled));
        assert_eq!(state.lights[0].spot_cutoff, 180.0);
        assert_eq!(state.lights[0].attenuation, [1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_initial_material() {
        let state = GlState::new();
        assert_eq!(state.materials[0].ambient, [0.2, 0.2, 0.2, 1.0]);
        assert_eq!(state.materials[0].diffuse, [0.8, 0.8, 0.8, 1.0]);
    }

    #[test]
    fn test_initial_vertex_color() {
        let state = GlState::new();
        assert_eq!(state.color_array.value, [1.0, 1.0, 1.0, 1.0]);
        assert!(!state.color_array.enabled);
    }

    #[test]
    fn test_effective_stride() {
        let mut binding = AttribBinding::default();
        binding.ty = ElementType::Float;
        binding.size = 3;
        assert_eq!(binding.effective_stride(), 12);
        binding.stride = 32;
        assert_eq!(binding.effective_stride(), 32);
        assert_eq!(binding.element_bytes(), 12);
    }
}
