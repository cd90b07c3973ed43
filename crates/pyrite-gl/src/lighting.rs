//! Lighting compiler
//!
//! The hardware evaluates a fixed lighting sum per vertex; the driver's job
//! is to fold the material into the light colors ahead of time and to
//! derive the two ambient/emission registers. Which folds are legal depends
//! on the color-material wiring: a channel driven by the vertex color
//! cannot be pre-multiplied, so those products move into per-vertex
//! hardware terms instead. Like the texture environment, compilation is
//! pure and emission is a separate step.

use std::f32::consts::PI;

use pyrite_core::{GlError, Result};
use pyrite_hw::cmd;
use pyrite_hw::PushBuffer;

use crate::state::{GlState, Light, Material, MAX_LIGHTS};
use crate::types::ColorMaterialMode;

/// Who drives a material channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelSource {
    #[default]
    Material,
    Vertex,
}

/// Per-face channel wiring derived from the color-material mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FaceWiring {
    pub emission: ChannelSource,
    pub ambient: ChannelSource,
    pub diffuse: ChannelSource,
    pub specular: ChannelSource,
}

fn wiring_for(mode: ColorMaterialMode) -> FaceWiring {
    let mut wiring = FaceWiring::default();
    match mode {
        ColorMaterialMode::Emission => wiring.emission = ChannelSource::Vertex,
        ColorMaterialMode::Ambient => wiring.ambient = ChannelSource::Vertex,
        ColorMaterialMode::Diffuse => wiring.diffuse = ChannelSource::Vertex,
        ColorMaterialMode::Specular => wiring.specular = ChannelSource::Vertex,
        ColorMaterialMode::AmbientAndDiffuse => {
            wiring.ambient = ChannelSource::Vertex;
            wiring.diffuse = ChannelSource::Vertex;
        }
    }
    wiring
}

/// Hardware classification of an enabled light.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightMode {
    Infinite,
    Local,
    Spot,
}

impl LightMode {
    fn mask_code(self) -> u8 {
        match self {
            LightMode::Infinite => cmd::LIGHT_MODE_INFINITE,
            LightMode::Local => cmd::LIGHT_MODE_LOCAL,
            LightMode::Spot => cmd::LIGHT_MODE_SPOT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpotParams {
    pub direction: [f32; 3],
    pub exponent: f32,
    /// Radians, converted from the API's degrees
    pub cutoff: f32,
}

/// Pre-folded colors of one light for one face.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FaceColors {
    pub ambient: [f32; 3],
    pub diffuse: [f32; 3],
    pub specular: [f32; 3],
}

/// One compiled light.
#[derive(Debug, Clone, PartialEq)]
pub struct LightProgram {
    pub index: usize,
    pub mode: LightMode,
    /// Direction for infinite lights, eye-space position otherwise
    pub position: [f32; 3],
    pub attenuation: [f32; 3],
    pub spot: Option<SpotParams>,
    /// Front and back
    pub faces: [FaceColors; 2],
}

/// Derived ambient and emission registers of one face.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceAmbient {
    /// Constant scene color added before any light
    pub scene_color: [f32; 3],
    /// Per-channel weight applied to the vertex color's ambient term
    pub emission_scale: [f32; 3],
    pub alpha: f32,
}

/// A compiled lighting program.
#[derive(Debug, Clone, PartialEq)]
pub struct LightingProgram {
    pub wiring: [FaceWiring; 2],
    pub faces: [FaceAmbient; 2],
    pub lights: Vec<LightProgram>,
    pub mask: [u8; MAX_LIGHTS],
    pub shininess: [f32; 2],
    pub two_sided: bool,
}

fn rgb(color: [f32; 4]) -> [f32; 3] {
    [color[0], color[1], color[2]]
}

fn mul3(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] * b[0], a[1] * b[1], a[2] * b[2]]
}

fn add3(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

fn normalize3(v: [f32; 3]) -> [f32; 3] {
    let mag = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if mag == 0.0 {
        return v;
    }
    [v[0] / mag, v[1] / mag, v[2] / mag]
}

/// Derive one face's ambient registers from its wiring.
///
/// The hardware computes `scene_color + emission_scale * vertex_color` for
/// the ambient-plus-emission term, so each of the four wiring combinations
/// folds differently. Both channels vertex-driven would need two distinct
/// per-vertex products, which the register file cannot express.
fn face_ambient(
    scene_ambient: [f32; 3],
    material: &Material,
    wiring: &FaceWiring,
) -> Result<FaceAmbient> {
    let (scene_color, emission_scale) = match (wiring.ambient, wiring.emission) {
        (ChannelSource::Material, ChannelSource::Material) => (
            add3(mul3(scene_ambient, rgb(material.ambient)), rgb(material.emission)),
            [0.0; 3],
        ),
        (ChannelSource::Material, ChannelSource::Vertex) => {
            (mul3(scene_ambient, rgb(material.ambient)), [1.0; 3])
        }
        (ChannelSource::Vertex, ChannelSource::Material) => {
            (rgb(material.emission), scene_ambient)
        }
        (ChannelSource::Vertex, ChannelSource::Vertex) => {
            return Err(GlError::Unsupported("vertex-driven ambient and emission"))
        }
    };
    Ok(FaceAmbient { scene_color, emission_scale, alpha: material.diffuse[3] })
}

fn classify(light: &Light) -> LightMode {
    if light.directional {
        LightMode::Infinite
    } else if light.spot_cutoff >= 180.0 {
        LightMode::Local
    } else {
        LightMode::Spot
    }
}

/// Fold one light's colors with the material of one face.
///
/// Material-constant channels are pre-multiplied; vertex-driven channels
/// pass the light color through and the hardware multiplies per vertex.
fn fold_colors(light: &Light, material: &Material, wiring: &FaceWiring) -> FaceColors {
    let fold = |source: ChannelSource, light_c: [f32; 4], mat_c: [f32; 4]| match source {
        ChannelSource::Material => mul3(rgb(light_c), rgb(mat_c)),
        ChannelSource::Vertex => rgb(light_c),
    };
    FaceColors {
        ambient: fold(wiring.ambient, light.ambient, material.ambient),
        diffuse: fold(wiring.diffuse, light.diffuse, material.diffuse),
        specular: fold(wiring.specular, light.specular, material.specular),
    }
}

/// Compile the lighting state into a program.
pub fn compile(state: &GlState) -> Result<LightingProgram> {
    let wiring = if state.color_material_enabled {
        [wiring_for(state.color_material[0]), wiring_for(state.color_material[1])]
    } else {
        [FaceWiring::default(); 2]
    };

    let scene_ambient = rgb(state.light_model_ambient);
    let faces = [
        face_ambient(scene_ambient, &state.materials[0], &wiring[0])?,
        face_ambient(scene_ambient, &state.materials[1], &wiring[1])?,
    ];

    let mut lights = Vec::new();
    let mut mask = [cmd::LIGHT_OFF; MAX_LIGHTS];
    for (index, light) in state.lights.iter().enumerate() {
        if !light.enabled {
            continue;
        }
        let mode = classify(light);
        mask[index] = mode.mask_code();
        let position = match mode {
            LightMode::Infinite => normalize3(light.position),
            LightMode::Local | LightMode::Spot => light.position,
        };
        let spot = (mode == LightMode::Spot).then(|| SpotParams {
            direction: normalize3(light.spot_direction),
            exponent: light.spot_exponent,
            cutoff: light.spot_cutoff * PI / 180.0,
        });
        lights.push(LightProgram {
            index,
            mode,
            position,
            attenuation: light.attenuation,
            spot,
            faces: [
                fold_colors(light, &state.materials[0], &wiring[0]),
                fold_colors(light, &state.materials[1], &wiring[1]),
            ],
        });
    }

    Ok(LightingProgram {
        wiring,
        faces,
        lights,
        mask,
        shininess: [state.materials[0].shininess, state.materials[1].shininess],
        two_sided: state.two_sided,
    })
}

fn wiring_bits(wiring: &FaceWiring) -> [bool; 4] {
    [
        wiring.emission == ChannelSource::Vertex,
        wiring.ambient == ChannelSource::Vertex,
        wiring.diffuse == ChannelSource::Vertex,
        wiring.specular == ChannelSource::Vertex,
    ]
}

/// Emit a compiled program to the push buffer.
///
/// Both face register banks are always written; a previous two-sided draw
/// must not leak stale back-face state into a one-sided one.
pub fn emit(program: &LightingProgram, pb: &mut PushBuffer) -> Result<()> {
    pb.push(cmd::SET_TWO_SIDE_LIGHT_ENABLE, program.two_sided as u32)?;
    // separate specular and local viewer stay off
    pb.push(cmd::SET_LIGHT_CONTROL, 0)?;
    pb.push(
        cmd::SET_COLOR_MATERIAL,
        cmd::pack_color_material(wiring_bits(&program.wiring[0]), wiring_bits(&program.wiring[1])),
    )?;

    let face_regs = [
        (cmd::SET_SCENE_AMBIENT_COLOR, cmd::SET_MATERIAL_EMISSION, cmd::SET_MATERIAL_ALPHA),
        (
            cmd::SET_BACK_SCENE_AMBIENT_COLOR,
            cmd::SET_BACK_MATERIAL_EMISSION,
            cmd::SET_BACK_MATERIAL_ALPHA,
        ),
    ];
    for (face, (scene_reg, emission_reg, alpha_reg)) in face_regs.iter().enumerate() {
        let fa = &program.faces[face];
        pb.push_f32s(*scene_reg, &fa.scene_color)?;
        pb.push_f32s(*emission_reg, &fa.emission_scale)?;
        pb.push_f32(*alpha_reg, fa.alpha)?;
    }
    pb.push_f32(cmd::SET_SPECULAR_EXPONENT, program.shininess[0])?;
    pb.push_f32(cmd::SET_BACK_SPECULAR_EXPONENT, program.shininess[1])?;

    for light in &program.lights {
        let base = cmd::light_base(light.index as u32);
        let color_regs = [
            (cmd::LIGHT_AMBIENT_COLOR, cmd::LIGHT_DIFFUSE_COLOR, cmd::LIGHT_SPECULAR_COLOR),
            (
                cmd::LIGHT_BACK_AMBIENT_COLOR,
                cmd::LIGHT_BACK_DIFFUSE_COLOR,
                cmd::LIGHT_BACK_SPECULAR_COLOR,
            ),
        ];
        for (face, (ambient_reg, diffuse_reg, specular_reg)) in color_regs.iter().enumerate() {
            let colors = &light.faces[face];
            pb.push_f32s(base + ambient_reg, &colors.ambient)?;
            pb.push_f32s(base + diffuse_reg, &colors.diffuse)?;
            pb.push_f32s(base + specular_reg, &colors.specular)?;
        }
        match light.mode {
            LightMode::Infinite => {
                pb.push_f32s(base + cmd::LIGHT_INFINITE_DIRECTION, &light.position)?;
            }
            LightMode::Local | LightMode::Spot => {
                pb.push_f32s(base + cmd::LIGHT_LOCAL_POSITION, &light.position)?;
                pb.push_f32s(base + cmd::LIGHT_LOCAL_ATTENUATION, &light.attenuation)?;
            }
        }
        if let Some(spot) = &light.spot {
            pb.push_f32s(
                base + cmd::LIGHT_SPOT_FALLOFF,
                &[spot.exponent, spot.cutoff.cos(), 0.0],
            )?;
            pb.push_f32s(
                base + cmd::LIGHT_SPOT_DIRECTION,
                &[spot.direction[0], spot.direction[1], spot.direction[2], 1.0],
            )?;
        }
    }

    pb.push(cmd::SET_LIGHT_ENABLE_MASK, cmd::pack_light_mask(program.mask))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_material_folds_everything() {
        let mut state = GlState::new();
        state.lighting_enabled = true;
        let program = compile(&state).unwrap();
        // scene = 0.2 * 0.2 + 0 emission, scale = 0
        let fa = &program.faces[0];
        for c in 0..3 {
            assert!((fa.scene_color[c] - 0.04).abs() < 1e-6);
            assert_eq!(fa.emission_scale[c], 0.0);
        }
        assert_eq!(fa.alpha, 1.0);
    }

    #[test]
    fn test_ambient_vertex_passes_scene_as_scale() {
        let mut state = GlState::new();
        state.color_material_enabled = true;
        state.color_material = [ColorMaterialMode::Ambient; 2];
        state.materials[0].emission = [0.5, 0.0, 0.0, 1.0];
        let program = compile(&state).unwrap();
        let fa = &program.faces[0];
        assert_eq!(fa.scene_color, [0.5, 0.0, 0.0]);
        assert_eq!(fa.emission_scale, [0.2, 0.2, 0.2]);
    }

    #[test]
    fn test_emission_vertex_keeps_material_ambient() {
        let mut state = GlState::new();
        state.color_material_enabled = true;
        state.color_material = [ColorMaterialMode::Emission; 2];
        let program = compile(&state).unwrap();
        let fa = &program.faces[0];
        for c in 0..3 {
            assert!((fa.scene_color[c] - 0.04).abs() < 1e-6);
            assert_eq!(fa.emission_scale[c], 1.0);
        }
    }

    #[test]
    fn test_both_vertex_is_unresolved() {
        let mut state = GlState::new();
        state.color_material_enabled = true;
        state.color_material = [ColorMaterialMode::Ambient; 2];
        // no single mode drives both, but emission + ambient-and-diffuse do
        state.color_material[0] = ColorMaterialMode::Emission;
        assert!(compile(&state).is_ok());

        // force the combination through a hand-built wiring
        let wiring = FaceWiring {
            ambient: ChannelSource::Vertex,
            emission: ChannelSource::Vertex,
            ..FaceWiring::default()
        };
        let err = face_ambient([0.2; 3], &Material::default(), &wiring);
        assert_eq!(err, Err(GlError::Unsupported("vertex-driven ambient and emission")));
    }

    #[test]
    fn test_classification() {
        let mut light = Light::default();
        light.enabled = true;
        assert_eq!(classify(&light), LightMode::Infinite);
        light.directional = false;
        assert_eq!(classify(&light), LightMode::Local);
        light.spot_cutoff = 45.0;
        assert_eq!(classify(&light), LightMode::Spot);
    }

    #[test]
    fn test_premultiply_by_material() {
        let mut state = GlState::new();
        state.lights[0].enabled = true;
        let program = compile(&state).unwrap();
        assert_eq!(program.lights.len(), 1);
        // white light folded with the 0.8 default diffuse
        let colors = &program.lights[0].faces[0];
        for c in 0..3 {
            assert!((colors.diffuse[c] - 0.8).abs() < 1e-6);
        }
    }

    #[test]
    fn test_vertex_diffuse_passes_light_color() {
        let mut state = GlState::new();
        state.lights[0].enabled = true;
        state.color_material_enabled = true;
        state.color_material = [ColorMaterialMode::AmbientAndDiffuse; 2];
        let program = compile(&state).unwrap();
        let colors = &program.lights[0].faces[0];
        assert_eq!(colors.diffuse, [1.0, 1.0, 1.0]);
        // specular stays material-folded: 1.0 * 0.0
        assert_eq!(colors.specular, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_enable_mask() {
        let mut state = GlState::new();
        state.lights[0].enabled = true;
        state.lights[2].enabled = true;
        state.lights[2].directional = false;
        state.lights[2].spot_cutoff = 30.0;
        state.lights[2].spot_exponent = 2.0;
        let program = compile(&state).unwrap();
        assert_eq!(program.mask[0], cmd::LIGHT_MODE_INFINITE);
        assert_eq!(program.mask[1], cmd::LIGHT_OFF);
        assert_eq!(program.mask[2], cmd::LIGHT_MODE_SPOT);
        let spot = program.lights[1].spot.as_ref().unwrap();
        assert!((spot.cutoff - PI / 6.0).abs() < 1e-6);
        assert_eq!(spot.exponent, 2.0);
    }

    #[test]
    fn test_spot_direction_normalized() {
        let mut state = GlState::new();
        state.lights[0].enabled = true;
        state.lights[0].directional = false;
        state.lights[0].spot_cutoff = 20.0;
        state.lights[0].spot_direction = [0.0, 0.0, -2.0];
        let program = compile(&state).unwrap();
        let spot = program.lights[0].spot.as_ref().unwrap();
        assert_eq!(spot.direction, [0.0, 0.0, -1.0]);
    }

    #[test]
    fn test_emit_always_writes_both_faces() {
        let state = GlState::new();
        let program = compile(&state).unwrap();
        let mut pb = PushBuffer::new(1024, Box::new(pyrite_hw::NullTransport::default()));
        emit(&program, &mut pb).unwrap();
        let words = pb.words();
        assert!(words.contains(&cmd::SET_BACK_SCENE_AMBIENT_COLOR));
        assert!(words.contains(&cmd::SET_LIGHT_ENABLE_MASK));
    }
}
