//! Texture environment compiler
//!
//! Translates the per-unit texture environment state into a register
//! combiner program. Each active unit becomes one stage computing
//! `a*b + c*d` over the combiner registers; the running color flows through
//! SPARE0 and the final combiner routes it to the fragment. Compilation is
//! pure: the same state always yields the same program, which is emitted to
//! the push buffer in a separate step.

use pyrite_core::{GlError, Result};
use pyrite_hw::cmd;
use pyrite_hw::PushBuffer;

use crate::objects::ObjectTable;
use crate::state::{GlState, TexEnv, MAX_TEXTURE_UNITS};
use crate::types::{CombineFunc, CombineSource, TexEnvMode};

/// What a texture unit contributes to the draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitRole {
    Disabled,
    /// Samples its bound texture and runs its environment stage
    Sample,
    /// Repurposed to interpolate a user clip plane's signed distance
    ClipPlane(usize),
}

/// One input of a combiner stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageInput {
    pub source: u8,
    /// Take the alpha channel of the source register
    pub alpha: bool,
    /// Map the input through `1 - x`
    pub invert: bool,
}

impl StageInput {
    const fn reg(source: u8, alpha: bool) -> Self {
        Self { source, alpha, invert: false }
    }

    const ZERO: StageInput = StageInput { source: cmd::RC_ZERO, alpha: false, invert: false };
    const ONE: StageInput = StageInput { source: cmd::RC_ZERO, alpha: false, invert: true };

    fn pack(self) -> u32 {
        cmd::pack_combiner_input(self.source, self.alpha, self.invert)
    }
}

/// Destinations of a stage's three results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageOutput {
    pub ab: u8,
    pub cd: u8,
    pub sum: u8,
}

impl StageOutput {
    const AB: StageOutput =
        StageOutput { ab: cmd::OUT_SPARE0, cd: cmd::RC_DISCARD, sum: cmd::RC_DISCARD };
    const SUM: StageOutput =
        StageOutput { ab: cmd::RC_DISCARD, cd: cmd::RC_DISCARD, sum: cmd::OUT_SPARE0 };
}

/// One combiner stage: RGB and alpha portions plus an optional constant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CombinerStage {
    pub rgb_in: [StageInput; 4],
    pub rgb_out: StageOutput,
    pub alpha_in: [StageInput; 4],
    pub alpha_out: StageOutput,
    pub factor: Option<[f32; 4]>,
}

/// A compiled combiner program.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinerProgram {
    pub stages: Vec<CombinerStage>,
}

/// Assign a role to each texture unit.
///
/// A unit samples when it is enabled and its bound texture is complete.
/// Enabled clip planes are interleaved into the remaining units in plane
/// order; running out of units is a hard failure since the plane would
/// silently stop clipping.
pub fn plan_units(state: &GlState, objects: &ObjectTable) -> Result<[UnitRole; MAX_TEXTURE_UNITS]> {
    let mut roles = [UnitRole::Disabled; MAX_TEXTURE_UNITS];
    for (i, unit) in state.units.iter().enumerate() {
        if unit.enabled && objects.texture(unit.binding)?.is_complete() {
            roles[i] = UnitRole::Sample;
        }
    }
    let mut next_free = 0;
    for (plane, cp) in state.clip_planes.iter().enumerate() {
        if cp.enabled {
            while roles.get(next_free).is_some_and(|r| *r != UnitRole::Disabled) {
                next_free += 1;
            }
            if next_free >= MAX_TEXTURE_UNITS {
                return Err(GlError::ClipPlaneOverflow);
            }
            roles[next_free] = UnitRole::ClipPlane(plane);
        }
    }
    Ok(roles)
}

fn resolve_source(source: CombineSource, unit: usize, previous: u8) -> u8 {
    match source {
        CombineSource::Texture => cmd::RC_TEXTURE0 + unit as u8,
        CombineSource::Constant => cmd::RC_CONSTANT0,
        CombineSource::PrimaryColor => cmd::RC_PRIMARY_COLOR,
        CombineSource::Previous => previous,
    }
}

fn rgb_arg(env: &TexEnv, unit: usize, previous: u8, n: usize) -> StageInput {
    let op = env.operand_rgb[n];
    StageInput {
        source: resolve_source(env.src_rgb[n], unit, previous),
        alpha: op.takes_alpha(),
        invert: op.inverts(),
    }
}

fn alpha_arg(env: &TexEnv, unit: usize, previous: u8, n: usize) -> Result<StageInput> {
    let op = env.operand_alpha[n];
    if !op.takes_alpha() {
        return Err(GlError::InvalidEnum { context: "alpha combine operand", value: n as u32 });
    }
    Ok(StageInput {
        source: resolve_source(env.src_alpha[n], unit, previous),
        alpha: true,
        invert: op.inverts(),
    })
}

/// Wire one portion (RGB or alpha) of a combine-mode stage.
fn combine_portion(
    func: CombineFunc,
    arg: impl Fn(usize) -> StageInput,
) -> Result<([StageInput; 4], StageOutput)> {
    match func {
        CombineFunc::Replace => Ok((
            [arg(0), StageInput::ONE, StageInput::ZERO, StageInput::ZERO],
            StageOutput::AB,
        )),
        CombineFunc::Modulate => Ok((
            [arg(0), arg(1), StageInput::ZERO, StageInput::ZERO],
            StageOutput::AB,
        )),
        // arg0*arg2 + arg1*(1 - arg2)
        CombineFunc::Interpolate => {
            let mut inverted = arg(2);
            inverted.invert = !inverted.invert;
            Ok(([arg(0), arg(2), arg(1), inverted], StageOutput::SUM))
        }
        CombineFunc::Add | CombineFunc::AddSigned | CombineFunc::Subtract => {
            Err(GlError::Unsupported("combine function"))
        }
    }
}

/// Whether any argument of the stage reads the constant register.
fn uses_constant(env: &TexEnv) -> bool {
    env.src_rgb.contains(&CombineSource::Constant)
        || env.src_alpha.contains(&CombineSource::Constant)
}

fn compile_stage(
    env: &TexEnv,
    unit: usize,
    previous: u8,
    texture_has_alpha: bool,
) -> Result<CombinerStage> {
    let tex_rgb = StageInput::reg(cmd::RC_TEXTURE0 + unit as u8, false);
    let tex_alpha = StageInput::reg(cmd::RC_TEXTURE0 + unit as u8, true);
    let prev_rgb = StageInput::reg(previous, false);
    let prev_alpha = StageInput::reg(previous, true);

    match env.mode {
        TexEnvMode::Replace => Ok(CombinerStage {
            rgb_in: [tex_rgb, StageInput::ONE, StageInput::ZERO, StageInput::ZERO],
            rgb_out: StageOutput::AB,
            alpha_in: [
                if texture_has_alpha { tex_alpha } else { prev_alpha },
                StageInput::ONE,
                StageInput::ZERO,
                StageInput::ZERO,
            ],
            alpha_out: StageOutput::AB,
            factor: None,
        }),
        TexEnvMode::Modulate => Ok(CombinerStage {
            rgb_in: [prev_rgb, tex_rgb, StageInput::ZERO, StageInput::ZERO],
            rgb_out: StageOutput::AB,
            alpha_in: [
                prev_alpha,
                if texture_has_alpha { tex_alpha } else { StageInput::ONE },
                StageInput::ZERO,
                StageInput::ZERO,
            ],
            alpha_out: StageOutput::AB,
            factor: None,
        }),
        TexEnvMode::Combine => {
            let (rgb_in, rgb_out) =
                combine_portion(env.combine_rgb, |n| rgb_arg(env, unit, previous, n))?;
            let mut alpha_args = [StageInput::ZERO; 3];
            for (n, slot) in alpha_args.iter_mut().enumerate() {
                *slot = alpha_arg(env, unit, previous, n)?;
            }
            let (alpha_in, alpha_out) =
                combine_portion(env.combine_alpha, |n| alpha_args[n])?;
            Ok(CombinerStage {
                rgb_in,
                rgb_out,
                alpha_in,
                alpha_out,
                factor: uses_constant(env).then_some(env.color),
            })
        }
        // soft tier; the state setter never stores these
        TexEnvMode::Decal | TexEnvMode::Blend | TexEnvMode::Add => {
            Err(GlError::Unsupported("texture environment mode"))
        }
    }
}

/// Compile the full combiner program for the planned unit roles.
///
/// Sampling units chain through SPARE0; the first stage reads the
/// interpolated vertex color instead. With no sampling unit a single
/// pass-through stage still runs so the final combiner always has a
/// defined SPARE0.
pub fn compile(
    state: &GlState,
    objects: &ObjectTable,
    roles: &[UnitRole; MAX_TEXTURE_UNITS],
) -> Result<CombinerProgram> {
    let mut stages = Vec::new();
    let mut previous = cmd::RC_PRIMARY_COLOR;
    for (unit, role) in roles.iter().enumerate() {
        if *role != UnitRole::Sample {
            continue;
        }
        let has_alpha = objects.texture(state.units[unit].binding)?.format.has_alpha();
        stages.push(compile_stage(&state.units[unit].env, unit, previous, has_alpha)?);
        previous = cmd::RC_SPARE0;
    }
    if stages.is_empty() {
        let primary_rgb = StageInput::reg(cmd::RC_PRIMARY_COLOR, false);
        let primary_alpha = StageInput::reg(cmd::RC_PRIMARY_COLOR, true);
        stages.push(CombinerStage {
            rgb_in: [primary_rgb, StageInput::ONE, StageInput::ZERO, StageInput::ZERO],
            rgb_out: StageOutput::AB,
            alpha_in: [primary_alpha, StageInput::ONE, StageInput::ZERO, StageInput::ZERO],
            alpha_out: StageOutput::AB,
            factor: None,
        });
    }
    Ok(CombinerProgram { stages })
}

/// Emit a compiled program to the push buffer.
pub fn emit(program: &CombinerProgram, pb: &mut PushBuffer) -> Result<()> {
    for (i, stage) in program.stages.iter().enumerate() {
        let at = 4 * i as u32;
        pb.push(
            cmd::SET_COMBINER_COLOR_ICW + at,
            cmd::pack_icw(
                stage.rgb_in[0].pack(),
                stage.rgb_in[1].pack(),
                stage.rgb_in[2].pack(),
                stage.rgb_in[3].pack(),
            ),
        )?;
        pb.push(
            cmd::SET_COMBINER_COLOR_OCW + at,
            cmd::pack_ocw(stage.rgb_out.ab, stage.rgb_out.cd, stage.rgb_out.sum),
        )?;
        pb.push(
            cmd::SET_COMBINER_ALPHA_ICW + at,
            cmd::pack_icw(
                stage.alpha_in[0].pack(),
                stage.alpha_in[1].pack(),
                stage.alpha_in[2].pack(),
                stage.alpha_in[3].pack(),
            ),
        )?;
        pb.push(
            cmd::SET_COMBINER_ALPHA_OCW + at,
            cmd::pack_ocw(stage.alpha_out.ab, stage.alpha_out.cd, stage.alpha_out.sum),
        )?;
        if let Some(color) = stage.factor {
            pb.push(cmd::SET_COMBINER_FACTOR + at, cmd::pack_factor(color))?;
        }
    }
    pb.push(cmd::SET_COMBINER_CONTROL, program.stages.len() as u32)?;
    pb.push(
        cmd::SET_COMBINER_FINAL0,
        cmd::pack_final0(cmd::RC_SPARE0, false),
    )?;
    pb.push(
        cmd::SET_COMBINER_FINAL1,
        cmd::pack_final1(cmd::RC_SPARE0, true),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BaseFormat;
    use pyrite_hw::AddressSpace;

    fn state_with_texture(format: BaseFormat) -> (GlState, ObjectTable) {
        let mut objects = ObjectTable::new();
        let mut space = AddressSpace::new();
        let handle = objects.gen_textures(1)[0];
        let tx = objects.texture_mut(handle).unwrap();
        let bpp = format.source_bytes_per_pixel();
        crate::texture::upload(&mut space, tx, 2, 2, format, &vec![0u8; 4 * bpp]).unwrap();
        let mut state = GlState::new();
        state.units[0].enabled = true;
        state.units[0].binding = handle;
        (state, objects)
    }

    #[test]
    fn test_no_units_yields_pass_through() {
        let state = GlState::new();
        let objects = ObjectTable::new();
        let roles = plan_units(&state, &objects).unwrap();
        assert_eq!(roles, [UnitRole::Disabled; 4]);
        let program = compile(&state, &objects, &roles).unwrap();
        assert_eq!(program.stages.len(), 1);
        assert_eq!(program.stages[0].rgb_in[0].source, cmd::RC_PRIMARY_COLOR);
        assert_eq!(program.stages[0].rgb_out, StageOutput::AB);
    }

    #[test]
    fn test_incomplete_texture_skips_unit() {
        let mut state = GlState::new();
        let mut objects = ObjectTable::new();
        let handle = objects.gen_textures(1)[0];
        state.units[0].enabled = true;
        state.units[0].binding = handle;
        let roles = plan_units(&state, &objects).unwrap();
        assert_eq!(roles[0], UnitRole::Disabled);
    }

    #[test]
    fn test_modulate_closed_form() {
        let (state, objects) = state_with_texture(BaseFormat::Rgba);
        let roles = plan_units(&state, &objects).unwrap();
        let program = compile(&state, &objects, &roles).unwrap();
        assert_eq!(program.stages.len(), 1);
        let stage = &program.stages[0];
        // rgb = primary * texture0
        assert_eq!(stage.rgb_in[0].source, cmd::RC_PRIMARY_COLOR);
        assert_eq!(stage.rgb_in[1].source, cmd::RC_TEXTURE0);
        assert_eq!(stage.rgb_in[2], StageInput::ZERO);
        // alpha = primary.a * texture0.a
        assert!(stage.alpha_in[0].alpha);
        assert!(stage.alpha_in[1].alpha);
        assert_eq!(stage.factor, None);
    }

    #[test]
    fn test_modulate_without_alpha_passes_previous() {
        let (state, objects) = state_with_texture(BaseFormat::Rgb);
        let roles = plan_units(&state, &objects).unwrap();
        let program = compile(&state, &objects, &roles).unwrap();
        let stage = &program.stages[0];
        // no texture alpha: alpha = primary.a * 1
        assert_eq!(stage.alpha_in[1], StageInput::ONE);
    }

    #[test]
    fn test_replace_takes_texture_alpha() {
        let (mut state, objects) = state_with_texture(BaseFormat::LuminanceAlpha);
        state.units[0].env.mode = TexEnvMode::Replace;
        let roles = plan_units(&state, &objects).unwrap();
        let program = compile(&state, &objects, &roles).unwrap();
        let stage = &program.stages[0];
        assert_eq!(stage.alpha_in[0].source, cmd::RC_TEXTURE0);
        assert!(stage.alpha_in[0].alpha);
    }

    #[test]
    fn test_interpolate_wiring() {
        let (mut state, objects) = state_with_texture(BaseFormat::Rgba);
        let env = &mut state.units[0].env;
        env.mode = TexEnvMode::Combine;
        env.combine_rgb = CombineFunc::Interpolate;
        env.combine_alpha = CombineFunc::Replace;
        let roles = plan_units(&state, &objects).unwrap();
        let program = compile(&state, &objects, &roles).unwrap();
        let stage = &program.stages[0];
        // a*b + c*d with d = 1 - b
        assert_eq!(stage.rgb_out, StageOutput::SUM);
        assert_eq!(stage.rgb_in[1].source, stage.rgb_in[3].source);
        assert!(!stage.rgb_in[1].invert);
        assert!(stage.rgb_in[3].invert);
        // constant is the default third source, so the factor rides along
        assert_eq!(stage.factor, Some([0.0; 4]));
    }

    #[test]
    fn test_clip_planes_take_free_units() {
        let (mut state, objects) = state_with_texture(BaseFormat::Rgba);
        state.clip_planes[0].enabled = true;
        state.clip_planes[2].enabled = true;
        let roles = plan_units(&state, &objects).unwrap();
        assert_eq!(roles[0], UnitRole::Sample);
        assert_eq!(roles[1], UnitRole::ClipPlane(0));
        assert_eq!(roles[2], UnitRole::ClipPlane(2));
        assert_eq!(roles[3], UnitRole::Disabled);
    }

    #[test]
    fn test_clip_planes_skip_middle_sampler() {
        let (mut state, objects) = state_with_texture(BaseFormat::Rgba);
        // sampler sits on unit 1, leaving 0 free ahead of it
        state.units[1].enabled = true;
        state.units[1].binding = state.units[0].binding;
        state.units[0].enabled = false;
        state.clip_planes[0].enabled = true;
        state.clip_planes[1].enabled = true;
        let roles = plan_units(&state, &objects).unwrap();
        assert_eq!(roles[0], UnitRole::ClipPlane(0));
        assert_eq!(roles[1], UnitRole::Sample);
        assert_eq!(roles[2], UnitRole::ClipPlane(1));
        assert_eq!(roles[3], UnitRole::Disabled);
    }

    #[test]
    fn test_clip_plane_overflow() {
        let mut state = GlState::new();
        let objects = ObjectTable::new();
        for cp in &mut state.clip_planes {
            cp.enabled = true;
        }
        // 3 planes fit in 4 units even with no samplers
        assert!(plan_units(&state, &objects).is_ok());
        // but not when samplers crowd them out
        let (mut state, objects) = state_with_texture(BaseFormat::Rgba);
        state.units[1].enabled = true;
        state.units[1].binding = state.units[0].binding;
        state.units[2].enabled = true;
        state.units[2].binding = state.units[0].binding;
        for cp in &mut state.clip_planes {
            cp.enabled = true;
        }
        assert_eq!(plan_units(&state, &objects), Err(GlError::ClipPlaneOverflow));
    }

    #[test]
    fn test_compile_is_deterministic() {
        let (mut state, objects) = state_with_texture(BaseFormat::Rgba);
        state.units[0].env.mode = TexEnvMode::Combine;
        let roles = plan_units(&state, &objects).unwrap();
        let a = compile(&state, &objects, &roles).unwrap();
        let b = compile(&state, &objects, &roles).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_second_stage_chains_through_spare() {
        let (mut state, objects) = state_with_texture(BaseFormat::Rgba);
        state.units[1].enabled = true;
        state.units[1].binding = state.units[0].binding;
        let roles = plan_units(&state, &objects).unwrap();
        let program = compile(&state, &objects, &roles).unwrap();
        assert_eq!(program.stages.len(), 2);
        assert_eq!(program.stages[1].rgb_in[0].source, cmd::RC_SPARE0);
        assert_eq!(program.stages[1].rgb_in[1].source, cmd::RC_TEXTURE0 + 1);
    }

    #[test]
    fn test_emit_writes_control_words() {
        let (state, objects) = state_with_texture(BaseFormat::Rgba);
        let roles = plan_units(&state, &objects).unwrap();
        let program = compile(&state, &objects, &roles).unwrap();
        let mut pb = PushBuffer::new(256, Box::new(pyrite_hw::NullTransport::default()));
        emit(&program, &mut pb).unwrap();
        let words = pb.words();
        let at = words.iter().position(|&w| w == cmd::SET_COMBINER_CONTROL).unwrap();
        assert_eq!(words[at + 1], 1);
    }
}
