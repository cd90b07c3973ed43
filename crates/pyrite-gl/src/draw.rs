//! Draw dispatcher
//!
//! A draw call runs a fixed six-step commit: drain the previous batch,
//! commit vertex attributes, commit matrices, compile and emit lighting,
//! commit textures with the combiner program, then emit the primitive
//! commands. Any hard error aborts the draw with no primitive emitted; the
//! batch already written is harmless because the primitive command is last.

use pyrite_core::{GlError, Result};
use pyrite_hw::cmd;
use pyrite_hw::PushBuffer;
use std::time::Duration;
use tracing::warn;

use crate::context::GraphicsContext;
use crate::matrix::Mat4;
use crate::objects::ObjectTable;
use crate::state::{AttribBinding, AttribSource, MAX_TEXTURE_UNITS};
use crate::lighting;
use crate::texenv::{self, UnitRole};
use crate::types::{IndexType, Primitive};

/// Hardware attribute slots for the fixed-function inputs.
pub const ATTR_VERTEX: u32 = 0;
pub const ATTR_NORMAL: u32 = 2;
pub const ATTR_COLOR: u32 = 3;
pub const ATTR_TEXCOORD0: u32 = 9;

/// Bytes of the per-draw staging window for client arrays.
pub(crate) const STAGING_BYTES: usize = 1 << 20;

/// Dispatcher phase, tracked so state setters can assert they are not
/// re-entered from inside a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    Compiling,
}

/// Per-frame counters, reported and cleared at `end_frame`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameStats {
    pub draw_calls: u32,
    pub bytes: usize,
    pub build_time: Duration,
    pub sync_time: Duration,
}

impl FrameStats {
    pub(crate) fn accumulate(&mut self, batch: pyrite_hw::BatchStats) {
        self.bytes += batch.bytes;
        self.build_time += batch.build_time;
        self.sync_time += batch.sync_time;
    }
}

/// Largest byte offset an element run can touch, given the draw range.
fn span_bytes(binding: &AttribBinding, first: u32, count: u32) -> usize {
    let last = (first + count - 1) as usize;
    last * binding.effective_stride() + binding.element_bytes()
}

/// Commit one attribute slot: stream format and address when the array is
/// enabled, constant value otherwise.
fn commit_attrib(
    pb: &mut PushBuffer,
    objects: &ObjectTable,
    staging: &mut Vec<u8>,
    staging_addr: u32,
    slot: u32,
    binding: &AttribBinding,
    range: Option<(u32, u32)>,
) -> Result<()> {
    if !binding.enabled {
        pb.push_f32s(cmd::SET_VERTEX_DATA4F + slot * 0x10, &binding.value)?;
        return Ok(());
    }
    let addr = match &binding.source {
        AttribSource::None => return Err(GlError::Unsupported("enabled array without pointer")),
        AttribSource::Buffer { handle, offset } => {
            let buffer = objects.buffer(*handle)?;
            if !buffer.is_allocated() {
                return Err(GlError::InvalidHandle(*handle));
            }
            if let Some((first, count)) = range {
                let needed = offset + span_bytes(binding, first, count);
                if needed > buffer.data.len() {
                    return Err(GlError::ArrayOutOfBounds {
                        needed,
                        size: buffer.data.len(),
                    });
                }
            }
            buffer.gpu_addr + *offset as u32
        }
        AttribSource::Client(data) => {
            if let Some((first, count)) = range {
                let needed = span_bytes(binding, first, count);
                if needed > data.len() {
                    return Err(GlError::ArrayOutOfBounds { needed, size: data.len() });
                }
            }
            if staging.len() + data.len() > STAGING_BYTES {
                return Err(GlError::UploadOutOfBounds {
                    offset: staging.len(),
                    len: data.len(),
                    size: STAGING_BYTES,
                });
            }
            let addr = staging_addr + staging.len() as u32;
            staging.extend_from_slice(data);
            addr
        }
    };
    pb.push(
        cmd::SET_VERTEX_ARRAY_FORMAT + slot * 4,
        cmd::pack_array_format(
            binding.ty.to_hw(),
            binding.size,
            binding.effective_stride() as u32,
        ),
    )?;
    pb.push(cmd::SET_VERTEX_ARRAY_OFFSET + slot * 4, addr)?;
    Ok(())
}

impl GraphicsContext {
    /// Steps 1 through 5 of the commit. `range` carries the vertex span for
    /// array draws; indexed draws pass `None` and rely on buffer-level
    /// validation only.
    pub(crate) fn commit_draw_state(&mut self, range: Option<(u32, u32)>) -> Result<()> {
        // step 1: drain the previous batch and charge it to the frame
        let batch = self.pb.reset();
        self.frame_stats.accumulate(batch);

        // step 2: attributes; every slot is reset so stale streams from the
        // previous draw cannot leak in
        self.staging.clear();
        for slot in 0..cmd::MAX_VERTEX_ATTRIBS {
            self.pb.push(
                cmd::SET_VERTEX_ARRAY_FORMAT + slot * 4,
                cmd::pack_array_format(cmd::ATTRIB_TYPE_FLOAT, 0, 0),
            )?;
        }
        commit_attrib(
            &mut self.pb,
            &self.objects,
            &mut self.staging,
            self.staging_addr,
            ATTR_VERTEX,
            &self.state.vertex_array,
            range,
        )?;
        commit_attrib(
            &mut self.pb,
            &self.objects,
            &mut self.staging,
            self.staging_addr,
            ATTR_NORMAL,
            &self.state.normal_array,
            range,
        )?;
        commit_attrib(
            &mut self.pb,
            &self.objects,
            &mut self.staging,
            self.staging_addr,
            ATTR_COLOR,
            &self.state.color_array,
            range,
        )?;
        for unit in 0..MAX_TEXTURE_UNITS {
            commit_attrib(
                &mut self.pb,
                &self.objects,
                &mut self.staging,
                self.staging_addr,
                ATTR_TEXCOORD0 + unit as u32,
                &self.state.texcoord_arrays[unit],
                range,
            )?;
        }

        // step 3: matrices
        let mv = *self.matrices.modelview.top();
        mv.check_finite()?;
        let projection = *self.matrices.projection.top();
        projection.check_finite()?;
        let inverse_mv = mv.invert().unwrap_or_else(|| {
            warn!("singular modelview, lighting transforms degrade to identity");
            Mat4::IDENTITY
        });
        let screen_proj = self.viewport_matrix.mul(&projection);
        self.pb.push_matrix(cmd::SET_MODEL_VIEW_MATRIX, &mv.0)?;
        self.pb
            .push_matrix(cmd::SET_INVERSE_MODEL_VIEW_MATRIX, &inverse_mv.0)?;
        self.pb
            .push_matrix(cmd::SET_PROJECTION_MATRIX, &screen_proj.transposed().0)?;
        self.pb.push_matrix(
            cmd::SET_COMPOSITE_MATRIX,
            &screen_proj.mul(&mv).transposed().0,
        )?;
        // screen mapping is folded into the projection, so the viewport
        // transform itself is the identity
        self.pb.push_f32s(cmd::SET_VIEWPORT_OFFSET, &[0.0; 4])?;
        self.pb.push_f32s(cmd::SET_VIEWPORT_SCALE, &[1.0; 4])?;

        // step 4: lighting
        let light_program = lighting::compile(&self.state)?;
        lighting::emit(&light_program, &mut self.pb)?;

        // step 5: textures, clip planes and the combiner program
        let roles = texenv::plan_units(&self.state, &self.objects)?;
        let mut stage_codes = [cmd::STAGE_NONE; 4];
        for (unit, role) in roles.iter().enumerate() {
            let base = cmd::texture_base(unit as u32);
            match role {
                UnitRole::Sample => {
                    stage_codes[unit] = cmd::STAGE_2D_PROJECTIVE;
                    self.commit_sampler(unit, base)?;
                }
                UnitRole::ClipPlane(plane) => {
                    stage_codes[unit] = cmd::STAGE_CLIP_PLANE;
                    // the unit interpolates the plane's signed distance from
                    // a constant texcoord holding the eye-space equation; a
                    // texcoord array committed for this slot in step 2 would
                    // override the constant, so the format word is reset first
                    let slot = ATTR_TEXCOORD0 + unit as u32;
                    self.pb.push(
                        cmd::SET_VERTEX_ARRAY_FORMAT + slot * 4,
                        cmd::pack_array_format(cmd::ATTRIB_TYPE_FLOAT, 0, 0),
                    )?;
                    self.pb.push_f32s(
                        cmd::SET_VERTEX_DATA4F + slot * 0x10,
                        &self.state.clip_planes[*plane].equation,
                    )?;
                    self.pb
                        .push(base + cmd::TEXTURE_CONTROL, cmd::pack_texture_control(false, 0, 0))?;
                    self.pb.push(base + cmd::TEXTURE_MATRIX_ENABLE, 0)?;
                }
                UnitRole::Disabled => {
                    self.pb
                        .push(base + cmd::TEXTURE_CONTROL, cmd::pack_texture_control(false, 0, 0))?;
                    self.pb.push(base + cmd::TEXTURE_MATRIX_ENABLE, 0)?;
                }
            }
        }
        self.pb
            .push(cmd::SET_SHADER_STAGE_PROGRAM, cmd::pack_shader_stages(stage_codes))?;
        let combiner = texenv::compile(&self.state, &self.objects, &roles)?;
        texenv::emit(&combiner, &mut self.pb)?;
        Ok(())
    }

    /// Commit the sampler registers of one unit in the `Sample` role.
    fn commit_sampler(&mut self, unit: usize, base: u32) -> Result<()> {
        let unit_state = self.state.units[unit];
        let tx = self.objects.texture(unit_state.binding)?;
        let max_lod = if tx.min_filter.uses_mipmaps() { tx.mip_levels - 1 } else { 0 };
        self.pb.push(base + cmd::TEXTURE_OFFSET, tx.gpu_addr)?;
        self.pb.push(
            base + cmd::TEXTURE_FORMAT,
            cmd::pack_texture_format(
                tx.format.to_hw(),
                tx.mip_levels,
                tx.width_shift,
                tx.height_shift,
            ),
        )?;
        self.pb.push(
            base + cmd::TEXTURE_ADDRESS,
            cmd::pack_texture_address(tx.wrap_s.to_hw()?, tx.wrap_t.to_hw()?),
        )?;
        self.pb.push(
            base + cmd::TEXTURE_CONTROL,
            cmd::pack_texture_control(true, 0, max_lod),
        )?;
        self.pb.push(
            base + cmd::TEXTURE_FILTER,
            cmd::pack_texture_filter(tx.min_filter.to_hw(), tx.mag_filter.to_hw()),
        )?;

        let texgen_s = if unit_state.texgen_s_enabled {
            unit_state.texgen_s.to_hw()?
        } else {
            cmd::TEXGEN_DISABLE
        };
        let texgen_t = if unit_state.texgen_t_enabled {
            unit_state.texgen_t.to_hw()?
        } else {
            cmd::TEXGEN_DISABLE
        };
        self.pb.push(base + cmd::TEXGEN_S, texgen_s)?;
        self.pb.push(base + cmd::TEXGEN_T, texgen_t)?;
        self.pb.push(base + cmd::TEXGEN_R, cmd::TEXGEN_DISABLE)?;
        self.pb.push(base + cmd::TEXGEN_Q, cmd::TEXGEN_DISABLE)?;

        let texture_matrix = *self.matrices.texture[unit].top();
        texture_matrix.check_finite()?;
        let identity = texture_matrix == Mat4::IDENTITY;
        self.pb
            .push(base + cmd::TEXTURE_MATRIX_ENABLE, (!identity) as u32)?;
        if !identity {
            self.pb.push_matrix(
                cmd::SET_TEXTURE_MATRIX + unit as u32 * cmd::TEXTURE_MATRIX_STRIDE,
                &texture_matrix.transposed().0,
            )?;
        }
        Ok(())
    }

    /// Draw `count` vertices from the enabled arrays starting at `first`.
    pub fn draw_arrays(&mut self, primitive: Primitive, first: u32, count: u32) -> Result<()> {
        let hw_primitive = primitive.to_hw()?;
        if count == 0 {
            return Ok(());
        }
        self.dispatch = DispatchState::Compiling;
        let result = self.dispatch_arrays(hw_primitive, first, count);
        self.dispatch = DispatchState::Idle;
        result
    }

    fn dispatch_arrays(&mut self, hw_primitive: u32, first: u32, count: u32) -> Result<()> {
        self.commit_draw_state(Some((first, count)))?;
        // step 6: primitive commands
        self.pb.push(cmd::SET_BEGIN_END, hw_primitive)?;
        let mut at = first;
        let mut left = count;
        while left > 0 {
            let batch = left.min(cmd::DRAW_BATCH_MAX);
            self.pb.push(cmd::DRAW_ARRAYS_BATCH, cmd::pack_draw_batch(at, batch))?;
            at += batch;
            left -= batch;
        }
        self.pb.push(cmd::SET_BEGIN_END, cmd::PRIMITIVE_END)?;
        self.frame_stats.draw_calls += 1;
        Ok(())
    }

    /// Draw indexed vertices from the bound element array buffer.
    ///
    /// Indices are 16-bit; `offset` is a byte offset into the buffer.
    pub fn draw_elements(
        &mut self,
        primitive: Primitive,
        count: u32,
        index_type: IndexType,
        offset: usize,
    ) -> Result<()> {
        let hw_primitive = primitive.to_hw()?;
        if index_type == IndexType::UnsignedInt {
            return Err(GlError::Unsupported("32-bit indices"));
        }
        if count == 0 {
            return Ok(());
        }
        let handle = self.state.element_array_buffer;
        let buffer = self.objects.buffer(handle)?;
        let needed = offset + count as usize * 2;
        if needed > buffer.data.len() {
            return Err(GlError::ArrayOutOfBounds { needed, size: buffer.data.len() });
        }
        let indices: Vec<u16> = buffer.data[offset..needed]
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        self.dispatch = DispatchState::Compiling;
        let result = self.dispatch_elements(hw_primitive, &indices);
        self.dispatch = DispatchState::Idle;
        result
    }

    /// Draw indexed vertices from a caller-provided index slice.
    pub fn draw_elements_client(
        &mut self,
        primitive: Primitive,
        indices: &[u16],
    ) -> Result<()> {
        let hw_primitive = primitive.to_hw()?;
        if indices.is_empty() {
            return Ok(());
        }
        self.dispatch = DispatchState::Compiling;
        let result = self.dispatch_elements(hw_primitive, indices);
        self.dispatch = DispatchState::Idle;
        result
    }

    fn dispatch_elements(&mut self, hw_primitive: u32, indices: &[u16]) -> Result<()> {
        self.commit_draw_state(None)?;
        self.pb.push(cmd::SET_BEGIN_END, hw_primitive)?;
        let mut pairs = indices.chunks_exact(2);
        for pair in &mut pairs {
            self.pb
                .push(cmd::ARRAY_ELEMENT16, cmd::pack_element_pair(pair[0], pair[1]))?;
        }
        if let [last] = pairs.remainder() {
            self.pb.push(cmd::ARRAY_ELEMENT32, *last as u32)?;
        }
        self.pb.push(cmd::SET_BEGIN_END, cmd::PRIMITIVE_END)?;
        self.frame_stats.draw_calls += 1;
        Ok(())
    }
}
