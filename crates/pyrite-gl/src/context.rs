//! The graphics context: driver ownership and the API call surface
//!
//! One [`GraphicsContext`] owns everything: shadowed state, object table,
//! matrix engine, GPU address space and push buffer. There is no global;
//! callers thread the context explicitly. Most setters only mutate shadowed
//! state and are compiled at draw time; render-test toggles write their
//! register immediately since they need no compilation.

use pyrite_core::{soft_unimplemented, DriverConfig, GlError, Result};
use pyrite_hw::{cmd, AddressSpace, GpuTransport, PushBuffer};
use tracing::{debug, info};

use crate::draw::{DispatchState, FrameStats, STAGING_BYTES};
use crate::matrix::{Mat4, MatrixEngine};
use crate::objects::{Handle, ObjectTable, TextureObject};
use crate::state::{AttribBinding, AttribSource, GlState, Light, MAX_CLIP_PLANES, MAX_TEXTURE_UNITS};
use crate::types::{
    BaseFormat, BlendFactor, BufferTarget, Cap, ClearMask, ClientArray, ColorMaterialMode,
    CombineFunc, CombineOperand, CombineSource, CompareFunc, CullFaceMode, ElementType, FaceSel,
    FrontFace, MatrixMode, Query, StencilOp, TexCoordAxis, TexEnvMode, TexGenMode,
    TextureFilter, TextureWrap,
};

pub struct GraphicsContext {
    pub config: DriverConfig,
    pub state: GlState,
    pub objects: ObjectTable,
    pub matrices: MatrixEngine,
    pub pb: PushBuffer,
    pub(crate) space: AddressSpace,
    pub(crate) viewport_matrix: Mat4,
    pub(crate) dispatch: DispatchState,
    pub(crate) staging: Vec<u8>,
    pub(crate) staging_addr: u32,
    pub(crate) frame_stats: FrameStats,
    frame: u64,
    clear_color: [f32; 4],
    clear_depth: f32,
    clear_stencil: u32,
}

impl GraphicsContext {
    /// Build a context and emit the initial render state.
    pub fn new(config: DriverConfig, transport: Box<dyn GpuTransport>) -> Result<Self> {
        let mut space = AddressSpace::new();
        let staging_addr = space.alloc(STAGING_BYTES, 64)?;

        // fold the screen mapping into a projection prefix: x to pixels,
        // y flipped, z to the fixed-point depth range
        let w = config.framebuffer_width as f32;
        let h = config.framebuffer_height as f32;
        let mut viewport_matrix = Mat4::IDENTITY;
        viewport_matrix.0[0] = w / 2.0;
        viewport_matrix.0[5] = -h / 2.0;
        viewport_matrix.0[10] = config.max_z / 2.0;
        viewport_matrix.0[12] = w / 2.0;
        viewport_matrix.0[13] = h / 2.0;
        viewport_matrix.0[14] = config.max_z / 2.0;

        let pb = PushBuffer::new(config.push_buffer_words, transport);
        let mut ctx = Self {
            config,
            state: GlState::new(),
            objects: ObjectTable::new(),
            matrices: MatrixEngine::new(),
            pb,
            space,
            viewport_matrix,
            dispatch: DispatchState::Idle,
            staging: Vec::new(),
            staging_addr,
            frame_stats: FrameStats::default(),
            frame: 0,
            clear_color: [0.0; 4],
            clear_depth: 1.0,
            clear_stencil: 0,
        };

        ctx.front_face(FrontFace::Cw)?;
        ctx.cull_face(CullFaceMode::Back)?;
        ctx.depth_func(CompareFunc::Less)?;
        ctx.depth_mask(true)?;
        ctx.blend_func(BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha)?;
        ctx.stencil_func(CompareFunc::Always, 0, 0xFF)?;
        ctx.stencil_op(StencilOp::Keep, StencilOp::Keep, StencilOp::Keep)?;
        ctx.stencil_mask(0xFF)?;
        ctx.color_mask(true, true, true, true)?;
        info!(
            width = ctx.config.framebuffer_width,
            height = ctx.config.framebuffer_height,
            "graphics context initialized"
        );
        Ok(ctx)
    }

    pub fn frame_stats(&self) -> FrameStats {
        self.frame_stats
    }

    // ------------------------------------------------------------------
    // capabilities

    pub fn enable(&mut self, cap: Cap) -> Result<()> {
        self.set_cap(cap, true)
    }

    pub fn disable(&mut self, cap: Cap) -> Result<()> {
        self.set_cap(cap, false)
    }

    fn set_cap(&mut self, cap: Cap, on: bool) -> Result<()> {
        match cap {
            Cap::AlphaTest => self.pb.push(cmd::SET_ALPHA_TEST_ENABLE, on as u32)?,
            Cap::Blend => self.pb.push(cmd::SET_BLEND_ENABLE, on as u32)?,
            Cap::CullFace => self.pb.push(cmd::SET_CULL_FACE_ENABLE, on as u32)?,
            Cap::DepthTest => self.pb.push(cmd::SET_DEPTH_TEST_ENABLE, on as u32)?,
            Cap::StencilTest => self.pb.push(cmd::SET_STENCIL_TEST_ENABLE, on as u32)?,
            Cap::PolygonOffsetFill => soft_unimplemented!("polygon offset fill"),
            Cap::PointSprite => soft_unimplemented!("point sprites"),
            Cap::Normalize => {
                self.state.normalize_enabled = on;
                self.pb.push(cmd::SET_NORMALIZATION_ENABLE, on as u32)?;
            }
            Cap::Lighting => {
                self.state.lighting_enabled = on;
                self.pb.push(cmd::SET_LIGHTING_ENABLE, on as u32)?;
            }
            Cap::ColorMaterial => self.state.color_material_enabled = on,
            Cap::Texture2d => self.state.units[self.state.active_unit].enabled = on,
            Cap::TexGenS => self.state.units[self.state.active_unit].texgen_s_enabled = on,
            Cap::TexGenT => self.state.units[self.state.active_unit].texgen_t_enabled = on,
            Cap::Light(i) => self.light_mut(i)?.enabled = on,
            Cap::ClipPlane(i) => {
                if i >= MAX_CLIP_PLANES {
                    return Err(GlError::InvalidEnum {
                        context: "clip plane index",
                        value: i as u32,
                    });
                }
                self.state.clip_planes[i].enabled = on;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // render tests and raster state

    pub fn depth_func(&mut self, func: CompareFunc) -> Result<()> {
        self.pb.push(cmd::SET_DEPTH_FUNC, func.to_hw())
    }

    pub fn depth_mask(&mut self, write: bool) -> Result<()> {
        self.pb.push(cmd::SET_DEPTH_MASK, write as u32)
    }

    pub fn alpha_func(&mut self, _func: CompareFunc, _reference: f32) {
        soft_unimplemented!("alpha test function");
    }

    pub fn blend_func(&mut self, src: BlendFactor, dst: BlendFactor) -> Result<()> {
        let (src, dst) = (src.to_hw()?, dst.to_hw()?);
        self.pb.push(cmd::SET_BLEND_FUNC_SFACTOR, src)?;
        self.pb.push(cmd::SET_BLEND_FUNC_DFACTOR, dst)
    }

    pub fn stencil_func(&mut self, func: CompareFunc, reference: u32, mask: u32) -> Result<()> {
        self.pb.push(cmd::SET_STENCIL_FUNC, func.to_hw())?;
        self.pb.push(cmd::SET_STENCIL_FUNC_REF, reference)?;
        self.pb.push(cmd::SET_STENCIL_FUNC_MASK, mask)
    }

    pub fn stencil_op(&mut self, fail: StencilOp, zfail: StencilOp, zpass: StencilOp) -> Result<()> {
        let words = [fail.to_hw()?, zfail.to_hw()?, zpass.to_hw()?];
        self.pb.push(cmd::SET_STENCIL_OP_FAIL, words[0])?;
        self.pb.push(cmd::SET_STENCIL_OP_ZFAIL, words[1])?;
        self.pb.push(cmd::SET_STENCIL_OP_ZPASS, words[2])
    }

    pub fn stencil_mask(&mut self, mask: u32) -> Result<()> {
        self.pb.push(cmd::SET_STENCIL_MASK, mask)
    }

    pub fn color_mask(&mut self, r: bool, g: bool, b: bool, a: bool) -> Result<()> {
        let mut mask = cmd::ColorMask::empty();
        mask.set(cmd::ColorMask::RED, r);
        mask.set(cmd::ColorMask::GREEN, g);
        mask.set(cmd::ColorMask::BLUE, b);
        mask.set(cmd::ColorMask::ALPHA, a);
        self.pb.push(cmd::SET_COLOR_MASK, mask.bits())
    }

    pub fn cull_face(&mut self, mode: CullFaceMode) -> Result<()> {
        self.pb.push(cmd::SET_CULL_FACE, mode.to_hw())
    }

    pub fn front_face(&mut self, mode: FrontFace) -> Result<()> {
        self.pb.push(cmd::SET_FRONT_FACE, mode.to_hw())
    }

    pub fn polygon_offset(&mut self, _factor: f32, _units: f32) {
        soft_unimplemented!("polygon offset");
    }

    pub fn point_size(&mut self, _size: f32) {
        soft_unimplemented!("point size");
    }

    pub fn point_parameter(&mut self, _param: f32) {
        soft_unimplemented!("point parameters");
    }

    pub fn line_width(&mut self, _width: f32) {
        soft_unimplemented!("line width");
    }

    pub fn shade_model_flat(&mut self) {
        soft_unimplemented!("flat shading");
    }

    pub fn scissor(&mut self, _x: i32, _y: i32, _width: u32, _height: u32) {
        soft_unimplemented!("scissor rect");
    }

    /// The screen mapping is baked into the projection at context creation;
    /// only the full-framebuffer viewport is expressible.
    pub fn viewport(&mut self, x: i32, y: i32, width: u32, height: u32) -> Result<()> {
        if x != 0
            || y != 0
            || width != self.config.framebuffer_width
            || height != self.config.framebuffer_height
        {
            return Err(GlError::Unsupported("viewport not matching the framebuffer"));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // clears

    pub fn clear_color(&mut self, r: f32, g: f32, b: f32, a: f32) -> Result<()> {
        for v in [r, g, b, a] {
            if !(0.0..=1.0).contains(&v) {
                return Err(GlError::ColorOutOfRange(v));
            }
        }
        self.clear_color = [r, g, b, a];
        Ok(())
    }

    pub fn clear_depth(&mut self, depth: f32) -> Result<()> {
        if !(0.0..=1.0).contains(&depth) {
            return Err(GlError::ColorOutOfRange(depth));
        }
        self.clear_depth = depth;
        Ok(())
    }

    pub fn clear_stencil(&mut self, value: u32) {
        self.clear_stencil = value & 0xFF;
    }

    pub fn clear(&mut self, mask: ClearMask) -> Result<()> {
        if mask.is_empty() {
            return Ok(());
        }
        let mut flags = cmd::ClearSurface::empty();
        flags.set(cmd::ClearSurface::COLOR, mask.contains(ClearMask::COLOR));
        flags.set(cmd::ClearSurface::Z, mask.contains(ClearMask::DEPTH));
        flags.set(cmd::ClearSurface::STENCIL, mask.contains(ClearMask::STENCIL));

        let right = self.config.framebuffer_width - 1;
        let bottom = self.config.framebuffer_height - 1;
        self.pb.push(cmd::SET_CLEAR_RECT_HORIZONTAL, right << 16)?;
        self.pb.push(cmd::SET_CLEAR_RECT_VERTICAL, bottom << 16)?;
        self.pb
            .push(cmd::SET_COLOR_CLEAR_VALUE, cmd::pack_factor(self.clear_color))?;
        let depth_bits = (self.clear_depth * self.config.max_z) as u32;
        self.pb
            .push(cmd::SET_ZSTENCIL_CLEAR_VALUE, (depth_bits << 8) | self.clear_stencil)?;
        self.pb.push(cmd::CLEAR_SURFACE, flags.bits())
    }

    // ------------------------------------------------------------------
    // matrix API

    pub fn matrix_mode(&mut self, mode: MatrixMode) {
        self.matrices.mode = mode;
    }

    pub fn load_identity(&mut self) -> Result<()> {
        self.matrices.edit(self.state.client_active_unit, |m| *m = Mat4::IDENTITY)
    }

    pub fn load_matrix(&mut self, values: &[f32; 16]) -> Result<()> {
        self.matrices.edit(self.state.client_active_unit, |m| *m = Mat4(*values))
    }

    pub fn mult_matrix(&mut self, values: &[f32; 16]) -> Result<()> {
        let rhs = Mat4(*values);
        self.matrices.edit(self.state.client_active_unit, |m| *m = m.mul(&rhs))
    }

    pub fn push_matrix(&mut self) -> Result<()> {
        self.matrices.current_mut(self.state.client_active_unit).push()
    }

    pub fn pop_matrix(&mut self) -> Result<()> {
        self.matrices.current_mut(self.state.client_active_unit).pop()
    }

    pub fn translate(&mut self, x: f32, y: f32, z: f32) -> Result<()> {
        self.matrices.edit(self.state.client_active_unit, |m| m.translate(x, y, z))
    }

    pub fn rotate(&mut self, angle: f32, x: f32, y: f32, z: f32) -> Result<()> {
        self.matrices.edit(self.state.client_active_unit, |m| m.rotate(angle, x, y, z))
    }

    pub fn scale(&mut self, x: f32, y: f32, z: f32) -> Result<()> {
        self.matrices.edit(self.state.client_active_unit, |m| m.scale(x, y, z))
    }

    pub fn ortho(&mut self, l: f32, r: f32, b: f32, t: f32, n: f32, f: f32) -> Result<()> {
        let rhs = Mat4::ortho(l, r, b, t, n, f);
        self.matrices.edit(self.state.client_active_unit, |m| *m = m.mul(&rhs))
    }

    pub fn frustum(&mut self, l: f32, r: f32, b: f32, t: f32, n: f32, f: f32) -> Result<()> {
        let rhs = Mat4::frustum(l, r, b, t, n, f);
        self.matrices.edit(self.state.client_active_unit, |m| *m = m.mul(&rhs))
    }

    pub fn modelview_matrix(&self) -> [f32; 16] {
        self.matrices.modelview.top().0
    }

    pub fn projection_matrix(&self) -> [f32; 16] {
        self.matrices.projection.top().0
    }

    // ------------------------------------------------------------------
    // lighting and materials

    fn light_mut(&mut self, index: usize) -> Result<&mut Light> {
        self.state.lights.get_mut(index).ok_or(GlError::InvalidEnum {
            context: "light index",
            value: index as u32,
        })
    }

    /// Set a light's position, transformed to eye space by the current
    /// modelview. A w of zero makes the light directional for good.
    pub fn light_position(&mut self, index: usize, position: [f32; 4]) -> Result<()> {
        let eye = self.matrices.modelview.top().mul_vec4(position);
        let light = self.light_mut(index)?;
        if position[3] == 0.0 {
            light.directional = true;
            light.position = [eye[0], eye[1], eye[2]];
        } else {
            light.directional = false;
            light.position = [eye[0] / eye[3], eye[1] / eye[3], eye[2] / eye[3]];
        }
        Ok(())
    }

    pub fn light_ambient(&mut self, index: usize, color: [f32; 4]) -> Result<()> {
        self.light_mut(index)?.ambient = color;
        Ok(())
    }

    pub fn light_diffuse(&mut self, index: usize, color: [f32; 4]) -> Result<()> {
        self.light_mut(index)?.diffuse = color;
        Ok(())
    }

    pub fn light_specular(&mut self, index: usize, color: [f32; 4]) -> Result<()> {
        self.light_mut(index)?.specular = color;
        Ok(())
    }

    /// Spot direction, rotated into eye space by the modelview basis.
    pub fn light_spot_direction(&mut self, index: usize, direction: [f32; 3]) -> Result<()> {
        let eye = self
            .matrices
            .modelview
            .top()
            .mul_vec4([direction[0], direction[1], direction[2], 0.0]);
        self.light_mut(index)?.spot_direction = [eye[0], eye[1], eye[2]];
        Ok(())
    }

    pub fn light_spot_exponent(&mut self, index: usize, exponent: f32) -> Result<()> {
        self.light_mut(index)?.spot_exponent = exponent;
        Ok(())
    }

    /// Cutoff in degrees: a cone half-angle up to 90, or 180 for none.
    pub fn light_spot_cutoff(&mut self, index: usize, cutoff: f32) -> Result<()> {
        if !(0.0..=90.0).contains(&cutoff) && cutoff != 180.0 {
            return Err(GlError::InvalidEnum {
                context: "spot cutoff",
                value: cutoff as u32,
            });
        }
        self.light_mut(index)?.spot_cutoff = cutoff;
        Ok(())
    }

    pub fn light_attenuation(
        &mut self,
        index: usize,
        constant: f32,
        linear: f32,
        quadratic: f32,
    ) -> Result<()> {
        self.light_mut(index)?.attenuation = [constant, linear, quadratic];
        Ok(())
    }

    pub fn light_model_ambient(&mut self, color: [f32; 4]) {
        self.state.light_model_ambient = color;
    }

    pub fn light_model_two_side(&mut self, on: bool) {
        self.state.two_sided = on;
    }

    pub fn light_model_local_viewer(&mut self, _on: bool) {
        soft_unimplemented!("local viewer lighting");
    }

    pub fn color_material_mode(&mut self, face: FaceSel, mode: ColorMaterialMode) {
        for &i in face.indices() {
            self.state.color_material[i] = mode;
        }
    }

    pub fn material_ambient(&mut self, face: FaceSel, color: [f32; 4]) {
        for &i in face.indices() {
            self.state.materials[i].ambient = color;
        }
    }

    pub fn material_diffuse(&mut self, face: FaceSel, color: [f32; 4]) {
        for &i in face.indices() {
            self.state.materials[i].diffuse = color;
        }
    }

    pub fn material_ambient_and_diffuse(&mut self, face: FaceSel, color: [f32; 4]) {
        self.material_ambient(face, color);
        self.material_diffuse(face, color);
    }

    pub fn material_specular(&mut self, face: FaceSel, color: [f32; 4]) {
        for &i in face.indices() {
            self.state.materials[i].specular = color;
        }
    }

    pub fn material_emission(&mut self, face: FaceSel, color: [f32; 4]) {
        for &i in face.indices() {
            self.state.materials[i].emission = color;
        }
    }

    pub fn material_shininess(&mut self, face: FaceSel, shininess: f32) {
        for &i in face.indices() {
            self.state.materials[i].shininess = shininess;
        }
    }

    /// Store a clip plane, transformed to eye space through the inverse
    /// modelview.
    pub fn clip_plane(&mut self, index: usize, equation: [f32; 4]) -> Result<()> {
        if index >= MAX_CLIP_PLANES {
            return Err(GlError::InvalidEnum {
                context: "clip plane index",
                value: index as u32,
            });
        }
        let inverse = self
            .matrices
            .modelview
            .top()
            .invert()
            .ok_or(GlError::Unsupported("clip plane with singular modelview"))?;
        self.state.clip_planes[index].equation = inverse.mul_vec4_transposed(equation);
        Ok(())
    }

    // ------------------------------------------------------------------
    // texture units and environments

    pub fn active_texture(&mut self, unit: usize) -> Result<()> {
        if unit >= MAX_TEXTURE_UNITS {
            return Err(GlError::InvalidEnum { context: "texture unit", value: unit as u32 });
        }
        self.state.active_unit = unit;
        Ok(())
    }

    /// Selects the texcoord array slot and the texture matrix stack.
    pub fn client_active_texture(&mut self, unit: usize) -> Result<()> {
        if unit >= MAX_TEXTURE_UNITS {
            return Err(GlError::InvalidEnum { context: "texture unit", value: unit as u32 });
        }
        self.state.client_active_unit = unit;
        Ok(())
    }

    pub fn tex_env_mode(&mut self, mode: TexEnvMode) {
        match mode {
            TexEnvMode::Replace | TexEnvMode::Modulate | TexEnvMode::Combine => {
                self.state.units[self.state.active_unit].env.mode = mode;
            }
            TexEnvMode::Decal | TexEnvMode::Blend | TexEnvMode::Add => {
                soft_unimplemented!("texture environment mode {:?}", mode);
            }
        }
    }

    pub fn tex_env_color(&mut self, color: [f32; 4]) -> Result<()> {
        for v in color {
            if !(0.0..=1.0).contains(&v) {
                return Err(GlError::ColorOutOfRange(v));
            }
        }
        self.state.units[self.state.active_unit].env.color = color;
        Ok(())
    }

    fn combine_arg(&self, arg: usize) -> Result<usize> {
        if arg >= 3 {
            return Err(GlError::InvalidEnum {
                context: "combine argument",
                value: arg as u32,
            });
        }
        Ok(arg)
    }

    pub fn combine_func_rgb(&mut self, func: CombineFunc) {
        self.state.units[self.state.active_unit].env.combine_rgb = func;
    }

    pub fn combine_func_alpha(&mut self, func: CombineFunc) {
        self.state.units[self.state.active_unit].env.combine_alpha = func;
    }

    pub fn combine_source_rgb(&mut self, arg: usize, source: CombineSource) -> Result<()> {
        let arg = self.combine_arg(arg)?;
        self.state.units[self.state.active_unit].env.src_rgb[arg] = source;
        Ok(())
    }

    pub fn combine_source_alpha(&mut self, arg: usize, source: CombineSource) -> Result<()> {
        let arg = self.combine_arg(arg)?;
        self.state.units[self.state.active_unit].env.src_alpha[arg] = source;
        Ok(())
    }

    pub fn combine_operand_rgb(&mut self, arg: usize, operand: CombineOperand) -> Result<()> {
        let arg = self.combine_arg(arg)?;
        self.state.units[self.state.active_unit].env.operand_rgb[arg] = operand;
        Ok(())
    }

    pub fn combine_operand_alpha(&mut self, arg: usize, operand: CombineOperand) -> Result<()> {
        let arg = self.combine_arg(arg)?;
        self.state.units[self.state.active_unit].env.operand_alpha[arg] = operand;
        Ok(())
    }

    pub fn tex_gen(&mut self, axis: TexCoordAxis, mode: TexGenMode) {
        let unit = &mut self.state.units[self.state.active_unit];
        match axis {
            TexCoordAxis::S => unit.texgen_s = mode,
            TexCoordAxis::T => unit.texgen_t = mode,
            TexCoordAxis::R | TexCoordAxis::Q => {
                soft_unimplemented!("texgen on the {:?} coordinate", axis);
            }
        }
    }

    // ------------------------------------------------------------------
    // texture objects

    pub fn gen_textures(&mut self, n: usize) -> Vec<Handle> {
        self.objects.gen_textures(n)
    }

    /// Delete textures, resetting any unit binding that pointed at them.
    pub fn delete_textures(&mut self, handles: &[Handle]) -> Result<()> {
        for unit in &mut self.state.units {
            if handles.contains(&unit.binding) {
                unit.binding = 0;
            }
        }
        self.objects.delete_textures(handles)
    }

    pub fn bind_texture(&mut self, handle: Handle) -> Result<()> {
        self.objects.texture(handle)?;
        self.state.units[self.state.active_unit].binding = handle;
        Ok(())
    }

    fn bound_texture_mut(&mut self) -> Result<&mut TextureObject> {
        let handle = self.state.units[self.state.active_unit].binding;
        self.objects.texture_mut(handle)
    }

    pub fn texture_min_filter(&mut self, filter: TextureFilter) -> Result<()> {
        self.bound_texture_mut()?.min_filter = filter;
        Ok(())
    }

    pub fn texture_mag_filter(&mut self, filter: TextureFilter) -> Result<()> {
        self.bound_texture_mut()?.mag_filter = filter;
        Ok(())
    }

    pub fn texture_wrap_s(&mut self, wrap: TextureWrap) -> Result<()> {
        self.bound_texture_mut()?.wrap_s = wrap;
        Ok(())
    }

    pub fn texture_wrap_t(&mut self, wrap: TextureWrap) -> Result<()> {
        self.bound_texture_mut()?.wrap_t = wrap;
        Ok(())
    }

    /// Upload the base image of the bound texture; the full mip chain is
    /// generated and swizzled immediately, so explicit level uploads are
    /// redundant and dropped.
    pub fn tex_image_2d(
        &mut self,
        level: u32,
        width: u32,
        height: u32,
        format: BaseFormat,
        pixels: &[u8],
    ) -> Result<()> {
        if level > 0 {
            soft_unimplemented!("explicit mip level uploads");
            return Ok(());
        }
        let handle = self.state.units[self.state.active_unit].binding;
        let tx = self.objects.texture_mut(handle)?;
        crate::texture::upload(&mut self.space, tx, width, height, format, pixels)
    }

    // ------------------------------------------------------------------
    // buffer objects

    pub fn gen_buffers(&mut self, n: usize) -> Vec<Handle> {
        self.objects.gen_buffers(n)
    }

    /// Delete buffers, dropping their storage now. Draw-time validation
    /// catches any attribute still pointing at a retired handle.
    pub fn delete_buffers(&mut self, handles: &[Handle]) -> Result<()> {
        if handles.contains(&self.state.array_buffer) {
            self.state.array_buffer = 0;
        }
        if handles.contains(&self.state.element_array_buffer) {
            self.state.element_array_buffer = 0;
        }
        self.objects.delete_buffers(handles)
    }

    pub fn bind_buffer(&mut self, target: BufferTarget, handle: Handle) -> Result<()> {
        if handle != 0 {
            self.objects.buffer(handle)?;
        }
        match target {
            BufferTarget::Array => self.state.array_buffer = handle,
            BufferTarget::ElementArray => self.state.element_array_buffer = handle,
        }
        Ok(())
    }

    fn bound_buffer(&self, target: BufferTarget) -> Result<Handle> {
        let handle = match target {
            BufferTarget::Array => self.state.array_buffer,
            BufferTarget::ElementArray => self.state.element_array_buffer,
        };
        if handle == 0 {
            return Err(GlError::InvalidHandle(0));
        }
        Ok(handle)
    }

    pub fn buffer_data(
        &mut self,
        target: BufferTarget,
        size: usize,
        data: Option<&[u8]>,
    ) -> Result<()> {
        let handle = self.bound_buffer(target)?;
        let buffer = self.objects.buffer_mut(handle)?;
        buffer.set_data(&mut self.space, size, data)
    }

    pub fn buffer_sub_data(
        &mut self,
        target: BufferTarget,
        offset: usize,
        data: &[u8],
    ) -> Result<()> {
        let handle = self.bound_buffer(target)?;
        self.objects.buffer_mut(handle)?.sub_data(offset, data)
    }

    // ------------------------------------------------------------------
    // vertex arrays

    fn array_binding_mut(&mut self, array: ClientArray) -> &mut AttribBinding {
        match array {
            ClientArray::Vertex => &mut self.state.vertex_array,
            ClientArray::Color => &mut self.state.color_array,
            ClientArray::Normal => &mut self.state.normal_array,
            ClientArray::TexCoord => {
                &mut self.state.texcoord_arrays[self.state.client_active_unit]
            }
        }
    }

    pub fn enable_client_state(&mut self, array: ClientArray) {
        self.array_binding_mut(array).enabled = true;
    }

    pub fn disable_client_state(&mut self, array: ClientArray) {
        self.array_binding_mut(array).enabled = false;
    }

    fn check_size(context: &'static str, size: u32, valid: std::ops::RangeInclusive<u32>) -> Result<()> {
        if !valid.contains(&size) {
            return Err(GlError::InvalidEnum { context, value: size });
        }
        Ok(())
    }

    fn set_pointer(
        &mut self,
        array: ClientArray,
        size: u32,
        ty: ElementType,
        stride: usize,
        source: AttribSource,
    ) {
        let binding = self.array_binding_mut(array);
        binding.size = size;
        binding.ty = ty;
        binding.stride = stride;
        binding.source = source;
    }

    fn buffer_source(&self, offset: usize) -> Result<AttribSource> {
        let handle = self.state.array_buffer;
        if handle == 0 {
            return Err(GlError::InvalidHandle(0));
        }
        self.objects.buffer(handle)?;
        Ok(AttribSource::Buffer { handle, offset })
    }

    pub fn vertex_pointer(
        &mut self,
        size: u32,
        ty: ElementType,
        stride: usize,
        offset: usize,
    ) -> Result<()> {
        Self::check_size("vertex size", size, 2..=4)?;
        let source = self.buffer_source(offset)?;
        self.set_pointer(ClientArray::Vertex, size, ty, stride, source);
        Ok(())
    }

    /// Client-memory form: the elements are copied now, so later writes to
    /// the caller's slice do not affect the draw.
    pub fn vertex_pointer_client(
        &mut self,
        size: u32,
        ty: ElementType,
        stride: usize,
        data: &[u8],
    ) -> Result<()> {
        Self::check_size("vertex size", size, 2..=4)?;
        self.set_pointer(ClientArray::Vertex, size, ty, stride, AttribSource::Client(data.to_vec()));
        Ok(())
    }

    pub fn color_pointer(
        &mut self,
        size: u32,
        ty: ElementType,
        stride: usize,
        offset: usize,
    ) -> Result<()> {
        Self::check_size("color size", size, 4..=4)?;
        let source = self.buffer_source(offset)?;
        self.set_pointer(ClientArray::Color, size, ty, stride, source);
        Ok(())
    }

    pub fn color_pointer_client(
        &mut self,
        size: u32,
        ty: ElementType,
        stride: usize,
        data: &[u8],
    ) -> Result<()> {
        Self::check_size("color size", size, 4..=4)?;
        self.set_pointer(ClientArray::Color, size, ty, stride, AttribSource::Client(data.to_vec()));
        Ok(())
    }

    pub fn normal_pointer(&mut self, ty: ElementType, stride: usize, offset: usize) -> Result<()> {
        let source = self.buffer_source(offset)?;
        self.set_pointer(ClientArray::Normal, 3, ty, stride, source);
        Ok(())
    }

    pub fn normal_pointer_client(
        &mut self,
        ty: ElementType,
        stride: usize,
        data: &[u8],
    ) -> Result<()> {
        self.set_pointer(ClientArray::Normal, 3, ty, stride, AttribSource::Client(data.to_vec()));
        Ok(())
    }

    pub fn tex_coord_pointer(
        &mut self,
        size: u32,
        ty: ElementType,
        stride: usize,
        offset: usize,
    ) -> Result<()> {
        Self::check_size("texcoord size", size, 2..=4)?;
        let source = self.buffer_source(offset)?;
        self.set_pointer(ClientArray::TexCoord, size, ty, stride, source);
        Ok(())
    }

    pub fn tex_coord_pointer_client(
        &mut self,
        size: u32,
        ty: ElementType,
        stride: usize,
        data: &[u8],
    ) -> Result<()> {
        Self::check_size("texcoord size", size, 2..=4)?;
        self.set_pointer(ClientArray::TexCoord, size, ty, stride, AttribSource::Client(data.to_vec()));
        Ok(())
    }

    // constant attribute values, used when the matching array is disabled

    pub fn color4f(&mut self, r: f32, g: f32, b: f32, a: f32) {
        self.state.color_array.value = [r, g, b, a];
    }

    pub fn color4ub(&mut self, r: u8, g: u8, b: u8, a: u8) {
        let f = |v: u8| v as f32 / 255.0;
        self.color4f(f(r), f(g), f(b), f(a));
    }

    pub fn normal3f(&mut self, x: f32, y: f32, z: f32) {
        self.state.normal_array.value = [x, y, z, 0.0];
    }

    pub fn multi_tex_coord4f(&mut self, unit: usize, s: f32, t: f32, r: f32, q: f32) -> Result<()> {
        if unit >= MAX_TEXTURE_UNITS {
            return Err(GlError::InvalidEnum { context: "texture unit", value: unit as u32 });
        }
        self.state.texcoord_arrays[unit].value = [s, t, r, q];
        Ok(())
    }

    // ------------------------------------------------------------------
    // pixel transfer, queries, strings and frame control

    /// Only the tight packing the texture compiler expects is supported.
    pub fn pixel_store_unpack_alignment(&mut self, alignment: u32) -> Result<()> {
        if alignment != 1 {
            return Err(GlError::Unsupported("unpack alignment other than 1"));
        }
        Ok(())
    }

    pub fn read_pixels(
        &mut self,
        _x: u32,
        _y: u32,
        _width: u32,
        _height: u32,
        _out: &mut [u8],
    ) {
        soft_unimplemented!("framebuffer readback");
    }

    pub fn get_integer(&self, query: Query) -> i32 {
        match query {
            Query::MaxTextureSize => 1024,
            Query::MaxTextureUnits => MAX_TEXTURE_UNITS as i32,
            Query::MatrixMode => match self.matrices.mode {
                MatrixMode::ModelView => 0,
                MatrixMode::Projection => 1,
                MatrixMode::Texture => 2,
            },
        }
    }

    pub fn vendor(&self) -> &'static str {
        "pyrite"
    }

    pub fn renderer(&self) -> &'static str {
        "pyrite register combiner"
    }

    pub fn version(&self) -> &'static str {
        "OpenGL ES-CM 1.1"
    }

    pub fn extensions(&self) -> &'static str {
        ""
    }

    /// Finish the frame: drain the push buffer, wait out the flip and
    /// report the frame counters.
    pub fn end_frame(&mut self) -> FrameStats {
        let batch = self.pb.reset();
        self.frame_stats.accumulate(batch);
        self.pb.wait_flip();
        let stats = self.frame_stats;
        debug!(
            frame = self.frame,
            draw_calls = stats.draw_calls,
            bytes = stats.bytes,
            build_ms = stats.build_time.as_secs_f64() * 1e3,
            sync_ms = stats.sync_time.as_secs_f64() * 1e3,
            "frame complete"
        );
        self.frame += 1;
        self.frame_stats = FrameStats::default();
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pyrite_hw::NullTransport;

    fn test_context() -> GraphicsContext {
        GraphicsContext::new(DriverConfig::default(), Box::new(NullTransport::default()))
            .unwrap()
    }

    #[test]
    fn test_init_emits_render_state() {
        let ctx = test_context();
        let words = ctx.pb.words();
        assert!(words.contains(&cmd::SET_FRONT_FACE));
        assert!(words.contains(&cmd::SET_DEPTH_FUNC));
        assert!(words.contains(&cmd::SET_COLOR_MASK));
    }

    #[test]
    fn test_clear_packs_zstencil() {
        let mut ctx = test_context();
        ctx.clear_color(1.0, 0.0, 0.0, 1.0).unwrap();
        ctx.clear_stencil(0x7F);
        ctx.clear(ClearMask::COLOR | ClearMask::DEPTH | ClearMask::STENCIL).unwrap();
        let words = ctx.pb.words();
        let at = words.iter().position(|&w| w == cmd::SET_ZSTENCIL_CLEAR_VALUE).unwrap();
        assert_eq!(words[at + 1] & 0xFF, 0x7F);
        assert_eq!(words[at + 1] >> 8, ctx.config.max_z as u32);
        let at = words.iter().position(|&w| w == cmd::CLEAR_SURFACE).unwrap();
        let flags = cmd::ClearSurface::from_bits_truncate(words[at + 1]);
        assert!(flags.contains(cmd::ClearSurface::COLOR));
        assert!(flags.contains(cmd::ClearSurface::Z));
    }

    #[test]
    fn test_clear_color_range_checked() {
        let mut ctx = test_context();
        assert_eq!(ctx.clear_color(1.5, 0.0, 0.0, 0.0), Err(GlError::ColorOutOfRange(1.5)));
    }

    #[test]
    fn test_viewport_must_match_framebuffer() {
        let mut ctx = test_context();
        ctx.viewport(0, 0, 640, 480).unwrap();
        assert!(ctx.viewport(0, 0, 320, 240).is_err());
    }

    #[test]
    fn test_texture_matrix_follows_client_unit() {
        let mut ctx = test_context();
        ctx.client_active_texture(1).unwrap();
        ctx.matrix_mode(MatrixMode::Texture);
        ctx.translate(5.0, 0.0, 0.0).unwrap();
        assert_eq!(ctx.matrices.texture[1].top().0[12], 5.0);
        assert_eq!(ctx.matrices.texture[0].top().0[12], 0.0);
        // the server-side selector leaves the matrix cursor alone
        ctx.active_texture(2).unwrap();
        ctx.translate(1.0, 0.0, 0.0).unwrap();
        assert_eq!(ctx.matrices.texture[1].top().0[12], 6.0);
        assert_eq!(ctx.matrices.texture[2].top().0[12], 0.0);
    }

    #[test]
    fn test_light_position_transformed() {
        let mut ctx = test_context();
        ctx.translate(10.0, 0.0, 0.0).unwrap();
        ctx.light_position(0, [1.0, 0.0, 0.0, 1.0]).unwrap();
        assert_eq!(ctx.state.lights[0].position, [11.0, 0.0, 0.0]);
        assert!(!ctx.state.lights[0].directional);
        // w = 0 ignores the translation
        ctx.light_position(0, [0.0, 0.0, 1.0, 0.0]).unwrap();
        assert_eq!(ctx.state.lights[0].position, [0.0, 0.0, 1.0]);
        assert!(ctx.state.lights[0].directional);
    }

    #[test]
    fn test_light_index_checked() {
        let mut ctx = test_context();
        assert!(ctx.light_diffuse(7, [1.0; 4]).is_ok());
        assert!(ctx.light_diffuse(8, [1.0; 4]).is_err());
        assert!(ctx.enable(Cap::Light(8)).is_err());
    }

    #[test]
    fn test_spot_cutoff_validation() {
        let mut ctx = test_context();
        ctx.light_spot_cutoff(0, 45.0).unwrap();
        ctx.light_spot_cutoff(0, 180.0).unwrap();
        assert!(ctx.light_spot_cutoff(0, 120.0).is_err());
    }

    #[test]
    fn test_clip_plane_through_inverse_modelview() {
        let mut ctx = test_context();
        ctx.translate(0.0, 0.0, -5.0).unwrap();
        ctx.clip_plane(0, [0.0, 0.0, 1.0, 0.0]).unwrap();
        // plane z = 0 in object space sits at z = -5 in eye space
        let eq = ctx.state.clip_planes[0].equation;
        assert_eq!(eq[2], 1.0);
        assert_eq!(eq[3], 5.0);
    }

    #[test]
    fn test_material_fan_out() {
        let mut ctx = test_context();
        ctx.material_ambient_and_diffuse(FaceSel::FrontAndBack, [0.3, 0.3, 0.3, 1.0]);
        assert_eq!(ctx.state.materials[0].ambient, [0.3, 0.3, 0.3, 1.0]);
        assert_eq!(ctx.state.materials[1].diffuse, [0.3, 0.3, 0.3, 1.0]);
        ctx.material_shininess(FaceSel::Back, 32.0);
        assert_eq!(ctx.state.materials[0].shininess, 0.0);
        assert_eq!(ctx.state.materials[1].shininess, 32.0);
    }

    #[test]
    fn test_tex_env_soft_modes_keep_previous() {
        let mut ctx = test_context();
        ctx.tex_env_mode(TexEnvMode::Replace);
        ctx.tex_env_mode(TexEnvMode::Decal);
        assert_eq!(ctx.state.units[0].env.mode, TexEnvMode::Replace);
    }

    #[test]
    fn test_pointer_requires_bound_buffer() {
        let mut ctx = test_context();
        assert_eq!(
            ctx.vertex_pointer(3, ElementType::Float, 0, 0),
            Err(GlError::InvalidHandle(0))
        );
        let b = ctx.gen_buffers(1)[0];
        ctx.bind_buffer(BufferTarget::Array, b).unwrap();
        ctx.vertex_pointer(3, ElementType::Float, 0, 0).unwrap();
        assert!(matches!(
            ctx.state.vertex_array.source,
            AttribSource::Buffer { handle, offset: 0 } if handle == b
        ));
    }

    #[test]
    fn test_color_size_must_be_four() {
        let mut ctx = test_context();
        let err = ctx.color_pointer_client(3, ElementType::UnsignedByte, 0, &[0; 12]);
        assert_eq!(
            err,
            Err(GlError::InvalidEnum { context: "color size", value: 3 })
        );
    }

    #[test]
    fn test_deleting_bound_texture_unbinds() {
        let mut ctx = test_context();
        let tx = ctx.gen_textures(1)[0];
        ctx.bind_texture(tx).unwrap();
        ctx.delete_textures(&[tx]).unwrap();
        assert_eq!(ctx.state.units[0].binding, 0);
        assert_eq!(ctx.bind_texture(tx), Err(GlError::InvalidHandle(tx)));
    }

    #[test]
    fn test_end_frame_resets_counters() {
        let mut ctx = test_context();
        let stats = ctx.end_frame();
        assert!(stats.bytes > 0); // init state was in the batch
        assert_eq!(ctx.frame_stats().draw_calls, 0);
        assert_eq!(ctx.pb.len_words(), 0);
    }

    #[test]
    fn test_texture_params_hit_bound_object() {
        let mut ctx = test_context();
        let tx = ctx.gen_textures(1)[0];
        ctx.bind_texture(tx).unwrap();
        ctx.texture_min_filter(TextureFilter::Linear).unwrap();
        ctx.texture_wrap_s(TextureWrap::ClampToEdge).unwrap();
        let obj = ctx.objects.texture(tx).unwrap();
        assert_eq!(obj.min_filter, TextureFilter::Linear);
        assert_eq!(obj.wrap_s, TextureWrap::ClampToEdge);
    }
}
