//! Scoped graphics-state stack.
//!
//! The renderer runs inside a host that owns the GL context, so every state
//! change it makes must be undone before control returns. A [`StateScope`]
//! tracks exactly the states its extent mutates: the first write to a
//! [`StateKey`] reads the driver's current value into a per-scope snapshot,
//! subsequent writes go straight through, and scope exit replays the
//! snapshot in reverse insertion order. Scopes nest; each nested scope owns
//! an independent snapshot, so inner modifications are restored before the
//! outer scope's records are consulted for its own exit.
//!
//! This replaces any "push all / pop all attributes" primitive: the host
//! sees exactly the state it left, and the cost is proportional to what a
//! scope actually touched.

use crate::api as gl;
use crate::api::types::*;
use crate::api::Gl;
use fxhash::FxHashMap;
use std::ops::{Deref, DerefMut};

/// Identity of one restorable state slot. The enumeration is fixed and
/// covers the fixed-function and core-profile surface the pipeline touches;
/// texture bindings are keyed per unit.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum StateKey {
    BlendEnabled,
    BlendFunc,
    BlendEquation,
    BlendColor,
    DepthTestEnabled,
    DepthMask,
    DepthFunc,
    DepthRange,
    CullFaceEnabled,
    CullFaceMode,
    FrontFace,
    ColorMask,
    Viewport,
    ScissorTestEnabled,
    ScissorBox,
    LineWidth,
    LineSmoothEnabled,
    PolygonMode,
    PolygonOffsetFillEnabled,
    PolygonOffsetLineEnabled,
    PolygonOffset,
    ProgramPointSizeEnabled,
    PointSize,
    MultisampleEnabled,
    SampleAlphaToCoverageEnabled,
    SampleCoverageEnabled,
    DitherEnabled,
    FramebufferSrgbEnabled,
    PrimitiveRestartEnabled,
    PrimitiveRestartIndex,
    RasterizerDiscardEnabled,
    DepthClampEnabled,
    TextureCubeMapSeamlessEnabled,
    StencilTestEnabled,
    StencilFuncFront,
    StencilFuncBack,
    StencilOpFront,
    StencilOpBack,
    StencilWriteMaskFront,
    StencilWriteMaskBack,
    ClearColor,
    ClearDepth,
    ClearStencil,
    ActiveTexture,
    /// 2D texture binding of the given unit.
    TextureBinding2d(u32),
    CurrentProgram,
    VertexArrayBinding,
    ArrayBufferBinding,
    ElementArrayBufferBinding,
    UniformBufferBinding,
    ShaderStorageBufferBinding,
    PixelPackBufferBinding,
    PixelUnpackBufferBinding,
    DrawFramebufferBinding,
    ReadFramebufferBinding,
    RenderbufferBinding,
    UnpackAlignment,
    PackAlignment,
}

/// Snapshot of one state slot's value.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum StateValue {
    Bool(bool),
    Enum(GLenum),
    Int(GLint),
    UInt(GLuint),
    Float(f32),
    Float2([f32; 2]),
    Float4([f32; 4]),
    Int4([GLint; 4]),
    Bool4([bool; 4]),
    BlendFunc {
        src_rgb: GLenum,
        dst_rgb: GLenum,
        src_alpha: GLenum,
        dst_alpha: GLenum,
    },
    BlendEquation {
        rgb: GLenum,
        alpha: GLenum,
    },
    StencilFunc {
        func: GLenum,
        reference: GLint,
        mask: GLuint,
    },
    StencilOp {
        sfail: GLenum,
        dpfail: GLenum,
        dppass: GLenum,
    },
    PolygonOffset {
        factor: f32,
        units: f32,
    },
}

/// Capability enum for keys that are plain glEnable/glDisable toggles.
fn toggle_cap(key: StateKey) -> Option<GLenum> {
    Some(match key {
        StateKey::BlendEnabled => gl::BLEND,
        StateKey::DepthTestEnabled => gl::DEPTH_TEST,
        StateKey::CullFaceEnabled => gl::CULL_FACE,
        StateKey::ScissorTestEnabled => gl::SCISSOR_TEST,
        StateKey::StencilTestEnabled => gl::STENCIL_TEST,
        StateKey::PolygonOffsetFillEnabled => gl::POLYGON_OFFSET_FILL,
        StateKey::PolygonOffsetLineEnabled => gl::POLYGON_OFFSET_LINE,
        StateKey::ProgramPointSizeEnabled => gl::PROGRAM_POINT_SIZE,
        StateKey::MultisampleEnabled => gl::MULTISAMPLE,
        StateKey::SampleAlphaToCoverageEnabled => gl::SAMPLE_ALPHA_TO_COVERAGE,
        StateKey::SampleCoverageEnabled => gl::SAMPLE_COVERAGE,
        StateKey::DitherEnabled => gl::DITHER,
        StateKey::FramebufferSrgbEnabled => gl::FRAMEBUFFER_SRGB,
        StateKey::LineSmoothEnabled => gl::LINE_SMOOTH,
        StateKey::PrimitiveRestartEnabled => gl::PRIMITIVE_RESTART,
        StateKey::RasterizerDiscardEnabled => gl::RASTERIZER_DISCARD,
        StateKey::DepthClampEnabled => gl::DEPTH_CLAMP,
        StateKey::TextureCubeMapSeamlessEnabled => gl::TEXTURE_CUBE_MAP_SEAMLESS,
        _ => return None,
    })
}

fn get_int(gl_: &Gl, pname: GLenum) -> GLint {
    let mut v: GLint = 0;
    unsafe { gl_.GetIntegerv(pname, &mut v) };
    v
}

fn get_float(gl_: &Gl, pname: GLenum) -> f32 {
    let mut v: f32 = 0.0;
    unsafe { gl_.GetFloatv(pname, &mut v) };
    v
}

/// Reads the current value of `key` from the driver.
fn read_state(gl_: &Gl, key: StateKey) -> StateValue {
    if let Some(cap) = toggle_cap(key) {
        return StateValue::Bool(unsafe { gl_.IsEnabled(cap) } == gl::TRUE);
    }
    unsafe {
        match key {
            StateKey::BlendFunc => StateValue::BlendFunc {
                src_rgb: get_int(gl_, gl::BLEND_SRC_RGB) as GLenum,
                dst_rgb: get_int(gl_, gl::BLEND_DST_RGB) as GLenum,
                src_alpha: get_int(gl_, gl::BLEND_SRC_ALPHA) as GLenum,
                dst_alpha: get_int(gl_, gl::BLEND_DST_ALPHA) as GLenum,
            },
            StateKey::BlendEquation => StateValue::BlendEquation {
                rgb: get_int(gl_, gl::BLEND_EQUATION_RGB) as GLenum,
                alpha: get_int(gl_, gl::BLEND_EQUATION_ALPHA) as GLenum,
            },
            StateKey::BlendColor => {
                let mut v = [0.0f32; 4];
                gl_.GetFloatv(gl::BLEND_COLOR, v.as_mut_ptr());
                StateValue::Float4(v)
            }
            StateKey::DepthMask => {
                let mut v: GLboolean = 0;
                gl_.GetBooleanv(gl::DEPTH_WRITEMASK, &mut v);
                StateValue::Bool(v == gl::TRUE)
            }
            StateKey::DepthFunc => StateValue::Enum(get_int(gl_, gl::DEPTH_FUNC) as GLenum),
            StateKey::DepthRange => {
                let mut v = [0.0f32; 2];
                gl_.GetFloatv(gl::DEPTH_RANGE, v.as_mut_ptr());
                StateValue::Float2(v)
            }
            StateKey::CullFaceMode => StateValue::Enum(get_int(gl_, gl::CULL_FACE_MODE) as GLenum),
            StateKey::FrontFace => StateValue::Enum(get_int(gl_, gl::FRONT_FACE) as GLenum),
            StateKey::ColorMask => {
                let mut v: [GLboolean; 4] = [0; 4];
                gl_.GetBooleanv(gl::COLOR_WRITEMASK, v.as_mut_ptr());
                StateValue::Bool4([
                    v[0] == gl::TRUE,
                    v[1] == gl::TRUE,
                    v[2] == gl::TRUE,
                    v[3] == gl::TRUE,
                ])
            }
            StateKey::Viewport => {
                let mut v: [GLint; 4] = [0; 4];
                gl_.GetIntegerv(gl::VIEWPORT, v.as_mut_ptr());
                StateValue::Int4(v)
            }
            StateKey::ScissorBox => {
                let mut v: [GLint; 4] = [0; 4];
                gl_.GetIntegerv(gl::SCISSOR_BOX, v.as_mut_ptr());
                StateValue::Int4(v)
            }
            StateKey::LineWidth => StateValue::Float(get_float(gl_, gl::LINE_WIDTH)),
            StateKey::PolygonMode => {
                // core profile keeps front and back in lockstep; the query
                // still yields two values
                let mut v: [GLint; 2] = [0; 2];
                gl_.GetIntegerv(gl::POLYGON_MODE, v.as_mut_ptr());
                StateValue::Enum(v[0] as GLenum)
            }
            StateKey::PolygonOffset => StateValue::PolygonOffset {
                factor: get_float(gl_, gl::POLYGON_OFFSET_FACTOR),
                units: get_float(gl_, gl::POLYGON_OFFSET_UNITS),
            },
            StateKey::PointSize => StateValue::Float(get_float(gl_, gl::POINT_SIZE)),
            StateKey::PrimitiveRestartIndex => {
                StateValue::UInt(get_int(gl_, gl::PRIMITIVE_RESTART_INDEX) as GLuint)
            }
            StateKey::StencilFuncFront => StateValue::StencilFunc {
                func: get_int(gl_, gl::STENCIL_FUNC) as GLenum,
                reference: get_int(gl_, gl::STENCIL_REF),
                mask: get_int(gl_, gl::STENCIL_VALUE_MASK) as GLuint,
            },
            StateKey::StencilFuncBack => StateValue::StencilFunc {
                func: get_int(gl_, gl::STENCIL_BACK_FUNC) as GLenum,
                reference: get_int(gl_, gl::STENCIL_BACK_REF),
                mask: get_int(gl_, gl::STENCIL_BACK_VALUE_MASK) as GLuint,
            },
            StateKey::StencilOpFront => StateValue::StencilOp {
                sfail: get_int(gl_, gl::STENCIL_FAIL) as GLenum,
                dpfail: get_int(gl_, gl::STENCIL_PASS_DEPTH_FAIL) as GLenum,
                dppass: get_int(gl_, gl::STENCIL_PASS_DEPTH_PASS) as GLenum,
            },
            StateKey::StencilOpBack => StateValue::StencilOp {
                sfail: get_int(gl_, gl::STENCIL_BACK_FAIL) as GLenum,
                dpfail: get_int(gl_, gl::STENCIL_BACK_PASS_DEPTH_FAIL) as GLenum,
                dppass: get_int(gl_, gl::STENCIL_BACK_PASS_DEPTH_PASS) as GLenum,
            },
            StateKey::StencilWriteMaskFront => {
                StateValue::UInt(get_int(gl_, gl::STENCIL_WRITEMASK) as GLuint)
            }
            StateKey::StencilWriteMaskBack => {
                StateValue::UInt(get_int(gl_, gl::STENCIL_BACK_WRITEMASK) as GLuint)
            }
            StateKey::ClearColor => {
                let mut v = [0.0f32; 4];
                gl_.GetFloatv(gl::COLOR_CLEAR_VALUE, v.as_mut_ptr());
                StateValue::Float4(v)
            }
            StateKey::ClearDepth => StateValue::Float(get_float(gl_, gl::DEPTH_CLEAR_VALUE)),
            StateKey::ClearStencil => StateValue::Int(get_int(gl_, gl::STENCIL_CLEAR_VALUE)),
            StateKey::ActiveTexture => {
                StateValue::Enum(get_int(gl_, gl::ACTIVE_TEXTURE) as GLenum)
            }
            StateKey::TextureBinding2d(unit) => {
                let prev = get_int(gl_, gl::ACTIVE_TEXTURE) as GLenum;
                gl_.ActiveTexture(gl::TEXTURE0 + unit);
                let bound = get_int(gl_, gl::TEXTURE_BINDING_2D) as GLuint;
                gl_.ActiveTexture(prev);
                StateValue::UInt(bound)
            }
            StateKey::CurrentProgram => {
                StateValue::UInt(get_int(gl_, gl::CURRENT_PROGRAM) as GLuint)
            }
            StateKey::VertexArrayBinding => {
                StateValue::UInt(get_int(gl_, gl::VERTEX_ARRAY_BINDING) as GLuint)
            }
            StateKey::ArrayBufferBinding => {
                StateValue::UInt(get_int(gl_, gl::ARRAY_BUFFER_BINDING) as GLuint)
            }
            StateKey::ElementArrayBufferBinding => {
                StateValue::UInt(get_int(gl_, gl::ELEMENT_ARRAY_BUFFER_BINDING) as GLuint)
            }
            StateKey::UniformBufferBinding => {
                StateValue::UInt(get_int(gl_, gl::UNIFORM_BUFFER_BINDING) as GLuint)
            }
            StateKey::ShaderStorageBufferBinding => {
                StateValue::UInt(get_int(gl_, gl::SHADER_STORAGE_BUFFER_BINDING) as GLuint)
            }
            StateKey::PixelPackBufferBinding => {
                StateValue::UInt(get_int(gl_, gl::PIXEL_PACK_BUFFER_BINDING) as GLuint)
            }
            StateKey::PixelUnpackBufferBinding => {
                StateValue::UInt(get_int(gl_, gl::PIXEL_UNPACK_BUFFER_BINDING) as GLuint)
            }
            StateKey::DrawFramebufferBinding => {
                StateValue::UInt(get_int(gl_, gl::DRAW_FRAMEBUFFER_BINDING) as GLuint)
            }
            StateKey::ReadFramebufferBinding => {
                StateValue::UInt(get_int(gl_, gl::READ_FRAMEBUFFER_BINDING) as GLuint)
            }
            StateKey::RenderbufferBinding => {
                StateValue::UInt(get_int(gl_, gl::RENDERBUFFER_BINDING) as GLuint)
            }
            StateKey::UnpackAlignment => StateValue::Int(get_int(gl_, gl::UNPACK_ALIGNMENT)),
            StateKey::PackAlignment => StateValue::Int(get_int(gl_, gl::PACK_ALIGNMENT)),
            // toggles handled above
            _ => unreachable!("toggle key fell through: {:?}", key),
        }
    }
}

/// Applies `value` to the driver slot identified by `key`.
fn write_state(gl_: &Gl, key: StateKey, value: &StateValue) {
    if let Some(cap) = toggle_cap(key) {
        let on = matches!(value, StateValue::Bool(true));
        unsafe {
            if on {
                gl_.Enable(cap);
            } else {
                gl_.Disable(cap);
            }
        }
        return;
    }
    unsafe {
        match (key, value) {
            (
                StateKey::BlendFunc,
                StateValue::BlendFunc {
                    src_rgb,
                    dst_rgb,
                    src_alpha,
                    dst_alpha,
                },
            ) => gl_.BlendFuncSeparate(*src_rgb, *dst_rgb, *src_alpha, *dst_alpha),
            (StateKey::BlendEquation, StateValue::BlendEquation { rgb, alpha }) => {
                gl_.BlendEquationSeparate(*rgb, *alpha)
            }
            (StateKey::BlendColor, StateValue::Float4(v)) => {
                gl_.BlendColor(v[0], v[1], v[2], v[3])
            }
            (StateKey::DepthMask, StateValue::Bool(on)) => {
                gl_.DepthMask(if *on { gl::TRUE } else { gl::FALSE })
            }
            (StateKey::DepthFunc, StateValue::Enum(func)) => gl_.DepthFunc(*func),
            (StateKey::DepthRange, StateValue::Float2(v)) => {
                gl_.DepthRange(v[0] as f64, v[1] as f64)
            }
            (StateKey::CullFaceMode, StateValue::Enum(mode)) => gl_.CullFace(*mode),
            (StateKey::FrontFace, StateValue::Enum(mode)) => gl_.FrontFace(*mode),
            (StateKey::ColorMask, StateValue::Bool4(v)) => {
                let b = |x: bool| if x { gl::TRUE } else { gl::FALSE };
                gl_.ColorMask(b(v[0]), b(v[1]), b(v[2]), b(v[3]))
            }
            (StateKey::Viewport, StateValue::Int4(v)) => gl_.Viewport(v[0], v[1], v[2], v[3]),
            (StateKey::ScissorBox, StateValue::Int4(v)) => gl_.Scissor(v[0], v[1], v[2], v[3]),
            (StateKey::LineWidth, StateValue::Float(w)) => gl_.LineWidth(*w),
            (StateKey::PolygonMode, StateValue::Enum(mode)) => {
                gl_.PolygonMode(gl::FRONT_AND_BACK, *mode)
            }
            (StateKey::PolygonOffset, StateValue::PolygonOffset { factor, units }) => {
                gl_.PolygonOffset(*factor, *units)
            }
            (StateKey::PointSize, StateValue::Float(s)) => gl_.PointSize(*s),
            (StateKey::PrimitiveRestartIndex, StateValue::UInt(i)) => {
                gl_.PrimitiveRestartIndex(*i)
            }
            (
                StateKey::StencilFuncFront,
                StateValue::StencilFunc {
                    func,
                    reference,
                    mask,
                },
            ) => gl_.StencilFuncSeparate(gl::FRONT, *func, *reference, *mask),
            (
                StateKey::StencilFuncBack,
                StateValue::StencilFunc {
                    func,
                    reference,
                    mask,
                },
            ) => gl_.StencilFuncSeparate(gl::BACK, *func, *reference, *mask),
            (
                StateKey::StencilOpFront,
                StateValue::StencilOp {
                    sfail,
                    dpfail,
                    dppass,
                },
            ) => gl_.StencilOpSeparate(gl::FRONT, *sfail, *dpfail, *dppass),
            (
                StateKey::StencilOpBack,
                StateValue::StencilOp {
                    sfail,
                    dpfail,
                    dppass,
                },
            ) => gl_.StencilOpSeparate(gl::BACK, *sfail, *dpfail, *dppass),
            (StateKey::StencilWriteMaskFront, StateValue::UInt(mask)) => {
                gl_.StencilMaskSeparate(gl::FRONT, *mask)
            }
            (StateKey::StencilWriteMaskBack, StateValue::UInt(mask)) => {
                gl_.StencilMaskSeparate(gl::BACK, *mask)
            }
            (StateKey::ClearColor, StateValue::Float4(v)) => {
                gl_.ClearColor(v[0], v[1], v[2], v[3])
            }
            (StateKey::ClearDepth, StateValue::Float(d)) => gl_.ClearDepth(*d as f64),
            (StateKey::ClearStencil, StateValue::Int(s)) => gl_.ClearStencil(*s),
            (StateKey::ActiveTexture, StateValue::Enum(unit)) => gl_.ActiveTexture(*unit),
            (StateKey::TextureBinding2d(unit), StateValue::UInt(tex)) => {
                let prev = get_int(gl_, gl::ACTIVE_TEXTURE) as GLenum;
                gl_.ActiveTexture(gl::TEXTURE0 + unit);
                gl_.BindTexture(gl::TEXTURE_2D, *tex);
                gl_.ActiveTexture(prev);
            }
            (StateKey::CurrentProgram, StateValue::UInt(p)) => gl_.UseProgram(*p),
            (StateKey::VertexArrayBinding, StateValue::UInt(v)) => gl_.BindVertexArray(*v),
            (StateKey::ArrayBufferBinding, StateValue::UInt(b)) => {
                gl_.BindBuffer(gl::ARRAY_BUFFER, *b)
            }
            (StateKey::ElementArrayBufferBinding, StateValue::UInt(b)) => {
                gl_.BindBuffer(gl::ELEMENT_ARRAY_BUFFER, *b)
            }
            (StateKey::UniformBufferBinding, StateValue::UInt(b)) => {
                gl_.BindBuffer(gl::UNIFORM_BUFFER, *b)
            }
            (StateKey::ShaderStorageBufferBinding, StateValue::UInt(b)) => {
                gl_.BindBuffer(gl::SHADER_STORAGE_BUFFER, *b)
            }
            (StateKey::PixelPackBufferBinding, StateValue::UInt(b)) => {
                gl_.BindBuffer(gl::PIXEL_PACK_BUFFER, *b)
            }
            (StateKey::PixelUnpackBufferBinding, StateValue::UInt(b)) => {
                gl_.BindBuffer(gl::PIXEL_UNPACK_BUFFER, *b)
            }
            (StateKey::DrawFramebufferBinding, StateValue::UInt(f)) => {
                gl_.BindFramebuffer(gl::DRAW_FRAMEBUFFER, *f)
            }
            (StateKey::ReadFramebufferBinding, StateValue::UInt(f)) => {
                gl_.BindFramebuffer(gl::READ_FRAMEBUFFER, *f)
            }
            (StateKey::RenderbufferBinding, StateValue::UInt(r)) => {
                gl_.BindRenderbuffer(gl::RENDERBUFFER, *r)
            }
            (StateKey::UnpackAlignment, StateValue::Int(a)) => {
                gl_.PixelStorei(gl::UNPACK_ALIGNMENT, *a)
            }
            (StateKey::PackAlignment, StateValue::Int(a)) => {
                gl_.PixelStorei(gl::PACK_ALIGNMENT, *a)
            }
            (key, value) => unreachable!("mismatched state write {:?} = {:?}", key, value),
        }
    }
}

/// One open scope: first-touch snapshot plus the insertion-order journal.
#[derive(Default)]
struct ScopeRecord {
    saved: FxHashMap<StateKey, StateValue>,
    journal: Vec<StateKey>,
}

/// Stack of open scopes for one graphics context. Not thread-safe; the
/// render thread owns it.
#[derive(Default)]
pub struct StateStack {
    scopes: Vec<ScopeRecord>,
}

impl StateStack {
    pub fn new() -> StateStack {
        StateStack::default()
    }

    /// Number of currently open scopes.
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Opens a scope and returns its guard. Dropping the guard (or calling
    /// [`StateScope::close`]) restores every touched state in reverse
    /// insertion order.
    pub fn scope<'a>(&'a mut self, gl_: &'a Gl) -> StateScope<'a> {
        self.scopes.push(ScopeRecord::default());
        StateScope {
            ctx: StateContext { gl: gl_, stack: self },
            closed: false,
        }
    }

    /// Mutator access without opening a scope; every mutator on the result
    /// panics unless some scope is already open. Useful for code that runs
    /// inside a scope owned further up the call stack.
    pub fn context<'a>(&'a mut self, gl_: &'a Gl) -> StateContext<'a> {
        StateContext { gl: gl_, stack: self }
    }

    fn pop_and_restore(&mut self, gl_: &Gl) {
        let record = self
            .scopes
            .pop()
            .expect("state scope closed with no scope open");
        for key in record.journal.iter().rev() {
            let value = &record.saved[key];
            write_state(gl_, *key, value);
        }
    }
}

/// Mutator surface of the state stack. All writes are journaled into the
/// innermost open scope; the first write to a key snapshots the driver's
/// current value for restoration.
pub struct StateContext<'a> {
    gl: &'a Gl,
    stack: &'a mut StateStack,
}

impl<'a> StateContext<'a> {
    fn set(&mut self, key: StateKey, value: StateValue) {
        let scope = self
            .stack
            .scopes
            .last_mut()
            .expect("state mutator outside an open state scope");
        if !scope.saved.contains_key(&key) {
            let current = read_state(self.gl, key);
            scope.saved.insert(key, current);
            scope.journal.push(key);
        }
        write_state(self.gl, key, &value);
    }

    pub fn gl(&self) -> &Gl {
        self.gl
    }

    //------------------------------------------------------------------
    // blending

    pub fn enable_blend(&mut self) {
        self.set(StateKey::BlendEnabled, StateValue::Bool(true));
    }

    pub fn disable_blend(&mut self) {
        self.set(StateKey::BlendEnabled, StateValue::Bool(false));
    }

    pub fn set_blend_func(&mut self, src: GLenum, dst: GLenum) {
        self.set_blend_func_separate(src, dst, src, dst);
    }

    pub fn set_blend_func_separate(
        &mut self,
        src_rgb: GLenum,
        dst_rgb: GLenum,
        src_alpha: GLenum,
        dst_alpha: GLenum,
    ) {
        self.set(
            StateKey::BlendFunc,
            StateValue::BlendFunc {
                src_rgb,
                dst_rgb,
                src_alpha,
                dst_alpha,
            },
        );
    }

    pub fn set_blend_equation(&mut self, mode: GLenum) {
        self.set(
            StateKey::BlendEquation,
            StateValue::BlendEquation {
                rgb: mode,
                alpha: mode,
            },
        );
    }

    //------------------------------------------------------------------
    // depth

    pub fn enable_depth_test(&mut self) {
        self.set(StateKey::DepthTestEnabled, StateValue::Bool(true));
    }

    pub fn disable_depth_test(&mut self) {
        self.set(StateKey::DepthTestEnabled, StateValue::Bool(false));
    }

    pub fn set_depth_mask(&mut self, write: bool) {
        self.set(StateKey::DepthMask, StateValue::Bool(write));
    }

    pub fn set_depth_func(&mut self, func: GLenum) {
        self.set(StateKey::DepthFunc, StateValue::Enum(func));
    }

    //------------------------------------------------------------------
    // rasterizer

    pub fn enable_cull_face(&mut self) {
        self.set(StateKey::CullFaceEnabled, StateValue::Bool(true));
    }

    pub fn disable_cull_face(&mut self) {
        self.set(StateKey::CullFaceEnabled, StateValue::Bool(false));
    }

    pub fn set_cull_face(&mut self, mode: GLenum) {
        self.set(StateKey::CullFaceMode, StateValue::Enum(mode));
    }

    pub fn set_front_face(&mut self, mode: GLenum) {
        self.set(StateKey::FrontFace, StateValue::Enum(mode));
    }

    pub fn set_color_mask(&mut self, r: bool, g: bool, b: bool, a: bool) {
        self.set(StateKey::ColorMask, StateValue::Bool4([r, g, b, a]));
    }

    pub fn set_viewport(&mut self, x: i32, y: i32, width: i32, height: i32) {
        self.set(StateKey::Viewport, StateValue::Int4([x, y, width, height]));
    }

    pub fn enable_scissor_test(&mut self) {
        self.set(StateKey::ScissorTestEnabled, StateValue::Bool(true));
    }

    pub fn disable_scissor_test(&mut self) {
        self.set(StateKey::ScissorTestEnabled, StateValue::Bool(false));
    }

    pub fn set_scissor(&mut self, x: i32, y: i32, width: i32, height: i32) {
        self.set(StateKey::ScissorBox, StateValue::Int4([x, y, width, height]));
    }

    pub fn set_line_width(&mut self, width: f32) {
        self.set(StateKey::LineWidth, StateValue::Float(width));
    }

    pub fn set_polygon_mode(&mut self, mode: GLenum) {
        self.set(StateKey::PolygonMode, StateValue::Enum(mode));
    }

    pub fn set_polygon_offset(&mut self, factor: f32, units: f32) {
        self.set(
            StateKey::PolygonOffset,
            StateValue::PolygonOffset { factor, units },
        );
    }

    pub fn enable_polygon_offset_fill(&mut self) {
        self.set(StateKey::PolygonOffsetFillEnabled, StateValue::Bool(true));
    }

    pub fn enable_program_point_size(&mut self) {
        self.set(StateKey::ProgramPointSizeEnabled, StateValue::Bool(true));
    }

    //------------------------------------------------------------------
    // bindings

    pub fn set_active_texture(&mut self, unit: u32) {
        self.set(
            StateKey::ActiveTexture,
            StateValue::Enum(gl::TEXTURE0 + unit),
        );
    }

    /// Binds a 2D texture on `unit`, journaling both the binding and the
    /// active-unit switch.
    pub fn bind_texture_2d(&mut self, unit: u32, texture: GLuint) {
        self.set_active_texture(unit);
        self.set(StateKey::TextureBinding2d(unit), StateValue::UInt(texture));
    }

    pub fn use_program(&mut self, program: GLuint) {
        self.set(StateKey::CurrentProgram, StateValue::UInt(program));
    }

    pub fn bind_vertex_array(&mut self, vao: GLuint) {
        self.set(StateKey::VertexArrayBinding, StateValue::UInt(vao));
    }

    pub fn bind_array_buffer(&mut self, buffer: GLuint) {
        self.set(StateKey::ArrayBufferBinding, StateValue::UInt(buffer));
    }

    pub fn bind_shader_storage_buffer(&mut self, buffer: GLuint) {
        self.set(StateKey::ShaderStorageBufferBinding, StateValue::UInt(buffer));
    }

    pub fn bind_framebuffer(&mut self, framebuffer: GLuint) {
        self.set(StateKey::DrawFramebufferBinding, StateValue::UInt(framebuffer));
        self.set(StateKey::ReadFramebufferBinding, StateValue::UInt(framebuffer));
    }

    pub fn bind_draw_framebuffer(&mut self, framebuffer: GLuint) {
        self.set(StateKey::DrawFramebufferBinding, StateValue::UInt(framebuffer));
    }

    pub fn bind_read_framebuffer(&mut self, framebuffer: GLuint) {
        self.set(StateKey::ReadFramebufferBinding, StateValue::UInt(framebuffer));
    }

    pub fn set_clear_color(&mut self, r: f32, g: f32, b: f32, a: f32) {
        self.set(StateKey::ClearColor, StateValue::Float4([r, g, b, a]));
    }

    pub fn set_unpack_alignment(&mut self, alignment: i32) {
        self.set(StateKey::UnpackAlignment, StateValue::Int(alignment));
    }
}

/// RAII guard of one open scope. Derefs to [`StateContext`] for mutators.
pub struct StateScope<'a> {
    ctx: StateContext<'a>,
    closed: bool,
}

impl<'a> StateScope<'a> {
    /// Opens an independent nested scope. Its deltas restore on its own
    /// exit, before this scope's records are consulted.
    pub fn nested(&mut self) -> StateScope<'_> {
        self.ctx.stack.scopes.push(ScopeRecord::default());
        StateScope {
            ctx: StateContext {
                gl: self.ctx.gl,
                stack: &mut *self.ctx.stack,
            },
            closed: false,
        }
    }

    /// Explicit close; equivalent to dropping the guard.
    pub fn close(mut self) {
        self.restore();
    }

    fn restore(&mut self) {
        if !self.closed {
            self.closed = true;
            let gl_ = self.ctx.gl;
            self.ctx.stack.pop_and_restore(gl_);
        }
    }
}

impl<'a> Deref for StateScope<'a> {
    type Target = StateContext<'a>;
    fn deref(&self) -> &StateContext<'a> {
        &self.ctx
    }
}

impl<'a> DerefMut for StateScope<'a> {
    fn deref_mut(&mut self) -> &mut StateContext<'a> {
        &mut self.ctx
    }
}

impl<'a> Drop for StateScope<'a> {
    fn drop(&mut self) {
        self.restore();
    }
}
