//! Software mock of the GL 3.3 state machine.
//!
//! `Gl::load_with` is fed a table of `extern "system"` stubs that record
//! state writes and draw calls into a thread-local [`MockState`]. This is
//! enough to assert state round-trips, draw ordering and uniform values
//! without a windowing system. Version reports as 3.3, so the particle
//! engine takes its CPU path; compute entry points are left unloaded.

#![allow(dead_code)]

use ember_render::Gl;
use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::CStr;
use std::os::raw::{c_char, c_int, c_uchar, c_uint, c_void};

pub type GLenum = c_uint;
pub type GLuint = c_uint;
pub type GLint = c_int;
pub type GLsizei = c_int;
pub type GLboolean = c_uchar;
pub type GLfloat = f32;
pub type GLdouble = f64;
pub type GLchar = c_char;
pub type GLsizeiptr = isize;
pub type GLintptr = isize;
pub type GLbitfield = c_uint;

// the GL constants the mock interprets (numeric values per the GL spec)
pub const TRUE: GLboolean = 1;
pub const FALSE: GLboolean = 0;
pub const BLEND: GLenum = 0x0BE2;
pub const DEPTH_TEST: GLenum = 0x0B71;
pub const CULL_FACE: GLenum = 0x0B44;
pub const SCISSOR_TEST: GLenum = 0x0C11;
pub const STENCIL_TEST: GLenum = 0x0B90;
pub const MAJOR_VERSION: GLenum = 0x821B;
pub const MINOR_VERSION: GLenum = 0x821C;
pub const MAX_COMBINED_TEXTURE_IMAGE_UNITS: GLenum = 0x8B4D;
pub const BLEND_SRC_RGB: GLenum = 0x80C9;
pub const BLEND_DST_RGB: GLenum = 0x80C8;
pub const BLEND_SRC_ALPHA: GLenum = 0x80CB;
pub const BLEND_DST_ALPHA: GLenum = 0x80CA;
pub const BLEND_EQUATION_RGB: GLenum = 0x8009;
pub const BLEND_EQUATION_ALPHA: GLenum = 0x883D;
pub const BLEND_COLOR: GLenum = 0x8005;
pub const DEPTH_WRITEMASK: GLenum = 0x0B72;
pub const DEPTH_FUNC: GLenum = 0x0B74;
pub const DEPTH_RANGE: GLenum = 0x0B70;
pub const DEPTH_CLEAR_VALUE: GLenum = 0x0B73;
pub const CULL_FACE_MODE: GLenum = 0x0B45;
pub const FRONT_FACE: GLenum = 0x0B46;
pub const COLOR_WRITEMASK: GLenum = 0x0C23;
pub const COLOR_CLEAR_VALUE: GLenum = 0x0C22;
pub const STENCIL_CLEAR_VALUE: GLenum = 0x0B91;
pub const VIEWPORT: GLenum = 0x0BA2;
pub const SCISSOR_BOX: GLenum = 0x0C10;
pub const LINE_WIDTH: GLenum = 0x0B21;
pub const POLYGON_MODE: GLenum = 0x0B40;
pub const POLYGON_OFFSET_FACTOR: GLenum = 0x8038;
pub const POLYGON_OFFSET_UNITS: GLenum = 0x2A00;
pub const POINT_SIZE: GLenum = 0x0B11;
pub const PRIMITIVE_RESTART_INDEX: GLenum = 0x8F9E;
pub const ACTIVE_TEXTURE: GLenum = 0x84E0;
pub const TEXTURE0: GLenum = 0x84C0;
pub const TEXTURE_BINDING_2D: GLenum = 0x8069;
pub const TEXTURE_2D: GLenum = 0x0DE1;
pub const CURRENT_PROGRAM: GLenum = 0x8B8D;
pub const VERTEX_ARRAY_BINDING: GLenum = 0x85B5;
pub const ARRAY_BUFFER: GLenum = 0x8892;
pub const ELEMENT_ARRAY_BUFFER: GLenum = 0x8893;
pub const UNIFORM_BUFFER: GLenum = 0x8A11;
pub const SHADER_STORAGE_BUFFER: GLenum = 0x90D2;
pub const PIXEL_PACK_BUFFER: GLenum = 0x88EB;
pub const PIXEL_UNPACK_BUFFER: GLenum = 0x88EC;
pub const ARRAY_BUFFER_BINDING: GLenum = 0x8894;
pub const ELEMENT_ARRAY_BUFFER_BINDING: GLenum = 0x8895;
pub const UNIFORM_BUFFER_BINDING: GLenum = 0x8A28;
pub const SHADER_STORAGE_BUFFER_BINDING: GLenum = 0x90D3;
pub const PIXEL_PACK_BUFFER_BINDING: GLenum = 0x88ED;
pub const PIXEL_UNPACK_BUFFER_BINDING: GLenum = 0x88EF;
pub const DRAW_FRAMEBUFFER: GLenum = 0x8CA9;
pub const READ_FRAMEBUFFER: GLenum = 0x8CA8;
pub const FRAMEBUFFER: GLenum = 0x8D40;
pub const DRAW_FRAMEBUFFER_BINDING: GLenum = 0x8CA6;
pub const READ_FRAMEBUFFER_BINDING: GLenum = 0x8CAA;
pub const RENDERBUFFER_BINDING: GLenum = 0x8CA7;
pub const FRAMEBUFFER_COMPLETE: GLenum = 0x8CD5;
pub const UNPACK_ALIGNMENT: GLenum = 0x0CF5;
pub const PACK_ALIGNMENT: GLenum = 0x0D05;
pub const COMPILE_STATUS: GLenum = 0x8B81;
pub const LINK_STATUS: GLenum = 0x8B82;
pub const INFO_LOG_LENGTH: GLenum = 0x8B84;
pub const VENDOR: GLenum = 0x1F00;
pub const RENDERER: GLenum = 0x1F01;
pub const STENCIL_FUNC: GLenum = 0x0B92;
pub const STENCIL_REF: GLenum = 0x0B97;
pub const STENCIL_VALUE_MASK: GLenum = 0x0B93;
pub const STENCIL_BACK_FUNC: GLenum = 0x8800;
pub const STENCIL_BACK_REF: GLenum = 0x8CA3;
pub const STENCIL_BACK_VALUE_MASK: GLenum = 0x8CA4;
pub const STENCIL_FAIL: GLenum = 0x0B94;
pub const STENCIL_PASS_DEPTH_FAIL: GLenum = 0x0B95;
pub const STENCIL_PASS_DEPTH_PASS: GLenum = 0x0B96;
pub const STENCIL_BACK_FAIL: GLenum = 0x8801;
pub const STENCIL_BACK_PASS_DEPTH_FAIL: GLenum = 0x8802;
pub const STENCIL_BACK_PASS_DEPTH_PASS: GLenum = 0x8803;
pub const STENCIL_WRITEMASK: GLenum = 0x0B98;
pub const STENCIL_BACK_WRITEMASK: GLenum = 0x8CA5;
pub const SRC_ALPHA: GLenum = 0x0302;
pub const ONE_MINUS_SRC_ALPHA: GLenum = 0x0303;
pub const ONE: GLenum = 1;
pub const ZERO: GLenum = 0;
pub const FUNC_ADD: GLenum = 0x8006;
pub const LESS: GLenum = 0x0201;
pub const BACK: GLenum = 0x0405;
pub const CCW: GLenum = 0x0901;
pub const FILL: GLenum = 0x1B02;
pub const TRIANGLES: GLenum = 0x0004;
pub const LINES: GLenum = 0x0001;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DrawKind {
    Arrays { mode: GLenum, count: GLsizei },
    Elements { count: GLsizei },
    ArraysInstanced { count: GLsizei, instances: GLsizei },
    ElementsInstanced { count: GLsizei, instances: GLsizei },
}

/// One recorded draw call plus the state it executed under.
#[derive(Clone, Debug)]
pub struct DrawEvent {
    pub kind: DrawKind,
    pub program: GLuint,
    pub vao: GLuint,
    pub blend: bool,
    pub blend_func: [GLenum; 4],
    pub depth_test: bool,
    pub depth_mask: bool,
    /// Value of the program's `u_model` uniform, when it has one.
    pub model: Option<[f32; 16]>,
}

#[derive(Default)]
struct ProgramRecord {
    uniform_locations: HashMap<String, GLint>,
    next_location: GLint,
    mat4: HashMap<GLint, [f32; 16]>,
    ints: HashMap<GLint, GLint>,
    floats: HashMap<GLint, f32>,
}

pub struct MockState {
    pub caps: HashMap<GLenum, bool>,
    pub blend_func: [GLenum; 4],
    pub blend_equation: [GLenum; 2],
    pub blend_color: [f32; 4],
    pub depth_mask: bool,
    pub depth_func: GLenum,
    pub depth_range: [f32; 2],
    pub cull_mode: GLenum,
    pub front_face: GLenum,
    pub color_mask: [bool; 4],
    pub viewport: [GLint; 4],
    pub scissor: [GLint; 4],
    pub line_width: f32,
    pub polygon_mode: GLenum,
    pub polygon_offset: [f32; 2],
    pub point_size: f32,
    pub primitive_restart_index: GLuint,
    pub clear_color: [f32; 4],
    pub clear_depth: f32,
    pub clear_stencil: GLint,
    pub active_texture: GLenum,
    pub texture_bindings: HashMap<GLenum, GLuint>,
    pub current_program: GLuint,
    pub vao: GLuint,
    pub buffer_bindings: HashMap<GLenum, GLuint>,
    pub draw_framebuffer: GLuint,
    pub read_framebuffer: GLuint,
    pub renderbuffer: GLuint,
    pub unpack_alignment: GLint,
    pub pack_alignment: GLint,
    pub stencil: [GLint; 14],

    next_object: GLuint,
    pub buffers: HashMap<GLuint, Vec<u8>>,
    programs: HashMap<GLuint, ProgramRecord>,
    pub events: Vec<DrawEvent>,
}

impl Default for MockState {
    fn default() -> MockState {
        MockState {
            caps: HashMap::new(),
            blend_func: [ONE, ZERO, ONE, ZERO],
            blend_equation: [FUNC_ADD, FUNC_ADD],
            blend_color: [0.0; 4],
            depth_mask: true,
            depth_func: LESS,
            depth_range: [0.0, 1.0],
            cull_mode: BACK,
            front_face: CCW,
            color_mask: [true; 4],
            viewport: [0, 0, 640, 480],
            scissor: [0, 0, 640, 480],
            line_width: 1.0,
            polygon_mode: FILL,
            polygon_offset: [0.0, 0.0],
            point_size: 1.0,
            primitive_restart_index: 0,
            clear_color: [0.0; 4],
            clear_depth: 1.0,
            clear_stencil: 0,
            active_texture: TEXTURE0,
            texture_bindings: HashMap::new(),
            current_program: 0,
            vao: 0,
            buffer_bindings: HashMap::new(),
            draw_framebuffer: 0,
            read_framebuffer: 0,
            renderbuffer: 0,
            unpack_alignment: 4,
            pack_alignment: 4,
            stencil: [0x0207, 0, -1, 0x0207, 0, -1, 0x1E00, 0x1E00, 0x1E00, 0x1E00, 0x1E00, 0x1E00, -1, -1],
            next_object: 1,
            buffers: HashMap::new(),
            programs: HashMap::new(),
            events: Vec::new(),
        }
    }
}

/// Everything the state stack can restore, for before/after comparisons.
#[derive(Clone, Debug, PartialEq)]
pub struct StateSnapshot {
    pub caps: Vec<(GLenum, bool)>,
    pub blend_func: [GLenum; 4],
    pub blend_equation: [GLenum; 2],
    pub depth_mask: bool,
    pub depth_func: GLenum,
    pub cull_mode: GLenum,
    pub front_face: GLenum,
    pub color_mask: [bool; 4],
    pub viewport: [GLint; 4],
    pub scissor: [GLint; 4],
    pub line_width: f32,
    pub polygon_mode: GLenum,
    pub clear_color: [f32; 4],
    pub active_texture: GLenum,
    pub texture_bindings: Vec<(GLenum, GLuint)>,
    pub current_program: GLuint,
    pub vao: GLuint,
    pub buffer_bindings: Vec<(GLenum, GLuint)>,
    pub draw_framebuffer: GLuint,
    pub read_framebuffer: GLuint,
    pub unpack_alignment: GLint,
    pub pack_alignment: GLint,
}

thread_local! {
    static STATE: RefCell<MockState> = RefCell::new(MockState::default());
}

pub fn with_state<R>(f: impl FnOnce(&mut MockState) -> R) -> R {
    STATE.with(|state| f(&mut state.borrow_mut()))
}

pub fn reset() {
    STATE.with(|state| *state.borrow_mut() = MockState::default());
}

pub fn drain_events() -> Vec<DrawEvent> {
    with_state(|state| std::mem::take(&mut state.events))
}

/// Current restorable state, with zero-valued bindings dropped so a map
/// that was never touched compares equal to one touched and restored.
pub fn snapshot() -> StateSnapshot {
    with_state(|s| {
        let mut caps: Vec<(GLenum, bool)> =
            s.caps.iter().filter(|(_, v)| **v).map(|(k, v)| (*k, *v)).collect();
        caps.sort_unstable();
        let mut texture_bindings: Vec<(GLenum, GLuint)> = s
            .texture_bindings
            .iter()
            .filter(|(_, v)| **v != 0)
            .map(|(k, v)| (*k, *v))
            .collect();
        texture_bindings.sort_unstable();
        let mut buffer_bindings: Vec<(GLenum, GLuint)> = s
            .buffer_bindings
            .iter()
            .filter(|(_, v)| **v != 0)
            .map(|(k, v)| (*k, *v))
            .collect();
        buffer_bindings.sort_unstable();
        StateSnapshot {
            caps,
            blend_func: s.blend_func,
            blend_equation: s.blend_equation,
            depth_mask: s.depth_mask,
            depth_func: s.depth_func,
            cull_mode: s.cull_mode,
            front_face: s.front_face,
            color_mask: s.color_mask,
            viewport: s.viewport,
            scissor: s.scissor,
            line_width: s.line_width,
            polygon_mode: s.polygon_mode,
            clear_color: s.clear_color,
            active_texture: s.active_texture,
            texture_bindings,
            current_program: s.current_program,
            vao: s.vao,
            buffer_bindings,
            draw_framebuffer: s.draw_framebuffer,
            read_framebuffer: s.read_framebuffer,
            unpack_alignment: s.unpack_alignment,
            pack_alignment: s.pack_alignment,
        }
    })
}

/// Location of a named uniform in a program, if the program asked for it.
pub fn uniform_location(program: GLuint, name: &str) -> Option<GLint> {
    with_state(|s| {
        s.programs
            .get(&program)
            .and_then(|p| p.uniform_locations.get(name).copied())
    })
}

fn record_draw(state: &mut MockState, kind: DrawKind) {
    let model = state.programs.get(&state.current_program).and_then(|p| {
        p.uniform_locations
            .get("u_model")
            .and_then(|loc| p.mat4.get(loc))
            .copied()
    });
    let event = DrawEvent {
        kind,
        program: state.current_program,
        vao: state.vao,
        blend: *state.caps.get(&BLEND).unwrap_or(&false),
        blend_func: state.blend_func,
        depth_test: *state.caps.get(&DEPTH_TEST).unwrap_or(&false),
        depth_mask: state.depth_mask,
        model,
    };
    state.events.push(event);
}

//--------------------------------------------------------------------------
// stubs

extern "system" fn mock_enable(cap: GLenum) {
    with_state(|s| {
        s.caps.insert(cap, true);
    });
}

extern "system" fn mock_disable(cap: GLenum) {
    with_state(|s| {
        s.caps.insert(cap, false);
    });
}

extern "system" fn mock_is_enabled(cap: GLenum) -> GLboolean {
    with_state(|s| *s.caps.get(&cap).unwrap_or(&false) as GLboolean)
}

extern "system" fn mock_get_integerv(pname: GLenum, data: *mut GLint) {
    with_state(|s| unsafe {
        match pname {
            MAJOR_VERSION => *data = 3,
            MINOR_VERSION => *data = 3,
            MAX_COMBINED_TEXTURE_IMAGE_UNITS => *data = 16,
            BLEND_SRC_RGB => *data = s.blend_func[0] as GLint,
            BLEND_DST_RGB => *data = s.blend_func[1] as GLint,
            BLEND_SRC_ALPHA => *data = s.blend_func[2] as GLint,
            BLEND_DST_ALPHA => *data = s.blend_func[3] as GLint,
            BLEND_EQUATION_RGB => *data = s.blend_equation[0] as GLint,
            BLEND_EQUATION_ALPHA => *data = s.blend_equation[1] as GLint,
            DEPTH_FUNC => *data = s.depth_func as GLint,
            CULL_FACE_MODE => *data = s.cull_mode as GLint,
            FRONT_FACE => *data = s.front_face as GLint,
            VIEWPORT => std::ptr::copy_nonoverlapping(s.viewport.as_ptr(), data, 4),
            SCISSOR_BOX => std::ptr::copy_nonoverlapping(s.scissor.as_ptr(), data, 4),
            POLYGON_MODE => {
                *data = s.polygon_mode as GLint;
                *data.add(1) = s.polygon_mode as GLint;
            }
            PRIMITIVE_RESTART_INDEX => *data = s.primitive_restart_index as GLint,
            ACTIVE_TEXTURE => *data = s.active_texture as GLint,
            TEXTURE_BINDING_2D => {
                *data = *s.texture_bindings.get(&s.active_texture).unwrap_or(&0) as GLint
            }
            CURRENT_PROGRAM => *data = s.current_program as GLint,
            VERTEX_ARRAY_BINDING => *data = s.vao as GLint,
            ARRAY_BUFFER_BINDING => {
                *data = *s.buffer_bindings.get(&ARRAY_BUFFER).unwrap_or(&0) as GLint
            }
            ELEMENT_ARRAY_BUFFER_BINDING => {
                *data = *s.buffer_bindings.get(&ELEMENT_ARRAY_BUFFER).unwrap_or(&0) as GLint
            }
            UNIFORM_BUFFER_BINDING => {
                *data = *s.buffer_bindings.get(&UNIFORM_BUFFER).unwrap_or(&0) as GLint
            }
            SHADER_STORAGE_BUFFER_BINDING => {
                *data = *s.buffer_bindings.get(&SHADER_STORAGE_BUFFER).unwrap_or(&0) as GLint
            }
            PIXEL_PACK_BUFFER_BINDING => {
                *data = *s.buffer_bindings.get(&PIXEL_PACK_BUFFER).unwrap_or(&0) as GLint
            }
            PIXEL_UNPACK_BUFFER_BINDING => {
                *data = *s.buffer_bindings.get(&PIXEL_UNPACK_BUFFER).unwrap_or(&0) as GLint
            }
            DRAW_FRAMEBUFFER_BINDING => *data = s.draw_framebuffer as GLint,
            READ_FRAMEBUFFER_BINDING => *data = s.read_framebuffer as GLint,
            RENDERBUFFER_BINDING => *data = s.renderbuffer as GLint,
            UNPACK_ALIGNMENT => *data = s.unpack_alignment,
            PACK_ALIGNMENT => *data = s.pack_alignment,
            STENCIL_FUNC => *data = s.stencil[0],
            STENCIL_REF => *data = s.stencil[1],
            STENCIL_VALUE_MASK => *data = s.stencil[2],
            STENCIL_BACK_FUNC => *data = s.stencil[3],
            STENCIL_BACK_REF => *data = s.stencil[4],
            STENCIL_BACK_VALUE_MASK => *data = s.stencil[5],
            STENCIL_FAIL => *data = s.stencil[6],
            STENCIL_PASS_DEPTH_FAIL => *data = s.stencil[7],
            STENCIL_PASS_DEPTH_PASS => *data = s.stencil[8],
            STENCIL_BACK_FAIL => *data = s.stencil[9],
            STENCIL_BACK_PASS_DEPTH_FAIL => *data = s.stencil[10],
            STENCIL_BACK_PASS_DEPTH_PASS => *data = s.stencil[11],
            STENCIL_WRITEMASK => *data = s.stencil[12],
            STENCIL_BACK_WRITEMASK => *data = s.stencil[13],
            STENCIL_CLEAR_VALUE => *data = s.clear_stencil,
            other => panic!("mock GetIntegerv: unhandled pname 0x{:X}", other),
        }
    });
}

extern "system" fn mock_get_floatv(pname: GLenum, data: *mut GLfloat) {
    with_state(|s| unsafe {
        match pname {
            LINE_WIDTH => *data = s.line_width,
            POINT_SIZE => *data = s.point_size,
            POLYGON_OFFSET_FACTOR => *data = s.polygon_offset[0],
            POLYGON_OFFSET_UNITS => *data = s.polygon_offset[1],
            COLOR_CLEAR_VALUE => std::ptr::copy_nonoverlapping(s.clear_color.as_ptr(), data, 4),
            DEPTH_CLEAR_VALUE => *data = s.clear_depth,
            BLEND_COLOR => std::ptr::copy_nonoverlapping(s.blend_color.as_ptr(), data, 4),
            DEPTH_RANGE => std::ptr::copy_nonoverlapping(s.depth_range.as_ptr(), data, 2),
            other => panic!("mock GetFloatv: unhandled pname 0x{:X}", other),
        }
    });
}

extern "system" fn mock_get_booleanv(pname: GLenum, data: *mut GLboolean) {
    with_state(|s| unsafe {
        match pname {
            DEPTH_WRITEMASK => *data = s.depth_mask as GLboolean,
            COLOR_WRITEMASK => {
                for i in 0..4 {
                    *data.add(i) = s.color_mask[i] as GLboolean;
                }
            }
            other => panic!("mock GetBooleanv: unhandled pname 0x{:X}", other),
        }
    });
}

extern "system" fn mock_get_string(_name: GLenum) -> *const c_uchar {
    static NAME: &[u8] = b"mock\0";
    NAME.as_ptr()
}

extern "system" fn mock_blend_func_separate(
    src_rgb: GLenum,
    dst_rgb: GLenum,
    src_alpha: GLenum,
    dst_alpha: GLenum,
) {
    with_state(|s| s.blend_func = [src_rgb, dst_rgb, src_alpha, dst_alpha]);
}

extern "system" fn mock_blend_func(src: GLenum, dst: GLenum) {
    with_state(|s| s.blend_func = [src, dst, src, dst]);
}

extern "system" fn mock_blend_equation_separate(rgb: GLenum, alpha: GLenum) {
    with_state(|s| s.blend_equation = [rgb, alpha]);
}

extern "system" fn mock_blend_color(r: GLfloat, g: GLfloat, b: GLfloat, a: GLfloat) {
    with_state(|s| s.blend_color = [r, g, b, a]);
}

extern "system" fn mock_depth_mask(flag: GLboolean) {
    with_state(|s| s.depth_mask = flag == TRUE);
}

extern "system" fn mock_depth_func(func: GLenum) {
    with_state(|s| s.depth_func = func);
}

extern "system" fn mock_depth_range(near: GLdouble, far: GLdouble) {
    with_state(|s| s.depth_range = [near as f32, far as f32]);
}

extern "system" fn mock_cull_face(mode: GLenum) {
    with_state(|s| s.cull_mode = mode);
}

extern "system" fn mock_front_face(mode: GLenum) {
    with_state(|s| s.front_face = mode);
}

extern "system" fn mock_color_mask(r: GLboolean, g: GLboolean, b: GLboolean, a: GLboolean) {
    with_state(|s| s.color_mask = [r == TRUE, g == TRUE, b == TRUE, a == TRUE]);
}

extern "system" fn mock_viewport(x: GLint, y: GLint, w: GLsizei, h: GLsizei) {
    with_state(|s| s.viewport = [x, y, w, h]);
}

extern "system" fn mock_scissor(x: GLint, y: GLint, w: GLsizei, h: GLsizei) {
    with_state(|s| s.scissor = [x, y, w, h]);
}

extern "system" fn mock_line_width(width: GLfloat) {
    with_state(|s| s.line_width = width);
}

extern "system" fn mock_polygon_mode(_face: GLenum, mode: GLenum) {
    with_state(|s| s.polygon_mode = mode);
}

extern "system" fn mock_polygon_offset(factor: GLfloat, units: GLfloat) {
    with_state(|s| s.polygon_offset = [factor, units]);
}

extern "system" fn mock_point_size(size: GLfloat) {
    with_state(|s| s.point_size = size);
}

extern "system" fn mock_primitive_restart_index(index: GLuint) {
    with_state(|s| s.primitive_restart_index = index);
}

extern "system" fn mock_clear_color(r: GLfloat, g: GLfloat, b: GLfloat, a: GLfloat) {
    with_state(|s| s.clear_color = [r, g, b, a]);
}

extern "system" fn mock_clear_depth(depth: GLdouble) {
    with_state(|s| s.clear_depth = depth as f32);
}

extern "system" fn mock_clear_stencil(stencil: GLint) {
    with_state(|s| s.clear_stencil = stencil);
}

extern "system" fn mock_clear(_mask: GLbitfield) {}

extern "system" fn mock_active_texture(unit: GLenum) {
    with_state(|s| s.active_texture = unit);
}

extern "system" fn mock_bind_texture(_target: GLenum, texture: GLuint) {
    with_state(|s| {
        let unit = s.active_texture;
        s.texture_bindings.insert(unit, texture);
    });
}

extern "system" fn mock_use_program(program: GLuint) {
    with_state(|s| s.current_program = program);
}

extern "system" fn mock_bind_vertex_array(vao: GLuint) {
    with_state(|s| s.vao = vao);
}

extern "system" fn mock_bind_buffer(target: GLenum, buffer: GLuint) {
    with_state(|s| {
        s.buffer_bindings.insert(target, buffer);
    });
}

extern "system" fn mock_bind_framebuffer(target: GLenum, framebuffer: GLuint) {
    with_state(|s| match target {
        DRAW_FRAMEBUFFER => s.draw_framebuffer = framebuffer,
        READ_FRAMEBUFFER => s.read_framebuffer = framebuffer,
        FRAMEBUFFER => {
            s.draw_framebuffer = framebuffer;
            s.read_framebuffer = framebuffer;
        }
        _ => {}
    });
}

extern "system" fn mock_bind_renderbuffer(_target: GLenum, renderbuffer: GLuint) {
    with_state(|s| s.renderbuffer = renderbuffer);
}

extern "system" fn mock_pixel_storei(pname: GLenum, value: GLint) {
    with_state(|s| match pname {
        UNPACK_ALIGNMENT => s.unpack_alignment = value,
        PACK_ALIGNMENT => s.pack_alignment = value,
        _ => {}
    });
}

extern "system" fn mock_stencil_func_separate(
    face: GLenum,
    func: GLenum,
    reference: GLint,
    mask: GLuint,
) {
    with_state(|s| {
        // FRONT = 0x0404, BACK = 0x0405, FRONT_AND_BACK = 0x0408
        if face != 0x0405 {
            s.stencil[0] = func as GLint;
            s.stencil[1] = reference;
            s.stencil[2] = mask as GLint;
        }
        if face != 0x0404 {
            s.stencil[3] = func as GLint;
            s.stencil[4] = reference;
            s.stencil[5] = mask as GLint;
        }
    });
}

extern "system" fn mock_stencil_op_separate(
    face: GLenum,
    sfail: GLenum,
    dpfail: GLenum,
    dppass: GLenum,
) {
    with_state(|s| {
        if face != 0x0405 {
            s.stencil[6] = sfail as GLint;
            s.stencil[7] = dpfail as GLint;
            s.stencil[8] = dppass as GLint;
        }
        if face != 0x0404 {
            s.stencil[9] = sfail as GLint;
            s.stencil[10] = dpfail as GLint;
            s.stencil[11] = dppass as GLint;
        }
    });
}

extern "system" fn mock_stencil_mask_separate(face: GLenum, mask: GLuint) {
    with_state(|s| {
        if face != 0x0405 {
            s.stencil[12] = mask as GLint;
        }
        if face != 0x0404 {
            s.stencil[13] = mask as GLint;
        }
    });
}

//---------------------------------------------------------------------
// objects

fn alloc_objects(state: &mut MockState, n: GLsizei, out: *mut GLuint) {
    for i in 0..n as usize {
        let id = state.next_object;
        state.next_object += 1;
        unsafe { *out.add(i) = id };
    }
}

extern "system" fn mock_gen_buffers(n: GLsizei, out: *mut GLuint) {
    with_state(|s| alloc_objects(s, n, out));
}

extern "system" fn mock_gen_vertex_arrays(n: GLsizei, out: *mut GLuint) {
    with_state(|s| alloc_objects(s, n, out));
}

extern "system" fn mock_gen_textures(n: GLsizei, out: *mut GLuint) {
    with_state(|s| alloc_objects(s, n, out));
}

extern "system" fn mock_gen_framebuffers(n: GLsizei, out: *mut GLuint) {
    with_state(|s| alloc_objects(s, n, out));
}

extern "system" fn mock_delete_noop(_n: GLsizei, _objs: *const GLuint) {}

extern "system" fn mock_buffer_data(
    target: GLenum,
    size: GLsizeiptr,
    data: *const c_void,
    _usage: GLenum,
) {
    with_state(|s| {
        let buffer = *s.buffer_bindings.get(&target).unwrap_or(&0);
        let mut store = vec![0u8; size.max(0) as usize];
        if !data.is_null() {
            unsafe {
                std::ptr::copy_nonoverlapping(data as *const u8, store.as_mut_ptr(), store.len())
            };
        }
        s.buffers.insert(buffer, store);
    });
}

extern "system" fn mock_buffer_sub_data(
    target: GLenum,
    offset: GLintptr,
    size: GLsizeiptr,
    data: *const c_void,
) {
    with_state(|s| {
        let buffer = *s.buffer_bindings.get(&target).unwrap_or(&0);
        if let Some(store) = s.buffers.get_mut(&buffer) {
            let offset = offset.max(0) as usize;
            let size = size.max(0) as usize;
            if offset + size <= store.len() && !data.is_null() {
                unsafe {
                    std::ptr::copy_nonoverlapping(
                        data as *const u8,
                        store.as_mut_ptr().add(offset),
                        size,
                    )
                };
            }
        }
    });
}

extern "system" fn mock_vertex_attrib_pointer(
    _index: GLuint,
    _size: GLint,
    _ty: GLenum,
    _normalized: GLboolean,
    _stride: GLsizei,
    _pointer: *const c_void,
) {
}

extern "system" fn mock_enable_vertex_attrib_array(_index: GLuint) {}
extern "system" fn mock_disable_vertex_attrib_array(_index: GLuint) {}
extern "system" fn mock_vertex_attrib_divisor(_index: GLuint, _divisor: GLuint) {}

extern "system" fn mock_tex_image_2d(
    _target: GLenum,
    _level: GLint,
    _internal: GLint,
    _w: GLsizei,
    _h: GLsizei,
    _border: GLint,
    _format: GLenum,
    _ty: GLenum,
    _pixels: *const c_void,
) {
}

extern "system" fn mock_tex_sub_image_2d(
    _target: GLenum,
    _level: GLint,
    _x: GLint,
    _y: GLint,
    _w: GLsizei,
    _h: GLsizei,
    _format: GLenum,
    _ty: GLenum,
    _pixels: *const c_void,
) {
}

extern "system" fn mock_tex_parameteri(_target: GLenum, _pname: GLenum, _param: GLint) {}

extern "system" fn mock_framebuffer_texture_2d(
    _target: GLenum,
    _attachment: GLenum,
    _textarget: GLenum,
    _texture: GLuint,
    _level: GLint,
) {
}

extern "system" fn mock_check_framebuffer_status(_target: GLenum) -> GLenum {
    FRAMEBUFFER_COMPLETE
}

extern "system" fn mock_blit_framebuffer(
    _sx0: GLint,
    _sy0: GLint,
    _sx1: GLint,
    _sy1: GLint,
    _dx0: GLint,
    _dy0: GLint,
    _dx1: GLint,
    _dy1: GLint,
    _mask: GLbitfield,
    _filter: GLenum,
) {
}

//---------------------------------------------------------------------
// shaders and programs

extern "system" fn mock_create_shader(_stage: GLenum) -> GLuint {
    with_state(|s| {
        let id = s.next_object;
        s.next_object += 1;
        id
    })
}

extern "system" fn mock_shader_source(
    _shader: GLuint,
    _count: GLsizei,
    _strings: *const *const GLchar,
    _lengths: *const GLint,
) {
}

extern "system" fn mock_compile_shader(_shader: GLuint) {}

extern "system" fn mock_get_shaderiv(_shader: GLuint, pname: GLenum, out: *mut GLint) {
    unsafe {
        *out = match pname {
            COMPILE_STATUS => 1,
            INFO_LOG_LENGTH => 0,
            _ => 0,
        };
    }
}

extern "system" fn mock_get_shader_info_log(
    _shader: GLuint,
    _max: GLsizei,
    written: *mut GLsizei,
    _buf: *mut GLchar,
) {
    unsafe { *written = 0 };
}

extern "system" fn mock_delete_shader(_shader: GLuint) {}

extern "system" fn mock_create_program() -> GLuint {
    with_state(|s| {
        let id = s.next_object;
        s.next_object += 1;
        s.programs.insert(id, ProgramRecord::default());
        id
    })
}

extern "system" fn mock_attach_shader(_program: GLuint, _shader: GLuint) {}
extern "system" fn mock_link_program(_program: GLuint) {}

extern "system" fn mock_get_programiv(_program: GLuint, pname: GLenum, out: *mut GLint) {
    unsafe {
        *out = match pname {
            LINK_STATUS => 1,
            INFO_LOG_LENGTH => 0,
            _ => 0,
        };
    }
}

extern "system" fn mock_get_program_info_log(
    _program: GLuint,
    _max: GLsizei,
    written: *mut GLsizei,
    _buf: *mut GLchar,
) {
    unsafe { *written = 0 };
}

extern "system" fn mock_delete_program(_program: GLuint) {}

extern "system" fn mock_get_uniform_location(program: GLuint, name: *const GLchar) -> GLint {
    let name = unsafe { CStr::from_ptr(name) }
        .to_string_lossy()
        .into_owned();
    with_state(|s| {
        let record = s.programs.entry(program).or_default();
        if let Some(loc) = record.uniform_locations.get(&name) {
            return *loc;
        }
        let loc = record.next_location;
        record.next_location += 1;
        record.uniform_locations.insert(name, loc);
        loc
    })
}

extern "system" fn mock_uniform1i(location: GLint, value: GLint) {
    with_state(|s| {
        let program = s.current_program;
        if let Some(record) = s.programs.get_mut(&program) {
            record.ints.insert(location, value);
        }
    });
}

extern "system" fn mock_uniform1f(location: GLint, value: GLfloat) {
    with_state(|s| {
        let program = s.current_program;
        if let Some(record) = s.programs.get_mut(&program) {
            record.floats.insert(location, value);
        }
    });
}

extern "system" fn mock_uniform2f(_location: GLint, _x: GLfloat, _y: GLfloat) {}
extern "system" fn mock_uniform3f(_location: GLint, _x: GLfloat, _y: GLfloat, _z: GLfloat) {}
extern "system" fn mock_uniform4f(
    _location: GLint,
    _x: GLfloat,
    _y: GLfloat,
    _z: GLfloat,
    _w: GLfloat,
) {
}

extern "system" fn mock_uniform_matrix4fv(
    location: GLint,
    _count: GLsizei,
    _transpose: GLboolean,
    value: *const GLfloat,
) {
    let mut matrix = [0f32; 16];
    unsafe { std::ptr::copy_nonoverlapping(value, matrix.as_mut_ptr(), 16) };
    with_state(|s| {
        let program = s.current_program;
        if let Some(record) = s.programs.get_mut(&program) {
            record.mat4.insert(location, matrix);
        }
    });
}

//---------------------------------------------------------------------
// draws

extern "system" fn mock_draw_arrays(mode: GLenum, _first: GLint, count: GLsizei) {
    with_state(|s| record_draw(s, DrawKind::Arrays { mode, count }));
}

extern "system" fn mock_draw_elements(
    _mode: GLenum,
    count: GLsizei,
    _ty: GLenum,
    _indices: *const c_void,
) {
    with_state(|s| record_draw(s, DrawKind::Elements { count }));
}

extern "system" fn mock_draw_arrays_instanced(
    _mode: GLenum,
    _first: GLint,
    count: GLsizei,
    instances: GLsizei,
) {
    with_state(|s| record_draw(s, DrawKind::ArraysInstanced { count, instances }));
}

extern "system" fn mock_draw_elements_instanced(
    _mode: GLenum,
    count: GLsizei,
    _ty: GLenum,
    _indices: *const c_void,
    instances: GLsizei,
) {
    with_state(|s| record_draw(s, DrawKind::ElementsInstanced { count, instances }));
}

/// Loads a `Gl` whose entry points are the mock stubs. Functions the mock
/// does not implement stay unloaded and panic on first use, which is the
/// failure mode we want in tests.
pub fn load_mock_gl() -> Gl {
    Gl::load_with(|symbol| match symbol {
        "glEnable" => mock_enable as *const c_void,
        "glDisable" => mock_disable as *const c_void,
        "glIsEnabled" => mock_is_enabled as *const c_void,
        "glGetIntegerv" => mock_get_integerv as *const c_void,
        "glGetFloatv" => mock_get_floatv as *const c_void,
        "glGetBooleanv" => mock_get_booleanv as *const c_void,
        "glGetString" => mock_get_string as *const c_void,
        "glBlendFunc" => mock_blend_func as *const c_void,
        "glBlendFuncSeparate" => mock_blend_func_separate as *const c_void,
        "glBlendEquationSeparate" => mock_blend_equation_separate as *const c_void,
        "glBlendColor" => mock_blend_color as *const c_void,
        "glDepthMask" => mock_depth_mask as *const c_void,
        "glDepthFunc" => mock_depth_func as *const c_void,
        "glDepthRange" => mock_depth_range as *const c_void,
        "glCullFace" => mock_cull_face as *const c_void,
        "glFrontFace" => mock_front_face as *const c_void,
        "glColorMask" => mock_color_mask as *const c_void,
        "glViewport" => mock_viewport as *const c_void,
        "glScissor" => mock_scissor as *const c_void,
        "glLineWidth" => mock_line_width as *const c_void,
        "glPolygonMode" => mock_polygon_mode as *const c_void,
        "glPolygonOffset" => mock_polygon_offset as *const c_void,
        "glPointSize" => mock_point_size as *const c_void,
        "glPrimitiveRestartIndex" => mock_primitive_restart_index as *const c_void,
        "glClearColor" => mock_clear_color as *const c_void,
        "glClearDepth" => mock_clear_depth as *const c_void,
        "glClearStencil" => mock_clear_stencil as *const c_void,
        "glClear" => mock_clear as *const c_void,
        "glActiveTexture" => mock_active_texture as *const c_void,
        "glBindTexture" => mock_bind_texture as *const c_void,
        "glUseProgram" => mock_use_program as *const c_void,
        "glBindVertexArray" => mock_bind_vertex_array as *const c_void,
        "glBindBuffer" => mock_bind_buffer as *const c_void,
        "glBindFramebuffer" => mock_bind_framebuffer as *const c_void,
        "glBindRenderbuffer" => mock_bind_renderbuffer as *const c_void,
        "glPixelStorei" => mock_pixel_storei as *const c_void,
        "glStencilFuncSeparate" => mock_stencil_func_separate as *const c_void,
        "glStencilOpSeparate" => mock_stencil_op_separate as *const c_void,
        "glStencilMaskSeparate" => mock_stencil_mask_separate as *const c_void,
        "glGenBuffers" => mock_gen_buffers as *const c_void,
        "glGenVertexArrays" => mock_gen_vertex_arrays as *const c_void,
        "glGenTextures" => mock_gen_textures as *const c_void,
        "glGenFramebuffers" => mock_gen_framebuffers as *const c_void,
        "glDeleteBuffers" => mock_delete_noop as *const c_void,
        "glDeleteVertexArrays" => mock_delete_noop as *const c_void,
        "glDeleteTextures" => mock_delete_noop as *const c_void,
        "glDeleteFramebuffers" => mock_delete_noop as *const c_void,
        "glBufferData" => mock_buffer_data as *const c_void,
        "glBufferSubData" => mock_buffer_sub_data as *const c_void,
        "glVertexAttribPointer" => mock_vertex_attrib_pointer as *const c_void,
        "glEnableVertexAttribArray" => mock_enable_vertex_attrib_array as *const c_void,
        "glDisableVertexAttribArray" => mock_disable_vertex_attrib_array as *const c_void,
        "glVertexAttribDivisor" => mock_vertex_attrib_divisor as *const c_void,
        "glTexImage2D" => mock_tex_image_2d as *const c_void,
        "glTexSubImage2D" => mock_tex_sub_image_2d as *const c_void,
        "glTexParameteri" => mock_tex_parameteri as *const c_void,
        "glFramebufferTexture2D" => mock_framebuffer_texture_2d as *const c_void,
        "glCheckFramebufferStatus" => mock_check_framebuffer_status as *const c_void,
        "glBlitFramebuffer" => mock_blit_framebuffer as *const c_void,
        "glCreateShader" => mock_create_shader as *const c_void,
        "glShaderSource" => mock_shader_source as *const c_void,
        "glCompileShader" => mock_compile_shader as *const c_void,
        "glGetShaderiv" => mock_get_shaderiv as *const c_void,
        "glGetShaderInfoLog" => mock_get_shader_info_log as *const c_void,
        "glDeleteShader" => mock_delete_shader as *const c_void,
        "glCreateProgram" => mock_create_program as *const c_void,
        "glAttachShader" => mock_attach_shader as *const c_void,
        "glLinkProgram" => mock_link_program as *const c_void,
        "glGetProgramiv" => mock_get_programiv as *const c_void,
        "glGetProgramInfoLog" => mock_get_program_info_log as *const c_void,
        "glDeleteProgram" => mock_delete_program as *const c_void,
        "glGetUniformLocation" => mock_get_uniform_location as *const c_void,
        "glUniform1i" => mock_uniform1i as *const c_void,
        "glUniform1f" => mock_uniform1f as *const c_void,
        "glUniform2f" => mock_uniform2f as *const c_void,
        "glUniform3f" => mock_uniform3f as *const c_void,
        "glUniform4f" => mock_uniform4f as *const c_void,
        "glUniformMatrix4fv" => mock_uniform_matrix4fv as *const c_void,
        "glDrawArrays" => mock_draw_arrays as *const c_void,
        "glDrawElements" => mock_draw_elements as *const c_void,
        "glDrawArraysInstanced" => mock_draw_arrays_instanced as *const c_void,
        "glDrawElementsInstanced" => mock_draw_elements_instanced as *const c_void,
        _ => std::ptr::null(),
    })
}
