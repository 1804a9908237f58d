//! Line rendering: one dynamic batch per frame per layer.

use crate::api as gl;
use crate::api::types::*;
use crate::api::Gl;
use crate::components::{Lines, Trail};
use crate::context::RenderCtx;
use crate::state::StateScope;
use crate::systems::{active_camera, renderable};
use bytemuck::{Pod, Zeroable};
use ember_ecs::{priority, Phase, System, SystemError, Tick, World};
use nalgebra_glm::{Vec3, Vec4};
use std::cell::RefCell;
use std::rc::Rc;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct LineVertex {
    position: [f32; 3],
    color: [f32; 4],
}

const LINE_VERTEX_STRIDE: GLsizei = std::mem::size_of::<LineVertex>() as GLsizei;

/// Accumulates line vertices on the CPU and draws them in a single
/// `GL_LINES` call. Shared by the line pass and the debug pass.
pub struct LineBatcher {
    gl: Rc<Gl>,
    vao: GLuint,
    buffer: crate::mesh::GrowableBuffer,
    vertices: Vec<LineVertex>,
}

impl LineBatcher {
    pub fn new(gl_: &Rc<Gl>) -> LineBatcher {
        let buffer = crate::mesh::GrowableBuffer::new(gl_, gl::STREAM_DRAW);
        let mut vao = 0;
        unsafe {
            let mut prev_vao: GLint = 0;
            let mut prev_array: GLint = 0;
            gl_.GetIntegerv(gl::VERTEX_ARRAY_BINDING, &mut prev_vao);
            gl_.GetIntegerv(gl::ARRAY_BUFFER_BINDING, &mut prev_array);

            gl_.GenVertexArrays(1, &mut vao);
            gl_.BindVertexArray(vao);
            gl_.BindBuffer(gl::ARRAY_BUFFER, buffer.id());
            gl_.EnableVertexAttribArray(0);
            gl_.VertexAttribPointer(
                0,
                3,
                gl::FLOAT,
                gl::FALSE,
                LINE_VERTEX_STRIDE,
                std::ptr::null(),
            );
            gl_.EnableVertexAttribArray(1);
            gl_.VertexAttribPointer(
                1,
                4,
                gl::FLOAT,
                gl::FALSE,
                LINE_VERTEX_STRIDE,
                (3 * 4) as *const GLvoid,
            );

            gl_.BindVertexArray(prev_vao as GLuint);
            gl_.BindBuffer(gl::ARRAY_BUFFER, prev_array as GLuint);
        }
        LineBatcher {
            gl: Rc::clone(gl_),
            vao,
            buffer,
            vertices: Vec::new(),
        }
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn push_segment(&mut self, start: Vec3, end: Vec3, color: Vec4) {
        self.vertices.push(LineVertex {
            position: [start.x, start.y, start.z],
            color: [color.x, color.y, color.z, color.w],
        });
        self.vertices.push(LineVertex {
            position: [end.x, end.y, end.z],
            color: [color.x, color.y, color.z, color.w],
        });
    }

    /// Wireframe box helper used by the debug pass.
    pub fn push_aabb(&mut self, aabb: &crate::geom::Aabb, color: Vec4) {
        let (min, max) = (aabb.min, aabb.max);
        let corners = [
            Vec3::new(min.x, min.y, min.z),
            Vec3::new(max.x, min.y, min.z),
            Vec3::new(max.x, max.y, min.z),
            Vec3::new(min.x, max.y, min.z),
            Vec3::new(min.x, min.y, max.z),
            Vec3::new(max.x, min.y, max.z),
            Vec3::new(max.x, max.y, max.z),
            Vec3::new(min.x, max.y, max.z),
        ];
        const EDGES: [(usize, usize); 12] = [
            (0, 1),
            (1, 2),
            (2, 3),
            (3, 0),
            (4, 5),
            (5, 6),
            (6, 7),
            (7, 4),
            (0, 4),
            (1, 5),
            (2, 6),
            (3, 7),
        ];
        for (a, b) in EDGES {
            self.push_segment(corners[a], corners[b], color);
        }
    }

    /// Uploads and draws the accumulated batch; the caller has bound the
    /// program and configured blending/depth through `scope`.
    pub fn flush(&mut self, scope: &mut StateScope) {
        if self.vertices.is_empty() {
            return;
        }
        scope.bind_vertex_array(self.vao);
        scope.bind_array_buffer(self.buffer.id());
        self.buffer
            .upload(gl::ARRAY_BUFFER, bytemuck::cast_slice(&self.vertices));
        unsafe {
            self.gl
                .DrawArrays(gl::LINES, 0, self.vertices.len() as GLsizei);
        }
        self.vertices.clear();
    }
}

impl Drop for LineBatcher {
    fn drop(&mut self) {
        unsafe { self.gl.DeleteVertexArrays(1, &self.vao) };
    }
}

/// Draws every visible [`Lines`] component and [`Trail`] ribbon with the
/// active camera's view-projection, one batch per frame.
pub struct LineRenderSystem {
    ctx: Rc<RenderCtx>,
    batcher: RefCell<Option<LineBatcher>>,
}

impl LineRenderSystem {
    pub fn new(ctx: Rc<RenderCtx>) -> LineRenderSystem {
        LineRenderSystem {
            ctx,
            batcher: RefCell::new(None),
        }
    }
}

impl System for LineRenderSystem {
    fn name(&self) -> &'static str {
        "line_render"
    }

    fn phase(&self) -> Phase {
        Phase::Render
    }

    fn priority(&self) -> i32 {
        priority::LINE
    }

    fn run(&mut self, world: &mut World, tick: &Tick) -> Result<(), SystemError> {
        let camera = match active_camera(world) {
            Some(camera) => camera,
            None => return Ok(()),
        };

        let gl_ = Rc::clone(&self.ctx.gl);
        let mut batcher = self.batcher.borrow_mut();
        let batcher = batcher.get_or_insert_with(|| LineBatcher::new(&gl_));
        batcher.clear();
        let mut width = 1.0f32;

        for id in world.entities_with::<Lines>() {
            if !renderable(world, id, tick.layer) {
                continue;
            }
            if let Some(lines) = world.get::<Lines>(id) {
                width = width.max(lines.width);
                for segment in &lines.segments {
                    batcher.push_segment(segment.start, segment.end, segment.color);
                }
            }
        }
        for id in world.entities_with::<Trail>() {
            if !renderable(world, id, tick.layer) {
                continue;
            }
            if let Some(trail) = world.get::<Trail>(id) {
                let points: Vec<Vec3> = trail.points.iter().copied().collect();
                for pair in points.windows(2) {
                    batcher.push_segment(pair[0], pair[1], trail.color);
                }
            }
        }

        if batcher.is_empty() {
            return Ok(());
        }

        let program = match self
            .ctx
            .shaders
            .get("core/line")
            .and_then(|handle| handle.get().ok())
        {
            Some(program) => program,
            None => {
                self.ctx.warn_once("core/line", "line shader unavailable");
                return Ok(());
            }
        };

        let mut stack = self.ctx.state.borrow_mut();
        let mut scope = stack.scope(&gl_);
        scope.enable_depth_test();
        scope.set_depth_mask(false);
        scope.enable_blend();
        scope.set_blend_func(gl::SRC_ALPHA, gl::ONE_MINUS_SRC_ALPHA);
        scope.set_line_width(width);
        scope.use_program(program.id());
        program.set_mat4("u_view_projection", &camera.view_projection);
        batcher.flush(&mut scope);
        Ok(())
    }
}
