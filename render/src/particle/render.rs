//! Particle drawing.
//!
//! One instanced draw per buffer: the base geometry (billboard quad or a
//! small solid) instanced over the particle records, which are sourced as
//! per-instance attributes at locations 2..=5 with divisor 1. The GPU
//! backing binds its SSBO directly as the instance buffer; the CPU backing
//! uploads its record array into a streaming VBO with the same layout.

use crate::api as gl;
use crate::api::types::*;
use crate::api::Gl;
use crate::context::RenderCtx;
use crate::mesh::{Mesh, VERTEX_STRIDE};
use crate::particle::components::{
    ParticleBlend, ParticleBuffer, ParticleEmitter, ParticleMeshKind, ParticleRender,
    ParticleRenderMode,
};
use crate::particle::pool::{Backing, ParticleDraw};
use crate::particle::record::{PARTICLE_ATTR_BASE, PARTICLE_STRIDE_BYTES};
use crate::shader::ShaderProgram;
use crate::state::StateScope;
use crate::systems::{active_camera, renderable, ActiveCamera};
use ember_ecs::{priority, EntityId, Phase, System, SystemError, Tick, World};
use nalgebra_glm::Vec3;
use std::rc::Rc;
use std::sync::Arc;

const QUAD_TAG: u64 = 1;
const MESH_TAG_BASE: u64 = 1 << 32;

/// Unit billboard quad: interleaved pos2 + uv2.
const QUAD_VERTICES: [f32; 24] = [
    -0.5, -0.5, 0.0, 0.0, //
    0.5, -0.5, 1.0, 0.0, //
    0.5, 0.5, 1.0, 1.0, //
    -0.5, -0.5, 0.0, 0.0, //
    0.5, 0.5, 1.0, 1.0, //
    -0.5, 0.5, 0.0, 1.0,
];

enum BaseGeometry {
    Quad,
    Mesh(Arc<Mesh>),
}

pub struct ParticleRenderSystem {
    ctx: Rc<RenderCtx>,
}

impl ParticleRenderSystem {
    pub fn new(ctx: Rc<RenderCtx>) -> ParticleRenderSystem {
        ParticleRenderSystem { ctx }
    }

    fn resolve_base(&self, mode: &ParticleRenderMode) -> Option<(BaseGeometry, u64)> {
        match mode {
            ParticleRenderMode::Mesh(kind) => {
                let handle = match kind {
                    ParticleMeshKind::Cube => self.ctx.meshes.get("mesh:cube"),
                    ParticleMeshKind::Tetrahedron => self.ctx.meshes.get("mesh:tetrahedron"),
                    ParticleMeshKind::Octahedron => self.ctx.meshes.get("mesh:octahedron"),
                    ParticleMeshKind::Icosahedron => self.ctx.meshes.get("mesh:icosahedron"),
                    ParticleMeshKind::Custom(handle) => handle.acquire().ok(),
                }?;
                let mesh = handle.get().ok()?;
                let tag = MESH_TAG_BASE + mesh.id().raw();
                Some((BaseGeometry::Mesh(mesh), tag))
            }
            _ => Some((BaseGeometry::Quad, QUAD_TAG)),
        }
    }

    /// Builds (or rebuilds) the VAO sourcing base geometry plus instance
    /// attributes over the record buffer.
    fn build_draw(&self, records_buffer: GLuint, base: &BaseGeometry, tag: u64) -> ParticleDraw {
        let gl_ = &self.ctx.gl;
        let mut vao = 0;
        let mut base_vbo = 0;
        let mut base_vertex_count = 0;
        let mut base_index_count = None;
        unsafe {
            let mut prev_vao: GLint = 0;
            let mut prev_array: GLint = 0;
            gl_.GetIntegerv(gl::VERTEX_ARRAY_BINDING, &mut prev_vao);
            gl_.GetIntegerv(gl::ARRAY_BUFFER_BINDING, &mut prev_array);

            gl_.GenVertexArrays(1, &mut vao);
            gl_.BindVertexArray(vao);

            match base {
                BaseGeometry::Quad => {
                    gl_.GenBuffers(1, &mut base_vbo);
                    gl_.BindBuffer(gl::ARRAY_BUFFER, base_vbo);
                    gl_.BufferData(
                        gl::ARRAY_BUFFER,
                        std::mem::size_of_val(&QUAD_VERTICES) as GLsizeiptr,
                        QUAD_VERTICES.as_ptr() as *const GLvoid,
                        gl::STATIC_DRAW,
                    );
                    gl_.EnableVertexAttribArray(0);
                    gl_.VertexAttribPointer(0, 2, gl::FLOAT, gl::FALSE, 16, std::ptr::null());
                    gl_.EnableVertexAttribArray(1);
                    gl_.VertexAttribPointer(1, 2, gl::FLOAT, gl::FALSE, 16, 8 as *const GLvoid);
                    base_vertex_count = 6;
                }
                BaseGeometry::Mesh(mesh) => {
                    let (vbo, ebo, index_count) = mesh.buffers();
                    gl_.BindBuffer(gl::ARRAY_BUFFER, vbo);
                    gl_.EnableVertexAttribArray(0);
                    gl_.VertexAttribPointer(
                        0,
                        3,
                        gl::FLOAT,
                        gl::FALSE,
                        VERTEX_STRIDE,
                        std::ptr::null(),
                    );
                    gl_.EnableVertexAttribArray(1);
                    gl_.VertexAttribPointer(
                        1,
                        3,
                        gl::FLOAT,
                        gl::FALSE,
                        VERTEX_STRIDE,
                        12 as *const GLvoid,
                    );
                    // the element binding is VAO state
                    gl_.BindBuffer(gl::ELEMENT_ARRAY_BUFFER, ebo);
                    base_index_count = Some(index_count);
                }
            }

            // the 16-float record as four vec4 instance attributes
            gl_.BindBuffer(gl::ARRAY_BUFFER, records_buffer);
            for column in 0..4u32 {
                let location = PARTICLE_ATTR_BASE + column;
                gl_.EnableVertexAttribArray(location);
                gl_.VertexAttribPointer(
                    location,
                    4,
                    gl::FLOAT,
                    gl::FALSE,
                    PARTICLE_STRIDE_BYTES as GLsizei,
                    (column as usize * 16) as *const GLvoid,
                );
                gl_.VertexAttribDivisor(location, 1);
            }

            gl_.BindVertexArray(prev_vao as GLuint);
            gl_.BindBuffer(gl::ARRAY_BUFFER, prev_array as GLuint);
        }
        ParticleDraw {
            vao,
            base_vbo,
            base_vertex_count,
            base_index_count,
            tag,
            gl: Rc::clone(gl_),
        }
    }

    fn apply_blend(scope: &mut StateScope, blend: ParticleBlend) {
        scope.enable_depth_test();
        match blend {
            ParticleBlend::Opaque => {
                scope.disable_blend();
                scope.set_depth_mask(true);
            }
            other => {
                scope.enable_blend();
                scope.set_depth_mask(false);
                let (src, dst) = match other {
                    ParticleBlend::Alpha => (gl::SRC_ALPHA, gl::ONE_MINUS_SRC_ALPHA),
                    ParticleBlend::Additive => (gl::SRC_ALPHA, gl::ONE),
                    ParticleBlend::SoftAdditive => (gl::ONE_MINUS_DST_COLOR, gl::ONE),
                    ParticleBlend::Multiply => (gl::DST_COLOR, gl::ZERO),
                    ParticleBlend::Premultiplied => (gl::ONE, gl::ONE_MINUS_SRC_ALPHA),
                    ParticleBlend::Opaque => unreachable!(),
                };
                scope.set_blend_func(src, dst);
            }
        }
    }

    fn set_uniforms(
        &self,
        program: &ShaderProgram,
        camera: &ActiveCamera,
        render: &ParticleRender,
        emitter: Option<&ParticleEmitter>,
    ) {
        program.set_mat4("u_view", &camera.view);
        program.set_mat4("u_projection", &camera.projection);
        // world-space camera basis from the view matrix's rotation rows
        let right = Vec3::new(camera.view[(0, 0)], camera.view[(0, 1)], camera.view[(0, 2)]);
        let up = Vec3::new(camera.view[(1, 0)], camera.view[(1, 1)], camera.view[(1, 2)]);
        program.set_vec3("u_camera_right", &right);
        program.set_vec3("u_camera_up", &up);

        let (mode, stretch) = match render.mode {
            ParticleRenderMode::Billboard => (0, 0.0),
            ParticleRenderMode::Stretched { factor } => (1, factor),
            ParticleRenderMode::HorizontalBillboard => (2, 0.0),
            ParticleRenderMode::VerticalBillboard => (3, 0.0),
            ParticleRenderMode::Mesh(_) => (4, 0.0),
        };
        program.set_i32("u_mode", mode);
        program.set_f32("u_stretch", stretch);
        program.set_f32("u_emissive", render.emissive);
        program.set_i32("u_receive_lighting", render.receive_lighting as i32);
        program.set_i32("u_texture", 0);
        program.set_i32("u_lightmap", 1);

        let animation = emitter.and_then(|e| e.animation);
        program.set_i32(
            "u_sheet_frames",
            animation.map(|a| a.frames as i32).unwrap_or(1),
        );
        program.set_f32("u_sheet_fps", animation.map(|a| a.fps).unwrap_or(0.0));

        // over-lifetime color/size are sampled in the vertex shader from
        // these key arrays; physics leaves the spawn-time values alone
        let color_keys = emitter.and_then(|e| e.color_over_life.as_ref());
        match color_keys {
            Some(gradient) => {
                let keys = gradient.keys();
                let count = keys.len().min(8);
                program.set_i32("u_color_key_count", count as i32);
                for (i, (t, color)) in keys.iter().take(8).enumerate() {
                    program.set_f32(&format!("u_color_times[{}]", i), *t);
                    program.set_vec4(
                        &format!("u_color_values[{}]", i),
                        &nalgebra_glm::Vec4::new(color[0], color[1], color[2], color[3]),
                    );
                }
            }
            None => program.set_i32("u_color_key_count", 0),
        }
        let size_keys = emitter.and_then(|e| e.size_over_life.as_ref());
        match size_keys {
            Some(curve) => {
                let keys = curve.keys();
                let count = keys.len().min(8);
                program.set_i32("u_size_key_count", count as i32);
                for (i, key) in keys.iter().take(8).enumerate() {
                    program.set_f32(&format!("u_size_times[{}]", i), key.t);
                    program.set_f32(&format!("u_size_values[{}]", i), key.value);
                }
            }
            None => program.set_i32("u_size_key_count", 0),
        }
    }

    fn draw_buffer(&self, world: &World, id: EntityId, camera: &ActiveCamera) -> Option<()> {
        let key = world.get::<ParticleBuffer>(id)?.key()?;
        let render = world.get::<ParticleRender>(id)?;
        let emitter = world.get::<ParticleEmitter>(id);

        let shader_key = match render.mode {
            ParticleRenderMode::Mesh(_) => "particle/particle_mesh",
            _ => "particle/particle",
        };
        let program = match self
            .ctx
            .shaders
            .get(shader_key)
            .and_then(|handle| handle.get().ok())
        {
            Some(program) => program,
            None => {
                self.ctx
                    .warn_once(shader_key, "particle shader unavailable, effect disabled");
                return None;
            }
        };

        let (base, tag) = self.resolve_base(&render.mode)?;

        let gl_ = Rc::clone(&self.ctx.gl);
        let mut pool = self.ctx.particles.borrow_mut();
        let backing = pool.get_mut(key)?;

        // per-backing draw resources, rebuilt when the mode's base
        // geometry changes
        let capacity;
        let records_buffer;
        match backing {
            Backing::Gpu(gpu) => {
                capacity = gpu.capacity;
                records_buffer = gpu.ssbo;
            }
            Backing::Cpu(cpu) => {
                capacity = cpu.records.len();
                if cpu.stream_vbo.is_none() {
                    let mut vbo = 0;
                    unsafe {
                        let mut prev: GLint = 0;
                        gl_.GetIntegerv(gl::ARRAY_BUFFER_BINDING, &mut prev);
                        gl_.GenBuffers(1, &mut vbo);
                        gl_.BindBuffer(gl::ARRAY_BUFFER, vbo);
                        gl_.BufferData(
                            gl::ARRAY_BUFFER,
                            (capacity * PARTICLE_STRIDE_BYTES) as GLsizeiptr,
                            std::ptr::null(),
                            gl::STREAM_DRAW,
                        );
                        gl_.BindBuffer(gl::ARRAY_BUFFER, prev as GLuint);
                    }
                    cpu.stream_vbo = Some(vbo);
                }
                records_buffer = cpu.stream_vbo.unwrap_or(0);
            }
        }

        let needs_rebuild = match backing {
            Backing::Gpu(gpu) => gpu.draw.as_ref().map(|d| d.tag) != Some(tag),
            Backing::Cpu(cpu) => cpu.draw.as_ref().map(|d| d.tag) != Some(tag),
        };
        if needs_rebuild {
            let draw = self.build_draw(records_buffer, &base, tag);
            match backing {
                Backing::Gpu(gpu) => gpu.draw = Some(draw),
                Backing::Cpu(cpu) => cpu.draw = Some(draw),
            }
        }

        let mut stack = self.ctx.state.borrow_mut();
        let mut scope = stack.scope(&gl_);
        Self::apply_blend(&mut scope, render.blend);
        scope.use_program(program.id());
        self.set_uniforms(&program, camera, render, emitter);

        let texture = emitter
            .and_then(|e| e.texture.as_ref())
            .and_then(|t| t.get().ok())
            .map(|t| t.id())
            .unwrap_or(0);
        scope.bind_texture_2d(0, texture);
        if render.receive_lighting {
            scope.bind_texture_2d(1, self.ctx.lightmap.texture().id());
        }

        match backing {
            Backing::Gpu(gpu) => {
                let draw = gpu.draw.as_ref()?;
                scope.bind_vertex_array(draw.vao);
                issue_draw(&gl_, draw, capacity as GLsizei);
            }
            Backing::Cpu(cpu) => {
                // stream this frame's records into the instance VBO
                scope.bind_array_buffer(records_buffer);
                unsafe {
                    gl_.BufferSubData(
                        gl::ARRAY_BUFFER,
                        0,
                        std::mem::size_of_val(cpu.records.as_slice()) as GLsizeiptr,
                        cpu.records.as_ptr() as *const GLvoid,
                    );
                }
                let draw = cpu.draw.as_ref()?;
                scope.bind_vertex_array(draw.vao);
                issue_draw(&gl_, draw, capacity as GLsizei);
            }
        }
        Some(())
    }
}

fn issue_draw(gl_: &Gl, draw: &ParticleDraw, instances: GLsizei) {
    unsafe {
        match draw.base_index_count {
            Some(index_count) => {
                gl_.DrawElementsInstanced(
                    gl::TRIANGLES,
                    index_count,
                    gl::UNSIGNED_INT,
                    std::ptr::null(),
                    instances,
                );
            }
            None => {
                gl_.DrawArraysInstanced(gl::TRIANGLES, 0, draw.base_vertex_count, instances);
            }
        }
    }
}

impl System for ParticleRenderSystem {
    fn name(&self) -> &'static str {
        "particle_render"
    }

    fn phase(&self) -> Phase {
        Phase::Render
    }

    fn priority(&self) -> i32 {
        priority::PARTICLE_RENDER
    }

    fn run(&mut self, world: &mut World, tick: &Tick) -> Result<(), SystemError> {
        let camera = match active_camera(world) {
            Some(camera) => camera,
            None => return Ok(()),
        };
        for id in world.entities_with::<(ParticleBuffer, ParticleRender)>() {
            if !renderable(world, id, tick.layer) {
                continue;
            }
            self.draw_buffer(world, id, &camera);
        }
        Ok(())
    }
}
