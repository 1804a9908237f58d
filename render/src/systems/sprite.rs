//! Screen-space sprite rendering.

use crate::api as gl;
use crate::api::types::*;
use crate::api::Gl;
use crate::components::{Sprite, Transform};
use crate::context::RenderCtx;
use crate::systems::renderable;
use bytemuck::{Pod, Zeroable};
use ember_ecs::{priority, Phase, System, SystemError, Tick, World};
use nalgebra_glm as glm;
use std::cell::RefCell;
use std::rc::Rc;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct SpriteVertex {
    position: [f32; 2],
    uv: [f32; 2],
    color: [f32; 4],
}

const SPRITE_VERTEX_STRIDE: GLsizei = std::mem::size_of::<SpriteVertex>() as GLsizei;

struct SpriteBatcher {
    gl: Rc<Gl>,
    vao: GLuint,
    buffer: crate::mesh::GrowableBuffer,
}

impl SpriteBatcher {
    fn new(gl_: &Rc<Gl>) -> SpriteBatcher {
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
                2,
                gl::FLOAT,
                gl::FALSE,
                SPRITE_VERTEX_STRIDE,
                std::ptr::null(),
            );
            gl_.EnableVertexAttribArray(1);
            gl_.VertexAttribPointer(
                1,
                2,
                gl::FLOAT,
                gl::FALSE,
                SPRITE_VERTEX_STRIDE,
                (2 * 4) as *const GLvoid,
            );
            gl_.EnableVertexAttribArray(2);
            gl_.VertexAttribPointer(
                2,
                4,
                gl::FLOAT,
                gl::FALSE,
                SPRITE_VERTEX_STRIDE,
                (4 * 4) as *const GLvoid,
            );

            gl_.BindVertexArray(prev_vao as GLuint);
            gl_.BindBuffer(gl::ARRAY_BUFFER, prev_array as GLuint);
        }
        SpriteBatcher {
            gl: Rc::clone(gl_),
            vao,
            buffer,
        }
    }
}

impl Drop for SpriteBatcher {
    fn drop(&mut self) {
        unsafe { self.gl.DeleteVertexArrays(1, &self.vao) };
    }
}

/// Accumulates visible sprite quads into per-texture batches and draws
/// them with an orthographic projection built from the current screen
/// size. Sprite positions come from the entity Transform, interpreted in
/// pixels.
pub struct SpriteRenderSystem {
    ctx: Rc<RenderCtx>,
    batcher: RefCell<Option<SpriteBatcher>>,
}

impl SpriteRenderSystem {
    pub fn new(ctx: Rc<RenderCtx>) -> SpriteRenderSystem {
        SpriteRenderSystem {
            ctx,
            batcher: RefCell::new(None),
        }
    }
}

impl System for SpriteRenderSystem {
    fn name(&self) -> &'static str {
        "sprite_render"
    }

    fn phase(&self) -> Phase {
        Phase::Render
    }

    fn priority(&self) -> i32 {
        priority::SPRITE
    }

    fn run(&mut self, world: &mut World, tick: &Tick) -> Result<(), SystemError> {
        // batches keyed by texture object; 0 = untextured
        let mut batches: Vec<(GLuint, Vec<SpriteVertex>)> = Vec::new();

        for id in world.entities_with::<(Sprite, Transform)>() {
            if !renderable(world, id, tick.layer) {
                continue;
            }
            let position = match world.get::<Transform>(id) {
                Some(t) => t.position(),
                None => continue,
            };
            let sprite = match world.get::<Sprite>(id) {
                Some(s) => s,
                None => continue,
            };
            let texture = sprite
                .texture
                .as_ref()
                .and_then(|t| t.get().ok())
                .map(|t| t.id())
                .unwrap_or(0);

            let (w, h) = (sprite.size.x, sprite.size.y);
            let (x, y) = (position.x, position.y);
            let c = [sprite.color.x, sprite.color.y, sprite.color.z, sprite.color.w];
            let quad = [
                SpriteVertex { position: [x, y], uv: [0.0, 0.0], color: c },
                SpriteVertex { position: [x + w, y], uv: [1.0, 0.0], color: c },
                SpriteVertex { position: [x + w, y + h], uv: [1.0, 1.0], color: c },
                SpriteVertex { position: [x, y], uv: [0.0, 0.0], color: c },
                SpriteVertex { position: [x + w, y + h], uv: [1.0, 1.0], color: c },
                SpriteVertex { position: [x, y + h], uv: [0.0, 1.0], color: c },
            ];
            match batches.iter_mut().find(|(tex, _)| *tex == texture) {
                Some((_, vertices)) => vertices.extend_from_slice(&quad),
                None => batches.push((texture, quad.to_vec())),
            }
        }

        if batches.is_empty() {
            return Ok(());
        }

        let program = match self
            .ctx
            .shaders
            .get("core/sprite")
            .and_then(|handle| handle.get().ok())
        {
            Some(program) => program,
            None => {
                self.ctx.warn_once("core/sprite", "sprite shader unavailable");
                return Ok(());
            }
        };

        let gl_ = Rc::clone(&self.ctx.gl);
        let mut batcher_slot = self.batcher.borrow_mut();
        let batcher = batcher_slot.get_or_insert_with(|| SpriteBatcher::new(&gl_));

        let (screen_w, screen_h) = self.ctx.screen_size.get();
        let ortho = glm::ortho(
            0.0,
            screen_w.max(1) as f32,
            screen_h.max(1) as f32,
            0.0,
            -1.0,
            1.0,
        );

        let mut stack = self.ctx.state.borrow_mut();
        let mut scope = stack.scope(&gl_);
        scope.disable_depth_test();
        scope.enable_blend();
        scope.set_blend_func(gl::SRC_ALPHA, gl::ONE_MINUS_SRC_ALPHA);
        scope.use_program(program.id());
        program.set_mat4("u_projection", &ortho);
        program.set_i32("u_texture", 0);

        scope.bind_vertex_array(batcher.vao);
        scope.bind_array_buffer(batcher.buffer.id());
        for (texture, vertices) in &batches {
            program.set_i32("u_has_texture", (*texture != 0) as i32);
            scope.bind_texture_2d(0, *texture);
            batcher
                .buffer
                .upload(gl::ARRAY_BUFFER, bytemuck::cast_slice(vertices));
            unsafe {
                gl_.DrawArrays(gl::TRIANGLES, 0, vertices.len() as GLsizei);
            }
        }
        Ok(())
    }
}
