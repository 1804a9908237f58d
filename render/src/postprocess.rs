//! Bloom post-process chain.
//!
//! Runs when the active camera's entity carries a [`PostProcess`]
//! component: the host's color buffer is blitted into an internal capture
//! target, bright pixels are extracted with a soft-knee threshold, blurred
//! with separable Gaussian ping-pong passes and composited additively back
//! onto the host framebuffer with exposure and optional ACES tonemapping.
//! The host's own depth/color buffers are only read and composited over,
//! never owned.

use crate::api as gl;
use crate::api::types::*;
use crate::components::PostProcess;
use crate::context::RenderCtx;
use crate::framebuffer::RenderTarget;
use crate::systems::active_camera;
use ember_ecs::{Phase, System, SystemError, Tick, World};
use std::cell::RefCell;
use std::rc::Rc;

/// Post-process runs after the particle pass and before debug overlays.
const POST_PROCESS_PRIORITY: i32 = 800;

struct Targets {
    capture: RenderTarget,
    ping: RenderTarget,
    pong: RenderTarget,
    /// Attribute-less fullscreen-triangle VAO (vertices from gl_VertexID).
    empty_vao: GLuint,
    size: (u32, u32),
}

pub struct PostProcessSystem {
    ctx: Rc<RenderCtx>,
    targets: RefCell<Option<Targets>>,
}

impl PostProcessSystem {
    pub fn new(ctx: Rc<RenderCtx>) -> PostProcessSystem {
        PostProcessSystem {
            ctx,
            targets: RefCell::new(None),
        }
    }

    fn ensure_targets(&self, width: u32, height: u32) -> bool {
        let mut slot = self.targets.borrow_mut();
        let stale = slot
            .as_ref()
            .map(|t| t.size != (width, height))
            .unwrap_or(true);
        if !stale {
            return true;
        }
        let gl_ = &self.ctx.gl;
        let build = || -> Result<Targets, crate::error::RenderError> {
            let capture = RenderTarget::new(gl_, width, height)?;
            let ping = RenderTarget::new(gl_, width, height)?;
            let pong = RenderTarget::new(gl_, width, height)?;
            let mut empty_vao = 0;
            unsafe { gl_.GenVertexArrays(1, &mut empty_vao) };
            Ok(Targets {
                capture,
                ping,
                pong,
                empty_vao,
                size: (width, height),
            })
        };
        match build() {
            Ok(targets) => {
                *slot = Some(targets);
                true
            }
            Err(err) => {
                self.ctx
                    .warn_once("postprocess-targets", &format!("bloom disabled: {}", err));
                false
            }
        }
    }
}

impl System for PostProcessSystem {
    fn name(&self) -> &'static str {
        "post_process"
    }

    fn phase(&self) -> Phase {
        Phase::Render
    }

    fn priority(&self) -> i32 {
        POST_PROCESS_PRIORITY
    }

    fn run(&mut self, world: &mut World, _tick: &Tick) -> Result<(), SystemError> {
        let camera = match active_camera(world) {
            Some(camera) => camera,
            None => return Ok(()),
        };
        let settings = match world.get::<PostProcess>(camera.entity) {
            Some(settings) => *settings,
            None => return Ok(()),
        };

        let (width, height) = self.ctx.screen_size.get();
        if width == 0 || height == 0 || !self.ensure_targets(width, height) {
            return Ok(());
        }

        let extract = self.ctx.shaders.get("postprocess/brightness_extract");
        let blur = self.ctx.shaders.get("postprocess/blur");
        let composite = self.ctx.shaders.get("postprocess/composite");
        let (extract, blur, composite) = match (
            extract.and_then(|h| h.get().ok()),
            blur.and_then(|h| h.get().ok()),
            composite.and_then(|h| h.get().ok()),
        ) {
            (Some(a), Some(b), Some(c)) => (a, b, c),
            _ => {
                self.ctx
                    .warn_once("postprocess-shaders", "post-process shaders unavailable");
                return Ok(());
            }
        };

        let gl_ = Rc::clone(&self.ctx.gl);
        let targets = self.targets.borrow();
        let targets = match targets.as_ref() {
            Some(targets) => targets,
            None => return Ok(()),
        };

        // where the host had us drawing; also the composite destination
        let mut host_fbo: GLint = 0;
        unsafe { gl_.GetIntegerv(gl::DRAW_FRAMEBUFFER_BINDING, &mut host_fbo) };

        let mut stack = self.ctx.state.borrow_mut();
        let mut scope = stack.scope(&gl_);
        scope.disable_depth_test();
        scope.set_depth_mask(false);
        scope.disable_blend();
        scope.set_viewport(0, 0, width as i32, height as i32);
        scope.bind_vertex_array(targets.empty_vao);

        unsafe {
            // capture the scene color rendered so far
            scope.bind_read_framebuffer(host_fbo as GLuint);
            scope.bind_draw_framebuffer(targets.capture.fbo());
            gl_.BlitFramebuffer(
                0,
                0,
                width as GLint,
                height as GLint,
                0,
                0,
                width as GLint,
                height as GLint,
                gl::COLOR_BUFFER_BIT,
                gl::NEAREST,
            );

            // bright pass into ping
            scope.bind_draw_framebuffer(targets.ping.fbo());
            scope.use_program(extract.id());
            extract.set_i32("u_scene", 0);
            extract.set_f32("u_threshold", settings.threshold);
            extract.set_f32("u_knee", settings.knee);
            scope.bind_texture_2d(0, targets.capture.color_texture());
            gl_.DrawArrays(gl::TRIANGLES, 0, 3);

            // separable Gaussian ping-pong
            scope.use_program(blur.id());
            blur.set_i32("u_source", 0);
            let mut source = &targets.ping;
            let mut dest = &targets.pong;
            for i in 0..settings.blur_iterations.max(1) * 2 {
                scope.bind_draw_framebuffer(dest.fbo());
                blur.set_i32("u_horizontal", (i % 2 == 0) as i32);
                scope.bind_texture_2d(0, source.color_texture());
                gl_.DrawArrays(gl::TRIANGLES, 0, 3);
                std::mem::swap(&mut source, &mut dest);
            }

            // additive composite over the host's color buffer
            scope.bind_draw_framebuffer(host_fbo as GLuint);
            scope.enable_blend();
            scope.set_blend_func(gl::ONE, gl::ONE);
            scope.use_program(composite.id());
            composite.set_i32("u_bloom", 0);
            composite.set_f32("u_intensity", settings.intensity);
            composite.set_f32("u_exposure", settings.exposure);
            composite.set_i32("u_tonemap", settings.tonemap as i32);
            scope.bind_texture_2d(0, source.color_texture());
            gl_.DrawArrays(gl::TRIANGLES, 0, 3);
        }
        Ok(())
    }
}
