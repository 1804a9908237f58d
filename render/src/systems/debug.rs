//! Debug wireframe pass.

use crate::components::{Bounds, Visibility};
use crate::context::RenderCtx;
use crate::systems::{active_camera, LineBatcher};
use ember_ecs::{priority, Phase, System, SystemError, Tick, World};
use nalgebra_glm::Vec4;
use std::cell::RefCell;
use std::rc::Rc;

/// Last render pass: world-space AABB wireframes for every entity with
/// Bounds (green when visible, red when culled). Enabled with
/// `RenderCtx::debug_draw`.
pub struct DebugRenderSystem {
    ctx: Rc<RenderCtx>,
    batcher: RefCell<Option<LineBatcher>>,
}

impl DebugRenderSystem {
    pub fn new(ctx: Rc<RenderCtx>) -> DebugRenderSystem {
        DebugRenderSystem {
            ctx,
            batcher: RefCell::new(None),
        }
    }
}

impl System for DebugRenderSystem {
    fn name(&self) -> &'static str {
        "debug_render"
    }

    fn phase(&self) -> Phase {
        Phase::Render
    }

    fn priority(&self) -> i32 {
        priority::DEBUG_RENDER
    }

    fn run(&mut self, world: &mut World, tick: &Tick) -> Result<(), SystemError> {
        if !self.ctx.debug_draw.get() {
            return Ok(());
        }
        let camera = match active_camera(world) {
            Some(camera) => camera,
            None => return Ok(()),
        };

        let gl_ = Rc::clone(&self.ctx.gl);
        let mut batcher = self.batcher.borrow_mut();
        let batcher = batcher.get_or_insert_with(|| LineBatcher::new(&gl_));
        batcher.clear();

        for id in world.entities_with::<Bounds>() {
            if !world.matches_layer(id, tick.layer) || !world.in_active_dimension(id) {
                continue;
            }
            let culled = world
                .get::<Visibility>(id)
                .map(|v| v.is_culled())
                .unwrap_or(false);
            let color = if culled {
                Vec4::new(1.0, 0.2, 0.2, 1.0)
            } else {
                Vec4::new(0.2, 1.0, 0.2, 1.0)
            };
            if let Some(bounds) = world.get::<Bounds>(id) {
                batcher.push_aabb(&bounds.world(), color);
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
            None => return Ok(()),
        };

        let mut stack = self.ctx.state.borrow_mut();
        let mut scope = stack.scope(&gl_);
        scope.disable_depth_test();
        scope.set_line_width(1.0);
        scope.use_program(program.id());
        program.set_mat4("u_view_projection", &camera.view_projection);
        batcher.flush(&mut scope);
        Ok(())
    }
}
