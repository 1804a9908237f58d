//! World-space UI projection.

use crate::components::{Transform, WorldSpaceUi};
use crate::context::RenderCtx;
use crate::systems::active_camera;
use ember_ecs::{priority, Phase, System, SystemError, Tick, World};
use nalgebra_glm::{Vec2, Vec4};
use std::rc::Rc;

/// Projects each [`WorldSpaceUi`] anchor through the active camera into
/// pixel coordinates so HUD widgets can follow world objects. Anchors
/// behind the camera project to `None`.
pub struct WorldUiSystem {
    ctx: Rc<RenderCtx>,
}

impl WorldUiSystem {
    pub fn new(ctx: Rc<RenderCtx>) -> WorldUiSystem {
        WorldUiSystem { ctx }
    }
}

impl System for WorldUiSystem {
    fn name(&self) -> &'static str {
        "world_ui_projection"
    }

    fn phase(&self) -> Phase {
        Phase::Update
    }

    fn priority(&self) -> i32 {
        priority::WORLD_UI
    }

    fn run(&mut self, world: &mut World, tick: &Tick) -> Result<(), SystemError> {
        let camera = match active_camera(world) {
            Some(camera) => camera,
            None => return Ok(()),
        };
        let (screen_w, screen_h) = self.ctx.screen_size.get();
        let (screen_w, screen_h) = (screen_w.max(1) as f32, screen_h.max(1) as f32);

        for id in world.entities_with::<(Transform, WorldSpaceUi)>() {
            if !world.matches_layer(id, tick.layer) {
                continue;
            }
            let anchor = match (world.get::<Transform>(id), world.get::<WorldSpaceUi>(id)) {
                (Some(t), Some(ui)) => t.position() + ui.world_offset,
                _ => continue,
            };
            let clip = camera.view_projection * Vec4::new(anchor.x, anchor.y, anchor.z, 1.0);
            let screen = if clip.w > 0.0 {
                let ndc_x = clip.x / clip.w;
                let ndc_y = clip.y / clip.w;
                Some(Vec2::new(
                    (ndc_x * 0.5 + 0.5) * screen_w,
                    (1.0 - (ndc_y * 0.5 + 0.5)) * screen_h,
                ))
            } else {
                None
            };
            if let Some(ui) = world.get_mut::<WorldSpaceUi>(id) {
                ui.screen = screen;
            }
        }
        Ok(())
    }
}
