//! Camera matrix composition.

use crate::components::{Camera, Projection, Transform};
use crate::context::RenderCtx;
use ember_ecs::{priority, Layer, Phase, System, SystemError, Tick, World};
use nalgebra_glm as glm;
use std::rc::Rc;

/// Composes view (inverse of the entity's translation+rotation) and
/// projection matrices for every camera, and records the active WORLD_3D
/// camera on the scene manager.
pub struct CameraSystem {
    ctx: Rc<RenderCtx>,
}

impl CameraSystem {
    pub fn new(ctx: Rc<RenderCtx>) -> CameraSystem {
        CameraSystem { ctx }
    }
}

impl System for CameraSystem {
    fn name(&self) -> &'static str {
        "camera_matrices"
    }

    fn phase(&self) -> Phase {
        Phase::Update
    }

    fn priority(&self) -> i32 {
        priority::CAMERA
    }

    fn run(&mut self, world: &mut World, tick: &Tick) -> Result<(), SystemError> {
        let (screen_w, screen_h) = self.ctx.screen_size.get();
        let screen_aspect = screen_w.max(1) as f32 / screen_h.max(1) as f32;

        let mut active = None;
        for id in world.entities_with::<(Transform, Camera)>() {
            if !world.matches_layer(id, tick.layer) {
                continue;
            }
            let (translation, rotation) = match world.get::<Transform>(id) {
                Some(t) => (glm::translation(&t.position()), t.rotation_matrix()),
                None => continue,
            };
            let camera = match world.get_mut::<Camera>(id) {
                Some(c) => c,
                None => continue,
            };
            let aspect = if camera.aspect > 0.0 {
                camera.aspect
            } else {
                screen_aspect
            };
            let view = glm::inverse(&(translation * rotation));
            let proj = match camera.projection {
                Projection::Perspective { fov_degrees } => glm::perspective(
                    aspect,
                    fov_degrees.to_radians(),
                    camera.near,
                    camera.far,
                ),
                Projection::Orthographic { size } => {
                    let half_h = size * 0.5;
                    let half_w = half_h * aspect;
                    glm::ortho(-half_w, half_w, -half_h, half_h, camera.near, camera.far)
                }
            };
            camera.store_matrices(view, proj);

            if camera.active {
                if active.is_none() {
                    active = Some(id);
                } else {
                    self.ctx.warn_once(
                        "multiple-active-cameras",
                        "more than one camera is active; using the first",
                    );
                }
            }
        }

        // the scene's notion of "the camera" follows WORLD_3D sweeps only,
        // so HUD/GUI passes don't clobber it
        if tick.layer.is_none() || tick.layer == Some(Layer::World3d) {
            world.scene_mut().set_active_camera(active);
        }
        Ok(())
    }
}
