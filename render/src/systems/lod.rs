//! Level-of-detail selection.

use crate::components::{Lod, Transform};
use crate::systems::active_camera;
use ember_ecs::{priority, Phase, System, SystemError, Tick, World};
use nalgebra_glm as glm;

/// Recomputes each LOD component's active level from its distance to the
/// active camera, with per-level hysteresis so a boundary-straddling
/// entity doesn't flicker between meshes. Mesh and instanced rendering
/// read the resulting level when picking the mesh.
pub struct LodSystem;

impl System for LodSystem {
    fn name(&self) -> &'static str {
        "lod"
    }

    fn phase(&self) -> Phase {
        Phase::Update
    }

    fn priority(&self) -> i32 {
        priority::LOD
    }

    fn run(&mut self, world: &mut World, tick: &Tick) -> Result<(), SystemError> {
        let camera = match active_camera(world) {
            Some(c) => c,
            None => return Ok(()),
        };
        for id in world.entities_with::<(Transform, Lod)>() {
            if !world.matches_layer(id, tick.layer) {
                continue;
            }
            let position = match world.get::<Transform>(id) {
                Some(t) => t.position(),
                None => continue,
            };
            let distance = glm::distance(&position, &camera.position);
            if let Some(lod) = world.get_mut::<Lod>(id) {
                if lod.observe_distance(distance) {
                    log::trace!("{}: lod level -> {}", id, lod.active_level());
                }
            }
        }
        Ok(())
    }
}
