//! Frustum culling.

use crate::components::{Bounds, MeshRenderer, Transform, Visibility};
use crate::geom::Frustum;
use crate::systems::active_camera;
use ember_ecs::{priority, Layer, Phase, System, SystemError, Tick, World};

/// Writes the system half of [`Visibility`]: WORLD_3D entities are tested
/// against the active camera's frustum; HUD/GUI entities are never culled.
/// Entities without Bounds fall back to their mesh's local AABB
/// (conservatively transformed) and entities with neither stay visible.
pub struct FrustumCullSystem;

impl System for FrustumCullSystem {
    fn name(&self) -> &'static str {
        "frustum_cull"
    }

    fn phase(&self) -> Phase {
        Phase::Update
    }

    fn priority(&self) -> i32 {
        priority::FRUSTUM_CULL
    }

    fn run(&mut self, world: &mut World, tick: &Tick) -> Result<(), SystemError> {
        let camera = match active_camera(world) {
            Some(c) => c,
            None => return Ok(()),
        };
        let frustum = Frustum::from_view_projection(&camera.view_projection);

        for id in world.entities_with::<Visibility>() {
            if !world.matches_layer(id, tick.layer) {
                continue;
            }
            if world.layer_of(id) != Layer::World3d {
                if let Some(visibility) = world.get_mut::<Visibility>(id) {
                    visibility.set_culled(false);
                }
                continue;
            }

            let aabb = if let Some(bounds) = world.get::<Bounds>(id) {
                Some(bounds.world())
            } else {
                // back-edge from the mesh: use its local AABB, accepting
                // the conservatism of the transformed box
                world.get::<MeshRenderer>(id).and_then(|renderer| {
                    let mesh = renderer.mesh.as_ref()?.get().ok()?;
                    let transform = world.get::<Transform>(id)?;
                    Some(mesh.local_aabb().transformed(transform.world()))
                })
            };

            let culled = match aabb {
                Some(aabb) => !frustum.intersects_aabb(&aabb),
                None => false,
            };
            if let Some(visibility) = world.get_mut::<Visibility>(id) {
                visibility.set_culled(culled);
            }
        }
        Ok(())
    }
}
