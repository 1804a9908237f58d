//! Transform resolution: first system of every UPDATE sweep.

use crate::components::{Bounds, Transform};
use ember_ecs::{priority, Phase, System, SystemError, Tick, World};

/// Recomputes world matrices for transforms mutated since the previous
/// frame and refreshes dependent world-space AABBs, so every later system
/// of the frame reads settled values.
pub struct TransformSystem;

impl System for TransformSystem {
    fn name(&self) -> &'static str {
        "transform_resolve"
    }

    fn phase(&self) -> Phase {
        Phase::Update
    }

    fn priority(&self) -> i32 {
        priority::TRANSFORM
    }

    fn run(&mut self, world: &mut World, tick: &Tick) -> Result<(), SystemError> {
        for id in world.entities_with::<Transform>() {
            if !world.matches_layer(id, tick.layer) {
                continue;
            }
            let was_dirty = world
                .get::<Transform>(id)
                .map(|t| t.is_dirty())
                .unwrap_or(false);
            if was_dirty {
                if let Some(transform) = world.get_mut::<Transform>(id) {
                    transform.resolve();
                }
            }

            // keep the cached world AABB in lockstep with the transform
            let bounds_stale = world
                .get::<Bounds>(id)
                .map(|b| was_dirty || b.is_stale())
                .unwrap_or(false);
            if bounds_stale {
                let world_matrix = match world.get::<Transform>(id) {
                    Some(t) => *t.world(),
                    None => continue,
                };
                if let Some(bounds) = world.get_mut::<Bounds>(id) {
                    let world_aabb = bounds.local().transformed(&world_matrix);
                    bounds.store_world(world_aabb);
                }
            }
        }
        Ok(())
    }
}
