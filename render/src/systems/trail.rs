//! Trail advancement.

use crate::components::{Trail, Transform};
use ember_ecs::{priority, Phase, System, SystemError, Tick, World};
use nalgebra_glm as glm;

/// Appends the owner's current position to each [`Trail`] ring once it has
/// moved far enough, and trims the ribbon to its capacity. The line pass
/// draws the result.
pub struct TrailSystem;

impl System for TrailSystem {
    fn name(&self) -> &'static str {
        "trail_advance"
    }

    fn phase(&self) -> Phase {
        Phase::Update
    }

    fn priority(&self) -> i32 {
        priority::TRAIL
    }

    fn run(&mut self, world: &mut World, tick: &Tick) -> Result<(), SystemError> {
        for id in world.entities_with::<(Transform, Trail)>() {
            if !world.matches_layer(id, tick.layer) {
                continue;
            }
            let position = match world.get::<Transform>(id) {
                Some(t) => t.position(),
                None => continue,
            };
            if let Some(trail) = world.get_mut::<Trail>(id) {
                let advance = trail
                    .points
                    .back()
                    .map(|last| glm::distance(last, &position) >= trail.min_distance)
                    .unwrap_or(true);
                if advance {
                    trail.points.push_back(position);
                    while trail.points.len() > trail.max_points {
                        trail.points.pop_front();
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Trail, Transform};
    use ember_ecs::{Layer, World};
    use nalgebra_glm::Vec3;

    #[test]
    fn trail_advances_and_trims() {
        let mut world = World::new();
        world.add_system(TrailSystem);
        let e = world.create_entity();
        world.add_component(e, Transform::new()).unwrap();
        world.add_component(e, Trail::new(3, 0.5)).unwrap();

        for i in 0..6 {
            if let Some(t) = world.get_mut::<Transform>(e) {
                t.set_position(Vec3::new(i as f32, 0.0, 0.0));
            }
            world.update(Some(Layer::World3d), 0.016);
        }
        let trail = world.get::<Trail>(e).unwrap();
        assert_eq!(trail.points.len(), 3);
        assert_eq!(*trail.points.back().unwrap(), Vec3::new(5.0, 0.0, 0.0));
    }

    #[test]
    fn trail_ignores_tiny_movement() {
        let mut world = World::new();
        world.add_system(TrailSystem);
        let e = world.create_entity();
        world.add_component(e, Transform::new()).unwrap();
        world.add_component(e, Trail::new(8, 1.0)).unwrap();

        world.update(Some(Layer::World3d), 0.016);
        if let Some(t) = world.get_mut::<Transform>(e) {
            t.set_position(Vec3::new(0.2, 0.0, 0.0));
        }
        world.update(Some(Layer::World3d), 0.016);
        assert_eq!(world.get::<Trail>(e).unwrap().points.len(), 1);
    }
}
