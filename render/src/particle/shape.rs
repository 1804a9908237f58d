//! Emission shapes.
//!
//! Each shape produces a position in emitter-local space plus the local
//! outward direction used when `emit_along_normal` is set. Sampling draws
//! from the emitter's own seeded RNG so a fixed seed replays exactly.

use fastrand::Rng;
use nalgebra_glm as glm;
use nalgebra_glm::{Vec2, Vec3};
use std::f32::consts::TAU;

#[derive(Clone, Debug, PartialEq)]
pub enum EmitterShape {
    Point,
    /// Uniform over the ball.
    Sphere { radius: f32 },
    SphereSurface { radius: f32 },
    /// Upper half (+Y) of the sphere surface.
    Hemisphere { radius: f32 },
    /// Disc in the XZ plane.
    Circle { radius: f32 },
    /// Annulus in the XZ plane.
    Ring { radius: f32, thickness: f32 },
    /// Base disc with directions spreading from +Y by up to `angle_degrees`.
    Cone { radius: f32, angle_degrees: f32 },
    /// Uniform over the volume.
    Box { half_extents: Vec3 },
    BoxSurface { half_extents: Vec3 },
    BoxEdge { half_extents: Vec3 },
    /// Solid cylinder along Y.
    Cylinder { radius: f32, height: f32 },
    /// Segment along X, centred on the origin.
    Line { length: f32 },
    /// Flat rectangle in the XZ plane.
    Rectangle { half_extents: Vec2 },
}

fn unit(v: Vec3) -> Vec3 {
    let len = glm::length(&v);
    if len > 1e-6 {
        v / len
    } else {
        Vec3::new(0.0, 1.0, 0.0)
    }
}

fn signed(rng: &mut Rng) -> f32 {
    rng.f32() * 2.0 - 1.0
}

/// Uniform direction on the unit sphere. Also used for sub-emitter
/// child scatter.
pub(crate) fn sphere_direction(rng: &mut Rng) -> Vec3 {
    let z = signed(rng);
    let theta = rng.f32() * TAU;
    let r = (1.0 - z * z).max(0.0).sqrt();
    Vec3::new(r * theta.cos(), z, r * theta.sin())
}

impl EmitterShape {
    /// Samples a local-space position and outward direction.
    pub fn sample(&self, rng: &mut Rng) -> (Vec3, Vec3) {
        match self {
            EmitterShape::Point => (Vec3::zeros(), sphere_direction(rng)),
            EmitterShape::Sphere { radius } => {
                let dir = sphere_direction(rng);
                // cube root for uniform density over the ball
                let r = radius * rng.f32().cbrt();
                (dir * r, dir)
            }
            EmitterShape::SphereSurface { radius } => {
                let dir = sphere_direction(rng);
                (dir * *radius, dir)
            }
            EmitterShape::Hemisphere { radius } => {
                let mut dir = sphere_direction(rng);
                dir.y = dir.y.abs();
                (dir * *radius, dir)
            }
            EmitterShape::Circle { radius } => {
                let theta = rng.f32() * TAU;
                let r = radius * rng.f32().sqrt();
                let dir = Vec3::new(theta.cos(), 0.0, theta.sin());
                (dir * r, dir)
            }
            EmitterShape::Ring { radius, thickness } => {
                let theta = rng.f32() * TAU;
                let r = radius + signed(rng) * thickness * 0.5;
                let dir = Vec3::new(theta.cos(), 0.0, theta.sin());
                (dir * r, dir)
            }
            EmitterShape::Cone { radius, angle_degrees } => {
                let theta = rng.f32() * TAU;
                let r = radius * rng.f32().sqrt();
                let position = Vec3::new(theta.cos() * r, 0.0, theta.sin() * r);
                let spread = angle_degrees.to_radians() * rng.f32();
                let azimuth = rng.f32() * TAU;
                let direction = Vec3::new(
                    spread.sin() * azimuth.cos(),
                    spread.cos(),
                    spread.sin() * azimuth.sin(),
                );
                (position, unit(direction))
            }
            EmitterShape::Box { half_extents } => {
                let position = Vec3::new(
                    signed(rng) * half_extents.x,
                    signed(rng) * half_extents.y,
                    signed(rng) * half_extents.z,
                );
                (position, unit(position))
            }
            EmitterShape::BoxSurface { half_extents } => {
                let mut position = Vec3::new(
                    signed(rng) * half_extents.x,
                    signed(rng) * half_extents.y,
                    signed(rng) * half_extents.z,
                );
                // project onto a random face
                let face = rng.usize(0..3);
                let sign = if rng.bool() { 1.0 } else { -1.0 };
                match face {
                    0 => position.x = sign * half_extents.x,
                    1 => position.y = sign * half_extents.y,
                    _ => position.z = sign * half_extents.z,
                }
                let mut normal = Vec3::zeros();
                normal[face] = sign;
                (position, normal)
            }
            EmitterShape::BoxEdge { half_extents } => {
                // pin two axes to faces, leave one free
                let free = rng.usize(0..3);
                let mut position = Vec3::zeros();
                let mut normal = Vec3::zeros();
                for axis in 0..3 {
                    if axis == free {
                        position[axis] = signed(rng) * half_extents[axis];
                    } else {
                        let sign = if rng.bool() { 1.0 } else { -1.0 };
                        position[axis] = sign * half_extents[axis];
                        normal[axis] = sign;
                    }
                }
                (position, unit(normal))
            }
            EmitterShape::Cylinder { radius, height } => {
                let theta = rng.f32() * TAU;
                let r = radius * rng.f32().sqrt();
                let position = Vec3::new(
                    theta.cos() * r,
                    signed(rng) * height * 0.5,
                    theta.sin() * r,
                );
                (position, unit(Vec3::new(position.x, 0.0, position.z)))
            }
            EmitterShape::Line { length } => {
                let x = signed(rng) * length * 0.5;
                (Vec3::new(x, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0))
            }
            EmitterShape::Rectangle { half_extents } => {
                let position = Vec3::new(
                    signed(rng) * half_extents.x,
                    0.0,
                    signed(rng) * half_extents.y,
                );
                (position, Vec3::new(0.0, 1.0, 0.0))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rng() -> Rng {
        Rng::with_seed(7)
    }

    #[test]
    fn point_always_samples_origin() {
        let mut rng = rng();
        for _ in 0..16 {
            let (p, dir) = EmitterShape::Point.sample(&mut rng);
            assert_eq!(p, Vec3::zeros());
            assert!((glm::length(&dir) - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn sphere_volume_stays_within_radius() {
        let mut rng = rng();
        let shape = EmitterShape::Sphere { radius: 2.0 };
        for _ in 0..256 {
            let (p, _) = shape.sample(&mut rng);
            assert!(glm::length(&p) <= 2.0 + 1e-5);
        }
    }

    #[test]
    fn sphere_surface_sits_on_radius() {
        let mut rng = rng();
        let shape = EmitterShape::SphereSurface { radius: 1.5 };
        for _ in 0..64 {
            let (p, _) = shape.sample(&mut rng);
            assert!((glm::length(&p) - 1.5).abs() < 1e-4);
        }
    }

    #[test]
    fn hemisphere_never_goes_below_the_plane() {
        let mut rng = rng();
        let shape = EmitterShape::Hemisphere { radius: 1.0 };
        for _ in 0..128 {
            let (p, _) = shape.sample(&mut rng);
            assert!(p.y >= -1e-6);
        }
    }

    #[test]
    fn box_surface_touches_a_face() {
        let mut rng = rng();
        let he = Vec3::new(1.0, 2.0, 3.0);
        let shape = EmitterShape::BoxSurface { half_extents: he };
        for _ in 0..128 {
            let (p, _) = shape.sample(&mut rng);
            let on_face = (p.x.abs() - he.x).abs() < 1e-6
                || (p.y.abs() - he.y).abs() < 1e-6
                || (p.z.abs() - he.z).abs() < 1e-6;
            assert!(on_face, "{:?} is not on any face", p);
        }
    }

    #[test]
    fn cone_directions_stay_in_the_spread() {
        let mut rng = rng();
        let shape = EmitterShape::Cone {
            radius: 0.5,
            angle_degrees: 30.0,
        };
        for _ in 0..128 {
            let (_, dir) = shape.sample(&mut rng);
            let angle = dir.y.clamp(-1.0, 1.0).acos().to_degrees();
            assert!(angle <= 30.0 + 1e-3, "angle {} out of cone", angle);
        }
    }

    #[test]
    fn fixed_seed_replays_exactly() {
        let shape = EmitterShape::Sphere { radius: 1.0 };
        let mut a = Rng::with_seed(99);
        let mut b = Rng::with_seed(99);
        for _ in 0..32 {
            assert_eq!(shape.sample(&mut a), shape.sample(&mut b));
        }
    }
}
