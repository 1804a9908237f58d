//! Force field variants and their CPU evaluation.
//!
//! Forces are a plain sum type dispatched per variant in the physics loop;
//! the compute-shader path implements the same math over the same
//! parameters, so the two stay textual mirrors of each other.

use nalgebra_glm as glm;
use nalgebra_glm::Vec3;

#[derive(Clone, Debug, PartialEq)]
pub enum Force {
    /// Constant acceleration `direction * strength`.
    Gravity { direction: Vec3, strength: f32 },
    /// Same shape as gravity, kept separate for authoring clarity.
    Wind { direction: Vec3, strength: f32 },
    /// `-velocity * strength`.
    Drag { strength: f32 },
    /// Inverse-distance pull toward `center`.
    Attractor { center: Vec3, strength: f32 },
    /// Inverse-distance push away from `center`.
    Repulsor { center: Vec3, strength: f32 },
    /// Three decorrelated value-noise samples over `position * scale`.
    Turbulence { scale: f32, strength: f32 },
    /// Clamp: excess speed above `limit` is removed along the velocity.
    VelocityLimit { limit: f32 },
    /// Curl of the value-noise field, for divergence-free swirl.
    Curl { scale: f32, strength: f32 },
    /// Tangential swirl around the vertical axis through `center`.
    VortexY { center: Vec3, strength: f32 },
}

/// A force plus its enable flag, as authored on the emitter.
#[derive(Clone, Debug, PartialEq)]
pub struct ForceEntry {
    pub force: Force,
    pub enabled: bool,
}

impl ForceEntry {
    pub fn new(force: Force) -> ForceEntry {
        ForceEntry {
            force,
            enabled: true,
        }
    }
}

/// Minimum squared distance for the inverse-distance forces; below this
/// the pull would blow up.
const MIN_DIST2: f32 = 1e-4;

impl Force {
    /// Acceleration contribution for a particle at `position` moving with
    /// `velocity`. [`Force::VelocityLimit`] contributes nothing here; the
    /// physics step applies it as a speed clamp after integration.
    pub fn acceleration(&self, position: Vec3, velocity: Vec3) -> Vec3 {
        match self {
            Force::Gravity { direction, strength } | Force::Wind { direction, strength } => {
                direction * *strength
            }
            Force::Drag { strength } => -velocity * *strength,
            Force::Attractor { center, strength } => {
                let to_center = center - position;
                let dist2 = glm::length2(&to_center).max(MIN_DIST2);
                to_center / dist2.sqrt() * (*strength / dist2.sqrt().max(1.0))
            }
            Force::Repulsor { center, strength } => {
                let away = position - center;
                let dist2 = glm::length2(&away).max(MIN_DIST2);
                away / dist2.sqrt() * (*strength / dist2.sqrt().max(1.0))
            }
            Force::Turbulence { scale, strength } => {
                let p = position * *scale;
                Vec3::new(
                    value_noise(p + OFFSET_X) * 2.0 - 1.0,
                    value_noise(p + OFFSET_Y) * 2.0 - 1.0,
                    value_noise(p + OFFSET_Z) * 2.0 - 1.0,
                ) * *strength
            }
            Force::VelocityLimit { .. } => Vec3::zeros(),
            Force::Curl { scale, strength } => curl_noise(position * *scale) * *strength,
            Force::VortexY { center, strength } => {
                let radial = Vec3::new(position.x - center.x, 0.0, position.z - center.z);
                let dist2 = glm::length2(&radial).max(MIN_DIST2);
                let tangent = Vec3::new(-radial.z, 0.0, radial.x) / dist2.sqrt();
                tangent * *strength
            }
        }
    }
}

/// Applies the velocity-limit entries: subtracts the excess along the
/// velocity when the speed exceeds the limit.
pub fn clamp_velocity(forces: &[ForceEntry], velocity: Vec3) -> Vec3 {
    let mut velocity = velocity;
    for entry in forces {
        if !entry.enabled {
            continue;
        }
        if let Force::VelocityLimit { limit } = entry.force {
            let speed = glm::length(&velocity);
            if speed > limit && speed > 1e-6 {
                velocity *= limit / speed;
            }
        }
    }
    velocity
}

// decorrelation offsets for the three turbulence axes
const OFFSET_X: Vec3 = Vec3::new(13.17, 71.31, 29.53);
const OFFSET_Y: Vec3 = Vec3::new(47.89, 5.71, 83.23);
const OFFSET_Z: Vec3 = Vec3::new(91.03, 37.67, 3.19);

fn hash3(x: i32, y: i32, z: i32) -> f32 {
    // integer lattice hash; mirrors the GLSL implementation bit for bit
    let mut h = (x as u32)
        .wrapping_mul(0x8da6_b343)
        .wrapping_add((y as u32).wrapping_mul(0xd816_3841))
        .wrapping_add((z as u32).wrapping_mul(0xcb1a_b31f));
    h ^= h >> 13;
    h = h.wrapping_mul(0x7fee_f5e9);
    h ^= h >> 16;
    (h & 0x00ff_ffff) as f32 / 0x0100_0000 as f32
}

fn smooth(t: f32) -> f32 {
    t * t * (3.0 - 2.0 * t)
}

/// Trilinear value noise in [0, 1].
pub fn value_noise(p: Vec3) -> f32 {
    let base = Vec3::new(p.x.floor(), p.y.floor(), p.z.floor());
    let frac = p - base;
    let (x, y, z) = (base.x as i32, base.y as i32, base.z as i32);
    let (fx, fy, fz) = (smooth(frac.x), smooth(frac.y), smooth(frac.z));

    let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;
    let c00 = lerp(hash3(x, y, z), hash3(x + 1, y, z), fx);
    let c10 = lerp(hash3(x, y + 1, z), hash3(x + 1, y + 1, z), fx);
    let c01 = lerp(hash3(x, y, z + 1), hash3(x + 1, y, z + 1), fx);
    let c11 = lerp(hash3(x, y + 1, z + 1), hash3(x + 1, y + 1, z + 1), fx);
    lerp(lerp(c00, c10, fy), lerp(c01, c11, fy), fz)
}

/// Finite-difference curl of the vector noise field.
fn curl_noise(p: Vec3) -> Vec3 {
    const E: f32 = 0.1;
    let dx = Vec3::new(E, 0.0, 0.0);
    let dy = Vec3::new(0.0, E, 0.0);
    let dz = Vec3::new(0.0, 0.0, E);

    let field = |q: Vec3| {
        Vec3::new(
            value_noise(q + OFFSET_X),
            value_noise(q + OFFSET_Y),
            value_noise(q + OFFSET_Z),
        )
    };

    let dfdy = (field(p + dy) - field(p - dy)) / (2.0 * E);
    let dfdz = (field(p + dz) - field(p - dz)) / (2.0 * E);
    let dfdx = (field(p + dx) - field(p - dx)) / (2.0 * E);

    Vec3::new(dfdy.z - dfdz.y, dfdz.x - dfdx.z, dfdx.y - dfdy.x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gravity_is_constant() {
        let f = Force::Gravity {
            direction: Vec3::new(0.0, -1.0, 0.0),
            strength: 9.8,
        };
        let a = f.acceleration(Vec3::new(5.0, 3.0, 1.0), Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(a, Vec3::new(0.0, -9.8, 0.0));
    }

    #[test]
    fn drag_opposes_velocity() {
        let f = Force::Drag { strength: 0.5 };
        let a = f.acceleration(Vec3::zeros(), Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(a, Vec3::new(-1.0, 0.0, 0.0));
    }

    #[test]
    fn attractor_guards_the_singularity() {
        let f = Force::Attractor {
            center: Vec3::zeros(),
            strength: 10.0,
        };
        let a = f.acceleration(Vec3::zeros(), Vec3::zeros());
        assert!(a.x.is_finite() && a.y.is_finite() && a.z.is_finite());
    }

    #[test]
    fn velocity_limit_clamps_speed() {
        let forces = [ForceEntry::new(Force::VelocityLimit { limit: 1.0 })];
        let clamped = clamp_velocity(&forces, Vec3::new(3.0, 4.0, 0.0));
        assert!((glm::length(&clamped) - 1.0).abs() < 1e-5);
        // direction preserved
        assert!(clamped.x > 0.0 && clamped.y > 0.0);

        let slow = clamp_velocity(&forces, Vec3::new(0.1, 0.0, 0.0));
        assert_eq!(slow, Vec3::new(0.1, 0.0, 0.0));
    }

    #[test]
    fn value_noise_is_deterministic_and_bounded() {
        for i in 0..64 {
            let p = Vec3::new(i as f32 * 0.37, i as f32 * 0.11, -(i as f32) * 0.53);
            let n = value_noise(p);
            assert!((0.0..=1.0).contains(&n));
            assert_eq!(n, value_noise(p));
        }
    }

    #[test]
    fn vortex_is_tangential() {
        let f = Force::VortexY {
            center: Vec3::zeros(),
            strength: 2.0,
        };
        let a = f.acceleration(Vec3::new(1.0, 0.0, 0.0), Vec3::zeros());
        assert!(a.x.abs() < 1e-6);
        assert!(a.z.abs() > 0.0);
        assert_eq!(glm::dot(&a, &Vec3::new(1.0, 0.0, 0.0)), 0.0);
    }
}
