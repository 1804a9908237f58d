//! The particle wire record.
//!
//! 16 floats (64 bytes) per particle, with a layout shared verbatim by the
//! GPU SSBO, the CPU fallback array and the per-instance vertex attributes
//! (locations 2..=5 as four vec4s). A particle is alive iff `life > 0`.

use bytemuck::{Pod, Zeroable};

pub const PARTICLE_FLOATS: usize = 16;
pub const PARTICLE_STRIDE_BYTES: usize = PARTICLE_FLOATS * 4;

/// First instance-attribute location of the record (pos+life); the record
/// spans locations 2..=5.
pub const PARTICLE_ATTR_BASE: u32 = 2;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct Particle {
    pub position: [f32; 3],
    pub life: f32,
    pub velocity: [f32; 3],
    pub max_life: f32,
    pub color: [f32; 4],
    pub size: f32,
    pub rotation: f32,
    /// Free-form tag (sub-emitter generation, mesh variant, ...), kept as
    /// a float so the record stays a flat f32 array.
    pub kind: f32,
    pub angular_velocity: f32,
}

impl Particle {
    pub fn dead() -> Particle {
        Particle::zeroed()
    }

    pub fn is_alive(&self) -> bool {
        self.life > 0.0
    }

    /// Normalized age: 0 at birth, 1 at death.
    pub fn life_pct(&self) -> f32 {
        if self.max_life > 0.0 {
            (1.0 - self.life / self.max_life).clamp(0.0, 1.0)
        } else {
            1.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_layout_is_16_packed_floats() {
        assert_eq!(std::mem::size_of::<Particle>(), PARTICLE_STRIDE_BYTES);
        assert_eq!(std::mem::align_of::<Particle>(), 4);

        // field offsets are load-bearing: shaders index the same layout
        let p = Particle {
            position: [1.0, 2.0, 3.0],
            life: 4.0,
            velocity: [5.0, 6.0, 7.0],
            max_life: 8.0,
            color: [9.0, 10.0, 11.0, 12.0],
            size: 13.0,
            rotation: 14.0,
            kind: 15.0,
            angular_velocity: 16.0,
        };
        let floats: &[f32] = bytemuck::cast_slice(std::slice::from_ref(&p));
        assert_eq!(floats, &[
            1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0, 13.0, 14.0, 15.0,
            16.0
        ]);
    }

    #[test]
    fn life_pct_runs_birth_to_death() {
        let mut p = Particle::dead();
        p.max_life = 2.0;
        p.life = 2.0;
        assert_eq!(p.life_pct(), 0.0);
        p.life = 0.5;
        assert_eq!(p.life_pct(), 0.75);
    }
}
