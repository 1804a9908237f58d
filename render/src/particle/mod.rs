//! GPU/CPU particle engine.
//!
//! Emitters are entities carrying a configuration ([`ParticleEmitter`]),
//! runtime progress ([`ParticleState`]) and pooled storage
//! ([`ParticleBuffer`]); a [`ParticleRender`] component selects how the
//! buffer is drawn. Storage is a flat array of 16-float records shared
//! verbatim between the SSBO, the CPU fallback and the instance
//! attributes.
//!
//! Contexts with compute shaders and SSBOs (GL 4.3) simulate on the GPU;
//! everything else runs the identical math in [`sim`] on the CPU. The
//! capability is probed once and the choice sticks per buffer.

mod components;
mod curve;
mod forces;
pub(crate) mod pool;
mod record;
mod render;
mod shape;
pub mod sim;
mod systems;

pub use components::{
    CollisionPlane, CollisionResponse, ParticleBlend, ParticleBuffer, ParticleColor,
    ParticleEmitter, ParticleEvent, ParticleMeshKind, ParticleRender, ParticleRenderMode,
    ParticleState, SheetAnimation, SubEmitTrigger, SubEmitter,
};
pub use curve::{AxisCurve, Curve, CurveKey, Gradient};
pub use forces::{Force, ForceEntry};
pub use pool::{Backing, BufferKey, ParticlePool, MAX_EVENTS};
pub use record::{Particle, PARTICLE_ATTR_BASE, PARTICLE_FLOATS, PARTICLE_STRIDE_BYTES};
pub use render::ParticleRenderSystem;
pub use shape::EmitterShape;
pub use systems::{pack_emitter_params, ParticleEmitSystem, ParticlePhysicsSystem};
