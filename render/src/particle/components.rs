//! Particle components: emitter configuration, runtime state, buffer
//! backing and render settings.

use crate::mesh::Mesh;
use crate::particle::curve::{AxisCurve, Curve, Gradient};
use crate::particle::forces::ForceEntry;
use crate::particle::pool::{BufferKey, ParticlePool};
use crate::particle::shape::EmitterShape;
use crate::resource::Handle;
use crate::texture::Texture2d;
use ember_ecs::{Component, Disposable};
use nalgebra_glm::Vec3;
use smallvec::SmallVec;
use std::any::TypeId;
use std::cell::RefCell;
use std::rc::Rc;

//--------------------------------------------------------------------------
// emitter configuration

/// Initial particle color: fixed, or drawn from a gradient at a random
/// position per particle.
#[derive(Clone, Debug, PartialEq)]
pub enum ParticleColor {
    Uniform([f32; 4]),
    Gradient(Gradient),
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum CollisionResponse {
    /// Kill on contact.
    Kill,
    /// Reflect with `bounciness`, tangent scaled by `1 - friction`.
    Bounce,
    /// As Bounce, with a random spread on the reflected direction.
    BounceDamped,
    /// Zero the velocity and lock the position on the plane.
    Stick,
    /// Remove the normal velocity component.
    Slide,
    /// Record a collision event for sub-emitters, then kill.
    SubEmit,
    PassThrough,
}

/// Infinite collision plane `dot(normal, p) + d = 0`.
#[derive(Clone, Debug, PartialEq)]
pub struct CollisionPlane {
    pub normal: Vec3,
    pub d: f32,
    pub response: CollisionResponse,
    pub bounciness: f32,
    pub friction: f32,
    /// Probability that a Bounce/BounceDamped contact actually bounces;
    /// failed rolls kill the particle.
    pub bounce_chance: f32,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum SubEmitTrigger {
    OnDeath,
    OnCollision,
}

/// A child emission chained to parent particle events. Children are
/// spawned into the parent's buffer with a random direction, optionally
/// inheriting a share of the parent's velocity.
#[derive(Clone, Debug, PartialEq)]
pub struct SubEmitter {
    pub trigger: SubEmitTrigger,
    pub emit_count: u32,
    /// 0..1 share of the parent velocity given to children.
    pub inherit_velocity: f32,
    pub speed: (f32, f32),
    pub lifetime: (f32, f32),
    pub size: (f32, f32),
    /// `None` inherits the parent's color at death.
    pub color: Option<[f32; 4]>,
    /// Tag stamped into the children's `kind` field.
    pub kind: f32,
}

impl SubEmitter {
    pub fn on_death(emit_count: u32) -> SubEmitter {
        SubEmitter {
            trigger: SubEmitTrigger::OnDeath,
            emit_count,
            inherit_velocity: 0.3,
            speed: (0.5, 1.5),
            lifetime: (0.5, 1.0),
            size: (0.05, 0.1),
            color: None,
            kind: 1.0,
        }
    }

    pub fn on_collision(emit_count: u32) -> SubEmitter {
        SubEmitter {
            trigger: SubEmitTrigger::OnCollision,
            ..SubEmitter::on_death(emit_count)
        }
    }
}

/// Texture-sheet animation over the particle lifetime.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SheetAnimation {
    pub frames: u32,
    pub fps: f32,
}

/// Full emitter configuration. Runtime progress lives in
/// [`ParticleState`]; the GPU/CPU backing in [`ParticleBuffer`].
#[derive(Debug)]
pub struct ParticleEmitter {
    pub shape: EmitterShape,
    /// Continuous emission in particles per second; must be >= 0.
    pub rate: f32,
    pub burst_count: u32,
    /// 0 disables repeating bursts (the initial burst still fires).
    pub burst_interval: f32,
    /// (min, max); min <= max.
    pub lifetime: (f32, f32),
    pub speed: f32,
    /// 0..1 random speed scaling: effective speed is
    /// `speed * ((1 - v) + rand * 2v)`.
    pub speed_variation: f32,
    pub linear_velocity: Vec3,
    /// Add the shape's outward direction times `speed` to the velocity.
    pub emit_along_normal: bool,
    pub size: (f32, f32),
    pub rotation: (f32, f32),
    pub angular_velocity: (f32, f32),
    pub color: ParticleColor,
    pub color_over_life: Option<Gradient>,
    pub size_over_life: Option<Curve>,
    pub velocity_over_life: Option<AxisCurve>,
    pub rotation_over_life: Option<Curve>,
    pub forces: Vec<ForceEntry>,
    pub collision: Option<CollisionPlane>,
    pub sub_emitters: Vec<SubEmitter>,
    pub texture: Option<Handle<Texture2d>>,
    pub animation: Option<SheetAnimation>,
    /// Tag stamped into emitted records' `kind` field.
    pub kind: f32,
}

impl ParticleEmitter {
    pub fn new(shape: EmitterShape, rate: f32) -> ParticleEmitter {
        debug_assert!(rate >= 0.0);
        ParticleEmitter {
            shape,
            rate,
            burst_count: 0,
            burst_interval: 0.0,
            lifetime: (1.0, 1.0),
            speed: 1.0,
            speed_variation: 0.0,
            linear_velocity: Vec3::zeros(),
            emit_along_normal: true,
            size: (0.1, 0.1),
            rotation: (0.0, 0.0),
            angular_velocity: (0.0, 0.0),
            color: ParticleColor::Uniform([1.0, 1.0, 1.0, 1.0]),
            color_over_life: None,
            size_over_life: None,
            velocity_over_life: None,
            rotation_over_life: None,
            forces: Vec::new(),
            collision: None,
            sub_emitters: Vec::new(),
            texture: None,
            animation: None,
            kind: 0.0,
        }
    }

    pub fn with_lifetime(mut self, min: f32, max: f32) -> ParticleEmitter {
        debug_assert!(min <= max);
        self.lifetime = (min, max);
        self
    }

    pub fn with_burst(mut self, count: u32, interval: f32) -> ParticleEmitter {
        self.burst_count = count;
        self.burst_interval = interval;
        self
    }

    pub fn sub_emitters_for(&self, trigger: SubEmitTrigger) -> impl Iterator<Item = &SubEmitter> {
        self.sub_emitters
            .iter()
            .filter(move |sub| sub.trigger == trigger)
    }
}

impl Component for ParticleEmitter {}

//--------------------------------------------------------------------------
// runtime state

/// A recorded particle death (or sub-emit collision), consumed by the
/// emit system on the next frame's UPDATE.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ParticleEvent {
    pub position: Vec3,
    pub velocity: Vec3,
    pub speed: f32,
    pub color: [f32; 4],
}

/// Mutable emitter progress. Separate from the configuration so an
/// emitter can be re-authored live without resetting playback.
#[derive(Debug)]
pub struct ParticleState {
    pub system_time: f32,
    pub paused: bool,
    pub looping: bool,
    /// Playback length when not looping.
    pub duration: f32,
    pub completed: bool,
    /// Fractional particles owed by the continuous rate.
    pub emission_accumulator: f32,
    /// Time into the current repeating-burst interval.
    pub burst_accumulator: f32,
    pub initial_burst_done: bool,
    /// Deaths recorded by the previous physics step, for on-death
    /// sub-emitters.
    pub death_events: Vec<ParticleEvent>,
    /// SUB_EMIT collisions recorded by the previous physics step.
    pub collision_events: Vec<ParticleEvent>,
    /// Buffer slots filled this frame; physics starts aging them next
    /// frame.
    pub fresh_slots: Vec<usize>,
    pub rng: fastrand::Rng,
}

impl ParticleState {
    pub fn looping() -> ParticleState {
        ParticleState::new(f32::INFINITY, true)
    }

    pub fn one_shot(duration: f32) -> ParticleState {
        ParticleState::new(duration, false)
    }

    fn new(duration: f32, looping: bool) -> ParticleState {
        ParticleState {
            system_time: 0.0,
            paused: false,
            looping,
            duration,
            completed: false,
            emission_accumulator: 0.0,
            burst_accumulator: 0.0,
            initial_burst_done: false,
            death_events: Vec::new(),
            collision_events: Vec::new(),
            fresh_slots: Vec::new(),
            rng: fastrand::Rng::new(),
        }
    }

    /// Fixed RNG seed for reproducible playback.
    pub fn with_seed(mut self, seed: u64) -> ParticleState {
        self.rng = fastrand::Rng::with_seed(seed);
        self
    }

    pub fn restart(&mut self) {
        self.system_time = 0.0;
        self.completed = false;
        self.emission_accumulator = 0.0;
        self.burst_accumulator = 0.0;
        self.initial_burst_done = false;
        self.death_events.clear();
        self.collision_events.clear();
        self.fresh_slots.clear();
    }
}

impl Component for ParticleState {
    fn dependencies(&self) -> SmallVec<[TypeId; 4]> {
        SmallVec::from_slice(&[TypeId::of::<ParticleEmitter>()])
    }
}

//--------------------------------------------------------------------------
// buffer backing

/// Pooled storage for one emitter's particles. The backing (GPU SSBO or
/// CPU array) is acquired from the shared pool at first emission and
/// chosen once; disposal returns it to the pool for reuse.
#[derive(Debug)]
pub struct ParticleBuffer {
    capacity: usize,
    key: Option<BufferKey>,
    pool: Option<Rc<RefCell<ParticlePool>>>,
}

impl ParticleBuffer {
    pub fn new(capacity: usize) -> ParticleBuffer {
        ParticleBuffer {
            capacity: capacity.max(1),
            key: None,
            pool: None,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_initialized(&self) -> bool {
        self.key.is_some()
    }

    pub fn key(&self) -> Option<BufferKey> {
        self.key
    }

    pub(crate) fn attach(&mut self, pool: Rc<RefCell<ParticlePool>>, key: BufferKey) {
        self.key = Some(key);
        self.pool = Some(pool);
    }
}

impl Disposable for ParticleBuffer {
    fn dispose(&mut self) {
        if let (Some(pool), Some(key)) = (self.pool.take(), self.key.take()) {
            pool.borrow_mut().release(key);
        }
    }
}

impl Component for ParticleBuffer {
    fn dependencies(&self) -> SmallVec<[TypeId; 4]> {
        SmallVec::from_slice(&[TypeId::of::<ParticleEmitter>()])
    }

    fn as_disposable(&mut self) -> Option<&mut dyn Disposable> {
        Some(self)
    }
}

//--------------------------------------------------------------------------
// render settings

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ParticleBlend {
    Alpha,
    Additive,
    SoftAdditive,
    Multiply,
    Premultiplied,
    Opaque,
}

#[derive(Debug)]
pub enum ParticleRenderMode {
    /// Camera-facing quad.
    Billboard,
    /// Quad stretched along the velocity by `factor`.
    Stretched { factor: f32 },
    /// Quad locked flat in the XZ plane.
    HorizontalBillboard,
    /// Quad locked upright, rotating around Y to face the camera.
    VerticalBillboard,
    /// Instanced solid with a mesh-specific shader.
    Mesh(ParticleMeshKind),
}

#[derive(Debug)]
pub enum ParticleMeshKind {
    Cube,
    Tetrahedron,
    Octahedron,
    Icosahedron,
    Custom(Handle<Mesh>),
}

/// How the buffer is drawn.
#[derive(Debug)]
pub struct ParticleRender {
    pub blend: ParticleBlend,
    pub mode: ParticleRenderMode,
    pub emissive: f32,
    pub receive_lighting: bool,
}

impl ParticleRender {
    pub fn billboard(blend: ParticleBlend) -> ParticleRender {
        ParticleRender {
            blend,
            mode: ParticleRenderMode::Billboard,
            emissive: 0.0,
            receive_lighting: false,
        }
    }
}

impl Component for ParticleRender {
    fn dependencies(&self) -> SmallVec<[TypeId; 4]> {
        SmallVec::from_slice(&[TypeId::of::<ParticleBuffer>()])
    }
}
