//! Frame-phase scheduler.
//!
//! Systems are kept in a single list totally ordered by
//! `(phase, priority, insertion)`. Each `update`/`render` sweep runs the
//! matching phase to completion; a system only ever observes the world
//! between other systems' completions.

use crate::layer::Layer;
use crate::profiler::SystemSample;
use crate::world::World;
use std::time::Instant;

/// Execution phase of a system. All UPDATE systems of a frame complete
/// before any RENDER system starts.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum Phase {
    Update,
    Render,
}

/// Baseline priorities. Lower runs first; ties run in insertion order.
pub mod priority {
    pub const TRANSFORM: i32 = -1000;
    pub const LOD: i32 = -800;
    pub const FRUSTUM_CULL: i32 = -500;
    pub const TRAIL: i32 = 20;
    pub const CAMERA: i32 = 100;
    pub const WORLD_UI: i32 = 150;
    pub const PARTICLE_EMIT: i32 = 200;
    pub const PARTICLE_PHYSICS: i32 = 300;
    pub const LIFETIME_REAPER: i32 = i32::MAX;

    pub const INSTANCED_MESH: i32 = -100;
    pub const MESH: i32 = 0;
    pub const LINE: i32 = 100;
    pub const SPRITE: i32 = 200;
    pub const PARTICLE_RENDER: i32 = 500;
    pub const DEBUG_RENDER: i32 = 1000;
}

/// Per-sweep inputs handed to every system.
#[derive(Copy, Clone, Debug)]
pub struct Tick {
    /// Seconds since the previous sweep of this layer.
    pub dt: f32,
    /// Layer filter for this sweep; `None` runs unfiltered.
    pub layer: Option<Layer>,
    /// Monotonic frame counter.
    pub frame: u64,
}

/// Errors escaping a system are caught at the schedule boundary, logged,
/// and do not propagate out of `world.update`/`world.render`.
pub type SystemError = Box<dyn std::error::Error>;

/// A deterministic processor over the entity/component graph.
///
/// Systems hold no per-entity state; derived caches belong to components.
pub trait System {
    fn name(&self) -> &'static str;
    fn phase(&self) -> Phase;
    fn priority(&self) -> i32;

    /// Called once when the system is added to the world.
    fn on_init(&mut self, _world: &mut World) {}

    fn run(&mut self, world: &mut World, tick: &Tick) -> Result<(), SystemError>;
}

struct Slot {
    system: Box<dyn System>,
    phase: Phase,
    priority: i32,
    seq: u64,
}

#[derive(Default)]
pub(crate) struct Schedule {
    slots: Vec<Slot>,
    next_seq: u64,
}

impl Schedule {
    /// Sorted insert by (phase, priority, insertion order).
    pub(crate) fn insert(&mut self, system: Box<dyn System>) {
        let seq = self.next_seq;
        self.next_seq += 1;
        let slot = Slot {
            phase: system.phase(),
            priority: system.priority(),
            system,
            seq,
        };
        let at = self
            .slots
            .partition_point(|s| (s.phase, s.priority, s.seq) <= (slot.phase, slot.priority, slot.seq));
        self.slots.insert(at, slot);
    }

    /// Re-inserts every slot of `other`, preserving its relative order.
    pub(crate) fn absorb(&mut self, other: Schedule) {
        for slot in other.slots {
            self.insert(slot.system);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn run_phase(
        &mut self,
        phase: Phase,
        world: &mut World,
        tick: &Tick,
    ) -> Vec<SystemSample> {
        let mut samples = Vec::new();
        for slot in self.slots.iter_mut() {
            if slot.phase != phase {
                continue;
            }
            let started = Instant::now();
            if let Err(err) = slot.system.run(world, tick) {
                log::error!(
                    "system {} failed, skipping for the rest of the frame: {}",
                    slot.system.name(),
                    err
                );
            }
            samples.push(SystemSample {
                name: slot.system.name(),
                phase,
                priority: slot.priority,
                duration: started.elapsed(),
            });
        }
        samples
    }
}
