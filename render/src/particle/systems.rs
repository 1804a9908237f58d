//! Particle UPDATE systems: emission and physics.
//!
//! Both walk entities carrying (ParticleEmitter, ParticleState,
//! ParticleBuffer). The CPU backing runs [`crate::particle::sim`]
//! directly; the GPU backing stages emitted records and dispatches the
//! host-provided compute shaders over the SSBO, then reads the
//! death/collision events back for next frame's sub-emitters.

use crate::api as gl;
use crate::components::Transform;
use crate::context::RenderCtx;
use crate::particle::components::{ParticleBuffer, ParticleEmitter, ParticleState};
use crate::particle::pool::Backing;
use crate::particle::record::Particle;
use crate::particle::sim;
use ember_ecs::{priority, EntityId, Phase, System, SystemError, Tick, World};
use nalgebra_glm::Vec3;
use std::rc::Rc;

/// Compute workgroup size both compute shaders are written for.
const WORKGROUP: u32 = 64;

fn groups_for(items: u32) -> u32 {
    items.div_ceil(WORKGROUP).max(1)
}

fn emitter_entities(world: &World, layer: Option<ember_ecs::Layer>) -> Vec<EntityId> {
    world
        .entities_with::<(ParticleEmitter, ParticleState, ParticleBuffer)>()
        .into_iter()
        .filter(|id| world.matches_layer(*id, layer))
        .collect()
}

/// Runs the emitter clocks and injects new particle records.
pub struct ParticleEmitSystem {
    ctx: Rc<RenderCtx>,
}

impl ParticleEmitSystem {
    pub fn new(ctx: Rc<RenderCtx>) -> ParticleEmitSystem {
        ParticleEmitSystem { ctx }
    }

    fn dispatch_emit(&self, fresh: &[Particle], backing: &Backing) {
        let gpu = match backing {
            Backing::Gpu(gpu) => gpu,
            Backing::Cpu(_) => return,
        };
        let program = match self
            .ctx
            .shaders
            .get("particle/particle_emit:compute")
            .and_then(|handle| handle.get().ok())
        {
            Some(program) => program,
            None => {
                self.ctx.warn_once(
                    "particle/particle_emit:compute",
                    "emit compute shader unavailable, particles disabled",
                );
                return;
            }
        };
        gpu.upload_staging(fresh);
        let gl_ = Rc::clone(&self.ctx.gl);
        let mut stack = self.ctx.state.borrow_mut();
        let mut scope = stack.scope(&gl_);
        scope.use_program(program.id());
        scope.bind_shader_storage_buffer(gpu.ssbo);
        program.set_i32("u_emit_count", fresh.len() as i32);
        program.set_i32("u_capacity", gpu.capacity as i32);
        unsafe {
            gl_.BindBufferBase(gl::SHADER_STORAGE_BUFFER, 0, gpu.ssbo);
            gl_.BindBufferBase(gl::SHADER_STORAGE_BUFFER, 1, gpu.staging);
            gl_.DispatchCompute(groups_for(fresh.len() as u32), 1, 1);
            gl_.MemoryBarrier(gl::SHADER_STORAGE_BARRIER_BIT | gl::VERTEX_ATTRIB_ARRAY_BARRIER_BIT);
        }
    }
}

impl System for ParticleEmitSystem {
    fn name(&self) -> &'static str {
        "particle_emit"
    }

    fn phase(&self) -> Phase {
        Phase::Update
    }

    fn priority(&self) -> i32 {
        priority::PARTICLE_EMIT
    }

    fn run(&mut self, world: &mut World, tick: &Tick) -> Result<(), SystemError> {
        for id in emitter_entities(world, tick.layer) {
            let skip = world
                .get::<ParticleState>(id)
                .map(|state| state.paused || state.completed)
                .unwrap_or(true);
            if skip {
                continue;
            }

            // the backing is chosen once, at first emission
            if let Some(buffer) = world.get_mut::<ParticleBuffer>(id) {
                if !buffer.is_initialized() {
                    let capacity = buffer.capacity();
                    let key = self.ctx.particles.borrow_mut().acquire(
                        &self.ctx.gl,
                        &self.ctx.caps,
                        capacity,
                    );
                    buffer.attach(Rc::clone(&self.ctx.particles), key);
                }
            }
            let key = match world.get::<ParticleBuffer>(id).and_then(|b| b.key()) {
                Some(key) => key,
                None => continue,
            };

            let owner_position = world
                .get::<Transform>(id)
                .map(|t| t.position())
                .unwrap_or_else(Vec3::zeros);

            let fresh = {
                let (emitter, state) = world.get_pair_mut::<ParticleEmitter, ParticleState>(id);
                match (emitter, state) {
                    (Some(emitter), Some(state)) => {
                        sim::step_emitter(emitter, state, owner_position, tick.dt)
                    }
                    _ => continue,
                }
            };
            if fresh.is_empty() {
                continue;
            }

            let mut pool = self.ctx.particles.borrow_mut();
            match pool.get_mut(key) {
                Some(Backing::Cpu(cpu)) => {
                    if let Some(state) = world.get_mut::<ParticleState>(id) {
                        let inserted =
                            sim::insert_records(&mut cpu.records, &fresh, &mut state.fresh_slots);
                        if inserted < fresh.len() {
                            log::trace!(
                                "{}: particle buffer full, dropped {}",
                                id,
                                fresh.len() - inserted
                            );
                        }
                    }
                }
                Some(backing @ Backing::Gpu(_)) => self.dispatch_emit(&fresh, &backing),
                None => {}
            }
        }
        Ok(())
    }
}

/// Steps particle physics: CPU loops or the update compute dispatch.
pub struct ParticlePhysicsSystem {
    ctx: Rc<RenderCtx>,
}

impl ParticlePhysicsSystem {
    pub fn new(ctx: Rc<RenderCtx>) -> ParticlePhysicsSystem {
        ParticlePhysicsSystem { ctx }
    }

    fn dispatch_update(
        &self,
        world: &mut World,
        id: EntityId,
        key: crate::particle::pool::BufferKey,
        dt: f32,
    ) {
        let program = match self
            .ctx
            .shaders
            .get("particle/particle_update:compute")
            .and_then(|handle| handle.get().ok())
        {
            Some(program) => program,
            None => {
                self.ctx.warn_once(
                    "particle/particle_update:compute",
                    "update compute shader unavailable, particles disabled",
                );
                return;
            }
        };

        let params = world
            .get::<ParticleEmitter>(id)
            .map(pack_emitter_params)
            .unwrap_or_default();

        let events = {
            let pool = self.ctx.particles.borrow();
            let gpu = match pool.get(key) {
                Some(Backing::Gpu(gpu)) => gpu,
                _ => return,
            };
            gpu.upload_params(&params);

            let gl_ = Rc::clone(&self.ctx.gl);
            let mut stack = self.ctx.state.borrow_mut();
            let mut scope = stack.scope(&gl_);
            scope.use_program(program.id());
            // journal the generic binding once so the raw indexed binds
            // below are unwound with the scope
            scope.bind_shader_storage_buffer(gpu.ssbo);
            program.set_f32("u_dt", dt);
            program.set_i32("u_capacity", gpu.capacity as i32);
            unsafe {
                gl_.BindBufferBase(gl::SHADER_STORAGE_BUFFER, 0, gpu.ssbo);
                gl_.BindBufferBase(gl::SHADER_STORAGE_BUFFER, 1, gpu.params);
                gl_.BindBufferBase(gl::SHADER_STORAGE_BUFFER, 2, gpu.events);
                gl_.DispatchCompute(groups_for(gpu.capacity as u32), 1, 1);
                gl_.MemoryBarrier(
                    gl::SHADER_STORAGE_BARRIER_BIT | gl::VERTEX_ATTRIB_ARRAY_BARRIER_BIT,
                );
            }
            drop(scope);
            drop(stack);
            gpu.read_back_events()
        };

        // host-side sub-emitter bookkeeping: the compute pass only
        // appends events, spawning happens on next frame's emit
        let (deaths, collisions) = events;
        if let Some(state) = world.get_mut::<ParticleState>(id) {
            state.death_events = deaths;
            state.collision_events = collisions;
        }
    }
}

impl System for ParticlePhysicsSystem {
    fn name(&self) -> &'static str {
        "particle_physics"
    }

    fn phase(&self) -> Phase {
        Phase::Update
    }

    fn priority(&self) -> i32 {
        priority::PARTICLE_PHYSICS
    }

    fn run(&mut self, world: &mut World, tick: &Tick) -> Result<(), SystemError> {
        for id in emitter_entities(world, tick.layer) {
            let paused = world
                .get::<ParticleState>(id)
                .map(|state| state.paused)
                .unwrap_or(true);
            if paused {
                continue;
            }
            let key = match world.get::<ParticleBuffer>(id).and_then(|b| b.key()) {
                Some(key) => key,
                None => continue,
            };

            let is_gpu = self
                .ctx
                .particles
                .borrow()
                .get(key)
                .map(|backing| backing.is_gpu())
                .unwrap_or(false);
            if is_gpu {
                self.dispatch_update(world, id, key, tick.dt);
            } else {
                let mut pool = self.ctx.particles.borrow_mut();
                if let Some(Backing::Cpu(cpu)) = pool.get_mut(key) {
                    let (emitter, state) = world.get_pair_mut::<ParticleEmitter, ParticleState>(id);
                    if let (Some(emitter), Some(state)) = (emitter, state) {
                        sim::physics_step(emitter, state, &mut cpu.records, tick.dt);
                    }
                }
            }
        }
        Ok(())
    }
}

/// Packs the emitter's force list and collision plane into the flat
/// float layout the update compute shader indexes. Layout:
/// `[force_count, has_collision, pad, pad,
///   per force: kind, p0..p6 (8 floats),
///   collision: nx, ny, nz, d, response, bounciness, friction, chance]`.
pub fn pack_emitter_params(emitter: &ParticleEmitter) -> Vec<f32> {
    use crate::particle::components::CollisionResponse;
    use crate::particle::forces::Force;

    let enabled: Vec<&Force> = emitter
        .forces
        .iter()
        .filter(|entry| entry.enabled)
        .map(|entry| &entry.force)
        .collect();

    let mut out = vec![
        enabled.len() as f32,
        emitter.collision.is_some() as i32 as f32,
        0.0,
        0.0,
    ];
    for force in enabled {
        let packed: [f32; 8] = match force {
            Force::Gravity { direction, strength } => {
                [0.0, direction.x, direction.y, direction.z, *strength, 0.0, 0.0, 0.0]
            }
            Force::Wind { direction, strength } => {
                [1.0, direction.x, direction.y, direction.z, *strength, 0.0, 0.0, 0.0]
            }
            Force::Drag { strength } => [2.0, *strength, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            Force::Attractor { center, strength } => {
                [3.0, center.x, center.y, center.z, *strength, 0.0, 0.0, 0.0]
            }
            Force::Repulsor { center, strength } => {
                [4.0, center.x, center.y, center.z, *strength, 0.0, 0.0, 0.0]
            }
            Force::Turbulence { scale, strength } => {
                [5.0, *scale, *strength, 0.0, 0.0, 0.0, 0.0, 0.0]
            }
            Force::VelocityLimit { limit } => [6.0, *limit, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            Force::Curl { scale, strength } => [7.0, *scale, *strength, 0.0, 0.0, 0.0, 0.0, 0.0],
            Force::VortexY { center, strength } => {
                [8.0, center.x, center.y, center.z, *strength, 0.0, 0.0, 0.0]
            }
        };
        out.extend_from_slice(&packed);
    }
    if let Some(plane) = &emitter.collision {
        let response = match plane.response {
            CollisionResponse::Kill => 0.0,
            CollisionResponse::Bounce => 1.0,
            CollisionResponse::BounceDamped => 2.0,
            CollisionResponse::Stick => 3.0,
            CollisionResponse::Slide => 4.0,
            CollisionResponse::SubEmit => 5.0,
            CollisionResponse::PassThrough => 6.0,
        };
        out.extend_from_slice(&[
            plane.normal.x,
            plane.normal.y,
            plane.normal.z,
            plane.d,
            response,
            plane.bounciness,
            plane.friction,
            plane.bounce_chance,
        ]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particle::forces::{Force, ForceEntry};
    use crate::particle::shape::EmitterShape;

    #[test]
    fn packed_params_lead_with_counts() {
        let mut emitter = ParticleEmitter::new(EmitterShape::Point, 1.0);
        emitter.forces = vec![
            ForceEntry::new(Force::Gravity {
                direction: Vec3::new(0.0, -1.0, 0.0),
                strength: 9.8,
            }),
            ForceEntry {
                force: Force::Drag { strength: 1.0 },
                enabled: false,
            },
        ];
        let params = pack_emitter_params(&emitter);
        assert_eq!(params[0], 1.0, "disabled forces are not packed");
        assert_eq!(params[1], 0.0, "no collision plane");
        assert_eq!(params.len(), 4 + 8);
        assert_eq!(params[4], 0.0, "gravity kind");
        assert_eq!(params[8], 9.8);
    }
}
