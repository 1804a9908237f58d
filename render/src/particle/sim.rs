//! CPU particle simulation core.
//!
//! Emission and physics over the flat record array, with no GL anywhere:
//! the CPU backing runs these loops directly, and the GPU path reuses
//! [`step_emitter`] to build its staging upload while the compute shader
//! mirrors [`physics_step`] over the SSBO. Keeping the two textual
//! mirrors of each other is what makes the paths behaviourally
//! indistinguishable for a given seed.

use crate::particle::components::{
    CollisionResponse, ParticleColor, ParticleEmitter, ParticleEvent, ParticleState,
    SubEmitTrigger, SubEmitter,
};
use crate::particle::forces::clamp_velocity;
use crate::particle::pool::MAX_EVENTS;
use crate::particle::record::Particle;
use crate::particle::shape::sphere_direction;
use fastrand::Rng;
use nalgebra_glm as glm;
use nalgebra_glm::Vec3;

fn sample_range(rng: &mut Rng, (min, max): (f32, f32)) -> f32 {
    min + rng.f32() * (max - min)
}

/// Advances the emitter clock and produces this frame's new records:
/// initial burst, repeating bursts, rate emission and sub-emitter
/// children from the previous frame's death/collision scratch.
///
/// The caller is responsible for the paused/completed short-circuit and
/// for inserting the records into the backing.
pub fn step_emitter(
    emitter: &ParticleEmitter,
    state: &mut ParticleState,
    owner_position: Vec3,
    dt: f32,
) -> Vec<Particle> {
    state.system_time += dt;
    if !state.looping && state.system_time >= state.duration {
        state.completed = true;
    }

    let mut count = 0u32;
    if !state.initial_burst_done {
        count += emitter.burst_count;
        state.initial_burst_done = true;
    }
    if emitter.burst_interval > 0.0 {
        state.burst_accumulator += dt;
        while state.burst_accumulator >= emitter.burst_interval {
            count += emitter.burst_count;
            state.burst_accumulator -= emitter.burst_interval;
        }
    }
    state.emission_accumulator += dt * emitter.rate;
    let whole = state.emission_accumulator.floor();
    state.emission_accumulator -= whole;
    count += whole as u32;

    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        out.push(spawn_particle(emitter, state, owner_position));
    }

    // death/collision scratch from the previous physics step
    let deaths = std::mem::take(&mut state.death_events);
    for sub in emitter.sub_emitters_for(SubEmitTrigger::OnDeath) {
        spawn_children(sub, &deaths, &mut state.rng, &mut out);
    }
    let collisions = std::mem::take(&mut state.collision_events);
    for sub in emitter.sub_emitters_for(SubEmitTrigger::OnCollision) {
        spawn_children(sub, &collisions, &mut state.rng, &mut out);
    }
    out
}

fn spawn_particle(
    emitter: &ParticleEmitter,
    state: &mut ParticleState,
    owner_position: Vec3,
) -> Particle {
    let rng = &mut state.rng;
    let (local, normal) = emitter.shape.sample(rng);
    let position = owner_position + local;

    let mut velocity = emitter.linear_velocity;
    if emitter.emit_along_normal {
        velocity += normal * emitter.speed;
    }
    let variation = emitter.speed_variation.clamp(0.0, 1.0);
    velocity *= (1.0 - variation) + rng.f32() * 2.0 * variation;

    let life = sample_range(rng, emitter.lifetime).max(0.0);
    let color = match &emitter.color {
        ParticleColor::Uniform(color) => *color,
        ParticleColor::Gradient(gradient) => gradient.sample(rng.f32()),
    };

    Particle {
        position: [position.x, position.y, position.z],
        life,
        velocity: [velocity.x, velocity.y, velocity.z],
        max_life: life,
        color,
        size: sample_range(rng, emitter.size),
        rotation: sample_range(rng, emitter.rotation),
        kind: emitter.kind,
        angular_velocity: sample_range(rng, emitter.angular_velocity),
    }
}

fn spawn_children(
    sub: &SubEmitter,
    events: &[ParticleEvent],
    rng: &mut Rng,
    out: &mut Vec<Particle>,
) {
    for event in events {
        for _ in 0..sub.emit_count {
            let direction = sphere_direction(rng);
            let velocity =
                event.velocity * sub.inherit_velocity + direction * sample_range(rng, sub.speed);
            let life = sample_range(rng, sub.lifetime).max(0.0);
            out.push(Particle {
                position: [event.position.x, event.position.y, event.position.z],
                life,
                velocity: [velocity.x, velocity.y, velocity.z],
                max_life: life,
                color: sub.color.unwrap_or(event.color),
                size: sample_range(rng, sub.size),
                rotation: 0.0,
                kind: sub.kind,
                angular_velocity: 0.0,
            });
        }
    }
}

/// Writes `fresh` records into the first dead slots of `records`,
/// marking them so physics skips them until next frame. Records that do
/// not fit are dropped. Returns the number inserted.
pub fn insert_records(
    records: &mut [Particle],
    fresh: &[Particle],
    fresh_slots: &mut Vec<usize>,
) -> usize {
    let mut inserted = 0;
    let mut cursor = 0;
    'outer: for record in fresh {
        while cursor < records.len() {
            if !records[cursor].is_alive() {
                records[cursor] = *record;
                fresh_slots.push(cursor);
                cursor += 1;
                inserted += 1;
                continue 'outer;
            }
            cursor += 1;
        }
        break;
    }
    inserted
}

/// One physics step over the record array. Mirrors the update compute
/// shader: aging, force accumulation, velocity/rotation-over-lifetime,
/// integration and plane collision. Records filled this frame are left
/// untouched so a particle's first aging step happens one frame after
/// its emission.
pub fn physics_step(
    emitter: &ParticleEmitter,
    state: &mut ParticleState,
    records: &mut [Particle],
    dt: f32,
) {
    let mut fresh = vec![false; records.len()];
    for slot in state.fresh_slots.drain(..) {
        if slot < records.len() {
            fresh[slot] = true;
        }
    }

    for (index, record) in records.iter_mut().enumerate() {
        if fresh[index] || !record.is_alive() {
            continue;
        }

        record.life -= dt;
        let position = Vec3::new(record.position[0], record.position[1], record.position[2]);
        let velocity = Vec3::new(record.velocity[0], record.velocity[1], record.velocity[2]);
        if record.life <= 0.0 {
            record.life = 0.0;
            push_event(&mut state.death_events, position, velocity, record.color);
            continue;
        }
        let life_pct = record.life_pct();

        let mut accel = Vec3::zeros();
        for entry in &emitter.forces {
            if entry.enabled {
                accel += entry.force.acceleration(position, velocity);
            }
        }
        let mut velocity = velocity + accel * dt;
        velocity = clamp_velocity(&emitter.forces, velocity);

        let multipliers = emitter
            .velocity_over_life
            .as_ref()
            .map(|curve| curve.sample(life_pct))
            .unwrap_or([1.0, 1.0, 1.0]);
        let effective = Vec3::new(
            velocity.x * multipliers[0],
            velocity.y * multipliers[1],
            velocity.z * multipliers[2],
        );
        let mut position = position + effective * dt;

        let rotation_rate = emitter
            .rotation_over_life
            .as_ref()
            .map(|curve| curve.sample(life_pct))
            .unwrap_or(0.0);
        record.rotation += (record.angular_velocity + rotation_rate) * dt;

        if let Some(plane) = &emitter.collision {
            let distance = glm::dot(&plane.normal, &position) + plane.d;
            if distance <= 0.0 {
                match plane.response {
                    CollisionResponse::Kill => {
                        record.life = 0.0;
                        push_event(&mut state.death_events, position, velocity, record.color);
                    }
                    CollisionResponse::Bounce | CollisionResponse::BounceDamped => {
                        if state.rng.f32() <= plane.bounce_chance {
                            let normal_speed = glm::dot(&velocity, &plane.normal);
                            let tangent = velocity - plane.normal * normal_speed;
                            velocity = tangent * (1.0 - plane.friction)
                                - plane.normal * normal_speed * plane.bounciness;
                            if plane.response == CollisionResponse::BounceDamped {
                                let spread = sphere_direction(&mut state.rng)
                                    * glm::length(&velocity)
                                    * 0.1;
                                velocity += spread;
                            }
                            position -= plane.normal * distance;
                        } else {
                            record.life = 0.0;
                            push_event(&mut state.death_events, position, velocity, record.color);
                        }
                    }
                    CollisionResponse::Stick => {
                        velocity = Vec3::zeros();
                        position -= plane.normal * distance;
                    }
                    CollisionResponse::Slide => {
                        let normal_speed = glm::dot(&velocity, &plane.normal);
                        if normal_speed < 0.0 {
                            velocity -= plane.normal * normal_speed;
                        }
                        position -= plane.normal * distance;
                    }
                    CollisionResponse::SubEmit => {
                        record.life = 0.0;
                        push_event(&mut state.collision_events, position, velocity, record.color);
                        push_event(&mut state.death_events, position, velocity, record.color);
                    }
                    CollisionResponse::PassThrough => {}
                }
            }
        }

        record.position = [position.x, position.y, position.z];
        record.velocity = [velocity.x, velocity.y, velocity.z];
    }
}

fn push_event(events: &mut Vec<ParticleEvent>, position: Vec3, velocity: Vec3, color: [f32; 4]) {
    if events.len() < MAX_EVENTS {
        events.push(ParticleEvent {
            position,
            velocity,
            speed: glm::length(&velocity),
            color,
        });
    }
}
