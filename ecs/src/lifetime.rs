//! Entity lifetimes and the reaper system.
//!
//! The reaper runs last in UPDATE. It marks entities whose lifetime policy
//! has expired and hands them to the world for destruction; the world
//! applies the destructions once the frame's systems have all completed, so
//! a doomed entity is still observable by every system of its final frame.

use crate::component::Component;
use crate::entity::EntityId;
use crate::schedule::{priority, Phase, System, SystemError, Tick};
use crate::world::World;

/// Lifetime policy of an entity.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum LifetimeKind {
    /// Destroy after `duration` seconds of accumulated layer updates.
    Transient { duration: f32 },
    /// Destroy when the active camera identity changes.
    View,
    /// Destroy when the host signals session end.
    Session,
    /// Destroy only on an explicit [`Lifetime::mark`].
    Manual,
}

/// Attach to an entity to hand its destruction over to the reaper.
#[derive(Debug)]
pub struct Lifetime {
    kind: LifetimeKind,
    elapsed: f32,
    marked: bool,
    /// Active camera at the time the reaper first saw this entity.
    /// `None` until captured; the inner option is the camera itself.
    view_camera: Option<Option<EntityId>>,
}

impl Lifetime {
    pub fn transient(duration: f32) -> Lifetime {
        assert!(duration >= 0.0, "transient lifetime must be non-negative");
        Lifetime::with_kind(LifetimeKind::Transient { duration })
    }

    pub fn view() -> Lifetime {
        Lifetime::with_kind(LifetimeKind::View)
    }

    pub fn session() -> Lifetime {
        Lifetime::with_kind(LifetimeKind::Session)
    }

    pub fn manual() -> Lifetime {
        Lifetime::with_kind(LifetimeKind::Manual)
    }

    fn with_kind(kind: LifetimeKind) -> Lifetime {
        Lifetime {
            kind,
            elapsed: 0.0,
            marked: false,
            view_camera: None,
        }
    }

    pub fn kind(&self) -> LifetimeKind {
        self.kind
    }

    /// Seconds accumulated so far; clamped to the duration for TRANSIENT.
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// External mark-for-destroy, honoured for every kind.
    pub fn mark(&mut self) {
        self.marked = true;
    }

    pub fn is_marked(&self) -> bool {
        self.marked
    }
}

impl Component for Lifetime {}

/// Sweeps [`Lifetime`] components and destroys expired entities.
///
/// TRANSIENT accumulation respects the sweep's layer filter (a HUD entity
/// ages on HUD updates). VIEW, SESSION and external marks are event-driven
/// and are honoured regardless of the filter.
pub struct LifetimeReaper;

impl System for LifetimeReaper {
    fn name(&self) -> &'static str {
        "lifetime_reaper"
    }

    fn phase(&self) -> Phase {
        Phase::Update
    }

    fn priority(&self) -> i32 {
        priority::LIFETIME_REAPER
    }

    fn run(&mut self, world: &mut World, tick: &Tick) -> Result<(), SystemError> {
        let session_end = world.scene().session_ending();
        let active_camera = world.scene().active_camera();

        let mut doomed = Vec::new();
        for id in world.entities_with::<Lifetime>() {
            let in_layer = world.matches_layer(id, tick.layer);
            let lifetime = match world.get_mut::<Lifetime>(id) {
                Some(l) => l,
                None => continue,
            };
            match lifetime.kind {
                LifetimeKind::Transient { duration } => {
                    if in_layer {
                        lifetime.elapsed = (lifetime.elapsed + tick.dt).min(duration);
                        if lifetime.elapsed >= duration {
                            lifetime.marked = true;
                        }
                    }
                }
                LifetimeKind::View => match lifetime.view_camera {
                    None => lifetime.view_camera = Some(active_camera),
                    Some(seen) => {
                        if seen != active_camera {
                            lifetime.marked = true;
                        }
                    }
                },
                LifetimeKind::Session => {
                    if session_end {
                        lifetime.marked = true;
                    }
                }
                LifetimeKind::Manual => {}
            }
            if lifetime.marked {
                doomed.push(id);
            }
        }

        for id in doomed {
            log::trace!("reaper: destroying {}", id);
            world.destroy_entity(id);
        }
        if session_end {
            world.scene_mut().clear_session_end();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_elapsed_clamps_to_duration() {
        let mut lt = Lifetime::transient(1.0);
        lt.elapsed = 0.9;
        // simulate what the reaper does
        lt.elapsed = (lt.elapsed + 0.5).min(1.0);
        assert_eq!(lt.elapsed, 1.0);
    }

    #[test]
    fn manual_only_respects_external_mark() {
        let mut lt = Lifetime::manual();
        assert!(!lt.is_marked());
        lt.mark();
        assert!(lt.is_marked());
    }
}
