//! Inspector: formatted dumps of world contents and frame timings.

use ember_ecs::World;
use std::fmt::Write;

/// Renders a text report of every entity (id, active flag, component type
/// names) plus the last frame's per-system timings in execution order.
pub fn dump_world(world: &World) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "world: {} entities", world.entity_count());
    let _ = writeln!(
        out,
        "scene: dimension={:?} camera={:?}",
        world.scene().active_dimension(),
        world.scene().active_camera()
    );

    let profile = world.last_frame_profile();
    let _ = writeln!(
        out,
        "frame {}: {} systems, {:.3} ms total",
        profile.frame,
        profile.samples.len(),
        profile.total().as_secs_f64() * 1000.0
    );
    for sample in &profile.samples {
        let _ = writeln!(
            out,
            "  [{:?} {:>6}] {:<24} {:.3} ms",
            sample.phase,
            sample.priority,
            sample.name,
            sample.duration.as_secs_f64() * 1000.0
        );
    }
    out
}

/// Component listing of one entity, or a note that it is gone.
pub fn dump_entity(world: &World, id: ember_ecs::EntityId) -> String {
    if !world.contains(id) {
        return format!("{}: (destroyed)", id);
    }
    let names = world.component_names(id);
    let mut out = format!("{} (active={})\n", id, world.is_active(id));
    for name in names {
        out.push_str("  ");
        out.push_str(short_type_name(name));
        out.push('\n');
    }
    out
}

/// `a::b::Foo` -> `Foo`.
fn short_type_name(full: &str) -> &str {
    full.rsplit("::").next().unwrap_or(full)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_names_strip_paths() {
        assert_eq!(short_type_name("ember_render::components::Transform"), "Transform");
        assert_eq!(short_type_name("Transform"), "Transform");
    }
}
