//! Whole-pipeline behaviour over the mock driver: queue ordering,
//! transparency sorting, culling + LOD interaction, instanced batching and
//! frame-level state isolation.

mod common;

use common::mock_gl::{self as mock, load_mock_gl, DrawEvent, DrawKind};
use ember_render::prelude::*;
use ember_render::{Aabb, RenderPipeline, ShaderSources, StaticShaderSources};
use nalgebra_glm::Vec3;
use std::rc::Rc;

fn sources() -> Rc<StaticShaderSources> {
    let mut sources = StaticShaderSources::new();
    for key in [
        "core/world3d",
        "core/world3d_lit",
        "core/line",
        "core/sprite",
        "core/model",
        "core/instanced",
        "particle/particle",
        "particle/particle_mesh",
        "postprocess/brightness_extract",
        "postprocess/blur",
        "postprocess/composite",
    ] {
        sources.register(key, ShaderSources::graphics("// vs", "// fs"));
    }
    Rc::new(sources)
}

fn pipeline() -> RenderPipeline {
    let _ = pretty_env_logger::try_init();
    mock::reset();
    let pipeline = RenderPipeline::new(load_mock_gl(), sources());
    pipeline.set_screen_size(800, 600);
    pipeline
}

fn add_camera(pipeline: &mut RenderPipeline) -> EntityId {
    let world = pipeline.world_mut();
    let camera = world.create_entity();
    world.add_component(camera, Transform::new()).unwrap();
    world
        .add_component(camera, Camera::perspective(70.0, 0.1, 100.0))
        .unwrap();
    camera
}

fn add_mesh_entity(
    pipeline: &mut RenderPipeline,
    position: Vec3,
    queue: RenderQueue,
) -> EntityId {
    let mesh = pipeline.ctx().meshes.get("mesh:cube").unwrap();
    let material = pipeline.ctx().materials.get("material:default").unwrap();
    let world = pipeline.world_mut();
    let entity = world.create_entity();
    world.add_component(entity, Transform::at(position)).unwrap();
    world.add_component(entity, Visibility::visible()).unwrap();
    let mut renderer = MeshRenderer::new(mesh, material);
    renderer.queue = queue;
    world.add_component(entity, renderer).unwrap();
    entity
}

/// Indexed (non-instanced) draws are the mesh pass.
fn mesh_draws(events: &[DrawEvent]) -> Vec<&DrawEvent> {
    events
        .iter()
        .filter(|e| matches!(e.kind, DrawKind::Elements { .. }))
        .collect()
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Queue {
    Background,
    Opaque,
    Transparent,
    Overlay,
}

fn classify(event: &DrawEvent) -> Queue {
    if !event.depth_test {
        Queue::Overlay
    } else if event.blend {
        Queue::Transparent
    } else if event.depth_mask {
        Queue::Opaque
    } else {
        Queue::Background
    }
}

fn model_translation(event: &DrawEvent) -> Vec3 {
    let m = event.model.expect("mesh draw sets u_model");
    Vec3::new(m[12], m[13], m[14])
}

#[test]
fn queues_draw_in_ascending_order() {
    let mut pipeline = pipeline();
    add_camera(&mut pipeline);

    // deliberately added out of draw order
    add_mesh_entity(&mut pipeline, Vec3::new(0.0, 0.0, -5.0), RenderQueue::Overlay);
    add_mesh_entity(&mut pipeline, Vec3::new(0.0, 0.0, -6.0), RenderQueue::Opaque);
    add_mesh_entity(&mut pipeline, Vec3::new(0.0, 0.0, -7.0), RenderQueue::Transparent);
    add_mesh_entity(&mut pipeline, Vec3::new(0.0, 0.0, -8.0), RenderQueue::Background);
    add_mesh_entity(&mut pipeline, Vec3::new(1.0, 0.0, -6.0), RenderQueue::Opaque);

    pipeline.on_scene_render(0.016, 0.0);
    let events = mock::drain_events();
    let draws = mesh_draws(&events);
    assert_eq!(draws.len(), 5);

    let queues: Vec<Queue> = draws.iter().map(|e| classify(e)).collect();
    let mut sorted = queues.clone();
    sorted.sort();
    assert_eq!(queues, sorted, "draw order follows queue values: {:?}", queues);
    assert_eq!(queues[0], Queue::Background);
    assert_eq!(queues[4], Queue::Overlay);
}

#[test]
fn transparent_queue_draws_back_to_front() {
    let mut pipeline = pipeline();
    add_camera(&mut pipeline);

    for z in [-5.0, -30.0, -2.0, -18.0] {
        add_mesh_entity(
            &mut pipeline,
            Vec3::new(0.0, 0.0, z),
            RenderQueue::Transparent,
        );
    }

    pipeline.on_scene_render(0.016, 0.0);
    let events = mock::drain_events();
    let distances: Vec<f32> = mesh_draws(&events)
        .iter()
        .filter(|e| classify(e) == Queue::Transparent)
        .map(|e| {
            let p = model_translation(e);
            p.x * p.x + p.y * p.y + p.z * p.z
        })
        .collect();

    assert_eq!(distances.len(), 4);
    for pair in distances.windows(2) {
        assert!(
            pair[0] >= pair[1],
            "squared distances must be non-increasing: {:?}",
            distances
        );
    }
}

#[test]
fn culling_and_lod_follow_the_camera() {
    let mut pipeline = pipeline();
    add_camera(&mut pipeline);

    let hi = pipeline.ctx().meshes.get("mesh:cube").unwrap();
    let mid = pipeline.ctx().meshes.get("mesh:tetrahedron").unwrap();
    let lo = pipeline.ctx().meshes.get("mesh:octahedron").unwrap();
    let hi_vao = hi.get().unwrap().vao();
    let lo_vao = lo.get().unwrap().vao();

    let fallback = pipeline.ctx().meshes.get("mesh:cube").unwrap();
    let material = pipeline.ctx().materials.get("material:default").unwrap();

    let world = pipeline.world_mut();
    let entity = world.create_entity();
    world
        .add_component(entity, Transform::at(Vec3::new(0.0, 0.0, -5.0)))
        .unwrap();
    world.add_component(entity, Visibility::visible()).unwrap();
    world.add_component(entity, Bounds::new(Aabb::unit())).unwrap();
    world
        .add_component(
            entity,
            Lod::new(
                vec![
                    LodLevel { threshold: 10.0, mesh: hi },
                    LodLevel { threshold: 50.0, mesh: mid },
                    LodLevel { threshold: f32::INFINITY, mesh: lo },
                ],
                0.0,
            ),
        )
        .unwrap();
    world
        .add_component(entity, MeshRenderer::new(fallback, material))
        .unwrap();

    // close to the camera: visible at full detail
    pipeline.on_scene_render(0.016, 0.0);
    let world = pipeline.world();
    assert!(!world.get::<Visibility>(entity).unwrap().is_culled());
    assert_eq!(world.get::<Lod>(entity).unwrap().active_level(), 0);
    let events = mock::drain_events();
    let draws = mesh_draws(&events);
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].vao, hi_vao, "full-detail mesh drawn");

    // far away: coarsest level
    pipeline
        .world_mut()
        .get_mut::<Transform>(entity)
        .unwrap()
        .set_position(Vec3::new(0.0, 0.0, -60.0));
    pipeline.on_scene_render(0.016, 0.0);
    assert_eq!(pipeline.world().get::<Lod>(entity).unwrap().active_level(), 2);
    let events = mock::drain_events();
    let draws = mesh_draws(&events);
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].vao, lo_vao, "coarse mesh drawn");

    // far off to the side: culled, nothing drawn
    pipeline
        .world_mut()
        .get_mut::<Transform>(entity)
        .unwrap()
        .set_position(Vec3::new(200.0, 0.0, 0.0));
    pipeline.on_scene_render(0.016, 0.0);
    assert!(pipeline
        .world()
        .get::<Visibility>(entity)
        .unwrap()
        .is_culled());
    let events = mock::drain_events();
    assert!(mesh_draws(&events).is_empty(), "culled entity is not drawn");
}

#[test]
fn batching_flagged_entities_draw_instanced_before_the_mesh_pass() {
    let mut pipeline = pipeline();
    add_camera(&mut pipeline);

    for x in 0..4 {
        let entity = add_mesh_entity(
            &mut pipeline,
            Vec3::new(x as f32, 0.0, -10.0),
            RenderQueue::Opaque,
        );
        pipeline
            .world_mut()
            .add_component(entity, StaticFlags::BATCHING)
            .unwrap();
    }
    // one unbatched entity keeps the plain pass busy
    add_mesh_entity(&mut pipeline, Vec3::new(0.0, 2.0, -10.0), RenderQueue::Opaque);

    pipeline.on_scene_render(0.016, 0.0);
    let events = mock::drain_events();

    let instanced_at = events
        .iter()
        .position(|e| matches!(e.kind, DrawKind::ElementsInstanced { .. }))
        .expect("instanced draw issued");
    match events[instanced_at].kind {
        DrawKind::ElementsInstanced { instances, .. } => assert_eq!(instances, 4),
        _ => unreachable!(),
    }

    let plain = mesh_draws(&events);
    assert_eq!(plain.len(), 1, "batched entities leave the mesh pass");
    let plain_at = events
        .iter()
        .position(|e| matches!(e.kind, DrawKind::Elements { .. }))
        .unwrap();
    assert!(
        instanced_at < plain_at,
        "instanced pass runs before the mesh pass"
    );
}

#[test]
fn no_active_camera_makes_render_passes_no_ops() {
    let mut pipeline = pipeline();
    add_mesh_entity(&mut pipeline, Vec3::new(0.0, 0.0, -5.0), RenderQueue::Opaque);

    pipeline.on_scene_render(0.016, 0.0);
    let events = mock::drain_events();
    assert!(
        events.is_empty(),
        "nothing draws without a camera: {:?}",
        events
    );
}

#[test]
fn hidden_and_foreign_dimension_entities_are_skipped() {
    let mut pipeline = pipeline();
    add_camera(&mut pipeline);

    let hidden = add_mesh_entity(&mut pipeline, Vec3::new(0.0, 0.0, -5.0), RenderQueue::Opaque);
    pipeline
        .world_mut()
        .get_mut::<Visibility>(hidden)
        .unwrap()
        .visible = false;

    let elsewhere = add_mesh_entity(&mut pipeline, Vec3::new(1.0, 0.0, -5.0), RenderQueue::Opaque);
    pipeline
        .world_mut()
        .add_component(elsewhere, Dimension(7))
        .unwrap();
    pipeline.on_dimension_change(0);

    let _drawn = add_mesh_entity(&mut pipeline, Vec3::new(2.0, 0.0, -5.0), RenderQueue::Opaque);

    pipeline.on_scene_render(0.016, 0.0);
    let events = mock::drain_events();
    let draws = mesh_draws(&events);
    assert_eq!(draws.len(), 1);
    let p = model_translation(draws[0]);
    assert_eq!(p.x, 2.0);
}

#[test]
fn a_frame_leaves_the_driver_state_untouched() {
    let mut pipeline = pipeline();
    add_camera(&mut pipeline);
    add_mesh_entity(&mut pipeline, Vec3::new(0.0, 0.0, -5.0), RenderQueue::Opaque);
    add_mesh_entity(&mut pipeline, Vec3::new(0.0, 1.0, -5.0), RenderQueue::Transparent);

    // a particle system and a trail exercise the remaining passes
    let world = pipeline.world_mut();
    let emitter_entity = world.create_entity();
    world
        .add_component(emitter_entity, Transform::new())
        .unwrap();
    world
        .add_component(
            emitter_entity,
            ParticleEmitter::new(EmitterShape::Point, 50.0),
        )
        .unwrap();
    world
        .add_component(emitter_entity, ParticleState::looping().with_seed(3))
        .unwrap();
    world
        .add_component(emitter_entity, ParticleBuffer::new(32))
        .unwrap();
    world
        .add_component(
            emitter_entity,
            ParticleRender::billboard(ParticleBlend::Additive),
        )
        .unwrap();
    world.add_component(emitter_entity, Trail::new(8, 0.0)).unwrap();

    let before = mock::snapshot();
    for _ in 0..3 {
        pipeline.on_scene_render(0.05, 0.0);
        assert_eq!(
            mock::snapshot(),
            before,
            "every state change is unwound by frame end"
        );
    }
}

#[test]
fn cpu_particles_emit_age_and_draw() {
    let mut pipeline = pipeline();
    add_camera(&mut pipeline);

    let world = pipeline.world_mut();
    let entity = world.create_entity();
    world.add_component(entity, Transform::new()).unwrap();
    let mut emitter = ParticleEmitter::new(EmitterShape::Point, 10.0);
    emitter.lifetime = (1.0, 1.0);
    world.add_component(entity, emitter).unwrap();
    world
        .add_component(entity, ParticleState::looping().with_seed(42))
        .unwrap();
    world.add_component(entity, ParticleBuffer::new(64)).unwrap();
    world
        .add_component(entity, ParticleRender::billboard(ParticleBlend::Alpha))
        .unwrap();

    for _ in 0..20 {
        pipeline.on_scene_render(0.1, 0.0);
    }

    // the 3.3 mock context has no compute: the CPU backing was chosen
    let key = pipeline
        .world()
        .get::<ParticleBuffer>(entity)
        .unwrap()
        .key()
        .expect("backing initialized at first emission");
    let pool = pipeline.ctx().particles.borrow();
    let alive = match pool.get(key).unwrap() {
        ember_render::particle::Backing::Cpu(cpu) => cpu.alive(),
        ember_render::particle::Backing::Gpu(_) => panic!("expected CPU backing on a 3.3 context"),
    };
    assert_eq!(alive, 10, "rate 10 at dt 0.1 with 1s lifetime");

    let events = mock::drain_events();
    let particle_draws: Vec<_> = events
        .iter()
        .filter(|e| matches!(e.kind, DrawKind::ArraysInstanced { count: 6, .. }))
        .collect();
    assert!(!particle_draws.is_empty(), "billboard quad drawn instanced");
    match particle_draws.last().unwrap().kind {
        DrawKind::ArraysInstanced { instances, .. } => assert_eq!(instances, 64),
        _ => unreachable!(),
    }
}
