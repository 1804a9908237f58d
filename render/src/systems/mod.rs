//! The render pipeline systems.
//!
//! UPDATE: transform resolve → LOD → frustum culling → camera matrices →
//! world-space UI → trail advance (particle systems live in
//! [`crate::particle`]). RENDER: instanced batches → mesh queues → lines →
//! sprites → debug wireframes.

mod camera;
mod culling;
mod debug;
mod instanced;
mod line;
mod lod;
mod mesh;
mod sprite;
mod transform;
mod trail;
mod world_ui;

pub use camera::CameraSystem;
pub use culling::FrustumCullSystem;
pub use debug::DebugRenderSystem;
pub use instanced::InstancedMeshSystem;
pub use line::{LineBatcher, LineRenderSystem};
pub use lod::LodSystem;
pub use mesh::MeshRenderSystem;
pub use sprite::SpriteRenderSystem;
pub use transform::TransformSystem;
pub use trail::TrailSystem;
pub use world_ui::WorldUiSystem;

use crate::components::{Camera, Transform, Visibility};
use ember_ecs::{EntityId, Layer, World};
use nalgebra_glm::{Mat4, Vec3};

/// Matrices and position of the scene's active camera, cloned out of the
/// world so render systems can iterate freely.
#[derive(Clone, Debug)]
pub(crate) struct ActiveCamera {
    pub entity: EntityId,
    pub view: Mat4,
    pub projection: Mat4,
    pub view_projection: Mat4,
    pub position: Vec3,
}

/// Resolves the active camera; `None` makes camera-driven passes no-ops.
pub(crate) fn active_camera(world: &World) -> Option<ActiveCamera> {
    let entity = world.scene().active_camera()?;
    let camera = world.get::<Camera>(entity)?;
    let transform = world.get::<Transform>(entity)?;
    Some(ActiveCamera {
        entity,
        view: *camera.view(),
        projection: *camera.projection_matrix(),
        view_projection: *camera.view_projection(),
        position: transform.position(),
    })
}

/// `visible && !culled`, with "no Visibility component" meaning visible.
pub(crate) fn effectively_visible(world: &World, id: EntityId) -> bool {
    world
        .get::<Visibility>(id)
        .map(|v| v.effective())
        .unwrap_or(true)
}

/// Layer + dimension routing shared by every draw-collecting system.
pub(crate) fn renderable(world: &World, id: EntityId, layer: Option<Layer>) -> bool {
    world.matches_layer(id, layer)
        && world.in_active_dimension(id)
        && effectively_visible(world, id)
}
