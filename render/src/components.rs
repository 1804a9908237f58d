//! Render-domain components.
//!
//! All of these are data records; the systems in [`crate::systems`] do the
//! work. Derived values (world matrices, cached AABBs, view matrices) live
//! here as plain fields the owning system recomputes.

use crate::geom::Aabb;
use crate::material::Material;
use crate::mesh::Mesh;
use crate::resource::Handle;
use crate::texture::Texture2d;
use bitflags::bitflags;
use ember_ecs::Component;
use nalgebra_glm as glm;
use nalgebra_glm::{Mat4, Vec2, Vec3, Vec4};
use smallvec::SmallVec;
use std::any::TypeId;
use std::collections::VecDeque;

//--------------------------------------------------------------------------
// Transform

/// Position / euler rotation (degrees) / scale, plus the derived world
/// matrix and basis vectors. Mutations go through the setters so the world
/// matrix is recomputed before any consumer reads it that frame.
#[derive(Clone, Debug)]
pub struct Transform {
    position: Vec3,
    /// Euler angles in degrees: (pitch, yaw, roll) around (X, Y, Z).
    rotation: Vec3,
    scale: Vec3,
    dirty: bool,
    world: Mat4,
    forward: Vec3,
    up: Vec3,
    right: Vec3,
}

impl Transform {
    pub fn new() -> Transform {
        let mut t = Transform {
            position: Vec3::zeros(),
            rotation: Vec3::zeros(),
            scale: Vec3::new(1.0, 1.0, 1.0),
            dirty: true,
            world: Mat4::identity(),
            forward: Vec3::new(0.0, 0.0, -1.0),
            up: Vec3::new(0.0, 1.0, 0.0),
            right: Vec3::new(1.0, 0.0, 0.0),
        };
        t.resolve();
        t
    }

    pub fn at(position: Vec3) -> Transform {
        let mut t = Transform::new();
        t.set_position(position);
        t.resolve();
        t
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn rotation_degrees(&self) -> Vec3 {
        self.rotation
    }

    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.dirty = true;
    }

    pub fn set_rotation_degrees(&mut self, rotation: Vec3) {
        self.rotation = rotation;
        self.dirty = true;
    }

    pub fn set_scale(&mut self, scale: Vec3) {
        self.scale = scale;
        self.dirty = true;
    }

    pub fn translate(&mut self, delta: Vec3) {
        self.position += delta;
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// `T · R_yaw · R_pitch · R_roll · S`, plus the basis vectors derived
    /// from the rotation part.
    pub fn resolve(&mut self) {
        let yaw = self.rotation.y.to_radians();
        let pitch = self.rotation.x.to_radians();
        let roll = self.rotation.z.to_radians();
        let rotation = glm::rotation(yaw, &Vec3::new(0.0, 1.0, 0.0))
            * glm::rotation(pitch, &Vec3::new(1.0, 0.0, 0.0))
            * glm::rotation(roll, &Vec3::new(0.0, 0.0, 1.0));
        self.world = glm::translation(&self.position) * rotation * glm::scaling(&self.scale);
        self.forward = (rotation * Vec4::new(0.0, 0.0, -1.0, 0.0)).xyz();
        self.up = (rotation * Vec4::new(0.0, 1.0, 0.0, 0.0)).xyz();
        self.right = (rotation * Vec4::new(1.0, 0.0, 0.0, 0.0)).xyz();
        self.dirty = false;
    }

    /// Rotation-only matrix, used to compose camera views.
    pub fn rotation_matrix(&self) -> Mat4 {
        let yaw = self.rotation.y.to_radians();
        let pitch = self.rotation.x.to_radians();
        let roll = self.rotation.z.to_radians();
        glm::rotation(yaw, &Vec3::new(0.0, 1.0, 0.0))
            * glm::rotation(pitch, &Vec3::new(1.0, 0.0, 0.0))
            * glm::rotation(roll, &Vec3::new(0.0, 0.0, 1.0))
    }

    pub fn world(&self) -> &Mat4 {
        &self.world
    }

    pub fn forward(&self) -> Vec3 {
        self.forward
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    pub fn right(&self) -> Vec3 {
        self.right
    }
}

impl Default for Transform {
    fn default() -> Transform {
        Transform::new()
    }
}

impl Component for Transform {}

//--------------------------------------------------------------------------
// Camera

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Projection {
    Perspective { fov_degrees: f32 },
    Orthographic { size: f32 },
}

/// Camera over an entity's Transform. Requires Transform.
///
/// At most one camera per world should have `active = true`; when several
/// do, the camera system picks the first and warns.
#[derive(Clone, Debug)]
pub struct Camera {
    pub projection: Projection,
    pub near: f32,
    pub far: f32,
    /// 0.0 = derive from the current screen size.
    pub aspect: f32,
    pub active: bool,
    view: Mat4,
    proj: Mat4,
    view_proj: Mat4,
}

impl Camera {
    pub fn perspective(fov_degrees: f32, near: f32, far: f32) -> Camera {
        debug_assert!(fov_degrees > 0.0 && fov_degrees < 180.0);
        debug_assert!(near < far);
        Camera {
            projection: Projection::Perspective { fov_degrees },
            near,
            far,
            aspect: 0.0,
            active: true,
            view: Mat4::identity(),
            proj: Mat4::identity(),
            view_proj: Mat4::identity(),
        }
    }

    pub fn orthographic(size: f32, near: f32, far: f32) -> Camera {
        debug_assert!(near < far);
        Camera {
            projection: Projection::Orthographic { size },
            near,
            far,
            aspect: 0.0,
            active: true,
            view: Mat4::identity(),
            proj: Mat4::identity(),
            view_proj: Mat4::identity(),
        }
    }

    pub(crate) fn store_matrices(&mut self, view: Mat4, proj: Mat4) {
        self.view = view;
        self.proj = proj;
        self.view_proj = proj * view;
    }

    pub fn view(&self) -> &Mat4 {
        &self.view
    }

    pub fn projection_matrix(&self) -> &Mat4 {
        &self.proj
    }

    pub fn view_projection(&self) -> &Mat4 {
        &self.view_proj
    }
}

impl Component for Camera {
    fn dependencies(&self) -> SmallVec<[TypeId; 4]> {
        SmallVec::from_slice(&[TypeId::of::<Transform>()])
    }
}

//--------------------------------------------------------------------------
// Visibility / Bounds / LOD

/// Client-controlled `visible` plus the system-written `culled` flag.
/// Effective visibility is `visible && !culled`.
#[derive(Copy, Clone, Debug)]
pub struct Visibility {
    pub visible: bool,
    culled: bool,
}

impl Visibility {
    pub fn visible() -> Visibility {
        Visibility {
            visible: true,
            culled: false,
        }
    }

    pub fn hidden() -> Visibility {
        Visibility {
            visible: false,
            culled: false,
        }
    }

    pub fn is_culled(&self) -> bool {
        self.culled
    }

    /// Only the culling system writes this.
    pub(crate) fn set_culled(&mut self, culled: bool) {
        self.culled = culled;
    }

    pub fn effective(&self) -> bool {
        self.visible && !self.culled
    }
}

impl Default for Visibility {
    fn default() -> Visibility {
        Visibility::visible()
    }
}

impl Component for Visibility {}

/// Local AABB plus the cached world-space AABB maintained by the
/// transform system.
#[derive(Copy, Clone, Debug)]
pub struct Bounds {
    local: Aabb,
    world: Aabb,
    stale: bool,
}

impl Bounds {
    pub fn new(local: Aabb) -> Bounds {
        Bounds {
            local,
            world: local,
            stale: true,
        }
    }

    pub fn local(&self) -> Aabb {
        self.local
    }

    pub fn set_local(&mut self, local: Aabb) {
        self.local = local;
        self.stale = true;
    }

    pub fn world(&self) -> Aabb {
        self.world
    }

    pub(crate) fn is_stale(&self) -> bool {
        self.stale
    }

    pub(crate) fn store_world(&mut self, world: Aabb) {
        self.world = world;
        self.stale = false;
    }
}

impl Component for Bounds {}

/// One detail level: active while the camera distance is below
/// `threshold` (and above the previous level's threshold).
#[derive(Debug)]
pub struct LodLevel {
    pub threshold: f32,
    pub mesh: Handle<Mesh>,
}

/// Ordered detail levels with hysteresis around each boundary.
#[derive(Debug)]
pub struct Lod {
    levels: Vec<LodLevel>,
    hysteresis: f32,
    active: usize,
}

impl Lod {
    /// `levels` must have strictly increasing thresholds (the last is
    /// commonly `f32::INFINITY`); `hysteresis` must be non-negative.
    pub fn new(levels: Vec<LodLevel>, hysteresis: f32) -> Lod {
        debug_assert!(!levels.is_empty());
        debug_assert!(hysteresis >= 0.0);
        debug_assert!(levels.windows(2).all(|w| w[0].threshold < w[1].threshold));
        Lod {
            levels,
            hysteresis,
            active: 0,
        }
    }

    pub fn levels(&self) -> &[LodLevel] {
        &self.levels
    }

    pub fn hysteresis(&self) -> f32 {
        self.hysteresis
    }

    pub fn active_level(&self) -> usize {
        self.active
    }

    pub fn active_mesh(&self) -> &Handle<Mesh> {
        &self.levels[self.active].mesh
    }

    /// Applies one distance observation; returns true when the level
    /// changed. Transitions commit only once the distance clears the
    /// crossed boundary by the hysteresis margin.
    pub(crate) fn observe_distance(&mut self, distance: f32) -> bool {
        let thresholds: SmallVec<[f32; 8]> =
            self.levels.iter().map(|level| level.threshold).collect();
        let next = select_lod_level(&thresholds, self.active, distance, self.hysteresis);
        let changed = next != self.active;
        self.active = next;
        changed
    }
}

/// Pure level selection with hysteresis: the candidate level comes from
/// the threshold intervals, and a change from `active` commits only when
/// the distance clears the crossed boundary by `hysteresis`.
pub(crate) fn select_lod_level(
    thresholds: &[f32],
    active: usize,
    distance: f32,
    hysteresis: f32,
) -> usize {
    let raw = thresholds
        .partition_point(|t| distance >= *t)
        .min(thresholds.len().saturating_sub(1));
    if raw == active {
        return active;
    }
    let commit = if raw > active {
        distance >= thresholds[raw - 1] + hysteresis
    } else {
        distance <= thresholds[raw] - hysteresis
    };
    if commit {
        raw
    } else {
        active
    }
}

impl Component for Lod {}

//--------------------------------------------------------------------------
// Mesh rendering

/// Draw-order bucket; ascending values draw later.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum RenderQueue {
    Background,
    Opaque,
    Transparent,
    Overlay,
}

impl RenderQueue {
    pub fn value(self) -> u32 {
        match self {
            RenderQueue::Background => 1000,
            RenderQueue::Opaque => 2000,
            RenderQueue::Transparent => 3000,
            RenderQueue::Overlay => 4000,
        }
    }
}

/// Drawable mesh + material. Both handles must be present for the entity
/// to be drawn.
#[derive(Debug)]
pub struct MeshRenderer {
    pub mesh: Option<Handle<Mesh>>,
    pub material: Option<Handle<Material>>,
    pub queue: RenderQueue,
    pub sort_order: i32,
    pub cast_shadows: bool,
}

impl MeshRenderer {
    pub fn new(mesh: Handle<Mesh>, material: Handle<Material>) -> MeshRenderer {
        MeshRenderer {
            mesh: Some(mesh),
            material: Some(material),
            queue: RenderQueue::Opaque,
            sort_order: 0,
            cast_shadows: true,
        }
    }

    pub fn with_queue(mut self, queue: RenderQueue) -> MeshRenderer {
        self.queue = queue;
        self
    }
}

impl Component for MeshRenderer {}

bitflags! {
    /// Static optimization hints.
    #[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
    pub struct StaticFlags: u32 {
        /// Eligible for instanced batching (opaque queue only).
        const BATCHING = 1 << 0;
        const OCCLUDER = 1 << 1;
        const OCCLUDEE = 1 << 2;
    }
}

impl Component for StaticFlags {}

//--------------------------------------------------------------------------
// Lines, sprites, world-space UI, trails

#[derive(Copy, Clone, Debug)]
pub struct LineSegment {
    pub start: Vec3,
    pub end: Vec3,
    pub color: Vec4,
}

/// A set of world-space line segments drawn by the line pass.
#[derive(Clone, Debug, Default)]
pub struct Lines {
    pub segments: Vec<LineSegment>,
    pub width: f32,
}

impl Lines {
    pub fn new() -> Lines {
        Lines {
            segments: Vec::new(),
            width: 1.0,
        }
    }
}

impl Component for Lines {}

/// Screen-space textured quad drawn by the sprite pass; position comes
/// from the entity's Transform (x/y in pixels).
#[derive(Debug)]
pub struct Sprite {
    pub texture: Option<Handle<Texture2d>>,
    pub size: Vec2,
    pub color: Vec4,
}

impl Sprite {
    pub fn new(size: Vec2) -> Sprite {
        Sprite {
            texture: None,
            size,
            color: Vec4::new(1.0, 1.0, 1.0, 1.0),
        }
    }
}

impl Component for Sprite {
    fn dependencies(&self) -> SmallVec<[TypeId; 4]> {
        SmallVec::from_slice(&[TypeId::of::<Transform>()])
    }
}

/// Projects a world-space anchor into screen coordinates for UI overlays.
#[derive(Clone, Debug)]
pub struct WorldSpaceUi {
    pub world_offset: Vec3,
    /// Screen position in pixels after projection; `None` while behind
    /// the camera.
    pub screen: Option<Vec2>,
}

impl WorldSpaceUi {
    pub fn new(world_offset: Vec3) -> WorldSpaceUi {
        WorldSpaceUi {
            world_offset,
            screen: None,
        }
    }
}

impl Component for WorldSpaceUi {
    fn dependencies(&self) -> SmallVec<[TypeId; 4]> {
        SmallVec::from_slice(&[TypeId::of::<Transform>()])
    }
}

/// Ribbon of recent positions, advanced by the trail system and drawn by
/// the line pass.
#[derive(Clone, Debug)]
pub struct Trail {
    pub max_points: usize,
    pub min_distance: f32,
    pub color: Vec4,
    pub points: VecDeque<Vec3>,
}

impl Trail {
    pub fn new(max_points: usize, min_distance: f32) -> Trail {
        Trail {
            max_points: max_points.max(2),
            min_distance,
            color: Vec4::new(1.0, 1.0, 1.0, 1.0),
            points: VecDeque::new(),
        }
    }
}

impl Component for Trail {
    fn dependencies(&self) -> SmallVec<[TypeId; 4]> {
        SmallVec::from_slice(&[TypeId::of::<Transform>()])
    }
}

/// Bloom/tonemap settings; attach to the active camera's entity.
#[derive(Copy, Clone, Debug)]
pub struct PostProcess {
    pub threshold: f32,
    /// Soft-knee width below the threshold.
    pub knee: f32,
    pub intensity: f32,
    pub exposure: f32,
    pub blur_iterations: u32,
    pub tonemap: bool,
}

impl Default for PostProcess {
    fn default() -> PostProcess {
        PostProcess {
            threshold: 1.0,
            knee: 0.5,
            intensity: 1.0,
            exposure: 1.0,
            blur_iterations: 4,
            tonemap: false,
        }
    }
}

impl Component for PostProcess {
    fn dependencies(&self) -> SmallVec<[TypeId; 4]> {
        SmallVec::from_slice(&[TypeId::of::<Camera>()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_resolve_composes_trs() {
        let mut t = Transform::new();
        t.set_position(Vec3::new(1.0, 2.0, 3.0));
        t.set_scale(Vec3::new(2.0, 2.0, 2.0));
        t.resolve();
        let p = t.world() * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert_eq!(p.xyz(), Vec3::new(1.0, 2.0, 3.0));
        let q = t.world() * Vec4::new(1.0, 0.0, 0.0, 1.0);
        assert_eq!(q.xyz(), Vec3::new(3.0, 2.0, 3.0));
    }

    #[test]
    fn transform_yaw_rotates_forward() {
        let mut t = Transform::new();
        t.set_rotation_degrees(Vec3::new(0.0, 90.0, 0.0));
        t.resolve();
        // +90 degrees yaw turns -Z into -X
        let f = t.forward();
        assert!((f.x + 1.0).abs() < 1e-5, "forward = {:?}", f);
        assert!(f.z.abs() < 1e-5);
    }

    #[test]
    fn lod_selects_by_distance_with_hysteresis() {
        let thresholds = [10.0, 50.0, f32::INFINITY];
        let mut active = 0;
        active = select_lod_level(&thresholds, active, 5.0, 2.0);
        assert_eq!(active, 0);
        active = select_lod_level(&thresholds, active, 60.0, 2.0);
        assert_eq!(active, 2);
        // inside the hysteresis band: no flicker back
        active = select_lod_level(&thresholds, active, 49.0, 2.0);
        assert_eq!(active, 2);
        // clearing the band commits
        active = select_lod_level(&thresholds, active, 47.9, 2.0);
        assert_eq!(active, 1);
    }

    #[test]
    fn lod_never_changes_twice_within_one_band() {
        let thresholds = [10.0, f32::INFINITY];
        let mut active = 0;
        // oscillate right at the boundary; with hysteresis 1.0 nothing
        // commits until we leave the band entirely
        for d in [10.0, 10.5, 9.8, 10.3] {
            active = select_lod_level(&thresholds, active, d, 1.0);
            assert_eq!(active, 0);
        }
        active = select_lod_level(&thresholds, active, 11.0, 1.0);
        assert_eq!(active, 1);
        for d in [10.0, 9.5, 10.4] {
            active = select_lod_level(&thresholds, active, d, 1.0);
            assert_eq!(active, 1);
        }
        active = select_lod_level(&thresholds, active, 9.0, 1.0);
        assert_eq!(active, 0);
    }
}
