//! Queue-partitioned mesh rendering.

use crate::api as gl;
use crate::components::{Lod, MeshRenderer, RenderQueue, StaticFlags, Transform};
use crate::context::RenderCtx;
use crate::material::Material;
use crate::mesh::Mesh;
use crate::shader::ShaderProgram;
use crate::state::StateScope;
use crate::systems::{active_camera, renderable, ActiveCamera};
use ember_ecs::{priority, EntityId, Phase, System, SystemError, Tick, World};
use nalgebra_glm as glm;
use nalgebra_glm::Mat4;
use ordered_float::NotNan;
use std::cmp::Reverse;
use std::rc::Rc;
use std::sync::Arc;

struct DrawItem {
    mesh: Arc<Mesh>,
    material: Arc<Material>,
    model: Mat4,
    sort_order: i32,
    dist2: NotNan<f32>,
}

/// Draws every visible MeshRenderer, partitioned by render queue:
/// BACKGROUND (no depth write), OPAQUE (state-sorted, front-to-back),
/// TRANSPARENT (back-to-front, no depth write), OVERLAY (no depth test),
/// in ascending queue order.
pub struct MeshRenderSystem {
    ctx: Rc<RenderCtx>,
}

impl MeshRenderSystem {
    pub fn new(ctx: Rc<RenderCtx>) -> MeshRenderSystem {
        MeshRenderSystem { ctx }
    }

    /// Resolves the drawable inputs of one entity, honouring the LOD
    /// override. `None` means "skip quietly" per the pipeline's failure
    /// semantics (missing handles, disposed mesh, absent material).
    fn collect(&self, world: &World, id: EntityId, camera: &ActiveCamera) -> Option<(RenderQueue, DrawItem)> {
        let renderer = world.get::<MeshRenderer>(id)?;
        let transform = world.get::<Transform>(id)?;

        let mesh_handle = match world.get::<Lod>(id) {
            Some(lod) => lod.active_mesh(),
            None => renderer.mesh.as_ref()?,
        };
        let mesh = match mesh_handle.get() {
            Ok(mesh) => mesh,
            Err(_) => {
                self.ctx.warn_once(
                    mesh_handle.key(),
                    &format!("{}: mesh {} is disposed, skipping", id, mesh_handle.key()),
                );
                return None;
            }
        };
        let material_handle = renderer.material.as_ref()?;
        let material = match material_handle.get() {
            Ok(material) => material,
            Err(_) => {
                self.ctx.warn_once(
                    material_handle.key(),
                    &format!(
                        "{}: material {} is invalid, skipping",
                        id,
                        material_handle.key()
                    ),
                );
                return None;
            }
        };

        let dist2 = glm::distance2(&transform.position(), &camera.position);
        Some((
            renderer.queue,
            DrawItem {
                mesh,
                material,
                model: *transform.world(),
                sort_order: renderer.sort_order,
                dist2: NotNan::new(dist2).unwrap_or_else(|_| NotNan::new(f32::MAX).unwrap()),
            },
        ))
    }

    fn draw_queue(&self, scope: &mut StateScope, camera: &ActiveCamera, items: &[DrawItem]) {
        let mut bound_program: Option<Arc<ShaderProgram>> = None;
        let mut bound_material_id = None;
        let mut bound_vao = None;

        for item in items {
            let program = match self.bind_material_program(scope, &item.material, camera, &mut bound_program) {
                Some(p) => p,
                None => continue,
            };

            if bound_material_id != Some(item.material.id()) {
                bound_material_id = Some(item.material.id());
                item.material.apply_uniforms(&program);
                let texture = item
                    .material
                    .texture
                    .as_ref()
                    .and_then(|t| t.get().ok())
                    .map(|t| t.id())
                    .unwrap_or(0);
                scope.bind_texture_2d(0, texture);
                if item.material.lit {
                    scope.bind_texture_2d(1, self.ctx.lightmap.texture().id());
                }
                if item.material.double_sided {
                    scope.disable_cull_face();
                }
            }

            if bound_vao != Some(item.mesh.vao()) {
                bound_vao = Some(item.mesh.vao());
                scope.bind_vertex_array(item.mesh.vao());
            }
            program.set_mat4("u_model", &item.model);
            item.mesh.draw();
        }
    }

    /// Binds the material's program (if different from the current one)
    /// and pushes the per-camera uniforms. Missing or broken shaders skip
    /// the draw with a one-shot warning.
    fn bind_material_program(
        &self,
        scope: &mut StateScope,
        material: &Material,
        camera: &ActiveCamera,
        bound: &mut Option<Arc<ShaderProgram>>,
    ) -> Option<Arc<ShaderProgram>> {
        if let Some(program) = bound.as_ref() {
            if program.key() == material.shader_key {
                return Some(Arc::clone(program));
            }
        }
        let handle = match self.ctx.shaders.get(&material.shader_key) {
            Some(handle) => handle,
            None => {
                self.ctx.warn_once(
                    &material.shader_key,
                    &format!("shader {} unavailable, skipping draws", material.shader_key),
                );
                return None;
            }
        };
        let program = handle.get().ok()?;
        scope.use_program(program.id());
        program.set_mat4("u_view", &camera.view);
        program.set_mat4("u_projection", &camera.projection);
        program.set_mat4("u_view_projection", &camera.view_projection);
        *bound = Some(Arc::clone(&program));
        Some(program)
    }
}

impl System for MeshRenderSystem {
    fn name(&self) -> &'static str {
        "mesh_render"
    }

    fn phase(&self) -> Phase {
        Phase::Render
    }

    fn priority(&self) -> i32 {
        priority::MESH
    }

    fn run(&mut self, world: &mut World, tick: &Tick) -> Result<(), SystemError> {
        let camera = match active_camera(world) {
            Some(camera) => camera,
            // no active camera: the whole pass is a no-op
            None => return Ok(()),
        };

        let mut background = Vec::new();
        let mut opaque = Vec::new();
        let mut transparent = Vec::new();
        let mut overlay = Vec::new();

        for id in world.entities_with::<(MeshRenderer, Transform)>() {
            if !renderable(world, id, tick.layer) {
                continue;
            }
            let queue = match world.get::<MeshRenderer>(id) {
                Some(renderer) => renderer.queue,
                None => continue,
            };
            // opaque batching-flagged entities belong to the instanced pass
            if queue == RenderQueue::Opaque {
                let batched = world
                    .get::<StaticFlags>(id)
                    .map(|f| f.contains(StaticFlags::BATCHING))
                    .unwrap_or(false);
                if batched {
                    continue;
                }
            }
            if let Some((queue, item)) = self.collect(world, id, &camera) {
                match queue {
                    RenderQueue::Background => background.push(item),
                    RenderQueue::Opaque => opaque.push(item),
                    RenderQueue::Transparent => transparent.push(item),
                    RenderQueue::Overlay => overlay.push(item),
                }
            }
        }

        // state-change-minimizing order for the opaque-like queues,
        // strict back-to-front for transparency
        background.sort_by_key(|i| (i.material.id(), i.mesh.id(), i.sort_order, i.dist2));
        opaque.sort_by_key(|i| (i.material.id(), i.mesh.id(), i.sort_order, i.dist2));
        transparent.sort_by_key(|i| (Reverse(i.dist2), i.sort_order));
        overlay.sort_by_key(|i| i.sort_order);

        let gl_ = Rc::clone(&self.ctx.gl);
        let mut stack = self.ctx.state.borrow_mut();

        if !background.is_empty() {
            let mut scope = stack.scope(&gl_);
            scope.enable_depth_test();
            scope.set_depth_mask(false);
            self.draw_queue(&mut scope, &camera, &background);
        }
        if !opaque.is_empty() {
            let mut scope = stack.scope(&gl_);
            scope.enable_depth_test();
            scope.set_depth_mask(true);
            scope.enable_cull_face();
            scope.set_cull_face(gl::BACK);
            self.draw_queue(&mut scope, &camera, &opaque);
        }
        if !transparent.is_empty() {
            let mut scope = stack.scope(&gl_);
            scope.enable_depth_test();
            scope.set_depth_mask(false);
            scope.enable_blend();
            scope.set_blend_func(gl::SRC_ALPHA, gl::ONE_MINUS_SRC_ALPHA);
            self.draw_queue(&mut scope, &camera, &transparent);
        }
        if !overlay.is_empty() {
            let mut scope = stack.scope(&gl_);
            scope.disable_depth_test();
            self.draw_queue(&mut scope, &camera, &overlay);
        }
        Ok(())
    }
}
