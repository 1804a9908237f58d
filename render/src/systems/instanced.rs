//! Instanced batching for statically-flagged opaque geometry.

use crate::api as gl;
use crate::components::{Lod, MeshRenderer, RenderQueue, StaticFlags, Transform};
use crate::context::RenderCtx;
use crate::material::Material;
use crate::mesh::{GrowableBuffer, Mesh};
use crate::systems::{active_camera, renderable};
use ember_ecs::{priority, Phase, System, SystemError, Tick, World};
use fxhash::FxHashMap;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

/// Instance attribute base location: a mat4 as four vec4 columns at
/// locations 3..=6 with divisor 1.
const INSTANCE_ATTR_BASE: u32 = 3;
const MAT4_STRIDE: i32 = 64;

struct Batch {
    mesh: Arc<Mesh>,
    material: Arc<Material>,
    models: Vec<f32>,
    count: i32,
}

/// Gathers visible OPAQUE entities flagged `StaticFlags::BATCHING`, groups
/// them by (mesh, material), fills a reusable instance buffer with model
/// matrices and issues one instanced indexed draw per group. Runs before
/// the per-entity mesh pass.
pub struct InstancedMeshSystem {
    ctx: Rc<RenderCtx>,
    instances: RefCell<Option<GrowableBuffer>>,
}

impl InstancedMeshSystem {
    pub fn new(ctx: Rc<RenderCtx>) -> InstancedMeshSystem {
        InstancedMeshSystem {
            ctx,
            instances: RefCell::new(None),
        }
    }
}

impl System for InstancedMeshSystem {
    fn name(&self) -> &'static str {
        "instanced_mesh"
    }

    fn phase(&self) -> Phase {
        Phase::Render
    }

    fn priority(&self) -> i32 {
        priority::INSTANCED_MESH
    }

    fn run(&mut self, world: &mut World, tick: &Tick) -> Result<(), SystemError> {
        let camera = match active_camera(world) {
            Some(camera) => camera,
            None => return Ok(()),
        };

        let mut batches: FxHashMap<(crate::mesh::MeshId, crate::material::MaterialId), Batch> =
            FxHashMap::default();

        for id in world.entities_with::<(MeshRenderer, StaticFlags, Transform)>() {
            if !renderable(world, id, tick.layer) {
                continue;
            }
            let flags = match world.get::<StaticFlags>(id) {
                Some(f) => *f,
                None => continue,
            };
            if !flags.contains(StaticFlags::BATCHING) {
                continue;
            }
            let renderer = match world.get::<MeshRenderer>(id) {
                Some(r) => r,
                None => continue,
            };
            if renderer.queue != RenderQueue::Opaque {
                continue;
            }
            let mesh_handle = match world.get::<Lod>(id) {
                Some(lod) => lod.active_mesh(),
                None => match renderer.mesh.as_ref() {
                    Some(handle) => handle,
                    None => continue,
                },
            };
            let mesh = match mesh_handle.get() {
                Ok(mesh) => mesh,
                Err(_) => continue,
            };
            let material = match renderer.material.as_ref().and_then(|m| m.get().ok()) {
                Some(material) => material,
                None => continue,
            };
            let model = match world.get::<Transform>(id) {
                Some(t) => *t.world(),
                None => continue,
            };

            let batch = batches
                .entry((mesh.id(), material.id()))
                .or_insert_with(|| Batch {
                    mesh,
                    material,
                    models: Vec::new(),
                    count: 0,
                });
            batch.models.extend_from_slice(model.as_slice());
            batch.count += 1;
        }

        if batches.is_empty() {
            return Ok(());
        }

        let gl_ = Rc::clone(&self.ctx.gl);
        let mut instances = self.instances.borrow_mut();
        let instances =
            instances.get_or_insert_with(|| GrowableBuffer::new(&gl_, gl::STREAM_DRAW));

        let program_handle = match self.ctx.shaders.get("core/instanced") {
            Some(handle) => handle,
            None => {
                self.ctx
                    .warn_once("core/instanced", "instanced shader unavailable");
                return Ok(());
            }
        };
        let program = match program_handle.get() {
            Ok(p) => p,
            Err(_) => return Ok(()),
        };

        let mut stack = self.ctx.state.borrow_mut();
        let mut scope = stack.scope(&gl_);
        scope.enable_depth_test();
        scope.set_depth_mask(true);
        scope.enable_cull_face();
        scope.set_cull_face(gl::BACK);
        scope.use_program(program.id());
        program.set_mat4("u_view", &camera.view);
        program.set_mat4("u_projection", &camera.projection);
        program.set_mat4("u_view_projection", &camera.view_projection);

        // deterministic group order keeps frames comparable
        let mut ordered: Vec<&Batch> = batches.values().collect();
        ordered.sort_by_key(|b| (b.material.id(), b.mesh.id()));

        for batch in ordered {
            batch.material.apply_uniforms(&program);
            let texture = batch
                .material
                .texture
                .as_ref()
                .and_then(|t| t.get().ok())
                .map(|t| t.id())
                .unwrap_or(0);
            scope.bind_texture_2d(0, texture);

            scope.bind_vertex_array(batch.mesh.vao());
            scope.bind_array_buffer(instances.id());
            instances.upload(gl::ARRAY_BUFFER, bytemuck::cast_slice(&batch.models));

            unsafe {
                for column in 0..4u32 {
                    let location = INSTANCE_ATTR_BASE + column;
                    gl_.EnableVertexAttribArray(location);
                    gl_.VertexAttribPointer(
                        location,
                        4,
                        gl::FLOAT,
                        gl::FALSE,
                        MAT4_STRIDE,
                        (column as usize * 16) as *const gl::types::GLvoid,
                    );
                    gl_.VertexAttribDivisor(location, 1);
                }
            }

            batch.mesh.draw_instanced(batch.count);

            // leave the mesh's VAO as the plain pass expects it
            unsafe {
                for column in 0..4u32 {
                    gl_.DisableVertexAttribArray(INSTANCE_ATTR_BASE + column);
                }
            }
        }
        Ok(())
    }
}
