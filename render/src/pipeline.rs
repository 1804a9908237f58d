//! Pipeline entry: the boundary the host drives.
//!
//! The host owns the window, the GL context and the frame loop; it calls
//! the `on_*` methods from its own render events. Each event runs one
//! UPDATE+RENDER sweep of the matching layer, and every GL state change
//! made inside is unwound through the scoped state stack before the call
//! returns.

use crate::api::Gl;
use crate::context::RenderCtx;
use crate::particle::{ParticleEmitSystem, ParticlePhysicsSystem, ParticleRenderSystem};
use crate::postprocess::PostProcessSystem;
use crate::shader::ShaderSourceProvider;
use crate::systems::{
    CameraSystem, DebugRenderSystem, FrustumCullSystem, InstancedMeshSystem, LineRenderSystem,
    LodSystem, MeshRenderSystem, SpriteRenderSystem, TrailSystem, TransformSystem, WorldUiSystem,
};
use ember_ecs::{Layer, LifetimeReaper, World};
use std::rc::Rc;

pub struct RenderPipeline {
    world: World,
    ctx: Rc<RenderCtx>,
}

impl RenderPipeline {
    /// Builds the pipeline over an already-current GL 3.3+ context.
    /// `sources` is the host's shader asset boundary (GLSL text at the
    /// fixed keys).
    pub fn new(gl_: Gl, sources: Rc<dyn ShaderSourceProvider>) -> RenderPipeline {
        let ctx = RenderCtx::new(gl_, sources);
        let mut world = World::new();

        // UPDATE, in priority order
        world.add_system(TransformSystem);
        world.add_system(LodSystem);
        world.add_system(FrustumCullSystem);
        world.add_system(TrailSystem);
        world.add_system(CameraSystem::new(Rc::clone(&ctx)));
        world.add_system(WorldUiSystem::new(Rc::clone(&ctx)));
        world.add_system(ParticleEmitSystem::new(Rc::clone(&ctx)));
        world.add_system(ParticlePhysicsSystem::new(Rc::clone(&ctx)));
        world.add_system(LifetimeReaper);

        // RENDER, in priority order
        world.add_system(InstancedMeshSystem::new(Rc::clone(&ctx)));
        world.add_system(MeshRenderSystem::new(Rc::clone(&ctx)));
        world.add_system(LineRenderSystem::new(Rc::clone(&ctx)));
        world.add_system(SpriteRenderSystem::new(Rc::clone(&ctx)));
        world.add_system(ParticleRenderSystem::new(Rc::clone(&ctx)));
        world.add_system(PostProcessSystem::new(Rc::clone(&ctx)));
        world.add_system(DebugRenderSystem::new(Rc::clone(&ctx)));

        RenderPipeline { world, ctx }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn ctx(&self) -> &Rc<RenderCtx> {
        &self.ctx
    }

    /// The host reports its drawable size whenever it changes; sprite
    /// projection, camera aspect and the bloom targets follow it.
    pub fn set_screen_size(&self, width: u32, height: u32) {
        self.ctx.screen_size.set((width, height));
    }

    //------------------------------------------------------------------
    // host event interface

    /// Scene pass: drives the WORLD_3D layer. `partial_tick` is the
    /// host's sub-frame interpolation factor, exposed to shaders that
    /// want it.
    pub fn on_scene_render(&mut self, dt_seconds: f32, partial_tick: f32) {
        self.ctx.partial_tick.set(partial_tick);
        self.world.update(Some(Layer::World3d), dt_seconds);
        self.world.render(Some(Layer::World3d));
    }

    /// Overlay pass: drives the HUD layer.
    pub fn on_overlay_render(&mut self, dt_seconds: f32) {
        self.world.update(Some(Layer::Hud), dt_seconds);
        self.world.render(Some(Layer::Hud));
    }

    /// GUI pass: drives the GUI layer.
    pub fn on_gui_render(&mut self, dt_seconds: f32) {
        self.world.update(Some(Layer::Gui), dt_seconds);
        self.world.render(Some(Layer::Gui));
    }

    pub fn on_dimension_change(&mut self, id: i32) {
        self.world.scene_mut().set_active_dimension(id);
    }

    /// Triggers SESSION-lifetime reaping on the next update.
    pub fn on_session_end(&mut self) {
        self.world.scene_mut().signal_session_end();
    }

    /// Per-frame 16x16 RGB lightmap from the host, sampled by lit
    /// WORLD_3D shaders.
    pub fn upload_lightmap(&self, rgb: &[u8]) {
        self.ctx.lightmap.upload(rgb);
    }

    /// Tears the scene down: destroys every entity (running disposals)
    /// and drops all cached GL resources.
    pub fn dispose(&mut self) {
        self.world.clear();
        self.ctx.dispose();
    }
}
