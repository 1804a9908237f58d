//! Retained-mode OpenGL renderer over the ember ECS.
//!
//! Clients assemble scenes from entities and components (`Transform`,
//! `MeshRenderer`, `ParticleEmitter`, ...); a fixed set of deterministic
//! systems turns them into draw calls every frame. The renderer is a
//! guest inside a host application that owns the window and GL context:
//! every GL state change it makes is tracked by a scoped state stack and
//! unwound before control returns, so the host sees exactly the state it
//! left.
//!
//! Requires a 3.3 core context; particle simulation additionally uses
//! compute shaders and SSBOs when a 4.3 context provides them, with an
//! equivalent CPU fallback otherwise.

// OpenGL API (generated bindings)
mod api;
// runtime capability probe
mod caps;
// render-domain components
mod components;
// shared per-context state (caches, state stack, pool)
mod context;
// inspector dumps
pub mod debug;
mod error;
// offscreen color targets
mod framebuffer;
// AABBs, planes, frustum
mod geom;
mod material;
mod mesh;
// the particle engine
pub mod particle;
// host boundary
mod pipeline;
mod postprocess;
// typed reference-counted caches
pub mod resource;
mod shader;
// the scoped GL state stack
pub mod state;
// render pipeline systems
pub mod systems;
mod texture;

pub use api::Gl;
pub use caps::Capabilities;
pub use components::{
    Bounds, Camera, LineSegment, Lines, Lod, LodLevel, MeshRenderer, PostProcess, Projection,
    RenderQueue, Sprite, StaticFlags, Trail, Transform, Visibility, WorldSpaceUi,
};
pub use context::{MeshCache, RenderCtx, TextureCache};
pub use error::{RenderError, ResourceError};
pub use framebuffer::RenderTarget;
pub use geom::{Aabb, Frustum, Plane};
pub use material::{Material, MaterialCache, MaterialId};
pub use mesh::{GrowableBuffer, Mesh, MeshId, Vertex};
pub use pipeline::RenderPipeline;
pub use postprocess::PostProcessSystem;
pub use resource::{Handle, ResourceCache, ResourceKey, ResourceLoader};
pub use shader::{
    ShaderCache, ShaderProgram, ShaderSourceProvider, ShaderSources, ShaderStage,
    StaticShaderSources,
};
pub use state::{StateContext, StateKey, StateScope, StateStack, StateValue};
pub use texture::{Lightmap, Texture2d};

/// Commonly used names for hosts embedding the renderer.
pub mod prelude {
    pub use crate::components::*;
    pub use crate::particle::{
        EmitterShape, Force, ForceEntry, ParticleBlend, ParticleBuffer, ParticleEmitter,
        ParticleRender, ParticleState,
    };
    pub use crate::RenderPipeline;
    pub use ember_ecs::prelude::*;
}
