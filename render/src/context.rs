//! Shared render context.
//!
//! One [`RenderCtx`] per graphics context, created by the pipeline and
//! cloned (via `Rc`) into every render system at construction. Systems
//! reach GL, the state stack and the resource caches through it; the world
//! itself stays graphics-agnostic.

use crate::api::Gl;
use crate::caps::Capabilities;
use crate::error::ResourceError;
use crate::material::{material_cache, MaterialCache};
use crate::mesh::Mesh;
use crate::particle::pool::ParticlePool;
use crate::resource::{ResourceCache, ResourceKey};
use crate::shader::{ShaderCache, ShaderProgramLoader, ShaderSourceProvider};
use crate::state::StateStack;
use crate::texture::{Lightmap, Texture2d};
use fxhash::FxHashSet;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Loader for the built-in primitive meshes; anything else is inserted by
/// the host.
pub struct MeshLoader {
    gl: Rc<Gl>,
}

impl crate::resource::ResourceLoader<Mesh> for MeshLoader {
    fn load(&self, key: &ResourceKey) -> Result<Mesh, ResourceError> {
        match key.path() {
            "quad" => Ok(Mesh::quad(&self.gl)),
            "cube" => Ok(Mesh::cube(&self.gl)),
            "tetrahedron" => Ok(Mesh::tetrahedron(&self.gl)),
            "octahedron" => Ok(Mesh::octahedron(&self.gl)),
            "icosahedron" => Ok(Mesh::icosahedron(&self.gl)),
            other => Err(ResourceError::LoadFailed(format!(
                "no built-in mesh named {}",
                other
            ))),
        }
    }
}

/// Loader for built-in textures; decoded image data is inserted by the
/// host (decoding is outside the core).
pub struct TextureLoader {
    gl: Rc<Gl>,
}

impl crate::resource::ResourceLoader<Texture2d> for TextureLoader {
    fn load(&self, key: &ResourceKey) -> Result<Texture2d, ResourceError> {
        match key.path() {
            "white" => Ok(Texture2d::from_rgba8(&self.gl, 1, 1, &[255, 255, 255, 255])),
            other => Err(ResourceError::LoadFailed(format!(
                "texture {} must be inserted by the host",
                other
            ))),
        }
    }
}

pub type MeshCache = ResourceCache<Mesh, MeshLoader>;
pub type TextureCache = ResourceCache<Texture2d, TextureLoader>;

pub struct RenderCtx {
    pub gl: Rc<Gl>,
    pub caps: Capabilities,
    pub state: RefCell<StateStack>,
    pub shaders: ShaderCache,
    pub meshes: MeshCache,
    pub textures: TextureCache,
    pub materials: MaterialCache,
    pub lightmap: Lightmap,
    /// Shared pool of particle buffer backings. `Rc` so disposed
    /// ParticleBuffer components can return their backing to it.
    pub particles: Rc<RefCell<ParticlePool>>,
    pub screen_size: Cell<(u32, u32)>,
    /// Host sub-frame interpolation factor for the current scene pass.
    pub partial_tick: Cell<f32>,
    /// Toggles the debug wireframe pass.
    pub debug_draw: Cell<bool>,
    warned: RefCell<FxHashSet<String>>,
}

impl RenderCtx {
    pub fn new(gl_: Gl, sources: Rc<dyn ShaderSourceProvider>) -> Rc<RenderCtx> {
        let gl_ = Rc::new(gl_);
        let caps = Capabilities::probe(&gl_);
        let lightmap = Lightmap::new(&gl_);
        Rc::new(RenderCtx {
            caps,
            state: RefCell::new(StateStack::new()),
            shaders: ResourceCache::new(
                "shaders",
                ShaderProgramLoader {
                    gl: Rc::clone(&gl_),
                    provider: sources,
                },
                false,
            ),
            meshes: ResourceCache::new(
                "meshes",
                MeshLoader {
                    gl: Rc::clone(&gl_),
                },
                false,
            ),
            textures: ResourceCache::new(
                "textures",
                TextureLoader {
                    gl: Rc::clone(&gl_),
                },
                false,
            ),
            materials: material_cache(),
            lightmap,
            particles: Rc::new(RefCell::new(ParticlePool::new())),
            screen_size: Cell::new((1, 1)),
            partial_tick: Cell::new(0.0),
            debug_draw: Cell::new(false),
            warned: RefCell::new(FxHashSet::default()),
            gl: gl_,
        })
    }

    /// Logs `message` at warn level the first time `key` is seen; repeat
    /// offenders (a mesh that stays disposed, a shader that will not
    /// compile) stay quiet.
    pub fn warn_once(&self, key: &str, message: &str) {
        if self.warned.borrow_mut().insert(key.to_string()) {
            log::warn!("{}", message);
        }
    }

    /// Drops every cached GL resource. Outstanding handles turn invalid.
    pub fn dispose(&self) {
        self.shaders.dispose();
        self.meshes.dispose();
        self.textures.dispose();
        self.materials.dispose();
    }
}
