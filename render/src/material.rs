//! Materials: a shader key plus the uniform/texture inputs of a draw.

use crate::error::ResourceError;
use crate::resource::{Handle, ResourceCache, ResourceKey};
use crate::shader::ShaderProgram;
use crate::texture::Texture2d;
use nalgebra_glm::{Vec3, Vec4};
use std::sync::atomic::{AtomicU64, Ordering};

/// Stable identity used to group and sort draws by material.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct MaterialId(u64);

static NEXT_MATERIAL_ID: AtomicU64 = AtomicU64::new(1);

pub struct Material {
    id: MaterialId,
    /// Shader cache key, e.g. `core/world3d` or `core/world3d_lit`.
    pub shader_key: String,
    pub base_color: Vec4,
    pub metallic: f32,
    pub roughness: f32,
    pub emissive: Vec3,
    pub texture: Option<Handle<Texture2d>>,
    /// Lit materials sample the host lightmap.
    pub lit: bool,
    pub double_sided: bool,
}

impl Material {
    pub fn new(shader_key: &str) -> Material {
        Material {
            id: MaterialId(NEXT_MATERIAL_ID.fetch_add(1, Ordering::Relaxed)),
            shader_key: shader_key.to_string(),
            base_color: Vec4::new(1.0, 1.0, 1.0, 1.0),
            metallic: 0.0,
            roughness: 1.0,
            emissive: Vec3::zeros(),
            texture: None,
            lit: false,
            double_sided: false,
        }
    }

    pub fn id(&self) -> MaterialId {
        self.id
    }

    /// Pushes the material's values into a bound program.
    pub fn apply_uniforms(&self, program: &ShaderProgram) {
        program.set_vec4("u_base_color", &self.base_color);
        program.set_f32("u_metallic", self.metallic);
        program.set_f32("u_roughness", self.roughness);
        program.set_vec3("u_emissive", &self.emissive);
        program.set_i32("u_texture", 0);
        if self.lit {
            program.set_i32("u_lightmap", 1);
        }
        program.set_i32("u_has_texture", self.texture.is_some() as i32);
    }
}

impl std::fmt::Debug for Material {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Material")
            .field("id", &self.id)
            .field("shader", &self.shader_key)
            .finish()
    }
}

fn builtin_material(key: &ResourceKey) -> Result<Material, ResourceError> {
    match key.path() {
        "default" => Ok(Material::new("core/world3d")),
        "default_lit" => {
            let mut material = Material::new("core/world3d_lit");
            material.lit = true;
            Ok(material)
        }
        other => Err(ResourceError::LoadFailed(format!(
            "unknown material {}",
            other
        ))),
    }
}

/// Material cache. Hosts insert authored materials; the loader only knows
/// the two built-ins (`material:default`, `material:default_lit`).
pub type MaterialCache =
    ResourceCache<Material, fn(&ResourceKey) -> Result<Material, ResourceError>>;

pub fn material_cache() -> MaterialCache {
    ResourceCache::new("materials", builtin_material, false)
}
