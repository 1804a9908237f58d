//! Shader compilation, linking and the program cache.
//!
//! The host provides GLSL source text at fixed keys (`core/world3d`,
//! `particle/particle_update:compute`, ...); the renderer compiles, links
//! and caches programs behind resource handles. Uniform locations are
//! resolved lazily and memoized per program; setting a uniform the program
//! does not have is silently ignored (location -1), matching driver
//! behaviour.

use crate::api as gl;
use crate::api::types::*;
use crate::api::Gl;
use crate::error::{RenderError, ResourceError};
use crate::resource::{ResourceCache, ResourceKey, ResourceLoader};
use fxhash::FxHashMap;
use nalgebra_glm::{Mat4, Vec2, Vec3, Vec4};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Geometry,
    Compute,
}

fn stage_to_gl(stage: ShaderStage) -> GLenum {
    match stage {
        ShaderStage::Vertex => gl::VERTEX_SHADER,
        ShaderStage::Fragment => gl::FRAGMENT_SHADER,
        ShaderStage::Geometry => gl::GEOMETRY_SHADER,
        ShaderStage::Compute => gl::COMPUTE_SHADER,
    }
}

/// GLSL source set for one program key.
#[derive(Clone, Debug, Default)]
pub struct ShaderSources {
    pub vertex: Option<String>,
    pub fragment: Option<String>,
    pub geometry: Option<String>,
    pub compute: Option<String>,
}

impl ShaderSources {
    pub fn graphics(vertex: &str, fragment: &str) -> ShaderSources {
        ShaderSources {
            vertex: Some(vertex.to_string()),
            fragment: Some(fragment.to_string()),
            ..Default::default()
        }
    }

    pub fn compute(source: &str) -> ShaderSources {
        ShaderSources {
            compute: Some(source.to_string()),
            ..Default::default()
        }
    }
}

/// Host-side asset boundary: shader source text by key.
pub trait ShaderSourceProvider {
    fn source(&self, key: &str) -> Option<ShaderSources>;
}

/// Simple provider backed by a map; what hosts and tests register into.
#[derive(Default)]
pub struct StaticShaderSources {
    sources: FxHashMap<String, ShaderSources>,
}

impl StaticShaderSources {
    pub fn new() -> StaticShaderSources {
        StaticShaderSources::default()
    }

    pub fn register(&mut self, key: &str, sources: ShaderSources) {
        self.sources.insert(key.to_string(), sources);
    }
}

impl ShaderSourceProvider for StaticShaderSources {
    fn source(&self, key: &str) -> Option<ShaderSources> {
        self.sources.get(key).cloned()
    }
}

fn shader_info_log(gl_: &Gl, obj: GLuint) -> String {
    unsafe {
        let mut log_size: GLint = 0;
        gl_.GetShaderiv(obj, gl::INFO_LOG_LENGTH, &mut log_size);
        let mut log_buf: Vec<u8> = vec![0; log_size.max(1) as usize];
        let mut written: GLsizei = 0;
        gl_.GetShaderInfoLog(obj, log_buf.len() as GLsizei, &mut written, log_buf.as_mut_ptr() as *mut GLchar);
        log_buf.truncate(written.max(0) as usize);
        String::from_utf8_lossy(&log_buf).into_owned()
    }
}

fn program_info_log(gl_: &Gl, obj: GLuint) -> String {
    unsafe {
        let mut log_size: GLint = 0;
        gl_.GetProgramiv(obj, gl::INFO_LOG_LENGTH, &mut log_size);
        let mut log_buf: Vec<u8> = vec![0; log_size.max(1) as usize];
        let mut written: GLsizei = 0;
        gl_.GetProgramInfoLog(obj, log_buf.len() as GLsizei, &mut written, log_buf.as_mut_ptr() as *mut GLchar);
        log_buf.truncate(written.max(0) as usize);
        String::from_utf8_lossy(&log_buf).into_owned()
    }
}

fn compile_stage(gl_: &Gl, key: &str, stage: ShaderStage, source: &str) -> Result<GLuint, RenderError> {
    unsafe {
        let obj = gl_.CreateShader(stage_to_gl(stage));
        let ptr = source.as_ptr() as *const GLchar;
        let len = source.len() as GLint;
        gl_.ShaderSource(obj, 1, &ptr, &len);
        gl_.CompileShader(obj);
        let mut status: GLint = 0;
        gl_.GetShaderiv(obj, gl::COMPILE_STATUS, &mut status);
        if status != gl::TRUE as GLint {
            let log = shader_info_log(gl_, obj);
            gl_.DeleteShader(obj);
            return Err(RenderError::ShaderCompile {
                key: key.to_string(),
                log,
            });
        }
        Ok(obj)
    }
}

/// A linked GL program plus its memoized uniform locations.
pub struct ShaderProgram {
    gl: Rc<Gl>,
    key: String,
    obj: GLuint,
    uniforms: RefCell<FxHashMap<String, GLint>>,
}

impl ShaderProgram {
    pub fn from_sources(gl_: &Rc<Gl>, key: &str, sources: &ShaderSources) -> Result<ShaderProgram, RenderError> {
        let mut stages: Vec<GLuint> = Vec::new();
        let mut push = |stage: ShaderStage, src: &Option<String>| -> Result<(), RenderError> {
            if let Some(src) = src {
                stages.push(compile_stage(gl_, key, stage, src)?);
            }
            Ok(())
        };
        push(ShaderStage::Vertex, &sources.vertex)?;
        push(ShaderStage::Fragment, &sources.fragment)?;
        push(ShaderStage::Geometry, &sources.geometry)?;
        push(ShaderStage::Compute, &sources.compute)?;

        if stages.is_empty() {
            return Err(RenderError::MissingShaderSource {
                key: key.to_string(),
            });
        }

        unsafe {
            let obj = gl_.CreateProgram();
            for stage in &stages {
                gl_.AttachShader(obj, *stage);
            }
            gl_.LinkProgram(obj);
            // shaders are owned by the program from here on
            for stage in stages {
                gl_.DeleteShader(stage);
            }
            let mut status: GLint = 0;
            gl_.GetProgramiv(obj, gl::LINK_STATUS, &mut status);
            if status != gl::TRUE as GLint {
                let log = program_info_log(gl_, obj);
                gl_.DeleteProgram(obj);
                return Err(RenderError::ShaderLink {
                    key: key.to_string(),
                    log,
                });
            }
            log::debug!("linked shader {}", key);
            Ok(ShaderProgram {
                gl: Rc::clone(gl_),
                key: key.to_string(),
                obj,
                uniforms: RefCell::new(FxHashMap::default()),
            })
        }
    }

    pub fn id(&self) -> GLuint {
        self.obj
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Lazily resolved uniform location; -1 for uniforms the program does
    /// not expose (GL ignores writes to -1).
    pub fn uniform_location(&self, name: &str) -> GLint {
        if let Some(loc) = self.uniforms.borrow().get(name) {
            return *loc;
        }
        let cname = std::ffi::CString::new(name).unwrap_or_default();
        let loc = unsafe { self.gl.GetUniformLocation(self.obj, cname.as_ptr()) };
        self.uniforms.borrow_mut().insert(name.to_string(), loc);
        loc
    }

    // uniform setters assume the program is currently bound

    pub fn set_mat4(&self, name: &str, value: &Mat4) {
        let loc = self.uniform_location(name);
        unsafe {
            self.gl
                .UniformMatrix4fv(loc, 1, gl::FALSE, value.as_slice().as_ptr())
        };
    }

    pub fn set_vec2(&self, name: &str, value: &Vec2) {
        let loc = self.uniform_location(name);
        unsafe { self.gl.Uniform2f(loc, value.x, value.y) };
    }

    pub fn set_vec3(&self, name: &str, value: &Vec3) {
        let loc = self.uniform_location(name);
        unsafe { self.gl.Uniform3f(loc, value.x, value.y, value.z) };
    }

    pub fn set_vec4(&self, name: &str, value: &Vec4) {
        let loc = self.uniform_location(name);
        unsafe { self.gl.Uniform4f(loc, value.x, value.y, value.z, value.w) };
    }

    pub fn set_f32(&self, name: &str, value: f32) {
        let loc = self.uniform_location(name);
        unsafe { self.gl.Uniform1f(loc, value) };
    }

    pub fn set_i32(&self, name: &str, value: i32) {
        let loc = self.uniform_location(name);
        unsafe { self.gl.Uniform1i(loc, value) };
    }
}

impl Drop for ShaderProgram {
    fn drop(&mut self) {
        unsafe { self.gl.DeleteProgram(self.obj) };
    }
}

impl std::fmt::Debug for ShaderProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("ShaderProgram")
            .field("key", &self.key)
            .field("obj", &self.obj)
            .finish()
    }
}

/// Loader compiling programs from the host's source provider. Carries the
/// GL handle, so shader caches live on the render thread.
pub struct ShaderProgramLoader {
    pub gl: Rc<Gl>,
    pub provider: Rc<dyn ShaderSourceProvider>,
}

impl ResourceLoader<ShaderProgram> for ShaderProgramLoader {
    fn load(&self, key: &ResourceKey) -> Result<ShaderProgram, ResourceError> {
        let sources = self
            .provider
            .source(key.full())
            .ok_or_else(|| ResourceError::LoadFailed(format!("no source for {}", key.full())))?;
        ShaderProgram::from_sources(&self.gl, key.full(), &sources)
            .map_err(|err| ResourceError::LoadFailed(err.to_string()))
    }
}

/// Program cache keyed by the fixed shader keys.
pub type ShaderCache = ResourceCache<ShaderProgram, ShaderProgramLoader>;
