//! Runtime capability probe.
//!
//! The pipeline requires a 3.3 core context. GPU particle simulation
//! additionally needs compute shaders and SSBOs (4.3); when those are
//! absent the particle engine silently falls back to its CPU path.

use crate::api as gl;
use crate::api::Gl;
use std::ffi::CStr;
use std::os::raw::c_char;

#[derive(Copy, Clone, Debug)]
pub struct Capabilities {
    pub major: i32,
    pub minor: i32,
    pub compute_shaders: bool,
    pub shader_storage: bool,
    pub max_texture_units: i32,
}

impl Capabilities {
    pub fn probe(gl: &Gl) -> Capabilities {
        let mut major = 0;
        let mut minor = 0;
        let mut max_texture_units = 0;
        unsafe {
            gl.GetIntegerv(gl::MAJOR_VERSION, &mut major);
            gl.GetIntegerv(gl::MINOR_VERSION, &mut minor);
            gl.GetIntegerv(gl::MAX_COMBINED_TEXTURE_IMAGE_UNITS, &mut max_texture_units);

            let vendor = read_gl_string(gl, gl::VENDOR);
            let renderer = read_gl_string(gl, gl::RENDERER);
            log::debug!(
                "OpenGL {}.{} (vendor: {}, renderer: {})",
                major,
                minor,
                vendor,
                renderer
            );
        }

        let at_least_43 = (major, minor) >= (4, 3);
        // the entry points themselves must have resolved too; a 3.3 context
        // leaves them unloaded even when the driver could do more
        let compute_shaders =
            at_least_43 && gl.DispatchCompute.is_loaded() && gl.MemoryBarrier.is_loaded();
        let shader_storage = at_least_43 && gl.BindBufferBase.is_loaded();

        if !compute_shaders {
            log::debug!("compute shaders unavailable, particle simulation will run on the CPU");
        }

        Capabilities {
            major,
            minor,
            compute_shaders,
            shader_storage,
            max_texture_units,
        }
    }

    /// GPU particle path needs both compute dispatch and SSBO bindings.
    pub fn supports_gpu_particles(&self) -> bool {
        self.compute_shaders && self.shader_storage
    }
}

unsafe fn read_gl_string(gl: &Gl, name: gl::types::GLenum) -> String {
    let ptr = gl.GetString(name);
    if ptr.is_null() {
        return String::from("unknown");
    }
    CStr::from_ptr(ptr as *const c_char)
        .to_string_lossy()
        .into_owned()
}
