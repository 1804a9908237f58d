//! 2D texture wrapper and the host-fed lightmap.

use crate::api as gl;
use crate::api::types::*;
use crate::api::Gl;
use std::rc::Rc;

pub struct Texture2d {
    gl: Rc<Gl>,
    obj: GLuint,
    width: u32,
    height: u32,
}

impl Texture2d {
    /// Allocates from host-decoded RGBA8 pixels (texture decoding itself is
    /// the host's business).
    pub fn from_rgba8(gl_: &Rc<Gl>, width: u32, height: u32, pixels: &[u8]) -> Texture2d {
        debug_assert_eq!(pixels.len(), (width * height * 4) as usize);
        Texture2d::allocate(gl_, width, height, gl::RGBA8, gl::RGBA, Some(pixels))
    }

    /// 16x16 RGB block/sky lightmap storage, updated every frame by the
    /// host (see [`Lightmap`]).
    pub fn lightmap_storage(gl_: &Rc<Gl>) -> Texture2d {
        Texture2d::allocate(gl_, 16, 16, gl::RGB8, gl::RGB, None)
    }

    fn allocate(
        gl_: &Rc<Gl>,
        width: u32,
        height: u32,
        internal: GLenum,
        format: GLenum,
        pixels: Option<&[u8]>,
    ) -> Texture2d {
        let mut obj = 0;
        unsafe {
            let mut prev: GLint = 0;
            gl_.GetIntegerv(gl::TEXTURE_BINDING_2D, &mut prev);

            gl_.GenTextures(1, &mut obj);
            gl_.BindTexture(gl::TEXTURE_2D, obj);
            gl_.TexImage2D(
                gl::TEXTURE_2D,
                0,
                internal as GLint,
                width as GLsizei,
                height as GLsizei,
                0,
                format,
                gl::UNSIGNED_BYTE,
                pixels
                    .map(|p| p.as_ptr() as *const GLvoid)
                    .unwrap_or(std::ptr::null()),
            );
            gl_.TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_MIN_FILTER, gl::LINEAR as GLint);
            gl_.TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_MAG_FILTER, gl::LINEAR as GLint);
            gl_.TexParameteri(
                gl::TEXTURE_2D,
                gl::TEXTURE_WRAP_S,
                gl::CLAMP_TO_EDGE as GLint,
            );
            gl_.TexParameteri(
                gl::TEXTURE_2D,
                gl::TEXTURE_WRAP_T,
                gl::CLAMP_TO_EDGE as GLint,
            );

            gl_.BindTexture(gl::TEXTURE_2D, prev as GLuint);
        }
        Texture2d {
            gl: Rc::clone(gl_),
            obj,
            width,
            height,
        }
    }

    pub fn id(&self) -> GLuint {
        self.obj
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Overwrites a subregion; `pixels` is tightly packed in `format`.
    pub fn update(&self, x: u32, y: u32, width: u32, height: u32, format: GLenum, pixels: &[u8]) {
        unsafe {
            let mut prev: GLint = 0;
            let mut prev_alignment: GLint = 0;
            self.gl.GetIntegerv(gl::TEXTURE_BINDING_2D, &mut prev);
            self.gl.GetIntegerv(gl::UNPACK_ALIGNMENT, &mut prev_alignment);
            self.gl.BindTexture(gl::TEXTURE_2D, self.obj);
            self.gl.PixelStorei(gl::UNPACK_ALIGNMENT, 1);
            self.gl.TexSubImage2D(
                gl::TEXTURE_2D,
                0,
                x as GLint,
                y as GLint,
                width as GLsizei,
                height as GLsizei,
                format,
                gl::UNSIGNED_BYTE,
                pixels.as_ptr() as *const GLvoid,
            );
            self.gl.PixelStorei(gl::UNPACK_ALIGNMENT, prev_alignment);
            self.gl.BindTexture(gl::TEXTURE_2D, prev as GLuint);
        }
    }
}

impl Drop for Texture2d {
    fn drop(&mut self) {
        unsafe { self.gl.DeleteTextures(1, &self.obj) };
    }
}

impl std::fmt::Debug for Texture2d {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Texture2d")
            .field("obj", &self.obj)
            .field("size", &(self.width, self.height))
            .finish()
    }
}

/// The host's 16x16 RGB lightmap, sampled by lit WORLD_3D shaders by
/// (block light, sky light).
pub struct Lightmap {
    texture: Texture2d,
}

impl Lightmap {
    pub fn new(gl_: &Rc<Gl>) -> Lightmap {
        Lightmap {
            texture: Texture2d::lightmap_storage(gl_),
        }
    }

    /// Per-frame upload of the host's 16x16x3 byte grid.
    pub fn upload(&self, rgb: &[u8]) {
        debug_assert_eq!(rgb.len(), 16 * 16 * 3);
        self.texture.update(0, 0, 16, 16, gl::RGB, rgb);
    }

    pub fn texture(&self) -> &Texture2d {
        &self.texture
    }
}
