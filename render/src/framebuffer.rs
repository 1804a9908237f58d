//! Offscreen color targets for the post-process chain.

use crate::api as gl;
use crate::api::types::*;
use crate::api::Gl;
use crate::error::RenderError;
use std::rc::Rc;

/// A framebuffer with a single color attachment. The post-process chain
/// ping-pongs between two of these; scene depth stays with the host.
pub struct RenderTarget {
    gl: Rc<Gl>,
    fbo: GLuint,
    color: GLuint,
    width: u32,
    height: u32,
}

impl RenderTarget {
    pub fn new(gl_: &Rc<Gl>, width: u32, height: u32) -> Result<RenderTarget, RenderError> {
        let mut fbo = 0;
        let mut color = 0;
        unsafe {
            let mut prev_fbo: GLint = 0;
            let mut prev_tex: GLint = 0;
            gl_.GetIntegerv(gl::DRAW_FRAMEBUFFER_BINDING, &mut prev_fbo);
            gl_.GetIntegerv(gl::TEXTURE_BINDING_2D, &mut prev_tex);

            gl_.GenTextures(1, &mut color);
            gl_.BindTexture(gl::TEXTURE_2D, color);
            // half-float so the bright pass keeps >1.0 energy
            gl_.TexImage2D(
                gl::TEXTURE_2D,
                0,
                gl::RGBA16F as GLint,
                width as GLsizei,
                height as GLsizei,
                0,
                gl::RGBA,
                gl::FLOAT,
                std::ptr::null(),
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

            gl_.GenFramebuffers(1, &mut fbo);
            gl_.BindFramebuffer(gl::DRAW_FRAMEBUFFER, fbo);
            gl_.FramebufferTexture2D(
                gl::DRAW_FRAMEBUFFER,
                gl::COLOR_ATTACHMENT0,
                gl::TEXTURE_2D,
                color,
                0,
            );
            let status = gl_.CheckFramebufferStatus(gl::DRAW_FRAMEBUFFER);

            gl_.BindFramebuffer(gl::DRAW_FRAMEBUFFER, prev_fbo as GLuint);
            gl_.BindTexture(gl::TEXTURE_2D, prev_tex as GLuint);

            if status != gl::FRAMEBUFFER_COMPLETE {
                gl_.DeleteFramebuffers(1, &fbo);
                gl_.DeleteTextures(1, &color);
                return Err(RenderError::BufferInit(format!(
                    "framebuffer incomplete: 0x{:x}",
                    status
                )));
            }
        }
        Ok(RenderTarget {
            gl: Rc::clone(gl_),
            fbo,
            color,
            width,
            height,
        })
    }

    pub fn fbo(&self) -> GLuint {
        self.fbo
    }

    pub fn color_texture(&self) -> GLuint {
        self.color
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl Drop for RenderTarget {
    fn drop(&mut self) {
        unsafe {
            self.gl.DeleteFramebuffers(1, &self.fbo);
            self.gl.DeleteTextures(1, &self.color);
        }
    }
}
