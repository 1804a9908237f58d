//! Error types for the render crate.

use std::{error, fmt};

/// Errors raised while building GL-side objects.
#[derive(Clone, Debug)]
pub enum RenderError {
    /// GLSL compilation failed; carries the driver's info log.
    ShaderCompile { key: String, log: String },
    /// Program link failed; carries the driver's info log.
    ShaderLink { key: String, log: String },
    /// The host's source provider has nothing registered at this key.
    MissingShaderSource { key: String },
    /// A buffer allocation or mapping failed.
    BufferInit(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RenderError::ShaderCompile { key, log } => {
                write!(f, "shader {} failed to compile: {}", key, log)
            }
            RenderError::ShaderLink { key, log } => {
                write!(f, "shader {} failed to link: {}", key, log)
            }
            RenderError::MissingShaderSource { key } => {
                write!(f, "no shader source registered for {}", key)
            }
            RenderError::BufferInit(msg) => write!(f, "buffer initialization failed: {}", msg),
        }
    }
}

impl error::Error for RenderError {}

/// Errors surfaced by the resource manager.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResourceError {
    /// The handle's slot has been invalidated by `dispose()`.
    Invalid,
    /// A loader failed to produce the resource.
    LoadFailed(String),
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ResourceError::Invalid => write!(f, "resource handle is invalidated"),
            ResourceError::LoadFailed(msg) => write!(f, "resource load failed: {}", msg),
        }
    }
}

impl error::Error for ResourceError {}
