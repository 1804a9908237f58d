//! Generated OpenGL 4.3 core bindings (see build.rs).

#![allow(
    clippy::all,
    bad_style,
    missing_docs,
    unused,
    missing_copy_implementations
)]

include!(concat!(env!("OUT_DIR"), "/gl_bindings.rs"));
