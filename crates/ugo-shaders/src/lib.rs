//! Shaders for ugo-vk.
//!
//! GLSL sources live in `shaders/` and are compiled to SPIR-V at build time
//! using shaderc. The binaries are loaded from disk at runtime.

use std::path::{Path, PathBuf};

/// Directory holding the compiled `.spv` files.
pub fn spirv_dir() -> &'static Path {
    Path::new(env!("OUT_DIR"))
}

/// Compiled triangle vertex shader.
pub fn triangle_vertex() -> PathBuf {
    spirv_dir().join("tri.vert.spv")
}

/// Compiled triangle fragment shader.
pub fn triangle_fragment() -> PathBuf {
    spirv_dir().join("tri.frag.spv")
}
