//! Flipbook GPU - wgpu rendering for filter passes
//!
//! Provides the GPU context, the per-context texture cache, shader source
//! stores and the render backend that filter stages draw through.

pub mod backend;
pub mod context;
pub mod shader;
pub mod texture;
pub mod texture_pool;

pub use backend::{
    check_texture_size, DrawPass, ProgramId, RenderBackend, SharedBackend, UniformBlock, WgpuBackend,
};
pub use context::GpuContext;
pub use shader::{DirectoryShaderStore, MemoryShaderStore, ShaderKind, ShaderSource, ShaderStore};
pub use texture::GpuTexture;
pub use texture_pool::{SharedTexturePool, TexturePool};
