//! GPU texture cache.
//!
//! Filter passes never keep textures between calls. They check textures out
//! of this pool for one draw and hand them back, so the pool is the only
//! long-lived texture resource per context. Textures are keyed by
//! (width, height, format, usage).

use crate::texture::GpuTexture;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Pool shared by every backend created on one GPU context.
pub type SharedTexturePool = Arc<Mutex<TexturePool>>;

/// Key for pooled textures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct TextureKey {
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
    usage: wgpu::TextureUsages,
}

impl TextureKey {
    fn of(texture: &GpuTexture) -> Self {
        Self {
            width: texture.width,
            height: texture.height,
            format: texture.format,
            usage: texture.usage,
        }
    }
}

/// Pool of reusable GPU textures.
pub struct TexturePool {
    /// Available (free) textures.
    free: HashMap<TextureKey, Vec<GpuTexture>>,
    /// Total memory used by free textures.
    total_memory: usize,
    /// Maximum memory budget for free textures.
    max_memory: usize,
    /// Textures handed out and not yet returned.
    checked_out: usize,
}

impl TexturePool {
    /// Create a new texture pool with the given memory budget.
    pub fn new(max_memory: usize) -> Self {
        Self {
            free: HashMap::new(),
            total_memory: 0,
            max_memory,
            checked_out: 0,
        }
    }

    /// Create a pool ready to be injected into render backends.
    pub fn shared(max_memory: usize) -> SharedTexturePool {
        Arc::new(Mutex::new(Self::new(max_memory)))
    }

    /// Acquire a texture from the pool or create a new one.
    pub fn acquire(
        &mut self,
        device: &wgpu::Device,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> GpuTexture {
        let key = TextureKey {
            width,
            height,
            format,
            usage,
        };
        self.checked_out += 1;

        if let Some(tex) = self.free.get_mut(&key).and_then(Vec::pop) {
            self.total_memory -= tex.memory_size();
            return tex;
        }

        tracing::debug!(width, height, ?format, "Allocating pooled texture");
        GpuTexture::new(device, width, height, format, usage, Some("Pooled Texture"))
    }

    /// Return a texture to the pool for reuse.
    pub fn release(&mut self, texture: GpuTexture) {
        self.checked_out = self.checked_out.saturating_sub(1);
        let mem = texture.memory_size();

        // Over budget: drop it instead.
        if self.total_memory + mem > self.max_memory {
            return;
        }

        self.total_memory += mem;
        self.free.entry(TextureKey::of(&texture)).or_default().push(texture);
    }

    /// Total memory used by pooled (free) textures.
    pub fn memory_usage(&self) -> usize {
        self.total_memory
    }

    /// Number of free textures in the pool.
    pub fn texture_count(&self) -> usize {
        self.free.values().map(|v| v.len()).sum()
    }

    /// Number of textures acquired and not yet released.
    pub fn checked_out(&self) -> usize {
        self.checked_out
    }
}
