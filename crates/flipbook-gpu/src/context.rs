//! GPU context management.

use crate::texture_pool::{SharedTexturePool, TexturePool};
use flipbook_core::{FlipbookError, Result};
use std::sync::Arc;
use tracing::info;

/// Default memory budget for idle textures held by the cache.
pub const DEFAULT_TEXTURE_BUDGET: usize = 256 * 1024 * 1024;

/// GPU context holding device, queue and the texture cache shared by every
/// filter chain rendering on it.
pub struct GpuContext {
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    pub texture_pool: SharedTexturePool,
}

impl GpuContext {
    /// Create a new GPU context on the best available primary backend.
    pub async fn new() -> Result<Self> {
        Self::with_texture_budget(DEFAULT_TEXTURE_BUDGET).await
    }

    /// Create a context whose texture cache keeps at most `budget` bytes of
    /// idle textures.
    pub async fn with_texture_budget(budget: usize) -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| FlipbookError::Gpu("No suitable GPU adapter found".to_string()))?;

        info!("Using GPU adapter: {:?}", adapter.get_info());

        // Filters only sample and render 2D textures.
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Flipbook Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults()
                        .using_resolution(adapter.limits()),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await
            .map_err(|e| FlipbookError::Gpu(format!("Failed to create device: {}", e)))?;

        Ok(Self {
            instance,
            adapter,
            device: Arc::new(device),
            queue: Arc::new(queue),
            texture_pool: TexturePool::shared(budget),
        })
    }

    /// Create a new GPU context (blocking version).
    pub fn new_blocking() -> Result<Self> {
        pollster::block_on(Self::new())
    }

    /// Get adapter info.
    pub fn adapter_info(&self) -> wgpu::AdapterInfo {
        self.adapter.get_info()
    }
}
