//! Builds stages and chains from filter kinds.

use crate::chain::FilterChain;
use crate::kind::FilterKind;
use crate::registry::{FilterRegistry, ALPHA_BLEND};
use crate::shaders::BuiltinShaders;
use crate::stage::FilterStage;
use flipbook_core::{FlipbookError, Result, SharedFrameBuffer};
use flipbook_gpu::{ShaderStore, SharedBackend};
use std::sync::Arc;

/// Creates filter stages bound to one backend and shader store.
pub struct FilterFactory {
    backend: SharedBackend,
    shaders: Arc<dyn ShaderStore>,
    registry: FilterRegistry,
}

impl FilterFactory {
    /// Factory over the built-in shaders and filters.
    pub fn new(backend: SharedBackend) -> Self {
        Self::with_shaders(backend, Arc::new(BuiltinShaders))
    }

    pub fn with_shaders(backend: SharedBackend, shaders: Arc<dyn ShaderStore>) -> Self {
        Self {
            backend,
            shaders,
            registry: FilterRegistry::new(),
        }
    }

    pub fn with_registry(mut self, registry: FilterRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> &FilterRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut FilterRegistry {
        &mut self.registry
    }

    /// Stage for a built-in kind. [`FilterKind::Off`] yields the passthrough
    /// stage.
    pub fn create_stage(&self, kind: FilterKind) -> Result<FilterStage> {
        self.create_custom(kind.key().unwrap_or("normal"))
    }

    /// Stage for any registered filter name.
    pub fn create_custom(&self, name: &str) -> Result<FilterStage> {
        let spec = self
            .registry
            .get(name)
            .ok_or_else(|| FlipbookError::NotFound(format!("filter {}", name)))?;
        Ok(FilterStage::new(name, spec.clone(), &self.backend, Arc::clone(&self.shaders)))
    }

    /// Alpha-blend stage compositing `overlay` over its input.
    pub fn create_overlay_stage(&self, overlay: SharedFrameBuffer) -> Result<FilterStage> {
        Ok(self.create_custom(ALPHA_BLEND)?.with_overlay(overlay))
    }

    /// Chain of the base passthrough, then `kind` when it changes the image,
    /// then one alpha-blend stage per overlay in order.
    pub fn create_chain(&self, kind: FilterKind, overlays: Vec<SharedFrameBuffer>) -> Result<FilterChain> {
        let mut stages = Vec::with_capacity(2 + overlays.len());
        stages.push(self.create_stage(FilterKind::Passthrough)?);
        if kind.filter_applied() {
            stages.push(self.create_stage(kind)?);
        }
        for overlay in overlays {
            stages.push(self.create_overlay_stage(overlay)?);
        }

        tracing::debug!(
            filter = kind.key().unwrap_or("off"),
            stages = stages.len(),
            "Created filter chain"
        );
        Ok(FilterChain::new(stages))
    }
}

impl std::fmt::Debug for FilterFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterFactory")
            .field("filters", &self.registry.len())
            .finish()
    }
}
