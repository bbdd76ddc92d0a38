//! Registration table mapping filter names to shader specs.

use crate::kind::FilterKind;
use flipbook_core::{Size, Transform};
use flipbook_gpu::UniformBlock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Vertex shader shared by every built-in filter.
pub const BASE_VERTEX: &str = "base_filter";

/// Name of the overlay compositing filter.
pub const ALPHA_BLEND: &str = "alpha_blend";

/// Shader names and uniform needs of one filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    /// Vertex shader name in the shader store.
    #[serde(default = "default_vertex")]
    pub vertex: String,
    /// Fragment shader name in the shader store.
    pub fragment: String,
    /// Receives elapsed time.
    #[serde(default)]
    pub uses_time: bool,
    /// Receives the output size in pixels.
    #[serde(default)]
    pub uses_resolution: bool,
    /// May hand frames through unchanged when its program is unavailable.
    #[serde(default)]
    pub passthrough_safe: bool,
}

fn default_vertex() -> String {
    BASE_VERTEX.to_string()
}

impl FilterSpec {
    /// Single-texture pass over the base vertex shader.
    pub fn new(fragment: impl Into<String>) -> Self {
        Self {
            vertex: default_vertex(),
            fragment: fragment.into(),
            uses_time: false,
            uses_resolution: false,
            passthrough_safe: false,
        }
    }

    pub fn with_time(mut self) -> Self {
        self.uses_time = true;
        self
    }

    pub fn with_resolution(mut self) -> Self {
        self.uses_resolution = true;
        self
    }

    pub fn passthrough_safe(mut self) -> Self {
        self.passthrough_safe = true;
        self
    }

    /// Uniform values for one draw. Inputs the filter does not consume are
    /// left zeroed.
    pub fn uniforms(&self, time: Duration, output: Size, transform: Option<Transform>) -> UniformBlock {
        UniformBlock::new(
            transform.unwrap_or(Transform::IDENTITY),
            if self.uses_resolution { output } else { Size::ZERO },
            if self.uses_time { time.as_secs_f32() } else { 0.0 },
        )
    }
}

/// Filter name to spec table, pre-filled with the built-ins.
#[derive(Debug, Clone)]
pub struct FilterRegistry {
    specs: HashMap<String, FilterSpec>,
}

impl FilterRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            specs: HashMap::new(),
        };
        for kind in FilterKind::ALL {
            if let Some(key) = kind.key() {
                registry.register(key, builtin_spec(kind));
            }
        }
        registry.register(ALPHA_BLEND, FilterSpec::new(ALPHA_BLEND));
        registry
    }

    /// Add or replace a filter.
    pub fn register(&mut self, name: impl Into<String>, spec: FilterSpec) {
        let name = name.into();
        tracing::debug!(name = %name, fragment = %spec.fragment, "Registered filter");
        self.specs.insert(name, spec);
    }

    pub fn get(&self, name: &str) -> Option<&FilterSpec> {
        self.specs.get(name)
    }

    /// Spec for a built-in kind. `Off` maps to the passthrough spec.
    pub fn spec_for(&self, kind: FilterKind) -> Option<&FilterSpec> {
        self.get(kind.key().unwrap_or("normal"))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.specs.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn builtin_spec(kind: FilterKind) -> FilterSpec {
    match kind {
        FilterKind::Passthrough | FilterKind::Off => FilterSpec::new("base_filter").passthrough_safe(),
        FilterKind::WavePool => FilterSpec::new("wave_pool").with_time(),
        FilterKind::Plasma => FilterSpec::new("plasma").with_time(),
        FilterKind::EmInterference => FilterSpec::new("em_interference").with_time(),
        FilterKind::Rgb => FilterSpec::new("rgb").with_time(),
        FilterKind::Lego => FilterSpec::new("lego").with_resolution(),
        FilterKind::Chroma => FilterSpec::new("chroma").with_time(),
        FilterKind::Rave => FilterSpec::new("rave").with_time().with_resolution(),
        FilterKind::MirrorTwo => FilterSpec::new("mirror_2").with_resolution(),
        FilterKind::MirrorFour => FilterSpec::new("mirror_4").with_resolution(),
        FilterKind::LightLeaks => FilterSpec::new("light_leaks").with_time(),
        FilterKind::Film => FilterSpec::new("film").with_time(),
        FilterKind::Grayscale => FilterSpec::new("grayscale"),
        FilterKind::Manga => FilterSpec::new("manga"),
        FilterKind::Toon => FilterSpec::new("toon"),
    }
}
