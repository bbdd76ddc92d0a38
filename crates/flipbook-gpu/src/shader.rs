//! Shader source lookup.
//!
//! Filter stages name their shaders; a [`ShaderStore`] turns names into WGSL
//! text. A name the store does not know is not an error here. The stage that
//! asked simply never gets a program.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

/// Pipeline stage a shader source belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderKind {
    Vertex,
    Fragment,
}

impl ShaderKind {
    /// File extension used by [`DirectoryShaderStore`].
    pub fn extension(self) -> &'static str {
        match self {
            Self::Vertex => "vert.wgsl",
            Self::Fragment => "frag.wgsl",
        }
    }
}

/// WGSL for one program. The vertex entry point is `vs_main`, the fragment
/// entry point `fs_main`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource {
    pub vertex: String,
    pub fragment: String,
}

impl ShaderSource {
    pub fn new(vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            vertex: vertex.into(),
            fragment: fragment.into(),
        }
    }

    /// Look up a vertex and a fragment shader by name.
    pub fn resolve(store: &dyn ShaderStore, vertex: &str, fragment: &str) -> Option<Self> {
        let vertex_src = store.source(vertex, ShaderKind::Vertex)?;
        let fragment_src = store.source(fragment, ShaderKind::Fragment)?;
        Some(Self::new(vertex_src, fragment_src))
    }
}

/// Resolves shader names to source text.
pub trait ShaderStore: Send + Sync {
    fn source(&self, name: &str, kind: ShaderKind) -> Option<String>;
}

/// Reads `<name>.vert.wgsl` and `<name>.frag.wgsl` from a directory.
#[derive(Debug, Clone)]
pub struct DirectoryShaderStore {
    root: PathBuf,
}

impl DirectoryShaderStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ShaderStore for DirectoryShaderStore {
    fn source(&self, name: &str, kind: ShaderKind) -> Option<String> {
        let path = self.root.join(format!("{}.{}", name, kind.extension()));
        match fs::read_to_string(&path) {
            Ok(source) => Some(source),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Shader source unavailable");
                None
            }
        }
    }
}

/// In-memory name to source map.
#[derive(Debug, Clone, Default)]
pub struct MemoryShaderStore {
    sources: HashMap<(String, ShaderKind), String>,
}

impl MemoryShaderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, kind: ShaderKind, source: impl Into<String>) {
        self.sources.insert((name.into(), kind), source.into());
    }

    pub fn with(mut self, name: impl Into<String>, kind: ShaderKind, source: impl Into<String>) -> Self {
        self.insert(name, kind, source);
        self
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl ShaderStore for MemoryShaderStore {
    fn source(&self, name: &str, kind: ShaderKind) -> Option<String> {
        self.sources.get(&(name.to_string(), kind)).cloned()
    }
}
