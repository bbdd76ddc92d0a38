//! WGSL sources for the built-in filters, compiled into the binary.

use flipbook_gpu::{ShaderKind, ShaderStore};

const UNIFORMS: &str = include_str!("../shaders/uniforms.wgsl");
const COMMON: &str = include_str!("../shaders/common.wgsl");

const VERTEX: &[(&str, &str)] = &[("base_filter", include_str!("../shaders/base_filter.vert.wgsl"))];

const FRAGMENT: &[(&str, &str)] = &[
    ("base_filter", include_str!("../shaders/base_filter.frag.wgsl")),
    ("wave_pool", include_str!("../shaders/wave_pool.frag.wgsl")),
    ("plasma", include_str!("../shaders/plasma.frag.wgsl")),
    ("em_interference", include_str!("../shaders/em_interference.frag.wgsl")),
    ("rgb", include_str!("../shaders/rgb.frag.wgsl")),
    ("lego", include_str!("../shaders/lego.frag.wgsl")),
    ("chroma", include_str!("../shaders/chroma.frag.wgsl")),
    ("rave", include_str!("../shaders/rave.frag.wgsl")),
    ("mirror_2", include_str!("../shaders/mirror_2.frag.wgsl")),
    ("mirror_4", include_str!("../shaders/mirror_4.frag.wgsl")),
    ("light_leaks", include_str!("../shaders/light_leaks.frag.wgsl")),
    ("film", include_str!("../shaders/film.frag.wgsl")),
    ("grayscale", include_str!("../shaders/grayscale.frag.wgsl")),
    ("manga", include_str!("../shaders/manga.frag.wgsl")),
    ("toon", include_str!("../shaders/toon.frag.wgsl")),
    ("alpha_blend", include_str!("../shaders/alpha_blend.frag.wgsl")),
];

/// Shader store backed by the embedded WGSL.
///
/// Vertex sources are prefixed with the uniform block declaration; fragment
/// sources additionally get the texture bindings and sampling helpers.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinShaders;

impl BuiltinShaders {
    pub fn new() -> Self {
        Self
    }

    /// Fragment shader names available from this store.
    pub fn fragment_names() -> impl Iterator<Item = &'static str> {
        FRAGMENT.iter().map(|(name, _)| *name)
    }
}

impl ShaderStore for BuiltinShaders {
    fn source(&self, name: &str, kind: ShaderKind) -> Option<String> {
        let table = match kind {
            ShaderKind::Vertex => VERTEX,
            ShaderKind::Fragment => FRAGMENT,
        };
        let (_, body) = table.iter().find(|(n, _)| *n == name)?;

        let mut source = String::from(UNIFORMS);
        source.push('\n');
        if kind == ShaderKind::Fragment {
            source.push_str(COMMON);
            source.push('\n');
        }
        source.push_str(body);
        Some(source)
    }
}
