//! Integration tests for the GPU subsystem.
//!
//! The first group runs anywhere. Tests that need an adapter return early
//! when none is available.

use flipbook_core::{FrameBuffer, Size};
use flipbook_effects::{BuiltinShaders, FilterFactory, FilterKind, PixelTransform};
use flipbook_gpu::{GpuContext, MemoryShaderStore, ShaderKind, ShaderSource, WgpuBackend};
use std::sync::Arc;
use std::time::Duration;

fn context() -> Option<GpuContext> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("flipbook_effects=debug,flipbook_gpu=debug")
        .with_test_writer()
        .try_init();
    match GpuContext::new_blocking() {
        Ok(context) => Some(context),
        Err(e) => {
            eprintln!("skipping GPU test: {}", e);
            None
        }
    }
}

#[test]
fn builtin_sources_resolve_for_every_kind() {
    let shaders = BuiltinShaders::new();
    let factory_registry = flipbook_effects::FilterRegistry::new();
    for kind in FilterKind::ALL {
        let spec = factory_registry.spec_for(kind).unwrap();
        let source = ShaderSource::resolve(&shaders, &spec.vertex, &spec.fragment);
        assert!(source.is_some(), "{:?}", kind);
    }
}

#[test]
fn grayscale_on_real_gpu() {
    let Some(context) = context() else { return };
    let factory = FilterFactory::new(WgpuBackend::shared(&context));
    let mut chain = factory.create_chain(FilterKind::Grayscale, Vec::new()).unwrap();
    chain.setup_format(Size::new(32, 16), None, Size::ZERO).unwrap();

    let input = Arc::new(FrameBuffer::solid(32, 16, [255, 0, 0, 255]));
    let out = chain.process(&input, Duration::ZERO).unwrap();
    assert_eq!(out.size(), Size::new(32, 16));

    let [r, g, b, a] = out.pixel(16, 8);
    assert!(r == g && g == b, "expected gray, got {:?}", [r, g, b]);
    assert!((70..=84).contains(&r), "luma {}", r);
    assert_eq!(a, 255);

    chain.cleanup();
    let pool = context.texture_pool.lock();
    assert_eq!(pool.checked_out(), 0);
    assert!(pool.texture_count() > 0);
    assert!(pool.memory_usage() > 0);
}

#[test]
fn every_builtin_compiles_on_real_gpu() {
    let Some(context) = context() else { return };
    let factory = FilterFactory::new(WgpuBackend::shared(&context));
    let input = Arc::new(FrameBuffer::test_pattern(24, 24));
    let overlay = Arc::new(FrameBuffer::solid(24, 24, [0, 255, 0, 128]));

    for kind in FilterKind::ALL {
        let mut chain = factory.create_chain(kind, vec![overlay.clone()]).unwrap();
        chain.setup_format(Size::new(24, 24), None, Size::new(12, 12)).unwrap();
        let out = chain.process(&input, Duration::from_millis(250));
        assert!(out.is_some(), "{:?} produced no frame", kind);
        assert!(chain.stages().iter().all(|s| !s.is_inert()), "{:?}", kind);
    }
}

#[test]
fn invalid_shader_leaves_stage_inert_on_real_gpu() {
    let Some(context) = context() else { return };
    let store = MemoryShaderStore::new()
        .with("base_filter", ShaderKind::Vertex, "this is not wgsl")
        .with("base_filter", ShaderKind::Fragment, "neither is this");
    let factory = FilterFactory::with_shaders(WgpuBackend::shared(&context), Arc::new(store));

    let mut chain = factory.create_chain(FilterKind::Passthrough, Vec::new()).unwrap();
    chain.setup_format(Size::new(8, 8), None, Size::ZERO).unwrap();
    let input = Arc::new(FrameBuffer::solid(8, 8, [9, 9, 9, 255]));

    // The base stage may hand frames through untouched.
    let out = chain.process(&input, Duration::ZERO).unwrap();
    assert!(Arc::ptr_eq(&out, &input));
    assert!(chain.stages()[0].is_inert());
}

#[test]
fn oversized_output_is_dropped_on_real_gpu() {
    let Some(context) = context() else { return };
    let max = context.device.limits().max_texture_dimension_2d;
    let factory = FilterFactory::new(WgpuBackend::shared(&context));
    let mut chain = factory.create_chain(FilterKind::Grayscale, Vec::new()).unwrap();
    chain.setup_format(Size::new(8, 8), None, Size::new(max + 1, 8)).unwrap();

    let input = Arc::new(FrameBuffer::solid(8, 8, [9, 9, 9, 255]));
    assert!(chain.process(&input, Duration::ZERO).is_none());
    assert!(chain.stages().iter().all(|s| !s.is_inert()));
    assert_eq!(context.texture_pool.lock().checked_out(), 0);
}
