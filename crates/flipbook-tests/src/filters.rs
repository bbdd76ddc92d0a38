//! Integration tests for filter chains.
//!
//! Runs on a recording backend, no GPU required.

use flipbook_core::{FlipbookError, FrameBuffer, RationalTime, Result, SharedFrameBuffer, Size};
use flipbook_effects::{ChainState, FilterFactory, FilterKind, PixelTransform, ALPHA_BLEND};
use flipbook_gpu::{DrawPass, ProgramId, RenderBackend, SharedBackend};
use flipbook_media::{AnimationDecoder, AnimationEncoder, AnimationSource, EncoderConfig, LoopCount, TimedFrame};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

// ── Helpers ────────────────────────────────────────────────────

/// Draws solid frames of the requested size and tracks live programs.
#[derive(Default)]
struct RecordingBackend {
    next_id: u64,
    live: HashSet<ProgramId>,
    destroyed: usize,
    draw_sizes: Vec<(Size, Size)>,
    reject: Option<String>,
}

impl RenderBackend for RecordingBackend {
    fn compile(&mut self, label: &str, _source: &flipbook_gpu::ShaderSource) -> Result<ProgramId> {
        if self.reject.as_deref() == Some(label) {
            return Err(FlipbookError::Shader(format!("{}: rejected", label)));
        }
        self.next_id += 1;
        let id = ProgramId(self.next_id);
        self.live.insert(id);
        Ok(id)
    }

    fn draw(&mut self, program: ProgramId, pass: &DrawPass<'_>) -> Result<FrameBuffer> {
        if !self.live.contains(&program) {
            return Err(FlipbookError::NotFound(format!("program {:?}", program)));
        }
        self.draw_sizes.push((pass.input.size(), pass.output_size));
        let mut rgba = pass.input.pixel(0, 0);
        if let Some(overlay) = pass.overlay {
            rgba = overlay.pixel(0, 0);
        }
        Ok(FrameBuffer::solid(pass.output_size.width, pass.output_size.height, rgba))
    }

    fn destroy(&mut self, program: ProgramId) {
        if self.live.remove(&program) {
            self.destroyed += 1;
        }
    }

    fn live_textures(&self) -> usize {
        0
    }
}

fn factory() -> (Arc<Mutex<RecordingBackend>>, FilterFactory) {
    let recorder = Arc::new(Mutex::new(RecordingBackend::default()));
    let backend: SharedBackend = recorder.clone();
    (recorder, FilterFactory::new(backend))
}

fn frame(width: u32, height: u32) -> SharedFrameBuffer {
    Arc::new(FrameBuffer::solid(width, height, [200, 100, 50, 255]))
}

// ── Format propagation ─────────────────────────────────────────

#[test]
fn second_stage_input_matches_first_stage_output() {
    let (recorder, factory) = factory();
    let mut chain = factory.create_chain(FilterKind::Manga, Vec::new()).unwrap();

    chain
        .setup_format(Size::new(1920, 1080), None, Size::new(720, 1280))
        .unwrap();
    assert_eq!(chain.stages()[1].input_size(), Some(Size::new(720, 1280)));

    let out = chain.process(&frame(1920, 1080), Duration::ZERO).unwrap();
    assert_eq!(out.size(), Size::new(720, 1280));

    let draws = recorder.lock().draw_sizes.clone();
    assert_eq!(
        draws,
        vec![
            (Size::new(1920, 1080), Size::new(720, 1280)),
            (Size::new(720, 1280), Size::new(720, 1280)),
        ]
    );
}

#[test]
fn overlays_composite_in_order() {
    let (_recorder, factory) = factory();
    let first = Arc::new(FrameBuffer::solid(4, 4, [1, 1, 1, 255]));
    let second = Arc::new(FrameBuffer::solid(4, 4, [2, 2, 2, 255]));
    let mut chain = factory.create_chain(FilterKind::Film, vec![first, second]).unwrap();

    let names: Vec<&str> = chain.stages().iter().map(|s| s.name()).collect();
    assert_eq!(names, vec!["normal", "film", ALPHA_BLEND, ALPHA_BLEND]);

    chain.setup_format(Size::new(4, 4), None, Size::ZERO).unwrap();
    let out = chain.process(&frame(4, 4), Duration::from_millis(500)).unwrap();
    assert_eq!(out.pixel(0, 0), [2, 2, 2, 255]);
}

#[test]
fn broken_shader_drops_frames_for_whole_chain() {
    let (recorder, factory) = factory();
    recorder.lock().reject = Some("toon".into());
    let mut chain = factory.create_chain(FilterKind::Toon, Vec::new()).unwrap();
    chain.setup_format(Size::new(8, 8), None, Size::ZERO).unwrap();

    for _ in 0..3 {
        assert!(chain.process(&frame(8, 8), Duration::ZERO).is_none());
    }
    assert!(chain.stages()[1].is_inert());
}

// ── Lifecycle ──────────────────────────────────────────────────

#[test]
fn cleanup_twice_is_a_no_op() {
    let (recorder, factory) = factory();
    let mut chain = factory.create_chain(FilterKind::Rave, vec![frame(4, 4)]).unwrap();
    chain.setup_format(Size::new(4, 4), None, Size::ZERO).unwrap();
    chain.process(&frame(4, 4), Duration::ZERO).unwrap();
    assert_eq!(recorder.lock().live.len(), 3);

    chain.cleanup();
    chain.cleanup();
    assert_eq!(chain.state(), ChainState::Released);
    assert_eq!(recorder.lock().destroyed, 3);
    assert!(recorder.lock().live.is_empty());

    drop(chain);
    assert_eq!(recorder.lock().destroyed, 3);
}

#[test]
fn chain_outlives_backend_without_panicking() {
    let (recorder, factory) = factory();
    let mut chain = factory.create_chain(FilterKind::Grayscale, Vec::new()).unwrap();
    chain.setup_format(Size::new(4, 4), None, Size::ZERO).unwrap();
    drop(factory);
    drop(recorder);

    assert!(chain.process(&frame(4, 4), Duration::ZERO).is_none());
    chain.cleanup();
}

// ── Decoded animation through a chain ──────────────────────────

#[test]
fn decoded_frames_filter_in_sequence() {
    let dir = tempfile::tempdir().unwrap();
    let frames = vec![
        TimedFrame::new(Arc::new(FrameBuffer::solid(12, 8, [255, 0, 0, 255])), 100),
        TimedFrame::new(Arc::new(FrameBuffer::solid(12, 8, [0, 0, 255, 255])), 200),
    ];
    let path = AnimationEncoder::new(EncoderConfig::default().with_temp_dir(dir.path()))
        .encode_frames(frames, LoopCount::Infinite)
        .unwrap()
        .wait()
        .unwrap();

    let decoder = AnimationDecoder::new();
    let source = AnimationSource::from(path);
    let uniform = decoder.decode_uniform(&source);
    assert_eq!(uniform.frame_count(), 3);

    let (_recorder, factory) = factory();
    let mut chain = factory.create_chain(FilterKind::WavePool, Vec::new()).unwrap();
    chain
        .setup_format(decoder.native_size(&source), None, Size::new(6, 4))
        .unwrap();

    let interval = RationalTime::from_millis(uniform.interval_ms as i64);
    let filtered: Vec<SharedFrameBuffer> = uniform
        .frames
        .iter()
        .enumerate()
        .filter_map(|(i, f)| chain.process(f, (interval * i as i64).to_duration()))
        .collect();
    assert_eq!(filtered.len(), 3);
    assert!(filtered.iter().all(|f| f.size() == Size::new(6, 4)));
}
