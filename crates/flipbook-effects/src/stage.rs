//! A single shader-backed filter pass.

use crate::registry::FilterSpec;
use crate::PixelTransform;
use flipbook_core::{FlipbookError, Result, SharedFrameBuffer, Size, Transform};
use flipbook_gpu::{DrawPass, ProgramId, RenderBackend, ShaderSource, ShaderStore, SharedBackend, UniformBlock};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProgramState {
    /// Not compiled yet.
    Pending,
    Ready(ProgramId),
    /// Compilation failed; never retried.
    Inert,
    Released,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct StageFormat {
    input: Size,
    output: Size,
    transform: Option<Transform>,
}

/// One filter pass.
///
/// The program is compiled on the first [`process`](PixelTransform::process)
/// call. A stage whose shaders are missing or fail to compile stays inert:
/// it hands frames through untouched when its spec is passthrough-safe and
/// the pass would not have changed the geometry, and produces nothing
/// otherwise.
///
/// The stage holds only a weak reference to the backend, so it never keeps a
/// GPU context alive on its own.
pub struct FilterStage {
    name: String,
    spec: FilterSpec,
    backend: Weak<Mutex<dyn RenderBackend>>,
    shaders: Arc<dyn ShaderStore>,
    overlay: Option<SharedFrameBuffer>,
    program: ProgramState,
    format: Option<StageFormat>,
    switch_input_dimensions: bool,
}

impl FilterStage {
    pub fn new(name: impl Into<String>, spec: FilterSpec, backend: &SharedBackend, shaders: Arc<dyn ShaderStore>) -> Self {
        Self {
            name: name.into(),
            spec,
            backend: Arc::downgrade(backend),
            shaders,
            overlay: None,
            program: ProgramState::Pending,
            format: None,
            switch_input_dimensions: false,
        }
    }

    /// Bind `overlay` as the second texture on every draw.
    pub fn with_overlay(mut self, overlay: SharedFrameBuffer) -> Self {
        self.overlay = Some(overlay);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn spec(&self) -> &FilterSpec {
        &self.spec
    }

    pub fn overlay(&self) -> Option<&SharedFrameBuffer> {
        self.overlay.as_ref()
    }

    /// Swap the declared input width and height on the next `setup_format`.
    pub fn switch_input_dimensions(&self) -> bool {
        self.switch_input_dimensions
    }

    pub fn set_switch_input_dimensions(&mut self, switch: bool) {
        self.switch_input_dimensions = switch;
    }

    /// Input size after the optional dimension swap.
    pub fn input_size(&self) -> Option<Size> {
        self.format.map(|f| f.input)
    }

    pub fn transform(&self) -> Option<Transform> {
        self.format.and_then(|f| f.transform)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.program, ProgramState::Ready(_))
    }

    pub fn is_inert(&self) -> bool {
        self.program == ProgramState::Inert
    }

    fn ensure_program(&mut self) -> Option<ProgramId> {
        match self.program {
            ProgramState::Ready(id) => return Some(id),
            ProgramState::Inert | ProgramState::Released => return None,
            ProgramState::Pending => {}
        }

        match self.compile() {
            Ok(id) => {
                tracing::debug!(stage = %self.name, id = id.0, "Filter stage ready");
                self.program = ProgramState::Ready(id);
                Some(id)
            }
            Err(e) => {
                tracing::warn!(stage = %self.name, error = %e, "Filter stage is inert");
                self.program = ProgramState::Inert;
                None
            }
        }
    }

    fn compile(&self) -> Result<ProgramId> {
        let source = ShaderSource::resolve(self.shaders.as_ref(), &self.spec.vertex, &self.spec.fragment)
            .ok_or_else(|| {
                FlipbookError::NotFound(format!("shader {} / {}", self.spec.vertex, self.spec.fragment))
            })?;
        let backend = self
            .backend
            .upgrade()
            .ok_or_else(|| FlipbookError::Gpu("render backend dropped".into()))?;
        let id = backend.lock().compile(&self.name, &source)?;
        Ok(id)
    }

    fn pass_through(&self, frame: &SharedFrameBuffer, format: &StageFormat) -> Option<SharedFrameBuffer> {
        let identity = format.transform.map_or(true, |t| t == Transform::IDENTITY);
        let unchanged = format.input == format.output && frame.size() == format.output;
        if self.spec.passthrough_safe && identity && unchanged && self.overlay.is_none() {
            Some(Arc::clone(frame))
        } else {
            None
        }
    }
}

impl PixelTransform for FilterStage {
    fn setup_format(&mut self, input: Size, transform: Option<Transform>, output: Size) -> Result<()> {
        if input.is_zero() {
            return Err(FlipbookError::InvalidParameter(format!(
                "{}: zero input size {}",
                self.name, input
            )));
        }

        let input = if self.switch_input_dimensions { input.swapped() } else { input };
        let output = if output.is_zero() { input } else { output };
        self.format = Some(StageFormat {
            input,
            output,
            transform,
        });
        if self.program == ProgramState::Released {
            self.program = ProgramState::Pending;
        }

        tracing::debug!(stage = %self.name, %input, %output, "Filter stage format");
        Ok(())
    }

    fn output_size(&self) -> Option<Size> {
        self.format.map(|f| f.output)
    }

    fn process(&mut self, frame: &SharedFrameBuffer, time: Duration) -> Option<SharedFrameBuffer> {
        let Some(format) = self.format else {
            tracing::debug!(stage = %self.name, "process called before setup_format");
            return None;
        };
        if self.program == ProgramState::Released {
            return None;
        }

        let Some(program) = self.ensure_program() else {
            return self.pass_through(frame, &format);
        };

        let Some(backend) = self.backend.upgrade() else {
            tracing::warn!(stage = %self.name, "Render backend dropped");
            return None;
        };

        let mut uniforms = self.spec.uniforms(time, format.output, format.transform);
        if self.overlay.is_some() {
            uniforms = uniforms.with_flags(UniformBlock::FLAG_OVERLAY);
        }
        let pass = DrawPass {
            input: frame.as_ref(),
            overlay: self.overlay.as_deref(),
            uniforms,
            output_size: format.output,
        };

        let result = backend.lock().draw(program, &pass);
        match result {
            Ok(output) => Some(Arc::new(output)),
            Err(e) => {
                tracing::warn!(stage = %self.name, error = %e, "Filter draw failed");
                None
            }
        }
    }

    fn cleanup(&mut self) {
        if let ProgramState::Ready(id) = self.program {
            if let Some(backend) = self.backend.upgrade() {
                backend.lock().destroy(id);
            }
            tracing::debug!(stage = %self.name, id = id.0, "Filter stage released");
        }
        if self.program != ProgramState::Inert {
            self.program = ProgramState::Released;
        }
    }
}

impl Drop for FilterStage {
    fn drop(&mut self) {
        self.cleanup();
    }
}

impl std::fmt::Debug for FilterStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterStage")
            .field("name", &self.name)
            .field("program", &self.program)
            .field("format", &self.format)
            .field("overlay", &self.overlay.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shaders::BuiltinShaders;
    use crate::testing::MockBackend;
    use flipbook_core::FrameBuffer;
    use flipbook_gpu::MemoryShaderStore;

    fn setup() -> (Arc<Mutex<MockBackend>>, SharedBackend) {
        let mock = Arc::new(Mutex::new(MockBackend::default()));
        let shared: SharedBackend = mock.clone();
        (mock, shared)
    }

    fn frame(width: u32, height: u32) -> SharedFrameBuffer {
        Arc::new(FrameBuffer::solid(width, height, [10, 20, 30, 255]))
    }

    #[test]
    fn test_compiles_once() {
        let (mock, backend) = setup();
        let mut stage = FilterStage::new("grayscale", FilterSpec::new("grayscale"), &backend, Arc::new(BuiltinShaders));
        stage.setup_format(Size::new(8, 4), None, Size::ZERO).unwrap();

        for _ in 0..3 {
            let out = stage.process(&frame(8, 4), Duration::ZERO).unwrap();
            assert_eq!(out.size(), Size::new(8, 4));
            assert_eq!(out.pixel(0, 0), [10, 20, 30, 255]);
        }
        assert!(stage.is_ready());
        assert_eq!(mock.lock().compiled, vec!["grayscale".to_string()]);
        assert_eq!(mock.lock().draws.len(), 3);
    }

    #[test]
    fn test_process_before_setup() {
        let (_mock, backend) = setup();
        let mut stage = FilterStage::new("toon", FilterSpec::new("toon"), &backend, Arc::new(BuiltinShaders));
        assert!(stage.process(&frame(4, 4), Duration::ZERO).is_none());
    }

    #[test]
    fn test_zero_input_rejected() {
        let (_mock, backend) = setup();
        let mut stage = FilterStage::new("toon", FilterSpec::new("toon"), &backend, Arc::new(BuiltinShaders));
        assert!(stage.setup_format(Size::new(0, 10), None, Size::ZERO).is_err());
    }

    #[test]
    fn test_missing_shader_is_inert() {
        let (mock, backend) = setup();
        let store = Arc::new(MemoryShaderStore::new());
        let input = frame(4, 4);

        let mut safe = FilterStage::new("normal", FilterSpec::new("base_filter").passthrough_safe(), &backend, store.clone());
        safe.setup_format(Size::new(4, 4), None, Size::ZERO).unwrap();
        let out = safe.process(&input, Duration::ZERO).unwrap();
        assert!(Arc::ptr_eq(&out, &input));
        assert!(safe.is_inert());

        let mut unsafe_stage = FilterStage::new("toon", FilterSpec::new("toon"), &backend, store);
        unsafe_stage.setup_format(Size::new(4, 4), None, Size::ZERO).unwrap();
        assert!(unsafe_stage.process(&input, Duration::ZERO).is_none());
        assert!(mock.lock().compiled.is_empty());
    }

    #[test]
    fn test_inert_resize_produces_nothing() {
        let (mock, backend) = setup();
        mock.lock().fail_compile = true;
        let mut stage = FilterStage::new("normal", FilterSpec::new("base_filter").passthrough_safe(), &backend, Arc::new(BuiltinShaders));
        stage.setup_format(Size::new(4, 4), None, Size::new(2, 2)).unwrap();
        assert!(stage.process(&frame(4, 4), Duration::ZERO).is_none());

        // Still inert after a failed compile; no retry.
        mock.lock().fail_compile = false;
        stage.setup_format(Size::new(4, 4), None, Size::ZERO).unwrap();
        assert!(stage.process(&frame(4, 4), Duration::ZERO).is_some());
        assert!(mock.lock().compiled.is_empty());
    }

    #[test]
    fn test_switch_input_dimensions() {
        let (_mock, backend) = setup();
        let mut stage = FilterStage::new("normal", FilterSpec::new("base_filter"), &backend, Arc::new(BuiltinShaders));
        stage.set_switch_input_dimensions(true);
        stage.setup_format(Size::new(1280, 720), None, Size::ZERO).unwrap();
        assert_eq!(stage.input_size(), Some(Size::new(720, 1280)));
        assert_eq!(stage.output_size(), Some(Size::new(720, 1280)));
    }

    #[test]
    fn test_uniforms_and_overlay() {
        let (mock, backend) = setup();
        let spec = FilterSpec::new("alpha_blend");
        let mut stage = FilterStage::new("alpha_blend", spec, &backend, Arc::new(BuiltinShaders))
            .with_overlay(frame(4, 4));
        stage.setup_format(Size::new(4, 4), None, Size::ZERO).unwrap();
        stage.process(&frame(4, 4), Duration::from_secs(2)).unwrap();

        let (_, uniforms, has_overlay) = mock.lock().draws[0];
        assert!(has_overlay);
        assert_eq!(uniforms.flags, UniformBlock::FLAG_OVERLAY);
        assert_eq!(uniforms.time, 0.0);
    }

    #[test]
    fn test_draw_failure() {
        let (mock, backend) = setup();
        mock.lock().fail_draw = true;
        let mut stage = FilterStage::new("film", FilterSpec::new("film").with_time(), &backend, Arc::new(BuiltinShaders));
        stage.setup_format(Size::new(4, 4), None, Size::ZERO).unwrap();
        assert!(stage.process(&frame(4, 4), Duration::ZERO).is_none());
    }

    #[test]
    fn test_cleanup_idempotent_and_rearm() {
        let (mock, backend) = setup();
        let mut stage = FilterStage::new("toon", FilterSpec::new("toon"), &backend, Arc::new(BuiltinShaders));
        stage.setup_format(Size::new(4, 4), None, Size::ZERO).unwrap();
        stage.process(&frame(4, 4), Duration::ZERO).unwrap();

        stage.cleanup();
        stage.cleanup();
        assert_eq!(mock.lock().destroyed.len(), 1);
        assert!(mock.lock().live.is_empty());
        assert!(stage.process(&frame(4, 4), Duration::ZERO).is_none());

        stage.setup_format(Size::new(4, 4), None, Size::ZERO).unwrap();
        assert!(stage.process(&frame(4, 4), Duration::ZERO).is_some());
        assert_eq!(mock.lock().compiled.len(), 2);
    }

    #[test]
    fn test_dropped_backend() {
        let (mock, backend) = setup();
        let mut stage = FilterStage::new("toon", FilterSpec::new("toon"), &backend, Arc::new(BuiltinShaders));
        stage.setup_format(Size::new(4, 4), None, Size::ZERO).unwrap();
        drop(backend);
        drop(mock);
        assert!(stage.process(&frame(4, 4), Duration::ZERO).is_none());
        assert!(stage.is_inert());
        stage.cleanup();
    }

    #[test]
    fn test_drop_releases_program() {
        let (mock, backend) = setup();
        {
            let mut stage = FilterStage::new("toon", FilterSpec::new("toon"), &backend, Arc::new(BuiltinShaders));
            stage.setup_format(Size::new(4, 4), None, Size::ZERO).unwrap();
            stage.process(&frame(4, 4), Duration::ZERO).unwrap();
        }
        assert!(mock.lock().live.is_empty());
    }
}
