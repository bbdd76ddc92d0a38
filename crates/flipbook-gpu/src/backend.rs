//! Render backends that run one shader program over one frame.

use crate::context::GpuContext;
use crate::shader::ShaderSource;
use crate::texture::{texture_format, GpuTexture};
use crate::texture_pool::SharedTexturePool;
use bytemuck::{Pod, Zeroable};
use flipbook_core::{FlipbookError, FrameBuffer, Result, Size, Transform};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use wgpu::util::DeviceExt;

/// Identifies a compiled program within one backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(pub u64);

/// Uniforms visible to both shader stages at binding 2.
///
/// WGSL layout:
/// ```wgsl
/// struct Uniforms {
///     transform: mat4x4<f32>,
///     resolution: vec2<f32>,
///     time: f32,
///     flags: u32,
/// }
/// ```
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct UniformBlock {
    pub transform: [[f32; 4]; 4],
    pub resolution: [f32; 2],
    pub time: f32,
    pub flags: u32,
}

impl UniformBlock {
    /// Set when an overlay texture is bound at binding 3.
    pub const FLAG_OVERLAY: u32 = 1;

    pub fn new(transform: Transform, resolution: Size, time: f32) -> Self {
        Self {
            transform: transform.to_cols_array_2d(),
            resolution: [resolution.width as f32, resolution.height as f32],
            time,
            flags: 0,
        }
    }

    pub fn with_flags(mut self, flags: u32) -> Self {
        self.flags |= flags;
        self
    }
}

impl Default for UniformBlock {
    fn default() -> Self {
        Self::new(Transform::IDENTITY, Size::ZERO, 0.0)
    }
}

/// Everything one draw needs.
#[derive(Debug, Clone, Copy)]
pub struct DrawPass<'a> {
    pub input: &'a FrameBuffer,
    pub overlay: Option<&'a FrameBuffer>,
    pub uniforms: UniformBlock,
    pub output_size: Size,
}

/// Compiles shader programs and draws frames with them.
pub trait RenderBackend: Send {
    /// Compile a program. Failures are reported, never panicked on.
    fn compile(&mut self, label: &str, source: &ShaderSource) -> Result<ProgramId>;

    /// Render `pass.input` through `program` into a new RGBA frame.
    fn draw(&mut self, program: ProgramId, pass: &DrawPass<'_>) -> Result<FrameBuffer>;

    /// Release a program. Unknown ids are ignored.
    fn destroy(&mut self, program: ProgramId);

    /// Textures currently checked out of the texture cache.
    fn live_textures(&self) -> usize;
}

/// Backend shared by every stage of the chains on one GPU context.
pub type SharedBackend = Arc<Mutex<dyn RenderBackend>>;

struct Program {
    label: String,
    pipeline: wgpu::RenderPipeline,
}

/// wgpu implementation of [`RenderBackend`].
///
/// Bindings: 0 input texture, 1 sampler, 2 [`UniformBlock`], 3 overlay
/// texture (the input again when there is no overlay). The vertex stage
/// draws a four-vertex triangle strip without vertex buffers.
pub struct WgpuBackend {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    pool: SharedTexturePool,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    sampler: wgpu::Sampler,
    programs: HashMap<ProgramId, Program>,
    next_id: u64,
}

impl WgpuBackend {
    /// Backend rendering on `context`, sharing its texture cache.
    pub fn new(context: &GpuContext) -> Self {
        Self::with_pool(
            context.device.clone(),
            context.queue.clone(),
            context.texture_pool.clone(),
        )
    }

    pub fn with_pool(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>, pool: SharedTexturePool) -> Self {
        let texture_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Filter Bind Group Layout"),
            entries: &[
                texture_entry(0),
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(
                            std::mem::size_of::<UniformBlock>() as u64,
                        ),
                    },
                    count: None,
                },
                texture_entry(3),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Filter Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Filter Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Self {
            device,
            queue,
            pool,
            bind_group_layout,
            pipeline_layout,
            sampler,
            programs: HashMap::new(),
            next_id: 1,
        }
    }

    /// Backend wrapped for sharing between filter stages.
    pub fn shared(context: &GpuContext) -> SharedBackend {
        Arc::new(Mutex::new(Self::new(context)))
    }

    fn acquire(&self, size: Size, format: wgpu::TextureFormat, usage: wgpu::TextureUsages) -> GpuTexture {
        self.pool
            .lock()
            .acquire(&self.device, size.width, size.height, format, usage)
    }

    fn upload(&self, frame: &FrameBuffer) -> Result<GpuTexture> {
        let texture = self.acquire(frame.size(), texture_format(frame.format), GpuTexture::SAMPLED);
        match texture.upload_frame(&self.queue, frame) {
            Ok(()) => Ok(texture),
            Err(e) => {
                self.pool.lock().release(texture);
                Err(e)
            }
        }
    }

    fn render(
        &self,
        program: &Program,
        input: &GpuTexture,
        overlay: Option<&GpuTexture>,
        target: &GpuTexture,
        uniforms: &UniformBlock,
    ) -> Result<FrameBuffer> {
        let uniform_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Filter Uniforms"),
            contents: bytemuck::bytes_of(uniforms),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let overlay_view = overlay.map_or(&input.view, |t| &t.view);
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Filter Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&input.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(overlay_view),
                },
            ],
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some(&program.label),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(&program.label),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&program.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.draw(0..4, 0..1);
        }
        self.queue.submit(Some(encoder.finish()));

        target.read_back(&self.device, &self.queue)
    }
}

/// Reject textures the device cannot create or read back.
pub fn check_texture_size(size: Size, limits: &wgpu::Limits) -> Result<()> {
    let max = limits.max_texture_dimension_2d;
    if size.width > max || size.height > max {
        return Err(FlipbookError::Gpu(format!(
            "texture {} exceeds the device limit of {}px",
            size, max
        )));
    }
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as u64;
    let row_bytes = (size.width as u64 * 4).div_ceil(align) * align;
    if row_bytes * size.height as u64 > limits.max_buffer_size {
        return Err(FlipbookError::Gpu(format!(
            "readback of {} exceeds the device buffer limit",
            size
        )));
    }
    Ok(())
}

impl RenderBackend for WgpuBackend {
    fn compile(&mut self, label: &str, source: &ShaderSource) -> Result<ProgramId> {
        if source.vertex.trim().is_empty() || source.fragment.trim().is_empty() {
            return Err(FlipbookError::Shader(format!("{}: empty shader source", label)));
        }

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let vertex = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.vertex.as_str().into()),
        });
        let fragment = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.fragment.as_str().into()),
        });

        let pipeline = self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(&self.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &vertex,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &fragment,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: wgpu::TextureFormat::Rgba8Unorm,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview: None,
            cache: None,
        });

        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(FlipbookError::Shader(format!("{}: {}", label, error)));
        }

        let id = ProgramId(self.next_id);
        self.next_id += 1;
        self.programs.insert(
            id,
            Program {
                label: label.to_string(),
                pipeline,
            },
        );
        tracing::debug!(label, id = id.0, "Compiled filter program");
        Ok(id)
    }

    fn draw(&mut self, program: ProgramId, pass: &DrawPass<'_>) -> Result<FrameBuffer> {
        let Some(compiled) = self.programs.get(&program) else {
            return Err(FlipbookError::NotFound(format!("program {:?}", program)));
        };
        if pass.output_size.is_zero() {
            return Err(FlipbookError::InvalidParameter("zero output size".into()));
        }

        let limits = self.device.limits();
        check_texture_size(pass.input.size(), &limits)?;
        if let Some(overlay) = pass.overlay {
            check_texture_size(overlay.size(), &limits)?;
        }
        check_texture_size(pass.output_size, &limits)?;

        let input = self.upload(pass.input)?;
        let overlay = match pass.overlay.map(|o| self.upload(o)).transpose() {
            Ok(overlay) => overlay,
            Err(e) => {
                self.pool.lock().release(input);
                return Err(e);
            }
        };
        let target = self.acquire(pass.output_size, wgpu::TextureFormat::Rgba8Unorm, GpuTexture::TARGET);

        let result = self.render(compiled, &input, overlay.as_ref(), &target, &pass.uniforms);

        let mut pool = self.pool.lock();
        pool.release(input);
        if let Some(overlay) = overlay {
            pool.release(overlay);
        }
        pool.release(target);
        result
    }

    fn destroy(&mut self, program: ProgramId) {
        if let Some(p) = self.programs.remove(&program) {
            tracing::debug!(label = %p.label, id = program.0, "Destroyed filter program");
        }
    }

    fn live_textures(&self) -> usize {
        self.pool.lock().checked_out()
    }
}
