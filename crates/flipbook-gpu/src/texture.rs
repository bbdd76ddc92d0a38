//! GPU texture management.

use flipbook_core::{FlipbookError, FrameBuffer, PixelFormat, Result};

/// Texture format matching a frame's pixel layout.
pub fn texture_format(format: PixelFormat) -> wgpu::TextureFormat {
    match format {
        PixelFormat::Rgba8 => wgpu::TextureFormat::Rgba8Unorm,
        PixelFormat::Bgra8 => wgpu::TextureFormat::Bgra8Unorm,
    }
}

/// A GPU texture holding one frame.
pub struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
    pub usage: wgpu::TextureUsages,
}

impl GpuTexture {
    /// Create a new GPU texture with the given dimensions.
    pub fn new(
        device: &wgpu::Device,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
        label: Option<&str>,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label,
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            texture,
            view,
            width,
            height,
            format,
            usage,
        }
    }

    /// Usage of textures that receive uploaded frames.
    pub const SAMPLED: wgpu::TextureUsages =
        wgpu::TextureUsages::TEXTURE_BINDING.union(wgpu::TextureUsages::COPY_DST);

    /// Usage of render targets that are read back to the CPU.
    pub const TARGET: wgpu::TextureUsages =
        wgpu::TextureUsages::RENDER_ATTACHMENT.union(wgpu::TextureUsages::COPY_SRC);

    /// Upload a FrameBuffer to this texture.
    pub fn upload_frame(&self, queue: &wgpu::Queue, frame: &FrameBuffer) -> Result<()> {
        if texture_format(frame.format) != self.format {
            return Err(FlipbookError::Gpu(format!(
                "{:?} frame cannot be uploaded to a {:?} texture",
                frame.format, self.format
            )));
        }

        if frame.width != self.width || frame.height != self.height {
            return Err(FlipbookError::Gpu(format!(
                "Frame size {}x{} doesn't match texture size {}x{}",
                frame.width, frame.height, self.width, self.height
            )));
        }

        if !frame.is_rasterizable() {
            return Err(FlipbookError::InvalidParameter(format!(
                "frame {} is not rasterizable",
                frame.size()
            )));
        }

        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &frame.data,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(frame.stride as u32),
                rows_per_image: Some(self.height),
            },
            self.extent(),
        );

        Ok(())
    }

    /// Copy this texture back into CPU memory as RGBA.
    ///
    /// Blocks until the GPU has finished every submitted command.
    pub fn read_back(&self, device: &wgpu::Device, queue: &wgpu::Queue) -> Result<FrameBuffer> {
        if self.format != wgpu::TextureFormat::Rgba8Unorm {
            return Err(FlipbookError::Gpu(format!("cannot read back {:?}", self.format)));
        }

        let unpadded = self.width * 4;
        let padded = align_to(unpadded, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Buffer"),
            size: padded as u64 * self.height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Readback Encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(self.height),
                },
            },
            self.extent(),
        );
        queue.submit(Some(encoder.finish()));

        let slice = buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|_| FlipbookError::Gpu("readback callback dropped".into()))?
            .map_err(|e| FlipbookError::Gpu(format!("readback mapping failed: {}", e)))?;

        let data = {
            let mapped = slice.get_mapped_range();
            copy_tight_rows(&mapped, unpadded, padded, self.height)
        };
        buffer.unmap();

        FrameBuffer::from_raw(self.width, self.height, PixelFormat::Rgba8, data)
    }

    fn extent(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        }
    }

    /// Memory usage estimate in bytes.
    pub fn memory_size(&self) -> usize {
        let bytes_per_pixel = match self.format {
            wgpu::TextureFormat::Rgba16Float => 8,
            wgpu::TextureFormat::Rgba32Float => 16,
            _ => 4,
        };
        (self.width * self.height) as usize * bytes_per_pixel
    }
}

fn align_to(value: u32, alignment: u32) -> u32 {
    value.div_ceil(alignment) * alignment
}

fn copy_tight_rows(mapped: &[u8], unpadded: u32, padded: u32, height: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity((unpadded * height) as usize);
    for row in mapped.chunks(padded as usize).take(height as usize) {
        out.extend_from_slice(&row[..unpadded as usize]);
    }
    out
}
