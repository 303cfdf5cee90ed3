//! wgpu backend
//!
//! Maps the handle-based [`RenderBackend`] calls onto a wgpu device. Every draw
//! is recorded and submitted on its own so buffer uploads made between draws
//! (the batcher reuses one vertex/index buffer per group) are ordered
//! correctly on the queue.

use super::backend::{
    AttachmentFormat, BackendLimits, BufferHandle, BufferKind, PixelFormat,
    RenderBackend, RenderTarget, RenderbufferHandle, TextureDesc, TextureHandle,
};
use crate::error::{BackendContext, OptionExt, RendererError, RendererResult};
use crate::renderer::vertex::QuadVertex;
use glam::Mat4;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Atlas bindings available to the quad shader
pub const MAX_TEXTURE_UNITS: u32 = 8;

/// First binding slot used by atlas textures
const FIRST_TEXTURE_BINDING: u32 = 2;

struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    desc: TextureDesc,
}

struct GpuBuffer {
    buffer: wgpu::Buffer,
    kind: BufferKind,
    size: u64,
}

/// Backend driving a wgpu device
pub struct WgpuBackend {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    limits: BackendLimits,
    next_id: u32,

    textures: FxHashMap<u32, GpuTexture>,
    renderbuffers: FxHashMap<u32, wgpu::Texture>,
    buffers: FxHashMap<u32, GpuBuffer>,

    shader: wgpu::ShaderModule,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    pipelines: FxHashMap<wgpu::TextureFormat, wgpu::RenderPipeline>,
    uniform_buffer: wgpu::Buffer,
    sampler: wgpu::Sampler,
    placeholder: wgpu::TextureView,

    bound: [Option<TextureHandle>; MAX_TEXTURE_UNITS as usize],
    target: RenderTarget,
    surface: Option<(wgpu::TextureView, wgpu::TextureFormat)>,
}

impl WgpuBackend {
    /// Create a backend on an existing device
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        let device_limits = device.limits();
        let limits = BackendLimits {
            max_texture_size: device_limits.max_texture_dimension_2d,
            max_texture_units: MAX_TEXTURE_UNITS
                .min(device_limits.max_sampled_textures_per_shader_stage),
            max_color_attachments: device_limits.max_color_attachments,
        };

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Quad Batch Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/quad.wgsl").into()),
        });

        let mut entries = vec![
            // Uniforms
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            // Atlas sampler
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ];
        for unit in 0..MAX_TEXTURE_UNITS {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: FIRST_TEXTURE_BINDING + unit,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            });
        }

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Quad Batch Bind Group Layout"),
            entries: &entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Quad Batch Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Quad Batch Uniforms"),
            size: std::mem::size_of::<[f32; 16]>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(
            &uniform_buffer,
            0,
            bytemuck::cast_slice(&Mat4::IDENTITY.to_cols_array()),
        );

        // Atlas borders make linear filtering safe near sub-image edges
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Atlas Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let placeholder_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Unbound Atlas Placeholder"),
            size: wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &placeholder_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &[255, 255, 255, 255],
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4),
                rows_per_image: Some(1),
            },
            wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
        );
        let placeholder = placeholder_texture.create_view(&wgpu::TextureViewDescriptor::default());

        log::info!(
            "[WgpuBackend::new] max texture size {}, {} texture units",
            limits.max_texture_size,
            limits.max_texture_units
        );

        Self {
            device,
            queue,
            limits,
            next_id: 1,
            textures: FxHashMap::default(),
            renderbuffers: FxHashMap::default(),
            buffers: FxHashMap::default(),
            shader,
            bind_group_layout,
            pipeline_layout,
            pipelines: FxHashMap::default(),
            uniform_buffer,
            sampler,
            placeholder,
            bound: [None; MAX_TEXTURE_UNITS as usize],
            target: RenderTarget::Surface,
            surface: None,
        }
    }

    /// Create a backend on a freshly requested device with no surface
    pub fn headless() -> RendererResult<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            force_fallback_adapter: false,
            compatible_surface: None,
        }))
        .ok_or_renderer(|| RendererError::Backend("no suitable GPU adapter".to_string()))?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("ren2d headless device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
            },
            None,
        ))
        .backend_context("request_device")?;

        Ok(Self::new(Arc::new(device), Arc::new(queue)))
    }

    pub fn device(&self) -> &Arc<wgpu::Device> {
        &self.device
    }

    pub fn queue(&self) -> &Arc<wgpu::Queue> {
        &self.queue
    }

    /// Provide the surface view that `RenderTarget::Surface` draws into this frame
    pub fn begin_frame(&mut self, view: wgpu::TextureView, format: wgpu::TextureFormat) {
        self.surface = Some((view, format));
    }

    /// Drop the surface view so the surface texture can be presented
    pub fn end_frame(&mut self) {
        self.surface = None;
    }

    fn allocate_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn texture_format(format: PixelFormat) -> wgpu::TextureFormat {
        match format {
            PixelFormat::R8 => wgpu::TextureFormat::R8Unorm,
            // No 24-bit format on the GPU, RGB is stored as RGBA
            PixelFormat::Rgb8 | PixelFormat::Rgba8 => wgpu::TextureFormat::Rgba8Unorm,
        }
    }

    fn attachment_format(format: AttachmentFormat) -> wgpu::TextureFormat {
        match format {
            AttachmentFormat::Rgba8 | AttachmentFormat::Rgb8 => wgpu::TextureFormat::Rgba8Unorm,
            AttachmentFormat::R8 => wgpu::TextureFormat::R8Unorm,
            AttachmentFormat::Depth24Stencil8 => wgpu::TextureFormat::Depth24PlusStencil8,
            AttachmentFormat::Depth24 => wgpu::TextureFormat::Depth24Plus,
            AttachmentFormat::Stencil8 => wgpu::TextureFormat::Stencil8,
        }
    }

    /// Bytes per texel as stored on the GPU
    fn gpu_texel_size(format: PixelFormat) -> u32 {
        match format {
            PixelFormat::R8 => 1,
            PixelFormat::Rgb8 | PixelFormat::Rgba8 => 4,
        }
    }

    fn expand_rgb(pixels: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(pixels.len() / 3 * 4);
        for rgb in pixels.chunks_exact(3) {
            out.extend_from_slice(rgb);
            out.push(255);
        }
        out
    }

    fn pipeline(&mut self, format: wgpu::TextureFormat) -> &wgpu::RenderPipeline {
        let device = &self.device;
        let shader = &self.shader;
        let layout = &self.pipeline_layout;
        self.pipelines.entry(format).or_insert_with(|| {
            log::debug!("[WgpuBackend::pipeline] Creating quad pipeline for {:?}", format);
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Quad Batch Pipeline"),
                layout: Some(layout),
                vertex: wgpu::VertexState {
                    module: shader,
                    entry_point: "vs_main",
                    compilation_options: Default::default(),
                    buffers: &[QuadVertex::layout()],
                },
                fragment: Some(wgpu::FragmentState {
                    module: shader,
                    entry_point: "fs_main",
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
            })
        })
    }

    fn target_view(&self) -> RendererResult<(&wgpu::TextureView, wgpu::TextureFormat)> {
        match self.target {
            RenderTarget::Surface => self
                .surface
                .as_ref()
                .map(|(view, format)| (view, *format))
                .ok_or_renderer(|| {
                    RendererError::Backend("no surface view, call begin_frame first".to_string())
                }),
            RenderTarget::Texture(handle) => self
                .textures
                .get(&handle.raw())
                .map(|tex| (&tex.view, Self::texture_format(tex.desc.format)))
                .ok_or(RendererError::ResourceNotFound {
                    kind: "texture",
                    id: handle.raw(),
                }),
        }
    }

    fn gpu_buffer(&self, handle: BufferHandle, kind: BufferKind) -> RendererResult<&GpuBuffer> {
        let buffer = self
            .buffers
            .get(&handle.raw())
            .ok_or(RendererError::ResourceNotFound {
                kind: "buffer",
                id: handle.raw(),
            })?;
        if buffer.kind != kind {
            return Err(RendererError::Backend(format!(
                "buffer {} is a {:?} buffer, expected {:?}",
                handle.raw(),
                buffer.kind,
                kind
            )));
        }
        Ok(buffer)
    }
}

impl RenderBackend for WgpuBackend {
    fn name(&self) -> &str {
        "WgpuBackend"
    }

    fn limits(&self) -> BackendLimits {
        self.limits
    }

    fn create_texture(
        &mut self,
        desc: &TextureDesc,
        pixels: Option<&[u8]>,
    ) -> RendererResult<TextureHandle> {
        if desc.width == 0 || desc.height == 0 {
            return Err(RendererError::Backend(format!(
                "texture '{}' has zero size",
                desc.label
            )));
        }
        if desc.width > self.limits.max_texture_size || desc.height > self.limits.max_texture_size
        {
            return Err(RendererError::Backend(format!(
                "texture '{}' {}x{} exceeds max texture size {}",
                desc.label, desc.width, desc.height, self.limits.max_texture_size
            )));
        }

        let mut usage = wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_DST
            | wgpu::TextureUsages::COPY_SRC;
        if desc.render_target {
            usage |= wgpu::TextureUsages::RENDER_ATTACHMENT;
        }
        let size = wgpu::Extent3d {
            width: desc.width,
            height: desc.height,
            depth_or_array_layers: 1,
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(desc.label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::texture_format(desc.format),
            usage,
            view_formats: &[],
        });

        if let Some(data) = pixels {
            if data.len() != desc.byte_len() {
                return Err(RendererError::Backend(format!(
                    "texture '{}' expects {} bytes, got {}",
                    desc.label,
                    desc.byte_len(),
                    data.len()
                )));
            }
            let expanded;
            let upload = if desc.format == PixelFormat::Rgb8 {
                expanded = Self::expand_rgb(data);
                expanded.as_slice()
            } else {
                data
            };
            self.queue.write_texture(
                wgpu::ImageCopyTexture {
                    texture: &texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                upload,
                wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(desc.width * Self::gpu_texel_size(desc.format)),
                    rows_per_image: Some(desc.height),
                },
                size,
            );
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let id = self.allocate_id();
        self.textures.insert(
            id,
            GpuTexture {
                texture,
                view,
                desc: *desc,
            },
        );
        Ok(TextureHandle::from_raw(id))
    }

    fn read_texture(&mut self, texture: TextureHandle) -> RendererResult<Vec<u8>> {
        let stored = self
            .textures
            .get(&texture.raw())
            .ok_or(RendererError::ResourceNotFound {
                kind: "texture",
                id: texture.raw(),
            })?;
        let desc = stored.desc;
        let texel = Self::gpu_texel_size(desc.format);
        let unpadded_row = desc.width * texel;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_row = (unpadded_row + align - 1) / align * align;

        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Texture Readback"),
            size: padded_row as u64 * desc.height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Texture Readback Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &stored.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &staging,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row),
                    rows_per_image: Some(desc.height),
                },
            },
            wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        receiver
            .recv()
            .backend_context("read_texture")?
            .backend_context("read_texture")?;

        let mut pixels = Vec::with_capacity(desc.byte_len());
        {
            let mapped = slice.get_mapped_range();
            for row in mapped.chunks(padded_row as usize).take(desc.height as usize) {
                let row = &row[..unpadded_row as usize];
                if desc.format == PixelFormat::Rgb8 {
                    for rgba in row.chunks_exact(4) {
                        pixels.extend_from_slice(&rgba[..3]);
                    }
                } else {
                    pixels.extend_from_slice(row);
                }
            }
        }
        staging.unmap();
        Ok(pixels)
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        if let Some(stored) = self.textures.remove(&texture.raw()) {
            stored.texture.destroy();
        }
        for slot in self.bound.iter_mut() {
            if *slot == Some(texture) {
                *slot = None;
            }
        }
        if self.target == RenderTarget::Texture(texture) {
            self.target = RenderTarget::Surface;
        }
    }

    fn create_renderbuffer(
        &mut self,
        width: u32,
        height: u32,
        format: AttachmentFormat,
    ) -> RendererResult<RenderbufferHandle> {
        if width == 0 || height == 0 {
            return Err(RendererError::Backend("renderbuffer has zero size".to_string()));
        }
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Renderbuffer"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::attachment_format(format),
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let id = self.allocate_id();
        self.renderbuffers.insert(id, texture);
        Ok(RenderbufferHandle::from_raw(id))
    }

    fn destroy_renderbuffer(&mut self, renderbuffer: RenderbufferHandle) {
        if let Some(texture) = self.renderbuffers.remove(&renderbuffer.raw()) {
            texture.destroy();
        }
    }

    fn create_buffer(&mut self, kind: BufferKind, size: u64) -> RendererResult<BufferHandle> {
        let usage = match kind {
            BufferKind::Vertex => wgpu::BufferUsages::VERTEX,
            BufferKind::Index => wgpu::BufferUsages::INDEX,
        } | wgpu::BufferUsages::COPY_DST;
        // Copies must be 4-byte aligned
        let size = size.max(wgpu::COPY_BUFFER_ALIGNMENT);
        let size = (size + wgpu::COPY_BUFFER_ALIGNMENT - 1) / wgpu::COPY_BUFFER_ALIGNMENT
            * wgpu::COPY_BUFFER_ALIGNMENT;
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(match kind {
                BufferKind::Vertex => "Quad Vertex Buffer",
                BufferKind::Index => "Quad Index Buffer",
            }),
            size,
            usage,
            mapped_at_creation: false,
        });
        let id = self.allocate_id();
        self.buffers.insert(id, GpuBuffer { buffer, kind, size });
        Ok(BufferHandle::from_raw(id))
    }

    fn write_buffer(
        &mut self,
        buffer: BufferHandle,
        offset: u64,
        data: &[u8],
    ) -> RendererResult<()> {
        let stored = self
            .buffers
            .get(&buffer.raw())
            .ok_or(RendererError::ResourceNotFound {
                kind: "buffer",
                id: buffer.raw(),
            })?;
        if offset + data.len() as u64 > stored.size {
            return Err(RendererError::Backend(format!(
                "write of {} bytes at offset {} overflows buffer of {} bytes",
                data.len(),
                offset,
                stored.size
            )));
        }
        if data.len() as u64 % wgpu::COPY_BUFFER_ALIGNMENT != 0 {
            return Err(RendererError::Backend(format!(
                "write of {} bytes is not {}-byte aligned",
                data.len(),
                wgpu::COPY_BUFFER_ALIGNMENT
            )));
        }
        self.queue.write_buffer(&stored.buffer, offset, data);
        Ok(())
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        if let Some(stored) = self.buffers.remove(&buffer.raw()) {
            stored.buffer.destroy();
        }
    }

    fn set_view_projection(&mut self, view_projection: Mat4) {
        self.queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytemuck::cast_slice(&view_projection.to_cols_array()),
        );
    }

    fn set_render_target(&mut self, target: RenderTarget) -> RendererResult<()> {
        if let RenderTarget::Texture(handle) = target {
            let stored = self
                .textures
                .get(&handle.raw())
                .ok_or(RendererError::ResourceNotFound {
                    kind: "texture",
                    id: handle.raw(),
                })?;
            if !stored.desc.render_target {
                return Err(RendererError::Backend(format!(
                    "texture '{}' was not created as a render target",
                    stored.desc.label
                )));
            }
        }
        self.target = target;
        Ok(())
    }

    fn clear(&mut self, color: [f32; 4]) -> RendererResult<()> {
        let (view, _) = self.target_view()?;
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Clear Encoder"),
            });
        {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Clear Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: color[0] as f64,
                            g: color[1] as f64,
                            b: color[2] as f64,
                            a: color[3] as f64,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }
        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureHandle) -> RendererResult<()> {
        if unit >= self.limits.max_texture_units {
            return Err(RendererError::Backend(format!(
                "texture unit {} out of range (max {})",
                unit, self.limits.max_texture_units
            )));
        }
        if !self.textures.contains_key(&texture.raw()) {
            return Err(RendererError::ResourceNotFound {
                kind: "texture",
                id: texture.raw(),
            });
        }
        self.bound[unit as usize] = Some(texture);
        Ok(())
    }

    fn draw_indexed(
        &mut self,
        vertex_buffer: BufferHandle,
        index_buffer: BufferHandle,
        index_count: u32,
    ) -> RendererResult<()> {
        let (_, format) = self.target_view()?;
        // Create the pipeline first, the rest of the draw only borrows immutably
        self.pipeline(format);

        let (view, _) = self.target_view()?;
        let pipeline = self
            .pipelines
            .get(&format)
            .ok_or_renderer(|| RendererError::Backend("pipeline missing".to_string()))?;
        let vertices = &self.gpu_buffer(vertex_buffer, BufferKind::Vertex)?.buffer;
        let indices = self.gpu_buffer(index_buffer, BufferKind::Index)?;
        if index_count as u64 * 4 > indices.size {
            return Err(RendererError::Backend(format!(
                "draw of {} indices overflows index buffer of {} bytes",
                index_count, indices.size
            )));
        }

        let views: Vec<&wgpu::TextureView> = self
            .bound
            .iter()
            .map(|slot| {
                slot.and_then(|handle| self.textures.get(&handle.raw()))
                    .map_or(&self.placeholder, |tex| &tex.view)
            })
            .collect();
        let mut entries = vec![
            wgpu::BindGroupEntry {
                binding: 0,
                resource: self.uniform_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&self.sampler),
            },
        ];
        for (unit, view) in views.iter().enumerate() {
            entries.push(wgpu::BindGroupEntry {
                binding: FIRST_TEXTURE_BINDING + unit as u32,
                resource: wgpu::BindingResource::TextureView(view),
            });
        }
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Quad Batch Bind Group"),
            layout: &self.bind_group_layout,
            entries: &entries,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Quad Batch Encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Quad Batch Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.set_vertex_buffer(0, vertices.slice(..));
            pass.set_index_buffer(indices.buffer.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..index_count, 0, 0..1);
        }
        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }
}
