//! Render backend interface
//!
//! The batching renderer never touches a graphics API directly. It talks to a
//! [`RenderBackend`] through opaque handles with create/update/bind/destroy
//! semantics. Calls occur on the backend's owning thread.

use crate::error::RendererResult;
use glam::Mat4;

/// Opaque handle to a sampled 2D image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(u32);

/// Opaque handle to a render-only attachment image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderbufferHandle(u32);

/// Opaque handle to a vertex or index buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(u32);

macro_rules! impl_handle {
    ($name:ident) => {
        impl $name {
            /// Wrap a backend-allocated id
            pub const fn from_raw(id: u32) -> Self {
                Self(id)
            }

            /// Backend-allocated id
            pub const fn raw(self) -> u32 {
                self.0
            }
        }
    };
}

impl_handle!(TextureHandle);
impl_handle!(RenderbufferHandle);
impl_handle!(BufferHandle);

/// Pixel layout of sampled textures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    R8,
    Rgb8,
    Rgba8,
}

impl PixelFormat {
    pub fn channel_count(self) -> u8 {
        match self {
            PixelFormat::R8 => 1,
            PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 => 4,
        }
    }

    pub fn from_channel_count(channels: u8) -> Option<Self> {
        match channels {
            1 => Some(PixelFormat::R8),
            3 => Some(PixelFormat::Rgb8),
            4 => Some(PixelFormat::Rgba8),
            _ => None,
        }
    }
}

/// Formats usable as framebuffer attachments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentFormat {
    Rgba8,
    Rgb8,
    R8,
    Depth24Stencil8,
    Depth24,
    Stencil8,
}

/// What an attachment is bound as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Color,
    Depth,
    Stencil,
    DepthStencil,
}

impl AttachmentFormat {
    pub fn kind(self) -> AttachmentKind {
        match self {
            AttachmentFormat::Rgba8 | AttachmentFormat::Rgb8 | AttachmentFormat::R8 => {
                AttachmentKind::Color
            }
            AttachmentFormat::Depth24Stencil8 => AttachmentKind::DepthStencil,
            AttachmentFormat::Depth24 => AttachmentKind::Depth,
            AttachmentFormat::Stencil8 => AttachmentKind::Stencil,
        }
    }

    /// Sampled pixel format for color attachments
    pub fn pixel_format(self) -> Option<PixelFormat> {
        match self {
            AttachmentFormat::Rgba8 => Some(PixelFormat::Rgba8),
            AttachmentFormat::Rgb8 => Some(PixelFormat::Rgb8),
            AttachmentFormat::R8 => Some(PixelFormat::R8),
            _ => None,
        }
    }
}

/// Texture sampling filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterMode {
    Nearest,
    Linear,
}

/// Parameters for [`RenderBackend::create_texture`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDesc {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub filter: FilterMode,
    /// Texture can be bound as a render target
    pub render_target: bool,
}

impl TextureDesc {
    /// Size in bytes of a tightly packed pixel buffer for this texture
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.channel_count() as usize
    }
}

/// Buffer binding role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Vertex,
    Index,
}

/// Where draw calls land
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderTarget {
    /// The presentation surface (or default framebuffer)
    #[default]
    Surface,
    /// Color texture created with `render_target = true`
    Texture(TextureHandle),
}

/// Device capabilities the renderer sizes itself against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendLimits {
    /// Largest 2D texture dimension
    pub max_texture_size: u32,
    /// Number of texture units a single draw can sample from
    pub max_texture_units: u32,
    /// Color attachments per framebuffer
    pub max_color_attachments: u32,
}

/// Core backend interface
pub trait RenderBackend {
    /// Backend name for logging
    fn name(&self) -> &str;

    /// Device limits
    fn limits(&self) -> BackendLimits;

    /// Create a texture, optionally filled with tightly packed pixels in `desc.format`
    fn create_texture(
        &mut self,
        desc: &TextureDesc,
        pixels: Option<&[u8]>,
    ) -> RendererResult<TextureHandle>;

    /// Read the texture's pixels back, tightly packed in its format
    fn read_texture(&mut self, texture: TextureHandle) -> RendererResult<Vec<u8>>;

    /// Release a texture. Unknown handles are ignored.
    fn destroy_texture(&mut self, texture: TextureHandle);

    /// Create a render-only attachment image
    fn create_renderbuffer(
        &mut self,
        width: u32,
        height: u32,
        format: AttachmentFormat,
    ) -> RendererResult<RenderbufferHandle>;

    /// Release a renderbuffer. Unknown handles are ignored.
    fn destroy_renderbuffer(&mut self, renderbuffer: RenderbufferHandle);

    /// Create a zero-initialized buffer of `size` bytes
    fn create_buffer(&mut self, kind: BufferKind, size: u64) -> RendererResult<BufferHandle>;

    /// Overwrite part of a buffer
    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8])
        -> RendererResult<()>;

    /// Release a buffer. Unknown handles are ignored.
    fn destroy_buffer(&mut self, buffer: BufferHandle);

    /// Matrix applied to every vertex position by subsequent draws
    fn set_view_projection(&mut self, view_projection: Mat4);

    /// Select where subsequent clears and draws land
    fn set_render_target(&mut self, target: RenderTarget) -> RendererResult<()>;

    /// Clear the current render target
    fn clear(&mut self, color: [f32; 4]) -> RendererResult<()>;

    /// Bind a texture to a texture unit for subsequent draws
    fn bind_texture(&mut self, unit: u32, texture: TextureHandle) -> RendererResult<()>;

    /// Draw `index_count` indices as a triangle list
    fn draw_indexed(
        &mut self,
        vertex_buffer: BufferHandle,
        index_buffer: BufferHandle,
        index_count: u32,
    ) -> RendererResult<()>;
}
