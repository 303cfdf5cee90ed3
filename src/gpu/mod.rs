//! GPU resource layer
//!
//! The renderer reaches the graphics API only through [`RenderBackend`].

pub mod backend;
pub mod framebuffer;
pub mod memory_backend;
#[cfg(feature = "wgpu-backend")]
pub mod wgpu_backend;

pub use backend::{
    AttachmentFormat, AttachmentKind, BackendLimits, BufferHandle, BufferKind, FilterMode,
    PixelFormat, RenderBackend, RenderTarget, RenderbufferHandle, TextureDesc, TextureHandle,
};
pub use framebuffer::{AttachmentSpec, AttachmentStorage, Framebuffer, StorageKind};
pub use memory_backend::{DrawCall, MemoryBackend, MemoryTexture};
#[cfg(feature = "wgpu-backend")]
pub use wgpu_backend::WgpuBackend;
