// ren2d - batching 2D renderer
//
// Data-Oriented Programming (DOP) layout:
// - *_data modules hold plain data structures
// - *_operations modules hold the functions that transform them
// - Renderer2D is the single owner tying backend, atlases and batch together
//
// The renderer reaches the GPU only through gpu::RenderBackend. The wgpu
// implementation sits behind the `wgpu-backend` feature; gpu::MemoryBackend
// runs everything headless.

pub mod camera;
pub mod config;
pub mod error;
pub mod gpu;
pub mod renderer;

pub use config::{AtlasConfig, RendererConfig};
pub use error::{RendererError, RendererResult};
pub use gpu::{Framebuffer, MemoryBackend, RenderBackend, RenderTarget};
#[cfg(feature = "wgpu-backend")]
pub use gpu::WgpuBackend;
pub use renderer::{
    GlyphBitmap, LogicalTextureId, Material, RawImage, RenderStats, Renderer2D, TextRenderer,
    Transform2D,
};
