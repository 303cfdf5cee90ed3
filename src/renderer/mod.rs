//! Renderer Module - DOP data/operations pairs plus the owning renderer instance

pub mod atlas_registry_data;
pub mod atlas_registry_operations;
pub mod quad_batch_data;
pub mod quad_batch_operations;
pub mod raw_image;
pub mod renderer_2d;
pub mod text_renderer;
pub mod texture_atlas_data;
pub mod texture_atlas_operations;
pub mod vertex;

// Simple re-exports
pub use atlas_registry_data::{LogicalTextureId, ResolvedTexture, TextureInfo};
pub use quad_batch_data::{Material, RenderStats, Transform2D};
pub use raw_image::RawImage;
pub use renderer_2d::{Renderer2D, RendererState};
pub use text_renderer::{GlyphBitmap, TextRenderer};
pub use texture_atlas_data::{AtlasUv, PlacementMode, SlotId, TextureAtlasData, TextureDescriptor};
pub use vertex::QuadVertex;
