//! Atlas Registry Data - Pure DOP
//!
//! NO METHODS. Just data.
//! All transformations happen in atlas_registry_operations.rs

use super::texture_atlas_data::{AtlasUv, SlotId, TextureAtlasData};
use crate::config::AtlasConfig;
use crate::gpu::backend::TextureHandle;
use glam::UVec2;

/// Caller-visible texture handle, dense from 0 within one preparation pass
pub type LogicalTextureId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryState {
    Idle,
    Preparing,
}

impl RegistryState {
    pub fn name(self) -> &'static str {
        match self {
            RegistryState::Idle => "Idle",
            RegistryState::Preparing => "Preparing",
        }
    }
}

/// Atlas and slot behind a logical ID
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureLocation {
    pub atlas_index: u32,
    pub slot: SlotId,
}

/// What the batcher needs to sample a texture
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedTexture {
    pub atlas_index: u32,
    pub texture: TextureHandle,
    pub uv: AtlasUv,
}

/// Pixel placement of a texture, for layout code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureInfo {
    pub offset: UVec2,
    pub size: UVec2,
    pub atlas_size: UVec2,
    pub atlas_index: u32,
}

/// Atlas registry data - Pure data structure
#[derive(Debug)]
pub struct AtlasRegistryData {
    pub state: RegistryState,
    pub config: AtlasConfig,
    pub atlases: Vec<TextureAtlasData>,
    /// Indexed by logical ID; `None` once removed
    pub mappings: Vec<Option<TextureLocation>>,
}
