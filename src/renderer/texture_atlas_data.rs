//! Texture Atlas Data - Pure DOP
//!
//! NO METHODS. Just data.
//! All transformations happen in texture_atlas_operations.rs

use super::raw_image::RawImage;
use crate::gpu::backend::TextureHandle;
use glam::{UVec2, Vec2};
use std::collections::BTreeMap;

/// Slot within one atlas. Never reused while the atlas is alive.
pub type SlotId = u32;

/// When images get a position in the atlas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementMode {
    /// Positions are assigned by `build`, after optional size sorting
    Deferred,
    /// Positions are assigned by `add_image`; a full atlas rejects the image
    OnInsert,
}

/// Where a slot's pixels live in the atlas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDescriptor {
    pub slot: SlotId,
    /// Top-left pixel of the image, margin excluded
    pub offset: UVec2,
    pub size: UVec2,
    pub placed: bool,
    /// Pixels are present in the GPU image
    pub ready: bool,
    /// Tombstone, compacted by `renew`
    pub removed: bool,
}

/// UV coordinates within the atlas
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AtlasUv {
    pub min: Vec2,
    pub max: Vec2,
}

/// Horizontal shelf used while packing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtlasLayer {
    pub top: u32,
    pub current_width: u32,
    pub height: u32,
}

/// Image waiting to be composited into the GPU image
#[derive(Debug, Clone)]
pub struct PendingImage {
    pub slot: SlotId,
    pub image: RawImage,
}

/// Texture atlas data - Pure data structure
#[derive(Debug)]
pub struct TextureAtlasData {
    pub texture: Option<TextureHandle>,

    /// Final size, valid once built
    pub width: u32,
    pub height: u32,

    pub channel_count: u8,
    pub margin: u32,
    pub max_size: u32,
    pub sort_by_size: bool,
    pub placement: PlacementMode,

    pub descriptors: BTreeMap<SlotId, TextureDescriptor>,
    pub next_slot: SlotId,

    // Packing state
    pub layers: Vec<AtlasLayer>,
    pub pending: Vec<PendingImage>,
    pub built: bool,
    pub dirty: bool,
}
