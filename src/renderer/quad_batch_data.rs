//! Quad Batch Data - Pure DOP
//!
//! NO METHODS. Just data.
//! All transformations happen in quad_batch_operations.rs

use super::atlas_registry_data::LogicalTextureId;
use super::vertex::QuadVertex;
use crate::gpu::backend::{BufferHandle, TextureHandle};
use glam::{Mat4, Vec2};
use std::ops::Range;

/// Placement of a quad in world space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform2D {
    /// Top-left corner before rotation
    pub position: Vec2,
    /// Size in world units
    pub scale: Vec2,
    /// Degrees around the quad center; positive turns clockwise on a Y-down screen
    pub rotation: f32,
}

impl Default for Transform2D {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            scale: Vec2::ONE,
            rotation: 0.0,
        }
    }
}

/// Color and optional texture of a quad
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    /// RGBA, multiplied with the texture sample
    pub color: [f32; 4],
    pub texture: Option<LogicalTextureId>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            color: [1.0, 1.0, 1.0, 1.0],
            texture: None,
        }
    }
}

/// One `submit_quad` call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadSubmission {
    pub transform: Transform2D,
    pub material: Material,
    /// Paint layer, lower layers are drawn first
    pub layer: i32,
}

/// A submission turned into vertices
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderPrimitive {
    pub vertices: [QuadVertex; 4],
    /// Relative to this primitive's own vertices
    pub indices: [u32; 6],
    pub layer: i32,
    /// Atlas and its texture, `None` for untextured quads
    pub atlas: Option<(u32, TextureHandle)>,
}

/// Primitives drawn with one upload and one draw call
#[derive(Debug, Clone, PartialEq)]
pub struct RenderGroup {
    /// Range into the layer-sorted primitive list
    pub primitives: Range<usize>,
    /// Indices with each primitive's vertex offset applied
    pub indices: Vec<u32>,
    /// Distinct atlases in first-use order: (atlas index, texture)
    pub atlases: Vec<(u32, TextureHandle)>,
}

/// Where the per-frame protocol stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenePhase {
    Idle,
    /// Between `begin_scene` and `end_scene`/`render`
    Submitting,
    /// `end_scene` was called, `render` still draws
    Closed,
}

/// Counters of the last `render`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub quads: u32,
    pub draw_calls: u32,
    pub atlases_bound: u32,
}

/// Quad batch data - Pure data structure
#[derive(Debug)]
pub struct QuadBatchData {
    pub phase: ScenePhase,
    pub view_projection: Mat4,
    pub max_quads: u32,

    pub submissions: Vec<QuadSubmission>,
    pub primitives: Vec<RenderPrimitive>,
    pub groups: Vec<RenderGroup>,

    // GPU buffers sized for `max_quads`, uploaded through `staging`
    pub vertex_buffer: Option<BufferHandle>,
    pub index_buffer: Option<BufferHandle>,
    pub staging: Vec<u8>,

    pub stats: RenderStats,
}
