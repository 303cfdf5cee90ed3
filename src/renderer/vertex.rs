//! Quad vertex layout shared by the batcher and the quad shader

use bytemuck::{Pod, Zeroable};
use static_assertions::const_assert_eq;

/// One corner of a batched quad
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 2],
    pub tex_coords: [f32; 2],
    /// Atlas (texture unit) to sample, -1 for untextured quads
    pub tex_index: i32,
    pub color: [f32; 4],
}

const_assert_eq!(std::mem::size_of::<QuadVertex>(), 36);

/// Texture index of quads drawn with their color only
pub const UNTEXTURED: i32 = -1;

#[cfg(feature = "wgpu-backend")]
impl QuadVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
        0 => Float32x2,
        1 => Float32x2,
        2 => Sint32,
        3 => Float32x4
    ];

    /// Vertex buffer layout matching `shaders/quad.wgsl`
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}
