//! Quad Batch Operations - Pure DOP Functions
//!
//! A frame goes through five stages once `render` is called:
//! primitive construction, layer sort, size-bounded splitting, index offset
//! resolution, then one upload and one draw per group.

use super::atlas_registry_data::AtlasRegistryData;
use super::atlas_registry_operations::resolve;
use super::quad_batch_data::{
    Material, QuadBatchData, QuadSubmission, RenderGroup, RenderPrimitive, RenderStats,
    ScenePhase, Transform2D,
};
use super::vertex::{QuadVertex, UNTEXTURED};
use crate::error::{RendererError, RendererResult};
use crate::gpu::backend::{BufferKind, RenderBackend};
use glam::{Affine2, Mat4, Vec2};

/// Unit quad corners, also the UV weights of each corner
const CORNERS: [Vec2; 4] = [
    Vec2::new(0.0, 0.0),
    Vec2::new(0.0, 1.0),
    Vec2::new(1.0, 0.0),
    Vec2::new(1.0, 1.0),
];

const QUAD_INDICES: [u32; 6] = [0, 1, 2, 1, 2, 3];

const VERTEX_BYTES_PER_QUAD: usize = 4 * std::mem::size_of::<QuadVertex>();

/// Create an idle batch. GPU buffers are created on first render.
pub fn create_quad_batch(max_quads: u32) -> QuadBatchData {
    QuadBatchData {
        phase: ScenePhase::Idle,
        view_projection: Mat4::IDENTITY,
        max_quads,
        submissions: Vec::new(),
        primitives: Vec::new(),
        groups: Vec::new(),
        vertex_buffer: None,
        index_buffer: None,
        staging: Vec::with_capacity(max_quads as usize * VERTEX_BYTES_PER_QUAD),
        stats: RenderStats::default(),
    }
}

/// Create the vertex and index buffers if they do not exist yet
pub fn ensure_buffers<B: RenderBackend>(
    batch: &mut QuadBatchData,
    backend: &mut B,
) -> RendererResult<()> {
    if batch.vertex_buffer.is_none() {
        let size = batch.max_quads as u64 * VERTEX_BYTES_PER_QUAD as u64;
        batch.vertex_buffer = Some(backend.create_buffer(BufferKind::Vertex, size)?);
    }
    if batch.index_buffer.is_none() {
        let size = batch.max_quads as u64 * (QUAD_INDICES.len() * 4) as u64;
        batch.index_buffer = Some(backend.create_buffer(BufferKind::Index, size)?);
    }
    Ok(())
}

/// Destroy the GPU buffers
pub fn release_buffers<B: RenderBackend>(batch: &mut QuadBatchData, backend: &mut B) {
    if let Some(buffer) = batch.vertex_buffer.take() {
        backend.destroy_buffer(buffer);
    }
    if let Some(buffer) = batch.index_buffer.take() {
        backend.destroy_buffer(buffer);
    }
}

fn phase_name(phase: ScenePhase) -> &'static str {
    match phase {
        ScenePhase::Idle => "Idle",
        ScenePhase::Submitting => "InScene",
        ScenePhase::Closed => "SceneEnded",
    }
}

/// Open a frame. Anything collected but not rendered is dropped.
pub fn begin_scene(batch: &mut QuadBatchData, view_projection: Mat4) -> RendererResult<()> {
    if batch.phase == ScenePhase::Submitting {
        return Err(RendererError::InvalidState {
            expected: "Idle",
            actual: phase_name(batch.phase),
        });
    }
    batch.submissions.clear();
    batch.primitives.clear();
    batch.groups.clear();
    batch.view_projection = view_projection;
    batch.phase = ScenePhase::Submitting;
    Ok(())
}

/// Queue a quad. Textures must resolve in the registry now.
pub fn submit_quad(
    batch: &mut QuadBatchData,
    registry: &AtlasRegistryData,
    transform: Transform2D,
    material: Material,
    layer: i32,
) -> RendererResult<()> {
    if batch.phase != ScenePhase::Submitting {
        return Err(RendererError::InvalidState {
            expected: "InScene",
            actual: phase_name(batch.phase),
        });
    }
    if let Some(id) = material.texture {
        resolve(registry, id)?;
    }
    batch.submissions.push(QuadSubmission {
        transform,
        material,
        layer,
    });
    Ok(())
}

/// Stop accepting submissions. `render` still draws what was collected.
pub fn end_scene(batch: &mut QuadBatchData) -> RendererResult<()> {
    if batch.phase != ScenePhase::Submitting {
        return Err(RendererError::InvalidState {
            expected: "InScene",
            actual: phase_name(batch.phase),
        });
    }
    batch.phase = ScenePhase::Closed;
    Ok(())
}

/// `T(position) * T(scale/2) * R(rotation) * T(-scale/2) * S(scale)`
pub fn model_matrix(transform: &Transform2D) -> Affine2 {
    let half = transform.scale * 0.5;
    Affine2::from_translation(transform.position + half)
        * Affine2::from_angle(transform.rotation.to_radians())
        * Affine2::from_translation(-half)
        * Affine2::from_scale(transform.scale)
}

/// Turn a submission into four vertices
pub fn build_primitive(
    submission: &QuadSubmission,
    registry: &AtlasRegistryData,
) -> RendererResult<RenderPrimitive> {
    let model = model_matrix(&submission.transform);
    let resolved = match submission.material.texture {
        Some(id) => Some(resolve(registry, id)?),
        None => None,
    };

    let vertices = CORNERS.map(|corner| {
        let (tex_coords, tex_index) = match &resolved {
            Some(texture) => (
                texture.uv.min + (texture.uv.max - texture.uv.min) * corner,
                texture.atlas_index as i32,
            ),
            None => (corner, UNTEXTURED),
        };
        QuadVertex {
            position: model.transform_point2(corner).to_array(),
            tex_coords: tex_coords.to_array(),
            tex_index,
            color: submission.material.color,
        }
    });

    Ok(RenderPrimitive {
        vertices,
        indices: QUAD_INDICES,
        layer: submission.layer,
        atlas: resolved.map(|texture| (texture.atlas_index, texture.texture)),
    })
}

/// Stable sort by ascending layer
pub fn sort_primitives(primitives: &mut [RenderPrimitive]) {
    primitives.sort_by_key(|primitive| primitive.layer);
}

/// Cut the sorted primitives into groups fitting `max_quads` worth of vertices
pub fn split_groups(primitives: &[RenderPrimitive], max_quads: u32) -> Vec<RenderGroup> {
    let capacity = max_quads as usize * VERTEX_BYTES_PER_QUAD;
    let mut groups = Vec::new();
    let mut start = 0;
    let mut bytes = 0;

    for index in 0..primitives.len() {
        if bytes + VERTEX_BYTES_PER_QUAD > capacity && index > start {
            groups.push(RenderGroup {
                primitives: start..index,
                indices: Vec::new(),
                atlases: Vec::new(),
            });
            start = index;
            bytes = 0;
        }
        bytes += VERTEX_BYTES_PER_QUAD;
    }
    if start < primitives.len() {
        groups.push(RenderGroup {
            primitives: start..primitives.len(),
            indices: Vec::new(),
            atlases: Vec::new(),
        });
    }
    groups
}

/// Offset each primitive's indices by its position in the group and collect
/// the atlases each group samples
pub fn resolve_group_indices(primitives: &[RenderPrimitive], groups: &mut [RenderGroup]) {
    for group in groups {
        group.indices.clear();
        group.atlases.clear();

        let mut vertex_offset = 0u32;
        for primitive in &primitives[group.primitives.clone()] {
            group
                .indices
                .extend(primitive.indices.iter().map(|index| index + vertex_offset));
            vertex_offset += primitive.vertices.len() as u32;

            if let Some(atlas) = primitive.atlas {
                if !group.atlases.iter().any(|(index, _)| *index == atlas.0) {
                    group.atlases.push(atlas);
                }
            }
        }
    }
}

fn upload_and_draw<B: RenderBackend>(
    batch: &mut QuadBatchData,
    backend: &mut B,
) -> RendererResult<RenderStats> {
    ensure_buffers(batch, backend)?;
    let (Some(vertex_buffer), Some(index_buffer)) = (batch.vertex_buffer, batch.index_buffer)
    else {
        return Err(RendererError::Backend("quad buffers missing".to_string()));
    };

    backend.set_view_projection(batch.view_projection);

    let mut stats = RenderStats {
        quads: batch.primitives.len() as u32,
        ..Default::default()
    };
    for group in &batch.groups {
        batch.staging.clear();
        for primitive in &batch.primitives[group.primitives.clone()] {
            batch
                .staging
                .extend_from_slice(bytemuck::cast_slice(&primitive.vertices));
        }
        backend.write_buffer(vertex_buffer, 0, &batch.staging)?;

        batch.staging.clear();
        batch
            .staging
            .extend_from_slice(bytemuck::cast_slice(&group.indices));
        backend.write_buffer(index_buffer, 0, &batch.staging)?;

        for (atlas_index, texture) in &group.atlases {
            backend.bind_texture(*atlas_index, *texture)?;
        }
        backend.draw_indexed(vertex_buffer, index_buffer, group.indices.len() as u32)?;

        stats.draw_calls += 1;
        stats.atlases_bound += group.atlases.len() as u32;
    }
    Ok(stats)
}

/// Draw everything submitted since `begin_scene` and end the scene
pub fn render<B: RenderBackend>(
    batch: &mut QuadBatchData,
    registry: &AtlasRegistryData,
    backend: &mut B,
) -> RendererResult<RenderStats> {
    if batch.phase == ScenePhase::Idle {
        return Err(RendererError::InvalidState {
            expected: "InScene",
            actual: phase_name(batch.phase),
        });
    }
    batch.phase = ScenePhase::Idle;

    batch.primitives = batch
        .submissions
        .iter()
        .map(|submission| build_primitive(submission, registry))
        .collect::<RendererResult<Vec<_>>>()?;
    sort_primitives(&mut batch.primitives);
    batch.groups = split_groups(&batch.primitives, batch.max_quads);
    resolve_group_indices(&batch.primitives, &mut batch.groups);

    let stats = upload_and_draw(batch, backend)?;
    batch.submissions.clear();
    batch.stats = stats;

    log::debug!(
        "[quad_batch_operations::render] {} quads in {} draw calls, {} atlas binds",
        stats.quads,
        stats.draw_calls,
        stats.atlases_bound
    );
    Ok(stats)
}
