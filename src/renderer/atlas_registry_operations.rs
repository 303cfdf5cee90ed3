//! Atlas Registry Operations - Pure DOP Functions
//!
//! Textures are prepared in passes. Each pass starts from nothing, hands out
//! logical IDs 0, 1, 2, ... and spills into a new atlas whenever the current
//! one is full. One draw can bind every atlas, so their number is capped at the
//! backend's texture unit count.

use super::atlas_registry_data::{
    AtlasRegistryData, LogicalTextureId, RegistryState, ResolvedTexture, TextureInfo,
    TextureLocation,
};
use super::raw_image::RawImage;
use super::texture_atlas_data::PlacementMode;
use super::texture_atlas_operations::{
    add_image, build, can_place, check_image, create_texture_atlas_with_mode, descriptor,
    destroy, live_image_count, remove_image, renew, uv_rect,
};
use crate::config::AtlasConfig;
use crate::error::{RendererError, RendererResult};
use crate::gpu::backend::{BackendLimits, RenderBackend};
use glam::UVec2;

/// Create an idle registry without atlases
pub fn create_atlas_registry(config: AtlasConfig) -> AtlasRegistryData {
    AtlasRegistryData {
        state: RegistryState::Idle,
        config,
        atlases: Vec::new(),
        mappings: Vec::new(),
    }
}

fn expect_state(registry: &AtlasRegistryData, expected: RegistryState) -> RendererResult<()> {
    if registry.state != expected {
        return Err(RendererError::InvalidState {
            expected: expected.name(),
            actual: registry.state.name(),
        });
    }
    Ok(())
}

fn release_atlases<B: RenderBackend>(registry: &mut AtlasRegistryData, backend: &mut B) {
    for atlas in &mut registry.atlases {
        destroy(atlas, backend);
    }
    registry.atlases.clear();
    registry.mappings.clear();
}

/// Drop every atlas and start a new preparation pass
pub fn begin_prepare<B: RenderBackend>(
    registry: &mut AtlasRegistryData,
    backend: &mut B,
) -> RendererResult<()> {
    expect_state(registry, RegistryState::Idle)?;
    release_atlases(registry, backend);
    registry.state = RegistryState::Preparing;
    log::debug!("[atlas_registry_operations::begin_prepare] Preparation pass started");
    Ok(())
}

/// Queue an image in the current atlas, opening a new one when it is full
pub fn prepare_texture(
    registry: &mut AtlasRegistryData,
    image: RawImage,
    limits: BackendLimits,
) -> RendererResult<LogicalTextureId> {
    expect_state(registry, RegistryState::Preparing)?;
    check_image(&image)?;

    let (width, height) = (image.width, image.height);
    let fits_current = registry
        .atlases
        .last()
        .map_or(false, |atlas| can_place(atlas, width, height));

    if !fits_current {
        let fresh = create_texture_atlas_with_mode(
            &registry.config,
            limits.max_texture_size,
            PlacementMode::OnInsert,
        );
        if !can_place(&fresh, width, height) {
            return Err(RendererError::ImageTooLarge {
                width,
                height,
                max: fresh.max_size,
            });
        }
        if registry.atlases.len() as u32 >= limits.max_texture_units {
            return Err(RendererError::AtlasLimitReached {
                max: limits.max_texture_units,
            });
        }
        registry.atlases.push(fresh);
        log::debug!(
            "[atlas_registry_operations::prepare_texture] Opened atlas {}",
            registry.atlases.len() - 1
        );
    }

    let atlas_index = registry.atlases.len() - 1;
    let slot = match registry.atlases.last_mut() {
        Some(atlas) => add_image(atlas, image)?,
        None => return Err(RendererError::EmptyAtlas),
    };

    let id = registry.mappings.len() as LogicalTextureId;
    registry.mappings.push(Some(TextureLocation {
        atlas_index: atlas_index as u32,
        slot,
    }));
    Ok(id)
}

/// Build every atlas and close the preparation pass
pub fn end_prepare<B: RenderBackend>(
    registry: &mut AtlasRegistryData,
    backend: &mut B,
) -> RendererResult<()> {
    expect_state(registry, RegistryState::Preparing)?;
    registry.state = RegistryState::Idle;

    for (index, atlas) in registry.atlases.iter_mut().enumerate() {
        if live_image_count(atlas) == 0 {
            log::debug!(
                "[atlas_registry_operations::end_prepare] Atlas {} holds no images, not building it",
                index
            );
            continue;
        }
        build(atlas, backend)?;
    }

    log::info!(
        "[atlas_registry_operations::end_prepare] {} textures in {} atlases",
        registry.mappings.len(),
        registry.atlases.len()
    );
    Ok(())
}

fn location(registry: &AtlasRegistryData, id: LogicalTextureId) -> RendererResult<TextureLocation> {
    registry
        .mappings
        .get(id as usize)
        .copied()
        .flatten()
        .ok_or(RendererError::TextureNotFound { id })
}

/// Forget a texture. Its atlas space is reclaimed by `refresh_atlases`.
pub fn remove_texture(registry: &mut AtlasRegistryData, id: LogicalTextureId) -> RendererResult<()> {
    expect_state(registry, RegistryState::Idle)?;
    let location = location(registry, id)?;
    if let Some(atlas) = registry.atlases.get_mut(location.atlas_index as usize) {
        remove_image(atlas, location.slot)?;
    }
    registry.mappings[id as usize] = None;
    Ok(())
}

/// Repack atlases that lost textures
pub fn refresh_atlases<B: RenderBackend>(
    registry: &mut AtlasRegistryData,
    backend: &mut B,
) -> RendererResult<()> {
    expect_state(registry, RegistryState::Idle)?;
    for atlas in &mut registry.atlases {
        renew(atlas, backend)?;
    }
    Ok(())
}

/// Destroy every atlas and mapping
pub fn clear_resources<B: RenderBackend>(registry: &mut AtlasRegistryData, backend: &mut B) {
    release_atlases(registry, backend);
    registry.state = RegistryState::Idle;
    log::debug!("[atlas_registry_operations::clear_resources] Released all atlases");
}

/// Atlas texture and UV rectangle of a built texture
pub fn resolve(registry: &AtlasRegistryData, id: LogicalTextureId) -> RendererResult<ResolvedTexture> {
    let location = location(registry, id)?;
    let atlas = registry
        .atlases
        .get(location.atlas_index as usize)
        .ok_or(RendererError::TextureNotFound { id })?;

    let texture = atlas.texture.ok_or(RendererError::TextureNotReady { id })?;
    let uv = uv_rect(atlas, location.slot).ok_or(RendererError::TextureNotReady { id })?;
    Ok(ResolvedTexture {
        atlas_index: location.atlas_index,
        texture,
        uv,
    })
}

/// Pixel placement of a built texture
pub fn texture_info(registry: &AtlasRegistryData, id: LogicalTextureId) -> RendererResult<TextureInfo> {
    let location = location(registry, id)?;
    let atlas = registry
        .atlases
        .get(location.atlas_index as usize)
        .ok_or(RendererError::TextureNotFound { id })?;
    let descriptor = descriptor(atlas, location.slot)
        .filter(|d| d.ready)
        .ok_or(RendererError::TextureNotReady { id })?;

    Ok(TextureInfo {
        offset: descriptor.offset,
        size: descriptor.size,
        atlas_size: UVec2::new(atlas.width, atlas.height),
        atlas_index: location.atlas_index,
    })
}

/// Textures issued in the current pass and not removed
pub fn live_texture_count(registry: &AtlasRegistryData) -> usize {
    registry.mappings.iter().filter(|m| m.is_some()).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::memory_backend::MemoryBackend;

    fn small_atlas_config() -> AtlasConfig {
        AtlasConfig {
            margin: 0,
            sort_by_size: true,
            channel_count: 4,
            max_size: Some(16),
        }
    }

    fn limits(units: u32) -> BackendLimits {
        BackendLimits {
            max_texture_size: 4096,
            max_texture_units: units,
            max_color_attachments: 4,
        }
    }

    fn solid(width: u32, height: u32, value: u8) -> RawImage {
        RawImage::filled(width, height, &[value, 0, 0, 255]).unwrap()
    }

    #[test]
    fn test_dense_ids_per_pass() {
        let mut backend = MemoryBackend::default();
        let mut registry = create_atlas_registry(AtlasConfig::default());

        begin_prepare(&mut registry, &mut backend).unwrap();
        for expected in 0..5 {
            let id = prepare_texture(&mut registry, solid(4, 4, 1), limits(8)).unwrap();
            assert_eq!(id, expected);
        }
        end_prepare(&mut registry, &mut backend).unwrap();
        assert_eq!(live_texture_count(&registry), 5);

        begin_prepare(&mut registry, &mut backend).unwrap();
        assert_eq!(backend.texture_count(), 0);
        assert_eq!(prepare_texture(&mut registry, solid(4, 4, 1), limits(8)).unwrap(), 0);
    }

    #[test]
    fn test_state_machine() {
        let mut backend = MemoryBackend::default();
        let mut registry = create_atlas_registry(AtlasConfig::default());

        let err = prepare_texture(&mut registry, solid(1, 1, 1), limits(8)).unwrap_err();
        assert!(matches!(
            err,
            RendererError::InvalidState { expected: "Preparing", actual: "Idle" }
        ));
        assert!(end_prepare(&mut registry, &mut backend).is_err());

        begin_prepare(&mut registry, &mut backend).unwrap();
        assert!(matches!(
            begin_prepare(&mut registry, &mut backend),
            Err(RendererError::InvalidState { .. })
        ));
        let id = prepare_texture(&mut registry, solid(1, 1, 1), limits(8)).unwrap();
        assert!(matches!(
            remove_texture(&mut registry, id),
            Err(RendererError::InvalidState { .. })
        ));
        assert!(matches!(
            resolve(&registry, id),
            Err(RendererError::TextureNotReady { id: 0 })
        ));
    }

    #[test]
    fn test_overflow_opens_new_atlas() {
        let mut backend = MemoryBackend::default();
        let mut registry = create_atlas_registry(small_atlas_config());

        begin_prepare(&mut registry, &mut backend).unwrap();
        let a = prepare_texture(&mut registry, solid(16, 10, 1), limits(8)).unwrap();
        let b = prepare_texture(&mut registry, solid(16, 10, 2), limits(8)).unwrap();
        let c = prepare_texture(&mut registry, solid(16, 6, 3), limits(8)).unwrap();
        end_prepare(&mut registry, &mut backend).unwrap();

        let ra = resolve(&registry, a).unwrap();
        let rb = resolve(&registry, b).unwrap();
        let rc = resolve(&registry, c).unwrap();
        assert_eq!(ra.atlas_index, 0);
        assert_eq!(rb.atlas_index, 1);
        assert_eq!(rc.atlas_index, 1);
        assert_ne!(ra.texture, rb.texture);
        assert_eq!(registry.atlases.len(), 2);
        assert_eq!(backend.texture_count(), 2);
    }

    #[test]
    fn test_image_too_large() {
        let mut backend = MemoryBackend::default();
        let mut registry = create_atlas_registry(small_atlas_config());

        begin_prepare(&mut registry, &mut backend).unwrap();
        prepare_texture(&mut registry, solid(4, 4, 1), limits(8)).unwrap();
        let err = prepare_texture(&mut registry, solid(17, 2, 1), limits(8)).unwrap_err();
        assert!(matches!(
            err,
            RendererError::ImageTooLarge { width: 17, height: 2, max: 16 }
        ));
        assert_eq!(registry.atlases.len(), 1);
        // The failed image did not take an ID
        assert_eq!(prepare_texture(&mut registry, solid(4, 4, 1), limits(8)).unwrap(), 1);
    }

    #[test]
    fn test_zero_sized_image_opens_no_atlas() {
        let mut backend = MemoryBackend::default();
        let mut registry = create_atlas_registry(small_atlas_config());

        begin_prepare(&mut registry, &mut backend).unwrap();
        let empty = RawImage::new(0, 0, 4, Vec::new()).unwrap();
        assert!(matches!(
            prepare_texture(&mut registry, empty, limits(8)),
            Err(RendererError::InvalidImage(_))
        ));
        assert!(registry.atlases.is_empty());

        let id = prepare_texture(&mut registry, solid(4, 4, 1), limits(8)).unwrap();
        assert_eq!(id, 0);
        end_prepare(&mut registry, &mut backend).unwrap();
        assert_eq!(registry.atlases.len(), 1);
        assert!(resolve(&registry, id).is_ok());
    }

    #[test]
    fn test_end_prepare_skips_atlas_without_images() {
        let mut backend = MemoryBackend::default();
        let mut registry = create_atlas_registry(small_atlas_config());

        begin_prepare(&mut registry, &mut backend).unwrap();
        let a = prepare_texture(&mut registry, solid(4, 4, 1), limits(8)).unwrap();
        registry.atlases.push(create_texture_atlas_with_mode(
            &registry.config,
            4096,
            PlacementMode::OnInsert,
        ));
        end_prepare(&mut registry, &mut backend).unwrap();

        assert_eq!(registry.state, RegistryState::Idle);
        assert!(resolve(&registry, a).is_ok());
        assert!(registry.atlases[1].texture.is_none());
        assert_eq!(backend.texture_count(), 1);
    }

    #[test]
    fn test_atlas_count_capped_by_texture_units() {
        let mut backend = MemoryBackend::default();
        let mut registry = create_atlas_registry(small_atlas_config());

        begin_prepare(&mut registry, &mut backend).unwrap();
        prepare_texture(&mut registry, solid(16, 16, 1), limits(2)).unwrap();
        prepare_texture(&mut registry, solid(16, 16, 2), limits(2)).unwrap();
        let err = prepare_texture(&mut registry, solid(16, 16, 3), limits(2)).unwrap_err();
        assert!(matches!(err, RendererError::AtlasLimitReached { max: 2 }));
    }

    #[test]
    fn test_remove_and_refresh() {
        let mut backend = MemoryBackend::default();
        let mut registry = create_atlas_registry(AtlasConfig {
            margin: 1,
            ..small_atlas_config()
        });

        begin_prepare(&mut registry, &mut backend).unwrap();
        let big = prepare_texture(&mut registry, solid(8, 8, 1), limits(8)).unwrap();
        let small = prepare_texture(&mut registry, solid(2, 2, 9), limits(8)).unwrap();
        end_prepare(&mut registry, &mut backend).unwrap();
        let before = texture_info(&registry, small).unwrap();
        assert_eq!(before.offset, UVec2::new(11, 1));
        assert_eq!(before.atlas_size, UVec2::new(14, 10));

        remove_texture(&mut registry, big).unwrap();
        assert!(matches!(
            resolve(&registry, big),
            Err(RendererError::TextureNotFound { id: 0 })
        ));
        assert!(matches!(
            remove_texture(&mut registry, big),
            Err(RendererError::TextureNotFound { .. })
        ));

        refresh_atlases(&mut registry, &mut backend).unwrap();
        let after = texture_info(&registry, small).unwrap();
        assert_eq!(after.offset, UVec2::new(1, 1));
        assert_eq!(after.size, UVec2::new(2, 2));
        assert_eq!(after.atlas_size, UVec2::new(4, 4));
        assert_eq!(backend.texture_count(), 1);

        let resolved = resolve(&registry, small).unwrap();
        let pixels = &backend.texture(resolved.texture).unwrap().pixels;
        let start = (1 * 4 + 1) * 4;
        assert_eq!(&pixels[start..start + 4], &[9, 0, 0, 255]);
    }

    #[test]
    fn test_size_sort_applies_on_refresh() {
        let mut backend = MemoryBackend::default();
        let mut registry = create_atlas_registry(small_atlas_config());

        begin_prepare(&mut registry, &mut backend).unwrap();
        let small = prepare_texture(&mut registry, solid(2, 2, 1), limits(8)).unwrap();
        let big = prepare_texture(&mut registry, solid(8, 8, 2), limits(8)).unwrap();
        let extra = prepare_texture(&mut registry, solid(2, 2, 3), limits(8)).unwrap();
        end_prepare(&mut registry, &mut backend).unwrap();

        // Placed in preparation order: the big image opens a second shelf
        assert_eq!(texture_info(&registry, small).unwrap().offset, UVec2::new(0, 0));
        assert_eq!(texture_info(&registry, big).unwrap().offset, UVec2::new(0, 2));

        remove_texture(&mut registry, extra).unwrap();
        refresh_atlases(&mut registry, &mut backend).unwrap();

        assert_eq!(texture_info(&registry, big).unwrap().offset, UVec2::new(0, 0));
        assert_eq!(texture_info(&registry, small).unwrap().offset, UVec2::new(8, 0));
    }

    #[test]
    fn test_clear_resources() {
        let mut backend = MemoryBackend::default();
        let mut registry = create_atlas_registry(AtlasConfig::default());

        begin_prepare(&mut registry, &mut backend).unwrap();
        let id = prepare_texture(&mut registry, solid(3, 3, 1), limits(8)).unwrap();
        clear_resources(&mut registry, &mut backend);
        assert_eq!(registry.state, RegistryState::Idle);
        assert!(matches!(
            resolve(&registry, id),
            Err(RendererError::TextureNotFound { .. })
        ));

        begin_prepare(&mut registry, &mut backend).unwrap();
        prepare_texture(&mut registry, solid(3, 3, 1), limits(8)).unwrap();
        end_prepare(&mut registry, &mut backend).unwrap();
        assert_eq!(backend.texture_count(), 1);
        clear_resources(&mut registry, &mut backend);
        assert_eq!(backend.texture_count(), 0);
    }
}
