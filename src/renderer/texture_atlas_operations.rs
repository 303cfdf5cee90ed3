//! Texture Atlas Operations - Pure DOP Functions
//!
//! Shelf packing: images are placed left to right on horizontal layers, a new
//! layer opening below the last one when nothing fits. Every image is
//! surrounded by `margin` pixels replicated from its own edges so filtering
//! never samples a neighbour.

use super::raw_image::RawImage;
use super::texture_atlas_data::{
    AtlasLayer, AtlasUv, PendingImage, PlacementMode, SlotId, TextureAtlasData, TextureDescriptor,
};
use crate::config::AtlasConfig;
use crate::error::{OptionExt, RendererError, RendererResult};
use crate::gpu::backend::{FilterMode, PixelFormat, RenderBackend, TextureDesc};
use glam::{UVec2, Vec2};
use std::collections::BTreeMap;

/// Create an empty atlas that places images when built
pub fn create_texture_atlas(config: &AtlasConfig, max_texture_size: u32) -> TextureAtlasData {
    create_texture_atlas_with_mode(config, max_texture_size, PlacementMode::Deferred)
}

/// Create an empty atlas with an explicit placement mode
pub fn create_texture_atlas_with_mode(
    config: &AtlasConfig,
    max_texture_size: u32,
    placement: PlacementMode,
) -> TextureAtlasData {
    let requested = config.max_size.unwrap_or(max_texture_size);
    let max_size = requested.min(max_texture_size);

    if max_size != requested {
        log::warn!(
            "[texture_atlas_operations::create] Atlas size clamped from {} to {} due to GPU limits",
            requested,
            max_size
        );
    }

    TextureAtlasData {
        texture: None,
        width: 0,
        height: 0,
        channel_count: config.channel_count,
        margin: config.margin,
        max_size,
        sort_by_size: config.sort_by_size,
        placement,
        descriptors: BTreeMap::new(),
        next_slot: 0,
        layers: Vec::new(),
        pending: Vec::new(),
        built: false,
        dirty: false,
    }
}

/// Reject images an atlas can never hold: malformed buffers and zero sizes
pub fn check_image(image: &RawImage) -> RendererResult<()> {
    image.validate()?;
    if image.width == 0 || image.height == 0 {
        return Err(RendererError::InvalidImage(format!(
            "zero-sized image {}x{}",
            image.width, image.height
        )));
    }
    Ok(())
}

/// Queue an image for packing and return its slot
pub fn add_image(atlas: &mut TextureAtlasData, image: RawImage) -> RendererResult<SlotId> {
    check_image(&image)?;

    let size = UVec2::new(image.width, image.height);
    let (offset, placed) = match atlas.placement {
        PlacementMode::Deferred => (UVec2::ZERO, false),
        PlacementMode::OnInsert => match find_placement(atlas, size) {
            Some(offset) => (offset, true),
            None => {
                return Err(RendererError::AtlasFull {
                    width: image.width,
                    height: image.height,
                })
            }
        },
    };

    let slot = atlas.next_slot;
    atlas.next_slot += 1;
    atlas.descriptors.insert(
        slot,
        TextureDescriptor {
            slot,
            offset,
            size,
            placed,
            ready: false,
            removed: false,
        },
    );
    atlas.pending.push(PendingImage { slot, image });

    if atlas.built {
        atlas.dirty = true;
    }
    Ok(slot)
}

/// Where a new image would go
enum Placement {
    Existing(usize),
    NewLayer(AtlasLayer),
}

/// First layer able to hold a `size` image, or the layer that would open below
/// the last one
fn plan_placement(atlas: &TextureAtlasData, size: UVec2) -> Option<Placement> {
    let margin = atlas.margin as u64;
    let max = atlas.max_size as u64;
    let padded_width = size.x as u64 + 2 * margin;
    let padded_height = size.y as u64 + 2 * margin;

    if padded_width > max || padded_height > max {
        return None;
    }

    for (index, layer) in atlas.layers.iter().enumerate() {
        if padded_height <= layer.height as u64
            && layer.current_width as u64 + padded_width <= max
        {
            return Some(Placement::Existing(index));
        }
    }

    let top = atlas
        .layers
        .last()
        .map_or(0, |layer| layer.top as u64 + layer.height as u64);
    if top + padded_height > max {
        return None;
    }
    Some(Placement::NewLayer(AtlasLayer {
        top: top as u32,
        current_width: 0,
        height: padded_height as u32,
    }))
}

/// Reserve space for a `size` image on the shelves. Returns the image offset.
fn find_placement(atlas: &mut TextureAtlasData, size: UVec2) -> Option<UVec2> {
    let index = match plan_placement(atlas, size)? {
        Placement::Existing(index) => index,
        Placement::NewLayer(layer) => {
            atlas.layers.push(layer);
            atlas.layers.len() - 1
        }
    };

    let margin = atlas.margin;
    let layer = &mut atlas.layers[index];
    let offset = UVec2::new(layer.current_width + margin, layer.top + margin);
    layer.current_width += size.x + 2 * margin;
    Some(offset)
}

/// Whether `add_image` would place a `width` x `height` image right now
pub fn can_place(atlas: &TextureAtlasData, width: u32, height: u32) -> bool {
    plan_placement(atlas, UVec2::new(width, height)).is_some()
}

/// Pack pending images and upload the atlas.
///
/// A built atlas that has not changed is left alone; a dirty one is renewed.
pub fn build<B: RenderBackend>(atlas: &mut TextureAtlasData, backend: &mut B) -> RendererResult<()> {
    if atlas.built {
        return if atlas.dirty {
            renew(atlas, backend)
        } else {
            Ok(())
        };
    }

    // Insertion order, so the size sort below is stable with respect to it
    atlas.pending.sort_by_key(|pending| pending.slot);

    let mut order: Vec<usize> = (0..atlas.pending.len()).collect();
    if atlas.sort_by_size {
        order.sort_by(|a, b| atlas.pending[*b].image.area().cmp(&atlas.pending[*a].image.area()));
    }

    for index in order {
        let slot = atlas.pending[index].slot;
        let already_placed = atlas
            .descriptors
            .get(&slot)
            .map_or(true, |descriptor| descriptor.placed);
        if already_placed {
            continue;
        }

        let size = UVec2::new(atlas.pending[index].image.width, atlas.pending[index].image.height);
        match find_placement(atlas, size) {
            Some(offset) => {
                if let Some(descriptor) = atlas.descriptors.get_mut(&slot) {
                    descriptor.offset = offset;
                    descriptor.placed = true;
                }
            }
            None => {
                log::error!(
                    "[texture_atlas_operations::build] Cannot place {}x{} image (slot {}) in atlas of max size {}, skipping",
                    size.x,
                    size.y,
                    slot,
                    atlas.max_size
                );
            }
        }
    }

    let placed_count = atlas
        .descriptors
        .values()
        .filter(|d| d.placed && !d.removed)
        .count();
    if placed_count == 0 {
        return Err(RendererError::EmptyAtlas);
    }

    let width = atlas
        .layers
        .iter()
        .map(|layer| layer.current_width)
        .max()
        .unwrap_or(0);
    let height = atlas
        .layers
        .last()
        .map_or(0, |layer| layer.top + layer.height);

    let channels = atlas.channel_count as usize;
    let format = PixelFormat::from_channel_count(atlas.channel_count).ok_or_renderer(|| {
        RendererError::InvalidConfig {
            field: "atlas.channel_count".to_string(),
            reason: format!("{} is not one of 1, 3, 4", atlas.channel_count),
        }
    })?;

    let mut buffer = vec![0u8; width as usize * height as usize * channels];
    for pending in &atlas.pending {
        let Some(descriptor) = atlas.descriptors.get(&pending.slot) else {
            continue;
        };
        if !descriptor.placed || descriptor.removed {
            continue;
        }
        composite(&mut buffer, width, channels, &pending.image, descriptor.offset);
        replicate_margin(
            &mut buffer,
            width,
            channels,
            descriptor.offset,
            descriptor.size,
            atlas.margin,
        );
    }

    let texture = backend.create_texture(
        &TextureDesc {
            label: "Texture Atlas",
            width,
            height,
            format,
            filter: FilterMode::Linear,
            render_target: false,
        },
        Some(&buffer),
    )?;

    for descriptor in atlas.descriptors.values_mut() {
        descriptor.ready = descriptor.placed && !descriptor.removed;
    }
    atlas.pending.clear();
    atlas.texture = Some(texture);
    atlas.width = width;
    atlas.height = height;
    atlas.built = true;
    atlas.dirty = false;

    log::info!(
        "[texture_atlas_operations::build] Built {}x{} atlas with {} images ({:.1}% used)",
        width,
        height,
        placed_count,
        utilization(atlas) * 100.0
    );
    Ok(())
}

/// Copy an image into the atlas buffer, converting channel counts
fn composite(buffer: &mut [u8], atlas_width: u32, channels: usize, image: &RawImage, offset: UVec2) {
    let src_channels = image.channels as usize;
    let copied = src_channels.min(channels);

    for y in 0..image.height {
        for x in 0..image.width {
            let dst = ((offset.y + y) as usize * atlas_width as usize + (offset.x + x) as usize)
                * channels;
            let src = (y as usize * image.width as usize + x as usize) * src_channels;
            if channels == 4 {
                buffer[dst + 3] = 255;
            }
            buffer[dst..dst + copied].copy_from_slice(&image.pixels[src..src + copied]);
        }
    }
}

fn copy_pixel(buffer: &mut [u8], atlas_width: u32, channels: usize, from: (u32, u32), to: (u32, u32)) {
    let src = (from.1 as usize * atlas_width as usize + from.0 as usize) * channels;
    let dst = (to.1 as usize * atlas_width as usize + to.0 as usize) * channels;
    buffer.copy_within(src..src + channels, dst);
}

/// Grow the image outward by `margin` rings, each a copy of the ring inside it
fn replicate_margin(
    buffer: &mut [u8],
    atlas_width: u32,
    channels: usize,
    offset: UVec2,
    size: UVec2,
    margin: u32,
) {
    for i in 0..margin {
        let x0 = offset.x - i;
        let y0 = offset.y - i;
        let x1 = offset.x + size.x + i - 1;
        let y1 = offset.y + size.y + i - 1;

        for x in x0..=x1 {
            copy_pixel(buffer, atlas_width, channels, (x, y0), (x, y0 - 1));
            copy_pixel(buffer, atlas_width, channels, (x, y1), (x, y1 + 1));
        }
        for y in y0..=y1 {
            copy_pixel(buffer, atlas_width, channels, (x0, y), (x0 - 1, y));
            copy_pixel(buffer, atlas_width, channels, (x1, y), (x1 + 1, y));
        }

        // Corners
        copy_pixel(buffer, atlas_width, channels, (x0, y0), (x0 - 1, y0 - 1));
        copy_pixel(buffer, atlas_width, channels, (x1, y0), (x1 + 1, y0 - 1));
        copy_pixel(buffer, atlas_width, channels, (x0, y1), (x0 - 1, y1 + 1));
        copy_pixel(buffer, atlas_width, channels, (x1, y1), (x1 + 1, y1 + 1));
    }
}

/// Tombstone a slot
pub fn remove_image(atlas: &mut TextureAtlasData, slot: SlotId) -> RendererResult<()> {
    let descriptor = atlas
        .descriptors
        .get_mut(&slot)
        .filter(|descriptor| !descriptor.removed)
        .ok_or(RendererError::TextureNotFound { id: slot })?;

    descriptor.removed = true;
    descriptor.ready = false;
    atlas.pending.retain(|pending| pending.slot != slot);
    if atlas.built {
        atlas.dirty = true;
    }
    Ok(())
}

/// Repack a dirty atlas from its own GPU image, dropping removed slots.
///
/// Does nothing when the atlas has not changed since it was built. An atlas
/// left without live images releases its GPU image and stays unbuilt.
pub fn renew<B: RenderBackend>(atlas: &mut TextureAtlasData, backend: &mut B) -> RendererResult<()> {
    if !atlas.dirty {
        return Ok(());
    }

    if let Some(texture) = atlas.texture {
        let pixels = backend.read_texture(texture)?;
        let channels = atlas.channel_count as usize;

        for descriptor in atlas.descriptors.values() {
            if !descriptor.ready || descriptor.removed {
                continue;
            }
            let mut extracted =
                Vec::with_capacity(descriptor.size.x as usize * descriptor.size.y as usize * channels);
            for y in 0..descriptor.size.y {
                let row = (descriptor.offset.y + y) as usize * atlas.width as usize;
                let start = (row + descriptor.offset.x as usize) * channels;
                let end = start + descriptor.size.x as usize * channels;
                extracted.extend_from_slice(&pixels[start..end]);
            }
            atlas.pending.push(PendingImage {
                slot: descriptor.slot,
                image: RawImage {
                    width: descriptor.size.x,
                    height: descriptor.size.y,
                    channels: atlas.channel_count,
                    pixels: extracted,
                },
            });
        }

        backend.destroy_texture(texture);
    }

    let before = atlas.descriptors.len();
    atlas.descriptors.retain(|_, descriptor| !descriptor.removed);
    for descriptor in atlas.descriptors.values_mut() {
        descriptor.placed = false;
        descriptor.ready = false;
    }
    log::debug!(
        "[texture_atlas_operations::renew] Compacted {} removed slots, repacking {} images",
        before - atlas.descriptors.len(),
        atlas.descriptors.len()
    );

    atlas.texture = None;
    atlas.layers.clear();
    atlas.width = 0;
    atlas.height = 0;
    atlas.built = false;
    atlas.dirty = false;

    if atlas.descriptors.is_empty() {
        return Ok(());
    }
    build(atlas, backend)
}

/// Live descriptor of a slot
pub fn descriptor(atlas: &TextureAtlasData, slot: SlotId) -> Option<&TextureDescriptor> {
    atlas.descriptors.get(&slot).filter(|d| !d.removed)
}

/// Normalized rectangle of a ready slot
pub fn uv_rect(atlas: &TextureAtlasData, slot: SlotId) -> Option<AtlasUv> {
    let descriptor = descriptor(atlas, slot).filter(|d| d.ready)?;
    let atlas_size = Vec2::new(atlas.width as f32, atlas.height as f32);
    Some(AtlasUv {
        min: descriptor.offset.as_vec2() / atlas_size,
        max: (descriptor.offset + descriptor.size).as_vec2() / atlas_size,
    })
}

/// Fraction of the atlas covered by live images (margins excluded)
pub fn utilization(atlas: &TextureAtlasData) -> f32 {
    if atlas.width == 0 || atlas.height == 0 {
        return 0.0;
    }
    let used: u64 = atlas
        .descriptors
        .values()
        .filter(|d| d.ready && !d.removed)
        .map(|d| d.size.x as u64 * d.size.y as u64)
        .sum();
    used as f32 / (atlas.width as u64 * atlas.height as u64) as f32
}

/// Slots not removed
pub fn live_image_count(atlas: &TextureAtlasData) -> usize {
    atlas.descriptors.values().filter(|d| !d.removed).count()
}

/// Release the GPU image. Descriptors stay but are no longer ready.
pub fn destroy<B: RenderBackend>(atlas: &mut TextureAtlasData, backend: &mut B) {
    if let Some(texture) = atlas.texture.take() {
        backend.destroy_texture(texture);
    }
    for descriptor in atlas.descriptors.values_mut() {
        descriptor.ready = false;
    }
    atlas.built = false;
    atlas.dirty = false;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::memory_backend::MemoryBackend;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn config(margin: u32, max_size: u32) -> AtlasConfig {
        AtlasConfig {
            margin,
            sort_by_size: true,
            channel_count: 4,
            max_size: Some(max_size),
        }
    }

    fn solid(width: u32, height: u32, value: u8) -> RawImage {
        RawImage::filled(width, height, &[value, value, value, 255]).unwrap()
    }

    #[test]
    fn test_shelf_packing_fixture() {
        let mut backend = MemoryBackend::default();
        let mut atlas = create_texture_atlas(&config(1, 9), 8192);

        let first = add_image(&mut atlas, solid(2, 2, 10)).unwrap();
        let large = add_image(&mut atlas, solid(3, 3, 20)).unwrap();
        let second = add_image(&mut atlas, solid(2, 2, 30)).unwrap();
        assert_eq!((first, large, second), (0, 1, 2));

        build(&mut atlas, &mut backend).unwrap();

        assert_eq!(descriptor(&atlas, large).unwrap().offset, UVec2::new(1, 1));
        assert_eq!(descriptor(&atlas, first).unwrap().offset, UVec2::new(6, 1));
        assert_eq!(descriptor(&atlas, second).unwrap().offset, UVec2::new(1, 6));
        assert_eq!(
            atlas.layers,
            vec![
                AtlasLayer { top: 0, current_width: 9, height: 5 },
                AtlasLayer { top: 5, current_width: 4, height: 4 },
            ]
        );
        assert_eq!((atlas.width, atlas.height), (9, 9));
        assert!(atlas.descriptors.values().all(|d| d.ready));
        assert!(atlas.pending.is_empty());
    }

    #[test]
    fn test_random_packing_is_disjoint_and_in_bounds() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut backend = MemoryBackend::default();

        for _ in 0..20 {
            let margin = rng.gen_range(0..3);
            let mut atlas = create_texture_atlas(&config(margin, 128), 8192);
            for _ in 0..rng.gen_range(1..40) {
                let image = solid(rng.gen_range(1..30), rng.gen_range(1..30), 1);
                add_image(&mut atlas, image).unwrap();
            }
            build(&mut atlas, &mut backend).unwrap();

            let rects: Vec<(UVec2, UVec2)> = atlas
                .descriptors
                .values()
                .filter(|d| d.placed)
                .map(|d| {
                    let m = UVec2::splat(margin);
                    (d.offset - m, d.offset + d.size + m)
                })
                .collect();

            for (i, (min_a, max_a)) in rects.iter().enumerate() {
                assert!(max_a.x <= atlas.width && max_a.y <= atlas.height);
                for (min_b, max_b) in &rects[i + 1..] {
                    let overlap = min_a.x < max_b.x
                        && min_b.x < max_a.x
                        && min_a.y < max_b.y
                        && min_b.y < max_a.y;
                    assert!(!overlap, "{:?} overlaps {:?}", (min_a, max_a), (min_b, max_b));
                }
            }
        }
    }

    #[test]
    fn test_pixel_round_trip_with_alpha_default() {
        let mut backend = MemoryBackend::default();
        let mut atlas = create_texture_atlas(&config(1, 64), 8192);

        let pixels: Vec<u8> = (0..2 * 2 * 3).map(|v| v as u8 * 10).collect();
        let slot = add_image(&mut atlas, RawImage::new(2, 2, 3, pixels.clone()).unwrap()).unwrap();
        build(&mut atlas, &mut backend).unwrap();

        let texture = backend.texture(atlas.texture.unwrap()).unwrap();
        let offset = descriptor(&atlas, slot).unwrap().offset;
        let width = atlas.width as usize;
        let at = |x: u32, y: u32| {
            let start = (y as usize * width + x as usize) * 4;
            texture.pixels[start..start + 4].to_vec()
        };

        for y in 0..2u32 {
            for x in 0..2u32 {
                let src = ((y * 2 + x) * 3) as usize;
                let mut expected = pixels[src..src + 3].to_vec();
                expected.push(255);
                assert_eq!(at(offset.x + x, offset.y + y), expected);
            }
        }

        // Margin ring repeats the edges, corners included
        assert_eq!(at(offset.x - 1, offset.y), at(offset.x, offset.y));
        assert_eq!(at(offset.x + 2, offset.y + 1), at(offset.x + 1, offset.y + 1));
        assert_eq!(at(offset.x, offset.y + 2), at(offset.x, offset.y + 1));
        assert_eq!(at(offset.x - 1, offset.y - 1), at(offset.x, offset.y));
        assert_eq!(at(offset.x + 2, offset.y + 2), at(offset.x + 1, offset.y + 1));
    }

    #[test]
    fn test_renew_without_changes_is_noop() {
        let mut backend = MemoryBackend::default();
        let mut atlas = create_texture_atlas(&config(2, 256), 8192);
        add_image(&mut atlas, solid(8, 8, 50)).unwrap();
        add_image(&mut atlas, solid(4, 12, 60)).unwrap();
        build(&mut atlas, &mut backend).unwrap();

        let texture = atlas.texture;
        let pixels = backend.texture(texture.unwrap()).unwrap().pixels.clone();
        let descriptors = atlas.descriptors.clone();

        renew(&mut atlas, &mut backend).unwrap();
        renew(&mut atlas, &mut backend).unwrap();

        assert_eq!(atlas.texture, texture);
        assert_eq!(atlas.descriptors, descriptors);
        assert_eq!(backend.texture(texture.unwrap()).unwrap().pixels, pixels);
    }

    #[test]
    fn test_remove_and_renew_compacts() {
        let mut backend = MemoryBackend::default();
        let mut atlas = create_texture_atlas(&config(1, 256), 8192);
        let big = add_image(&mut atlas, solid(16, 16, 70)).unwrap();
        let small = add_image(&mut atlas, solid(4, 4, 80)).unwrap();
        build(&mut atlas, &mut backend).unwrap();
        let old_texture = atlas.texture.unwrap();

        remove_image(&mut atlas, big).unwrap();
        assert!(atlas.dirty);
        assert!(descriptor(&atlas, big).is_none());
        assert!(uv_rect(&atlas, small).is_some());
        assert!(matches!(
            remove_image(&mut atlas, big),
            Err(RendererError::TextureNotFound { id }) if id == big
        ));

        renew(&mut atlas, &mut backend).unwrap();
        assert!(backend.texture(old_texture).is_none());
        assert_eq!(live_image_count(&atlas), 1);
        assert_eq!(atlas.descriptors.len(), 1);
        assert_eq!((atlas.width, atlas.height), (6, 6));

        let offset = descriptor(&atlas, small).unwrap().offset;
        let texture = backend.texture(atlas.texture.unwrap()).unwrap();
        let start = (offset.y as usize * 6 + offset.x as usize) * 4;
        assert_eq!(&texture.pixels[start..start + 4], &[80, 80, 80, 255]);

        // New slots keep counting up
        let next = add_image(&mut atlas, solid(2, 2, 1)).unwrap();
        assert_eq!(next, 2);
        assert!(atlas.dirty);
        build(&mut atlas, &mut backend).unwrap();
        assert_eq!(live_image_count(&atlas), 2);
        assert!(uv_rect(&atlas, next).is_some());
    }

    /// RGBA sources packed into an atlas with fewer channels keep their
    /// leading channels, before and after a renew readback
    fn assert_narrow_atlas_survives_renew(channels: u8) {
        let mut backend = MemoryBackend::default();
        let narrow = AtlasConfig {
            channel_count: channels,
            ..config(1, 256)
        };
        let mut atlas = create_texture_atlas(&narrow, 8192);
        let big = RawImage::filled(16, 16, &[10, 20, 30, 40]).unwrap();
        let big = add_image(&mut atlas, big).unwrap();
        let small = RawImage::filled(4, 4, &[77, 88, 99, 200]).unwrap();
        let small = add_image(&mut atlas, small).unwrap();
        build(&mut atlas, &mut backend).unwrap();

        let expected = &[77, 88, 99, 200][..channels as usize];
        let small_pixel = |atlas: &TextureAtlasData, backend: &MemoryBackend| {
            let offset = descriptor(atlas, small).unwrap().offset;
            let texture = backend.texture(atlas.texture.unwrap()).unwrap();
            assert_eq!(texture.desc.byte_len(), texture.pixels.len());
            let stride = channels as usize;
            let start = (offset.y as usize * atlas.width as usize + offset.x as usize) * stride;
            texture.pixels[start..start + stride].to_vec()
        };
        assert_eq!(small_pixel(&atlas, &backend), expected);

        remove_image(&mut atlas, big).unwrap();
        renew(&mut atlas, &mut backend).unwrap();
        assert_eq!((atlas.width, atlas.height), (6, 6));
        assert_eq!(small_pixel(&atlas, &backend), expected);
        assert_eq!(
            backend.texture(atlas.texture.unwrap()).unwrap().pixels.len(),
            6 * 6 * channels as usize
        );
    }

    #[test]
    fn test_single_channel_atlas_renew() {
        assert_narrow_atlas_survives_renew(1);
    }

    #[test]
    fn test_rgb_atlas_renew() {
        assert_narrow_atlas_survives_renew(3);
    }

    #[test]
    fn test_on_insert_full_keeps_slot() {
        let mut atlas = create_texture_atlas_with_mode(&config(0, 8), 8192, PlacementMode::OnInsert);
        assert_eq!(add_image(&mut atlas, solid(8, 6, 1)).unwrap(), 0);
        assert!(descriptor(&atlas, 0).unwrap().placed);

        let err = add_image(&mut atlas, solid(4, 4, 1)).unwrap_err();
        assert!(matches!(err, RendererError::AtlasFull { width: 4, height: 4 }));
        assert_eq!(atlas.next_slot, 1);

        assert_eq!(add_image(&mut atlas, solid(8, 2, 1)).unwrap(), 1);
    }

    #[test]
    fn test_empty_and_unplaceable() {
        let mut backend = MemoryBackend::default();
        let mut atlas = create_texture_atlas(&config(1, 16), 8192);
        assert!(matches!(build(&mut atlas, &mut backend), Err(RendererError::EmptyAtlas)));

        // 15 + 2 margin > 16: logged and skipped
        let slot = add_image(&mut atlas, solid(15, 1, 1)).unwrap();
        assert!(matches!(build(&mut atlas, &mut backend), Err(RendererError::EmptyAtlas)));
        assert!(!descriptor(&atlas, slot).unwrap().placed);
        assert_eq!(backend.texture_count(), 0);
    }

    #[test]
    fn test_invalid_images_rejected() {
        let mut atlas = create_texture_atlas(&config(1, 16), 8192);
        let zero_channels = RawImage {
            width: 1,
            height: 1,
            channels: 0,
            pixels: vec![],
        };
        assert!(matches!(
            add_image(&mut atlas, zero_channels),
            Err(RendererError::InvalidImage(_))
        ));
        let short = RawImage {
            width: 2,
            height: 2,
            channels: 4,
            pixels: vec![0; 3],
        };
        assert!(add_image(&mut atlas, short).is_err());
        assert!(add_image(&mut atlas, RawImage::new(0, 3, 4, vec![]).unwrap()).is_err());
        assert_eq!(atlas.next_slot, 0);
    }

    #[test]
    fn test_max_size_clamped_to_device() {
        let atlas = create_texture_atlas(&config(1, 4096), 1024);
        assert_eq!(atlas.max_size, 1024);
        let atlas = create_texture_atlas(&AtlasConfig::default(), 2048);
        assert_eq!(atlas.max_size, 2048);
    }

    #[test]
    fn test_uv_rect_and_utilization() {
        let mut backend = MemoryBackend::default();
        let mut atlas = create_texture_atlas(&config(0, 64), 8192);
        let a = add_image(&mut atlas, solid(4, 4, 1)).unwrap();
        let b = add_image(&mut atlas, solid(4, 2, 1)).unwrap();
        assert!(uv_rect(&atlas, a).is_none());
        build(&mut atlas, &mut backend).unwrap();

        // One 4-high layer, 8 wide
        assert_eq!((atlas.width, atlas.height), (8, 4));
        let uv = uv_rect(&atlas, b).unwrap();
        assert_eq!(uv.min, Vec2::new(0.5, 0.0));
        assert_eq!(uv.max, Vec2::new(1.0, 0.5));
        assert!((utilization(&atlas) - 0.75).abs() < 1e-6);

        destroy(&mut atlas, &mut backend);
        assert_eq!(backend.texture_count(), 0);
        assert!(uv_rect(&atlas, a).is_none());
    }
}
