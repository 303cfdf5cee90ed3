//! Headless backend
//!
//! Keeps every resource in CPU memory and records draw calls instead of
//! rasterizing them. Used for tests, asset tooling and anywhere a device is not
//! available.

use super::backend::{
    AttachmentFormat, BackendLimits, BufferHandle, BufferKind, RenderBackend, RenderTarget,
    RenderbufferHandle, TextureDesc, TextureHandle,
};
use crate::error::{RendererError, RendererResult};
use glam::Mat4;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;

/// Texture stored in memory
#[derive(Debug, Clone)]
pub struct MemoryTexture {
    pub desc: TextureDesc,
    pub pixels: Vec<u8>,
}

#[derive(Debug, Clone)]
struct MemoryBuffer {
    kind: BufferKind,
    data: Vec<u8>,
}

/// Snapshot of one `draw_indexed` call
#[derive(Debug, Clone)]
pub struct DrawCall {
    pub target: RenderTarget,
    pub view_projection: Mat4,
    /// Texture units bound at draw time, ordered by unit
    pub textures: Vec<(u32, TextureHandle)>,
    pub index_count: u32,
    /// The first `index_count` indices of the bound index buffer
    pub indices: Vec<u32>,
    /// Full contents of the bound vertex buffer
    pub vertex_bytes: Vec<u8>,
}

impl DrawCall {
    /// Decode the vertices referenced by this draw
    pub fn vertices<V: bytemuck::AnyBitPattern>(&self) -> Vec<V> {
        let used = self.indices.iter().max().map_or(0, |max| *max as usize + 1);
        self.vertex_bytes
            .chunks_exact(std::mem::size_of::<V>())
            .take(used)
            .map(bytemuck::pod_read_unaligned)
            .collect()
    }
}

/// Backend that never touches a GPU
#[derive(Debug)]
pub struct MemoryBackend {
    limits: BackendLimits,
    next_id: u32,
    textures: FxHashMap<u32, MemoryTexture>,
    renderbuffers: FxHashMap<u32, (u32, u32, AttachmentFormat)>,
    buffers: FxHashMap<u32, MemoryBuffer>,
    bound: BTreeMap<u32, TextureHandle>,
    target: RenderTarget,
    view_projection: Mat4,
    clears: Vec<(RenderTarget, [f32; 4])>,
    draw_calls: Vec<DrawCall>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(BackendLimits {
            max_texture_size: 8192,
            max_texture_units: 16,
            max_color_attachments: 8,
        })
    }
}

impl MemoryBackend {
    pub fn new(limits: BackendLimits) -> Self {
        Self {
            limits,
            next_id: 1,
            textures: FxHashMap::default(),
            renderbuffers: FxHashMap::default(),
            buffers: FxHashMap::default(),
            bound: BTreeMap::new(),
            target: RenderTarget::Surface,
            view_projection: Mat4::IDENTITY,
            clears: Vec::new(),
            draw_calls: Vec::new(),
        }
    }

    fn allocate_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Stored texture, if it is alive
    pub fn texture(&self, texture: TextureHandle) -> Option<&MemoryTexture> {
        self.textures.get(&texture.raw())
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn renderbuffer_count(&self) -> usize {
        self.renderbuffers.len()
    }

    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    pub fn render_target(&self) -> RenderTarget {
        self.target
    }

    /// Draw calls recorded since the last [`MemoryBackend::take_draw_calls`]
    pub fn draw_calls(&self) -> &[DrawCall] {
        &self.draw_calls
    }

    pub fn take_draw_calls(&mut self) -> Vec<DrawCall> {
        std::mem::take(&mut self.draw_calls)
    }

    pub fn clears(&self) -> &[(RenderTarget, [f32; 4])] {
        &self.clears
    }

    fn buffer(&self, buffer: BufferHandle, kind: BufferKind) -> RendererResult<&MemoryBuffer> {
        let stored = self
            .buffers
            .get(&buffer.raw())
            .ok_or(RendererError::ResourceNotFound {
                kind: "buffer",
                id: buffer.raw(),
            })?;
        if stored.kind != kind {
            return Err(RendererError::Backend(format!(
                "buffer {} is a {:?} buffer, expected {:?}",
                buffer.raw(),
                stored.kind,
                kind
            )));
        }
        Ok(stored)
    }
}

impl RenderBackend for MemoryBackend {
    fn name(&self) -> &str {
        "MemoryBackend"
    }

    fn limits(&self) -> BackendLimits {
        self.limits
    }

    fn create_texture(
        &mut self,
        desc: &TextureDesc,
        pixels: Option<&[u8]>,
    ) -> RendererResult<TextureHandle> {
        if desc.width == 0 || desc.height == 0 {
            return Err(RendererError::Backend(format!(
                "texture '{}' has zero size",
                desc.label
            )));
        }
        if desc.width > self.limits.max_texture_size || desc.height > self.limits.max_texture_size
        {
            return Err(RendererError::Backend(format!(
                "texture '{}' {}x{} exceeds max texture size {}",
                desc.label, desc.width, desc.height, self.limits.max_texture_size
            )));
        }

        let pixels = match pixels {
            Some(data) if data.len() != desc.byte_len() => {
                return Err(RendererError::Backend(format!(
                    "texture '{}' expects {} bytes, got {}",
                    desc.label,
                    desc.byte_len(),
                    data.len()
                )));
            }
            Some(data) => data.to_vec(),
            None => vec![0; desc.byte_len()],
        };

        let id = self.allocate_id();
        self.textures.insert(id, MemoryTexture { desc: *desc, pixels });
        Ok(TextureHandle::from_raw(id))
    }

    fn read_texture(&mut self, texture: TextureHandle) -> RendererResult<Vec<u8>> {
        self.textures
            .get(&texture.raw())
            .map(|stored| stored.pixels.clone())
            .ok_or(RendererError::ResourceNotFound {
                kind: "texture",
                id: texture.raw(),
            })
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(&texture.raw());
        self.bound.retain(|_, bound| *bound != texture);
        if self.target == RenderTarget::Texture(texture) {
            self.target = RenderTarget::Surface;
        }
    }

    fn create_renderbuffer(
        &mut self,
        width: u32,
        height: u32,
        format: AttachmentFormat,
    ) -> RendererResult<RenderbufferHandle> {
        if width == 0 || height == 0 {
            return Err(RendererError::Backend("renderbuffer has zero size".to_string()));
        }
        let id = self.allocate_id();
        self.renderbuffers.insert(id, (width, height, format));
        Ok(RenderbufferHandle::from_raw(id))
    }

    fn destroy_renderbuffer(&mut self, renderbuffer: RenderbufferHandle) {
        self.renderbuffers.remove(&renderbuffer.raw());
    }

    fn create_buffer(&mut self, kind: BufferKind, size: u64) -> RendererResult<BufferHandle> {
        let id = self.allocate_id();
        self.buffers.insert(
            id,
            MemoryBuffer {
                kind,
                data: vec![0; size as usize],
            },
        );
        Ok(BufferHandle::from_raw(id))
    }

    fn write_buffer(
        &mut self,
        buffer: BufferHandle,
        offset: u64,
        data: &[u8],
    ) -> RendererResult<()> {
        let stored = self
            .buffers
            .get_mut(&buffer.raw())
            .ok_or(RendererError::ResourceNotFound {
                kind: "buffer",
                id: buffer.raw(),
            })?;
        let start = offset as usize;
        let end = start + data.len();
        if end > stored.data.len() {
            return Err(RendererError::Backend(format!(
                "write of {} bytes at offset {} overflows buffer of {} bytes",
                data.len(),
                offset,
                stored.data.len()
            )));
        }
        stored.data[start..end].copy_from_slice(data);
        Ok(())
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(&buffer.raw());
    }

    fn set_view_projection(&mut self, view_projection: Mat4) {
        self.view_projection = view_projection;
    }

    fn set_render_target(&mut self, target: RenderTarget) -> RendererResult<()> {
        if let RenderTarget::Texture(texture) = target {
            let stored = self
                .textures
                .get(&texture.raw())
                .ok_or(RendererError::ResourceNotFound {
                    kind: "texture",
                    id: texture.raw(),
                })?;
            if !stored.desc.render_target {
                return Err(RendererError::Backend(format!(
                    "texture '{}' was not created as a render target",
                    stored.desc.label
                )));
            }
        }
        self.target = target;
        Ok(())
    }

    fn clear(&mut self, color: [f32; 4]) -> RendererResult<()> {
        self.clears.push((self.target, color));
        Ok(())
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureHandle) -> RendererResult<()> {
        if unit >= self.limits.max_texture_units {
            return Err(RendererError::Backend(format!(
                "texture unit {} out of range (max {})",
                unit, self.limits.max_texture_units
            )));
        }
        if !self.textures.contains_key(&texture.raw()) {
            return Err(RendererError::ResourceNotFound {
                kind: "texture",
                id: texture.raw(),
            });
        }
        self.bound.insert(unit, texture);
        Ok(())
    }

    fn draw_indexed(
        &mut self,
        vertex_buffer: BufferHandle,
        index_buffer: BufferHandle,
        index_count: u32,
    ) -> RendererResult<()> {
        let indices_bytes = &self.buffer(index_buffer, BufferKind::Index)?.data;
        let needed = index_count as usize * std::mem::size_of::<u32>();
        if needed > indices_bytes.len() {
            return Err(RendererError::Backend(format!(
                "draw of {} indices overflows index buffer of {} bytes",
                index_count,
                indices_bytes.len()
            )));
        }
        let indices = indices_bytes[..needed]
            .chunks_exact(4)
            .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        let vertex_bytes = self.buffer(vertex_buffer, BufferKind::Vertex)?.data.clone();

        self.draw_calls.push(DrawCall {
            target: self.target,
            view_projection: self.view_projection,
            textures: self.bound.iter().map(|(unit, tex)| (*unit, *tex)).collect(),
            index_count,
            indices,
            vertex_bytes,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::backend::{FilterMode, PixelFormat};

    fn desc(width: u32, height: u32, render_target: bool) -> TextureDesc {
        TextureDesc {
            label: "test",
            width,
            height,
            format: PixelFormat::Rgba8,
            filter: FilterMode::Nearest,
            render_target,
        }
    }

    #[test]
    fn test_texture_roundtrip_and_destroy() {
        let mut backend = MemoryBackend::default();
        let pixels: Vec<u8> = (0..16).collect();
        let tex = backend.create_texture(&desc(2, 2, false), Some(&pixels)).unwrap();
        assert_eq!(backend.read_texture(tex).unwrap(), pixels);

        backend.destroy_texture(tex);
        assert!(matches!(
            backend.read_texture(tex),
            Err(RendererError::ResourceNotFound { .. })
        ));
    }

    #[test]
    fn test_texture_size_validation() {
        let mut backend = MemoryBackend::default();
        assert!(backend.create_texture(&desc(0, 4, false), None).is_err());
        assert!(backend.create_texture(&desc(9000, 4, false), None).is_err());
        assert!(backend.create_texture(&desc(2, 2, false), Some(&[0; 3])).is_err());
    }

    #[test]
    fn test_write_buffer_bounds() {
        let mut backend = MemoryBackend::default();
        let buf = backend.create_buffer(BufferKind::Vertex, 8).unwrap();
        assert!(backend.write_buffer(buf, 4, &[1, 2, 3, 4]).is_ok());
        assert!(backend.write_buffer(buf, 6, &[1, 2, 3, 4]).is_err());
    }

    #[test]
    fn test_draw_records_state() {
        let mut backend = MemoryBackend::default();
        let tex = backend.create_texture(&desc(1, 1, false), None).unwrap();
        let vb = backend.create_buffer(BufferKind::Vertex, 16).unwrap();
        let ib = backend.create_buffer(BufferKind::Index, 12).unwrap();
        backend
            .write_buffer(ib, 0, bytemuck::cast_slice(&[0u32, 1, 2]))
            .unwrap();
        backend.bind_texture(3, tex).unwrap();
        backend.draw_indexed(vb, ib, 3).unwrap();

        let calls = backend.take_draw_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].indices, vec![0, 1, 2]);
        assert_eq!(calls[0].textures, vec![(3, tex)]);
        assert!(backend.draw_calls().is_empty());

        // Index buffer passed as vertex buffer
        assert!(backend.draw_indexed(ib, ib, 3).is_err());
        // Too many indices
        assert!(backend.draw_indexed(vb, ib, 4).is_err());
    }

    #[test]
    fn test_render_target_requires_flag() {
        let mut backend = MemoryBackend::default();
        let plain = backend.create_texture(&desc(4, 4, false), None).unwrap();
        let target = backend.create_texture(&desc(4, 4, true), None).unwrap();
        assert!(backend.set_render_target(RenderTarget::Texture(plain)).is_err());
        backend.set_render_target(RenderTarget::Texture(target)).unwrap();
        backend.clear([1.0, 0.0, 0.0, 1.0]).unwrap();
        assert_eq!(backend.clears()[0].0, RenderTarget::Texture(target));

        backend.destroy_texture(target);
        assert_eq!(backend.render_target(), RenderTarget::Surface);
    }
}
