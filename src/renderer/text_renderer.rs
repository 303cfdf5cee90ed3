//! Bitmap text on top of the atlas registry
//!
//! Glyph rasterization happens elsewhere; this module receives coverage
//! bitmaps, turns them into white RGBA textures whose alpha is the coverage,
//! and lays strings out as one quad per glyph.

use super::atlas_registry_data::LogicalTextureId;
use super::quad_batch_data::{Material, Transform2D};
use super::raw_image::RawImage;
use super::renderer_2d::{Renderer2D, RendererState};
use crate::error::{RendererError, RendererResult};
use crate::gpu::backend::RenderBackend;
use glam::{IVec2, UVec2, Vec2};
use rustc_hash::FxHashMap;

/// Extra pixels between lines, before scaling
pub const DEFAULT_ROW_SPACING: u32 = 20;

/// Rasterized glyph as produced by a font library
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlyphBitmap {
    pub character: char,
    pub width: u32,
    pub height: u32,
    /// Offset from the pen position to the bitmap's top-left, Y up
    pub bearing: (i32, i32),
    /// Pen advance in 1/64 pixels
    pub advance: u32,
    /// One coverage byte per pixel, rows top to bottom
    pub coverage: Vec<u8>,
}

/// Glyph metrics plus its texture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Glyph {
    /// `None` for glyphs without pixels, such as spaces
    pub texture: Option<LogicalTextureId>,
    pub size: UVec2,
    pub bearing: IVec2,
    pub advance: u32,
}

/// Glyph table of one font size
#[derive(Debug, Clone)]
pub struct TextRenderer {
    glyphs: FxHashMap<char, Glyph>,
    font_size: u32,
    pub row_spacing: u32,
}

impl TextRenderer {
    /// Register every glyph with the renderer. Must run inside a preparation pass.
    pub fn load<B, I>(renderer: &mut Renderer2D<B>, font_size: u32, glyphs: I) -> RendererResult<Self>
    where
        B: RenderBackend,
        I: IntoIterator<Item = GlyphBitmap>,
    {
        if renderer.state() != RendererState::Preparing {
            return Err(RendererError::InvalidState {
                expected: RendererState::Preparing.name(),
                actual: renderer.state().name(),
            });
        }

        let mut table = FxHashMap::default();
        for bitmap in glyphs {
            let texture = if bitmap.width == 0 || bitmap.height == 0 {
                None
            } else {
                Some(renderer.prepare_texture(coverage_to_rgba(&bitmap)?)?)
            };
            table.insert(
                bitmap.character,
                Glyph {
                    texture,
                    size: UVec2::new(bitmap.width, bitmap.height),
                    bearing: IVec2::new(bitmap.bearing.0, bitmap.bearing.1),
                    advance: bitmap.advance,
                },
            );
        }

        log::debug!(
            "[TextRenderer::load] {} glyphs at {}px",
            table.len(),
            font_size
        );
        Ok(Self {
            glyphs: table,
            font_size,
            row_spacing: DEFAULT_ROW_SPACING,
        })
    }

    pub fn font_size(&self) -> u32 {
        self.font_size
    }

    pub fn glyph(&self, character: char) -> Option<&Glyph> {
        self.glyphs.get(&character)
    }

    /// Line height and top bearing every glyph is aligned against
    fn reference_metrics(&self) -> (f32, f32) {
        match self.glyphs.get(&'H') {
            Some(reference) => (reference.size.y as f32, reference.bearing.y as f32),
            None => (self.font_size as f32, self.font_size as f32),
        }
    }

    /// Submit one quad per visible glyph. `position` is the top-left of the first line.
    pub fn render_text<B: RenderBackend>(
        &self,
        renderer: &mut Renderer2D<B>,
        text: &str,
        position: Vec2,
        scale: f32,
        color: [f32; 4],
        layer: i32,
    ) -> RendererResult<()> {
        let (line_height, top_bearing) = self.reference_metrics();
        let mut pen = position;

        for character in text.chars() {
            if character == '\n' {
                pen.x = position.x;
                pen.y += (line_height + self.row_spacing as f32) * scale;
                continue;
            }

            let Some(glyph) = self.glyphs.get(&character) else {
                log::debug!(
                    "[TextRenderer::render_text] No glyph for {:?}, skipping",
                    character
                );
                continue;
            };

            if let Some(texture) = glyph.texture {
                let transform = Transform2D {
                    position: Vec2::new(
                        pen.x + glyph.bearing.x as f32 * scale,
                        pen.y + (top_bearing - glyph.bearing.y as f32) * scale,
                    ),
                    scale: glyph.size.as_vec2() * scale,
                    rotation: 0.0,
                };
                let material = Material {
                    color,
                    texture: Some(texture),
                };
                renderer.submit_quad(transform, material, layer)?;
            }

            pen.x += (glyph.advance >> 6) as f32 * scale;
        }
        Ok(())
    }

    /// Width (sum of advances) and height (tallest glyph) of a single line
    pub fn string_size(&self, text: &str, scale: f32) -> Vec2 {
        let mut width = 0u32;
        let mut height = 0u32;
        for glyph in text.chars().filter_map(|c| self.glyphs.get(&c)) {
            width += glyph.advance >> 6;
            height = height.max(glyph.size.y);
        }
        Vec2::new(width as f32, height as f32) * scale
    }
}

/// White RGBA image whose alpha is the glyph coverage
fn coverage_to_rgba(bitmap: &GlyphBitmap) -> RendererResult<RawImage> {
    let expected = bitmap.width as usize * bitmap.height as usize;
    if bitmap.coverage.len() != expected {
        return Err(RendererError::InvalidImage(format!(
            "glyph {:?} has {} coverage bytes, expected {}",
            bitmap.character,
            bitmap.coverage.len(),
            expected
        )));
    }

    let mut pixels = Vec::with_capacity(expected * 4);
    for &alpha in &bitmap.coverage {
        pixels.extend_from_slice(&[255, 255, 255, alpha]);
    }
    RawImage::new(bitmap.width, bitmap.height, 4, pixels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RendererConfig;
    use crate::gpu::memory_backend::MemoryBackend;
    use crate::renderer::vertex::QuadVertex;
    use glam::Mat4;

    fn glyph(character: char, width: u32, height: u32, bearing_y: i32, advance_px: u32) -> GlyphBitmap {
        GlyphBitmap {
            character,
            width,
            height,
            bearing: (0, bearing_y),
            advance: advance_px << 6,
            coverage: (0..width * height).map(|i| (i * 10) as u8).collect(),
        }
    }

    fn font() -> Vec<GlyphBitmap> {
        vec![
            glyph('H', 4, 6, 6, 5),
            glyph('g', 3, 5, 3, 4),
            glyph(' ', 0, 0, 0, 3),
        ]
    }

    fn loaded() -> (Renderer2D<MemoryBackend>, TextRenderer) {
        let mut renderer =
            Renderer2D::new(MemoryBackend::default(), RendererConfig::default()).unwrap();
        renderer.begin_prepare().unwrap();
        let text = TextRenderer::load(&mut renderer, 16, font()).unwrap();
        renderer.end_prepare().unwrap();
        (renderer, text)
    }

    fn quad_origins(renderer: &Renderer2D<MemoryBackend>) -> Vec<[f32; 2]> {
        renderer
            .backend()
            .draw_calls()
            .iter()
            .flat_map(|call| {
                call.vertices::<QuadVertex>()
                    .chunks(4)
                    .map(|quad| quad[0].position)
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    #[test]
    fn test_load_requires_preparation() {
        let mut renderer =
            Renderer2D::new(MemoryBackend::default(), RendererConfig::default()).unwrap();
        assert!(matches!(
            TextRenderer::load(&mut renderer, 16, font()),
            Err(RendererError::InvalidState { expected: "Preparing", .. })
        ));
    }

    #[test]
    fn test_glyph_textures() {
        let (renderer, text) = loaded();
        assert!(text.glyph(' ').unwrap().texture.is_none());
        assert_eq!(text.font_size(), 16);

        let g = text.glyph('g').unwrap().texture.unwrap();
        let info = renderer.texture_info(g).unwrap();
        assert_eq!(info.size, UVec2::new(3, 5));

        let resolved = renderer.resolve_texture(g).unwrap();
        let pixels = &renderer.backend().texture(resolved.texture).unwrap().pixels;
        let width = info.atlas_size.x as usize;
        // Second pixel of the first row has coverage 10
        let start = (info.offset.y as usize * width + info.offset.x as usize + 1) * 4;
        assert_eq!(&pixels[start..start + 4], &[255, 255, 255, 10]);
    }

    #[test]
    fn test_layout() {
        let (mut renderer, text) = loaded();
        renderer.begin_scene(Mat4::IDENTITY).unwrap();
        text.render_text(&mut renderer, "Hg H?", Vec2::new(10.0, 20.0), 2.0, [1.0; 4], 0)
            .unwrap();
        renderer.render().unwrap();

        assert_eq!(
            quad_origins(&renderer),
            vec![[10.0, 20.0], [20.0, 26.0], [34.0, 20.0]]
        );
    }

    #[test]
    fn test_newline() {
        let (mut renderer, text) = loaded();
        renderer.begin_scene(Mat4::IDENTITY).unwrap();
        text.render_text(&mut renderer, "H\nH", Vec2::new(10.0, 20.0), 2.0, [1.0; 4], 0)
            .unwrap();
        renderer.render().unwrap();

        // (6 + 20) * 2 below the first line
        assert_eq!(quad_origins(&renderer), vec![[10.0, 20.0], [10.0, 72.0]]);
    }

    #[test]
    fn test_string_size() {
        let (_, text) = loaded();
        assert_eq!(text.string_size("Hg", 1.0), Vec2::new(9.0, 6.0));
        assert_eq!(text.string_size("g g", 2.0), Vec2::new(22.0, 10.0));
        assert_eq!(text.string_size("", 1.0), Vec2::ZERO);
    }

    #[test]
    fn test_bad_coverage_rejected() {
        let mut renderer =
            Renderer2D::new(MemoryBackend::default(), RendererConfig::default()).unwrap();
        renderer.begin_prepare().unwrap();
        let mut bad = glyph('x', 2, 2, 2, 2);
        bad.coverage.pop();
        assert!(matches!(
            TextRenderer::load(&mut renderer, 16, vec![bad]),
            Err(RendererError::InvalidImage(_))
        ));
    }
}
