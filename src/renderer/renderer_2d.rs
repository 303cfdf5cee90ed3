//! 2D renderer instance
//!
//! Owns the backend together with the atlas registry and the quad batch. The
//! caller creates one, drives it through load phases (`begin_prepare` ..
//! `end_prepare`) and frames (`begin_scene` .. `render`), and tears it down with
//! `shutdown`.

use super::atlas_registry_data::{
    AtlasRegistryData, LogicalTextureId, RegistryState, ResolvedTexture, TextureInfo,
};
use super::atlas_registry_operations as registry_ops;
use super::quad_batch_data::{Material, QuadBatchData, RenderStats, ScenePhase, Transform2D};
use super::quad_batch_operations as batch_ops;
use super::raw_image::RawImage;
use crate::config::RendererConfig;
use crate::error::{RendererError, RendererResult};
use crate::gpu::backend::{RenderBackend, RenderTarget};
use glam::Mat4;

/// Which phase the renderer is in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererState {
    Idle,
    Preparing,
    InScene,
}

impl RendererState {
    pub fn name(self) -> &'static str {
        match self {
            RendererState::Idle => "Idle",
            RendererState::Preparing => "Preparing",
            RendererState::InScene => "InScene",
        }
    }
}

/// Batching 2D renderer over a [`RenderBackend`]
pub struct Renderer2D<B: RenderBackend> {
    backend: B,
    config: RendererConfig,
    registry: AtlasRegistryData,
    batch: QuadBatchData,
}

impl<B: RenderBackend> Renderer2D<B> {
    pub fn new(mut backend: B, config: RendererConfig) -> RendererResult<Self> {
        config.validate()?;

        let registry = registry_ops::create_atlas_registry(config.atlas.clone());
        let mut batch = batch_ops::create_quad_batch(config.max_quads);
        batch_ops::ensure_buffers(&mut batch, &mut backend)?;

        let limits = backend.limits();
        log::info!(
            "[Renderer2D::new] {} backend, {} quads per batch, {} texture units",
            backend.name(),
            config.max_quads,
            limits.max_texture_units
        );

        Ok(Self {
            backend,
            config,
            registry,
            batch,
        })
    }

    /// Release every GPU resource the renderer created and hand the backend back
    pub fn shutdown(mut self) -> B {
        registry_ops::clear_resources(&mut self.registry, &mut self.backend);
        batch_ops::release_buffers(&mut self.batch, &mut self.backend);
        log::info!("[Renderer2D::shutdown] Released renderer resources");
        self.backend
    }

    pub fn state(&self) -> RendererState {
        if self.registry.state == RegistryState::Preparing {
            RendererState::Preparing
        } else if self.batch.phase != ScenePhase::Idle {
            RendererState::InScene
        } else {
            RendererState::Idle
        }
    }

    fn expect_state(&self, expected: RendererState) -> RendererResult<()> {
        let actual = self.state();
        if actual != expected {
            return Err(RendererError::InvalidState {
                expected: expected.name(),
                actual: actual.name(),
            });
        }
        Ok(())
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    // ------------------------------------------------------------------
    // Texture preparation
    // ------------------------------------------------------------------

    /// Drop all textures and start a preparation pass
    pub fn begin_prepare(&mut self) -> RendererResult<()> {
        self.expect_state(RendererState::Idle)?;
        registry_ops::begin_prepare(&mut self.registry, &mut self.backend)
    }

    /// Register an image; the returned ID is usable once `end_prepare` ran
    pub fn prepare_texture(&mut self, image: RawImage) -> RendererResult<LogicalTextureId> {
        let limits = self.backend.limits();
        registry_ops::prepare_texture(&mut self.registry, image, limits)
    }

    /// Build the atlases of this pass
    pub fn end_prepare(&mut self) -> RendererResult<()> {
        registry_ops::end_prepare(&mut self.registry, &mut self.backend)
    }

    pub fn remove_texture(&mut self, id: LogicalTextureId) -> RendererResult<()> {
        self.expect_state(RendererState::Idle)?;
        registry_ops::remove_texture(&mut self.registry, id)
    }

    /// Reclaim atlas space of removed textures
    pub fn refresh_atlases(&mut self) -> RendererResult<()> {
        self.expect_state(RendererState::Idle)?;
        registry_ops::refresh_atlases(&mut self.registry, &mut self.backend)
    }

    /// Destroy every atlas; all texture IDs become invalid
    pub fn clear_resources(&mut self) -> RendererResult<()> {
        if self.state() == RendererState::InScene {
            return Err(RendererError::InvalidState {
                expected: "Idle",
                actual: RendererState::InScene.name(),
            });
        }
        registry_ops::clear_resources(&mut self.registry, &mut self.backend);
        Ok(())
    }

    pub fn texture_info(&self, id: LogicalTextureId) -> RendererResult<TextureInfo> {
        registry_ops::texture_info(&self.registry, id)
    }

    pub fn resolve_texture(&self, id: LogicalTextureId) -> RendererResult<ResolvedTexture> {
        registry_ops::resolve(&self.registry, id)
    }

    pub fn atlas_count(&self) -> usize {
        self.registry.atlases.len()
    }

    // ------------------------------------------------------------------
    // Frames
    // ------------------------------------------------------------------

    pub fn begin_scene(&mut self, view_projection: Mat4) -> RendererResult<()> {
        if self.state() == RendererState::Preparing {
            return Err(RendererError::InvalidState {
                expected: "Idle",
                actual: RendererState::Preparing.name(),
            });
        }
        batch_ops::begin_scene(&mut self.batch, view_projection)
    }

    pub fn submit_quad(
        &mut self,
        transform: Transform2D,
        material: Material,
        layer: i32,
    ) -> RendererResult<()> {
        batch_ops::submit_quad(&mut self.batch, &self.registry, transform, material, layer)
    }

    /// Close submission without drawing
    pub fn end_scene(&mut self) -> RendererResult<()> {
        batch_ops::end_scene(&mut self.batch)
    }

    /// Draw the scene into the current render target
    pub fn render(&mut self) -> RendererResult<RenderStats> {
        batch_ops::render(&mut self.batch, &self.registry, &mut self.backend)
    }

    /// Counters of the last `render`
    pub fn stats(&self) -> RenderStats {
        self.batch.stats
    }

    pub fn set_render_target(&mut self, target: RenderTarget) -> RendererResult<()> {
        self.backend.set_render_target(target)
    }

    /// Clear the current render target with the configured color
    pub fn clear(&mut self) -> RendererResult<()> {
        let color = self.config.clear_color;
        self.backend.clear(color)
    }
}
