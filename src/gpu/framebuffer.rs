//! Offscreen render targets
//!
//! A framebuffer is declared as a list of attachments, then generated against a
//! backend. Each attachment is either a sampled texture or a render-only
//! renderbuffer; that choice is fixed when the attachment is declared.

use super::backend::{
    AttachmentFormat, AttachmentKind, FilterMode, RenderBackend, RenderTarget, RenderbufferHandle,
    TextureDesc, TextureHandle,
};
use crate::error::{RendererError, RendererResult};

/// Storage chosen for an attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Texture,
    Renderbuffer,
}

/// Backing GPU object of a generated attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentStorage {
    Texture(TextureHandle),
    Renderbuffer(RenderbufferHandle),
}

/// Declared attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentSpec {
    pub format: AttachmentFormat,
    pub storage: StorageKind,
    pub filter: FilterMode,
}

impl AttachmentSpec {
    pub fn texture(format: AttachmentFormat) -> Self {
        Self {
            format,
            storage: StorageKind::Texture,
            filter: FilterMode::Linear,
        }
    }

    pub fn renderbuffer(format: AttachmentFormat) -> Self {
        Self {
            format,
            storage: StorageKind::Renderbuffer,
            filter: FilterMode::Nearest,
        }
    }
}

#[derive(Debug, Clone)]
struct Attachment {
    spec: AttachmentSpec,
    storage: Option<AttachmentStorage>,
}

/// Render target made of color and depth/stencil attachments
#[derive(Debug, Clone, Default)]
pub struct Framebuffer {
    attachments: Vec<Attachment>,
    width: u32,
    height: u32,
}

impl Framebuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare another attachment. Has no effect on already generated storage
    /// until the next [`Framebuffer::generate`].
    pub fn with_attachment(mut self, spec: AttachmentSpec) -> Self {
        self.attachments.push(Attachment {
            spec,
            storage: None,
        });
        self
    }

    /// One color texture plus a depth-stencil renderbuffer, generated.
    ///
    /// Quad draws never attach the depth-stencil storage, so it does not
    /// enable depth testing; paint order comes from layers alone.
    pub fn basic<B: RenderBackend>(backend: &mut B, width: u32, height: u32) -> RendererResult<Self> {
        let mut framebuffer = Self::new()
            .with_attachment(AttachmentSpec::texture(AttachmentFormat::Rgba8))
            .with_attachment(AttachmentSpec::renderbuffer(AttachmentFormat::Depth24Stencil8));
        framebuffer.generate(backend, width, height)?;
        Ok(framebuffer)
    }

    /// A single color texture, generated
    pub fn basic_2d<B: RenderBackend>(
        backend: &mut B,
        width: u32,
        height: u32,
    ) -> RendererResult<Self> {
        let mut framebuffer =
            Self::new().with_attachment(AttachmentSpec::texture(AttachmentFormat::Rgba8));
        framebuffer.generate(backend, width, height)?;
        Ok(framebuffer)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_generated(&self) -> bool {
        self.attachments.iter().any(|a| a.storage.is_some())
    }

    /// Storage of every attachment in declaration order
    pub fn storages(&self) -> impl Iterator<Item = Option<AttachmentStorage>> + '_ {
        self.attachments.iter().map(|a| a.storage)
    }

    /// Create storage for every declared attachment, releasing any previous storage
    pub fn generate<B: RenderBackend>(
        &mut self,
        backend: &mut B,
        width: u32,
        height: u32,
    ) -> RendererResult<()> {
        let color_count = self
            .attachments
            .iter()
            .filter(|a| a.spec.format.kind() == AttachmentKind::Color)
            .count();
        if color_count == 0 {
            return Err(RendererError::Framebuffer(
                "at least one color attachment is required".to_string(),
            ));
        }
        let max = backend.limits().max_color_attachments as usize + 2;
        if self.attachments.len() > max {
            return Err(RendererError::Framebuffer(format!(
                "{} attachments exceed the maximum of {}",
                self.attachments.len(),
                max
            )));
        }
        if width == 0 || height == 0 {
            return Err(RendererError::Framebuffer(format!(
                "invalid size {}x{}",
                width, height
            )));
        }

        self.release(backend);

        for index in 0..self.attachments.len() {
            let spec = self.attachments[index].spec;
            let storage = match Self::create_storage(backend, spec, width, height) {
                Ok(storage) => storage,
                Err(e) => {
                    self.release(backend);
                    return Err(e);
                }
            };
            self.attachments[index].storage = Some(storage);
        }

        self.width = width;
        self.height = height;
        log::debug!(
            "[Framebuffer::generate] {}x{} with {} attachments",
            width,
            height,
            self.attachments.len()
        );
        Ok(())
    }

    fn create_storage<B: RenderBackend>(
        backend: &mut B,
        spec: AttachmentSpec,
        width: u32,
        height: u32,
    ) -> RendererResult<AttachmentStorage> {
        match spec.storage {
            StorageKind::Texture => {
                let format = spec.format.pixel_format().ok_or_else(|| {
                    RendererError::Framebuffer(format!(
                        "{:?} attachments must use renderbuffer storage",
                        spec.format
                    ))
                })?;
                let handle = backend.create_texture(
                    &TextureDesc {
                        label: "Framebuffer Color",
                        width,
                        height,
                        format,
                        filter: spec.filter,
                        render_target: true,
                    },
                    None,
                )?;
                Ok(AttachmentStorage::Texture(handle))
            }
            StorageKind::Renderbuffer => {
                let handle = backend.create_renderbuffer(width, height, spec.format)?;
                Ok(AttachmentStorage::Renderbuffer(handle))
            }
        }
    }

    fn release<B: RenderBackend>(&mut self, backend: &mut B) {
        for attachment in &mut self.attachments {
            match attachment.storage.take() {
                Some(AttachmentStorage::Texture(handle)) => backend.destroy_texture(handle),
                Some(AttachmentStorage::Renderbuffer(handle)) => {
                    backend.destroy_renderbuffer(handle)
                }
                None => {}
            }
        }
    }

    /// Regenerate storage at a new size. A no-op when the size is unchanged.
    pub fn resize<B: RenderBackend>(
        &mut self,
        backend: &mut B,
        width: u32,
        height: u32,
    ) -> RendererResult<()> {
        if self.is_generated() && width == self.width && height == self.height {
            return Ok(());
        }
        self.generate(backend, width, height)
    }

    /// Texture of the `n`th color attachment
    pub fn color_texture(&self, n: usize) -> Option<TextureHandle> {
        self.attachments
            .iter()
            .filter(|a| a.spec.format.kind() == AttachmentKind::Color)
            .nth(n)
            .and_then(|a| match a.storage {
                Some(AttachmentStorage::Texture(handle)) => Some(handle),
                _ => None,
            })
    }

    /// Direct subsequent draws into color attachment 0
    pub fn bind<B: RenderBackend>(&self, backend: &mut B) -> RendererResult<()> {
        let target = self.color_texture(0).ok_or_else(|| {
            RendererError::Framebuffer(
                "color attachment 0 is not a generated texture".to_string(),
            )
        })?;
        backend.set_render_target(RenderTarget::Texture(target))
    }

    /// Return to drawing into the surface
    pub fn unbind<B: RenderBackend>(&self, backend: &mut B) -> RendererResult<()> {
        backend.set_render_target(RenderTarget::Surface)
    }

    /// Release all storage. The declaration is kept, so the framebuffer can be
    /// generated again.
    pub fn delete<B: RenderBackend>(&mut self, backend: &mut B) {
        self.release(backend);
        self.width = 0;
        self.height = 0;
    }
}
