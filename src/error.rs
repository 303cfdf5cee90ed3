//! Error handling for ren2d
//!
//! Every fallible operation returns [`RendererResult`]. Usage errors (calling an
//! operation in the wrong renderer state, referencing a texture that was never
//! issued) are reported as errors instead of panicking so the caller decides
//! whether to abort.

use thiserror::Error;

/// Main error type for the renderer
#[derive(Debug, Error)]
pub enum RendererError {
    // State errors
    #[error("State error: expected {expected}, actual {actual}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },

    // Texture errors
    #[error("Invalid image: {0}")]
    InvalidImage(String),
    #[error("Texture not found: {id}")]
    TextureNotFound { id: u32 },
    #[error("Texture {id} is not ready, its atlas has not been built")]
    TextureNotReady { id: u32 },

    // Atlas errors
    #[error("Atlas full: cannot place {width}x{height} image")]
    AtlasFull { width: u32, height: u32 },
    #[error("Image {width}x{height} can never fit an atlas of maximum dimension {max}")]
    ImageTooLarge { width: u32, height: u32, max: u32 },
    #[error("Atlas limit reached: at most {max} atlases can be bound at once")]
    AtlasLimitReached { max: u32 },
    #[error("Atlas has no placeable image")]
    EmptyAtlas,

    // Configuration errors
    #[error("Invalid config: {field} ({reason})")]
    InvalidConfig { field: String, reason: String },
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    // GPU errors
    #[error("Backend error: {0}")]
    Backend(String),
    #[error("Resource not found: {kind} {id}")]
    ResourceNotFound { kind: &'static str, id: u32 },
    #[error("Framebuffer error: {0}")]
    Framebuffer(String),

    // System errors
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Type alias for Results in ren2d
pub type RendererResult<T> = Result<T, RendererError>;

/// Convert Option to Result with context
pub trait OptionExt<T> {
    fn ok_or_renderer<F>(self, f: F) -> RendererResult<T>
    where
        F: FnOnce() -> RendererError;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_renderer<F>(self, f: F) -> RendererResult<T>
    where
        F: FnOnce() -> RendererError,
    {
        self.ok_or_else(f)
    }
}

/// Extension trait for mapping foreign GPU errors into backend errors
pub trait BackendContext<T> {
    fn backend_context(self, operation: &str) -> RendererResult<T>;
}

impl<T, E> BackendContext<T> for Result<T, E>
where
    E: std::fmt::Display,
{
    fn backend_context(self, operation: &str) -> RendererResult<T> {
        self.map_err(|e| RendererError::Backend(format!("{}: {}", operation, e)))
    }
}
