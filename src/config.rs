//! Renderer configuration
//!
//! Loaded from TOML. Every field has a default so a partial file (or no file at
//! all) yields a usable configuration.

use crate::error::{RendererError, RendererResult};
use serde::Deserialize;
use std::path::Path;

/// Default number of quads that fit in one vertex/index buffer upload
pub const DEFAULT_MAX_QUADS: u32 = 10_000;

/// Default border width replicated around every packed image
pub const DEFAULT_ATLAS_MARGIN: u32 = 2;

/// Default atlas channel count (RGBA)
pub const DEFAULT_ATLAS_CHANNELS: u8 = 4;

/// Main renderer configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Buffer capacity in quads. Scenes larger than this are split into
    /// several draw calls.
    pub max_quads: u32,

    /// Color used by `Renderer2D::clear`
    pub clear_color: [f32; 4],

    /// Atlas packing settings
    pub atlas: AtlasConfig,
}

/// Texture atlas settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AtlasConfig {
    /// Border width (pixels) replicated around every packed image
    pub margin: u32,

    /// Sort pending images by area (descending) before packing. Registry
    /// atlases place each image as it is prepared, so for them the order only
    /// applies when `refresh_atlases` repacks.
    pub sort_by_size: bool,

    /// Channel count of the packed image (1, 3 or 4)
    pub channel_count: u8,

    /// Maximum atlas dimension. Clamped to the device limit; `None` uses the
    /// device limit directly.
    pub max_size: Option<u32>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            max_quads: DEFAULT_MAX_QUADS,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            atlas: AtlasConfig::default(),
        }
    }
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            margin: DEFAULT_ATLAS_MARGIN,
            sort_by_size: true,
            channel_count: DEFAULT_ATLAS_CHANNELS,
            max_size: None,
        }
    }
}

impl RendererConfig {
    /// Parse and validate a configuration from TOML text
    pub fn from_toml_str(text: &str) -> RendererResult<Self> {
        let config: RendererConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file
    pub fn load(path: impl AsRef<Path>) -> RendererResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_toml_str(&text)?;
        log::info!(
            "[RendererConfig::load] Loaded {} (max_quads={}, atlas margin={})",
            path.as_ref().display(),
            config.max_quads,
            config.atlas.margin
        );
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> RendererResult<()> {
        if self.max_quads == 0 {
            return Err(RendererError::InvalidConfig {
                field: "max_quads".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        // u32 index buffer: 4 vertices per quad must stay addressable
        if self.max_quads > u32::MAX / 4 {
            return Err(RendererError::InvalidConfig {
                field: "max_quads".to_string(),
                reason: format!("must not exceed {}", u32::MAX / 4),
            });
        }
        self.atlas.validate()
    }
}

impl AtlasConfig {
    /// Check value ranges
    pub fn validate(&self) -> RendererResult<()> {
        if !matches!(self.channel_count, 1 | 3 | 4) {
            return Err(RendererError::InvalidConfig {
                field: "atlas.channel_count".to_string(),
                reason: format!("{} is not one of 1, 3, 4", self.channel_count),
            });
        }
        if self.max_size == Some(0) {
            return Err(RendererError::InvalidConfig {
                field: "atlas.max_size".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = RendererConfig::default();
        assert_eq!(config.max_quads, DEFAULT_MAX_QUADS);
        assert_eq!(config.atlas.margin, 2);
        assert!(config.atlas.sort_by_size);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config = RendererConfig::from_toml_str(
            r#"
            max_quads = 64

            [atlas]
            margin = 1
            max_size = 512
            "#,
        )
        .unwrap();
        assert_eq!(config.max_quads, 64);
        assert_eq!(config.atlas.margin, 1);
        assert_eq!(config.atlas.max_size, Some(512));
        assert_eq!(config.atlas.channel_count, 4);
        assert_eq!(config.clear_color, [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_invalid_values() {
        let err = RendererConfig::from_toml_str("max_quads = 0").unwrap_err();
        assert!(matches!(err, RendererError::InvalidConfig { .. }));

        let err = RendererConfig::from_toml_str("[atlas]\nchannel_count = 2").unwrap_err();
        assert!(matches!(err, RendererError::InvalidConfig { .. }));

        let err = RendererConfig::from_toml_str("max_quads = \"many\"").unwrap_err();
        assert!(matches!(err, RendererError::ConfigParse(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "clear_color = [0.1, 0.2, 0.3, 1.0]").unwrap();
        let config = RendererConfig::load(file.path()).unwrap();
        assert_eq!(config.clear_color, [0.1, 0.2, 0.3, 1.0]);

        let missing = RendererConfig::load(file.path().with_extension("missing"));
        assert!(matches!(missing, Err(RendererError::Io(_))));
    }
}
