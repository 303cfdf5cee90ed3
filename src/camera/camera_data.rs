//! Camera data structures - Pure DOP
//!
//! NO METHODS. Just data.
//! All transformations happen in camera_operations.rs

use glam::Vec2;

/// 2D camera over a Y-down pixel space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelCameraData {
    /// World position shown at the top-left corner of the screen
    pub position: Vec2,

    /// Magnification, always greater than zero
    pub zoom: f32,

    /// Viewport size in pixels
    pub screen_size: Vec2,
}

impl Default for PixelCameraData {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            zoom: 1.0,
            screen_size: Vec2::new(1280.0, 720.0),
        }
    }
}
