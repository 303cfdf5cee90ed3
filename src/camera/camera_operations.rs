//! Camera operations - Pure DOP functions
//!
//! All functions are pure: they take data, return new data, no side effects.

use super::camera_data::PixelCameraData;
use glam::{Mat4, Vec2, Vec3};

// ============================================================================
// INITIALIZATION
// ============================================================================

/// Camera at the world origin with no zoom
pub fn init_pixel_camera(screen_width: u32, screen_height: u32) -> PixelCameraData {
    PixelCameraData {
        screen_size: Vec2::new(screen_width as f32, screen_height as f32),
        ..Default::default()
    }
}

// ============================================================================
// VIEW/PROJECTION MATRICES
// ============================================================================

/// Orthographic projection with (0, 0) at the top-left and Y pointing down
pub fn build_projection_matrix(camera: &PixelCameraData) -> Mat4 {
    Mat4::orthographic_rh(
        0.0,
        camera.screen_size.x,
        camera.screen_size.y,
        0.0,
        -1.0,
        1.0,
    )
}

/// `scale(zoom) * translate(-position)`
pub fn build_view_matrix(camera: &PixelCameraData) -> Mat4 {
    Mat4::from_scale(Vec3::new(camera.zoom, camera.zoom, 1.0))
        * Mat4::from_translation((-camera.position).extend(0.0))
}

/// Matrix passed to `Renderer2D::begin_scene`
pub fn build_view_projection(camera: &PixelCameraData) -> Mat4 {
    build_projection_matrix(camera) * build_view_matrix(camera)
}

// ============================================================================
// UPDATES
// ============================================================================

/// Update the viewport size (e.g., on window resize)
pub fn resize(camera: &PixelCameraData, width: u32, height: u32) -> PixelCameraData {
    let mut new_camera = *camera;
    new_camera.screen_size = Vec2::new(width as f32, height as f32);
    new_camera
}

/// Move by a world-space delta
pub fn pan(camera: &PixelCameraData, delta: Vec2) -> PixelCameraData {
    let mut new_camera = *camera;
    new_camera.position += delta;
    new_camera
}

/// Set the zoom. Non-positive values are ignored.
pub fn set_zoom(camera: &PixelCameraData, zoom: f32) -> PixelCameraData {
    let mut new_camera = *camera;
    if zoom > 0.0 {
        new_camera.zoom = zoom;
    }
    new_camera
}

/// Change the zoom by `delta`, unless the result would not be positive
pub fn add_zoom(camera: &PixelCameraData, delta: f32) -> PixelCameraData {
    set_zoom(camera, camera.zoom + delta)
}

// ============================================================================
// QUERIES
// ============================================================================

/// World-space size of the visible region
pub fn visible_size(camera: &PixelCameraData) -> Vec2 {
    camera.screen_size / camera.zoom
}

/// Whether a world-space rectangle overlaps the visible region
pub fn can_see(camera: &PixelCameraData, position: Vec2, size: Vec2) -> bool {
    let view_min = camera.position;
    let view_max = camera.position + visible_size(camera);
    let max = position + size;

    position.x < view_max.x && max.x > view_min.x && position.y < view_max.y && max.y > view_min.y
}

/// Convert a screen pixel to world space
pub fn screen_to_world(camera: &PixelCameraData, screen: Vec2) -> Vec2 {
    camera.position + screen / camera.zoom
}

/// Log camera context for debugging
pub fn log_camera_context(camera: &PixelCameraData) {
    log::debug!(
        "[Camera] Position: ({:.1}, {:.1}) | Zoom: {:.2} | Screen: {}x{}",
        camera.position.x,
        camera.position.y,
        camera.zoom,
        camera.screen_size.x,
        camera.screen_size.y
    );
}
