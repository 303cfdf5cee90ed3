/// Camera Module - Data-Oriented Programming (DOP) style
///
/// - camera_data.rs: Pure data structures with NO methods
/// - camera_operations.rs: Pure functions that operate on data

pub mod camera_data;
pub mod camera_operations;

// Re-export data structures
pub use camera_data::PixelCameraData;

// Re-export all operations
pub use camera_operations::{
    // Initialization
    init_pixel_camera,

    // View/projection
    build_projection_matrix,
    build_view_matrix,
    build_view_projection,

    // Updates
    add_zoom,
    pan,
    resize,
    set_zoom,

    // Queries
    can_see,
    screen_to_world,
    visible_size,

    // Diagnostics
    log_camera_context,
};
