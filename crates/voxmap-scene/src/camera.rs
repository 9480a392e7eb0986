//! Camera input to the tile manager.

use glam::{Mat4, Vec3};

use crate::Frustum;

/// A camera snapshot for one update tick: world position plus the combined
/// reverse-Z view-projection matrix the frustum is derived from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraState {
    /// Camera position in world space.
    pub position: Vec3,
    /// Combined projection * view matrix.
    pub view_projection: Mat4,
}

impl CameraState {
    /// Create a camera from a position and a precomputed view-projection.
    pub fn new(position: Vec3, view_projection: Mat4) -> Self {
        Self {
            position,
            view_projection,
        }
    }

    /// A perspective camera at `position` looking at `target`.
    ///
    /// Uses reverse-Z: `near` maps to depth 1 and `far` to depth 0.
    pub fn perspective(
        position: Vec3,
        target: Vec3,
        fov_y: f32,
        aspect_ratio: f32,
        near: f32,
        far: f32,
    ) -> Self {
        let forward = (target - position).normalize_or(Vec3::NEG_Z);
        // Looking straight down makes +Y degenerate as an up vector.
        let up = if forward.cross(Vec3::Y).length_squared() < 1e-6 {
            Vec3::NEG_Z
        } else {
            Vec3::Y
        };
        let view = Mat4::look_to_rh(position, forward, up);
        let projection = Mat4::perspective_rh(fov_y, aspect_ratio, far, near);
        Self::new(position, projection * view)
    }

    /// Horizontal (XZ) footprint of the camera in world space.
    pub fn footprint(&self) -> (f64, f64) {
        (self.position.x as f64, self.position.z as f64)
    }

    /// The view frustum for culling.
    pub fn frustum(&self) -> Frustum {
        Frustum::from_view_projection(&self.view_projection)
    }
}
