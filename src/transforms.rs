//! Spatial transform carried by every grid buffer
//!
//! Translation, rotation and non-uniform scale composed in T * R * S order
//! (scale first, then rotate, then translate), right-handed, Z up.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Position offset, rotation and non-uniform scale of a grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn new(position: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            position,
            rotation,
            scale,
        }
    }

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// World position of a grid-space point (column, row, elevation)
    pub fn transform_point(&self, local: Vec3) -> Vec3 {
        self.position + self.rotation * (self.scale * local)
    }

    /// Scaled axis in world space, like a column of the model matrix
    pub fn scaled_axis(&self, axis: Vec3) -> Vec3 {
        self.rotation * (axis * self.scale)
    }

    /// Shift the origin by `cells` grid steps along the local X/Y axes.
    pub fn offset_by_cells(&self, cells_x: f32, cells_y: f32) -> Self {
        let offset = self.scaled_axis(Vec3::X) * cells_x + self.scaled_axis(Vec3::Y) * cells_y;
        Self {
            position: self.position + offset,
            ..*self
        }
    }

    pub fn abs_diff_eq(&self, other: &Self, epsilon: f32) -> bool {
        self.position.abs_diff_eq(other.position, epsilon)
            && self.rotation.abs_diff_eq(other.rotation, epsilon)
            && self.scale.abs_diff_eq(other.scale, epsilon)
    }
}
