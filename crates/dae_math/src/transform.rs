// Transform utilities for Mat4
//
// COLLADA stores matrices row-major and describes lookat/skew transforms by
// their parameters; these helpers turn them into glam column-major matrices.

use glam::{Mat4, Vec3, Vec4};
use crate::Aabb;

/// Extension trait for Mat4 to provide additional transform utilities
pub trait Mat4Ext {
    /// Build a matrix from 16 row-major values (COLLADA `<matrix>` order).
    fn from_row_major(values: &[f32; 16]) -> Mat4;

    /// Camera-style lookat: places an object at `eye` looking at `target`.
    ///
    /// This is the inverse of a view matrix, so the object's local -Z axis
    /// points at the target.
    fn from_lookat(eye: Vec3, target: Vec3, up: Vec3) -> Mat4;

    /// Transform an axis-aligned bounding box.
    /// Computes the bounding box of all 8 transformed corners.
    fn transform_aabb(&self, aabb: &Aabb) -> Aabb;
}

impl Mat4Ext for Mat4 {
    fn from_row_major(values: &[f32; 16]) -> Mat4 {
        Mat4::from_cols_array(values).transpose()
    }

    fn from_lookat(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
        if (target - eye).length_squared() <= f32::EPSILON {
            return Mat4::from_translation(eye);
        }
        Mat4::look_at_rh(eye, target, up).inverse()
    }

    fn transform_aabb(&self, aabb: &Aabb) -> Aabb {
        if aabb.is_empty() {
            return *aabb;
        }
        Aabb::from_iter(aabb.corners().iter().map(|&c| self.transform_point3(c)))
    }
}

/// RenderMan-style skew: shear along `translation_axis` so that
/// `rotation_axis` is rotated by `angle_degrees`.
///
/// Degenerate axis combinations fall back to the identity.
pub fn skew_matrix(angle_degrees: f32, rotation_axis: Vec3, translation_axis: Vec3) -> Mat4 {
    let t = translation_axis.normalize_or_zero();
    if t == Vec3::ZERO {
        return Mat4::IDENTITY;
    }

    let a = rotation_axis;
    let along = t * a.dot(t);
    let perp = (a - along).normalize_or_zero();
    let an1 = a.dot(perp);
    let an2 = a.dot(t);
    if an1.abs() <= f32::EPSILON {
        return Mat4::IDENTITY;
    }

    let (sin, cos) = angle_degrees.to_radians().sin_cos();
    let rx = an1 * cos - an2 * sin;
    let ry = an1 * sin + an2 * cos;
    if rx <= f32::EPSILON {
        return Mat4::IDENTITY;
    }

    let alpha = ry / rx - an2 / an1;
    let column = |j: usize, unit: Vec3| {
        let c = unit + t * (alpha * perp[j]);
        Vec4::new(c.x, c.y, c.z, 0.0)
    };
    Mat4::from_cols(
        column(0, Vec3::X),
        column(1, Vec3::Y),
        column(2, Vec3::Z),
        Vec4::W,
    )
}
