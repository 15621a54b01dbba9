use serde::Serialize;

use crate::{Interval, Vec3};

/// Axis-aligned bounding box used for mesh and scene extents.
///
/// An AABB is defined by three intervals (one per axis). Unlike a ray tracing
/// box it is never padded: a flat mesh keeps a zero-width axis.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct Aabb {
    pub x: Interval,
    pub y: Interval,
    pub z: Interval,
}

impl Aabb {
    /// Create an empty AABB (contains nothing).
    pub fn empty() -> Self {
        Self::EMPTY
    }

    /// Smallest box containing every point of the iterator.
    pub fn from_iter<I: IntoIterator<Item = Vec3>>(points: I) -> Self {
        let mut aabb = Self::EMPTY;
        for p in points {
            aabb.include(p);
        }
        aabb
    }

    /// Grow the box so it contains `p`.
    pub fn include(&mut self, p: Vec3) {
        self.x.include(p.x);
        self.y.include(p.y);
        self.z.include(p.z);
    }

    /// Create an AABB that surrounds two other AABBs.
    pub fn surrounding(box0: &Aabb, box1: &Aabb) -> Self {
        Self {
            x: Interval::surrounding(&box0.x, &box1.x),
            y: Interval::surrounding(&box0.y, &box1.y),
            z: Interval::surrounding(&box0.z, &box1.z),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty() || self.y.is_empty() || self.z.is_empty()
    }

    pub fn min(&self) -> Vec3 {
        Vec3::new(self.x.min, self.y.min, self.z.min)
    }

    pub fn max(&self) -> Vec3 {
        Vec3::new(self.x.max, self.y.max, self.z.max)
    }

    /// The 8 corners, used when transforming the box.
    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min(), self.max());
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }

    pub const EMPTY: Aabb = Aabb {
        x: Interval::EMPTY,
        y: Interval::EMPTY,
        z: Interval::EMPTY,
    };
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aabb_from_iter_keeps_flat_axis() {
        let aabb = Aabb::from_iter([Vec3::ZERO, Vec3::X, Vec3::Y]);
        assert_eq!(aabb.z, Interval::new(0.0, 0.0));
        assert_eq!(aabb.max(), Vec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_aabb_empty() {
        assert!(Aabb::empty().is_empty());
        assert!(Aabb::from_iter(std::iter::empty()).is_empty());
    }

    #[test]
    fn test_aabb_surrounding() {
        let box1 = Aabb::from_iter([Vec3::ZERO, Vec3::splat(5.0)]);
        let box2 = Aabb::from_iter([Vec3::splat(3.0), Vec3::splat(10.0)]);
        let surrounding = Aabb::surrounding(&box1, &box2);

        assert_eq!(surrounding.x.min, 0.0);
        assert_eq!(surrounding.x.max, 10.0);
    }
}
