//! Axis-aligned bounding boxes in 2D and 3D.

use crate::error::GeometryError;
use crate::{Point2, Point3};

/// An axis-aligned bounding box in 2D, used by the quadtree to size its root
/// and by the boundary/alpha-edge extraction to bound a cell set.
#[derive(Clone, Debug, PartialEq)]
pub struct Aabb2 {
    min: Point2,
    max: Point2,
}

impl Aabb2 {
    /// Builds the smallest AABB enclosing every point in `points`.
    ///
    /// # Errors
    /// Returns [`GeometryError::EmptyAabb`] if `points` is empty.
    pub fn from_points(points: &[Point2]) -> Result<Self, GeometryError> {
        let mut iter = points.iter();
        let first = iter.next().ok_or(GeometryError::EmptyAabb)?;
        let mut aabb = Aabb2 {
            min: *first,
            max: *first,
        };
        for p in iter {
            aabb.extend(p);
        }
        Ok(aabb)
    }

    /// Extends this box to also contain `p`.
    pub fn extend(&mut self, p: &Point2) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
    }

    pub fn min(&self) -> Point2 {
        self.min
    }

    pub fn max(&self) -> Point2 {
        self.max
    }

    pub fn center(&self) -> Point2 {
        (self.min + self.max) * 0.5
    }

    /// Half the length of the longer side; the quadtree uses this to size a
    /// square root node that still contains the whole point set.
    pub fn half_extent(&self) -> f64 {
        let d = self.max - self.min;
        d.x.max(d.y) * 0.5
    }

    pub fn contains(&self, p: &Point2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// True iff the AABB of the segment `a`-`b` overlaps this box; used as the
    /// early-out before the four explicit edge-intersection tests in
    /// `quadtree::raytrace`.
    pub fn intersects_segment_aabb(&self, a: &Point2, b: &Point2) -> bool {
        let seg_min_x = a.x.min(b.x);
        let seg_max_x = a.x.max(b.x);
        let seg_min_y = a.y.min(b.y);
        let seg_max_y = a.y.max(b.y);
        seg_min_x <= self.max.x
            && seg_max_x >= self.min.x
            && seg_min_y <= self.max.y
            && seg_max_y >= self.min.y
    }
}

/// An axis-aligned bounding box in 3D, used to size the background voxel grid's
/// implicit domain and by the region triangulator to pick a quadtree resolution.
#[derive(Clone, Debug, PartialEq)]
pub struct Aabb3 {
    min: Point3,
    max: Point3,
}

impl Aabb3 {
    pub fn from_points(points: &[Point3]) -> Result<Self, GeometryError> {
        let mut iter = points.iter();
        let first = iter.next().ok_or(GeometryError::EmptyAabb)?;
        let mut aabb = Aabb3 {
            min: *first,
            max: *first,
        };
        for p in iter {
            aabb.extend(p);
        }
        Ok(aabb)
    }

    pub fn extend(&mut self, p: &Point3) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.min.z = self.min.z.min(p.z);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
        self.max.z = self.max.z.max(p.z);
    }

    /// Grows the box uniformly on every side by `margin`; used to pad a
    /// domain AABB so a particle/sample's full kernel support or a carving
    /// ray's truncation margin stays inside the domain.
    pub fn grow_uniformly(&mut self, margin: f64) {
        let m = Point3::new(margin, margin, margin);
        self.min -= m;
        self.max += m;
    }

    pub fn min(&self) -> Point3 {
        self.min
    }

    pub fn max(&self) -> Point3 {
        self.max
    }

    pub fn center(&self) -> Point3 {
        (self.min + self.max) * 0.5
    }

    /// Radius of the smallest cube (in the L-infinity norm) centred at
    /// `center` that encloses this box; used by the region triangulator to
    /// size its two-colour quadtree to the next power of two.
    pub fn linf_radius_from(&self, center: &Point3) -> f64 {
        let d0 = (self.min - center).iter().cloned().fold(0.0_f64, |a, b| a.max(b.abs()));
        let d1 = (self.max - center).iter().cloned().fold(0.0_f64, |a, b| a.max(b.abs()));
        d0.max(d1)
    }

    pub fn contains(&self, p: &Point3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aabb2_from_points_and_extend() {
        let pts = vec![Point2::new(0.0, 0.0), Point2::new(2.0, -1.0), Point2::new(1.0, 3.0)];
        let aabb = Aabb2::from_points(&pts).unwrap();
        assert_eq!(aabb.min(), Point2::new(0.0, -1.0));
        assert_eq!(aabb.max(), Point2::new(2.0, 3.0));
    }

    #[test]
    fn aabb2_empty_errors() {
        assert!(matches!(Aabb2::from_points(&[]), Err(GeometryError::EmptyAabb)));
    }

    #[test]
    fn aabb3_grow_uniformly() {
        let mut aabb = Aabb3::from_points(&[Point3::new(0.0, 0.0, 0.0)]).unwrap();
        aabb.grow_uniformly(1.0);
        assert_eq!(aabb.min(), Point3::new(-1.0, -1.0, -1.0));
        assert_eq!(aabb.max(), Point3::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn segment_aabb_overlap() {
        let aabb = Aabb2::from_points(&[Point2::new(0.0, 0.0), Point2::new(10.0, 10.0)]).unwrap();
        assert!(aabb.intersects_segment_aabb(&Point2::new(-5.0, 5.0), &Point2::new(5.0, 5.0)));
        assert!(!aabb.intersects_segment_aabb(&Point2::new(-5.0, -5.0), &Point2::new(-1.0, -1.0)));
    }
}
