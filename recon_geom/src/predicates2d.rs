//! Robust-enough 2D predicates (C1). These are the textbook determinant forms,
//! not adaptive-precision arithmetic: the source this crate is grounded on
//! resolves degeneracies by policy at the call site rather than by
//! perturbation, and this port keeps that division of responsibility.

use crate::error::GeometryError;
use crate::Point2;

/// Sign of a 2D orientation test. `Ccw`/`Cw` mean strictly counter-/clockwise;
/// `Collinear` means the determinant is exactly zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Orientation {
    Ccw,
    Cw,
    Collinear,
}

impl Orientation {
    fn from_det(det: f64) -> Self {
        if det > 0.0 {
            Orientation::Ccw
        } else if det < 0.0 {
            Orientation::Cw
        } else {
            Orientation::Collinear
        }
    }
}

/// `(px-rx)(qy-ry) - (py-ry)(qx-rx)`. Positive iff `p, q, r` are
/// counter-clockwise, negative iff clockwise, zero iff collinear.
pub fn orient2d(p: Point2, q: Point2, r: Point2) -> f64 {
    (p.x - r.x) * (q.y - r.y) - (p.y - r.y) * (q.x - r.x)
}

pub fn orientation(p: Point2, q: Point2, r: Point2) -> Orientation {
    Orientation::from_det(orient2d(p, q, r))
}

/// Standard 3x3 determinant expansion of the incircle test. For CCW `p, q, r`,
/// positive means `s` lies strictly inside their circumcircle, negative means
/// strictly outside, and zero means exactly on it. A zero result must never be
/// treated as "inside" by callers (spec invariant): cavity expansion during
/// Delaunay insertion stops on ties rather than growing through them.
pub fn incircle(p: Point2, q: Point2, r: Point2, s: Point2) -> f64 {
    let psx = p.x - s.x;
    let psy = p.y - s.y;
    let qsx = q.x - s.x;
    let qsy = q.y - s.y;
    let rsx = r.x - s.x;
    let rsy = r.y - s.y;

    let pss = psx * psx + psy * psy;
    let qss = qsx * qsx + qsy * qsy;
    let rss = rsx * rsx + rsy * rsy;

    psx * (qsy * rss - qss * rsy) - psy * (qsx * rss - qss * rsx) + pss * (qsx * rsy - qsy * rsx)
}

/// Twice the signed area of triangle `(p, q, r)`.
pub fn signed_area2(p: Point2, q: Point2, r: Point2) -> f64 {
    orient2d(p, q, r)
}

/// Squared Euclidean distance between two points.
pub fn dist_sq(p: Point2, q: Point2) -> f64 {
    let d = p - q;
    d.x * d.x + d.y * d.y
}

/// Point-in-triangle test used while walking the triangulation toward a point
/// location. `p`, `q`, or `r` being `None` signals that corner is the ghost
/// vertex (the point at infinity); the ghost-adjacent edge is then skipped and
/// only the two finite edges are tested, so a point "outside the hull, on the
/// correct side" still reads as inside the (infinite) ghost triangle.
pub fn intriangle(p: Option<Point2>, q: Option<Point2>, r: Option<Point2>, s: Point2) -> bool {
    let opq = p.zip(q).map(|(p, q)| orient2d(p, q, s));
    let oqr = q.zip(r).map(|(q, r)| orient2d(q, r, s));
    let orp = r.zip(p).map(|(r, p)| orient2d(r, p, s));

    match (p, q, r) {
        (None, _, _) => oqr.map(|v| v >= 0.0).unwrap_or(true),
        (_, None, _) => orp.map(|v| v >= 0.0).unwrap_or(true),
        (_, _, None) => opq.map(|v| v >= 0.0).unwrap_or(true),
        _ => opq.unwrap() >= 0.0 && oqr.unwrap() >= 0.0 && orp.unwrap() >= 0.0,
    }
}

/// Circumcenter and squared circumradius of a (non-degenerate) triangle.
///
/// # Errors
/// Returns [`GeometryError::DegenerateTriangle`] if the three points are
/// collinear (zero area); the caller is expected to guard against this before
/// calling, since a degenerate triangle has no finite circumcenter.
pub fn circumcenter(p: Point2, q: Point2, r: Point2) -> Result<(Point2, f64), GeometryError> {
    let ax = p.x - r.x;
    let ay = p.y - r.y;
    let bx = q.x - r.x;
    let by = q.y - r.y;

    let d = 2.0 * (ax * by - ay * bx);
    if d.abs() < crate::APPROX_ZERO {
        return Err(GeometryError::DegenerateTriangle);
    }

    let a2 = ax * ax + ay * ay;
    let b2 = bx * bx + by * by;

    let ux = (by * a2 - ay * b2) / d;
    let uy = (ax * b2 - bx * a2) / d;

    let center = Point2::new(r.x + ux, r.y + uy);
    let radius_sq = ux * ux + uy * uy;
    Ok((center, radius_sq))
}

/// Properly-crossing segment intersection of `(v0, v1)` and `(w0, w1)`.
/// Returns `None` for parallel (including collinear-overlapping) segments or
/// for segments whose infinite-line intersection lies outside either segment.
/// Vertical segments are handled as an explicit branch to avoid dividing by a
/// zero run.
pub fn segment_intersect(v0: Point2, v1: Point2, w0: Point2, w1: Point2) -> Option<Point2> {
    if v0 == v1 || w0 == w1 {
        return None;
    }

    let v_vert = v0.x == v1.x;
    let w_vert = w0.x == w1.x;

    let intersect = if v_vert && w_vert {
        return None;
    } else if v_vert {
        let w_slope = (w1.y - w0.y) / (w1.x - w0.x);
        let w_y_off = w0.y - w_slope * w0.x;
        Point2::new(v0.x, w_slope * v0.x + w_y_off)
    } else if w_vert {
        let v_slope = (v1.y - v0.y) / (v1.x - v0.x);
        let v_y_off = v0.y - v_slope * v0.x;
        Point2::new(w0.x, v_slope * w0.x + v_y_off)
    } else {
        let v_slope = (v1.y - v0.y) / (v1.x - v0.x);
        let w_slope = (w1.y - w0.y) / (w1.x - w0.x);
        if v_slope == w_slope {
            return None;
        }
        let v_y_off = v0.y - v_slope * v0.x;
        let w_y_off = w0.y - w_slope * w0.x;
        let x = (w_y_off - v_y_off) / (v_slope - w_slope);
        Point2::new(x, v_slope * x + v_y_off)
    };

    if !within_segment_x(v0, v1, intersect.x) || !within_segment_x(w0, w1, intersect.x) {
        return None;
    }

    Some(intersect)
}

fn within_segment_x(a: Point2, b: Point2, x: f64) -> bool {
    if a.x < b.x {
        x >= a.x && x <= b.x
    } else {
        x <= a.x && x >= b.x
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orient2d_ccw_cw_collinear() {
        let a = Point2::new(0.0, 0.0);
        let b = Point2::new(1.0, 0.0);
        let c = Point2::new(0.0, 1.0);
        assert_eq!(orientation(a, b, c), Orientation::Ccw);
        assert_eq!(orientation(a, c, b), Orientation::Cw);
        assert_eq!(orientation(a, b, Point2::new(2.0, 0.0)), Orientation::Collinear);
    }

    #[test]
    fn incircle_matches_expected_sign() {
        // Unit circle through (1,0),(0,1),(-1,0) in CCW order.
        let p = Point2::new(1.0, 0.0);
        let q = Point2::new(0.0, 1.0);
        let r = Point2::new(-1.0, 0.0);
        assert!(incircle(p, q, r, Point2::new(0.0, 0.0)) > 0.0);
        assert!(incircle(p, q, r, Point2::new(0.0, -2.0)) < 0.0);
        assert!(incircle(p, q, r, Point2::new(0.0, -1.0)).abs() < 1e-9);
    }

    #[test]
    fn circumcenter_of_right_triangle() {
        let (c, r2) = circumcenter(
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(0.0, 2.0),
        )
        .unwrap();
        assert!((c - Point2::new(1.0, 1.0)).norm() < 1e-9);
        assert!((r2 - 2.0).abs() < 1e-9);
    }

    #[test]
    fn circumcenter_collinear_errors() {
        let res = circumcenter(Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), Point2::new(2.0, 0.0));
        assert!(matches!(res, Err(GeometryError::DegenerateTriangle)));
    }

    #[test]
    fn segment_intersection_crossing() {
        let x = segment_intersect(
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 2.0),
            Point2::new(0.0, 2.0),
            Point2::new(2.0, 0.0),
        )
        .unwrap();
        assert!((x - Point2::new(1.0, 1.0)).norm() < 1e-9);
    }

    #[test]
    fn segment_intersection_parallel_is_none() {
        assert!(segment_intersect(
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(0.0, 1.0),
            Point2::new(1.0, 1.0),
        )
        .is_none());
    }

    #[test]
    fn segment_intersection_vertical_branch() {
        let x = segment_intersect(
            Point2::new(1.0, -1.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 0.0),
        )
        .unwrap();
        assert!((x - Point2::new(1.0, 0.0)).norm() < 1e-9);
    }

    #[test]
    fn intriangle_ignores_ghost_corner() {
        let q = Point2::new(1.0, 0.0);
        let r = Point2::new(0.0, 1.0);
        assert!(intriangle(None, Some(q), Some(r), Point2::new(0.1, 0.1)));
        assert!(!intriangle(None, Some(q), Some(r), Point2::new(-1.0, -1.0)));
    }
}
