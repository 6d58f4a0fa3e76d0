//!
//! Shared geometric kernel for the two reconstruction cores built on top of this crate:
//! the 2D floor-plan pipeline (incremental Delaunay triangulation over a quadtree) and
//! the 3D surface-carve pipeline (voxel carving and planar-region meshing). Neither
//! pipeline talks to the other's types directly; everything in common -- robust
//! predicates, axis-aligned bounding boxes, plane fitting by SVD of a corner
//! covariance, and the hash-map alias used for stable-id lookups -- lives here.
//!

pub mod aabb;
/// Robust 2D orientation/incircle predicates and segment intersection.
pub mod predicates2d;
/// Plane fitting (SVD of a 3x3 corner covariance) shared by the voxel-face mesher
/// and the region triangulator.
pub mod plane;
/// Generic union-find, reused by the floor-plan cell graph and the surface-carve
/// mesh connectivity check.
pub mod union_find;
mod error;

pub use aabb::{Aabb2, Aabb3};
pub use error::GeometryError;
pub use nalgebra;
pub use plane::{fit_plane, Plane};
pub use union_find::UnionFind;

use nalgebra::{Vector2, Vector3};

/// A 2D point or direction. Directions (normals) are not enforced to be unit length;
/// callers that need a unit normal must normalize explicitly.
pub type Point2 = Vector2<f64>;
/// A 3D point or direction.
pub type Point3 = Vector3<f64>;

pub(crate) type HashState = fxhash::FxBuildHasher;
/// Deterministic-iteration-order-free hash map used throughout both cores for
/// id-keyed lookups (triangle keys, voxel coordinates, face keys). Iteration order
/// is not relied upon anywhere it would affect output; algorithms that need a
/// reproducible order sort explicitly (see `dq_floorplan_lib::reordering`).
pub type MapType<K, V> = std::collections::HashMap<K, V, HashState>;
/// Matching hash set alias.
pub type SetType<K> = std::collections::HashSet<K, HashState>;

/// Constructs an empty [`MapType`].
pub fn new_map<K, V>() -> MapType<K, V> {
    MapType::with_hasher(HashState::default())
}

/// Constructs an empty [`SetType`].
pub fn new_set<K>() -> SetType<K> {
    SetType::with_hasher(HashState::default())
}

/// Cosine-of-angle threshold above which two directions are considered parallel.
/// 0.9998 corresponds to about 1 degree; the two pipelines use slightly different
/// values for their own parallel tests, so this is only the kernel-level default
/// used by [`plane`] utilities.
pub const PARALLEL_THRESHOLD: f64 = 0.95;
/// Cosine-of-angle threshold below which two directions are considered perpendicular.
/// 0.087 corresponds to about 85 degrees.
pub const PERPENDICULAR_THRESHOLD: f64 = 0.09;
/// Generic "close enough to zero" tolerance for degenerate-geometry checks.
pub const APPROX_ZERO: f64 = 1e-7;
