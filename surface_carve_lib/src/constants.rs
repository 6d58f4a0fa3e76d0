//! Tunable thresholds for the voxel grid, ray carver, and voxel-face mesher.

/// Point cloud is streamed in chunks of this many scans...
pub const NUM_SCANS_PER_FILE_CHUNK: usize = 8000;
/// ...each chunk overlapping the previous by this many scans, so a point
/// near a chunk boundary is never missed by the occlusion set purely
/// because of where the chunk split fell.
pub const OVERLAP_PER_FILE_CHUNK: usize = 3;

/// Default voxel edge length, meters.
pub const DEFAULT_RESOLUTION: f64 = 0.05;
/// Default maximum carving range from a pose, meters.
pub const DEFAULT_RANGE_LIMIT: f64 = 15.0;

/// A boundary voxel whose non-solid-face count falls below this is
/// considered an isolated speck and cleared outright.
pub const OUTLIER_MIN_NEIGHBOR_FACES: u32 = 2;

/// Maximum per-corner deviation from a region's plane allowed during
/// ordinary (non-lax) coalescing, meters.
pub const VOXEL_FACE_MAX_ERR_THRESHOLD: f64 = 0.02;
/// Maximum distance a snapped vertex may drift from its integer corner,
/// scaled by `(1 - cos(worst dihedral))^2`, in voxel-size units.
pub const VOXEL_FACE_MAX_ERR_BOUNDARY_THRESHOLD: f64 = 2.0;

/// Cosine-of-angle threshold used by lax coalescing (phase 3) -- looser
/// than [`recon_geom::PARALLEL_THRESHOLD`]'s strict test, since lax
/// coalescing accepts any near-parallel neighbour regardless of error.
pub const LAX_PARALLEL_THRESHOLD: f64 = recon_geom::PARALLEL_THRESHOLD;

/// Regions with fewer faces than this are folded into their most-parallel
/// large neighbour during small-region swallow.
pub const DEFAULT_SMALL_REGION_FACE_COUNT: usize = 4;

/// Default minimum surviving region area (in world units squared) passed
/// to the triangulator; regions below this are dropped.
pub const DEFAULT_MIN_REGION_AREA: f64 = 0.01;

/// Smallest connected component of the final triangulation considered
/// legitimate rather than numerical noise.
pub const MIN_MESH_UNION_SIZE: usize = 10_000;
