//! Geometry and room-partitioning constants, ported from the original
//! `util/constants.h` and `util/room_parameters.h`.

/// 0.9998 corresponds to about 1 degree.
pub const PARALLEL_THRESHOLD: f64 = 0.95;
/// 0.087 corresponds to about 85 degrees.
pub const PERPENDICULAR_THRESHOLD: f64 = 0.09;
pub const APPROX_ZERO: f64 = 1e-7;

/// Default QEM simplification error threshold, in meters. A negative value
/// disables simplification entirely (matches the `-s` CLI flag's "negative
/// disables" contract).
pub const DEFAULT_SIMPLIFY_THRESHOLD: f64 = 0.05;

/// Assumed wall height used only for visualization fallbacks, never for room
/// height computation (which derives from observed pose heights).
pub const ASSUMED_WALL_HEIGHT: f64 = 3.0;

/// ADA-compliance-derived dimensional constants (meters), used only to derive
/// the room-partitioning thresholds below.
const ADA_MAX_DOOR_OPENING_WIDTH: f64 = 1.2192;
const ADA_PASSING_SPACE: f64 = 1.524;

/// Minimum perimeter (meters) a partitioned room must have to be kept as its
/// own room rather than folded into a neighbor as an "interroom column".
pub const MIN_ROOM_PERIMETER: f64 = 4.0 * ADA_PASSING_SPACE;

/// Minimum valid structural column perimeter (meters); used as the guard
/// below which a connected component of wall edges is filled in rather than
/// kept as free-standing geometry.
pub const MIN_COLUMN_PERIMETER: f64 = 1.016;

/// Smallest circumradius a triangle may have and still seed a room
/// (`find_local_max`). Assumes a local-max circumcircle is at least half the
/// size of the smallest valid room.
pub const MIN_LOCAL_MAX_CIRCUMRADIUS: f64 = ADA_PASSING_SPACE / 4.0;

/// Maximum width (meters) of a boundary between two rooms before the rooms
/// are merged by `unlabel_extra_rooms`. Chosen to accommodate double doors.
pub const MAX_DOOR_WIDTH: f64 = 2.0 * ADA_MAX_DOOR_OPENING_WIDTH;

/// Distance (meters) an occlusion-truncated ray is pulled back from the
/// occluding sample, so the endpoint lands strictly before it rather than on it.
pub const OCCLUSION_EPS: f64 = 1e-4;
