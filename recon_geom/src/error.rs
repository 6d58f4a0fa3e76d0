use thiserror::Error as ThisError;

/// Precondition-violation tier of the error model (spec tier 1): invalid
/// arguments, degenerate input, or structurally empty collections. Both
/// reconstruction cores propagate these with `?` up to `main`.
#[derive(Debug, ThisError)]
pub enum GeometryError {
    #[error("degenerate triangle: zero or near-zero area")]
    DegenerateTriangle,
    #[error("circumcenter undefined for collinear points")]
    CollinearPoints,
    #[error("plane fit requires at least 3 points, got {0}")]
    TooFewPointsForPlane(usize),
    #[error("axis-aligned bounding box is empty")]
    EmptyAabb,
}
