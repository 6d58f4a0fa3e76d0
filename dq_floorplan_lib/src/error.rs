use thiserror::Error as ThisError;

/// Tier-1 (precondition violation) and tier-3 (invariant corruption) errors
/// for the quadtree and triangulation. Tier-2 "topology refusal" outcomes
/// (edge-collapse / boundary-vertex-removal preconditions) are modeled
/// separately as [`crate::tri_rep::CollapseOutcome`], since those are
/// expected, non-fatal control flow rather than error propagation.
#[derive(Debug, ThisError)]
pub enum TriangulationError {
    #[error("triangulation requires at least 2 vertices, got {0}")]
    TooFewVertices(usize),
    #[error("vertex index {0} out of range")]
    VertexOutOfRange(u32),
    #[error(transparent)]
    Geometry(#[from] recon_geom::GeometryError),
    #[error("point location could not make progress (stochastic walk looped)")]
    LocateLoop,
    #[error("cavity link-ring has fewer than 3 edges after search")]
    DegenerateCavity,
    #[error("link-ring invariant violated: {0}")]
    LinkRingCorruption(String),
    #[error("triangulation invariant violated: {0}")]
    Invariant(String),
}

/// Errors surfaced by `tri_rep` operations that are not the expected
/// "topology refusal" control flow (see [`crate::tri_rep::CollapseOutcome`]).
#[derive(Debug, ThisError)]
pub enum TriRepError {
    #[error(transparent)]
    Triangulation(#[from] TriangulationError),
    #[error("triangle key {0:?} not found in tri_rep")]
    UnknownTriangle((u32, u32, u32)),
    #[error("tri_rep invariant violated: {0}")]
    Invariant(String),
}

#[derive(Debug, ThisError)]
pub enum PipelineError {
    #[error(transparent)]
    Triangulation(#[from] TriangulationError),
    #[error(transparent)]
    TriRep(#[from] TriRepError),
    #[error(transparent)]
    Geometry(#[from] recon_geom::GeometryError),
    #[error("cell graph has no populated cells to triangulate")]
    EmptyCellGraph,
}
