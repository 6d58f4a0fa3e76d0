//! Three-tier error model, mirroring the floor-plan pipeline's: precondition
//! violations propagate with `?`, mesher/region refusals are plain enum
//! variants the caller is expected to handle, and invariant corruption is a
//! fatal, named variant.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DgridError {
    #[error("voxel grid resolution must be positive, got {0}")]
    InvalidResolution(f64),
    #[error("geometry: {0}")]
    Geometry(#[from] recon_geom::GeometryError),
    #[error("point cloud file: {0}")]
    Io(String),
}

#[derive(Debug, Error)]
pub enum MesherError {
    #[error("dgrid: {0}")]
    Dgrid(#[from] DgridError),
    #[error("geometry: {0}")]
    Geometry(#[from] recon_geom::GeometryError),
    #[error("face graph invariant violated: {0}")]
    Invariant(String),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("dgrid: {0}")]
    Dgrid(#[from] DgridError),
    #[error("mesher: {0}")]
    Mesher(#[from] MesherError),
    #[error("empty voxel grid")]
    EmptyGrid,
}
