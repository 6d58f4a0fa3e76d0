pub mod constants;
pub mod dgrid;
pub mod error;
pub mod mesher;
pub mod pipeline;
pub mod region;
pub mod region_quadtree;
pub mod voxel;

pub use dgrid::{DGrid, Sample};
pub use error::{DgridError, MesherError, PipelineError};
pub use mesher::{assign_regions, FaceGraph, RegionAssignment};
pub use pipeline::{mesh_from_grid, run, CarveConfig, CarveOutput};
pub use region::{triangulate, Mesh, RegionInfo};
pub use voxel::{FaceState, VoxelId};
