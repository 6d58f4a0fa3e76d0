//! Command-line surface for the surface-carve binary, and its translation
//! into the library's [`surface_carve_lib::CarveConfig`].

use std::path::PathBuf;

use clap::Parser;
use surface_carve_lib::constants::{DEFAULT_MIN_REGION_AREA, DEFAULT_RANGE_LIMIT, DEFAULT_RESOLUTION};
use surface_carve_lib::CarveConfig;

/// Reconstructs a 3D surface mesh from raytraced pose/sample pairs, or from
/// an already-carved voxel grid.
#[derive(Debug, Parser)]
#[command(name = "surface_carve", author, version, about)]
pub struct Cli {
    /// Stem shared by the input `.xyz` (and, if present, `.poses`/`.vox`) files.
    pub input: PathBuf,

    /// Voxel resolution, meters.
    #[arg(short = 'r', long, default_value_t = DEFAULT_RESOLUTION)]
    pub resolution: f64,

    /// Padding, in voxels, added around the sample cloud's bounding box when
    /// seeding the region carving is allowed to eat into.
    #[arg(short = 'b', long, default_value_t = 1)]
    pub bounds_padding: i32,

    /// Maximum number of poses to read from the companion pose file.
    #[arg(short = 'n', long, default_value_t = usize::MAX)]
    pub pose_count: usize,

    /// Truncate rays at the nearest occluding sample instead of carving
    /// straight through to the ray's own endpoint.
    #[arg(short = 'p', long)]
    pub point_occlusion: bool,

    /// Read an existing `.vox` grid instead of carving one from `.xyz`.
    #[arg(short = 'v', long = "read-vox")]
    pub read_vox: bool,

    /// Keep only every nth ray.
    #[arg(short = 'd', long)]
    pub downsample: Option<u32>,

    /// Simplify the uniform mesh (only meaningful together with `-u`; the
    /// default non-uniform mesh is already simplified).
    #[arg(short = 's', long)]
    pub simplify_uniform: bool,

    /// Uniform mesh: skip region coalescing and emit one region per
    /// exactly-coplanar patch of faces.
    #[arg(short = 'u', long)]
    pub uniform: bool,

    /// Range limit for point occlusion and sample ingestion, meters.
    #[arg(short = 'm', long, default_value_t = DEFAULT_RANGE_LIMIT)]
    pub range_limit: f64,

    /// Don't chunk the `.xyz` file while reading (kept for CLI compatibility;
    /// chunking is always memory-bounded internally regardless).
    #[arg(short = 'f', long)]
    pub no_chunking: bool,

    /// Write ASCII PLY instead of binary.
    #[arg(short = 'a', long)]
    pub ascii: bool,

    /// Minimum surviving region area, square meters.
    #[arg(short = 'c', long, default_value_t = DEFAULT_MIN_REGION_AREA)]
    pub min_region_area: f64,

    /// Output path for the mesh; defaults to `<input>.ply`.
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Write a Wavefront OBJ instead of PLY.
    #[arg(long)]
    pub obj: bool,
}

impl Cli {
    pub fn carve_config(&self) -> CarveConfig {
        CarveConfig {
            resolution: self.resolution,
            range_limit: self.range_limit,
            point_occlusion: self.point_occlusion,
            downsample: self.downsample,
            simplify: !self.uniform || self.simplify_uniform,
            min_region_area: self.min_region_area,
            bounds_padding: self.bounds_padding,
        }
    }

    pub fn xyz_path(&self) -> PathBuf {
        self.input.with_extension("xyz")
    }

    pub fn poses_path(&self) -> PathBuf {
        self.input.with_extension("poses")
    }

    pub fn vox_path(&self) -> PathBuf {
        self.input.with_extension("vox")
    }

    pub fn mesh_output_path(&self) -> PathBuf {
        let ext = if self.obj { "obj" } else { "ply" };
        self.output.clone().unwrap_or_else(|| self.input.with_extension(ext))
    }
}
