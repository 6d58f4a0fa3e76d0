//! Command-line surface for the floor-plan binary, and its translation into
//! the library's [`dq_floorplan_lib::FloorplanConfig`].

use std::path::PathBuf;

use clap::Parser;
use dq_floorplan_lib::FloorplanConfig;

/// Reconstructs a 2D floor plan from a populated quadtree of scanned cells.
#[derive(Debug, Parser)]
#[command(name = "dq_floorplan", author, version, about)]
pub struct Cli {
    /// Stem shared by the input `.dq` (and, if present, `.poses`) files.
    pub input: PathBuf,

    /// QEM simplification error threshold, meters. Negative disables
    /// sharps/QEM/straighten simplification entirely.
    #[arg(short = 's', long, default_value_t = dq_floorplan_lib::constants::DEFAULT_SIMPLIFY_THRESHOLD)]
    pub simplify_threshold: f64,

    /// Export only the 2D floor plan; skip the 3D BIM (IDF) writer.
    #[arg(short = '2', long = "flat")]
    pub flat: bool,

    /// Disable occlusion truncation of room interiors (carve-through).
    #[arg(short = 'c', long)]
    pub carve_through: bool,

    /// Allow doors (narrow room borders) to still be merged away.
    #[arg(short = 'd', long)]
    pub allow_door_simplify: bool,

    /// Maximum number of poses to read from the companion pose file.
    #[arg(short = 'n', long, default_value_t = usize::MAX)]
    pub pose_count: usize,

    /// Output path for the `.fp` floor plan; defaults to `<input>.fp`.
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,
}

impl Cli {
    pub fn floorplan_config(&self) -> FloorplanConfig {
        FloorplanConfig {
            simplify_threshold: self.simplify_threshold,
            carve_through: self.carve_through,
            allow_door_simplify: self.allow_door_simplify,
        }
    }

    pub fn dq_path(&self) -> PathBuf {
        self.input.with_extension("dq")
    }

    pub fn poses_path(&self) -> PathBuf {
        self.input.with_extension("poses")
    }

    pub fn fp_output_path(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| self.input.with_extension("fp"))
    }

    pub fn idf_output_path(&self) -> PathBuf {
        self.input.with_extension("idf")
    }
}
