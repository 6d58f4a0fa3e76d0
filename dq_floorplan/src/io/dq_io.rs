//! Reads the `.dq` quadtree file and its companion pose list.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use dq_floorplan_lib::{Pose, QuadTree};
use recon_geom::Point2;

pub fn read_quadtree(path: &Path) -> Result<QuadTree> {
    let text = fs::read_to_string(path).with_context(|| format!("reading quadtree file {}", path.display()))?;
    QuadTree::read_dq(&text).with_context(|| format!("parsing quadtree file {}", path.display()))
}

/// Parses the informal pose companion file: one `x y height timestamp` per
/// line. Not part of the external interface contract (pose ingestion is the
/// `.mad` reader's job, out of scope here) -- this exists only so the binary
/// has a concrete way to supply poses to the pipeline without requiring a
/// full `.mad` reader to be written.
pub fn read_poses(path: &Path, limit: usize) -> Result<Vec<Pose>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let text = fs::read_to_string(path).with_context(|| format!("reading pose file {}", path.display()))?;
    let mut poses = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 {
            continue;
        }
        let x: f64 = fields[0].parse()?;
        let y: f64 = fields[1].parse()?;
        let height: f64 = fields[2].parse()?;
        let timestamp: u64 = fields[3].parse()?;
        poses.push(Pose {
            pos: Point2::new(x, y),
            height,
            timestamp,
        });
        if poses.len() >= limit {
            break;
        }
    }
    Ok(poses)
}
