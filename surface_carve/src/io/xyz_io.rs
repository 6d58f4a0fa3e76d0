//! Reads the `.xyz` point cloud and its companion pose list.
//!
//! A real `.mad` pose reader is out of scope (external, consumed only via an
//! abstract iterator per the data model); this reads an informal stand-in
//! text file instead, the same way the floor-plan binary's pose reader does.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use recon_geom::Point3;
use surface_carve_lib::Sample;

/// One pose per line: `x y z`. The line's position in the file is the pose
/// index referenced by `.xyz` samples.
pub fn read_poses(path: &Path, limit: usize) -> Result<Vec<Point3>> {
    let text = fs::read_to_string(path).with_context(|| format!("reading pose file {}", path.display()))?;
    let mut poses = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 3 {
            continue;
        }
        let x: f64 = fields[0].parse()?;
        let y: f64 = fields[1].parse()?;
        let z: f64 = fields[2].parse()?;
        poses.push(Point3::new(x, y, z));
        if poses.len() >= limit {
            break;
        }
    }
    Ok(poses)
}

/// `.xyz` samples: one per line, `x y z r g b pose_index timestamp serial`.
/// Only position, pose index, and timestamp are used here; colour and serial
/// are read only to stay in sync with the line format.
pub fn read_samples(path: &Path, poses: &[Point3]) -> Result<Vec<Sample>> {
    let text = fs::read_to_string(path).with_context(|| format!("reading point cloud {}", path.display()))?;
    let mut samples = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 9 {
            continue;
        }
        let x: f64 = fields[0].parse()?;
        let y: f64 = fields[1].parse()?;
        let z: f64 = fields[2].parse()?;
        let pose_index: u32 = fields[6].parse()?;
        let timestamp: u64 = fields[7].parse()?;
        let pose = match poses.get(pose_index as usize) {
            Some(p) => *p,
            // the pose was dropped by a pose-count limit, or the file
            // simply doesn't carry one for this sample; skip it
            None => continue,
        };
        samples.push(Sample { pos: Point3::new(x, y, z), pose, pose_index, timestamp });
    }
    Ok(samples)
}
