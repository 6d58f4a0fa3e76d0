//! Reads and writes the `.vox` text voxel format: a resolution header
//! followed by one `x y z state` line per boundary voxel.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use surface_carve_lib::{DGrid, FaceState};

pub fn read_vox(path: &Path) -> Result<DGrid> {
    let file = File::open(path).with_context(|| format!("opening voxel file {}", path.display()))?;
    let mut lines = BufReader::new(file).lines();

    let header = lines.next().ok_or_else(|| anyhow!("{}: empty voxel file", path.display()))??;
    let vs: f64 = header.trim().parse().with_context(|| format!("{}: invalid voxel size", path.display()))?;
    let mut grid = DGrid::new(vs).with_context(|| format!("{}: invalid voxel size", path.display()))?;

    for line in lines {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 {
            return Err(anyhow!("{}: malformed voxel line {:?}", path.display(), line));
        }
        let xi: i32 = fields[0].parse()?;
        let yi: i32 = fields[1].parse()?;
        let zi: i32 = fields[2].parse()?;
        let bits: u8 = fields[3].parse()?;
        let state = FaceState::from_bits(bits).ok_or_else(|| anyhow!("{}: invalid face state {}", path.display(), bits))?;
        grid.set_state((xi, yi, zi), state);
    }
    Ok(grid)
}

pub fn write_vox(path: &Path, grid: &DGrid) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating voxel file {}", path.display()))?;
    let mut out = BufWriter::new(file);

    writeln!(out, "{:.9}", grid.vs)?;
    for (v, state) in grid.boundary_voxels() {
        writeln!(out, "{} {} {} {}", v.0, v.1, v.2, state.bits())?;
    }
    Ok(())
}
