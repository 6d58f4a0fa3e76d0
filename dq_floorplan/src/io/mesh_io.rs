//! Flat 2D export: writes the floor plan's triangles as a z=0 Wavefront OBJ,
//! for viewers that only care about the `-2` (flat) output.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::Result;
use dq_floorplan_lib::TriRep;

pub fn write_obj_2d(path: &Path, rep: &TriRep) -> Result<()> {
    let mut vert_order = recon_geom::new_map();
    let mut verts = Vec::new();
    let mut tris = Vec::new();

    for t in rep.tris.keys() {
        let mut local = [0usize; 3];
        for idx in 0..3 {
            let v = t.get(idx);
            let out_idx = *vert_order.entry(v).or_insert_with(|| {
                verts.push(rep.pos(v));
                verts.len()
            });
            local[idx] = out_idx;
        }
        tris.push(local);
    }

    let file = File::create(path)?;
    let mut out = BufWriter::new(file);
    for v in &verts {
        writeln!(out, "v {:.6} {:.6} 0.0", v.x, v.y)?;
    }
    for t in &tris {
        writeln!(out, "f {} {} {}", t[0], t[1], t[2])?;
    }
    Ok(())
}
