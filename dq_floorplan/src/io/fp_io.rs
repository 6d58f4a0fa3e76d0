//! Writes the `.fp` floor-plan text format.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::Result;
use dq_floorplan_lib::{RoomHeight, TriRep};
use recon_geom::{new_map, MapType};

pub fn write_fp(path: &Path, resolution: f64, rep: &TriRep) -> Result<()> {
    let mut vert_order: MapType<u32, usize> = new_map();
    let mut verts = Vec::new();
    let mut tris = Vec::new();

    for t in rep.tris.keys() {
        let mut local = [0usize; 3];
        for idx in 0..3 {
            let v = t.get(idx);
            let out_idx = *vert_order.entry(v).or_insert_with(|| {
                verts.push(rep.pos(v));
                verts.len() - 1
            });
            local[idx] = out_idx;
        }
        tris.push((*t, local));
    }

    let mut tri_index: MapType<_, usize> = new_map();
    for (i, (t, _)) in tris.iter().enumerate() {
        tri_index.insert(*t, i);
    }

    let rooms = rep.get_rooms();

    let file = File::create(path)?;
    let mut out = BufWriter::new(file);

    writeln!(out, "{:.9}", resolution)?;
    writeln!(out, "{}", verts.len())?;
    writeln!(out, "{}", tris.len())?;
    writeln!(out, "{}", rooms.len())?;

    for v in &verts {
        writeln!(out, "{:.9} {:.9}", v.x, v.y)?;
    }
    for (_, local) in &tris {
        writeln!(out, "{} {} {}", local[0], local[1], local[2])?;
    }
    for room in &rooms {
        let root = room.iter().next().copied();
        let height = root.and_then(|r| rep.room_heights.get(&r)).copied().unwrap_or(RoomHeight {
            min_z: 0.0,
            max_z: dq_floorplan_lib::constants::ASSUMED_WALL_HEIGHT,
        });
        let indices: Vec<usize> = room.iter().filter_map(|t| tri_index.get(t).copied()).collect();
        write!(out, "{:.9} {:.9} {}", height.min_z, height.max_z, indices.len())?;
        for i in &indices {
            write!(out, " {}", i)?;
        }
        writeln!(out)?;
    }

    Ok(())
}
