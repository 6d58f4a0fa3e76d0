//! EnergyPlus IDF writer: a pure serializer over the labelled rooms. Per
//! room: one `Zone`, one `Floor` surface, one `Ceiling` surface (reversed
//! winding), and one `Wall` surface per outermost-boundary edge. Materials
//! and schedules are fixed literals -- this file has no business modeling
//! EnergyPlus's own data model, only emitting it.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::Result;
use dq_floorplan_lib::{RoomHeight, TriRep};

const BOILERPLATE_MATERIAL: &str = r#"Material,
    Generic Wall,            !- Name
    MediumRough,              !- Roughness
    0.2,                       !- Thickness {m}
    0.5,                       !- Conductivity {W/m-K}
    800,                        !- Density {kg/m3}
    900;                         !- Specific Heat {J/kg-K}
"#;

const BOILERPLATE_SCHEDULE: &str = r#"ScheduleTypeLimits,
    Fraction,                 !- Name
    0,                         !- Lower Limit Value
    1,                          !- Upper Limit Value
    Continuous;                 !- Numeric Type
"#;

pub fn write_idf(path: &Path, rep: &TriRep) -> Result<()> {
    let file = File::create(path)?;
    let mut out = BufWriter::new(file);

    writeln!(out, "! generated by dq_floorplan")?;
    writeln!(out, "{}", BOILERPLATE_MATERIAL)?;
    writeln!(out, "{}", BOILERPLATE_SCHEDULE)?;

    let rooms = rep.get_rooms();
    for (room_id, room) in rooms.iter().enumerate() {
        let root = room.iter().next().copied();
        let height = root.and_then(|r| rep.room_heights.get(&r)).copied().unwrap_or(RoomHeight {
            min_z: 0.0,
            max_z: dq_floorplan_lib::constants::ASSUMED_WALL_HEIGHT,
        });

        let zone_name = format!("Room_{}", room_id);
        writeln!(out, "Zone,\n    {};\n", zone_name)?;

        let loops = rep.room_boundary_loops(room);
        let Some(loop_verts) = loops.first() else { continue };

        write_surface(&mut out, &format!("{}_Floor", zone_name), &zone_name, "Floor", loop_verts, rep, height.min_z, false)?;
        write_surface(&mut out, &format!("{}_Ceiling", zone_name), &zone_name, "Ceiling", loop_verts, rep, height.max_z, true)?;

        let m = loop_verts.len();
        for j in 0..m {
            let (a, b) = (loop_verts[j], loop_verts[(j + 1) % m]);
            let name = format!("{}_Wall_{}", zone_name, j);
            write_wall(&mut out, &name, &zone_name, a, b, rep, height.min_z, height.max_z)?;
        }
    }

    Ok(())
}

fn write_surface(
    out: &mut impl Write,
    name: &str,
    zone: &str,
    surface_type: &str,
    loop_verts: &[u32],
    rep: &TriRep,
    z: f64,
    reversed: bool,
) -> Result<()> {
    writeln!(out, "BuildingSurface:Detailed,")?;
    writeln!(out, "    {},            !- Name", name)?;
    writeln!(out, "    {},            !- Surface Type", surface_type)?;
    writeln!(out, "    Generic Wall,            !- Construction Name")?;
    writeln!(out, "    {},            !- Zone Name", zone)?;
    writeln!(out, "    Outdoors,                !- Outside Boundary Condition")?;

    let mut verts: Vec<u32> = loop_verts.to_vec();
    if reversed {
        verts.reverse();
    }
    for v in verts {
        let p = rep.pos(v);
        writeln!(out, "    {:.6}, {:.6}, {:.6},", p.x, p.y, z)?;
    }
    writeln!(out, ";")?;
    writeln!(out)?;
    Ok(())
}

fn write_wall(
    out: &mut impl Write,
    name: &str,
    zone: &str,
    a: u32,
    b: u32,
    rep: &TriRep,
    zmin: f64,
    zmax: f64,
) -> Result<()> {
    let pa = rep.pos(a);
    let pb = rep.pos(b);

    writeln!(out, "BuildingSurface:Detailed,")?;
    writeln!(out, "    {},            !- Name", name)?;
    writeln!(out, "    Wall,                    !- Surface Type")?;
    writeln!(out, "    Generic Wall,            !- Construction Name")?;
    writeln!(out, "    {},            !- Zone Name", zone)?;
    writeln!(out, "    Outdoors,                !- Outside Boundary Condition")?;
    writeln!(out, "    {:.6}, {:.6}, {:.6},", pa.x, pa.y, zmax)?;
    writeln!(out, "    {:.6}, {:.6}, {:.6},", pa.x, pa.y, zmin)?;
    writeln!(out, "    {:.6}, {:.6}, {:.6},", pb.x, pb.y, zmin)?;
    writeln!(out, "    {:.6}, {:.6}, {:.6};", pb.x, pb.y, zmax)?;
    writeln!(out)?;
    Ok(())
}
