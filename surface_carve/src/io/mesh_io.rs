//! Mesh export: a plain Wavefront OBJ writer, and a PLY writer (ascii or
//! binary) that adds the `element region` block carrying each region's
//! plane and its member triangle and boundary-edge indices.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::Result;
use ply_rs::ply::{Addable, DefaultElement, ElementDef, Encoding, Ply, Property, PropertyDef, PropertyType, ScalarType};
use ply_rs::writer::Writer;
use recon_geom::{new_map, MapType};
use surface_carve_lib::Mesh;

pub fn write_obj(path: &Path, mesh: &Mesh) -> Result<()> {
    let file = File::create(path)?;
    let mut out = BufWriter::new(file);
    for v in &mesh.vertices {
        writeln!(out, "v {:.6} {:.6} {:.6}", v.x, v.y, v.z)?;
    }
    for t in &mesh.triangles {
        writeln!(out, "f {} {} {}", t[0] + 1, t[1] + 1, t[2] + 1)?;
    }
    Ok(())
}

/// The boundary edges of `members`: edges used by exactly one triangle
/// among them, as unordered vertex-index pairs.
fn region_boundary_edges(mesh: &Mesh, members: &[usize]) -> Vec<(u32, u32)> {
    let mut count: MapType<(u32, u32), u32> = new_map();
    for &ti in members {
        let t = mesh.triangles[ti];
        for (a, b) in [(t[0], t[1]), (t[1], t[2]), (t[2], t[0])] {
            let key = (a.min(b), a.max(b));
            *count.entry(key).or_insert(0) += 1;
        }
    }
    count.into_iter().filter(|&(_, c)| c == 1).map(|(e, _)| e).collect()
}

pub fn write_ply(path: &Path, mesh: &Mesh, ascii: bool) -> Result<()> {
    let mut ply = Ply::<DefaultElement>::new();
    ply.header.encoding = if ascii { Encoding::Ascii } else { Encoding::BinaryLittleEndian };

    let mut vertex_def = ElementDef::new("vertex".to_string());
    for axis in ["x", "y", "z"] {
        vertex_def.properties.add(PropertyDef::new(axis.to_string(), PropertyType::Scalar(ScalarType::Float)));
    }
    ply.header.elements.add(vertex_def);

    let mut face_def = ElementDef::new("face".to_string());
    face_def
        .properties
        .add(PropertyDef::new("vertex_indices".to_string(), PropertyType::List(ScalarType::UChar, ScalarType::Int)));
    ply.header.elements.add(face_def);

    let mut region_def = ElementDef::new("region".to_string());
    for field in ["nx", "ny", "nz", "px", "py", "pz"] {
        region_def.properties.add(PropertyDef::new(field.to_string(), PropertyType::Scalar(ScalarType::Float)));
    }
    region_def
        .properties
        .add(PropertyDef::new("triangle_indices".to_string(), PropertyType::List(ScalarType::UInt, ScalarType::Int)));
    region_def
        .properties
        .add(PropertyDef::new("edge_indices".to_string(), PropertyType::List(ScalarType::UInt, ScalarType::Int)));
    ply.header.elements.add(region_def);

    let mut vertices = Vec::with_capacity(mesh.vertices.len());
    for v in &mesh.vertices {
        let mut elem = DefaultElement::new();
        elem.insert("x".to_string(), Property::Float(v.x as f32));
        elem.insert("y".to_string(), Property::Float(v.y as f32));
        elem.insert("z".to_string(), Property::Float(v.z as f32));
        vertices.push(elem);
    }

    let mut faces = Vec::with_capacity(mesh.triangles.len());
    for t in &mesh.triangles {
        let mut elem = DefaultElement::new();
        elem.insert("vertex_indices".to_string(), Property::ListInt(vec![t[0] as i32, t[1] as i32, t[2] as i32]));
        faces.push(elem);
    }

    let mut members_by_region: MapType<usize, Vec<usize>> = new_map();
    for (ti, &r) in mesh.triangle_region.iter().enumerate() {
        members_by_region.entry(r).or_insert_with(Vec::new).push(ti);
    }

    let mut regions = Vec::with_capacity(mesh.regions.len());
    for (r, info) in mesh.regions.iter().enumerate() {
        let empty: Vec<usize> = Vec::new();
        let members = members_by_region.get(&r).unwrap_or(&empty);
        let edges = region_boundary_edges(mesh, members);

        let mut elem = DefaultElement::new();
        elem.insert("nx".to_string(), Property::Float(info.plane.normal.x as f32));
        elem.insert("ny".to_string(), Property::Float(info.plane.normal.y as f32));
        elem.insert("nz".to_string(), Property::Float(info.plane.normal.z as f32));
        elem.insert("px".to_string(), Property::Float(info.plane.point.x as f32));
        elem.insert("py".to_string(), Property::Float(info.plane.point.y as f32));
        elem.insert("pz".to_string(), Property::Float(info.plane.point.z as f32));
        elem.insert(
            "triangle_indices".to_string(),
            Property::ListInt(members.iter().map(|&i| i as i32).collect()),
        );
        let mut edge_flat = Vec::with_capacity(edges.len() * 2);
        for (a, b) in &edges {
            edge_flat.push(*a as i32);
            edge_flat.push(*b as i32);
        }
        elem.insert("edge_indices".to_string(), Property::ListInt(edge_flat));
        regions.push(elem);
    }

    ply.payload.insert("vertex".to_string(), vertices);
    ply.payload.insert("face".to_string(), faces);
    ply.payload.insert("region".to_string(), regions);
    ply.make_consistent().map_err(|e| anyhow::anyhow!("{}", e))?;

    let mut file = File::create(path)?;
    let writer = Writer::new();
    writer.write_ply(&mut file, &mut ply)?;
    Ok(())
}
