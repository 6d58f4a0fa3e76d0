//! Voxel-face mesher (C8): groups the grid's exposed faces into near-planar
//! regions and a triangulated, corner-snapped mesh skeleton that the region
//! triangulator refines into the final surface.
//!
//! Every face is canonicalised to one of the three negative-direction faces
//! on its owning voxel before it ever reaches the face graph, so a `+x`
//! face raised on the solid side of a boundary and the `-x` face of its
//! empty neighbour are always the same `FaceKey`.

use recon_geom::plane::{centroid_of, fit_plane, intersect_three_planes, intersect_two_planes, max_deviation};
use recon_geom::{new_map, new_set, MapType, Plane, Point3, SetType, UnionFind};

use crate::constants::{
    DEFAULT_SMALL_REGION_FACE_COUNT, LAX_PARALLEL_THRESHOLD, VOXEL_FACE_MAX_ERR_BOUNDARY_THRESHOLD,
    VOXEL_FACE_MAX_ERR_THRESHOLD,
};
use crate::dgrid::{face_corner_ids, face_corners, DGrid};
use crate::voxel::{canonical_face, face_normal, FaceState, VoxelId, FACE_OFFSETS};

pub type FaceKey = (VoxelId, FaceState);
pub type CornerId = (i32, i32, i32);

pub(crate) fn axis_of(f: FaceState) -> usize {
    match f {
        FaceState::NEG_X | FaceState::POS_X => 0,
        FaceState::NEG_Y | FaceState::POS_Y => 1,
        _ => 2,
    }
}

fn unit(axis: usize) -> (i32, i32, i32) {
    match axis {
        0 => (1, 0, 0),
        1 => (0, 1, 0),
        _ => (0, 0, 1),
    }
}

fn add(a: VoxelId, b: (i32, i32, i32)) -> VoxelId {
    (a.0 + b.0, a.1 + b.1, a.2 + b.2)
}

fn scale(u: (i32, i32, i32), k: i32) -> (i32, i32, i32) {
    (u.0 * k, u.1 * k, u.2 * k)
}

/// The exposed faces of a grid, plus their edge adjacency. Each face has up
/// to four edge neighbours, one per in-plane direction; for each direction
/// up to three candidate positions are tried (same plane, stepped out,
/// stepped in), since a boundary wall need not be flat -- a twelve-way
/// lookup in total.
pub struct FaceGraph {
    pub faces: Vec<FaceKey>,
    /// Edges between faces lying in the exact same plane (for strict
    /// flood-fill).
    pub exact_neighbors: Vec<Vec<usize>>,
    /// All edges, including stepped ones (for coalescing and swallow).
    pub all_neighbors: Vec<Vec<usize>>,
}

impl FaceGraph {
    pub fn build(grid: &DGrid) -> Self {
        let mut faces = Vec::new();
        let mut index: MapType<FaceKey, usize> = new_map();
        for (&v, &state) in grid.boundary_voxels() {
            for (bit, _) in FACE_OFFSETS {
                if state.contains(bit) {
                    let key = canonical_face(v, bit);
                    if index.contains_key(&key) {
                        continue;
                    }
                    index.insert(key, faces.len());
                    faces.push(key);
                }
            }
        }

        let mut exact_neighbors = vec![Vec::new(); faces.len()];
        let mut all_neighbors = vec![Vec::new(); faces.len()];

        for (i, &(v, f)) in faces.iter().enumerate() {
            let axis_n = axis_of(f);
            let in_plane: Vec<usize> = (0..3).filter(|&a| a != axis_n).collect();
            for &a in &in_plane {
                for da in [-1, 1] {
                    let shift_inplane = scale(unit(a), da);
                    for step in [0, 1, -1] {
                        let shift_axis = scale(unit(axis_n), step);
                        let candidate = add(add(v, shift_inplane), shift_axis);
                        if let Some(&j) = index.get(&(candidate, f)) {
                            all_neighbors[i].push(j);
                            if step == 0 {
                                exact_neighbors[i].push(j);
                            }
                        }
                    }
                }
            }
        }

        FaceGraph { faces, exact_neighbors, all_neighbors }
    }
}

fn group_by_root(roots: &[usize]) -> MapType<usize, Vec<usize>> {
    let mut groups: MapType<usize, Vec<usize>> = new_map();
    for (i, &r) in roots.iter().enumerate() {
        groups.entry(r).or_insert_with(Vec::new).push(i);
    }
    groups
}

fn region_corners(graph: &FaceGraph, members: &[usize], vs: f64) -> Vec<Point3> {
    members.iter().flat_map(|&fi| face_corners(graph.faces[fi].0, graph.faces[fi].1, vs)).collect()
}

fn fit_region_plane(graph: &FaceGraph, members: &[usize], vs: f64) -> Option<Plane> {
    let corners = region_corners(graph, members, vs);
    let mut plane = fit_plane(&corners).ok()?;
    let reference = face_normal(graph.faces[members[0]].1);
    plane.orient_toward(&reference);
    Some(plane)
}

/// Phase 1: strict coplanar flood-fill. Faces only merge across an exact
/// (same-plane) edge here; stepped edges are left for phase 2.
fn flood_fill_exact(graph: &FaceGraph) -> UnionFind {
    let mut uf = UnionFind::new(graph.faces.len());
    for (i, neighbors) in graph.exact_neighbors.iter().enumerate() {
        for &j in neighbors {
            uf.union(i, j);
        }
    }
    uf
}

/// Phase 2: merges adjacent regions whose combined corner set fits a single
/// plane within [`VOXEL_FACE_MAX_ERR_THRESHOLD`].
fn coalesce(graph: &FaceGraph, uf: &mut UnionFind, vs: f64) {
    loop {
        let roots: Vec<usize> = (0..graph.faces.len()).map(|i| uf.find(i)).collect();
        let groups = group_by_root(&roots);
        let mut tried: SetType<(usize, usize)> = new_set();
        let mut merged_any = false;

        for (i, neighbors) in graph.all_neighbors.iter().enumerate() {
            let ra = roots[i];
            for &j in neighbors {
                let rb = roots[j];
                if ra == rb {
                    continue;
                }
                let key = (ra.min(rb), ra.max(rb));
                if !tried.insert(key) {
                    continue;
                }
                let combined: Vec<Point3> = groups[&ra]
                    .iter()
                    .chain(groups[&rb].iter())
                    .flat_map(|&fi| face_corners(graph.faces[fi].0, graph.faces[fi].1, vs))
                    .collect();
                if let Ok(plane) = fit_plane(&combined) {
                    if max_deviation(&plane, &combined) <= VOXEL_FACE_MAX_ERR_THRESHOLD {
                        uf.union(ra, rb);
                        merged_any = true;
                    }
                }
            }
        }
        if !merged_any {
            break;
        }
    }
}

/// Phase 3: a looser pass that merges adjacent regions whose fitted planes
/// are merely near-parallel, ignoring positional error, plus reassigns any
/// region whose plane fit failed (degenerate corner set) into its first
/// available neighbour so it is never left stranded.
fn lax_coalesce(graph: &FaceGraph, uf: &mut UnionFind, vs: f64) {
    loop {
        let roots: Vec<usize> = (0..graph.faces.len()).map(|i| uf.find(i)).collect();
        let groups = group_by_root(&roots);
        let planes: MapType<usize, Option<Plane>> =
            groups.iter().map(|(&r, members)| (r, fit_region_plane(graph, members, vs))).collect();

        let mut tried: SetType<(usize, usize)> = new_set();
        let mut merged_any = false;

        for (i, neighbors) in graph.all_neighbors.iter().enumerate() {
            let ra = roots[i];
            for &j in neighbors {
                let rb = roots[j];
                if ra == rb {
                    continue;
                }
                let key = (ra.min(rb), ra.max(rb));
                if !tried.insert(key) {
                    continue;
                }

                let should_merge = match (&planes[&ra], &planes[&rb]) {
                    (Some(pa), Some(pb)) => pa.normal.dot(&pb.normal).abs() >= LAX_PARALLEL_THRESHOLD,
                    // a degenerate region merges into any neighbour at all
                    _ => true,
                };
                if should_merge {
                    uf.union(ra, rb);
                    merged_any = true;
                }
            }
        }
        if !merged_any {
            break;
        }
    }
}

/// Phase 4: folds any region smaller than [`DEFAULT_SMALL_REGION_FACE_COUNT`]
/// faces into its most nearly-parallel neighbour, regardless of fit error --
/// a last-resort cleanup so slivers never survive into the final mesh.
fn swallow_small_regions(graph: &FaceGraph, uf: &mut UnionFind, vs: f64) {
    loop {
        let roots: Vec<usize> = (0..graph.faces.len()).map(|i| uf.find(i)).collect();
        let groups = group_by_root(&roots);
        let planes: MapType<usize, Option<Plane>> =
            groups.iter().map(|(&r, members)| (r, fit_region_plane(graph, members, vs))).collect();

        let mut merged = false;
        for (&root, members) in &groups {
            if members.len() >= DEFAULT_SMALL_REGION_FACE_COUNT {
                continue;
            }
            let mut best: Option<(usize, f64)> = None;
            for &fi in members {
                for &nj in &graph.all_neighbors[fi] {
                    let nr = roots[nj];
                    if nr == root || groups[&nr].len() < DEFAULT_SMALL_REGION_FACE_COUNT {
                        continue;
                    }
                    let score = match (&planes[&root], &planes[&nr]) {
                        (Some(pa), Some(pb)) => pa.normal.dot(&pb.normal).abs(),
                        _ => 0.0,
                    };
                    if best.map_or(true, |(_, s)| score > s) {
                        best = Some((nr, score));
                    }
                }
            }
            if let Some((nr, _)) = best {
                uf.union(root, nr);
                merged = true;
            }
        }
        if !merged {
            break;
        }
    }
}

fn worst_cos_dihedral(planes: &[&Plane]) -> f64 {
    let mut worst = 1.0_f64;
    for i in 0..planes.len() {
        for j in (i + 1)..planes.len() {
            worst = worst.min(planes[i].normal.dot(&planes[j].normal).abs());
        }
    }
    worst
}

/// Phase 5: snaps each lattice corner touched by two or more regions to
/// their shared intersection, clamped so a poorly-conditioned corner (near-
/// parallel planes) is left at its raw position instead of flying off.
fn snap_vertices(graph: &FaceGraph, uf: &mut UnionFind, vs: f64) -> MapType<CornerId, Point3> {
    let roots: Vec<usize> = (0..graph.faces.len()).map(|i| uf.find(i)).collect();
    let groups = group_by_root(&roots);
    let planes: MapType<usize, Plane> = groups
        .iter()
        .filter_map(|(&r, members)| fit_region_plane(graph, members, vs).map(|p| (r, p)))
        .collect();

    let mut corner_regions: MapType<CornerId, SetType<usize>> = new_map();
    for (i, &(v, f)) in graph.faces.iter().enumerate() {
        for id in face_corner_ids(v, f) {
            corner_regions.entry(id).or_insert_with(new_set).insert(roots[i]);
        }
    }

    let mut positions: MapType<CornerId, Point3> = new_map();
    for (&id, region_ids) in &corner_regions {
        let raw = Point3::new(id.0 as f64 * vs, id.1 as f64 * vs, id.2 as f64 * vs);
        let owning: Vec<&Plane> = region_ids.iter().filter_map(|r| planes.get(r)).collect();

        let snapped = match owning.len() {
            0 | 1 => raw,
            2 => intersect_two_planes(owning[0], owning[1])
                .ok()
                .map(|(p, d)| p + d * d.dot(&(raw - p)))
                .unwrap_or(raw),
            3 => intersect_three_planes(owning[0], owning[1], owning[2]).unwrap_or(raw),
            _ => {
                // Over-determined: average the first three planes'
                // intersection with the centroid of all plane points as a
                // stable fallback if that triple is degenerate.
                intersect_three_planes(owning[0], owning[1], owning[2])
                    .unwrap_or_else(|_| centroid_of(&owning.iter().map(|p| p.point).collect::<Vec<_>>()))
            }
        };

        let bound = VOXEL_FACE_MAX_ERR_BOUNDARY_THRESHOLD * vs * (1.0 - worst_cos_dihedral(&owning)).powi(2);
        let final_pos = if (snapped - raw).norm() <= bound.max(vs * 1e-6) { snapped } else { raw };
        positions.insert(id, final_pos);
    }
    positions
}

/// Output of the five merge phases: the face graph, each face's final
/// region root, and the snapped position of every lattice corner. The
/// region triangulator consumes this directly; nothing here is triangle
/// data yet.
pub struct RegionAssignment {
    pub graph: FaceGraph,
    pub roots: Vec<usize>,
    pub vertex_positions: MapType<CornerId, Point3>,
}

impl RegionAssignment {
    pub fn groups(&self) -> MapType<usize, Vec<usize>> {
        group_by_root(&self.roots)
    }

    pub fn region_plane(&self, members: &[usize], vs: f64) -> Option<Plane> {
        fit_region_plane(&self.graph, members, vs)
    }
}

/// Runs the merge phases and corner snapping. Strict flood-fill and corner
/// snapping always run; `simplify` additionally runs error-bounded
/// coalescing, lax parallel-only coalescing, and small-region swallowing.
/// With `simplify = false` every exactly-coplanar patch of faces becomes its
/// own region and nothing more -- the denser "uniform" mesh the surface-carve
/// binary's `-u` path asks for, as opposed to its default simplified output.
pub fn assign_regions(grid: &DGrid, vs: f64, simplify: bool) -> RegionAssignment {
    let graph = FaceGraph::build(grid);
    let mut uf = flood_fill_exact(&graph);
    if simplify {
        coalesce(&graph, &mut uf, vs);
        lax_coalesce(&graph, &mut uf, vs);
        swallow_small_regions(&graph, &mut uf, vs);
    }
    let vertex_positions = snap_vertices(&graph, &mut uf, vs);
    let roots: Vec<usize> = (0..graph.faces.len()).map(|i| uf.find(i)).collect();
    RegionAssignment { graph, roots, vertex_positions }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voxel::FaceState;

    fn single_wall_grid() -> DGrid {
        let mut grid = DGrid::new(1.0).unwrap();
        for x in 0..4 {
            for z in 0..4 {
                grid.set_state((x, 0, z), FaceState::NEG_Y);
            }
        }
        grid
    }

    #[test]
    fn flat_wall_coalesces_into_one_region() {
        let grid = single_wall_grid();
        let assignment = assign_regions(&grid, 1.0, true);
        let groups = assignment.groups();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups.values().next().unwrap().len(), 16);
    }

    #[test]
    fn empty_grid_has_no_faces() {
        let grid = DGrid::new(1.0).unwrap();
        let assignment = assign_regions(&grid, 1.0, true);
        assert!(assignment.graph.faces.is_empty());
    }

    #[test]
    fn snapped_corners_stay_on_the_flat_wall_plane() {
        let grid = single_wall_grid();
        let assignment = assign_regions(&grid, 1.0, true);
        for pos in assignment.vertex_positions.values() {
            assert!((pos.y - 0.0).abs() < 1e-9);
        }
    }
}
