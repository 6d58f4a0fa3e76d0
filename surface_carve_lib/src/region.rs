//! Region triangulator (C9): turns a [`RegionAssignment`] into an indexed
//! triangle mesh.
//!
//! Per region, faces split into two kinds. A face is a *region-boundary*
//! face if an exact edge-neighbour belongs to a different region, or one of
//! its four corners is shared with another region -- those are written out
//! directly as a quad (two triangles), using the mesher's corner-snapped
//! positions so two regions always agree on the seam between them. Every
//! other face is dropped onto a two-colour occupancy quadtree keyed by the
//! region's dominant axis and triangulated there, which is what lets a large
//! flat region collapse to a handful of triangles instead of one quad per
//! voxel face.
//!
//! A final pass removes any duplicate or anti-parallel triangle pair left
//! behind where two regions' boundaries folded onto the same quad during
//! coalescing, and flags (debug-only) any adjacent pair whose normals end up
//! facing almost directly apart.

use log::{debug, warn};
use recon_geom::{new_map, new_set, MapType, Plane, Point3, SetType};

use crate::dgrid::face_corner_ids;
use crate::mesher::{axis_of, CornerId, FaceKey, RegionAssignment};
use crate::region_quadtree::QuadTree;
use crate::voxel::VoxelId;

pub struct RegionInfo {
    pub plane: Plane,
    pub face_count: usize,
    pub area: f64,
}

pub struct Mesh {
    pub vertices: Vec<Point3>,
    pub triangles: Vec<[u32; 3]>,
    pub triangle_region: Vec<usize>,
    pub regions: Vec<RegionInfo>,
}

/// Vertex identity within one triangulation pass: a region-boundary vertex
/// is keyed by its raw lattice corner (shared by construction with whatever
/// region is on the other side), an interior vertex by the `(region, u, v)`
/// cell it came from in that region's own quadtree. `u`/`v` are kept in
/// doubled units so a Steiner vertex at a leaf's half-integer centre still
/// hashes exactly.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
enum VertexKey {
    Boundary(CornerId),
    Quadtree(usize, i64, i64),
}

fn dominant_axis(normal: &Point3) -> usize {
    let a = [normal.x.abs(), normal.y.abs(), normal.z.abs()];
    if a[0] >= a[1] && a[0] >= a[2] {
        0
    } else if a[1] >= a[2] {
        1
    } else {
        2
    }
}

/// The two axes other than `dom`, in ascending order.
fn in_plane_axes(dom: usize) -> (usize, usize) {
    match dom {
        0 => (1, 2),
        1 => (0, 2),
        _ => (0, 1),
    }
}

fn voxel_axis(v: VoxelId, axis: usize) -> i32 {
    match axis {
        0 => v.0,
        1 => v.1,
        _ => v.2,
    }
}

/// Rotates the four corner ids so the lexicographically smallest is first,
/// preserving their cyclic (winding) order. Two quads that meet along a
/// shared edge pick this rotation independently of which voxel or face
/// direction produced them, so they always agree on which diagonal splits
/// the quad into triangles.
fn rotate_to_min_first(ids: [CornerId; 4]) -> [CornerId; 4] {
    let min_at = (0..4).min_by_key(|&i| ids[i]).unwrap();
    let mut rotated = ids;
    for k in 0..4 {
        rotated[k] = ids[(min_at + k) % 4];
    }
    rotated
}

fn intern(vertices: &mut Vec<Point3>, vertex_index: &mut MapType<VertexKey, u32>, key: VertexKey, pos: Point3) -> u32 {
    *vertex_index.entry(key).or_insert_with(|| {
        vertices.push(pos);
        (vertices.len() - 1) as u32
    })
}

fn intern_boundary_corner(
    id: CornerId,
    vs: f64,
    assignment: &RegionAssignment,
    vertices: &mut Vec<Point3>,
    vertex_index: &mut MapType<VertexKey, u32>,
) -> u32 {
    let pos = assignment
        .vertex_positions
        .get(&id)
        .copied()
        .unwrap_or_else(|| Point3::new(id.0 as f64 * vs, id.1 as f64 * vs, id.2 as f64 * vs));
    intern(vertices, vertex_index, VertexKey::Boundary(id), pos)
}

/// Solves the region's plane equation for the dominant-axis coordinate given
/// the other two, so a quadtree vertex -- known only in its own in-plane
/// `(u, v)` -- lands back on the fitted plane rather than some arbitrary
/// fixed depth.
fn unproject(plane: &Plane, dom: usize, au: usize, av: usize, u_world: f64, v_world: f64) -> Point3 {
    let mut p = Point3::new(0.0, 0.0, 0.0);
    p[au] = u_world;
    p[av] = v_world;
    let residual = plane.normal[au] * (p[au] - plane.point[au]) + plane.normal[av] * (p[av] - plane.point[av]);
    p[dom] = plane.point[dom] - residual / plane.normal[dom];
    p
}

/// Faces whose four edge-neighbours span more than one region, or whose
/// corners are shared with another region's faces.
struct BoundaryTest {
    corner_regions: MapType<CornerId, SetType<usize>>,
}

impl BoundaryTest {
    fn build(assignment: &RegionAssignment) -> Self {
        let mut corner_regions: MapType<CornerId, SetType<usize>> = new_map();
        for (fi, &(v, f)) in assignment.graph.faces.iter().enumerate() {
            let root = assignment.roots[fi];
            for id in face_corner_ids(v, f) {
                corner_regions.entry(id).or_insert_with(new_set).insert(root);
            }
        }
        BoundaryTest { corner_regions }
    }

    fn is_boundary(&self, assignment: &RegionAssignment, fi: usize) -> bool {
        let root = assignment.roots[fi];
        if assignment.graph.exact_neighbors[fi].iter().any(|&nj| assignment.roots[nj] != root) {
            return true;
        }
        let (v, f) = assignment.graph.faces[fi];
        face_corner_ids(v, f).iter().any(|id| self.corner_regions.get(id).map_or(false, |s| s.len() > 1))
    }
}

/// Triangulates every region at least `min_region_area` large; smaller
/// regions are dropped (and counted in a debug log) rather than emitted as
/// slivers that [`crate::mesher::swallow_small_regions`] failed to absorb
/// because none of their neighbours qualified.
pub fn triangulate(assignment: &RegionAssignment, vs: f64, min_region_area: f64) -> Mesh {
    let groups = assignment.groups();
    let boundary = BoundaryTest::build(assignment);

    let mut vertices = Vec::new();
    let mut vertex_index: MapType<VertexKey, u32> = new_map();
    let mut triangles = Vec::new();
    let mut triangle_region = Vec::new();
    let mut regions = Vec::new();
    let mut dropped = 0usize;

    for (_, members) in &groups {
        let plane = match assignment.region_plane(members, vs) {
            Some(p) => p,
            None => {
                dropped += 1;
                continue;
            }
        };
        let area = members.len() as f64 * vs * vs;
        if area < min_region_area {
            dropped += 1;
            continue;
        }
        let region_id = regions.len();
        regions.push(RegionInfo { plane, face_count: members.len(), area });

        let dom = dominant_axis(&plane.normal);
        let (au, av) = in_plane_axes(dom);

        let mut boundary_faces: Vec<FaceKey> = Vec::new();
        let mut interior_faces: Vec<FaceKey> = Vec::new();
        for &fi in members {
            let key = assignment.graph.faces[fi];
            if !boundary.is_boundary(assignment, fi) && axis_of(key.1) == dom {
                interior_faces.push(key);
            } else {
                boundary_faces.push(key);
            }
        }

        for &(v, f) in &boundary_faces {
            let ids = rotate_to_min_first(face_corner_ids(v, f));
            let idx: Vec<u32> =
                ids.iter().map(|&id| intern_boundary_corner(id, vs, assignment, &mut vertices, &mut vertex_index)).collect();
            triangles.push([idx[0], idx[1], idx[2]]);
            triangle_region.push(region_id);
            triangles.push([idx[0], idx[2], idx[3]]);
            triangle_region.push(region_id);
        }

        if interior_faces.is_empty() {
            continue;
        }

        let n = interior_faces.len() as f64;
        let sum_u: i64 = interior_faces.iter().map(|&(v, _)| voxel_axis(v, au) as i64).sum();
        let sum_v: i64 = interior_faces.iter().map(|&(v, _)| voxel_axis(v, av) as i64).sum();
        let cu = (sum_u as f64 / n).round() as i32;
        let cv = (sum_v as f64 / n).round() as i32;

        let radius = interior_faces
            .iter()
            .map(|&(v, _)| (voxel_axis(v, au) - cu).unsigned_abs().max((voxel_axis(v, av) - cv).unsigned_abs()) as i64)
            .max()
            .unwrap_or(0)
            .max(1);

        let mut tree = QuadTree::new(radius);
        for &(v, _) in &interior_faces {
            tree.fill_point((voxel_axis(v, au) - cu) as i64, (voxel_axis(v, av) - cv) as i64, true);
        }

        for tri in tree.triangulate() {
            let mut idx = [0u32; 3];
            for (k, &(x2, y2)) in tri.verts.iter().enumerate() {
                let u_world = (cu as f64 + x2 as f64 / 2.0) * vs;
                let v_world = (cv as f64 + y2 as f64 / 2.0) * vs;
                let pos = unproject(&plane, dom, au, av, u_world, v_world);
                let key = VertexKey::Quadtree(region_id, 2 * cu as i64 + x2, 2 * cv as i64 + y2);
                idx[k] = intern(&mut vertices, &mut vertex_index, key, pos);
            }
            triangles.push(idx);
            triangle_region.push(region_id);
        }
    }
    if dropped > 0 {
        debug!("dropped {} regions below minimum area during triangulation", dropped);
    }

    remove_cancelling_pairs(&mut triangles, &mut triangle_region);
    log_anti_parallel_adjacent(&vertices, &triangles);
    Mesh { vertices, triangles, triangle_region, regions }
}

/// Two triangles with the same vertex set (regardless of winding) cancel
/// out; anything repeated more than twice is a real defect elsewhere and is
/// logged rather than silently collapsed to zero.
fn remove_cancelling_pairs(triangles: &mut Vec<[u32; 3]>, triangle_region: &mut Vec<usize>) {
    let mut by_key: MapType<[u32; 3], Vec<usize>> = new_map();
    for (i, t) in triangles.iter().enumerate() {
        let mut key = *t;
        key.sort_unstable();
        by_key.entry(key).or_insert_with(Vec::new).push(i);
    }

    let mut drop: SetType<usize> = new_set();
    for (key, idxs) in &by_key {
        if idxs.len() == 2 {
            drop.insert(idxs[0]);
            drop.insert(idxs[1]);
        } else if idxs.len() > 2 {
            warn!("triangle {:?} repeated {} times, keeping first occurrence", key, idxs.len());
            for &i in &idxs[1..] {
                drop.insert(i);
            }
        }
    }
    if drop.is_empty() {
        return;
    }

    let mut kept_tris = Vec::with_capacity(triangles.len() - drop.len());
    let mut kept_regions = Vec::with_capacity(triangles.len() - drop.len());
    for i in 0..triangles.len() {
        if !drop.contains(&i) {
            kept_tris.push(triangles[i]);
            kept_regions.push(triangle_region[i]);
        }
    }
    *triangles = kept_tris;
    *triangle_region = kept_regions;
}

/// Debug-only visual check: an adjacent triangle pair whose normals point
/// almost directly apart usually means a sliver got wound backwards
/// somewhere upstream. Nothing here changes the mesh; it only logs.
fn log_anti_parallel_adjacent(vertices: &[Point3], triangles: &[[u32; 3]]) {
    let normal_of = |t: &[u32; 3]| -> Option<Point3> {
        let (ai, bi, ci) = (t[0] as usize, t[1] as usize, t[2] as usize);
        if ai >= vertices.len() || bi >= vertices.len() || ci >= vertices.len() {
            return None;
        }
        let (a, b, c) = (vertices[ai], vertices[bi], vertices[ci]);
        let n = (b - a).cross(&(c - a));
        if n.norm_squared() < recon_geom::APPROX_ZERO {
            None
        } else {
            Some(n.normalize())
        }
    };

    let mut by_edge: MapType<(u32, u32), Vec<usize>> = new_map();
    for (i, t) in triangles.iter().enumerate() {
        for k in 0..3 {
            let a = t[k];
            let b = t[(k + 1) % 3];
            let key = (a.min(b), a.max(b));
            by_edge.entry(key).or_insert_with(Vec::new).push(i);
        }
    }

    let mut flagged = 0usize;
    for idxs in by_edge.values() {
        if idxs.len() != 2 {
            continue;
        }
        if let (Some(na), Some(nb)) = (normal_of(&triangles[idxs[0]]), normal_of(&triangles[idxs[1]])) {
            if na.dot(&nb) <= -1.0 + 1e-6 {
                flagged += 1;
            }
        }
    }
    if flagged > 0 {
        debug!("{} adjacent triangle pair(s) with near-antiparallel normals", flagged);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dgrid::DGrid;
    use crate::mesher::assign_regions;
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
    fn a_flat_isolated_region_simplifies_to_two_triangles() {
        // one region with no neighbouring region to stitch against: the
        // whole 4x4 footprint fills its occupancy quadtree uniformly and
        // collapses all the way up to a single leaf.
        let grid = single_wall_grid();
        let assignment = assign_regions(&grid, 1.0, true);
        let mesh = triangulate(&assignment, 1.0, 0.0);
        assert_eq!(mesh.regions.len(), 1);
        assert_eq!(mesh.regions[0].face_count, 16);
        assert_eq!(mesh.triangles.len(), 2);
        assert_eq!(mesh.vertices.len(), 4);
        for pos in &mesh.vertices {
            assert!((pos.y - 0.0).abs() < 1e-9);
        }
    }

    #[test]
    fn empty_assignment_yields_empty_mesh() {
        let grid = DGrid::new(1.0).unwrap();
        let assignment = assign_regions(&grid, 1.0, true);
        let mesh = triangulate(&assignment, 1.0, 0.0);
        assert!(mesh.triangles.is_empty());
        assert!(mesh.regions.is_empty());
    }

    #[test]
    fn tiny_region_is_dropped_below_area_threshold() {
        let mut grid = DGrid::new(1.0).unwrap();
        grid.set_state((0, 0, 0), FaceState::NEG_Y);
        let assignment = assign_regions(&grid, 1.0, true);
        let mesh = triangulate(&assignment, 1.0, 10.0);
        assert!(mesh.triangles.is_empty());
    }

    #[test]
    fn an_l_shaped_region_does_not_collapse_to_a_single_square() {
        let mut grid = DGrid::new(1.0).unwrap();
        for x in 0..4 {
            for z in 0..4 {
                if x < 2 && z < 2 {
                    continue; // missing quadrant makes the footprint an L
                }
                grid.set_state((x, 0, z), FaceState::NEG_Y);
            }
        }
        let assignment = assign_regions(&grid, 1.0, true);
        let mesh = triangulate(&assignment, 1.0, 0.0);
        assert_eq!(mesh.regions.len(), 1);
        assert_eq!(mesh.regions[0].face_count, 12);
        // a non-rectangular occupancy can never simplify to the flat
        // two-triangle case; the missing quadrant forces at least one
        // smaller neighbour somewhere along the tree.
        assert!(mesh.triangles.len() > 2);
    }

    #[test]
    fn two_perpendicular_regions_meet_through_boundary_faces() {
        let mut grid = DGrid::new(1.0).unwrap();
        for x in 0..4 {
            for z in 0..4 {
                grid.set_state((x, 0, z), FaceState::NEG_Y);
            }
        }
        // a wall standing on the floor's z=0 edge, sharing that edge's
        // corner row with the floor even though the two never appear in
        // each other's face graph (different canonical face directions).
        for x in 0..4 {
            for y in 0..3 {
                grid.set_state((x, y, 0), FaceState::NEG_Z);
            }
        }
        let assignment = assign_regions(&grid, 1.0, true);
        let mesh = triangulate(&assignment, 1.0, 0.0);
        assert_eq!(mesh.regions.len(), 2);
        assert!(!mesh.triangles.is_empty());
        // every boundary vertex shared between the floor and the wall is
        // interned once, not once per region.
        let shared_corner = Point3::new(0.0, 0.0, 0.0);
        let hits = mesh.vertices.iter().filter(|p| (**p - shared_corner).norm() < 1e-9).count();
        assert_eq!(hits, 1);
    }
}
