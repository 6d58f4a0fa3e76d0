//! Voxel grid (C6) and ray carver (C7). A voxel is solid unless it has been
//! explicitly carved; the sparse `states` map only ever holds voxels with at
//! least one exposed face (boundary voxels), per the state-zero convention.
//!
//! A voxel absent from `states` is ambiguous on its own -- it could be deep
//! solid rock never yet reached, or space already carved clean through. A
//! seeded solid region (see [`DGrid::seed_solid_box`]) plus the explicit
//! `carved` set together resolve that ambiguity during carving; once
//! carving is done only `states` matters; the rest of the pipeline never
//! looks at `carved` or `bounds` again.

use std::collections::VecDeque;

use log::{debug, warn};
use recon_geom::{new_map, new_set, MapType, Point3, SetType};

use crate::constants::{NUM_SCANS_PER_FILE_CHUNK, OUTLIER_MIN_NEIGHBOR_FACES, OVERLAP_PER_FILE_CHUNK};
use crate::error::DgridError;
use crate::voxel::{self, face_normal, neighbor, offset_of, opposite, voxel_containing, FaceState, VoxelId, FACE_OFFSETS};

/// One streamed point-cloud sample, as read from a `.xyz`-style source:
/// position, owning pose, and timestamp (kept only so a caller can filter
/// blacklisted captures before these ever reach [`DGrid::populate_points_from_xyz`]).
#[derive(Clone, Copy, Debug)]
pub struct Sample {
    pub pos: Point3,
    pub pose: Point3,
    pub pose_index: u32,
    pub timestamp: u64,
}

pub struct DGrid {
    pub vs: f64,
    states: MapType<VoxelId, FaceState>,
    points: MapType<VoxelId, ()>,
    carved: SetType<VoxelId>,
    bounds: Option<(VoxelId, VoxelId)>,
}

impl DGrid {
    pub fn new(vs: f64) -> Result<Self, DgridError> {
        if !(vs > 0.0) {
            return Err(DgridError::InvalidResolution(vs));
        }
        Ok(DGrid { vs, states: new_map(), points: new_map(), carved: new_set(), bounds: None })
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn state(&self, v: VoxelId) -> FaceState {
        self.states.get(&v).copied().unwrap_or(FaceState::empty())
    }

    pub fn is_boundary(&self, v: VoxelId) -> bool {
        self.states.contains_key(&v)
    }

    pub fn boundary_voxels(&self) -> impl Iterator<Item = (&VoxelId, &FaceState)> {
        self.states.iter()
    }

    fn in_bounds(&self, v: VoxelId) -> bool {
        match self.bounds {
            None => false,
            Some((min, max)) => {
                v.0 >= min.0 && v.0 <= max.0 && v.1 >= min.1 && v.1 <= max.1 && v.2 >= min.2 && v.2 <= max.2
            }
        }
    }

    /// True if `v` still has material in it: either it already carries some
    /// exposed faces, or it lies in the seeded solid region and has not yet
    /// been carved.
    fn is_solid(&self, v: VoxelId) -> bool {
        self.states.contains_key(&v) || (self.in_bounds(v) && !self.carved.contains(&v))
    }

    fn set_or_clear(&mut self, v: VoxelId, state: FaceState) {
        if state.is_empty() {
            self.states.remove(&v);
        } else {
            self.states.insert(v, state);
        }
    }

    /// Inserts a voxel's raw face state directly, bypassing carve/fill
    /// symmetry. Used by the `.vox` reader, which stores each voxel's state
    /// explicitly rather than replaying the carve history that produced it,
    /// and by tests building a grid without a carving pass.
    pub fn set_state(&mut self, v: VoxelId, state: FaceState) {
        self.set_or_clear(v, state);
    }

    /// Marks every voxel on the outer shell of `[min, max]` (inclusive) as
    /// solid with its outward-pointing faces exposed, and remembers the box
    /// as the region carving is allowed to eat into. Carving requires a
    /// seeded shell to start from; a pristine grid has nothing for a ray to
    /// find.
    pub fn seed_solid_box(&mut self, min: VoxelId, max: VoxelId) {
        self.bounds = Some((min, max));
        for x in min.0..=max.0 {
            for y in min.1..=max.1 {
                for z in min.2..=max.2 {
                    let mut state = FaceState::empty();
                    if x == min.0 {
                        state.insert(FaceState::NEG_X);
                    }
                    if x == max.0 {
                        state.insert(FaceState::POS_X);
                    }
                    if y == min.1 {
                        state.insert(FaceState::NEG_Y);
                    }
                    if y == max.1 {
                        state.insert(FaceState::POS_Y);
                    }
                    if z == min.2 {
                        state.insert(FaceState::NEG_Z);
                    }
                    if z == max.2 {
                        state.insert(FaceState::POS_Z);
                    }
                    if !state.is_empty() {
                        self.set_or_clear((x, y, z), state);
                    }
                }
            }
        }
    }

    /// Carves `v` out entirely: it becomes empty and drops out of `states`,
    /// and every neighbour that was still solid gains the matching exposed
    /// face. A neighbour already carved needs no bit at all -- both sides
    /// of that shared face are empty.
    fn carve_voxel(&mut self, v: VoxelId) {
        if self.carved.contains(&v) {
            return;
        }
        self.carved.insert(v);
        self.states.remove(&v);

        for (bit, _) in FACE_OFFSETS {
            let n = neighbor(v, bit);
            if self.is_solid(n) {
                let mut ns = self.state(n);
                ns.insert(opposite(bit));
                self.set_or_clear(n, ns);
            }
        }
    }

    /// Restores a single carved voxel back to solid: the inverse of
    /// [`Self::carve_voxel`]. Used by outlier removal to undo an isolated
    /// speck rather than leave it in the mesh.
    fn restore_voxel(&mut self, v: VoxelId) {
        self.carved.remove(&v);
        let s = self.state(v);
        for (bit, _) in FACE_OFFSETS {
            if !s.contains(bit) {
                continue;
            }
            let n = neighbor(v, bit);
            let mut ns = self.state(n);
            ns.remove(opposite(bit));
            self.set_or_clear(n, ns);
        }
        self.states.remove(&v);
    }

    /// 3D-DDA from `p` to `s`. Empty space (already carved, or outside any
    /// seeded solid region) is passed through freely; each solid voxel the
    /// walk reaches is carved out in turn. Unless `force`, the walk also
    /// stops one voxel short of the nearest occluding sample in `points`.
    pub fn carve_segment(&mut self, p: Point3, s: Point3, force: bool) {
        let dir = s - p;
        let len = dir.norm();
        if len < recon_geom::APPROX_ZERO {
            return;
        }
        let dir = dir / len;

        let mut voxel = voxel_containing(p, self.vs);
        let mut traveled = 0.0_f64;
        let mut entered_via: Option<FaceState> = None;

        let step = |d: f64| -> i32 {
            if d > 0.0 {
                1
            } else if d < 0.0 {
                -1
            } else {
                0
            }
        };
        let step_x = step(dir.x);
        let step_y = step(dir.y);
        let step_z = step(dir.z);

        let next_boundary = |coord: f64, vi: i32, step: i32, vs: f64| -> f64 {
            if step > 0 {
                (vi + 1) as f64 * vs - coord
            } else if step < 0 {
                coord - vi as f64 * vs
            } else {
                f64::INFINITY
            }
        };

        loop {
            if !force && self.points.contains_key(&voxel) {
                self.expose_entry(voxel, entered_via);
                break;
            }

            let cx = p.x + dir.x * traveled;
            let cy = p.y + dir.y * traveled;
            let cz = p.z + dir.z * traveled;

            let tx = if step_x != 0 { next_boundary(cx, voxel.0, step_x, self.vs) / dir.x.abs() } else { f64::INFINITY };
            let ty = if step_y != 0 { next_boundary(cy, voxel.1, step_y, self.vs) / dir.y.abs() } else { f64::INFINITY };
            let tz = if step_z != 0 { next_boundary(cz, voxel.2, step_z, self.vs) / dir.z.abs() } else { f64::INFINITY };

            let t_min = tx.min(ty).min(tz);
            if !t_min.is_finite() || traveled + t_min > len {
                // the ray ends inside `voxel` without crossing it: expose
                // the face it arrived through, but leave it otherwise solid
                self.expose_entry(voxel, entered_via);
                break;
            }

            let exit_face = if tx <= ty && tx <= tz {
                if step_x > 0 { FaceState::POS_X } else { FaceState::NEG_X }
            } else if ty <= tz {
                if step_y > 0 { FaceState::POS_Y } else { FaceState::NEG_Y }
            } else if step_z > 0 {
                FaceState::POS_Z
            } else {
                FaceState::NEG_Z
            };

            // the ray crosses all the way through `voxel`: it is carved out
            // entirely rather than merely exposed on one side
            if self.is_solid(voxel) {
                self.carve_voxel(voxel);
            }

            voxel = neighbor(voxel, exit_face);
            entered_via = Some(opposite(exit_face));
            traveled += t_min + recon_geom::APPROX_ZERO;
        }
    }

    /// Marks `entered_via`'s face on `v` as exposed without removing `v`,
    /// for a ray that reaches a solid voxel but terminates inside it rather
    /// than passing through.
    fn expose_entry(&mut self, v: VoxelId, entered_via: Option<FaceState>) {
        let bit = match entered_via {
            Some(b) => b,
            None => return,
        };
        if self.is_solid(v) {
            let mut s = self.state(v);
            s.insert(bit);
            self.set_or_clear(v, s);
        }
    }

    /// Reads a point-cloud source in overlapping chunks so memory is
    /// bounded regardless of file size, inserting each sample's voxel into
    /// the opacity set if it falls within `range_limit_sq` of its pose.
    pub fn populate_points_from_xyz<I>(&mut self, samples: I, range_limit_sq: f64)
    where
        I: IntoIterator<Item = Sample>,
    {
        let mut buf: Vec<Sample> = Vec::with_capacity(NUM_SCANS_PER_FILE_CHUNK);
        let mut processed_through = 0usize;

        for sample in samples {
            buf.push(sample);
            if buf.len() >= NUM_SCANS_PER_FILE_CHUNK {
                self.ingest_chunk(&buf[processed_through..], range_limit_sq);
                let keep_from = buf.len().saturating_sub(OVERLAP_PER_FILE_CHUNK);
                processed_through = buf.len() - keep_from;
                buf.drain(..keep_from);
            }
        }
        if processed_through < buf.len() {
            self.ingest_chunk(&buf[processed_through..], range_limit_sq);
        }
        debug!("populated {} occluding voxels", self.points.len());
    }

    fn ingest_chunk(&mut self, samples: &[Sample], range_limit_sq: f64) {
        for s in samples {
            let d = s.pos - s.pose;
            if d.norm_squared() > range_limit_sq {
                continue;
            }
            self.points.insert(voxel_containing(s.pos, self.vs), ());
        }
    }

    /// Restores any boundary voxel whose set-face count falls below
    /// [`OUTLIER_MIN_NEIGHBOR_FACES`] -- an isolated speck rather than a
    /// real surface fragment.
    pub fn remove_outliers(&mut self) -> usize {
        let candidates: Vec<VoxelId> = self
            .states
            .iter()
            .filter(|(_, s)| (s.bits().count_ones() as u32) < OUTLIER_MIN_NEIGHBOR_FACES)
            .map(|(v, _)| *v)
            .collect();

        for &v in &candidates {
            self.restore_voxel(v);
        }
        if !candidates.is_empty() {
            warn!("removed {} outlier voxels", candidates.len());
        }
        candidates.len()
    }

    /// Verifies the core C6 invariant: every voxel in the map has nonzero
    /// state, and for any two grid-adjacent voxels sharing a face, at most
    /// one carries that face's bit.
    pub fn verify(&self) -> bool {
        for (v, s) in &self.states {
            if s.is_empty() {
                return false;
            }
            for (bit, _) in FACE_OFFSETS {
                if !s.contains(bit) {
                    continue;
                }
                let n = neighbor(*v, bit);
                let ns = self.state(n);
                if ns.contains(opposite(bit)) {
                    return false;
                }
            }
        }
        true
    }

    /// Breadth-first flood from every occupied voxel along its set faces,
    /// used by tests and by the mesher's entry point to recover connected
    /// boundary components without re-deriving adjacency elsewhere.
    pub fn connected_components(&self) -> Vec<Vec<VoxelId>> {
        let mut seen: MapType<VoxelId, ()> = new_map();
        let mut components = Vec::new();
        for &start in self.states.keys() {
            if seen.contains_key(&start) {
                continue;
            }
            let mut comp = Vec::new();
            let mut queue = VecDeque::new();
            queue.push_back(start);
            seen.insert(start, ());
            while let Some(v) = queue.pop_front() {
                comp.push(v);
                let s = self.state(v);
                for (bit, _) in FACE_OFFSETS {
                    if !s.contains(bit) {
                        continue;
                    }
                    let n = neighbor(v, bit);
                    if self.is_boundary(n) && !seen.contains_key(&n) {
                        seen.insert(n, ());
                        queue.push_back(n);
                    }
                }
            }
            components.push(comp);
        }
        components
    }
}

/// Face centre in world space, used by the mesher to build a face's corner
/// set for plane fitting.
pub fn face_center(v: VoxelId, f: FaceState, vs: f64) -> Point3 {
    let c = voxel::voxel_center(v, vs);
    let (dx, dy, dz) = offset_of(f);
    c + Point3::new(dx as f64, dy as f64, dz as f64) * (vs * 0.5)
}

/// The four corners of face `f` on voxel `v`, in a consistent winding order
/// (CCW looking against the outward normal).
pub fn face_corners(v: VoxelId, f: FaceState, vs: f64) -> [Point3; 4] {
    let base = Point3::new(v.0 as f64 * vs, v.1 as f64 * vs, v.2 as f64 * vs);
    let n = face_normal(f);
    let (u, w) = if n.x.abs() > 0.5 {
        (Point3::new(0.0, vs, 0.0), Point3::new(0.0, 0.0, vs))
    } else if n.y.abs() > 0.5 {
        (Point3::new(vs, 0.0, 0.0), Point3::new(0.0, 0.0, vs))
    } else {
        (Point3::new(vs, 0.0, 0.0), Point3::new(0.0, vs, 0.0))
    };
    let origin = if n.x > 0.0 || n.y > 0.0 || n.z > 0.0 {
        base + Point3::new(n.x.max(0.0), n.y.max(0.0), n.z.max(0.0)) * vs
    } else {
        base
    };
    [origin, origin + u, origin + u + w, origin + w]
}

/// Integer-lattice twin of [`face_corners`]: the same four corners, in the
/// same winding order, as grid-corner coordinates rather than world
/// positions. Two faces that share a physical corner always agree on this
/// id regardless of which voxel or face direction produced it, so it is the
/// mesher's vertex-identity key.
pub fn face_corner_ids(v: VoxelId, f: FaceState) -> [(i32, i32, i32); 4] {
    let n = face_normal(f);
    let (u, w) = if n.x.abs() > 0.5 {
        ((0, 1, 0), (0, 0, 1))
    } else if n.y.abs() > 0.5 {
        ((1, 0, 0), (0, 0, 1))
    } else {
        ((1, 0, 0), (0, 1, 0))
    };
    let add = |a: (i32, i32, i32), b: (i32, i32, i32)| (a.0 + b.0, a.1 + b.1, a.2 + b.2);
    let origin = if n.x > 0.0 || n.y > 0.0 || n.z > 0.0 {
        add(v, (n.x.max(0.0) as i32, n.y.max(0.0) as i32, n.z.max(0.0) as i32))
    } else {
        v
    };
    [origin, add(origin, u), add(add(origin, u), w), add(origin, w)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carve_through_a_seeded_single_voxel_empties_it() {
        let mut grid = DGrid::new(1.0).unwrap();
        grid.seed_solid_box((0, 0, 0), (0, 0, 0));
        grid.carve_segment(Point3::new(-5.5, 0.5, 0.5), Point3::new(10.5, 0.5, 0.5), true);
        assert!(grid.verify());
        assert!(grid.is_empty());
    }

    #[test]
    fn seed_solid_box_leaves_the_internal_joint_unset() {
        let mut grid = DGrid::new(1.0).unwrap();
        grid.seed_solid_box((0, 0, 0), (1, 0, 0));
        assert!(grid.verify());
        assert!(!grid.state((0, 0, 0)).contains(FaceState::POS_X));
        assert!(!grid.state((1, 0, 0)).contains(FaceState::NEG_X));
        assert!(grid.state((0, 0, 0)).contains(FaceState::NEG_X));
        assert!(grid.state((1, 0, 0)).contains(FaceState::POS_X));
    }

    #[test]
    fn two_opposing_rays_expose_both_faces_of_a_surviving_wall_voxel() {
        let mut grid = DGrid::new(1.0).unwrap();
        grid.seed_solid_box((0, 0, 0), (0, 0, 0));
        grid.carve_segment(Point3::new(-5.5, 0.5, 0.5), Point3::new(0.5, 0.5, 0.5), false);
        grid.carve_segment(Point3::new(6.5, 0.5, 0.5), Point3::new(0.5, 0.5, 0.5), false);
        assert!(grid.verify());
        assert!(grid.is_boundary((0, 0, 0)));
        assert!(grid.state((0, 0, 0)).contains(FaceState::NEG_X));
        assert!(grid.state((0, 0, 0)).contains(FaceState::POS_X));
    }

    #[test]
    fn a_ray_carves_every_voxel_it_fully_crosses() {
        let mut grid = DGrid::new(1.0).unwrap();
        // a five-voxel-long solid bar, one voxel thick in y and z
        grid.seed_solid_box((0, 0, 0), (4, 0, 0));
        grid.carve_segment(Point3::new(-5.5, 0.5, 0.5), Point3::new(2.5, 0.5, 0.5), true);
        assert!(grid.verify());
        // voxels 0 and 1 were fully crossed and carved away; the ray
        // terminates inside voxel 2, which survives with its near face
        // exposed
        assert!(!grid.is_boundary((0, 0, 0)));
        assert!(!grid.is_boundary((1, 0, 0)));
        assert!(grid.is_boundary((2, 0, 0)));
        assert!(grid.state((2, 0, 0)).contains(FaceState::NEG_X));
        assert!(grid.is_boundary((3, 0, 0)));
        assert!(grid.is_boundary((4, 0, 0)));
    }

    #[test]
    fn outlier_removal_clears_specks() {
        let mut grid = DGrid::new(1.0).unwrap();
        grid.set_state((5, 5, 5), FaceState::NEG_Y);
        assert_eq!(grid.remove_outliers(), 1);
        assert!(grid.is_empty());
    }

    #[test]
    fn adjacent_faces_share_a_corner_id() {
        // (0,0,0)'s +x face and (1,0,0)'s -x face are the same physical
        // quad; their corner id sets must be identical even though their
        // winding (and hence order) is reversed.
        let mut a: Vec<_> = face_corner_ids((0, 0, 0), FaceState::POS_X).to_vec();
        let mut b: Vec<_> = face_corner_ids((1, 0, 0), FaceState::NEG_X).to_vec();
        a.sort();
        b.sort();
        assert_eq!(a, b);
    }
}
