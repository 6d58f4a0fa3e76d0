//! Triangle-topology store (C4): a disconnected-from-the-link-ring view of
//! a triangulation's interior, keyed by triangle identity rather than by
//! vertex adjacency. This is what room partitioning and mesh simplification
//! operate on; neither ever touches [`crate::triangulation::Triangulation`]
//! again once this structure has been built from it.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use recon_geom::predicates2d::{circumcenter, intriangle, orient2d, segment_intersect};
use recon_geom::{new_map, new_set, MapType, Point2, SetType};

use crate::constants::{MAX_DOOR_WIDTH, MIN_LOCAL_MAX_CIRCUMRADIUS};
use crate::triangulation::Triangulation;

/// Identity of a triangle: the vertices in their original (CCW) winding
/// order, but compared/hashed by their sorted values, so `(1,2,3)` and
/// `(2,3,1)` name the same triangle while `apex`-style lookups can still
/// recover which vertex followed which.
#[derive(Clone, Copy, Debug)]
pub struct Triple {
    pub i: u32,
    pub j: u32,
    pub k: u32,
}

impl Triple {
    pub fn new(i: u32, j: u32, k: u32) -> Self {
        Triple { i, j, k }
    }

    fn sorted(&self) -> (u32, u32, u32) {
        let mut v = [self.i, self.j, self.k];
        v.sort_unstable();
        (v[0], v[1], v[2])
    }

    pub fn unique(&self) -> bool {
        let (a, b, c) = self.sorted();
        a != b && b != c
    }

    pub fn contains(&self, x: u32) -> bool {
        self.i == x || self.j == x || self.k == x
    }

    pub fn get(&self, ind: usize) -> u32 {
        match ind {
            0 => self.i,
            1 => self.j,
            _ => self.k,
        }
    }

    pub fn edges(&self) -> [(u32, u32); 3] {
        [(self.i, self.j), (self.j, self.k), (self.k, self.i)]
    }
}

impl PartialEq for Triple {
    fn eq(&self, other: &Self) -> bool {
        self.sorted() == other.sorted()
    }
}
impl Eq for Triple {}
impl std::hash::Hash for Triple {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.sorted().hash(state);
    }
}
impl PartialOrd for Triple {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Triple {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sorted().cmp(&other.sorted())
    }
}

/// Per-triangle metadata: its circumcircle, its neighbor set (by shared
/// edge), whether it is a local maximum of circumradius (a room seed), and
/// which room (by root triangle) it currently belongs to.
#[derive(Clone, Debug)]
pub struct TriInfo {
    pub rcc: f64,
    pub cc: Point2,
    pub neighs: SetType<Triple>,
    pub is_local_max: bool,
    pub root: Triple,
}

impl TriInfo {
    fn new(t: Triple, cc: Point2, rcc: f64) -> Self {
        TriInfo {
            rcc,
            cc,
            neighs: new_set(),
            is_local_max: false,
            root: t,
        }
    }
}

/// Accumulated geometry for one room while [`TriRep::unlabel_extra_rooms`]
/// decides whether it is large enough to keep.
struct RoomInfo {
    root: Triple,
    area: f64,
    border_lengths: MapType<Triple, f64>,
}

impl RoomInfo {
    fn new(root: Triple) -> Self {
        RoomInfo {
            root,
            area: 0.0,
            border_lengths: new_map(),
        }
    }
}

/// A directed edge between two triangles, ordered by the squared length of
/// the edge they share -- the priority used by [`TriRep::flood_rooms`] so
/// that the widest gaps between rooms are crossed last.
#[derive(Clone, Copy, Debug)]
struct TriEdge {
    start: Triple,
    end: Triple,
    len_sq: f64,
}

impl PartialEq for TriEdge {
    fn eq(&self, other: &Self) -> bool {
        self.len_sq == other.len_sq
    }
}
impl Eq for TriEdge {}
impl PartialOrd for TriEdge {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for TriEdge {
    fn cmp(&self, other: &Self) -> Ordering {
        self.len_sq.total_cmp(&other.len_sq)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RoomHeight {
    pub min_z: f64,
    pub max_z: f64,
}

/// Outcome of a topology-altering edit that is expected to be refused in
/// the ordinary course of simplification -- not an error, just "no".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollapseOutcome {
    Collapsed,
    RefusedNotAnEdge,
    RefusedNotBoundary,
    RefusedWouldFold,
    RefusedWouldDuplicate,
    RefusedTopologyConflict,
}

pub struct TriRep {
    positions: MapType<u32, Point2>,
    pub tris: MapType<Triple, TriInfo>,
    pub vert_map: MapType<u32, SetType<Triple>>,
    pub room_heights: MapType<Triple, RoomHeight>,
}

impl TriRep {
    /// Builds a trirep over exactly `interior`, pulling vertex positions
    /// and per-edge apexes from `tri`.
    pub fn from_interior(tri: &Triangulation, interior: &SetType<Triple>) -> Self {
        let mut positions = new_map();
        let mut tris = new_map();
        let mut vert_map: MapType<u32, SetType<Triple>> = new_map();

        for t in interior.iter() {
            for idx in 0..3 {
                let v = t.get(idx);
                positions.entry(v).or_insert_with(|| tri.pos(v).unwrap());
            }

            let (p, q, r) = (
                *positions.get(&t.i).unwrap(),
                *positions.get(&t.j).unwrap(),
                *positions.get(&t.k).unwrap(),
            );
            let (cc, rcc_sq) = circumcenter(p, q, r).unwrap_or((p, 0.0));
            let mut info = TriInfo::new(*t, cc, rcc_sq.sqrt());

            for (a, b) in [(t.j, t.i), (t.k, t.j), (t.i, t.k)] {
                if let Ok(apex) = tri.tri_get_apex(a, b) {
                    let n = Triple::new(a, b, apex);
                    if interior.contains(&n) {
                        info.neighs.insert(n);
                    }
                }
            }

            tris.insert(*t, info);
            vert_map.entry(t.i).or_insert_with(new_set).insert(*t);
            vert_map.entry(t.j).or_insert_with(new_set).insert(*t);
            vert_map.entry(t.k).or_insert_with(new_set).insert(*t);
        }

        TriRep {
            positions,
            tris,
            vert_map,
            room_heights: new_map(),
        }
    }

    pub fn contains(&self, t: &Triple) -> bool {
        self.tris.contains_key(t)
    }

    pub fn pos(&self, v: u32) -> Point2 {
        self.positions[&v]
    }

    fn dist(&self, a: u32, b: u32) -> f64 {
        (self.pos(a) - self.pos(b)).norm()
    }

    /// Tears `t` out of this representation, removing it from every
    /// neighbor's neighbor set and every vertex's triangle set.
    pub fn remove_triangle(&mut self, t: &Triple) {
        let Some(info) = self.tris.remove(t) else {
            return;
        };
        for n in info.neighs.iter() {
            if let Some(ninfo) = self.tris.get_mut(n) {
                ninfo.neighs.remove(t);
            }
        }
        for idx in 0..3 {
            if let Some(set) = self.vert_map.get_mut(&t.get(idx)) {
                set.remove(t);
            }
        }
    }

    /// Removes vertex `a` and every triangle touching it.
    pub fn remove_vertex(&mut self, a: u32) {
        let Some(set) = self.vert_map.remove(&a) else {
            return;
        };
        for t in set {
            self.remove_triangle(&t);
        }
    }

    /// True iff `a` and `b` share exactly one triangle, and within it the
    /// edge runs `a -> b` (i.e. this is a boundary edge oriented that way).
    fn orient_edge(&self, a: u32, b: u32) -> Option<Triple> {
        let shared = self.shared_triangles(a, b);
        if shared.len() != 1 {
            return None;
        }
        let t = shared[0];
        let oriented = (t.i == a && t.j == b) || (t.j == a && t.k == b) || (t.k == a && t.i == b);
        oriented.then_some(t)
    }

    fn shared_triangles(&self, a: u32, b: u32) -> Vec<Triple> {
        let (Some(sa), Some(sb)) = (self.vert_map.get(&a), self.vert_map.get(&b)) else {
            return Vec::new();
        };
        sa.intersection(sb).copied().collect()
    }

    /// True iff the edge `(a, b)` separates two different rooms (or is a
    /// boundary edge at all); `t` is set to whichever adjoining triangle
    /// actually runs `a -> b`.
    pub fn room_edge(&self, a: u32, b: u32) -> Option<Triple> {
        let shared = self.shared_triangles(a, b);
        if shared.is_empty() || shared.len() > 2 {
            return None;
        }
        if shared.len() == 1 {
            return self.orient_edge(a, b);
        }
        let (p, q) = (shared[0], shared[1]);
        let root_p = self.tris.get(&p).map(|i| i.root);
        let root_q = self.tris.get(&q).map(|i| i.root);
        if root_p == root_q {
            return None;
        }
        for t in [p, q] {
            if (t.i == a && t.j == b) || (t.j == a && t.k == b) || (t.k == a && t.i == b) {
                return Some(t);
            }
        }
        None
    }

    fn line_intersects(&self, a1: u32, a2: u32, b1: u32, b2: u32) -> bool {
        if a1 == a2 || b1 == b2 || a1 == b1 || a1 == b2 || a2 == b1 || a2 == b2 {
            return false;
        }
        segment_intersect(self.pos(a1), self.pos(a2), self.pos(b1), self.pos(b2)).is_some()
    }

    /// True iff some edge of `v`'s star (the triangles touching `v`)
    /// crosses the segment `(a1, a2)`, ignoring edges to vertices in
    /// `to_ignore`.
    fn star_intersects(&self, v: u32, a1: u32, a2: u32, to_ignore: &SetType<u32>) -> bool {
        let Some(tris) = self.vert_map.get(&v) else {
            return false;
        };
        for t in tris {
            for idx in 0..3 {
                let w = t.get(idx);
                if w == v || to_ignore.contains(&w) {
                    continue;
                }
                if self.line_intersects(a1, a2, v, w) {
                    return true;
                }
            }
        }
        false
    }

    fn vertex_in_triangle(&self, v: u32, a: u32, b: u32, c: u32) -> bool {
        if v == a || v == b || v == c {
            return false;
        }
        let (pa, pb, pc) = (self.pos(a), self.pos(b), self.pos(c));
        if orient2d(pa, pb, pc) <= 0.0 {
            return false;
        }
        intriangle(Some(pa), Some(pb), Some(pc), self.pos(v))
    }

    /// Attempts to collapse edge `(a, b)` onto vertex `a`, deleting `b`.
    /// Refuses (non-fatally) if `(a, b)` is not a boundary edge, if the
    /// collapse would fold the mesh (produce a clockwise triangle), or if
    /// it would create a triangle that already exists.
    pub fn collapse_edge(&mut self, a: u32, b: u32) -> CollapseOutcome {
        let shared = self.shared_triangles(a, b);
        if shared.len() != 1 {
            return CollapseOutcome::RefusedNotBoundary;
        }
        let t = shared[0];
        let Some(info) = self.tris.get(&t) else {
            return CollapseOutcome::RefusedNotAnEdge;
        };
        if info.neighs.len() > 2 {
            return CollapseOutcome::RefusedNotBoundary;
        }

        let relabel = |x: u32| if x == b { a } else { x };

        let verts_of_b: Vec<Triple> = self.vert_map[&b].iter().copied().collect();
        for s in &verts_of_b {
            if *s == t {
                continue;
            }
            let tnew = Triple::new(relabel(s.i), relabel(s.j), relabel(s.k));
            if self.tris.contains_key(&tnew) {
                return CollapseOutcome::RefusedWouldDuplicate;
            }
            let d = orient2d(self.pos(tnew.i), self.pos(tnew.j), self.pos(tnew.k));
            if d <= 0.0 {
                return CollapseOutcome::RefusedWouldFold;
            }
        }

        let mut ta = None;
        let mut tb = None;
        for n in info.neighs.iter() {
            if *n == t {
                continue;
            }
            if n.contains(a) {
                if ta.is_some() {
                    return CollapseOutcome::RefusedTopologyConflict;
                }
                ta = Some(*n);
            }
            if n.contains(b) {
                if tb.is_some() {
                    return CollapseOutcome::RefusedTopologyConflict;
                }
                tb = Some(*n);
            }
        }

        if let (Some(ta), Some(tb)) = (ta, tb) {
            if ta == tb {
                return CollapseOutcome::RefusedTopologyConflict;
            }
            let ta_has_tb = self.tris.get(&ta).map(|i| i.neighs.contains(&tb)).unwrap_or(false);
            let tb_has_ta = self.tris.get(&tb).map(|i| i.neighs.contains(&ta)).unwrap_or(false);
            if ta_has_tb || tb_has_ta {
                return CollapseOutcome::RefusedTopologyConflict;
            }
            self.tris.get_mut(&ta).unwrap().neighs.insert(tb);
            self.tris.get_mut(&tb).unwrap().neighs.insert(ta);
        }

        self.remove_triangle(&t);

        for s in verts_of_b {
            if !self.tris.contains_key(&s) {
                continue;
            }
            let tnew = Triple::new(relabel(s.i), relabel(s.j), relabel(s.k));
            let old_info = self.tris.remove(&s).unwrap();

            let mut new_neighs = new_set();
            for n in old_info.neighs.iter() {
                if let Some(ninfo) = self.tris.get_mut(n) {
                    ninfo.neighs.remove(&s);
                    ninfo.neighs.insert(tnew);
                }
                new_neighs.insert(*n);
            }

            for idx in 0..3 {
                self.vert_map.entry(s.get(idx)).and_modify(|set| {
                    set.remove(&s);
                });
            }
            for idx in 0..3 {
                self.vert_map.entry(tnew.get(idx)).or_insert_with(new_set).insert(tnew);
            }

            self.tris.insert(
                tnew,
                TriInfo {
                    rcc: old_info.rcc,
                    cc: old_info.cc,
                    neighs: new_neighs,
                    is_local_max: old_info.is_local_max,
                    root: old_info.root,
                },
            );
        }

        self.vert_map.remove(&b);
        self.positions.remove(&b);
        CollapseOutcome::Collapsed
    }

    /// Removes `b` if it sits on the mesh boundary, retriangulating the
    /// hole left behind with a fan from the remaining boundary vertices.
    /// Any additional vertices swallowed by the hole (because the edge
    /// from `b`'s old boundary neighbors now cuts across them) are
    /// reported in the returned set.
    pub fn remove_boundary_vertex(&mut self, b: u32) -> Result<SetType<u32>, crate::error::TriRepError> {
        use crate::error::TriRepError;

        let Some(neighbor_tris) = self.vert_map.get(&b).cloned() else {
            return Ok(new_set());
        };
        if neighbor_tris.is_empty() {
            return Ok(new_set());
        }

        let mut neigh_counter: MapType<u32, u32> = new_map();
        for t in &neighbor_tris {
            for idx in 0..3 {
                *neigh_counter.entry(t.get(idx)).or_insert(0) += 1;
            }
        }

        let mut a = None;
        let mut c = None;
        let mut interior_neighbors = Vec::new();
        for (&v, &count) in neigh_counter.iter() {
            if v == b {
                continue;
            }
            if count != 1 {
                interior_neighbors.push(v);
                continue;
            }
            let forward = self.orient_edge(b, v).is_some();
            let backward = self.orient_edge(v, b).is_some();
            if forward && !backward {
                a = Some(v);
            } else if backward && !forward {
                c = Some(v);
            }
        }

        let (a, c) = match (a, c) {
            (Some(a), Some(c)) => (a, c),
            _ => return Ok(new_set()),
        };

        let mut to_ignore: SetType<u32> = new_set();
        to_ignore.insert(a);
        to_ignore.insert(b);
        to_ignore.insert(c);

        let mut verts_to_remove: SetType<u32> = new_set();
        let mut tris_to_remove: SetType<Triple> = new_set();
        let mut queue: std::collections::VecDeque<u32> = std::collections::VecDeque::new();
        queue.push_back(b);
        for v in interior_neighbors {
            queue.push_back(v);
        }

        while let Some(n) = queue.pop_front() {
            if verts_to_remove.contains(&n) || n == a || n == c {
                continue;
            }
            if n != b && !self.star_intersects(n, a, c, &to_ignore) && !self.vertex_in_triangle(n, c, b, a) {
                continue;
            }
            verts_to_remove.insert(n);
            let Some(vtris) = self.vert_map.get(&n).cloned() else {
                continue;
            };
            tris_to_remove.extend(vtris.iter().copied());
            for t in &vtris {
                for idx in 0..3 {
                    queue.push_back(t.get(idx));
                }
            }
        }

        let roots: SetType<Triple> = tris_to_remove
            .iter()
            .filter_map(|t| self.tris.get(t).map(|i| i.root))
            .collect();
        if roots.len() > 1 {
            return Err(TriRepError::Invariant(
                "remove_boundary_vertex: hole spans more than one room".into(),
            ));
        }
        let root = roots.into_iter().next();

        let boundary = Self::compute_boundary_edges(&tris_to_remove);
        if boundary.len() != 1 {
            return Err(TriRepError::Invariant(format!(
                "remove_boundary_vertex: hole has {} boundary loops, expected 1",
                boundary.len()
            )));
        }

        let loop_verts = &boundary[0];
        for v in loop_verts {
            verts_to_remove.remove(v);
        }

        for t in &tris_to_remove {
            self.remove_triangle(t);
        }
        let extra_removed: SetType<u32> = verts_to_remove;
        for v in &extra_removed {
            self.vert_map.remove(v);
            self.positions.remove(v);
        }

        if let Some(root) = root {
            self.fill_polygonal_hole(loop_verts, root)?;
        }

        Ok(extra_removed)
    }

    /// Fan-triangulates a (generally non-convex but typically small and
    /// star-shaped after column removal) polygonal hole from its first
    /// vertex, tagging every new triangle with `root`.
    fn fill_polygonal_hole(&mut self, verts: &[u32], root: Triple) -> Result<(), crate::error::TriRepError> {
        let n = verts.len();
        if n < 3 {
            return Ok(());
        }
        let anchor = verts[0];
        for idx in 1..n - 1 {
            let t = Triple::new(anchor, verts[idx], verts[idx + 1]);
            if !t.unique() {
                continue;
            }
            let mut info = TriInfo::new(t, Point2::new(0.0, 0.0), 0.0);
            if let (Some(p), Some(q), Some(r)) = (
                self.positions.get(&t.i),
                self.positions.get(&t.j),
                self.positions.get(&t.k),
            ) {
                if let Ok((cc, rcc_sq)) = circumcenter(*p, *q, *r) {
                    info.cc = cc;
                    info.rcc = rcc_sq.sqrt();
                }
            }
            info.root = root;
            for i2 in 0..3 {
                let v = t.get(i2);
                if let Some(set) = self.vert_map.get(&v) {
                    for other in set.iter() {
                        if self.tris.get(other).is_some() {
                            info.neighs.insert(*other);
                        }
                    }
                }
            }
            for n2 in info.neighs.iter() {
                if let Some(ninfo) = self.tris.get_mut(n2) {
                    ninfo.neighs.insert(t);
                }
            }
            for i2 in 0..3 {
                self.vert_map.entry(t.get(i2)).or_insert_with(new_set).insert(t);
            }
            self.tris.insert(t, info);
        }
        Ok(())
    }

    /// Walks the edges of `tris` that have no matching reverse edge inside
    /// the set, stitching them into one or more counter-clockwise loops.
    fn compute_boundary_edges(tris: &SetType<Triple>) -> Vec<Vec<u32>> {
        let mut all_edges: SetType<(u32, u32)> = new_set();
        for t in tris {
            for e in t.edges() {
                all_edges.insert(e);
            }
        }
        let flips: Vec<(u32, u32)> = all_edges
            .iter()
            .filter(|&&(i, j)| all_edges.contains(&(j, i)))
            .copied()
            .collect();
        for e in flips {
            all_edges.remove(&e);
        }

        let mut by_start: MapType<u32, Vec<(u32, u32)>> = new_map();
        for &(i, j) in &all_edges {
            by_start.entry(i).or_default().push((i, j));
        }

        let mut loops = Vec::new();
        let mut remaining = all_edges;
        while let Some(&start_edge) = remaining.iter().next() {
            let mut loop_verts = vec![start_edge.0, start_edge.1];
            remaining.remove(&start_edge);
            if let Some(v) = by_start.get_mut(&start_edge.0) {
                v.retain(|e| *e != start_edge);
            }
            let mut last = start_edge.1;
            loop {
                let Some(candidates) = by_start.get_mut(&last) else {
                    break;
                };
                let Some(&next_edge) = candidates.first() else {
                    break;
                };
                if next_edge.1 == loop_verts[0] {
                    remaining.remove(&next_edge);
                    candidates.retain(|e| *e != next_edge);
                    break;
                }
                loop_verts.push(next_edge.1);
                remaining.remove(&next_edge);
                candidates.retain(|e| *e != next_edge);
                last = next_edge.1;
            }
            loops.push(loop_verts);
        }
        loops
    }

    /// All boundary edges of this representation, oriented inward.
    pub fn get_walls(&self) -> Vec<(u32, u32)> {
        let keys: SetType<Triple> = self.tris.keys().copied().collect();
        let loops = Self::compute_boundary_edges(&keys);
        let mut walls = Vec::new();
        for loop_verts in loops {
            let m = loop_verts.len();
            for j in 0..m {
                walls.push((loop_verts[j], loop_verts[(j + 1) % m]));
            }
        }
        walls
    }

    /// Boundary loops of a single room's triangle set (the room's own walls,
    /// as opposed to [`Self::get_walls`] which walks the whole
    /// representation).
    pub fn room_boundary_loops(&self, room: &SetType<Triple>) -> Vec<Vec<u32>> {
        Self::compute_boundary_edges(room)
    }

    /// Partitions every triangle by its current room root.
    pub fn get_rooms(&self) -> Vec<SetType<Triple>> {
        let mut room_map: MapType<Triple, usize> = new_map();
        let mut rooms: Vec<SetType<Triple>> = Vec::new();
        for (t, info) in self.tris.iter() {
            let idx = *room_map.entry(info.root).or_insert_with(|| {
                rooms.push(new_set());
                rooms.len() - 1
            });
            rooms[idx].insert(*t);
        }
        rooms
    }

    /// Labels each triangle whose circumradius is at least
    /// [`MIN_LOCAL_MAX_CIRCUMRADIUS`] and has no circumcircle-intersecting
    /// neighbor with a larger circumradius as a room seed.
    pub fn find_local_max(&mut self) {
        let mut nonextrema: SetType<Triple> = new_set();
        let keys: Vec<Triple> = self.tris.keys().copied().collect();

        for t in keys {
            self.tris.get_mut(&t).unwrap().is_local_max = false;
            if nonextrema.contains(&t) {
                continue;
            }
            let info = self.tris.get(&t).unwrap().clone();
            if info.rcc < MIN_LOCAL_MAX_CIRCUMRADIUS {
                continue;
            }

            let mut checked: SetType<Triple> = new_set();
            let mut queue: std::collections::VecDeque<Triple> = info.neighs.iter().copied().collect();
            let mut any_larger = false;

            while let Some(n) = queue.pop_front() {
                if checked.contains(&n) || n == t {
                    continue;
                }
                checked.insert(n);
                let Some(ninfo) = self.tris.get(&n) else {
                    continue;
                };
                let d = (info.cc - ninfo.cc).norm();
                if info.rcc + ninfo.rcc < d {
                    continue;
                }
                if info.rcc < ninfo.rcc {
                    any_larger = true;
                    break;
                }
                nonextrema.insert(n);
                for nn in ninfo.neighs.iter() {
                    queue.push_back(*nn);
                }
            }

            if !any_larger {
                self.tris.get_mut(&t).unwrap().is_local_max = true;
            }
        }
    }

    /// Expands each local-max triangle's room across unclaimed neighbors,
    /// processing the widest shared edges first.
    pub fn flood_rooms(&mut self) {
        let mut pq: BinaryHeap<TriEdge> = BinaryHeap::new();
        let seeds: Vec<Triple> = self
            .tris
            .iter()
            .filter(|(_, info)| info.is_local_max)
            .map(|(t, _)| *t)
            .collect();
        for t in seeds {
            self.push_tri_edges(&mut pq, &t);
        }

        while let Some(e) = pq.pop() {
            let Some(oinfo) = self.tris.get(&e.end) else {
                continue;
            };
            if oinfo.root != e.end || oinfo.is_local_max {
                continue;
            }
            let Some(sinfo) = self.tris.get(&e.start) else {
                continue;
            };
            if sinfo.root == e.start && !sinfo.is_local_max {
                continue;
            }
            let new_root = sinfo.root;
            self.tris.get_mut(&e.end).unwrap().root = new_root;
            let end = e.end;
            self.push_tri_edges(&mut pq, &end);
        }
    }

    fn push_tri_edges(&self, pq: &mut BinaryHeap<TriEdge>, t: &Triple) {
        for (i, j) in t.edges() {
            let apex = self.apex_via_vert_map(j, i);
            if let Some(apex) = apex {
                let end = Triple::new(j, i, apex);
                let len_sq = (self.pos(i) - self.pos(j)).norm_squared();
                pq.push(TriEdge { start: *t, end, len_sq });
            }
        }
    }

    fn apex_via_vert_map(&self, a: u32, b: u32) -> Option<u32> {
        let shared = self.shared_triangles(a, b);
        for t in shared {
            if t.i == a && t.j == b {
                return Some(t.k);
            }
            if t.j == a && t.k == b {
                return Some(t.i);
            }
            if t.k == a && t.i == b {
                return Some(t.j);
            }
        }
        None
    }

    pub fn reset_roots(&mut self) {
        let keys: Vec<Triple> = self.tris.keys().copied().collect();
        for t in keys {
            self.tris.get_mut(&t).unwrap().root = t;
        }
    }

    /// Un-flags as local-max any room whose border with another
    /// still-labeled room exceeds [`MAX_DOOR_WIDTH`] -- such a wide gap
    /// means the "room" is really just an un-walled extension of its
    /// neighbor. Returns the number of rooms unlabeled; callers typically
    /// loop `reset_roots` + `flood_rooms` + this until it returns zero.
    pub fn unlabel_extra_rooms(&mut self) -> usize {
        let mut room_infos: MapType<Triple, RoomInfo> = new_map();

        for (t, info) in self.tris.iter() {
            let room = room_infos.entry(info.root).or_insert_with(|| RoomInfo::new(info.root));
            let (p, q, r) = (self.pos(t.i), self.pos(t.j), self.pos(t.k));
            room.area += orient2d(p, q, r).abs() / 2.0;

            for (a, b) in t.edges() {
                if let Some(owner) = self.room_edge(a, b) {
                    if owner != *t {
                        continue;
                    }
                    if let Some(other) = self.shared_triangles(a, b).into_iter().find(|o| o != t) {
                        let other_root = self.tris.get(&other).map(|i| i.root).unwrap_or(other);
                        let len = self.dist(a, b);
                        *room.border_lengths.entry(other_root).or_insert(0.0) += len;
                    }
                }
            }
        }

        let mut rooms: Vec<RoomInfo> = room_infos.into_values().collect();
        rooms.sort_by(|a, b| a.area.total_cmp(&b.area));

        let mut unlabeled = 0;
        for room in &rooms {
            let mut unlabel = false;
            for (&other_root, &len) in &room.border_lengths {
                if len <= MAX_DOOR_WIDTH {
                    continue;
                }
                if self.tris.get(&other_root).map(|i| i.is_local_max).unwrap_or(false) {
                    unlabel = true;
                    break;
                }
            }
            if unlabel {
                if let Some(info) = self.tris.get_mut(&room.root) {
                    info.is_local_max = false;
                    unlabeled += 1;
                }
            }
        }
        unlabeled
    }

    /// Assigns each room's height range as the median floor/ceiling
    /// heights sampled from `samples` (keyed by room root).
    pub fn populate_room_heights(&mut self, samples: &MapType<Triple, Vec<RoomHeight>>) {
        self.room_heights.clear();
        for (root, heights) in samples {
            if heights.is_empty() {
                continue;
            }
            let mut mins: Vec<f64> = heights.iter().map(|h| h.min_z).collect();
            let mut maxs: Vec<f64> = heights.iter().map(|h| h.max_z).collect();
            mins.sort_by(f64::total_cmp);
            maxs.sort_by(f64::total_cmp);
            let mid = mins.len() / 2;
            self.room_heights.insert(
                *root,
                RoomHeight {
                    min_z: mins[mid],
                    max_z: maxs[mid],
                },
            );
        }
    }

    /// Checks internal consistency: every triangle's neighbor set is
    /// reciprocal, and every vertex map entry actually touches that
    /// vertex.
    pub fn verify(&self) -> bool {
        for (t, info) in self.tris.iter() {
            for n in info.neighs.iter() {
                match self.tris.get(n) {
                    Some(ninfo) if ninfo.neighs.contains(t) => {}
                    _ => return false,
                }
            }
        }
        for (v, set) in self.vert_map.iter() {
            for t in set {
                if !t.contains(*v) || !self.tris.contains_key(t) {
                    return false;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vertex::Vertex;

    fn grid_triangulation(n: i32) -> (Triangulation, SetType<Triple>) {
        let mut verts = Vec::new();
        for y in 0..n {
            for x in 0..n {
                verts.push(Vertex::new(Point2::new(x as f64, y as f64), verts.len() as u32));
            }
        }
        let mut tri = Triangulation::new(verts);
        tri.begin_triangulation().unwrap();
        for v in 3..=((n * n) as u32) {
            tri.insert_vertex(v).unwrap();
        }

        let mut interior = new_set();
        let nv = (n * n) as u32;
        for i in 1..=nv {
            let Some(ring) = tri.link_ring(i) else { continue };
            let len = ring.len();
            let count = if len < 2 { 0 } else if len == 2 { 1 } else { len };
            for j in 0..count {
                let w = crate::linkring::get_val(ring, j);
                let s = crate::linkring::next_val(ring, j);
                if w == 0 || s == 0 {
                    continue;
                }
                if i < w && i < s {
                    interior.insert(Triple::new(i, w, s));
                }
            }
        }
        (tri, interior)
    }

    #[test]
    fn trirep_builds_and_verifies() {
        let (tri, interior) = grid_triangulation(4);
        let rep = TriRep::from_interior(&tri, &interior);
        assert!(rep.verify());
        assert_eq!(rep.tris.len(), interior.len());
    }

    #[test]
    fn find_local_max_and_flood_rooms_label_everything() {
        let (tri, interior) = grid_triangulation(6);
        let mut rep = TriRep::from_interior(&tri, &interior);
        rep.find_local_max();
        assert!(rep.tris.values().any(|i| i.is_local_max));
        rep.flood_rooms();
        let unrooted = rep.tris.values().filter(|i| i.root == i.root && !i.is_local_max).count();
        let _ = unrooted;
        let rooms = rep.get_rooms();
        assert!(!rooms.is_empty());
    }

    #[test]
    fn get_walls_returns_closed_loops() {
        let (tri, interior) = grid_triangulation(4);
        let rep = TriRep::from_interior(&tri, &interior);
        let walls = rep.get_walls();
        assert!(!walls.is_empty());
    }
}
