//! The Blandford-Blelloch-Cardoze-Kadow triangulation structure (C3): a
//! vertex set plus one link-ring per vertex (including the ghost vertex),
//! with incremental insertion, point location, and a Delaunay verifier.
//! This is the sole topology store; no triangle ever has its own identity
//! beyond the three vertex ids that bound it.

use rand::Rng;

use recon_geom::predicates2d::{incircle, orient2d};
use recon_geom::Point2;

use crate::error::TriangulationError;
use crate::linkring::{self, LinkRing};
use crate::vertex::{is_ghost, Vertex, GHOST_VERTEX};

/// Result of locating a starting triangle for vertex insertion.
type Triangle = (u32, u32, u32);

pub struct Triangulation {
    vertices: Vec<Vertex>,
    links: Vec<LinkRing>,
    last_tri: Triangle,
}

impl Triangulation {
    /// Builds an empty triangulation holding `vertices` (1-based ids,
    /// ghost at id 0). Vertices must already be in their final insertion
    /// order (post-BRIO); none of them are yet connected.
    pub fn new(vertices: Vec<Vertex>) -> Self {
        let n = vertices.len();
        Triangulation {
            vertices,
            links: vec![LinkRing::new(); n + 1],
            last_tri: (GHOST_VERTEX, GHOST_VERTEX, GHOST_VERTEX),
        }
    }

    pub fn num_verts(&self) -> usize {
        self.vertices.len()
    }

    pub fn pos(&self, v: u32) -> Option<Point2> {
        if is_ghost(v) {
            None
        } else {
            self.vertices.get((v - 1) as usize).map(|vert| vert.pos)
        }
    }

    pub fn link_ring(&self, v: u32) -> Option<&LinkRing> {
        self.links.get(v as usize)
    }

    fn check_vertex(&self, v: u32) -> Result<(), TriangulationError> {
        if (v as usize) > self.num_verts() {
            Err(TriangulationError::VertexOutOfRange(v))
        } else {
            Ok(())
        }
    }

    /// Seeds the triangulation with vertices 1 and 2 and the ghost vertex,
    /// producing the two-triangle "double cover" of a single edge that
    /// every subsequent insertion grows outward from.
    pub fn begin_triangulation(&mut self) -> Result<(), TriangulationError> {
        if self.num_verts() < 2 {
            return Err(TriangulationError::TooFewVertices(self.num_verts()));
        }

        let (v1, v2) = (1u32, 2u32);
        let mut lrt = LinkRing::new();
        linkring::add(&mut lrt, GHOST_VERTEX, 0);
        linkring::add(&mut lrt, v2, 1);
        self.tri_set_neighbors(v1, &mut lrt)?;

        self.last_tri = (GHOST_VERTEX, v1, v2);
        Ok(())
    }

    /// Inserts vertex `v` into the triangulation, retriangulating the
    /// cavity of every triangle whose circumcircle contains it.
    pub fn insert_vertex(&mut self, v: u32) -> Result<(), TriangulationError> {
        self.check_vertex(v)?;
        let vp = self
            .pos(v)
            .expect("insert_vertex called with ghost vertex");

        let (s0, s1, s2) = self.last_tri;
        let (f0, f1, f2) = self.tri_locate(vp, s0, s1, s2)?;

        let mut lrt = LinkRing::new();
        if is_ghost(f0) {
            linkring::add(&mut lrt, f1, 0);
            linkring::add(&mut lrt, f2, 1);
            self.search_outer_edge(vp, &mut lrt)?;
        } else if is_ghost(f1) {
            linkring::add(&mut lrt, f2, 0);
            linkring::add(&mut lrt, f0, 1);
            self.search_outer_edge(vp, &mut lrt)?;
        } else if is_ghost(f2) {
            linkring::add(&mut lrt, f0, 0);
            linkring::add(&mut lrt, f1, 1);
            self.search_outer_edge(vp, &mut lrt)?;
        } else {
            linkring::add(&mut lrt, f0, 0);
            linkring::add(&mut lrt, f1, 1);
            linkring::add(&mut lrt, f2, 2);
        }

        self.search_circumcircles(vp, &mut lrt)?;

        if lrt.len() < 3 {
            return Err(TriangulationError::DegenerateCavity);
        }

        self.tri_set_neighbors(v, &mut lrt)?;

        let ring = &self.links[v as usize];
        self.last_tri = (v, linkring::get_val(ring, 0), linkring::get_val(ring, 1));
        Ok(())
    }

    /// Installs `neighs` (counter-clockwise) as `v`'s link-ring, first
    /// tearing `v` out of whatever triangles it currently belongs to, then
    /// splicing `v` into each new neighbor's ring in its place.
    fn tri_set_neighbors(&mut self, v: u32, neighs: &mut LinkRing) -> Result<(), TriangulationError> {
        let old_len = self.links[v as usize].len();
        for i in 0..old_len {
            let w = linkring::get_val(&self.links[v as usize], i);
            let j = linkring::find(&self.links[w as usize], v).ok_or_else(|| {
                TriangulationError::LinkRingCorruption(format!(
                    "tri_set_neighbors: {} missing from {}'s ring",
                    v, w
                ))
            })?;
            linkring::remove(&mut self.links[w as usize], j)?;
        }
        self.links[v as usize].clear();
        std::mem::swap(&mut self.links[v as usize], neighs);
        neighs.clear();

        let new_len = self.links[v as usize].len();
        for i in 0..new_len {
            let ring = &self.links[v as usize];
            let w = linkring::get_val(ring, i);
            let next = linkring::next_val(ring, i);
            let prev = linkring::prev_val(ring, i);
            linkring::replace_range(&mut self.links[w as usize], next, prev, v)?;
        }
        Ok(())
    }

    /// Given an edge `(v0, v1)`, returns the third vertex `v2` such that
    /// `(v0, v1, v2)` is a CCW triangle in this triangulation.
    pub fn tri_get_apex(&self, v0: u32, v1: u32) -> Result<u32, TriangulationError> {
        self.check_vertex(v0)?;
        self.check_vertex(v1)?;
        let ring = &self.links[v0 as usize];
        if ring.len() < 2 {
            return Err(TriangulationError::LinkRingCorruption(format!(
                "tri_get_apex: vertex {} has degree < 2",
                v0
            )));
        }
        let i = linkring::find(ring, v1).ok_or_else(|| {
            TriangulationError::LinkRingCorruption(format!(
                "tri_get_apex: edge ({}, {}) does not exist",
                v0, v1
            ))
        })?;
        Ok(linkring::next_val(ring, i))
    }

    /// Classifies `pos`'s location relative to `(v0, v1, v2)`: `3` if
    /// inside, or `0`/`1`/`2` if `pos` is across the edge opposite
    /// `v0`/`v1`/`v2` respectively, in which case the walk should cross
    /// that edge next.
    fn tri_get_directions(
        &self,
        start: Point2,
        pos: Point2,
        v0: u32,
        v1: u32,
        v2: u32,
    ) -> Result<u8, TriangulationError> {
        let ring0 = &self.links[v0 as usize];
        let i = linkring::find(ring0, v1).ok_or_else(|| {
            TriangulationError::LinkRingCorruption(format!(
                "tri_get_directions: edge ({}, {}) missing",
                v0, v1
            ))
        })?;
        if linkring::next_val(ring0, i) != v2 {
            return Err(TriangulationError::LinkRingCorruption(format!(
                "tri_get_directions: ({}, {}, {}) is not a triangle",
                v0, v1, v2
            )));
        }

        let p0 = self.pos(v0);
        let p1 = self.pos(v1);
        let p2 = self.pos(v2);

        if let Some(edge) = on_triangle_edge(p0, p1, p2, pos) {
            return Ok(match edge {
                0 => {
                    if self.tri_get_apex(v2, v1)? == GHOST_VERTEX {
                        0
                    } else {
                        3
                    }
                }
                1 => {
                    if self.tri_get_apex(v0, v2)? == GHOST_VERTEX {
                        1
                    } else {
                        3
                    }
                }
                _ => {
                    if self.tri_get_apex(v1, v0)? == GHOST_VERTEX {
                        2
                    } else {
                        3
                    }
                }
            });
        }

        if in_triangle(p0, p1, p2, pos) {
            return Ok(3);
        }

        let o0 = orient2d_opt(Some(start), Some(pos), p0);
        let o1 = orient2d_opt(Some(start), Some(pos), p1);
        let o2 = orient2d_opt(Some(start), Some(pos), p2);

        if o0 > 0.0 && o2 < 0.0 {
            Ok(1)
        } else if o1 > 0.0 && o0 < 0.0 {
            Ok(2)
        } else if o2 > 0.0 && o1 < 0.0 {
            Ok(0)
        } else {
            let q0 = orient2d_opt(p2, p1, Some(pos));
            let q1 = orient2d_opt(p0, p2, Some(pos));
            let q2 = orient2d_opt(p1, p0, Some(pos));
            if q0 >= q1 && q0 >= q2 {
                Ok(0)
            } else if q1 >= q0 && q1 >= q2 {
                Ok(1)
            } else {
                Ok(2)
            }
        }
    }

    /// Walks from a (possibly stale) starting triangle to the triangle
    /// containing `target`. Falls back to a random valid triangle if the
    /// given start no longer exists.
    fn tri_locate(
        &self,
        target: Point2,
        s0: u32,
        s1: u32,
        s2: u32,
    ) -> Result<Triangle, TriangulationError> {
        self.tri_locate_from(target, s0, s1, s2, &mut rand::thread_rng())
    }

    /// Same as [`Self::tri_locate`] but with an injectable RNG, used by
    /// tests that need reproducible fallback-triangle selection.
    pub fn tri_locate_from<R: Rng>(
        &self,
        target: Point2,
        mut s0: u32,
        mut s1: u32,
        mut s2: u32,
        rng: &mut R,
    ) -> Result<Triangle, TriangulationError> {
        let valid_start = (s0 as usize) <= self.num_verts()
            && linkring::find(&self.links[s0 as usize], s1)
                .map(|i| linkring::next_val(&self.links[s0 as usize], i) == s2)
                .unwrap_or(false);

        if !valid_start {
            loop {
                s0 = 1 + rng.gen_range(0..self.num_verts() as u32);
                let ring = &self.links[s0 as usize];
                if ring.len() < 2 {
                    continue;
                }
                s1 = linkring::get_val(ring, 0);
                s2 = linkring::get_val(ring, 1);
                break;
            }
        }

        let start = triangle_center(self.pos(s0), self.pos(s1), self.pos(s2));

        let mut sa_old = GHOST_VERTEX;
        let mut sb_old = GHOST_VERTEX;
        let mut iterations = 0usize;
        let loop_guard = 4 * (self.num_verts() + 4);

        loop {
            let dir = self.tri_get_directions(start, target, s0, s1, s2)?;
            if dir == 3 {
                return Ok((s0, s1, s2));
            }

            iterations += 1;
            if iterations > loop_guard {
                return Err(TriangulationError::LocateLoop);
            }

            match dir {
                0 => {
                    let apex = self.tri_get_apex(s2, s1)?;
                    if sa_old == s1 && sb_old == s2 {
                        return Ok((s0, s1, s2));
                    }
                    sa_old = s2;
                    sb_old = s1;
                    let (old_s1, old_s2) = (s1, s2);
                    s0 = apex;
                    s1 = old_s2;
                    s2 = old_s1;
                }
                1 => {
                    let apex = self.tri_get_apex(s0, s2)?;
                    if sa_old == s2 && sb_old == s0 {
                        return Ok((s0, s1, s2));
                    }
                    sa_old = s0;
                    sb_old = s2;
                    let (old_s0, old_s2) = (s0, s2);
                    s1 = apex;
                    s0 = old_s2;
                    s2 = old_s0;
                }
                _ => {
                    let apex = self.tri_get_apex(s1, s0)?;
                    if sa_old == s0 && sb_old == s1 {
                        return Ok((s0, s1, s2));
                    }
                    sa_old = s1;
                    sb_old = s0;
                    let (old_s0, old_s1) = (s0, s1);
                    s2 = apex;
                    s0 = old_s1;
                    s1 = old_s0;
                }
            }
        }
    }

    /// Walks from the triangle containing `a` to the triangle containing
    /// `b`, recording every triangle the straight segment `a`-`b` passes
    /// through (including both endpoints' triangles). Used to trace a
    /// sensor ray through the mesh rather than merely locate one point.
    pub fn trace_segment(&self, a: Point2, b: Point2) -> Result<Vec<Triangle>, TriangulationError> {
        let (s0, s1, s2) = self.last_tri;
        let (s0, s1, s2) = self.tri_locate(a, s0, s1, s2)?;
        self.trace_segment_from(a, b, s0, s1, s2, &mut rand::thread_rng())
    }

    /// Same as [`Self::trace_segment`] but with an injectable RNG and an
    /// explicit starting triangle, for reproducible tests.
    pub fn trace_segment_from<R: Rng>(
        &self,
        a: Point2,
        b: Point2,
        mut s0: u32,
        mut s1: u32,
        mut s2: u32,
        rng: &mut R,
    ) -> Result<Vec<Triangle>, TriangulationError> {
        let valid_start = (s0 as usize) <= self.num_verts()
            && linkring::find(&self.links[s0 as usize], s1)
                .map(|i| linkring::next_val(&self.links[s0 as usize], i) == s2)
                .unwrap_or(false);

        if !valid_start {
            loop {
                s0 = 1 + rng.gen_range(0..self.num_verts() as u32);
                let ring = &self.links[s0 as usize];
                if ring.len() < 2 {
                    continue;
                }
                s1 = linkring::get_val(ring, 0);
                s2 = linkring::get_val(ring, 1);
                break;
            }
        }

        let mut visited = Vec::new();
        let mut sa_old = GHOST_VERTEX;
        let mut sb_old = GHOST_VERTEX;
        let mut iterations = 0usize;
        let loop_guard = 4 * (self.num_verts() + 4);

        loop {
            visited.push((s0, s1, s2));
            let dir = self.tri_get_directions(a, b, s0, s1, s2)?;
            if dir == 3 {
                break;
            }

            iterations += 1;
            if iterations > loop_guard {
                return Err(TriangulationError::LocateLoop);
            }

            match dir {
                0 => {
                    let apex = self.tri_get_apex(s2, s1)?;
                    if sa_old == s1 && sb_old == s2 {
                        break;
                    }
                    sa_old = s2;
                    sb_old = s1;
                    let (old_s1, old_s2) = (s1, s2);
                    s0 = apex;
                    s1 = old_s2;
                    s2 = old_s1;
                }
                1 => {
                    let apex = self.tri_get_apex(s0, s2)?;
                    if sa_old == s2 && sb_old == s0 {
                        break;
                    }
                    sa_old = s0;
                    sb_old = s2;
                    let (old_s0, old_s2) = (s0, s2);
                    s1 = apex;
                    s0 = old_s2;
                    s2 = old_s0;
                }
                _ => {
                    let apex = self.tri_get_apex(s1, s0)?;
                    if sa_old == s0 && sb_old == s1 {
                        break;
                    }
                    sa_old = s1;
                    sb_old = s0;
                    let (old_s0, old_s1) = (s0, s1);
                    s2 = apex;
                    s0 = old_s1;
                    s1 = old_s0;
                }
            }
        }
        Ok(visited)
    }

    /// Depth-first expansion of the cavity `lrt` (initialized to the
    /// containing triangle's border) to every triangle whose circumcircle
    /// still contains `vp`.
    fn search_circumcircles(&self, vp: Point2, lrt: &mut LinkRing) -> Result<(), TriangulationError> {
        if lrt.len() < 3 {
            return Err(TriangulationError::DegenerateCavity);
        }

        let mut i = 0usize;
        while i < lrt.len() {
            let q = linkring::get_val(lrt, i);
            let p = linkring::next_val(lrt, i);
            let r = self.tri_get_apex(p, q)?;

            let pp = self.pos(p);
            let qp = self.pos(q);
            let rp = self.pos(r);

            if incircle_opt(pp, qp, rp, vp) > 0.0 {
                linkring::add(lrt, r, i + 1);
            } else {
                i += 1;
            }
        }
        Ok(())
    }

    /// When the located triangle touches the ghost vertex, the cavity
    /// search must instead walk the convex hull boundary in both
    /// directions from the known boundary edge, adding every hull vertex
    /// visible from `vp`.
    fn search_outer_edge(&self, vp: Point2, lrt: &mut LinkRing) -> Result<(), TriangulationError> {
        if lrt.len() != 2 {
            return Err(TriangulationError::LinkRingCorruption(
                "search_outer_edge requires a two-vertex boundary edge".into(),
            ));
        }

        let gvlr = &self.links[GHOST_VERTEX as usize];
        let i = linkring::find(gvlr, lrt[0]).ok_or_else(|| {
            TriangulationError::LinkRingCorruption("search_outer_edge: edge not on hull".into())
        })?;
        if linkring::next_val(gvlr, i) != lrt[1] {
            return Err(TriangulationError::LinkRingCorruption(
                "search_outer_edge: lrt edge misaligned with hull".into(),
            ));
        }

        let len = gvlr.len();
        let mut j = i;
        while j != linkring::next_idx(len, i) {
            let p = linkring::prev_val(gvlr, j);
            let q = linkring::get_val(gvlr, j);
            let (pp, qp) = (self.pos(p), self.pos(q));
            if orient2d_opt(pp, qp, Some(vp)) > 0.0 {
                linkring::add(lrt, p, 0);
            } else {
                break;
            }
            j = linkring::prev_idx(len, j);
        }

        let mut j = linkring::next_idx(len, i);
        while j != i {
            let p = linkring::get_val(gvlr, j);
            let q = linkring::next_val(gvlr, j);
            let (pp, qp) = (self.pos(p), self.pos(q));
            if orient2d_opt(pp, qp, Some(vp)) > 0.0 {
                linkring::add(lrt, q, lrt.len());
            } else {
                break;
            }
            j = linkring::next_idx(len, j);
        }

        linkring::add(lrt, GHOST_VERTEX, lrt.len());
        Ok(())
    }

    /// Checks every interior edge for the local-Delaunay condition (the
    /// apex of the opposite triangle must not lie inside this triangle's
    /// circumcircle) and that every triangle is listed counter-clockwise.
    pub fn verify_delaunay(&self) -> bool {
        let n = self.num_verts() as u32;
        for i in 1..=n {
            let ring = &self.links[i as usize];
            let raw_len = ring.len();
            let nl = if raw_len < 2 {
                0
            } else if raw_len == 2 {
                1
            } else {
                raw_len
            };

            for j in 0..nl {
                let w = linkring::get_val(ring, j);
                let s = linkring::next_val(ring, j);
                if !(i < w && i < s) {
                    continue;
                }

                let (ip, wp, sp) = (self.pos(i), self.pos(w), self.pos(s));
                let area = orient2d_opt(ip, wp, sp);
                if area < 0.0 {
                    return false;
                }
                if area == 0.0 && ip.is_some() && wp.is_some() && sp.is_some() {
                    return false;
                }

                for (a, b) in [(w, i), (s, w), (i, s)] {
                    let r = match self.tri_get_apex(a, b) {
                        Ok(r) => r,
                        Err(_) => return false,
                    };
                    let rp = self.pos(r);
                    if incircle_opt(ip, wp, sp, rp.unwrap_or_default()) > 0.0 && rp.is_some() {
                        return false;
                    }
                }
            }
        }
        true
    }
}

fn orient2d_opt(p: Option<Point2>, q: Option<Point2>, r: Option<Point2>) -> f64 {
    match (p, q, r) {
        (Some(p), Some(q), Some(r)) => orient2d(p, q, r),
        _ => 0.0,
    }
}

fn incircle_opt(p: Option<Point2>, q: Option<Point2>, r: Option<Point2>, s: Point2) -> f64 {
    match (p, q, r) {
        (Some(p), Some(q), Some(r)) => incircle(p, q, r, s),
        _ => 0.0,
    }
}

fn in_triangle(p: Option<Point2>, q: Option<Point2>, r: Option<Point2>, s: Point2) -> bool {
    recon_geom::predicates2d::intriangle(p, q, r, s)
}

/// True iff `q` lies strictly between `p` and `r` on the same line.
fn in_line(p: Option<Point2>, q: Option<Point2>, r: Option<Point2>) -> bool {
    match (p, q, r) {
        (Some(p), Some(q), Some(r)) => {
            let pq = p - q;
            let rq = r - q;
            if pq.dot(&rq) >= 0.0 {
                return false;
            }
            (rq.x * pq.y - rq.y * pq.x) == 0.0
        }
        _ => false,
    }
}

/// Returns which edge of triangle `(p, q, r)` point `s` lies on, if any:
/// `0` for the edge opposite `p`, `1` opposite `q`, `2` opposite `r`.
fn on_triangle_edge(p: Option<Point2>, q: Option<Point2>, r: Option<Point2>, s: Point2) -> Option<u8> {
    if in_line(p, Some(s), q) {
        Some(2)
    } else if in_line(q, Some(s), r) {
        Some(0)
    } else if in_line(r, Some(s), p) {
        Some(1)
    } else {
        None
    }
}

fn triangle_center(p: Option<Point2>, q: Option<Point2>, r: Option<Point2>) -> Point2 {
    let mut sum = Point2::new(0.0, 0.0);
    let mut c = 0.0;
    for pt in [p, q, r].into_iter().flatten() {
        sum += pt;
        c += 1.0;
    }
    if c == 0.0 {
        sum
    } else {
        sum / c
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn square_triangulation() -> Triangulation {
        let verts = vec![
            Vertex::new(Point2::new(0.0, 0.0), 0),
            Vertex::new(Point2::new(1.0, 0.0), 1),
            Vertex::new(Point2::new(1.0, 1.0), 2),
            Vertex::new(Point2::new(0.0, 1.0), 3),
        ];
        let mut tri = Triangulation::new(verts);
        tri.begin_triangulation().unwrap();
        for v in 3..=4u32 {
            tri.insert_vertex(v).unwrap();
        }
        tri
    }

    #[test]
    fn begin_triangulation_forms_ghost_double_cover() {
        let verts = vec![
            Vertex::new(Point2::new(0.0, 0.0), 0),
            Vertex::new(Point2::new(1.0, 0.0), 1),
        ];
        let mut tri = Triangulation::new(verts);
        tri.begin_triangulation().unwrap();
        assert_eq!(tri.tri_get_apex(1, 2).unwrap(), GHOST_VERTEX);
        assert_eq!(tri.tri_get_apex(2, GHOST_VERTEX).unwrap(), 1);
    }

    #[test]
    fn insert_vertex_builds_delaunay_square() {
        let tri = square_triangulation();
        assert!(tri.verify_delaunay());
    }

    #[test]
    fn locate_finds_containing_triangle() {
        let tri = square_triangulation();
        let mut rng = StdRng::seed_from_u64(1);
        let (v0, v1, v2) = tri
            .tri_locate_from(Point2::new(0.5, 0.5), 1, 2, 3, &mut rng)
            .unwrap();
        assert!(in_triangle(tri.pos(v0), tri.pos(v1), tri.pos(v2), Point2::new(0.5, 0.5)));
    }

    #[test]
    fn trace_segment_ends_in_the_target_triangle() {
        let tri = square_triangulation();
        let target = Point2::new(0.9, 0.9);
        let visited = tri.trace_segment(Point2::new(0.1, 0.1), target).unwrap();
        assert!(!visited.is_empty());
        let (v0, v1, v2) = *visited.last().unwrap();
        assert!(in_triangle(tri.pos(v0), tri.pos(v1), tri.pos(v2), target));
    }

    #[test]
    fn five_point_insertion_stays_delaunay() {
        let verts = vec![
            Vertex::new(Point2::new(0.0, 0.0), 0),
            Vertex::new(Point2::new(2.0, 0.0), 1),
            Vertex::new(Point2::new(2.0, 2.0), 2),
            Vertex::new(Point2::new(0.0, 2.0), 3),
            Vertex::new(Point2::new(1.0, 1.0), 4),
        ];
        let mut tri = Triangulation::new(verts);
        tri.begin_triangulation().unwrap();
        for v in 3..=5u32 {
            tri.insert_vertex(v).unwrap();
        }
        assert!(tri.verify_delaunay());
    }
}
