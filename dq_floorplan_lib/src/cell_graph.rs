//! Cell graph: the bridge between the quadtree's raw aggregated samples and
//! the triangle-topology store. Each cell mirrors one populated quadtree
//! leaf; edges are added once the cells have been triangulated, so the
//! graph's own storage never owns topology, only per-cell geometry used by
//! simplification (QEM matrices, height ranges, room membership).

use recon_geom::{new_set, Point2, SetType};

use crate::quadtree::QuadTree;
use crate::tri_rep::Triple;
use crate::vertex::Vertex;

/// Upper triangle of a symmetric 3x3 quadric error matrix, accumulated as
/// `sum(n n^T, n.d)` rows: `[a, b, c, p, q, r]` for
/// `[[a,b,c],[b,p,q],[c,q,r]]` acting on homogeneous `(x, y, 1)`.
#[derive(Clone, Copy, Debug, Default)]
pub struct QuadricError {
    pub axx: f64,
    pub axy: f64,
    pub ax1: f64,
    pub ayy: f64,
    pub ay1: f64,
    pub a11: f64,
}

impl QuadricError {
    /// Folds in the error contribution of the line through `p` with unit
    /// normal `n` (the line `n . x = n . p`).
    pub fn add_edge(&mut self, p: Point2, n: Point2) {
        let d = -(n.x * p.x + n.y * p.y);
        self.axx += n.x * n.x;
        self.axy += n.x * n.y;
        self.ax1 += n.x * d;
        self.ayy += n.y * n.y;
        self.ay1 += n.y * d;
        self.a11 += d * d;
    }

    /// Quadratic form `x^T A x` for homogeneous `x = (p.x, p.y, 1)`.
    pub fn cost_at(&self, p: Point2) -> f64 {
        let x = p.x;
        let y = p.y;
        x * x * self.axx
            + 2.0 * x * y * self.axy
            + 2.0 * x * self.ax1
            + y * y * self.ayy
            + 2.0 * y * self.ay1
            + self.a11
    }

    pub fn merged_with(&self, other: &QuadricError) -> QuadricError {
        QuadricError {
            axx: self.axx + other.axx,
            axy: self.axy + other.axy,
            ax1: self.ax1 + other.ax1,
            ayy: self.ayy + other.ayy,
            ay1: self.ay1 + other.ay1,
            a11: self.a11 + other.a11,
        }
    }
}

/// One grid-cell sample: the floor-plan analogue of a point cloud vertex.
#[derive(Clone, Debug)]
pub struct Cell {
    pub pos: Point2,
    pub normal: Point2,
    pub poses: SetType<u32>,
    pub min_z: f64,
    pub max_z: f64,
    /// 1-based id of this cell's vertex in the triangulation (C3); `0`
    /// (the ghost sentinel) means "not yet triangulated".
    pub vert_id: u32,
    pub edges: SetType<usize>,
    pub qem: QuadricError,
    pub uf_id: usize,
    pub rooms: SetType<Triple>,
}

impl Cell {
    fn new(pos: Point2, normal: Point2, poses: SetType<u32>, uf_id: usize) -> Self {
        Cell {
            pos,
            normal,
            poses,
            min_z: f64::INFINITY,
            max_z: f64::NEG_INFINITY,
            vert_id: 0,
            edges: new_set(),
            qem: QuadricError::default(),
            uf_id,
            rooms: new_set(),
        }
    }
}

pub struct CellGraph {
    pub cells: Vec<Cell>,
}

impl CellGraph {
    /// Populates one cell per populated leaf of `tree`, in the tree's
    /// leaf-visit order, and returns the matching vertex list ready for
    /// BRIO reordering and triangulation (each vertex's `back_ref` is the
    /// cell index).
    pub fn from_quadtree(tree: &QuadTree, leaves: &[recon_geom::Point2]) -> (Self, Vec<Vertex>) {
        let mut cells = Vec::with_capacity(leaves.len());
        let mut verts = Vec::with_capacity(leaves.len());
        for (idx, &p) in leaves.iter().enumerate() {
            let data = tree.retrieve(p);
            let (normal, poses) = data
                .map(|d| (d.normal(), d.pose_inds().iter().copied().collect::<SetType<u32>>()))
                .unwrap_or((Point2::new(0.0, 0.0), new_set()));
            cells.push(Cell::new(p, normal, poses, idx));
            verts.push(Vertex::new(p, idx as u32));
        }
        (CellGraph { cells }, verts)
    }

    /// Adds a bidirectional edge between cells `a` and `b`, folding the
    /// edge's separating line into both endpoints' QEM matrices.
    pub fn add_edge(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        self.cells[a].edges.insert(b);
        self.cells[b].edges.insert(a);

        let pa = self.cells[a].pos;
        let pb = self.cells[b].pos;
        let dir = pb - pa;
        let len = dir.norm();
        if len < recon_geom::APPROX_ZERO {
            return;
        }
        let n = Point2::new(-dir.y, dir.x) / len;
        self.cells[a].qem.add_edge(pa, n);
        self.cells[b].qem.add_edge(pb, n);
    }

    pub fn remove_edge(&mut self, a: usize, b: usize) {
        self.cells[a].edges.remove(&b);
        self.cells[b].edges.remove(&a);
    }

    /// Edges whose two endpoints disagree on room membership (or where one
    /// side has no room at all): the wall segments of the floor plan.
    pub fn boundary_edges(&self, room_of: &dyn Fn(usize) -> Option<Triple>) -> Vec<(usize, usize)> {
        let mut out = Vec::new();
        for (i, cell) in self.cells.iter().enumerate() {
            for &j in &cell.edges {
                if j <= i {
                    continue;
                }
                if room_of(i) != room_of(j) {
                    out.push((i, j));
                }
            }
        }
        out
    }

    /// Combined cost of collapsing the edge `(a, b)` onto either endpoint,
    /// the lesser of the two (matches the QEM simplifier's priority-queue
    /// key: the cheaper of the two possible collapse directions).
    pub fn edge_cost(&self, a: usize, b: usize) -> f64 {
        let merged = self.cells[a].qem.merged_with(&self.cells[b].qem);
        merged.cost_at(self.cells[a].pos).min(merged.cost_at(self.cells[b].pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quadric_error_is_zero_on_the_line() {
        let mut q = QuadricError::default();
        q.add_edge(Point2::new(0.0, 0.0), Point2::new(0.0, 1.0));
        assert!(q.cost_at(Point2::new(5.0, 0.0)).abs() < 1e-9);
        assert!(q.cost_at(Point2::new(5.0, 1.0)) > 0.0);
    }

    #[test]
    fn edges_accumulate_symmetric_adjacency() {
        let mut tree = QuadTree::new(0.5);
        let p0 = Point2::new(0.0, 0.0);
        let p1 = Point2::new(1.0, 0.0);
        tree.insert(p0);
        tree.insert(p1);
        let (mut graph, _) = CellGraph::from_quadtree(&tree, &[p0, p1]);
        graph.add_edge(0, 1);
        assert!(graph.cells[0].edges.contains(&1));
        assert!(graph.cells[1].edges.contains(&0));
    }
}
