//! Two-colour occupancy quadtree (C9), ported from the original
//! `structs/quadtree.{h,cpp}`: each region gets one of these, filled with the
//! non-boundary faces that project onto it along the region's dominant axis,
//! then triangulated into a crack-free mesh skeleton the region triangulator
//! projects back onto the region's plane.
//!
//! All coordinates are tracked in "doubled" integer units internally (real
//! unit `u` is stored as `2*u`) so a leaf's centre -- which lands on a half
//! step once the tree reaches its finest depth -- is still an exact integer
//! and no float ever has to be hashed or compared for equality.

/// Quadrant offsets in CCW order starting from upper-right, matching the
/// original `quadtree_child_arrangement` table.
const CHILD_ARRANGEMENT: [(i64, i64); 4] = [(1, 1), (-1, 1), (-1, -1), (1, -1)];

#[derive(Clone, Debug)]
pub struct QuadNode {
    cx: i64,
    cy: i64,
    /// Side length, doubled.
    s: i64,
    value: bool,
    children: Option<Box<[QuadNode; 4]>>,
}

impl QuadNode {
    fn leaf(cx: i64, cy: i64, s: i64, value: bool) -> Self {
        QuadNode { cx, cy, s, value, children: None }
    }

    fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    /// A leaf of real side length 1 (doubled: 2) can't be subdivided further.
    fn at_max_depth(&self) -> bool {
        self.s <= 2
    }

    fn is_inside(&self, x: i64, y: i64) -> bool {
        let h = self.s / 2;
        x >= self.cx - h && x < self.cx + h && y >= self.cy - h && y < self.cy + h
    }

    fn subdivide(&mut self) {
        if !self.is_leaf() {
            return;
        }
        let child_s = self.s / 2;
        let offset = self.s / 4;
        let value = self.value;
        let children = CHILD_ARRANGEMENT.map(|(dx, dy)| QuadNode::leaf(self.cx + dx * offset, self.cy + dy * offset, child_s, value));
        self.children = Some(Box::new(children));
    }

    fn child_index_for(&self, x: i64, y: i64) -> usize {
        let right = x >= self.cx;
        let up = y >= self.cy;
        match (right, up) {
            (true, true) => 0,
            (false, true) => 1,
            (false, false) => 2,
            (true, false) => 3,
        }
    }

    fn fill_point(&mut self, x: i64, y: i64, value: bool) {
        if self.is_leaf() {
            if self.at_max_depth() {
                self.value = value;
                return;
            }
            self.subdivide();
        }
        let idx = self.child_index_for(x, y);
        self.children.as_mut().unwrap()[idx].fill_point(x, y, value);
    }

    /// Collapses a node whose four children are all leaves with value `true`
    /// into a single `true` leaf; a run of `false` leaves is never collapsed,
    /// since a `false` leaf carries no geometry to simplify away. Returns
    /// whether `self` is, after this call, a uniform `true` leaf -- the
    /// signal the parent uses to decide whether it can collapse in turn.
    fn simplify(&mut self) -> bool {
        match &mut self.children {
            None => self.value,
            Some(children) => {
                let mut all_true = true;
                for child in children.iter_mut() {
                    if !child.simplify() {
                        all_true = false;
                    }
                }
                if all_true {
                    self.children = None;
                    self.value = true;
                }
                all_true
            }
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct LeafRef {
    cx: i64,
    cy: i64,
    s: i64,
    value: bool,
}

fn collect_leaves(node: &QuadNode, out: &mut Vec<LeafRef>) {
    match &node.children {
        None => out.push(LeafRef { cx: node.cx, cy: node.cy, s: node.s, value: node.value }),
        Some(children) => {
            for child in children.iter() {
                collect_leaves(child, out);
            }
        }
    }
}

/// The four corners of a leaf's square, in the same CCW order as
/// [`CHILD_ARRANGEMENT`]: upper-right, upper-left, lower-left, lower-right.
fn corners_of(leaf: &LeafRef) -> [(i64, i64); 4] {
    let h = leaf.s / 2;
    [(leaf.cx + h, leaf.cy + h), (leaf.cx - h, leaf.cy + h), (leaf.cx - h, leaf.cy - h), (leaf.cx + h, leaf.cy - h)]
}

#[derive(Clone, Copy)]
enum Side {
    North,
    West,
    South,
    East,
}

/// The four sides in the CCW traversal order `UR -> UL -> LL -> LR -> UR`,
/// each described by its fixed coordinate, and the (start, end) span of its
/// variable coordinate walked in that same CCW direction.
struct SideDef {
    side: Side,
    fixed: i64,
    start: i64,
    end: i64,
}

fn side_defs(leaf: &LeafRef) -> [SideDef; 4] {
    let h = leaf.s / 2;
    [
        SideDef { side: Side::North, fixed: leaf.cy + h, start: leaf.cx + h, end: leaf.cx - h },
        SideDef { side: Side::West, fixed: leaf.cx - h, start: leaf.cy + h, end: leaf.cy - h },
        SideDef { side: Side::South, fixed: leaf.cy - h, start: leaf.cx - h, end: leaf.cx + h },
        SideDef { side: Side::East, fixed: leaf.cx + h, start: leaf.cy - h, end: leaf.cy + h },
    ]
}

fn point_on_side(side: Side, fixed: i64, variable: i64) -> (i64, i64) {
    match side {
        Side::North | Side::South => (variable, fixed),
        Side::West | Side::East => (fixed, variable),
    }
}

/// The neighbour's span along the axis perpendicular to `side`'s fixed axis.
fn neighbor_span(n: &LeafRef, side: Side) -> (i64, i64) {
    let h = n.s / 2;
    match side {
        Side::North | Side::South => (n.cx - h, n.cx + h),
        Side::West | Side::East => (n.cy - h, n.cy + h),
    }
}

/// The neighbour's fixed-axis coordinate on the edge facing `side`, i.e. the
/// coordinate of its side touching `leaf`.
fn neighbor_facing(n: &LeafRef, side: Side) -> i64 {
    let h = n.s / 2;
    match side {
        Side::North => n.cy - h,
        Side::South => n.cy + h,
        Side::West => n.cx + h,
        Side::East => n.cx - h,
    }
}

fn touches(leaf: &LeafRef, def: &SideDef, n: &LeafRef) -> bool {
    if std::ptr::eq(leaf, n) {
        return false;
    }
    if neighbor_facing(n, def.side) != def.fixed {
        return false;
    }
    let (lo, hi) = (def.start.min(def.end), def.start.max(def.end));
    let (nlo, nhi) = neighbor_span(n, def.side);
    nlo.max(lo) < nhi.min(hi)
}

/// True iff no leaf touching any of `leaf`'s four sides is smaller than it --
/// the "min feature" case that can be triangulated with a plain diagonal
/// split, no Steiner vertex required.
fn is_min_feature(leaf: &LeafRef, leaves: &[LeafRef]) -> bool {
    for def in &side_defs(leaf) {
        for n in leaves {
            if touches(leaf, def, n) && n.s < leaf.s {
                return false;
            }
        }
    }
    true
}

/// Ordered boundary points along one side of `leaf`, from its `start` corner
/// to its `end` corner, with one extra point inserted at each place a
/// touching neighbour's edge begins or ends within the span -- so a fan from
/// the leaf's centre to consecutive pairs of these points never leaves a gap
/// or crosses a neighbour's corner.
fn side_fan_points(leaf: &LeafRef, def: &SideDef, leaves: &[LeafRef]) -> Vec<(i64, i64)> {
    let mut splits: Vec<i64> = vec![def.start, def.end];
    let (lo, hi) = (def.start.min(def.end), def.start.max(def.end));
    for n in leaves {
        if !touches(leaf, def, n) {
            continue;
        }
        let (nlo, nhi) = neighbor_span(n, def.side);
        let clo = nlo.max(lo);
        let chi = nhi.min(hi);
        splits.push(clo);
        splits.push(chi);
    }
    splits.sort_unstable();
    splits.dedup();
    if def.start > def.end {
        splits.reverse();
    }
    splits.into_iter().map(|v| point_on_side(def.side, def.fixed, v)).collect()
}

#[derive(Clone, Copy, Debug)]
pub struct QuadTri {
    pub verts: [(i64, i64); 3],
}

fn triangulate_leaf(leaf: &LeafRef, leaves: &[LeafRef], out: &mut Vec<QuadTri>) {
    if !leaf.value {
        return;
    }
    if is_min_feature(leaf, leaves) {
        let c = corners_of(leaf);
        out.push(QuadTri { verts: [c[0], c[1], c[2]] });
        out.push(QuadTri { verts: [c[0], c[2], c[3]] });
        return;
    }
    let center = (leaf.cx, leaf.cy);
    for def in &side_defs(leaf) {
        let points = side_fan_points(leaf, def, leaves);
        for pair in points.windows(2) {
            out.push(QuadTri { verts: [center, pair[0], pair[1]] });
        }
    }
}

/// One region's occupancy quadtree, centred on the region's rounded centre in
/// its own local (u, v) coordinates.
pub struct QuadTree {
    root: QuadNode,
}

fn next_pow2(n: i64) -> i64 {
    let n = n.max(1) as u64;
    n.next_power_of_two() as i64
}

impl QuadTree {
    /// `radius` is the region's L-infinity radius from its centre, in real
    /// (undoubled) units; the tree is sized to the next power of two at
    /// least that large on each side, per the original's
    /// `s = 2 * next_largest_base_2(radius)` (the doubling there is folded
    /// into this module's internal doubled-unit representation instead).
    pub fn new(radius: i64) -> Self {
        let p = next_pow2(radius.max(1));
        let size2 = 4 * p; // doubled units: 2 * (2 * p)
        QuadTree { root: QuadNode::leaf(0, 0, size2, false) }
    }

    /// Marks the unit cell at local `(x, y)` occupied or not. Points outside
    /// the tree's extent are silently ignored -- they would only occur if
    /// the radius estimate that sized the tree undershot its true footprint,
    /// which would itself be a defect elsewhere, not something to panic on.
    pub fn fill_point(&mut self, x: i64, y: i64, value: bool) {
        let (x2, y2) = (x * 2, y * 2);
        if !self.root.is_inside(x2, y2) {
            return;
        }
        self.root.fill_point(x2, y2, value);
    }

    /// Simplifies, then triangulates every occupied leaf. Returned vertex
    /// coordinates are in doubled local units; divide by 2 to recover real
    /// local `(u, v)`.
    pub fn triangulate(&mut self) -> Vec<QuadTri> {
        self.root.simplify();
        let mut leaves = Vec::new();
        collect_leaves(&self.root, &mut leaves);
        let mut tris = Vec::new();
        for leaf in &leaves {
            triangulate_leaf(leaf, &leaves, &mut tris);
        }
        tris
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_single_filled_cell_triangulates_to_two_triangles() {
        let mut tree = QuadTree::new(1);
        tree.fill_point(0, 0, true);
        let tris = tree.triangulate();
        assert_eq!(tris.len(), 2);
    }

    #[test]
    fn a_uniformly_filled_quadrant_simplifies_to_one_square() {
        let mut tree = QuadTree::new(4);
        for x in 0..4 {
            for y in 0..4 {
                tree.fill_point(x, y, true);
            }
        }
        let tris = tree.triangulate();
        // fully uniform over the whole tree collapses to the root leaf: two
        // triangles, no Steiner fan needed since there is no smaller neighbour.
        assert_eq!(tris.len(), 2);
    }

    #[test]
    fn an_isolated_small_cell_next_to_a_big_region_gets_a_steiner_fan() {
        let mut tree = QuadTree::new(4);
        for x in -4..4 {
            for y in -4..0 {
                tree.fill_point(x, y, true);
            }
        }
        tree.fill_point(0, 0, true);
        let tris = tree.triangulate();
        // the lone unit cell at (0,0) sits against a much larger simplified
        // neighbour below it, so it must fan rather than split on a flat
        // diagonal; total triangle count exceeds the flat 2-per-leaf count.
        assert!(tris.len() > 4);
    }

    #[test]
    fn simplify_never_collapses_a_false_run() {
        let mut tree = QuadTree::new(2);
        tree.fill_point(0, 0, true);
        // leave the other three unit cells false
        let tris = tree.triangulate();
        assert_eq!(tris.len(), 2);
    }
}
