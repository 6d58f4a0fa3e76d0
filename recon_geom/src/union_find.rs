//! Generic union-find over opaque `usize` ids, shared by the floor-plan cell
//! graph (the per-cell "union-find id" field of the spec's Cell data model)
//! and the surface-carve mesh connectivity check (`MIN_MESH_UNION_SIZE`).
//! Path compression on [`UnionFind::find`] plus union-by-size keeps both
//! amortized near-constant.

/// Disjoint-set forest over the integers `0..len`.
#[derive(Clone, Debug)]
pub struct UnionFind {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl UnionFind {
    /// Creates `len` singleton sets, each its own root.
    pub fn new(len: usize) -> Self {
        UnionFind {
            parent: (0..len).collect(),
            size: vec![1; len],
        }
    }

    /// Adds one more singleton set, returning its id.
    pub fn push(&mut self) -> usize {
        let id = self.parent.len();
        self.parent.push(id);
        self.size.push(1);
        id
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Finds the root of `i`'s set, compressing the path along the way.
    pub fn find(&mut self, i: usize) -> usize {
        if self.parent[i] != i {
            self.parent[i] = self.find(self.parent[i]);
        }
        self.parent[i]
    }

    /// Merges the sets containing `a` and `b`, attaching the smaller set's
    /// root under the larger's. Returns the resulting root.
    pub fn union(&mut self, a: usize, b: usize) -> usize {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return ra;
        }
        let (big, small) = if self.size[ra] >= self.size[rb] {
            (ra, rb)
        } else {
            (rb, ra)
        };
        self.parent[small] = big;
        self.size[big] += self.size[small];
        big
    }

    pub fn same_set(&mut self, a: usize, b: usize) -> bool {
        self.find(a) == self.find(b)
    }

    pub fn size_of(&mut self, i: usize) -> usize {
        let r = self.find(i);
        self.size[r]
    }

    /// Groups every id by its root, returning one `Vec<usize>` per component.
    pub fn components(&mut self) -> Vec<Vec<usize>> {
        let mut groups: crate::MapType<usize, Vec<usize>> = crate::new_map();
        for i in 0..self.len() {
            let root = self.find(i);
            groups.entry(root).or_default().push(i);
        }
        groups.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn singletons_are_distinct() {
        let mut uf = UnionFind::new(4);
        assert!(!uf.same_set(0, 1));
    }

    #[test]
    fn union_merges_transitively() {
        let mut uf = UnionFind::new(5);
        uf.union(0, 1);
        uf.union(1, 2);
        assert!(uf.same_set(0, 2));
        assert!(!uf.same_set(0, 3));
        assert_eq!(uf.size_of(0), 3);
    }

    #[test]
    fn components_partitions_all_ids() {
        let mut uf = UnionFind::new(6);
        uf.union(0, 1);
        uf.union(2, 3);
        let comps = uf.components();
        let total: usize = comps.iter().map(|c| c.len()).sum();
        assert_eq!(total, 6);
        assert_eq!(comps.len(), 4); // {0,1}, {2,3}, {4}, {5}
    }
}
