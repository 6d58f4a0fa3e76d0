//! Link-rings (C3): the cyclically-ordered neighbor list that is the sole
//! topology store of the triangulation. For vertex `v`, the link-ring is
//! `(w_0, ..., w_{k-1})` such that `(v, w_i, w_{i+1 mod k})` is always a CCW
//! triangle.

use smallvec::SmallVec;

use crate::error::TriangulationError;

/// Most link-rings in a well-formed 2D triangulation are small (vertex
/// degree is usually under a dozen); `SmallVec` keeps the common case on the
/// stack without ever being an invariant of the structure.
pub type LinkRing = SmallVec<[u32; 8]>;

/// Circular index one step forward.
pub fn next_idx(len: usize, i: usize) -> usize {
    (i + 1) % len
}

/// Circular index one step back.
pub fn prev_idx(len: usize, i: usize) -> usize {
    (i + len - 1) % len
}

pub fn get_val(ring: &LinkRing, i: usize) -> u32 {
    ring[i % ring.len()]
}

pub fn next_val(ring: &LinkRing, i: usize) -> u32 {
    ring[next_idx(ring.len(), i % ring.len())]
}

pub fn prev_val(ring: &LinkRing, i: usize) -> u32 {
    ring[prev_idx(ring.len(), i % ring.len())]
}

/// Inserts `v` into `ring` at position `i` (which may equal `ring.len()` to
/// append at the end, preserving cyclic order either way).
pub fn add(ring: &mut LinkRing, v: u32, i: usize) {
    let i = i.min(ring.len());
    ring.insert(i, v);
}

/// Removes and returns the value at position `i`.
pub fn remove(ring: &mut LinkRing, i: usize) -> Result<u32, TriangulationError> {
    if i >= ring.len() {
        return Err(TriangulationError::LinkRingCorruption(format!(
            "remove index {} out of bounds for ring of length {}",
            i,
            ring.len()
        )));
    }
    Ok(ring.remove(i))
}

/// Index of `v` within `ring`, or `None` if absent.
pub fn find(ring: &LinkRing, v: u32) -> Option<usize> {
    ring.iter().position(|&x| x == v)
}

/// Given a ring containing `v0` immediately followed (some steps later,
/// moving counter-clockwise) by `vf`, deletes every element strictly between
/// them and splices `w` in their place:
/// `[..., v0, v1, v2, ..., vf, ...] => [..., v0, w, vf, ...]`.
///
/// Used while installing a newly-inserted vertex's ring onto each of its
/// neighbors' rings, replacing the stretch of now-interior cavity vertices
/// with the new vertex. Tolerates the bootstrapping cases hit while the
/// triangulation is still being seeded: an empty ring, or a ring missing
/// one of `v0`/`vf` (the other endpoint not yet having been linked).
pub fn replace_range(ring: &mut LinkRing, v0: u32, vf: u32, w: u32) -> Result<(), TriangulationError> {
    if let Some(wi) = find(ring, w) {
        ring.remove(wi);
    }

    if ring.is_empty() {
        ring.push(v0);
        ring.push(w);
        if v0 != vf {
            ring.push(vf);
        }
        return Ok(());
    }

    if v0 == vf {
        return Err(TriangulationError::LinkRingCorruption(format!(
            "replace_range: v0 == vf == {} in a non-empty ring",
            v0
        )));
    }

    let v0i = find(ring, v0);
    let vfi = find(ring, vf);

    match (v0i, vfi) {
        (None, None) => Err(TriangulationError::LinkRingCorruption(format!(
            "replace_range: neither v0={} nor vf={} found",
            v0, vf
        ))),
        (None, Some(vfi)) => {
            ring.insert(vfi, w);
            ring.insert(vfi, v0);
            Ok(())
        }
        (Some(v0i), None) => {
            ring.insert(v0i + 1, vf);
            ring.insert(v0i + 1, w);
            Ok(())
        }
        (Some(v0i), Some(vfi)) => {
            let len = ring.len();
            let mut rebuilt: LinkRing = LinkRing::new();
            rebuilt.push(v0);
            rebuilt.push(w);
            let mut i = vfi;
            loop {
                rebuilt.push(ring[i]);
                if i == v0i {
                    break;
                }
                i = next_idx(len, i);
            }
            // rebuilt currently holds [v0, w, vf, ..., v0]; drop the
            // duplicate leading v0 at the tail.
            rebuilt.pop();
            *ring = rebuilt;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(vals: &[u32]) -> LinkRing {
        LinkRing::from_slice(vals)
    }

    #[test]
    fn circular_accessors() {
        let r = ring(&[1, 2, 3]);
        assert_eq!(next_val(&r, 2), 1);
        assert_eq!(prev_val(&r, 0), 3);
    }

    #[test]
    fn add_and_find() {
        let mut r = ring(&[1, 2, 3]);
        add(&mut r, 9, 1);
        assert_eq!(r.as_slice(), &[1, 9, 2, 3]);
        assert_eq!(find(&r, 9), Some(1));
        assert_eq!(find(&r, 42), None);
    }

    #[test]
    fn replace_range_collapses_cavity() {
        let mut r = ring(&[10, 1, 2, 3, 20]);
        replace_range(&mut r, 10, 20, 99).unwrap();
        assert_eq!(r.as_slice(), &[10, 99, 20]);
    }

    #[test]
    fn replace_range_adjacent_vertices() {
        let mut r = ring(&[10, 20, 30]);
        replace_range(&mut r, 10, 20, 99).unwrap();
        assert_eq!(r.as_slice(), &[10, 99, 20, 30]);
    }

    #[test]
    fn replace_range_seeds_empty_ring() {
        let mut r = ring(&[]);
        replace_range(&mut r, 1, 2, 9).unwrap();
        assert_eq!(r.as_slice(), &[1, 9, 2]);
    }

    #[test]
    fn replace_range_tolerates_missing_endpoint() {
        let mut r = ring(&[5, 6, 7]);
        replace_range(&mut r, 1, 6, 9).unwrap();
        assert_eq!(r.as_slice(), &[5, 1, 9, 6, 7]);
    }
}
