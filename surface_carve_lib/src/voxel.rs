//! Voxel identity and face-state bits (C6 data model).

use bitflags::bitflags;

/// A voxel's grid coordinate; no floating-point position is ever stored for
/// a voxel, only this triple. `vs` converts it to the world-space centre.
pub type VoxelId = (i32, i32, i32);

pub fn voxel_center(v: VoxelId, vs: f64) -> recon_geom::Point3 {
    recon_geom::Point3::new(
        (v.0 as f64 + 0.5) * vs,
        (v.1 as f64 + 0.5) * vs,
        (v.2 as f64 + 0.5) * vs,
    )
}

pub fn voxel_containing(p: recon_geom::Point3, vs: f64) -> VoxelId {
    ((p.x / vs).floor() as i32, (p.y / vs).floor() as i32, (p.z / vs).floor() as i32)
}

bitflags! {
    /// One bit per face, ordered `-y, +x, +y, -x, -z, +z`. A set bit means
    /// that face is exposed outward into carved space. State zero means
    /// "not a boundary voxel" -- the value is not stored in the sparse map.
    #[derive(Default)]
    pub struct FaceState: u8 {
        const NEG_Y = 0b0000_0001;
        const POS_X = 0b0000_0010;
        const POS_Y = 0b0000_0100;
        const NEG_X = 0b0000_1000;
        const NEG_Z = 0b0001_0000;
        const POS_Z = 0b0010_0000;
    }
}

/// The six face indices in bit order, paired with their grid offset.
pub const FACE_OFFSETS: [(FaceState, (i32, i32, i32)); 6] = [
    (FaceState::NEG_Y, (0, -1, 0)),
    (FaceState::POS_X, (1, 0, 0)),
    (FaceState::POS_Y, (0, 1, 0)),
    (FaceState::NEG_X, (-1, 0, 0)),
    (FaceState::NEG_Z, (0, 0, -1)),
    (FaceState::POS_Z, (0, 0, 1)),
];

/// True for the three axis-negative faces -- the ones a canonicalized
/// [`Face`](crate::mesher::Face) is always expressed in terms of.
pub fn is_canonical(f: FaceState) -> bool {
    matches!(f, FaceState::NEG_Y | FaceState::NEG_X | FaceState::NEG_Z)
}

pub fn opposite(f: FaceState) -> FaceState {
    match f {
        FaceState::NEG_Y => FaceState::POS_Y,
        FaceState::POS_Y => FaceState::NEG_Y,
        FaceState::POS_X => FaceState::NEG_X,
        FaceState::NEG_X => FaceState::POS_X,
        FaceState::NEG_Z => FaceState::POS_Z,
        FaceState::POS_Z => FaceState::NEG_Z,
        _ => FaceState::empty(),
    }
}

pub fn offset_of(f: FaceState) -> (i32, i32, i32) {
    FACE_OFFSETS.iter().find(|(bit, _)| *bit == f).map(|(_, o)| *o).unwrap_or((0, 0, 0))
}

pub fn neighbor(v: VoxelId, f: FaceState) -> VoxelId {
    let (dx, dy, dz) = offset_of(f);
    (v.0 + dx, v.1 + dy, v.2 + dz)
}

/// The outward unit normal of face `f`, in world space (face-index-local,
/// independent of voxel size).
pub fn face_normal(f: FaceState) -> recon_geom::Point3 {
    let (dx, dy, dz) = offset_of(f);
    recon_geom::Point3::new(dx as f64, dy as f64, dz as f64)
}

/// Canonicalizes `(voxel, face)` so the face is always expressed as one of
/// the three negative-direction faces on its owning voxel: a `+x`/`+y`/`+z`
/// face at `voxel` is the same geometric face as the opposite face at
/// `voxel`'s neighbour in that direction.
pub fn canonical_face(v: VoxelId, f: FaceState) -> (VoxelId, FaceState) {
    if is_canonical(f) {
        (v, f)
    } else {
        (neighbor(v, f), opposite(f))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opposite_is_involutive() {
        for (f, _) in FACE_OFFSETS {
            assert_eq!(opposite(opposite(f)), f);
        }
    }

    #[test]
    fn canonical_face_is_idempotent() {
        let v = (3, -2, 1);
        for (f, _) in FACE_OFFSETS {
            let (cv, cf) = canonical_face(v, f);
            assert!(is_canonical(cf));
            assert_eq!(canonical_face(cv, cf), (cv, cf));
        }
    }

    #[test]
    fn voxel_containing_round_trips_center() {
        let vs = 0.1;
        let v = (5, -3, 2);
        let c = voxel_center(v, vs);
        assert_eq!(voxel_containing(c, vs), v);
    }
}
