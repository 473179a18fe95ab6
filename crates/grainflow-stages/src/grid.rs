//! Voxel-grid topology helpers shared by the neighbor stages.

use smallvec::SmallVec;

/// Flat indices of the face-sharing neighbours of voxel `(x, y, z)` in a
/// grid of `dims`, x fastest. Voxels on the boundary have fewer than six.
pub(crate) fn face_neighbors(
    x: usize,
    y: usize,
    z: usize,
    dims: [usize; 3],
) -> SmallVec<[usize; 6]> {
    let [dx, dy, dz] = dims;
    let index = |x: usize, y: usize, z: usize| (z * dy + y) * dx + x;
    let mut result = SmallVec::new();
    if x > 0 {
        result.push(index(x - 1, y, z));
    }
    if x + 1 < dx {
        result.push(index(x + 1, y, z));
    }
    if y > 0 {
        result.push(index(x, y - 1, z));
    }
    if y + 1 < dy {
        result.push(index(x, y + 1, z));
    }
    if z > 0 {
        result.push(index(x, y, z - 1));
    }
    if z + 1 < dz {
        result.push(index(x, y, z + 1));
    }
    result
}
