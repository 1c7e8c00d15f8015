//! Vertex attribute unification
//!
//! Polygon corners arrive as `(position, normal, uv)` index tuples. Corners
//! sharing a position index and a uv index collapse into one output vertex
//! when their normals agree within a per-axis tolerance.
//!
//! Corners are bucketed by `(position, uv)` first and clustered by normal
//! inside each bucket, so merge-eligible corners are always compared no
//! matter how their normal indices happen to sort.

use glam::Vec3;

/// Default per-axis normal tolerance
pub const NORMAL_TOLERANCE: f32 = 0.0001;

/// One input corner, in traversal order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawCorner {
    pub position: usize,
    pub normal: usize,
    pub uv: Option<usize>,
    /// Position of this corner in traversal order
    pub order: usize,
}

/// One deduplicated output vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergedVertex {
    pub position: usize,
    pub normal: usize,
    pub uv: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct MergeResult {
    pub vertices: Vec<MergedVertex>,
    /// Merged vertex id for each corner, indexed by `RawCorner::order`
    pub remap: Vec<u32>,
}

/// Collect corners from `(position, normal, uv)` tuples, assigning traversal order.
pub fn collect_corners<I>(tuples: I) -> Vec<RawCorner>
where
    I: IntoIterator<Item = (usize, usize, Option<usize>)>,
{
    tuples
        .into_iter()
        .enumerate()
        .map(|(order, (position, normal, uv))| RawCorner {
            position,
            normal,
            uv,
            order,
        })
        .collect()
}

fn normals_match(a: Vec3, b: Vec3, tolerance: f32) -> bool {
    (a - b).abs().cmplt(Vec3::splat(tolerance)).all()
}

/// Merge corners into a minimal vertex set.
///
/// `normals` maps a normal index to its value. `corners` must carry the
/// distinct orders `0..corners.len()`.
///
/// Within a `(position, uv)` bucket, corners are visited in traversal order.
/// The first corner of a cluster is its anchor; a later corner joins the first
/// cluster whose anchor normal is within `tolerance` on every axis and takes
/// the anchor's normal index. Vertex ids follow bucket order.
pub fn merge_corners<F>(corners: &[RawCorner], normals: F, tolerance: f32) -> MergeResult
where
    F: Fn(usize) -> Vec3,
{
    let mut sorted: Vec<&RawCorner> = corners.iter().collect();
    sorted.sort_by_key(|c| (c.position, c.uv, c.order));

    let mut vertices: Vec<MergedVertex> = Vec::new();
    let mut remap = vec![0u32; corners.len()];

    // Vertex ids of the clusters of the current bucket
    let mut bucket: Vec<u32> = Vec::new();
    let mut bucket_key = None;

    for corner in sorted {
        let key = (corner.position, corner.uv);
        if bucket_key != Some(key) {
            bucket.clear();
            bucket_key = Some(key);
        }

        let normal = normals(corner.normal);
        let existing = bucket.iter().copied().find(|&id| {
            let anchor = vertices[id as usize].normal;
            anchor == corner.normal || normals_match(normals(anchor), normal, tolerance)
        });

        let id = match existing {
            Some(id) => id,
            None => {
                let id = vertices.len() as u32;
                vertices.push(MergedVertex {
                    position: corner.position,
                    normal: corner.normal,
                    uv: corner.uv,
                });
                bucket.push(id);
                id
            }
        };
        remap[corner.order] = id;
    }

    MergeResult { vertices, remap }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(normals: &[Vec3]) -> impl Fn(usize) -> Vec3 + '_ {
        move |i| normals[i]
    }

    #[test]
    fn test_tolerance_groups_against_anchor() {
        let normals = [
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.00005),
            Vec3::new(0.0, 1.0, 0.01),
            Vec3::new(1.0, 0.0, 0.0),
        ];
        let corners = collect_corners((0..4).map(|n| (3, n, Some(5))));
        let result = merge_corners(&corners, lookup(&normals), NORMAL_TOLERANCE);

        assert_eq!(result.vertices.len(), 3);
        assert_eq!(result.remap, vec![0, 0, 1, 2]);
        assert_eq!(result.vertices[0].normal, 0);
        assert_eq!(result.vertices[1].normal, 2);
        assert_eq!(result.vertices[2].normal, 3);
    }

    #[test]
    fn test_identical_corners_collapse() {
        let normals = [Vec3::Z];
        let corners = collect_corners([(0, 0, Some(0)), (1, 0, Some(1)), (0, 0, Some(0))]);
        let result = merge_corners(&corners, lookup(&normals), NORMAL_TOLERANCE);
        assert_eq!(result.vertices.len(), 2);
        assert_eq!(result.remap, vec![0, 1, 0]);
    }

    #[test]
    fn test_different_uv_never_merges() {
        let normals = [Vec3::Z];
        let corners = collect_corners([(0, 0, Some(0)), (0, 0, Some(1)), (0, 0, None)]);
        let result = merge_corners(&corners, lookup(&normals), NORMAL_TOLERANCE);
        assert_eq!(result.vertices.len(), 3);
    }

    #[test]
    fn test_merge_independent_of_normal_index_order() {
        // Two equal normals stored far apart with a different one in between
        let normals = [Vec3::Y, Vec3::X, Vec3::new(0.0, 1.0, 0.00002)];
        let corners = collect_corners([(7, 0, Some(1)), (7, 1, Some(1)), (7, 2, Some(1))]);
        let result = merge_corners(&corners, lookup(&normals), NORMAL_TOLERANCE);
        assert_eq!(result.vertices.len(), 2);
        assert_eq!(result.remap[0], result.remap[2]);
        assert_ne!(result.remap[0], result.remap[1]);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let normals = [
            Vec3::Y,
            Vec3::new(0.0, 1.0, 0.00003),
            Vec3::X,
            Vec3::new(0.00009, 0.0, 1.0),
            Vec3::Z,
        ];
        let tuples = [
            (0, 0, Some(0)),
            (0, 1, Some(0)),
            (0, 2, Some(0)),
            (1, 3, Some(1)),
            (1, 4, Some(1)),
            (2, 4, None),
            (0, 1, Some(2)),
        ];
        let first = merge_corners(&collect_corners(tuples), lookup(&normals), NORMAL_TOLERANCE);

        let again = collect_corners(first.vertices.iter().map(|v| (v.position, v.normal, v.uv)));
        let second = merge_corners(&again, lookup(&normals), NORMAL_TOLERANCE);

        assert_eq!(second.vertices.len(), first.vertices.len());
        assert_eq!(second.vertices, first.vertices);
    }

    #[test]
    fn test_vertex_count_bounds() {
        // All normals pairwise outside tolerance
        let normals = [Vec3::X, Vec3::Y, Vec3::Z];
        let tuples = [
            (0, 0, Some(0)),
            (0, 1, Some(0)),
            (1, 2, Some(0)),
            (1, 2, Some(0)),
            (0, 0, Some(1)),
        ];
        let corners = collect_corners(tuples);
        let result = merge_corners(&corners, lookup(&normals), NORMAL_TOLERANCE);

        let distinct_pos_uv = 3; // (0,0) (1,0) (0,1)
        assert!(result.vertices.len() <= corners.len());
        assert!(result.vertices.len() >= distinct_pos_uv);
        assert_eq!(result.vertices.len(), 4);
        assert!(result.remap.iter().all(|&id| (id as usize) < result.vertices.len()));
    }

    #[test]
    fn test_empty_input() {
        let result = merge_corners(&[], |_| Vec3::ZERO, NORMAL_TOLERANCE);
        assert!(result.vertices.is_empty());
        assert!(result.remap.is_empty());
    }
}
