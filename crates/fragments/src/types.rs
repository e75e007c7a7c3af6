//! Fragment data structures.
//!
//! A fragment is a square grid of limit-surface samples stored row by row:
//! sample `(i, j)` lives at index `j * side + i`. The `i` axis runs from the
//! fragment's corner 0 to corner 1 and the `j` axis from corner 0 to corner 3,
//! so walking corners 0, 1, 2, 3 follows the face's boundary orientation.

use controlnet::{EdgeId, FaceId};
use glam::{DVec2, DVec3};
use serde::{Deserialize, Serialize};

/// The control-net curve a fragment side lies on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Seam {
    /// A whole edge, parameterized from its vertex 0 to its vertex 1
    Edge(EdgeId),
    /// Half 0 (at vertex 0) or half 1 (at vertex 1) of an edge, in the same
    /// direction as the edge
    EdgeHalf(EdgeId, u8),
    /// Level-1 edge from the midpoint of face edge `index` to the face center
    Spoke(FaceId, u32),
}

/// One side of a fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FragmentSide {
    pub seam: Seam,
    /// True when the side runs against the seam's direction
    pub reversed: bool,
}

/// Evaluated samples over one quad face or one corner of an n-gon face
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    pub face: FaceId,
    /// Face corner covered by this fragment, `None` for a whole quad
    pub corner: Option<u32>,
    /// Samples along one side
    pub side: usize,
    pub points: Vec<DVec3>,
    pub normals: Vec<DVec3>,
    pub texture_coordinates: Option<Vec<DVec2>>,
    /// Face override color
    pub color: Option<[f32; 4]>,
    /// Sides in corner order: side `k` runs from corner `k` to corner `k+1`
    pub sides: [FragmentSide; 4],
    /// False when any sample came from approximate evaluation
    pub exact: bool,
}

impl Fragment {
    #[inline]
    pub fn index(&self, i: usize, j: usize) -> usize {
        j * self.side + i
    }

    #[inline]
    pub fn point(&self, i: usize, j: usize) -> DVec3 {
        self.points[self.index(i, j)]
    }

    #[inline]
    pub fn normal(&self, i: usize, j: usize) -> DVec3 {
        self.normals[self.index(i, j)]
    }

    /// Sample indices of side `k`, from corner `k` to corner `k+1`
    pub fn side_indices(&self, k: usize) -> Vec<usize> {
        let last = self.side - 1;
        (0..self.side)
            .map(|t| match k % 4 {
                0 => self.index(t, 0),
                1 => self.index(last, t),
                2 => self.index(last - t, last),
                _ => self.index(0, last - t),
            })
            .collect()
    }

    /// Points of side `k`, from corner `k` to corner `k+1`
    pub fn side_points(&self, k: usize) -> Vec<DVec3> {
        self.side_indices(k).into_iter().map(|i| self.points[i]).collect()
    }

    /// Normals of side `k`, from corner `k` to corner `k+1`
    pub fn side_normals(&self, k: usize) -> Vec<DVec3> {
        self.side_indices(k).into_iter().map(|i| self.normals[i]).collect()
    }

    /// Samples of side `k` in the direction of its seam
    pub fn seam_points(&self, k: usize) -> Vec<DVec3> {
        let mut points = self.side_points(k);
        if self.sides[k % 4].reversed {
            points.reverse();
        }
        points
    }

    /// Normals of side `k` in the direction of its seam
    pub fn seam_normals(&self, k: usize) -> Vec<DVec3> {
        let mut normals = self.side_normals(k);
        if self.sides[k % 4].reversed {
            normals.reverse();
        }
        normals
    }

    /// Number of grid cells
    pub fn cell_count(&self) -> usize {
        (self.side - 1) * (self.side - 1)
    }
}

/// Fragments of a set of faces, generated at one density
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FragmentSet {
    /// Density `d` of quad fragments; n-gon corner fragments use `d - 1`
    pub density: u32,
    pub fragments: Vec<Fragment>,
}

impl FragmentSet {
    pub fn new(density: u32, fragments: Vec<Fragment>) -> Self {
        Self { density, fragments }
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Fragment> {
        self.fragments.iter()
    }

    /// Fragments generated for `face`
    pub fn face_fragments(&self, face: FaceId) -> impl Iterator<Item = &Fragment> {
        self.fragments.iter().filter(move |f| f.face == face)
    }

    /// Total number of samples over all fragments
    pub fn sample_count(&self) -> usize {
        self.fragments.iter().map(|f| f.points.len()).sum()
    }
}

/// Outcome of a sealing pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SealReport {
    /// Boundary points and normals that took their value from an earlier
    /// fragment
    pub shared_samples: usize,
    /// Shared samples that were further apart than the tolerance
    pub mismatches: usize,
    /// Largest distance between a sample and its shared value
    pub max_deviation: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(side: usize) -> Fragment {
        let points = (0..side * side)
            .map(|k| DVec3::new((k % side) as f64, (k / side) as f64, 0.0))
            .collect();
        let seam = FragmentSide {
            seam: Seam::Edge(EdgeId(1)),
            reversed: false,
        };
        Fragment {
            face: FaceId(1),
            corner: None,
            side,
            points,
            normals: vec![DVec3::Z; side * side],
            texture_coordinates: None,
            color: None,
            sides: [seam; 4],
            exact: true,
        }
    }

    #[test]
    fn test_sides_follow_corner_order() {
        let f = fragment(3);
        assert_eq!(f.side_points(0)[2], DVec3::new(2.0, 0.0, 0.0));
        assert_eq!(f.side_points(1)[2], DVec3::new(2.0, 2.0, 0.0));
        assert_eq!(f.side_points(2)[2], DVec3::new(0.0, 2.0, 0.0));
        assert_eq!(f.side_points(3)[2], DVec3::new(0.0, 0.0, 0.0));
        // Consecutive sides share their corner sample
        for k in 0..4 {
            assert_eq!(f.side_indices(k)[2], f.side_indices(k + 1)[0]);
        }
    }

    #[test]
    fn test_reversed_side_seam_order() {
        let mut f = fragment(3);
        f.sides[1].reversed = true;
        let side = f.side_points(1);
        let seam = f.seam_points(1);
        assert_eq!(seam[0], side[2]);
        assert_eq!(seam[2], side[0]);
    }
}
