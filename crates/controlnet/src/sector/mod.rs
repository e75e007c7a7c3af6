//! Sector classification.
//!
//! A sector is the fan of faces around one side of a vertex. Its
//! [`SectorType`] (vertex tag, face count and corner angle) fixes both the
//! sector coefficient used by the subdivision rules and the eigenstructure
//! used for closed-form limit evaluation.

mod classify;
mod tags;

pub use classify::Sector;

use std::f64::consts::{PI, TAU};

use serde::{Deserialize, Serialize};

use crate::constants::CORNER_ANGLE_STEPS;
use crate::types::VertexTag;

/// Identifies one subdivision matrix.
///
/// Two sectors with equal `SectorType` subdivide identically, so their
/// eigenstructures are shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SectorType {
    tag: VertexTag,
    face_count: u32,
    /// Quantized corner angle, 0 for every tag except Corner
    corner_index: u32,
}

impl SectorType {
    /// Interior sector of a smooth vertex with `face_count` faces
    pub fn smooth(face_count: u32) -> Self {
        Self {
            tag: VertexTag::Smooth,
            face_count,
            corner_index: 0,
        }
    }

    /// Closed sector starting and ending on a dart's single crease edge
    pub fn dart(face_count: u32) -> Self {
        Self {
            tag: VertexTag::Dart,
            face_count,
            corner_index: 0,
        }
    }

    /// Sector bounded by the two crease edges of a crease vertex
    pub fn crease(face_count: u32) -> Self {
        Self {
            tag: VertexTag::Crease,
            face_count,
            corner_index: 0,
        }
    }

    /// Corner sector with a quantized angle index in `1..=CORNER_ANGLE_STEPS`.
    ///
    /// With a single face the angles `α` and `2π-α` give the same
    /// coefficient, so the index is folded into `1..=CORNER_ANGLE_STEPS/2`
    /// (with `2π` kept as the full index).
    pub fn corner(face_count: u32, corner_index: u32) -> Self {
        let mut index = corner_index.clamp(1, CORNER_ANGLE_STEPS);
        if face_count == 1 {
            let folded = index.min(CORNER_ANGLE_STEPS - index);
            index = if folded == 0 { CORNER_ANGLE_STEPS } else { folded };
        }
        Self {
            tag: VertexTag::Corner,
            face_count,
            corner_index: index,
        }
    }

    /// Corner sector from an angle in radians
    pub fn corner_from_angle(face_count: u32, angle: f64) -> Self {
        Self::corner(face_count, corner_angle_index(angle))
    }

    /// Sector type implied by a stored sector coefficient.
    ///
    /// Smooth, Dart and Crease types depend only on the face count; Corner
    /// types recover the angle index from the coefficient.
    pub fn from_coefficient(tag: VertexTag, face_count: u32, coefficient: f64) -> Option<Self> {
        match tag {
            VertexTag::Smooth => Some(Self::smooth(face_count)),
            VertexTag::Dart => Some(Self::dart(face_count)),
            VertexTag::Crease => Some(Self::crease(face_count)),
            VertexTag::Corner => corner_index_from_coefficient(face_count, coefficient)
                .map(|index| Self::corner(face_count, index)),
            VertexTag::Unset => None,
        }
    }

    pub fn tag(&self) -> VertexTag {
        self.tag
    }

    pub fn face_count(&self) -> u32 {
        self.face_count
    }

    pub fn corner_index(&self) -> u32 {
        self.corner_index
    }

    /// Corner angle in radians, 0 for non-corner sectors
    pub fn corner_angle(&self) -> f64 {
        corner_angle_from_index(self.corner_index)
    }

    /// Smooth and Dart sectors wrap all the way around the vertex
    pub fn is_closed(&self) -> bool {
        matches!(self.tag, VertexTag::Smooth | VertexTag::Dart)
    }

    /// Number of points in the sector's point ring
    pub fn ring_size(&self) -> usize {
        let k = self.face_count as usize;
        if self.is_closed() { 2 * k + 1 } else { 2 * k + 2 }
    }

    /// Whether a subdivision matrix exists for this type
    pub fn is_valid(&self) -> bool {
        let k = self.face_count;
        match self.tag {
            VertexTag::Smooth => k >= 3,
            VertexTag::Dart => k >= 2,
            VertexTag::Crease => k >= 1,
            VertexTag::Corner => k >= 1 && (1..=CORNER_ANGLE_STEPS).contains(&self.corner_index),
            VertexTag::Unset => false,
        }
    }

    /// Angle `θ` in `w = 1/2 + cos(θ)/3`
    pub fn theta(&self) -> f64 {
        let k = self.face_count.max(1) as f64;
        match self.tag {
            VertexTag::Dart => TAU / k,
            VertexTag::Crease => PI / k,
            VertexTag::Corner => self.corner_angle() / k,
            VertexTag::Smooth | VertexTag::Unset => TAU / 3.0,
        }
    }

    /// Weight of the tagged vertex in a smooth edge's subdivision point.
    ///
    /// Smooth sectors use 1/2.
    pub fn coefficient(&self) -> f64 {
        match self.tag {
            VertexTag::Smooth | VertexTag::Unset => 0.5,
            _ => coefficient_from_theta(self.theta()),
        }
    }
}

/// `w = 1/2 + cos(θ)/3`
pub fn coefficient_from_theta(theta: f64) -> f64 {
    0.5 + theta.cos() / 3.0
}

/// Quantize a corner angle to `1..=CORNER_ANGLE_STEPS`
pub fn corner_angle_index(angle: f64) -> u32 {
    if !angle.is_finite() {
        return CORNER_ANGLE_STEPS;
    }
    let steps = CORNER_ANGLE_STEPS as f64;
    let index = (angle * steps / TAU).round();
    (index.max(1.0) as u32).min(CORNER_ANGLE_STEPS)
}

/// Angle of a quantized corner index
pub fn corner_angle_from_index(index: u32) -> f64 {
    index as f64 * TAU / CORNER_ANGLE_STEPS as f64
}

/// Recover the quantized angle index of a corner sector from its coefficient.
fn corner_index_from_coefficient(face_count: u32, coefficient: f64) -> Option<u32> {
    if face_count == 0 || !coefficient.is_finite() {
        return None;
    }
    let cosine = (3.0 * (coefficient - 0.5)).clamp(-1.0, 1.0);
    let theta = cosine.acos();
    let angle = theta * face_count as f64;
    let index = (angle * CORNER_ANGLE_STEPS as f64 / TAU).round() as u32;
    Some(if index == 0 { CORNER_ANGLE_STEPS } else { index })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dart_four_faces_coefficient_is_half() {
        let w = SectorType::dart(4).coefficient();
        assert!((w - 0.5).abs() < 1e-15);
    }

    #[test]
    fn test_crease_coefficients() {
        // θ = π/2 for two faces
        assert!((SectorType::crease(2).coefficient() - 0.5).abs() < 1e-15);
        // θ = π for a single face
        assert!((SectorType::crease(1).coefficient() - 1.0 / 6.0).abs() < 1e-15);
    }

    #[test]
    fn test_corner_quantization() {
        assert_eq!(corner_angle_index(PI / 2.0), 18);
        assert_eq!(corner_angle_index(0.0), 1);
        assert_eq!(corner_angle_index(TAU), 72);
        assert_eq!(corner_angle_index(10.0), 72);
    }

    #[test]
    fn test_corner_coefficient_round_trip() {
        for k in 1..6u32 {
            for index in 1..=CORNER_ANGLE_STEPS {
                let sector = SectorType::corner(k, index);
                let recovered =
                    SectorType::from_coefficient(VertexTag::Corner, k, sector.coefficient())
                        .unwrap();
                assert_eq!(recovered, sector, "k={} index={}", k, index);
            }
        }
    }

    #[test]
    fn test_single_face_corner_folds() {
        let a = SectorType::corner(1, 18);
        let b = SectorType::corner(1, 54);
        assert_eq!(a, b);
        assert!((a.coefficient() - b.coefficient()).abs() < 1e-15);
    }

    #[test]
    fn test_ring_sizes() {
        assert_eq!(SectorType::smooth(4).ring_size(), 9);
        assert_eq!(SectorType::dart(3).ring_size(), 7);
        assert_eq!(SectorType::crease(2).ring_size(), 6);
        assert_eq!(SectorType::corner(1, 18).ring_size(), 4);
    }

    #[test]
    fn test_validity() {
        assert!(!SectorType::smooth(2).is_valid());
        assert!(SectorType::smooth(3).is_valid());
        assert!(SectorType::crease(1).is_valid());
        assert!(SectorType::from_coefficient(VertexTag::Unset, 4, 0.5).is_none());
    }
}
