//! Eigenstructure of sector subdivision matrices.
//!
//! The limit point of a standard sector is the dot product of its ring with
//! the left eigenvector of the subdivision matrix for eigenvalue 1. Tangents
//! come from left eigenvectors of the subdominant eigenvalue. Both depend only
//! on the [`SectorType`], so they are computed once and shared through a
//! process-wide table.

use std::collections::HashMap;
use std::f64::consts::{PI, TAU};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use glam::DVec3;
use nalgebra::linalg::Schur;
use nalgebra::{DMatrix, DVector};
use tracing::{debug, warn};

use super::ring::{PointRing, subdivision_matrix};
use crate::sector::SectorType;
use crate::types::{SubdError, VertexTag};

/// Eigenvalues closer than this are treated as one
const EIGENVALUE_CLUSTER: f64 = 1.0e-6;

const SCHUR_MAX_ITERATIONS: usize = 10_000;

/// Masks that turn a point ring into limit values
#[derive(Debug, Clone, PartialEq)]
pub struct SectorEigenstructure {
    sector_type: SectorType,
    subdominant: f64,
    limit_mask: Vec<f64>,
    tangent_masks: [Vec<f64>; 2],
    /// Second tangent mask used when the first two tangents are parallel.
    /// Present only when the subdominant eigenspace is one-dimensional.
    alternate_mask: Option<Vec<f64>>,
}

impl SectorEigenstructure {
    /// Build the subdivision matrix of `sector_type` and decompose it.
    ///
    /// `tolerance` is the relative singular-value threshold below which a
    /// direction counts as part of a null space.
    pub fn compute(sector_type: SectorType, tolerance: f64) -> Result<Self, SubdError> {
        if !sector_type.is_valid() {
            return Err(SubdError::Eigen(format!(
                "no subdivision matrix for {:?}",
                sector_type
            )));
        }
        let s = subdivision_matrix(sector_type);
        let r = s.nrows();
        let st = s.transpose();

        // ===== Limit mask: left eigenvector for eigenvalue 1 =====
        let unit = null_space(&shifted(&st, 1.0), tolerance);
        let limit_mask = match unit.as_slice() {
            [l] => normalized_to_unit_sum(l).ok_or_else(|| {
                SubdError::Eigen(format!("limit mask of {:?} sums to zero", sector_type))
            })?,
            other => {
                return Err(SubdError::Eigen(format!(
                    "eigenvalue 1 of {:?} has multiplicity {}",
                    sector_type,
                    other.len()
                )));
            }
        };

        // ===== Subdominant eigenvalue =====
        let spectrum = sorted_spectrum(&s, sector_type)?;
        let lambda = spectrum
            .first()
            .copied()
            .ok_or_else(|| SubdError::Eigen(format!("{:?} has no subdominant eigenvalue", sector_type)))?;
        if !(lambda > 0.0 && lambda < 1.0) {
            return Err(SubdError::Eigen(format!(
                "subdominant eigenvalue {} of {:?} is outside (0, 1)",
                lambda, sector_type
            )));
        }

        // ===== Tangent masks =====
        let subdominant_space = null_space(&shifted(&st, lambda), tolerance);
        let (tangent_masks, alternate_mask) = match subdominant_space.len() {
            0 => {
                return Err(SubdError::Eigen(format!(
                    "no eigenvector for λ = {} of {:?}",
                    lambda, sector_type
                )));
            }
            1 => {
                // One-dimensional subdominant space: pair it with the next
                // eigenvalue's eigenvector and keep its generalized vector
                let mu = spectrum
                    .iter()
                    .copied()
                    .find(|&m| (m - lambda).abs() > EIGENVALUE_CLUSTER)
                    .ok_or_else(|| {
                        SubdError::Eigen(format!("{:?} has no second eigenvalue", sector_type))
                    })?;
                let shifted_mu = shifted(&st, mu);
                let next = null_space(&shifted_mu, tolerance);
                let Some(second) = next.first() else {
                    return Err(SubdError::Eigen(format!(
                        "no eigenvector for μ = {} of {:?}",
                        mu, sector_type
                    )));
                };
                let generalized = shifted_mu
                    .svd(true, true)
                    .solve(second, tolerance)
                    .ok()
                    .and_then(|g| normalized(&g));
                debug!(
                    "{:?}: one-dimensional subdominant space, using μ = {}",
                    sector_type, mu
                );
                let degenerate =
                    || SubdError::Eigen(format!("zero tangent mask for {:?}", sector_type));
                (
                    [
                        normalized(&subdominant_space[0]).ok_or_else(degenerate)?,
                        normalized(second).ok_or_else(degenerate)?,
                    ],
                    generalized,
                )
            }
            _ => (probe_tangent_masks(sector_type, &subdominant_space, r), None),
        };

        debug!(
            "Computed eigenstructure of {:?}: λ = {:.12}, ring size {}",
            sector_type, lambda, r
        );
        Ok(Self {
            sector_type,
            subdominant: lambda,
            limit_mask: limit_mask.iter().copied().collect(),
            tangent_masks: tangent_masks.map(|m| m.iter().copied().collect()),
            alternate_mask: alternate_mask.map(|m| m.iter().copied().collect()),
        })
    }

    pub fn sector_type(&self) -> SectorType {
        self.sector_type
    }

    /// Largest eigenvalue below 1 in modulus
    pub fn subdominant(&self) -> f64 {
        self.subdominant
    }

    pub fn limit_mask(&self) -> &[f64] {
        &self.limit_mask
    }

    pub fn tangent_masks(&self) -> [&[f64]; 2] {
        [&self.tangent_masks[0], &self.tangent_masks[1]]
    }

    pub fn has_alternate(&self) -> bool {
        self.alternate_mask.is_some()
    }

    pub fn limit_point(&self, ring: &PointRing) -> DVec3 {
        ring.combine(&self.limit_mask)
    }

    pub fn tangents(&self, ring: &PointRing) -> [DVec3; 2] {
        [
            ring.combine(&self.tangent_masks[0]),
            ring.combine(&self.tangent_masks[1]),
        ]
    }

    /// Replacement for the second tangent, if this sector type has one
    pub fn alternate_tangent(&self, ring: &PointRing) -> Option<DVec3> {
        self.alternate_mask.as_ref().map(|m| ring.combine(m))
    }
}

// ============================================================================
// Shared table
// ============================================================================

type EigenTable = HashMap<(SectorType, u64), Arc<SectorEigenstructure>>;

fn table() -> &'static RwLock<EigenTable> {
    static TABLE: OnceLock<RwLock<EigenTable>> = OnceLock::new();
    TABLE.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Eigenstructure of `sector_type`, computed on first use and shared by
/// every graph in the process.
pub fn eigenstructure(
    sector_type: SectorType,
    tolerance: f64,
) -> Result<Arc<SectorEigenstructure>, SubdError> {
    let key = (sector_type, tolerance.to_bits());
    {
        let table = table().read().unwrap_or_else(PoisonError::into_inner);
        if let Some(found) = table.get(&key) {
            return Ok(Arc::clone(found));
        }
    }

    let computed = match SectorEigenstructure::compute(sector_type, tolerance) {
        Ok(eigen) => Arc::new(eigen),
        Err(err) => {
            warn!("Eigenstructure of {:?} failed: {}", sector_type, err);
            return Err(err);
        }
    };
    let mut table = table().write().unwrap_or_else(PoisonError::into_inner);
    Ok(Arc::clone(table.entry(key).or_insert(computed)))
}

/// Number of sector types with a shared eigenstructure
pub fn cached_eigenstructure_count() -> usize {
    table()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .len()
}

// ============================================================================
// Linear algebra helpers
// ============================================================================

/// `m - value·I`
fn shifted(m: &DMatrix<f64>, value: f64) -> DMatrix<f64> {
    let n = m.nrows();
    m - DMatrix::<f64>::identity(n, n) * value
}

/// Orthonormal basis of the null space of `m`
fn null_space(m: &DMatrix<f64>, tolerance: f64) -> Vec<DVector<f64>> {
    let svd = m.clone().svd(false, true);
    let Some(v_t) = svd.v_t.as_ref() else {
        return Vec::new();
    };
    let scale = svd.singular_values.max().max(1.0);
    svd.singular_values
        .iter()
        .enumerate()
        .filter(|&(_, &sigma)| sigma <= tolerance * scale)
        .map(|(i, _)| v_t.row(i).transpose())
        .collect()
}

/// Real parts of the eigenvalues other than 1, largest modulus first, with
/// clustered values averaged.
fn sorted_spectrum(s: &DMatrix<f64>, sector_type: SectorType) -> Result<Vec<f64>, SubdError> {
    let schur = Schur::try_new(s.clone(), f64::EPSILON, SCHUR_MAX_ITERATIONS).ok_or_else(|| {
        SubdError::Eigen(format!("Schur decomposition of {:?} did not converge", sector_type))
    })?;
    let mut values: Vec<(f64, f64, f64)> = schur
        .complex_eigenvalues()
        .iter()
        .map(|z| (z.norm(), z.re, z.im))
        .filter(|&(_, re, im)| !((re - 1.0).abs() < EIGENVALUE_CLUSTER && im.abs() < EIGENVALUE_CLUSTER))
        .collect();
    values.sort_by(|a, b| b.0.total_cmp(&a.0));

    let mut spectrum: Vec<f64> = Vec::new();
    let mut i = 0;
    while i < values.len() {
        let (modulus, re, im) = values[i];
        if im.abs() > EIGENVALUE_CLUSTER && spectrum.is_empty() {
            return Err(SubdError::Eigen(format!(
                "subdominant eigenvalue of {:?} is complex ({} + {}i)",
                sector_type, re, im
            )));
        }
        let cluster: Vec<f64> = values[i..]
            .iter()
            .take_while(|v| (v.0 - modulus).abs() < EIGENVALUE_CLUSTER)
            .map(|v| v.1)
            .collect();
        i += cluster.len();
        spectrum.push(cluster.iter().sum::<f64>() / cluster.len() as f64);
    }
    Ok(spectrum)
}

fn normalized_to_unit_sum(v: &DVector<f64>) -> Option<DVector<f64>> {
    let sum = v.sum();
    (sum.abs() > f64::EPSILON).then(|| v / sum)
}

fn normalized(v: &DVector<f64>) -> Option<DVector<f64>> {
    let norm = v.norm();
    (norm > f64::EPSILON).then(|| v / norm)
}

/// Pick two tangent masks from a subdominant eigenspace of dimension ≥ 2 by
/// projecting cosine and sine waves around the ring onto it.
fn probe_tangent_masks(
    sector_type: SectorType,
    space: &[DVector<f64>],
    r: usize,
) -> [DVector<f64>; 2] {
    let k = sector_type.face_count() as usize;
    let step = match sector_type.tag() {
        VertexTag::Smooth | VertexTag::Dart => TAU / k as f64,
        _ => PI / k as f64,
    };
    let wave = |phase: fn(f64) -> f64| {
        let mut probe = DVector::<f64>::zeros(r);
        for slot in 1..r {
            // Edge slots at whole steps, face slots halfway between
            let position = (slot - 1) as f64 / 2.0;
            probe[slot] = phase(position * step);
        }
        probe
    };
    let project = |probe: &DVector<f64>| {
        space
            .iter()
            .fold(DVector::<f64>::zeros(r), |acc, b| acc + b * b.dot(probe))
    };

    let first = project(&wave(f64::cos));
    let second = project(&wave(f64::sin));
    match (normalized(&first), normalized(&second)) {
        (Some(a), Some(b)) if a.dot(&b).abs() < 1.0 - 1.0e-6 => [a, b],
        _ => [space[0].clone(), space[1].clone()],
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn smooth_subdominant(k: u32) -> f64 {
        let a = TAU / k as f64;
        let c = (0.5 * a).cos();
        (5.0 + a.cos() + c * (18.0 + 2.0 * a.cos()).sqrt()) / 16.0
    }

    #[test]
    fn test_regular_limit_mask() {
        let eigen = SectorEigenstructure::compute(SectorType::smooth(4), 1e-7).unwrap();
        let mask = eigen.limit_mask();
        assert_abs_diff_eq!(mask[0], 4.0 / 9.0, epsilon = 1e-12);
        for i in 0..4 {
            assert_abs_diff_eq!(mask[1 + 2 * i], 1.0 / 9.0, epsilon = 1e-12);
            assert_abs_diff_eq!(mask[2 + 2 * i], 1.0 / 36.0, epsilon = 1e-12);
        }
        assert_abs_diff_eq!(eigen.subdominant(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_smooth_subdominant_eigenvalues() {
        for k in 3..=12 {
            let eigen = SectorEigenstructure::compute(SectorType::smooth(k), 1e-7).unwrap();
            assert_abs_diff_eq!(eigen.subdominant(), smooth_subdominant(k), epsilon = 1e-10);
            assert!(!eigen.has_alternate());
        }
    }

    #[test]
    fn test_crease_limit_mask_is_curve_mask() {
        let eigen = SectorEigenstructure::compute(SectorType::crease(2), 1e-7).unwrap();
        let mask = eigen.limit_mask();
        // [c, E0, F0, E1, F1, E2]
        assert_abs_diff_eq!(mask[0], 2.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(mask[1], 1.0 / 6.0, epsilon = 1e-12);
        assert_abs_diff_eq!(mask[5], 1.0 / 6.0, epsilon = 1e-12);
        for i in [2, 3, 4] {
            assert_abs_diff_eq!(mask[i], 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_corner_limit_is_center() {
        let eigen = SectorEigenstructure::compute(SectorType::corner(1, 18), 1e-7).unwrap();
        let mask = eigen.limit_mask();
        assert_abs_diff_eq!(mask[0], 1.0, epsilon = 1e-12);
        for &m in &mask[1..] {
            assert_abs_diff_eq!(m, 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_single_face_crease_uses_alternate() {
        let eigen = SectorEigenstructure::compute(SectorType::crease(1), 1e-7).unwrap();
        assert_abs_diff_eq!(eigen.subdominant(), 0.5, epsilon = 1e-12);
        assert!(eigen.has_alternate());
    }

    #[test]
    fn test_tangent_masks_sum_to_zero() {
        for sector_type in [SectorType::smooth(5), SectorType::dart(3), SectorType::crease(3)] {
            let eigen = SectorEigenstructure::compute(sector_type, 1e-7).unwrap();
            for mask in eigen.tangent_masks() {
                assert_abs_diff_eq!(mask.iter().sum::<f64>(), 0.0, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn test_shared_table_reuses_entries() {
        let a = eigenstructure(SectorType::smooth(6), 1e-7).unwrap();
        let b = eigenstructure(SectorType::smooth(6), 1e-7).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(cached_eigenstructure_count() >= 1);
    }

    #[test]
    fn test_invalid_type_rejected() {
        assert!(SectorEigenstructure::compute(SectorType::smooth(2), 1e-7).is_err());
    }
}
