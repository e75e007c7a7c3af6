//! Point rings of standard sectors and their subdivision matrices.
//!
//! Ring layout, in the sector's radial order:
//! - closed sectors: `[c, E0, F0, E1, F1, ..., E(k-1), F(k-1)]`
//! - bounded sectors: the same followed by `Ek`
//!
//! `c` is the center, `Ei` the far end of sector edge `i` and `Fi` the corner
//! of quad `i` opposite the center.

use glam::DVec3;
use nalgebra::DMatrix;
use tracing::trace;

use crate::graph::ControlNetGraph;
use crate::sector::{Sector, SectorType};
use crate::subdivision::{crease_edge_point, crease_vertex_point, quad_vertex_point, smooth_edge_point};
use crate::types::{EdgeTag, VertexTag};

/// The points one standard sector's limit values depend on
#[derive(Debug, Clone, PartialEq)]
pub struct PointRing {
    sector_type: SectorType,
    points: Vec<DVec3>,
}

impl PointRing {
    /// Wrap points laid out as described in the module docs. `None` if the
    /// point count does not match the sector type.
    pub fn new(sector_type: SectorType, points: Vec<DVec3>) -> Option<Self> {
        (sector_type.is_valid() && points.len() == sector_type.ring_size()).then_some(Self {
            sector_type,
            points,
        })
    }

    /// Gather the ring of a standard sector.
    ///
    /// Returns `None` when the sector is not standard: a non-quad face, a
    /// sharp or SmoothX interior edge, a tagged far end of an interior edge,
    /// a bounding edge that is not a crease, extra edges or faces at a closed
    /// center, or a stored coefficient that disagrees with the sector type.
    pub fn gather(graph: &ControlNetGraph, sector: &Sector, tolerance: f64) -> Option<Self> {
        let center = sector.center();
        let vx = graph.vertex(center)?;
        let sector_type = sector.stored_type(graph)?;
        if !sector_type.is_valid() {
            return None;
        }
        let k = sector.face_count();
        let tag = sector_type.tag();

        if sector_type.is_closed() && (vx.edge_count() != k || vx.face_count() != k) {
            trace!("Vertex {:?} has edges or faces outside its sector", center);
            return None;
        }
        if tag == VertexTag::Crease && graph.vertex_crease_edges(center).len() != 2 {
            return None;
        }
        if tag.is_tagged() {
            if let Some(w) = sector.stored_coefficient(graph) {
                if (w - sector_type.coefficient()).abs() > tolerance {
                    trace!(
                        "Vertex {:?} stores coefficient {} for {:?}",
                        center,
                        w,
                        sector_type
                    );
                    return None;
                }
            }
        }

        let mut points = Vec::with_capacity(sector_type.ring_size());
        points.push(vx.point());
        for (i, ptr) in sector.edges().iter().enumerate() {
            let e = graph.edge(ptr.edge)?;
            let far = graph.vertex(e.vertex(ptr.end_index()))?;
            if is_crease_slot(sector_type, i) {
                if e.tag() != EdgeTag::Crease {
                    return None;
                }
            } else if e.tag() != EdgeTag::Smooth
                || e.is_sharp()
                || e.face_count() != 2
                || far.tag() != VertexTag::Smooth
            {
                return None;
            }
            points.push(far.point());

            if let Some(&f) = sector.faces().get(i) {
                let face = graph.face(f)?;
                if !face.is_quad() {
                    return None;
                }
                let corner = graph.face_corner(f, center)?;
                let diagonal = graph.face_vertices(f)?[(corner + 2) % 4];
                points.push(graph.vertex_point(diagonal)?);
            }
        }

        Self::new(sector_type, points)
    }

    pub fn sector_type(&self) -> SectorType {
        self.sector_type
    }

    pub fn points(&self) -> &[DVec3] {
        &self.points
    }

    pub fn center(&self) -> DVec3 {
        self.points[0]
    }

    /// `Σ mask[i]·points[i]`
    pub fn combine(&self, mask: &[f64]) -> DVec3 {
        self.points
            .iter()
            .zip(mask)
            .map(|(p, &m)| m * *p)
            .sum()
    }

    /// Ring of the center's child after one subdivision step
    pub fn subdivide(&self) -> PointRing {
        Self {
            sector_type: self.sector_type,
            points: subdivide_points(self.sector_type, &self.points),
        }
    }
}

/// Whether sector edge `i` is a bounding crease for this sector type
fn is_crease_slot(sector_type: SectorType, i: usize) -> bool {
    let k = sector_type.face_count() as usize;
    match sector_type.tag() {
        VertexTag::Dart => i == 0,
        VertexTag::Crease | VertexTag::Corner => i == 0 || i == k,
        VertexTag::Smooth | VertexTag::Unset => false,
    }
}

/// One Catmull-Clark step applied to a ring.
fn subdivide_points(sector_type: SectorType, ring: &[DVec3]) -> Vec<DVec3> {
    let k = sector_type.face_count() as usize;
    let closed = sector_type.is_closed();
    let edge_count = if closed { k } else { k + 1 };
    let c = ring[0];
    let e = |i: usize| ring[1 + 2 * (i % edge_count)];
    let f = |i: usize| ring[2 + 2 * i];

    let face_points: Vec<DVec3> = (0..k)
        .map(|i| 0.25 * (c + e(i) + f(i) + e(i + 1)))
        .collect();

    let center_weight = if sector_type.tag().is_tagged() {
        sector_type.coefficient()
    } else {
        0.5
    };
    let edge_points: Vec<DVec3> = (0..edge_count)
        .map(|i| {
            if is_crease_slot(sector_type, i) {
                return crease_edge_point(c, e(i));
            }
            let before = if closed { (i + k - 1) % k } else { i - 1 };
            smooth_edge_point(c, e(i), center_weight, face_points[before], face_points[i])
        })
        .collect();

    let center = match sector_type.tag() {
        VertexTag::Smooth | VertexTag::Dart => {
            let neighbors: Vec<DVec3> = (0..k).map(e).collect();
            let diagonals: Vec<DVec3> = (0..k).map(f).collect();
            quad_vertex_point(c, &neighbors, &diagonals)
        }
        VertexTag::Crease => crease_vertex_point(c, e(0), e(k)),
        VertexTag::Corner | VertexTag::Unset => c,
    };

    let mut out = Vec::with_capacity(ring.len());
    out.push(center);
    for i in 0..k {
        out.push(edge_points[i]);
        out.push(face_points[i]);
    }
    if !closed {
        out.push(edge_points[k]);
    }
    out
}

/// The `R×R` matrix mapping a ring to its subdivided ring
pub fn subdivision_matrix(sector_type: SectorType) -> DMatrix<f64> {
    let r = sector_type.ring_size();
    let mut matrix = DMatrix::zeros(r, r);
    let mut basis = vec![DVec3::ZERO; r];
    for j in 0..r {
        basis[j] = DVec3::X;
        let column = subdivide_points(sector_type, &basis);
        for (i, p) in column.iter().enumerate() {
            matrix[(i, j)] = p.x;
        }
        basis[j] = DVec3::ZERO;
    }
    matrix
}
