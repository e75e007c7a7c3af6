//! Limit surface evaluation.
//!
//! Standard sectors are evaluated in closed form from their [`PointRing`]
//! and the shared [`SectorEigenstructure`] of their sector type. Anything
//! else is refined locally until the ring becomes standard, or until the
//! configured number of fallback levels runs out, in which case the last
//! subdivision point is returned as an approximation.

mod eigen;
mod ring;

pub use eigen::{SectorEigenstructure, cached_eigenstructure_count, eigenstructure};
pub use ring::{PointRing, subdivision_matrix};

use glam::DVec3;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::cache::cached;
use crate::graph::ControlNetGraph;
use crate::sector::Sector;
use crate::types::{EdgeId, EdgeTag, FaceId, VertexId, VertexTag};

/// A point on the limit surface with its tangent frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfacePoint {
    pub point: DVec3,
    /// Two tangent directions; not normalized
    pub tangents: [DVec3; 2],
    /// Unit normal, or zero where the surface has no tangent plane
    pub normal: DVec3,
    /// False when the value comes from bounded refinement instead of the
    /// closed form
    pub exact: bool,
}

impl SurfacePoint {
    /// Surface point of a vertex with no faces: its own position
    fn isolated(point: DVec3) -> Self {
        Self {
            point,
            tangents: [DVec3::ZERO; 2],
            normal: DVec3::ZERO,
            exact: true,
        }
    }
}

/// Limit value of one sector of a vertex
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SectorSurfacePoint {
    /// First face of the sector, `None` for a vertex without faces
    pub first_face: Option<FaceId>,
    pub surface: SurfacePoint,
}

/// Cubic Bézier approximation of the limit curve over an edge
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LimitCurve {
    /// Control points from the edge's vertex 0 to its vertex 1
    pub control_points: [DVec3; 4],
    /// True when the curve is the limit curve itself
    pub exact: bool,
}

impl LimitCurve {
    /// Point at parameter `t ∈ [0, 1]`
    pub fn evaluate(&self, t: f64) -> DVec3 {
        let [p0, p1, p2, p3] = self.control_points;
        let s = 1.0 - t;
        s * s * s * p0 + 3.0 * s * s * t * p1 + 3.0 * s * t * t * p2 + t * t * t * p3
    }

    /// Derivative at parameter `t`
    pub fn derivative(&self, t: f64) -> DVec3 {
        let [p0, p1, p2, p3] = self.control_points;
        let s = 1.0 - t;
        3.0 * (s * s * (p1 - p0) + 2.0 * s * t * (p2 - p1) + t * t * (p3 - p2))
    }
}

impl ControlNetGraph {
    /// Limit values of every sector of `v`, saved on first query.
    ///
    /// Returns `None` for an Unset vertex or when a sector cannot be found.
    pub fn vertex_surface_points(&self, v: VertexId) -> Option<Vec<SectorSurfacePoint>> {
        let vx = self.vertices.get(v)?;
        cached(&vx.cache.surface_points, vx.modified, || {
            self.compute_vertex_surface_points(v)
        })
    }

    /// Limit value of the sector of `v` containing `face`, or of its only
    /// sector when `face` is `None`.
    pub fn vertex_surface_point(&self, v: VertexId, face: Option<FaceId>) -> Option<SurfacePoint> {
        let points = self.vertex_surface_points(v)?;
        match face {
            None => match points.as_slice() {
                [only] => Some(only.surface),
                _ => None,
            },
            Some(f) => {
                let first = self.vertex_sector(v, Some(f))?.first_face();
                points
                    .iter()
                    .find(|p| p.first_face == Some(first))
                    .map(|p| p.surface)
            }
        }
    }

    /// Limit value of the center of `f`: the level-1 face point pushed to
    /// the limit.
    pub fn face_center_surface_point(&self, f: FaceId) -> Option<SurfacePoint> {
        let fx = self.faces.get(f)?;
        cached(&fx.cache.center_surface_point, fx.modified, || {
            let corners = self.face_vertices(f)?;
            let region = self.extract_neighborhood(&corners)?;
            let (refined, map) = region.refine_partial();
            let center = map.face_children(f)?.center;
            refined.vertex_surface_point(center, None)
        })
    }

    /// Cubic Bézier control points of the limit curve over `e`.
    pub fn edge_limit_curve(&self, e: EdgeId) -> Option<LimitCurve> {
        let ex = self.edges.get(e)?;
        cached(&ex.cache.limit_curve, ex.modified, || {
            if ex.tag == EdgeTag::Crease {
                self.crease_limit_curve(e)
            } else {
                self.smooth_limit_curve(e)
            }
        })
    }

    fn compute_vertex_surface_points(&self, v: VertexId) -> Option<Vec<SectorSurfacePoint>> {
        let vx = self.vertices.get(v)?;
        if vx.tag == VertexTag::Unset {
            return None;
        }
        if vx.faces.is_empty() {
            return Some(vec![SectorSurfacePoint {
                first_face: None,
                surface: SurfacePoint::isolated(vx.point),
            }]);
        }
        self.vertex_sectors(v)?
            .iter()
            .map(|sector| {
                Some(SectorSurfacePoint {
                    first_face: Some(sector.first_face()),
                    surface: self.sector_surface_point(sector)?,
                })
            })
            .collect()
    }

    /// Closed form when the sector is standard, bounded refinement otherwise
    fn sector_surface_point(&self, sector: &Sector) -> Option<SurfacePoint> {
        if let Some(ring) = PointRing::gather(self, sector, self.config.eigen_tolerance) {
            if let Some(surface) = self.closed_form_surface_point(sector, &ring) {
                return Some(surface);
            }
        }
        trace!(
            "Sector of {:?} at face {:?} is not standard",
            sector.center(),
            sector.first_face()
        );
        self.refined_surface_point(sector)
    }

    fn closed_form_surface_point(&self, sector: &Sector, ring: &PointRing) -> Option<SurfacePoint> {
        let eigen = eigenstructure(ring.sector_type(), self.config.eigen_tolerance).ok()?;

        // Corners are interpolated; use the control point bit for bit
        let point = if ring.sector_type().tag() == VertexTag::Corner {
            ring.center()
        } else {
            eigen.limit_point(ring)
        };

        let [t0, mut t1] = eigen.tangents(ring);
        if is_parallel(t0, t1) {
            if let Some(alternate) = eigen.alternate_tangent(ring) {
                t1 = alternate;
            }
        }
        let (tangents, normal) = self.oriented_frame(sector, t0, t1);
        Some(SurfacePoint {
            point,
            tangents,
            normal,
            exact: true,
        })
    }

    /// Refine the sector's closed star until its ring is standard.
    fn refined_surface_point(&self, sector: &Sector) -> Option<SurfacePoint> {
        let mut center = sector.center();
        let mut face = sector.first_face();
        let mut graph = self.extract_neighborhood(&[center])?;

        for level in 0..self.config.fallback_levels {
            let corner = graph.face_corner(face, center)?;
            let (child, map) = graph.refine_partial();
            center = map.vertex_child(center)?;
            face = map.corner_quad(face, corner)?;
            graph = child;

            let child_sector = graph.sector_from_face(center, face)?;
            if let Some(ring) =
                PointRing::gather(&graph, &child_sector, self.config.eigen_tolerance)
            {
                if let Some(mut surface) = graph.closed_form_surface_point(&child_sector, &ring) {
                    debug!(
                        "Sector of {:?} became standard after {} levels",
                        sector.center(),
                        level + 1
                    );
                    if graph.vertex(center).is_some_and(|vx| vx.tag == VertexTag::Corner) {
                        surface.point = self.vertex_point(sector.center())?;
                    }
                    return Some(surface);
                }
            }
        }

        // Approximation: the last subdivision point with a face-normal frame
        let child_sector = graph.sector_from_face(center, face)?;
        let point = match graph.vertex(center)?.tag {
            VertexTag::Corner => self.vertex_point(sector.center())?,
            _ => graph.vertex_point(center)?,
        };
        let c = graph.vertex_point(center)?;
        let t0 = graph.vertex_point(graph.ptr_end(child_sector.edge(0))?)? - c;
        let t1 = graph.vertex_point(graph.ptr_end(child_sector.edge(1))?)? - c;
        let (tangents, normal) = graph.oriented_frame(&child_sector, t0, t1);
        trace!(
            "Approximate surface point for {:?} after {} levels",
            sector.center(),
            self.config.fallback_levels
        );
        Some(SurfacePoint {
            point,
            tangents,
            normal,
            exact: false,
        })
    }

    /// Unit normal from two tangents, oriented to agree with the sector's
    /// faces. The tangents are swapped when the normal is flipped so that
    /// `t0 × t1` always points along the normal.
    fn oriented_frame(&self, sector: &Sector, t0: DVec3, t1: DVec3) -> ([DVec3; 2], DVec3) {
        let reference = self.sector_face_normal(sector);
        let cross = t0.cross(t1);
        if is_parallel(t0, t1) {
            return ([t0, t1], reference.normalize_or_zero());
        }
        let normal = cross.normalize();
        if self.config.orient_normals_to_faces && normal.dot(reference) < 0.0 {
            ([t1, t0], -normal)
        } else {
            ([t0, t1], normal)
        }
    }

    /// Sum of the Newell normals of the sector's faces
    fn sector_face_normal(&self, sector: &Sector) -> DVec3 {
        sector
            .faces()
            .iter()
            .filter_map(|&f| self.face_points(f))
            .map(|points| crate::graph::newell_normal(&points))
            .sum()
    }

    fn crease_limit_curve(&self, e: EdgeId) -> Option<LimitCurve> {
        let ex = self.edges.get(e)?;
        let [a, b] = ex.vertices;
        let pa = self.vertex_point(a)?;
        let pb = self.vertex_point(b)?;

        // Neighbor along the crease beyond each end, or a phantom point that
        // makes the B-spline interpolate the end
        let beyond = |v: VertexId, p: DVec3, other: DVec3| -> Option<DVec3> {
            let tag = self.vertices.get(v)?.tag;
            if tag == VertexTag::Crease {
                let creases = self.vertex_crease_edges(v);
                if let [c0, c1] = creases.as_slice() {
                    let next = if c0.edge == e { c1 } else { c0 };
                    return self.vertex_point(self.ptr_end(*next)?);
                }
            }
            Some(2.0 * p - other)
        };
        let before = beyond(a, pa, pb)?;
        let after = beyond(b, pb, pa)?;

        let mut control_points = [
            (before + 4.0 * pa + pb) / 6.0,
            (2.0 * pa + pb) / 3.0,
            (pa + 2.0 * pb) / 3.0,
            (pa + 4.0 * pb + after) / 6.0,
        ];

        // A crease ending at a dart ends at the dart's surface limit
        let mut exact = true;
        let ends = [(a, 0usize), (b, 3usize)];
        for (v, slot) in ends {
            if self.vertices.get(v)?.tag == VertexTag::Dart {
                control_points[slot] = self.vertex_surface_point(v, None)?.point;
                exact = false;
            }
        }
        Some(LimitCurve {
            control_points,
            exact,
        })
    }

    fn smooth_limit_curve(&self, e: EdgeId) -> Option<LimitCurve> {
        let ex = self.edges.get(e)?;
        let face = ex.faces.first().copied();
        let [a, b] = ex.vertices;
        let sa = self.vertex_surface_point(a, face)?;
        let sb = self.vertex_surface_point(b, face)?;

        let region = self.extract_neighborhood(&[a, b])?;
        let (refined, map) = region.refine_partial();
        let mid = map.edge_children(e)?.midpoint;
        let sm = refined.vertex_surface_points(mid)?.first()?.surface;

        let (p0, p3, pm) = (sa.point, sb.point, sm.point);
        let chord = p3 - p0;
        let da = project_to_plane(chord, sa.normal).normalize_or_zero();
        let db = project_to_plane(chord, sb.normal).normalize_or_zero();

        // B(1/2) = pm with P1 = p0 + α·da and P2 = p3 - α·db
        let rhs = (8.0 * pm - 4.0 * p0 - 4.0 * p3) / 3.0;
        let spread = da - db;
        let alpha = if spread.length_squared() > 1.0e-12 {
            rhs.dot(spread) / spread.length_squared()
        } else {
            chord.length() / 3.0
        };
        Some(LimitCurve {
            control_points: [p0, p0 + alpha * da, p3 - alpha * db, p3],
            exact: false,
        })
    }
}

fn is_parallel(a: DVec3, b: DVec3) -> bool {
    let scale = a.length() * b.length();
    scale == 0.0 || a.cross(b).length() <= 1.0e-12 * scale
}

fn project_to_plane(v: DVec3, normal: DVec3) -> DVec3 {
    if normal == DVec3::ZERO {
        v
    } else {
        v - v.dot(normal) * normal
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::fixtures::{crease_cube, cube, fan, grid};

    #[test]
    fn test_regular_interior_limit() {
        let mut graph = grid(4);
        let ids = graph.vertex_ids();
        let center = ids[12];
        graph.set_vertex_control_point(center, DVec3::new(2.0, 2.0, 0.9), true);

        let surface = graph.vertex_surface_point(center, None).unwrap();
        assert!(surface.exact);
        // Bicubic B-spline limit: 16/36 of the center plus 4/36 of each
        // neighbor's offset (all zero here)
        assert_abs_diff_eq!(surface.point.z, 0.9 * 16.0 / 36.0, epsilon = 1e-12);
        assert_abs_diff_eq!(surface.point.x, 2.0, epsilon = 1e-12);
        assert!(surface.normal.z > 0.99);
    }

    #[test]
    fn test_corner_limit_equals_control_point() {
        let graph = crease_cube();
        for v in graph.vertex_ids() {
            let points = graph.vertex_surface_points(v).unwrap();
            assert_eq!(points.len(), 3);
            for p in points {
                assert_eq!(Some(p.surface.point), graph.vertex_point(v));
            }
        }
    }

    #[test]
    fn test_cube_normals_point_outward() {
        let graph = cube();
        let center = DVec3::splat(0.5);
        for v in graph.vertex_ids() {
            let surface = graph.vertex_surface_point(v, None).unwrap();
            assert!(surface.exact);
            assert!((surface.point - center).dot(surface.normal) > 0.0);
            // Tangents follow the normal's orientation
            let cross = surface.tangents[0].cross(surface.tangents[1]);
            assert!(cross.dot(surface.normal) > 0.0);
        }
    }

    #[test]
    fn test_nonstandard_center_uses_refinement() {
        // The rim vertices are creases, so the center ring is refined until
        // its neighbors are smooth edge points
        let graph = fan(5);
        let center = graph.vertex_ids()[0];
        let surface = graph.vertex_surface_point(center, None).unwrap();
        assert!(surface.exact);
        assert!(surface.normal.z.abs() > 0.5);
    }

    #[test]
    fn test_isolated_vertex_limit() {
        let mut graph = ControlNetGraph::new();
        let v = graph.add_vertex(VertexTag::Corner, DVec3::ONE).unwrap();
        let points = graph.vertex_surface_points(v).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].first_face, None);
        assert_eq!(points[0].surface.point, DVec3::ONE);
        assert_eq!(points[0].surface.normal, DVec3::ZERO);
    }

    #[test]
    fn test_straight_crease_curve() {
        let graph = grid(3);
        let ids = graph.vertex_ids();
        // Bottom boundary between two crease vertices
        let e = graph.find_edge(ids[1], ids[2]).unwrap();
        let curve = graph.edge_limit_curve(e).unwrap();
        assert!(curve.exact);
        for p in curve.control_points {
            assert_abs_diff_eq!(p.y, 0.0, epsilon = 1e-15);
        }
        let (x0, x1) = if graph.edge(e).unwrap().vertex(0) == ids[1] {
            (1.0, 2.0)
        } else {
            (2.0, 1.0)
        };
        assert_abs_diff_eq!(curve.evaluate(0.0).x, x0, epsilon = 1e-15);
        assert_abs_diff_eq!(curve.evaluate(1.0).x, x1, epsilon = 1e-15);
    }

    #[test]
    fn test_crease_curve_starts_at_vertex_limit() {
        let mut graph = grid(3);
        let ids = graph.vertex_ids();
        graph.set_vertex_control_point(ids[1], DVec3::new(1.0, -0.4, 0.2), true);
        let e = graph.find_edge(ids[1], ids[2]).unwrap();
        let curve = graph.edge_limit_curve(e).unwrap();
        let start_vertex = graph.edge(e).unwrap().vertex(0);
        let limit = graph.vertex_surface_point(start_vertex, None).unwrap();
        assert_abs_diff_eq!((curve.control_points[0] - limit.point).length(), 0.0, epsilon = 1e-10);
    }

    #[test]
    fn test_smooth_curve_interpolates_end_limits() {
        let mut graph = grid(4);
        let ids = graph.vertex_ids();
        graph.set_vertex_control_point(ids[12], DVec3::new(2.0, 2.0, 0.5), true);
        let e = graph.find_edge(ids[12], ids[13]).unwrap();
        let curve = graph.edge_limit_curve(e).unwrap();
        assert!(!curve.exact);
        let [a, b] = graph.edge(e).unwrap().vertices();
        let la = graph.vertex_surface_point(a, None).unwrap().point;
        let lb = graph.vertex_surface_point(b, None).unwrap().point;
        assert_abs_diff_eq!((curve.evaluate(0.0) - la).length(), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!((curve.evaluate(1.0) - lb).length(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_face_center_of_flat_quad() {
        let graph = grid(3);
        let f = graph.face_ids()[4];
        let surface = graph.face_center_surface_point(f).unwrap();
        assert_abs_diff_eq!(surface.point.x, 1.5, epsilon = 1e-12);
        assert_abs_diff_eq!(surface.point.y, 1.5, epsilon = 1e-12);
        assert_abs_diff_eq!(surface.point.z, 0.0, epsilon = 1e-12);
        assert!(surface.normal.z > 0.99);
    }

    #[test]
    fn test_limit_curve_evaluation() {
        let curve = LimitCurve {
            control_points: [DVec3::ZERO, DVec3::X, DVec3::new(2.0, 0.0, 0.0), DVec3::new(3.0, 0.0, 0.0)],
            exact: true,
        };
        assert_eq!(curve.evaluate(0.5), DVec3::new(1.5, 0.0, 0.0));
        assert_eq!(curve.derivative(0.25), DVec3::new(3.0, 0.0, 0.0));
    }
}
