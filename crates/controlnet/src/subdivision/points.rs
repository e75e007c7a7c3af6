//! Subdivision points of graph components, saved on first query.

use glam::DVec3;
use tracing::trace;

use super::{
    crease_edge_point, crease_vertex_point, face_point, sharp_blend, smooth_edge_point,
    smooth_vertex_point,
};
use crate::cache::cached;
use crate::constants::SMOOTHX_END_WEIGHT;
use crate::graph::ControlNetGraph;
use crate::types::{EdgeId, EdgeTag, FaceId, VertexId, VertexTag};

impl ControlNetGraph {
    /// Face point of `f`.
    pub fn face_subdivision_point(&self, f: FaceId) -> Option<DVec3> {
        let fx = self.faces.get(f)?;
        cached(&fx.cache.subdivision_point, fx.modified, || {
            self.face_points(f).map(|points| face_point(&points))
        })
    }

    /// Edge point of `e`.
    ///
    /// Returns `None` when the edge cannot be evaluated: an Unset tag at the
    /// edge or either end, a smooth edge without exactly two faces, or a
    /// tagged end whose sector coefficient has not been computed.
    pub fn edge_subdivision_point(&self, e: EdgeId) -> Option<DVec3> {
        let ex = self.edges.get(e)?;
        cached(&ex.cache.subdivision_point, ex.modified, || {
            self.compute_edge_point(e)
        })
    }

    /// Vertex point of `v`.
    ///
    /// Returns `None` for Unset vertices and for neighborhoods the vertex
    /// rule cannot be applied to.
    pub fn vertex_subdivision_point(&self, v: VertexId) -> Option<DVec3> {
        let vx = self.vertices.get(v)?;
        cached(&vx.cache.subdivision_point, vx.modified, || {
            self.compute_vertex_point(v)
        })
    }

    /// Share of the edge's vertex 0 in the vertex half of its smooth edge
    /// mask.
    pub(crate) fn edge_end_weight(&self, e: EdgeId) -> Option<f64> {
        let ex = self.edges.get(e)?;
        if ex.tag == EdgeTag::SmoothX {
            return Some(SMOOTHX_END_WEIGHT);
        }
        let tags = [
            self.vertices.get(ex.vertices[0])?.tag,
            self.vertices.get(ex.vertices[1])?.tag,
        ];
        let stored = |end: usize| {
            let w = ex.sector_coefficients[end];
            (w.is_finite() && w > 0.0).then_some(w)
        };
        match (tags[0].is_tagged(), tags[1].is_tagged()) {
            (true, false) => stored(0),
            (false, true) => stored(1).map(|w| 1.0 - w),
            _ => Some(SMOOTHX_END_WEIGHT),
        }
    }

    fn compute_edge_point(&self, e: EdgeId) -> Option<DVec3> {
        let ex = self.edges.get(e)?;
        let [v0, v1] = ex.vertices;
        let a = self.vertices.get(v0)?;
        let b = self.vertices.get(v1)?;
        if a.tag == VertexTag::Unset || b.tag == VertexTag::Unset {
            trace!("Edge {:?} has an Unset end", e);
            return None;
        }
        let midpoint = crease_edge_point(a.point, b.point);

        match ex.tag {
            EdgeTag::Unset => None,
            EdgeTag::Crease => Some(midpoint),
            EdgeTag::Smooth | EdgeTag::SmoothX => {
                if ex.faces.len() != 2 {
                    trace!("Smooth edge {:?} has {} faces", e, ex.faces.len());
                    return None;
                }
                let weight = self.edge_end_weight(e)?;
                let f0 = self.face_subdivision_point(ex.faces[0])?;
                let f1 = self.face_subdivision_point(ex.faces[1])?;
                let smooth = smooth_edge_point(a.point, b.point, weight, f0, f1);
                Some(sharp_blend(smooth, midpoint, ex.sharpness.blend_factor()))
            }
        }
    }

    fn compute_vertex_point(&self, v: VertexId) -> Option<DVec3> {
        let vx = self.vertices.get(v)?;
        let p = vx.point;
        match vx.tag {
            VertexTag::Unset => None,
            VertexTag::Corner => Some(p),
            VertexTag::Crease => {
                let creases = self.vertex_crease_edges(v);
                let [c0, c1] = creases.as_slice() else {
                    trace!("Crease vertex {:?} has {} crease edges", v, creases.len());
                    return None;
                };
                let a0 = self.vertex_point(self.ptr_end(*c0)?)?;
                let a1 = self.vertex_point(self.ptr_end(*c1)?)?;
                Some(crease_vertex_point(p, a0, a1))
            }
            VertexTag::Smooth | VertexTag::Dart => self.smooth_vertex_point(v),
        }
    }

    /// Catmull-Clark vertex rule with the semi-sharp blend.
    fn smooth_vertex_point(&self, v: VertexId) -> Option<DVec3> {
        let vx = self.vertices.get(v)?;
        let p = vx.point;
        let n = vx.edges.len();
        if n < 2 || vx.faces.len() != n {
            trace!(
                "Vertex {:?} has {} edges and {} faces",
                v,
                n,
                vx.faces.len()
            );
            return None;
        }

        let mut neighbors = Vec::with_capacity(n);
        let mut sharp_ends: Vec<(DVec3, f64)> = Vec::new();
        for ptr in &vx.edges {
            let e = self.edges.get(ptr.edge)?;
            if e.faces.len() != 2 {
                return None;
            }
            let far = self.vertex_point(e.vertices[ptr.end_index()])?;
            neighbors.push(far);
            if e.tag.is_smooth() && e.sharpness.is_sharp() {
                sharp_ends.push((far, e.sharpness.end(ptr.start_index())));
            }
        }
        let face_points: Vec<DVec3> = vx
            .faces
            .iter()
            .map(|&f| self.face_subdivision_point(f))
            .collect::<Option<_>>()?;

        let smooth = smooth_vertex_point(p, &neighbors, &face_points);
        let target = match sharp_ends.as_slice() {
            [] | [_] => return Some(smooth),
            [(a0, _), (a1, _)] => crease_vertex_point(p, *a0, *a1),
            _ => p,
        };
        let s = sharp_ends.iter().map(|(_, s)| s).sum::<f64>() / sharp_ends.len() as f64;
        Some(sharp_blend(smooth, target, s.clamp(0.0, 1.0)))
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::cache::EvaluationState;
    use crate::fixtures::{crease_cube, grid};
    use crate::sharpness::EdgeSharpness;

    #[test]
    fn test_quad_face_point() {
        let graph = grid(1);
        let f = graph.face_ids()[0];
        assert_eq!(
            graph.face_subdivision_point(f),
            Some(DVec3::new(0.5, 0.5, 0.0))
        );
    }

    #[test]
    fn test_boundary_edge_point_is_midpoint() {
        let graph = grid(2);
        let ids = graph.vertex_ids();
        let e = graph.find_edge(ids[0], ids[1]).unwrap();
        assert_eq!(
            graph.edge_subdivision_point(e),
            Some(DVec3::new(0.5, 0.0, 0.0))
        );
    }

    #[test]
    fn test_interior_vertex_of_flat_grid_is_fixed() {
        let graph = grid(2);
        let center = graph.vertex_ids()[4];
        let p = graph.vertex_subdivision_point(center).unwrap();
        assert_abs_diff_eq!(p.x, 1.0, epsilon = 1e-15);
        assert_abs_diff_eq!(p.y, 1.0, epsilon = 1e-15);
    }

    #[test]
    fn test_interior_edge_with_crease_end() {
        // Edge from a boundary crease vertex into the interior of a 2x2 grid
        let graph = grid(2);
        let ids = graph.vertex_ids();
        let e = graph.find_edge(ids[1], ids[4]).unwrap();
        let p = graph.edge_subdivision_point(e).unwrap();
        // Crease sector with two faces has w = 1/2, so the rule is unweighted
        assert_abs_diff_eq!(p.x, 1.0, epsilon = 1e-15);
        assert_abs_diff_eq!(p.y, 0.5, epsilon = 1e-15);
    }

    #[test]
    fn test_corner_vertices_fixed() {
        let graph = crease_cube();
        for v in graph.vertex_ids() {
            assert_eq!(graph.vertex(v).unwrap().tag(), VertexTag::Corner);
            assert_eq!(graph.vertex_subdivision_point(v), graph.vertex_point(v));
        }
    }

    #[test]
    fn test_maximum_sharpness_matches_crease() {
        let mut graph = grid(2);
        let ids = graph.vertex_ids();
        let e = graph.find_edge(ids[1], ids[4]).unwrap();
        graph.set_vertex_control_point(ids[4], DVec3::new(1.0, 1.0, 0.7), true);
        let smooth = graph.edge_subdivision_point(e).unwrap();

        graph.set_edge_sharpness(e, EdgeSharpness::MAXIMUM);
        let sharp = graph.edge_subdivision_point(e).unwrap();
        let a = graph.vertex_point(ids[1]).unwrap();
        let b = graph.vertex_point(ids[4]).unwrap();
        assert_eq!(sharp, 0.5 * (a + b));
        assert_ne!(sharp, smooth);

        graph.set_edge_sharpness(e, EdgeSharpness::ZERO);
        assert_eq!(graph.edge_subdivision_point(e).unwrap(), smooth);
    }

    #[test]
    fn test_unset_tags_cannot_be_evaluated() {
        let mut graph = ControlNetGraph::new();
        let a = graph.add_vertex(VertexTag::Unset, DVec3::ZERO).unwrap();
        let b = graph.add_vertex(VertexTag::Unset, DVec3::X).unwrap();
        let e = graph.add_edge(EdgeTag::Unset, a, b).unwrap();
        assert_eq!(graph.vertex_subdivision_point(a), None);
        assert_eq!(graph.edge_subdivision_point(e), None);

        graph.update_all_tags_and_sector_coefficients(false);
        assert_eq!(graph.edge_subdivision_point(e), Some(DVec3::new(0.5, 0.0, 0.0)));
    }

    #[test]
    fn test_query_saves_point() {
        let graph = grid(2);
        let center = graph.vertex_ids()[4];
        assert_eq!(
            graph.evaluation_state(center),
            Some(EvaluationState::Uncomputed)
        );
        let p = graph.vertex_subdivision_point(center);
        assert_eq!(
            graph.evaluation_state(center),
            Some(EvaluationState::SubdivisionPointCached)
        );
        assert_eq!(graph.saved_vertex_subdivision_point(center), p);
    }

    #[test]
    fn test_two_sharp_edges_pull_vertex_toward_crease_rule() {
        let mut graph = grid(2);
        let ids = graph.vertex_ids();
        let center = ids[4];
        graph.set_vertex_control_point(center, DVec3::new(1.0, 1.0, 1.0), true);
        let smooth = graph.vertex_subdivision_point(center).unwrap();

        let left = graph.find_edge(center, ids[3]).unwrap();
        let right = graph.find_edge(center, ids[5]).unwrap();
        graph.set_edge_sharpness(left, EdgeSharpness::MAXIMUM);
        graph.set_edge_sharpness(right, EdgeSharpness::MAXIMUM);
        let sharp = graph.vertex_subdivision_point(center).unwrap();

        let p = graph.vertex_point(center).unwrap();
        let expected = crease_vertex_point(
            p,
            graph.vertex_point(ids[3]).unwrap(),
            graph.vertex_point(ids[5]).unwrap(),
        );
        assert_abs_diff_eq!((sharp - expected).length(), 0.0, epsilon = 1e-15);
        assert!((sharp - smooth).length() > 1e-3);
    }
}
