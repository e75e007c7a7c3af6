//! Validation methods for ControlNetGraph.
//!
//! `is_valid` walks the whole graph and reports the first violated
//! invariant:
//! - Adjacency lists agree in both directions
//! - Face boundaries are closed loops without repeated vertices or edges
//! - Vertex tags are consistent with the tags and face counts of their edges

use std::collections::HashSet;

use tracing::warn;

use super::{ControlNetGraph, edge_key};
use crate::types::{EdgeId, EdgeTag, FaceId, VertexId, VertexTag};

/// First invariant violation found by [`ControlNetGraph::is_valid`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidityError {
    #[error("Edge {0:?} references missing vertex {1:?}")]
    MissingEdgeVertex(EdgeId, VertexId),

    #[error("Edge {0:?} has identical endpoints")]
    DegenerateEdge(EdgeId),

    #[error("Edge {0:?} is not listed by its vertex {1:?}")]
    EdgeNotInVertex(EdgeId, VertexId),

    #[error("Edge {0:?} is missing from the edge lookup")]
    EdgeLookupMismatch(EdgeId),

    #[error("Edge {0:?} lists face {1:?} which does not use it")]
    EdgeFaceMismatch(EdgeId, FaceId),

    #[error("Face {0:?} has {1} edges")]
    TooFewEdges(FaceId, usize),

    #[error("Face {0:?} references missing edge {1:?}")]
    MissingFaceEdge(FaceId, EdgeId),

    #[error("Face {0:?} boundary is not closed at edge {1:?}")]
    OpenLoop(FaceId, EdgeId),

    #[error("Face {0:?} repeats a vertex or edge")]
    RepeatedComponent(FaceId),

    #[error("Face {0:?} is not listed by {1}")]
    FaceNotListed(FaceId, String),

    #[error("Vertex {0:?} lists {1} which does not reference it")]
    VertexAdjacencyMismatch(VertexId, String),

    #[error("Vertex {0:?} tagged {1:?} violates its tag rule: {2}")]
    TagViolation(VertexId, VertexTag, String),

    #[error("Edge {0:?} tagged {1:?} has {2} faces")]
    EdgeTagViolation(EdgeId, EdgeTag, usize),
}

impl ControlNetGraph {
    /// Check every structural and tag invariant.
    pub fn is_valid(&self) -> Result<(), ValidityError> {
        let result = self
            .validate_edges()
            .and_then(|_| self.validate_faces())
            .and_then(|_| self.validate_vertices())
            .and_then(|_| self.validate_tags());
        if let Err(ref err) = result {
            warn!("Control net is invalid: {}", err);
        }
        result
    }

    fn validate_edges(&self) -> Result<(), ValidityError> {
        for e in self.edges.iter() {
            let [v0, v1] = e.vertices;
            if v0 == v1 {
                return Err(ValidityError::DegenerateEdge(e.id));
            }
            for (index, v) in [v0, v1].into_iter().enumerate() {
                let vx = self
                    .vertices
                    .get(v)
                    .ok_or(ValidityError::MissingEdgeVertex(e.id, v))?;
                let listed = vx
                    .edges
                    .iter()
                    .any(|ptr| ptr.edge == e.id && ptr.start_index() == index);
                if !listed {
                    return Err(ValidityError::EdgeNotInVertex(e.id, v));
                }
            }
            if self.edge_map.get(&edge_key(v0, v1)) != Some(&e.id) {
                return Err(ValidityError::EdgeLookupMismatch(e.id));
            }
            for &f in &e.faces {
                let uses = self
                    .faces
                    .get(f)
                    .is_some_and(|fx| fx.edges.iter().any(|ptr| ptr.edge == e.id));
                if !uses {
                    return Err(ValidityError::EdgeFaceMismatch(e.id, f));
                }
            }
        }
        Ok(())
    }

    fn validate_faces(&self) -> Result<(), ValidityError> {
        for f in self.faces.iter() {
            let n = f.edges.len();
            if n < 3 {
                return Err(ValidityError::TooFewEdges(f.id, n));
            }

            let mut edges = HashSet::with_capacity(n);
            let mut vertices = HashSet::with_capacity(n);
            for (i, ptr) in f.edges.iter().enumerate() {
                let e = self
                    .edges
                    .get(ptr.edge)
                    .ok_or(ValidityError::MissingFaceEdge(f.id, ptr.edge))?;
                let next = f.edges[(i + 1) % n];
                if self.ptr_end(*ptr) != self.ptr_start(next) {
                    return Err(ValidityError::OpenLoop(f.id, ptr.edge));
                }
                let start = e.vertices[ptr.start_index()];
                if !edges.insert(ptr.edge) || !vertices.insert(start) {
                    return Err(ValidityError::RepeatedComponent(f.id));
                }
                if !e.faces.contains(&f.id) {
                    return Err(ValidityError::FaceNotListed(f.id, format!("edge {:?}", e.id)));
                }
                let vertex_lists = self
                    .vertices
                    .get(start)
                    .is_some_and(|vx| vx.faces.contains(&f.id));
                if !vertex_lists {
                    return Err(ValidityError::FaceNotListed(f.id, format!("vertex {:?}", start)));
                }
            }
        }
        Ok(())
    }

    fn validate_vertices(&self) -> Result<(), ValidityError> {
        for vx in self.vertices.iter() {
            for ptr in &vx.edges {
                let ok = self
                    .edges
                    .get(ptr.edge)
                    .is_some_and(|e| e.vertices[ptr.start_index()] == vx.id);
                if !ok {
                    return Err(ValidityError::VertexAdjacencyMismatch(
                        vx.id,
                        format!("edge {:?}", ptr.edge),
                    ));
                }
            }
            for &f in &vx.faces {
                if self.face_corner(f, vx.id).is_none() {
                    return Err(ValidityError::VertexAdjacencyMismatch(
                        vx.id,
                        format!("face {:?}", f),
                    ));
                }
            }
        }
        Ok(())
    }

    fn validate_tags(&self) -> Result<(), ValidityError> {
        for e in self.edges.iter() {
            if e.tag.is_smooth() && e.faces.len() != 2 {
                return Err(ValidityError::EdgeTagViolation(e.id, e.tag, e.faces.len()));
            }
        }

        for vx in self.vertices.iter() {
            let mut creases = 0usize;
            let mut crease_faces_ok = true;
            let mut dart_crease_has_two_faces = true;
            let mut others_ok = true;
            let mut unset = false;
            for ptr in &vx.edges {
                let Some(e) = self.edges.get(ptr.edge) else {
                    continue;
                };
                match e.tag {
                    EdgeTag::Crease => {
                        creases += 1;
                        crease_faces_ok &= matches!(e.faces.len(), 1 | 2);
                        dart_crease_has_two_faces &= e.faces.len() == 2;
                    }
                    EdgeTag::Smooth | EdgeTag::SmoothX => {
                        others_ok &= e.faces.len() == 2;
                    }
                    EdgeTag::Unset => unset = true,
                }
            }
            if unset {
                continue;
            }

            let violation = match vx.tag {
                VertexTag::Unset | VertexTag::Corner => None,
                VertexTag::Smooth if creases != 0 || !others_ok => {
                    Some("every edge must be smooth with two faces")
                }
                VertexTag::Dart if creases != 1 || !dart_crease_has_two_faces || !others_ok => {
                    Some("exactly one crease edge with two faces, others smooth")
                }
                VertexTag::Crease if creases != 2 || !crease_faces_ok || !others_ok => {
                    Some("exactly two crease edges with one or two faces, others smooth")
                }
                _ => None,
            };
            if let Some(reason) = violation {
                return Err(ValidityError::TagViolation(vx.id, vx.tag, reason.to_string()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    fn two_quads() -> ControlNetGraph {
        let points: Vec<DVec3> = (0..6)
            .map(|i| DVec3::new((i / 2) as f64, (i % 2) as f64, 0.0))
            .collect();
        ControlNetGraph::from_polygons(&points, &[vec![0, 2, 3, 1], vec![2, 4, 5, 3]]).unwrap()
    }

    #[test]
    fn test_valid_after_construction() {
        assert!(two_quads().is_valid().is_ok());
    }

    #[test]
    fn test_smooth_tag_on_boundary_vertex_rejected() {
        let mut graph = two_quads();
        let v = graph.vertex_ids()[0];
        graph.vertices.get_mut(v).unwrap().tag = VertexTag::Smooth;
        assert!(matches!(
            graph.is_valid(),
            Err(ValidityError::TagViolation(_, VertexTag::Smooth, _))
        ));
    }

    #[test]
    fn test_smooth_boundary_edge_rejected() {
        let mut graph = two_quads();
        let e = graph.edge_ids()[0];
        graph.edges.get_mut(e).unwrap().tag = EdgeTag::Smooth;
        assert!(matches!(
            graph.is_valid(),
            Err(ValidityError::EdgeTagViolation(_, EdgeTag::Smooth, 1))
        ));
    }

    #[test]
    fn test_broken_adjacency_detected() {
        let mut graph = two_quads();
        let v = graph.vertex_ids()[0];
        graph.vertices.get_mut(v).unwrap().edges.clear();
        assert!(matches!(
            graph.is_valid(),
            Err(ValidityError::EdgeNotInVertex(_, _))
        ));
    }
}
