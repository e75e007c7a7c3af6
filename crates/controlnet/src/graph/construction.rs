//! Construction methods for ControlNetGraph.

use std::collections::HashSet;

use glam::DVec3;
use smallvec::SmallVec;
use tracing::{debug, trace};

use super::types::{Edge, Face, Vertex};
use super::{ControlNetGraph, edge_key};
use crate::sharpness::EdgeSharpness;
use crate::types::{EdgeId, EdgePtr, EdgeTag, FaceId, SubdError, VertexId, VertexTag};

impl ControlNetGraph {
    /// Build a tagged control net from points and polygon index loops.
    ///
    /// Edges shared by several polygons are created once. Tags and sector
    /// coefficients are computed before returning.
    pub fn from_polygons(points: &[DVec3], polygons: &[Vec<usize>]) -> Result<Self, SubdError> {
        let mut graph = Self::new();

        let mut ids = Vec::with_capacity(points.len());
        for (i, &p) in points.iter().enumerate() {
            let id = graph
                .add_vertex(VertexTag::Unset, p)
                .ok_or_else(|| SubdError::InvalidGraph(format!("Point {} is not finite", i)))?;
            ids.push(id);
        }

        for (i, polygon) in polygons.iter().enumerate() {
            let mut loop_ids = Vec::with_capacity(polygon.len());
            for &index in polygon {
                let id = ids.get(index).copied().ok_or_else(|| {
                    SubdError::InvalidGraph(format!(
                        "Polygon {} references point {} of {}",
                        i,
                        index,
                        points.len()
                    ))
                })?;
                loop_ids.push(id);
            }
            graph.add_face_from_vertices(&loop_ids).ok_or_else(|| {
                SubdError::InvalidGraph(format!("Polygon {} is not a valid face loop", i))
            })?;
        }

        graph.update_all_tags_and_sector_coefficients(false);

        debug!(
            "Built control net: {} vertices, {} edges, {} faces",
            graph.vertex_count(),
            graph.edge_count(),
            graph.face_count()
        );

        Ok(graph)
    }

    /// Add a vertex. Returns `None` if the point is not finite.
    pub fn add_vertex(&mut self, tag: VertexTag, point: DVec3) -> Option<VertexId> {
        if !point.is_finite() {
            return None;
        }
        let id = self.vertices.allocate(|id| Vertex::new(id, tag, point));
        self.geometry_changed();
        trace!("Added vertex {:?} ({:?})", id, tag);
        Some(id)
    }

    /// Add an edge with zero sharpness.
    ///
    /// Fails when either vertex is missing, when `v0 == v1`, or when the two
    /// vertices are already joined by an edge.
    pub fn add_edge(&mut self, tag: EdgeTag, v0: VertexId, v1: VertexId) -> Option<EdgeId> {
        self.add_edge_with_sharpness(tag, v0, v1, EdgeSharpness::ZERO)
    }

    /// Add an edge with the given end sharpness.
    pub fn add_edge_with_sharpness(
        &mut self,
        tag: EdgeTag,
        v0: VertexId,
        v1: VertexId,
        sharpness: EdgeSharpness,
    ) -> Option<EdgeId> {
        if v0 == v1 || !self.vertices.contains(v0) || !self.vertices.contains(v1) {
            return None;
        }
        if self.edge_map.contains_key(&edge_key(v0, v1)) {
            return None;
        }

        let id = self
            .edges
            .allocate(|id| Edge::new(id, tag, [v0, v1], sharpness));
        self.edge_map.insert(edge_key(v0, v1), id);

        if let Some(vx) = self.vertices.get_mut(v0) {
            vx.edges.push(EdgePtr::forward(id));
        }
        if let Some(vx) = self.vertices.get_mut(v1) {
            vx.edges.push(EdgePtr::reverse(id));
        }

        self.reset_derived_tags(&[v0, v1], &[]);
        self.clear_saved_subdivision_points(v0, false);
        self.clear_saved_subdivision_points(v1, false);
        self.geometry_changed();
        trace!("Added edge {:?}: {:?} -> {:?}", id, v0, v1);
        Some(id)
    }

    /// Add a face from a closed loop of directed edges.
    ///
    /// The loop must have at least three edges, edge `i` must end where edge
    /// `i+1` starts, and no edge or vertex may repeat. Nothing is modified when
    /// any condition fails.
    pub fn add_face(&mut self, edge_loop: &[EdgePtr]) -> Option<FaceId> {
        let vertices = self.loop_vertices(edge_loop)?;

        let edges: SmallVec<[EdgePtr; 4]> = edge_loop.iter().copied().collect();
        let id = self.faces.allocate(|id| Face::new(id, edges));

        for ptr in edge_loop {
            if let Some(ex) = self.edges.get_mut(ptr.edge) {
                ex.faces.push(id);
            }
        }
        for &v in &vertices {
            if let Some(vx) = self.vertices.get_mut(v) {
                vx.faces.push(id);
            }
        }

        let edge_ids: Vec<EdgeId> = edge_loop.iter().map(|ptr| ptr.edge).collect();
        self.reset_derived_tags(&vertices, &edge_ids);
        self.clear_saved_subdivision_points(id, false);
        self.geometry_changed();
        trace!("Added face {:?} with {} edges", id, edge_loop.len());
        Some(id)
    }

    /// Add a face from a loop of vertices, reusing existing edges and adding
    /// missing ones with an `Unset` tag.
    pub fn add_face_from_vertices(&mut self, vertices: &[VertexId]) -> Option<FaceId> {
        if vertices.len() < 3 {
            return None;
        }
        let mut seen = HashSet::with_capacity(vertices.len());
        for &v in vertices {
            if !self.vertices.contains(v) || !seen.insert(v) {
                return None;
            }
        }

        let n = vertices.len();
        let mut edge_loop = Vec::with_capacity(n);
        for i in 0..n {
            let a = vertices[i];
            let b = vertices[(i + 1) % n];
            let edge = match self.find_edge(a, b) {
                Some(e) => e,
                None => self.add_edge(EdgeTag::Unset, a, b)?,
            };
            let starts_at_a = self.edges.get(edge).map(|ex| ex.vertices[0] == a)?;
            edge_loop.push(if starts_at_a {
                EdgePtr::forward(edge)
            } else {
                EdgePtr::reverse(edge)
            });
        }

        self.add_face(&edge_loop)
    }

    /// Vertices of a candidate face loop, in order, or `None` when the loop is
    /// not a valid face boundary.
    fn loop_vertices(&self, edge_loop: &[EdgePtr]) -> Option<Vec<VertexId>> {
        if edge_loop.len() < 3 {
            return None;
        }

        let mut seen_edges = HashSet::with_capacity(edge_loop.len());
        let mut vertices = Vec::with_capacity(edge_loop.len());
        for ptr in edge_loop {
            if !seen_edges.insert(ptr.edge) {
                return None;
            }
            let edge = self.edges.get(ptr.edge)?;
            vertices.push(edge.vertices[ptr.start_index()]);
        }

        let n = edge_loop.len();
        for i in 0..n {
            let end = self
                .edges
                .get(edge_loop[i].edge)
                .map(|e| e.vertices[edge_loop[i].end_index()])?;
            if end != vertices[(i + 1) % n] {
                return None;
            }
        }

        let distinct: HashSet<VertexId> = vertices.iter().copied().collect();
        if distinct.len() != vertices.len() {
            return None;
        }

        Some(vertices)
    }

    // ========================================================================
    // Id-preserving inserts (archive reads, refinement)
    // ========================================================================

    pub(crate) fn insert_vertex_with_id(
        &mut self,
        id: VertexId,
        tag: VertexTag,
        point: DVec3,
    ) -> bool {
        if !point.is_finite() {
            return false;
        }
        if !self.vertices.insert_with_id(id, Vertex::new(id, tag, point)) {
            return false;
        }
        self.geometry_changed();
        true
    }

    pub(crate) fn insert_edge_with_id(
        &mut self,
        id: EdgeId,
        tag: EdgeTag,
        vertices: [VertexId; 2],
        sharpness: EdgeSharpness,
        sector_coefficients: [f64; 2],
    ) -> bool {
        let [v0, v1] = vertices;
        if v0 == v1 || !self.vertices.contains(v0) || !self.vertices.contains(v1) {
            return false;
        }
        if self.edge_map.contains_key(&edge_key(v0, v1)) {
            return false;
        }
        let mut edge = Edge::new(id, tag, vertices, sharpness);
        edge.sector_coefficients = sector_coefficients;
        if !self.edges.insert_with_id(id, edge) {
            return false;
        }
        self.edge_map.insert(edge_key(v0, v1), id);
        if let Some(vx) = self.vertices.get_mut(v0) {
            vx.edges.push(EdgePtr::forward(id));
        }
        if let Some(vx) = self.vertices.get_mut(v1) {
            vx.edges.push(EdgePtr::reverse(id));
        }
        self.geometry_changed();
        true
    }

    pub(crate) fn insert_face_with_id(&mut self, id: FaceId, edge_loop: &[EdgePtr]) -> bool {
        if self.faces.contains(id) {
            return false;
        }
        let vertices = match self.loop_vertices(edge_loop) {
            Some(v) => v,
            None => return false,
        };
        let edges: SmallVec<[EdgePtr; 4]> = edge_loop.iter().copied().collect();
        if !self.faces.insert_with_id(id, Face::new(id, edges)) {
            return false;
        }
        for ptr in edge_loop {
            if let Some(ex) = self.edges.get_mut(ptr.edge) {
                ex.faces.push(id);
            }
        }
        for v in vertices {
            if let Some(vx) = self.vertices.get_mut(v) {
                vx.faces.push(id);
            }
        }
        self.geometry_changed();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> (ControlNetGraph, [VertexId; 3]) {
        let mut graph = ControlNetGraph::new();
        let a = graph.add_vertex(VertexTag::Unset, DVec3::ZERO).unwrap();
        let b = graph.add_vertex(VertexTag::Unset, DVec3::X).unwrap();
        let c = graph.add_vertex(VertexTag::Unset, DVec3::Y).unwrap();
        (graph, [a, b, c])
    }

    #[test]
    fn test_add_vertex_rejects_nan() {
        let mut graph = ControlNetGraph::new();
        assert!(graph
            .add_vertex(VertexTag::Smooth, DVec3::new(f64::NAN, 0.0, 0.0))
            .is_none());
        assert_eq!(graph.vertex_count(), 0);
    }

    #[test]
    fn test_add_edge_rejects_duplicates_and_loops() {
        let (mut graph, [a, b, _]) = triangle();
        assert!(graph.add_edge(EdgeTag::Smooth, a, b).is_some());
        assert!(graph.add_edge(EdgeTag::Smooth, b, a).is_none());
        assert!(graph.add_edge(EdgeTag::Smooth, a, a).is_none());
        assert!(graph.add_edge(EdgeTag::Smooth, a, VertexId(999)).is_none());
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_add_face_from_edges() {
        let (mut graph, [a, b, c]) = triangle();
        let ab = graph.add_edge(EdgeTag::Smooth, a, b).unwrap();
        let bc = graph.add_edge(EdgeTag::Smooth, b, c).unwrap();
        let ca = graph.add_edge(EdgeTag::Smooth, c, a).unwrap();

        let face = graph
            .add_face(&[
                EdgePtr::forward(ab),
                EdgePtr::forward(bc),
                EdgePtr::forward(ca),
            ])
            .unwrap();

        assert_eq!(graph.face_vertices(face).unwrap(), vec![a, b, c]);
        assert_eq!(graph.edge(ab).unwrap().faces(), &[face]);
        assert_eq!(graph.vertex(b).unwrap().faces(), &[face]);
    }

    #[test]
    fn test_open_loop_rejected_without_mutation() {
        let (mut graph, [a, b, c]) = triangle();
        let ab = graph.add_edge(EdgeTag::Smooth, a, b).unwrap();
        let bc = graph.add_edge(EdgeTag::Smooth, b, c).unwrap();
        let ca = graph.add_edge(EdgeTag::Smooth, c, a).unwrap();
        let version = graph.versions().geometry;

        // ca traversed backwards does not close the loop
        let result = graph.add_face(&[
            EdgePtr::forward(ab),
            EdgePtr::forward(bc),
            EdgePtr::reverse(ca),
        ]);
        assert!(result.is_none());
        assert_eq!(graph.face_count(), 0);
        assert_eq!(graph.versions().geometry, version);
        assert!(graph.edge(ab).unwrap().faces().is_empty());
    }

    #[test]
    fn test_repeated_edge_rejected() {
        let (mut graph, [a, b, _]) = triangle();
        let ab = graph.add_edge(EdgeTag::Smooth, a, b).unwrap();
        let result = graph.add_face(&[
            EdgePtr::forward(ab),
            EdgePtr::reverse(ab),
            EdgePtr::forward(ab),
        ]);
        assert!(result.is_none());
    }

    #[test]
    fn test_add_face_from_vertices_reuses_edges() {
        let mut graph = ControlNetGraph::new();
        let v: Vec<VertexId> = [
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(1.0, 1.0, 0.0),
            DVec3::new(0.0, 1.0, 0.0),
            DVec3::new(2.0, 0.0, 0.0),
            DVec3::new(2.0, 1.0, 0.0),
        ]
        .iter()
        .map(|&p| graph.add_vertex(VertexTag::Unset, p).unwrap())
        .collect();

        graph.add_face_from_vertices(&[v[0], v[1], v[2], v[3]]).unwrap();
        graph.add_face_from_vertices(&[v[1], v[4], v[5], v[2]]).unwrap();

        assert_eq!(graph.edge_count(), 7);
        let shared = graph.find_edge(v[2], v[1]).unwrap();
        assert_eq!(graph.edge(shared).unwrap().face_count(), 2);
    }

    #[test]
    fn test_add_face_from_vertices_rejects_repeats() {
        let (mut graph, [a, b, _]) = triangle();
        assert!(graph.add_face_from_vertices(&[a, b, a]).is_none());
        assert!(graph.add_face_from_vertices(&[a, b]).is_none());
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_from_polygons_bad_index() {
        let result = ControlNetGraph::from_polygons(&[DVec3::ZERO, DVec3::X, DVec3::Y], &[vec![0, 1, 5]]);
        assert!(matches!(result, Err(SubdError::InvalidGraph(_))));
    }
}
