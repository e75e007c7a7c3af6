//! Control-net graph: vertices, edges and faces with tags and sharpness.
//!
//! Components live in id-indexed arenas and refer to each other by id. Edges
//! know their endpoints and faces, faces know their ordered boundary loop of
//! directed edges, and vertices know their incident edges and faces.

mod construction;
mod modification;
mod topology;
mod types;
mod validation;

use std::collections::HashMap;

use crease_config::EvaluationConfig;

pub use modification::DeletionReport;
pub use topology::{BoundingBox, ManifoldReport};
pub(crate) use topology::newell_normal;
pub use types::{Edge, Face, FaceOverrides, PackRect, Vertex};
pub use validation::ValidityError;

use crate::arena::ComponentArena;
use crate::cache::ContentVersions;
use crate::hash::HashCache;
use crate::types::{EdgeId, FaceId, VertexId};

/// A Catmull-Clark control net.
#[derive(Debug, Clone, Default)]
pub struct ControlNetGraph {
    pub(crate) vertices: ComponentArena<VertexId, Vertex>,
    pub(crate) edges: ComponentArena<EdgeId, Edge>,
    pub(crate) faces: ComponentArena<FaceId, Face>,
    /// Map from (min, max) vertex pair to the edge joining them
    pub(crate) edge_map: HashMap<(VertexId, VertexId), EdgeId>,
    pub(crate) versions: ContentVersions,
    pub(crate) hashes: HashCache,
    pub(crate) config: EvaluationConfig,
}

/// Undirected key for `edge_map`
pub(crate) fn edge_key(v0: VertexId, v1: VertexId) -> (VertexId, VertexId) {
    if v0 <= v1 { (v0, v1) } else { (v1, v0) }
}

impl ControlNetGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EvaluationConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &EvaluationConfig {
        &self.config
    }

    /// Replace the evaluation settings. Saved values depend on them, so every
    /// cache is cleared.
    pub fn set_config(&mut self, config: EvaluationConfig) {
        if self.config == config {
            return;
        }
        self.config = config;
        self.clear_all_saved_values();
        self.geometry_changed();
    }

    pub fn versions(&self) -> ContentVersions {
        self.versions
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.len() == 0
    }

    pub fn vertex(&self, id: VertexId) -> Option<&Vertex> {
        self.vertices.get(id)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id)
    }

    pub fn face(&self, id: FaceId) -> Option<&Face> {
        self.faces.get(id)
    }

    /// Control-net point of a vertex
    pub fn vertex_point(&self, id: VertexId) -> Option<glam::DVec3> {
        self.vertices.get(id).map(|v| v.point)
    }

    pub fn vertices(&self) -> impl Iterator<Item = &Vertex> {
        self.vertices.iter()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    pub fn faces(&self) -> impl Iterator<Item = &Face> {
        self.faces.iter()
    }

    /// Vertex ids in ascending order
    pub fn vertex_ids(&self) -> Vec<VertexId> {
        self.vertices.sorted_ids()
    }

    /// Edge ids in ascending order
    pub fn edge_ids(&self) -> Vec<EdgeId> {
        self.edges.sorted_ids()
    }

    /// Face ids in ascending order
    pub fn face_ids(&self) -> Vec<FaceId> {
        self.faces.sorted_ids()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EdgeTag, VertexTag};
    use glam::DVec3;

    pub(crate) fn unit_quad() -> ControlNetGraph {
        ControlNetGraph::from_polygons(
            &[
                DVec3::new(0.0, 0.0, 0.0),
                DVec3::new(1.0, 0.0, 0.0),
                DVec3::new(1.0, 1.0, 0.0),
                DVec3::new(0.0, 1.0, 0.0),
            ],
            &[vec![0, 1, 2, 3]],
        )
        .unwrap()
    }

    #[test]
    fn test_single_quad_counts() {
        let graph = unit_quad();
        assert_eq!(graph.vertex_count(), 4);
        assert_eq!(graph.edge_count(), 4);
        assert_eq!(graph.face_count(), 1);
        assert!(graph.is_valid().is_ok());
    }

    #[test]
    fn test_single_quad_tags() {
        let graph = unit_quad();
        for edge in graph.edges() {
            assert_eq!(edge.tag(), EdgeTag::Crease);
            assert!(edge.is_boundary());
        }
        for vertex in graph.vertices() {
            assert_eq!(vertex.tag(), VertexTag::Crease);
        }
    }

    #[test]
    fn test_edge_key_is_undirected() {
        assert_eq!(
            edge_key(VertexId(3), VertexId(1)),
            edge_key(VertexId(1), VertexId(3))
        );
    }

    #[test]
    fn test_set_config_clears_and_bumps() {
        let mut graph = unit_quad();
        let before = graph.versions().geometry;
        let mut config = EvaluationConfig::default();
        config.fallback_levels += 1;
        graph.set_config(config);
        assert!(graph.versions().geometry > before);
    }
}
