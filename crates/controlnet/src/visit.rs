//! Caller-owned visited sets for graph traversals.
//!
//! Algorithms that need to remember which components they have already
//! handled take a `&mut ComponentMarks` instead of writing marks into the
//! graph, so a shared graph can be traversed from several threads at once.

use std::collections::HashSet;

use crate::types::{ComponentId, EdgeId, FaceId, VertexId};

#[derive(Debug, Clone, Default)]
pub struct ComponentMarks {
    vertices: HashSet<VertexId>,
    edges: HashSet<EdgeId>,
    faces: HashSet<FaceId>,
}

impl ComponentMarks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a component. Returns `true` if it was not marked before.
    pub fn mark(&mut self, id: impl Into<ComponentId>) -> bool {
        match id.into() {
            ComponentId::Vertex(v) => self.vertices.insert(v),
            ComponentId::Edge(e) => self.edges.insert(e),
            ComponentId::Face(f) => self.faces.insert(f),
        }
    }

    /// Remove a mark. Returns `true` if the component was marked.
    pub fn unmark(&mut self, id: impl Into<ComponentId>) -> bool {
        match id.into() {
            ComponentId::Vertex(v) => self.vertices.remove(&v),
            ComponentId::Edge(e) => self.edges.remove(&e),
            ComponentId::Face(f) => self.faces.remove(&f),
        }
    }

    pub fn is_marked(&self, id: impl Into<ComponentId>) -> bool {
        match id.into() {
            ComponentId::Vertex(v) => self.vertices.contains(&v),
            ComponentId::Edge(e) => self.edges.contains(&e),
            ComponentId::Face(f) => self.faces.contains(&f),
        }
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
        self.edges.clear();
        self.faces.clear();
    }

    pub fn len(&self) -> usize {
        self.vertices.len() + self.edges.len() + self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Marked vertices in ascending id order
    pub fn marked_vertices(&self) -> Vec<VertexId> {
        let mut ids: Vec<VertexId> = self.vertices.iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Marked edges in ascending id order
    pub fn marked_edges(&self) -> Vec<EdgeId> {
        let mut ids: Vec<EdgeId> = self.edges.iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Marked faces in ascending id order
    pub fn marked_faces(&self) -> Vec<FaceId> {
        let mut ids: Vec<FaceId> = self.faces.iter().copied().collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_is_per_kind() {
        let mut marks = ComponentMarks::new();
        assert!(marks.mark(VertexId(1)));
        assert!(!marks.mark(VertexId(1)));
        assert!(!marks.is_marked(EdgeId(1)));
        assert!(marks.mark(EdgeId(1)));
        assert_eq!(marks.len(), 2);

        assert!(marks.unmark(VertexId(1)));
        assert!(!marks.is_marked(VertexId(1)));
        marks.clear();
        assert!(marks.is_empty());
    }

    #[test]
    fn test_marked_sorted() {
        let mut marks = ComponentMarks::new();
        for id in [5, 2, 9] {
            marks.mark(FaceId(id));
        }
        assert_eq!(marks.marked_faces(), vec![FaceId(2), FaceId(5), FaceId(9)]);
    }
}
