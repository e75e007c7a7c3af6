//! Topology queries for ControlNetGraph.

use std::collections::{HashSet, VecDeque};

use glam::DVec3;
use serde::{Deserialize, Serialize};

use super::{ControlNetGraph, edge_key};
use crate::types::{EdgeId, EdgePtr, EdgeTag, FaceId, VertexId, VertexTag};
use crate::visit::ComponentMarks;

/// Result of [`ControlNetGraph::is_manifold`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ManifoldReport {
    /// Every edge has one or two faces and every vertex has a single fan of faces
    pub is_manifold: bool,
    /// Every interior edge is traversed in opposite directions by its two faces
    pub is_oriented: bool,
    /// Some edge has exactly one face
    pub has_boundary: bool,
}

/// Axis-aligned bounds of the control points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: DVec3,
    pub max: DVec3,
}

impl BoundingBox {
    pub fn center(&self) -> DVec3 {
        0.5 * (self.min + self.max)
    }

    pub fn diagonal(&self) -> DVec3 {
        self.max - self.min
    }
}

impl ControlNetGraph {
    /// Undirected edge lookup
    pub fn find_edge(&self, v0: VertexId, v1: VertexId) -> Option<EdgeId> {
        self.edge_map.get(&edge_key(v0, v1)).copied()
    }

    /// Vertex where a directed edge starts
    pub fn ptr_start(&self, ptr: EdgePtr) -> Option<VertexId> {
        self.edges.get(ptr.edge).map(|e| e.vertices[ptr.start_index()])
    }

    /// Vertex where a directed edge ends
    pub fn ptr_end(&self, ptr: EdgePtr) -> Option<VertexId> {
        self.edges.get(ptr.edge).map(|e| e.vertices[ptr.end_index()])
    }

    /// Corners of a face in boundary order. Corner `i` is where edge `i` starts.
    pub fn face_vertices(&self, face: FaceId) -> Option<Vec<VertexId>> {
        let f = self.faces.get(face)?;
        f.edges.iter().map(|&ptr| self.ptr_start(ptr)).collect()
    }

    /// Control points of a face's corners
    pub fn face_points(&self, face: FaceId) -> Option<Vec<DVec3>> {
        self.face_vertices(face)?
            .into_iter()
            .map(|v| self.vertex_point(v))
            .collect()
    }

    /// Index of the corner of `face` at vertex `v`
    pub fn face_corner(&self, face: FaceId, v: VertexId) -> Option<usize> {
        let f = self.faces.get(face)?;
        f.edges
            .iter()
            .position(|&ptr| self.ptr_start(ptr) == Some(v))
    }

    /// Mean of the face's control points
    pub fn face_centroid(&self, face: FaceId) -> Option<DVec3> {
        let points = self.face_points(face)?;
        Some(points.iter().sum::<DVec3>() / points.len() as f64)
    }

    /// Unit Newell normal of the face, zero for degenerate faces
    pub fn face_normal(&self, face: FaceId) -> Option<DVec3> {
        let points = self.face_points(face)?;
        Some(newell_normal(&points).normalize_or_zero())
    }

    /// The other face of a two-faced edge
    pub fn edge_other_face(&self, edge: EdgeId, face: FaceId) -> Option<FaceId> {
        let e = self.edges.get(edge)?;
        if e.faces.len() != 2 {
            return None;
        }
        if e.faces[0] == face {
            Some(e.faces[1])
        } else if e.faces[1] == face {
            Some(e.faces[0])
        } else {
            None
        }
    }

    /// Vertices joined to `v` by an edge
    pub fn vertex_neighbors(&self, v: VertexId) -> Option<Vec<VertexId>> {
        let vx = self.vertices.get(v)?;
        vx.edges
            .iter()
            .map(|ptr| self.ptr_end(*ptr))
            .collect()
    }

    /// Incident edges of `v` tagged Crease
    pub fn vertex_crease_edges(&self, v: VertexId) -> Vec<EdgePtr> {
        let Some(vx) = self.vertices.get(v) else {
            return Vec::new();
        };
        vx.edges
            .iter()
            .copied()
            .filter(|ptr| {
                self.edges
                    .get(ptr.edge)
                    .is_some_and(|e| e.tag == EdgeTag::Crease)
            })
            .collect()
    }

    /// Number of face fans around `v`, joining faces that share an edge at `v`.
    pub fn vertex_fan_count(&self, v: VertexId) -> usize {
        let Some(vx) = self.vertices.get(v) else {
            return 0;
        };
        let mut seen: HashSet<FaceId> = HashSet::new();
        let mut fans = 0;
        for &start in &vx.faces {
            if !seen.insert(start) {
                continue;
            }
            fans += 1;
            let mut queue = VecDeque::from([start]);
            while let Some(face) = queue.pop_front() {
                let Some(f) = self.faces.get(face) else {
                    continue;
                };
                for ptr in &f.edges {
                    let Some(e) = self.edges.get(ptr.edge) else {
                        continue;
                    };
                    if e.vertex_index(v).is_none() {
                        continue;
                    }
                    for &g in &e.faces {
                        if seen.insert(g) {
                            queue.push_back(g);
                        }
                    }
                }
            }
        }
        fans
    }

    /// Manifold, orientation and boundary summary of the whole net.
    pub fn is_manifold(&self) -> ManifoldReport {
        let mut report = ManifoldReport {
            is_manifold: self.face_count() > 0,
            is_oriented: true,
            has_boundary: false,
        };

        for e in self.edges.iter() {
            match e.faces.len() {
                1 => report.has_boundary = true,
                2 => {
                    let dir0 = self.face_edge_direction(e.faces[0], e.id);
                    let dir1 = self.face_edge_direction(e.faces[1], e.id);
                    if dir0.is_none() || dir0 == dir1 {
                        report.is_oriented = false;
                    }
                }
                _ => {
                    report.is_manifold = false;
                    report.is_oriented = false;
                }
            }
        }

        if report.is_manifold {
            report.is_manifold = self
                .vertices
                .iter()
                .all(|vx| !vx.faces.is_empty() && self.vertex_fan_count(vx.id) == 1);
        }

        report
    }

    /// Orientation sign of a closed oriented manifold.
    ///
    /// Returns `1` when face normals point outward, `-1` when they point
    /// inward, and `0` when the net is not a closed oriented manifold or
    /// encloses no volume.
    pub fn is_solid(&self) -> i32 {
        let report = self.is_manifold();
        if !report.is_manifold || !report.is_oriented || report.has_boundary {
            return 0;
        }
        let volume = self.signed_volume();
        let scale = self
            .bounding_box()
            .map(|b| b.diagonal().length().powi(3))
            .unwrap_or(0.0);
        if volume.abs() <= 1.0e-12 * scale {
            0
        } else if volume > 0.0 {
            1
        } else {
            -1
        }
    }

    /// Signed volume enclosed by the faces, triangulated as fans
    pub fn signed_volume(&self) -> f64 {
        let mut volume = 0.0;
        for f in self.faces.iter() {
            let Some(points) = self.face_points(f.id) else {
                continue;
            };
            for i in 1..points.len() - 1 {
                volume += points[0].dot(points[i].cross(points[i + 1]));
            }
        }
        volume / 6.0
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        let mut iter = self.vertices.iter().map(|v| v.point);
        let first = iter.next()?;
        let (min, max) = iter.fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p)));
        Some(BoundingBox { min, max })
    }

    /// Groups of faces connected through shared edges.
    ///
    /// Faces already marked in `marks` are skipped; every visited face is
    /// marked.
    pub fn connected_face_components(&self, marks: &mut ComponentMarks) -> Vec<Vec<FaceId>> {
        let mut components = Vec::new();
        for start in self.faces.sorted_ids() {
            if !marks.mark(start) {
                continue;
            }
            let mut component = Vec::new();
            let mut queue = VecDeque::from([start]);
            while let Some(face) = queue.pop_front() {
                component.push(face);
                let Some(f) = self.faces.get(face) else {
                    continue;
                };
                for ptr in &f.edges {
                    let Some(e) = self.edges.get(ptr.edge) else {
                        continue;
                    };
                    for &g in &e.faces {
                        if marks.mark(g) {
                            queue.push_back(g);
                        }
                    }
                }
            }
            component.sort_unstable();
            components.push(component);
        }
        components
    }

    /// Maximal chains of Crease edges.
    ///
    /// A chain passes through a vertex only when the vertex has exactly two
    /// crease edges and is not a Corner. Each chain is a list of directed
    /// edges, end of one equal to start of the next. Edges already marked are
    /// skipped and every visited edge is marked.
    pub fn crease_chains(&self, marks: &mut ComponentMarks) -> Vec<Vec<EdgePtr>> {
        let mut chains = Vec::new();
        for start in self.edges.sorted_ids() {
            let is_crease = self
                .edges
                .get(start)
                .is_some_and(|e| e.tag == EdgeTag::Crease);
            if !is_crease || marks.is_marked(start) {
                continue;
            }

            // Walk backwards to the first edge of the chain
            let mut first = EdgePtr::forward(start);
            loop {
                let Some(back) = self.chain_step(first.flipped()) else {
                    break;
                };
                let back = back.flipped();
                if back.edge == start {
                    break;
                }
                first = back;
            }

            let mut chain = vec![first];
            marks.mark(first.edge);
            let mut current = first;
            while let Some(next) = self.chain_step(current) {
                if !marks.mark(next.edge) {
                    break;
                }
                chain.push(next);
                current = next;
            }
            chains.push(chain);
        }
        chains
    }

    /// The crease edge continuing a chain past the end of `ptr`
    fn chain_step(&self, ptr: EdgePtr) -> Option<EdgePtr> {
        let v = self.ptr_end(ptr)?;
        if self.vertices.get(v)?.tag == VertexTag::Corner {
            return None;
        }
        let creases = self.vertex_crease_edges(v);
        if creases.len() != 2 {
            return None;
        }
        creases.into_iter().find(|c| c.edge != ptr.edge)
    }

    /// `Some(false)` if `face` traverses `edge` from vertex 0 to vertex 1
    fn face_edge_direction(&self, face: FaceId, edge: EdgeId) -> Option<bool> {
        let f = self.faces.get(face)?;
        f.edges
            .iter()
            .find(|ptr| ptr.edge == edge)
            .map(|ptr| ptr.reversed)
    }
}

/// Newell's method; the length is twice the polygon area
pub(crate) fn newell_normal(points: &[DVec3]) -> DVec3 {
    let n = points.len();
    let mut normal = DVec3::ZERO;
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        normal.x += (a.y - b.y) * (a.z + b.z);
        normal.y += (a.z - b.z) * (a.x + b.x);
        normal.z += (a.x - b.x) * (a.y + b.y);
    }
    normal
}
