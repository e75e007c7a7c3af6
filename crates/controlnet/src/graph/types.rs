//! Type definitions for the control-net graph.

use glam::{DVec2, DVec3};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::cache::{EdgeCache, FaceCache, VertexCache};
use crate::sharpness::EdgeSharpness;
use crate::types::{
    ComponentStatus, EdgeId, EdgePtr, EdgeTag, FaceId, ModifiedFlags, VertexId, VertexTag,
};

/// A control-net vertex
#[derive(Debug, Clone)]
pub struct Vertex {
    pub(crate) id: VertexId,
    pub(crate) tag: VertexTag,
    pub(crate) point: DVec3,
    /// Incident edges; `reversed == false` when the edge starts here
    pub(crate) edges: Vec<EdgePtr>,
    pub(crate) faces: Vec<FaceId>,
    pub(crate) status: ComponentStatus,
    pub(crate) modified: ModifiedFlags,
    pub(crate) cache: VertexCache,
}

impl Vertex {
    pub(crate) fn new(id: VertexId, tag: VertexTag, point: DVec3) -> Self {
        Self {
            id,
            tag,
            point,
            edges: Vec::new(),
            faces: Vec::new(),
            status: ComponentStatus::empty(),
            modified: ModifiedFlags::empty(),
            cache: VertexCache::default(),
        }
    }

    pub fn id(&self) -> VertexId {
        self.id
    }

    pub fn tag(&self) -> VertexTag {
        self.tag
    }

    /// Control-net point
    pub fn point(&self) -> DVec3 {
        self.point
    }

    pub fn edges(&self) -> &[EdgePtr] {
        &self.edges
    }

    pub fn faces(&self) -> &[FaceId] {
        &self.faces
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn status(&self) -> ComponentStatus {
        self.status
    }

    pub fn modified(&self) -> ModifiedFlags {
        self.modified
    }
}

/// A control-net edge
#[derive(Debug, Clone)]
pub struct Edge {
    pub(crate) id: EdgeId,
    pub(crate) tag: EdgeTag,
    pub(crate) vertices: [VertexId; 2],
    /// Meaningful only at ends whose vertex is tagged
    pub(crate) sector_coefficients: [f64; 2],
    pub(crate) sharpness: EdgeSharpness,
    pub(crate) faces: SmallVec<[FaceId; 2]>,
    pub(crate) status: ComponentStatus,
    pub(crate) modified: ModifiedFlags,
    pub(crate) cache: EdgeCache,
}

impl Edge {
    pub(crate) fn new(
        id: EdgeId,
        tag: EdgeTag,
        vertices: [VertexId; 2],
        sharpness: EdgeSharpness,
    ) -> Self {
        Self {
            id,
            tag,
            vertices,
            sector_coefficients: [crate::constants::UNSET_SECTOR_COEFFICIENT; 2],
            sharpness,
            faces: SmallVec::new(),
            status: ComponentStatus::empty(),
            modified: ModifiedFlags::empty(),
            cache: EdgeCache::default(),
        }
    }

    pub fn id(&self) -> EdgeId {
        self.id
    }

    pub fn tag(&self) -> EdgeTag {
        self.tag
    }

    pub fn vertices(&self) -> [VertexId; 2] {
        self.vertices
    }

    pub fn vertex(&self, index: usize) -> VertexId {
        self.vertices[index & 1]
    }

    /// The endpoint that is not `v`, if `v` is an endpoint
    pub fn other_vertex(&self, v: VertexId) -> Option<VertexId> {
        if self.vertices[0] == v {
            Some(self.vertices[1])
        } else if self.vertices[1] == v {
            Some(self.vertices[0])
        } else {
            None
        }
    }

    /// Index (0 or 1) of `v` among the endpoints
    pub fn vertex_index(&self, v: VertexId) -> Option<usize> {
        self.vertices.iter().position(|&x| x == v)
    }

    pub fn sector_coefficient(&self, index: usize) -> f64 {
        self.sector_coefficients[index & 1]
    }

    pub fn sector_coefficients(&self) -> [f64; 2] {
        self.sector_coefficients
    }

    pub fn sharpness(&self) -> EdgeSharpness {
        self.sharpness
    }

    pub fn faces(&self) -> &[FaceId] {
        &self.faces
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// 0 faces
    pub fn is_wire(&self) -> bool {
        self.faces.is_empty()
    }

    /// Exactly one face
    pub fn is_boundary(&self) -> bool {
        self.faces.len() == 1
    }

    /// Three or more faces
    pub fn is_nonmanifold(&self) -> bool {
        self.faces.len() >= 3
    }

    /// Smooth (or SmoothX) with positive sharpness at either end
    pub fn is_sharp(&self) -> bool {
        self.tag.is_smooth() && self.sharpness.is_sharp()
    }

    pub fn status(&self) -> ComponentStatus {
        self.status
    }

    pub fn modified(&self) -> ModifiedFlags {
        self.modified
    }
}

/// Axis-aligned rectangle in texture space assigned by an external packer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PackRect {
    pub min: DVec2,
    pub size: DVec2,
}

impl PackRect {
    /// Map a unit-square parameter into the rectangle
    pub fn map(&self, uv: DVec2) -> DVec2 {
        self.min + uv * self.size
    }
}

/// Per-face appearance data. Stored and persisted, never evaluated here.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FaceOverrides {
    pub color: Option<[f32; 4]>,
    pub material_index: Option<u32>,
    pub pack_rect: Option<PackRect>,
}

/// A control-net face
#[derive(Debug, Clone)]
pub struct Face {
    pub(crate) id: FaceId,
    /// Closed boundary loop; edge i ends where edge i+1 starts
    pub(crate) edges: SmallVec<[EdgePtr; 4]>,
    pub(crate) status: ComponentStatus,
    pub(crate) modified: ModifiedFlags,
    pub(crate) overrides: FaceOverrides,
    pub(crate) cache: FaceCache,
}

impl Face {
    pub(crate) fn new(id: FaceId, edges: SmallVec<[EdgePtr; 4]>) -> Self {
        Self {
            id,
            edges,
            status: ComponentStatus::empty(),
            modified: ModifiedFlags::empty(),
            overrides: FaceOverrides::default(),
            cache: FaceCache::default(),
        }
    }

    pub fn id(&self) -> FaceId {
        self.id
    }

    pub fn edges(&self) -> &[EdgePtr] {
        &self.edges
    }

    /// Number of corners
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_quad(&self) -> bool {
        self.edges.len() == 4
    }

    /// Position of `edge` in the boundary loop
    pub fn edge_index(&self, edge: EdgeId) -> Option<usize> {
        self.edges.iter().position(|ptr| ptr.edge == edge)
    }

    pub fn overrides(&self) -> &FaceOverrides {
        &self.overrides
    }

    pub fn status(&self) -> ComponentStatus {
        self.status
    }

    pub fn modified(&self) -> ModifiedFlags {
        self.modified
    }
}
