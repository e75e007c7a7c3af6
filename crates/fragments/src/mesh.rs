//! Indexed mesh export.
//!
//! Fragment grids are flattened into one welded vertex buffer with
//! triangle or quad indices. Vertices are welded by exact bit equality, so
//! sealed seams weld while crease normals and texture seams stay split.

use std::collections::HashMap;

use glam::DVec2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{Fragment, FragmentSet};

/// Color of samples without an override color
pub const DEFAULT_VERTEX_COLOR: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

/// A mesh vertex, ready for upload as a GPU vertex buffer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    pub color: [f32; 4],
}

/// Primitive type of an [`IndexedMesh`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Primitive {
    Triangles,
    Quads,
}

impl Primitive {
    pub fn vertex_count(self) -> usize {
        match self {
            Self::Triangles => 3,
            Self::Quads => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedMesh {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
    pub primitive: Primitive,
}

impl IndexedMesh {
    pub fn primitive_count(&self) -> usize {
        self.indices.len() / self.primitive.vertex_count()
    }

    /// Vertex buffer as raw bytes
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Index buffer as raw bytes
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}

/// Welds fragment samples into a shared vertex buffer
struct MeshBuilder {
    vertices: Vec<MeshVertex>,
    lookup: HashMap<[u32; 12], u32>,
}

impl MeshBuilder {
    fn insert(&mut self, vertex: MeshVertex) -> u32 {
        let key: [u32; 12] = bytemuck::cast(vertex);
        *self.lookup.entry(key).or_insert_with(|| {
            self.vertices.push(vertex);
            (self.vertices.len() - 1) as u32
        })
    }

    fn fragment_indices(&mut self, fragment: &Fragment) -> Vec<u32> {
        let color = fragment.color.unwrap_or(DEFAULT_VERTEX_COLOR);
        (0..fragment.points.len())
            .map(|k| {
                let uv = fragment
                    .texture_coordinates
                    .as_ref()
                    .map_or(DVec2::ZERO, |uv| uv[k]);
                self.insert(MeshVertex {
                    position: fragment.points[k].as_vec3().to_array(),
                    normal: fragment.normals[k].as_vec3().to_array(),
                    uv: uv.as_vec2().to_array(),
                    color,
                })
            })
            .collect()
    }
}

impl FragmentSet {
    /// Welded triangle mesh, two triangles per grid cell
    pub fn to_mesh(&self) -> IndexedMesh {
        self.build_mesh(Primitive::Triangles)
    }

    /// Welded quad mesh, one quad per grid cell
    pub fn to_quad_mesh(&self) -> IndexedMesh {
        self.build_mesh(Primitive::Quads)
    }

    fn build_mesh(&self, primitive: Primitive) -> IndexedMesh {
        let mut builder = MeshBuilder {
            vertices: Vec::with_capacity(self.sample_count()),
            lookup: HashMap::with_capacity(self.sample_count()),
        };
        let mut indices = Vec::new();

        for fragment in &self.fragments {
            let local = builder.fragment_indices(fragment);
            let side = fragment.side;
            for j in 0..side.saturating_sub(1) {
                for i in 0..side - 1 {
                    let p00 = local[j * side + i];
                    let p10 = local[j * side + i + 1];
                    let p11 = local[(j + 1) * side + i + 1];
                    let p01 = local[(j + 1) * side + i];
                    match primitive {
                        Primitive::Triangles => {
                            indices.extend_from_slice(&[p00, p10, p11, p00, p11, p01]);
                        }
                        Primitive::Quads => indices.extend_from_slice(&[p00, p10, p11, p01]),
                    }
                }
            }
        }

        debug!(
            "Exported {} fragments as {} vertices and {} {:?}",
            self.len(),
            builder.vertices.len(),
            indices.len() / primitive.vertex_count(),
            primitive
        );
        IndexedMesh {
            vertices: builder.vertices,
            indices,
            primitive,
        }
    }
}
