//! Binary archive of a control net.
//!
//! # Layout
//!
//! Records are plain `#[repr(C)]` structs in the writer's native byte order.
//! An archive written on a machine of the other byte order fails the version
//! check.
//! 1. **Header**: magic `CNET`, version `u32`, vertex, edge and face counts
//! 2. **Vertices**: one [`VertexRecord`] each, in ascending id order
//! 3. **Edges**: one [`EdgeRecord`] each, referring to vertices by id
//! 4. **Faces**: one [`FaceRecord`] followed by its [`FaceEdgeRecord`]s
//!
//! Each pass only references components of earlier passes, so references
//! are resolved as soon as the previous pass completes. A failed read never
//! exposes a partial graph.

use std::io::{Read, Write};

use bytemuck::{Pod, Zeroable};
use glam::{DVec2, DVec3};
use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::constants::{ARCHIVE_MAGIC, ARCHIVE_VERSION};
use crate::graph::{ControlNetGraph, FaceOverrides, PackRect, ValidityError};
use crate::sharpness::EdgeSharpness;
use crate::types::{ComponentStatus, EdgeId, EdgePtr, EdgeTag, FaceId, VertexId, VertexTag};

/// Archive read/write failures
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not a control-net archive (magic {0:?})")]
    BadMagic([u8; 4]),

    #[error("Unsupported archive version {0}")]
    UnsupportedVersion(u32),

    #[error("Invalid {kind} record for id {id}")]
    InvalidRecord { kind: &'static str, id: u32 },

    #[error("{kind} {id} references a missing or duplicate component")]
    UnresolvedReference { kind: &'static str, id: u32 },

    #[error("Archived graph is invalid: {0}")]
    InvalidGraph(#[from] ValidityError),
}

#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
struct Header {
    magic: [u8; 4],
    version: u32,
    vertex_count: u32,
    edge_count: u32,
    face_count: u32,
}

/// Persisted vertex fields
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub struct VertexRecord {
    pub id: u32,
    pub tag: u8,
    pub status: u8,
    pub _padding: [u8; 2],
    pub point: [f64; 3],
}

/// Persisted edge fields
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub struct EdgeRecord {
    pub id: u32,
    pub vertices: [u32; 2],
    pub tag: u8,
    pub status: u8,
    /// Number of faces the edge had when written
    pub face_count: u16,
    pub sector_coefficients: [f64; 2],
    pub sharpness: [f64; 2],
}

/// Persisted face fields; followed by `edge_count` [`FaceEdgeRecord`]s
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub struct FaceRecord {
    pub id: u32,
    pub edge_count: u32,
    pub status: u8,
    /// Bit 0: color, bit 1: material index, bit 2: pack rect
    pub override_bits: u8,
    pub _padding: [u8; 2],
    pub material_index: u32,
    pub color: [f32; 4],
    pub pack_rect: [f64; 4],
}

#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub struct FaceEdgeRecord {
    pub edge: u32,
    pub reversed: u32,
}

const HAS_COLOR: u8 = 0b001;
const HAS_MATERIAL: u8 = 0b010;
const HAS_PACK_RECT: u8 = 0b100;

impl FaceRecord {
    fn overrides(&self) -> FaceOverrides {
        FaceOverrides {
            color: (self.override_bits & HAS_COLOR != 0).then_some(self.color),
            material_index: (self.override_bits & HAS_MATERIAL != 0).then_some(self.material_index),
            pack_rect: (self.override_bits & HAS_PACK_RECT != 0).then(|| PackRect {
                min: DVec2::new(self.pack_rect[0], self.pack_rect[1]),
                size: DVec2::new(self.pack_rect[2], self.pack_rect[3]),
            }),
        }
    }
}

// ============================================================================
// Writer
// ============================================================================

/// Writes control nets to a byte stream. The first failure is kept in
/// [`ArchiveWriter::error`].
pub struct ArchiveWriter<W: Write> {
    inner: W,
    error: Option<ArchiveError>,
}

impl<W: Write> ArchiveWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, error: None }
    }

    pub fn error(&self) -> Option<&ArchiveError> {
        self.error.as_ref()
    }

    pub fn take_error(&mut self) -> Option<ArchiveError> {
        self.error.take()
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    /// Write the whole graph. Returns false on failure.
    pub fn write_graph(&mut self, graph: &ControlNetGraph) -> bool {
        match self.try_write(graph) {
            Ok(()) => true,
            Err(err) => {
                warn!("Control net archive write failed: {}", err);
                self.error = Some(err);
                false
            }
        }
    }

    fn try_write(&mut self, graph: &ControlNetGraph) -> Result<(), ArchiveError> {
        let header = Header {
            magic: ARCHIVE_MAGIC,
            version: ARCHIVE_VERSION,
            vertex_count: graph.vertex_count() as u32,
            edge_count: graph.edge_count() as u32,
            face_count: graph.face_count() as u32,
        };
        self.inner.write_all(bytemuck::bytes_of(&header))?;

        // ===== PHASE 1: Vertices =====
        for v in graph.vertex_ids() {
            let Some(vx) = graph.vertex(v) else { continue };
            let record = VertexRecord {
                id: v.0,
                tag: vx.tag() as u8,
                status: vx.status().bits(),
                _padding: [0; 2],
                point: vx.point().to_array(),
            };
            self.inner.write_all(bytemuck::bytes_of(&record))?;
        }

        // ===== PHASE 2: Edges =====
        for e in graph.edge_ids() {
            let Some(ex) = graph.edge(e) else { continue };
            let [v0, v1] = ex.vertices();
            let record = EdgeRecord {
                id: e.0,
                vertices: [v0.0, v1.0],
                tag: ex.tag() as u8,
                status: ex.status().bits(),
                face_count: ex.face_count().min(u16::MAX as usize) as u16,
                sector_coefficients: ex.sector_coefficients(),
                sharpness: ex.sharpness().ends(),
            };
            self.inner.write_all(bytemuck::bytes_of(&record))?;
        }

        // ===== PHASE 3: Faces =====
        for f in graph.face_ids() {
            let Some(fx) = graph.face(f) else { continue };
            let overrides = fx.overrides();
            let mut record = FaceRecord {
                id: f.0,
                edge_count: fx.edge_count() as u32,
                status: fx.status().bits(),
                ..FaceRecord::zeroed()
            };
            if let Some(color) = overrides.color {
                record.override_bits |= HAS_COLOR;
                record.color = color;
            }
            if let Some(material) = overrides.material_index {
                record.override_bits |= HAS_MATERIAL;
                record.material_index = material;
            }
            if let Some(rect) = overrides.pack_rect {
                record.override_bits |= HAS_PACK_RECT;
                record.pack_rect = [rect.min.x, rect.min.y, rect.size.x, rect.size.y];
            }
            self.inner.write_all(bytemuck::bytes_of(&record))?;
            for ptr in fx.edges() {
                let edge = FaceEdgeRecord {
                    edge: ptr.edge.0,
                    reversed: ptr.reversed as u32,
                };
                self.inner.write_all(bytemuck::bytes_of(&edge))?;
            }
        }

        self.inner.flush()?;
        debug!(
            "Wrote control net archive: {} vertices, {} edges, {} faces",
            header.vertex_count, header.edge_count, header.face_count
        );
        Ok(())
    }
}

// ============================================================================
// Reader
// ============================================================================

/// Reads control nets from a byte stream. The first failure is kept in
/// [`ArchiveReader::error`].
pub struct ArchiveReader<R: Read> {
    inner: R,
    error: Option<ArchiveError>,
}

impl<R: Read> ArchiveReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, error: None }
    }

    pub fn error(&self) -> Option<&ArchiveError> {
        self.error.as_ref()
    }

    pub fn take_error(&mut self) -> Option<ArchiveError> {
        self.error.take()
    }

    /// Read a graph into `graph`. On failure `graph` is left untouched and
    /// false is returned.
    pub fn read_graph(&mut self, graph: &mut ControlNetGraph) -> bool {
        match self.try_read() {
            Ok(read) => {
                *graph = read;
                true
            }
            Err(err) => {
                warn!("Control net archive read failed: {}", err);
                self.error = Some(err);
                false
            }
        }
    }

    fn record<T: Pod>(&mut self) -> Result<T, ArchiveError> {
        let mut bytes = vec![0u8; std::mem::size_of::<T>()];
        self.inner.read_exact(&mut bytes)?;
        Ok(bytemuck::pod_read_unaligned(&bytes))
    }

    fn try_read(&mut self) -> Result<ControlNetGraph, ArchiveError> {
        let header: Header = self.record()?;
        if header.magic != ARCHIVE_MAGIC {
            return Err(ArchiveError::BadMagic(header.magic));
        }
        if header.version != ARCHIVE_VERSION {
            return Err(ArchiveError::UnsupportedVersion(header.version));
        }

        let mut graph = ControlNetGraph::new();

        // ===== PHASE 1: Vertices =====
        for _ in 0..header.vertex_count {
            let record: VertexRecord = self.record()?;
            let invalid = ArchiveError::InvalidRecord {
                kind: "vertex",
                id: record.id,
            };
            let tag = VertexTag::from_u8(record.tag).ok_or(invalid)?;
            let id = VertexId(record.id);
            if !graph.insert_vertex_with_id(id, tag, DVec3::from_array(record.point)) {
                return Err(ArchiveError::UnresolvedReference {
                    kind: "Vertex",
                    id: record.id,
                });
            }
            graph.set_status(id, ComponentStatus::from_bits_truncate(record.status));
        }

        // ===== PHASE 2: Edges =====
        // Header counts are untrusted; storage grows only with records actually read
        let mut face_count_hints = Vec::new();
        for _ in 0..header.edge_count {
            let record: EdgeRecord = self.record()?;
            let invalid = || ArchiveError::InvalidRecord {
                kind: "edge",
                id: record.id,
            };
            let tag = EdgeTag::from_u8(record.tag).ok_or_else(invalid)?;
            let [s0, s1] = record.sharpness;
            let sharpness = EdgeSharpness::new(s0, s1).ok_or_else(invalid)?;
            let id = EdgeId(record.id);
            let vertices = [VertexId(record.vertices[0]), VertexId(record.vertices[1])];
            if !graph.insert_edge_with_id(id, tag, vertices, sharpness, record.sector_coefficients) {
                return Err(ArchiveError::UnresolvedReference {
                    kind: "Edge",
                    id: record.id,
                });
            }
            graph.set_status(id, ComponentStatus::from_bits_truncate(record.status));
            face_count_hints.push((id, record.face_count as usize));
        }

        // ===== PHASE 3: Faces =====
        for _ in 0..header.face_count {
            let record: FaceRecord = self.record()?;
            let mut edge_loop: SmallVec<[EdgePtr; 4]> = SmallVec::new();
            for _ in 0..record.edge_count {
                let edge: FaceEdgeRecord = self.record()?;
                edge_loop.push(EdgePtr {
                    edge: EdgeId(edge.edge),
                    reversed: edge.reversed != 0,
                });
            }
            let id = FaceId(record.id);
            if !graph.insert_face_with_id(id, &edge_loop) {
                return Err(ArchiveError::UnresolvedReference {
                    kind: "Face",
                    id: record.id,
                });
            }
            graph.set_status(id, ComponentStatus::from_bits_truncate(record.status));
            graph.set_face_overrides(id, record.overrides());
        }

        for (e, hint) in face_count_hints {
            let actual = graph.edge(e).map_or(0, |ex| ex.face_count());
            if actual != hint {
                return Err(ArchiveError::InvalidRecord { kind: "edge", id: e.0 });
            }
        }
        graph.is_valid()?;

        debug!(
            "Read control net archive: {} vertices, {} edges, {} faces",
            header.vertex_count, header.edge_count, header.face_count
        );
        Ok(graph)
    }
}

impl ControlNetGraph {
    /// Archive bytes of the graph
    pub fn to_archive_bytes(&self) -> Result<Vec<u8>, ArchiveError> {
        let mut writer = ArchiveWriter::new(Vec::new());
        if writer.write_graph(self) {
            Ok(writer.into_inner())
        } else {
            Err(writer
                .take_error()
                .unwrap_or(ArchiveError::InvalidRecord { kind: "graph", id: 0 }))
        }
    }

    /// Read a graph from archive bytes
    pub fn from_archive_bytes(bytes: &[u8]) -> Result<Self, ArchiveError> {
        let mut reader = ArchiveReader::new(bytes);
        let mut graph = ControlNetGraph::new();
        if reader.read_graph(&mut graph) {
            Ok(graph)
        } else {
            Err(reader
                .take_error()
                .unwrap_or(ArchiveError::InvalidRecord { kind: "graph", id: 0 }))
        }
    }
}
