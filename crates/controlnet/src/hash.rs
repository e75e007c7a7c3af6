//! SHA1 structural hashes.
//!
//! Two graphs with equal hashes of a given [`HashType`] have the same ids,
//! connectivity and (depending on the type) tags and positions. Hashes are
//! saved on the graph and dropped whenever the geometry version changes.

use std::fmt;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use crate::graph::ControlNetGraph;

/// What a structural hash covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashType {
    /// Component ids and connectivity
    Topology,
    /// Topology plus tags and sharpness
    TopologyAndCreases,
    /// Everything above plus control points and sector coefficients
    Geometry,
}

impl HashType {
    fn index(self) -> usize {
        match self {
            Self::Topology => 0,
            Self::TopologyAndCreases => 1,
            Self::Geometry => 2,
        }
    }

    fn includes_creases(self) -> bool {
        !matches!(self, Self::Topology)
    }

    fn includes_geometry(self) -> bool {
        matches!(self, Self::Geometry)
    }
}

/// A 20-byte SHA1 digest
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubdHash(pub [u8; 20]);

impl fmt::Display for SubdHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for SubdHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubdHash({})", self)
    }
}

/// Saved hashes, one cell per [`HashType`]
#[derive(Debug, Clone, Default)]
pub(crate) struct HashCache {
    cells: [OnceLock<SubdHash>; 3],
}

impl HashCache {
    pub(crate) fn clear(&mut self) {
        for cell in &mut self.cells {
            cell.take();
        }
    }
}

impl ControlNetGraph {
    /// Structural hash of the given type, computed once per geometry version.
    pub fn subd_hash(&self, hash_type: HashType) -> SubdHash {
        *self.hashes.cells[hash_type.index()].get_or_init(|| self.compute_hash(hash_type))
    }

    fn compute_hash(&self, hash_type: HashType) -> SubdHash {
        let mut hasher = Sha1::new();
        let creases = hash_type.includes_creases();
        let geometry = hash_type.includes_geometry();

        hasher.update(b"vertices");
        for v in self.vertex_ids() {
            let Some(vx) = self.vertices.get(v) else { continue };
            hasher.update(v.0.to_le_bytes());
            if creases {
                hasher.update([vx.tag as u8]);
            }
            if geometry {
                for c in vx.point.to_array() {
                    hasher.update(c.to_le_bytes());
                }
            }
        }

        hasher.update(b"edges");
        for e in self.edge_ids() {
            let Some(ex) = self.edges.get(e) else { continue };
            hasher.update(e.0.to_le_bytes());
            hasher.update(ex.vertices[0].0.to_le_bytes());
            hasher.update(ex.vertices[1].0.to_le_bytes());
            if creases {
                hasher.update([ex.tag as u8]);
                for s in ex.sharpness.ends() {
                    hasher.update(s.to_le_bytes());
                }
            }
            if geometry {
                for w in ex.sector_coefficients {
                    hasher.update(w.to_le_bytes());
                }
            }
        }

        hasher.update(b"faces");
        for f in self.face_ids() {
            let Some(fx) = self.faces.get(f) else { continue };
            hasher.update(f.0.to_le_bytes());
            hasher.update((fx.edges.len() as u32).to_le_bytes());
            for ptr in &fx.edges {
                hasher.update(ptr.edge.0.to_le_bytes());
                hasher.update([ptr.reversed as u8]);
            }
        }

        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&hasher.finalize());
        SubdHash(bytes)
    }
}

#[cfg(test)]
mod tests {
    use glam::DVec3;

    use super::*;
    use crate::fixtures::{cube, grid};
    use crate::types::EdgeTag;

    #[test]
    fn test_equal_graphs_hash_equal() {
        for hash_type in [HashType::Topology, HashType::TopologyAndCreases, HashType::Geometry] {
            assert_eq!(cube().subd_hash(hash_type), cube().subd_hash(hash_type));
        }
        assert_ne!(cube().subd_hash(HashType::Topology), grid(2).subd_hash(HashType::Topology));
    }

    #[test]
    fn test_moving_a_point_changes_only_geometry_hash() {
        let mut graph = cube();
        let topology = graph.subd_hash(HashType::Topology);
        let creases = graph.subd_hash(HashType::TopologyAndCreases);
        let geometry = graph.subd_hash(HashType::Geometry);

        let v = graph.vertex_ids()[0];
        graph.set_vertex_control_point(v, DVec3::new(-0.5, 0.0, 0.0), false);
        assert_eq!(graph.subd_hash(HashType::Topology), topology);
        assert_eq!(graph.subd_hash(HashType::TopologyAndCreases), creases);
        assert_ne!(graph.subd_hash(HashType::Geometry), geometry);
    }

    #[test]
    fn test_crease_tag_changes_crease_hash() {
        let mut graph = cube();
        let topology = graph.subd_hash(HashType::Topology);
        let creases = graph.subd_hash(HashType::TopologyAndCreases);
        let e = graph.edge_ids()[0];
        graph.set_edge_tag(e, EdgeTag::Crease);
        assert_eq!(graph.subd_hash(HashType::Topology), topology);
        assert_ne!(graph.subd_hash(HashType::TopologyAndCreases), creases);
    }

    #[test]
    fn test_hash_display_is_hex() {
        let text = cube().subd_hash(HashType::Geometry).to_string();
        assert_eq!(text.len(), 40);
        assert!(text.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
