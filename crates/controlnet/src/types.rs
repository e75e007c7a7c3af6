//! Identifiers, tags and status bits shared by every control-net component.

use serde::{Deserialize, Serialize};

/// Type-safe vertex identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VertexId(pub u32);

/// Type-safe edge identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeId(pub u32);

/// Type-safe face identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FaceId(pub u32);

/// Any control-net component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentId {
    Vertex(VertexId),
    Edge(EdgeId),
    Face(FaceId),
}

impl From<VertexId> for ComponentId {
    fn from(id: VertexId) -> Self {
        Self::Vertex(id)
    }
}

impl From<EdgeId> for ComponentId {
    fn from(id: EdgeId) -> Self {
        Self::Edge(id)
    }
}

impl From<FaceId> for ComponentId {
    fn from(id: FaceId) -> Self {
        Self::Face(id)
    }
}

/// Vertex tag controlling which subdivision rule applies.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[repr(u8)]
pub enum VertexTag {
    /// Not yet classified
    #[default]
    Unset = 0,
    /// Every incident edge is smooth with two faces
    Smooth = 1,
    /// Exactly two incident crease edges
    Crease = 2,
    /// Fixed under subdivision
    Corner = 3,
    /// Exactly one incident crease edge, all others smooth
    Dart = 4,
}

impl VertexTag {
    /// Tags that carry a sector coefficient on incident smooth edges.
    pub fn is_tagged(self) -> bool {
        matches!(self, Self::Crease | Self::Corner | Self::Dart)
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Unset),
            1 => Some(Self::Smooth),
            2 => Some(Self::Crease),
            3 => Some(Self::Corner),
            4 => Some(Self::Dart),
            _ => None,
        }
    }
}

/// Edge tag controlling which subdivision rule applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum EdgeTag {
    /// Not yet classified
    #[default]
    Unset = 0,
    /// Smooth edge with two faces (may be sharp)
    Smooth = 1,
    /// Crease edge; subdivides as a cubic B-spline curve
    Crease = 2,
    /// Level-0 smooth edge whose ends are both tagged
    SmoothX = 3,
}

impl EdgeTag {
    /// Smooth or SmoothX
    pub fn is_smooth(self) -> bool {
        matches!(self, Self::Smooth | Self::SmoothX)
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Unset),
            1 => Some(Self::Smooth),
            2 => Some(Self::Crease),
            3 => Some(Self::SmoothX),
            _ => None,
        }
    }
}

/// An edge reference with a direction.
///
/// `reversed == false` means the edge is traversed from its vertex 0 to its
/// vertex 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgePtr {
    pub edge: EdgeId,
    pub reversed: bool,
}

impl EdgePtr {
    pub fn forward(edge: EdgeId) -> Self {
        Self {
            edge,
            reversed: false,
        }
    }

    pub fn reverse(edge: EdgeId) -> Self {
        Self {
            edge,
            reversed: true,
        }
    }

    /// Same edge, opposite direction
    pub fn flipped(self) -> Self {
        Self {
            edge: self.edge,
            reversed: !self.reversed,
        }
    }

    /// Index (0 or 1) of the edge vertex where this directed edge starts
    pub fn start_index(self) -> usize {
        usize::from(self.reversed)
    }

    /// Index (0 or 1) of the edge vertex where this directed edge ends
    pub fn end_index(self) -> usize {
        1 - self.start_index()
    }
}

bitflags::bitflags! {
    /// User-facing status bits. Changing them bumps only the status version.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ComponentStatus: u8 {
        /// Component is selected.
        const SELECTED = 0b0000_0001;
        /// Component is highlighted.
        const HIGHLIGHTED = 0b0000_0010;
        /// Component is hidden.
        const HIDDEN = 0b0000_0100;
        /// Component may not be edited.
        const LOCKED = 0b0000_1000;
    }
}

bitflags::bitflags! {
    /// Marks that cached values were discarded because of an edit.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ModifiedFlags: u8 {
        /// The component itself changed.
        const SELF_MODIFIED = 0b0000_0001;
        /// An attached component changed.
        const NEIGHBOR_MODIFIED = 0b0000_0010;
        /// A component further away changed; saved values are kept but
        /// recomputed on query.
        const SURROUNDING_MODIFIED = 0b0000_0100;
    }
}

/// Errors produced by refinement and evaluation entry points.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SubdError {
    #[error("Component {0:?} does not exist")]
    MissingComponent(ComponentId),
    #[error("Could not evaluate {0:?}: degenerate neighborhood")]
    Degenerate(ComponentId),
    #[error("Sector around vertex {0:?} is not a standard sector")]
    NonStandardSector(VertexId),
    #[error("Eigenstructure computation failed: {0}")]
    Eigen(String),
    #[error("Invalid control net: {0}")]
    InvalidGraph(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_ptr_indices() {
        let forward = EdgePtr::forward(EdgeId(3));
        assert_eq!(forward.start_index(), 0);
        assert_eq!(forward.end_index(), 1);

        let reversed = forward.flipped();
        assert!(reversed.reversed);
        assert_eq!(reversed.start_index(), 1);
        assert_eq!(reversed.end_index(), 0);
    }

    #[test]
    fn test_tag_round_trip_u8() {
        for tag in [
            VertexTag::Unset,
            VertexTag::Smooth,
            VertexTag::Crease,
            VertexTag::Corner,
            VertexTag::Dart,
        ] {
            assert_eq!(VertexTag::from_u8(tag as u8), Some(tag));
        }
        assert_eq!(VertexTag::from_u8(9), None);
        assert_eq!(EdgeTag::from_u8(EdgeTag::SmoothX as u8), Some(EdgeTag::SmoothX));
    }

    #[test]
    fn test_tagged_vertices() {
        assert!(!VertexTag::Smooth.is_tagged());
        assert!(!VertexTag::Unset.is_tagged());
        assert!(VertexTag::Dart.is_tagged());
        assert!(VertexTag::Corner.is_tagged());
    }
}
