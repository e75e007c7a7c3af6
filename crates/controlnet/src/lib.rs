//! Tagged Catmull-Clark control nets.
//!
//! This crate provides the control-net kernel of a subdivision-surface
//! modeler:
//! - An id-indexed vertex/edge/face graph with smooth, crease, corner and
//!   dart tags and variable edge sharpness
//! - Sector classification and sector coefficients
//! - One-step subdivision points and whole-graph refinement
//! - Closed-form limit points, tangents and normals from cached
//!   subdivision-matrix eigenstructures
//! - Lazily filled per-component caches with content versions and SHA1
//!   structural hashes
//!
//! # Architecture
//!
//! Every evaluation query takes `&self` and fills write-once cells on the
//! components it touches. Edits take `&mut self` and clear the cells that
//! can depend on the edited component, so a graph behind a
//! [`SharedControlNet`] can be read from several threads while it is not
//! being edited.
//!
//! ## Key Components
//!
//! - **Graph**: [`ControlNetGraph`] construction, topology queries, edits and
//!   validation
//! - **Sector**: [`Sector`] walks and [`SectorType`] coefficients
//! - **Subdivision**: subdivision points and [`ControlNetGraph::refine`]
//! - **Limit**: [`SurfacePoint`]s, [`LimitCurve`]s and eigenstructures
//! - **Archive**: three-pass binary persistence

pub mod archive;
mod arena;
pub mod cache;
pub mod constants;
pub mod graph;
pub mod hash;
pub mod limit;
pub mod sector;
pub mod shared;
pub mod sharpness;
pub mod subdivision;
pub mod types;
pub mod visit;

#[cfg(test)]
mod fixtures;

pub use archive::{ArchiveError, ArchiveReader, ArchiveWriter};
pub use cache::{ContentVersions, EvaluationState};
pub use graph::{
    BoundingBox, ControlNetGraph, DeletionReport, Edge, Face, FaceOverrides, ManifoldReport,
    PackRect, ValidityError, Vertex,
};
pub use hash::{HashType, SubdHash};
pub use limit::{LimitCurve, SectorSurfacePoint, SurfacePoint};
pub use sector::{Sector, SectorType};
pub use shared::SharedControlNet;
pub use sharpness::EdgeSharpness;
pub use subdivision::{EdgeChildren, FaceChildren, RefinementMap};
pub use types::{
    ComponentId, ComponentStatus, EdgeId, EdgePtr, EdgeTag, FaceId, ModifiedFlags, SubdError,
    VertexId, VertexTag,
};
pub use visit::ComponentMarks;
