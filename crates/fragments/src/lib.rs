//! Tessellation fragments for tagged Catmull-Clark control nets.
//!
//! This crate turns the limit surface of a [`controlnet::ControlNetGraph`]
//! into renderable sample grids:
//! - One `(2^d+1)²` fragment per quad face, one `(2^(d-1)+1)²` fragment per
//!   corner of every other face
//! - Seam sealing so neighboring fragments share bit-identical boundaries
//! - Level of detail by subsampling a single evaluation pass
//! - A per-face fragment cache keyed on the graph's content versions
//! - Welded indexed mesh export with `bytemuck` vertices
//!
//! ## Key Components
//!
//! - **Generate**: [`generate_fragments`] and [`generate_face_fragments`]
//! - **Seal**: [`seal_fragments`]
//! - **LOD**: [`Fragment::lod`] and [`FragmentSet::lod_chain`]
//! - **Cache**: [`FragmentCache`]
//! - **Mesh**: [`FragmentSet::to_mesh`]

pub mod cache;
pub mod error;
pub mod generate;
pub mod lod;
pub mod mesh;
pub mod seal;
pub mod types;

pub use cache::{CacheStats, FragmentCache};
pub use error::FragmentError;
pub use generate::{generate_all_fragments, generate_face_fragments, generate_fragments};
pub use mesh::{IndexedMesh, MeshVertex, Primitive};
pub use seal::{seal_fragments, seams_match};
pub use types::{Fragment, FragmentSet, FragmentSide, Seam, SealReport};
