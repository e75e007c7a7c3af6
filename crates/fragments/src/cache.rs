//! Per-face fragment side table.
//!
//! Fragments are stored unsealed, keyed by face id. The whole table is
//! dropped when the graph's geometry or render version moves past the one
//! it was filled at, or when the fragment settings change. A cache belongs
//! to one graph; using it with another graph needs [`FragmentCache::clear`].

use std::collections::HashMap;

use controlnet::{ControlNetGraph, FaceId};
use crease_config::FragmentConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::FragmentError;
use crate::generate::generate_face_fragments;
use crate::seal::seal_fragments;
use crate::types::{Fragment, FragmentSet};

/// Hit and miss counts since the cache was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
}

#[derive(Debug, Clone)]
pub struct FragmentCache {
    config: FragmentConfig,
    /// (geometry, render) versions the entries were generated at
    versions: Option<(u64, u64)>,
    entries: HashMap<FaceId, Vec<Fragment>>,
    stats: CacheStats,
}

impl FragmentCache {
    pub fn new(config: FragmentConfig) -> Self {
        Self {
            config,
            versions: None,
            entries: HashMap::new(),
            stats: CacheStats::default(),
        }
    }

    pub fn config(&self) -> &FragmentConfig {
        &self.config
    }

    /// Change settings; drops every entry if they differ.
    pub fn set_config(&mut self, config: FragmentConfig) {
        if config != self.config {
            self.config = config;
            self.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, face: FaceId) -> bool {
        self.entries.contains_key(&face)
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            self.stats.invalidations += 1;
        }
        self.entries.clear();
        self.versions = None;
    }

    /// Drop one face's fragments. Returns true if it had any.
    pub fn invalidate_face(&mut self, face: FaceId) -> bool {
        self.entries.remove(&face).is_some()
    }

    fn sync(&mut self, graph: &ControlNetGraph) {
        let current = graph.versions();
        let current = (current.geometry, current.render);
        if self.versions != Some(current) {
            if self.versions.is_some() {
                debug!(
                    "Fragment cache invalidated: versions {:?} -> {:?}",
                    self.versions, current
                );
            }
            self.clear();
            self.versions = Some(current);
        }
    }

    /// Unsealed fragments of `face`, generated on a miss.
    pub fn face_fragments(
        &mut self,
        graph: &ControlNetGraph,
        face: FaceId,
    ) -> Result<&[Fragment], FragmentError> {
        self.sync(graph);
        if self.entries.contains_key(&face) {
            self.stats.hits += 1;
        } else {
            self.stats.misses += 1;
            trace!("Fragment cache miss for face {:?}", face);
            let fragments = generate_face_fragments(graph, face, &self.config)?;
            self.entries.insert(face, fragments);
        }
        self.entries
            .get(&face)
            .map(Vec::as_slice)
            .ok_or(FragmentError::MissingFace(face))
    }

    /// Sealed fragments of `faces`, reusing saved faces.
    pub fn fragments(
        &mut self,
        graph: &ControlNetGraph,
        faces: impl IntoIterator<Item = FaceId>,
    ) -> Result<FragmentSet, FragmentError> {
        let mut fragments = Vec::new();
        for face in faces {
            fragments.extend_from_slice(self.face_fragments(graph, face)?);
        }
        let mut set = FragmentSet::new(self.config.density, fragments);
        seal_fragments(graph, &mut set.fragments, self.config.seal_tolerance);
        Ok(set)
    }
}
