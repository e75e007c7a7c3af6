//! Saved evaluation results and the invalidation protocol.
//!
//! Every component owns a small set of write-once cells. Queries fill them
//! through `&self`, so a fully cached graph can be read from several threads
//! at once. Clearing a cell requires `&mut` access to the graph, which is how
//! edits invalidate saved values.
//!
//! An edit to a vertex touches three rings of components:
//! - the vertex itself (`SELF_MODIFIED`, cells cleared)
//! - its incident edges and faces (`NEIGHBOR_MODIFIED`, cells cleared)
//! - every vertex of those faces plus their edges and faces. These keep their
//!   cells unless a neighborhood clear was requested, but are flagged
//!   `SURROUNDING_MODIFIED` and are recomputed on every query until
//!   [`ControlNetGraph::flush_modified_caches`] runs.

use std::collections::HashSet;
use std::sync::OnceLock;

use glam::DVec3;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::graph::ControlNetGraph;
use crate::limit::{LimitCurve, SectorSurfacePoint, SurfacePoint};
use crate::types::{ComponentId, EdgeId, FaceId, ModifiedFlags, VertexId};

// ============================================================================
// Per-component cells
// ============================================================================

#[derive(Debug, Clone, Default)]
pub(crate) struct VertexCache {
    pub(crate) subdivision_point: OnceLock<Option<DVec3>>,
    /// One entry per sector, in the order the sectors are found
    pub(crate) surface_points: OnceLock<Option<Vec<SectorSurfacePoint>>>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct EdgeCache {
    pub(crate) subdivision_point: OnceLock<Option<DVec3>>,
    pub(crate) limit_curve: OnceLock<Option<LimitCurve>>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FaceCache {
    pub(crate) subdivision_point: OnceLock<Option<DVec3>>,
    pub(crate) center_surface_point: OnceLock<Option<SurfacePoint>>,
}

impl VertexCache {
    pub(crate) fn clear(&mut self) {
        self.subdivision_point.take();
        self.surface_points.take();
    }

    fn state(&self) -> EvaluationState {
        EvaluationState::from_cells(
            self.subdivision_point.get().is_some(),
            self.surface_points.get().is_some(),
        )
    }
}

impl EdgeCache {
    pub(crate) fn clear(&mut self) {
        self.subdivision_point.take();
        self.limit_curve.take();
    }

    fn state(&self) -> EvaluationState {
        EvaluationState::from_cells(
            self.subdivision_point.get().is_some(),
            self.limit_curve.get().is_some(),
        )
    }
}

impl FaceCache {
    pub(crate) fn clear(&mut self) {
        self.subdivision_point.take();
        self.center_surface_point.take();
    }

    fn state(&self) -> EvaluationState {
        EvaluationState::from_cells(
            self.subdivision_point.get().is_some(),
            self.center_surface_point.get().is_some(),
        )
    }
}

/// Read a saved value, or compute and save it.
///
/// Components flagged `SURROUNDING_MODIFIED` may hold a value computed before
/// a nearby edit, so the cell is bypassed for them.
pub(crate) fn cached<T: Clone>(
    cell: &OnceLock<T>,
    modified: ModifiedFlags,
    compute: impl FnOnce() -> T,
) -> T {
    if modified.contains(ModifiedFlags::SURROUNDING_MODIFIED) {
        return compute();
    }
    cell.get_or_init(compute).clone()
}

/// Lazy evaluation progress of one component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EvaluationState {
    /// Nothing saved
    Uncomputed,
    /// The next-level point is saved
    SubdivisionPointCached,
    /// The limit-surface value is saved (the subdivision point may or may not be)
    SurfacePointCached,
}

impl EvaluationState {
    fn from_cells(subdivision: bool, surface: bool) -> Self {
        if surface {
            Self::SurfacePointCached
        } else if subdivision {
            Self::SubdivisionPointCached
        } else {
            Self::Uncomputed
        }
    }
}

// ============================================================================
// Content versions
// ============================================================================

/// Monotonic counters consumers compare to decide whether derived data is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ContentVersions {
    /// Topology, tag, sharpness or position changes
    pub geometry: u64,
    /// Geometry changes plus appearance-only changes
    pub render: u64,
    /// Selection, highlight, visibility and lock changes
    pub status: u64,
}

// ============================================================================
// Invalidation
// ============================================================================

impl ControlNetGraph {
    /// Record a geometry change: bumps geometry and render versions and drops
    /// saved hashes.
    pub(crate) fn geometry_changed(&mut self) {
        self.versions.geometry += 1;
        self.versions.render += 1;
        self.hashes.clear();
    }

    pub(crate) fn render_changed(&mut self) {
        self.versions.render += 1;
    }

    pub(crate) fn status_changed(&mut self) {
        self.versions.status += 1;
    }

    /// Lazy evaluation progress of a component, `None` if it does not exist.
    pub fn evaluation_state(&self, id: impl Into<ComponentId>) -> Option<EvaluationState> {
        match id.into() {
            ComponentId::Vertex(v) => self.vertices.get(v).map(|vx| vx.cache.state()),
            ComponentId::Edge(e) => self.edges.get(e).map(|ex| ex.cache.state()),
            ComponentId::Face(f) => self.faces.get(f).map(|fx| fx.cache.state()),
        }
    }

    /// Clear one component's saved values and flag it as self-modified.
    pub fn component_modified_notification(&mut self, id: impl Into<ComponentId>) -> bool {
        let id = id.into();
        let cleared = self.clear_component(id, ModifiedFlags::SELF_MODIFIED);
        if cleared {
            trace!("Cleared saved values of {:?}", id);
        }
        cleared
    }

    /// Clear saved values of a component and of the components attached to it.
    ///
    /// Without `include_neighborhood` this reaches the component and its
    /// directly attached components. With it, the clear extends to every
    /// component whose saved values can depend on the component's position.
    pub fn clear_saved_subdivision_points(
        &mut self,
        id: impl Into<ComponentId>,
        include_neighborhood: bool,
    ) -> bool {
        let id = id.into();
        let rings = match self.invalidation_rings(id) {
            Some(rings) => rings,
            None => return false,
        };

        self.clear_component(id, ModifiedFlags::SELF_MODIFIED);
        for &c in &rings.attached {
            self.clear_component(c, ModifiedFlags::NEIGHBOR_MODIFIED);
        }
        for &c in &rings.surrounding {
            if include_neighborhood {
                self.clear_component(c, ModifiedFlags::NEIGHBOR_MODIFIED);
            } else {
                self.flag_component(c, ModifiedFlags::SURROUNDING_MODIFIED);
            }
        }

        debug!(
            "Cleared saved values around {:?}: {} attached, {} surrounding ({})",
            id,
            rings.attached.len(),
            rings.surrounding.len(),
            if include_neighborhood { "cleared" } else { "flagged" }
        );
        true
    }

    /// Clear every saved value and reset all modified flags.
    pub fn clear_all_saved_values(&mut self) {
        for v in self.vertices.iter_mut() {
            v.cache.clear();
            v.modified = ModifiedFlags::empty();
        }
        for e in self.edges.iter_mut() {
            e.cache.clear();
            e.modified = ModifiedFlags::empty();
        }
        for f in self.faces.iter_mut() {
            f.cache.clear();
            f.modified = ModifiedFlags::empty();
        }
    }

    /// Discard saved values that were only flagged as untrusted and reset all
    /// modified flags.
    pub fn flush_modified_caches(&mut self) -> usize {
        let mut flushed = 0;
        for v in self.vertices.iter_mut() {
            if v.modified.contains(ModifiedFlags::SURROUNDING_MODIFIED) {
                v.cache.clear();
                flushed += 1;
            }
            v.modified = ModifiedFlags::empty();
        }
        for e in self.edges.iter_mut() {
            if e.modified.contains(ModifiedFlags::SURROUNDING_MODIFIED) {
                e.cache.clear();
                flushed += 1;
            }
            e.modified = ModifiedFlags::empty();
        }
        for f in self.faces.iter_mut() {
            if f.modified.contains(ModifiedFlags::SURROUNDING_MODIFIED) {
                f.cache.clear();
                flushed += 1;
            }
            f.modified = ModifiedFlags::empty();
        }
        debug!("Flushed {} flagged caches", flushed);
        flushed
    }

    fn clear_component(&mut self, id: ComponentId, flag: ModifiedFlags) -> bool {
        match id {
            ComponentId::Vertex(v) => match self.vertices.get_mut(v) {
                Some(vx) => {
                    vx.cache.clear();
                    vx.modified.remove(ModifiedFlags::SURROUNDING_MODIFIED);
                    vx.modified.insert(flag);
                    true
                }
                None => false,
            },
            ComponentId::Edge(e) => match self.edges.get_mut(e) {
                Some(ex) => {
                    ex.cache.clear();
                    ex.modified.remove(ModifiedFlags::SURROUNDING_MODIFIED);
                    ex.modified.insert(flag);
                    true
                }
                None => false,
            },
            ComponentId::Face(f) => match self.faces.get_mut(f) {
                Some(fx) => {
                    fx.cache.clear();
                    fx.modified.remove(ModifiedFlags::SURROUNDING_MODIFIED);
                    fx.modified.insert(flag);
                    true
                }
                None => false,
            },
        }
    }

    fn flag_component(&mut self, id: ComponentId, flag: ModifiedFlags) {
        match id {
            ComponentId::Vertex(v) => {
                if let Some(vx) = self.vertices.get_mut(v) {
                    vx.modified.insert(flag);
                }
            }
            ComponentId::Edge(e) => {
                if let Some(ex) = self.edges.get_mut(e) {
                    ex.modified.insert(flag);
                }
            }
            ComponentId::Face(f) => {
                if let Some(fx) = self.faces.get_mut(f) {
                    fx.modified.insert(flag);
                }
            }
        }
    }

    /// Components directly attached to `id`, and the ring beyond them whose
    /// saved values can still depend on `id`.
    fn invalidation_rings(&self, id: ComponentId) -> Option<InvalidationRings> {
        let mut seed_vertices: Vec<VertexId> = Vec::new();
        let mut attached: Vec<ComponentId> = Vec::new();

        match id {
            ComponentId::Vertex(v) => {
                let vx = self.vertices.get(v)?;
                attached.extend(vx.edges.iter().map(|ptr| ComponentId::Edge(ptr.edge)));
                attached.extend(vx.faces.iter().map(|&f| ComponentId::Face(f)));
                seed_vertices.push(v);
            }
            ComponentId::Edge(e) => {
                let ex = self.edges.get(e)?;
                attached.extend(ex.vertices.iter().map(|&v| ComponentId::Vertex(v)));
                attached.extend(ex.faces.iter().map(|&f| ComponentId::Face(f)));
                seed_vertices.extend(ex.vertices);
            }
            ComponentId::Face(f) => {
                let fx = self.faces.get(f)?;
                for ptr in &fx.edges {
                    attached.push(ComponentId::Edge(ptr.edge));
                    if let Some(ex) = self.edges.get(ptr.edge) {
                        attached.push(ComponentId::Vertex(ex.vertices[ptr.start_index()]));
                        seed_vertices.push(ex.vertices[ptr.start_index()]);
                    }
                }
            }
        }

        let mut seen: HashSet<ComponentId> = attached.iter().copied().collect();
        seen.insert(id);

        // Vertices sharing a face with a seed, then everything incident to them
        let mut ring_vertices: Vec<VertexId> = Vec::new();
        let mut vertex_seen: HashSet<VertexId> = HashSet::new();
        for &seed in &seed_vertices {
            let Some(vx) = self.vertices.get(seed) else {
                continue;
            };
            for &f in &vx.faces {
                for w in self.face_vertices(f).unwrap_or_default() {
                    if vertex_seen.insert(w) {
                        ring_vertices.push(w);
                    }
                }
            }
            for ptr in &vx.edges {
                if let Some(w) = self.edges.get(ptr.edge).and_then(|ex| ex.other_vertex(seed)) {
                    if vertex_seen.insert(w) {
                        ring_vertices.push(w);
                    }
                }
            }
        }

        let mut surrounding: Vec<ComponentId> = Vec::new();
        for w in ring_vertices {
            let Some(wx) = self.vertices.get(w) else {
                continue;
            };
            let candidates = std::iter::once(ComponentId::Vertex(w))
                .chain(wx.edges.iter().map(|ptr| ComponentId::Edge(ptr.edge)))
                .chain(wx.faces.iter().map(|&f| ComponentId::Face(f)));
            for c in candidates {
                if seen.insert(c) {
                    surrounding.push(c);
                }
            }
        }

        Some(InvalidationRings {
            attached,
            surrounding,
        })
    }

    /// Saved subdivision point of a vertex, if one has been computed.
    pub fn saved_vertex_subdivision_point(&self, v: VertexId) -> Option<DVec3> {
        self.vertices
            .get(v)
            .and_then(|vx| vx.cache.subdivision_point.get().copied().flatten())
    }

    /// Saved subdivision point of an edge, if one has been computed.
    pub fn saved_edge_subdivision_point(&self, e: EdgeId) -> Option<DVec3> {
        self.edges
            .get(e)
            .and_then(|ex| ex.cache.subdivision_point.get().copied().flatten())
    }

    /// Saved subdivision point of a face, if one has been computed.
    pub fn saved_face_subdivision_point(&self, f: FaceId) -> Option<DVec3> {
        self.faces
            .get(f)
            .and_then(|fx| fx.cache.subdivision_point.get().copied().flatten())
    }
}

struct InvalidationRings {
    attached: Vec<ComponentId>,
    surrounding: Vec<ComponentId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cached_fills_cell_once() {
        let cell: OnceLock<Option<DVec3>> = OnceLock::new();
        let first = cached(&cell, ModifiedFlags::empty(), || Some(DVec3::X));
        let second = cached(&cell, ModifiedFlags::empty(), || Some(DVec3::Y));
        assert_eq!(first, Some(DVec3::X));
        assert_eq!(second, Some(DVec3::X));
    }

    #[test]
    fn test_cached_bypasses_flagged_cell() {
        let cell: OnceLock<Option<DVec3>> = OnceLock::new();
        cached(&cell, ModifiedFlags::empty(), || Some(DVec3::X));
        let fresh = cached(&cell, ModifiedFlags::SURROUNDING_MODIFIED, || Some(DVec3::Z));
        assert_eq!(fresh, Some(DVec3::Z));
        assert_eq!(cell.get(), Some(&Some(DVec3::X)));
    }

    #[test]
    fn test_evaluation_state_order() {
        let mut cache = VertexCache::default();
        assert_eq!(cache.state(), EvaluationState::Uncomputed);
        let _ = cache.subdivision_point.set(Some(DVec3::ZERO));
        assert_eq!(cache.state(), EvaluationState::SubdivisionPointCached);
        let _ = cache.surface_points.set(None);
        assert_eq!(cache.state(), EvaluationState::SurfacePointCached);
        cache.clear();
        assert_eq!(cache.state(), EvaluationState::Uncomputed);
    }
}
