//! Modification methods for ControlNetGraph.

use std::collections::BTreeSet;

use glam::DVec3;
use tracing::{debug, trace};

use super::ControlNetGraph;
use super::edge_key;
use super::types::FaceOverrides;
use crate::constants::UNSET_SECTOR_COEFFICIENT;
use crate::sharpness::EdgeSharpness;
use crate::types::{ComponentId, ComponentStatus, EdgeId, EdgeTag, FaceId, VertexId, VertexTag};
use crate::visit::ComponentMarks;

/// Counts of components removed by [`ControlNetGraph::delete_components`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeletionReport {
    pub vertices: usize,
    pub edges: usize,
    pub faces: usize,
    /// Requested components left in place because something still depends on
    /// them and cascading was off
    pub skipped: usize,
}

impl DeletionReport {
    pub fn total(&self) -> usize {
        self.vertices + self.edges + self.faces
    }
}

impl ControlNetGraph {
    /// Delete components.
    ///
    /// With `cascade`, deleting a vertex deletes its edges and deleting an
    /// edge deletes its faces. Without it, a vertex that still has edges or an
    /// edge that still has faces is skipped. When `surviving` is given, every
    /// edge that survives but lost a face is marked in it.
    pub fn delete_components(
        &mut self,
        ids: &[ComponentId],
        cascade: bool,
        mut surviving: Option<&mut ComponentMarks>,
    ) -> DeletionReport {
        let mut report = DeletionReport::default();

        // ===== PHASE 1: GATHER =====
        let mut doomed_vertices: BTreeSet<VertexId> = BTreeSet::new();
        let mut doomed_edges: BTreeSet<EdgeId> = BTreeSet::new();
        let mut doomed_faces: BTreeSet<FaceId> = BTreeSet::new();

        for &id in ids {
            match id {
                ComponentId::Vertex(v) => {
                    let Some(vx) = self.vertices.get(v) else {
                        continue;
                    };
                    if !cascade && !vx.edges.is_empty() {
                        report.skipped += 1;
                        continue;
                    }
                    doomed_vertices.insert(v);
                    doomed_edges.extend(vx.edges.iter().map(|ptr| ptr.edge));
                }
                ComponentId::Edge(e) => {
                    let Some(ex) = self.edges.get(e) else {
                        continue;
                    };
                    if !cascade && !ex.faces.is_empty() {
                        report.skipped += 1;
                        continue;
                    }
                    doomed_edges.insert(e);
                }
                ComponentId::Face(f) => {
                    if self.faces.contains(f) {
                        doomed_faces.insert(f);
                    }
                }
            }
        }
        for &e in &doomed_edges {
            if let Some(ex) = self.edges.get(e) {
                doomed_faces.extend(ex.faces.iter().copied());
            }
        }

        // Components whose neighborhoods change
        let mut touched_vertices: BTreeSet<VertexId> = BTreeSet::new();
        let mut touched_edges: BTreeSet<EdgeId> = BTreeSet::new();
        for &f in &doomed_faces {
            if let Some(fx) = self.faces.get(f) {
                for ptr in &fx.edges {
                    if !doomed_edges.contains(&ptr.edge) {
                        touched_edges.insert(ptr.edge);
                    }
                }
            }
            for v in self.face_vertices(f).unwrap_or_default() {
                touched_vertices.insert(v);
            }
        }
        for &e in &doomed_edges {
            if let Some(ex) = self.edges.get(e) {
                touched_vertices.extend(ex.vertices);
            }
        }
        for v in &doomed_vertices {
            touched_vertices.remove(v);
        }

        // Clear saved values before the topology they describe disappears
        for &v in &touched_vertices {
            self.clear_saved_subdivision_points(v, false);
        }

        // ===== PHASE 2: MUTATE =====
        for &f in &doomed_faces {
            let Some(face) = self.faces.remove(f) else {
                continue;
            };
            for ptr in &face.edges {
                if let Some(ex) = self.edges.get_mut(ptr.edge) {
                    ex.faces.retain(|g| *g != f);
                }
                if let Some(start) = self.ptr_start(*ptr) {
                    if let Some(vx) = self.vertices.get_mut(start) {
                        vx.faces.retain(|g| *g != f);
                    }
                }
            }
            report.faces += 1;
        }

        for &e in &doomed_edges {
            let Some(edge) = self.edges.remove(e) else {
                continue;
            };
            self.edge_map.remove(&edge_key(edge.vertices[0], edge.vertices[1]));
            for v in edge.vertices {
                if let Some(vx) = self.vertices.get_mut(v) {
                    vx.edges.retain(|ptr| ptr.edge != e);
                }
            }
            report.edges += 1;
        }

        for &v in &doomed_vertices {
            if self.vertices.remove(v).is_some() {
                report.vertices += 1;
            }
        }

        let touched_vertices: Vec<VertexId> = touched_vertices.into_iter().collect();
        let touched_edges: Vec<EdgeId> = touched_edges.into_iter().collect();
        self.reset_derived_tags(&touched_vertices, &touched_edges);

        if let Some(marks) = surviving.as_deref_mut() {
            for &e in &touched_edges {
                marks.mark(e);
            }
        }

        if report.total() > 0 {
            self.geometry_changed();
        }
        debug!(
            "Deleted {} vertices, {} edges, {} faces ({} skipped)",
            report.vertices, report.edges, report.faces, report.skipped
        );
        report
    }

    /// Reset tags that are derived from topology so that
    /// `update_all_tags_and_sector_coefficients(true)` recomputes them.
    ///
    /// Corner vertices and Crease edges may be explicit overrides and keep
    /// their tags.
    pub(crate) fn reset_derived_tags(&mut self, vertices: &[VertexId], edges: &[EdgeId]) {
        for &v in vertices {
            let Some(vx) = self.vertices.get_mut(v) else {
                continue;
            };
            if vx.tag != VertexTag::Corner {
                vx.tag = VertexTag::Unset;
            }
            let incident: Vec<EdgeId> = vx.edges.iter().map(|ptr| ptr.edge).collect();
            for e in incident {
                if let Some(ex) = self.edges.get_mut(e) {
                    ex.sector_coefficients = [UNSET_SECTOR_COEFFICIENT; 2];
                }
            }
        }
        for &e in edges {
            if let Some(ex) = self.edges.get_mut(e) {
                if ex.tag.is_smooth() {
                    ex.tag = EdgeTag::Unset;
                }
            }
        }
    }

    /// Move a vertex.
    ///
    /// Saved values of the vertex and of its incident edges and faces are
    /// cleared. With `clear_neighborhood`, saved values of everything whose
    /// evaluation reads this vertex are cleared too.
    pub fn set_vertex_control_point(
        &mut self,
        v: VertexId,
        point: DVec3,
        clear_neighborhood: bool,
    ) -> bool {
        if !point.is_finite() {
            return false;
        }
        match self.vertices.get_mut(v) {
            Some(vx) => vx.point = point,
            None => return false,
        }
        self.clear_saved_subdivision_points(v, clear_neighborhood);
        self.geometry_changed();
        trace!("Moved vertex {:?} to {:?}", v, point);
        true
    }

    /// Explicitly tag a vertex. Sector coefficients around it are reset and
    /// must be recomputed with `update_all_tags_and_sector_coefficients`.
    pub fn set_vertex_tag(&mut self, v: VertexId, tag: VertexTag) -> bool {
        let incident: Vec<EdgeId> = match self.vertices.get_mut(v) {
            Some(vx) => {
                if vx.tag == tag {
                    return true;
                }
                vx.tag = tag;
                vx.edges.iter().map(|ptr| ptr.edge).collect()
            }
            None => return false,
        };
        for e in incident {
            if let Some(ex) = self.edges.get_mut(e) {
                ex.sector_coefficients = [UNSET_SECTOR_COEFFICIENT; 2];
            }
        }
        self.clear_saved_subdivision_points(v, true);
        self.geometry_changed();
        true
    }

    /// Explicitly tag an edge. The end vertices lose their derived tags.
    pub fn set_edge_tag(&mut self, e: EdgeId, tag: EdgeTag) -> bool {
        let ends = match self.edges.get_mut(e) {
            Some(ex) => {
                if ex.tag == tag {
                    return true;
                }
                ex.tag = tag;
                ex.vertices
            }
            None => return false,
        };
        self.reset_derived_tags(&ends, &[]);
        self.clear_saved_subdivision_points(e, true);
        self.geometry_changed();
        true
    }

    /// Set the end sharpness of an edge.
    pub fn set_edge_sharpness(&mut self, e: EdgeId, sharpness: EdgeSharpness) -> bool {
        match self.edges.get_mut(e) {
            Some(ex) => {
                if ex.sharpness == sharpness {
                    return true;
                }
                ex.sharpness = sharpness;
            }
            None => return false,
        }
        self.clear_saved_subdivision_points(e, true);
        self.geometry_changed();
        true
    }

    /// Replace the status bits of a component. Only the status version changes.
    pub fn set_status(&mut self, id: impl Into<ComponentId>, status: ComponentStatus) -> bool {
        let slot = match id.into() {
            ComponentId::Vertex(v) => self.vertices.get_mut(v).map(|x| &mut x.status),
            ComponentId::Edge(e) => self.edges.get_mut(e).map(|x| &mut x.status),
            ComponentId::Face(f) => self.faces.get_mut(f).map(|x| &mut x.status),
        };
        match slot {
            Some(current) => {
                if *current != status {
                    *current = status;
                    self.status_changed();
                }
                true
            }
            None => false,
        }
    }

    /// Set or clear status bits on a component.
    pub fn update_status(
        &mut self,
        id: impl Into<ComponentId>,
        bits: ComponentStatus,
        enable: bool,
    ) -> bool {
        let id = id.into();
        let current = match id {
            ComponentId::Vertex(v) => self.vertices.get(v).map(|x| x.status),
            ComponentId::Edge(e) => self.edges.get(e).map(|x| x.status),
            ComponentId::Face(f) => self.faces.get(f).map(|x| x.status),
        };
        match current {
            Some(mut status) => {
                status.set(bits, enable);
                self.set_status(id, status)
            }
            None => false,
        }
    }

    /// Clear `bits` on every component.
    pub fn clear_status_everywhere(&mut self, bits: ComponentStatus) {
        let mut changed = false;
        for v in self.vertices.iter_mut() {
            changed |= v.status.intersects(bits);
            v.status.remove(bits);
        }
        for e in self.edges.iter_mut() {
            changed |= e.status.intersects(bits);
            e.status.remove(bits);
        }
        for f in self.faces.iter_mut() {
            changed |= f.status.intersects(bits);
            f.status.remove(bits);
        }
        if changed {
            self.status_changed();
        }
    }

    /// Replace a face's appearance overrides. Only the render version changes.
    pub fn set_face_overrides(&mut self, f: FaceId, overrides: FaceOverrides) -> bool {
        match self.faces.get_mut(f) {
            Some(fx) => {
                if fx.overrides != overrides {
                    fx.overrides = overrides;
                    self.render_changed();
                }
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::EvaluationState;

    fn strip() -> ControlNetGraph {
        // Three quads in a row
        let mut points = Vec::new();
        for x in 0..4 {
            points.push(DVec3::new(x as f64, 0.0, 0.0));
            points.push(DVec3::new(x as f64, 1.0, 0.0));
        }
        ControlNetGraph::from_polygons(
            &points,
            &[vec![0, 2, 3, 1], vec![2, 4, 5, 3], vec![4, 6, 7, 5]],
        )
        .unwrap()
    }

    #[test]
    fn test_delete_vertex_cascades() {
        let mut graph = strip();
        let corner = graph.vertex_ids()[0];
        let mut surviving = ComponentMarks::new();
        let report = graph.delete_components(&[corner.into()], true, Some(&mut surviving));

        assert_eq!(report.vertices, 1);
        assert_eq!(report.edges, 2);
        assert_eq!(report.faces, 1);
        assert_eq!(graph.face_count(), 2);
        assert!(graph.is_valid().is_ok());
        // The two remaining edges of the deleted quad
        assert_eq!(surviving.marked_edges().len(), 2);
    }

    #[test]
    fn test_delete_without_cascade_skips_used() {
        let mut graph = strip();
        let v = graph.vertex_ids()[0];
        let report = graph.delete_components(&[v.into()], false, None);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.total(), 0);
        assert_eq!(graph.vertex_count(), 8);
    }

    #[test]
    fn test_delete_face_keeps_edges() {
        let mut graph = strip();
        let f = graph.face_ids()[1];
        let version = graph.versions().geometry;
        let report = graph.delete_components(&[f.into()], true, None);
        assert_eq!(report.faces, 1);
        assert_eq!(graph.edge_count(), 10);
        assert!(graph.versions().geometry > version);
        assert!(graph.is_valid().is_ok());
    }

    #[test]
    fn test_deleted_ids_not_reused() {
        let mut graph = strip();
        let f = graph.face_ids()[2];
        graph.delete_components(&[f.into()], true, None);
        let verts = graph.vertex_ids();
        let new_face = graph
            .add_face_from_vertices(&[verts[4], verts[6], verts[7], verts[5]])
            .unwrap();
        assert_ne!(new_face, f);
    }

    #[test]
    fn test_status_only_bumps_status_version() {
        let mut graph = strip();
        let before = graph.versions();
        let v = graph.vertex_ids()[0];
        assert!(graph.update_status(v, ComponentStatus::SELECTED, true));
        let after = graph.versions();
        assert_eq!(after.geometry, before.geometry);
        assert_eq!(after.render, before.render);
        assert_eq!(after.status, before.status + 1);
        assert!(graph.vertex(v).unwrap().status().contains(ComponentStatus::SELECTED));
    }

    #[test]
    fn test_overrides_only_bump_render_version() {
        let mut graph = strip();
        let before = graph.versions();
        let f = graph.face_ids()[0];
        let overrides = FaceOverrides {
            color: Some([1.0, 0.0, 0.0, 1.0]),
            ..Default::default()
        };
        assert!(graph.set_face_overrides(f, overrides));
        assert_eq!(graph.versions().geometry, before.geometry);
        assert_eq!(graph.versions().render, before.render + 1);
    }

    #[test]
    fn test_move_vertex_clears_own_cache() {
        let mut graph = strip();
        let v = graph.vertex_ids()[2];
        graph.vertex_subdivision_point(v);
        assert_ne!(graph.evaluation_state(v), Some(EvaluationState::Uncomputed));
        assert!(graph.set_vertex_control_point(v, DVec3::new(1.0, 0.0, 0.5), false));
        assert_eq!(graph.evaluation_state(v), Some(EvaluationState::Uncomputed));
        assert_eq!(graph.vertex_point(v), Some(DVec3::new(1.0, 0.0, 0.5)));
    }

    #[test]
    fn test_topology_edit_unsets_derived_tags() {
        let mut graph = strip();
        let f = graph.face_ids()[0];
        let corner = graph.face_vertices(f).unwrap()[0];
        graph.delete_components(&[f.into()], true, None);
        assert_eq!(graph.vertex(corner).unwrap().tag(), VertexTag::Unset);
        graph.update_all_tags_and_sector_coefficients(true);
        assert_ne!(graph.vertex(corner).unwrap().tag(), VertexTag::Unset);
    }
}
