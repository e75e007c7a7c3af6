//! Tag and sector coefficient updates.

use tracing::{debug, warn};

use crate::constants::IGNORED_SECTOR_COEFFICIENT;
use crate::graph::ControlNetGraph;
use crate::types::{EdgeId, EdgeTag, VertexId, VertexTag};

impl ControlNetGraph {
    /// Recompute vertex and edge tags from topology and explicit overrides,
    /// then recompute every sector coefficient.
    ///
    /// With `unset_only`, only components whose tag is `Unset` are
    /// reclassified. Crease edges and Corner vertices are treated as explicit
    /// and always kept. Must run after raw topology edits and before
    /// evaluation. Returns the number of tags that changed.
    pub fn update_all_tags_and_sector_coefficients(&mut self, unset_only: bool) -> usize {
        let mut changed = 0;

        // Edges: anything without exactly two faces is a crease
        for id in self.edge_ids() {
            let Some(e) = self.edges.get_mut(id) else {
                continue;
            };
            if unset_only && e.tag != EdgeTag::Unset {
                continue;
            }
            let tag = if e.faces.len() != 2 || e.tag == EdgeTag::Crease {
                EdgeTag::Crease
            } else {
                EdgeTag::Smooth
            };
            if e.tag != tag {
                e.tag = tag;
                changed += 1;
            }
        }

        // Vertices: classify by incident crease edges
        for id in self.vertex_ids() {
            let (current, derived) = match self.vertices.get(id) {
                Some(vx) => (vx.tag, self.derived_vertex_tag(id)),
                None => continue,
            };
            if unset_only && current != VertexTag::Unset {
                continue;
            }
            let tag = if current == VertexTag::Corner {
                VertexTag::Corner
            } else {
                derived
            };
            if tag != current {
                if let Some(vx) = self.vertices.get_mut(id) {
                    vx.tag = tag;
                }
                changed += 1;
            }
        }

        self.update_smooth_x_tags();
        self.update_sector_coefficients();

        self.clear_all_saved_values();
        self.geometry_changed();

        debug!(
            "Updated tags and sector coefficients: {} tags changed (unset_only = {})",
            changed, unset_only
        );
        changed
    }

    /// Tag implied by the vertex's incident edges
    fn derived_vertex_tag(&self, v: VertexId) -> VertexTag {
        let Some(vx) = self.vertex(v) else {
            return VertexTag::Unset;
        };
        if vx.edges().is_empty() || vx.faces().is_empty() {
            return VertexTag::Corner;
        }
        let creases: Vec<usize> = vx
            .edges()
            .iter()
            .filter_map(|ptr| self.edge(ptr.edge))
            .filter(|e| e.tag() == EdgeTag::Crease)
            .map(|e| e.face_count())
            .collect();
        match creases.as_slice() {
            [] => VertexTag::Smooth,
            [2] => VertexTag::Dart,
            [_] => VertexTag::Corner,
            [a, b] if (1..=2).contains(a) && (1..=2).contains(b) => VertexTag::Crease,
            _ => VertexTag::Corner,
        }
    }

    /// Smooth edges with both ends tagged become SmoothX, and back.
    fn update_smooth_x_tags(&mut self) {
        for id in self.edge_ids() {
            let Some(e) = self.edge(id) else {
                continue;
            };
            if !e.tag().is_smooth() {
                continue;
            }
            let both_tagged = e
                .vertices()
                .iter()
                .all(|&v| self.vertex(v).is_some_and(|vx| vx.tag().is_tagged()));
            let tag = if both_tagged {
                EdgeTag::SmoothX
            } else {
                EdgeTag::Smooth
            };
            if let Some(ex) = self.edges.get_mut(id) {
                ex.tag = tag;
            }
        }
    }

    /// Store each tagged vertex's sector coefficient on the smooth edges of
    /// its sectors; every other edge end gets the ignored value.
    fn update_sector_coefficients(&mut self) {
        for e in self.edges.iter_mut() {
            e.sector_coefficients = [IGNORED_SECTOR_COEFFICIENT; 2];
        }

        let mut assignments: Vec<(EdgeId, usize, f64)> = Vec::new();
        for v in self.vertex_ids() {
            let tagged = self.vertex(v).is_some_and(|vx| vx.tag().is_tagged());
            if !tagged {
                continue;
            }
            let Some(sectors) = self.vertex_sectors(v) else {
                continue;
            };
            for sector in sectors {
                let Some(sector_type) = sector.classify(self) else {
                    warn!(
                        "Vertex {:?} has a sector that does not match its tag {:?}",
                        v,
                        self.vertex(v).map(|vx| vx.tag())
                    );
                    continue;
                };
                let w = sector_type.coefficient();
                for ptr in sector.edges() {
                    let smooth = self.edge(ptr.edge).is_some_and(|e| e.tag().is_smooth());
                    if smooth {
                        assignments.push((ptr.edge, ptr.start_index(), w));
                    }
                }
            }
        }

        for (edge, end, w) in assignments {
            if let Some(e) = self.edges.get_mut(edge) {
                e.sector_coefficients[end] = w;
            }
        }
    }
}
