//! Whole-graph refinement and local neighborhood extraction.
//!
//! Refinement materializes the next subdivision level as a new graph. Every
//! parent vertex, edge and face produces one child vertex; every parent edge
//! produces two child edges, every face corner one child quad. Tags and
//! sector coefficients are inherited rather than recomputed, so sector types
//! of the level-0 net persist through all levels.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, trace};

use crate::constants::IGNORED_SECTOR_COEFFICIENT;
use crate::graph::ControlNetGraph;
use crate::sector::SectorType;
use crate::sharpness::EdgeSharpness;
use crate::types::{ComponentId, EdgeId, EdgePtr, EdgeTag, FaceId, SubdError, VertexId, VertexTag};

/// Children of one parent edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeChildren {
    /// Child vertex at the edge point
    pub midpoint: VertexId,
    /// `halves[i]` joins the child of parent end `i` to the midpoint
    pub halves: [EdgeId; 2],
}

/// Children of one parent face
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaceChildren {
    /// Child vertex at the face point
    pub center: VertexId,
    /// `spokes[i]` joins the center to the midpoint of face edge `i`
    pub spokes: Vec<EdgeId>,
    /// `quads[i]` is the child quad at face corner `i`
    pub quads: Vec<FaceId>,
}

/// Parent-to-child links produced by one refinement step.
#[derive(Debug, Clone, Default)]
pub struct RefinementMap {
    vertices: HashMap<VertexId, VertexId>,
    edges: HashMap<EdgeId, EdgeChildren>,
    faces: HashMap<FaceId, FaceChildren>,
}

impl RefinementMap {
    pub fn vertex_child(&self, v: VertexId) -> Option<VertexId> {
        self.vertices.get(&v).copied()
    }

    pub fn edge_children(&self, e: EdgeId) -> Option<EdgeChildren> {
        self.edges.get(&e).copied()
    }

    pub fn face_children(&self, f: FaceId) -> Option<&FaceChildren> {
        self.faces.get(&f)
    }

    /// Child quad of `f` at face corner `corner`
    pub fn corner_quad(&self, f: FaceId, corner: usize) -> Option<FaceId> {
        self.faces.get(&f)?.quads.get(corner).copied()
    }
}

/// Sequential id source for a graph built from scratch
#[derive(Default)]
struct IdCounter {
    vertex: u32,
    edge: u32,
    face: u32,
}

impl IdCounter {
    fn vertex(&mut self) -> VertexId {
        self.vertex += 1;
        VertexId(self.vertex)
    }

    fn edge(&mut self) -> EdgeId {
        self.edge += 1;
        EdgeId(self.edge)
    }

    fn face(&mut self) -> FaceId {
        self.face += 1;
        FaceId(self.face)
    }
}

impl ControlNetGraph {
    /// Subdivide the whole graph once.
    ///
    /// Fails with `SubdError::Degenerate` on the first component whose
    /// subdivision point cannot be evaluated.
    pub fn refine(&self) -> Result<(ControlNetGraph, RefinementMap), SubdError> {
        self.refine_with(false)
    }

    /// Subdivide the whole graph once, keeping the control point (or the
    /// midpoint, or the centroid) of any component that cannot be evaluated.
    ///
    /// Used on extracted neighborhoods, whose outer components lack the
    /// faces their rules need.
    pub fn refine_partial(&self) -> (ControlNetGraph, RefinementMap) {
        match self.refine_with(true) {
            Ok(result) => result,
            // Partial refinement only fails on inconsistent graphs
            Err(err) => {
                debug!("Partial refinement failed: {}", err);
                (ControlNetGraph::with_config(self.config), RefinementMap::default())
            }
        }
    }

    /// Subdivide `levels` times, returning the finest graph and one map per
    /// level.
    pub fn refine_levels(
        &self,
        levels: usize,
    ) -> Result<(ControlNetGraph, Vec<RefinementMap>), SubdError> {
        let mut maps = Vec::with_capacity(levels);
        let mut current = self.clone();
        for _ in 0..levels {
            let (next, map) = current.refine()?;
            maps.push(map);
            current = next;
        }
        Ok((current, maps))
    }

    fn refine_with(&self, partial: bool) -> Result<(ControlNetGraph, RefinementMap), SubdError> {
        let mut child = ControlNetGraph::with_config(self.config);
        let mut map = RefinementMap::default();
        let mut ids = IdCounter::default();
        let inconsistent =
            |what: ComponentId| SubdError::InvalidGraph(format!("could not insert child of {:?}", what));

        // ===== PHASE 1: VERTEX CHILDREN =====
        for v in self.vertex_ids() {
            let Some(vx) = self.vertices.get(v) else {
                continue;
            };
            let point = match self.vertex_subdivision_point(v) {
                Some(p) => p,
                None if partial => vx.point,
                None => return Err(SubdError::Degenerate(ComponentId::Vertex(v))),
            };
            let id = ids.vertex();
            if !child.insert_vertex_with_id(id, vx.tag, point) {
                return Err(inconsistent(ComponentId::Vertex(v)));
            }
            if let Some(cx) = child.vertices.get_mut(id) {
                cx.status = vx.status;
            }
            map.vertices.insert(v, id);
        }

        // ===== PHASE 2: EDGE CHILDREN =====
        for e in self.edge_ids() {
            let Some(ex) = self.edges.get(e) else {
                continue;
            };
            let point = match self.edge_subdivision_point(e) {
                Some(p) => p,
                None if partial => {
                    let a = self.vertex_point(ex.vertices[0]).unwrap_or_default();
                    let b = self.vertex_point(ex.vertices[1]).unwrap_or_default();
                    0.5 * (a + b)
                }
                None => return Err(SubdError::Degenerate(ComponentId::Edge(e))),
            };
            let (mid_tag, half_tag) = match ex.tag {
                EdgeTag::Crease => (VertexTag::Crease, EdgeTag::Crease),
                EdgeTag::Smooth | EdgeTag::SmoothX => (VertexTag::Smooth, EdgeTag::Smooth),
                EdgeTag::Unset => (VertexTag::Unset, EdgeTag::Unset),
            };

            let midpoint = ids.vertex();
            if !child.insert_vertex_with_id(midpoint, mid_tag, point) {
                return Err(inconsistent(ComponentId::Edge(e)));
            }
            let ends = [
                map.vertex_child(ex.vertices[0])
                    .ok_or_else(|| inconsistent(ComponentId::Vertex(ex.vertices[0])))?,
                map.vertex_child(ex.vertices[1])
                    .ok_or_else(|| inconsistent(ComponentId::Vertex(ex.vertices[1])))?,
            ];

            let halves = [ids.edge(), ids.edge()];
            let inserted = child.insert_edge_with_id(
                halves[0],
                half_tag,
                [ends[0], midpoint],
                ex.sharpness.subdivided(0),
                [ex.sector_coefficients[0], IGNORED_SECTOR_COEFFICIENT],
            ) && child.insert_edge_with_id(
                halves[1],
                half_tag,
                [midpoint, ends[1]],
                ex.sharpness.subdivided(1),
                [IGNORED_SECTOR_COEFFICIENT, ex.sector_coefficients[1]],
            );
            if !inserted {
                return Err(inconsistent(ComponentId::Edge(e)));
            }
            for half in halves {
                if let Some(hx) = child.edges.get_mut(half) {
                    hx.status = ex.status;
                }
            }
            map.edges.insert(e, EdgeChildren { midpoint, halves });
        }

        // ===== PHASE 3: FACE CHILDREN =====
        // A crease midpoint is a Crease vertex with two faces in each sector
        let crease_mid_coefficient = SectorType::crease(2).coefficient();
        for f in self.face_ids() {
            let Some(fx) = self.faces.get(f) else {
                continue;
            };
            let point = match self.face_subdivision_point(f) {
                Some(p) => p,
                None if partial => self.face_centroid(f).unwrap_or_default(),
                None => return Err(SubdError::Degenerate(ComponentId::Face(f))),
            };
            let center = ids.vertex();
            if !child.insert_vertex_with_id(center, VertexTag::Smooth, point) {
                return Err(inconsistent(ComponentId::Face(f)));
            }

            let n = fx.edges.len();
            let mut edge_children = Vec::with_capacity(n);
            let mut spokes = Vec::with_capacity(n);
            for ptr in &fx.edges {
                let children = map
                    .edge_children(ptr.edge)
                    .ok_or_else(|| inconsistent(ComponentId::Edge(ptr.edge)))?;
                let mid_coefficient = if self.is_crease(ptr.edge) {
                    crease_mid_coefficient
                } else {
                    IGNORED_SECTOR_COEFFICIENT
                };
                let spoke = ids.edge();
                if !child.insert_edge_with_id(
                    spoke,
                    EdgeTag::Smooth,
                    [center, children.midpoint],
                    EdgeSharpness::ZERO,
                    [IGNORED_SECTOR_COEFFICIENT, mid_coefficient],
                ) {
                    return Err(inconsistent(ComponentId::Face(f)));
                }
                edge_children.push(children);
                spokes.push(spoke);
            }

            // Quad at corner i: v_i -> M_i -> C -> M_{i-1} -> v_i
            let mut quads = Vec::with_capacity(n);
            for i in 0..n {
                let prev = (i + n - 1) % n;
                let out_ptr = fx.edges[i];
                let in_ptr = fx.edges[prev];

                let out = if out_ptr.start_index() == 0 {
                    EdgePtr::forward(edge_children[i].halves[0])
                } else {
                    EdgePtr::reverse(edge_children[i].halves[1])
                };
                let back = if in_ptr.end_index() == 0 {
                    EdgePtr::reverse(edge_children[prev].halves[0])
                } else {
                    EdgePtr::forward(edge_children[prev].halves[1])
                };
                let edge_loop = [
                    out,
                    EdgePtr::reverse(spokes[i]),
                    EdgePtr::forward(spokes[prev]),
                    back,
                ];

                let quad = ids.face();
                if !child.insert_face_with_id(quad, &edge_loop) {
                    return Err(inconsistent(ComponentId::Face(f)));
                }
                if let Some(qx) = child.faces.get_mut(quad) {
                    qx.status = fx.status;
                    qx.overrides = fx.overrides.clone();
                }
                quads.push(quad);
            }
            map.faces.insert(
                f,
                FaceChildren {
                    center,
                    spokes,
                    quads,
                },
            );
        }

        debug!(
            "Refined {} vertices, {} edges, {} faces into {} vertices, {} edges, {} faces{}",
            self.vertex_count(),
            self.edge_count(),
            self.face_count(),
            child.vertex_count(),
            child.edge_count(),
            child.face_count(),
            if partial { " (partial)" } else { "" }
        );
        Ok((child, map))
    }

    /// Copy of the closed star of `seeds`: every face touching a seed with
    /// all of its edges and vertices, plus the seeds' wire edges.
    ///
    /// Ids, tags, sharpness and sector coefficients are kept as they are, so
    /// the copy evaluates the seeds exactly like the full graph does.
    pub fn extract_neighborhood(&self, seeds: &[VertexId]) -> Option<ControlNetGraph> {
        let mut vertices: BTreeSet<VertexId> = BTreeSet::new();
        let mut edges: BTreeSet<EdgeId> = BTreeSet::new();
        let mut faces: BTreeSet<FaceId> = BTreeSet::new();

        for &seed in seeds {
            let vx = self.vertices.get(seed)?;
            vertices.insert(seed);
            for ptr in &vx.edges {
                edges.insert(ptr.edge);
                vertices.insert(self.ptr_end(*ptr)?);
            }
            for &f in &vx.faces {
                faces.insert(f);
                for ptr in &self.faces.get(f)?.edges {
                    edges.insert(ptr.edge);
                    vertices.insert(self.ptr_start(*ptr)?);
                }
            }
        }

        let mut sub = ControlNetGraph::with_config(self.config);
        for v in vertices {
            let vx = self.vertices.get(v)?;
            if !sub.insert_vertex_with_id(v, vx.tag, vx.point) {
                return None;
            }
        }
        for e in edges {
            let ex = self.edges.get(e)?;
            if !sub.insert_edge_with_id(e, ex.tag, ex.vertices, ex.sharpness, ex.sector_coefficients)
            {
                return None;
            }
        }
        for f in faces {
            let fx = self.faces.get(f)?;
            if !sub.insert_face_with_id(f, &fx.edges) {
                return None;
            }
        }

        trace!(
            "Extracted neighborhood of {} seeds: {} vertices, {} edges, {} faces",
            seeds.len(),
            sub.vertex_count(),
            sub.edge_count(),
            sub.face_count()
        );
        Some(sub)
    }
}

#[cfg(test)]
mod tests {
    use glam::DVec3;

    use super::*;
    use crate::fixtures::{crease_cube, cube, grid};

    #[test]
    fn test_refined_counts() {
        let graph = cube();
        let (child, map) = graph.refine().unwrap();
        // V + E + F vertices, 2E + 4F edges, 4F faces
        assert_eq!(child.vertex_count(), 8 + 12 + 6);
        assert_eq!(child.edge_count(), 24 + 24);
        assert_eq!(child.face_count(), 24);
        assert!(child.is_valid().is_ok());
        for f in graph.face_ids() {
            assert_eq!(map.face_children(f).unwrap().quads.len(), 4);
        }
    }

    #[test]
    fn test_refined_faces_keep_orientation() {
        let graph = grid(1);
        let (child, map) = graph.refine().unwrap();
        let f = graph.face_ids()[0];
        let parent_normal = graph.face_normal(f).unwrap();
        for corner in 0..4 {
            let quad = map.corner_quad(f, corner).unwrap();
            let normal = child.face_normal(quad).unwrap();
            assert!(normal.dot(parent_normal) > 0.99);
            // The quad starts at the child of its parent corner
            let parent_corner = graph.face_vertices(f).unwrap()[corner];
            let first = child.face_vertices(quad).unwrap()[0];
            assert_eq!(map.vertex_child(parent_corner), Some(first));
        }
    }

    #[test]
    fn test_child_tags_inherited() {
        let graph = grid(1);
        let (child, map) = graph.refine().unwrap();
        for v in graph.vertex_ids() {
            let c = map.vertex_child(v).unwrap();
            assert_eq!(child.vertex(c).unwrap().tag(), graph.vertex(v).unwrap().tag());
        }
        for e in graph.edge_ids() {
            let children = map.edge_children(e).unwrap();
            assert_eq!(child.vertex(children.midpoint).unwrap().tag(), VertexTag::Crease);
            for half in children.halves {
                assert_eq!(child.edge(half).unwrap().tag(), EdgeTag::Crease);
            }
        }
        let f = graph.face_ids()[0];
        let center = map.face_children(f).unwrap().center;
        assert_eq!(child.vertex(center).unwrap().tag(), VertexTag::Smooth);
    }

    #[test]
    fn test_spokes_carry_crease_mid_coefficient() {
        let graph = grid(1);
        let (child, map) = graph.refine().unwrap();
        let f = graph.face_ids()[0];
        for &spoke in &map.face_children(f).unwrap().spokes {
            let e = child.edge(spoke).unwrap();
            assert_eq!(e.sector_coefficient(0), IGNORED_SECTOR_COEFFICIENT);
            assert!((e.sector_coefficient(1) - 0.5).abs() < 1e-15);
        }
    }

    #[test]
    fn test_refined_tags_agree_with_update() {
        let graph = grid(2);
        let (child, _) = graph.refine().unwrap();
        let mut updated = child.clone();
        let changed = updated.update_all_tags_and_sector_coefficients(false);
        assert_eq!(changed, 0);
        for e in child.edges() {
            let u = updated.edge(e.id()).unwrap();
            for end in 0..2 {
                assert!((e.sector_coefficient(end) - u.sector_coefficient(end)).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_corners_stay_fixed_over_levels() {
        let graph = crease_cube();
        let (finest, maps) = graph.refine_levels(3).unwrap();
        for v in graph.vertex_ids() {
            let mut id = v;
            for map in &maps {
                id = map.vertex_child(id).unwrap();
            }
            assert_eq!(finest.vertex_point(id), graph.vertex_point(v));
        }
    }

    #[test]
    fn test_strict_refine_rejects_unset() {
        let mut graph = ControlNetGraph::new();
        let a = graph.add_vertex(VertexTag::Unset, DVec3::ZERO).unwrap();
        assert_eq!(
            graph.refine().err(),
            Some(SubdError::Degenerate(ComponentId::Vertex(a)))
        );
        let (child, _) = graph.refine_partial();
        assert_eq!(child.vertex_count(), 1);
    }

    #[test]
    fn test_extract_interior_star() {
        let graph = grid(2);
        let center = graph.vertex_ids()[4];
        let star = graph.extract_neighborhood(&[center]).unwrap();
        assert_eq!(star.vertex_count(), 9);
        assert_eq!(star.edge_count(), 12);
        assert_eq!(star.face_count(), 4);
        assert_eq!(
            star.vertex_subdivision_point(center),
            graph.vertex_subdivision_point(center)
        );
    }

    #[test]
    fn test_partial_refine_of_star_keeps_center_exact() {
        let mut graph = grid(3);
        let ids = graph.vertex_ids();
        let center = ids[5];
        graph.set_vertex_control_point(center, DVec3::new(1.0, 1.0, 0.5), true);

        let (full, full_map) = graph.refine().unwrap();
        let star = graph.extract_neighborhood(&[center]).unwrap();
        let (local, local_map) = star.refine_partial();

        let a = full_map.vertex_child(center).unwrap();
        let b = local_map.vertex_child(center).unwrap();
        assert_eq!(full.vertex_point(a), local.vertex_point(b));
        // The child's own subdivision point only depends on its star
        let pa = full.vertex_subdivision_point(a).unwrap();
        let pb = local.vertex_subdivision_point(b).unwrap();
        assert!((pa - pb).length() < 1e-12);
    }
}
