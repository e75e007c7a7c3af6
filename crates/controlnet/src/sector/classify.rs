//! Sector walks around a vertex.

use std::collections::HashSet;

use smallvec::SmallVec;

use super::SectorType;
use crate::constants::MAX_SECTOR_FACES;
use crate::graph::ControlNetGraph;
use crate::types::{EdgeId, EdgePtr, EdgeTag, FaceId, VertexId, VertexTag};

/// A fan of faces around one side of a vertex, in radial order.
///
/// Face `i` has `edges[i]` leaving the center first and `edges[i+1]`
/// arriving at the center last (indices wrap for closed sectors). Every edge
/// is directed away from the center. A bounded sector has one more edge than
/// faces; a closed sector has as many edges as faces. A dart's closed sector
/// starts on its crease edge.
#[derive(Debug, Clone, PartialEq)]
pub struct Sector {
    center: VertexId,
    edges: SmallVec<[EdgePtr; 8]>,
    faces: SmallVec<[FaceId; 8]>,
    closed: bool,
}

impl Sector {
    pub fn center(&self) -> VertexId {
        self.center
    }

    pub fn edges(&self) -> &[EdgePtr] {
        &self.edges
    }

    pub fn faces(&self) -> &[FaceId] {
        &self.faces
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// The face that keys this sector's saved surface point
    pub fn first_face(&self) -> FaceId {
        self.faces[0]
    }

    /// Edge `i` of the sector, wrapping for closed sectors
    pub fn edge(&self, i: usize) -> EdgePtr {
        self.edges[i % self.edges.len()]
    }

    pub fn contains_face(&self, face: FaceId) -> bool {
        self.faces.contains(&face)
    }

    pub fn contains_edge(&self, edge: EdgeId) -> bool {
        self.edges.iter().any(|ptr| ptr.edge == edge)
    }

    /// Sum of the control-net corner angles of the sector's faces
    pub fn corner_angle(&self, graph: &ControlNetGraph) -> Option<f64> {
        let c = graph.vertex_point(self.center)?;
        let mut angle = 0.0;
        for i in 0..self.faces.len() {
            let a = graph.vertex_point(graph.ptr_end(self.edge(i))?)? - c;
            let b = graph.vertex_point(graph.ptr_end(self.edge(i + 1))?)? - c;
            if a.length_squared() == 0.0 || b.length_squared() == 0.0 {
                return None;
            }
            angle += a.angle_between(b);
        }
        Some(angle)
    }

    /// Sector coefficient stored at the center end of the first smooth edge
    pub fn stored_coefficient(&self, graph: &ControlNetGraph) -> Option<f64> {
        self.edges.iter().find_map(|ptr| {
            let e = graph.edge(ptr.edge)?;
            e.tag()
                .is_smooth()
                .then(|| e.sector_coefficient(ptr.start_index()))
        })
    }

    /// Sector type from the vertex tag, face count and control-net corner angle.
    pub fn classify(&self, graph: &ControlNetGraph) -> Option<SectorType> {
        let tag = graph.vertex(self.center)?.tag();
        let k = self.faces.len() as u32;
        let sector_type = match tag {
            VertexTag::Smooth if self.closed => SectorType::smooth(k),
            VertexTag::Dart if self.closed => SectorType::dart(k),
            VertexTag::Crease if !self.closed => SectorType::crease(k),
            VertexTag::Corner if !self.closed => {
                SectorType::corner_from_angle(k, self.corner_angle(graph)?)
            }
            _ => return None,
        };
        Some(sector_type)
    }

    /// Sector type implied by the stored sector coefficient.
    ///
    /// Refined levels keep the coefficients of level 0, so this recovers the
    /// level-0 sector type. Sectors without smooth edges fall back to
    /// [`Sector::classify`].
    pub fn stored_type(&self, graph: &ControlNetGraph) -> Option<SectorType> {
        let tag = graph.vertex(self.center)?.tag();
        if tag == VertexTag::Corner && !self.closed {
            if let Some(w) = self.stored_coefficient(graph) {
                return SectorType::from_coefficient(tag, self.faces.len() as u32, w);
            }
        }
        self.classify(graph)
    }
}

impl ControlNetGraph {
    /// Both edges of `face` at `v`, directed away from `v`: the edge leaving
    /// `v` first and the edge arriving at `v` second.
    pub fn face_corner_edges(&self, face: FaceId, v: VertexId) -> Option<(EdgePtr, EdgePtr)> {
        let f = self.face(face)?;
        let corner = self.face_corner(face, v)?;
        let n = f.edge_count();
        let out = f.edges()[corner];
        let inc = f.edges()[(corner + n - 1) % n].flipped();
        Some((out, inc))
    }

    /// Smooth edges with two faces are interior to a sector
    pub(crate) fn is_sector_interior(&self, edge: EdgeId) -> bool {
        self.edge(edge)
            .is_some_and(|e| e.tag().is_smooth() && e.face_count() == 2)
    }

    /// Walk the sector of `v` that contains `face`.
    pub fn sector_from_face(&self, v: VertexId, face: FaceId) -> Option<Sector> {
        // Walk backwards across leaving edges to the start of a bounded sector
        let (mut start_edge, _) = self.face_corner_edges(face, v)?;
        let mut start_face = face;
        let mut wrapped = false;
        for _ in 0..MAX_SECTOR_FACES {
            if !self.is_sector_interior(start_edge.edge) {
                break;
            }
            let previous = self.edge_other_face(start_edge.edge, start_face)?;
            if previous == face {
                wrapped = true;
                break;
            }
            let (a, b) = self.face_corner_edges(previous, v)?;
            start_edge = if a.edge == start_edge.edge { b } else { a };
            start_face = previous;
        }

        let mut edges: SmallVec<[EdgePtr; 8]> = SmallVec::new();
        let mut faces: SmallVec<[FaceId; 8]> = SmallVec::new();
        edges.push(start_edge);

        let mut current_face = start_face;
        let mut current_edge = start_edge;
        let mut closed = false;
        for _ in 0..MAX_SECTOR_FACES {
            faces.push(current_face);
            let (a, b) = self.face_corner_edges(current_face, v)?;
            let next_edge = if a.edge == current_edge.edge { b } else { a };

            if next_edge.edge == start_edge.edge {
                // Back on the first edge: a closed fan, or a dart's crease
                closed = true;
                break;
            }
            edges.push(next_edge);
            if !self.is_sector_interior(next_edge.edge) {
                break;
            }
            let next_face = self.edge_other_face(next_edge.edge, current_face)?;
            if next_face == start_face {
                closed = true;
                edges.pop();
                break;
            }
            current_face = next_face;
            current_edge = next_edge;
        }

        let mut sector = Sector {
            center: v,
            edges,
            faces,
            closed,
        };
        if wrapped {
            sector.rotate_to_smallest_face();
        }
        Some(sector)
    }

    /// Every sector around `v`, in the order of the vertex's face list.
    pub fn vertex_sectors(&self, v: VertexId) -> Option<Vec<Sector>> {
        let vx = self.vertex(v)?;
        let mut seen: HashSet<FaceId> = HashSet::new();
        let mut sectors = Vec::new();
        for &f in vx.faces() {
            if seen.contains(&f) {
                continue;
            }
            let sector = self.sector_from_face(v, f)?;
            seen.extend(sector.faces.iter().copied());
            sectors.push(sector);
        }
        Some(sectors)
    }

    /// The sector of `v` containing `face`, or the only sector when `face`
    /// is `None` and `v` has exactly one.
    pub fn vertex_sector(&self, v: VertexId, face: Option<FaceId>) -> Option<Sector> {
        match face {
            Some(f) => self.sector_from_face(v, f),
            None => {
                let mut sectors = self.vertex_sectors(v)?;
                if sectors.len() == 1 { sectors.pop() } else { None }
            }
        }
    }

    /// Whether `edge` is tagged Crease
    pub(crate) fn is_crease(&self, edge: EdgeId) -> bool {
        self.edge(edge).is_some_and(|e| e.tag() == EdgeTag::Crease)
    }
}

impl Sector {
    /// Rotate a fan that wraps around without a crease so it starts at its
    /// smallest face id.
    fn rotate_to_smallest_face(&mut self) {
        let Some((offset, _)) = self.faces.iter().enumerate().min_by_key(|(_, f)| **f) else {
            return;
        };
        self.faces.rotate_left(offset);
        if self.edges.len() == self.faces.len() {
            self.edges.rotate_left(offset);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::grid;

    #[test]
    fn test_interior_vertex_single_closed_sector() {
        let graph = grid(2);
        let center = graph.vertex_ids()[4];
        let sectors = graph.vertex_sectors(center).unwrap();
        assert_eq!(sectors.len(), 1);
        let sector = &sectors[0];
        assert!(sector.is_closed());
        assert_eq!(sector.face_count(), 4);
        assert_eq!(sector.edges().len(), 4);
        assert_eq!(sector.classify(&graph), Some(SectorType::smooth(4)));
        assert_eq!(sector.first_face(), *sector.faces().iter().min().unwrap());
    }

    #[test]
    fn test_radial_order() {
        let graph = grid(2);
        let center = graph.vertex_ids()[4];
        let sector = graph.vertex_sector(center, None).unwrap();
        for i in 0..sector.face_count() {
            let face = sector.faces()[i];
            let (out, inc) = graph.face_corner_edges(face, center).unwrap();
            assert_eq!(out.edge, sector.edge(i).edge);
            assert_eq!(inc.edge, sector.edge(i + 1).edge);
            assert_eq!(graph.ptr_start(sector.edge(i)), Some(center));
        }
    }

    #[test]
    fn test_boundary_vertex_bounded_sector() {
        let graph = grid(2);
        // Middle of the bottom row
        let v = graph.vertex_ids()[1];
        let sector = graph.vertex_sector(v, None).unwrap();
        assert!(!sector.is_closed());
        assert_eq!(sector.face_count(), 2);
        assert_eq!(sector.edges().len(), 3);
        assert!(graph.is_crease(sector.edges()[0].edge));
        assert!(graph.is_crease(sector.edges()[2].edge));
        assert_eq!(sector.classify(&graph), Some(SectorType::crease(2)));
    }

    #[test]
    fn test_same_sector_from_any_face() {
        let graph = grid(2);
        let v = graph.vertex_ids()[1];
        let faces = graph.vertex(v).unwrap().faces().to_vec();
        let a = graph.sector_from_face(v, faces[0]).unwrap();
        let b = graph.sector_from_face(v, faces[1]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_dart_sector_starts_on_crease() {
        let mut graph = grid(2);
        let center = graph.vertex_ids()[4];
        let left = graph.vertex_ids()[3];
        let e = graph.find_edge(center, left).unwrap();
        graph.set_edge_tag(e, EdgeTag::Crease);
        graph.update_all_tags_and_sector_coefficients(false);

        assert_eq!(graph.vertex(center).unwrap().tag(), VertexTag::Dart);
        let sector = graph.vertex_sector(center, None).unwrap();
        assert!(sector.is_closed());
        assert_eq!(sector.face_count(), 4);
        assert_eq!(sector.edges()[0].edge, e);
        assert_eq!(sector.classify(&graph), Some(SectorType::dart(4)));
    }

    #[test]
    fn test_grid_corner_angle() {
        let graph = grid(2);
        let corner = graph.vertex_ids()[0];
        let sector = graph.vertex_sector(corner, None).unwrap();
        let angle = sector.corner_angle(&graph).unwrap();
        assert!((angle - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }
}
