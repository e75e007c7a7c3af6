//! Seam sealing.
//!
//! Fragments are evaluated independently, so two fragments meeting along a
//! seam can disagree in the last bits of their shared samples. Sealing gives
//! every boundary sample a key naming the control-net location it samples
//! and copies the first value seen for each key into every later fragment.
//! Fragments are visited in `(face, corner)` order, which makes the result
//! independent of the order they were generated in.
//!
//! Normals are only shared where the surface is smooth: samples on a crease
//! edge keep one normal per face, and vertex samples share a normal only
//! within one sector.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use controlnet::{ControlNetGraph, EdgeId, EdgeTag, FaceId, VertexId};
use glam::DVec3;
use tracing::{debug, warn};

use crate::types::{Fragment, Seam, SealReport};

/// Seam parameter units over a whole edge or spoke. Divisible by the
/// side length of every fragment up to the maximum density.
const PARAM_UNITS: u32 = 1 << 9;

/// Control-net location of a boundary sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum SampleKey {
    Vertex(VertexId),
    /// Interior point of an edge at a parameter in `1..PARAM_UNITS`
    Edge(EdgeId, u32),
    /// Interior point of a spoke
    Spoke(FaceId, u32, u32),
    FaceCenter(FaceId),
}

fn edge_key(graph: &ControlNetGraph, edge: EdgeId, param: u32) -> Option<SampleKey> {
    let ex = graph.edge(edge)?;
    Some(match param {
        0 => SampleKey::Vertex(ex.vertex(0)),
        PARAM_UNITS => SampleKey::Vertex(ex.vertex(1)),
        _ => SampleKey::Edge(edge, param),
    })
}

/// Key of sample `t` (in seam direction) of a seam sampled `count` times
fn sample_key(graph: &ControlNetGraph, seam: Seam, t: usize, count: usize) -> Option<SampleKey> {
    let steps = (count - 1) as u32;
    let t = t as u32;
    match seam {
        Seam::Edge(e) => edge_key(graph, e, t * PARAM_UNITS / steps),
        Seam::EdgeHalf(e, half) => {
            let half_units = PARAM_UNITS / 2;
            edge_key(graph, e, u32::from(half) * half_units + t * half_units / steps)
        }
        Seam::Spoke(f, index) => match t * PARAM_UNITS / steps {
            0 => {
                let edge = graph.face(f)?.edges().get(index as usize)?.edge;
                edge_key(graph, edge, PARAM_UNITS / 2)
            }
            PARAM_UNITS => Some(SampleKey::FaceCenter(f)),
            param => Some(SampleKey::Spoke(f, index, param)),
        },
    }
}

/// Which copies of a sample's normal may be shared: `None` shares across all
/// fragments, `Some(id)` only among fragments with the same id.
fn normal_scope(graph: &ControlNetGraph, key: SampleKey, face: FaceId) -> Option<FaceId> {
    match key {
        SampleKey::Vertex(v) => Some(
            graph
                .vertex_sector(v, Some(face))
                .map_or(face, |sector| sector.first_face()),
        ),
        SampleKey::Edge(e, _) => graph
            .edge(e)
            .is_some_and(|ex| ex.tag() == EdgeTag::Crease)
            .then_some(face),
        SampleKey::Spoke(..) | SampleKey::FaceCenter(_) => None,
    }
}

/// Running canonical values and statistics of one sealing pass
struct Sealer {
    tolerance: f64,
    points: HashMap<SampleKey, DVec3>,
    normals: HashMap<(SampleKey, Option<FaceId>), DVec3>,
    report: SealReport,
}

impl Sealer {
    fn share<K: Eq + std::hash::Hash + std::fmt::Debug>(
        map: &mut HashMap<K, DVec3>,
        key: K,
        value: &mut DVec3,
        tolerance: f64,
        report: &mut SealReport,
    ) {
        match map.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(*value);
            }
            Entry::Occupied(slot) => {
                let shared = *slot.get();
                let deviation = shared.distance(*value);
                if deviation > tolerance {
                    report.mismatches += 1;
                    warn!(
                        "Seal mismatch at {:?}: samples differ by {:.3e}",
                        slot.key(),
                        deviation
                    );
                }
                report.max_deviation = report.max_deviation.max(deviation);
                report.shared_samples += 1;
                *value = shared;
            }
        }
    }

    fn seal(&mut self, graph: &ControlNetGraph, fragment: &mut Fragment) {
        let count = fragment.side;
        for k in 0..4 {
            let side = fragment.sides[k];
            let indices = fragment.side_indices(k);
            // The last sample of a side is the first of the next one
            for (t, &index) in indices.iter().enumerate().take(count - 1) {
                let seam_t = if side.reversed { count - 1 - t } else { t };
                let Some(key) = sample_key(graph, side.seam, seam_t, count) else {
                    continue;
                };
                Self::share(
                    &mut self.points,
                    key,
                    &mut fragment.points[index],
                    self.tolerance,
                    &mut self.report,
                );
                let scope = normal_scope(graph, key, fragment.face);
                Self::share(
                    &mut self.normals,
                    (key, scope),
                    &mut fragment.normals[index],
                    self.tolerance,
                    &mut self.report,
                );
            }
        }
    }
}

/// Make shared boundary samples of `fragments` identical.
///
/// Differences larger than `tolerance` are still sealed but counted as
/// mismatches and logged. Sealing an already sealed set changes nothing.
pub fn seal_fragments(
    graph: &ControlNetGraph,
    fragments: &mut [Fragment],
    tolerance: f64,
) -> SealReport {
    let mut order: Vec<usize> = (0..fragments.len()).collect();
    order.sort_by_key(|&i| (fragments[i].face, fragments[i].corner));

    let mut sealer = Sealer {
        tolerance,
        points: HashMap::new(),
        normals: HashMap::new(),
        report: SealReport::default(),
    };
    for i in order {
        if fragments[i].side < 2 {
            continue;
        }
        sealer.seal(graph, &mut fragments[i]);
    }

    debug!(
        "Sealed {} fragments: {} shared samples, {} mismatches, max deviation {:.3e}",
        fragments.len(),
        sealer.report.shared_samples,
        sealer.report.mismatches,
        sealer.report.max_deviation
    );
    sealer.report
}

/// Whether two fragments hold identical samples along the seams they share
pub fn seams_match(graph: &ControlNetGraph, a: &Fragment, b: &Fragment) -> bool {
    let keyed = |fragment: &Fragment| {
        let count = fragment.side;
        let mut samples = HashMap::new();
        for k in 0..4 {
            let side = fragment.sides[k];
            for (t, index) in fragment.side_indices(k).into_iter().enumerate() {
                let seam_t = if side.reversed { count - 1 - t } else { t };
                if let Some(key) = sample_key(graph, side.seam, seam_t, count) {
                    samples.insert(key, fragment.points[index]);
                }
            }
        }
        samples
    };
    let a_samples = keyed(a);
    let b_samples = keyed(b);
    a_samples
        .iter()
        .all(|(key, point)| b_samples.get(key).is_none_or(|other| other == point))
}

#[cfg(test)]
mod tests {
    use controlnet::EdgePtr;

    use super::*;
    use crate::types::FragmentSide;

    fn strip() -> ControlNetGraph {
        let points: Vec<DVec3> = (0..6)
            .map(|k| DVec3::new((k % 3) as f64, (k / 3) as f64, 0.0))
            .collect();
        ControlNetGraph::from_polygons(&points, &[vec![0, 1, 4, 3], vec![1, 2, 5, 4]]).unwrap()
    }

    #[test]
    fn test_edge_keys_share_endpoints() {
        let graph = strip();
        let e = graph.edge_ids()[0];
        let [v0, v1] = graph.edge(e).unwrap().vertices();
        assert_eq!(sample_key(&graph, Seam::Edge(e), 0, 5), Some(SampleKey::Vertex(v0)));
        assert_eq!(sample_key(&graph, Seam::Edge(e), 4, 5), Some(SampleKey::Vertex(v1)));
        // A half-edge sample lands on the same parameter as the whole edge
        assert_eq!(
            sample_key(&graph, Seam::EdgeHalf(e, 1), 1, 3),
            sample_key(&graph, Seam::Edge(e), 3, 5)
        );
        assert_eq!(
            sample_key(&graph, Seam::EdgeHalf(e, 0), 2, 3),
            Some(SampleKey::Edge(e, PARAM_UNITS / 2))
        );
    }

    #[test]
    fn test_spoke_ends() {
        let graph = strip();
        let f = graph.face_ids()[0];
        let first_edge = graph.face(f).unwrap().edges()[1].edge;
        assert_eq!(
            sample_key(&graph, Seam::Spoke(f, 1), 0, 3),
            Some(SampleKey::Edge(first_edge, PARAM_UNITS / 2))
        );
        assert_eq!(
            sample_key(&graph, Seam::Spoke(f, 1), 2, 3),
            Some(SampleKey::FaceCenter(f))
        );
    }

    #[test]
    fn test_seal_copies_first_value() {
        let graph = strip();
        let faces = graph.face_ids();
        let shared = graph.find_edge(graph.vertex_ids()[1], graph.vertex_ids()[4]).unwrap();

        let make = |face: FaceId, offset: f64| {
            let fx = graph.face(face).unwrap();
            let sides: [FragmentSide; 4] = std::array::from_fn(|k| {
                let ptr: EdgePtr = fx.edges()[k];
                FragmentSide {
                    seam: Seam::Edge(ptr.edge),
                    reversed: ptr.reversed,
                }
            });
            let corners = graph.face_points(face).unwrap();
            let points = (0..9)
                .map(|k| {
                    let (u, v) = ((k % 3) as f64 / 2.0, (k / 3) as f64 / 2.0);
                    let bottom = corners[0].lerp(corners[1], u);
                    let top = corners[3].lerp(corners[2], u);
                    bottom.lerp(top, v) + DVec3::new(0.0, 0.0, offset)
                })
                .collect();
            Fragment {
                face,
                corner: None,
                side: 3,
                points,
                normals: vec![DVec3::Z; 9],
                texture_coordinates: None,
                color: None,
                sides,
                exact: true,
            }
        };

        let mut fragments = vec![make(faces[1], 1e-9), make(faces[0], 0.0)];
        let report = seal_fragments(&graph, &mut fragments, 1e-6);
        assert_eq!(report.mismatches, 0);
        assert!(report.shared_samples > 0);
        assert!(seams_match(&graph, &fragments[0], &fragments[1]));

        // The lower face id wins
        let side = fragments[0]
            .sides
            .iter()
            .position(|s| s.seam == Seam::Edge(shared))
            .unwrap();
        for point in fragments[0].side_points(side) {
            assert_eq!(point.z, 0.0);
        }

        let again = seal_fragments(&graph, &mut fragments, 1e-6);
        assert_eq!(again.max_deviation, 0.0);
    }

    #[test]
    fn test_crease_normals_stay_per_face() {
        let mut graph = strip();
        let shared = graph.find_edge(graph.vertex_ids()[1], graph.vertex_ids()[4]).unwrap();
        graph.set_edge_tag(shared, EdgeTag::Crease);
        let faces = graph.face_ids();
        let key = SampleKey::Edge(shared, PARAM_UNITS / 2);
        assert_eq!(normal_scope(&graph, key, faces[0]), Some(faces[0]));
        assert_eq!(normal_scope(&graph, key, faces[1]), Some(faces[1]));
    }
}
