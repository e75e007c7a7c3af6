//! Small control nets shared by unit tests.

use glam::DVec3;

use crate::graph::ControlNetGraph;
use crate::types::EdgeTag;

/// `n × n` grid of unit quads in the z = 0 plane, vertices row by row
pub(crate) fn grid(n: usize) -> ControlNetGraph {
    let mut points = Vec::new();
    for j in 0..=n {
        for i in 0..=n {
            points.push(DVec3::new(i as f64, j as f64, 0.0));
        }
    }
    let w = n + 1;
    let mut polygons = Vec::new();
    for j in 0..n {
        for i in 0..n {
            let a = j * w + i;
            polygons.push(vec![a, a + 1, a + 1 + w, a + w]);
        }
    }
    ControlNetGraph::from_polygons(&points, &polygons).unwrap()
}

/// `k` quads around a center vertex (index 0), with a boundary rim
pub(crate) fn fan(k: usize) -> ControlNetGraph {
    let mut points = vec![DVec3::ZERO];
    for i in 0..k {
        let a = std::f64::consts::TAU * i as f64 / k as f64;
        let b = a + std::f64::consts::PI / k as f64;
        points.push(DVec3::new(a.cos(), a.sin(), 0.0));
        points.push(DVec3::new(2.0 * b.cos(), 2.0 * b.sin(), 0.3));
    }
    let polygons: Vec<Vec<usize>> = (0..k)
        .map(|i| {
            let e = 1 + 2 * i;
            let next = 1 + 2 * ((i + 1) % k);
            vec![0, e, e + 1, next]
        })
        .collect();
    ControlNetGraph::from_polygons(&points, &polygons).unwrap()
}

/// Unit cube with outward-facing quads
pub(crate) fn cube() -> ControlNetGraph {
    let points = vec![
        DVec3::new(0.0, 0.0, 0.0),
        DVec3::new(1.0, 0.0, 0.0),
        DVec3::new(1.0, 1.0, 0.0),
        DVec3::new(0.0, 1.0, 0.0),
        DVec3::new(0.0, 0.0, 1.0),
        DVec3::new(1.0, 0.0, 1.0),
        DVec3::new(1.0, 1.0, 1.0),
        DVec3::new(0.0, 1.0, 1.0),
    ];
    let polygons = vec![
        vec![0, 3, 2, 1],
        vec![4, 5, 6, 7],
        vec![0, 1, 5, 4],
        vec![3, 7, 6, 2],
        vec![0, 4, 7, 3],
        vec![1, 2, 6, 5],
    ];
    ControlNetGraph::from_polygons(&points, &polygons).unwrap()
}

/// Unit cube with every edge tagged Crease, so every vertex is a Corner
pub(crate) fn crease_cube() -> ControlNetGraph {
    let mut graph = cube();
    for e in graph.edge_ids() {
        graph.set_edge_tag(e, EdgeTag::Crease);
    }
    graph.update_all_tags_and_sector_coefficients(false);
    graph
}
