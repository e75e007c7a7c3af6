//! Catmull-Clark subdivision rules.
//!
//! The functions here are the point formulas themselves, free of any graph.
//! [`points`] applies them to components of a [`ControlNetGraph`] with saved
//! results, and [`refine`] builds the next level of a graph.
//!
//! [`ControlNetGraph`]: crate::graph::ControlNetGraph

pub mod points;
pub mod refine;

pub use refine::{EdgeChildren, FaceChildren, RefinementMap};

use glam::DVec3;

/// Face point: mean of the corners
pub fn face_point(corners: &[DVec3]) -> DVec3 {
    corners.iter().sum::<DVec3>() / corners.len() as f64
}

/// Crease edge point: midpoint of the ends
pub fn crease_edge_point(a: DVec3, b: DVec3) -> DVec3 {
    0.5 * (a + b)
}

/// Smooth edge point.
///
/// `weight_a` is the share of `a` in the vertex half of the mask: the
/// sector coefficient when `a` is the tagged end, `1 - w` when `b` is, and
/// 1/2 otherwise.
pub fn smooth_edge_point(a: DVec3, b: DVec3, weight_a: f64, f0: DVec3, f1: DVec3) -> DVec3 {
    0.5 * (weight_a * a + (1.0 - weight_a) * b) + 0.25 * (f0 + f1)
}

/// `(1-s)·smooth + s·sharp`
pub fn sharp_blend(smooth: DVec3, sharp: DVec3, s: f64) -> DVec3 {
    if s <= 0.0 {
        smooth
    } else if s >= 1.0 {
        sharp
    } else {
        (1.0 - s) * smooth + s * sharp
    }
}

/// Vertex point of a smooth or dart vertex with arbitrary faces.
///
/// `neighbors` are the far ends of the `n` incident edges and `face_points`
/// the face points of the `n` incident faces.
pub fn smooth_vertex_point(p: DVec3, neighbors: &[DVec3], face_points: &[DVec3]) -> DVec3 {
    let n = neighbors.len() as f64;
    let edge_sum: DVec3 = neighbors.iter().sum();
    let face_sum: DVec3 = face_points.iter().sum();
    (n - 2.0) / n * p + (edge_sum + face_sum) / (n * n)
}

/// Vertex point of a smooth or dart vertex whose faces are all quads.
///
/// `diagonals` are the corners opposite the vertex in each quad.
pub fn quad_vertex_point(p: DVec3, neighbors: &[DVec3], diagonals: &[DVec3]) -> DVec3 {
    let n = neighbors.len() as f64;
    let edge_mean = neighbors.iter().sum::<DVec3>() / n;
    let diagonal_mean = diagonals.iter().sum::<DVec3>() / diagonals.len() as f64;
    (n - 1.75) / n * p + 1.5 / n * edge_mean + 0.25 / n * diagonal_mean
}

/// Vertex point on a crease: `(6P + A0 + A1)/8`
pub fn crease_vertex_point(p: DVec3, a0: DVec3, a1: DVec3) -> DVec3 {
    (6.0 * p + a0 + a1) / 8.0
}
