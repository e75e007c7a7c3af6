//! Fragment evaluation.
//!
//! A fragment is evaluated on a [`SampleGrid`]: a square block of vertices
//! of a locally refined copy of the control net. Each refinement step
//! extracts the closed star of the grid vertices, subdivides it once and
//! follows the grid through the refinement map, so the grid doubles in
//! resolution while every vertex keeps exact subdivision values. After `d`
//! steps the grid vertices are pushed to the limit surface.

use controlnet::{ControlNetGraph, FaceId, VertexId, VertexTag};
use crease_config::FragmentConfig;
use glam::{DVec2, DVec3};
use tracing::{debug, info, trace};

use crate::error::FragmentError;
use crate::seal::seal_fragments;
use crate::types::{Fragment, FragmentSet, FragmentSide, Seam};

// ============================================================================
// Sample grid
// ============================================================================

/// Square block of vertices in a locally refined control net
pub(crate) struct SampleGrid {
    graph: ControlNetGraph,
    /// Vertices along one side
    side: usize,
    /// Row-major grid vertices
    vertices: Vec<VertexId>,
    /// Row-major quads between the grid vertices
    cells: Vec<FaceId>,
}

impl SampleGrid {
    /// 2×2 grid over the quad `face` of `graph`, with grid corner (0, 0) at
    /// face corner `first` and the `i` axis along the face's edge `first`.
    pub(crate) fn from_quad(graph: &ControlNetGraph, face: FaceId, first: usize) -> Option<Self> {
        let corners = graph.face_vertices(face)?;
        if corners.len() != 4 {
            return None;
        }
        let corner = |k: usize| corners[(first + k) % 4];
        let region = graph.extract_neighborhood(&corners)?;
        Some(Self {
            graph: region,
            side: 2,
            vertices: vec![corner(0), corner(1), corner(3), corner(2)],
            cells: vec![face],
        })
    }

    #[inline]
    fn vertex(&self, i: usize, j: usize) -> VertexId {
        self.vertices[j * self.side + i]
    }

    #[inline]
    fn cell(&self, i: usize, j: usize) -> FaceId {
        self.cells[j * (self.side - 1) + i]
    }

    /// Subdivide once and follow the grid to the next level.
    pub(crate) fn refine(&self) -> Option<Self> {
        let region = self.graph.extract_neighborhood(&self.vertices)?;
        let (child, map) = region.refine_partial();

        let n = self.side;
        let m = 2 * n - 1;
        let mut vertices = vec![VertexId(0); m * m];
        let mut cells = vec![FaceId(0); (m - 1) * (m - 1)];

        // ===== PHASE 1: VERTEX AND EDGE CHILDREN =====
        for j in 0..n {
            for i in 0..n {
                let v = self.vertex(i, j);
                vertices[2 * j * m + 2 * i] = map.vertex_child(v)?;
                if i + 1 < n {
                    let e = region.find_edge(v, self.vertex(i + 1, j))?;
                    vertices[2 * j * m + 2 * i + 1] = map.edge_children(e)?.midpoint;
                }
                if j + 1 < n {
                    let e = region.find_edge(v, self.vertex(i, j + 1))?;
                    vertices[(2 * j + 1) * m + 2 * i] = map.edge_children(e)?.midpoint;
                }
            }
        }

        // ===== PHASE 2: FACE CHILDREN =====
        for j in 0..n - 1 {
            for i in 0..n - 1 {
                let f = self.cell(i, j);
                vertices[(2 * j + 1) * m + 2 * i + 1] = map.face_children(f)?.center;
                for (di, dj) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                    let corner = region.face_corner(f, self.vertex(i + di, j + dj))?;
                    cells[(2 * j + dj) * (m - 1) + 2 * i + di] = map.corner_quad(f, corner)?;
                }
            }
        }

        trace!("Refined sample grid from {}² to {}²", n, m);
        Some(Self {
            graph: child,
            side: m,
            vertices,
            cells,
        })
    }

    /// Refine `levels` times
    pub(crate) fn refine_levels(self, levels: u32) -> Option<Self> {
        let mut grid = self;
        for _ in 0..levels {
            grid = grid.refine()?;
        }
        Some(grid)
    }

    /// Limit points and normals of every grid vertex, and whether all of
    /// them were exact.
    pub(crate) fn evaluate(&self) -> Option<(Vec<DVec3>, Vec<DVec3>, bool)> {
        let n = self.side;
        let mut points = Vec::with_capacity(n * n);
        let mut normals = Vec::with_capacity(n * n);
        let mut exact = true;
        for j in 0..n {
            for i in 0..n {
                let cell = self.cell(i.min(n - 2), j.min(n - 2));
                let surface = self
                    .graph
                    .vertex_surface_point(self.vertex(i, j), Some(cell))?;
                let normal = if surface.normal == DVec3::ZERO {
                    self.graph.face_normal(cell).unwrap_or(DVec3::ZERO)
                } else {
                    surface.normal
                };
                points.push(surface.point);
                normals.push(normal);
                exact &= surface.exact;
            }
        }
        Some((points, normals, exact))
    }
}

// ============================================================================
// Fragment generation
// ============================================================================

fn check_config(config: &FragmentConfig) -> Result<(), FragmentError> {
    if config.density > config.max_density {
        return Err(FragmentError::DensityOutOfRange {
            density: config.density,
            max: config.max_density,
        });
    }
    config.validate()?;
    Ok(())
}

/// Unsealed fragments of one face: a single fragment for a quad, one
/// fragment per corner otherwise.
pub fn generate_face_fragments(
    graph: &ControlNetGraph,
    face: FaceId,
    config: &FragmentConfig,
) -> Result<Vec<Fragment>, FragmentError> {
    check_config(config)?;
    let fx = graph.face(face).ok_or(FragmentError::MissingFace(face))?;
    let n = fx.edge_count();
    if n < 3 {
        return Err(FragmentError::DegenerateFace(face));
    }
    if graph
        .face_vertices(face)
        .ok_or(FragmentError::MissingFace(face))?
        .iter()
        .any(|&v| graph.vertex(v).is_none_or(|vx| vx.tag() == VertexTag::Unset))
    {
        // Unset tags cannot be evaluated
        return Err(FragmentError::Evaluation(face));
    }

    let fragments = if n == 4 {
        vec![quad_fragment(graph, face, config)?]
    } else {
        corner_fragments(graph, face, n, config)?
    };
    trace!("Generated {} fragment(s) for face {:?}", fragments.len(), face);
    Ok(fragments)
}

fn quad_fragment(
    graph: &ControlNetGraph,
    face: FaceId,
    config: &FragmentConfig,
) -> Result<Fragment, FragmentError> {
    let grid = SampleGrid::from_quad(graph, face, 0)
        .and_then(|grid| grid.refine_levels(config.density))
        .ok_or(FragmentError::Refinement(face))?;
    let (points, normals, exact) = grid.evaluate().ok_or(FragmentError::Evaluation(face))?;

    let fx = graph.face(face).ok_or(FragmentError::MissingFace(face))?;
    let sides = std::array::from_fn(|k| FragmentSide {
        seam: Seam::Edge(fx.edges()[k].edge),
        reversed: fx.edges()[k].reversed,
    });

    let mut fragment = Fragment {
        face,
        corner: None,
        side: grid.side,
        points,
        normals,
        texture_coordinates: None,
        color: None,
        sides,
        exact,
    };
    decorate(graph, &mut fragment, config, |uv| uv);
    Ok(fragment)
}

fn corner_fragments(
    graph: &ControlNetGraph,
    face: FaceId,
    n: usize,
    config: &FragmentConfig,
) -> Result<Vec<Fragment>, FragmentError> {
    let fx = graph.face(face).ok_or(FragmentError::MissingFace(face))?;
    let corners = graph
        .face_vertices(face)
        .ok_or(FragmentError::MissingFace(face))?;
    let region = graph
        .extract_neighborhood(&corners)
        .ok_or(FragmentError::Refinement(face))?;
    let (level1, map) = region.refine_partial();
    let levels = config.density.saturating_sub(1);

    let mut fragments = Vec::with_capacity(n);
    for i in 0..n {
        let prev = (i + n - 1) % n;
        let out_ptr = fx.edges()[i];
        let in_ptr = fx.edges()[prev];

        // The child quad at corner i starts at the child of corner i
        let grid = map
            .corner_quad(face, i)
            .and_then(|quad| SampleGrid::from_quad(&level1, quad, 0))
            .and_then(|grid| grid.refine_levels(levels))
            .ok_or(FragmentError::Refinement(face))?;
        let (points, normals, exact) = grid.evaluate().ok_or(FragmentError::Evaluation(face))?;

        let sides = [
            FragmentSide {
                seam: Seam::EdgeHalf(out_ptr.edge, u8::from(out_ptr.reversed)),
                reversed: out_ptr.reversed,
            },
            FragmentSide {
                seam: Seam::Spoke(face, i as u32),
                reversed: false,
            },
            FragmentSide {
                seam: Seam::Spoke(face, prev as u32),
                reversed: true,
            },
            FragmentSide {
                seam: Seam::EdgeHalf(in_ptr.edge, u8::from(!in_ptr.reversed)),
                reversed: in_ptr.reversed,
            },
        ];

        let mut fragment = Fragment {
            face,
            corner: Some(i as u32),
            side: grid.side,
            points,
            normals,
            texture_coordinates: None,
            color: None,
            sides,
            exact,
        };
        let slot = i as f64;
        decorate(graph, &mut fragment, config, |uv| {
            DVec2::new((slot + uv.x) / n as f64, uv.y)
        });
        fragments.push(fragment);
    }
    Ok(fragments)
}

/// Attach texture coordinates and colors from the face overrides.
///
/// `layout` places the fragment's unit square inside the face's unit square.
fn decorate(
    graph: &ControlNetGraph,
    fragment: &mut Fragment,
    config: &FragmentConfig,
    layout: impl Fn(DVec2) -> DVec2,
) {
    let Some(fx) = graph.face(fragment.face) else {
        return;
    };
    let overrides = fx.overrides();
    if config.texture_coordinates {
        let last = (fragment.side - 1) as f64;
        let side = fragment.side;
        let coordinates = (0..side * side)
            .map(|k| {
                let local = DVec2::new((k % side) as f64 / last, (k / side) as f64 / last);
                let uv = layout(local);
                match overrides.pack_rect {
                    Some(rect) => rect.map(uv),
                    None => uv,
                }
            })
            .collect();
        fragment.texture_coordinates = Some(coordinates);
    }
    if config.colors {
        fragment.color = overrides.color;
    }
}

/// Sealed fragments for every face in `faces`.
///
/// Faces are evaluated independently, then shared boundary samples are
/// sealed in face order.
pub fn generate_fragments(
    graph: &ControlNetGraph,
    faces: impl IntoIterator<Item = FaceId>,
    config: &FragmentConfig,
) -> Result<FragmentSet, FragmentError> {
    check_config(config)?;
    let mut fragments = Vec::new();
    let mut face_count = 0usize;
    for face in faces {
        fragments.extend(generate_face_fragments(graph, face, config)?);
        face_count += 1;
    }

    let mut set = FragmentSet::new(config.density, fragments);
    let report = seal_fragments(graph, &mut set.fragments, config.seal_tolerance);
    info!(
        "Generated {} fragments for {} faces at density {} ({} shared samples, {} mismatches)",
        set.len(),
        face_count,
        config.density,
        report.shared_samples,
        report.mismatches
    );
    Ok(set)
}

/// Sealed fragments for every face of the graph
pub fn generate_all_fragments(
    graph: &ControlNetGraph,
    config: &FragmentConfig,
) -> Result<FragmentSet, FragmentError> {
    debug!("Generating fragments for all {} faces", graph.face_count());
    generate_fragments(graph, graph.face_ids(), config)
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn flat_grid(n: usize) -> ControlNetGraph {
        let w = n + 1;
        let points: Vec<DVec3> = (0..w * w)
            .map(|k| DVec3::new((k % w) as f64, (k / w) as f64, 0.0))
            .collect();
        let mut polygons = Vec::new();
        for j in 0..n {
            for i in 0..n {
                let a = j * w + i;
                polygons.push(vec![a, a + 1, a + 1 + w, a + w]);
            }
        }
        ControlNetGraph::from_polygons(&points, &polygons).unwrap()
    }

    /// Quads around a central pentagon
    fn pentagon() -> (ControlNetGraph, FaceId) {
        let mut points = Vec::new();
        for i in 0..5 {
            let a = std::f64::consts::TAU * i as f64 / 5.0;
            points.push(DVec3::new(a.cos(), a.sin(), 0.0));
        }
        for i in 0..5 {
            let a = std::f64::consts::TAU * i as f64 / 5.0;
            points.push(DVec3::new(2.0 * a.cos(), 2.0 * a.sin(), 0.0));
        }
        let mut polygons = vec![vec![0, 1, 2, 3, 4]];
        for i in 0..5 {
            let next = (i + 1) % 5;
            polygons.push(vec![i, i + 5, next + 5, next]);
        }
        let graph = ControlNetGraph::from_polygons(&points, &polygons).unwrap();
        let center = graph.face_ids()[0];
        (graph, center)
    }

    #[test]
    fn test_grid_refinement_sizes() {
        let graph = flat_grid(3);
        let face = graph.face_ids()[4];
        let grid = SampleGrid::from_quad(&graph, face, 0).unwrap();
        let grid = grid.refine_levels(2).unwrap();
        assert_eq!(grid.side, 5);
        assert_eq!(grid.vertices.len(), 25);
        assert_eq!(grid.cells.len(), 16);
    }

    #[test]
    fn test_quad_fragment_on_flat_grid() {
        let graph = flat_grid(3);
        let face = graph.face_ids()[4];
        let fragments = generate_face_fragments(&graph, face, &FragmentConfig::with_density(2)).unwrap();
        assert_eq!(fragments.len(), 1);
        let fragment = &fragments[0];
        assert_eq!(fragment.side, 5);
        assert!(fragment.exact);

        // The interior of a flat regular grid reproduces the plane
        let corners = graph.face_points(face).unwrap();
        for k in 0..fragment.points.len() {
            assert_abs_diff_eq!(fragment.points[k].z, 0.0, epsilon = 1e-12);
            assert_abs_diff_eq!(fragment.normals[k].z.abs(), 1.0, epsilon = 1e-9);
        }
        // Bilinear parameterization of a regular interior quad
        let mid = fragment.point(2, 2);
        let centroid = corners.iter().sum::<DVec3>() / 4.0;
        assert_abs_diff_eq!(mid.x, centroid.x, epsilon = 1e-12);
        assert_abs_diff_eq!(mid.y, centroid.y, epsilon = 1e-12);
    }

    #[test]
    fn test_quad_fragment_corners_are_vertex_limits() {
        let graph = flat_grid(2);
        let face = graph.face_ids()[0];
        let fragment = &generate_face_fragments(&graph, face, &FragmentConfig::with_density(1)).unwrap()[0];
        let corners = graph.face_vertices(face).unwrap();
        let last = fragment.side - 1;
        let samples = [
            fragment.point(0, 0),
            fragment.point(last, 0),
            fragment.point(last, last),
            fragment.point(0, last),
        ];
        for (v, sample) in corners.iter().zip(samples) {
            let limit = graph.vertex_surface_point(*v, Some(face)).unwrap().point;
            assert_abs_diff_eq!(sample.distance(limit), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_pentagon_corner_fragments() {
        let (graph, face) = pentagon();
        let fragments = generate_face_fragments(&graph, face, &FragmentConfig::with_density(2)).unwrap();
        assert_eq!(fragments.len(), 5);
        for (i, fragment) in fragments.iter().enumerate() {
            assert_eq!(fragment.corner, Some(i as u32));
            assert_eq!(fragment.side, 3);
        }

        // Every corner fragment meets the others at the face center
        let center = fragments[0].point(2, 2);
        for fragment in &fragments {
            assert_abs_diff_eq!(fragment.point(2, 2).distance(center), 0.0, epsilon = 1e-12);
        }
        let limit = graph.face_center_surface_point(face).unwrap().point;
        assert_abs_diff_eq!(center.distance(limit), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_texture_coordinates_span_unit_square() {
        let graph = flat_grid(1);
        let face = graph.face_ids()[0];
        let fragment = &generate_face_fragments(&graph, face, &FragmentConfig::with_density(1)).unwrap()[0];
        let uv = fragment.texture_coordinates.as_ref().unwrap();
        assert_eq!(uv[0], DVec2::ZERO);
        assert_eq!(uv[uv.len() - 1], DVec2::ONE);
    }

    #[test]
    fn test_density_out_of_range() {
        let graph = flat_grid(1);
        let face = graph.face_ids()[0];
        let mut config = FragmentConfig::with_density(5);
        config.max_density = 4;
        assert!(matches!(
            generate_face_fragments(&graph, face, &config),
            Err(FragmentError::DensityOutOfRange { density: 5, max: 4 })
        ));
    }

    #[test]
    fn test_missing_face() {
        let graph = flat_grid(1);
        assert!(matches!(
            generate_face_fragments(&graph, FaceId(99), &FragmentConfig::default()),
            Err(FragmentError::MissingFace(FaceId(99)))
        ));
    }
}
