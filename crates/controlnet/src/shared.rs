//! Copy-on-write handle to a control net.

use std::ops::Deref;
use std::sync::Arc;

use tracing::debug;

use crate::graph::ControlNetGraph;

/// Reference-counted graph handle. Clones alias the same graph until one of
/// them asks for mutable access.
#[derive(Debug, Clone, Default)]
pub struct SharedControlNet {
    inner: Arc<ControlNetGraph>,
}

impl SharedControlNet {
    pub fn new(graph: ControlNetGraph) -> Self {
        Self {
            inner: Arc::new(graph),
        }
    }

    /// True when another handle refers to the same graph
    pub fn is_shared(&self) -> bool {
        Arc::strong_count(&self.inner) > 1
    }

    /// True when both handles refer to the same graph
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Copy the graph if another handle refers to it. Returns true when a
    /// copy was made.
    pub fn make_unique_if_shared(&mut self) -> bool {
        if !self.is_shared() {
            return false;
        }
        debug!(
            "Copying shared control net ({} vertices, {} faces)",
            self.inner.vertex_count(),
            self.inner.face_count()
        );
        self.inner = Arc::new(ControlNetGraph::clone(&self.inner));
        true
    }

    /// Mutable access, copying the graph first if it is shared
    pub fn make_mut(&mut self) -> &mut ControlNetGraph {
        self.make_unique_if_shared();
        Arc::make_mut(&mut self.inner)
    }

    /// The graph, copied only if it is still shared
    pub fn into_inner(self) -> ControlNetGraph {
        Arc::unwrap_or_clone(self.inner)
    }
}

impl Deref for SharedControlNet {
    type Target = ControlNetGraph;

    fn deref(&self) -> &ControlNetGraph {
        &self.inner
    }
}

impl From<ControlNetGraph> for SharedControlNet {
    fn from(graph: ControlNetGraph) -> Self {
        Self::new(graph)
    }
}

#[cfg(test)]
mod tests {
    use glam::DVec3;

    use super::*;
    use crate::fixtures::cube;

    #[test]
    fn test_clones_alias_until_mutation() {
        let a = SharedControlNet::new(cube());
        let mut b = a.clone();
        assert!(a.ptr_eq(&b));
        assert!(b.is_shared());

        let v = b.vertex_ids()[0];
        b.make_mut().set_vertex_control_point(v, DVec3::splat(-1.0), false);
        assert!(!a.ptr_eq(&b));
        assert_eq!(a.vertex_point(v), Some(DVec3::ZERO));
        assert_eq!(b.vertex_point(v), Some(DVec3::splat(-1.0)));
    }

    #[test]
    fn test_unique_handle_is_not_copied() {
        let mut a = SharedControlNet::new(cube());
        assert!(!a.make_unique_if_shared());
        let versions = a.versions();
        a.make_mut();
        assert_eq!(a.versions(), versions);
    }

    #[test]
    fn test_copies_diverge_independently() {
        let a = SharedControlNet::new(cube());
        let mut b = a.clone();
        let v = a.vertex_ids()[0];
        a.vertex_subdivision_point(v);

        let before = a.versions();
        b.make_mut().set_vertex_control_point(v, DVec3::ONE, true);
        assert_eq!(a.versions(), before);
        assert!(b.versions().geometry > before.geometry);
    }
}
