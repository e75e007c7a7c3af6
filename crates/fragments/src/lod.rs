//! Level of detail by subsampling.
//!
//! Coarser levels keep every `2^k`-th sample of a fragment, so one
//! evaluation pass serves a whole LOD chain and sealed seams stay sealed.

use tracing::debug;

use crate::types::{Fragment, FragmentSet};

impl Fragment {
    /// Fragment with every `2^level`-th sample, or `None` if the grid is too
    /// coarse for that level.
    pub fn lod(&self, level: u32) -> Option<Fragment> {
        let step = 1usize.checked_shl(level)?;
        if self.side < 2 || (self.side - 1) % step != 0 {
            return None;
        }
        let side = (self.side - 1) / step + 1;
        let indices: Vec<usize> = (0..side * side)
            .map(|k| self.index((k % side) * step, (k / side) * step))
            .collect();

        Some(Fragment {
            face: self.face,
            corner: self.corner,
            side,
            points: indices.iter().map(|&i| self.points[i]).collect(),
            normals: indices.iter().map(|&i| self.normals[i]).collect(),
            texture_coordinates: self
                .texture_coordinates
                .as_ref()
                .map(|uv| indices.iter().map(|&i| uv[i]).collect()),
            color: self.color,
            sides: self.sides,
            exact: self.exact,
        })
    }
}

impl FragmentSet {
    /// Every fragment at `level`, or `None` if any fragment is too coarse.
    pub fn lod(&self, level: u32) -> Option<FragmentSet> {
        if level > self.density {
            return None;
        }
        let fragments = self
            .fragments
            .iter()
            .map(|f| f.lod(level))
            .collect::<Option<Vec<_>>>()?;
        debug!(
            "Subsampled {} fragments from density {} to {}",
            fragments.len(),
            self.density,
            self.density - level
        );
        Some(FragmentSet::new(self.density - level, fragments))
    }

    /// Coarsest level every fragment supports
    pub fn max_lod(&self) -> u32 {
        self.fragments
            .iter()
            .map(|f| (f.side.max(2) - 1).trailing_zeros())
            .min()
            .unwrap_or(0)
    }

    /// Sets for levels `0..=max_lod()`, finest first
    pub fn lod_chain(&self) -> Vec<FragmentSet> {
        (0..=self.max_lod()).filter_map(|level| self.lod(level)).collect()
    }
}
