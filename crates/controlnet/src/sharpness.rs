//! Variable edge sharpness.
//!
//! A sharp edge is a smooth edge whose subdivision point is blended toward
//! the crease (midpoint) rule. Sharpness is stored per edge end so it can
//! vary linearly along the edge, and it decays by [`SHARPNESS_STEP`] on every
//! subdivision level until the edge is an ordinary smooth edge.

use serde::{Deserialize, Serialize};

use crate::constants::{MAXIMUM_SHARPNESS, SHARPNESS_STEP};

/// End sharpness values of an edge, each in `[0, MAXIMUM_SHARPNESS]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EdgeSharpness {
    ends: [f64; 2],
}

impl EdgeSharpness {
    /// An ordinary (not sharp) edge
    pub const ZERO: Self = Self { ends: [0.0, 0.0] };

    /// Sharpness that makes the edge behave like a crease for one level
    pub const MAXIMUM: Self = Self {
        ends: [MAXIMUM_SHARPNESS, MAXIMUM_SHARPNESS],
    };

    /// Create a sharpness pair. Returns `None` if either value is outside
    /// `[0, MAXIMUM_SHARPNESS]` or not finite.
    pub fn new(end0: f64, end1: f64) -> Option<Self> {
        if Self::is_valid_value(end0) && Self::is_valid_value(end1) {
            Some(Self { ends: [end0, end1] })
        } else {
            None
        }
    }

    /// Same sharpness at both ends
    pub fn constant(value: f64) -> Option<Self> {
        Self::new(value, value)
    }

    fn is_valid_value(value: f64) -> bool {
        value.is_finite() && (0.0..=MAXIMUM_SHARPNESS).contains(&value)
    }

    pub fn end(&self, index: usize) -> f64 {
        self.ends[index & 1]
    }

    pub fn ends(&self) -> [f64; 2] {
        self.ends
    }

    /// Mean of the two end values
    pub fn average(&self) -> f64 {
        0.5 * (self.ends[0] + self.ends[1])
    }

    /// True when either end is positive
    pub fn is_sharp(&self) -> bool {
        self.ends[0] > 0.0 || self.ends[1] > 0.0
    }

    /// True when both ends are at or above the maximum
    pub fn is_maximum(&self) -> bool {
        self.ends[0] >= MAXIMUM_SHARPNESS && self.ends[1] >= MAXIMUM_SHARPNESS
    }

    /// Weight `s` of the crease point in `(1-s)·smooth + s·crease`.
    pub fn blend_factor(&self) -> f64 {
        self.average().clamp(0.0, 1.0)
    }

    /// Sharpness with the ends swapped
    pub fn reversed(&self) -> Self {
        Self {
            ends: [self.ends[1], self.ends[0]],
        }
    }

    /// Sharpness of one child edge after one subdivision level.
    ///
    /// `child` 0 is the half touching end 0, `child` 1 the half touching end 1.
    /// The child keeps the parent's value at its outer end, takes the mean at
    /// the new midpoint, and both ends decay by one step.
    pub fn subdivided(&self, child: usize) -> Self {
        let mid = self.average();
        let ends = if child & 1 == 0 {
            [self.ends[0], mid]
        } else {
            [mid, self.ends[1]]
        };
        Self {
            ends: [decay(ends[0]), decay(ends[1])],
        }
    }
}

fn decay(value: f64) -> f64 {
    (value - SHARPNESS_STEP).max(0.0)
}
