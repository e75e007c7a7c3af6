//! Shared configuration for the crease subdivision kernel
//!
//! This crate provides the single source of truth for limit evaluation and
//! tessellation settings shared by the `controlnet` and `fragments` crates.
//! Every value has a named default constant; none of them are magic numbers.

use serde::{Deserialize, Serialize};

/// Default number of local refinement levels tried before a non-standard
/// neighborhood falls back to an approximate subdivision point.
pub const DEFAULT_FALLBACK_LEVELS: u32 = 5;

/// Default singular-value threshold used to detect eigenvector null spaces.
pub const DEFAULT_EIGEN_TOLERANCE: f64 = 1.0e-7;

/// Default fragment density (a quad fragment is a `(2^d+1)×(2^d+1)` grid).
pub const DEFAULT_FRAGMENT_DENSITY: u32 = 3;

/// Largest fragment density accepted by the generator.
pub const MAX_FRAGMENT_DENSITY: u32 = 8;

/// Default distance below which shared fragment samples are considered equal.
pub const DEFAULT_SEAL_TOLERANCE: f64 = 1.0e-6;

/// Errors produced while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Settings for closed-form limit evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Maximum local refinement levels applied to a non-standard ring
    pub fallback_levels: u32,
    /// Singular-value threshold for eigenvector null spaces
    pub eigen_tolerance: f64,
    /// Flip evaluated normals that disagree with the control-net face normals
    pub orient_normals_to_faces: bool,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            fallback_levels: DEFAULT_FALLBACK_LEVELS,
            eigen_tolerance: DEFAULT_EIGEN_TOLERANCE,
            orient_normals_to_faces: true,
        }
    }
}

impl EvaluationConfig {
    /// Check that every value is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.eigen_tolerance > 0.0 && self.eigen_tolerance < 1.0) {
            return Err(ConfigError::InvalidValue {
                field: "evaluation.eigen_tolerance",
                reason: format!("{} is not in (0, 1)", self.eigen_tolerance),
            });
        }
        Ok(())
    }
}

/// Settings for tessellation fragment generation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FragmentConfig {
    /// Requested density `d`
    pub density: u32,
    /// Upper bound for `density`
    pub max_density: u32,
    /// Shared samples further apart than this are reported as seal mismatches
    pub seal_tolerance: f64,
    /// Emit per-sample texture coordinates
    pub texture_coordinates: bool,
    /// Emit per-sample colors from face overrides
    pub colors: bool,
}

impl Default for FragmentConfig {
    fn default() -> Self {
        Self {
            density: DEFAULT_FRAGMENT_DENSITY,
            max_density: MAX_FRAGMENT_DENSITY,
            seal_tolerance: DEFAULT_SEAL_TOLERANCE,
            texture_coordinates: true,
            colors: false,
        }
    }
}

impl FragmentConfig {
    /// Create a fragment config with the given density and default options
    pub fn with_density(density: u32) -> Self {
        Self {
            density,
            ..Default::default()
        }
    }

    /// Number of samples along one side of a quad fragment
    pub fn grid_side(&self) -> usize {
        (1usize << self.density) + 1
    }

    /// Check that every value is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_density > MAX_FRAGMENT_DENSITY {
            return Err(ConfigError::InvalidValue {
                field: "fragments.max_density",
                reason: format!("{} exceeds {}", self.max_density, MAX_FRAGMENT_DENSITY),
            });
        }
        if self.density > self.max_density {
            return Err(ConfigError::InvalidValue {
                field: "fragments.density",
                reason: format!("{} exceeds max_density {}", self.density, self.max_density),
            });
        }
        if !(self.seal_tolerance >= 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "fragments.seal_tolerance",
                reason: format!("{} is negative or NaN", self.seal_tolerance),
            });
        }
        Ok(())
    }
}

/// Complete kernel configuration
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SubdConfig {
    pub evaluation: EvaluationConfig,
    pub fragments: FragmentConfig,
}

impl SubdConfig {
    /// Parse and validate a JSON configuration document.
    ///
    /// Missing fields take their default values.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Validate both sections
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.evaluation.validate()?;
        self.fragments.validate()
    }
}
