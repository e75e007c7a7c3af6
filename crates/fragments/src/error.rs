//! Fragment generation errors.

use controlnet::FaceId;
use crease_config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum FragmentError {
    #[error("Fragment density {density} exceeds the maximum of {max}")]
    DensityOutOfRange { density: u32, max: u32 },

    #[error("Face {0:?} does not exist")]
    MissingFace(FaceId),

    #[error("Face {0:?} has fewer than three corners")]
    DegenerateFace(FaceId),

    #[error("Refinement around face {0:?} lost track of its samples")]
    Refinement(FaceId),

    #[error("Limit surface could not be evaluated on face {0:?}")]
    Evaluation(FaceId),

    #[error("Invalid fragment configuration: {0}")]
    Config(#[from] ConfigError),
}
