/// Largest end sharpness accepted on an edge.
pub const MAXIMUM_SHARPNESS: f64 = 4.0;

/// Amount every end sharpness decreases per subdivision level.
pub const SHARPNESS_STEP: f64 = 1.0;

/// Number of quantization steps for corner sector angles over `[0, 2π]`.
/// Index 0 is reserved for "not a corner", giving 73 distinct values.
pub const CORNER_ANGLE_STEPS: u32 = 72;

/// Sector coefficient stored at an edge end whose vertex is untagged.
pub const IGNORED_SECTOR_COEFFICIENT: f64 = 0.0;

/// Sector coefficient stored before tags have been updated.
pub const UNSET_SECTOR_COEFFICIENT: f64 = -1.0;

/// Weight used at both ends of a smooth edge whose ends are both tagged.
pub const SMOOTHX_END_WEIGHT: f64 = 0.5;

/// Upper bound on the number of faces walked around a single vertex.
pub const MAX_SECTOR_FACES: usize = 1024;

/// Archive magic bytes.
pub const ARCHIVE_MAGIC: [u8; 4] = *b"CNET";

/// Current archive layout version.
pub const ARCHIVE_VERSION: u32 = 1;
