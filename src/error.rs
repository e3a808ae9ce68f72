// error.rs - Error types
//
// LoadError is recoverable: a failed scene switch leaves the running
// simulation untouched. GridError marks a broken shape contract and hosts
// treat it as fatal.

use thiserror::Error;

/// Scene fetch or parse failure.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("scene '{scene}' unreachable: {reason}")]
    Unreachable { scene: String, reason: String },
    #[error("scene has no voxel data")]
    Empty,
    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },
    #[error("scene has no reference voxels to size the grid")]
    MissingReference,
    #[error("unsupported padding {0} for this border mode")]
    InvalidPadding(usize),
    #[error("scene grid {rows}x{cols} exceeds the cell limit")]
    TooLarge { rows: usize, cols: usize },
}

/// Grid shape contract violation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GridError {
    #[error(
        "patch {patch_rows}x{patch_cols} at ({row}, {col}) exceeds {target_rows}x{target_cols} grid"
    )]
    OutOfBounds {
        row: usize,
        col: usize,
        patch_rows: usize,
        patch_cols: usize,
        target_rows: usize,
        target_cols: usize,
    },
    #[error("{grid} is {actual:?}, expected {expected:?}")]
    DimensionMismatch {
        grid: &'static str,
        expected: (usize, usize),
        actual: (usize, usize),
    },
}

/// Bad solver parameters.
#[derive(Debug, Error)]
pub enum ParamsError {
    #[error("params json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid params: {0}")]
    Invalid(&'static str),
}
