// world/ - Grid storage
//
// Dense row-major grids (row = voxel x, column = voxel y) and the bounded
// patch primitive every update is written through.

mod grid;
pub mod patch;

pub use grid::GridState;

/// A dense 2D field of cell or face values.
pub type Grid = ndarray::Array2<f32>;
