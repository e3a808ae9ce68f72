// grid.rs - Live simulation grids
//
// One GridState per loaded scene. Terrain and source are frozen at load;
// water and the two staggered flow grids change every tick. Switching
// scenes builds a fresh GridState rather than resizing this one.

use ndarray::Array2;

use super::Grid;
use crate::error::GridError;
use crate::scene::LoadedScene;

/// The five grids of one simulation instance, all sized from M x N.
#[derive(Clone, Debug)]
pub struct GridState {
    terrain: Grid,
    water: Grid,
    source: Grid,
    flow_x: Grid,
    flow_y: Grid,
    tick: u64,
}

/// Disjoint borrows handed to the stepper for one tick.
pub(crate) struct GridsMut<'a> {
    pub terrain: &'a Grid,
    pub source: &'a Grid,
    pub water: &'a mut Grid,
    pub flow_x: &'a mut Grid,
    pub flow_y: &'a mut Grid,
}

impl GridState {
    pub fn new(scene: LoadedScene) -> Self {
        let (terrain, water, source) = scene.into_grids();
        Self::with_zero_flow(terrain, water, source)
    }

    /// Build from raw grids, checking that all three share one shape.
    pub fn from_parts(terrain: Grid, water: Grid, source: Grid) -> Result<Self, GridError> {
        let dim = terrain.dim();
        expect_dim("water", dim, water.dim())?;
        expect_dim("source", dim, source.dim())?;
        Ok(Self::with_zero_flow(terrain, water, source))
    }

    fn with_zero_flow(terrain: Grid, water: Grid, source: Grid) -> Self {
        let (m, n) = terrain.dim();
        Self {
            terrain,
            water,
            source,
            flow_x: Array2::zeros((m + 1, n)),
            flow_y: Array2::zeros((m, n + 1)),
            tick: 0,
        }
    }

    /// Replace both flow grids, e.g. to resume from carried momentum.
    pub fn with_flows(mut self, flow_x: Grid, flow_y: Grid) -> Result<Self, GridError> {
        let (m, n) = self.dim();
        expect_dim("flow_x", (m + 1, n), flow_x.dim())?;
        expect_dim("flow_y", (m, n + 1), flow_y.dim())?;
        self.flow_x = flow_x;
        self.flow_y = flow_y;
        Ok(self)
    }

    /// Re-check every grid against the terrain shape.
    pub fn validate(&self) -> Result<(), GridError> {
        let (m, n) = self.dim();
        expect_dim("water", (m, n), self.water.dim())?;
        expect_dim("source", (m, n), self.source.dim())?;
        expect_dim("flow_x", (m + 1, n), self.flow_x.dim())?;
        expect_dim("flow_y", (m, n + 1), self.flow_y.dim())
    }

    #[inline]
    pub fn dim(&self) -> (usize, usize) {
        self.terrain.dim()
    }

    pub fn rows(&self) -> usize { self.terrain.nrows() }
    pub fn cols(&self) -> usize { self.terrain.ncols() }
    pub fn tick(&self) -> u64 { self.tick }

    pub fn terrain(&self) -> &Grid { &self.terrain }
    pub fn water(&self) -> &Grid { &self.water }
    pub fn source(&self) -> &Grid { &self.source }
    pub fn flow_x(&self) -> &Grid { &self.flow_x }
    pub fn flow_y(&self) -> &Grid { &self.flow_y }

    /// Sum of water depth over every cell.
    pub fn total_water(&self) -> f32 {
        self.water.sum()
    }

    pub fn max_depth(&self) -> f32 {
        self.water.iter().copied().fold(0.0, f32::max)
    }

    /// Largest flow magnitude on either axis.
    pub fn max_flow(&self) -> f32 {
        self.flow_x
            .iter()
            .chain(self.flow_y.iter())
            .fold(0.0f32, |acc, f| acc.max(f.abs()))
    }

    pub(crate) fn grids_mut(&mut self) -> GridsMut<'_> {
        GridsMut {
            terrain: &self.terrain,
            source: &self.source,
            water: &mut self.water,
            flow_x: &mut self.flow_x,
            flow_y: &mut self.flow_y,
        }
    }

    pub(crate) fn advance_tick(&mut self) {
        self.tick += 1;
    }
}

fn expect_dim(
    grid: &'static str,
    expected: (usize, usize),
    actual: (usize, usize),
) -> Result<(), GridError> {
    if expected == actual {
        Ok(())
    } else {
        Err(GridError::DimensionMismatch { grid, expected, actual })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flow_grids_are_staggered_and_zeroed() {
        let state = GridState::from_parts(
            Array2::zeros((4, 6)),
            Array2::ones((4, 6)),
            Array2::zeros((4, 6)),
        )
        .unwrap();

        assert_eq!(state.flow_x().dim(), (5, 6));
        assert_eq!(state.flow_y().dim(), (4, 7));
        assert!(state.flow_x().iter().all(|&f| f == 0.0));
        assert!(state.flow_y().iter().all(|&f| f == 0.0));
        assert_eq!(state.tick(), 0);
        assert_eq!(state.total_water(), 24.0);
        assert!(state.validate().is_ok());
    }

    #[test]
    fn mismatched_parts_are_rejected() {
        let err = GridState::from_parts(
            Array2::zeros((3, 3)),
            Array2::zeros((3, 4)),
            Array2::zeros((3, 3)),
        )
        .unwrap_err();

        assert_eq!(
            err,
            GridError::DimensionMismatch { grid: "water", expected: (3, 3), actual: (3, 4) }
        );
    }

    #[test]
    fn with_flows_checks_staggered_shape() {
        let state = GridState::from_parts(
            Array2::zeros((2, 3)),
            Array2::zeros((2, 3)),
            Array2::zeros((2, 3)),
        )
        .unwrap();

        assert!(state.clone().with_flows(Array2::zeros((2, 3)), Array2::zeros((2, 4))).is_err());

        let mut fx = Array2::zeros((3, 3));
        fx[[1, 1]] = -2.5;
        let state = state.with_flows(fx, Array2::zeros((2, 4))).unwrap();
        assert_eq!(state.max_flow(), 2.5);
    }
}
