// stepper.rs - One tick of the staggered-grid pipe model
//
// Stage order per tick:
//   1. inject source inflow
//   2. gravity + boost update of interior X faces, then Y faces
//   3. overdraft mitigation (per-cell outflow scale)
//   4. move water by flux divergence
//   5. drain the outer ring
//
// Face ownership: positive flow on a face belongs to the lower-index cell,
// negative flow to the higher-index cell. Only the owner's scale touches it.

use super::params::{Coefficients, SimParams};
use crate::error::GridError;
use crate::world::patch::{read_patch, write_patch_in_place, zero_cols, zero_rows};
use crate::world::{Grid, GridState};

/// Outflow denominator floor in the overdraft scale.
const MIN_OUTFLOW: f32 = 0.001;

/// Per-tick buffers, resized only when the grid shape changes.
#[derive(Default)]
struct Scratch {
    surface: Grid,
    interior_x: Grid,
    interior_y: Grid,
    scale: Grid,
    low: Grid,
    high: Grid,
}

impl Scratch {
    fn fit(&mut self, m: usize, n: usize) {
        if self.surface.dim() == (m, n) {
            return;
        }
        self.surface = Grid::zeros((m, n));
        self.interior_x = Grid::zeros((m.saturating_sub(1), n));
        self.interior_y = Grid::zeros((m, n.saturating_sub(1)));
        self.scale = Grid::zeros((m, n));
        self.low = Grid::zeros((m, n));
        self.high = Grid::zeros((m, n));
    }
}

pub struct FlowStepper {
    params: SimParams,
    coeffs: Coefficients,
    scratch: Scratch,
}

impl FlowStepper {
    pub fn new(params: SimParams) -> Self {
        Self {
            coeffs: params.coefficients(),
            params,
            scratch: Scratch::default(),
        }
    }

    pub fn params(&self) -> &SimParams { &self.params }
    pub fn coefficients(&self) -> &Coefficients { &self.coeffs }

    /// Advance `state` by exactly one tick.
    pub fn step(&mut self, state: &mut GridState) -> Result<(), GridError> {
        state.validate()?;
        self.inject_sources(state);
        // Face passes leave water untouched; one surface serves both.
        self.prepare_surface(state);
        self.flow_x_pass(state)?;
        self.flow_y_pass(state)?;
        self.limit_outflow(state)?;
        self.apply_divergence(state);
        self.drain_boundary(state)?;
        state.advance_tick();
        Ok(())
    }

    /// `water += dt * source * source_rate`
    pub fn inject_sources(&mut self, state: &mut GridState) {
        let rate = self.coeffs.dt * self.params.source_rate;
        let grids = state.grids_mut();
        grids.water.scaled_add(rate, grids.source);
    }

    /// Gravity-driven update of the interior X faces (rows 1..M-1).
    pub fn update_flow_x(&mut self, state: &mut GridState) -> Result<(), GridError> {
        self.prepare_surface(state);
        self.flow_x_pass(state)
    }

    /// Mirror of [`Self::update_flow_x`] for the interior Y faces.
    pub fn update_flow_y(&mut self, state: &mut GridState) -> Result<(), GridError> {
        self.prepare_surface(state);
        self.flow_y_pass(state)
    }

    /// Size the scratch buffers and fill `surface = terrain + water`.
    fn prepare_surface(&mut self, state: &GridState) {
        let (m, n) = state.dim();
        self.scratch.fit(m, n);
        compute_surface(&mut self.scratch.surface, state.terrain(), state.water());
    }

    fn flow_x_pass(&mut self, state: &mut GridState) -> Result<(), GridError> {
        let (m, n) = state.dim();
        let SimParams { dx, g, epsilon, .. } = self.params;
        let Coefficients { friction_decay, coeff_const, .. } = self.coeffs;

        let grids = state.grids_mut();
        let fx = &*grids.flow_x;
        let water = &*grids.water;
        let surface = &self.scratch.surface;
        let next = &mut self.scratch.interior_x;

        // Face r sits between cells r-1 and r.
        for r in 1..m {
            for j in 0..n {
                let f = fx[[r, j]];
                let against = positive(-sign(f)) * -fx[[r + 1, j]] / water[[r, j]].max(epsilon);
                let along = positive(sign(f)) * fx[[r - 1, j]] / water[[r - 1, j]].max(epsilon);
                let boost = (against.max(along) / dx).min(1.0).exp();
                let inc = (surface[[r - 1, j]] - surface[[r, j]]) * g * dx;
                next[[r - 1, j]] = f * friction_decay + boost * coeff_const * inc;
            }
        }

        write_patch_in_place(grids.flow_x, next.view(), 1, 0)
    }

    fn flow_y_pass(&mut self, state: &mut GridState) -> Result<(), GridError> {
        let (m, n) = state.dim();
        let SimParams { dx, g, epsilon, .. } = self.params;
        let Coefficients { friction_decay, coeff_const, .. } = self.coeffs;

        let grids = state.grids_mut();
        let fy = &*grids.flow_y;
        let water = &*grids.water;
        let surface = &self.scratch.surface;
        let next = &mut self.scratch.interior_y;

        for i in 0..m {
            for c in 1..n {
                let f = fy[[i, c]];
                let against = positive(-sign(f)) * -fy[[i, c + 1]] / water[[i, c]].max(epsilon);
                let along = positive(sign(f)) * fy[[i, c - 1]] / water[[i, c - 1]].max(epsilon);
                let boost = (against.max(along) / dx).min(1.0).exp();
                let inc = (surface[[i, c - 1]] - surface[[i, c]]) * g * dx;
                next[[i, c - 1]] = f * friction_decay + boost * coeff_const * inc;
            }
        }

        write_patch_in_place(grids.flow_y, next.view(), 0, 1)
    }

    /// Overdraft mitigation: scale every cell's outgoing faces so one tick
    /// cannot drain more than the cell holds.
    pub fn limit_outflow(&mut self, state: &mut GridState) -> Result<(), GridError> {
        let (m, n) = state.dim();
        self.scratch.fit(m, n);
        let dx2_by_dt = self.coeffs.dx2_by_dt;
        let grids = state.grids_mut();

        // All scales settle before any face is rewritten.
        {
            let (fx, fy, water) = (&*grids.flow_x, &*grids.flow_y, &*grids.water);
            let scale = &mut self.scratch.scale;
            for i in 0..m {
                for j in 0..n {
                    let out = outflow(fx, fy, i, j);
                    scale[[i, j]] = if out == 0.0 {
                        1.0
                    } else {
                        (water[[i, j]] * dx2_by_dt / out.max(MIN_OUTFLOW)).min(1.0)
                    };
                }
            }
        }

        let scale = &self.scratch.scale;
        let (low, high) = (&mut self.scratch.low, &mut self.scratch.high);

        // X: face i is cell i's low side, face i+1 its high side.
        {
            let fx = &*grids.flow_x;
            for i in 0..m {
                for j in 0..n {
                    low[[i, j]] = owned_if(fx[[i, j]] < 0.0, fx[[i, j]], scale[[i, j]]);
                    high[[i, j]] = owned_if(fx[[i + 1, j]] > 0.0, fx[[i + 1, j]], scale[[i, j]]);
                }
            }
        }
        write_patch_in_place(grids.flow_x, low.view(), 0, 0)?;
        zero_rows(grids.flow_x, m, 1)?;
        *high += &read_patch(grids.flow_x, 1, 0, m, n)?;
        write_patch_in_place(grids.flow_x, high.view(), 1, 0)?;
        zero_rows(grids.flow_x, 0, 1)?;
        zero_rows(grids.flow_x, m, 1)?;

        // Y: same with columns.
        {
            let fy = &*grids.flow_y;
            for i in 0..m {
                for j in 0..n {
                    low[[i, j]] = owned_if(fy[[i, j]] < 0.0, fy[[i, j]], scale[[i, j]]);
                    high[[i, j]] = owned_if(fy[[i, j + 1]] > 0.0, fy[[i, j + 1]], scale[[i, j]]);
                }
            }
        }
        write_patch_in_place(grids.flow_y, low.view(), 0, 0)?;
        zero_cols(grids.flow_y, n, 1)?;
        *high += &read_patch(grids.flow_y, 0, 1, m, n)?;
        write_patch_in_place(grids.flow_y, high.view(), 0, 1)?;
        zero_cols(grids.flow_y, 0, 1)?;
        zero_cols(grids.flow_y, n, 1)
    }

    /// `water += (in - out) / (dx^2 / dt)` from the four faces of each cell.
    pub fn apply_divergence(&mut self, state: &mut GridState) {
        let (m, n) = state.dim();
        let dx2_by_dt = self.coeffs.dx2_by_dt;
        let grids = state.grids_mut();
        let (fx, fy) = (&*grids.flow_x, &*grids.flow_y);

        for i in 0..m {
            for j in 0..n {
                let net = fx[[i, j]] + fy[[i, j]] - fx[[i + 1, j]] - fy[[i, j + 1]];
                grids.water[[i, j]] += net / dx2_by_dt;
            }
        }
    }

    /// Zero the outermost ring of water.
    pub fn drain_boundary(&mut self, state: &mut GridState) -> Result<(), GridError> {
        let (m, n) = state.dim();
        if m == 0 || n == 0 {
            return Ok(());
        }
        let water = state.grids_mut().water;
        zero_rows(water, 0, 1)?;
        zero_rows(water, m - 1, 1)?;
        zero_cols(water, 0, 1)?;
        zero_cols(water, n - 1, 1)
    }
}

fn compute_surface(surface: &mut Grid, terrain: &Grid, water: &Grid) {
    surface.assign(terrain);
    *surface += water;
}

/// Sum of the positive (leaving) components over a cell's four faces.
#[inline]
fn outflow(fx: &Grid, fy: &Grid, i: usize, j: usize) -> f32 {
    positive(-fx[[i, j]]) + positive(fx[[i + 1, j]]) + positive(-fy[[i, j]]) + positive(fy[[i, j + 1]])
}

#[inline]
fn owned_if(owned: bool, flow: f32, scale: f32) -> f32 {
    if owned { flow * scale } else { 0.0 }
}

#[inline]
fn positive(v: f32) -> f32 {
    v.max(0.0)
}

/// Sign with `sign(0) == 0`, unlike `f32::signum`.
#[inline]
fn sign(v: f32) -> f32 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}
