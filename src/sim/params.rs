// params.rs - Solver constants
//
// `dt_mult` friction substeps are folded into one tick: flow decays by
// (1 - friction)^dt_mult and the gravity increment is weighted by the
// geometric series sum of that decay.

use serde::{Deserialize, Serialize};

use crate::error::ParamsError;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimParams {
    /// Cell spacing.
    pub dx: f32,
    pub dt_base: f32,
    /// Friction substeps per tick.
    pub dt_mult: u32,
    /// Inflow per source voxel per unit time.
    pub source_rate: f32,
    pub g: f32,
    /// Linear friction per substep, in (0, 1).
    pub friction: f32,
    /// Floor for depth denominators.
    pub epsilon: f32,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            dx: 1.0,
            dt_base: 0.1,
            dt_mult: 5,
            source_rate: 0.2,
            g: 0.1,
            friction: 0.1,
            epsilon: 0.001,
        }
    }
}

impl SimParams {
    /// Parse from JSON; missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, ParamsError> {
        let params: Self = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), ParamsError> {
        if !(self.dx > 0.0) {
            return Err(ParamsError::Invalid("dx must be positive"));
        }
        if !(self.dt_base > 0.0) {
            return Err(ParamsError::Invalid("dt_base must be positive"));
        }
        if self.dt_mult == 0 {
            return Err(ParamsError::Invalid("dt_mult must be at least 1"));
        }
        if !(self.friction > 0.0 && self.friction < 1.0) {
            return Err(ParamsError::Invalid("friction must be in (0, 1)"));
        }
        if !(self.epsilon > 0.0) {
            return Err(ParamsError::Invalid("epsilon must be positive"));
        }
        if !self.g.is_finite() || !self.source_rate.is_finite() {
            return Err(ParamsError::Invalid("g and source_rate must be finite"));
        }
        Ok(())
    }

    pub fn coefficients(&self) -> Coefficients {
        let dt = self.dt_base * self.dt_mult as f32;
        let friction_decay = (1.0 - self.friction).powi(self.dt_mult as i32);
        Coefficients {
            dt,
            friction_decay,
            coeff_const: (1.0 - friction_decay) / self.friction,
            dx2_by_dt: self.dx * self.dx / dt,
        }
    }
}

/// Per-run values derived once from [`SimParams`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Coefficients {
    /// Effective tick length, `dt_base * dt_mult`.
    pub dt: f32,
    pub friction_decay: f32,
    pub coeff_const: f32,
    /// Converts depth to a flow-rate equivalent.
    pub dx2_by_dt: f32,
}
