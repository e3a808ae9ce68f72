// render.rs - Read-only snapshots for the renderer
//
// Output encoding (row-major, one entry per cell):
//   columns  = [base, height] f32 pairs; height 0 hides a dry cell
//   surface  = water + terrain where wet, 0 where dry

use ndarray::Zip;

use crate::world::{Grid, GridState};

/// Water columns are redrawn every this many ticks.
pub const DEFAULT_REDRAW_INTERVAL: u64 = 10;

/// True on ticks where the renderer should pull a fresh snapshot.
#[inline]
pub fn should_redraw(tick: u64, every: u64) -> bool {
    every <= 1 || tick % every == 0
}

/// Wet surface elevation; dry cells (depth <= `threshold`) read 0.
pub fn wet_surface(state: &GridState, threshold: f32) -> Grid {
    let mut out = Grid::zeros(state.dim());
    Zip::from(&mut out)
        .and(state.water())
        .and(state.terrain())
        .for_each(|s, &w, &t| {
            if w > threshold {
                *s = w + t;
            }
        });
    out
}

pub struct Encoder {
    out: Vec<f32>,
    epsilon: f32,
}

impl Encoder {
    pub fn new(epsilon: f32) -> Self {
        Self { out: Vec::new(), epsilon }
    }

    pub fn clear(&mut self) {
        self.out.clear();
    }

    pub fn ptr(&self) -> *const f32 {
        self.out.as_ptr()
    }

    pub fn len(&self) -> usize {
        self.out.len()
    }

    pub fn is_empty(&self) -> bool {
        self.out.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.out
    }

    /// Encode one `[base, height]` pair per cell for instanced drawing.
    pub fn encode_columns(&mut self, state: &GridState) {
        self.out.clear();
        self.out.reserve(state.rows() * state.cols() * 2);
        for (&h, &base) in state.water().iter().zip(state.terrain().iter()) {
            let height = if h < self.epsilon { 0.0 } else { h };
            self.out.push(base);
            self.out.push(height);
        }
    }
}
