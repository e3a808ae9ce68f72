// patch.rs - Bounded sub-block reads and writes
//
// Every grid update in the stepper goes through here so a bad offset
// surfaces as GridError::OutOfBounds instead of a slice panic.

use ndarray::{ArrayView2, s};

use super::Grid;
use crate::error::GridError;

fn check_bounds(
    target: (usize, usize),
    row: usize,
    col: usize,
    rows: usize,
    cols: usize,
) -> Result<(), GridError> {
    let fits_rows = row.checked_add(rows).is_some_and(|end| end <= target.0);
    let fits_cols = col.checked_add(cols).is_some_and(|end| end <= target.1);
    if fits_rows && fits_cols {
        Ok(())
    } else {
        Err(GridError::OutOfBounds {
            row,
            col,
            patch_rows: rows,
            patch_cols: cols,
            target_rows: target.0,
            target_cols: target.1,
        })
    }
}

/// Copy-on-write patch: returns a new grid equal to `target` with the
/// rectangle at (`row`, `col`) replaced by `patch`.
pub fn write_patch(
    target: &Grid,
    patch: ArrayView2<'_, f32>,
    row: usize,
    col: usize,
) -> Result<Grid, GridError> {
    let mut out = target.clone();
    write_patch_in_place(&mut out, patch, row, col)?;
    Ok(out)
}

/// Same contract as [`write_patch`], mutating `target`.
pub fn write_patch_in_place(
    target: &mut Grid,
    patch: ArrayView2<'_, f32>,
    row: usize,
    col: usize,
) -> Result<(), GridError> {
    let (rows, cols) = patch.dim();
    check_bounds(target.dim(), row, col, rows, cols)?;
    target
        .slice_mut(s![row..row + rows, col..col + cols])
        .assign(&patch);
    Ok(())
}

/// Borrow a `rows` x `cols` window starting at (`row`, `col`).
pub fn read_patch(
    target: &Grid,
    row: usize,
    col: usize,
    rows: usize,
    cols: usize,
) -> Result<ArrayView2<'_, f32>, GridError> {
    check_bounds(target.dim(), row, col, rows, cols)?;
    Ok(target.slice(s![row..row + rows, col..col + cols]))
}

/// Zero `count` full-width rows starting at `row`.
pub fn zero_rows(target: &mut Grid, row: usize, count: usize) -> Result<(), GridError> {
    let cols = target.ncols();
    check_bounds(target.dim(), row, 0, count, cols)?;
    target.slice_mut(s![row..row + count, ..]).fill(0.0);
    Ok(())
}

/// Zero `count` full-height columns starting at `col`.
pub fn zero_cols(target: &mut Grid, col: usize, count: usize) -> Result<(), GridError> {
    let rows = target.nrows();
    check_bounds(target.dim(), 0, col, rows, count)?;
    target.slice_mut(s![.., col..col + count]).fill(0.0);
    Ok(())
}
