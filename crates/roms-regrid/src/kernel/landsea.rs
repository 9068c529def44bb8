//! Land/sea fill: convolve water values over masked (land) cells.
//!
//! The smoothing kernel of the horizontal interpolation pulls in every source
//! point near a destination point. Near the coast some of those are land, so
//! before interpolating, masked cells next to water receive the mean of their
//! valid neighbours. Each pass grows the filled region by one cell; a window
//! of `kernel_size` cells allows `kernel_size / 2` passes, so land further
//! than that from water stays masked.

use ndarray::{Array2, ArrayViewMut2, Axis};

use crate::types::{Masked2, Masked3};

/// Fill masked cells of a 2-D field from neighbouring water.
///
/// Returns the number of cells filled.
pub fn fill_land_2d(field: &mut Masked2, kernel_size: usize) -> usize {
    fill_slab(field.data.view_mut(), field.mask.view_mut(), kernel_size)
}

/// Fill masked cells of every level of a 3-D field independently.
///
/// Returns the number of cells filled across all levels.
pub fn fill_land_3d(field: &mut Masked3, kernel_size: usize) -> usize {
    field
        .data
        .axis_iter_mut(Axis(0))
        .zip(field.mask.axis_iter_mut(Axis(0)))
        .map(|(data, mask)| fill_slab(data, mask, kernel_size))
        .sum()
}

fn fill_slab(
    mut data: ArrayViewMut2<f64>,
    mut mask: ArrayViewMut2<bool>,
    kernel_size: usize,
) -> usize {
    let (rows, cols) = data.dim();
    let passes = kernel_size / 2;
    let mut filled = 0;

    for _ in 0..passes {
        // Jacobi-style: every fill in a pass sees the same previous state.
        let mut updates: Vec<(usize, usize, f64)> = Vec::new();
        for r in 0..rows {
            for c in 0..cols {
                if !mask[[r, c]] {
                    continue;
                }
                let mut sum = 0.0;
                let mut count = 0usize;
                for nr in r.saturating_sub(1)..(r + 2).min(rows) {
                    for nc in c.saturating_sub(1)..(c + 2).min(cols) {
                        if (nr, nc) == (r, c) || mask[[nr, nc]] {
                            continue;
                        }
                        let v = data[[nr, nc]];
                        if v.is_finite() {
                            sum += v;
                            count += 1;
                        }
                    }
                }
                if count > 0 {
                    updates.push((r, c, sum / count as f64));
                }
            }
        }

        if updates.is_empty() {
            break;
        }

        filled += updates.len();
        for (r, c, value) in updates {
            data[[r, c]] = value;
            mask[[r, c]] = false;
        }
    }

    filled
}

/// Land mask as a boolean "invalid" array from a water mask.
pub fn land_from_water(water: &Array2<bool>) -> Array2<bool> {
    water.mapv(|w| !w)
}
