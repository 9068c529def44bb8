//! Velocity pairs.
//!
//! Components are brought to rho points, rotated from grid-relative to
//! east/north, interpolated as independent 3-D fields and rotated into the
//! destination grid's frame. Grid angles follow the ROMS sign convention, so
//! the destination rotation uses the negated angle.

use ndarray::{s, Array2, Array3, ArrayView1};

use super::{interpolate_3d, InterpContext};
use crate::error::{RegridError, Result};
use crate::grid::Grid;
use crate::kernel::{rho_to_u, rho_to_v, rotate, u_to_rho, v_to_rho, WeightMap};
use crate::types::{Masked2, Masked3};

/// Damping applied to velocity values carried into masked and synthetic levels.
pub const VELOCITY_SCALE: f64 = 0.1;

/// Regrid a velocity pair onto the destination rho points.
///
/// `weights` is the rho weight map. Face-staggered inputs (u and v of
/// different shapes) are averaged onto rho points first.
pub fn interpolate_vector(
    ctx: &InterpContext<'_>,
    source: &Grid,
    u: &Masked3,
    v: &Masked3,
    destination: &Grid,
    weights: &WeightMap,
) -> Result<(Masked3, Masked3)> {
    let (mut u, mut v) = if u.shape() != v.shape() {
        (u_to_rho(u), v_to_rho(v))
    } else {
        (u.clone(), v.clone())
    };

    if let Some(angle) = source.angle() {
        rotate(&mut u, &mut v, angle)?;
    }

    let (src, dst) = (source.rho(), destination.rho());
    let mut u = interpolate_3d(ctx, src, &u, dst, weights, VELOCITY_SCALE)?;
    let mut v = interpolate_3d(ctx, src, &v, dst, weights, VELOCITY_SCALE)?;

    if let Some(angle) = destination.angle() {
        rotate(&mut u, &mut v, &angle.mapv(|a| -a))?;
    }

    Ok((u, v))
}

/// Move rho-point components onto the destination's u/v faces when it is a
/// staggered grid; otherwise return them unchanged.
pub fn restagger(u: Masked3, v: Masked3, destination: &Grid) -> (Masked3, Masked3) {
    if destination.is_staggered() {
        (rho_to_u(&u), rho_to_v(&v))
    } else {
        (u, v)
    }
}

/// Thickness-weighted vertical mean over valid cells.
///
/// Layer interfaces sit midway between levels; the outer layers extend by
/// half the adjacent spacing. A single level has unit thickness. Columns with
/// no valid cell are masked.
pub fn depth_average(field: &Masked3, depth: &Array3<f64>) -> Result<Masked2> {
    if field.shape() != depth.shape() {
        return Err(RegridError::shape_mismatch(depth.shape(), field.shape()));
    }
    let (levels, rows, cols) = depth.dim();
    let mut data = Array2::zeros((rows, cols));
    let mut mask = Array2::from_elem((rows, cols), true);

    for r in 0..rows {
        for c in 0..cols {
            let column = depth.slice(s![.., r, c]);
            let mut sum = 0.0;
            let mut total = 0.0;
            for k in (0..levels).filter(|&k| !field.mask[[k, r, c]]) {
                let dz = layer_thickness(column, k);
                sum += field.data[[k, r, c]] * dz;
                total += dz;
            }
            if total > 0.0 {
                data[[r, c]] = sum / total;
                mask[[r, c]] = false;
            }
        }
    }

    Ok(Masked2 { data, mask })
}

fn layer_thickness(column: ArrayView1<'_, f64>, k: usize) -> f64 {
    let n = column.len();
    if n == 1 {
        return 1.0;
    }
    let z = |i: usize| column[i];
    let upper = if k + 1 < n {
        0.5 * (z(k) + z(k + 1))
    } else {
        z(k) + 0.5 * (z(k) - z(k - 1))
    };
    let lower = if k > 0 {
        0.5 * (z(k - 1) + z(k))
    } else {
        z(k) - 0.5 * (z(k + 1) - z(k))
    };
    (upper - lower).abs()
}
