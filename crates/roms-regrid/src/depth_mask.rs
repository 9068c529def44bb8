//! Masking of destination levels deeper than the source column.

use ndarray::{Array2, Array3, Axis};

use crate::error::{RegridError, Result};
use crate::kernel::WeightMap;
use crate::types::Masked3;

/// Deepest finite depth of every column; `+inf` where a column has none.
pub fn column_floor(depth: &Array3<f64>) -> Array2<f64> {
    depth.fold_axis(Axis(0), f64::INFINITY, |&acc, &d| {
        if d.is_finite() {
            acc.min(d)
        } else {
            acc
        }
    })
}

/// Carry a source floor onto destination points through a weight map.
///
/// Points the map cannot resolve get NaN, which never masks anything.
pub fn regrid_floor(floor: &Array2<f64>, weights: &WeightMap) -> Array2<f64> {
    let src_cols = floor.ncols();
    let (rows, cols) = weights.destination_shape();
    Array2::from_shape_fn((rows, cols), |(r, c)| {
        weights
            .blend(r * cols + c, |s| floor[[s / src_cols, s % src_cols]])
            .unwrap_or(f64::NAN)
    })
}

/// Mask every cell whose destination depth lies below `floor` of its column.
///
/// Returns the number of cells newly masked.
pub fn mask_below_floor(
    field: &mut Masked3,
    floor: &Array2<f64>,
    dst_depth: &Array3<f64>,
) -> Result<usize> {
    if field.shape() != dst_depth.shape() {
        return Err(RegridError::shape_mismatch(dst_depth.shape(), field.shape()));
    }
    if floor.shape() != &dst_depth.shape()[1..] {
        return Err(RegridError::shape_mismatch(&dst_depth.shape()[1..], floor.shape()));
    }

    let mut masked = 0;
    for ((k, r, c), m) in field.mask.indexed_iter_mut() {
        if !*m && dst_depth[[k, r, c]] < floor[[r, c]] {
            *m = true;
            masked += 1;
        }
    }
    Ok(masked)
}

/// Mask every destination level that lies below the deepest source level of
/// the same column.
///
/// Depths are negative below the surface, so level `k` of a column is masked
/// when `dst_depth[k]` is smaller than the column minimum of `src_depth`.
/// Non-finite source depths are ignored; a column without any finite source
/// depth is left alone. Source and destination must share horizontal extents.
///
/// Returns the number of cells newly masked.
pub fn mask_below_source_depth(
    field: &mut Masked3,
    src_depth: &Array3<f64>,
    dst_depth: &Array3<f64>,
) -> Result<usize> {
    if src_depth.shape()[1..] != dst_depth.shape()[1..] {
        return Err(RegridError::shape_mismatch(
            &dst_depth.shape()[1..],
            &src_depth.shape()[1..],
        ));
    }
    mask_below_floor(field, &column_floor(src_depth), dst_depth)
}
