//! 3-D interpolation between vertical coordinate systems.
//!
//! The volume kernel interpolates linearly within each source column and
//! has nothing to offer outside it. To keep destination levels near the
//! surface and seabed resolvable, every source column is bracketed by two
//! synthetic levels: one [`BOTTOM_OFFSET`] below the deepest level and one
//! [`SURFACE_OFFSET`] above the shallowest, clipped at [`SURFACE_LEVEL`].
//! The synthetic levels carry the adjacent real level scaled by `scale`.
//!
//! Before that, masked cells directly below valid cells inherit the value
//! above them (scaled), so the synthetic data never starts from land.
//!
//! Depths are negative below the surface. Each depth cube may be ordered
//! bottom first or surface first; the kernel always receives bottom first.

use ndarray::{s, Array3, ArrayViewMut2, Axis, Zip};
use tracing::trace;

use super::{mask_unresolved, stack_levels, InterpContext};
use crate::error::{RegridError, Result};
use crate::grid::GridPoints;
use crate::kernel::{fill_land_3d, WeightMap};
use crate::types::Masked3;

/// Depth-axis offset of the synthetic level below the seabed.
pub const BOTTOM_OFFSET: f64 = 500.0;

/// Depth-axis offset of the synthetic level above the top level.
pub const SURFACE_OFFSET: f64 = 50.0;

/// The synthetic top level never rises above this depth.
pub const SURFACE_LEVEL: f64 = 0.0;

/// Level ordering of a depth cube.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthOrder {
    /// Level 0 is the deepest.
    BottomFirst,
    /// Level 0 is the shallowest.
    SurfaceFirst,
}

impl DepthOrder {
    /// Compare the first and last level at one interior column.
    ///
    /// Only that column is inspected; cubes whose columns disagree are not
    /// detected.
    pub fn detect(depth: &Array3<f64>) -> Self {
        let (levels, rows, cols) = depth.dim();
        if levels < 2 || rows == 0 || cols == 0 {
            return Self::BottomFirst;
        }
        let (r, c) = ((rows - 1).min(1), (cols - 1).min(1));
        if depth[[0, r, c]] - depth[[levels - 1, r, c]] > 0.0 {
            Self::SurfaceFirst
        } else {
            Self::BottomFirst
        }
    }
}

/// Depth cube with the two synthetic levels added, in the same order.
pub fn synthesize_boundary_levels(depth: &Array3<f64>, order: DepthOrder) -> Array3<f64> {
    let (levels, rows, cols) = depth.dim();
    let mut out = Array3::zeros((levels + 2, rows, cols));
    out.slice_mut(s![1..levels + 1, .., ..]).assign(depth);
    if levels == 0 {
        return out;
    }

    let first = depth.index_axis(Axis(0), 0);
    let last = depth.index_axis(Axis(0), levels - 1);
    let below = |d: f64| d - BOTTOM_OFFSET;
    let above = |d: f64| (d + SURFACE_OFFSET).min(SURFACE_LEVEL);

    let (head, tail) = match order {
        DepthOrder::BottomFirst => (first.mapv(below), last.mapv(above)),
        DepthOrder::SurfaceFirst => (first.mapv(above), last.mapv(below)),
    };
    out.index_axis_mut(Axis(0), 0).assign(&head);
    out.index_axis_mut(Axis(0), levels + 1).assign(&tail);
    out
}

/// Fill cells masked at one level but valid at the next shallower level with
/// that value times `scale`, working from the surface down.
///
/// Returns the number of cells filled. Columns that are masked throughout
/// stay masked.
pub fn propagate_validity(field: &mut Masked3, order: DepthOrder, scale: f64) -> usize {
    let levels = field.data.len_of(Axis(0));
    if levels < 2 {
        return 0;
    }

    // (target, shallower neighbour) pairs, surface first.
    let steps: Vec<(usize, usize)> = match order {
        DepthOrder::BottomFirst => (0..levels - 1).rev().map(|k| (k, k + 1)).collect(),
        DepthOrder::SurfaceFirst => (1..levels).map(|k| (k, k - 1)).collect(),
    };

    let mut filled = 0;
    for (k, from) in steps {
        let (data_from, mut data_to) = pick_levels(&mut field.data, from, k);
        let (mask_from, mut mask_to) = pick_levels(&mut field.mask, from, k);
        Zip::from(&mut data_to)
            .and(&mut mask_to)
            .and(&data_from)
            .and(&mask_from)
            .for_each(|d, m, &src, &src_masked| {
                if *m && !src_masked {
                    *d = src * scale;
                    *m = false;
                    filled += 1;
                }
            });
    }
    filled
}

/// Split out level `from` (read) and level `to` (write) of a cube.
fn pick_levels<T>(
    cube: &mut Array3<T>,
    from: usize,
    to: usize,
) -> (ArrayViewMut2<'_, T>, ArrayViewMut2<'_, T>) {
    let (a, b) = cube.view_mut().split_at(Axis(0), from.max(to));
    if from < to {
        (a.index_axis_move(Axis(0), from), b.index_axis_move(Axis(0), 0))
    } else {
        (b.index_axis_move(Axis(0), 0), a.index_axis_move(Axis(0), to))
    }
}

/// Data cube with synthetic levels: the outermost levels repeat their
/// neighbours times `scale`. Masked cells become NaN.
pub fn pad_boundary_data(field: &Masked3, scale: f64) -> Array3<f64> {
    let (levels, rows, cols) = field.data.dim();
    let filled = field.filled(f64::NAN);
    let mut out = Array3::from_elem((levels + 2, rows, cols), f64::NAN);
    if levels == 0 {
        return out;
    }
    out.slice_mut(s![1..levels + 1, .., ..]).assign(&filled);
    out.index_axis_mut(Axis(0), 0)
        .assign(&filled.index_axis(Axis(0), 0).mapv(|v| v * scale));
    out.index_axis_mut(Axis(0), levels + 1)
        .assign(&filled.index_axis(Axis(0), levels - 1).mapv(|v| v * scale));
    out
}

/// Interpolate one 3-D slice from `src` to `dst` points.
///
/// `scale` damps the values carried into masked and synthetic levels (1.0
/// for tracers, [`VELOCITY_SCALE`](super::VELOCITY_SCALE) for velocity).
pub fn interpolate_3d(
    ctx: &InterpContext<'_>,
    src: &GridPoints,
    field: &Masked3,
    dst: &GridPoints,
    weights: &WeightMap,
    scale: f64,
) -> Result<Masked3> {
    let src_depth = src.depth()?;
    let dst_depth = dst.depth()?;
    if field.shape() != src_depth.shape() {
        return Err(RegridError::shape_mismatch(src_depth.shape(), field.shape()));
    }
    if field.data.len_of(Axis(0)) == 0 {
        return Err(RegridError::missing_input("source columns have no levels"));
    }

    let order = DepthOrder::detect(src_depth);
    let mut field = field.clone();
    field.mask_where(&stack_levels(&src.land(), src_depth.len_of(Axis(0))));

    let propagated = propagate_validity(&mut field, order, scale);
    let filled = fill_land_3d(&mut field, ctx.land_fill_kernel);
    trace!(?order, propagated, filled, "Prepared source column data");

    let depth = synthesize_boundary_levels(src_depth, order);
    let data = pad_boundary_data(&field, scale);

    let result = match order {
        DepthOrder::BottomFirst => ctx.kernel.volume(
            src.coords(),
            depth.view(),
            data.view(),
            dst.coords(),
            dst_depth.view(),
            weights,
            &ctx.params,
        )?,
        DepthOrder::SurfaceFirst => ctx.kernel.volume(
            src.coords(),
            depth.slice(s![..;-1, .., ..]),
            data.slice(s![..;-1, .., ..]),
            dst.coords(),
            dst_depth.view(),
            weights,
            &ctx.params,
        )?,
    };

    let land = stack_levels(&dst.land(), dst_depth.len_of(Axis(0)));
    Ok(mask_unresolved(result, &land))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::{GaussianKernel, KernelParams};
    use crate::testdata;

    fn column(values: &[f64]) -> Array3<f64> {
        Array3::from_shape_vec((values.len(), 1, 1), values.to_vec()).unwrap()
    }

    #[test]
    fn test_detect_order() {
        assert_eq!(DepthOrder::detect(&column(&[-500.0, -50.0, -5.0])), DepthOrder::BottomFirst);
        assert_eq!(DepthOrder::detect(&column(&[-5.0, -50.0, -500.0])), DepthOrder::SurfaceFirst);
        assert_eq!(DepthOrder::detect(&column(&[-5.0])), DepthOrder::BottomFirst);
    }

    #[test]
    fn test_synthetic_levels_outside_source_range() {
        for (depths, order) in [
            ([-500.0, -50.0, -5.0], DepthOrder::BottomFirst),
            ([-5.0, -50.0, -500.0], DepthOrder::SurfaceFirst),
        ] {
            let depth = column(&depths);
            let out = synthesize_boundary_levels(&depth, order);
            let (lo, hi) = (-500.0, -5.0);
            let synthetic = [out[[0, 0, 0]], out[[4, 0, 0]]];
            assert!(synthetic.iter().any(|&d| d < lo));
            assert!(synthetic.iter().any(|&d| d > hi && d <= SURFACE_LEVEL));
            assert_eq!(out.slice(s![1..4, 0, 0]).to_vec(), depths.to_vec());
        }
    }

    #[test]
    fn test_surface_clip() {
        let out = synthesize_boundary_levels(&column(&[-100.0, -20.0]), DepthOrder::BottomFirst);
        assert_eq!(out[[0, 0, 0]], -600.0);
        assert_eq!(out[[3, 0, 0]], 0.0);
    }

    #[test]
    fn test_propagate_bottom_first_fills_downward() {
        let mut field = Masked3::from_filled(column(&[f64::NAN, f64::NAN, 4.0]));
        let filled = propagate_validity(&mut field, DepthOrder::BottomFirst, 0.5);
        assert_eq!(filled, 2);
        assert_eq!(field.data.as_slice().unwrap(), &[1.0, 2.0, 4.0]);
        assert_eq!(field.valid_count(), 3);
    }

    #[test]
    fn test_propagate_surface_first_fills_downward() {
        let mut field = Masked3::from_filled(column(&[4.0, f64::NAN, f64::NAN]));
        propagate_validity(&mut field, DepthOrder::SurfaceFirst, 1.0);
        assert_eq!(field.data.as_slice().unwrap(), &[4.0, 4.0, 4.0]);
    }

    #[test]
    fn test_propagate_all_masked_column() {
        let mut field = Masked3::from_filled(column(&[f64::NAN, f64::NAN]));
        assert_eq!(propagate_validity(&mut field, DepthOrder::BottomFirst, 1.0), 0);
        assert_eq!(field.valid_count(), 0);
    }

    #[test]
    fn test_pad_boundary_data() {
        let field = Masked3::from_filled(column(&[2.0, f64::NAN, 8.0]));
        let out = pad_boundary_data(&field, 0.1);
        assert_eq!(out.len_of(Axis(0)), 5);
        assert!((out[[0, 0, 0]] - 0.2).abs() < 1e-12);
        assert!(out[[2, 0, 0]].is_nan());
        assert!((out[[4, 0, 0]] - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_direction_invariance() {
        let kernel = GaussianKernel;
        let ctx = InterpContext::new(
            &kernel,
            KernelParams {
                kernel_width: 4,
                decorrelation_x: 1.0,
                decorrelation_y: 1.0,
            },
            7,
        );
        let bottom_first = [-500.0, -50.0, -5.0];
        let values = [1.0, 5.0, 20.0];
        let targets = [-2.0, -20.0, -300.0, -700.0];

        let src_up = testdata::column_points(3, 3, &bottom_first);
        let reversed: Vec<f64> = bottom_first.iter().rev().copied().collect();
        let src_down = testdata::column_points(3, 3, &reversed);
        let dst = testdata::column_points(3, 3, &targets);
        let weights = kernel
            .compute_weights(src_up.coords(), dst.coords(), &ctx.params)
            .unwrap();

        let field_up = testdata::layered_field(3, 3, &values);
        let rev_values: Vec<f64> = values.iter().rev().copied().collect();
        let field_down = testdata::layered_field(3, 3, &rev_values);

        let a = interpolate_3d(&ctx, &src_up, &field_up, &dst, &weights, 1.0).unwrap();
        let b = interpolate_3d(&ctx, &src_down, &field_down, &dst, &weights, 1.0).unwrap();

        assert_eq!(a.mask, b.mask);
        for (x, y) in a.data.iter().zip(b.data.iter()) {
            assert!((x - y).abs() < 1e-12);
        }
        // -2 lies between the last real level and the clipped surface level.
        assert!(!a.is_masked([0, 1, 1]));
        assert!((a.data[[0, 1, 1]] - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_requires_depths() {
        let kernel = GaussianKernel;
        let ctx = InterpContext::new(
            &kernel,
            KernelParams {
                kernel_width: 4,
                decorrelation_x: 1.0,
                decorrelation_y: 1.0,
            },
            7,
        );
        let src = testdata::points(2, 2);
        let dst = testdata::column_points(2, 2, &[-1.0]);
        let weights = WeightMap::new((2, 2), (2, 2));
        let field = testdata::layered_field(2, 2, &[1.0]);

        assert!(matches!(
            interpolate_3d(&ctx, &src, &field, &dst, &weights, 1.0),
            Err(RegridError::MissingInput(_))
        ));
    }
}
