//! Gaussian-weighted nearest-neighbour kernel.
//!
//! Source points are indexed in an R-tree on a local planar projection
//! (longitude scaled by the cosine of the mean source latitude). Each
//! destination point blends its `kernel_width` nearest source points within
//! [`SEARCH_RADII`] decorrelation lengths, weighted by
//! `exp(-(dx/Lx)^2 - (dy/Ly)^2)`.

use std::borrow::Cow;

use ndarray::{s, Array2, Array3, ArrayView1, ArrayView2, ArrayView3, Axis};
use rayon::prelude::*;
use rstar::primitives::GeomWithData;
use rstar::RTree;
use tracing::debug;

use super::{Coords, InterpolationKernel, KernelParams, WeightMap, NO_ESTIMATE};
use crate::error::{RegridError, Result};

/// Search cutoff, in decorrelation lengths.
pub const SEARCH_RADII: f64 = 3.0;

type IndexedPoint = GeomWithData<[f64; 2], usize>;

/// Default [`InterpolationKernel`].
#[derive(Debug, Clone, Copy, Default)]
pub struct GaussianKernel;

impl GaussianKernel {
    pub fn new() -> Self {
        Self
    }

    /// Build the weight map between two horizontal geometries.
    pub fn compute_weights(
        &self,
        src: Coords<'_>,
        dst: Coords<'_>,
        params: &KernelParams,
    ) -> Result<WeightMap> {
        if params.kernel_width == 0 {
            return Err(RegridError::kernel("kernel_width must be > 0"));
        }
        check_coords(&src)?;
        check_coords(&dst)?;

        let cos_lat = reference_cos_lat(src.lat);
        let (xs, ys) = project(src, cos_lat);

        let length_x = decorrelation_cells(params.decorrelation_x)
            * mean_spacing(&xs, &ys, Axis(1))
                .or_else(|| mean_spacing(&xs, &ys, Axis(0)))
                .unwrap_or(1.0);
        let length_y = decorrelation_cells(params.decorrelation_y)
            * mean_spacing(&xs, &ys, Axis(0))
                .or_else(|| mean_spacing(&xs, &ys, Axis(1)))
                .unwrap_or(1.0);
        if !(length_x > 0.0 && length_y > 0.0) {
            return Err(RegridError::kernel(format!(
                "degenerate decorrelation lengths ({}, {})",
                length_x, length_y
            )));
        }
        let radius2 = (SEARCH_RADII * length_x.max(length_y)).powi(2);

        let points: Vec<IndexedPoint> = xs
            .iter()
            .zip(ys.iter())
            .enumerate()
            .filter(|(_, (x, y))| x.is_finite() && y.is_finite())
            .map(|(i, (&x, &y))| GeomWithData::new([x, y], i))
            .collect();
        let tree = RTree::bulk_load(points);

        let queries: Vec<[f64; 2]> = dst
            .lon
            .iter()
            .zip(dst.lat.iter())
            .map(|(&lon, &lat)| [lon * cos_lat, lat])
            .collect();

        let neighbours: Vec<Vec<(usize, f64)>> = queries
            .par_iter()
            .map(|q| {
                if !(q[0].is_finite() && q[1].is_finite()) {
                    return Vec::new();
                }
                tree.nearest_neighbor_iter_with_distance_2(q)
                    .take(params.kernel_width)
                    .take_while(|(_, d2)| *d2 <= radius2)
                    .map(|(p, _)| {
                        let [x, y] = *p.geom();
                        let wx = (x - q[0]) / length_x;
                        let wy = (y - q[1]) / length_y;
                        (p.data, (-(wx * wx) - wy * wy).exp())
                    })
                    .collect()
            })
            .collect();

        let mut map = WeightMap::new(src.dim(), dst.dim());
        for contributions in neighbours {
            map.push_point(contributions);
        }

        debug!(
            source = ?src.dim(),
            destination = ?dst.dim(),
            entries = map.entry_count(),
            length_x,
            length_y,
            "Computed weight map"
        );

        Ok(map)
    }
}

impl InterpolationKernel for GaussianKernel {
    fn surface<'w>(
        &self,
        src: Coords<'_>,
        field: ArrayView2<'_, f64>,
        dst: Coords<'_>,
        weights: Option<&'w WeightMap>,
        params: &KernelParams,
    ) -> Result<(Array2<f64>, Cow<'w, WeightMap>)> {
        if field.dim() != src.dim() {
            let (r, c) = field.dim();
            let (sr, sc) = src.dim();
            return Err(RegridError::shape_mismatch(&[sr, sc], &[r, c]));
        }
        let map = match weights {
            Some(map) => Cow::Borrowed(map),
            None => Cow::Owned(self.compute_weights(src, dst, params)?),
        };
        check_map(&map, src.dim(), dst.dim())?;

        let src_cols = field.ncols();
        let dst_cols = dst.dim().1;
        let out = Array2::from_shape_fn(dst.dim(), |(r, c)| {
            map.blend(r * dst_cols + c, |s| field[[s / src_cols, s % src_cols]])
                .unwrap_or(NO_ESTIMATE)
        });

        Ok((out, map))
    }

    fn volume(
        &self,
        src: Coords<'_>,
        src_depth: ArrayView3<'_, f64>,
        field: ArrayView3<'_, f64>,
        dst: Coords<'_>,
        dst_depth: ArrayView3<'_, f64>,
        weights: &WeightMap,
        _params: &KernelParams,
    ) -> Result<Array3<f64>> {
        if src_depth.dim() != field.dim() {
            return Err(RegridError::shape_mismatch(src_depth.shape(), field.shape()));
        }
        let (_, src_rows, src_cols) = field.dim();
        if (src_rows, src_cols) != src.dim() {
            return Err(RegridError::shape_mismatch(
                &[src.dim().0, src.dim().1],
                &[src_rows, src_cols],
            ));
        }
        let (levels, rows, cols) = dst_depth.dim();
        if (rows, cols) != dst.dim() {
            return Err(RegridError::shape_mismatch(
                &[dst.dim().0, dst.dim().1],
                &[rows, cols],
            ));
        }
        check_map(weights, src.dim(), dst.dim())?;

        let mut out = Array3::from_elem((levels, rows, cols), NO_ESTIMATE);
        for r in 0..rows {
            for c in 0..cols {
                let point = r * cols + c;
                for k in 0..levels {
                    let z = dst_depth[[k, r, c]];
                    if !z.is_finite() {
                        continue;
                    }
                    let value = weights.blend(point, |s| {
                        let (sr, sc) = (s / src_cols, s % src_cols);
                        column_value(
                            src_depth.slice(s![.., sr, sc]),
                            field.slice(s![.., sr, sc]),
                            z,
                        )
                    });
                    if let Some(value) = value {
                        out[[k, r, c]] = value;
                    }
                }
            }
        }

        Ok(out)
    }
}

/// Linear interpolation of one column at depth `z`.
///
/// `depths` must be ascending. Outside the column range the result is NaN.
fn column_value(depths: ArrayView1<'_, f64>, values: ArrayView1<'_, f64>, z: f64) -> f64 {
    let n = depths.len();
    if n == 1 && depths[0] == z {
        return values[0];
    }
    for j in 1..n {
        let (d0, d1) = (depths[j - 1], depths[j]);
        if z < d0 || z > d1 {
            continue;
        }
        if z == d0 {
            return values[j - 1];
        }
        if z == d1 {
            return values[j];
        }
        let t = (z - d0) / (d1 - d0);
        return values[j - 1] + t * (values[j] - values[j - 1]);
    }
    f64::NAN
}

/// Non-positive decorrelation means "one cell".
fn decorrelation_cells(length: f64) -> f64 {
    if length > 0.0 {
        length
    } else {
        1.0
    }
}

fn reference_cos_lat(lat: ArrayView2<'_, f64>) -> f64 {
    let (sum, count) = lat
        .iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, n), &v| (s + v, n + 1));
    if count == 0 {
        return 1.0;
    }
    (sum / count as f64).to_radians().cos()
}

fn project(coords: Coords<'_>, cos_lat: f64) -> (Array2<f64>, Array2<f64>) {
    (coords.lon.mapv(|lon| lon * cos_lat), coords.lat.to_owned())
}

/// Mean distance between neighbouring points along `axis`.
fn mean_spacing(xs: &Array2<f64>, ys: &Array2<f64>, axis: Axis) -> Option<f64> {
    let len = xs.len_of(axis);
    if len < 2 {
        return None;
    }
    let (x0, x1) = (
        xs.slice_axis(axis, (..len - 1).into()),
        xs.slice_axis(axis, (1..).into()),
    );
    let (y0, y1) = (
        ys.slice_axis(axis, (..len - 1).into()),
        ys.slice_axis(axis, (1..).into()),
    );

    let mut sum = 0.0;
    let mut count = 0usize;
    for (((&ax, &bx), &ay), &by) in x0.iter().zip(x1.iter()).zip(y0.iter()).zip(y1.iter()) {
        let d = (bx - ax).hypot(by - ay);
        if d.is_finite() {
            sum += d;
            count += 1;
        }
    }
    if count == 0 || sum <= 0.0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

fn check_coords(coords: &Coords<'_>) -> Result<()> {
    if coords.lon.dim() != coords.lat.dim() {
        return Err(RegridError::shape_mismatch(
            coords.lon.shape(),
            coords.lat.shape(),
        ));
    }
    Ok(())
}

fn check_map(map: &WeightMap, src: (usize, usize), dst: (usize, usize)) -> Result<()> {
    if map.source_shape() != src || map.destination_shape() != dst || !map.is_complete() {
        return Err(RegridError::kernel(format!(
            "weight map {:?} -> {:?} does not fit grids {:?} -> {:?}",
            map.source_shape(),
            map.destination_shape(),
            src,
            dst
        )));
    }
    Ok(())
}
