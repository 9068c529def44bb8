//! Numerical primitives used by the interpolators.
//!
//! The interpolators treat these as black boxes:
//!
//! - an [`InterpolationKernel`] provides the weighted-surface and
//!   weighted-volume solvers and builds [`WeightMap`]s,
//! - [`landsea`] convolves water values over land,
//! - [`stagger`] moves fields between C-grid staggerings,
//! - [`rotate`] turns vector pairs by a per-cell angle.
//!
//! [`GaussianKernel`] is the default solver.

pub mod gaussian;
pub mod landsea;
pub mod rotate;
pub mod stagger;
pub mod weights;

use std::borrow::Cow;

use ndarray::{Array2, Array3, ArrayView2, ArrayView3};
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use gaussian::GaussianKernel;
pub use landsea::{fill_land_2d, fill_land_3d};
pub use rotate::rotate;
pub use stagger::{rho_to_u, rho_to_v, u_to_rho, v_to_rho};
pub use weights::WeightMap;

/// Value a kernel writes where it cannot produce an estimate.
pub const NO_ESTIMATE: f64 = 1.0e37;

/// Parameters of the spatial weighting kernel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KernelParams {
    /// Number of source points blended per destination point.
    pub kernel_width: usize,
    /// Decorrelation length along x, in source grid cells.
    pub decorrelation_x: f64,
    /// Decorrelation length along y, in source grid cells.
    pub decorrelation_y: f64,
}

/// Horizontal coordinates of one staggering of a grid.
#[derive(Debug, Clone, Copy)]
pub struct Coords<'a> {
    pub lon: ArrayView2<'a, f64>,
    pub lat: ArrayView2<'a, f64>,
}

impl<'a> Coords<'a> {
    pub fn new(lon: ArrayView2<'a, f64>, lat: ArrayView2<'a, f64>) -> Self {
        Self { lon, lat }
    }

    /// Horizontal extents (rows, cols).
    pub fn dim(&self) -> (usize, usize) {
        self.lon.dim()
    }
}

/// Weighted-surface and weighted-volume interpolation between two grids.
///
/// Implementations must be pure: the same inputs give bit-identical outputs,
/// whichever thread calls them.
pub trait InterpolationKernel: Send + Sync {
    /// Interpolate a 2-D field from `src` onto `dst`.
    ///
    /// With `weights = None` the weight map is computed and returned owned;
    /// otherwise the given map is used and returned borrowed. Non-finite
    /// input values never contribute. Points with no estimate are set to
    /// [`NO_ESTIMATE`].
    fn surface<'w>(
        &self,
        src: Coords<'_>,
        field: ArrayView2<'_, f64>,
        dst: Coords<'_>,
        weights: Option<&'w WeightMap>,
        params: &KernelParams,
    ) -> Result<(Array2<f64>, Cow<'w, WeightMap>)>;

    /// Interpolate a 3-D field from `src` onto `dst`.
    ///
    /// `src_depth` and `field` are level × row × column with levels in
    /// ascending depth-axis order (deepest first). `dst_depth` may be in
    /// either order. Points with no estimate are set to [`NO_ESTIMATE`].
    #[allow(clippy::too_many_arguments)]
    fn volume(
        &self,
        src: Coords<'_>,
        src_depth: ArrayView3<'_, f64>,
        field: ArrayView3<'_, f64>,
        dst: Coords<'_>,
        dst_depth: ArrayView3<'_, f64>,
        weights: &WeightMap,
        params: &KernelParams,
    ) -> Result<Array3<f64>>;
}
