//! Interpolation of field slices between grids.
//!
//! Every interpolator is a pure function of its inputs: grids, one masked
//! slice and a read-only weight map. Cells the kernel could not resolve are
//! masked, never reported as errors.

pub mod horizontal;
pub mod vector;
pub mod vertical;

use ndarray::{Array, Array2, Array3, Dimension, Zip};

use crate::kernel::{InterpolationKernel, KernelParams};
use crate::types::Masked;

pub use horizontal::interpolate_2d;
pub use vector::{depth_average, interpolate_vector, restagger, VELOCITY_SCALE};
pub use vertical::{interpolate_3d, DepthOrder};

/// Magnitude above which a kernel result is treated as unresolved.
pub const UNRESOLVED_THRESHOLD: f64 = 9.0e10;

/// Kernel and settings shared by all interpolation tasks of a run.
#[derive(Clone, Copy)]
pub struct InterpContext<'a> {
    pub kernel: &'a dyn InterpolationKernel,
    pub params: KernelParams,
    /// Window of the land/sea fill pre-pass.
    pub land_fill_kernel: usize,
}

impl<'a> InterpContext<'a> {
    pub fn new(kernel: &'a dyn InterpolationKernel, params: KernelParams, land_fill_kernel: usize) -> Self {
        Self {
            kernel,
            params,
            land_fill_kernel,
        }
    }
}

impl std::fmt::Debug for InterpContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterpContext")
            .field("params", &self.params)
            .field("land_fill_kernel", &self.land_fill_kernel)
            .finish()
    }
}

/// Mask land and unresolved (non-finite or above threshold) cells.
pub(crate) fn mask_unresolved<D: Dimension>(data: Array<f64, D>, land: &Array<bool, D>) -> Masked<D> {
    let mask = Zip::from(&data)
        .and(land)
        .map_collect(|&v, &l| l || !v.is_finite() || v.abs() > UNRESOLVED_THRESHOLD);
    Masked { data, mask }
}

/// Repeat a 2-D mask over `levels` levels.
pub(crate) fn stack_levels(mask: &Array2<bool>, levels: usize) -> Array3<bool> {
    let (rows, cols) = mask.dim();
    Array3::from_shape_fn((levels, rows, cols), |(_, r, c)| mask[[r, c]])
}
