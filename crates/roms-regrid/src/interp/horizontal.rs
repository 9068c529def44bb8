//! 2-D interpolation.

use tracing::trace;

use super::{mask_unresolved, InterpContext};
use crate::error::{RegridError, Result};
use crate::grid::GridPoints;
use crate::kernel::{fill_land_2d, WeightMap};
use crate::types::Masked2;

/// Interpolate one 2-D slice from `src` to `dst` points.
///
/// Source land is masked and then filled from nearby water so the kernel
/// never blends land values. The result is masked over destination land and
/// wherever the kernel produced no estimate.
pub fn interpolate_2d(
    ctx: &InterpContext<'_>,
    src: &GridPoints,
    field: &Masked2,
    dst: &GridPoints,
    weights: &WeightMap,
) -> Result<Masked2> {
    if field.data.dim() != src.dim() {
        return Err(RegridError::shape_mismatch(src.lon.shape(), field.shape()));
    }

    let mut field = field.clone();
    field.mask_where(&src.land());
    let filled = fill_land_2d(&mut field, ctx.land_fill_kernel);
    trace!(filled, "Filled land cells");

    let (data, _) = ctx.kernel.surface(
        src.coords(),
        field.filled(f64::NAN).view(),
        dst.coords(),
        Some(weights),
        &ctx.params,
    )?;

    Ok(mask_unresolved(data, &dst.land()))
}
