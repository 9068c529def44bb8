//! Rotation of horizontal vector fields by a per-cell angle.

use ndarray::{Array2, Axis, Zip};

use crate::error::{RegridError, Result};
use crate::types::Masked3;

/// Rotate `(u, v)` by `-angle` (radians) at every cell, in place.
///
/// Treating the pair as the complex number `u + iv`, the result is
/// `(u + iv) · e^(-i·angle)`:
///
/// ```text
/// u' = u cos(angle) + v sin(angle)
/// v' = v cos(angle) - u sin(angle)
/// ```
///
/// Rotating by `angle` and then by `-angle` restores the original pair. The
/// angle is broadcast over levels and the masks of both components become
/// their union.
///
/// The regridder calls this with the source grid's `angle` before
/// interpolating and with the negated destination `angle` afterwards, so it
/// expects `angle` to carry east-north vectors onto grid axes under this
/// sign. A ROMS `angle` measured counterclockwise from east to the grid
/// x-axis has the opposite sign: pass `-angle` to turn grid-relative
/// components east-north, and `angle` for the reverse.
pub fn rotate(u: &mut Masked3, v: &mut Masked3, angle: &Array2<f64>) -> Result<()> {
    if u.shape() != v.shape() {
        return Err(RegridError::shape_mismatch(u.shape(), v.shape()));
    }
    if u.shape()[1..] != *angle.shape() {
        return Err(RegridError::shape_mismatch(&u.shape()[1..], angle.shape()));
    }

    for (((mut ud, mut vd), mut um), mut vm) in u
        .data
        .axis_iter_mut(Axis(0))
        .zip(v.data.axis_iter_mut(Axis(0)))
        .zip(u.mask.axis_iter_mut(Axis(0)))
        .zip(v.mask.axis_iter_mut(Axis(0)))
    {
        Zip::from(&mut ud)
            .and(&mut vd)
            .and(&mut um)
            .and(&mut vm)
            .and(angle)
            .for_each(|u, v, um, vm, &a| {
                let (sin, cos) = a.sin_cos();
                let (x, y) = (*u, *v);
                *u = x * cos + y * sin;
                *v = y * cos - x * sin;
                let masked = *um || *vm;
                *um = masked;
                *vm = masked;
            });
    }

    Ok(())
}
