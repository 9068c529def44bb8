//! Conversion between C-grid staggerings.
//!
//! Face values are averaged onto centers and back. A point is masked only when
//! both of the values it averages are masked; otherwise the valid one is used.

use ndarray::{Array3, Axis};

use crate::types::Masked3;

/// Average adjacent entries along `axis`, giving one fewer entry on that axis.
fn average_pairs(field: &Masked3, axis: Axis) -> Masked3 {
    let mut shape = field.data.raw_dim();
    shape[axis.index()] = shape[axis.index()].saturating_sub(1);
    let mut data = Array3::zeros(shape);
    let mut mask = Array3::from_elem(shape, true);

    for ((k, r, c), out) in data.indexed_iter_mut() {
        let a = [k, r, c];
        let mut b = a;
        b[axis.index()] += 1;

        let mut sum = 0.0;
        let mut count = 0;
        for idx in [a, b] {
            if !field.mask[idx] {
                sum += field.data[idx];
                count += 1;
            }
        }
        if count > 0 {
            *out = sum / count as f64;
            mask[[k, r, c]] = false;
        }
    }

    Masked3 { data, mask }
}

/// Average centers onto faces, then replicate the outermost faces so the
/// result has one more entry along `axis`.
fn faces_to_centers(field: &Masked3, axis: Axis) -> Masked3 {
    let faces = field.data.len_of(axis);
    let mut shape = field.data.raw_dim();
    shape[axis.index()] += 1;

    let mut data = Array3::zeros(shape);
    let mut mask = Array3::from_elem(shape, true);
    if faces == 0 {
        return Masked3 { data, mask };
    }

    // With a single face there is nothing to average; replicate it.
    let inner = if faces > 1 {
        average_pairs(field, axis)
    } else {
        field.clone()
    };
    let len = inner.data.len_of(axis);

    for ((k, r, c), out) in data.indexed_iter_mut() {
        let mut src = [k, r, c];
        // Interior center j sits between faces j-1 and j; edges copy their neighbour.
        let j = src[axis.index()];
        src[axis.index()] = if faces > 1 {
            j.saturating_sub(1).min(len - 1)
        } else {
            0
        };
        *out = inner.data[src];
        mask[[k, r, c]] = inner.mask[src];
    }

    Masked3 { data, mask }
}

/// Move a u-face field (columns − 1) to rho points.
pub fn u_to_rho(u: &Masked3) -> Masked3 {
    faces_to_centers(u, Axis(2))
}

/// Move a v-face field (rows − 1) to rho points.
pub fn v_to_rho(v: &Masked3) -> Masked3 {
    faces_to_centers(v, Axis(1))
}

/// Move a rho field to u-faces (columns − 1).
pub fn rho_to_u(rho: &Masked3) -> Masked3 {
    average_pairs(rho, Axis(2))
}

/// Move a rho field to v-faces (rows − 1).
pub fn rho_to_v(rho: &Masked3) -> Masked3 {
    average_pairs(rho, Axis(1))
}
