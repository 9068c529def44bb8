//! Terrain-following (s-coordinate) depths.
//!
//! ROMS places level `k` of a water column of depth `h` at
//!
//! ```text
//! Vtransform 1:  z = hc·s + (h − hc)·C
//! Vtransform 2:  z = h · (hc·s + h·C) / (hc + h)
//! ```
//!
//! with the free surface at rest. `s ∈ [-1, 0]` is the nondimensional level
//! position and `C` its stretching curve. Levels are ordered bottom first, so
//! depths are negative and increase with `k`.

use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};

use crate::error::{RegridError, Result};

/// Vertical transformation equation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Vtransform {
    Original,
    Stretched,
}

impl Vtransform {
    /// Map the integer code stored in ROMS files.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::Original),
            2 => Some(Self::Stretched),
            _ => None,
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            Self::Original => 1,
            Self::Stretched => 2,
        }
    }
}

/// Vertical coordinate parameters of a terrain-following grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SCoordinate {
    pub vtransform: Vtransform,
    /// Critical depth.
    pub hc: f64,
    /// Level positions at rho points, bottom first.
    pub s_rho: Vec<f64>,
    /// Stretching curve at rho points, bottom first.
    pub cs_r: Vec<f64>,
}

impl SCoordinate {
    pub fn new(vtransform: Vtransform, hc: f64, s_rho: Vec<f64>, cs_r: Vec<f64>) -> Result<Self> {
        if s_rho.len() != cs_r.len() {
            return Err(RegridError::shape_mismatch(&[s_rho.len()], &[cs_r.len()]));
        }
        if s_rho.is_empty() {
            return Err(RegridError::invalid_grid("s-coordinate", "no levels"));
        }
        Ok(Self {
            vtransform,
            hc,
            s_rho,
            cs_r,
        })
    }

    pub fn levels(&self) -> usize {
        self.s_rho.len()
    }

    /// Depths (level × row × column) for bathymetry `h` (positive down).
    pub fn depths(&self, h: &Array2<f64>) -> Array3<f64> {
        let (rows, cols) = h.dim();
        let hc = self.hc;
        Array3::from_shape_fn((self.levels(), rows, cols), |(k, r, c)| {
            let depth = h[[r, c]];
            let (s, cs) = (self.s_rho[k], self.cs_r[k]);
            match self.vtransform {
                Vtransform::Original => hc * s + (depth - hc) * cs,
                Vtransform::Stretched => depth * (hc * s + depth * cs) / (hc + depth),
            }
        })
    }
}

/// Average bathymetry onto u-faces.
pub fn h_to_u(h: &Array2<f64>) -> Array2<f64> {
    let (rows, cols) = h.dim();
    Array2::from_shape_fn((rows, cols.saturating_sub(1)), |(r, c)| {
        0.5 * (h[[r, c]] + h[[r, c + 1]])
    })
}

/// Average bathymetry onto v-faces.
pub fn h_to_v(h: &Array2<f64>) -> Array2<f64> {
    let (rows, cols) = h.dim();
    Array2::from_shape_fn((rows.saturating_sub(1), cols), |(r, c)| {
        0.5 * (h[[r, c]] + h[[r + 1, c]])
    })
}
