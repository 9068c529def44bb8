//! Core types for regridding.

use ndarray::{Array, Dimension, Ix2, Ix3, IxDyn, NdIndex, Zip};
use serde::{Deserialize, Serialize};

use crate::error::{RegridError, Result};

/// Horizontal staggering of a field on an Arakawa C-grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Staggering {
    /// Cell centers.
    Rho,
    /// Faces offset half a cell in x (one fewer column).
    U,
    /// Faces offset half a cell in y (one fewer row).
    V,
}

impl Staggering {
    /// All staggerings, in the order weight maps are built.
    pub const ALL: [Staggering; 3] = [Staggering::Rho, Staggering::U, Staggering::V];

    /// Variable-name suffix used by ROMS files (`lon_rho`, `mask_u`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rho => "rho",
            Self::U => "u",
            Self::V => "v",
        }
    }

    /// Parse from string (case-insensitive).
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "rho" => Some(Self::Rho),
            "u" => Some(Self::U),
            "v" => Some(Self::V),
            _ => None,
        }
    }

    /// Horizontal extents of this staggering given the rho extents.
    pub fn extents(&self, rho_rows: usize, rho_cols: usize) -> (usize, usize) {
        match self {
            Self::Rho => (rho_rows, rho_cols),
            Self::U => (rho_rows, rho_cols.saturating_sub(1)),
            Self::V => (rho_rows.saturating_sub(1), rho_cols),
        }
    }
}

impl std::fmt::Display for Staggering {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A numeric array paired with a validity mask (`true` marks an invalid cell).
#[derive(Debug, Clone, PartialEq)]
pub struct Masked<D: Dimension> {
    pub data: Array<f64, D>,
    pub mask: Array<bool, D>,
}

/// One 2-D field slice (row × column).
pub type Masked2 = Masked<Ix2>;

/// One 3-D field slice (level × row × column).
pub type Masked3 = Masked<Ix3>;

impl<D: Dimension> Masked<D> {
    /// Pair data with an explicit mask of the same shape.
    pub fn new(data: Array<f64, D>, mask: Array<bool, D>) -> Result<Self> {
        if data.shape() != mask.shape() {
            return Err(RegridError::shape_mismatch(data.shape(), mask.shape()));
        }
        Ok(Self { data, mask })
    }

    /// Wrap data with every cell valid.
    pub fn valid(data: Array<f64, D>) -> Self {
        let mask = Array::from_elem(data.raw_dim(), false);
        Self { data, mask }
    }

    /// Treat non-finite values as masked (the storage convention).
    pub fn from_filled(data: Array<f64, D>) -> Self {
        let mask = data.mapv(|v| !v.is_finite());
        Self { data, mask }
    }

    /// Data with masked cells replaced by `fill`.
    pub fn filled(&self, fill: f64) -> Array<f64, D> {
        Zip::from(&self.data)
            .and(&self.mask)
            .map_collect(|&v, &masked| if masked { fill } else { v })
    }

    /// Array shape.
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// Whether the cell at `index` is masked.
    pub fn is_masked<I: NdIndex<D>>(&self, index: I) -> bool {
        self.mask[index]
    }

    /// Number of valid cells.
    pub fn valid_count(&self) -> usize {
        self.mask.iter().filter(|&&m| !m).count()
    }

    /// Mask every cell where `invalid` is true, keeping existing masking.
    pub fn mask_where(&mut self, invalid: &Array<bool, D>) {
        Zip::from(&mut self.mask)
            .and(invalid)
            .for_each(|m, &bad| *m = *m || bad);
    }

    /// Erase the static dimensionality.
    pub fn into_dyn(self) -> Masked<IxDyn> {
        Masked {
            data: self.data.into_dyn(),
            mask: self.mask.into_dyn(),
        }
    }
}

impl Masked<IxDyn> {
    /// Recover a static dimensionality, failing if the rank differs.
    pub fn into_dimensionality<D2: Dimension>(self) -> Result<Masked<D2>> {
        Ok(Masked {
            data: self.data.into_dimensionality::<D2>()?,
            mask: self.mask.into_dimensionality::<D2>()?,
        })
    }
}
