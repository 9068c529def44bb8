//! Named-variable array stores.
//!
//! Sources are read by variable name, whole or one record (index along the
//! leading axis) at a time. Destination stores additionally accept
//! whole-variable and per-record assignment. Masked cells travel as NaN.

pub mod memory;
pub mod zarr;

use ndarray::{ArrayD, ArrayViewD, Axis, Dimension};
use serde_json::{Map, Value};

use crate::error::{RegridError, Result};
use crate::types::Masked;

pub use memory::MemoryStore;
pub use zarr::ZarrStore;

/// Read access to a named-variable store.
pub trait RecordSource {
    /// Whether a variable exists.
    fn contains(&self, name: &str) -> bool;

    /// Shape of a variable.
    fn shape(&self, name: &str) -> Result<Vec<usize>>;

    /// Read a whole variable.
    fn read_variable(&self, name: &str) -> Result<ArrayD<f64>>;

    /// Read one record (index along the leading axis) of a variable.
    fn read_record(&self, name: &str, record: usize) -> Result<ArrayD<f64>> {
        let data = self.read_variable(name)?;
        check_record(name, data.shape(), record)?;
        Ok(data.index_axis(Axis(0), record).to_owned())
    }

    /// A variable attribute, if present.
    fn attribute(&self, name: &str, key: &str) -> Option<Value>;
}

/// Write access to a named-variable store.
pub trait RecordStore: RecordSource {
    /// Provision a NaN-filled variable. Succeeds without change if it
    /// already exists with the same shape.
    fn create_variable(&mut self, name: &str, shape: &[usize], attributes: Map<String, Value>)
        -> Result<()>;

    /// Assign a whole variable, creating it if absent. An existing variable
    /// must have the same shape.
    fn write_variable(&mut self, name: &str, data: ArrayViewD<'_, f64>) -> Result<()>;

    /// Assign one record of an existing variable.
    fn write_record(&mut self, name: &str, record: usize, data: ArrayViewD<'_, f64>) -> Result<()>;
}

/// Number of records (leading extent) of a variable.
pub fn record_count<S: RecordSource + ?Sized>(source: &S, name: &str) -> Result<usize> {
    source
        .shape(name)?
        .first()
        .copied()
        .ok_or_else(|| RegridError::incompatible_field(name, "scalar variable has no records"))
}

/// Read one record as a masked slice of dimensionality `D`.
pub fn read_masked<D, S>(source: &S, name: &str, record: usize) -> Result<Masked<D>>
where
    D: Dimension,
    S: RecordSource + ?Sized,
{
    let data = source.read_record(name, record)?;
    if data.ndim() != D::NDIM.unwrap_or(data.ndim()) {
        return Err(RegridError::incompatible_field(
            name,
            format!("expected {:?} dimensions per record, found {}", D::NDIM, data.ndim()),
        ));
    }
    Ok(Masked::from_filled(data.into_dimensionality::<D>()?))
}

/// Write one masked slice as a record.
pub fn write_masked<D, S>(store: &mut S, name: &str, record: usize, slice: &Masked<D>) -> Result<()>
where
    D: Dimension,
    S: RecordStore + ?Sized,
{
    let filled = slice.filled(f64::NAN).into_dyn();
    store.write_record(name, record, filled.view())
}

/// Stack masked record slices into one NaN-filled series.
pub fn stack_records<D: Dimension>(slices: &[Masked<D>]) -> Result<ArrayD<f64>> {
    let filled: Vec<ArrayD<f64>> = slices.iter().map(|s| s.filled(f64::NAN).into_dyn()).collect();
    let views: Vec<ArrayViewD<'_, f64>> = filled.iter().map(|a| a.view()).collect();
    if views.is_empty() {
        return Err(RegridError::missing_input("no records to stack"));
    }
    Ok(ndarray::stack(Axis(0), &views)?)
}

pub(crate) fn check_record(name: &str, shape: &[usize], record: usize) -> Result<()> {
    let available = match shape.first() {
        Some(&n) => n,
        None => {
            return Err(RegridError::incompatible_field(
                name,
                "scalar variable has no records",
            ))
        }
    };
    if record >= available {
        return Err(RegridError::RecordOutOfRange { record, available });
    }
    Ok(())
}
