//! In-process store.

use std::collections::BTreeMap;

use ndarray::{Array, ArrayD, ArrayViewD, Axis, Dimension};
use serde_json::{Map, Value};

use super::{check_record, RecordSource, RecordStore};
use crate::error::{RegridError, Result};

#[derive(Debug, Clone, PartialEq)]
struct Variable {
    data: ArrayD<f64>,
    attributes: Map<String, Value>,
}

/// A [`RecordStore`] holding every variable in memory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryStore {
    variables: BTreeMap<String, Variable>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a variable.
    pub fn insert<D: Dimension>(&mut self, name: impl Into<String>, data: Array<f64, D>) {
        self.variables.insert(
            name.into(),
            Variable {
                data: data.into_dyn(),
                attributes: Map::new(),
            },
        );
    }

    /// Builder form of [`insert`](MemoryStore::insert).
    pub fn with_variable<D: Dimension>(mut self, name: impl Into<String>, data: Array<f64, D>) -> Self {
        self.insert(name, data);
        self
    }

    /// Set an attribute on an existing variable.
    pub fn set_attribute(&mut self, name: &str, key: impl Into<String>, value: Value) -> Result<()> {
        let variable = self.variable_mut(name)?;
        variable.attributes.insert(key.into(), value);
        Ok(())
    }

    /// Variable names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.variables.keys().map(String::as_str)
    }

    fn variable(&self, name: &str) -> Result<&Variable> {
        self.variables
            .get(name)
            .ok_or_else(|| RegridError::storage(format!("no variable named {}", name)))
    }

    fn variable_mut(&mut self, name: &str) -> Result<&mut Variable> {
        self.variables
            .get_mut(name)
            .ok_or_else(|| RegridError::storage(format!("no variable named {}", name)))
    }
}

impl RecordSource for MemoryStore {
    fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    fn shape(&self, name: &str) -> Result<Vec<usize>> {
        Ok(self.variable(name)?.data.shape().to_vec())
    }

    fn read_variable(&self, name: &str) -> Result<ArrayD<f64>> {
        Ok(self.variable(name)?.data.clone())
    }

    fn read_record(&self, name: &str, record: usize) -> Result<ArrayD<f64>> {
        let data = &self.variable(name)?.data;
        check_record(name, data.shape(), record)?;
        Ok(data.index_axis(Axis(0), record).to_owned())
    }

    fn attribute(&self, name: &str, key: &str) -> Option<Value> {
        self.variables.get(name)?.attributes.get(key).cloned()
    }
}

impl RecordStore for MemoryStore {
    fn create_variable(
        &mut self,
        name: &str,
        shape: &[usize],
        attributes: Map<String, Value>,
    ) -> Result<()> {
        if let Some(existing) = self.variables.get(name) {
            if existing.data.shape() != shape {
                return Err(RegridError::shape_mismatch(existing.data.shape(), shape));
            }
            return Ok(());
        }
        self.variables.insert(
            name.to_string(),
            Variable {
                data: ArrayD::from_elem(shape, f64::NAN),
                attributes,
            },
        );
        Ok(())
    }

    fn write_variable(&mut self, name: &str, data: ArrayViewD<'_, f64>) -> Result<()> {
        match self.variables.get_mut(name) {
            Some(existing) => {
                if existing.data.shape() != data.shape() {
                    return Err(RegridError::shape_mismatch(existing.data.shape(), data.shape()));
                }
                existing.data.assign(&data);
            }
            None => self.insert(name, data.to_owned()),
        }
        Ok(())
    }

    fn write_record(&mut self, name: &str, record: usize, data: ArrayViewD<'_, f64>) -> Result<()> {
        let variable = self.variable_mut(name)?;
        check_record(name, variable.data.shape(), record)?;
        let mut slot = variable.data.index_axis_mut(Axis(0), record);
        if slot.shape() != data.shape() {
            return Err(RegridError::shape_mismatch(slot.shape(), data.shape()));
        }
        slot.assign(&data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, Array3};

    #[test]
    fn test_write_record_in_place() {
        let mut store = MemoryStore::new();
        store.create_variable("temp", &[3, 2, 2], Map::new()).unwrap();

        store
            .write_record("temp", 1, Array2::from_elem((2, 2), 5.0).into_dyn().view())
            .unwrap();

        let data = store.read_variable("temp").unwrap();
        assert!(data[[0, 0, 0]].is_nan());
        assert_eq!(data[[1, 1, 1]], 5.0);
    }

    #[test]
    fn test_write_variable_shape_checked() {
        let mut store = MemoryStore::new().with_variable("zeta", Array3::<f64>::zeros((2, 2, 2)));
        let wrong = Array3::<f64>::zeros((3, 2, 2)).into_dyn();
        assert!(store.write_variable("zeta", wrong.view()).is_err());
    }

    #[test]
    fn test_create_existing_is_noop() {
        let mut store = MemoryStore::new().with_variable("zeta", Array3::from_elem((1, 1, 1), 2.0));
        store.create_variable("zeta", &[1, 1, 1], Map::new()).unwrap();
        assert_eq!(store.read_variable("zeta").unwrap()[[0, 0, 0]], 2.0);
        assert!(store.create_variable("zeta", &[2, 1, 1], Map::new()).is_err());
    }

    #[test]
    fn test_attributes() {
        let mut store = MemoryStore::new().with_variable("time", ndarray::arr1(&[0.0]));
        store
            .set_attribute("time", "units", Value::from("days since 2000-01-01"))
            .unwrap();
        assert_eq!(
            store.attribute("time", "units"),
            Some(Value::from("days since 2000-01-01"))
        );
        assert_eq!(store.attribute("time", "calendar"), None);
        assert!(store.set_attribute("missing", "units", Value::Null).is_err());
    }
}
