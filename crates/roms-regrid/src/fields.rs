//! Field descriptors and variable maps.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{RegridError, Result};
use crate::types::Staggering;

/// Static description of a regriddable field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    /// Dimensions of one record: 2 (row × column) or 3 (level × row × column).
    pub dims: usize,
    pub staggering: Staggering,
    /// Component of a vector pair; regridded by the vector path only.
    pub rotation: bool,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, dims: usize, staggering: Staggering) -> Self {
        Self {
            name: name.into(),
            dims,
            staggering,
            rotation: false,
        }
    }

    pub fn rotated(mut self) -> Self {
        self.rotation = true;
        self
    }
}

/// Validated set of field descriptors.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldTable {
    fields: Vec<FieldDescriptor>,
}

/// Rotation components and the field each pairs with.
const VECTOR_PAIRS: [(&str, &str); 2] = [("u", "v"), ("ubar", "vbar")];

impl FieldTable {
    /// Build a table, rejecting bad dimensionality, duplicate names and
    /// rotation components without a partner.
    pub fn new(fields: Vec<FieldDescriptor>) -> Result<Self> {
        let mut seen = HashSet::new();
        for field in &fields {
            if field.dims != 2 && field.dims != 3 {
                return Err(RegridError::InvalidConfig(format!(
                    "field {} has {} dimensions, expected 2 or 3",
                    field.name, field.dims
                )));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(RegridError::InvalidConfig(format!(
                    "field {} is declared twice",
                    field.name
                )));
            }
        }

        let table = Self { fields };
        for field in table.fields.iter().filter(|f| f.rotation) {
            let partner = table.partner(&field.name).ok_or_else(|| {
                RegridError::InvalidConfig(format!(
                    "rotation component {} has no partner",
                    field.name
                ))
            })?;
            if !table.get(partner).map(|p| p.rotation).unwrap_or(false) {
                return Err(RegridError::InvalidConfig(format!(
                    "rotation component {} pairs with undeclared {}",
                    field.name, partner
                )));
            }
        }
        Ok(table)
    }

    pub fn get(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter()
    }

    fn partner(&self, name: &str) -> Option<&'static str> {
        VECTOR_PAIRS.iter().find_map(|&(a, b)| match name {
            n if n == a => Some(b),
            n if n == b => Some(a),
            _ => None,
        })
    }
}

impl Default for FieldTable {
    /// The ROMS fields: free surface, barotropic and baroclinic velocity,
    /// temperature and salinity.
    fn default() -> Self {
        Self {
            fields: vec![
                FieldDescriptor::new("zeta", 2, Staggering::Rho),
                FieldDescriptor::new("ubar", 2, Staggering::U).rotated(),
                FieldDescriptor::new("vbar", 2, Staggering::V).rotated(),
                FieldDescriptor::new("u", 3, Staggering::U).rotated(),
                FieldDescriptor::new("v", 3, Staggering::V).rotated(),
                FieldDescriptor::new("temp", 3, Staggering::Rho),
                FieldDescriptor::new("salt", 3, Staggering::Rho),
            ],
        }
    }
}

/// Source field name → destination field name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariableMap(BTreeMap<String, String>);

impl VariableMap {
    /// Identity map over every field of `table`.
    pub fn identity(table: &FieldTable) -> Self {
        Self(
            table
                .iter()
                .map(|f| (f.name.clone(), f.name.clone()))
                .collect(),
        )
    }

    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn insert(&mut self, source: impl Into<String>, destination: impl Into<String>) {
        self.0.insert(source.into(), destination.into());
    }

    pub fn with(mut self, source: impl Into<String>, destination: impl Into<String>) -> Self {
        self.insert(source, destination);
        self
    }

    pub fn destination(&self, source: &str) -> Option<&str> {
        self.0.get(source).map(String::as_str)
    }

    /// `(source, destination)` pairs in source-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(s, d)| (s.as_str(), d.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for VariableMap {
    fn default() -> Self {
        Self::identity(&FieldTable::default())
    }
}
