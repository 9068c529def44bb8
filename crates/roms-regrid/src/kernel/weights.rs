//! Horizontal weight maps.
//!
//! A weight map records, for every destination point, which source points
//! contribute to it and with what (unnormalised) weight. It depends only on
//! the two horizontal geometries, so one map serves every field and record
//! regridded between the same pair of grids.
//!
//! # Layout
//!
//! Entries are stored in compressed-row form: `offsets[p]..offsets[p + 1]`
//! indexes the `(source, weight)` pairs of destination point `p`, with points
//! numbered row-major.

use std::io::{Read, Write};

use crate::error::{RegridError, Result};

/// Magic bytes opening a serialised weight map.
const MAGIC: &[u8; 4] = b"WMAP";

/// Serialisation format version.
const VERSION: u32 = 1;

/// Largest element count reserved up front while reading; longer arrays grow
/// as their bytes actually arrive.
const PREALLOCATE_LIMIT: usize = 1 << 16;

/// Source points and weights for each destination point.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightMap {
    source_shape: (usize, usize),
    destination_shape: (usize, usize),
    offsets: Vec<u32>,
    indices: Vec<u32>,
    weights: Vec<f64>,
}

impl WeightMap {
    /// Create an empty map; destination points are appended with [`push_point`].
    ///
    /// [`push_point`]: WeightMap::push_point
    pub fn new(source_shape: (usize, usize), destination_shape: (usize, usize)) -> Self {
        let points = destination_shape.0 * destination_shape.1;
        let mut offsets = Vec::with_capacity(points + 1);
        offsets.push(0);
        Self {
            source_shape,
            destination_shape,
            offsets,
            indices: Vec::new(),
            weights: Vec::new(),
        }
    }

    /// Append the contributions of the next destination point.
    pub fn push_point<I>(&mut self, contributions: I)
    where
        I: IntoIterator<Item = (usize, f64)>,
    {
        for (source, weight) in contributions {
            self.indices.push(source as u32);
            self.weights.push(weight);
        }
        self.offsets.push(self.indices.len() as u32);
    }

    /// Shape (rows, cols) of the source grid.
    pub fn source_shape(&self) -> (usize, usize) {
        self.source_shape
    }

    /// Shape (rows, cols) of the destination grid.
    pub fn destination_shape(&self) -> (usize, usize) {
        self.destination_shape
    }

    /// Number of destination points filled so far.
    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Check if no destination points have been added.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether every destination point has an entry.
    pub fn is_complete(&self) -> bool {
        self.len() == self.destination_shape.0 * self.destination_shape.1
    }

    /// Total number of (source, weight) pairs.
    pub fn entry_count(&self) -> usize {
        self.indices.len()
    }

    /// Contributions to the destination point with row-major index `point`.
    pub fn contributions(&self, point: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let start = self.offsets[point] as usize;
        let end = self.offsets[point + 1] as usize;
        self.indices[start..end]
            .iter()
            .zip(&self.weights[start..end])
            .map(|(&i, &w)| (i as usize, w))
    }

    /// Normalised weighted mean of `value(source)` over finite values.
    ///
    /// Returns `None` when no contributing source value is finite.
    pub fn blend<F>(&self, point: usize, mut value: F) -> Option<f64>
    where
        F: FnMut(usize) -> f64,
    {
        let mut sum = 0.0;
        let mut total = 0.0;
        for (source, weight) in self.contributions(point) {
            let v = value(source);
            if v.is_finite() {
                sum += weight * v;
                total += weight;
            }
        }
        if total > 0.0 {
            Some(sum / total)
        } else {
            None
        }
    }

    /// Serialise to a writer.
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(MAGIC)?;
        writer.write_all(&VERSION.to_le_bytes())?;
        for dim in [
            self.source_shape.0,
            self.source_shape.1,
            self.destination_shape.0,
            self.destination_shape.1,
            self.len(),
            self.entry_count(),
        ] {
            writer.write_all(&(dim as u64).to_le_bytes())?;
        }
        for &offset in &self.offsets {
            writer.write_all(&offset.to_le_bytes())?;
        }
        for &index in &self.indices {
            writer.write_all(&index.to_le_bytes())?;
        }
        for &weight in &self.weights {
            writer.write_all(&weight.to_le_bytes())?;
        }
        Ok(())
    }

    /// Deserialise from a reader.
    ///
    /// The header is checked before anything is allocated from it, and every
    /// offset and source index is bounds-checked, so a corrupt artifact is a
    /// [`RegridError::Cache`] rather than a panic in [`blend`].
    ///
    /// [`blend`]: WeightMap::blend
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(RegridError::Cache("invalid weight map magic bytes".to_string()));
        }

        let mut buf4 = [0u8; 4];
        reader.read_exact(&mut buf4)?;
        let version = u32::from_le_bytes(buf4);
        if version != VERSION {
            return Err(RegridError::Cache(format!(
                "unsupported weight map version: {}",
                version
            )));
        }

        let mut buf8 = [0u8; 8];
        let mut header = [0u64; 6];
        for slot in header.iter_mut() {
            reader.read_exact(&mut buf8)?;
            *slot = u64::from_le_bytes(buf8);
        }
        let [src_rows, src_cols, dst_rows, dst_cols, points, entries] = header;

        let source_points = checked_points(src_rows, src_cols, "source")?;
        let destination_points = checked_points(dst_rows, dst_cols, "destination")?;
        if points != destination_points {
            return Err(RegridError::Cache(format!(
                "weight map lists {} points for a {}x{} destination",
                points, dst_rows, dst_cols
            )));
        }
        if entries > u64::from(u32::MAX) {
            return Err(RegridError::Cache(format!(
                "weight map entry count {} exceeds the offset range",
                entries
            )));
        }
        let points = to_usize(points)?;
        let entries = to_usize(entries)?;

        let mut offsets = Vec::with_capacity(points.min(PREALLOCATE_LIMIT) + 1);
        let mut previous = 0u32;
        for p in 0..=points {
            reader.read_exact(&mut buf4)?;
            let offset = u32::from_le_bytes(buf4);
            let valid = if p == 0 {
                offset == 0
            } else {
                offset >= previous && offset as usize <= entries
            };
            if !valid {
                return Err(RegridError::Cache(format!(
                    "weight map offset {} of point {} is out of order",
                    offset, p
                )));
            }
            offsets.push(offset);
            previous = offset;
        }
        if previous as usize != entries {
            return Err(RegridError::Cache(
                "weight map offsets disagree with entry count".to_string(),
            ));
        }

        let mut indices = Vec::with_capacity(entries.min(PREALLOCATE_LIMIT));
        for _ in 0..entries {
            reader.read_exact(&mut buf4)?;
            let index = u32::from_le_bytes(buf4);
            if u64::from(index) >= source_points {
                return Err(RegridError::Cache(format!(
                    "weight map source index {} outside a {}x{} source",
                    index, src_rows, src_cols
                )));
            }
            indices.push(index);
        }

        let mut weights = Vec::with_capacity(entries.min(PREALLOCATE_LIMIT));
        for _ in 0..entries {
            reader.read_exact(&mut buf8)?;
            weights.push(f64::from_le_bytes(buf8));
        }

        Ok(Self {
            source_shape: (to_usize(src_rows)?, to_usize(src_cols)?),
            destination_shape: (to_usize(dst_rows)?, to_usize(dst_cols)?),
            offsets,
            indices,
            weights,
        })
    }

    /// Serialise to bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(
            4 + 4 + 6 * 8 + self.offsets.len() * 4 + self.indices.len() * 12,
        );
        // Writing into a Vec cannot fail.
        let _ = self.write_to(&mut bytes);
        bytes
    }

    /// Deserialise from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::read_from(bytes)
    }
}

/// `rows * cols` of a serialised shape, rejecting overflow.
fn checked_points(rows: u64, cols: u64, which: &str) -> Result<u64> {
    rows.checked_mul(cols)
        .filter(|&n| usize::try_from(n).is_ok())
        .ok_or_else(|| {
            RegridError::Cache(format!("weight map {} shape {}x{} overflows", which, rows, cols))
        })
}

fn to_usize(value: u64) -> Result<usize> {
    usize::try_from(value)
        .map_err(|_| RegridError::Cache(format!("weight map size {} overflows", value)))
}
