//! Error types for regridding.

use thiserror::Error;

/// Errors that can occur while regridding.
#[derive(Error, Debug)]
pub enum RegridError {
    /// A required input (destination depths, a time axis, ...) is absent.
    #[error("missing input: {0}")]
    MissingInput(String),

    /// A field cannot be processed in the shape it was found.
    #[error("incompatible field {field}: {reason}")]
    IncompatibleField { field: String, reason: String },

    /// Array extents disagree.
    #[error("shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    /// A grid definition violates its staggering invariants.
    #[error("invalid grid {grid}: {reason}")]
    InvalidGrid { grid: String, reason: String },

    /// A requested record index is outside the source time axis.
    #[error("record {record} is outside the source time axis of length {available}")]
    RecordOutOfRange { record: usize, available: usize },

    /// A per-record worker task failed; the rest of its batch was abandoned.
    #[error("worker for {field} record {record} failed: {source}")]
    Worker {
        field: String,
        record: usize,
        #[source]
        source: Box<RegridError>,
    },

    /// Weight-map cache artifact could not be read or written.
    #[error("weight cache error: {0}")]
    Cache(String),

    /// An interpolation primitive rejected its inputs.
    #[error("kernel error: {0}")]
    Kernel(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    InvalidConfig(String),

    /// Storage/IO error.
    #[error("storage error: {0}")]
    Storage(String),
}

impl RegridError {
    /// Create a MissingInput error.
    pub fn missing_input(msg: impl Into<String>) -> Self {
        Self::MissingInput(msg.into())
    }

    /// Create an IncompatibleField error.
    pub fn incompatible_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::IncompatibleField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a ShapeMismatch error from two shapes.
    pub fn shape_mismatch(expected: &[usize], actual: &[usize]) -> Self {
        Self::ShapeMismatch {
            expected: format!("{:?}", expected),
            actual: format!("{:?}", actual),
        }
    }

    /// Create an InvalidGrid error.
    pub fn invalid_grid(grid: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidGrid {
            grid: grid.into(),
            reason: reason.into(),
        }
    }

    /// Wrap the failure of one worker task.
    pub fn worker(field: impl Into<String>, record: usize, source: RegridError) -> Self {
        Self::Worker {
            field: field.into(),
            record,
            source: Box::new(source),
        }
    }

    /// Create a Storage error.
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a Kernel error.
    pub fn kernel(msg: impl Into<String>) -> Self {
        Self::Kernel(msg.into())
    }
}

impl From<std::io::Error> for RegridError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for RegridError {
    fn from(err: serde_json::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<ndarray::ShapeError> for RegridError {
    fn from(err: ndarray::ShapeError) -> Self {
        Self::ShapeMismatch {
            expected: "compatible array layout".to_string(),
            actual: err.to_string(),
        }
    }
}

/// Result type for regridding operations.
pub type Result<T> = std::result::Result<T, RegridError>;
