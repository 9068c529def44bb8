//! Per-run options and results.

use serde::{Deserialize, Serialize};

use crate::config::RegridConfig;
use crate::fields::VariableMap;

/// Options for one regridding run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegridOptions {
    /// Source records to process, in output order. `None` selects every
    /// record of the source time axis.
    pub records: Option<Vec<usize>>,
    /// Worker pool size; 0 uses the configured count.
    pub worker_count: usize,
    /// Decorrelation length along x in source cells (≤ 0 derives it).
    pub decorrelation_x: f64,
    /// Decorrelation length along y in source cells (≤ 0 derives it).
    pub decorrelation_y: f64,
    /// Source → destination names. `None` maps every known field to itself.
    pub variable_map: Option<VariableMap>,
    /// Mask destination levels below the deepest source level.
    pub apply_depth_mask: bool,
}

impl RegridOptions {
    /// Options carrying the run-level settings of `config`.
    pub fn from_config(config: &RegridConfig) -> Self {
        Self {
            worker_count: config.worker_count,
            decorrelation_x: config.decorrelation_x,
            decorrelation_y: config.decorrelation_y,
            ..Default::default()
        }
    }

    pub fn with_records(mut self, records: Vec<usize>) -> Self {
        self.records = Some(records);
        self
    }

    pub fn with_workers(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    pub fn with_variable_map(mut self, variable_map: VariableMap) -> Self {
        self.variable_map = Some(variable_map);
        self
    }
}

/// Result of a regridding run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegridSummary {
    /// Number of records written per field.
    pub records: usize,
    /// Destination variables written, in write order.
    pub fields: Vec<String>,
    /// Whether the weight maps were loaded from a cache artifact.
    pub weights_from_cache: bool,
    /// Destination time axes written, in configuration order.
    pub time_variables: Vec<String>,
}
