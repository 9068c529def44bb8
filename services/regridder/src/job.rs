//! Regridding job files.
//!
//! A job names the source store, where the destination goes, and optional
//! run settings:
//!
//! ```yaml
//! source:
//!   path: /data/his.zarr
//!   grid: /data/parent_grd.zarr   # optional, defaults to `path`
//!   name: parent
//! target:
//!   mode: fixed_depth
//!   path: /data/z.zarr
//!   name: z50
//!   depths: [-5, -10, -25, -50]
//! options:
//!   records: [0, 1, 2]
//!   variable_map: { temp: temp, salt: salt }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use roms_regrid::{RegridConfig, RegridOptions};
use serde::Deserialize;

/// A store holding model data, and optionally a separate grid definition.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreLocation {
    pub path: PathBuf,
    /// Store holding the grid variables, when not `path` itself.
    #[serde(default)]
    pub grid: Option<PathBuf>,
    /// Grid identity, used for the weight cache key.
    pub name: String,
}

impl StoreLocation {
    pub fn grid_path(&self) -> &Path {
        self.grid.as_deref().unwrap_or(&self.path)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Target {
    /// Regrid onto an existing terrain-following grid.
    Grid(StoreLocation),
    /// Regrid onto a z-level grid, provisioning the output if needed.
    FixedDepth {
        path: PathBuf,
        name: String,
        #[serde(default)]
        depths: Option<Vec<f64>>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Job {
    pub source: StoreLocation,
    pub target: Target,
    #[serde(default)]
    pub options: RegridOptions,
    /// Overrides the environment configuration when present.
    #[serde(default)]
    pub config: Option<RegridConfig>,
}

impl Job {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read job file: {:?}", path))?;
        Self::parse(&content).with_context(|| format!("Failed to parse job file: {:?}", path))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// The run configuration: the job's own, else the environment's.
    pub fn config(&self) -> RegridConfig {
        self.config.clone().unwrap_or_else(RegridConfig::from_env)
    }
}

/// Parse a comma-separated record list such as `0,2,5`.
pub fn parse_records(value: &str) -> Result<Vec<usize>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().with_context(|| format!("Invalid record index: {}", s)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fixed_depth_job() {
        let job = Job::parse(
            r#"
source:
  path: /data/his.zarr
  grid: /data/grd.zarr
  name: parent
target:
  mode: fixed_depth
  path: /data/z.zarr
  name: z50
  depths: [-5, -10, -50]
options:
  records: [2, 0]
  variable_map:
    temp: temperature
"#,
        )
        .unwrap();

        assert_eq!(job.source.grid_path(), Path::new("/data/grd.zarr"));
        match &job.target {
            Target::FixedDepth { name, depths, .. } => {
                assert_eq!(name, "z50");
                assert_eq!(depths.as_deref(), Some(&[-5.0, -10.0, -50.0][..]));
            }
            other => panic!("unexpected target {:?}", other),
        }
        assert_eq!(job.options.records, Some(vec![2, 0]));
        let map = job.options.variable_map.as_ref().unwrap();
        assert_eq!(map.destination("temp"), Some("temperature"));
        assert!(job.config.is_none());
    }

    #[test]
    fn test_parse_grid_job_with_config() {
        let job = Job::parse(
            r#"
source: { path: his.zarr, name: parent }
target: { mode: grid, path: child.zarr, name: child }
config:
  worker_count: 4
  cache_dir: null
"#,
        )
        .unwrap();

        assert_eq!(job.source.grid_path(), Path::new("his.zarr"));
        assert!(matches!(job.target, Target::Grid(ref store) if store.name == "child"));
        let config = job.config();
        assert_eq!(config.worker_count, 4);
        assert!(config.cache_dir.is_none());
        assert_eq!(config.kernel_width, RegridConfig::default().kernel_width);
    }

    #[test]
    fn test_unknown_mode_rejected() {
        let result = Job::parse(
            "source: { path: a, name: a }\ntarget: { mode: sideways, path: b, name: b }\n",
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_records() {
        assert_eq!(parse_records("0, 2,5").unwrap(), vec![0, 2, 5]);
        assert!(parse_records("1,x").is_err());
    }
}
