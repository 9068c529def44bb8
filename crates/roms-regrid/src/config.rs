//! Configuration for regridding runs and destination stores.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Number of source points the default kernel blends per destination point.
pub const DEFAULT_KERNEL_WIDTH: usize = 8;

/// Land/sea fill window (cells per side).
pub const DEFAULT_LAND_FILL_KERNEL: usize = 7;

/// Configuration for a regridding run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegridConfig {
    /// Size of the worker pool used for per-record tasks.
    pub worker_count: usize,

    /// Number of source points blended per destination point.
    pub kernel_width: usize,

    /// Decorrelation length in source grid cells along x (0 = derive).
    pub decorrelation_x: f64,

    /// Decorrelation length in source grid cells along y (0 = derive).
    pub decorrelation_y: f64,

    /// Window size of the land/sea fill applied before interpolation.
    pub land_fill_kernel: usize,

    /// Directory for weight-map cache artifacts. `None` disables persistence.
    pub cache_dir: Option<PathBuf>,

    /// Candidate names of the source time axis, tried in order.
    pub time_variables: Vec<String>,

    /// Destination time axes. Every one present in the output receives the
    /// selected source times; the first is created for fixed-depth outputs.
    pub output_time_variables: Vec<String>,

    /// Destination store layout.
    pub store: StoreConfig,
}

impl Default for RegridConfig {
    fn default() -> Self {
        Self {
            worker_count: 1,
            kernel_width: DEFAULT_KERNEL_WIDTH,
            decorrelation_x: 0.0,
            decorrelation_y: 0.0,
            land_fill_kernel: DEFAULT_LAND_FILL_KERNEL,
            cache_dir: Some(PathBuf::from(".")),
            time_variables: vec!["ocean_time".to_string(), "time".to_string()],
            output_time_variables: [
                "time",
                "ocean_time",
                "zeta_time",
                "v2d_time",
                "v3d_time",
                "temp_time",
                "salt_time",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            store: StoreConfig::default(),
        }
    }
}

impl RegridConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("REGRID_WORKERS") {
            if let Ok(count) = val.parse() {
                config.worker_count = count;
            }
        }

        if let Ok(val) = std::env::var("REGRID_KERNEL_WIDTH") {
            if let Ok(width) = val.parse() {
                config.kernel_width = width;
            }
        }

        if let Ok(val) = std::env::var("REGRID_DECORRELATION_X") {
            if let Ok(length) = val.parse() {
                config.decorrelation_x = length;
            }
        }

        if let Ok(val) = std::env::var("REGRID_DECORRELATION_Y") {
            if let Ok(length) = val.parse() {
                config.decorrelation_y = length;
            }
        }

        if let Ok(val) = std::env::var("REGRID_CACHE_DIR") {
            config.cache_dir = match val.to_lowercase().as_str() {
                "" | "none" | "off" => None,
                _ => Some(PathBuf::from(val)),
            };
        }

        if let Ok(val) = std::env::var("REGRID_TIME_VARIABLES") {
            if let Some(names) = name_list(&val) {
                config.time_variables = names;
            }
        }

        if let Ok(val) = std::env::var("REGRID_OUTPUT_TIME_VARIABLES") {
            if let Some(names) = name_list(&val) {
                config.output_time_variables = names;
            }
        }

        config.store = StoreConfig::from_env();
        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.worker_count == 0 {
            return Err("worker_count must be > 0".to_string());
        }

        if self.kernel_width == 0 {
            return Err("kernel_width must be > 0".to_string());
        }

        if self.decorrelation_x < 0.0 || self.decorrelation_y < 0.0 {
            return Err("decorrelation lengths must be >= 0".to_string());
        }

        if self.land_fill_kernel == 0 || self.land_fill_kernel % 2 == 0 {
            return Err("land_fill_kernel must be odd and > 0".to_string());
        }

        if self.time_variables.is_empty() {
            return Err("time_variables must name at least one variable".to_string());
        }

        if self.output_time_variables.is_empty() {
            return Err("output_time_variables must name at least one variable".to_string());
        }

        self.store.validate()
    }
}

/// Comma-separated names; `None` when the list is empty.
fn name_list(value: &str) -> Option<Vec<String>> {
    let names: Vec<String> = value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    (!names.is_empty()).then_some(names)
}

/// Layout of Zarr destination stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Compression codec for Zarr arrays.
    pub compression: ZarrCompression,

    /// Compression level (1-9).
    pub compression_level: u8,

    /// Enable byte shuffle filter for better compression.
    pub shuffle: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            compression: ZarrCompression::BloscZstd,
            compression_level: 1,
            shuffle: true,
        }
    }
}

impl StoreConfig {
    /// Load store configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("ZARR_COMPRESSION") {
            config.compression = ZarrCompression::from_str(&val);
        }

        if let Ok(val) = std::env::var("ZARR_COMPRESSION_LEVEL") {
            if let Ok(level) = val.parse() {
                config.compression_level = level;
            }
        }

        if let Ok(val) = std::env::var("ZARR_SHUFFLE") {
            config.shuffle = val.to_lowercase() == "true" || val == "1";
        }

        config
    }

    /// Validate the store configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.compression_level == 0 || self.compression_level > 9 {
            return Err("compression_level must be 1-9".to_string());
        }
        Ok(())
    }
}

/// Compression codec for Zarr arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZarrCompression {
    /// No compression.
    None,
    /// LZ4 compression.
    Lz4,
    /// Zstd compression.
    Zstd,
    /// Blosc with LZ4.
    BloscLz4,
    /// Blosc with Zstd (recommended).
    #[default]
    BloscZstd,
}

impl ZarrCompression {
    /// Parse from string (case-insensitive).
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "none" => Self::None,
            "lz4" => Self::Lz4,
            "zstd" => Self::Zstd,
            "blosc_lz4" => Self::BloscLz4,
            _ => Self::BloscZstd,
        }
    }

    /// Get the codec name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Lz4 => "lz4",
            Self::Zstd => "zstd",
            Self::BloscLz4 => "blosc_lz4",
            Self::BloscZstd => "blosc_zstd",
        }
    }
}

impl std::fmt::Display for ZarrCompression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
