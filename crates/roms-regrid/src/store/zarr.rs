//! Zarr V3 directory store.
//!
//! One array per variable at `/<name>`. Arrays with a record axis and at
//! least two more dimensions are chunked one record per chunk; smaller
//! arrays are a single chunk. New arrays are Float64 with a NaN fill value;
//! existing Float32 arrays are read and written too.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ndarray::{ArrayD, ArrayViewD, IxDyn};
use serde_json::{Map, Value};
use tracing::debug;
use zarrs::array::codec::bytes_to_bytes::blosc::{
    BloscCodec, BloscCompressionLevel, BloscCompressor, BloscShuffleMode,
};
use zarrs::array::codec::BytesToBytesCodecTraits;
use zarrs::array::{Array, ArrayBuilder, ChunkGrid, DataType, FillValue};
use zarrs::array_subset::ArraySubset;
use zarrs_filesystem::FilesystemStore;

use super::{check_record, RecordSource, RecordStore};
use crate::config::{StoreConfig, ZarrCompression};
use crate::error::{RegridError, Result};

/// A [`RecordStore`] backed by a Zarr V3 hierarchy on the local filesystem.
pub struct ZarrStore {
    root: PathBuf,
    store: Arc<FilesystemStore>,
    config: StoreConfig,
}

impl std::fmt::Debug for ZarrStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZarrStore")
            .field("root", &self.root)
            .field("config", &self.config)
            .finish()
    }
}

impl ZarrStore {
    /// Open (creating if needed) a store rooted at `path`.
    pub fn open(path: impl AsRef<Path>, config: StoreConfig) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        let store = FilesystemStore::new(&root).map_err(|e| RegridError::storage(e.to_string()))?;
        Ok(Self {
            root,
            store: Arc::new(store),
            config,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn open_array(&self, name: &str) -> Result<Array<FilesystemStore>> {
        Array::open(self.store.clone(), &array_path(name))
            .map_err(|e| RegridError::storage(format!("{}: {}", name, e)))
    }

    fn build_array(
        &self,
        name: &str,
        shape: &[usize],
        attributes: Map<String, Value>,
    ) -> Result<Array<FilesystemStore>> {
        let chunk_shape: Vec<u64> = if shape.len() >= 3 {
            std::iter::once(1)
                .chain(shape[1..].iter().map(|&d| d.max(1) as u64))
                .collect()
        } else {
            shape.iter().map(|&d| d.max(1) as u64).collect()
        };
        let chunk_grid: ChunkGrid = chunk_shape
            .try_into()
            .map_err(|e| RegridError::InvalidConfig(format!("{:?}", e)))?;

        let mut builder = ArrayBuilder::new(
            shape.iter().map(|&d| d as u64).collect::<Vec<_>>(),
            DataType::Float64,
            chunk_grid,
            FillValue::from(f64::NAN),
        );
        builder.attributes(attributes);

        if self.config.compression != ZarrCompression::None {
            builder.bytes_to_bytes_codecs(vec![self.compression_codec()?]);
        }

        builder
            .build(self.store.clone(), &array_path(name))
            .map_err(|e| RegridError::storage(e.to_string()))
    }

    fn compression_codec(&self) -> Result<Arc<dyn BytesToBytesCodecTraits>> {
        let level = BloscCompressionLevel::try_from(self.config.compression_level)
            .map_err(|_| RegridError::InvalidConfig("invalid compression level".to_string()))?;

        let shuffle = if self.config.shuffle {
            BloscShuffleMode::Shuffle
        } else {
            BloscShuffleMode::NoShuffle
        };
        let typesize = if self.config.shuffle { Some(8) } else { None };

        let compressor = match self.config.compression {
            ZarrCompression::None => {
                return Err(RegridError::InvalidConfig(
                    "no compression configured".to_string(),
                ))
            }
            ZarrCompression::Lz4 | ZarrCompression::BloscLz4 => BloscCompressor::LZ4,
            ZarrCompression::Zstd | ZarrCompression::BloscZstd => BloscCompressor::Zstd,
        };

        let codec = BloscCodec::new(compressor, level, None, shuffle, typesize)
            .map_err(|e| RegridError::InvalidConfig(e.to_string()))?;
        Ok(Arc::new(codec))
    }

    fn retrieve(&self, array: &Array<FilesystemStore>, subset: &ArraySubset) -> Result<Vec<f64>> {
        let map_err = |e: zarrs::array::ArrayError| RegridError::storage(e.to_string());
        match array.data_type() {
            DataType::Float64 => array
                .retrieve_array_subset_elements::<f64>(subset)
                .map_err(map_err),
            DataType::Float32 => Ok(array
                .retrieve_array_subset_elements::<f32>(subset)
                .map_err(map_err)?
                .into_iter()
                .map(f64::from)
                .collect()),
            other => Err(RegridError::storage(format!(
                "unsupported data type {:?}",
                other
            ))),
        }
    }

    fn assign(
        &self,
        array: &Array<FilesystemStore>,
        subset: &ArraySubset,
        data: ArrayViewD<'_, f64>,
    ) -> Result<()> {
        let map_err = |e: zarrs::array::ArrayError| RegridError::storage(e.to_string());
        match array.data_type() {
            DataType::Float64 => {
                let values: Vec<f64> = data.iter().copied().collect();
                array
                    .store_array_subset_elements(subset, &values)
                    .map_err(map_err)
            }
            DataType::Float32 => {
                let values: Vec<f32> = data.iter().map(|&v| v as f32).collect();
                array
                    .store_array_subset_elements(subset, &values)
                    .map_err(map_err)
            }
            other => Err(RegridError::storage(format!(
                "unsupported data type {:?}",
                other
            ))),
        }
    }
}

fn array_path(name: &str) -> String {
    format!("/{}", name)
}

fn dims(array: &Array<FilesystemStore>) -> Vec<usize> {
    array.shape().iter().map(|&d| d as usize).collect()
}

fn whole(shape: &[usize]) -> Result<ArraySubset> {
    ArraySubset::new_with_start_shape(
        vec![0; shape.len()],
        shape.iter().map(|&d| d as u64).collect(),
    )
    .map_err(|e| RegridError::storage(e.to_string()))
}

impl RecordSource for ZarrStore {
    fn contains(&self, name: &str) -> bool {
        self.root.join(name).join("zarr.json").is_file()
    }

    fn shape(&self, name: &str) -> Result<Vec<usize>> {
        Ok(dims(&self.open_array(name)?))
    }

    fn read_variable(&self, name: &str) -> Result<ArrayD<f64>> {
        let array = self.open_array(name)?;
        let shape = dims(&array);
        let values = self.retrieve(&array, &whole(&shape)?)?;
        Ok(ArrayD::from_shape_vec(IxDyn(&shape), values)?)
    }

    fn read_record(&self, name: &str, record: usize) -> Result<ArrayD<f64>> {
        let array = self.open_array(name)?;
        let shape = dims(&array);
        check_record(name, &shape, record)?;

        let mut start = vec![0u64; shape.len()];
        start[0] = record as u64;
        let mut extent: Vec<u64> = shape.iter().map(|&d| d as u64).collect();
        extent[0] = 1;
        let subset = ArraySubset::new_with_start_shape(start, extent)
            .map_err(|e| RegridError::storage(e.to_string()))?;

        let values = self.retrieve(&array, &subset)?;
        Ok(ArrayD::from_shape_vec(IxDyn(&shape[1..]), values)?)
    }

    fn attribute(&self, name: &str, key: &str) -> Option<Value> {
        let array = self.open_array(name).ok()?;
        array.attributes().get(key).cloned()
    }
}

impl RecordStore for ZarrStore {
    fn create_variable(
        &mut self,
        name: &str,
        shape: &[usize],
        attributes: Map<String, Value>,
    ) -> Result<()> {
        if self.contains(name) {
            let existing = self.shape(name)?;
            if existing != shape {
                return Err(RegridError::shape_mismatch(&existing, shape));
            }
            return Ok(());
        }

        let array = self.build_array(name, shape, attributes)?;
        array
            .store_metadata()
            .map_err(|e| RegridError::storage(e.to_string()))?;

        debug!(variable = name, shape = ?shape, "Created Zarr array");
        Ok(())
    }

    fn write_variable(&mut self, name: &str, data: ArrayViewD<'_, f64>) -> Result<()> {
        if !self.contains(name) {
            self.create_variable(name, data.shape(), Map::new())?;
        }
        let array = self.open_array(name)?;
        let shape = dims(&array);
        if shape != data.shape() {
            return Err(RegridError::shape_mismatch(&shape, data.shape()));
        }
        self.assign(&array, &whole(&shape)?, data)
    }

    fn write_record(&mut self, name: &str, record: usize, data: ArrayViewD<'_, f64>) -> Result<()> {
        let array = self.open_array(name)?;
        let shape = dims(&array);
        check_record(name, &shape, record)?;
        if shape[1..] != *data.shape() {
            return Err(RegridError::shape_mismatch(&shape[1..], data.shape()));
        }

        let mut start = vec![0u64; shape.len()];
        start[0] = record as u64;
        let extent: Vec<u64> = std::iter::once(1)
            .chain(data.shape().iter().map(|&d| d as u64))
            .collect();
        let subset = ArraySubset::new_with_start_shape(start, extent)
            .map_err(|e| RegridError::storage(e.to_string()))?;

        self.assign(&array, &subset, data)
    }
}
