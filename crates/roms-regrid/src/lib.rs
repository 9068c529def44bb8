//! Regridding of ROMS model output.
//!
//! Moves fields between terrain-following C-grids and onto fixed-depth
//! (z-level) grids:
//!
//! - **Horizontal**: Gaussian-weighted blending through precomputed weight
//!   maps, cached on disk per grid pair
//! - **Vertical**: linear interpolation between depth coordinate systems,
//!   with synthetic boundary levels so near-surface and near-seabed levels
//!   stay resolvable
//! - **Land/sea**: water values are convolved over land before blending
//! - **Velocity**: rotation to and from grid-relative frames and C-grid
//!   restaggering
//! - **Records**: a fixed-size worker pool processes one time record per task
//!
//! # Architecture
//!
//! ```text
//! Regridder::run(source grid, destination grid, source store, output store)
//!      │
//!      ├─► WeightCache::get_or_build  (rho, u, v weight maps, once)
//!      │
//!      ├─► for each mapped field
//!      │         │
//!      │         ├─► read selected records
//!      │         ├─► interpolate_2d / interpolate_3d on the worker pool
//!      │         ├─► depth mask (fixed-depth runs)
//!      │         └─► write the series
//!      │
//!      ├─► u/v pair: interpolate_vector → restagger → ubar/vbar
//!      │
//!      └─► time axis
//! ```
//!
//! # Example
//!
//! ```ignore
//! use roms_regrid::{Grid, RegridConfig, RegridOptions, Regridder, ZarrStore};
//!
//! let source = ZarrStore::open("his.zarr", Default::default())?;
//! let mut output = ZarrStore::open("child.zarr", Default::default())?;
//! let parent = Grid::from_store(&source, "parent")?;
//! let child = Grid::from_store(&output, "child")?;
//!
//! let summary = Regridder::new(RegridConfig::default())?
//!     .run(&parent, &child, &source, &mut output, &RegridOptions::default())?;
//! ```

pub mod cache;
pub mod config;
pub mod depth_mask;
pub mod error;
pub mod fields;
pub mod grid;
pub mod interp;
pub mod kernel;
pub mod regrid;
pub mod store;
#[doc(hidden)]
pub mod testdata;
pub mod time;
pub mod types;

// Re-export commonly used types at crate root
pub use cache::{CacheKey, WeightCache, WeightSet};
pub use config::{RegridConfig, StoreConfig, ZarrCompression};
pub use depth_mask::mask_below_source_depth;
pub use error::{RegridError, Result};
pub use fields::{FieldDescriptor, FieldTable, VariableMap};
pub use grid::{Grid, GridPoints};
pub use interp::InterpContext;
pub use kernel::{GaussianKernel, InterpolationKernel, KernelParams, WeightMap};
pub use regrid::{
    regrid, regrid_to_fixed_depth, FixedDepthTarget, RegridOptions, RegridSummary, Regridder,
};
pub use store::{MemoryStore, RecordSource, RecordStore, ZarrStore};
pub use types::{Masked, Masked2, Masked3, Staggering};
