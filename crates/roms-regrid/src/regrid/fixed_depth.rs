//! Regridding onto fixed-depth (z-level) grids.
//!
//! The destination grid is resolved before anything is written: an explicit
//! grid wins, then a z-level grid already stored in the output, then one
//! synthesised from the source rho points and a depth list. A new output is
//! provisioned with the grid variables, one variable per mapped field and the
//! time axis. Depth masking is always applied.

use ndarray::{Array1, Axis};
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::{select_records, RegridOptions, RegridSummary, Regridder};
use crate::config::RegridConfig;
use crate::error::{RegridError, Result};
use crate::fields::VariableMap;
use crate::grid::Grid;
use crate::kernel::InterpolationKernel;
use crate::store::{RecordSource, RecordStore};
use crate::time::find_time_variable;

/// Destination of a fixed-depth run.
#[derive(Debug, Clone, Default)]
pub struct FixedDepthTarget {
    /// Identity of the destination grid, used for the weight cache key.
    pub name: String,
    /// Explicit destination grid.
    pub grid: Option<Grid>,
    /// Depth levels (negative below the surface) for a synthesised grid.
    pub depths: Option<Vec<f64>>,
}

impl FixedDepthTarget {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_grid(mut self, grid: Grid) -> Self {
        self.grid = Some(grid);
        self
    }

    pub fn with_depths(mut self, depths: Vec<f64>) -> Self {
        self.depths = Some(depths);
        self
    }
}

impl<K: InterpolationKernel> Regridder<K> {
    /// Regrid `source` onto a z-level grid, creating the output layout when
    /// the store does not hold one yet.
    pub fn run_to_fixed_depth<S, D>(
        &self,
        source_grid: &Grid,
        source: &S,
        output: &mut D,
        target: &FixedDepthTarget,
        options: &RegridOptions,
    ) -> Result<RegridSummary>
    where
        S: RecordSource + ?Sized,
        D: RecordStore + ?Sized,
    {
        let grid = resolve_grid(source_grid, &*output, target)?;
        if grid.levels().is_none() {
            return Err(RegridError::missing_input(format!(
                "destination grid {} has no depth levels",
                grid.name()
            )));
        }

        if !output.contains("lon") {
            self.provision(&grid, source, output, options)?;
        }

        let options = RegridOptions {
            apply_depth_mask: true,
            ..options.clone()
        };
        self.run(source_grid, &grid, source, output, &options)
    }

    /// Write the grid variables and create every mapped field and the time
    /// axis, sized for the selected records.
    fn provision<S, D>(
        &self,
        grid: &Grid,
        source: &S,
        output: &mut D,
        options: &RegridOptions,
    ) -> Result<()>
    where
        S: RecordSource + ?Sized,
        D: RecordStore + ?Sized,
    {
        let variable_map = options
            .variable_map
            .clone()
            .unwrap_or_else(|| VariableMap::identity(&self.fields));
        let time_var = find_time_variable(source, &self.config.time_variables);
        let records = select_records(source, time_var, &variable_map, options.records.as_deref())?
            .len();

        let rho = grid.rho();
        let depth = rho.depth()?;
        let (levels, rows, cols) = depth.dim();
        let axis: Array1<f64> = depth.index_axis(Axis(1), 0).index_axis(Axis(1), 0).to_owned();

        output.write_variable("lon", rho.lon.view().into_dyn())?;
        output.write_variable("lat", rho.lat.view().into_dyn())?;
        output.write_variable(
            "mask",
            rho.water.mapv(|w| if w { 1.0 } else { 0.0 }).into_dyn().view(),
        )?;
        output.write_variable("depth", axis.view().into_dyn())?;

        let mut created = 0;
        for (src_name, dst_name) in variable_map.iter() {
            let Some(field) = self.describe(src_name, dst_name) else {
                continue;
            };
            if !source.contains(src_name) {
                continue;
            }
            let shape = match field.dims {
                2 => vec![records, rows, cols],
                _ => vec![records, levels, rows, cols],
            };
            output.create_variable(dst_name, &shape, copy_units(source, src_name))?;
            created += 1;
        }

        let attributes = match time_var {
            Some(name) => copy_units(source, name),
            None => Map::new(),
        };
        // Validation guarantees at least one name.
        if let Some(time_name) = self.config.output_time_variables.first() {
            output.create_variable(time_name, &[records], attributes)?;
        }

        info!(
            grid = grid.name(),
            levels,
            records,
            fields = created,
            "Provisioned fixed-depth output"
        );
        Ok(())
    }
}

/// Regrid onto a fixed-depth grid with the default kernel.
pub fn regrid_to_fixed_depth<S, D>(
    config: RegridConfig,
    source_grid: &Grid,
    source: &S,
    output: &mut D,
    target: &FixedDepthTarget,
    options: RegridOptions,
) -> Result<RegridSummary>
where
    S: RecordSource + ?Sized,
    D: RecordStore + ?Sized,
{
    Regridder::new(config)?.run_to_fixed_depth(source_grid, source, output, target, &options)
}

fn resolve_grid<D: RecordSource + ?Sized>(
    source_grid: &Grid,
    output: &D,
    target: &FixedDepthTarget,
) -> Result<Grid> {
    if let Some(grid) = &target.grid {
        debug!(grid = grid.name(), "Using explicit fixed-depth grid");
        return Ok(grid.clone());
    }

    if output.contains("lon") && output.contains("depth") {
        debug!(grid = %target.name, "Loading fixed-depth grid from output");
        return Grid::from_store(output, target.name.clone());
    }

    let depths = target
        .depths
        .as_deref()
        .filter(|d| !d.is_empty())
        .ok_or_else(|| {
            RegridError::missing_input(
                "depth levels are required when no fixed-depth grid is given or stored",
            )
        })?;

    let rho = source_grid.rho();
    debug!(grid = %target.name, levels = depths.len(), "Synthesising fixed-depth grid");
    Grid::z_level(
        target.name.clone(),
        rho.lon.clone(),
        rho.lat.clone(),
        rho.water.clone(),
        depths,
    )
}

fn copy_units<S: RecordSource + ?Sized>(source: &S, name: &str) -> Map<String, Value> {
    let mut attributes = Map::new();
    if let Some(units) = source.attribute(name, "units") {
        attributes.insert("units".to_string(), units);
    }
    attributes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::testdata;
    use ndarray::Array3;
    use serde_json::json;

    fn config() -> RegridConfig {
        RegridConfig {
            cache_dir: None,
            kernel_width: 4,
            ..Default::default()
        }
    }

    fn source() -> MemoryStore {
        let mut store = MemoryStore::new()
            .with_variable("ocean_time", testdata::time_axis(2, 86400.0))
            .with_variable("zeta", Array3::from_elem((2, 4, 5), 0.25))
            .with_variable("temp", testdata::uniform_records(2, 2, 4, 5, 12.0));
        store
            .set_attribute("ocean_time", "units", json!("seconds since 2000-01-01"))
            .unwrap();
        store
    }

    #[test]
    fn test_missing_depths_fails_before_writing() {
        let grid = testdata::sigma_grid("roms", 4, 5, &[-0.75, -0.25]);
        let mut out = MemoryStore::new();

        let result = regrid_to_fixed_depth(
            config(),
            &grid,
            &source(),
            &mut out,
            &FixedDepthTarget::named("z"),
            RegridOptions::default(),
        );
        assert!(matches!(result, Err(RegridError::MissingInput(_))));
        assert_eq!(out.names().count(), 0);
    }

    #[test]
    fn test_synthesised_grid_provisions_and_masks() {
        let grid = testdata::sigma_grid("roms", 4, 5, &[-0.75, -0.25]);
        let mut out = MemoryStore::new();
        let target = FixedDepthTarget::named("z").with_depths(vec![-10.0, -50.0, -90.0]);

        let summary = regrid_to_fixed_depth(
            config(),
            &grid,
            &source(),
            &mut out,
            &target,
            RegridOptions::default(),
        )
        .unwrap();

        assert_eq!(summary.fields, vec!["temp", "zeta"]);
        assert_eq!(summary.time_variables, vec!["time"]);
        for name in ["lon", "lat", "mask", "depth", "time"] {
            assert!(out.contains(name), "{} not provisioned", name);
        }
        assert_eq!(out.attribute("time", "units"), Some(json!("seconds since 2000-01-01")));

        let temp = out.read_variable("temp").unwrap();
        assert_eq!(temp.shape(), &[2, 3, 4, 5]);
        assert!((temp[[1, 0, 2, 2]] - 12.0).abs() < 1e-9);
        assert!((temp[[1, 1, 2, 2]] - 12.0).abs() < 1e-9);
        // Below the 75 m source floor.
        assert!(temp[[1, 2, 2, 2]].is_nan());
    }

    #[test]
    fn test_stored_grid_reused() {
        let grid = testdata::sigma_grid("roms", 4, 5, &[-0.75, -0.25]);
        let mut out = MemoryStore::new();
        let target = FixedDepthTarget::named("z").with_depths(vec![-10.0, -50.0]);
        regrid_to_fixed_depth(config(), &grid, &source(), &mut out, &target, RegridOptions::default())
            .unwrap();

        // No depths this time: the grid comes from the output store.
        let summary = regrid_to_fixed_depth(
            config(),
            &grid,
            &source(),
            &mut out,
            &FixedDepthTarget::named("z"),
            RegridOptions::default(),
        )
        .unwrap();
        assert_eq!(summary.records, 2);
    }

    #[test]
    fn test_explicit_grid_without_levels_rejected() {
        let grid = testdata::sigma_grid("roms", 4, 5, &[-0.75, -0.25]);
        let flat = Grid::unstaggered("flat", testdata::points(4, 5)).unwrap();
        let mut out = MemoryStore::new();

        let result = regrid_to_fixed_depth(
            config(),
            &grid,
            &source(),
            &mut out,
            &FixedDepthTarget::named("flat").with_grid(flat),
            RegridOptions::default(),
        );
        assert!(matches!(result, Err(RegridError::MissingInput(_))));
    }
}
