//! Record-parallel regridding of whole stores.
//!
//! A run builds or loads the weight maps of a grid pair once. For every
//! mapped field it then reads the selected records, interpolates them on a
//! fixed-size worker pool and writes the series after every worker has
//! returned. Workers only see their own slice and shared read-only state;
//! the output store is written from the calling thread alone.

mod fixed_depth;
mod options;

use ndarray::{Array2, Array3, Dimension, Ix2, Ix3};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, info, warn};

use crate::cache::{resolve_decorrelation, CacheKey, WeightCache, WeightSet};
use crate::config::RegridConfig;
use crate::depth_mask::{column_floor, mask_below_floor, regrid_floor};
use crate::error::{RegridError, Result};
use crate::fields::{FieldDescriptor, FieldTable, VariableMap};
use crate::grid::Grid;
use crate::interp::{
    depth_average, interpolate_2d, interpolate_3d, interpolate_vector, restagger, InterpContext,
};
use crate::kernel::{GaussianKernel, InterpolationKernel, KernelParams, WeightMap};
use crate::store::{
    read_masked, record_count, stack_records, write_masked, RecordSource, RecordStore,
};
use crate::time::{find_time_variable, propagate_time};
use crate::types::{Masked, Masked2, Masked3, Staggering};

pub use fixed_depth::{regrid_to_fixed_depth, FixedDepthTarget};
pub use options::{RegridOptions, RegridSummary};

/// Regrids stores between two grids.
///
/// Holds the interpolation kernel, the field table and the run
/// configuration; grids and stores are supplied per call.
pub struct Regridder<K = GaussianKernel> {
    kernel: K,
    fields: FieldTable,
    config: RegridConfig,
}

impl Regridder<GaussianKernel> {
    /// Create a regridder with the default kernel and field table.
    pub fn new(config: RegridConfig) -> Result<Self> {
        config.validate().map_err(RegridError::InvalidConfig)?;
        Ok(Self {
            kernel: GaussianKernel::new(),
            fields: FieldTable::default(),
            config,
        })
    }
}

impl<K: InterpolationKernel> Regridder<K> {
    /// Replace the interpolation kernel.
    pub fn with_kernel<K2: InterpolationKernel>(self, kernel: K2) -> Regridder<K2> {
        Regridder {
            kernel,
            fields: self.fields,
            config: self.config,
        }
    }

    /// Replace the field table.
    pub fn with_fields(mut self, fields: FieldTable) -> Self {
        self.fields = fields;
        self
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    pub fn fields(&self) -> &FieldTable {
        &self.fields
    }

    pub fn config(&self) -> &RegridConfig {
        &self.config
    }

    /// Regrid every mapped field of `source` into `output`.
    ///
    /// Only fields whose destination variable already exists in `output`
    /// are written. Scalar series are assigned in one write per field;
    /// velocity pairs and their depth averages are written record by record.
    /// Output record `i` holds source record `records[i]`.
    pub fn run<S, D>(
        &self,
        source_grid: &Grid,
        destination_grid: &Grid,
        source: &S,
        output: &mut D,
        options: &RegridOptions,
    ) -> Result<RegridSummary>
    where
        S: RecordSource + ?Sized,
        D: RecordStore + ?Sized,
    {
        let variable_map = options
            .variable_map
            .clone()
            .unwrap_or_else(|| VariableMap::identity(&self.fields));
        let time_var = find_time_variable(source, &self.config.time_variables);
        let records = select_records(source, time_var, &variable_map, options.records.as_deref())?;
        let workers = match options.worker_count {
            0 => self.config.worker_count,
            n => n,
        };

        info!(
            source = source_grid.name(),
            destination = destination_grid.name(),
            records = records.len(),
            workers,
            "Starting regrid"
        );

        let (decorrelation_x, decorrelation_y) = resolve_decorrelation(
            options.decorrelation_x,
            options.decorrelation_y,
            source_grid,
            destination_grid,
        );
        let params = KernelParams {
            kernel_width: self.config.kernel_width,
            decorrelation_x,
            decorrelation_y,
        };
        let cache = WeightCache::new(
            CacheKey::for_grids(source_grid, destination_grid),
            self.config.cache_dir.clone(),
        );
        let (weights, weights_from_cache) =
            cache.get_or_build(&self.kernel, source_grid, destination_grid, &params)?;

        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|e| RegridError::InvalidConfig(format!("worker pool: {}", e)))?;

        let run = Run {
            ctx: InterpContext::new(&self.kernel, params, self.config.land_fill_kernel),
            source_grid,
            destination_grid,
            weights: &weights,
            records: &records,
            pool: &pool,
            apply_depth_mask: options.apply_depth_mask,
        };

        let mut fields = Vec::new();
        for (src_name, dst_name) in variable_map.iter() {
            let Some(field) = self.describe(src_name, dst_name) else {
                debug!(field = src_name, "No descriptor for field, skipping");
                continue;
            };
            if field.rotation {
                continue;
            }
            if !source.contains(src_name) || !output.contains(dst_name) {
                debug!(field = src_name, destination = dst_name, "Field absent, skipping");
                continue;
            }

            debug!(
                field = src_name,
                destination = dst_name,
                dims = field.dims,
                staggering = %field.staggering,
                "Regridding field"
            );
            let written = match field.dims {
                2 => run.scalar_2d(source, output, src_name, dst_name, field.staggering)?,
                _ => run.scalar_3d(source, output, src_name, dst_name, field.staggering)?,
            };
            if written {
                fields.push(dst_name.to_string());
            }
        }

        fields.extend(run.vectors(source, output, &variable_map)?);

        let mut time_variables = Vec::new();
        if let Some(name) = time_var {
            for target in &self.config.output_time_variables {
                if propagate_time(source, name, &records, output, target)? {
                    time_variables.push(target.clone());
                }
            }
        }

        let summary = RegridSummary {
            records: records.len(),
            fields,
            weights_from_cache,
            time_variables,
        };
        info!(
            records = summary.records,
            fields = ?summary.fields,
            weights_from_cache,
            time_variables = ?summary.time_variables,
            "Regrid complete"
        );
        Ok(summary)
    }

    /// Descriptor of a mapped field, looked up by source then destination name.
    fn describe(&self, source: &str, destination: &str) -> Option<&FieldDescriptor> {
        self.fields
            .get(source)
            .or_else(|| self.fields.get(destination))
    }
}

/// Regrid with the default kernel, without depth masking.
pub fn regrid<S, D>(
    config: RegridConfig,
    source_grid: &Grid,
    destination_grid: &Grid,
    source: &S,
    output: &mut D,
    options: RegridOptions,
) -> Result<RegridSummary>
where
    S: RecordSource + ?Sized,
    D: RecordStore + ?Sized,
{
    let options = RegridOptions {
        apply_depth_mask: false,
        ..options
    };
    Regridder::new(config)?.run(source_grid, destination_grid, source, output, &options)
}

/// Records to process: the requested ones, checked against the time axis, or
/// every record of the first time variable (else the first mapped field).
fn select_records<S: RecordSource + ?Sized>(
    source: &S,
    time_var: Option<&str>,
    variable_map: &VariableMap,
    requested: Option<&[usize]>,
) -> Result<Vec<usize>> {
    let axis = time_var.or_else(|| {
        variable_map
            .iter()
            .map(|(name, _)| name)
            .find(|name| source.contains(name))
    });
    let available = match axis {
        Some(name) => Some(record_count(source, name)?),
        None => None,
    };

    match (requested, available) {
        (Some(records), Some(available)) => {
            if let Some(&record) = records.iter().find(|&&r| r >= available) {
                return Err(RegridError::RecordOutOfRange { record, available });
            }
            Ok(records.to_vec())
        }
        (Some(records), None) => Ok(records.to_vec()),
        (None, Some(available)) => Ok((0..available).collect()),
        (None, None) => Err(RegridError::missing_input(
            "source has no time axis and no mapped field to count records from",
        )),
    }
}

/// Read the selected records of a field. A field whose records have the
/// wrong dimensionality is logged and skipped (`None`).
fn read_slices<D, S>(source: &S, name: &str, records: &[usize]) -> Result<Option<Vec<Masked<D>>>>
where
    D: Dimension,
    S: RecordSource + ?Sized,
{
    let mut slices = Vec::with_capacity(records.len());
    for &record in records {
        match read_masked::<D, S>(source, name, record) {
            Ok(slice) => slices.push(slice),
            Err(e @ RegridError::IncompatibleField { .. }) => {
                warn!(field = name, error = %e, "Skipping field");
                return Ok(None);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(Some(slices))
}

/// Write a series: one assignment when it covers the whole variable,
/// otherwise record by record from index 0.
fn write_series<D, S>(output: &mut S, name: &str, series: &[Masked<D>]) -> Result<()>
where
    D: Dimension,
    S: RecordStore + ?Sized,
{
    let stacked = stack_records(series)?;
    if output.shape(name)? == stacked.shape() {
        return output.write_variable(name, stacked.view());
    }
    for (i, slice) in series.iter().enumerate() {
        write_masked(output, name, i, slice)?;
    }
    Ok(())
}

/// Shared state of one run.
struct Run<'a> {
    ctx: InterpContext<'a>,
    source_grid: &'a Grid,
    destination_grid: &'a Grid,
    weights: &'a WeightSet,
    records: &'a [usize],
    pool: &'a ThreadPool,
    apply_depth_mask: bool,
}

impl Run<'_> {
    /// Run `task` over one input per selected record on the worker pool.
    ///
    /// Results keep the record order. The first failure is returned wrapped
    /// with its field and record.
    fn map_records<T, R, F>(&self, field: &str, inputs: &[T], task: F) -> Result<Vec<R>>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> Result<R> + Sync,
    {
        self.pool.install(|| {
            inputs
                .par_iter()
                .zip(self.records.par_iter())
                .map(|(input, &record)| {
                    task(input).map_err(|e| RegridError::worker(field, record, e))
                })
                .collect()
        })
    }

    fn scalar_2d<S, D>(
        &self,
        source: &S,
        output: &mut D,
        src_name: &str,
        dst_name: &str,
        staggering: Staggering,
    ) -> Result<bool>
    where
        S: RecordSource + ?Sized,
        D: RecordStore + ?Sized,
    {
        let Some(slices) = read_slices::<Ix2, S>(source, src_name, self.records)? else {
            return Ok(false);
        };
        let src = self.source_grid.points(staggering);
        let dst = self.destination_grid.points(staggering);
        let weights = self.weights.get(staggering);

        let results = self.map_records(src_name, &slices, |slice: &Masked2| {
            interpolate_2d(&self.ctx, src, slice, dst, weights)
        })?;
        write_series(output, dst_name, &results)?;
        Ok(true)
    }

    fn scalar_3d<S, D>(
        &self,
        source: &S,
        output: &mut D,
        src_name: &str,
        dst_name: &str,
        staggering: Staggering,
    ) -> Result<bool>
    where
        S: RecordSource + ?Sized,
        D: RecordStore + ?Sized,
    {
        let Some(slices) = read_slices::<Ix3, S>(source, src_name, self.records)? else {
            return Ok(false);
        };
        let src = self.source_grid.points(staggering);
        let dst = self.destination_grid.points(staggering);
        let weights = self.weights.get(staggering);

        let mut results = self.map_records(src_name, &slices, |slice: &Masked3| {
            interpolate_3d(&self.ctx, src, slice, dst, weights, 1.0)
        })?;

        if self.apply_depth_mask {
            let (floor, dst_depth) = self.depth_floor(staggering)?;
            let mut masked = 0;
            for result in &mut results {
                masked += mask_below_floor(result, &floor, dst_depth)?;
            }
            debug!(field = src_name, masked, "Applied depth mask");
        }

        write_series(output, dst_name, &results)?;
        Ok(true)
    }

    /// Regrid the `u`/`v` pair and any `ubar`/`vbar` derived from it.
    /// Returns the destination variables written.
    fn vectors<S, D>(
        &self,
        source: &S,
        output: &mut D,
        variable_map: &VariableMap,
    ) -> Result<Vec<String>>
    where
        S: RecordSource + ?Sized,
        D: RecordStore + ?Sized,
    {
        let (Some(u_name), Some(v_name)) = (variable_map.destination("u"), variable_map.destination("v"))
        else {
            return Ok(Vec::new());
        };
        if !(source.contains("u") && source.contains("v")) {
            debug!("Velocity absent from source, skipping");
            return Ok(Vec::new());
        }
        if !(output.contains(u_name) && output.contains(v_name)) {
            debug!(u = u_name, v = v_name, "Velocity absent from output, skipping");
            return Ok(Vec::new());
        }

        let Some(u) = read_slices::<Ix3, S>(source, "u", self.records)? else {
            return Ok(Vec::new());
        };
        let Some(v) = read_slices::<Ix3, S>(source, "v", self.records)? else {
            return Ok(Vec::new());
        };
        let pairs: Vec<(Masked3, Masked3)> = u.into_iter().zip(v).collect();

        let rho_weights = self.weights.get(Staggering::Rho);
        let velocities = self.map_records("u", &pairs, |(u, v): &(Masked3, Masked3)| {
            interpolate_vector(
                &self.ctx,
                self.source_grid,
                u,
                v,
                self.destination_grid,
                rho_weights,
            )
        })?;

        let floor = if self.apply_depth_mask {
            Some(self.depth_floor(Staggering::Rho)?)
        } else {
            None
        };

        let ubar = self.bar_target(&*output, variable_map, "ubar", Staggering::U)?;
        let vbar = self.bar_target(&*output, variable_map, "vbar", Staggering::V)?;

        for (j, (mut u, mut v)) in velocities.into_iter().enumerate() {
            if let Some((floor, dst_depth)) = &floor {
                mask_below_floor(&mut u, floor, dst_depth)?;
                mask_below_floor(&mut v, floor, dst_depth)?;
            }
            let (u, v) = restagger(u, v, self.destination_grid);
            write_masked(output, u_name, j, &u)?;
            write_masked(output, v_name, j, &v)?;

            if let Some((name, depth)) = &ubar {
                write_masked(output, name, j, &depth_average(&u, depth)?)?;
            }
            if let Some((name, depth)) = &vbar {
                write_masked(output, name, j, &depth_average(&v, depth)?)?;
            }
        }

        let mut written = vec![u_name.to_string(), v_name.to_string()];
        written.extend(ubar.map(|(name, _)| name));
        written.extend(vbar.map(|(name, _)| name));
        Ok(written)
    }

    /// Destination name and depths of a depth-averaged component, when the
    /// output holds it.
    fn bar_target<D: RecordStore + ?Sized>(
        &self,
        output: &D,
        variable_map: &VariableMap,
        name: &str,
        staggering: Staggering,
    ) -> Result<Option<(String, &Array3<f64>)>> {
        match variable_map.destination(name).filter(|d| output.contains(d)) {
            Some(d) => Ok(Some((
                d.to_string(),
                self.destination_grid.points(staggering).depth()?,
            ))),
            None => Ok(None),
        }
    }

    /// Deepest source level per destination column, and the destination
    /// depths it is compared against.
    ///
    /// Grids with equal extents compare column by column; otherwise the
    /// source floor is carried across with the staggering's weight map.
    fn depth_floor(&self, staggering: Staggering) -> Result<(Array2<f64>, &Array3<f64>)> {
        let dst_depth = self.destination_grid.points(staggering).depth()?;
        let floor = destination_floor(
            self.source_grid,
            self.destination_grid,
            self.weights.get(staggering),
            staggering,
        )?;
        Ok((floor, dst_depth))
    }
}

/// Source seabed on destination points.
///
/// Columns are compared one to one only when both grids share the same
/// horizontal points: the same grid name, or identical coordinates. Any
/// other pair goes through the weight map, even when the extents agree.
fn destination_floor(
    source: &Grid,
    destination: &Grid,
    weights: &WeightMap,
    staggering: Staggering,
) -> Result<Array2<f64>> {
    let src = source.points(staggering);
    let dst = destination.points(staggering);
    let floor = column_floor(src.depth()?);

    let same_points = src.dim() == dst.dim()
        && (source.name() == destination.name() || (src.lon == dst.lon && src.lat == dst.lat));
    if same_points {
        Ok(floor)
    } else {
        Ok(regrid_floor(&floor, weights))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::testdata;
    use ndarray::{Array1, Array3, Array4};

    fn config() -> RegridConfig {
        RegridConfig {
            cache_dir: None,
            kernel_width: 4,
            ..Default::default()
        }
    }

    fn source(records: usize) -> MemoryStore {
        MemoryStore::new()
            .with_variable("ocean_time", testdata::time_axis(records, 3600.0))
            .with_variable("zeta", Array3::from_elem((records, 4, 5), 0.5))
            .with_variable("temp", testdata::uniform_records(records, 2, 4, 5, 12.0))
    }

    #[test]
    fn test_select_records_defaults_to_time_axis() {
        let store = source(3);
        let map = VariableMap::default();
        assert_eq!(select_records(&store, Some("ocean_time"), &map, None).unwrap(), vec![0, 1, 2]);
        assert_eq!(select_records(&store, None, &map, None).unwrap(), vec![0, 1, 2]);
        assert_eq!(select_records(&store, None, &map, Some(&[2, 0])).unwrap(), vec![2, 0]);
        assert!(matches!(
            select_records(&store, Some("ocean_time"), &map, Some(&[3])),
            Err(RegridError::RecordOutOfRange { record: 3, available: 3 })
        ));
        assert!(matches!(
            select_records(&MemoryStore::new(), None, &map, None),
            Err(RegridError::MissingInput(_))
        ));
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = RegridConfig {
            worker_count: 0,
            ..Default::default()
        };
        assert!(matches!(Regridder::new(config), Err(RegridError::InvalidConfig(_))));
    }

    #[test]
    fn test_only_existing_destinations_written() {
        let grid = testdata::sigma_grid("g", 4, 5, &[-0.75, -0.25]);
        let src = source(2);
        let mut out = MemoryStore::new().with_variable("temp", Array4::<f64>::zeros((2, 2, 4, 5)));

        let summary = Regridder::new(config())
            .unwrap()
            .run(&grid, &grid, &src, &mut out, &RegridOptions::default())
            .unwrap();

        assert_eq!(summary.fields, vec!["temp"]);
        assert_eq!(summary.records, 2);
        assert!(!out.contains("zeta"));
        let temp = out.read_variable("temp").unwrap();
        assert!(temp.iter().all(|v| (v - 12.0).abs() < 1e-9));
    }

    #[test]
    fn test_renamed_destination_uses_source_descriptor() {
        let grid = testdata::sigma_grid("g", 4, 5, &[-0.75, -0.25]);
        let src = source(1);
        let mut out =
            MemoryStore::new().with_variable("temperature", Array4::<f64>::zeros((1, 2, 4, 5)));
        let options = RegridOptions::default()
            .with_variable_map(VariableMap::new().with("temp", "temperature"));

        let summary = Regridder::new(config())
            .unwrap()
            .run(&grid, &grid, &src, &mut out, &options)
            .unwrap();
        assert_eq!(summary.fields, vec!["temperature"]);
    }

    #[test]
    fn test_wrong_rank_field_skipped() {
        let grid = testdata::sigma_grid("g", 4, 5, &[-0.75, -0.25]);
        // temp stored without its level axis
        let src = MemoryStore::new()
            .with_variable("ocean_time", Array1::from(vec![0.0]))
            .with_variable("temp", Array3::from_elem((1, 4, 5), 1.0));
        let mut out = MemoryStore::new().with_variable("temp", Array4::<f64>::zeros((1, 2, 4, 5)));

        let summary = Regridder::new(config())
            .unwrap()
            .run(&grid, &grid, &src, &mut out, &RegridOptions::default())
            .unwrap();
        assert!(summary.fields.is_empty());
    }

    #[test]
    fn test_partial_selection_written_from_first_record() {
        let grid = testdata::sigma_grid("g", 4, 5, &[-0.75, -0.25]);
        let mut src = source(3);
        src.insert("zeta", Array3::from_shape_fn((3, 4, 5), |(t, _, _)| t as f64));
        let mut out = MemoryStore::new().with_variable("zeta", Array3::from_elem((3, 4, 5), -1.0));
        let options = RegridOptions::default().with_records(vec![2]);

        Regridder::new(config())
            .unwrap()
            .run(&grid, &grid, &src, &mut out, &options)
            .unwrap();

        let zeta = out.read_variable("zeta").unwrap();
        assert!((zeta[[0, 1, 1]] - 2.0).abs() < 1e-9);
        assert_eq!(zeta[[1, 1, 1]], -1.0);
    }

    #[test]
    fn test_time_axis_written() {
        let grid = testdata::sigma_grid("g", 4, 5, &[-0.75, -0.25]);
        let src = source(2);
        let mut out = MemoryStore::new()
            .with_variable("zeta", Array3::<f64>::zeros((2, 4, 5)))
            .with_variable("time", Array1::<f64>::zeros(2));

        let summary = Regridder::new(config())
            .unwrap()
            .run(&grid, &grid, &src, &mut out, &RegridOptions::default())
            .unwrap();
        assert_eq!(summary.time_variables, vec!["time"]);
        let time: Vec<f64> = out.read_variable("time").unwrap().iter().copied().collect();
        assert_eq!(time, vec![0.0, 3600.0]);
    }

    #[test]
    fn test_every_present_time_axis_written() {
        let grid = testdata::sigma_grid("g", 4, 5, &[-0.75, -0.25]);
        let src = source(2);
        let mut out = MemoryStore::new()
            .with_variable("zeta", Array3::<f64>::zeros((2, 4, 5)))
            .with_variable("temp_time", Array1::<f64>::zeros(2))
            .with_variable("zeta_time", Array1::<f64>::zeros(2))
            .with_variable("ocean_time", Array1::<f64>::zeros(2));

        let summary = Regridder::new(config())
            .unwrap()
            .run(&grid, &grid, &src, &mut out, &RegridOptions::default())
            .unwrap();

        assert_eq!(summary.time_variables, vec!["ocean_time", "zeta_time", "temp_time"]);
        for name in &summary.time_variables {
            let time: Vec<f64> = out.read_variable(name).unwrap().iter().copied().collect();
            assert_eq!(time, vec![0.0, 3600.0], "{}", name);
        }
        assert!(!out.contains("time"));
    }

    /// Unstaggered 4 x 6 grid whose seabed deepens by 20 m per column.
    fn sloped_grid(name: &str, lon_offset: f64) -> Grid {
        let mut points = testdata::points(4, 6);
        points.lon.mapv_inplace(|lon| lon + lon_offset);
        let depth =
            Array3::from_shape_fn((2, 4, 6), |(k, _, c)| -(20.0 + 20.0 * c as f64) / (k + 1) as f64);
        Grid::unstaggered(name, points.with_depth(depth)).unwrap()
    }

    fn floor_weights(source: &Grid, destination: &Grid) -> WeightMap {
        let params = KernelParams {
            kernel_width: 4,
            decorrelation_x: 2.0,
            decorrelation_y: 2.0,
        };
        let unit = Array2::<f64>::ones(source.rho().dim());
        let (_, weights) = GaussianKernel::new()
            .surface(source.rho().coords(), unit.view(), destination.rho().coords(), None, &params)
            .unwrap();
        weights.into_owned()
    }

    #[test]
    fn test_floor_compared_per_column_on_same_points() {
        let source = sloped_grid("a", 0.0);
        let expected = column_floor(source.rho().depth().unwrap());

        for destination in [sloped_grid("a", 0.5 * testdata::STEP), sloped_grid("b", 0.0)] {
            let weights = floor_weights(&source, &destination);
            let floor = destination_floor(&source, &destination, &weights, Staggering::Rho).unwrap();
            assert_eq!(floor, expected);
        }
    }

    #[test]
    fn test_floor_regridded_on_shifted_points() {
        let source = sloped_grid("a", 0.0);
        let destination = sloped_grid("b", 0.5 * testdata::STEP);
        let weights = floor_weights(&source, &destination);

        let floor = destination_floor(&source, &destination, &weights, Staggering::Rho).unwrap();
        let source_floor = column_floor(source.rho().depth().unwrap());
        assert_eq!(floor, regrid_floor(&source_floor, &weights));
        // Halfway between the 60 m and 80 m columns, not the 60 m column.
        assert_eq!(source_floor[[1, 2]], -60.0);
        assert!(floor[[1, 2]] < -61.0 && floor[[1, 2]] > -80.0);
    }
}
