//! Integration tests: whole-store regridding between terrain-following grids.

use std::borrow::Cow;

use ndarray::{Array1, Array2, Array3, Array4, ArrayView2, ArrayView3};

use roms_regrid::kernel::Coords;
use roms_regrid::testdata;
use roms_regrid::{
    regrid, GaussianKernel, Grid, InterpolationKernel, KernelParams, MemoryStore, RecordSource,
    RegridConfig, RegridError, RegridOptions, Regridder, Result, WeightMap,
};

fn config() -> RegridConfig {
    RegridConfig {
        cache_dir: None,
        kernel_width: 6,
        ..Default::default()
    }
}

/// Grid variables plus a time axis for `records` records.
fn history(rows: usize, cols: usize, levels: &[f64], records: usize) -> MemoryStore {
    let mut store = testdata::sigma_grid_store(rows, cols, levels);
    store.insert("ocean_time", testdata::time_axis(records, 3600.0));
    store
}

#[test]
fn test_uniform_field_survives_land_block() {
    let levels = [-0.75, -0.25];
    let mut source = history(5, 5, &levels, 1);
    let mut mask = Array2::<f64>::ones((5, 5));
    mask[[1, 1]] = 0.0;
    mask[[1, 2]] = 0.0;
    source.insert("mask_rho", mask);

    // Land cells carry a bogus value.
    let mut temp = Array4::from_elem((1, 2, 5, 5), 10.0);
    for k in 0..2 {
        temp[[0, k, 1, 1]] = 0.0;
        temp[[0, k, 1, 2]] = 0.0;
    }
    source.insert("temp", temp);

    let parent = Grid::from_store(&source, "parent").unwrap();
    let child = Grid::from_store(&source, "child").unwrap();
    let mut output = MemoryStore::new().with_variable("temp", Array4::<f64>::zeros((1, 2, 5, 5)));

    let summary = regrid(config(), &parent, &child, &source, &mut output, RegridOptions::default())
        .unwrap();
    assert_eq!(summary.fields, vec!["temp"]);

    let out = output.read_variable("temp").unwrap();
    for ((_, k, r, c), &v) in out
        .view()
        .into_dimensionality::<ndarray::Ix4>()
        .unwrap()
        .indexed_iter()
    {
        if (r, c) == (1, 1) || (r, c) == (1, 2) {
            assert!(v.is_nan(), "land cell ({}, {}, {}) not masked", k, r, c);
        } else {
            assert!((v - 10.0).abs() < 1e-9, "cell ({}, {}, {}) = {}", k, r, c, v);
        }
    }
}

fn varied_temp(records: usize, rows: usize, cols: usize) -> Array4<f64> {
    Array4::from_shape_fn((records, 2, rows, cols), |(t, k, r, c)| {
        10.0 + t as f64 + 0.5 * k as f64 + 0.1 * (r * c) as f64
    })
}

#[test]
fn test_worker_count_does_not_change_results() {
    let levels = [-0.75, -0.25];
    let mut source = history(5, 6, &levels, 10);
    source.insert("temp", varied_temp(10, 5, 6));
    source.insert(
        "zeta",
        Array3::from_shape_fn((10, 5, 6), |(t, r, c)| 0.01 * (t + r + c) as f64),
    );

    let parent = Grid::from_store(&source, "parent").unwrap();
    let child = testdata::sigma_grid("child", 4, 4, &[-0.9, -0.5, -0.1]);

    let run = |workers: usize| {
        let mut output = MemoryStore::new()
            .with_variable("temp", Array4::<f64>::zeros((10, 3, 4, 4)))
            .with_variable("zeta", Array3::<f64>::zeros((10, 4, 4)));
        Regridder::new(config())
            .unwrap()
            .run(
                &parent,
                &child,
                &source,
                &mut output,
                &RegridOptions::default().with_workers(workers),
            )
            .unwrap();
        output
    };

    let sequential = run(1);
    let parallel = run(4);
    for name in ["temp", "zeta"] {
        let a = sequential.read_variable(name).unwrap();
        let b = parallel.read_variable(name).unwrap();
        assert_eq!(a.shape(), b.shape());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.to_bits(), y.to_bits(), "{} differs", name);
        }
    }
}

#[test]
fn test_record_selection_order_preserved() {
    let levels = [-0.75, -0.25];
    let mut source = history(4, 5, &levels, 4);
    source.insert(
        "zeta",
        Array3::from_shape_fn((4, 4, 5), |(t, _, _)| t as f64),
    );
    let grid = Grid::from_store(&source, "g").unwrap();
    let mut output = MemoryStore::new()
        .with_variable("zeta", Array3::<f64>::zeros((2, 4, 5)))
        .with_variable("time", Array1::<f64>::zeros(2));

    let options = RegridOptions::default().with_records(vec![3, 1]).with_workers(2);
    regrid(config(), &grid, &grid, &source, &mut output, options).unwrap();

    let zeta = output.read_variable("zeta").unwrap();
    assert!((zeta[[0, 2, 2]] - 3.0).abs() < 1e-9);
    assert!((zeta[[1, 2, 2]] - 1.0).abs() < 1e-9);
    let time: Vec<f64> = output.read_variable("time").unwrap().iter().copied().collect();
    assert_eq!(time, vec![10800.0, 3600.0]);
}

#[test]
fn test_results_bounded_by_source_range() {
    let levels = [-0.8, -0.4, -0.1];
    let mut source = history(6, 6, &levels, 2);
    let temp = Array4::from_shape_fn((2, 3, 6, 6), |(t, k, r, c)| {
        5.0 + t as f64 + 2.0 * k as f64 + 0.3 * r as f64 - 0.2 * c as f64
    });
    let (lo, hi) = temp
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    source.insert("temp", temp);

    let parent = Grid::from_store(&source, "parent").unwrap();
    let child = testdata::z_grid("child", 5, 5, &[-5.0, -30.0, -60.0, -95.0]);
    let mut output = MemoryStore::new().with_variable("temp", Array4::<f64>::zeros((2, 4, 5, 5)));

    regrid(config(), &parent, &child, &source, &mut output, RegridOptions::default()).unwrap();

    let out = output.read_variable("temp").unwrap();
    for &v in out.iter().filter(|v| v.is_finite()) {
        assert!(v >= lo - 1e-9 && v <= hi + 1e-9, "{} outside [{}, {}]", v, lo, hi);
    }
    assert!(out.iter().any(|v| v.is_finite()));
}

#[test]
fn test_velocity_pair_and_depth_averages() {
    let levels = [-0.75, -0.25];
    let mut source = history(4, 5, &levels, 2);
    source.insert("u", testdata::uniform_records(2, 2, 4, 4, 0.2));
    source.insert("v", testdata::uniform_records(2, 2, 3, 5, -0.1));

    let grid = Grid::from_store(&source, "g").unwrap();
    let mut output = MemoryStore::new()
        .with_variable("u", Array4::<f64>::zeros((2, 2, 4, 4)))
        .with_variable("v", Array4::<f64>::zeros((2, 2, 3, 5)))
        .with_variable("ubar", Array3::<f64>::zeros((2, 4, 4)))
        .with_variable("vbar", Array3::<f64>::zeros((2, 3, 5)));

    let summary =
        regrid(config(), &grid, &grid, &source, &mut output, RegridOptions::default()).unwrap();
    assert_eq!(summary.fields, vec!["u", "v", "ubar", "vbar"]);

    let check = |name: &str, expected: f64| {
        let data = output.read_variable(name).unwrap();
        assert!(
            data.iter().all(|v| (v - expected).abs() < 1e-9),
            "{} not uniform {}",
            name,
            expected
        );
    };
    check("u", 0.2);
    check("v", -0.1);
    check("ubar", 0.2);
    check("vbar", -0.1);
}

#[test]
fn test_rotated_source_turns_velocity() {
    let levels = [-0.75, -0.25];
    let mut source = history(4, 4, &levels, 1);
    source.insert(
        "angle",
        Array2::from_elem((4, 4), std::f64::consts::FRAC_PI_2),
    );
    // Grid-relative v on a quarter-turned grid points east.
    source.insert("u", Array4::<f64>::zeros((1, 2, 4, 3)));
    source.insert("v", Array4::from_elem((1, 2, 3, 4), 1.0));

    let parent = Grid::from_store(&source, "parent").unwrap();
    let child = testdata::z_grid("child", 4, 4, &[-30.0, -60.0]);
    let mut output = MemoryStore::new()
        .with_variable("u", Array4::<f64>::zeros((1, 2, 4, 4)))
        .with_variable("v", Array4::<f64>::zeros((1, 2, 4, 4)));

    regrid(config(), &parent, &child, &source, &mut output, RegridOptions::default()).unwrap();

    let u = output.read_variable("u").unwrap();
    let v = output.read_variable("v").unwrap();
    assert!((u[[0, 0, 2, 2]] - 1.0).abs() < 1e-9);
    assert!(v[[0, 0, 2, 2]].abs() < 1e-9);
}

/// Gaussian kernel that refuses any surface carrying the value 99.
#[derive(Default)]
struct FailingKernel(GaussianKernel);

impl InterpolationKernel for FailingKernel {
    fn surface<'w>(
        &self,
        src: Coords<'_>,
        field: ArrayView2<'_, f64>,
        dst: Coords<'_>,
        weights: Option<&'w WeightMap>,
        params: &KernelParams,
    ) -> Result<(Array2<f64>, Cow<'w, WeightMap>)> {
        if field.iter().any(|&v| v == 99.0) {
            return Err(RegridError::kernel("cannot interpolate 99"));
        }
        self.0.surface(src, field, dst, weights, params)
    }

    fn volume(
        &self,
        src: Coords<'_>,
        src_depth: ArrayView3<'_, f64>,
        field: ArrayView3<'_, f64>,
        dst: Coords<'_>,
        dst_depth: ArrayView3<'_, f64>,
        weights: &WeightMap,
        params: &KernelParams,
    ) -> Result<Array3<f64>> {
        self.0
            .volume(src, src_depth, field, dst, dst_depth, weights, params)
    }
}

#[test]
fn test_failed_record_names_field_and_writes_nothing() {
    let levels = [-0.75, -0.25];
    let mut source = history(4, 5, &levels, 4);
    source.insert(
        "zeta",
        Array3::from_shape_fn((4, 4, 5), |(t, _, _)| if t == 2 { 99.0 } else { t as f64 }),
    );
    let grid = Grid::from_store(&source, "parent").unwrap();
    let mut output = MemoryStore::new()
        .with_variable("zeta", Array3::<f64>::zeros((4, 4, 5)))
        .with_variable("time", Array1::<f64>::zeros(4));

    let err = Regridder::new(config())
        .unwrap()
        .with_kernel(FailingKernel::default())
        .run(
            &grid,
            &grid,
            &source,
            &mut output,
            &RegridOptions::default().with_workers(2),
        )
        .unwrap_err();

    assert!(
        matches!(err, RegridError::Worker { ref field, record: 2, .. } if field == "zeta"),
        "unexpected error {:?}",
        err
    );
    assert!(output.read_variable("zeta").unwrap().iter().all(|&v| v == 0.0));
    assert!(output.read_variable("time").unwrap().iter().all(|&v| v == 0.0));
}
