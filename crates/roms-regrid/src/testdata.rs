//! Small synthetic grids, stores and fields used by the unit and integration
//! tests.
//!
//! All lattices are regular in degrees: column `c` sits at `c * 0.1` east and
//! row `r` at `r * 0.1` north. Terrain-following grids have a flat 100 m
//! bathymetry with `Cs_r == s_rho`, so level depths are `100 * s`.

use ndarray::{Array1, Array2, Array3, Array4};

use crate::grid::{h_to_u, h_to_v, Grid, GridPoints, SCoordinate, Vtransform};
use crate::store::MemoryStore;
use crate::types::Masked3;

/// Lattice spacing in degrees.
pub const STEP: f64 = 0.1;

/// Bathymetry of the synthetic terrain-following grids.
pub const DEPTH: f64 = 100.0;

fn lattice(rows: usize, cols: usize, lon0: f64, lat0: f64) -> (Array2<f64>, Array2<f64>) {
    let lon = Array2::from_shape_fn((rows, cols), |(_, c)| lon0 + c as f64 * STEP);
    let lat = Array2::from_shape_fn((rows, cols), |(r, _)| lat0 + r as f64 * STEP);
    (lon, lat)
}

/// All-water lattice without depths.
pub fn points(rows: usize, cols: usize) -> GridPoints {
    let (lon, lat) = lattice(rows, cols, 0.0, 0.0);
    GridPoints::new(lon, lat, Array2::from_elem((rows, cols), true))
}

/// All-water lattice whose columns all use `depths`.
pub fn column_points(rows: usize, cols: usize, depths: &[f64]) -> GridPoints {
    points(rows, cols).with_depth(broadcast(depths, rows, cols))
}

/// Field whose level `k` holds `values[k]` everywhere.
pub fn layered_field(rows: usize, cols: usize, values: &[f64]) -> Masked3 {
    Masked3::valid(broadcast(values, rows, cols))
}

fn broadcast(values: &[f64], rows: usize, cols: usize) -> Array3<f64> {
    Array3::from_shape_fn((values.len(), rows, cols), |(k, _, _)| values[k])
}

fn s_coordinate(s_levels: &[f64]) -> SCoordinate {
    SCoordinate {
        vtransform: Vtransform::Original,
        hc: 0.0,
        s_rho: s_levels.to_vec(),
        cs_r: s_levels.to_vec(),
    }
}

/// Staggered terrain-following grid with `s_levels` (bottom first).
pub fn sigma_grid(name: &str, rows: usize, cols: usize, s_levels: &[f64]) -> Grid {
    let coordinate = s_coordinate(s_levels);
    let h = Array2::from_elem((rows, cols), DEPTH);

    let (lon, lat) = lattice(rows, cols, 0.0, 0.0);
    let rho = GridPoints::new(lon, lat, Array2::from_elem((rows, cols), true))
        .with_depth(coordinate.depths(&h));

    let (lon, lat) = lattice(rows, cols - 1, 0.5 * STEP, 0.0);
    let u = GridPoints::new(lon, lat, Array2::from_elem((rows, cols - 1), true))
        .with_depth(coordinate.depths(&h_to_u(&h)));

    let (lon, lat) = lattice(rows - 1, cols, 0.0, 0.5 * STEP);
    let v = GridPoints::new(lon, lat, Array2::from_elem((rows - 1, cols), true))
        .with_depth(coordinate.depths(&h_to_v(&h)));

    match Grid::terrain_following(name, rho, u, v) {
        Ok(grid) => grid,
        Err(e) => panic!("synthetic grid is invalid: {}", e),
    }
}

/// Unstaggered all-water grid with a fixed depth axis.
pub fn z_grid(name: &str, rows: usize, cols: usize, depths: &[f64]) -> Grid {
    let p = points(rows, cols);
    match Grid::z_level(name, p.lon, p.lat, p.water, depths) {
        Ok(grid) => grid,
        Err(e) => panic!("synthetic grid is invalid: {}", e),
    }
}

/// Grid variables of [`sigma_grid`] as a store, with a zero `angle` and
/// 1 km `pm`/`pn`.
pub fn sigma_grid_store(rows: usize, cols: usize, s_levels: &[f64]) -> MemoryStore {
    let mut store = MemoryStore::new();
    let extents = [
        ("rho", rows, cols, 0.0, 0.0),
        ("u", rows, cols - 1, 0.5 * STEP, 0.0),
        ("v", rows - 1, cols, 0.0, 0.5 * STEP),
    ];
    for (suffix, r, c, lon0, lat0) in extents {
        let (lon, lat) = lattice(r, c, lon0, lat0);
        store.insert(format!("lon_{}", suffix), lon);
        store.insert(format!("lat_{}", suffix), lat);
        store.insert(format!("mask_{}", suffix), Array2::<f64>::ones((r, c)));
    }

    let levels = Array1::from(s_levels.to_vec());
    store.insert("h", Array2::from_elem((rows, cols), DEPTH));
    store.insert("s_rho", levels.clone());
    store.insert("Cs_r", levels);
    store.insert("hc", Array1::from(vec![0.0]));
    store.insert("Vtransform", Array1::from(vec![1.0]));
    store.insert("angle", Array2::<f64>::zeros((rows, cols)));
    store.insert("pm", Array2::from_elem((rows, cols), 1.0e-3));
    store.insert("pn", Array2::from_elem((rows, cols), 1.0e-3));
    store
}

/// `records` copies of a uniform 3-D field, shaped (time, level, row, col).
pub fn uniform_records(records: usize, levels: usize, rows: usize, cols: usize, value: f64) -> Array4<f64> {
    Array4::from_elem((records, levels, rows, cols), value)
}

/// Record time axis `0, step, 2*step, ...`.
pub fn time_axis(records: usize, step: f64) -> Array1<f64> {
    Array1::from_shape_fn(records, |i| i as f64 * step)
}
