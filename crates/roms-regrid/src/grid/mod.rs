//! Grid model.
//!
//! A [`Grid`] is either a staggered terrain-following C-grid, with rho, u and
//! v points, or an unstaggered z-level grid whose depths are a fixed axis
//! broadcast over every column. Both carry a water mask per staggering and,
//! optionally, a rotation angle and cell spacing.

pub mod vertical;

use ndarray::{Array1, Array2, Array3, ArrayD, Axis, Ix1, Ix2, Ix3};
use tracing::debug;

use crate::error::{RegridError, Result};
use crate::kernel::landsea::land_from_water;
use crate::kernel::Coords;
use crate::store::RecordSource;
use crate::types::Staggering;

pub use vertical::{h_to_u, h_to_v, SCoordinate, Vtransform};

/// Coordinates, water mask and optional depths of one staggering.
#[derive(Debug, Clone, PartialEq)]
pub struct GridPoints {
    pub lon: Array2<f64>,
    pub lat: Array2<f64>,
    /// `true` where the cell is water.
    pub water: Array2<bool>,
    /// Depths (level × row × column), negative below the surface.
    pub depth: Option<Array3<f64>>,
}

impl GridPoints {
    pub fn new(lon: Array2<f64>, lat: Array2<f64>, water: Array2<bool>) -> Self {
        Self {
            lon,
            lat,
            water,
            depth: None,
        }
    }

    pub fn with_depth(mut self, depth: Array3<f64>) -> Self {
        self.depth = Some(depth);
        self
    }

    /// Horizontal extents (rows, cols).
    pub fn dim(&self) -> (usize, usize) {
        self.lon.dim()
    }

    pub fn coords(&self) -> Coords<'_> {
        Coords::new(self.lon.view(), self.lat.view())
    }

    /// Invalid-cell mask for fields on these points.
    pub fn land(&self) -> Array2<bool> {
        land_from_water(&self.water)
    }

    /// Depth cube, or `MissingInput` when the grid has no vertical axis.
    pub fn depth(&self) -> Result<&Array3<f64>> {
        self.depth
            .as_ref()
            .ok_or_else(|| RegridError::missing_input("grid has no depth levels"))
    }
}

/// Grid cell widths in metres (`1/pm`, `1/pn`) at rho points.
#[derive(Debug, Clone, PartialEq)]
pub struct Spacing {
    pub dm: Array2<f64>,
    pub dn: Array2<f64>,
}

/// A named horizontal/vertical coordinate system.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    name: String,
    rho: GridPoints,
    faces: Option<(GridPoints, GridPoints)>,
    angle: Option<Array2<f64>>,
    spacing: Option<Spacing>,
}

impl Grid {
    /// Staggered C-grid; `u` has one column and `v` one row fewer than `rho`.
    pub fn terrain_following(
        name: impl Into<String>,
        rho: GridPoints,
        u: GridPoints,
        v: GridPoints,
    ) -> Result<Self> {
        let grid = Self {
            name: name.into(),
            rho,
            faces: Some((u, v)),
            angle: None,
            spacing: None,
        };
        grid.validate()?;
        Ok(grid)
    }

    /// Unstaggered grid; every staggering resolves to the rho points.
    pub fn unstaggered(name: impl Into<String>, rho: GridPoints) -> Result<Self> {
        let grid = Self {
            name: name.into(),
            rho,
            faces: None,
            angle: None,
            spacing: None,
        };
        grid.validate()?;
        Ok(grid)
    }

    /// Unstaggered grid with the depth axis `depths` broadcast over every column.
    pub fn z_level(
        name: impl Into<String>,
        lon: Array2<f64>,
        lat: Array2<f64>,
        water: Array2<bool>,
        depths: &[f64],
    ) -> Result<Self> {
        let (rows, cols) = lon.dim();
        let depth = Array3::from_shape_fn((depths.len(), rows, cols), |(k, _, _)| depths[k]);
        Self::unstaggered(name, GridPoints::new(lon, lat, water).with_depth(depth))
    }

    /// Attach a rotation angle (radians) at rho points.
    pub fn with_angle(mut self, angle: Array2<f64>) -> Result<Self> {
        if angle.dim() != self.rho.dim() {
            return Err(RegridError::shape_mismatch(self.rho.lon.shape(), angle.shape()));
        }
        self.angle = Some(angle);
        Ok(self)
    }

    /// Attach cell spacing at rho points.
    pub fn with_spacing(mut self, dm: Array2<f64>, dn: Array2<f64>) -> Result<Self> {
        for arr in [&dm, &dn] {
            if arr.dim() != self.rho.dim() {
                return Err(RegridError::shape_mismatch(self.rho.lon.shape(), arr.shape()));
            }
        }
        self.spacing = Some(Spacing { dm, dn });
        Ok(self)
    }

    /// Grid identity, used to key weight caches.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_staggered(&self) -> bool {
        self.faces.is_some()
    }

    pub fn rho(&self) -> &GridPoints {
        &self.rho
    }

    /// Points of a staggering. Unstaggered grids answer with their rho points.
    pub fn points(&self, staggering: Staggering) -> &GridPoints {
        match (staggering, &self.faces) {
            (Staggering::U, Some((u, _))) => u,
            (Staggering::V, Some((_, v))) => v,
            _ => &self.rho,
        }
    }

    pub fn angle(&self) -> Option<&Array2<f64>> {
        self.angle.as_ref()
    }

    pub fn spacing(&self) -> Option<&Spacing> {
        self.spacing.as_ref()
    }

    /// Number of depth levels, if the grid has a vertical axis.
    pub fn levels(&self) -> Option<usize> {
        self.rho.depth.as_ref().map(|d| d.len_of(Axis(0)))
    }

    fn validate(&self) -> Result<()> {
        let (rows, cols) = self.rho.dim();
        self.check_points(Staggering::Rho, &self.rho, (rows, cols))?;

        if let Some((u, v)) = &self.faces {
            self.check_points(Staggering::U, u, Staggering::U.extents(rows, cols))?;
            self.check_points(Staggering::V, v, Staggering::V.extents(rows, cols))?;

            let levels = |p: &GridPoints| p.depth.as_ref().map(|d| d.len_of(Axis(0)));
            if levels(u) != levels(&self.rho) || levels(v) != levels(&self.rho) {
                return Err(RegridError::invalid_grid(
                    &self.name,
                    "staggerings disagree on depth levels",
                ));
            }
        }
        Ok(())
    }

    fn check_points(
        &self,
        staggering: Staggering,
        points: &GridPoints,
        expected: (usize, usize),
    ) -> Result<()> {
        let fail = |what: &str, actual: &[usize]| {
            RegridError::invalid_grid(
                &self.name,
                format!(
                    "{}_{} has shape {:?}, expected {:?}",
                    what, staggering, actual, expected
                ),
            )
        };

        if points.lon.dim() != expected {
            return Err(fail("lon", points.lon.shape()));
        }
        if points.lat.dim() != expected {
            return Err(fail("lat", points.lat.shape()));
        }
        if points.water.dim() != expected {
            return Err(fail("mask", points.water.shape()));
        }
        if let Some(depth) = &points.depth {
            let (_, r, c) = depth.dim();
            if (r, c) != expected {
                return Err(fail("depth", depth.shape()));
            }
        }
        Ok(())
    }

    /// Load a grid from standard variable names.
    ///
    /// Terrain-following stores hold `lon_rho`, `lat_rho`, `mask_rho` (and
    /// `_u`, `_v`), optionally `angle`, `pm`/`pn`, and either explicit
    /// `depth_rho`/`depth_u`/`depth_v` cubes or `h`, `s_rho`, `Cs_r`, `hc`
    /// and `Vtransform`. Z-level stores hold `lon`, `lat`, `mask` and a 1-D
    /// `depth` axis.
    pub fn from_store<S: RecordSource + ?Sized>(store: &S, name: impl Into<String>) -> Result<Self> {
        let name = name.into();

        let grid = if store.contains("lon_rho") {
            let depths = load_depths(store)?;
            let load = |s: Staggering| -> Result<GridPoints> {
                let mut points = load_points(
                    store,
                    &format!("lon_{}", s),
                    &format!("lat_{}", s),
                    &format!("mask_{}", s),
                )?;
                points.depth = depths.as_ref().map(|d| match s {
                    Staggering::Rho => d.0.clone(),
                    Staggering::U => d.1.clone(),
                    Staggering::V => d.2.clone(),
                });
                Ok(points)
            };
            let grid = Self::terrain_following(
                name.clone(),
                load(Staggering::Rho)?,
                load(Staggering::U)?,
                load(Staggering::V)?,
            )?;
            let grid = if store.contains("angle") {
                grid.with_angle(read_2d(store, "angle")?)?
            } else {
                grid
            };
            if store.contains("pm") && store.contains("pn") {
                let dm = read_2d(store, "pm")?.mapv(|v| 1.0 / v);
                let dn = read_2d(store, "pn")?.mapv(|v| 1.0 / v);
                grid.with_spacing(dm, dn)?
            } else {
                grid
            }
        } else if store.contains("lon") {
            let mut points = load_points(store, "lon", "lat", "mask")?;
            if store.contains("depth") {
                let axis = store.read_variable("depth")?.into_dimensionality::<Ix1>()?;
                let (rows, cols) = points.dim();
                points.depth = Some(Array3::from_shape_fn(
                    (axis.len(), rows, cols),
                    |(k, _, _)| axis[k],
                ));
            }
            Self::unstaggered(name.clone(), points)?
        } else {
            return Err(RegridError::invalid_grid(
                name,
                "no lon_rho or lon coordinate variable",
            ));
        };

        debug!(
            grid = %grid.name,
            staggered = grid.is_staggered(),
            levels = ?grid.levels(),
            "Loaded grid"
        );
        Ok(grid)
    }
}

type DepthSet = (Array3<f64>, Array3<f64>, Array3<f64>);

fn load_depths<S: RecordSource + ?Sized>(store: &S) -> Result<Option<DepthSet>> {
    if store.contains("depth_rho") {
        let read = |name: &str| -> Result<Array3<f64>> {
            Ok(store.read_variable(name)?.into_dimensionality::<Ix3>()?)
        };
        return Ok(Some((read("depth_rho")?, read("depth_u")?, read("depth_v")?)));
    }

    if !["h", "s_rho", "Cs_r", "hc"].iter().all(|v| store.contains(v)) {
        return Ok(None);
    }

    let vtransform = if store.contains("Vtransform") {
        let code = read_scalar(store, "Vtransform")?;
        Vtransform::from_code(code as i64).ok_or_else(|| {
            RegridError::invalid_grid("s-coordinate", format!("unknown Vtransform {}", code))
        })?
    } else {
        Vtransform::Original
    };
    let coordinate = SCoordinate::new(
        vtransform,
        read_scalar(store, "hc")?,
        read_1d(store, "s_rho")?.to_vec(),
        read_1d(store, "Cs_r")?.to_vec(),
    )?;

    let h = read_2d(store, "h")?;
    Ok(Some((
        coordinate.depths(&h),
        coordinate.depths(&h_to_u(&h)),
        coordinate.depths(&h_to_v(&h)),
    )))
}

fn load_points<S: RecordSource + ?Sized>(
    store: &S,
    lon: &str,
    lat: &str,
    mask: &str,
) -> Result<GridPoints> {
    let lon = read_2d(store, lon)?;
    let lat = read_2d(store, lat)?;
    let water = if store.contains(mask) {
        read_2d(store, mask)?.mapv(|m| m.is_finite() && m != 0.0)
    } else {
        Array2::from_elem(lon.raw_dim(), true)
    };
    Ok(GridPoints::new(lon, lat, water))
}

/// Read a 2-D variable; 1-D lon/lat axes are not meshed.
fn read_2d<S: RecordSource + ?Sized>(store: &S, name: &str) -> Result<Array2<f64>> {
    Ok(store.read_variable(name)?.into_dimensionality::<Ix2>()?)
}

fn read_1d<S: RecordSource + ?Sized>(store: &S, name: &str) -> Result<Array1<f64>> {
    Ok(store.read_variable(name)?.into_dimensionality::<Ix1>()?)
}

fn read_scalar<S: RecordSource + ?Sized>(store: &S, name: &str) -> Result<f64> {
    let data: ArrayD<f64> = store.read_variable(name)?;
    data.iter()
        .next()
        .copied()
        .ok_or_else(|| RegridError::missing_input(format!("{} is empty", name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testdata;

    #[test]
    fn test_staggered_extents_validated() {
        let rho = testdata::points(4, 5);
        let u = testdata::points(4, 4);
        let bad_v = testdata::points(4, 5);
        assert!(Grid::terrain_following("g", rho, u, bad_v).is_err());
    }

    #[test]
    fn test_points_fallback_for_unstaggered() {
        let grid = Grid::unstaggered("z", testdata::points(3, 3)).unwrap();
        assert!(!grid.is_staggered());
        assert_eq!(grid.points(Staggering::U).dim(), (3, 3));
    }

    #[test]
    fn test_z_level_broadcasts_depths() {
        let p = testdata::points(2, 3);
        let grid = Grid::z_level("z", p.lon, p.lat, p.water, &[-2.0, -20.0]).unwrap();
        let depth = grid.rho().depth().unwrap();
        assert_eq!(depth.dim(), (2, 2, 3));
        assert_eq!(depth[[1, 1, 2]], -20.0);
        assert_eq!(grid.levels(), Some(2));
    }

    #[test]
    fn test_angle_shape_checked() {
        let grid = Grid::unstaggered("z", testdata::points(3, 3)).unwrap();
        assert!(grid.with_angle(Array2::zeros((2, 2))).is_err());
    }

    #[test]
    fn test_missing_depth() {
        let points = testdata::points(2, 2);
        assert!(matches!(points.depth(), Err(RegridError::MissingInput(_))));
    }

    #[test]
    fn test_from_store_sigma_grid() {
        let store = testdata::sigma_grid_store(4, 5, &[-0.75, -0.25]);
        let grid = Grid::from_store(&store, "src").unwrap();

        assert!(grid.is_staggered());
        assert_eq!(grid.levels(), Some(2));
        assert_eq!(grid.points(Staggering::U).dim(), (4, 4));
        assert_eq!(grid.points(Staggering::V).depth().unwrap().dim(), (2, 3, 5));
        assert!(grid.spacing().is_some());
        assert!(grid.angle().is_some());
    }

    #[test]
    fn test_from_store_unknown_layout() {
        let store = crate::store::MemoryStore::new();
        assert!(matches!(
            Grid::from_store(&store, "x"),
            Err(RegridError::InvalidGrid { .. })
        ));
    }
}
