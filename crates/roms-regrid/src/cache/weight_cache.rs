//! Persistent weight maps for a (source, destination) grid pair.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use ndarray::{Array2, Zip};
use tracing::{info, warn};

use crate::error::{RegridError, Result};
use crate::grid::Grid;
use crate::kernel::{InterpolationKernel, KernelParams, WeightMap};
use crate::types::Staggering;

/// Decorrelation length (source cells) used when grids carry no spacing.
pub const FALLBACK_DECORRELATION: f64 = 5.0;

const MAGIC: &[u8; 4] = b"WSET";
const VERSION: u32 = 1;

/// Longest staggering name accepted in an artifact.
const MAX_NAME_LEN: usize = 16;

/// Identity of a grid pair; names the cache artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    source: String,
    destination: String,
}

impl CacheKey {
    pub fn new(source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
        }
    }

    pub fn for_grids(source: &Grid, destination: &Grid) -> Self {
        Self::new(source.name(), destination.name())
    }

    /// `<source>_<destination>_pmap.wmap`
    pub fn file_name(&self) -> String {
        format!("{}_{}_pmap.wmap", self.source, self.destination)
    }
}

/// Weight maps for the three staggerings.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightSet {
    pub rho: WeightMap,
    pub u: WeightMap,
    pub v: WeightMap,
}

impl WeightSet {
    pub fn get(&self, staggering: Staggering) -> &WeightMap {
        match staggering {
            Staggering::Rho => &self.rho,
            Staggering::U => &self.u,
            Staggering::V => &self.v,
        }
    }

    /// Serialise as named maps.
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(MAGIC)?;
        writer.write_all(&VERSION.to_le_bytes())?;
        writer.write_all(&(Staggering::ALL.len() as u32).to_le_bytes())?;
        for staggering in Staggering::ALL {
            let name = staggering.as_str().as_bytes();
            writer.write_all(&(name.len() as u32).to_le_bytes())?;
            writer.write_all(name)?;
            self.get(staggering).write_to(&mut writer)?;
        }
        Ok(())
    }

    /// Deserialise; every staggering must be present.
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(RegridError::Cache("invalid weight set magic bytes".to_string()));
        }

        let mut buf4 = [0u8; 4];
        reader.read_exact(&mut buf4)?;
        let version = u32::from_le_bytes(buf4);
        if version != VERSION {
            return Err(RegridError::Cache(format!(
                "unsupported weight set version: {}",
                version
            )));
        }

        reader.read_exact(&mut buf4)?;
        let count = u32::from_le_bytes(buf4);

        let (mut rho, mut u, mut v) = (None, None, None);
        for _ in 0..count {
            reader.read_exact(&mut buf4)?;
            let len = u32::from_le_bytes(buf4) as usize;
            if len > MAX_NAME_LEN {
                return Err(RegridError::Cache(format!("weight map name of {} bytes", len)));
            }
            let mut name = vec![0u8; len];
            reader.read_exact(&mut name)?;
            let map = WeightMap::read_from(&mut reader)?;

            let slot = match std::str::from_utf8(&name).ok().and_then(Staggering::from_str) {
                Some(Staggering::Rho) => &mut rho,
                Some(Staggering::U) => &mut u,
                Some(Staggering::V) => &mut v,
                None => {
                    return Err(RegridError::Cache(format!(
                        "unknown weight map {:?}",
                        String::from_utf8_lossy(&name)
                    )))
                }
            };
            *slot = Some(map);
        }

        match (rho, u, v) {
            (Some(rho), Some(u), Some(v)) => Ok(Self { rho, u, v }),
            _ => Err(RegridError::Cache("weight set is incomplete".to_string())),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = self.write_to(&mut bytes);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::read_from(bytes)
    }

    /// Read an artifact; any failure is reported as [`RegridError::Cache`].
    fn load(path: &Path) -> Result<Self> {
        let read = || Self::read_from(BufReader::new(File::open(path)?));
        read().map_err(|e| match e {
            RegridError::Cache(_) => e,
            other => RegridError::Cache(other.to_string()),
        })
    }

    /// Check every map against the shapes of the grids it will be used with.
    fn check_fits(&self, source: &Grid, destination: &Grid) -> Result<()> {
        for staggering in Staggering::ALL {
            let map = self.get(staggering);
            let src = source.points(staggering).dim();
            let dst = destination.points(staggering).dim();
            if map.source_shape() != src || map.destination_shape() != dst {
                return Err(RegridError::Cache(format!(
                    "{} map {:?} -> {:?} does not fit grids {:?} -> {:?}",
                    staggering,
                    map.source_shape(),
                    map.destination_shape(),
                    src,
                    dst
                )));
            }
        }
        Ok(())
    }

    /// Write through a temporary file so readers never see a partial artifact.
    fn save(&self, path: &Path) -> Result<()> {
        let tmp = path.with_extension("wmap.tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            self.write_to(&mut writer)?;
            writer.flush()?;
        }
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

/// Lazily computed, disk-persisted weight maps for one grid pair.
#[derive(Debug, Clone)]
pub struct WeightCache {
    key: CacheKey,
    dir: Option<PathBuf>,
}

impl WeightCache {
    /// A cache for `key` persisting under `dir`; `None` never touches disk.
    pub fn new(key: CacheKey, dir: Option<PathBuf>) -> Self {
        Self { key, dir }
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Location of the artifact, if persistence is enabled.
    pub fn path(&self) -> Option<PathBuf> {
        self.dir.as_ref().map(|d| d.join(self.key.file_name()))
    }

    /// Load the artifact if present, else compute all three maps and persist them.
    ///
    /// Returns the maps and whether they came from the artifact. A loaded
    /// artifact is only checked for shape against the grids, not for
    /// content. An unreadable or misshapen artifact is rebuilt; failing to
    /// write one is logged and otherwise ignored.
    pub fn get_or_build<K: InterpolationKernel + ?Sized>(
        &self,
        kernel: &K,
        source: &Grid,
        destination: &Grid,
        params: &KernelParams,
    ) -> Result<(WeightSet, bool)> {
        let path = self.path();

        if let Some(path) = path.as_deref().filter(|p| p.is_file()) {
            let loaded = WeightSet::load(path)
                .and_then(|weights| weights.check_fits(source, destination).map(|_| weights));
            match loaded {
                Ok(weights) => {
                    info!(path = %path.display(), "Loaded weight maps from cache");
                    return Ok((weights, true));
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Unreadable weight cache, rebuilding");
                }
            }
        }

        let weights = build(kernel, source, destination, params)?;
        info!(
            source = source.name(),
            destination = destination.name(),
            rho_entries = weights.rho.entry_count(),
            "Computed weight maps"
        );

        if let Some(path) = path.as_deref() {
            if let Err(e) = weights.save(path) {
                warn!(path = %path.display(), error = %e, "Failed to persist weight maps");
            }
        }

        Ok((weights, false))
    }
}

/// Run the surface primitive on a unit field per staggering, keeping only the maps.
fn build<K: InterpolationKernel + ?Sized>(
    kernel: &K,
    source: &Grid,
    destination: &Grid,
    params: &KernelParams,
) -> Result<WeightSet> {
    let map = |staggering: Staggering| -> Result<WeightMap> {
        let src = source.points(staggering);
        let dst = destination.points(staggering);
        let unit = Array2::<f64>::ones(src.dim());
        let (_, weights) = kernel.surface(src.coords(), unit.view(), dst.coords(), None, params)?;
        Ok(weights.into_owned())
    };

    Ok(WeightSet {
        rho: map(Staggering::Rho)?,
        u: map(Staggering::U)?,
        v: map(Staggering::V)?,
    })
}

/// Decorrelation lengths to use for a grid pair.
///
/// A positive requested length is kept. Otherwise it is derived from the
/// ratio of source to destination cell widths, rounded to one decimal and
/// then up to a whole cell, or [`FALLBACK_DECORRELATION`] when either grid
/// lacks spacing.
pub fn resolve_decorrelation(
    requested_x: f64,
    requested_y: f64,
    source: &Grid,
    destination: &Grid,
) -> (f64, f64) {
    let spacing = source.spacing().zip(destination.spacing());
    let x = if requested_x > 0.0 {
        requested_x
    } else {
        spacing.map_or(FALLBACK_DECORRELATION, |(s, d)| spacing_ratio(&s.dm, &d.dm))
    };
    let y = if requested_y > 0.0 {
        requested_y
    } else {
        spacing.map_or(FALLBACK_DECORRELATION, |(s, d)| spacing_ratio(&s.dn, &d.dn))
    };
    (x, y)
}

fn spacing_ratio(source: &Array2<f64>, destination: &Array2<f64>) -> f64 {
    let ratio = if source.dim() == destination.dim() {
        let ratios = Zip::from(source)
            .and(destination)
            .map_collect(|&s, &d| s / d);
        mean(ratios.iter().copied())
    } else {
        mean(source.iter().copied()).zip(mean(destination.iter().copied())).map(|(s, d)| s / d)
    };

    match ratio {
        Some(r) if r.is_finite() && r > 0.0 => ((r * 10.0).round() / 10.0).ceil().max(1.0),
        _ => FALLBACK_DECORRELATION,
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::GaussianKernel;
    use crate::testdata;
    use tempfile::TempDir;

    fn params() -> KernelParams {
        KernelParams {
            kernel_width: 4,
            decorrelation_x: 2.0,
            decorrelation_y: 2.0,
        }
    }

    #[test]
    fn test_file_name() {
        let key = CacheKey::new("coarse", "fine");
        assert_eq!(key.file_name(), "coarse_fine_pmap.wmap");
    }

    #[test]
    fn test_build_and_reload() {
        let dir = TempDir::new().unwrap();
        let src = testdata::sigma_grid("src", 4, 5, &[-0.75, -0.25]);
        let dst = testdata::sigma_grid("dst", 4, 5, &[-0.75, -0.25]);
        let cache = WeightCache::new(CacheKey::for_grids(&src, &dst), Some(dir.path().to_path_buf()));

        let (built, from_cache) = cache.get_or_build(&GaussianKernel, &src, &dst, &params()).unwrap();
        assert!(!from_cache);
        assert_eq!(built.u.destination_shape(), (4, 4));
        assert_eq!(built.v.source_shape(), (3, 5));
        assert!(cache.path().unwrap().is_file());

        let (loaded, from_cache) = cache.get_or_build(&GaussianKernel, &src, &dst, &params()).unwrap();
        assert!(from_cache);
        assert_eq!(loaded, built);
    }

    #[test]
    fn test_corrupt_artifact_is_rebuilt() {
        let dir = TempDir::new().unwrap();
        let src = testdata::sigma_grid("a", 3, 3, &[-0.5]);
        let cache = WeightCache::new(CacheKey::for_grids(&src, &src), Some(dir.path().to_path_buf()));
        std::fs::write(cache.path().unwrap(), b"garbage").unwrap();

        let (_, from_cache) = cache.get_or_build(&GaussianKernel, &src, &src, &params()).unwrap();
        assert!(!from_cache);
        let bytes = std::fs::read(cache.path().unwrap()).unwrap();
        assert!(WeightSet::from_bytes(&bytes).is_ok());
    }

    #[test]
    fn test_unwritable_dir_is_not_fatal() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("does-not-exist");
        let src = testdata::sigma_grid("a", 3, 3, &[-0.5]);
        let cache = WeightCache::new(CacheKey::for_grids(&src, &src), Some(missing));

        assert!(cache.get_or_build(&GaussianKernel, &src, &src, &params()).is_ok());
    }

    #[test]
    fn test_no_dir_never_persists() {
        let src = testdata::sigma_grid("a", 3, 3, &[-0.5]);
        let cache = WeightCache::new(CacheKey::for_grids(&src, &src), None);
        assert!(cache.path().is_none());
        let (_, from_cache) = cache.get_or_build(&GaussianKernel, &src, &src, &params()).unwrap();
        assert!(!from_cache);
    }

    #[test]
    fn test_resolve_decorrelation() {
        let plain = testdata::sigma_grid("a", 3, 3, &[-0.5]);
        assert_eq!(resolve_decorrelation(0.0, 0.0, &plain, &plain), (5.0, 5.0));
        assert_eq!(resolve_decorrelation(2.5, 0.0, &plain, &plain), (2.5, 5.0));

        let coarse = plain
            .clone()
            .with_spacing(Array2::from_elem((3, 3), 3000.0), Array2::from_elem((3, 3), 2000.0))
            .unwrap();
        let fine = plain
            .with_spacing(Array2::from_elem((3, 3), 1000.0), Array2::from_elem((3, 3), 1000.0))
            .unwrap();
        assert_eq!(resolve_decorrelation(0.0, 0.0, &coarse, &fine), (3.0, 2.0));
    }

    #[test]
    fn test_spacing_ratio_rounding() {
        // 1.04 rounds to 1.0 and stays 1; 1.06 rounds to 1.1 and goes up to 2.
        let ones = Array2::from_elem((2, 2), 1.0);
        assert_eq!(spacing_ratio(&Array2::from_elem((2, 2), 1.04), &ones), 1.0);
        assert_eq!(spacing_ratio(&Array2::from_elem((2, 2), 1.06), &ones), 2.0);
        assert_eq!(spacing_ratio(&Array2::from_elem((1, 3), 4.0), &ones), 4.0);
    }

    fn header(bytes: &mut Vec<u8>, dims: [u64; 6]) {
        bytes.extend_from_slice(b"WMAP");
        bytes.extend_from_slice(&1u32.to_le_bytes());
        for d in dims {
            bytes.extend_from_slice(&d.to_le_bytes());
        }
    }

    /// A weight set artifact whose three maps are given as raw bytes.
    fn artifact(maps: [Vec<u8>; 3]) -> Vec<u8> {
        let mut bytes = b"WSET".to_vec();
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&3u32.to_le_bytes());
        for (staggering, map) in Staggering::ALL.into_iter().zip(maps) {
            let name = staggering.as_str().as_bytes();
            bytes.extend_from_slice(&(name.len() as u32).to_le_bytes());
            bytes.extend_from_slice(name);
            bytes.extend_from_slice(&map);
        }
        bytes
    }

    #[test]
    fn test_huge_entry_count_is_rebuilt() {
        let dir = TempDir::new().unwrap();
        let src = testdata::sigma_grid("a", 3, 3, &[-0.5]);
        let cache = WeightCache::new(CacheKey::for_grids(&src, &src), Some(dir.path().to_path_buf()));

        let mut map = Vec::new();
        header(&mut map, [3, 3, 3, 3, 9, 1 << 60]);
        std::fs::write(cache.path().unwrap(), artifact([map.clone(), map.clone(), map])).unwrap();

        let (_, from_cache) = cache.get_or_build(&GaussianKernel, &src, &src, &params()).unwrap();
        assert!(!from_cache);
    }

    #[test]
    fn test_out_of_range_source_index_is_rebuilt() {
        let dir = TempDir::new().unwrap();
        let src = testdata::sigma_grid("a", 3, 3, &[-0.5]);
        let cache = WeightCache::new(CacheKey::for_grids(&src, &src), Some(dir.path().to_path_buf()));
        let (built, _) = cache.get_or_build(&GaussianKernel, &src, &src, &params()).unwrap();

        // Rho map with every destination point drawing from source index 999.
        let mut rho = WeightMap::new((3, 3), (3, 3));
        for _ in 0..9 {
            rho.push_point([(999, 1.0)]);
        }
        let corrupt = WeightSet {
            rho,
            ..built.clone()
        };
        std::fs::write(cache.path().unwrap(), corrupt.to_bytes()).unwrap();

        let (weights, from_cache) = cache.get_or_build(&GaussianKernel, &src, &src, &params()).unwrap();
        assert!(!from_cache);
        assert_eq!(weights, built);
    }

    #[test]
    fn test_stale_shapes_are_rebuilt() {
        let dir = TempDir::new().unwrap();
        let small = testdata::sigma_grid("a", 3, 3, &[-0.5]);
        let large = testdata::sigma_grid("a", 4, 5, &[-0.5]);
        let cache = WeightCache::new(CacheKey::for_grids(&small, &small), Some(dir.path().to_path_buf()));
        cache.get_or_build(&GaussianKernel, &small, &small, &params()).unwrap();

        // Same grid names, different grids: the artifact no longer fits.
        let (weights, from_cache) = cache.get_or_build(&GaussianKernel, &large, &large, &params()).unwrap();
        assert!(!from_cache);
        assert_eq!(weights.rho.source_shape(), (4, 5));
    }

    #[test]
    fn test_oversized_map_name_rejected() {
        let mut bytes = b"WSET".to_vec();
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&3u32.to_le_bytes());
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(WeightSet::from_bytes(&bytes), Err(RegridError::Cache(_))));
    }
}
