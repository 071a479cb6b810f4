use anyhow::{Context, Result};
use log::info;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use crate::dataset::conversion::ConversionTable;
use crate::dataset::grid::GridCellSet;
use crate::dataset::isochrone::{IsochroneSet, IsochroneSource};
use crate::dataset::points::PointSet;
use crate::error::PipelineError;
use crate::geo_core::LAMBERT_93;

/// Fixed file layout under the dataset base directory.
pub const GRID_FILE: &str = "carreaux.geojson";
pub const POINTS_FILE: &str = "bpe_points.geojson";
pub const CONVERSION_FILE: &str = "bpe_carreaux.csv";
pub const ISOCHRONES_FILE: &str = "isochrones.geojson";
pub const ISOCHRONES_DIR: &str = "isochrones";

/// All loaded datasets. Owned once per process, read-only, shared by every
/// derived view; no component mutates loaded data in place.
#[derive(Debug, Clone)]
pub struct Datasets {
    pub grid: GridCellSet,
    pub points: PointSet,
    pub conversion: ConversionTable,
    pub isochrones: IsochroneSource,
}

impl Datasets {
    /// Load every dataset from the fixed layout under `base_dir`, with the
    /// grid geometry stored in Lambert-93 and reprojected to WGS84.
    pub fn load(base_dir: &Path) -> Result<Self, PipelineError> {
        Self::load_with_grid_epsg(base_dir, LAMBERT_93)
    }

    /// Same as [`Datasets::load`] with an explicit grid-source CRS, for
    /// datasets already stored in lat/lon.
    pub fn load_with_grid_epsg(base_dir: &Path, grid_epsg: i32) -> Result<Self, PipelineError> {
        let grid = GridCellSet::from_geojson(&read_dataset(base_dir, GRID_FILE)?, grid_epsg)
            .map_err(|e| PipelineError::dataset_load(GRID_FILE, e))?;

        let points = PointSet::from_geojson(&read_dataset(base_dir, POINTS_FILE)?)
            .map_err(|e| PipelineError::dataset_load(POINTS_FILE, e))?;

        let conversion =
            ConversionTable::from_reader(read_dataset(base_dir, CONVERSION_FILE)?.as_bytes())
                .map_err(|e| PipelineError::dataset_load(CONVERSION_FILE, e))?;

        // One merged isochrone file when present, otherwise a per-commune
        // directory resolved lazily on each commune change.
        let merged_path = base_dir.join(ISOCHRONES_FILE);
        let per_commune_dir = base_dir.join(ISOCHRONES_DIR);
        let isochrones = if merged_path.is_file() {
            let set = IsochroneSet::from_geojson(&read_dataset(base_dir, ISOCHRONES_FILE)?)
                .map_err(|e| PipelineError::dataset_load(ISOCHRONES_FILE, e))?;
            IsochroneSource::Global(set)
        } else if per_commune_dir.is_dir() {
            IsochroneSource::PerCommune(per_commune_dir)
        } else {
            return Err(PipelineError::dataset_load(
                ISOCHRONES_FILE,
                anyhow::anyhow!(
                    "neither {:?} nor the {:?} directory exists",
                    merged_path,
                    per_commune_dir
                ),
            ));
        };

        info!(
            "Loaded datasets from {:?}: {} grid cells, {} points, {} conversion rows",
            base_dir,
            grid.len(),
            points.len(),
            conversion.len()
        );

        Ok(Datasets {
            grid,
            points,
            conversion,
            isochrones,
        })
    }

    /// Memoized load: the first call for a base directory reads from disk,
    /// every later call returns the cached result. Datasets are static for
    /// the process lifetime, so the cache is never invalidated.
    pub fn load_cached(base_dir: &Path) -> Result<Arc<Datasets>, PipelineError> {
        Self::load_cached_with_grid_epsg(base_dir, LAMBERT_93)
    }

    pub fn load_cached_with_grid_epsg(
        base_dir: &Path,
        grid_epsg: i32,
    ) -> Result<Arc<Datasets>, PipelineError> {
        static CACHE: OnceLock<Mutex<HashMap<PathBuf, Arc<Datasets>>>> = OnceLock::new();
        let cache = CACHE.get_or_init(|| Mutex::new(HashMap::new()));

        let key = fs::canonicalize(base_dir).unwrap_or_else(|_| base_dir.to_path_buf());
        let mut guard = cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(datasets) = guard.get(&key) {
            return Ok(Arc::clone(datasets));
        }

        let datasets = Arc::new(Self::load_with_grid_epsg(&key, grid_epsg)?);
        guard.insert(key, Arc::clone(&datasets));
        Ok(datasets)
    }
}

fn read_dataset(base_dir: &Path, name: &str) -> Result<String, PipelineError> {
    let path = base_dir.join(name);
    fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {:?}", path))
        .map_err(|e| PipelineError::dataset_load(name, e))
}
