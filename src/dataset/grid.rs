use anyhow::{Context, Result};
use geo::{Centroid, MultiPolygon, Point};
use geojson::{Feature, GeoJson};
use log::warn;

use crate::error::PipelineError;
use crate::geo_core::{CrsTransform, WGS84};

/// A 200m grid cell identified by its `Idcar_200m` code. Cells are stored
/// as multi-polygons so multi-part source geometry survives loading.
#[derive(Debug, Clone, PartialEq)]
pub struct GridCell {
    pub id: String,
    pub geometry: MultiPolygon<f64>,
}

/// The grid-cell geometry set, stored in WGS84 lon/lat after loading.
#[derive(Debug, Clone, Default)]
pub struct GridCellSet {
    cells: Vec<GridCell>,
}

impl GridCellSet {
    pub fn new(cells: Vec<GridCell>) -> Self {
        GridCellSet { cells }
    }

    /// Parse a GeoJSON FeatureCollection of grid cells, reprojecting from
    /// `source_epsg` to WGS84 when the source is stored in a projected CRS.
    pub fn from_geojson(data: &str, source_epsg: i32) -> Result<Self> {
        let geojson: GeoJson = data.parse().context("Failed to parse grid cell GeoJSON")?;
        let fc = match geojson {
            GeoJson::FeatureCollection(fc) => fc,
            _ => anyhow::bail!("Grid cell file must be a GeoJSON FeatureCollection"),
        };

        let transform = if source_epsg == WGS84 {
            None
        } else {
            Some(CrsTransform::new(source_epsg, WGS84)?)
        };

        let mut cells = Vec::with_capacity(fc.features.len());
        for feature in &fc.features {
            let id = match feature.property("Idcar_200m").and_then(|v| v.as_str()) {
                Some(id) => id.to_string(),
                None => {
                    warn!("Skipping grid cell feature without Idcar_200m property");
                    continue;
                }
            };

            let geometry = match feature_multi_polygon(feature)? {
                Some(geometry) => geometry,
                None => {
                    warn!("Skipping grid cell `{}`: geometry is not a polygon", id);
                    continue;
                }
            };

            let geometry = match &transform {
                Some(t) => t
                    .multi_polygon(&geometry)
                    .with_context(|| format!("Failed to reproject grid cell `{}`", id))?,
                None => geometry,
            };

            cells.push(GridCell { id, geometry });
        }

        Ok(GridCellSet { cells })
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[GridCell] {
        &self.cells
    }

    /// Look up the one cell with the given identifier. Identifiers are
    /// unique, so zero or several matches mean corrupt input.
    pub fn cell_by_id(&self, cell_id: &str) -> Result<&GridCell, PipelineError> {
        let mut matches = self.cells.iter().filter(|c| c.id == cell_id);
        match (matches.next(), matches.next()) {
            (Some(cell), None) => Ok(cell),
            (None, _) => Err(PipelineError::AmbiguousOrMissingCell {
                cell_id: cell_id.to_string(),
                matches: 0,
            }),
            (Some(_), Some(_)) => Err(PipelineError::AmbiguousOrMissingCell {
                cell_id: cell_id.to_string(),
                matches: 2 + matches.count(),
            }),
        }
    }

    /// Planar area-weighted centroid of the selected cell's geometry.
    pub fn centroid_of(&self, cell_id: &str) -> Result<Point<f64>, PipelineError> {
        let cell = self.cell_by_id(cell_id)?;
        // A geometry with no centroid is degenerate, which the grid data
        // model rules out; treat it the same as a missing cell.
        cell.geometry
            .centroid()
            .ok_or_else(|| PipelineError::AmbiguousOrMissingCell {
                cell_id: cell_id.to_string(),
                matches: 0,
            })
    }
}

/// Extract polygonal geometry from a feature, keeping every part of a
/// MultiPolygon. Returns `None` for other geometry types.
fn feature_multi_polygon(feature: &Feature) -> Result<Option<MultiPolygon<f64>>> {
    let geometry = match &feature.geometry {
        Some(geometry) => geometry,
        None => return Ok(None),
    };

    let geo_geom: geo::Geometry<f64> = geometry
        .try_into()
        .context("Failed to convert GeoJSON geometry to geo::Geometry")?;

    match geo_geom {
        geo::Geometry::Polygon(polygon) => Ok(Some(MultiPolygon::new(vec![polygon]))),
        geo::Geometry::MultiPolygon(mp) if !mp.0.is_empty() => Ok(Some(mp)),
        _ => Ok(None),
    }
}
