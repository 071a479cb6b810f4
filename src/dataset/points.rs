use anyhow::{Context, Result};
use geo::Point;
use geojson::{Feature, GeoJson};
use log::warn;

/// A point of interest from the BPE (base permanente des équipements):
/// one equipment location with its name, commune and grid cell.
#[derive(Debug, Clone, PartialEq)]
pub struct PointOfInterest {
    pub location: Point<f64>,
    /// Equipment name (`NOMRS`), used as hover label.
    pub label: Option<String>,
    /// Commune the point belongs to (`LIBCOM`).
    pub commune: Option<String>,
    /// Grid cell the point falls in (`Idcar_200m`).
    pub cell_id: Option<String>,
}

/// The point-of-interest set. Rows lacking coordinates are dropped at load
/// time: the point layer must never contain null-coordinate entries.
#[derive(Debug, Clone, Default)]
pub struct PointSet {
    points: Vec<PointOfInterest>,
}

impl PointSet {
    pub fn new(points: Vec<PointOfInterest>) -> Self {
        PointSet { points }
    }

    pub fn from_geojson(data: &str) -> Result<Self> {
        let geojson: GeoJson = data
            .parse()
            .context("Failed to parse point-of-interest GeoJSON")?;
        let fc = match geojson {
            GeoJson::FeatureCollection(fc) => fc,
            _ => anyhow::bail!("Point-of-interest file must be a GeoJSON FeatureCollection"),
        };

        let mut points = Vec::with_capacity(fc.features.len());
        let mut dropped = 0usize;
        for feature in &fc.features {
            match feature_point(feature) {
                Some(point) => points.push(point),
                None => dropped += 1,
            }
        }

        if dropped > 0 {
            warn!(
                "Dropped {} point-of-interest rows with missing coordinates",
                dropped
            );
        }

        Ok(PointSet { points })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[PointOfInterest] {
        &self.points
    }

    pub fn in_commune<'a>(&'a self, commune: &str) -> Vec<&'a PointOfInterest> {
        self.points
            .iter()
            .filter(|p| p.commune.as_deref() == Some(commune))
            .collect()
    }

    pub fn contains_cell(&self, cell_id: &str) -> bool {
        self.points
            .iter()
            .any(|p| p.cell_id.as_deref() == Some(cell_id))
    }
}

/// Build a point from the LATITUDE/LONGITUDE columns. Rows where either
/// coordinate is missing or non-finite are dropped.
fn feature_point(feature: &Feature) -> Option<PointOfInterest> {
    let lat = feature.property("LATITUDE").and_then(|v| v.as_f64())?;
    let lon = feature.property("LONGITUDE").and_then(|v| v.as_f64())?;
    if !lat.is_finite() || !lon.is_finite() {
        return None;
    }

    let as_string = |key: &str| {
        feature
            .property(key)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    };

    Some(PointOfInterest {
        location: Point::new(lon, lat),
        label: as_string("NOMRS"),
        commune: as_string("LIBCOM"),
        cell_id: as_string("Idcar_200m"),
    })
}
