use anyhow::{Context, Result};
use geo::MultiPolygon;
use geojson::{Feature, GeoJson};
use log::warn;
use serde::{Serialize, Serializer};
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

use crate::error::PipelineError;

/// Transport profile an isochrone was computed for. The three known
/// profiles carry fixed map colors; anything else is kept as-is and simply
/// renders without a fill color.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Profile {
    FootWalking,
    CyclingRegular,
    DrivingCar,
    Other(String),
}

impl Profile {
    pub fn parse(value: &str) -> Self {
        match value {
            "foot-walking" => Profile::FootWalking,
            "cycling-regular" => Profile::CyclingRegular,
            "driving-car" => Profile::DrivingCar,
            other => Profile::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Profile::FootWalking => "foot-walking",
            Profile::CyclingRegular => "cycling-regular",
            Profile::DrivingCar => "driving-car",
            Profile::Other(s) => s,
        }
    }

    /// Display form for the legend: first letter capitalized.
    pub fn display_name(&self) -> String {
        let name = self.as_str();
        let mut chars = name.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            None => String::new(),
        }
    }
}

impl Serialize for Profile {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One travel-time area: everything reachable from a grid cell within
/// `range` seconds using a given transport profile. Stored as a
/// multi-polygon because reachable areas are often disconnected (across
/// rivers or rail). The range is absent in the merged single-file dataset,
/// which predates the per-commune split.
#[derive(Debug, Clone, PartialEq)]
pub struct Isochrone {
    pub cell_id: String,
    pub profile: Profile,
    pub range: Option<u32>,
    pub geometry: MultiPolygon<f64>,
}

/// A set of isochrones, either the whole merged file or one commune's.
#[derive(Debug, Clone, Default)]
pub struct IsochroneSet {
    isochrones: Vec<Isochrone>,
}

impl IsochroneSet {
    pub fn new(isochrones: Vec<Isochrone>) -> Self {
        IsochroneSet { isochrones }
    }

    pub fn from_geojson(data: &str) -> Result<Self> {
        let geojson: GeoJson = data.parse().context("Failed to parse isochrone GeoJSON")?;
        let fc = match geojson {
            GeoJson::FeatureCollection(fc) => fc,
            _ => anyhow::bail!("Isochrone file must be a GeoJSON FeatureCollection"),
        };

        let mut isochrones = Vec::with_capacity(fc.features.len());
        for feature in &fc.features {
            match feature_isochrone(feature)? {
                Some(isochrone) => isochrones.push(isochrone),
                None => warn!("Skipping isochrone feature without cell id, profile or polygon"),
            }
        }

        Ok(IsochroneSet { isochrones })
    }

    pub fn len(&self) -> usize {
        self.isochrones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.isochrones.is_empty()
    }

    pub fn isochrones(&self) -> &[Isochrone] {
        &self.isochrones
    }

    pub fn contains_cell(&self, cell_id: &str) -> bool {
        self.isochrones.iter().any(|i| i.cell_id == cell_id)
    }

    /// Distinct profiles, in first-appearance order.
    pub fn profiles(&self) -> Vec<Profile> {
        let mut seen = Vec::new();
        for isochrone in &self.isochrones {
            if !seen.contains(&isochrone.profile) {
                seen.push(isochrone.profile.clone());
            }
        }
        seen
    }

    /// Distinct range values, sorted ascending.
    pub fn ranges(&self) -> Vec<u32> {
        let set: BTreeSet<u32> = self.isochrones.iter().filter_map(|i| i.range).collect();
        set.into_iter().collect()
    }

    /// Rows matching the selected cell and, when given, the selected
    /// profile and range sets. `None` means "all selected".
    pub fn filter<'a>(
        &'a self,
        cell_id: &str,
        profiles: Option<&BTreeSet<Profile>>,
        ranges: Option<&BTreeSet<u32>>,
    ) -> Vec<&'a Isochrone> {
        self.isochrones
            .iter()
            .filter(|i| i.cell_id == cell_id)
            .filter(|i| profiles.map_or(true, |set| set.contains(&i.profile)))
            .filter(|i| {
                ranges.map_or(true, |set| i.range.map_or(false, |r| set.contains(&r)))
            })
            .collect()
    }
}

/// Where isochrones come from: one merged file loaded up front, or one
/// file per commune resolved lazily on each commune change.
#[derive(Debug, Clone)]
pub enum IsochroneSource {
    Global(IsochroneSet),
    PerCommune(PathBuf),
}

impl IsochroneSource {
    /// Resolve the isochrone set for a commune. Per-commune files are
    /// re-read on every call: commune changes are infrequent user actions,
    /// not a hot path, and the dataset cache stays commune-agnostic.
    pub fn resolve(&self, commune: &str) -> Result<Cow<'_, IsochroneSet>, PipelineError> {
        match self {
            IsochroneSource::Global(set) => Ok(Cow::Borrowed(set)),
            IsochroneSource::PerCommune(dir) => {
                let path = dir.join(format!("{}.geojson", commune));
                let name = format!("isochrones/{}.geojson", commune);
                let data = fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {:?}", path))
                    .map_err(|e| PipelineError::dataset_load(name.clone(), e))?;
                let set = IsochroneSet::from_geojson(&data)
                    .map_err(|e| PipelineError::dataset_load(name, e))?;
                Ok(Cow::Owned(set))
            }
        }
    }
}

/// Build an isochrone from a feature. The cell id column is `Idcar_200m`
/// in the merged file and `carreaux_id` in the per-commune files; both are
/// accepted. Every part of a MultiPolygon is kept. Features missing a cell
/// id, profile or polygonal geometry yield `None`.
fn feature_isochrone(feature: &Feature) -> Result<Option<Isochrone>> {
    let cell_id = feature
        .property("Idcar_200m")
        .or_else(|| feature.property("carreaux_id"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());
    let profile = feature
        .property("profile")
        .and_then(|v| v.as_str())
        .map(Profile::parse);
    let range = feature
        .property("range")
        .and_then(|v| v.as_f64())
        .map(|r| r as u32);

    let (cell_id, profile) = match (cell_id, profile) {
        (Some(cell_id), Some(profile)) => (cell_id, profile),
        _ => return Ok(None),
    };

    let geometry = match &feature.geometry {
        Some(geometry) => geometry,
        None => return Ok(None),
    };
    let geo_geom: geo::Geometry<f64> = geometry
        .try_into()
        .context("Failed to convert GeoJSON geometry to geo::Geometry")?;
    let geometry = match geo_geom {
        geo::Geometry::Polygon(polygon) => MultiPolygon::new(vec![polygon]),
        geo::Geometry::MultiPolygon(mp) if !mp.0.is_empty() => mp,
        _ => return Ok(None),
    };

    Ok(Some(Isochrone {
        cell_id,
        profile,
        range,
        geometry,
    }))
}
