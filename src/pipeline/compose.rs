use geo::Point;
use geojson::{Feature, FeatureCollection};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::dataset::isochrone::{Isochrone, Profile};
use crate::dataset::points::PointSet;
use crate::geo_core::BoundingBox;

/// Opacity of isochrone fill layers.
pub const FILL_OPACITY: f64 = 0.7;
/// Margin added around the isochrone bounds so nothing sits on the edge.
pub const VIEWPORT_MARGIN_DEG: f64 = 0.005;
/// Default zoom when no isochrone constrains the viewport.
pub const DEFAULT_ZOOM: f64 = 12.0;
/// Base map style the renderer should use.
pub const MAP_STYLE: &str = "carto-positron";

/// An RGB color, emitted as CSS color strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub fn css(&self) -> String {
        format!("rgb({}, {}, {})", self.0, self.1, self.2)
    }

    pub fn rgba(&self, alpha: f64) -> String {
        format!("rgba({}, {}, {}, {})", self.0, self.1, self.2, alpha)
    }
}

/// Base point markers are blue; the centroid marker is orange so the
/// selected cell stands apart from the points around it.
pub const BASE_POINT_COLOR: Rgb = Rgb(0, 0, 255);
pub const CENTROID_COLOR: Rgb = Rgb(255, 140, 0);

/// Fixed fill color per transport profile. Profiles outside the map get no
/// fill color and render as absent layers, never as an error.
pub fn profile_color(profile: &Profile) -> Option<Rgb> {
    match profile {
        Profile::FootWalking => Some(Rgb(255, 0, 0)),
        Profile::CyclingRegular => Some(Rgb(0, 255, 0)),
        Profile::DrivingCar => Some(Rgb(0, 0, 255)),
        Profile::Other(_) => None,
    }
}

/// The three profiles the legend always shows, in display order.
const LEGEND_PROFILES: [Profile; 3] = [
    Profile::FootWalking,
    Profile::CyclingRegular,
    Profile::DrivingCar,
];

/// Which points the base layer shows: the selected commune's, or every
/// loaded point for broader context. Both behaviors exist in the field, so
/// the choice is explicit rather than baked in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PointScope {
    Commune,
    Global,
}

#[derive(Debug, Clone, Copy)]
pub struct ComposeOptions {
    pub scope: PointScope,
}

impl Default for ComposeOptions {
    fn default() -> Self {
        ComposeOptions {
            scope: PointScope::Commune,
        }
    }
}

/// One base-layer marker, label attached as hover metadata.
#[derive(Debug, Clone, Serialize)]
pub struct PointMarker {
    pub lon: f64,
    pub lat: f64,
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PointLayer {
    pub points: Vec<PointMarker>,
    pub color: String,
}

/// One translucent isochrone fill, drawn beneath the point markers.
#[derive(Debug, Clone, Serialize)]
pub struct FillLayer {
    pub profile: Profile,
    pub range: Option<u32>,
    pub color: Option<String>,
    pub opacity: f64,
    pub below_points: bool,
    pub geometry: FeatureCollection,
}

#[derive(Debug, Clone, Serialize)]
pub struct CentroidMarker {
    pub lon: f64,
    pub lat: f64,
    pub color: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LegendEntry {
    pub label: String,
    pub color: String,
}

/// Map viewport: tight bounds around the visible isochrones, or a
/// center/zoom derived from the base points when no isochrone is shown.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Viewport {
    Bounds {
        west: f64,
        south: f64,
        east: f64,
        north: f64,
    },
    Center {
        lon: f64,
        lat: f64,
        zoom: f64,
    },
}

/// A complete renderable map specification. This is the pipeline's output:
/// any front end (or none, in tests) can consume it.
#[derive(Debug, Clone, Serialize)]
pub struct MapSpec {
    pub style: String,
    pub base: PointLayer,
    pub fills: Vec<FillLayer>,
    pub centroid: CentroidMarker,
    pub legend: Vec<LegendEntry>,
    pub viewport: Viewport,
}

pub fn compose(
    points: &PointSet,
    commune: &str,
    view: &[&Isochrone],
    centroid: Point<f64>,
    options: &ComposeOptions,
) -> MapSpec {
    let base = base_layer(points, commune, options.scope);
    let fills = fill_layers(view);
    let viewport = viewport(view, &base, centroid);

    MapSpec {
        style: MAP_STYLE.to_string(),
        base,
        fills,
        centroid: CentroidMarker {
            lon: centroid.x(),
            lat: centroid.y(),
            color: CENTROID_COLOR.css(),
        },
        legend: legend(),
        viewport,
    }
}

fn base_layer(points: &PointSet, commune: &str, scope: PointScope) -> PointLayer {
    let markers: Vec<PointMarker> = match scope {
        PointScope::Commune => points
            .in_commune(commune)
            .into_iter()
            .map(|p| PointMarker {
                lon: p.location.x(),
                lat: p.location.y(),
                label: p.label.clone(),
            })
            .collect(),
        PointScope::Global => points
            .points()
            .iter()
            .map(|p| PointMarker {
                lon: p.location.x(),
                lat: p.location.y(),
                label: p.label.clone(),
            })
            .collect(),
    };

    PointLayer {
        points: markers,
        color: BASE_POINT_COLOR.css(),
    }
}

/// One fill layer per (profile, range) combination present in the view,
/// ordered by profile then range.
fn fill_layers(view: &[&Isochrone]) -> Vec<FillLayer> {
    let mut groups: BTreeMap<(Profile, Option<u32>), Vec<&Isochrone>> = BTreeMap::new();
    for &isochrone in view {
        groups
            .entry((isochrone.profile.clone(), isochrone.range))
            .or_default()
            .push(isochrone);
    }

    groups
        .into_iter()
        .map(|((profile, range), isochrones)| {
            let features = isochrones
                .iter()
                .map(|i| Feature::from(geojson::Geometry::new(geojson::Value::from(&i.geometry))))
                .collect();
            FillLayer {
                color: profile_color(&profile).map(|c| c.rgba(FILL_OPACITY)),
                profile,
                range,
                opacity: FILL_OPACITY,
                below_points: true,
                geometry: FeatureCollection {
                    bbox: None,
                    features,
                    foreign_members: None,
                },
            }
        })
        .collect()
}

/// The legend is exhaustive: one entry per mapped profile at full opacity,
/// independent of which profiles the current view contains.
fn legend() -> Vec<LegendEntry> {
    LEGEND_PROFILES
        .iter()
        .filter_map(|profile| {
            profile_color(profile).map(|color| LegendEntry {
                label: profile.display_name(),
                color: color.css(),
            })
        })
        .collect()
}

fn viewport(view: &[&Isochrone], base: &PointLayer, centroid: Point<f64>) -> Viewport {
    if let Some(bbox) = BoundingBox::from_polygons(view.iter().flat_map(|i| i.geometry.0.iter())) {
        let bbox = bbox.expand(VIEWPORT_MARGIN_DEG);
        return Viewport::Bounds {
            west: bbox.west,
            south: bbox.south,
            east: bbox.east,
            north: bbox.north,
        };
    }

    // No isochrone visible: center on the base points, or on the selected
    // cell's centroid when the base layer is empty too.
    let (lon, lat) = if base.points.is_empty() {
        (centroid.x(), centroid.y())
    } else {
        let n = base.points.len() as f64;
        (
            base.points.iter().map(|p| p.lon).sum::<f64>() / n,
            base.points.iter().map(|p| p.lat).sum::<f64>() / n,
        )
    };

    Viewport::Center {
        lon,
        lat,
        zoom: DEFAULT_ZOOM,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::isochrone::IsochroneSet;
    use crate::dataset::points::PointOfInterest;
    use geo::{polygon, MultiPolygon};

    fn iso(profile: Profile, range: Option<u32>) -> Isochrone {
        Isochrone {
            cell_id: "c1".to_string(),
            profile,
            range,
            geometry: MultiPolygon::new(vec![polygon![
                (x: 4.82, y: 45.74),
                (x: 4.86, y: 45.74),
                (x: 4.86, y: 45.78),
                (x: 4.82, y: 45.74),
            ]]),
        }
    }

    fn poi(commune: &str, lon: f64, lat: f64) -> PointOfInterest {
        PointOfInterest {
            location: Point::new(lon, lat),
            label: Some("Equipement".to_string()),
            commune: Some(commune.to_string()),
            cell_id: Some("c1".to_string()),
        }
    }

    #[test]
    fn test_legend_is_exhaustive() {
        let entries = legend();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].label, "Foot-walking");
        assert_eq!(entries[0].color, "rgb(255, 0, 0)");
        assert_eq!(entries[1].color, "rgb(0, 255, 0)");
        assert_eq!(entries[2].color, "rgb(0, 0, 255)");
    }

    #[test]
    fn test_fill_layers_grouped_and_colored() {
        let a = iso(Profile::CyclingRegular, Some(600));
        let b = iso(Profile::CyclingRegular, Some(600));
        let c = iso(Profile::FootWalking, Some(300));
        let view = vec![&a, &b, &c];

        let fills = fill_layers(&view);
        assert_eq!(fills.len(), 2);
        // BTreeMap order: FootWalking before CyclingRegular follows enum
        // declaration order.
        assert_eq!(fills[0].profile, Profile::FootWalking);
        assert_eq!(fills[1].profile, Profile::CyclingRegular);
        assert_eq!(fills[1].geometry.features.len(), 2);
        assert_eq!(fills[1].color.as_deref(), Some("rgba(0, 255, 0, 0.7)"));
        assert!(fills.iter().all(|f| f.below_points));
    }

    #[test]
    fn test_unmapped_profile_gets_no_color() {
        let a = iso(Profile::Other("wheelchair".to_string()), None);
        let fills = fill_layers(&[&a]);
        assert_eq!(fills.len(), 1);
        assert!(fills[0].color.is_none());
    }

    #[test]
    fn test_viewport_bounds_isochrones_with_margin() {
        let a = iso(Profile::FootWalking, Some(300));
        let points = PointSet::new(vec![poi("Lyon", 4.83, 45.75)]);
        let spec = compose(
            &points,
            "Lyon",
            &[&a],
            Point::new(4.84, 45.76),
            &ComposeOptions::default(),
        );
        match spec.viewport {
            Viewport::Bounds {
                west,
                south,
                east,
                north,
            } => {
                assert!((west - (4.82 - VIEWPORT_MARGIN_DEG)).abs() < 1e-9);
                assert!((south - (45.74 - VIEWPORT_MARGIN_DEG)).abs() < 1e-9);
                assert!((east - (4.86 + VIEWPORT_MARGIN_DEG)).abs() < 1e-9);
                assert!((north - (45.78 + VIEWPORT_MARGIN_DEG)).abs() < 1e-9);
            }
            other => panic!("expected bounds viewport, got {:?}", other),
        }
    }

    #[test]
    fn test_multi_part_isochrone_fills_and_bounds_all_parts() {
        let a = Isochrone {
            cell_id: "c1".to_string(),
            profile: Profile::FootWalking,
            range: Some(300),
            geometry: MultiPolygon::new(vec![
                polygon![
                    (x: 4.82, y: 45.74),
                    (x: 4.86, y: 45.74),
                    (x: 4.86, y: 45.78),
                    (x: 4.82, y: 45.74),
                ],
                polygon![
                    (x: 4.90, y: 45.80),
                    (x: 4.92, y: 45.80),
                    (x: 4.92, y: 45.82),
                    (x: 4.90, y: 45.80),
                ],
            ]),
        };

        let fills = fill_layers(&[&a]);
        assert_eq!(fills.len(), 1);
        match &fills[0].geometry.features[0].geometry {
            Some(geojson::Geometry {
                value: geojson::Value::MultiPolygon(parts),
                ..
            }) => assert_eq!(parts.len(), 2),
            other => panic!("expected a MultiPolygon feature, got {:?}", other),
        }

        let points = PointSet::new(vec![]);
        let spec = compose(
            &points,
            "Lyon",
            &[&a],
            Point::new(4.84, 45.76),
            &ComposeOptions::default(),
        );
        match spec.viewport {
            Viewport::Bounds { east, north, .. } => {
                // Bounds must cover the detached part too.
                assert!((east - (4.92 + VIEWPORT_MARGIN_DEG)).abs() < 1e-9);
                assert!((north - (45.82 + VIEWPORT_MARGIN_DEG)).abs() < 1e-9);
            }
            other => panic!("expected bounds viewport, got {:?}", other),
        }
    }

    #[test]
    fn test_viewport_falls_back_to_point_center() {
        let points = PointSet::new(vec![poi("Lyon", 4.0, 45.0), poi("Lyon", 5.0, 46.0)]);
        let spec = compose(
            &points,
            "Lyon",
            &[],
            Point::new(4.5, 45.5),
            &ComposeOptions::default(),
        );
        match spec.viewport {
            Viewport::Center { lon, lat, zoom } => {
                assert!((lon - 4.5).abs() < 1e-9);
                assert!((lat - 45.5).abs() < 1e-9);
                assert_eq!(zoom, DEFAULT_ZOOM);
            }
            other => panic!("expected center viewport, got {:?}", other),
        }
    }

    #[test]
    fn test_point_scope_commune_vs_global() {
        let points = PointSet::new(vec![poi("Lyon", 4.83, 45.75), poi("Paris", 2.35, 48.85)]);
        let view: Vec<&Isochrone> = Vec::new();

        let commune = compose(
            &points,
            "Lyon",
            &view,
            Point::new(4.84, 45.76),
            &ComposeOptions {
                scope: PointScope::Commune,
            },
        );
        assert_eq!(commune.base.points.len(), 1);

        let global = compose(
            &points,
            "Lyon",
            &view,
            Point::new(4.84, 45.76),
            &ComposeOptions {
                scope: PointScope::Global,
            },
        );
        assert_eq!(global.base.points.len(), 2);
    }

    #[test]
    fn test_map_spec_serializes() {
        let points = PointSet::new(vec![poi("Lyon", 4.83, 45.75)]);
        let a = iso(Profile::DrivingCar, Some(900));
        let spec = compose(
            &points,
            "Lyon",
            &[&a],
            Point::new(4.84, 45.76),
            &ComposeOptions::default(),
        );
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["style"], "carto-positron");
        assert_eq!(json["fills"][0]["profile"], "driving-car");
        assert_eq!(json["legend"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_isochrone_set_helper_still_filters() {
        // Composing straight from a filter result keeps types aligned.
        let set = IsochroneSet::new(vec![iso(Profile::FootWalking, Some(300))]);
        let view = set.filter("c1", None, None);
        let fills = fill_layers(&view);
        assert_eq!(fills.len(), 1);
    }
}
