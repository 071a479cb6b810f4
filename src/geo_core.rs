use anyhow::{Context, Result};
use geo::{BoundingRect, Coord, LineString, MultiPolygon, Point, Polygon};
use proj::Proj;

/// EPSG code of Lambert-93, the projected CRS the source grid files are
/// stored in (used for metropolitan France).
pub const LAMBERT_93: i32 = 2154;

/// EPSG code of WGS84 lat/lon, the CRS the map renderer expects.
pub const WGS84: i32 = 4326;

/// Transform a single coordinate pair from one CRS to another.
pub fn transform_coords(from_epsg: i32, to_epsg: i32, x: f64, y: f64) -> Result<(f64, f64)> {
    CrsTransform::new(from_epsg, to_epsg)?.convert(x, y)
}

/// A reusable coordinate transformation between two EPSG-coded CRS.
///
/// Building the underlying projection is the expensive part, so one
/// instance is created per dataset load and applied to every geometry.
pub struct CrsTransform {
    proj: Proj,
}

impl CrsTransform {
    pub fn new(from_epsg: i32, to_epsg: i32) -> Result<Self> {
        let from_crs = format!("EPSG:{}", from_epsg);
        let to_crs = format!("EPSG:{}", to_epsg);

        let proj = Proj::new_known_crs(&from_crs, &to_crs, None)
            .context("Failed to create Proj transformation")?;

        Ok(CrsTransform { proj })
    }

    pub fn convert(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        self.proj
            .convert((x, y))
            .context("Failed to transform coordinates")
    }

    pub fn point(&self, point: Point<f64>) -> Result<Point<f64>> {
        let (x, y) = self.convert(point.x(), point.y())?;
        Ok(Point::new(x, y))
    }

    pub fn polygon(&self, polygon: &Polygon<f64>) -> Result<Polygon<f64>> {
        let exterior = self.line_string(polygon.exterior())?;
        let interiors = polygon
            .interiors()
            .iter()
            .map(|ring| self.line_string(ring))
            .collect::<Result<Vec<_>>>()?;
        Ok(Polygon::new(exterior, interiors))
    }

    pub fn multi_polygon(&self, mp: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>> {
        let polygons = mp
            .0
            .iter()
            .map(|polygon| self.polygon(polygon))
            .collect::<Result<Vec<_>>>()?;
        Ok(MultiPolygon::new(polygons))
    }

    fn line_string(&self, line: &LineString<f64>) -> Result<LineString<f64>> {
        let coords = line
            .coords()
            .map(|c| self.convert(c.x, c.y).map(|(x, y)| Coord { x, y }))
            .collect::<Result<Vec<_>>>()?;
        Ok(LineString::new(coords))
    }
}

/// Bounding box in lon/lat order: west/south/east/north.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BoundingBox {
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        BoundingBox {
            west,
            south,
            east,
            north,
        }
    }

    /// Tight bounds of a set of polygons. Returns `None` when the iterator
    /// is empty or every polygon is degenerate.
    pub fn from_polygons<'a, I>(polygons: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Polygon<f64>>,
    {
        let mut merged: Option<BoundingBox> = None;
        for polygon in polygons {
            if let Some(rect) = polygon.bounding_rect() {
                let bbox = BoundingBox::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y);
                merged = Some(match merged {
                    Some(acc) => acc.merge(&bbox),
                    None => bbox,
                });
            }
        }
        merged
    }

    pub fn merge(&self, other: &BoundingBox) -> Self {
        BoundingBox::new(
            self.west.min(other.west),
            self.south.min(other.south),
            self.east.max(other.east),
            self.north.max(other.north),
        )
    }

    /// Expand by a fixed margin on all four sides, so geometry at the edge
    /// is not clipped by the viewport.
    pub fn expand(&self, margin: f64) -> Self {
        BoundingBox::new(
            self.west - margin,
            self.south - margin,
            self.east + margin,
            self.north + margin,
        )
    }
}
