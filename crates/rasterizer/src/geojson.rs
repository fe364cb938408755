//! GeoJSON input for leaf tiles.
//!
//! Only the subset needed to read an upstream vector tile is modelled:
//! features with a geometry and a flat property object. Geometry types the
//! rasterizer cannot burn still parse, and are skipped later.

use geo::{Coord, Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::feature::Feature;
use raster_common::{RasterError, RasterResult};

/// A GeoJSON FeatureCollection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeoJsonFeatureCollection {
    #[serde(rename = "type")]
    pub type_: String,

    #[serde(default)]
    pub features: Vec<GeoJsonFeature>,
}

/// A GeoJSON Feature.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeoJsonFeature {
    #[serde(rename = "type")]
    pub type_: String,

    pub geometry: Option<GeoJsonGeometry>,

    #[serde(default)]
    pub properties: Option<Map<String, Value>>,
}

/// A GeoJSON position. Altitude and any further members are accepted and
/// dropped.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl TryFrom<Vec<f64>> for Position {
    type Error = String;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        match values.as_slice() {
            [x, y, ..] => Ok(Position { x: *x, y: *y }),
            _ => Err(format!(
                "a position needs at least 2 coordinates, got {}",
                values.len()
            )),
        }
    }
}

impl From<Position> for Vec<f64> {
    fn from(p: Position) -> Self {
        vec![p.x, p.y]
    }
}

/// GeoJSON geometry objects.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum GeoJsonGeometry {
    Point {
        coordinates: Position,
    },
    MultiPoint {
        coordinates: Vec<Position>,
    },
    LineString {
        coordinates: Vec<Position>,
    },
    MultiLineString {
        coordinates: Vec<Vec<Position>>,
    },
    /// First ring is the exterior, the rest are holes.
    Polygon {
        coordinates: Vec<Vec<Position>>,
    },
    MultiPolygon {
        coordinates: Vec<Vec<Vec<Position>>>,
    },
    #[serde(other)]
    Unsupported,
}

fn line(coords: &[Position]) -> LineString<f64> {
    LineString::new(coords.iter().map(|c| Coord { x: c.x, y: c.y }).collect())
}

fn polygon(rings: &[Vec<Position>]) -> Option<Polygon<f64>> {
    let (exterior, holes) = rings.split_first()?;
    Some(Polygon::new(
        line(exterior),
        holes.iter().map(|h| line(h)).collect(),
    ))
}

impl GeoJsonGeometry {
    /// Convert to a `geo` geometry. `None` for unsupported or empty input.
    pub fn to_geo(&self) -> Option<Geometry<f64>> {
        let geometry = match self {
            GeoJsonGeometry::Point { coordinates } => {
                Geometry::Point(Point::new(coordinates.x, coordinates.y))
            }
            GeoJsonGeometry::MultiPoint { coordinates } => Geometry::MultiPoint(MultiPoint::new(
                coordinates.iter().map(|c| Point::new(c.x, c.y)).collect(),
            )),
            GeoJsonGeometry::LineString { coordinates } => {
                Geometry::LineString(line(coordinates))
            }
            GeoJsonGeometry::MultiLineString { coordinates } => Geometry::MultiLineString(
                MultiLineString::new(coordinates.iter().map(|l| line(l)).collect()),
            ),
            GeoJsonGeometry::Polygon { coordinates } => Geometry::Polygon(polygon(coordinates)?),
            GeoJsonGeometry::MultiPolygon { coordinates } => Geometry::MultiPolygon(
                MultiPolygon::new(coordinates.iter().filter_map(|p| polygon(p)).collect()),
            ),
            GeoJsonGeometry::Unsupported => return None,
        };
        Some(geometry)
    }
}

impl GeoJsonFeatureCollection {
    /// Parse a FeatureCollection document.
    pub fn from_json(bytes: &[u8]) -> RasterResult<Self> {
        let collection: Self = serde_json::from_slice(bytes)
            .map_err(|e| RasterError::data(format!("invalid GeoJSON: {}", e)))?;
        if collection.type_ != "FeatureCollection" {
            return Err(RasterError::data(format!(
                "expected a FeatureCollection, got '{}'",
                collection.type_
            )));
        }
        Ok(collection)
    }

    /// Features with a usable geometry. The count of dropped features is
    /// returned alongside.
    pub fn into_features(self) -> (Vec<Feature>, usize) {
        let total = self.features.len();
        let features: Vec<Feature> = self
            .features
            .into_iter()
            .filter_map(|f| {
                let geometry = f.geometry?.to_geo()?;
                Some(Feature {
                    geometry,
                    properties: f.properties.unwrap_or_default(),
                })
            })
            .collect();
        let dropped = total - features.len();
        (features, dropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_feature_collection() {
        let doc = br#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature",
                 "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,1],[0,0]]]},
                 "properties": {"height": 3.5}},
                {"type": "Feature",
                 "geometry": {"type": "Point", "coordinates": [0.5, 0.5]},
                 "properties": null},
                {"type": "Feature",
                 "geometry": {"type": "GeometryCollection", "geometries": []},
                 "properties": {}},
                {"type": "Feature", "geometry": null, "properties": {}}
            ]
        }"#;

        let collection = GeoJsonFeatureCollection::from_json(doc).unwrap();
        let (features, dropped) = collection.into_features();
        assert_eq!(features.len(), 2);
        assert_eq!(dropped, 2);
        assert_eq!(features[0].geometry_type(), "Polygon");
        assert!(features[1].properties.is_empty());
    }

    #[test]
    fn test_positions_with_altitude() {
        let doc = br#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature",
                 "geometry": {"type": "Point", "coordinates": [0.5, 0.5, 12.0]},
                 "properties": {}},
                {"type": "Feature",
                 "geometry": {"type": "Polygon",
                              "coordinates": [[[0,0,1],[2,0,1],[2,2,1],[0,2,1],[0,0,1]]]},
                 "properties": {}}
            ]
        }"#;

        let (features, dropped) = GeoJsonFeatureCollection::from_json(doc)
            .unwrap()
            .into_features();
        assert_eq!(dropped, 0);
        assert_eq!(features[0].geometry, Geometry::Point(Point::new(0.5, 0.5)));
        match &features[1].geometry {
            Geometry::Polygon(p) => {
                assert_eq!(p.exterior().0.len(), 5);
                assert_eq!(p.exterior().0[2], Coord { x: 2.0, y: 2.0 });
            }
            other => panic!("expected a polygon, got {:?}", other),
        }
    }

    #[test]
    fn test_short_position_is_rejected() {
        let doc = br#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "geometry": {"type": "Point", "coordinates": [0.5]},
             "properties": {}}]}"#;
        let err = GeoJsonFeatureCollection::from_json(doc).unwrap_err();
        assert!(err.to_string().contains("at least 2 coordinates"));
    }

    #[test]
    fn test_rejects_non_collection() {
        let doc = br#"{"type": "Feature", "features": []}"#;
        assert!(GeoJsonFeatureCollection::from_json(doc).is_err());
        assert!(GeoJsonFeatureCollection::from_json(b"not json").is_err());
    }
}
