//! Vector input records.

use geo::Geometry;
use serde_json::{Map, Value};

/// A geometry with its attribute values.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub geometry: Geometry<f64>,
    pub properties: Map<String, Value>,
}

/// An attribute value as seen by a statistic.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue<'a> {
    Number(f64),
    Text(&'a str),
    /// Missing property or explicit JSON null.
    Null,
    /// Arrays and objects.
    Unsupported,
}

impl Feature {
    pub fn new(geometry: impl Into<Geometry<f64>>) -> Self {
        Self {
            geometry: geometry.into(),
            properties: Map::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn attribute(&self, name: &str) -> AttributeValue<'_> {
        match self.properties.get(name) {
            None | Some(Value::Null) => AttributeValue::Null,
            Some(Value::Number(n)) => n.as_f64().map_or(AttributeValue::Null, AttributeValue::Number),
            Some(Value::Bool(b)) => AttributeValue::Number(if *b { 1.0 } else { 0.0 }),
            Some(Value::String(s)) => AttributeValue::Text(s),
            Some(_) => AttributeValue::Unsupported,
        }
    }

    /// Human readable geometry type, for log messages.
    pub fn geometry_type(&self) -> &'static str {
        match &self.geometry {
            Geometry::Point(_) => "Point",
            Geometry::MultiPoint(_) => "MultiPoint",
            Geometry::Line(_) => "Line",
            Geometry::LineString(_) => "LineString",
            Geometry::MultiLineString(_) => "MultiLineString",
            Geometry::Polygon(_) => "Polygon",
            Geometry::MultiPolygon(_) => "MultiPolygon",
            Geometry::GeometryCollection(_) => "GeometryCollection",
            Geometry::Rect(_) => "Rect",
            Geometry::Triangle(_) => "Triangle",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Point;
    use serde_json::json;

    #[test]
    fn test_attribute_kinds() {
        let feature = Feature::new(Point::new(0.0, 0.0))
            .with_property("n", 2.5)
            .with_property("s", "forest")
            .with_property("b", true)
            .with_property("null", Value::Null)
            .with_property("obj", json!({"a": 1}));

        assert_eq!(feature.attribute("n"), AttributeValue::Number(2.5));
        assert_eq!(feature.attribute("s"), AttributeValue::Text("forest"));
        assert_eq!(feature.attribute("b"), AttributeValue::Number(1.0));
        assert_eq!(feature.attribute("null"), AttributeValue::Null);
        assert_eq!(feature.attribute("missing"), AttributeValue::Null);
        assert_eq!(feature.attribute("obj"), AttributeValue::Unsupported);
        assert_eq!(feature.geometry_type(), "Point");
    }
}
