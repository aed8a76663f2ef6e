//! Area shapes: circles and polygons.

use super::{ModelError, ModelResult, SerializableColor, ShapeId, check_finite, check_opacity, default_opacity};
use crate::geometry::{self, LatLng};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Vertices closer than this (in degrees) count as the same vertex.
const VERTEX_EPSILON: f64 = 1e-9;

/// Kind of area shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    Circle,
    Polygon,
}

/// Geometry of an area shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum ShapeGeometry {
    Circle { center: LatLng, radius_km: f64 },
    /// Open ring; the renderer closes it.
    Polygon { vertices: Vec<LatLng> },
}

/// A drawn circle or polygon. Deserialization validates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "ShapeFields")]
pub struct Shape {
    pub(crate) id: ShapeId,
    #[serde(flatten)]
    pub geometry: ShapeGeometry,
    pub color: SerializableColor,
    #[serde(default = "default_opacity")]
    pub opacity: f64,
}

/// Unvalidated wire form of a [`Shape`].
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShapeFields {
    id: ShapeId,
    #[serde(flatten)]
    geometry: ShapeGeometry,
    color: SerializableColor,
    #[serde(default = "default_opacity")]
    opacity: f64,
}

impl TryFrom<ShapeFields> for Shape {
    type Error = ModelError;

    fn try_from(fields: ShapeFields) -> Result<Self, Self::Error> {
        let shape = Shape {
            id: fields.id,
            geometry: fields.geometry,
            color: fields.color,
            opacity: fields.opacity,
        };
        shape.validate()?;
        Ok(shape)
    }
}

impl Shape {
    /// Create a circle. The radius must be positive.
    pub fn circle(center: LatLng, radius_km: f64) -> ModelResult<Self> {
        Self::from_geometry(ShapeGeometry::Circle { center, radius_km })
    }

    /// Create a polygon from an open ring of at least 3 distinct vertices.
    pub fn polygon(vertices: Vec<LatLng>) -> ModelResult<Self> {
        Self::from_geometry(ShapeGeometry::Polygon { vertices })
    }

    fn from_geometry(geometry: ShapeGeometry) -> ModelResult<Self> {
        let shape = Self {
            id: Uuid::new_v4(),
            geometry,
            color: SerializableColor::default(),
            opacity: default_opacity(),
        };
        shape.validate()?;
        Ok(shape)
    }

    pub fn with_color(mut self, color: SerializableColor) -> Self {
        self.color = color;
        self
    }

    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn id(&self) -> ShapeId {
        self.id
    }

    pub fn kind(&self) -> ShapeKind {
        match self.geometry {
            ShapeGeometry::Circle { .. } => ShapeKind::Circle,
            ShapeGeometry::Polygon { .. } => ShapeKind::Polygon,
        }
    }

    /// Check the shape invariants.
    pub fn validate(&self) -> ModelResult<()> {
        check_opacity(self.opacity)?;
        match &self.geometry {
            ShapeGeometry::Circle { center, radius_km } => {
                check_finite(std::slice::from_ref(center))?;
                if !(*radius_km > 0.0) || !radius_km.is_finite() {
                    return Err(ModelError::NonPositiveRadius(*radius_km));
                }
            }
            ShapeGeometry::Polygon { vertices } => {
                check_finite(vertices)?;
                let distinct = distinct_vertex_count(vertices);
                if distinct < 3 {
                    return Err(ModelError::TooFewVertices(distinct));
                }
            }
        }
        Ok(())
    }

    /// Closed ring for rendering: sampled for circles, closed for polygons.
    pub fn ring(&self, circle_steps: usize) -> Vec<LatLng> {
        match &self.geometry {
            ShapeGeometry::Circle { center, radius_km } => {
                geometry::sample_circle(*center, *radius_km, circle_steps)
            }
            ShapeGeometry::Polygon { vertices } => {
                let mut ring = vertices.clone();
                if let (Some(first), Some(last)) = (vertices.first(), vertices.last()) {
                    if first != last {
                        ring.push(*first);
                    }
                }
                ring
            }
        }
    }
}

/// Count vertices that differ from every earlier vertex.
pub(crate) fn distinct_vertex_count(vertices: &[LatLng]) -> usize {
    let mut seen: Vec<LatLng> = Vec::with_capacity(vertices.len());
    for v in vertices {
        if !seen.iter().any(|s| s.approx_eq(*v, VERTEX_EPSILON)) {
            seen.push(*v);
        }
    }
    seen.len()
}

/// Drop consecutive repeats (as produced by the two clicks of a double-click).
pub(crate) fn dedup_consecutive(vertices: &mut Vec<LatLng>) {
    vertices.dedup_by(|a, b| a.approx_eq(*b, VERTEX_EPSILON));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Vec<LatLng> {
        vec![
            LatLng::new(0.0, 0.0),
            LatLng::new(1.0, 0.0),
            LatLng::new(0.0, 1.0),
        ]
    }

    #[test]
    fn test_circle_requires_positive_radius() {
        assert!(Shape::circle(LatLng::new(0.0, 0.0), 10.0).is_ok());
        assert_eq!(
            Shape::circle(LatLng::new(0.0, 0.0), 0.0).unwrap_err(),
            ModelError::NonPositiveRadius(0.0)
        );
        assert!(Shape::circle(LatLng::new(0.0, 0.0), f64::NAN).is_err());
    }

    #[test]
    fn test_polygon_requires_three_distinct() {
        assert!(Shape::polygon(triangle()).is_ok());
        let repeated = vec![
            LatLng::new(0.0, 0.0),
            LatLng::new(1.0, 0.0),
            LatLng::new(1.0, 0.0),
        ];
        assert_eq!(
            Shape::polygon(repeated).unwrap_err(),
            ModelError::TooFewVertices(2)
        );
    }

    #[test]
    fn test_polygon_ring_is_closed() {
        let shape = Shape::polygon(triangle()).unwrap();
        let ring = shape.ring(64);
        assert_eq!(ring.len(), 4);
        assert_eq!(ring.first(), ring.last());
    }

    #[test]
    fn test_circle_ring_uses_steps() {
        let shape = Shape::circle(LatLng::new(10.0, 10.0), 50.0).unwrap();
        assert_eq!(shape.ring(64).len(), 65);
        assert_eq!(shape.kind(), ShapeKind::Circle);
    }

    #[test]
    fn test_serde_shape_layout() {
        let shape = Shape::circle(LatLng::new(1.0, 2.0), 5.0).unwrap();
        let value = serde_json::to_value(&shape).unwrap();
        assert_eq!(value["kind"], "circle");
        assert_eq!(value["radiusKm"], 5.0);
        assert_eq!(value["center"], serde_json::json!([2.0, 1.0]));
        let back: Shape = serde_json::from_value(value).unwrap();
        assert_eq!(back, shape);
    }

    #[test]
    fn test_dedup_consecutive() {
        let mut v = vec![
            LatLng::new(0.0, 0.0),
            LatLng::new(0.0, 0.0),
            LatLng::new(1.0, 1.0),
        ];
        dedup_consecutive(&mut v);
        assert_eq!(v.len(), 2);
    }
}
