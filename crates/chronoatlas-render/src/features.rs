//! GeoJSON feature collections handed to map sources.

use chronoatlas_core::annotation::{AnnotatedArea, Connection};
use chronoatlas_core::geometry::LatLng;
use chronoatlas_core::shapes::SerializableColor;
use chronoatlas_core::tools::Preview;
use kurbo::{ParamCurve, ParamCurveArclen, Point};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

type Position = [f64; 2];

const ARCLEN_ACCURACY: f64 = 1e-9;

/// GeoJSON geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: Position },
    LineString { coordinates: Vec<Position> },
    Polygon { coordinates: Vec<Vec<Position>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Position>>> },
}

impl Geometry {
    pub fn point(at: LatLng) -> Self {
        Geometry::Point { coordinates: at.into() }
    }

    pub fn line_string(points: &[LatLng]) -> Self {
        Geometry::LineString {
            coordinates: positions(points),
        }
    }

    /// Single-ring polygon. The ring is closed if it is not already.
    pub fn polygon(ring: &[LatLng]) -> Self {
        Geometry::Polygon {
            coordinates: vec![closed_ring(ring)],
        }
    }

    pub fn multi_polygon(rings: &[Vec<LatLng>]) -> Self {
        Geometry::MultiPolygon {
            coordinates: rings.iter().map(|r| vec![closed_ring(r)]).collect(),
        }
    }
}

fn positions(points: &[LatLng]) -> Vec<Position> {
    points.iter().map(|&p| p.into()).collect()
}

fn closed_ring(ring: &[LatLng]) -> Vec<Position> {
    let mut coords = positions(ring);
    if let (Some(&first), Some(&last)) = (coords.first(), coords.last()) {
        if first != last {
            coords.push(first);
        }
    }
    coords
}

/// A GeoJSON feature with free-form properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "Feature")]
pub struct Feature {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub geometry: Geometry,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl Feature {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            id: None,
            geometry,
            properties: Map::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_property(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }
}

/// A GeoJSON feature collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "FeatureCollection")]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Order-sensitive hash of the serialized features.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        for feature in &self.features {
            serde_json::to_string(feature)
                .unwrap_or_default()
                .hash(&mut hasher);
        }
        hasher.finish()
    }
}

/// A territory to highlight, with its outline rings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerritoryHighlight {
    pub name: String,
    #[serde(default)]
    pub color: SerializableColor,
    #[serde(default = "default_territory_opacity")]
    pub opacity: f64,
    pub rings: Vec<Vec<LatLng>>,
}

fn default_territory_opacity() -> f64 {
    0.35
}

pub fn territory_features(territories: &[TerritoryHighlight]) -> FeatureCollection {
    FeatureCollection::new(
        territories
            .iter()
            .filter(|t| !t.rings.is_empty())
            .map(|t| {
                Feature::new(Geometry::multi_polygon(&t.rings))
                    .with_id(t.name.clone())
                    .with_property("name", t.name.clone())
                    .with_property("color", t.color.to_hex())
                    .with_property("opacity", t.opacity)
            })
            .collect(),
    )
}

pub fn area_features(areas: &[&AnnotatedArea], circle_steps: usize) -> FeatureCollection {
    FeatureCollection::new(
        areas
            .iter()
            .map(|area| {
                let id = area.id().to_string();
                Feature::new(Geometry::polygon(&area.shape.ring(circle_steps)))
                    .with_id(id.clone())
                    .with_property("id", id)
                    .with_property("name", area.name.clone())
                    .with_property("color", area.shape.color.to_hex())
                    .with_property("opacity", area.shape.opacity)
                    .with_property("territories", area.covered_territories.clone())
            })
            .collect(),
    )
}

pub fn connection_features(connections: &[&Connection], bezier_steps: usize) -> FeatureCollection {
    FeatureCollection::new(
        connections
            .iter()
            .map(|c| {
                let id = c.id().to_string();
                let mut feature = Feature::new(Geometry::line_string(&c.line.polyline(bezier_steps)))
                    .with_id(id.clone())
                    .with_property("id", id)
                    .with_property("color", c.line.color.to_hex())
                    .with_property("opacity", c.line.opacity)
                    .with_property("thickness", c.line.thickness)
                    .with_property("relationType", c.relation_type.name());
                if let Some(from) = &c.from {
                    feature = feature.with_property("from", from.clone());
                }
                if let Some(to) = &c.to {
                    feature = feature.with_property("to", to.clone());
                }
                feature
            })
            .collect(),
    )
}

/// Point features at the midpoint of every labelled connection.
pub fn connection_label_features(connections: &[&Connection], bezier_steps: usize) -> FeatureCollection {
    FeatureCollection::new(
        connections
            .iter()
            .filter_map(|c| {
                let label = c.line.label.as_deref().filter(|l| !l.is_empty())?;
                let mid = polyline_midpoint(&c.line.polyline(bezier_steps))?;
                Some(
                    Feature::new(Geometry::point(mid))
                        .with_id(c.id().to_string())
                        .with_property("label", label),
                )
            })
            .collect(),
    )
}

/// Point halfway along a polyline by length.
pub fn polyline_midpoint(points: &[LatLng]) -> Option<LatLng> {
    let first: Point = (*points.first()?).into();
    let segments: Vec<kurbo::Line> = points
        .windows(2)
        .map(|w| kurbo::Line::new(Point::from(w[0]), Point::from(w[1])))
        .collect();
    let total: f64 = segments.iter().map(|s| s.arclen(ARCLEN_ACCURACY)).sum();
    if total <= 0.0 {
        return Some(first.into());
    }
    let mut remaining = total / 2.0;
    for segment in &segments {
        let len = segment.arclen(ARCLEN_ACCURACY);
        if len >= remaining && len > 0.0 {
            let t = segment.inv_arclen(remaining, ARCLEN_ACCURACY);
            return Some(segment.eval(t).into());
        }
        remaining -= len;
    }
    points.last().copied()
}

/// Features for the live drawing preview.
pub fn preview_features(preview: &Preview) -> FeatureCollection {
    let geometry = if preview.closed && preview.outline.len() >= 3 {
        Geometry::polygon(&preview.outline)
    } else if preview.outline.len() >= 2 {
        Geometry::line_string(&preview.outline)
    } else {
        return FeatureCollection::default();
    };
    let mut features = vec![Feature::new(geometry)];
    if let Some(snap) = preview.snapped_to {
        features.push(Feature::new(Geometry::point(snap)).with_property("snap", true));
    }
    FeatureCollection::new(features)
}
