//! Connector lines: straight or quadratic-curved.

use super::{ModelError, ModelResult, SerializableColor, ShapeId, check_finite, check_opacity};
use crate::geometry::{self, LatLng};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of connector line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineKind {
    Straight,
    Curved,
}

/// Geometry of a connector line. Always exactly two endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum LineGeometry {
    Straight { points: [LatLng; 2] },
    Curved { points: [LatLng; 2], control_point: LatLng },
}

fn default_thickness() -> f64 {
    3.0
}

fn default_line_opacity() -> f64 {
    1.0
}

/// A drawn straight or curved connector. Deserialization validates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "LineFields")]
pub struct Line {
    pub(crate) id: ShapeId,
    #[serde(flatten)]
    pub geometry: LineGeometry,
    #[serde(default = "default_thickness")]
    pub thickness: f64,
    pub color: SerializableColor,
    #[serde(default = "default_line_opacity")]
    pub opacity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Unvalidated wire form of a [`Line`].
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LineFields {
    id: ShapeId,
    #[serde(flatten)]
    geometry: LineGeometry,
    #[serde(default = "default_thickness")]
    thickness: f64,
    color: SerializableColor,
    #[serde(default = "default_line_opacity")]
    opacity: f64,
    #[serde(default)]
    label: Option<String>,
}

impl TryFrom<LineFields> for Line {
    type Error = ModelError;

    fn try_from(fields: LineFields) -> Result<Self, Self::Error> {
        let line = Line {
            id: fields.id,
            geometry: fields.geometry,
            thickness: fields.thickness,
            color: fields.color,
            opacity: fields.opacity,
            label: fields.label,
        };
        line.validate()?;
        Ok(line)
    }
}

impl Line {
    /// Create a straight line between two distinct points.
    pub fn straight(start: LatLng, end: LatLng) -> ModelResult<Self> {
        Self::from_geometry(LineGeometry::Straight {
            points: [start, end],
        })
    }

    /// Create a curved line through `control`.
    pub fn curved(start: LatLng, control: LatLng, end: LatLng) -> ModelResult<Self> {
        Self::from_geometry(LineGeometry::Curved {
            points: [start, end],
            control_point: control,
        })
    }

    fn from_geometry(geometry: LineGeometry) -> ModelResult<Self> {
        let line = Self {
            id: Uuid::new_v4(),
            geometry,
            thickness: default_thickness(),
            color: SerializableColor::default(),
            opacity: default_line_opacity(),
            label: None,
        };
        line.validate()?;
        Ok(line)
    }

    pub fn with_color(mut self, color: SerializableColor) -> Self {
        self.color = color;
        self
    }

    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn with_thickness(mut self, thickness: f64) -> Self {
        self.thickness = thickness;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn id(&self) -> ShapeId {
        self.id
    }

    pub fn kind(&self) -> LineKind {
        match self.geometry {
            LineGeometry::Straight { .. } => LineKind::Straight,
            LineGeometry::Curved { .. } => LineKind::Curved,
        }
    }

    fn endpoints(&self) -> [LatLng; 2] {
        match self.geometry {
            LineGeometry::Straight { points } | LineGeometry::Curved { points, .. } => points,
        }
    }

    pub fn start(&self) -> LatLng {
        self.endpoints()[0]
    }

    pub fn end(&self) -> LatLng {
        self.endpoints()[1]
    }

    pub fn control_point(&self) -> Option<LatLng> {
        match self.geometry {
            LineGeometry::Curved { control_point, .. } => Some(control_point),
            LineGeometry::Straight { .. } => None,
        }
    }

    /// Check the line invariants.
    pub fn validate(&self) -> ModelResult<()> {
        check_opacity(self.opacity)?;
        let [start, end] = self.endpoints();
        check_finite(&[start, end])?;
        if let Some(control) = self.control_point() {
            check_finite(&[control])?;
        }
        if start == end {
            return Err(ModelError::DegenerateLine);
        }
        Ok(())
    }

    /// Polyline used for rendering and snapping.
    pub fn polyline(&self, bezier_steps: usize) -> Vec<LatLng> {
        match self.geometry {
            LineGeometry::Straight { points } => points.to_vec(),
            LineGeometry::Curved {
                points: [start, end],
                control_point,
            } => geometry::sample_bezier(start, control_point, end, bezier_steps),
        }
    }
}
