//! Drawn shapes and connector lines, before territory enrichment.

mod line;
mod region;

pub use line::{Line, LineGeometry, LineKind};
pub use region::{Shape, ShapeGeometry, ShapeKind};
pub(crate) use region::{dedup_consecutive, distinct_vertex_count};

use peniko::Color;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for shapes and lines.
pub type ShapeId = Uuid;

/// Validation errors for drawn geometry and stored records.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("circle radius must be positive, got {0} km")]
    NonPositiveRadius(f64),
    #[error("polygon needs at least 3 distinct vertices, got {0}")]
    TooFewVertices(usize),
    #[error("line endpoints coincide")]
    DegenerateLine,
    #[error("coordinate is not finite")]
    NonFiniteCoordinate,
    #[error("opacity must be within 0..=1, got {0}")]
    OpacityOutOfRange(f64),
    #[error("invalid color: {0}")]
    InvalidColor(String),
    #[error("timing trigger sets more than one of timelinePointId, year, position")]
    ConflictingTrigger,
}

/// Result type for model validation.
pub type ModelResult<T> = Result<T, ModelError>;

/// Serializable color (RGBA8), stored as a `#rrggbb` or `#rrggbbaa` hex string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SerializableColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl SerializableColor {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    /// Default annotation color (blue).
    pub const fn annotation_default() -> Self {
        Self::rgb(59, 130, 246)
    }

    pub const fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }

    /// Format as `#rrggbb`, or `#rrggbbaa` when not fully opaque.
    pub fn to_hex(self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }

    /// Parse `#rgb`, `#rrggbb` or `#rrggbbaa`.
    pub fn from_hex(hex: &str) -> ModelResult<Self> {
        let invalid = || ModelError::InvalidColor(hex.to_string());
        let digits = hex.strip_prefix('#').ok_or_else(invalid)?;
        if !digits.is_ascii() {
            return Err(invalid());
        }
        let byte = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).map_err(|_| invalid());
        match digits.len() {
            3 => {
                let nib = |i: usize| {
                    u8::from_str_radix(&digits[i..i + 1], 16)
                        .map(|v| v * 17)
                        .map_err(|_| invalid())
                };
                Ok(Self::rgb(nib(0)?, nib(1)?, nib(2)?))
            }
            6 => Ok(Self::rgb(byte(0)?, byte(2)?, byte(4)?)),
            8 => Ok(Self::new(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
            _ => Err(invalid()),
        }
    }

    /// Linear interpolation per channel, `t` clamped to `0..=1`.
    pub fn lerp(self, other: Self, t: f64) -> Self {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
        Self::new(
            mix(self.r, other.r),
            mix(self.g, other.g),
            mix(self.b, other.b),
            mix(self.a, other.a),
        )
    }
}

impl Default for SerializableColor {
    fn default() -> Self {
        Self::annotation_default()
    }
}

impl TryFrom<String> for SerializableColor {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<SerializableColor> for String {
    fn from(color: SerializableColor) -> Self {
        color.to_hex()
    }
}

impl From<Color> for SerializableColor {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self::new(rgba.r, rgba.g, rgba.b, rgba.a)
    }
}

impl From<SerializableColor> for Color {
    fn from(color: SerializableColor) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, color.a)
    }
}

pub(crate) fn default_opacity() -> f64 {
    0.5
}

pub(crate) fn check_opacity(opacity: f64) -> ModelResult<()> {
    if (0.0..=1.0).contains(&opacity) {
        Ok(())
    } else {
        Err(ModelError::OpacityOutOfRange(opacity))
    }
}

pub(crate) fn check_finite(coords: &[crate::geometry::LatLng]) -> ModelResult<()> {
    if coords.iter().all(|c| c.lat.is_finite() && c.lng.is_finite()) {
        Ok(())
    } else {
        Err(ModelError::NonFiniteCoordinate)
    }
}
