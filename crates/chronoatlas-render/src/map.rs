//! Map widget abstraction.

use crate::features::FeatureCollection;
use chronoatlas_core::geometry::LatLng;
use chronoatlas_core::input::PointerKind;
use chronoatlas_core::shapes::SerializableColor;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Map widget errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapError {
    #[error("Source not found: {0}")]
    SourceNotFound(String),
    #[error("Layer not found: {0}")]
    LayerNotFound(String),
    #[error("Source already exists: {0}")]
    SourceExists(String),
    #[error("Layer already exists: {0}")]
    LayerExists(String),
    #[error("Map style has not finished loading")]
    StyleNotLoaded,
    #[error("Marker not found: {0}")]
    MarkerNotFound(String),
}

impl MapError {
    /// Whether the error only says the target was already gone.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            MapError::SourceNotFound(_) | MapError::LayerNotFound(_) | MapError::MarkerNotFound(_)
        )
    }
}

/// Result type for map operations.
pub type MapResult<T> = Result<T, MapError>;

/// Treat "already removed" as success.
pub fn tolerate_missing(result: MapResult<()>) -> MapResult<()> {
    match result {
        Err(e) if e.is_not_found() => {
            log::debug!("Ignoring during cleanup: {}", e);
            Ok(())
        }
        other => other,
    }
}

/// Render layer type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Background,
    Fill,
    Line,
    Symbol,
    Circle,
    Raster,
}

/// Declarative description of one render layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: LayerKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default)]
    pub paint: Map<String, Value>,
    #[serde(default)]
    pub layout: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
}

impl LayerSpec {
    pub fn new(id: impl Into<String>, kind: LayerKind) -> Self {
        Self {
            id: id.into(),
            kind,
            source: None,
            paint: Map::new(),
            layout: Map::new(),
            filter: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_paint(mut self, property: &str, value: Value) -> Self {
        self.paint.insert(property.to_string(), value);
        self
    }

    pub fn with_layout(mut self, property: &str, value: Value) -> Self {
        self.layout.insert(property.to_string(), value);
        self
    }

    pub fn with_filter(mut self, filter: Value) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Set the `visibility` layout property.
    pub fn with_visibility(self, visible: bool) -> Self {
        self.with_layout(VISIBILITY, visibility_value(visible))
    }
}

/// Entry in the map's ordered layer list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerInfo {
    pub id: String,
    pub kind: LayerKind,
}

/// Layout property toggled to show or hide a layer.
pub const VISIBILITY: &str = "visibility";

pub fn visibility_value(visible: bool) -> Value {
    Value::from(if visible { "visible" } else { "none" })
}

/// Colors for one marker's diamond.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerPalette {
    pub border: SerializableColor,
    pub fill: SerializableColor,
    pub glow: SerializableColor,
}

/// A positioned interactive marker element.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerElement {
    pub id: String,
    pub coordinate: LatLng,
    pub title: String,
    /// SVG path data drawn inside the diamond.
    pub icon: &'static str,
    /// Rotation of the square that forms the diamond, in degrees.
    pub rotation_deg: f64,
    /// Rotation of the icon inside, cancelling the diamond's.
    pub icon_rotation_deg: f64,
    pub palette: MarkerPalette,
    pub scale: f64,
}

/// Primitives a map widget exposes to the engine.
///
/// All calls happen on the single UI thread. Style readiness is announced to
/// the caller out of band after [`MapWidget::request_style_loaded`].
pub trait MapWidget {
    /// Whether sources and layers may be created.
    fn is_style_loaded(&self) -> bool;

    /// Ask for a one-shot notification once the style has loaded.
    fn request_style_loaded(&mut self);

    fn has_source(&self, id: &str) -> bool;
    fn add_source(&mut self, id: &str, data: &FeatureCollection) -> MapResult<()>;
    fn set_source_data(&mut self, id: &str, data: &FeatureCollection) -> MapResult<()>;
    fn remove_source(&mut self, id: &str) -> MapResult<()>;

    fn has_layer(&self, id: &str) -> bool;
    /// Add a layer, below `before` when given, otherwise on top.
    fn add_layer(&mut self, layer: LayerSpec, before: Option<&str>) -> MapResult<()>;
    fn remove_layer(&mut self, id: &str) -> MapResult<()>;
    /// Current layers, bottom to top.
    fn layers(&self) -> Vec<LayerInfo>;

    fn paint_property(&self, layer: &str, property: &str) -> Option<Value>;
    fn set_paint_property(&mut self, layer: &str, property: &str, value: Value) -> MapResult<()>;
    fn set_layout_property(&mut self, layer: &str, property: &str, value: Value) -> MapResult<()>;

    fn register_pointer_handler(&mut self, kind: PointerKind);
    fn unregister_pointer_handler(&mut self, kind: PointerKind);

    fn add_marker(&mut self, element: &MarkerElement) -> MapResult<()>;
    fn update_marker(&mut self, element: &MarkerElement) -> MapResult<()>;
    fn remove_marker(&mut self, id: &str) -> MapResult<()>;
}

/// First symbol layer not owned by us, i.e. the base map's first label layer.
pub fn first_label_layer(map: &dyn MapWidget, own_prefix: &str) -> Option<String> {
    map.layers()
        .into_iter()
        .find(|l| l.kind == LayerKind::Symbol && !is_owned(&l.id, own_prefix))
        .map(|l| l.id)
}

/// Whether `id` belongs to the engine using `prefix`.
pub fn is_owned(id: &str, prefix: &str) -> bool {
    id.strip_prefix(prefix).is_some_and(|rest| rest.starts_with('-'))
}
