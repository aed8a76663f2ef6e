//! In-memory map widget for headless use and tests.

use crate::features::FeatureCollection;
use crate::map::{LayerInfo, LayerKind, LayerSpec, MapError, MapResult, MapWidget, MarkerElement};
use chronoatlas_core::input::PointerKind;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};

/// A recorded mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum MapOp {
    RequestStyleLoaded,
    AddSource(String),
    SetSourceData(String),
    RemoveSource(String),
    AddLayer { id: String, before: Option<String> },
    RemoveLayer(String),
    SetPaint { layer: String, property: String, value: Value },
    SetLayout { layer: String, property: String, value: Value },
    RegisterPointer(PointerKind),
    UnregisterPointer(PointerKind),
    AddMarker(String),
    UpdateMarker(String),
    RemoveMarker(String),
}

/// Map widget that keeps everything in memory and logs every mutation.
#[derive(Debug, Default)]
pub struct MemoryMap {
    style_loaded: bool,
    style_listener: bool,
    sources: HashMap<String, FeatureCollection>,
    layers: Vec<LayerSpec>,
    handlers: HashSet<PointerKind>,
    markers: BTreeMap<String, MarkerElement>,
    ops: Vec<MapOp>,
    /// Injected failures, keyed by source or layer id.
    faults: HashMap<String, MapError>,
}

impl MemoryMap {
    /// A map whose style is still loading.
    pub fn new() -> Self {
        Self::default()
    }

    /// A loaded map with a small base style (two label layers on top).
    pub fn with_base_style() -> Self {
        let mut map = Self::new();
        map.layers = vec![
            LayerSpec::new("background", LayerKind::Background),
            LayerSpec::new("water", LayerKind::Fill),
            LayerSpec::new("roads", LayerKind::Line),
            LayerSpec::new("place-labels", LayerKind::Symbol),
            LayerSpec::new("poi-labels", LayerKind::Symbol),
        ];
        map.style_loaded = true;
        map
    }

    /// Finish loading the style. Returns true when a one-shot notification
    /// was requested and should now be delivered.
    pub fn finish_style_load(&mut self) -> bool {
        self.style_loaded = true;
        if self.layers.is_empty() {
            let base = Self::with_base_style();
            self.layers = base.layers;
        }
        std::mem::take(&mut self.style_listener)
    }

    pub fn ops(&self) -> &[MapOp] {
        &self.ops
    }

    pub fn take_ops(&mut self) -> Vec<MapOp> {
        std::mem::take(&mut self.ops)
    }

    pub fn source(&self, id: &str) -> Option<&FeatureCollection> {
        self.sources.get(id)
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub fn layer(&self, id: &str) -> Option<&LayerSpec> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn layer_ids(&self) -> Vec<&str> {
        self.layers.iter().map(|l| l.id.as_str()).collect()
    }

    pub fn marker(&self, id: &str) -> Option<&MarkerElement> {
        self.markers.get(id)
    }

    pub fn markers(&self) -> impl Iterator<Item = &MarkerElement> {
        self.markers.values()
    }

    pub fn has_pointer_handler(&self, kind: PointerKind) -> bool {
        self.handlers.contains(&kind)
    }

    /// Make every mutation of the source or layer `id` fail with `error`.
    pub fn fail_on(&mut self, id: impl Into<String>, error: MapError) {
        self.faults.insert(id.into(), error);
    }

    pub fn clear_faults(&mut self) {
        self.faults.clear();
    }

    fn check_fault(&self, id: &str) -> MapResult<()> {
        match self.faults.get(id) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn layer_index(&self, id: &str) -> MapResult<usize> {
        self.layers
            .iter()
            .position(|l| l.id == id)
            .ok_or_else(|| MapError::LayerNotFound(id.to_string()))
    }

    fn require_style(&self) -> MapResult<()> {
        if self.style_loaded {
            Ok(())
        } else {
            Err(MapError::StyleNotLoaded)
        }
    }
}

impl MapWidget for MemoryMap {
    fn is_style_loaded(&self) -> bool {
        self.style_loaded
    }

    fn request_style_loaded(&mut self) {
        self.style_listener = true;
        self.ops.push(MapOp::RequestStyleLoaded);
    }

    fn has_source(&self, id: &str) -> bool {
        self.sources.contains_key(id)
    }

    fn add_source(&mut self, id: &str, data: &FeatureCollection) -> MapResult<()> {
        self.check_fault(id)?;
        self.require_style()?;
        if self.sources.contains_key(id) {
            return Err(MapError::SourceExists(id.to_string()));
        }
        self.sources.insert(id.to_string(), data.clone());
        self.ops.push(MapOp::AddSource(id.to_string()));
        Ok(())
    }

    fn set_source_data(&mut self, id: &str, data: &FeatureCollection) -> MapResult<()> {
        self.check_fault(id)?;
        let source = self
            .sources
            .get_mut(id)
            .ok_or_else(|| MapError::SourceNotFound(id.to_string()))?;
        *source = data.clone();
        self.ops.push(MapOp::SetSourceData(id.to_string()));
        Ok(())
    }

    fn remove_source(&mut self, id: &str) -> MapResult<()> {
        self.check_fault(id)?;
        self.sources
            .remove(id)
            .ok_or_else(|| MapError::SourceNotFound(id.to_string()))?;
        self.ops.push(MapOp::RemoveSource(id.to_string()));
        Ok(())
    }

    fn has_layer(&self, id: &str) -> bool {
        self.layers.iter().any(|l| l.id == id)
    }

    fn add_layer(&mut self, layer: LayerSpec, before: Option<&str>) -> MapResult<()> {
        self.check_fault(&layer.id)?;
        self.require_style()?;
        if self.has_layer(&layer.id) {
            return Err(MapError::LayerExists(layer.id));
        }
        if let Some(source) = &layer.source {
            if !self.sources.contains_key(source) {
                return Err(MapError::SourceNotFound(source.clone()));
            }
        }
        let index = match before {
            Some(before) => self.layer_index(before)?,
            None => self.layers.len(),
        };
        self.ops.push(MapOp::AddLayer {
            id: layer.id.clone(),
            before: before.map(str::to_string),
        });
        self.layers.insert(index, layer);
        Ok(())
    }

    fn remove_layer(&mut self, id: &str) -> MapResult<()> {
        self.check_fault(id)?;
        let index = self.layer_index(id)?;
        self.layers.remove(index);
        self.ops.push(MapOp::RemoveLayer(id.to_string()));
        Ok(())
    }

    fn layers(&self) -> Vec<LayerInfo> {
        self.layers
            .iter()
            .map(|l| LayerInfo {
                id: l.id.clone(),
                kind: l.kind,
            })
            .collect()
    }

    fn paint_property(&self, layer: &str, property: &str) -> Option<Value> {
        self.layer(layer)?.paint.get(property).cloned()
    }

    fn set_paint_property(&mut self, layer: &str, property: &str, value: Value) -> MapResult<()> {
        self.check_fault(layer)?;
        let index = self.layer_index(layer)?;
        self.layers[index].paint.insert(property.to_string(), value.clone());
        self.ops.push(MapOp::SetPaint {
            layer: layer.to_string(),
            property: property.to_string(),
            value,
        });
        Ok(())
    }

    fn set_layout_property(&mut self, layer: &str, property: &str, value: Value) -> MapResult<()> {
        self.check_fault(layer)?;
        let index = self.layer_index(layer)?;
        self.layers[index].layout.insert(property.to_string(), value.clone());
        self.ops.push(MapOp::SetLayout {
            layer: layer.to_string(),
            property: property.to_string(),
            value,
        });
        Ok(())
    }

    fn register_pointer_handler(&mut self, kind: PointerKind) {
        if self.handlers.insert(kind) {
            self.ops.push(MapOp::RegisterPointer(kind));
        }
    }

    fn unregister_pointer_handler(&mut self, kind: PointerKind) {
        if self.handlers.remove(&kind) {
            self.ops.push(MapOp::UnregisterPointer(kind));
        }
    }

    fn add_marker(&mut self, element: &MarkerElement) -> MapResult<()> {
        self.markers.insert(element.id.clone(), element.clone());
        self.ops.push(MapOp::AddMarker(element.id.clone()));
        Ok(())
    }

    fn update_marker(&mut self, element: &MarkerElement) -> MapResult<()> {
        let slot = self
            .markers
            .get_mut(&element.id)
            .ok_or_else(|| MapError::MarkerNotFound(element.id.clone()))?;
        *slot = element.clone();
        self.ops.push(MapOp::UpdateMarker(element.id.clone()));
        Ok(())
    }

    fn remove_marker(&mut self, id: &str) -> MapResult<()> {
        self.markers
            .remove(id)
            .ok_or_else(|| MapError::MarkerNotFound(id.to_string()))?;
        self.ops.push(MapOp::RemoveMarker(id.to_string()));
        Ok(())
    }
}
