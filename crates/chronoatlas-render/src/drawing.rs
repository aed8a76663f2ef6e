//! Binds the drawing tool to a map: pointer handlers and the live preview layer.

use crate::features::{self, FeatureCollection};
use crate::map::{self, LayerKind, LayerSpec, MapResult, MapWidget};
use chronoatlas_core::config::EngineConfig;
use chronoatlas_core::geometry::LatLng;
use chronoatlas_core::input::{PointerEvent, PointerKind};
use chronoatlas_core::tools::{DrawMode, DrawStep, DrawingTool, Preview};
use serde_json::json;

/// Runs drawing sessions against a map widget.
#[derive(Debug)]
pub struct DrawingController {
    tool: DrawingTool,
    prefix: String,
    listening: bool,
}

impl DrawingController {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            tool: DrawingTool::new(config),
            prefix: config.layer_prefix.clone(),
            listening: false,
        }
    }

    pub fn tool(&self) -> &DrawingTool {
        &self.tool
    }

    pub fn tool_mut(&mut self) -> &mut DrawingTool {
        &mut self.tool
    }

    pub fn is_drawing(&self) -> bool {
        self.tool.is_active()
    }

    fn source_id(&self) -> String {
        format!("{}-preview", self.prefix)
    }

    fn fill_layer_id(&self) -> String {
        format!("{}-preview-fill", self.prefix)
    }

    fn line_layer_id(&self) -> String {
        format!("{}-preview-line", self.prefix)
    }

    /// Polylines new connections may snap to.
    pub fn set_snap_targets(&mut self, lines: Vec<Vec<LatLng>>) {
        self.tool.snapper.set_targets(lines);
    }

    /// Start a session. Without a map this logs a warning and does nothing.
    pub fn arm(&mut self, map: Option<&mut dyn MapWidget>, mode: DrawMode) -> MapResult<bool> {
        let Some(map) = map else {
            log::warn!("No map instance; cannot start drawing {:?}", mode);
            return Ok(false);
        };
        self.remove_preview(map)?;
        self.tool.arm(mode);
        if !self.listening {
            for kind in PointerKind::ALL {
                map.register_pointer_handler(kind);
            }
            self.listening = true;
        }
        log::debug!("Armed {:?}", mode);
        Ok(true)
    }

    /// Feed a pointer event from the map.
    pub fn handle(&mut self, map: &mut dyn MapWidget, event: PointerEvent) -> MapResult<DrawStep> {
        let step = self.tool.handle(event);
        match &step {
            DrawStep::Preview(preview) => self.show_preview(map, preview)?,
            DrawStep::Completed(_) => self.finish(map)?,
            DrawStep::NeedMoreVertices { have } => {
                log::warn!("Polygon needs at least 3 vertices, have {}", have);
            }
            DrawStep::Ignored => {}
        }
        Ok(step)
    }

    /// Abandon the current session.
    pub fn cancel(&mut self, map: &mut dyn MapWidget) -> MapResult<bool> {
        let was_active = self.tool.cancel();
        self.finish(map)?;
        Ok(was_active)
    }

    /// Release everything this controller put on the map.
    pub fn teardown(&mut self, map: &mut dyn MapWidget) -> MapResult<()> {
        self.tool.cancel();
        self.finish(map)
    }

    fn finish(&mut self, map: &mut dyn MapWidget) -> MapResult<()> {
        self.remove_preview(map)?;
        if self.listening {
            for kind in PointerKind::ALL {
                map.unregister_pointer_handler(kind);
            }
            self.listening = false;
        }
        Ok(())
    }

    fn show_preview(&mut self, map: &mut dyn MapWidget, preview: &Preview) -> MapResult<()> {
        if !map.is_style_loaded() {
            return Ok(());
        }
        let data = features::preview_features(preview);
        let source = self.source_id();
        if map.has_source(&source) {
            return map.set_source_data(&source, &data);
        }
        self.create_preview(map, &source, &data)
    }

    fn create_preview(&self, map: &mut dyn MapWidget, source: &str, data: &FeatureCollection) -> MapResult<()> {
        map.add_source(source, data)?;
        let before = map::first_label_layer(map, &self.prefix);
        let fill = LayerSpec::new(self.fill_layer_id(), LayerKind::Fill)
            .with_source(source)
            .with_filter(json!(["==", ["geometry-type"], "Polygon"]))
            .with_paint("fill-color", json!("#3b82f6"))
            .with_paint("fill-opacity", json!(0.2));
        let line = LayerSpec::new(self.line_layer_id(), LayerKind::Line)
            .with_source(source)
            .with_paint("line-color", json!("#3b82f6"))
            .with_paint("line-width", json!(2.0))
            .with_paint("line-dasharray", json!([2, 2]));
        for layer in [fill, line] {
            if !map.has_layer(&layer.id) {
                map.add_layer(layer, before.as_deref())?;
            }
        }
        Ok(())
    }

    fn remove_preview(&self, map: &mut dyn MapWidget) -> MapResult<()> {
        for id in [self.line_layer_id(), self.fill_layer_id()] {
            if map.has_layer(&id) {
                map::tolerate_missing(map.remove_layer(&id))?;
            }
        }
        let source = self.source_id();
        if map.has_source(&source) {
            map::tolerate_missing(map.remove_source(&source))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MapOp, MemoryMap};
    use chronoatlas_core::tools::Drawn;

    fn ll(lng: f64, lat: f64) -> LatLng {
        LatLng::from_lng_lat(lng, lat)
    }

    #[test]
    fn test_arm_without_map_warns() {
        let mut controller = DrawingController::new(&EngineConfig::default());
        assert!(!controller.arm(None, DrawMode::AreaCircle).unwrap());
        assert!(!controller.is_drawing());
    }

    #[test]
    fn test_circle_session_lifecycle() {
        let mut map = MemoryMap::with_base_style();
        let mut controller = DrawingController::new(&EngineConfig::default());
        assert!(controller.arm(Some(&mut map), DrawMode::AreaCircle).unwrap());
        assert!(PointerKind::ALL.iter().all(|&k| map.has_pointer_handler(k)));

        controller.handle(&mut map, PointerEvent::Click(ll(0.0, 0.0))).unwrap();
        controller.handle(&mut map, PointerEvent::Move(ll(0.0, 0.5))).unwrap();
        assert!(map.has_layer("chronoatlas-preview-fill"));
        let ids = map.layer_ids();
        let preview = ids.iter().position(|&id| id == "chronoatlas-preview-line").unwrap();
        let labels = ids.iter().position(|&id| id == "place-labels").unwrap();
        assert!(preview < labels);

        map.take_ops();
        controller.handle(&mut map, PointerEvent::Move(ll(0.0, 0.7))).unwrap();
        assert_eq!(map.take_ops(), vec![MapOp::SetSourceData("chronoatlas-preview".into())]);

        let step = controller.handle(&mut map, PointerEvent::Click(ll(0.0, 1.0))).unwrap();
        assert!(matches!(step, DrawStep::Completed(Drawn::Shape(_))));
        assert!(!map.has_source("chronoatlas-preview"));
        assert!(!map.has_layer("chronoatlas-preview-fill"));
        assert!(!map.has_pointer_handler(PointerKind::Click));
    }

    #[test]
    fn test_cancel_removes_preview() {
        let mut map = MemoryMap::with_base_style();
        let mut controller = DrawingController::new(&EngineConfig::default());
        controller.arm(Some(&mut map), DrawMode::AreaPolygon).unwrap();
        controller.handle(&mut map, PointerEvent::Click(ll(0.0, 0.0))).unwrap();
        controller.handle(&mut map, PointerEvent::Move(ll(1.0, 1.0))).unwrap();
        assert!(map.has_source("chronoatlas-preview"));

        assert!(controller.cancel(&mut map).unwrap());
        assert!(!map.has_source("chronoatlas-preview"));
        assert!(!controller.is_drawing());
        assert!(!controller.cancel(&mut map).unwrap());
    }

    #[test]
    fn test_rearm_clears_previous_preview() {
        let mut map = MemoryMap::with_base_style();
        let mut controller = DrawingController::new(&EngineConfig::default());
        controller.arm(Some(&mut map), DrawMode::LineStraight).unwrap();
        controller.handle(&mut map, PointerEvent::Click(ll(0.0, 0.0))).unwrap();
        controller.handle(&mut map, PointerEvent::Move(ll(1.0, 1.0))).unwrap();
        assert!(map.has_source("chronoatlas-preview"));

        controller.arm(Some(&mut map), DrawMode::AreaCircle).unwrap();
        assert!(!map.has_source("chronoatlas-preview"));
        assert_eq!(controller.tool().mode(), Some(DrawMode::AreaCircle));
    }

    #[test]
    fn test_teardown_is_idempotent() {
        let mut map = MemoryMap::with_base_style();
        let mut controller = DrawingController::new(&EngineConfig::default());
        controller.arm(Some(&mut map), DrawMode::AreaCircle).unwrap();
        controller.teardown(&mut map).unwrap();
        controller.teardown(&mut map).unwrap();
        assert!(!map.has_pointer_handler(PointerKind::Move));
    }
}
