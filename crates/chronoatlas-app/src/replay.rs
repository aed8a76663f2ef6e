//! Drives the whole engine from a scripted session against an in-memory map.

use crate::detector::TableDetector;
use crate::session::{RecordDetails, Session, SessionError, SessionResult, Step};
use chronoatlas_core::annotation::AnnotationDocument;
use chronoatlas_core::config::EngineConfig;
use chronoatlas_core::detection::{self, Notice};
use chronoatlas_core::input::PointerEvent;
use chronoatlas_core::marker::{CountryIcon, MarkerId};
use chronoatlas_core::observer::{EntityKind, VisibleEntities};
use chronoatlas_core::timing::{TimelineState, VisibilityLatch};
use chronoatlas_core::tools::{DrawStep, Drawn};
use chronoatlas_render::{
    ActiveLens, CategoryPaint, DrawingController, Instant, LayerCompositor, MapWidget, MarkerRenderer, MemoryMap,
    TerritoryHighlight,
};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

/// What a replay produced.
#[derive(Debug)]
pub struct Report {
    pub document: AnnotationDocument,
    pub notices: Vec<Notice>,
    /// Last published ids per entity kind.
    pub visible: HashMap<EntityKind, Vec<String>>,
    /// Titles of markers whose click handler fired.
    pub clicked: Vec<String>,
    /// Final layer stack, bottom to top.
    pub layers: Vec<String>,
}

/// Headless session runner.
pub struct Replay {
    config: EngineConfig,
    map: MemoryMap,
    document: AnnotationDocument,
    timeline: TimelineState,
    markers: Vec<CountryIcon>,
    territories: Vec<TerritoryHighlight>,
    detector: TableDetector,
    compositor: LayerCompositor,
    marker_renderer: MarkerRenderer,
    drawing: DrawingController,
    latch: VisibilityLatch,
    details: RecordDetails,
    notices: Vec<Notice>,
    visible: Rc<RefCell<HashMap<EntityKind, Vec<String>>>>,
    clicked: Rc<RefCell<Vec<String>>>,
    clock: Instant,
    elapsed: Duration,
}

impl Replay {
    pub fn new(session: &Session) -> Self {
        let config = session.config.clone();
        let visible = Rc::new(RefCell::new(HashMap::new()));
        let clicked = Rc::new(RefCell::new(Vec::new()));

        let mut compositor = LayerCompositor::new(&config);
        let sink = Rc::clone(&visible);
        compositor.observers.subscribe(move |update: &VisibleEntities| {
            sink.borrow_mut().insert(update.kind, update.ids.clone());
        });

        let mut marker_renderer = MarkerRenderer::new(config.backward_navigation);
        let sink = Rc::clone(&visible);
        marker_renderer.observers.subscribe(move |update: &VisibleEntities| {
            sink.borrow_mut().insert(update.kind, update.ids.clone());
        });
        let clicks = Rc::clone(&clicked);
        marker_renderer.set_click_handler(move |icon: &CountryIcon| {
            log::info!("Marker clicked: {}", icon.title);
            clicks.borrow_mut().push(icon.title.clone());
        });

        Self {
            detector: TableDetector::new(&session.territories, config.circle_steps),
            drawing: DrawingController::new(&config),
            latch: VisibilityLatch::new(config.backward_navigation),
            map: MemoryMap::new(),
            document: AnnotationDocument::new(),
            timeline: session.timeline.clone(),
            markers: session.markers.clone(),
            territories: session.territories.clone(),
            compositor,
            marker_renderer,
            details: RecordDetails::default(),
            notices: Vec::new(),
            visible,
            clicked,
            clock: Instant::now(),
            elapsed: Duration::ZERO,
            config,
        }
    }

    /// Run every step of `session` and tear everything down at the end.
    pub fn run(mut self, session: &Session) -> SessionResult<Report> {
        self.refresh()?;
        for (index, step) in session.steps.iter().enumerate() {
            log::debug!("Step {}: {:?}", index, step);
            self.apply(step)?;
        }
        let layers = self.map.layer_ids().into_iter().map(str::to_string).collect();
        let visible = self.visible.borrow().clone();
        let clicked = self.clicked.borrow().clone();

        self.drawing.teardown(&mut self.map)?;
        self.marker_renderer.teardown(&mut self.map)?;
        self.compositor.teardown(&mut self.map)?;

        Ok(Report {
            document: self.document,
            notices: self.notices,
            visible,
            clicked,
            layers,
        })
    }

    fn now(&self) -> Instant {
        self.clock + self.elapsed
    }

    fn apply(&mut self, step: &Step) -> SessionResult<()> {
        match step {
            Step::StyleLoaded => {
                if self.map.finish_style_load() {
                    self.compositor.on_style_loaded(&mut self.map)?;
                }
            }
            Step::Arm { mode, details } => {
                self.details = details.clone();
                self.drawing.tool_mut().style.color = details.color.unwrap_or_default();
                let lines = self.document.connection_lines(self.config.bezier_steps);
                self.drawing.set_snap_targets(lines);
                self.drawing.arm(Some(&mut self.map), *mode)?;
            }
            Step::Click { at } => self.pointer(PointerEvent::Click(*at))?,
            Step::Move { at } => self.pointer(PointerEvent::Move(*at))?,
            Step::DoubleClick { at } => self.pointer(PointerEvent::DoubleClick(*at))?,
            Step::Cancel => {
                self.drawing.cancel(&mut self.map)?;
            }
            Step::Activate { point } => {
                if !self.timeline.activate(point) {
                    return Err(SessionError::UnknownTimelinePoint(point.clone()));
                }
                self.refresh()?;
            }
            Step::Advance => {
                self.timeline.advance();
                self.refresh()?;
            }
            Step::Retreat => {
                self.timeline.retreat();
                self.refresh()?;
            }
            Step::ClearTimeline => {
                self.timeline.clear();
                self.latch.reset();
                self.marker_renderer.reset_latches();
                self.refresh()?;
            }
            Step::SelectMarker { title } => {
                let id = title.as_deref().map(|t| self.marker_id(t)).transpose()?;
                self.marker_renderer.select(&mut self.map, id)?;
            }
            Step::ClickMarker { title } => {
                let id = self.marker_id(title)?;
                if !self.marker_renderer.handle_click(id) {
                    log::info!("Marker {:?} is not on the map", title);
                }
            }
            Step::HoverMarker { title } => {
                let id = title.as_deref().map(|t| self.marker_id(t)).transpose()?;
                self.marker_renderer.handle_hover(&mut self.map, id)?;
            }
            Step::SetLens { lens } => {
                let lens = match lens {
                    Some(spec) => ActiveLens::Custom {
                        name: spec.name.clone(),
                        color: spec.color,
                    },
                    None => ActiveLens::Default,
                };
                self.marker_renderer.set_lens(&mut self.map, lens)?;
            }
            Step::SetVisibility { category, visible } => {
                self.compositor
                    .set_visibility(&mut self.map, *category, *visible)?;
            }
            Step::SetPaint {
                category,
                color,
                opacity,
            } => {
                let paint = CategoryPaint {
                    color: color.map(Into::into),
                    opacity: *opacity,
                };
                let now = self.now();
                self.compositor
                    .set_paint(&mut self.map, *category, paint, now)?;
            }
            Step::Tick { ms } => {
                self.elapsed += Duration::from_millis(*ms);
                let now = self.now();
                self.compositor.advance(&mut self.map, now)?;
            }
        }
        Ok(())
    }

    fn pointer(&mut self, event: PointerEvent) -> SessionResult<()> {
        if !self.map.has_pointer_handler(event.kind()) {
            log::debug!("No {:?} handler registered; dropping event", event.kind());
            return Ok(());
        }
        match self.drawing.handle(&mut self.map, event)? {
            DrawStep::Completed(drawn) => self.complete(drawn),
            _ => Ok(()),
        }
    }

    fn complete(&mut self, drawn: Drawn) -> SessionResult<()> {
        let details = std::mem::take(&mut self.details);
        let drawn = match (drawn, &details.label) {
            (Drawn::Line(line), Some(label)) => Drawn::Line(line.with_label(label.clone())),
            (drawn, _) => drawn,
        };
        let default_name = match &drawn {
            Drawn::Shape(_) => format!("Area {}", self.document.areas.len() + 1),
            Drawn::Line(_) => format!("Connection {}", self.document.connections.len() + 1),
        };
        let name = details.name.unwrap_or(default_name);
        let pending = detection::promote(&mut self.document, drawn, name, details.relation_type);
        let id = pending.id();
        if let Some(area) = self.document.area_mut(id) {
            area.timing = details.timing.clone();
        }
        if let Some(connection) = self.document.connection_mut(id) {
            connection.timing = details.timing;
        }
        log::info!("Stored {}", id);
        self.refresh()?;

        let (outcome, notice) = pollster::block_on(detection::detect(&self.detector, &pending));
        if let Some(notice) = notice {
            log::info!("{}", notice);
            self.notices.push(notice);
        }
        detection::apply(&mut self.document, outcome);
        self.refresh()
    }

    fn marker_id(&self, title: &str) -> SessionResult<MarkerId> {
        self.markers
            .iter()
            .find(|m| m.title == title)
            .map(|m| m.id)
            .ok_or_else(|| SessionError::UnknownMarker(title.to_string()))
    }

    /// Re-render everything for the current document and timeline position.
    fn refresh(&mut self) -> SessionResult<()> {
        let areas = self.document.visible_areas(&mut self.latch, &self.timeline);
        let connections = self
            .document
            .visible_connections(&mut self.latch, &self.timeline);
        let highlighted: Vec<TerritoryHighlight> = self
            .territories
            .iter()
            .filter(|t| areas.iter().any(|a| a.covered_territories.contains(&t.name)))
            .cloned()
            .collect();

        self.compositor
            .render_territories(&mut self.map, &highlighted)?;
        self.compositor.render_areas(&mut self.map, &areas)?;
        self.compositor
            .render_connections(&mut self.map, &connections)?;
        self.marker_renderer
            .sync(&mut self.map, &self.markers, &self.timeline)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SESSION: &str = r##"{
        "config": {"transitionMs": 100},
        "timeline": {"points": [
            {"id": "1789", "label": "Revolution", "year": 1789},
            {"id": "1815", "label": "Vienna", "year": 1815}
        ]},
        "markers": [
            {"coordinate": [2.35, 48.85], "iconKind": "capital", "title": "Paris"},
            {"coordinate": [4.41, 50.68], "iconKind": "battle", "title": "Waterloo", "linkedTimelinePointId": "1815"}
        ],
        "territories": [
            {"name": "France", "rings": [[[-5.0, 42.0], [8.0, 42.0], [8.0, 51.0], [-5.0, 51.0]]]},
            {"name": "Austria", "rings": [[[9.5, 46.0], [17.0, 46.0], [17.0, 49.0], [9.5, 49.0]]]}
        ],
        "steps": [
            {"action": "arm", "mode": "areaCircle", "name": "Republic"},
            {"action": "click", "at": [2.0, 47.0]},
            {"action": "click", "at": [2.0, 48.0]},
            {"action": "styleLoaded"},
            {"action": "arm", "mode": "lineStraight", "name": "March", "relationType": "conflict", "label": "1815",
             "timing": {"appear": {"timelinePointId": "1815"}}},
            {"action": "click", "at": [2.35, 48.85]},
            {"action": "click", "at": [13.0, 47.5]},
            {"action": "arm", "mode": "areaPolygon", "name": "Sea"},
            {"action": "click", "at": [-30.0, 30.0]},
            {"action": "click", "at": [-29.0, 30.0]},
            {"action": "doubleClick", "at": [-29.0, 30.0]},
            {"action": "cancel"},
            {"action": "activate", "point": "1815"},
            {"action": "selectMarker", "title": "Waterloo"},
            {"action": "clickMarker", "title": "Waterloo"},
            {"action": "setPaint", "category": "areas", "color": "#ff0000"},
            {"action": "setPaint", "category": "areas", "color": "#0000ff"},
            {"action": "tick", "ms": 100}
        ]
    }"##;

    #[test]
    fn test_full_session() {
        let session = Session::from_json_str(SESSION).unwrap();
        let report = Replay::new(&session).run(&session).unwrap();

        assert_eq!(report.document.areas.len(), 1);
        assert_eq!(report.document.areas[0].covered_territories, vec!["France".to_string()]);
        let connection = &report.document.connections[0];
        assert_eq!(connection.from.as_deref(), Some("France"));
        assert_eq!(connection.to.as_deref(), Some("Austria"));
        assert_eq!(connection.line.label.as_deref(), Some("1815"));

        assert!(report.notices.is_empty());
        assert_eq!(report.clicked, vec!["Waterloo".to_string()]);
        assert_eq!(report.visible[&EntityKind::Marker].len(), 2);
        assert_eq!(report.visible[&EntityKind::Connection].len(), 1);
        assert_eq!(report.visible[&EntityKind::Territory], vec!["France".to_string()]);

        let labels = report.layers.iter().position(|l| l == "place-labels").unwrap();
        let areas = report.layers.iter().position(|l| l == "chronoatlas-areas-fill").unwrap();
        assert!(areas < labels);
    }

    #[test]
    fn test_empty_detection_produces_notice() {
        let session = Session::from_json_str(
            r#"{
                "steps": [
                    {"action": "styleLoaded"},
                    {"action": "arm", "mode": "areaCircle", "name": "Ocean"},
                    {"action": "click", "at": [-30.0, 0.0]},
                    {"action": "click", "at": [-30.0, 1.0]}
                ]
            }"#,
        )
        .unwrap();
        let report = Replay::new(&session).run(&session).unwrap();
        assert_eq!(report.document.areas.len(), 1);
        assert_eq!(
            report.notices,
            vec![Notice::NoTerritoriesDetected { record: "Ocean".into() }]
        );
    }

    #[test]
    fn test_unknown_marker_is_an_error() {
        let session = Session::from_json_str(r#"{"steps": [{"action": "clickMarker", "title": "Nowhere"}]}"#).unwrap();
        assert!(matches!(
            Replay::new(&session).run(&session),
            Err(SessionError::UnknownMarker(_))
        ));
    }
}
