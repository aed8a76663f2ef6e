//! Annotation records and the document that holds them.

use crate::geometry::LatLng;
use crate::shapes::{Line, Shape, ShapeId};
use crate::timing::{TimelineState, TimingRule, VisibilityLatch};
use serde::{Deserialize, Serialize};

/// A drawn area enriched with a name, covered territories and timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotatedArea {
    pub name: String,
    pub shape: Shape,
    /// Filled by territory detection; may stay empty.
    #[serde(default)]
    pub covered_territories: Vec<String>,
    #[serde(default)]
    pub timing: TimingRule,
}

impl AnnotatedArea {
    pub fn new(name: impl Into<String>, shape: Shape) -> Self {
        Self {
            name: name.into(),
            shape,
            covered_territories: Vec::new(),
            timing: TimingRule::default(),
        }
    }

    pub fn id(&self) -> ShapeId {
        self.shape.id()
    }

    pub fn with_timing(mut self, timing: TimingRule) -> Self {
        self.timing = timing;
        self
    }
}

/// Kind of relationship a connection depicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RelationType {
    Alliance,
    Trade,
    Conflict,
    Migration,
    Influence,
    Diplomacy,
    #[default]
    Other,
}

impl RelationType {
    pub fn name(self) -> &'static str {
        match self {
            RelationType::Alliance => "alliance",
            RelationType::Trade => "trade",
            RelationType::Conflict => "conflict",
            RelationType::Migration => "migration",
            RelationType::Influence => "influence",
            RelationType::Diplomacy => "diplomacy",
            RelationType::Other => "other",
        }
    }
}

/// A drawn line between two territories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub line: Line,
    /// Territory at the start; set manually or by detection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// Territory at the end; set manually or by detection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default)]
    pub relation_type: RelationType,
    #[serde(default)]
    pub timing: TimingRule,
}

impl Connection {
    pub fn new(line: Line, relation_type: RelationType) -> Self {
        Self {
            line,
            from: None,
            to: None,
            relation_type,
            timing: TimingRule::default(),
        }
    }

    pub fn id(&self) -> ShapeId {
        self.line.id()
    }

    pub fn with_endpoints(mut self, from: Option<String>, to: Option<String>) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    pub fn with_timing(mut self, timing: TimingRule) -> Self {
        self.timing = timing;
        self
    }
}

/// All areas and connections of one annotated record, in creation order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationDocument {
    #[serde(default)]
    pub areas: Vec<AnnotatedArea>,
    #[serde(default)]
    pub connections: Vec<Connection>,
}

impl AnnotationDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_area(&mut self, area: AnnotatedArea) -> ShapeId {
        let id = area.id();
        self.areas.push(area);
        id
    }

    pub fn add_connection(&mut self, connection: Connection) -> ShapeId {
        let id = connection.id();
        self.connections.push(connection);
        id
    }

    pub fn area(&self, id: ShapeId) -> Option<&AnnotatedArea> {
        self.areas.iter().find(|a| a.id() == id)
    }

    pub fn area_mut(&mut self, id: ShapeId) -> Option<&mut AnnotatedArea> {
        self.areas.iter_mut().find(|a| a.id() == id)
    }

    pub fn connection(&self, id: ShapeId) -> Option<&Connection> {
        self.connections.iter().find(|c| c.id() == id)
    }

    pub fn connection_mut(&mut self, id: ShapeId) -> Option<&mut Connection> {
        self.connections.iter_mut().find(|c| c.id() == id)
    }

    pub fn remove_area(&mut self, id: ShapeId) -> Option<AnnotatedArea> {
        let index = self.areas.iter().position(|a| a.id() == id)?;
        Some(self.areas.remove(index))
    }

    pub fn remove_connection(&mut self, id: ShapeId) -> Option<Connection> {
        let index = self.connections.iter().position(|c| c.id() == id)?;
        Some(self.connections.remove(index))
    }

    /// Attach detected territories to an area. Returns false if the area is gone.
    pub fn apply_area_detection(&mut self, id: ShapeId, territories: Vec<String>) -> bool {
        match self.area_mut(id) {
            Some(area) => {
                area.covered_territories = territories;
                true
            }
            None => false,
        }
    }

    /// Fill in detected endpoints without overwriting manual ones.
    /// Returns false if the connection is gone.
    pub fn apply_connection_detection(
        &mut self,
        id: ShapeId,
        from: Option<String>,
        to: Option<String>,
    ) -> bool {
        match self.connection_mut(id) {
            Some(connection) => {
                if connection.from.is_none() {
                    connection.from = from;
                }
                if connection.to.is_none() {
                    connection.to = to;
                }
                true
            }
            None => false,
        }
    }

    /// Polylines of every stored connection, for snap resolution.
    pub fn connection_lines(&self, bezier_steps: usize) -> Vec<Vec<LatLng>> {
        self.connections
            .iter()
            .map(|c| c.line.polyline(bezier_steps))
            .collect()
    }

    /// Areas visible at the current timeline position.
    pub fn visible_areas(
        &self,
        latch: &mut VisibilityLatch,
        timeline: &TimelineState,
    ) -> Vec<&AnnotatedArea> {
        self.areas
            .iter()
            .filter(|a| latch.is_visible(&a.id().to_string(), &a.timing, timeline))
            .collect()
    }

    /// Connections visible at the current timeline position.
    pub fn visible_connections(
        &self,
        latch: &mut VisibilityLatch,
        timeline: &TimelineState,
    ) -> Vec<&Connection> {
        self.connections
            .iter()
            .filter(|c| latch.is_visible(&c.id().to_string(), &c.timing, timeline))
            .collect()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::{BackwardNavigation, TimelinePoint, Trigger};

    fn circle_area(name: &str) -> AnnotatedArea {
        AnnotatedArea::new(name, Shape::circle(LatLng::new(45.0, 10.0), 300.0).unwrap())
    }

    fn polygon_area(name: &str) -> AnnotatedArea {
        let vertices = vec![
            LatLng::new(0.0, 0.0),
            LatLng::new(5.0, 0.5),
            LatLng::new(2.5, 6.0),
        ];
        AnnotatedArea::new(name, Shape::polygon(vertices).unwrap())
    }

    #[test]
    fn test_add_and_remove() {
        let mut doc = AnnotationDocument::new();
        let id = doc.add_area(circle_area("Empire"));
        assert!(doc.area(id).is_some());
        assert!(doc.remove_area(id).is_some());
        assert!(doc.remove_area(id).is_none());
    }

    #[test]
    fn test_detection_after_removal_is_ignored() {
        let mut doc = AnnotationDocument::new();
        let id = doc.add_area(circle_area("Empire"));
        doc.remove_area(id);
        assert!(!doc.apply_area_detection(id, vec!["Italy".into()]));
    }

    #[test]
    fn test_connection_detection_keeps_manual_names() {
        let line = Line::straight(LatLng::new(0.0, 0.0), LatLng::new(1.0, 1.0)).unwrap();
        let mut doc = AnnotationDocument::new();
        let id = doc.add_connection(
            Connection::new(line, RelationType::Trade).with_endpoints(Some("Venice".into()), None),
        );
        assert!(doc.apply_connection_detection(id, Some("Italy".into()), Some("Egypt".into())));
        let c = doc.connection(id).unwrap();
        assert_eq!(c.from.as_deref(), Some("Venice"));
        assert_eq!(c.to.as_deref(), Some("Egypt"));
    }

    #[test]
    fn test_json_round_trip_resamples_identically() {
        let mut doc = AnnotationDocument::new();
        doc.add_area(circle_area("Circle").with_timing(TimingRule::appearing(Trigger::AtYear(1200))));
        doc.add_area(polygon_area("Polygon"));
        let json = doc.to_json().unwrap();
        let back = AnnotationDocument::from_json(&json).unwrap();
        assert_eq!(back, doc);
        for (a, b) in doc.areas.iter().zip(&back.areas) {
            let (ra, rb) = (a.shape.ring(64), b.shape.ring(64));
            assert_eq!(ra.len(), rb.len());
            for (p, q) in ra.iter().zip(&rb) {
                assert!(p.approx_eq(*q, 1e-12));
            }
        }
    }

    #[test]
    fn test_invalid_stored_records_rejected() {
        let mut doc = AnnotationDocument::new();
        doc.add_area(circle_area("Circle"));
        doc.add_area(polygon_area("Polygon"));
        let line = Line::straight(LatLng::new(0.0, 0.0), LatLng::new(1.0, 1.0)).unwrap();
        doc.add_connection(Connection::new(line, RelationType::Trade));
        let valid = serde_json::to_value(&doc).unwrap();
        assert!(AnnotationDocument::from_json(&valid.to_string()).is_ok());

        let mut bad_radius = valid.clone();
        bad_radius["areas"][0]["shape"]["radiusKm"] = serde_json::json!(-5.0);
        let mut bad_opacity = valid.clone();
        bad_opacity["areas"][0]["shape"]["opacity"] = serde_json::json!(7.0);
        let mut bad_polygon = valid.clone();
        bad_polygon["areas"][1]["shape"]["vertices"] = serde_json::json!([[0.0, 0.0]]);
        let mut bad_line = valid.clone();
        bad_line["connections"][0]["line"]["points"] = serde_json::json!([[1.0, 1.0], [1.0, 1.0]]);

        for (case, value) in [
            ("radius", bad_radius),
            ("opacity", bad_opacity),
            ("polygon", bad_polygon),
            ("line", bad_line),
        ] {
            assert!(
                AnnotationDocument::from_json(&value.to_string()).is_err(),
                "{} should be rejected",
                case
            );
        }
    }

    #[test]
    fn test_visible_filters_by_timing() {
        let mut doc = AnnotationDocument::new();
        doc.add_area(circle_area("Always"));
        doc.add_area(circle_area("Later").with_timing(TimingRule::appearing(Trigger::AtTimelinePoint("b".into()))));
        let mut timeline = TimelineState::new(vec![TimelinePoint::new("a"), TimelinePoint::new("b")]);
        let mut latch = VisibilityLatch::new(BackwardNavigation::Latch);
        timeline.activate("a");
        assert_eq!(doc.visible_areas(&mut latch, &timeline).len(), 1);
        timeline.activate("b");
        assert_eq!(doc.visible_areas(&mut latch, &timeline).len(), 2);
    }
}
