//! Point markers ("country icons") placed on the map.

use crate::geometry::LatLng;
use crate::timing::{TimingRule, Trigger};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for markers.
pub type MarkerId = Uuid;

/// Closed set of marker glyphs. Each kind carries its own SVG payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IconKind {
    Battle,
    Treaty,
    Capital,
    Trade,
    Migration,
    Religion,
    Revolution,
    Discovery,
    #[default]
    Event,
}

impl IconKind {
    pub const ALL: [IconKind; 9] = [
        IconKind::Battle,
        IconKind::Treaty,
        IconKind::Capital,
        IconKind::Trade,
        IconKind::Migration,
        IconKind::Religion,
        IconKind::Revolution,
        IconKind::Discovery,
        IconKind::Event,
    ];

    /// Inner SVG path data on a 24x24 viewbox, stroked with `currentColor`.
    pub fn svg(self) -> &'static str {
        match self {
            IconKind::Battle => "M14.5 17.5 3 6V3h3l11.5 11.5M13 19l6-6M16 16l4 4M19 21l2-2",
            IconKind::Treaty => "M14 2H6a2 2 0 0 0-2 2v16a2 2 0 0 0 2 2h12a2 2 0 0 0 2-2V8zM14 2v6h6M16 13H8M16 17H8",
            IconKind::Capital => "M3 21h18M5 21V7l7-4 7 4v14M9 21v-6h6v6",
            IconKind::Trade => "M21 16V8a2 2 0 0 0-1-1.73l-7-4a2 2 0 0 0-2 0l-7 4A2 2 0 0 0 3 8v8a2 2 0 0 0 1 1.73l7 4a2 2 0 0 0 2 0l7-4A2 2 0 0 0 21 16z",
            IconKind::Migration => "M5 12h14M12 5l7 7-7 7",
            IconKind::Religion => "M12 2v20M7 7h10",
            IconKind::Revolution => "M4 15s1-1 4-1 5 2 8 2 4-1 4-1V3s-1 1-4 1-5-2-8-2-4 1-4 1zM4 22v-7",
            IconKind::Discovery => "M12 2a10 10 0 1 0 0 20 10 10 0 0 0 0-20zM16.24 7.76l-2.12 6.36-6.36 2.12 2.12-6.36z",
            IconKind::Event => "M12 2a10 10 0 1 0 0 20 10 10 0 0 0 0-20zM12 8v4M12 16h.01",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            IconKind::Battle => "battle",
            IconKind::Treaty => "treaty",
            IconKind::Capital => "capital",
            IconKind::Trade => "trade",
            IconKind::Migration => "migration",
            IconKind::Religion => "religion",
            IconKind::Revolution => "revolution",
            IconKind::Discovery => "discovery",
            IconKind::Event => "event",
        }
    }
}

/// An interactive point icon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryIcon {
    #[serde(default = "Uuid::new_v4")]
    pub id: MarkerId,
    pub coordinate: LatLng,
    #[serde(default)]
    pub icon_kind: IconKind,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_timeline_point_id: Option<String>,
}

impl CountryIcon {
    pub fn new(coordinate: LatLng, icon_kind: IconKind, title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            coordinate,
            icon_kind,
            title: title.into(),
            description: String::new(),
            linked_timeline_point_id: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn linked_to(mut self, timeline_point_id: impl Into<String>) -> Self {
        self.linked_timeline_point_id = Some(timeline_point_id.into());
        self
    }

    /// Unlinked markers are always visible; linked ones appear at their point.
    pub fn timing_rule(&self) -> TimingRule {
        match &self.linked_timeline_point_id {
            Some(point) => TimingRule::appearing(Trigger::AtTimelinePoint(point.clone())),
            None => TimingRule::always(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::{is_visible, TimelinePoint, TimelineState};

    #[test]
    fn test_unlinked_marker_always_visible() {
        let icon = CountryIcon::new(LatLng::new(48.85, 2.35), IconKind::Capital, "Paris");
        assert!(is_visible(&icon.timing_rule(), &TimelineState::default()));
    }

    #[test]
    fn test_linked_marker_waits_for_point() {
        let mut timeline = TimelineState::new(vec![
            TimelinePoint::new("start"),
            TimelinePoint::new("waterloo").with_year(1815),
        ]);
        let icon = CountryIcon::new(LatLng::new(50.68, 4.41), IconKind::Battle, "Waterloo")
            .linked_to("waterloo#2");
        assert!(!is_visible(&icon.timing_rule(), &timeline));
        timeline.activate("start");
        assert!(!is_visible(&icon.timing_rule(), &timeline));
        timeline.activate("waterloo");
        assert!(is_visible(&icon.timing_rule(), &timeline));
    }

    #[test]
    fn test_every_kind_has_a_glyph() {
        assert!(IconKind::ALL.iter().all(|k| !k.svg().is_empty()));
    }

    #[test]
    fn test_name_matches_wire_form() {
        for kind in IconKind::ALL {
            assert_eq!(serde_json::to_value(kind).unwrap(), kind.name());
        }
    }

    #[test]
    fn test_serde_camel_case() {
        let icon = CountryIcon::new(LatLng::new(1.0, 2.0), IconKind::Treaty, "Peace").linked_to("p1");
        let value = serde_json::to_value(&icon).unwrap();
        assert_eq!(value["iconKind"], "treaty");
        assert_eq!(value["linkedTimelinePointId"], "p1");
        assert_eq!(value["coordinate"], serde_json::json!([2.0, 1.0]));
        let back: CountryIcon = serde_json::from_value(value).unwrap();
        assert_eq!(back, icon);
    }
}
