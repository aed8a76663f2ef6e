//! Session files: everything needed to replay an authoring session headlessly.

use chronoatlas_core::annotation::RelationType;
use chronoatlas_core::config::{ConfigError, EngineConfig};
use chronoatlas_core::geometry::LatLng;
use chronoatlas_core::marker::CountryIcon;
use chronoatlas_core::shapes::{ModelError, SerializableColor};
use chronoatlas_core::timing::{TimelineState, TimingRule};
use chronoatlas_core::tools::DrawMode;
use chronoatlas_render::{Category, MapError, TerritoryHighlight};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Session loading and replay errors.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Failed to read session: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse session: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Config(#[from] ConfigError),
    #[error("Map error: {0}")]
    Map(#[from] MapError),
    #[error("Invalid record: {0}")]
    Model(#[from] ModelError),
    #[error("No marker titled {0:?}")]
    UnknownMarker(String),
    #[error("No timeline point {0:?}")]
    UnknownTimelinePoint(String),
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Record details attached to whatever the next drawing produces.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordDetails {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub relation_type: RelationType,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub color: Option<SerializableColor>,
    #[serde(default)]
    pub timing: TimingRule,
}

/// A named lens; absent means the default lens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LensSpec {
    pub name: String,
    pub color: SerializableColor,
}

fn full_opacity() -> f64 {
    1.0
}

/// One scripted action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Step {
    /// The map finished loading its style.
    StyleLoaded,
    Arm {
        mode: DrawMode,
        #[serde(flatten)]
        details: RecordDetails,
    },
    Click { at: LatLng },
    Move { at: LatLng },
    DoubleClick { at: LatLng },
    Cancel,
    Activate { point: String },
    Advance,
    Retreat,
    ClearTimeline,
    SelectMarker { title: Option<String> },
    ClickMarker { title: String },
    HoverMarker { title: Option<String> },
    SetLens { lens: Option<LensSpec> },
    SetVisibility { category: Category, visible: bool },
    SetPaint {
        category: Category,
        #[serde(default)]
        color: Option<SerializableColor>,
        #[serde(default = "full_opacity")]
        opacity: f64,
    },
    /// Let wall-clock time pass, in milliseconds.
    Tick { ms: u64 },
}

/// A complete session file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(default)]
    pub config: EngineConfig,
    #[serde(default)]
    pub timeline: TimelineState,
    #[serde(default)]
    pub markers: Vec<CountryIcon>,
    /// Known territories, used for detection and highlighting.
    #[serde(default)]
    pub territories: Vec<TerritoryHighlight>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Session {
    pub fn from_json_str(json: &str) -> SessionResult<Self> {
        let session: Session = serde_json::from_str(json)?;
        session.config.validate()?;
        Ok(session)
    }

    pub fn from_path(path: impl AsRef<Path>) -> SessionResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronoatlas_core::timing::Trigger;

    #[test]
    fn test_parse_steps() {
        let session = Session::from_json_str(
            r##"{
                "steps": [
                    {"action": "styleLoaded"},
                    {"action": "arm", "mode": "lineCurved", "name": "Silk Road", "relationType": "trade",
                     "timing": {"appear": {"year": 1200}}},
                    {"action": "click", "at": [10.0, 20.0]},
                    {"action": "setPaint", "category": "connections", "color": "#ff0000"},
                    {"action": "tick", "ms": 150}
                ]
            }"##,
        )
        .unwrap();
        assert_eq!(session.steps.len(), 5);
        let Step::Arm { mode, details } = &session.steps[1] else {
            panic!("expected arm");
        };
        assert_eq!(*mode, DrawMode::LineCurved);
        assert_eq!(details.name.as_deref(), Some("Silk Road"));
        assert_eq!(details.relation_type, RelationType::Trade);
        assert_eq!(details.timing.appear, Trigger::AtYear(1200));
        assert_eq!(session.steps[2], Step::Click { at: LatLng::from_lng_lat(10.0, 20.0) });
        assert!(matches!(session.steps[3], Step::SetPaint { opacity, .. } if opacity == 1.0));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = Session::from_json_str(r#"{"config": {"circleSteps": 0}}"#).unwrap_err();
        assert!(matches!(err, SessionError::Config(_)));
    }
}
