//! Timeline-driven visibility.
//!
//! Every annotation carries a [`TimingRule`]: an appear trigger and an optional
//! disappear trigger. [`is_visible`] resolves a rule against the current
//! [`TimelineState`] as a pure function. [`VisibilityLatch`] layers the
//! backward-navigation policy on top of it.

use crate::shapes::ModelError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Separator for the duplicate-disambiguation suffix on timeline point ids
/// (`"treaty#2"` refers to the same point as `"treaty"`).
pub const DUPLICATE_SUFFIX_SEPARATOR: char = '#';

/// Strip a trailing `#<digits>` duplicate suffix from a timeline point id.
pub fn strip_duplicate_suffix(id: &str) -> &str {
    match id.rsplit_once(DUPLICATE_SUFFIX_SEPARATOR) {
        Some((base, suffix))
            if !base.is_empty() && !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()) =>
        {
            base
        }
        _ => id,
    }
}

/// When something happens on the timeline. Exactly one condition per trigger.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "TriggerFields", into = "TriggerFields")]
pub enum Trigger {
    /// From the very start.
    #[default]
    Immediate,
    /// Once the given timeline point is reached.
    AtTimelinePoint(String),
    /// Once the active point's year reaches this year.
    AtYear(i32),
    /// Once the active position (0-100) reaches this value.
    AtPosition(f64),
}

/// Flat wire form: `{ timelinePointId?, year?, position? }`, at most one set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TriggerFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timeline_point_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    position: Option<f64>,
}

impl Trigger {
    /// Build from the flat optional fields used by stored records.
    pub fn from_fields(
        timeline_point_id: Option<String>,
        year: Option<i32>,
        position: Option<f64>,
    ) -> Result<Self, ModelError> {
        match (timeline_point_id, year, position) {
            (None, None, None) => Ok(Trigger::Immediate),
            (Some(id), None, None) => Ok(Trigger::AtTimelinePoint(id)),
            (None, Some(year), None) => Ok(Trigger::AtYear(year)),
            (None, None, Some(position)) => Ok(Trigger::AtPosition(position)),
            _ => Err(ModelError::ConflictingTrigger),
        }
    }

    /// Whether the trigger condition holds for `timeline`.
    pub fn is_reached(&self, timeline: &TimelineState) -> bool {
        match self {
            Trigger::Immediate => true,
            Trigger::AtTimelinePoint(id) => timeline.has_reached_point(id),
            Trigger::AtYear(year) => match timeline.active_point() {
                Some(point) => point.year.is_some_and(|y| y >= *year),
                None => *year <= 0,
            },
            Trigger::AtPosition(threshold) => match timeline.active_position() {
                Some(position) => position >= *threshold,
                None => *threshold <= 0.0,
            },
        }
    }
}

impl TryFrom<TriggerFields> for Trigger {
    type Error = ModelError;

    fn try_from(fields: TriggerFields) -> Result<Self, Self::Error> {
        Trigger::from_fields(fields.timeline_point_id, fields.year, fields.position)
    }
}

impl From<Trigger> for TriggerFields {
    fn from(trigger: Trigger) -> Self {
        let mut fields = TriggerFields::default();
        match trigger {
            Trigger::Immediate => {}
            Trigger::AtTimelinePoint(id) => fields.timeline_point_id = Some(id),
            Trigger::AtYear(year) => fields.year = Some(year),
            Trigger::AtPosition(position) => fields.position = Some(position),
        }
        fields
    }
}

/// Appear/disappear pair. A missing disappear trigger means "never disappears".
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingRule {
    #[serde(default)]
    pub appear: Trigger,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disappear: Option<Trigger>,
}

impl TimingRule {
    /// Visible from the start, never hidden.
    pub fn always() -> Self {
        Self::default()
    }

    pub fn appearing(appear: Trigger) -> Self {
        Self {
            appear,
            disappear: None,
        }
    }

    pub fn until(mut self, disappear: Trigger) -> Self {
        self.disappear = Some(disappear);
        self
    }

    fn disappeared(&self, timeline: &TimelineState) -> bool {
        self.disappear
            .as_ref()
            .is_some_and(|trigger| trigger.is_reached(timeline))
    }
}

/// One stop on the narrative timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelinePoint {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    /// Explicit 0-100 position; derived from the point's index when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<f64>,
}

impl TimelinePoint {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: String::new(),
            year: None,
            position: None,
        }
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_position(mut self, position: f64) -> Self {
        self.position = Some(position);
        self
    }
}

/// Ordered timeline points and the currently active one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineState {
    pub points: Vec<TimelinePoint>,
    #[serde(default)]
    active: Option<usize>,
}

impl TimelineState {
    pub fn new(points: Vec<TimelinePoint>) -> Self {
        Self {
            points,
            active: None,
        }
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    pub fn active_point(&self) -> Option<&TimelinePoint> {
        self.active.and_then(|i| self.points.get(i))
    }

    /// Make the point with `id` active. Returns false if no such point exists.
    pub fn activate(&mut self, id: &str) -> bool {
        match self.index_of(id) {
            Some(index) => {
                self.active = Some(index);
                true
            }
            None => false,
        }
    }

    /// Step forward. Returns the new active index.
    pub fn advance(&mut self) -> Option<usize> {
        if self.points.is_empty() {
            return None;
        }
        let next = match self.active {
            None => 0,
            Some(i) => (i + 1).min(self.points.len() - 1),
        };
        self.active = Some(next);
        self.active
    }

    /// Step backward. Stepping back from the first point clears the selection.
    pub fn retreat(&mut self) -> Option<usize> {
        self.active = match self.active {
            Some(0) | None => None,
            Some(i) => Some(i - 1),
        };
        self.active
    }

    pub fn clear(&mut self) {
        self.active = None;
    }

    /// Index of the point whose id matches, ignoring duplicate suffixes.
    pub fn index_of(&self, id: &str) -> Option<usize> {
        let wanted = strip_duplicate_suffix(id);
        self.points
            .iter()
            .position(|p| strip_duplicate_suffix(&p.id) == wanted)
    }

    /// Derived 0-100 position of the point at `index`.
    pub fn position_of(&self, index: usize) -> Option<f64> {
        let point = self.points.get(index)?;
        if let Some(position) = point.position {
            return Some(position);
        }
        let n = self.points.len();
        if n <= 1 {
            Some(100.0)
        } else {
            Some(index as f64 / (n - 1) as f64 * 100.0)
        }
    }

    pub fn active_position(&self) -> Option<f64> {
        self.active.and_then(|i| self.position_of(i))
    }

    /// Whether the active point is `id` or a later point.
    pub fn has_reached_point(&self, id: &str) -> bool {
        let Some(active) = self.active_point() else {
            return false;
        };
        if strip_duplicate_suffix(&active.id) == strip_duplicate_suffix(id) {
            return true;
        }
        match (self.index_of(id), self.active) {
            (Some(target), Some(current)) => current >= target,
            _ => false,
        }
    }
}

/// Resolve a rule against the timeline. Disappearance always wins.
pub fn is_visible(rule: &TimingRule, timeline: &TimelineState) -> bool {
    rule.appear.is_reached(timeline) && !rule.disappeared(timeline)
}

/// How disappearance behaves when the timeline moves backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BackwardNavigation {
    /// Once disappeared, an entity stays hidden until the latch is reset.
    #[default]
    Latch,
    /// Visibility is recomputed from scratch at every position.
    Reevaluate,
}

/// Stateful visibility resolver applying a [`BackwardNavigation`] policy.
#[derive(Debug, Clone, Default)]
pub struct VisibilityLatch {
    policy: BackwardNavigation,
    hidden: HashSet<String>,
}

impl VisibilityLatch {
    pub fn new(policy: BackwardNavigation) -> Self {
        Self {
            policy,
            hidden: HashSet::new(),
        }
    }

    /// Resolve visibility for the entity identified by `key`.
    pub fn is_visible(&mut self, key: &str, rule: &TimingRule, timeline: &TimelineState) -> bool {
        match self.policy {
            BackwardNavigation::Reevaluate => is_visible(rule, timeline),
            BackwardNavigation::Latch => {
                if self.hidden.contains(key) {
                    return false;
                }
                if rule.disappeared(timeline) {
                    self.hidden.insert(key.to_string());
                    return false;
                }
                rule.appear.is_reached(timeline)
            }
        }
    }

    /// Forget every latch (e.g. when the timeline is cleared).
    pub fn reset(&mut self) {
        self.hidden.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeline() -> TimelineState {
        TimelineState::new(vec![
            TimelinePoint::new("founding").with_year(1200),
            TimelinePoint::new("expansion").with_year(1250),
            TimelinePoint::new("schism").with_year(1300),
            TimelinePoint::new("collapse").with_year(1350),
            TimelinePoint::new("aftermath").with_year(1400),
        ])
    }

    #[test]
    fn test_immediate_is_visible_without_timeline() {
        assert!(is_visible(&TimingRule::always(), &TimelineState::default()));
    }

    #[test]
    fn test_position_threshold() {
        let rule = TimingRule::appearing(Trigger::AtPosition(25.0));
        let mut tl = timeline();
        assert!(!is_visible(&rule, &tl));
        tl.activate("founding"); // 0
        assert!(!is_visible(&rule, &tl));
        tl.activate("expansion"); // 25
        assert!(is_visible(&rule, &tl));
    }

    #[test]
    fn test_zero_threshold_visible_before_timeline_starts() {
        let rule = TimingRule::appearing(Trigger::AtPosition(0.0));
        assert!(is_visible(&rule, &timeline()));
    }

    #[test]
    fn test_disappear_wins() {
        let rule = TimingRule::appearing(Trigger::AtPosition(10.0)).until(Trigger::AtPosition(50.0));
        let mut tl = timeline();
        tl.activate("expansion");
        assert!(is_visible(&rule, &tl));
        tl.activate("schism"); // 50
        assert!(!is_visible(&rule, &tl));
    }

    #[test]
    fn test_timeline_point_trigger_matches_duplicates() {
        let rule = TimingRule::appearing(Trigger::AtTimelinePoint("schism#2".into()));
        let mut tl = timeline();
        tl.activate("expansion");
        assert!(!is_visible(&rule, &tl));
        tl.activate("schism");
        assert!(is_visible(&rule, &tl));
        tl.activate("aftermath");
        assert!(is_visible(&rule, &tl));
    }

    #[test]
    fn test_year_trigger() {
        let rule = TimingRule::appearing(Trigger::AtYear(1300));
        let mut tl = timeline();
        tl.activate("expansion");
        assert!(!is_visible(&rule, &tl));
        tl.activate("collapse");
        assert!(is_visible(&rule, &tl));
    }

    #[test]
    fn test_strip_duplicate_suffix() {
        assert_eq!(strip_duplicate_suffix("treaty#2"), "treaty");
        assert_eq!(strip_duplicate_suffix("treaty"), "treaty");
        assert_eq!(strip_duplicate_suffix("treaty#b"), "treaty#b");
        assert_eq!(strip_duplicate_suffix("#12"), "#12");
    }

    #[test]
    fn test_derived_positions() {
        let tl = timeline();
        assert_eq!(tl.position_of(0), Some(0.0));
        assert_eq!(tl.position_of(2), Some(50.0));
        assert_eq!(tl.position_of(4), Some(100.0));
        let single = TimelineState::new(vec![TimelinePoint::new("only")]);
        assert_eq!(single.position_of(0), Some(100.0));
        let explicit = TimelineState::new(vec![TimelinePoint::new("a").with_position(42.0)]);
        assert_eq!(explicit.position_of(0), Some(42.0));
    }

    #[test]
    fn test_navigation() {
        let mut tl = timeline();
        assert_eq!(tl.retreat(), None);
        assert_eq!(tl.advance(), Some(0));
        assert_eq!(tl.advance(), Some(1));
        assert_eq!(tl.retreat(), Some(0));
        assert_eq!(tl.retreat(), None);
        assert!(!tl.activate("missing"));
        tl.activate("aftermath");
        assert_eq!(tl.advance(), Some(4));
    }

    #[test]
    fn test_latch_keeps_hidden_when_moving_back() {
        let rule = TimingRule::appearing(Trigger::Immediate).until(Trigger::AtTimelinePoint("collapse".into()));
        let mut tl = timeline();
        let mut latch = VisibilityLatch::new(BackwardNavigation::Latch);
        tl.activate("schism");
        assert!(latch.is_visible("area-1", &rule, &tl));
        tl.activate("collapse");
        assert!(!latch.is_visible("area-1", &rule, &tl));
        tl.activate("expansion");
        assert!(!latch.is_visible("area-1", &rule, &tl));
        latch.reset();
        assert!(latch.is_visible("area-1", &rule, &tl));
    }

    #[test]
    fn test_reevaluate_reappears_when_moving_back() {
        let rule = TimingRule::appearing(Trigger::Immediate).until(Trigger::AtTimelinePoint("collapse".into()));
        let mut tl = timeline();
        let mut latch = VisibilityLatch::new(BackwardNavigation::Reevaluate);
        tl.activate("collapse");
        assert!(!latch.is_visible("area-1", &rule, &tl));
        tl.activate("expansion");
        assert!(latch.is_visible("area-1", &rule, &tl));
    }

    #[test]
    fn test_trigger_wire_format() {
        let rule = TimingRule::appearing(Trigger::AtYear(1066)).until(Trigger::AtPosition(80.0));
        let value = serde_json::to_value(&rule).unwrap();
        assert_eq!(value, serde_json::json!({"appear": {"year": 1066}, "disappear": {"position": 80.0}}));
        let back: TimingRule = serde_json::from_value(value).unwrap();
        assert_eq!(back, rule);
    }

    #[test]
    fn test_conflicting_trigger_rejected() {
        let result: Result<Trigger, _> = serde_json::from_str(r#"{"year": 1200, "position": 10}"#);
        assert!(result.is_err());
        assert_eq!(
            Trigger::from_fields(Some("a".into()), Some(1), None),
            Err(ModelError::ConflictingTrigger)
        );
        let empty: Trigger = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, Trigger::Immediate);
    }
}
