//! Snap-to-line resolution for chaining connections into junctions.

use crate::geometry::{self, LatLng};

/// Snap threshold in degrees (about 1 km at the equator).
pub const LINE_SNAP_THRESHOLD_DEG: f64 = 0.01;

/// Result of a snap operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapResult {
    /// The resolved coordinate.
    pub point: LatLng,
    /// Whether the coordinate was moved onto an existing line.
    pub snapped: bool,
}

impl SnapResult {
    /// Create a result with no snapping.
    pub fn none(point: LatLng) -> Self {
        Self {
            point,
            snapped: false,
        }
    }
}

/// Snaps coordinates onto the polylines of existing connections.
#[derive(Debug, Clone)]
pub struct LineSnapper {
    /// Whether snapping is enabled.
    pub enabled: bool,
    /// Strict upper bound on snap distance, in degrees.
    pub threshold_deg: f64,
    targets: Vec<Vec<LatLng>>,
}

impl Default for LineSnapper {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold_deg: LINE_SNAP_THRESHOLD_DEG,
            targets: Vec::new(),
        }
    }
}

impl LineSnapper {
    pub fn new(enabled: bool, threshold_deg: f64) -> Self {
        Self {
            enabled,
            threshold_deg,
            targets: Vec::new(),
        }
    }

    /// Replace the polylines that can be snapped to.
    pub fn set_targets(&mut self, targets: Vec<Vec<LatLng>>) {
        self.targets = targets;
    }

    pub fn targets(&self) -> &[Vec<LatLng>] {
        &self.targets
    }

    /// Move `point` onto the nearest target line when one is close enough.
    pub fn resolve(&self, point: LatLng) -> SnapResult {
        if !self.enabled {
            return SnapResult::none(point);
        }
        let lines = self.targets.iter().map(Vec::as_slice);
        match geometry::find_snap_point(point, lines, self.threshold_deg) {
            Some(snapped) => SnapResult {
                point: snapped,
                snapped: true,
            },
            None => SnapResult::none(point),
        }
    }
}
