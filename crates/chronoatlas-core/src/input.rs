//! Pointer events delivered by the map widget in map coordinates.

use crate::geometry::LatLng;
use serde::{Deserialize, Serialize};

/// Pointer event kinds a drawing session listens for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PointerKind {
    Click,
    Move,
    DoubleClick,
}

impl PointerKind {
    pub const ALL: [PointerKind; 3] = [PointerKind::Click, PointerKind::Move, PointerKind::DoubleClick];
}

/// A pointer event projected onto the map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "at", rename_all = "camelCase")]
pub enum PointerEvent {
    Click(LatLng),
    Move(LatLng),
    DoubleClick(LatLng),
}

impl PointerEvent {
    pub fn kind(&self) -> PointerKind {
        match self {
            PointerEvent::Click(_) => PointerKind::Click,
            PointerEvent::Move(_) => PointerKind::Move,
            PointerEvent::DoubleClick(_) => PointerKind::DoubleClick,
        }
    }

    pub fn position(&self) -> LatLng {
        match *self {
            PointerEvent::Click(p) | PointerEvent::Move(p) | PointerEvent::DoubleClick(p) => p,
        }
    }
}
