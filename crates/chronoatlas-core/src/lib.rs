//! ChronoAtlas Core Library
//!
//! Platform-agnostic data model and logic for annotating historical maps:
//! geometry sampling, the drawing state machine, timeline-driven visibility
//! and territory detection.

pub mod annotation;
pub mod config;
pub mod detection;
pub mod geometry;
pub mod input;
pub mod marker;
pub mod observer;
pub mod shapes;
pub mod snap;
pub mod timing;
pub mod tools;

pub use annotation::{AnnotatedArea, AnnotationDocument, Connection, RelationType};
pub use config::{ChangeDetection, ConfigError, EngineConfig};
pub use detection::{
    DetectionError, DetectionOutcome, LineTerritories, Notice, PendingDetection, TerritoryDetector,
};
pub use geometry::LatLng;
pub use input::{PointerEvent, PointerKind};
pub use marker::{CountryIcon, IconKind, MarkerId};
pub use observer::{EntityKind, Observers, SubscriptionId, VisibleEntities};
pub use shapes::{Line, LineKind, ModelError, SerializableColor, Shape, ShapeId, ShapeKind};
pub use snap::{LineSnapper, SnapResult, LINE_SNAP_THRESHOLD_DEG};
pub use timing::{
    is_visible, BackwardNavigation, TimelinePoint, TimelineState, TimingRule, Trigger, VisibilityLatch,
};
pub use tools::{DrawMode, DrawState, DrawStep, DrawStyle, Drawn, DrawingTool, Preview};
