//! ChronoAtlas Render Library
//!
//! Map widget abstraction and the components that keep a map in sync with
//! annotation data: the layer compositor, the marker renderer and the drawing
//! controller. [`MemoryMap`] is a headless widget used by tests and the replay
//! binary.

pub mod compositor;
pub mod drawing;
pub mod features;
mod map;
pub mod markers;
pub mod memory;
pub mod transition;

pub use compositor::{Category, CategoryPaint, LayerCompositor};
pub use drawing::DrawingController;
pub use features::{Feature, FeatureCollection, Geometry, TerritoryHighlight};
pub use map::{
    first_label_layer, is_owned, tolerate_missing, visibility_value, LayerInfo, LayerKind, LayerSpec, MapError,
    MapResult, MapWidget, MarkerElement, MarkerPalette, VISIBILITY,
};
pub use markers::{ActiveLens, MarkerRenderer};
pub use memory::{MapOp, MemoryMap};
pub use transition::{ColorTransition, Instant};
