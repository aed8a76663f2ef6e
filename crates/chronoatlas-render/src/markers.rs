//! Interactive diamond markers for point annotations.

use crate::map::{self, MapResult, MapWidget, MarkerElement, MarkerPalette};
use chronoatlas_core::marker::{CountryIcon, MarkerId};
use chronoatlas_core::observer::{EntityKind, Observers, VisibleEntities};
use chronoatlas_core::shapes::SerializableColor;
use chronoatlas_core::timing::{BackwardNavigation, TimelineState, VisibilityLatch};
use std::collections::{HashMap, HashSet};

/// Rotation that turns the square marker into a diamond.
pub const DIAMOND_ROTATION_DEG: f64 = 45.0;

/// Scale applied to the marker under the pointer.
pub const HOVER_SCALE: f64 = 1.25;

impl MarkerPalette {
    /// Palette for every marker that is not selected.
    pub const fn neutral() -> Self {
        Self {
            border: SerializableColor::rgb(71, 85, 105),
            fill: SerializableColor::rgb(255, 255, 255),
            glow: SerializableColor::new(0, 0, 0, 0),
        }
    }

    /// Fixed amber palette used for selection under the default lens.
    pub const fn default_lens() -> Self {
        Self {
            border: SerializableColor::rgb(245, 158, 11),
            fill: SerializableColor::rgb(254, 243, 199),
            glow: SerializableColor::new(245, 158, 11, 128),
        }
    }

    /// Selection palette derived from a lens color.
    pub const fn from_lens(color: SerializableColor) -> Self {
        Self {
            border: color.with_alpha(255),
            fill: color.with_alpha(51),
            glow: color.with_alpha(128),
        }
    }
}

/// The analytical lens currently applied to the map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ActiveLens {
    #[default]
    Default,
    Custom { name: String, color: SerializableColor },
}

impl ActiveLens {
    /// Palette for the selected marker under this lens.
    pub fn selection_palette(&self) -> MarkerPalette {
        match self {
            ActiveLens::Default => MarkerPalette::default_lens(),
            ActiveLens::Custom { color, .. } => MarkerPalette::from_lens(*color),
        }
    }
}

#[derive(Debug)]
struct Placed {
    record: CountryIcon,
    element: MarkerElement,
}

/// Places one element per visible marker and keeps them styled.
pub struct MarkerRenderer {
    latch: VisibilityLatch,
    placed: HashMap<MarkerId, Placed>,
    order: Vec<MarkerId>,
    selected: Option<MarkerId>,
    hovered: Option<MarkerId>,
    lens: ActiveLens,
    on_click: Option<Box<dyn FnMut(&CountryIcon)>>,
    /// Notified with the placed marker ids after every sync.
    pub observers: Observers<VisibleEntities>,
}

impl Default for MarkerRenderer {
    fn default() -> Self {
        Self::new(BackwardNavigation::default())
    }
}

impl std::fmt::Debug for MarkerRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarkerRenderer")
            .field("placed", &self.order)
            .field("selected", &self.selected)
            .field("lens", &self.lens)
            .finish()
    }
}

impl MarkerRenderer {
    pub fn new(policy: BackwardNavigation) -> Self {
        Self {
            latch: VisibilityLatch::new(policy),
            placed: HashMap::new(),
            order: Vec::new(),
            selected: None,
            hovered: None,
            lens: ActiveLens::default(),
            on_click: None,
            observers: Observers::new(),
        }
    }

    /// Handler invoked with the full record when a marker is clicked.
    pub fn set_click_handler(&mut self, handler: impl FnMut(&CountryIcon) + 'static) {
        self.on_click = Some(Box::new(handler));
    }

    /// Ids of placed markers, in input order.
    pub fn placed(&self) -> &[MarkerId] {
        &self.order
    }

    pub fn selected(&self) -> Option<MarkerId> {
        self.selected
    }

    pub fn lens(&self) -> &ActiveLens {
        &self.lens
    }

    /// Forget disappearance latches, e.g. after the timeline was cleared.
    pub fn reset_latches(&mut self) {
        self.latch.reset();
    }

    /// Place elements for visible markers and remove the rest.
    pub fn sync(
        &mut self,
        map: &mut dyn MapWidget,
        icons: &[CountryIcon],
        timeline: &TimelineState,
    ) -> MapResult<()> {
        let latch = &mut self.latch;
        let visible: Vec<&CountryIcon> = icons
            .iter()
            .filter(|icon| latch.is_visible(&icon.id.to_string(), &icon.timing_rule(), timeline))
            .collect();
        let keep: HashSet<MarkerId> = visible.iter().map(|icon| icon.id).collect();

        let stale: Vec<MarkerId> = self
            .placed
            .keys()
            .filter(|id| !keep.contains(id))
            .copied()
            .collect();
        for id in stale {
            map::tolerate_missing(map.remove_marker(&id.to_string()))?;
            self.placed.remove(&id);
            if self.hovered == Some(id) {
                self.hovered = None;
            }
        }

        for icon in &visible {
            let element = self.element_for(icon);
            match self.placed.get_mut(&icon.id) {
                Some(placed) => {
                    if placed.element != element {
                        map.update_marker(&element)?;
                        placed.element = element;
                    }
                    placed.record = (*icon).clone();
                }
                None => {
                    log::debug!("Placing {} marker {:?}", icon.icon_kind.name(), icon.title);
                    map.add_marker(&element)?;
                    self.placed.insert(
                        icon.id,
                        Placed {
                            record: (*icon).clone(),
                            element,
                        },
                    );
                }
            }
        }

        self.order = visible.iter().map(|icon| icon.id).collect();
        self.publish();
        Ok(())
    }

    /// Select one marker (or none). Only the affected markers are restyled.
    pub fn select(&mut self, map: &mut dyn MapWidget, id: Option<MarkerId>) -> MapResult<()> {
        let previous = std::mem::replace(&mut self.selected, id);
        if previous == id {
            return Ok(());
        }
        if let Some(previous) = previous {
            self.restyle(map, previous)?;
        }
        if let Some(id) = id {
            self.restyle(map, id)?;
        }
        Ok(())
    }

    pub fn set_lens(&mut self, map: &mut dyn MapWidget, lens: ActiveLens) -> MapResult<()> {
        if self.lens == lens {
            return Ok(());
        }
        self.lens = lens;
        match self.selected {
            Some(id) => self.restyle(map, id),
            None => Ok(()),
        }
    }

    /// Invoke the click handler with the marker's record. Returns false if the
    /// marker is not placed.
    pub fn handle_click(&mut self, id: MarkerId) -> bool {
        let Some(placed) = self.placed.get(&id) else {
            return false;
        };
        if let Some(handler) = self.on_click.as_mut() {
            handler(&placed.record);
        }
        true
    }

    /// Enlarge the marker under the pointer. Presentation only.
    pub fn handle_hover(&mut self, map: &mut dyn MapWidget, id: Option<MarkerId>) -> MapResult<()> {
        let previous = std::mem::replace(&mut self.hovered, id);
        if previous == id {
            return Ok(());
        }
        if let Some(previous) = previous {
            self.restyle(map, previous)?;
        }
        if let Some(id) = id {
            self.restyle(map, id)?;
        }
        Ok(())
    }

    /// Remove every placed element.
    pub fn teardown(&mut self, map: &mut dyn MapWidget) -> MapResult<()> {
        for id in self.placed.keys() {
            map::tolerate_missing(map.remove_marker(&id.to_string()))?;
        }
        self.placed.clear();
        self.order.clear();
        self.hovered = None;
        self.latch.reset();
        self.publish();
        Ok(())
    }

    fn restyle(&mut self, map: &mut dyn MapWidget, id: MarkerId) -> MapResult<()> {
        let Some(placed) = self.placed.get(&id) else {
            return Ok(());
        };
        let element = self.element_for(&placed.record);
        if element == placed.element {
            return Ok(());
        }
        map.update_marker(&element)?;
        if let Some(placed) = self.placed.get_mut(&id) {
            placed.element = element;
        }
        Ok(())
    }

    fn element_for(&self, icon: &CountryIcon) -> MarkerElement {
        let palette = if self.selected == Some(icon.id) {
            self.lens.selection_palette()
        } else {
            MarkerPalette::neutral()
        };
        MarkerElement {
            id: icon.id.to_string(),
            coordinate: icon.coordinate,
            title: icon.title.clone(),
            icon: icon.icon_kind.svg(),
            rotation_deg: DIAMOND_ROTATION_DEG,
            icon_rotation_deg: -DIAMOND_ROTATION_DEG,
            palette,
            scale: if self.hovered == Some(icon.id) { HOVER_SCALE } else { 1.0 },
        }
    }

    fn publish(&mut self) {
        let ids = self.order.iter().map(|id| id.to_string()).collect();
        self.observers
            .publish(&VisibleEntities::new(EntityKind::Marker, ids));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MapOp, MemoryMap};
    use chronoatlas_core::geometry::LatLng;
    use chronoatlas_core::marker::IconKind;
    use chronoatlas_core::timing::TimelinePoint;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn timeline() -> TimelineState {
        TimelineState::new(vec![TimelinePoint::new("1789"), TimelinePoint::new("1815")])
    }

    fn icons() -> Vec<CountryIcon> {
        vec![
            CountryIcon::new(LatLng::new(48.85, 2.35), IconKind::Capital, "Paris"),
            CountryIcon::new(LatLng::new(50.68, 4.41), IconKind::Battle, "Waterloo").linked_to("1815"),
        ]
    }

    #[test]
    fn test_marker_end_to_end() {
        let mut map = MemoryMap::with_base_style();
        let mut renderer = MarkerRenderer::default();
        let icons = icons();
        let mut timeline = timeline();

        renderer.sync(&mut map, &icons, &timeline).unwrap();
        assert_eq!(renderer.placed(), &[icons[0].id]);
        let paris = map.marker(&icons[0].id.to_string()).unwrap();
        assert_eq!(paris.rotation_deg, 45.0);
        assert_eq!(paris.icon_rotation_deg, -45.0);
        assert_eq!(paris.icon, IconKind::Capital.svg());
        assert_eq!(paris.palette, MarkerPalette::neutral());

        timeline.activate("1815");
        map.take_ops();
        renderer.sync(&mut map, &icons, &timeline).unwrap();
        assert_eq!(map.take_ops(), vec![MapOp::AddMarker(icons[1].id.to_string())]);

        // Unchanged sync reuses the elements.
        renderer.sync(&mut map, &icons, &timeline).unwrap();
        assert!(map.take_ops().is_empty());

        renderer.select(&mut map, Some(icons[1].id)).unwrap();
        assert_eq!(map.take_ops(), vec![MapOp::UpdateMarker(icons[1].id.to_string())]);
        let waterloo = map.marker(&icons[1].id.to_string()).unwrap();
        assert_eq!(waterloo.palette, MarkerPalette::default_lens());
        assert_eq!(map.marker(&icons[0].id.to_string()).unwrap().palette, MarkerPalette::neutral());

        let red = SerializableColor::rgb(220, 38, 38);
        renderer
            .set_lens(&mut map, ActiveLens::Custom { name: "Conflict".into(), color: red })
            .unwrap();
        let waterloo = map.marker(&icons[1].id.to_string()).unwrap();
        assert_eq!(waterloo.palette.border, red);

        timeline.clear();
        renderer.sync(&mut map, &icons, &timeline).unwrap();
        assert!(map.marker(&icons[1].id.to_string()).is_none());
        assert!(map.marker(&icons[0].id.to_string()).is_some());
    }

    #[test]
    fn test_click_passes_record() {
        let mut map = MemoryMap::with_base_style();
        let mut renderer = MarkerRenderer::default();
        let clicked = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&clicked);
        renderer.set_click_handler(move |icon| *sink.borrow_mut() = Some(icon.title.clone()));

        let icons = icons();
        renderer.sync(&mut map, &icons, &timeline()).unwrap();
        assert!(renderer.handle_click(icons[0].id));
        assert_eq!(clicked.borrow().as_deref(), Some("Paris"));
        assert!(!renderer.handle_click(icons[1].id));
    }

    #[test]
    fn test_hover_scales_without_selecting() {
        let mut map = MemoryMap::with_base_style();
        let mut renderer = MarkerRenderer::default();
        let icons = icons();
        renderer.sync(&mut map, &icons, &timeline()).unwrap();
        let id = icons[0].id;

        renderer.handle_hover(&mut map, Some(id)).unwrap();
        assert_eq!(map.marker(&id.to_string()).unwrap().scale, HOVER_SCALE);
        assert_eq!(renderer.selected(), None);
        renderer.handle_hover(&mut map, None).unwrap();
        assert_eq!(map.marker(&id.to_string()).unwrap().scale, 1.0);
    }

    #[test]
    fn test_teardown_tolerates_removed() {
        let mut map = MemoryMap::with_base_style();
        let mut renderer = MarkerRenderer::default();
        let icons = icons();
        renderer.sync(&mut map, &icons, &timeline()).unwrap();
        map.remove_marker(&icons[0].id.to_string()).unwrap();
        renderer.teardown(&mut map).unwrap();
        assert!(renderer.placed().is_empty());
        assert_eq!(map.markers().count(), 0);
    }

    #[test]
    fn test_publishes_placed_ids() {
        let mut map = MemoryMap::with_base_style();
        let mut renderer = MarkerRenderer::default();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        renderer
            .observers
            .subscribe(move |v: &VisibleEntities| sink.borrow_mut().push(v.ids.len()));

        let icons = icons();
        let mut timeline = timeline();
        renderer.sync(&mut map, &icons, &timeline).unwrap();
        timeline.activate("1815");
        renderer.sync(&mut map, &icons, &timeline).unwrap();
        assert_eq!(*seen.borrow(), vec![1, 2]);
    }
}
