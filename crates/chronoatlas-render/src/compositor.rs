//! Persistent map layers for territories, areas and connections.
//!
//! Each category owns one data source and a stack of sublayers (a blurred glow
//! pass under the main paint). Layers are created only once the map style is
//! ready, always below the base map's first label layer. Data changes take the
//! cheapest path that keeps the map correct: a full re-create when the feature
//! count changes, a data push when features changed in place, nothing when the
//! data is identical.

use crate::features::{self, FeatureCollection, TerritoryHighlight};
use crate::map::{self, LayerKind, LayerSpec, MapResult, MapWidget, VISIBILITY};
use crate::transition::{ColorTransition, Instant};
use chronoatlas_core::annotation::{AnnotatedArea, Connection};
use chronoatlas_core::config::{ChangeDetection, EngineConfig};
use chronoatlas_core::observer::{EntityKind, Observers, VisibleEntities};
use chronoatlas_core::shapes::SerializableColor;
use peniko::Color;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;

/// A group of layers managed together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    Territories,
    Areas,
    Connections,
}

impl Category {
    /// Bottom to top.
    pub const ALL: [Category; 3] = [Category::Territories, Category::Areas, Category::Connections];

    pub fn key(self) -> &'static str {
        match self {
            Category::Territories => "territories",
            Category::Areas => "areas",
            Category::Connections => "connections",
        }
    }

    pub fn entity_kind(self) -> EntityKind {
        match self {
            Category::Territories => EntityKind::Territory,
            Category::Areas => EntityKind::Area,
            Category::Connections => EntityKind::Connection,
        }
    }

    fn index(self) -> usize {
        self as usize
    }

    fn sublayers(self) -> &'static [Sublayer] {
        match self {
            Category::Territories => &[Sublayer::Glow, Sublayer::Fill],
            Category::Areas => &[Sublayer::Glow, Sublayer::Fill, Sublayer::Outline],
            Category::Connections => &[Sublayer::Glow, Sublayer::Line, Sublayer::Label],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sublayer {
    Glow,
    Fill,
    Outline,
    Line,
    Label,
}

impl Sublayer {
    fn suffix(self) -> &'static str {
        match self {
            Sublayer::Glow => "glow",
            Sublayer::Fill => "fill",
            Sublayer::Outline => "outline",
            Sublayer::Line => "line",
            Sublayer::Label => "label",
        }
    }

    fn kind(self) -> LayerKind {
        match self {
            Sublayer::Fill => LayerKind::Fill,
            Sublayer::Glow | Sublayer::Outline | Sublayer::Line => LayerKind::Line,
            Sublayer::Label => LayerKind::Symbol,
        }
    }

    /// Paint property carrying the category color, if any.
    fn color_property(self) -> Option<&'static str> {
        match self {
            Sublayer::Fill => Some("fill-color"),
            Sublayer::Glow | Sublayer::Outline | Sublayer::Line => Some("line-color"),
            Sublayer::Label => None,
        }
    }

    fn opacity_property(self) -> Option<&'static str> {
        match self {
            Sublayer::Fill => Some("fill-opacity"),
            Sublayer::Outline | Sublayer::Line => Some("line-opacity"),
            Sublayer::Glow | Sublayer::Label => None,
        }
    }
}

/// Paint settings for one category.
#[derive(Debug, Clone, Copy)]
pub struct CategoryPaint {
    /// Solid color for every feature. `None` uses each feature's own color.
    pub color: Option<Color>,
    /// Multiplier applied to each feature's opacity.
    pub opacity: f64,
}

impl Default for CategoryPaint {
    fn default() -> Self {
        Self {
            color: None,
            opacity: 1.0,
        }
    }
}

impl PartialEq for CategoryPaint {
    fn eq(&self, other: &Self) -> bool {
        self.color.map(SerializableColor::from) == other.color.map(SerializableColor::from)
            && self.opacity == other.opacity
    }
}

impl CategoryPaint {
    pub fn solid(color: Color) -> Self {
        Self {
            color: Some(color),
            ..Self::default()
        }
    }

    fn color_value(&self) -> Value {
        match self.color {
            Some(color) => Value::from(SerializableColor::from(color).to_hex()),
            None => json!(["get", "color"]),
        }
    }

    fn opacity_value(&self) -> Value {
        json!(["*", ["get", "opacity"], self.opacity])
    }
}

/// Data for one category render.
#[derive(Debug, Clone)]
struct RenderRequest {
    data: FeatureCollection,
    labels: Option<FeatureCollection>,
    ids: Vec<String>,
}

impl RenderRequest {
    fn fingerprint(&self) -> u64 {
        let labels = self.labels.as_ref().map_or(0, FeatureCollection::fingerprint);
        self.data.fingerprint() ^ labels.rotate_left(1)
    }
}

#[derive(Debug)]
struct CategoryState {
    created: bool,
    feature_count: Option<usize>,
    fingerprint: Option<u64>,
    visible: bool,
    paint: CategoryPaint,
    ids: Vec<String>,
    /// Latest render waiting for the style to load.
    pending: Option<RenderRequest>,
}

impl Default for CategoryState {
    fn default() -> Self {
        Self {
            created: false,
            feature_count: None,
            fingerprint: None,
            visible: true,
            paint: CategoryPaint::default(),
            ids: Vec::new(),
            pending: None,
        }
    }
}

#[derive(Debug, Clone)]
struct ActiveTransition {
    layer: String,
    property: &'static str,
    color: ColorTransition,
}

/// Keeps the map's custom layers in sync with annotation data.
#[derive(Debug)]
pub struct LayerCompositor {
    prefix: String,
    change_detection: ChangeDetection,
    transition: Duration,
    circle_steps: usize,
    bezier_steps: usize,
    categories: [CategoryState; 3],
    awaiting_style: bool,
    transitions: Vec<ActiveTransition>,
    /// Notified with the ids shown after every render or visibility change.
    pub observers: Observers<VisibleEntities>,
}

impl LayerCompositor {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            prefix: config.layer_prefix.clone(),
            change_detection: config.change_detection,
            transition: config.transition(),
            circle_steps: config.circle_steps,
            bezier_steps: config.bezier_steps,
            categories: Default::default(),
            awaiting_style: false,
            transitions: Vec::new(),
            observers: Observers::new(),
        }
    }

    pub fn source_id(&self, category: Category) -> String {
        format!("{}-{}", self.prefix, category.key())
    }

    fn label_source_id(&self, category: Category) -> String {
        format!("{}-{}-labels", self.prefix, category.key())
    }

    fn layer_id(&self, category: Category, sublayer: Sublayer) -> String {
        format!("{}-{}-{}", self.prefix, category.key(), sublayer.suffix())
    }

    /// Every layer id the category owns, bottom to top.
    pub fn layer_ids(&self, category: Category) -> Vec<String> {
        category
            .sublayers()
            .iter()
            .map(|&s| self.layer_id(category, s))
            .collect()
    }

    pub fn is_visible(&self, category: Category) -> bool {
        self.state(category).visible
    }

    pub fn paint(&self, category: Category) -> CategoryPaint {
        self.state(category).paint
    }

    /// Whether a style-ready notification is outstanding.
    pub fn is_awaiting_style(&self) -> bool {
        self.awaiting_style
    }

    pub fn has_running_transitions(&self) -> bool {
        !self.transitions.is_empty()
    }

    fn state(&self, category: Category) -> &CategoryState {
        &self.categories[category.index()]
    }

    fn state_mut(&mut self, category: Category) -> &mut CategoryState {
        &mut self.categories[category.index()]
    }

    pub fn render_territories(
        &mut self,
        map: &mut dyn MapWidget,
        territories: &[TerritoryHighlight],
    ) -> MapResult<()> {
        let request = RenderRequest {
            data: features::territory_features(territories),
            labels: None,
            ids: territories.iter().map(|t| t.name.clone()).collect(),
        };
        self.render(map, Category::Territories, request)
    }

    pub fn render_areas(&mut self, map: &mut dyn MapWidget, areas: &[&AnnotatedArea]) -> MapResult<()> {
        let request = RenderRequest {
            data: features::area_features(areas, self.circle_steps),
            labels: None,
            ids: areas.iter().map(|a| a.id().to_string()).collect(),
        };
        self.render(map, Category::Areas, request)
    }

    pub fn render_connections(
        &mut self,
        map: &mut dyn MapWidget,
        connections: &[&Connection],
    ) -> MapResult<()> {
        let request = RenderRequest {
            data: features::connection_features(connections, self.bezier_steps),
            labels: Some(features::connection_label_features(connections, self.bezier_steps)),
            ids: connections.iter().map(|c| c.id().to_string()).collect(),
        };
        self.render(map, Category::Connections, request)
    }

    fn render(&mut self, map: &mut dyn MapWidget, category: Category, request: RenderRequest) -> MapResult<()> {
        if !map.is_style_loaded() {
            log::debug!("Style not loaded; deferring {} layers", category.key());
            self.state_mut(category).pending = Some(request);
            if !self.awaiting_style {
                self.awaiting_style = true;
                map.request_style_loaded();
            }
            return Ok(());
        }

        let count = request.data.len();
        let fingerprint = request.fingerprint();
        let source = self.source_id(category);
        let state = self.state(category);
        let structural = !state.created || !map.has_source(&source) || state.feature_count != Some(count);

        if structural {
            log::debug!("Re-creating {} layers ({} features)", category.key(), count);
            self.recreate(map, category, &request)?;
        } else if self.change_detection == ChangeDetection::FeatureCount
            || state.fingerprint != Some(fingerprint)
        {
            log::debug!("Pushing {} features to {}", count, source);
            map.set_source_data(&source, &request.data)?;
            if let Some(labels) = &request.labels {
                map.set_source_data(&self.label_source_id(category), labels)?;
            }
        } else {
            log::debug!("{} unchanged; skipping data push", category.key());
        }

        let state = self.state_mut(category);
        state.created = true;
        state.feature_count = Some(count);
        state.fingerprint = Some(fingerprint);
        state.ids = request.ids;
        self.publish(category);
        Ok(())
    }

    /// Deliver the one-shot style-ready notification. Every pending category
    /// is rendered; the first failure is returned afterwards.
    pub fn on_style_loaded(&mut self, map: &mut dyn MapWidget) -> MapResult<()> {
        self.awaiting_style = false;
        let mut result = Ok(());
        for category in Category::ALL {
            let Some(request) = self.state_mut(category).pending.take() else {
                continue;
            };
            if let Err(e) = self.render(map, category, request) {
                log::warn!("Deferred {} render failed: {}", category.key(), e);
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }

    fn recreate(&mut self, map: &mut dyn MapWidget, category: Category, request: &RenderRequest) -> MapResult<()> {
        self.remove_category(map, category)?;

        let source = self.source_id(category);
        ensure_source(map, &source, &request.data)?;
        let label_source = self.label_source_id(category);
        if let Some(labels) = &request.labels {
            ensure_source(map, &label_source, labels)?;
        }

        let before = self.insertion_anchor(map, category);
        let state = self.state(category);
        for &sublayer in category.sublayers() {
            let id = self.layer_id(category, sublayer);
            if map.has_layer(&id) {
                continue;
            }
            let source = if sublayer == Sublayer::Label { &label_source } else { &source };
            let spec = layer_spec(id, sublayer, source, &state.paint, state.visible);
            map.add_layer(spec, before.as_deref())?;
        }
        Ok(())
    }

    /// Layer to insert a category below: the first layer of a higher category,
    /// else the base map's first label layer.
    fn insertion_anchor(&self, map: &dyn MapWidget, category: Category) -> Option<String> {
        let higher: Vec<String> = Category::ALL
            .iter()
            .filter(|&&c| c > category)
            .flat_map(|&c| self.layer_ids(c))
            .collect();
        map.layers()
            .into_iter()
            .find(|l| {
                higher.contains(&l.id) || (l.kind == LayerKind::Symbol && !map::is_owned(&l.id, &self.prefix))
            })
            .map(|l| l.id)
    }

    fn remove_category(&mut self, map: &mut dyn MapWidget, category: Category) -> MapResult<()> {
        let layers = self.layer_ids(category);
        self.transitions.retain(|t| !layers.contains(&t.layer));
        for id in layers.iter().rev() {
            if map.has_layer(id) {
                map::tolerate_missing(map.remove_layer(id))?;
            }
        }
        for source in [self.source_id(category), self.label_source_id(category)] {
            if map.has_source(&source) {
                map::tolerate_missing(map.remove_source(&source))?;
            }
        }
        Ok(())
    }

    /// Show or hide every sublayer of a category. Sources are kept.
    pub fn set_visibility(&mut self, map: &mut dyn MapWidget, category: Category, visible: bool) -> MapResult<()> {
        let state = self.state_mut(category);
        if state.visible == visible {
            return Ok(());
        }
        state.visible = visible;
        if state.created {
            for id in self.layer_ids(category) {
                if map.has_layer(&id) {
                    map.set_layout_property(&id, VISIBILITY, map::visibility_value(visible))?;
                }
            }
        }
        self.publish(category);
        Ok(())
    }

    /// Change a category's paint. Solid colors tween from the current value;
    /// everything else is applied immediately.
    pub fn set_paint(
        &mut self,
        map: &mut dyn MapWidget,
        category: Category,
        paint: CategoryPaint,
        now: Instant,
    ) -> MapResult<()> {
        let state = self.state_mut(category);
        if state.paint == paint {
            return Ok(());
        }
        let opacity_changed = state.paint.opacity != paint.opacity;
        state.paint = paint;
        if !state.created {
            return Ok(());
        }

        for &sublayer in category.sublayers() {
            let id = self.layer_id(category, sublayer);
            if !map.has_layer(&id) {
                continue;
            }
            if let Some(property) = sublayer.color_property() {
                self.apply_color(map, &id, property, paint.color, now)?;
            }
            if opacity_changed {
                if let Some(property) = sublayer.opacity_property() {
                    map.set_paint_property(&id, property, paint.opacity_value())?;
                }
            }
        }
        Ok(())
    }

    fn apply_color(
        &mut self,
        map: &mut dyn MapWidget,
        layer: &str,
        property: &'static str,
        target: Option<Color>,
        now: Instant,
    ) -> MapResult<()> {
        self.transitions
            .retain(|t| !(t.layer == layer && t.property == property));
        let current = map
            .paint_property(layer, property)
            .as_ref()
            .and_then(Value::as_str)
            .and_then(|hex| SerializableColor::from_hex(hex).ok());

        match (target.map(SerializableColor::from), current) {
            (Some(to), Some(from)) if from != to => {
                self.transitions.push(ActiveTransition {
                    layer: layer.to_string(),
                    property,
                    color: ColorTransition::new(from, to, now, self.transition),
                });
                Ok(())
            }
            (Some(_), Some(_)) => Ok(()),
            (Some(to), None) => map.set_paint_property(layer, property, Value::from(to.to_hex())),
            (None, _) => map.set_paint_property(layer, property, json!(["get", "color"])),
        }
    }

    /// Step running color transitions. Returns true while any are still running.
    /// On a hard error the failed and unprocessed transitions are kept.
    pub fn advance(&mut self, map: &mut dyn MapWidget, now: Instant) -> MapResult<bool> {
        let mut kept = Vec::with_capacity(self.transitions.len());
        let mut error = None;
        for transition in std::mem::take(&mut self.transitions) {
            if error.is_some() {
                kept.push(transition);
                continue;
            }
            let color = transition.color.sample(now);
            match map.set_paint_property(&transition.layer, transition.property, Value::from(color.to_hex())) {
                Ok(()) => {}
                Err(e) if e.is_not_found() => continue,
                Err(e) => {
                    error = Some(e);
                    kept.push(transition);
                    continue;
                }
            }
            if !transition.color.is_finished(now) {
                kept.push(transition);
            }
        }
        self.transitions = kept;
        match error {
            Some(e) => Err(e),
            None => Ok(!self.transitions.is_empty()),
        }
    }

    /// Remove every source and layer this compositor created.
    pub fn teardown(&mut self, map: &mut dyn MapWidget) -> MapResult<()> {
        for category in Category::ALL.iter().rev() {
            let layers = self.layer_ids(*category);
            for id in layers.iter().rev() {
                map::tolerate_missing(map.remove_layer(id))?;
            }
            map::tolerate_missing(map.remove_source(&self.source_id(*category)))?;
            if *category == Category::Connections {
                map::tolerate_missing(map.remove_source(&self.label_source_id(*category)))?;
            }
        }
        self.categories = Default::default();
        self.transitions.clear();
        self.awaiting_style = false;
        Ok(())
    }

    fn publish(&mut self, category: Category) {
        let state = self.state(category);
        let ids = if state.visible { state.ids.clone() } else { Vec::new() };
        self.observers
            .publish(&VisibleEntities::new(category.entity_kind(), ids));
    }
}

fn ensure_source(map: &mut dyn MapWidget, id: &str, data: &FeatureCollection) -> MapResult<()> {
    if map.has_source(id) {
        map.set_source_data(id, data)
    } else {
        map.add_source(id, data)
    }
}

fn layer_spec(id: String, sublayer: Sublayer, source: &str, paint: &CategoryPaint, visible: bool) -> LayerSpec {
    let spec = LayerSpec::new(id, sublayer.kind())
        .with_source(source)
        .with_visibility(visible);
    let color = paint.color_value();
    match sublayer {
        Sublayer::Glow => spec
            .with_paint("line-color", color)
            .with_paint("line-width", json!(["+", ["coalesce", ["get", "thickness"], 2.0], 6.0]))
            .with_paint("line-blur", json!(4.0))
            .with_paint("line-opacity", json!(0.35)),
        Sublayer::Fill => spec
            .with_paint("fill-color", color)
            .with_paint("fill-opacity", paint.opacity_value()),
        Sublayer::Outline => spec
            .with_paint("line-color", color)
            .with_paint("line-width", json!(2.0))
            .with_paint("line-opacity", paint.opacity_value()),
        Sublayer::Line => spec
            .with_paint("line-color", color)
            .with_paint("line-width", json!(["get", "thickness"]))
            .with_paint("line-opacity", paint.opacity_value())
            .with_layout("line-cap", json!("round"))
            .with_layout("line-join", json!("round")),
        Sublayer::Label => spec
            .with_layout("text-field", json!(["get", "label"]))
            .with_layout("text-size", json!(12))
            .with_paint("text-color", json!("#1f2937"))
            .with_paint("text-halo-color", json!("#ffffff"))
            .with_paint("text-halo-width", json!(1.5)),
    }
}
