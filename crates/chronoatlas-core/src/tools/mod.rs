//! Drawing tools: the pointer-driven state machine that produces shapes and lines.

use crate::config::EngineConfig;
use crate::geometry::{self, LatLng};
use crate::input::PointerEvent;
use crate::shapes::{Line, SerializableColor, Shape};
use crate::snap::{LineSnapper, SnapResult};
use serde::{Deserialize, Serialize};

/// What the next drawing session creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DrawMode {
    AreaCircle,
    AreaPolygon,
    LineStraight,
    LineCurved,
}

impl DrawMode {
    /// Whether this mode draws a connection (and so may snap to existing lines).
    pub fn is_connection(self) -> bool {
        matches!(self, DrawMode::LineStraight | DrawMode::LineCurved)
    }
}

/// State of the drawing tool.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum DrawState {
    /// Not drawing.
    #[default]
    Idle,
    /// Waiting for the first click.
    Armed(DrawMode),
    /// At least one point placed.
    Collecting {
        mode: DrawMode,
        points: Vec<LatLng>,
    },
}

/// Style applied to new shapes and lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawStyle {
    pub color: SerializableColor,
    pub opacity: f64,
    /// Line thickness in pixels.
    pub thickness: f64,
}

impl Default for DrawStyle {
    fn default() -> Self {
        Self {
            color: SerializableColor::default(),
            opacity: 0.5,
            thickness: 3.0,
        }
    }
}

/// Live preview geometry for the current interaction.
#[derive(Debug, Clone, PartialEq)]
pub struct Preview {
    pub mode: DrawMode,
    /// Outline to draw. Closed for circles, open for everything else.
    pub outline: Vec<LatLng>,
    pub closed: bool,
    /// Set when the pointer was moved onto an existing line.
    pub snapped_to: Option<LatLng>,
}

/// A finished drawing.
#[derive(Debug, Clone, PartialEq)]
pub enum Drawn {
    Shape(Shape),
    Line(Line),
}

/// Outcome of feeding one event to the tool.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawStep {
    /// Nothing changed.
    Ignored,
    /// The preview should be redrawn.
    Preview(Preview),
    /// Double-click on a polygon with fewer than 3 vertices.
    NeedMoreVertices { have: usize },
    /// A shape or line was completed; the tool is idle again.
    Completed(Drawn),
}

/// Drives one drawing interaction at a time.
#[derive(Debug, Clone)]
pub struct DrawingTool {
    /// Current state.
    state: DrawState,
    /// Style for new shapes and lines.
    pub style: DrawStyle,
    /// Snapping for connection modes.
    pub snapper: LineSnapper,
    circle_steps: usize,
    bezier_steps: usize,
}

impl Default for DrawingTool {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl DrawingTool {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            state: DrawState::Idle,
            style: DrawStyle::default(),
            snapper: LineSnapper::new(config.snap_to_lines, config.snap_threshold_deg),
            circle_steps: config.circle_steps,
            bezier_steps: config.bezier_steps,
        }
    }

    pub fn state(&self) -> &DrawState {
        &self.state
    }

    pub fn mode(&self) -> Option<DrawMode> {
        match &self.state {
            DrawState::Idle => None,
            DrawState::Armed(mode) | DrawState::Collecting { mode, .. } => Some(*mode),
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self.state, DrawState::Idle)
    }

    /// Start a new session, discarding any points in progress.
    pub fn arm(&mut self, mode: DrawMode) {
        self.state = DrawState::Armed(mode);
    }

    /// Discard the current session. Returns true if a session was active.
    pub fn cancel(&mut self) -> bool {
        let was_active = self.is_active();
        self.state = DrawState::Idle;
        was_active
    }

    /// Feed one pointer event.
    pub fn handle(&mut self, event: PointerEvent) -> DrawStep {
        let Some(mode) = self.mode() else {
            return DrawStep::Ignored;
        };
        let resolved = self.resolve(mode, event.position());
        match event {
            PointerEvent::Click(_) => self.click(mode, resolved),
            PointerEvent::Move(_) => self.preview_to(mode, resolved),
            PointerEvent::DoubleClick(_) => self.double_click(mode),
        }
    }

    fn resolve(&self, mode: DrawMode, point: LatLng) -> SnapResult {
        if mode.is_connection() {
            self.snapper.resolve(point)
        } else {
            SnapResult::none(point)
        }
    }

    fn points(&self) -> &[LatLng] {
        match &self.state {
            DrawState::Collecting { points, .. } => points,
            _ => &[],
        }
    }

    fn click(&mut self, mode: DrawMode, at: SnapResult) -> DrawStep {
        let mut points = match std::mem::take(&mut self.state) {
            DrawState::Collecting { points, .. } => points,
            _ => Vec::new(),
        };
        points.push(at.point);

        let finished = match (mode, points.len()) {
            (DrawMode::AreaCircle, 2) => {
                let radius_km = points[0].distance_km(points[1]);
                Shape::circle(points[0], radius_km).map(|s| Drawn::Shape(self.style_shape(s)))
            }
            (DrawMode::LineStraight, 2) => {
                Line::straight(points[0], points[1]).map(|l| Drawn::Line(self.style_line(l)))
            }
            (DrawMode::LineCurved, 3) => Line::curved(points[0], points[1], points[2])
                .map(|l| Drawn::Line(self.style_line(l))),
            _ => {
                self.state = DrawState::Collecting { mode, points };
                return self.preview_to(mode, at);
            }
        };

        match finished {
            Ok(drawn) => {
                log::debug!("Completed {:?} drawing", mode);
                DrawStep::Completed(drawn)
            }
            Err(e) => {
                // Drop the degenerate point and keep collecting.
                log::debug!("Ignoring click for {:?}: {}", mode, e);
                points.pop();
                self.state = DrawState::Collecting { mode, points };
                DrawStep::Ignored
            }
        }
    }

    fn double_click(&mut self, mode: DrawMode) -> DrawStep {
        if mode != DrawMode::AreaPolygon {
            return DrawStep::Ignored;
        }
        let mut vertices = self.points().to_vec();
        crate::shapes::dedup_consecutive(&mut vertices);
        match Shape::polygon(vertices) {
            Ok(shape) => {
                self.state = DrawState::Idle;
                log::debug!("Completed polygon drawing");
                DrawStep::Completed(Drawn::Shape(self.style_shape(shape)))
            }
            Err(_) => DrawStep::NeedMoreVertices {
                have: crate::shapes::distinct_vertex_count(self.points()),
            },
        }
    }

    /// Preview geometry from the placed points to the pointer.
    fn preview_to(&self, mode: DrawMode, pointer: SnapResult) -> DrawStep {
        let points = self.points();
        let Some(&first) = points.first() else {
            return DrawStep::Ignored;
        };
        let (outline, closed) = match mode {
            DrawMode::AreaCircle => {
                let radius_km = first.distance_km(pointer.point);
                if radius_km <= 0.0 {
                    return DrawStep::Ignored;
                }
                (geometry::sample_circle(first, radius_km, self.circle_steps), true)
            }
            DrawMode::AreaPolygon | DrawMode::LineStraight => {
                let mut outline = points.to_vec();
                outline.push(pointer.point);
                (outline, false)
            }
            DrawMode::LineCurved => match points {
                [start] => (vec![*start, pointer.point], false),
                [start, control, ..] => (
                    geometry::sample_bezier(*start, *control, pointer.point, self.bezier_steps),
                    false,
                ),
                [] => return DrawStep::Ignored,
            },
        };
        DrawStep::Preview(Preview {
            mode,
            outline,
            closed,
            snapped_to: pointer.snapped.then_some(pointer.point),
        })
    }

    fn style_shape(&self, shape: Shape) -> Shape {
        shape
            .with_color(self.style.color)
            .with_opacity(self.style.opacity.clamp(0.0, 1.0))
    }

    fn style_line(&self, line: Line) -> Line {
        line.with_color(self.style.color)
            .with_thickness(self.style.thickness)
    }
}
