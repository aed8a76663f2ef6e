//! Territory detection: the external service that names what a shape covers.
//!
//! Detection runs once, asynchronously, when a drawn shape or line is promoted
//! to a record. Failures and empty results are never fatal: the record is kept
//! and the caller gets an informational [`Notice`] to show the author.

use crate::annotation::{AnnotatedArea, AnnotationDocument, Connection, RelationType};
use crate::shapes::{Line, Shape, ShapeId};
use crate::tools::Drawn;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Territory detection errors.
#[derive(Debug, Clone, Error)]
pub enum DetectionError {
    #[error("territory service unavailable: {0}")]
    Unavailable(String),
    #[error("territory lookup failed: {0}")]
    Failed(String),
}

/// Result type for detection calls.
pub type DetectionResult<T> = Result<T, DetectionError>;

/// Boxed future for detection calls. Single-threaded, so no `Send` bound.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Territories found at the two ends of a line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineTerritories {
    pub from: Option<String>,
    pub to: Option<String>,
}

/// The territory-detection collaborator.
///
/// Implementations may be slow and may return nothing.
pub trait TerritoryDetector {
    /// Names of the territories a shape covers.
    fn detect_in_shape(&self, shape: &Shape) -> BoxFuture<'_, DetectionResult<Vec<String>>>;

    /// Territories at the start and end of a line.
    fn detect_for_line(&self, line: &Line) -> BoxFuture<'_, DetectionResult<LineTerritories>>;
}

/// Informational message for the author. Never an error dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Detection finished but found nothing.
    NoTerritoriesDetected { record: String },
    /// Detection failed; the record was kept without territories.
    DetectionFailed { record: String, reason: String },
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Notice::NoTerritoriesDetected { record } => {
                write!(f, "No territories detected for \"{}\"; it was saved anyway.", record)
            }
            Notice::DetectionFailed { record, reason } => write!(
                f,
                "Could not detect territories for \"{}\" ({}); it was saved anyway.",
                record, reason
            ),
        }
    }
}

/// Detection work still to be done for a freshly promoted record.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingDetection {
    Area { id: ShapeId, name: String, shape: Shape },
    Connection { id: ShapeId, name: String, line: Line },
}

impl PendingDetection {
    pub fn id(&self) -> ShapeId {
        match self {
            PendingDetection::Area { id, .. } | PendingDetection::Connection { id, .. } => *id,
        }
    }
}

/// Resolved detection, ready to attach to the document.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionOutcome {
    Area { id: ShapeId, territories: Vec<String> },
    Connection { id: ShapeId, endpoints: LineTerritories },
}

/// Store a completed shape as an area with no territories yet.
pub fn promote_shape(
    document: &mut AnnotationDocument,
    shape: Shape,
    name: impl Into<String>,
) -> PendingDetection {
    let name = name.into();
    let pending = PendingDetection::Area {
        id: shape.id(),
        name: name.clone(),
        shape: shape.clone(),
    };
    document.add_area(AnnotatedArea::new(name, shape));
    pending
}

/// Store a completed line as a connection with unresolved endpoints.
pub fn promote_line(
    document: &mut AnnotationDocument,
    line: Line,
    name: impl Into<String>,
    relation_type: RelationType,
) -> PendingDetection {
    let pending = PendingDetection::Connection {
        id: line.id(),
        name: name.into(),
        line: line.clone(),
    };
    document.add_connection(Connection::new(line, relation_type));
    pending
}

/// Promote whatever the drawing tool produced.
pub fn promote(
    document: &mut AnnotationDocument,
    drawn: Drawn,
    name: impl Into<String>,
    relation_type: RelationType,
) -> PendingDetection {
    match drawn {
        Drawn::Shape(shape) => promote_shape(document, shape, name),
        Drawn::Line(line) => promote_line(document, line, name, relation_type),
    }
}

/// Detect the territories covered by an area.
pub async fn detect_area(
    detector: &dyn TerritoryDetector,
    id: ShapeId,
    name: &str,
    shape: &Shape,
) -> (DetectionOutcome, Option<Notice>) {
    match detector.detect_in_shape(shape).await {
        Ok(territories) => {
            let notice = territories.is_empty().then(|| {
                log::info!("No territories detected for area {}", id);
                Notice::NoTerritoriesDetected { record: name.to_string() }
            });
            (DetectionOutcome::Area { id, territories }, notice)
        }
        Err(e) => {
            log::warn!("Territory detection failed for area {}: {}", id, e);
            (
                DetectionOutcome::Area { id, territories: Vec::new() },
                Some(Notice::DetectionFailed { record: name.to_string(), reason: e.to_string() }),
            )
        }
    }
}

/// Detect the territories at both ends of a connection.
pub async fn detect_connection(
    detector: &dyn TerritoryDetector,
    id: ShapeId,
    name: &str,
    line: &Line,
) -> (DetectionOutcome, Option<Notice>) {
    match detector.detect_for_line(line).await {
        Ok(endpoints) => {
            let notice = (endpoints.from.is_none() && endpoints.to.is_none()).then(|| {
                log::info!("No territories detected for connection {}", id);
                Notice::NoTerritoriesDetected { record: name.to_string() }
            });
            (DetectionOutcome::Connection { id, endpoints }, notice)
        }
        Err(e) => {
            log::warn!("Territory detection failed for connection {}: {}", id, e);
            (
                DetectionOutcome::Connection { id, endpoints: LineTerritories::default() },
                Some(Notice::DetectionFailed { record: name.to_string(), reason: e.to_string() }),
            )
        }
    }
}

/// Run the detection a promotion asked for. Errors and empty results become a notice.
pub async fn detect(
    detector: &dyn TerritoryDetector,
    pending: &PendingDetection,
) -> (DetectionOutcome, Option<Notice>) {
    match pending {
        PendingDetection::Area { id, name, shape } => detect_area(detector, *id, name, shape).await,
        PendingDetection::Connection { id, name, line } => {
            detect_connection(detector, *id, name, line).await
        }
    }
}

/// Attach a detection outcome. Returns false if the record was removed meanwhile.
pub fn apply(document: &mut AnnotationDocument, outcome: DetectionOutcome) -> bool {
    match outcome {
        DetectionOutcome::Area { id, territories } => document.apply_area_detection(id, territories),
        DetectionOutcome::Connection { id, endpoints } => {
            document.apply_connection_detection(id, endpoints.from, endpoints.to)
        }
    }
}
