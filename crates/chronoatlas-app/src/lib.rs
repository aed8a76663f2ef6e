//! ChronoAtlas Application
//!
//! Headless shell that replays scripted authoring sessions against the
//! in-memory map widget.

mod detector;
mod replay;
mod session;

pub use detector::TableDetector;
pub use replay::{Replay, Report};
pub use session::{LensSpec, RecordDetails, Session, SessionError, SessionResult, Step};
