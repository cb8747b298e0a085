//! Headless editor core: buffer sessions over versioned text.
//!
//! A [`BufferSession`] owns one document. Edits go through it to the text
//! store, the undo history and the anchor table, and are forwarded to a
//! background structural analyzer whose latest model is always readable.

/// Session configuration parsing.
pub mod config;
/// Grouped undo history and the delta log.
pub mod history;
/// Buffer sessions and shared session handles.
pub mod session;

pub use config::{ConfigError, SessionConfig};
pub use history::{EditLog, HistoryConfig, Replay, UndoStep};
pub use session::{Anchors, BufferSession, SessionHandle};
pub use weft_primitives as primitives;
pub use weft_syntax as syntax;
