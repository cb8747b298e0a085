//! Core types for the edit buffer: versioned text snapshots, edits,
//! coordinate mapping, anchors and edit rebasing.

/// Tracked logical positions that survive edits.
pub mod anchor;
/// Edit requests and applied-edit records.
pub mod edit;
/// Error taxonomy shared by every buffer operation.
pub mod error;
/// Line/column, byte and UTF-16 coordinate conversions.
pub mod position;
/// Character index types and range validation.
pub mod range;
/// Transformation of stale edits through newer ones.
pub mod rebase;
/// Line geometry over ropes.
pub mod rope;
/// Persistent, versioned text snapshots.
pub mod snapshot;
/// Document version numbers.
pub mod version;

pub use anchor::{AnchorId, AnchorPositions, AnchorSet, map_offset};
pub use edit::{ActorId, AppliedEdit, Edit, EditOrigin};
pub use error::{BufferError, Result};
pub use position::{LineCol, Utf16Position};
pub use range::{CharIdx, CharLen};
pub use rebase::{rebase, rebase_through};
pub use ropey::{Rope, RopeSlice};
pub use snapshot::Snapshot;
pub use version::Version;
