use thiserror::Error;

use crate::anchor::AnchorId;
use crate::version::Version;

/// Errors signalled by buffer operations.
///
/// Every variant is recoverable and local to the failing call: the document
/// and its history are left untouched. Callers clamp or reject out-of-range
/// input, rebase stale edits, re-resolve stale coordinates, and drop unknown
/// anchors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BufferError {
	/// A char range lies outside the document or is reversed.
	#[error("range {start}..{end} is out of bounds for length {len}")]
	Range { start: usize, end: usize, len: usize },

	/// A line/column pair does not address a position in the document.
	#[error("position {line}:{column} is out of bounds")]
	Position { line: usize, column: usize },

	/// A byte or UTF-16 offset is out of bounds or splits a character.
	#[error("offset {offset} is not a character boundary")]
	Boundary { offset: usize },

	/// An edit was computed against a version other than the current one.
	#[error("edit targets {target} but the document is at {current}")]
	StaleEdit { target: Version, current: Version },

	/// A coordinate conversion was requested against an outdated version.
	#[error("coordinates refer to {given} but the document is at {current}")]
	VersionMismatch { given: Version, current: Version },

	/// The anchor was released or never existed.
	#[error("anchor {0} not found")]
	AnchorNotFound(AnchorId),
}

impl BufferError {
	/// Returns true for the out-of-bounds family (`Range`, `Position`, `Boundary`).
	pub fn is_range_error(&self) -> bool {
		matches!(self, Self::Range { .. } | Self::Position { .. } | Self::Boundary { .. })
	}

	/// Returns true when the caller should rebase or re-resolve against the
	/// current version.
	pub fn is_stale(&self) -> bool {
		matches!(self, Self::StaleEdit { .. } | Self::VersionMismatch { .. })
	}
}

/// Result alias for buffer operations.
pub type Result<T, E = BufferError> = std::result::Result<T, E>;
