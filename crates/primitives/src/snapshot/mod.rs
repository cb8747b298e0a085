//! Snapshot - an immutable, versioned view of document text.
//!
//! Text lives in a [`Rope`]: a balanced tree of text chunks whose nodes are
//! reference counted. Cloning a snapshot is O(1), and applying an edit
//! copies only the path from the root to the touched leaves, so every
//! previously returned snapshot stays valid and readable from other threads
//! while newer versions are produced. Each tree node also counts the line
//! breaks beneath it, which is the line index: line lookups and line reads
//! cost O(log n) plus the size of the requested span, and the index can
//! never drift from the text because it is the same structure.


use std::fmt;
use std::ops::Range;

use ropey::iter::{Chunks, Lines};
use ropey::{Rope, RopeSlice};

use crate::edit::{AppliedEdit, Edit};
use crate::error::{BufferError, Result};
use crate::position::{self, LineCol, Utf16Position};
use crate::range::{CharIdx, CharLen, check_range};
use crate::version::Version;

/// An immutable document state at one version.
#[derive(Clone, Debug)]
pub struct Snapshot {
	text: Rope,
	version: Version,
}

impl Snapshot {
	/// Creates the initial snapshot of a document.
	pub fn new(text: &str) -> Self {
		Self::from_rope(Rope::from_str(text), Version::INITIAL)
	}

	/// Wraps an existing rope at a given version.
	pub fn from_rope(text: Rope, version: Version) -> Self {
		Self { text, version }
	}

	pub fn version(&self) -> Version {
		self.version
	}

	/// Returns the underlying rope.
	pub fn rope(&self) -> &Rope {
		&self.text
	}

	pub fn len_chars(&self) -> CharLen {
		self.text.len_chars()
	}

	pub fn len_bytes(&self) -> usize {
		self.text.len_bytes()
	}

	/// Number of lines, counting the empty line after a trailing newline.
	pub fn len_lines(&self) -> usize {
		self.text.len_lines()
	}

	pub fn is_empty(&self) -> bool {
		self.text.len_chars() == 0
	}

	/// Borrows the chars in `range`.
	pub fn slice(&self, range: Range<CharIdx>) -> Result<RopeSlice<'_>> {
		check_range(&range, self.len_chars())?;
		Ok(self.text.slice(range))
	}

	/// Copies the chars in `range` out of the snapshot.
	pub fn read(&self, range: Range<CharIdx>) -> Result<String> {
		self.slice(range).map(String::from)
	}

	/// Borrows line `line`, including its terminator.
	pub fn line(&self, line: usize) -> Result<RopeSlice<'_>> {
		if line >= self.len_lines() {
			return Err(BufferError::Position { line, column: 0 });
		}
		Ok(self.text.line(line))
	}

	/// Iterates the lines in `lines`, each including its terminator.
	pub fn lines(&self, lines: Range<usize>) -> Result<std::iter::Take<Lines<'_>>> {
		if lines.start > lines.end || lines.end > self.len_lines() {
			return Err(BufferError::Position {
				line: lines.end,
				column: 0,
			});
		}
		Ok(self.text.lines_at(lines.start).take(lines.end - lines.start))
	}

	/// Iterates the text as contiguous `&str` chunks, for persistence layers.
	pub fn chunks(&self) -> Chunks<'_> {
		self.text.chunks()
	}

	/// Applies `edit` and returns the next snapshot plus the applied record.
	///
	/// `self` is left untouched.
	///
	/// # Errors
	///
	/// Returns [`BufferError::Range`] when the edit's range is reversed or
	/// exceeds the document.
	pub fn apply(&self, edit: &Edit) -> Result<(Snapshot, AppliedEdit)> {
		self.apply_at(self.version, edit)
	}

	/// Applies `edit`, which was computed against version `base`.
	///
	/// # Errors
	///
	/// Returns [`BufferError::StaleEdit`] when `base` is not this snapshot's
	/// version, and [`BufferError::Range`] when the range does not fit.
	pub fn apply_at(&self, base: Version, edit: &Edit) -> Result<(Snapshot, AppliedEdit)> {
		if base != self.version {
			return Err(BufferError::StaleEdit {
				target: base,
				current: self.version,
			});
		}
		let range = edit.range();
		check_range(&range, self.len_chars())?;

		let removed = String::from(self.text.slice(range.clone()));
		let mut text = self.text.clone();
		text.remove(range.clone());
		text.insert(range.start, edit.text());

		let next = Snapshot {
			text,
			version: self.version.next(),
		};
		let applied = AppliedEdit {
			edit: edit.clone(),
			removed,
			base: self.version,
			result: next.version,
		};
		Ok((next, applied))
	}

	/// Returns this snapshot's text relabelled as `version`.
	///
	/// Used when history replays several edits as one logical step.
	#[must_use]
	pub fn with_version(&self, version: Version) -> Snapshot {
		Snapshot {
			text: self.text.clone(),
			version,
		}
	}

	fn check_version(&self, given: Version) -> Result<()> {
		if given != self.version {
			return Err(BufferError::VersionMismatch {
				given,
				current: self.version,
			});
		}
		Ok(())
	}

	/// Converts a char offset computed against `version` to line/column.
	pub fn to_line_column(&self, version: Version, offset: CharIdx) -> Result<LineCol> {
		self.check_version(version)?;
		position::char_to_line_col(self.text.slice(..), offset)
	}

	/// Converts a line/column pair computed against `version` to a char offset.
	pub fn to_offset(&self, version: Version, pos: LineCol) -> Result<CharIdx> {
		self.check_version(version)?;
		position::line_col_to_char(self.text.slice(..), pos)
	}

	pub fn char_to_byte(&self, version: Version, offset: CharIdx) -> Result<usize> {
		self.check_version(version)?;
		position::char_to_byte(self.text.slice(..), offset)
	}

	pub fn byte_to_char(&self, version: Version, byte: usize) -> Result<CharIdx> {
		self.check_version(version)?;
		position::byte_to_char(self.text.slice(..), byte)
	}

	pub fn to_utf16(&self, version: Version, offset: CharIdx) -> Result<Utf16Position> {
		self.check_version(version)?;
		position::char_to_utf16(self.text.slice(..), offset)
	}

	pub fn from_utf16(&self, version: Version, pos: Utf16Position) -> Result<CharIdx> {
		self.check_version(version)?;
		position::utf16_to_char(self.text.slice(..), pos)
	}
}

impl fmt::Display for Snapshot {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for chunk in self.text.chunks() {
			f.write_str(chunk)?;
		}
		Ok(())
	}
}

impl PartialEq<str> for Snapshot {
	fn eq(&self, other: &str) -> bool {
		self.text == other
	}
}

impl PartialEq<&str> for Snapshot {
	fn eq(&self, other: &&str) -> bool {
		self.text == *other
	}
}
