//! Coordinate conversions between char offsets, line/column pairs, byte
//! offsets and UTF-16 positions.
//!
//! The free functions here operate on a bare [`RopeSlice`] and validate
//! their input. Version checking lives on [`Snapshot`](crate::Snapshot),
//! which pairs a rope with the version the coordinates refer to.

use ropey::RopeSlice;

use crate::error::{BufferError, Result};
use crate::range::{CharIdx, check_offset};
use crate::rope::max_column;

/// Zero-based line and char column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct LineCol {
	pub line: usize,
	pub column: usize,
}

impl LineCol {
	pub const fn new(line: usize, column: usize) -> Self {
		Self { line, column }
	}
}

/// Zero-based line and UTF-16 code unit column, as used by language servers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Utf16Position {
	pub line: usize,
	pub character: usize,
}

impl Utf16Position {
	pub const fn new(line: usize, character: usize) -> Self {
		Self { line, character }
	}
}

/// Converts a char offset to a line/column pair.
pub fn char_to_line_col(text: RopeSlice, offset: CharIdx) -> Result<LineCol> {
	check_offset(offset, text.len_chars())?;
	let line = text.char_to_line(offset);
	Ok(LineCol {
		line,
		column: offset - text.line_to_char(line),
	})
}

/// Converts a line/column pair to a char offset.
///
/// Columns past the line's terminator are rejected rather than clamped, so
/// `line_col_to_char(char_to_line_col(o)) == o` for every valid offset.
pub fn line_col_to_char(text: RopeSlice, pos: LineCol) -> Result<CharIdx> {
	if pos.line >= text.len_lines() || pos.column > max_column(text, pos.line) {
		return Err(BufferError::Position {
			line: pos.line,
			column: pos.column,
		});
	}
	Ok(text.line_to_char(pos.line) + pos.column)
}

/// Converts a char offset to a byte offset.
pub fn char_to_byte(text: RopeSlice, offset: CharIdx) -> Result<usize> {
	check_offset(offset, text.len_chars())?;
	Ok(text.char_to_byte(offset))
}

/// Converts a byte offset to a char offset, rejecting offsets inside a char.
pub fn byte_to_char(text: RopeSlice, byte: usize) -> Result<CharIdx> {
	if byte > text.len_bytes() {
		return Err(BufferError::Boundary { offset: byte });
	}
	let offset = text.byte_to_char(byte);
	if text.char_to_byte(offset) != byte {
		return Err(BufferError::Boundary { offset: byte });
	}
	Ok(offset)
}

/// Converts a char offset to a UTF-16 line/character position.
pub fn char_to_utf16(text: RopeSlice, offset: CharIdx) -> Result<Utf16Position> {
	let pos = char_to_line_col(text, offset)?;
	let line_start = text.line_to_char(pos.line);
	Ok(Utf16Position {
		line: pos.line,
		character: text.char_to_utf16_cu(offset) - text.char_to_utf16_cu(line_start),
	})
}

/// Converts a UTF-16 line/character position to a char offset.
///
/// Positions that split a surrogate pair are rejected.
pub fn utf16_to_char(text: RopeSlice, pos: Utf16Position) -> Result<CharIdx> {
	let out_of_bounds = BufferError::Position {
		line: pos.line,
		column: pos.character,
	};
	if pos.line >= text.len_lines() {
		return Err(out_of_bounds);
	}
	let line_start = text.line_to_char(pos.line);
	let target = text.char_to_utf16_cu(line_start) + pos.character;
	if target > text.len_utf16_cu() {
		return Err(out_of_bounds);
	}
	let offset = text.utf16_cu_to_char(target);
	if text.char_to_utf16_cu(offset) != target {
		return Err(BufferError::Boundary { offset: pos.character });
	}
	if offset - line_start > max_column(text, pos.line) {
		return Err(out_of_bounds);
	}
	Ok(offset)
}
