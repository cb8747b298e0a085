//! Line geometry helpers over ropey slices.

use ropey::RopeSlice;

use crate::range::CharLen;

/// Returns the largest valid column on `line`.
///
/// Every char offset belonging to the line is addressable, up to and
/// including the first char of its terminator. On the last line the end of
/// the document is addressable. Callers must ensure `line < len_lines()`.
#[inline]
pub fn max_column(text: RopeSlice, line: usize) -> CharLen {
	let start = text.line_to_char(line);
	if line + 1 < text.len_lines() {
		text.line_to_char(line + 1) - start - 1
	} else {
		text.len_chars() - start
	}
}

#[cfg(test)]
mod tests {
	use ropey::Rope;

	use super::*;

	#[test]
	fn test_empty_document_has_one_addressable_column() {
		let text = Rope::from("");
		assert_eq!(text.len_lines(), 1);
		assert_eq!(max_column(text.slice(..), 0), 0);
	}

	#[test]
	fn test_trailing_newline_opens_an_empty_last_line() {
		let text = Rope::from("hello\n");
		assert_eq!(text.len_lines(), 2);
		assert_eq!(max_column(text.slice(..), 0), 5);
		assert_eq!(max_column(text.slice(..), 1), 0);
	}

	#[test]
	fn test_max_column_includes_terminator_start() {
		let text = Rope::from("ab\ncd");
		assert_eq!(max_column(text.slice(..), 0), 2);
		assert_eq!(max_column(text.slice(..), 1), 2);
	}

	#[test]
	fn test_max_column_crlf() {
		let text = Rope::from("ab\r\ncd");
		// Offsets 0..=3 belong to line 0, including the one between \r and \n.
		assert_eq!(max_column(text.slice(..), 0), 3);
	}
}
