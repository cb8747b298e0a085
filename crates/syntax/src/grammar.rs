//! The grammar seam supplied by the language-tooling layer.

use std::sync::Arc;

use thiserror::Error;
use weft_primitives::{RopeSlice, Version};
use weft_worker::GenerationToken;

use crate::node::{Node, NodeKind};

/// Errors a grammar may report. None of them escape the analyzer except
/// [`StructureError::Cancelled`]; the rest degrade the model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructureError {
	/// Cooperative cancellation was observed.
	#[error("structural derivation cancelled")]
	Cancelled,
	/// Nesting exceeded the grammar's limit.
	#[error("nesting exceeds depth limit {limit}")]
	TooDeep { limit: usize },
	/// Items returned by the grammar do not cover the requested text.
	#[error("grammar items cover {covered} chars of {expected}")]
	Tiling { expected: usize, covered: usize },
	/// Grammar-specific failure.
	#[error("grammar failure: {0}")]
	Grammar(String),
}

/// The container a run of items is parsed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseContext {
	/// Kind of the enclosing container; [`NodeKind::ROOT`] at top level.
	pub kind: NodeKind,
	/// Nesting depth of the enclosing container.
	pub depth: usize,
}

impl ParseContext {
	pub const ROOT: ParseContext = ParseContext {
		kind: NodeKind::ROOT,
		depth: 0,
	};
}

/// Result of parsing a run of items.
#[derive(Debug)]
pub struct Parsed {
	/// Items tiling the parsed text exactly.
	pub items: Vec<Arc<Node>>,
	/// Whether the lexical state at the end of the text is neutral for the
	/// context: no open string, comment or nested container, and no closer
	/// that could belong to an enclosing container.
	///
	/// An unsettled result is only trusted when it runs to the end of the
	/// document, and its items may stop short of the end of the text.
	pub settled: bool,
}

/// A language description that can derive nested regions from text.
///
/// Implementations must be deterministic: the same text in the same
/// context always yields the same items. Long parses poll `cancel` and
/// return [`StructureError::Cancelled`] once it fires.
pub trait Grammar: Send + Sync + 'static {
	fn name(&self) -> &'static str;

	/// How many chars past the end of a token the lexer may inspect before
	/// deciding where the token ends.
	///
	/// Re-derivation keeps at least this many unchanged chars between the
	/// last reused item and the damage.
	fn lookahead(&self) -> usize {
		1
	}

	/// Human-readable name of a grammar-defined kind.
	fn kind_name(&self, kind: NodeKind) -> &'static str;

	/// Parses `text` as the items directly inside a container described by
	/// `context`. New nodes carry `stamp`.
	fn parse_items(&self, text: RopeSlice<'_>, context: ParseContext, stamp: Version, cancel: &GenerationToken) -> Result<Parsed, StructureError>;
}
