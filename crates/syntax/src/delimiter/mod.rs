//! Reference grammar: bracket nesting over a C-like lexical layer.
//!
//! Words, numbers, whitespace, newlines and punctuation are leaves. Strings
//! (`"..."`, multi-line, backslash escapes), single-quoted runs (closed by
//! `'` or by the end of the line), line comments and block comments are
//! opaque leaves, so brackets inside them do not nest. `()`, `[]` and `{}`
//! are containers.
//!
//! Recovery: a closer that matches an outer open container closes every
//! container above it as unterminated; a closer matching nothing becomes an
//! `error` leaf at top level.


use std::collections::VecDeque;
use std::sync::Arc;

use ropey::iter::Chars;
use weft_primitives::{RopeSlice, Version};
use weft_worker::GenerationToken;

use crate::grammar::{Grammar, ParseContext, Parsed, StructureError};
use crate::node::{Node, NodeKind};

/// Kinds produced by [`DelimiterGrammar`].
pub mod kinds {
	use crate::node::NodeKind;

	const BASE: u16 = NodeKind::FIRST_GRAMMAR_KIND;

	pub const WORD: NodeKind = NodeKind(BASE);
	pub const NUMBER: NodeKind = NodeKind(BASE + 1);
	pub const WHITESPACE: NodeKind = NodeKind(BASE + 2);
	pub const NEWLINE: NodeKind = NodeKind(BASE + 3);
	pub const PUNCT: NodeKind = NodeKind(BASE + 4);
	pub const STRING: NodeKind = NodeKind(BASE + 5);
	pub const QUOTED: NodeKind = NodeKind(BASE + 6);
	pub const LINE_COMMENT: NodeKind = NodeKind(BASE + 7);
	pub const BLOCK_COMMENT: NodeKind = NodeKind(BASE + 8);
	pub const PAREN: NodeKind = NodeKind(BASE + 9);
	pub const BRACKET: NodeKind = NodeKind(BASE + 10);
	pub const BRACE: NodeKind = NodeKind(BASE + 11);
	pub const ERROR: NodeKind = NodeKind(BASE + 12);
}

use kinds::*;

/// Default nesting limit.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// How often the parse loop polls for cancellation, in items.
const CANCEL_POLL_INTERVAL: usize = 1024;

/// Bracket grammar with configurable comment syntax.
#[derive(Debug, Clone)]
pub struct DelimiterGrammar {
	line_comments: Vec<String>,
	block_comment: Option<(String, String)>,
	max_depth: usize,
}

impl Default for DelimiterGrammar {
	fn default() -> Self {
		Self {
			line_comments: vec!["//".to_string()],
			block_comment: Some(("/*".to_string(), "*/".to_string())),
			max_depth: DEFAULT_MAX_DEPTH,
		}
	}
}

impl DelimiterGrammar {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a line comment prefix such as `#`.
	pub fn with_line_comment(mut self, prefix: impl Into<String>) -> Self {
		let prefix = prefix.into();
		if !prefix.is_empty() {
			self.line_comments.push(prefix);
		}
		self
	}

	/// Replaces (or removes) the block comment delimiters.
	pub fn with_block_comment(mut self, delimiters: Option<(&str, &str)>) -> Self {
		self.block_comment = delimiters
			.filter(|(open, close)| !open.is_empty() && !close.is_empty())
			.map(|(open, close)| (open.to_string(), close.to_string()));
		self
	}

	pub fn with_max_depth(mut self, max_depth: usize) -> Self {
		self.max_depth = max_depth;
		self
	}

	pub fn max_depth(&self) -> usize {
		self.max_depth
	}
}

fn container_for(opener: char) -> Option<(NodeKind, char)> {
	match opener {
		'(' => Some((PAREN, ')')),
		'[' => Some((BRACKET, ']')),
		'{' => Some((BRACE, '}')),
		_ => None,
	}
}

fn is_closer(c: char) -> bool {
	matches!(c, ')' | ']' | '}')
}

fn is_word_char(c: char) -> bool {
	c.is_alphanumeric() || c == '_'
}

fn is_blank(c: char) -> bool {
	c.is_whitespace() && c != '\n' && c != '\r'
}

/// Char cursor over a rope slice with unbounded lookahead.
struct Cursor<'a> {
	chars: Chars<'a>,
	ahead: VecDeque<char>,
	pos: usize,
}

impl<'a> Cursor<'a> {
	fn new(text: RopeSlice<'a>) -> Self {
		Self {
			chars: text.chars(),
			ahead: VecDeque::new(),
			pos: 0,
		}
	}

	fn peek_nth(&mut self, n: usize) -> Option<char> {
		while self.ahead.len() <= n {
			let c = self.chars.next()?;
			self.ahead.push_back(c);
		}
		Some(self.ahead[n])
	}

	fn peek(&mut self) -> Option<char> {
		self.peek_nth(0)
	}

	fn bump(&mut self) -> Option<char> {
		let c = match self.ahead.pop_front() {
			Some(c) => c,
			None => self.chars.next()?,
		};
		self.pos += 1;
		Some(c)
	}

	fn at(&mut self, s: &str) -> bool {
		s.chars().enumerate().all(|(i, c)| self.peek_nth(i) == Some(c))
	}

	fn skip(&mut self, n: usize) {
		for _ in 0..n {
			self.bump();
		}
	}

	fn eat_while(&mut self, pred: impl Fn(char) -> bool) {
		while self.peek().is_some_and(&pred) {
			self.bump();
		}
	}
}

/// An open container on the parse stack.
struct Frame {
	kind: NodeKind,
	closer: char,
	children: Vec<Arc<Node>>,
}

/// Outcome of lexing one opaque token.
enum Lexed {
	Leaf(NodeKind, usize),
	/// Token ran into the end of the text and would absorb whatever follows,
	/// including a closer.
	Open(NodeKind, usize),
}

impl DelimiterGrammar {
	fn line_comment_prefix(&self, cur: &mut Cursor<'_>) -> Option<usize> {
		self.line_comments.iter().find(|p| cur.at(p)).map(|p| p.chars().count())
	}

	/// Lexes one token that cannot contain containers.
	fn lex_token(&self, cur: &mut Cursor<'_>, c: char) -> Lexed {
		let start = cur.pos;
		if let Some(prefix) = self.line_comment_prefix(cur) {
			cur.skip(prefix);
			cur.eat_while(|c| c != '\n' && c != '\r');
			if cur.peek().is_none() {
				return Lexed::Open(LINE_COMMENT, cur.pos - start);
			}
			return Lexed::Leaf(LINE_COMMENT, cur.pos - start);
		}
		if let Some((open, close)) = &self.block_comment
			&& cur.at(open)
		{
			cur.skip(open.chars().count());
			loop {
				if cur.at(close) {
					cur.skip(close.chars().count());
					return Lexed::Leaf(BLOCK_COMMENT, cur.pos - start);
				}
				if cur.bump().is_none() {
					return Lexed::Open(BLOCK_COMMENT, cur.pos - start);
				}
			}
		}
		match c {
			'"' => {
				cur.bump();
				loop {
					match cur.bump() {
						Some('"') => return Lexed::Leaf(STRING, cur.pos - start),
						Some('\\') => {
							if cur.bump().is_none() {
								return Lexed::Open(STRING, cur.pos - start);
							}
						}
						Some(_) => {}
						None => return Lexed::Open(STRING, cur.pos - start),
					}
				}
			}
			'\'' => {
				cur.bump();
				loop {
					match cur.peek() {
						Some('\'') => {
							cur.bump();
							return Lexed::Leaf(QUOTED, cur.pos - start);
						}
						Some('\n' | '\r') => return Lexed::Leaf(QUOTED, cur.pos - start),
						Some('\\') => {
							cur.bump();
							if cur.peek().is_some_and(|c| c != '\n' && c != '\r') {
								cur.bump();
							}
						}
						Some(_) => {
							cur.bump();
						}
						None => return Lexed::Open(QUOTED, cur.pos - start),
					}
				}
			}
			'\n' => {
				cur.bump();
				Lexed::Leaf(NEWLINE, 1)
			}
			'\r' => {
				cur.bump();
				if cur.peek() == Some('\n') {
					cur.bump();
				}
				Lexed::Leaf(NEWLINE, cur.pos - start)
			}
			c if is_blank(c) => {
				cur.eat_while(is_blank);
				Lexed::Leaf(WHITESPACE, cur.pos - start)
			}
			c if c.is_ascii_digit() => {
				cur.eat_while(is_word_char);
				Lexed::Leaf(NUMBER, cur.pos - start)
			}
			c if is_word_char(c) => {
				cur.eat_while(is_word_char);
				Lexed::Leaf(WORD, cur.pos - start)
			}
			_ => {
				cur.bump();
				Lexed::Leaf(PUNCT, 1)
			}
		}
	}
}

fn push_item(stack: &mut [Frame], items: &mut Vec<Arc<Node>>, node: Arc<Node>) {
	match stack.last_mut() {
		Some(frame) => frame.children.push(node),
		None => items.push(node),
	}
}

fn close_frame(stack: &mut Vec<Frame>, items: &mut Vec<Arc<Node>>, close: usize, stamp: Version) {
	if let Some(frame) = stack.pop() {
		let node = Node::container(frame.kind, 1, frame.children, close, stamp);
		push_item(stack, items, node);
	}
}

impl Grammar for DelimiterGrammar {
	fn name(&self) -> &'static str {
		"delimiter"
	}

	fn lookahead(&self) -> usize {
		let longest = self
			.line_comments
			.iter()
			.chain(self.block_comment.iter().map(|(open, _)| open))
			.map(|p| p.chars().count())
			.max()
			.unwrap_or(1);
		longest.saturating_sub(1).max(1)
	}

	fn kind_name(&self, kind: NodeKind) -> &'static str {
		match kind {
			NodeKind::ROOT => "root",
			NodeKind::TEXT => "text",
			WORD => "word",
			NUMBER => "number",
			WHITESPACE => "ws",
			NEWLINE => "nl",
			PUNCT => "punct",
			STRING => "string",
			QUOTED => "quoted",
			LINE_COMMENT => "line_comment",
			BLOCK_COMMENT => "block_comment",
			PAREN => "paren",
			BRACKET => "bracket",
			BRACE => "brace",
			ERROR => "error",
			_ => "unknown",
		}
	}

	fn parse_items(&self, text: RopeSlice<'_>, context: ParseContext, stamp: Version, cancel: &GenerationToken) -> Result<Parsed, StructureError> {
		let at_top = context.kind == NodeKind::ROOT;

		let mut cur = Cursor::new(text);
		let mut stack: Vec<Frame> = Vec::new();
		let mut items: Vec<Arc<Node>> = Vec::new();
		let mut settled = true;
		let mut steps = 0usize;

		while let Some(c) = cur.peek() {
			steps += 1;
			if steps % CANCEL_POLL_INTERVAL == 0 && cancel.is_cancelled() {
				return Err(StructureError::Cancelled);
			}

			if let Some((kind, closer)) = container_for(c) {
				if context.depth + stack.len() + 1 > self.max_depth {
					return Err(StructureError::TooDeep { limit: self.max_depth });
				}
				cur.bump();
				stack.push(Frame {
					kind,
					closer,
					children: Vec::new(),
				});
				continue;
			}

			if is_closer(c) {
				if let Some(target) = stack.iter().rposition(|f| f.closer == c) {
					cur.bump();
					while stack.len() > target + 1 {
						close_frame(&mut stack, &mut items, 0, stamp);
					}
					close_frame(&mut stack, &mut items, 1, stamp);
					continue;
				}
				if !at_top {
					// May close this container or one enclosing it.
					return Ok(Parsed { items, settled: false });
				}
				cur.bump();
				push_item(&mut stack, &mut items, Node::leaf(ERROR, 1, stamp));
				continue;
			}

			match self.lex_token(&mut cur, c) {
				Lexed::Leaf(kind, len) => push_item(&mut stack, &mut items, Node::leaf(kind, len, stamp)),
				Lexed::Open(kind, len) => {
					settled = false;
					push_item(&mut stack, &mut items, Node::leaf(kind, len, stamp));
				}
			}
		}

		if !stack.is_empty() {
			settled = false;
			while !stack.is_empty() {
				close_frame(&mut stack, &mut items, 0, stamp);
			}
		}

		Ok(Parsed { items, settled })
	}
}
