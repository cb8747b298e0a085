//! Structural model: an immutable tree of nested regions over a snapshot.
//!
//! Nodes store lengths, never absolute offsets. A node's span is derived
//! while walking from the root, so a subtree that did not change can be
//! shared verbatim between the model for version N and the model for N+1
//! even when text before it grew or shrank.

use std::fmt::{self, Write as _};
use std::ops::Range;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use weft_primitives::{CharIdx, CharLen, Version};

use crate::grammar::Grammar;

/// Kind of a node. Names come from the grammar that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKind(pub u16);

impl NodeKind {
	/// The document root.
	pub const ROOT: NodeKind = NodeKind(0);
	/// Flat unanalysed text, used by degenerate models.
	pub const TEXT: NodeKind = NodeKind(1);
	/// First kind value available to grammars.
	pub const FIRST_GRAMMAR_KIND: u16 = 16;
}

/// Process-unique node identity.
///
/// Reused subtrees keep their id; any re-derived node gets a fresh one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
	fn next() -> Self {
		static NEXT: AtomicU64 = AtomicU64::new(1);
		Self(NEXT.fetch_add(1, Ordering::Relaxed))
	}

	pub const fn get(self) -> u64 {
		self.0
	}
}

/// A region of the document.
///
/// Containers have an opening delimiter of `open` chars, children tiling
/// the interior exactly, and a closing delimiter of `close` chars (zero when
/// the container is unterminated). Leaves have no children.
#[derive(Debug)]
pub struct Node {
	kind: NodeKind,
	len: CharLen,
	open: CharLen,
	close: CharLen,
	children: Vec<Arc<Node>>,
	stamp: Version,
	id: NodeId,
}

impl Node {
	/// Creates a leaf covering `len` chars.
	pub fn leaf(kind: NodeKind, len: CharLen, stamp: Version) -> Arc<Node> {
		Arc::new(Node {
			kind,
			len,
			open: 0,
			close: 0,
			children: Vec::new(),
			stamp,
			id: NodeId::next(),
		})
	}

	/// Creates a container whose length is its delimiters plus its children.
	pub fn container(kind: NodeKind, open: CharLen, children: Vec<Arc<Node>>, close: CharLen, stamp: Version) -> Arc<Node> {
		let len = open + children.iter().map(|c| c.len).sum::<CharLen>() + close;
		Arc::new(Node {
			kind,
			len,
			open,
			close,
			children,
			stamp,
			id: NodeId::next(),
		})
	}

	/// Same delimiters and kind, new children, new identity.
	pub(crate) fn with_children(&self, children: Vec<Arc<Node>>, stamp: Version) -> Arc<Node> {
		Node::container(self.kind, self.open, children, self.close, stamp)
	}

	pub fn kind(&self) -> NodeKind {
		self.kind
	}

	pub fn len(&self) -> CharLen {
		self.len
	}

	pub fn is_empty(&self) -> bool {
		self.len == 0
	}

	/// Length of the opening delimiter.
	pub fn open_len(&self) -> CharLen {
		self.open
	}

	/// Length of the closing delimiter; zero for an unterminated container.
	pub fn close_len(&self) -> CharLen {
		self.close
	}

	pub fn children(&self) -> &[Arc<Node>] {
		&self.children
	}

	/// Version at which this node was last derived.
	pub fn stamp(&self) -> Version {
		self.stamp
	}

	pub fn id(&self) -> NodeId {
		self.id
	}

	/// Whether the node can hold children.
	pub fn is_container(&self) -> bool {
		self.open > 0 || self.close > 0 || !self.children.is_empty() || self.kind == NodeKind::ROOT
	}

	/// Structural equality: kinds, delimiters and lengths, ignoring stamps and ids.
	pub fn same_shape(&self, other: &Node) -> bool {
		self.kind == other.kind
			&& self.len == other.len
			&& self.open == other.open
			&& self.close == other.close
			&& self.children.len() == other.children.len()
			&& self.children.iter().zip(&other.children).all(|(a, b)| a.same_shape(b))
	}
}

impl Drop for Node {
	fn drop(&mut self) {
		// Unwind deep nesting iteratively instead of through recursive drops.
		let mut pending = std::mem::take(&mut self.children);
		while let Some(child) = pending.pop() {
			if let Some(mut node) = Arc::into_inner(child) {
				pending.append(&mut node.children);
			}
		}
	}
}

/// How a published model was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
	/// Placeholder published before the first derivation completes.
	Initial,
	/// Derived from scratch.
	Full,
	/// Derived by reusing the previous model.
	Incremental,
	/// The grammar failed; the model is a single flat text node.
	Degenerate,
}

/// An immutable structural model of one snapshot.
#[derive(Debug, Clone)]
pub struct StructuralModel {
	root: Arc<Node>,
	version: Version,
	provenance: Provenance,
}

impl StructuralModel {
	pub fn new(root: Arc<Node>, version: Version, provenance: Provenance) -> Self {
		Self {
			root,
			version,
			provenance,
		}
	}

	/// A root holding one flat `TEXT` node over `len` chars.
	pub fn degenerate(len: CharLen, version: Version, provenance: Provenance) -> Self {
		let children = if len == 0 {
			Vec::new()
		} else {
			vec![Node::leaf(NodeKind::TEXT, len, version)]
		};
		Self::new(Node::container(NodeKind::ROOT, 0, children, 0, version), version, provenance)
	}

	/// Snapshot version this model describes.
	pub fn version(&self) -> Version {
		self.version
	}

	pub fn provenance(&self) -> Provenance {
		self.provenance
	}

	/// Whether the model carries no structure beyond flat text.
	pub fn is_degenerate(&self) -> bool {
		matches!(self.provenance, Provenance::Initial | Provenance::Degenerate)
	}

	/// Length of the described text.
	pub fn len(&self) -> CharLen {
		self.root.len
	}

	pub fn is_empty(&self) -> bool {
		self.root.len == 0
	}

	pub fn root_node(&self) -> &Arc<Node> {
		&self.root
	}

	pub fn root(&self) -> NodeRef<'_> {
		NodeRef {
			node: &self.root,
			start: 0,
			depth: 0,
		}
	}

	/// Pre-order traversal of every node with absolute spans.
	pub fn walk(&self) -> Walk<'_> {
		Walk { stack: vec![self.root()] }
	}

	/// Deepest node whose span contains `offset`.
	///
	/// Spans are half-open, so an offset on a boundary belongs to the node
	/// starting there. The document end resolves to the root.
	pub fn node_at(&self, offset: CharIdx) -> Option<NodeRef<'_>> {
		self.ancestors_at(offset).pop()
	}

	/// Chain of nodes containing `offset`, from the root down.
	pub fn ancestors_at(&self, offset: CharIdx) -> Vec<NodeRef<'_>> {
		if offset > self.len() {
			return Vec::new();
		}
		let mut chain = vec![self.root()];
		loop {
			let Some(current) = chain.last() else { break };
			let next = current.children().find(|c| c.span().contains(&offset));
			match next {
				Some(child) => chain.push(child),
				None => break,
			}
		}
		chain
	}

	/// Renders the tree as an s-expression using the grammar's kind names.
	pub fn to_sexp(&self, grammar: &dyn Grammar) -> String {
		let mut out = String::new();
		write_sexp(&mut out, &self.root, grammar);
		out
	}
}

fn write_sexp(out: &mut String, node: &Node, grammar: &dyn Grammar) {
	let name = match node.kind {
		NodeKind::ROOT => "root",
		NodeKind::TEXT => "text",
		kind => grammar.kind_name(kind),
	};
	if node.children.is_empty() && node.kind != NodeKind::ROOT && node.open == 0 {
		let _ = write!(out, "{name}:{}", node.len);
		return;
	}
	let _ = write!(out, "({name}");
	if node.close == 0 && node.open > 0 {
		out.push('!');
	}
	for child in &node.children {
		out.push(' ');
		write_sexp(out, child, grammar);
	}
	out.push(')');
}

/// A node positioned in a model.
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
	node: &'a Arc<Node>,
	start: CharIdx,
	depth: usize,
}

impl<'a> NodeRef<'a> {
	pub fn node(&self) -> &'a Arc<Node> {
		self.node
	}

	pub fn kind(&self) -> NodeKind {
		self.node.kind
	}

	/// Absolute span including delimiters.
	pub fn span(&self) -> Range<CharIdx> {
		self.start..self.start + self.node.len
	}

	/// Absolute span between the delimiters.
	pub fn interior(&self) -> Range<CharIdx> {
		self.start + self.node.open..self.start + self.node.len - self.node.close
	}

	pub fn stamp(&self) -> Version {
		self.node.stamp
	}

	pub fn id(&self) -> NodeId {
		self.node.id
	}

	/// Distance from the root.
	pub fn depth(&self) -> usize {
		self.depth
	}

	pub fn is_leaf(&self) -> bool {
		self.node.children.is_empty()
	}

	/// Direct children with absolute spans.
	pub fn children(self) -> impl Iterator<Item = NodeRef<'a>> + 'a {
		let node: &'a Arc<Node> = self.node;
		let depth = self.depth + 1;
		node.children.iter().scan(self.start + node.open, move |at, child| {
			let start = *at;
			*at += child.len;
			Some(NodeRef { node: child, start, depth })
		})
	}
}

impl fmt::Debug for NodeRef<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("NodeRef")
			.field("kind", &self.node.kind)
			.field("span", &self.span())
			.field("depth", &self.depth)
			.field("stamp", &self.node.stamp)
			.finish()
	}
}

/// Iterator returned by [`StructuralModel::walk`].
pub struct Walk<'a> {
	stack: Vec<NodeRef<'a>>,
}

impl<'a> Iterator for Walk<'a> {
	type Item = NodeRef<'a>;

	fn next(&mut self) -> Option<Self::Item> {
		let current = self.stack.pop()?;
		let children: Vec<_> = current.children().collect();
		self.stack.extend(children.into_iter().rev());
		Some(current)
	}
}
