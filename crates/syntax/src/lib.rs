//! Structural analysis for weft buffers.
//!
//! A [`Grammar`] turns text into nested regions. The [`IncrementalAnalyzer`]
//! keeps a [`StructuralModel`] in step with edits by re-deriving only the
//! damaged part of the tree, and the [`StructureWorker`] runs that work in
//! the background and publishes each finished model atomically.

/// Reference bracket grammar.
pub mod delimiter;
/// The grammar seam.
pub mod grammar;
/// Incremental re-derivation.
pub mod incremental;
/// Analysis counters.
pub mod metrics;
/// The structural model and its queries.
pub mod node;
/// Scheduling configuration.
pub mod policy;
/// Background derivation and publication.
pub mod scheduler;

pub use delimiter::DelimiterGrammar;
pub use grammar::{Grammar, ParseContext, Parsed, StructureError};
pub use incremental::{Damage, Derivation, DerivationStats, IncrementalAnalyzer};
pub use metrics::{AnalysisMetrics, MetricsSnapshot};
pub use node::{Node, NodeId, NodeKind, NodeRef, Provenance, StructuralModel, Walk};
pub use policy::AnalysisConfig;
pub use scheduler::{StructureReader, StructureWorker};
