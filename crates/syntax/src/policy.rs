use std::time::Duration;

use serde::Deserialize;

/// Default quiet period after an edit before re-derivation starts.
pub const DEFAULT_DEBOUNCE_MS: u64 = 80;

/// Default cap on queued edits before falling back to a full derivation.
pub const DEFAULT_MAX_PENDING_EDITS: usize = 256;

/// Scheduling policy for background structural analysis.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
	/// When false, no background work runs and the published model stays
	/// flat, advancing its version with every edit.
	pub enabled: bool,
	/// Time to wait after the latest edit before re-deriving, in milliseconds.
	///
	/// Edits replayed from history skip the wait.
	pub debounce_ms: u64,
	/// Queued edits beyond this count are dropped and the next derivation
	/// starts from scratch.
	pub max_pending_edits: usize,
}

impl Default for AnalysisConfig {
	fn default() -> Self {
		Self {
			enabled: true,
			debounce_ms: DEFAULT_DEBOUNCE_MS,
			max_pending_edits: DEFAULT_MAX_PENDING_EDITS,
		}
	}
}

impl AnalysisConfig {
	pub fn debounce(&self) -> Duration {
		Duration::from_millis(self.debounce_ms)
	}
}
