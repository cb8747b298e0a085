use std::sync::atomic::{AtomicU64, Ordering};

use tokio_util::sync::CancellationToken;

/// Numbers the derivation jobs of one document.
///
/// Each job gets a token carrying its generation; a newer edit cancels the
/// token of the job in flight, and the generation tells the finished job
/// apart from its successors.
#[derive(Debug, Default)]
pub struct GenerationClock {
	last: AtomicU64,
}

impl GenerationClock {
	/// Creates a clock whose first issued generation is 1.
	pub fn new() -> Self {
		Self::default()
	}

	/// Issues a token for the next job. Cancelling `scope` cancels the
	/// token too, but not the other way round.
	pub fn issue(&self, scope: &CancellationToken) -> GenerationToken {
		let generation = self.last.fetch_add(1, Ordering::AcqRel).wrapping_add(1);
		GenerationToken::new(generation, scope.child_token())
	}

	/// Most recently issued generation, 0 before the first.
	pub fn latest(&self) -> u64 {
		self.last.load(Ordering::Acquire)
	}
}

/// Generation-scoped cancellation token for one derivation job.
///
/// Cancellation is cooperative: long-running work polls
/// [`is_cancelled`](Self::is_cancelled) and returns early.
#[derive(Debug, Clone)]
pub struct GenerationToken {
	generation: u64,
	cancel: CancellationToken,
}

impl GenerationToken {
	pub fn new(generation: u64, cancel: CancellationToken) -> Self {
		Self { generation, cancel }
	}

	/// Creates a token that is never cancelled unless [`cancel`](Self::cancel) is called.
	pub fn detached() -> Self {
		Self::new(0, CancellationToken::new())
	}

	pub const fn generation(&self) -> u64 {
		self.generation
	}

	/// Returns true when cancellation is requested.
	pub fn is_cancelled(&self) -> bool {
		self.cancel.is_cancelled()
	}

	/// Requests cancellation.
	pub fn cancel(&self) {
		self.cancel.cancel();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_generations_increase() {
		let clock = GenerationClock::new();
		let scope = CancellationToken::new();
		assert_eq!(clock.latest(), 0);
		assert_eq!(clock.issue(&scope).generation(), 1);
		assert_eq!(clock.issue(&scope).generation(), 2);
		assert_eq!(clock.latest(), 2);
	}

	#[test]
	fn test_scope_cancels_issued_tokens_only_downwards() {
		let clock = GenerationClock::new();
		let scope = CancellationToken::new();
		let first = clock.issue(&scope);
		let second = clock.issue(&scope);

		first.cancel();
		assert!(!scope.is_cancelled());
		assert!(!second.is_cancelled());

		scope.cancel();
		assert!(second.is_cancelled());
	}

	#[test]
	fn test_detached_token_cancels_on_request() {
		let token = GenerationToken::detached();
		let clone = token.clone();
		assert!(!clone.is_cancelled());
		token.cancel();
		assert!(clone.is_cancelled());
	}
}
