//! Counters for background structural analysis.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::incremental::DerivationStats;
use crate::node::Provenance;

/// Smoothing factor for the duration moving average.
/// alpha = 2 / (N + 1). For N=10, alpha ~= 0.18.
const EMA_ALPHA: f64 = 0.2;

#[derive(Debug, Clone, Copy, Default)]
struct Ema {
	value: f64,
	initialized: bool,
}

impl Ema {
	fn update(&mut self, next: f64) {
		if self.initialized {
			self.value = EMA_ALPHA * next + (1.0 - EMA_ALPHA) * self.value;
		} else {
			self.value = next;
			self.initialized = true;
		}
	}
}

/// Live counters, updated from the scheduler and derivation threads.
#[derive(Debug, Default)]
pub struct AnalysisMetrics {
	started: AtomicU64,
	completed: AtomicU64,
	cancelled: AtomicU64,
	failed: AtomicU64,
	full: AtomicU64,
	incremental: AtomicU64,
	degenerate: AtomicU64,
	reparsed_chars: AtomicU64,
	last_duration_us: AtomicU64,
	duration_ms: Mutex<Ema>,
}

/// Point-in-time copy of [`AnalysisMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MetricsSnapshot {
	/// Derivations handed to the blocking pool.
	pub started: u64,
	/// Derivations that ran to completion without being abandoned.
	pub completed: u64,
	/// Derivations abandoned because a newer edit arrived.
	pub cancelled: u64,
	/// Derivations that panicked or reported a grammar failure.
	pub failed: u64,
	/// Published models, by provenance.
	pub full: u64,
	pub incremental: u64,
	pub degenerate: u64,
	/// Chars handed to the grammar across all completed derivations.
	pub reparsed_chars: u64,
	pub last_duration: Duration,
	/// Moving average of derivation time.
	pub avg_duration: Duration,
}

impl AnalysisMetrics {
	pub fn new() -> Self {
		Self::default()
	}

	pub(crate) fn record_started(&self) {
		self.started.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_cancelled(&self) {
		self.cancelled.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failed(&self) {
		self.failed.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_published(&self, provenance: Provenance) {
		let counter = match provenance {
			Provenance::Full | Provenance::Initial => &self.full,
			Provenance::Incremental => &self.incremental,
			Provenance::Degenerate => &self.degenerate,
		};
		counter.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_completed(&self, stats: &DerivationStats, elapsed: Duration) {
		self.completed.fetch_add(1, Ordering::Relaxed);
		self.reparsed_chars.fetch_add(stats.reparsed as u64, Ordering::Relaxed);
		self.last_duration_us
			.store(u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX), Ordering::Relaxed);
		self.duration_ms.lock().update(elapsed.as_secs_f64() * 1000.0);
	}

	pub fn snapshot(&self) -> MetricsSnapshot {
		MetricsSnapshot {
			started: self.started.load(Ordering::Relaxed),
			completed: self.completed.load(Ordering::Relaxed),
			cancelled: self.cancelled.load(Ordering::Relaxed),
			failed: self.failed.load(Ordering::Relaxed),
			full: self.full.load(Ordering::Relaxed),
			incremental: self.incremental.load(Ordering::Relaxed),
			degenerate: self.degenerate.load(Ordering::Relaxed),
			reparsed_chars: self.reparsed_chars.load(Ordering::Relaxed),
			last_duration: Duration::from_micros(self.last_duration_us.load(Ordering::Relaxed)),
			avg_duration: Duration::from_secs_f64(self.duration_ms.lock().value / 1000.0),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn stats(provenance: Provenance, reparsed: usize) -> DerivationStats {
		DerivationStats {
			provenance,
			reparsed,
			widenings: 0,
		}
	}

	#[test]
	fn test_counters_follow_provenance() {
		let metrics = AnalysisMetrics::new();
		metrics.record_started();
		metrics.record_completed(&stats(Provenance::Full, 100), Duration::from_millis(4));
		metrics.record_published(Provenance::Full);
		metrics.record_started();
		metrics.record_completed(&stats(Provenance::Incremental, 7), Duration::from_millis(2));
		metrics.record_published(Provenance::Incremental);
		metrics.record_started();
		metrics.record_cancelled();

		let snap = metrics.snapshot();
		assert_eq!(snap.started, 3);
		assert_eq!(snap.completed, 2);
		assert_eq!(snap.cancelled, 1);
		assert_eq!((snap.full, snap.incremental, snap.degenerate), (1, 1, 0));
		assert_eq!(snap.reparsed_chars, 107);
		assert_eq!(snap.last_duration, Duration::from_millis(2));
	}

	#[test]
	fn test_failure_alone_publishes_nothing() {
		let metrics = AnalysisMetrics::new();
		metrics.record_started();
		metrics.record_failed();
		let snap = metrics.snapshot();
		assert_eq!((snap.failed, snap.degenerate), (1, 0));

		metrics.record_published(Provenance::Degenerate);
		assert_eq!(metrics.snapshot().degenerate, 1);
	}

	#[test]
	fn test_average_is_smoothed() {
		let metrics = AnalysisMetrics::new();
		metrics.record_completed(&stats(Provenance::Full, 0), Duration::from_millis(10));
		metrics.record_completed(&stats(Provenance::Full, 0), Duration::from_millis(20));
		let avg = metrics.snapshot().avg_duration.as_secs_f64() * 1000.0;
		assert!((avg - 12.0).abs() < 1e-6, "avg was {avg}");
	}
}
