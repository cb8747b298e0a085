//! End-to-end behaviour of buffer sessions.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use proptest::prelude::*;
use weft_editor_core::syntax::delimiter::kinds::BRACE;
use weft_editor_core::syntax::{AnalysisConfig, DelimiterGrammar, Grammar, Provenance};
use weft_editor_core::{BufferSession, SessionConfig, SessionHandle};
use weft_primitives::{AnchorId, Version};

fn grammar() -> Arc<dyn Grammar> {
	Arc::new(DelimiterGrammar::new())
}

fn quiet() -> SessionConfig {
	SessionConfig {
		analysis: AnalysisConfig {
			enabled: false,
			..AnalysisConfig::default()
		},
		..SessionConfig::default()
	}
}

fn settle(session: &BufferSession, version: Version) -> Arc<weft_editor_core::syntax::StructuralModel> {
	let runtime = tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap();
	runtime
		.block_on(async { tokio::time::timeout(Duration::from_secs(5), session.settled(version)).await })
		.expect("structure never settled")
		.expect("session closed")
}

const SOURCE: &str = "fn a() {\n    one();\n}\n\nfn b() {\n    two();\n}\n";

#[test]
fn editing_one_body_keeps_the_other_function() {
	let config = SessionConfig {
		analysis: AnalysisConfig {
			debounce_ms: 0,
			..AnalysisConfig::default()
		},
		..SessionConfig::default()
	};
	let mut session = BufferSession::open(SOURCE, grammar(), config);
	let before = settle(&session, session.version());
	let braces = |model: &weft_editor_core::syntax::StructuralModel| {
		model.root_node().children().iter().filter(|n| n.kind() == BRACE).cloned().collect::<Vec<_>>()
	};
	let old = braces(&before);

	let at = SOURCE.find("one").unwrap();
	let version = session.apply_edit(at..at + 3, "uno").unwrap();
	let after = settle(&session, version);
	assert_eq!(after.version(), version);
	assert_eq!(after.provenance(), Provenance::Incremental);

	let new = braces(&after);
	assert!(Arc::ptr_eq(&old[1], &new[1]));
	assert_eq!(new[1].id(), old[1].id());
	assert_eq!(new[1].stamp(), Version::INITIAL);
	assert_eq!(new[0].stamp(), version);
}

#[test]
fn handle_orders_edits_from_many_threads() {
	let handle = SessionHandle::open("", grammar(), quiet());
	let writers: Vec<_> = (0..4)
		.map(|_| {
			let handle = handle.clone();
			thread::spawn(move || {
				for _ in 0..25 {
					let (base, end) = handle.with(|session| (session.version(), session.snapshot().len_chars()));
					// Another writer may have moved the end since; rebasing follows it.
					handle.rebase_edit(base, end..end, "x").unwrap();
				}
			})
		})
		.collect();
	for writer in writers {
		writer.join().unwrap();
	}
	assert_eq!(handle.version(), Version::new(100));
	assert_eq!(handle.snapshot().len_chars(), 100);
	assert_eq!(handle.structure().version(), Version::new(100));
}

fn arb_script() -> impl Strategy<Value = (String, Vec<usize>, Vec<(usize, usize, String)>)> {
	(
		"[a-d\n]{0,40}",
		prop::collection::vec(any::<usize>(), 0..6),
		prop::collection::vec((any::<usize>(), 0usize..8, "[x-z\n]{0,5}"), 1..10),
	)
}

proptest! {
	#[test]
	fn undo_restores_content_and_anchors((initial, anchor_seeds, script) in arb_script()) {
		let mut session = BufferSession::open(&initial, grammar(), quiet());
		let len = initial.chars().count();
		let anchors: Vec<(AnchorId, usize)> = anchor_seeds
			.iter()
			.map(|seed| {
				let offset = seed % (len + 1);
				(session.create_anchor(offset).unwrap(), offset)
			})
			.collect();

		let mut applied = 0;
		for (seed, span, text) in script {
			let len = session.snapshot().len_chars();
			let start = seed % (len + 1);
			let end = (start + span).min(len);
			let before = session.version();
			if session.apply_edit(start..end, &text).unwrap() != before {
				applied += 1;
			}
			session.break_undo_group();
		}
		for _ in 0..applied {
			prop_assert!(session.undo().unwrap().is_some());
		}

		prop_assert_eq!(session.snapshot().to_string(), initial);
		for (id, offset) in anchors {
			prop_assert_eq!(session.resolve_anchor(id), Ok(offset));
		}
	}

	#[test]
	fn line_column_round_trips_across_edits(script in prop::collection::vec((any::<usize>(), 0usize..4, "[ab\r\n]{0,4}"), 1..12)) {
		let mut session = BufferSession::open("", grammar(), quiet());
		for (seed, span, text) in script {
			let len = session.snapshot().len_chars();
			let start = seed % (len + 1);
			session.apply_edit(start..(start + span).min(len), &text).unwrap();

			let version = session.version();
			for offset in 0..=session.snapshot().len_chars() {
				let pos = session.to_line_column(version, offset).unwrap();
				prop_assert_eq!(session.to_offset(version, pos), Ok(offset));
			}
		}
	}
}
