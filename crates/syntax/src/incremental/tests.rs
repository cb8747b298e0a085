use proptest::prelude::*;
use weft_primitives::Version;

use super::*;
use crate::delimiter::DelimiterGrammar;
use crate::delimiter::kinds::{BRACE, STRING};

fn analyzer() -> IncrementalAnalyzer {
	IncrementalAnalyzer::new(Arc::new(DelimiterGrammar::new()))
}

fn hash_comment_analyzer() -> IncrementalAnalyzer {
	IncrementalAnalyzer::new(Arc::new(DelimiterGrammar::new().with_line_comment("#")))
}

fn full(analyzer: &IncrementalAnalyzer, snap: &Snapshot) -> StructuralModel {
	analyzer.analyze(snap, &GenerationToken::detached()).unwrap().model
}

fn step(analyzer: &IncrementalAnalyzer, model: &StructuralModel, snap: &Snapshot, edit: Edit) -> (Snapshot, Derivation) {
	let (next, _) = snap.apply(&edit).unwrap();
	let derived = analyzer
		.on_edit(model, std::slice::from_ref(&edit), &next, &GenerationToken::detached())
		.unwrap();
	(next, derived)
}

fn assert_matches_full(analyzer: &IncrementalAnalyzer, model: &StructuralModel, snap: &Snapshot) {
	let expected = full(analyzer, snap);
	let grammar = analyzer.grammar().as_ref();
	assert!(
		model.root_node().same_shape(expected.root_node()),
		"incremental {} != full {}",
		model.to_sexp(grammar),
		expected.to_sexp(grammar)
	);
	assert_eq!(model.len(), snap.len_chars());
}

fn root_braces(model: &StructuralModel) -> Vec<Arc<Node>> {
	model.root_node().children().iter().filter(|n| n.kind() == BRACE).cloned().collect()
}

const TWO_FUNCTIONS: &str = "fn a() {\n    one();\n}\n\nfn b() {\n    two();\n}\n";

#[test]
fn test_damage_folds_sequential_edits() {
	let edits = [Edit::insert(2, "ab"), Edit::insert(4, "c"), Edit::delete(0..1)];
	assert_eq!(
		Damage::from_edits(&edits),
		Some(Damage {
			start: 0,
			old_end: 2,
			new_end: 4,
		})
	);
	assert_eq!(Damage::from_edits(&[Edit::insert(3, "")]), None);
}

#[test]
fn test_damage_tracks_deletions_past_previous_region() {
	let edits = [Edit::insert(1, "x"), Edit::delete(3..6)];
	let damage = Damage::from_edits(&edits).unwrap();
	assert_eq!(damage, Damage { start: 1, old_end: 5, new_end: 3 });
	assert_eq!(damage.delta(), -2);
}

#[test]
fn test_edit_in_one_body_keeps_sibling_function() {
	let analyzer = analyzer();
	let snap = Snapshot::new(TWO_FUNCTIONS);
	let model = full(&analyzer, &snap);
	let before = root_braces(&model);
	assert_eq!(before.len(), 2);

	let at = TWO_FUNCTIONS.find("one").unwrap();
	let (snap, derived) = step(&analyzer, &model, &snap, Edit::insert(at, "x"));
	assert_eq!(derived.stats.provenance, Provenance::Incremental);
	assert!(derived.stats.reparsed < snap.len_chars() / 2);

	let after = root_braces(&derived.model);
	assert!(Arc::ptr_eq(&before[1], &after[1]));
	assert_eq!(after[1].stamp(), Version::INITIAL);
	assert_eq!(after[1].id(), before[1].id());

	assert!(!Arc::ptr_eq(&before[0], &after[0]));
	assert_eq!(after[0].stamp(), snap.version());
	assert_eq!(derived.model.root_node().stamp(), snap.version());
	assert_matches_full(&analyzer, &derived.model, &snap);
}

#[test]
fn test_unchanged_neighbours_in_run_keep_identity() {
	let analyzer = analyzer();
	let snap = Snapshot::new("alpha beta gamma");
	let model = full(&analyzer, &snap);
	let old = model.root_node().children().to_vec();

	let (snap, derived) = step(&analyzer, &model, &snap, Edit::replace(6..10, "BETA"));
	let new = derived.model.root_node().children();
	assert!(Arc::ptr_eq(&old[0], &new[0]));
	assert!(Arc::ptr_eq(&old[1], &new[1]));
	assert!(!Arc::ptr_eq(&old[2], &new[2]));
	assert!(Arc::ptr_eq(&old[4], &new[4]));
	assert_matches_full(&analyzer, &derived.model, &snap);
}

#[test]
fn test_open_string_widens_to_document_end() {
	let analyzer = analyzer();
	let snap = Snapshot::new(TWO_FUNCTIONS);
	let model = full(&analyzer, &snap);

	let at = TWO_FUNCTIONS.find("one").unwrap();
	let (snap, derived) = step(&analyzer, &model, &snap, Edit::insert(at, "\""));
	assert!(derived.stats.widenings > 0);
	assert_matches_full(&analyzer, &derived.model, &snap);

	// Closing it again restores the function split.
	let at = snap.to_string().find("two").unwrap();
	let (snap, derived) = step(&analyzer, &derived.model, &snap, Edit::insert(at, "\""));
	assert_matches_full(&analyzer, &derived.model, &snap);
}

#[test]
fn test_stray_closer_restructures_parent() {
	let analyzer = analyzer();
	let text = "{ a { b } c } d";
	let snap = Snapshot::new(text);
	let model = full(&analyzer, &snap);

	let (snap, derived) = step(&analyzer, &model, &snap, Edit::insert(7, "}"));
	assert_matches_full(&analyzer, &derived.model, &snap);

	let (snap, derived) = step(&analyzer, &derived.model, &snap, Edit::delete(7..8));
	assert_matches_full(&analyzer, &derived.model, &snap);
	assert_eq!(snap, text);
}

#[test]
fn test_comment_reaching_closer_swallows_it() {
	let analyzer = analyzer();
	let snap = Snapshot::new("{// a\n}");
	let model = full(&analyzer, &snap);
	assert_eq!(root_braces(&model).len(), 1);

	let (snap, derived) = step(&analyzer, &model, &snap, Edit::delete(5..6));
	assert_matches_full(&analyzer, &derived.model, &snap);
	let brace = &root_braces(&derived.model)[0];
	assert_eq!(brace.close_len(), 0);
	assert_eq!(brace.len(), 6);

	let (snap, derived) = step(&analyzer, &derived.model, &snap, Edit::insert(5, "\n"));
	assert_matches_full(&analyzer, &derived.model, &snap);
	assert_eq!(root_braces(&derived.model)[0].close_len(), 1);
}

#[test]
fn test_hash_comment_after_deleted_carriage_return() {
	let analyzer = hash_comment_analyzer();
	let snap = Snapshot::new("{# \ra}\\ ");
	let model = full(&analyzer, &snap);

	let (snap, derived) = step(&analyzer, &model, &snap, Edit::delete(2..4));
	assert_eq!(snap, "{#a}\\ ");
	assert_matches_full(&analyzer, &derived.model, &snap);
}

#[test]
fn test_deleting_opener_and_retyping_it() {
	let analyzer = analyzer();
	let snap = Snapshot::new("x (a [b] c) y");
	let model = full(&analyzer, &snap);

	let (snap, derived) = step(&analyzer, &model, &snap, Edit::delete(2..3));
	assert_matches_full(&analyzer, &derived.model, &snap);
	let (snap, derived) = step(&analyzer, &derived.model, &snap, Edit::insert(2, "("));
	assert_matches_full(&analyzer, &derived.model, &snap);
}

#[test]
fn test_growing_an_empty_document() {
	let analyzer = analyzer();
	let snap = Snapshot::new("");
	let model = full(&analyzer, &snap);
	assert!(model.root_node().children().is_empty());

	let (snap, derived) = step(&analyzer, &model, &snap, Edit::insert(0, "{}"));
	assert_matches_full(&analyzer, &derived.model, &snap);
	let (snap, derived) = step(&analyzer, &derived.model, &snap, Edit::insert(1, "\"s\""));
	assert_matches_full(&analyzer, &derived.model, &snap);
	let node = derived.model.node_at(2).unwrap();
	assert_eq!(node.kind(), STRING);
	assert_eq!(node.span(), 1..4);
}

#[test]
fn test_grammar_failure_degrades_then_recovers() {
	let analyzer = IncrementalAnalyzer::new(Arc::new(DelimiterGrammar::new().with_max_depth(3)));
	let snap = Snapshot::new("((a))");
	let model = full(&analyzer, &snap);
	assert_eq!(model.provenance(), Provenance::Full);

	let (snap, derived) = step(&analyzer, &model, &snap, Edit::insert(2, "(("));
	assert_eq!(derived.stats.provenance, Provenance::Degenerate);
	let root = derived.model.root_node();
	assert_eq!(root.children().len(), 1);
	assert_eq!(root.children()[0].kind(), NodeKind::TEXT);
	assert_eq!(root.children()[0].len(), snap.len_chars());

	let (_, derived) = step(&analyzer, &derived.model, &snap, Edit::delete(2..4));
	assert_eq!(derived.stats.provenance, Provenance::Full);
}

#[test]
fn test_mismatched_model_falls_back_to_full() {
	let analyzer = analyzer();
	let model = full(&analyzer, &Snapshot::new("abc"));
	let other = Snapshot::new("a much longer document");
	let derived = analyzer
		.on_edit(&model, &[Edit::insert(0, "x")], &other, &GenerationToken::detached())
		.unwrap();
	assert_eq!(derived.stats.provenance, Provenance::Full);
	assert_matches_full(&analyzer, &derived.model, &other);
}

#[test]
fn test_cancelled_derivation_reports_cancellation() {
	let analyzer = analyzer();
	let snap = Snapshot::new(&"{ x } ".repeat(2_000));
	let cancel = GenerationToken::detached();
	cancel.cancel();
	assert_eq!(analyzer.analyze(&snap, &cancel).unwrap_err(), StructureError::Cancelled);
}

#[test]
fn test_queries_over_derived_model() {
	let analyzer = analyzer();
	let snap = Snapshot::new("a { b ( c ) }");
	let model = full(&analyzer, &snap);

	let chain = model.ancestors_at(8);
	let kinds: Vec<_> = chain.iter().map(|n| analyzer.grammar().kind_name(n.kind())).collect();
	assert_eq!(kinds, vec!["root", "brace", "paren", "word"]);
	assert_eq!(chain[2].interior(), 7..10);
	assert_eq!(chain[3].depth(), 3);

	assert_eq!(model.node_at(snap.len_chars()).unwrap().kind(), NodeKind::ROOT);
	assert!(model.node_at(snap.len_chars() + 1).is_none());

	let spans: Vec<_> = model.walk().filter(|n| n.kind() == BRACE).map(|n| n.span()).collect();
	assert_eq!(spans, vec![2..13]);
	assert_eq!(model.walk().count(), 1 + 3 + 5 + 3);
}

fn arb_edit_script() -> impl Strategy<Value = (String, Vec<(usize, usize, String)>)> {
	let alphabet = "[a-c (){}\\[\\]\"'\\\\/*#\r\n]";
	(
		proptest::string::string_regex(&format!("{alphabet}{{0,60}}")).unwrap(),
		prop::collection::vec(
			(
				any::<usize>(),
				0usize..6,
				proptest::string::string_regex(&format!("{alphabet}{{0,4}}")).unwrap(),
			),
			1..12,
		),
	)
}

proptest! {
	#![proptest_config(ProptestConfig::with_cases(1024))]

	#[test]
	fn prop_incremental_matches_full_parse((initial, script) in arb_edit_script()) {
		let analyzer = hash_comment_analyzer();
		let mut snap = Snapshot::new(&initial);
		let mut model = full(&analyzer, &snap);
		for (seed, len, text) in script {
			let start = seed % (snap.len_chars() + 1);
			let end = (start + len).min(snap.len_chars());
			let (next, derived) = step(&analyzer, &model, &snap, Edit::replace(start..end, text));
			let expected = full(&analyzer, &next);
			prop_assert!(
				derived.model.root_node().same_shape(expected.root_node()),
				"{:?}: {} != {}",
				next.to_string(),
				derived.model.to_sexp(analyzer.grammar().as_ref()),
				expected.to_sexp(analyzer.grammar().as_ref())
			);
			snap = next;
			model = derived.model;
		}
	}
}
