//! Integration tests for runs over graphs without control flow.
//!
//! Covers output selection, subgraph pruning, extra required variables and
//! release of intermediate arrays.

mod common;

use std::sync::Arc;
use strand_core::memory::DirectMemoryManager;
use strand_core::{ExecKind, FrameIter, Graph, Value};
use strand_executor::{Session, SessionState};
use strand_ops::KernelRegistry;

use common::{harness, scalars};

/// `d = -a + copy(a)`, plus an unrelated `e = a * w`.
fn diamond() -> Graph {
    Graph::builder()
        .placeholder("a")
        .variable("w", Value::scalar(4.0))
        .op("negate", "neg", &["a"], &["b"])
        .op("duplicate", "copy", &["a"], &["c"])
        .op("combine", "add", &["b", "c"], &["d"])
        .op("scale", "mul", &["a", "w"], &["e"])
        .build()
        .unwrap()
}

#[test]
fn identity_returns_fed_value() {
    let graph = Graph::builder()
        .placeholder("a")
        .op("id", "identity", &["a"], &["out"])
        .build()
        .unwrap();
    let mut h = harness(graph);

    let out = h.session.run(&["out"], scalars(&[("a", 5.0)]), &[]).unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out["out"].as_scalar(), Some(5.0));
    assert_eq!(h.memory.allocation_count(), 0);
}

#[test]
fn returns_exactly_the_requested_names() {
    let mut h = harness(diamond());

    let out = h
        .session
        .run(&["d", "b"], scalars(&[("a", 3.0)]), &[])
        .unwrap();
    let mut keys: Vec<&str> = out.keys().map(String::as_str).collect();
    keys.sort();
    assert_eq!(keys, ["b", "d"]);
    assert_eq!(out["b"].as_scalar(), Some(-3.0));
    assert_eq!(out["d"].as_scalar(), Some(0.0));
}

#[test]
fn ops_outside_the_request_do_not_run() {
    let mut h = harness(diamond());

    h.session.run(&["b"], scalars(&[("a", 1.0)]), &[]).unwrap();
    assert!(h.recorder.executed("negate"));
    assert!(!h.recorder.executed("duplicate"));
    assert!(!h.recorder.executed("combine"));
    assert!(!h.recorder.executed("scale"));
    assert_eq!(h.session.last_report().unwrap().stats.ops_executed, 1);
}

#[test]
fn extra_required_variables_run_but_are_not_returned() {
    let mut h = harness(diamond());

    let out = h
        .session
        .run(&["b"], scalars(&[("a", 2.0)]), &["e"])
        .unwrap();
    assert_eq!(out.len(), 1);
    assert!(h.recorder.executed("scale"));
    assert_eq!(h.recorder.outputs_of("scale"), vec![vec![Some(8.0)]]);
    assert!(h.session.last_report().unwrap().is_complete());
}

#[test]
fn leaves_can_be_requested_directly() {
    let mut h = harness(diamond());

    let out = h
        .session
        .run(&["a", "w"], scalars(&[("a", 7.0)]), &[])
        .unwrap();
    assert_eq!(out["a"].as_scalar(), Some(7.0));
    assert_eq!(out["w"].as_scalar(), Some(4.0));
    assert!(h.recorder.ops().is_empty());
}

#[test]
fn consumers_run_after_producers() {
    let mut h = harness(diamond());

    h.session.run(&["d"], scalars(&[("a", 1.0)]), &[]).unwrap();
    let ops = h.recorder.ops();
    assert_eq!(ops.len(), 3);
    assert_eq!(ops.last().map(String::as_str), Some("combine"));
    assert_eq!(h.recorder.pre_op_count(), 3);

    let outer = FrameIter::outer();
    for op in ["negate", "duplicate", "combine"] {
        assert!(h.session.is_satisfied(ExecKind::Op, op, &outer), "{op}");
    }
    assert!(h.session.is_satisfied(ExecKind::Placeholder, "a", &outer));
}

#[test]
fn execution_log_lists_leaves_and_ops() {
    let mut h = harness(diamond());

    h.session.run(&["d"], scalars(&[("a", 1.0)]), &[]).unwrap();
    let log = h.session.execution_log();
    assert_eq!(log.first().map(|s| s.kind), Some(ExecKind::Placeholder));
    assert_eq!(log.iter().filter(|s| s.kind == ExecKind::Op).count(), 3);
    assert!(log.iter().all(|s| s.frame.is_outer()));
}

#[test]
fn intermediates_are_released_once_consumed() {
    let memory = Arc::new(DirectMemoryManager::new());
    let mut session = Session::new(
        Arc::new(diamond()),
        Arc::new(KernelRegistry::with_defaults()),
        memory.clone(),
    );

    let out = session.run(&["d"], scalars(&[("a", 2.0)]), &[]).unwrap();
    assert_eq!(out["d"].as_scalar(), Some(0.0));
    assert_eq!(memory.allocation_count(), 3);
    assert_eq!(memory.release_count(), 2);
    assert_eq!(session.last_report().unwrap().stats.arrays_released, 2);

    assert_eq!(session.release_output("d").unwrap(), 1);
    assert_eq!(memory.release_count(), 3);
    assert_eq!(session.state(), SessionState::Done);
}
