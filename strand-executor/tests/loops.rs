//! Integration tests for loop unrolling across frames and iterations.

mod common;

use strand_core::{ExecKind, FrameIter};

use common::{counting_loop, harness, nested_loops, scalars};

fn body(iteration: u32) -> FrameIter {
    FrameIter::new("body", iteration, Some(FrameIter::outer()))
}

#[test]
fn loop_runs_body_once_per_iteration() {
    let mut h = harness(counting_loop());

    let out = h
        .session
        .run(&["i_final"], scalars(&[("n", 3.0)]), &[])
        .unwrap();
    assert_eq!(out["i_final"].as_scalar(), Some(3.0));
    assert_eq!(h.recorder.iterations_of("body_add"), [0, 1, 2]);
    assert_eq!(h.recorder.iterations_of("cond"), [0, 1, 2, 3]);
    assert_eq!(h.recorder.iterations_of("merge_i"), [0, 1, 2, 3]);
    assert_eq!(h.recorder.iterations_of("exit_i"), [3]);
}

#[test]
fn next_iteration_runs_in_the_following_iteration() {
    let mut h = harness(counting_loop());

    h.session
        .run(&["i_final"], scalars(&[("n", 3.0)]), &[])
        .unwrap();
    assert_eq!(h.recorder.iterations_of("next_i"), [1, 2, 3]);
    assert_eq!(h.recorder.executions_of("next_i")[0], body(1));
}

#[test]
fn exit_value_is_the_last_body_output() {
    let mut h = harness(counting_loop());

    let out = h
        .session
        .run(&["i_final"], scalars(&[("n", 4.0)]), &[])
        .unwrap();
    let last = h.recorder.outputs_of("body_add").pop().unwrap();
    assert_eq!(last, vec![out["i_final"].as_scalar()]);
    assert_eq!(
        h.recorder.activations_of("i_final"),
        vec![FrameIter::outer()]
    );
}

#[test]
fn loop_invariants_enter_once() {
    let mut h = harness(counting_loop());

    h.session
        .run(&["i_final"], scalars(&[("n", 5.0)]), &[])
        .unwrap();
    assert_eq!(h.recorder.executions_of("enter_n"), vec![FrameIter::outer()]);
    assert_eq!(h.recorder.activations_of("n_in"), vec![body(0)]);
    assert_eq!(h.recorder.iterations_of("body_add").len(), 5);
}

#[test]
fn zero_trip_loop_exits_immediately() {
    let mut h = harness(counting_loop());

    let out = h
        .session
        .run(&["i_final"], scalars(&[("n", 0.0)]), &[])
        .unwrap();
    assert_eq!(out["i_final"].as_scalar(), Some(0.0));
    assert!(!h.recorder.executed("body_add"));
    assert!(
        h.session
            .is_satisfied(ExecKind::SwitchLeft, "switch_i", &body(0))
    );
    assert!(
        !h.session
            .is_satisfied(ExecKind::SwitchRight, "switch_i", &body(0))
    );
}

#[test]
fn loop_statistics_track_iterations() {
    let mut h = harness(counting_loop());

    h.session
        .run(&["i_final"], scalars(&[("n", 3.0)]), &[])
        .unwrap();
    let stats = h.session.last_report().unwrap().stats;
    assert_eq!(stats.max_iteration, 3);
    assert_eq!(stats.ops_executed, h.recorder.ops().len());
}

#[test]
fn session_reruns_with_new_trip_count() {
    let mut h = harness(counting_loop());

    let first = h
        .session
        .run(&["i_final"], scalars(&[("n", 2.0)]), &[])
        .unwrap();
    h.recorder.clear();
    let second = h
        .session
        .run(&["i_final"], scalars(&[("n", 4.0)]), &[])
        .unwrap();

    assert_eq!(first["i_final"].as_scalar(), Some(2.0));
    assert_eq!(second["i_final"].as_scalar(), Some(4.0));
    assert_eq!(h.recorder.iterations_of("body_add"), [0, 1, 2, 3]);
}

#[test]
fn nested_loops_track_parent_iterations() {
    let mut h = harness(nested_loops());

    let out = h.session.run(&["j_final"], Default::default(), &[]).unwrap();
    assert_eq!(out["j_final"].as_scalar(), Some(2.0));

    let outer = |j| FrameIter::new("outer", j, Some(FrameIter::outer()));
    let inner = |k, j| FrameIter::new("inner", k, Some(outer(j)));
    assert_eq!(
        h.recorder.executions_of("inc_k"),
        vec![inner(0, 0), inner(1, 0), inner(0, 1)]
    );
    assert_eq!(h.recorder.iterations_of("inc_j"), [0, 1]);
    assert_eq!(h.recorder.executions_of("exit_k"), vec![inner(2, 0), inner(1, 1)]);
}

#[test]
fn nested_loop_invariants_enter_once() {
    let mut h = harness(nested_loops());

    h.session.run(&["j_final"], Default::default(), &[]).unwrap();
    assert_eq!(h.recorder.executions_of("enter_two_i").len(), 1);
    assert_eq!(h.recorder.executions_of("enter_two_o").len(), 1);
    assert_eq!(h.recorder.executions_of("enter_k").len(), 2);
}
