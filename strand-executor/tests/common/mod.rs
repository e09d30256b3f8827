//! Common test utilities for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use strand_core::testing::MockMemoryManager;
use strand_core::{Graph, Value};
use strand_executor::testing::RecordingListener;
use strand_executor::{Session, SessionConfig};
use strand_ops::KernelRegistry;

/// A session wired to a mock memory manager and a recording listener.
pub struct Harness {
    pub session: Session,
    pub memory: Arc<MockMemoryManager>,
    pub recorder: Arc<RecordingListener>,
}

/// Build a harness with the default configuration.
pub fn harness(graph: Graph) -> Harness {
    harness_with(graph, SessionConfig::default())
}

/// Build a harness with a custom configuration.
pub fn harness_with(graph: Graph, config: SessionConfig) -> Harness {
    let memory = Arc::new(MockMemoryManager::new());
    let recorder = Arc::new(RecordingListener::new());
    let mut session = Session::new(
        Arc::new(graph),
        Arc::new(KernelRegistry::with_defaults()),
        memory.clone(),
    )
    .with_config(config);
    session.add_listener(recorder.clone());
    Harness {
        session,
        memory,
        recorder,
    }
}

/// Feed map of scalar placeholders.
pub fn scalars(pairs: &[(&str, f64)]) -> HashMap<String, Value> {
    pairs
        .iter()
        .map(|&(name, v)| (name.to_string(), Value::scalar(v)))
        .collect()
}

/// `out = flag ? x + x : -x`
pub fn conditional() -> Graph {
    Graph::builder()
        .placeholder("x")
        .placeholder("flag")
        .switch("switch", "x", "flag", ["x_false", "x_true"])
        .op("negate", "neg", &["x_false"], &["neg_out"])
        .op("double", "add", &["x_true", "x_true"], &["double_out"])
        .merge("merge", ["neg_out", "double_out"], "out")
        .build()
        .unwrap()
}

/// `i = 0; while i < n { i = i + 1 }`, with the result in `i_final`.
pub fn counting_loop() -> Graph {
    Graph::builder()
        .placeholder("n")
        .constant("zero", Value::scalar(0.0))
        .constant("one", Value::scalar(1.0))
        .enter("enter_i", "zero", "body", "i_enter")
        .enter_constant("enter_n", "n", "body", "n_in")
        .enter_constant("enter_one", "one", "body", "one_in")
        .merge("merge_i", ["i_enter", "i_next"], "i")
        .op("cond", "less", &["i", "n_in"], &["keep_going"])
        .loop_cond("loop_cond", "keep_going", "p")
        .switch("switch_i", "i", "p", ["i_done", "i_body"])
        .op("body_add", "add", &["i_body", "one_in"], &["i_inc"])
        .next_iteration("next_i", "i_inc", "i_next")
        .exit("exit_i", "i_done", "i_final")
        .build()
        .unwrap()
}

/// Two nested loops:
///
/// ```text
/// j = 0
/// while j < 2 {
///     k = j
///     while k < 2 { k = k + 1 }
///     j = j + 1
/// }
/// ```
///
/// The outer increment waits on the inner loop through a control edge.
pub fn nested_loops() -> Graph {
    Graph::builder()
        .constant("zero", Value::scalar(0.0))
        .constant("one", Value::scalar(1.0))
        .constant("two", Value::scalar(2.0))
        // outer
        .enter("enter_j", "zero", "outer", "j_enter")
        .enter_constant("enter_two_o", "two", "outer", "two_o")
        .enter_constant("enter_one_o", "one", "outer", "one_o")
        .merge("merge_j", ["j_enter", "j_next"], "j")
        .op("less_j", "less", &["j", "two_o"], &["j_go"])
        .loop_cond("cond_j", "j_go", "j_p")
        .switch("switch_j", "j", "j_p", ["j_done", "j_body"])
        // inner
        .enter("enter_k", "j_body", "inner", "k_enter")
        .enter_constant("enter_two_i", "two_o", "inner", "two_i")
        .enter_constant("enter_one_i", "one_o", "inner", "one_i")
        .merge("merge_k", ["k_enter", "k_next"], "k")
        .op("less_k", "less", &["k", "two_i"], &["k_go"])
        .loop_cond("cond_k", "k_go", "k_p")
        .switch("switch_k", "k", "k_p", ["k_done", "k_body"])
        .op("inc_k", "add", &["k_body", "one_i"], &["k_inc"])
        .next_iteration("next_k", "k_inc", "k_next")
        .exit("exit_k", "k_done", "k_final")
        // back in outer
        .op("inc_j", "add", &["j_body", "one_o"], &["j_inc"])
        .control_dep("inc_j", "k_final")
        .next_iteration("next_j", "j_inc", "j_next")
        .exit("exit_j", "j_done", "j_final")
        .build()
        .unwrap()
}
