//! Integration test for subscriber installation.
//!
//! Kept in its own test binary because it installs the global subscriber.

mod common;

use strand_executor::observability::{LogFormat, TracingConfig, init_tracing};

use common::{counting_loop, harness, scalars};

#[test]
fn subscriber_installs_once_and_logs_a_run() {
    let config = TracingConfig::default()
        .with_format(LogFormat::Json)
        .with_filter("strand_executor=trace")
        .with_op_spans(true)
        .with_ansi(false);
    let guard = init_tracing(config.clone()).unwrap();
    assert_eq!(guard.format(), LogFormat::Json);

    let mut h = harness(counting_loop());
    let out = h
        .session
        .run(&["i_final"], scalars(&[("n", 2.0)]), &[])
        .unwrap();
    assert_eq!(out["i_final"].as_scalar(), Some(2.0));

    assert!(init_tracing(config).is_err());
}

#[test]
fn bad_filter_is_rejected() {
    let config = TracingConfig::default().with_filter("strand_executor=[");
    assert!(init_tracing(config).is_err());
}
