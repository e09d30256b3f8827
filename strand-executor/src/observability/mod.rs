//! Structured logging for sessions.
//!
//! Every run is wrapped in a `run` span and every op instance in an
//! `op_execution` span carrying the op, kernel, frame and iteration, so a
//! filter such as `strand_executor=debug` shows a loop unrolling iteration by
//! iteration. Turning on [`TracingConfig::op_spans`] adds a timing event when
//! each op span closes.
//!
//! # Example
//!
//! ```ignore
//! use strand_executor::observability::{LogFormat, TracingConfig, init_tracing};
//!
//! let _guard = init_tracing(TracingConfig::from_env())?;
//!
//! // or explicitly
//! let config = TracingConfig::default()
//!     .with_format(LogFormat::Json)
//!     .with_filter("info,strand_executor=debug");
//! let _guard = init_tracing(config)?;
//! ```

mod config;
mod tracing_setup;

pub use config::{LogFormat, TracingConfig};
pub use tracing_setup::{TracingGuard, init_tracing};

/// Span covering one op instance.
#[macro_export]
macro_rules! op_span {
    ($op:expr, $kernel:expr, $frame:expr, $iteration:expr) => {
        tracing::debug_span!(
            "op_execution",
            op = %$op,
            kernel = %$kernel,
            frame = %$frame,
            iteration = $iteration
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_quiet() {
        let config = TracingConfig::default();
        assert_eq!(config.filter, "info");
        assert_eq!(config.format, LogFormat::Compact);
        assert!(!config.op_spans);
        assert!(!config.location);
    }

    #[test]
    fn with_methods_override_fields() {
        let config = TracingConfig::default()
            .with_format(LogFormat::Json)
            .with_filter("strand_executor=trace")
            .with_op_spans(true)
            .with_ansi(false);

        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.filter, "strand_executor=trace");
        assert!(config.op_spans);
        assert!(!config.ansi);
    }

    #[test]
    fn log_format_parsing() {
        assert_eq!(" JSON ".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert_eq!("compact".parse::<LogFormat>().unwrap(), LogFormat::Compact);

        let err = "xml".parse::<LogFormat>().unwrap_err();
        assert_eq!(err.code(), "E801");
        assert!(err.to_string().contains("xml"));
    }

    #[test]
    fn format_names_round_trip() {
        for format in [LogFormat::Json, LogFormat::Pretty, LogFormat::Compact] {
            assert_eq!(format.as_str().parse::<LogFormat>().unwrap(), format);
        }
    }
}
