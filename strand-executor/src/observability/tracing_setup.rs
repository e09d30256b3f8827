//! Subscriber installation.

use super::{LogFormat, TracingConfig};
use anyhow::{Context, Result};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

/// Proof that [`init_tracing`] installed the global subscriber.
#[must_use = "dropping the guard ends the logging scope"]
#[derive(Debug)]
pub struct TracingGuard {
    format: LogFormat,
}

impl TracingGuard {
    /// Format the installed subscriber writes.
    pub fn format(&self) -> LogFormat {
        self.format
    }
}

/// Install a global subscriber for `config`.
///
/// # Errors
///
/// Fails if the filter directives do not parse or a global subscriber is
/// already installed.
///
/// # Example
///
/// ```ignore
/// let _guard = init_tracing(TracingConfig::from_env().with_op_spans(true))?;
/// ```
pub fn init_tracing(config: TracingConfig) -> Result<TracingGuard> {
    let filter = EnvFilter::try_new(&config.filter)
        .with_context(|| format!("Invalid log filter {:?}", config.filter))?;

    tracing_subscriber::registry()
        .with(format_layer(&config))
        .with(filter)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    tracing::debug!(format = config.format.as_str(), op_spans = config.op_spans, "logging ready");
    Ok(TracingGuard {
        format: config.format,
    })
}

fn format_layer(config: &TracingConfig) -> Box<dyn Layer<Registry> + Send + Sync> {
    let span_events = if config.op_spans {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };
    let layer = fmt::layer()
        .with_ansi(config.ansi)
        .with_file(config.location)
        .with_line_number(config.location)
        .with_span_events(span_events);

    match config.format {
        LogFormat::Json => layer.json().flatten_event(true).boxed(),
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Compact => layer.compact().boxed(),
    }
}
