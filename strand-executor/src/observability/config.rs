//! Logging configuration.

use crate::config::parse_flag;
use std::io::IsTerminal;
use std::str::FromStr;
use strand_core::error::StrandError;

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per event, span fields flattened.
    Json,
    /// Multi-line human-readable output.
    Pretty,
    /// One line per event.
    #[default]
    Compact,
}

impl LogFormat {
    /// Name accepted by `STRAND_LOG_FORMAT`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Pretty => "pretty",
            Self::Compact => "compact",
        }
    }
}

impl FromStr for LogFormat {
    type Err = StrandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            other => Err(StrandError::ConfigValue {
                field: "log_format".to_string(),
                cause: format!("unknown format {other:?}, expected json, pretty or compact"),
            }),
        }
    }
}

/// How session logs are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingConfig {
    /// Output format.
    pub format: LogFormat,
    /// `EnvFilter` directives, e.g. `"info,strand_executor=debug"`.
    pub filter: String,
    /// Emit a close event, with busy and idle time, for every op span.
    pub op_spans: bool,
    /// Include file and line of each event.
    pub location: bool,
    /// Colour the output.
    pub ansi: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: "info".to_string(),
            op_spans: false,
            location: false,
            ansi: true,
        }
    }
}

impl TracingConfig {
    /// Create configuration from environment variables.
    ///
    /// - `STRAND_LOG_FORMAT`: `json`, `pretty` or `compact`. When unset or
    ///   unknown, `pretty` on a terminal and `json` otherwise.
    /// - `STRAND_LOG_LEVEL`, then `RUST_LOG`: filter directives
    /// - `STRAND_LOG_OP_SPANS`: timing events for every op instance
    /// - `STRAND_LOG_LOCATION`: file and line of each event
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let terminal = std::io::stdout().is_terminal();

        let format = std::env::var("STRAND_LOG_FORMAT")
            .ok()
            .and_then(|s| s.parse::<LogFormat>().ok())
            .unwrap_or(if terminal {
                LogFormat::Pretty
            } else {
                LogFormat::Json
            });

        let filter = std::env::var("STRAND_LOG_LEVEL")
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(defaults.filter);

        let op_spans = std::env::var("STRAND_LOG_OP_SPANS")
            .ok()
            .and_then(|s| parse_flag(&s))
            .unwrap_or(defaults.op_spans);

        let location = std::env::var("STRAND_LOG_LOCATION")
            .ok()
            .and_then(|s| parse_flag(&s))
            .unwrap_or(defaults.location);

        Self {
            format,
            filter,
            op_spans,
            location,
            ansi: terminal,
        }
    }

    /// Set the output format.
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the filter directives.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    /// Set whether op spans emit timing events.
    pub fn with_op_spans(mut self, enabled: bool) -> Self {
        self.op_spans = enabled;
        self
    }

    /// Set whether events carry their source location.
    pub fn with_location(mut self, enabled: bool) -> Self {
        self.location = enabled;
        self
    }

    /// Set whether output is coloured.
    pub fn with_ansi(mut self, enabled: bool) -> Self {
        self.ansi = enabled;
        self
    }
}
