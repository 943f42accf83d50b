//! Subscriber setup for portwire's tracing events
//!
//! Every event the resolver emits uses the `portwire` target, so the
//! engine's output can be isolated from the host application's.
//!
//! # Features
//!
//! - `logging` - Emit resolution and disposal events (default)
//! - `logging-json` - JSON structured output for production
//! - `logging-pretty` - Human-readable output for development
//!
//! Setting `PORTWIRE_LOG` (an `EnvFilter` directive such as
//! `portwire=trace`) overrides the level and target chosen in code.
//!
//! # Example
//!
//! ```rust,ignore
//! use portwire::logging;
//!
//! logging::init();
//!
//! // Or pick the output explicitly
//! logging::builder()
//!     .trace()
//!     .portwire_only()
//!     .pretty()
//!     .init();
//! ```

use tracing::Level;

/// Target used by every event this crate emits
pub const TARGET: &str = "portwire";

/// Environment variable holding a filter directive that overrides the builder
pub const ENV_VAR: &str = "PORTWIRE_LOG";

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// JSON structured logging (production default)
    #[default]
    Json,
    /// Multi-line, human-readable output
    Pretty,
    /// Compact single-line output
    Compact,
}

/// Builder for the global subscriber
#[derive(Debug, Clone)]
pub struct LoggingBuilder {
    level: Level,
    format: LogFormat,
    target: Option<&'static str>,
    env_override: bool,
    with_file: bool,
    with_line_number: bool,
    with_thread_ids: bool,
    with_thread_names: bool,
}

impl Default for LoggingBuilder {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            format: LogFormat::Json,
            target: None,
            env_override: true,
            with_file: false,
            with_line_number: false,
            with_thread_ids: false,
            with_thread_names: false,
        }
    }
}

impl LoggingBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the minimum log level
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Cache hits and dependency recursion included
    pub fn trace(self) -> Self {
        self.with_level(Level::TRACE)
    }

    /// Resolver, scope and instance lifecycle
    pub fn debug(self) -> Self {
        self.with_level(Level::DEBUG)
    }

    pub fn info(self) -> Self {
        self.with_level(Level::INFO)
    }

    /// Finalizer failures only
    pub fn warn(self) -> Self {
        self.with_level(Level::WARN)
    }

    pub fn error(self) -> Self {
        self.with_level(Level::ERROR)
    }

    /// Only show events from one target
    pub fn with_target_filter(mut self, target: &'static str) -> Self {
        self.target = Some(target);
        self
    }

    /// Only show portwire's own events
    pub fn portwire_only(self) -> Self {
        self.with_target_filter(TARGET)
    }

    /// Ignore `PORTWIRE_LOG` even when it is set
    pub fn ignore_env(mut self) -> Self {
        self.env_override = false;
        self
    }

    pub fn with_file(mut self) -> Self {
        self.with_file = true;
        self
    }

    pub fn with_line_number(mut self) -> Self {
        self.with_line_number = true;
        self
    }

    pub fn with_thread_ids(mut self) -> Self {
        self.with_thread_ids = true;
        self
    }

    pub fn with_thread_names(mut self) -> Self {
        self.with_thread_names = true;
        self
    }

    pub fn json(mut self) -> Self {
        self.format = LogFormat::Json;
        self
    }

    pub fn pretty(mut self) -> Self {
        self.format = LogFormat::Pretty;
        self
    }

    pub fn compact(mut self) -> Self {
        self.format = LogFormat::Compact;
        self
    }

    /// The `EnvFilter` directive this builder produces without `PORTWIRE_LOG`
    pub fn filter_directive(&self) -> String {
        let level = self.level.as_str().to_ascii_lowercase();
        match self.target {
            Some(target) => format!("{target}={level}"),
            None => level,
        }
    }

    /// Install the global subscriber.
    ///
    /// Fails if a global subscriber is already installed.
    #[cfg(any(feature = "logging-json", feature = "logging-pretty"))]
    pub fn try_init(self) -> Result<(), tracing_subscriber::util::TryInitError> {
        use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, prelude::*};

        let filter = if self.env_override {
            EnvFilter::try_from_env(ENV_VAR)
                .unwrap_or_else(|_| EnvFilter::new(self.filter_directive()))
        } else {
            EnvFilter::new(self.filter_directive())
        };

        let base = fmt::layer()
            .with_file(self.with_file)
            .with_line_number(self.with_line_number)
            .with_thread_ids(self.with_thread_ids)
            .with_thread_names(self.with_thread_names)
            .with_target(true);

        let layer: Box<dyn Layer<Registry> + Send + Sync> = match self.format {
            #[cfg(feature = "logging-json")]
            LogFormat::Json => base.json().boxed(),
            // Without the json feature, JSON falls back to the default formatter
            #[cfg(not(feature = "logging-json"))]
            LogFormat::Json => base.boxed(),
            LogFormat::Pretty => base.pretty().boxed(),
            LogFormat::Compact => base.compact().boxed(),
        };

        tracing_subscriber::registry().with(layer).with(filter).try_init()
    }

    /// Install the global subscriber, leaving an existing one in place.
    #[cfg(any(feature = "logging-json", feature = "logging-pretty"))]
    pub fn init(self) {
        let _ = self.try_init();
    }

    /// No-op: requires `logging-json` or `logging-pretty`
    #[cfg(not(any(feature = "logging-json", feature = "logging-pretty")))]
    pub fn init(self) {}
}

pub fn builder() -> LoggingBuilder {
    LoggingBuilder::new()
}

/// Initialize logging with default settings.
///
/// JSON when `logging-json` is enabled, otherwise pretty when
/// `logging-pretty` is.
pub fn init() {
    #[cfg(feature = "logging-json")]
    init_json();
    #[cfg(all(feature = "logging-pretty", not(feature = "logging-json")))]
    init_pretty();
}

/// JSON structured logging at DEBUG.
///
/// # Example output
/// ```json
/// {"timestamp":"2026-01-01T00:00:00.000Z","level":"DEBUG","fields":{"message":"Creating child scope","parent_id":1,"scope_id":2,"depth":1},"target":"portwire"}
/// ```
pub fn init_json() {
    builder().json().debug().init();
}

/// Pretty logging at DEBUG.
///
/// # Example output
/// ```text
///   2026-01-01T00:00:00.000Z DEBUG portwire: Instance created and cached, port: "Logger", order: 0, finalizer: false
/// ```
pub fn init_pretty() {
    builder().pretty().debug().init();
}

/// Only portwire's events, at DEBUG
pub fn init_portwire_only() {
    builder().portwire_only().debug().init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let builder = LoggingBuilder::default();
        assert_eq!(builder.level, Level::DEBUG);
        assert_eq!(builder.format, LogFormat::Json);
        assert!(builder.target.is_none());
        assert!(builder.env_override);
        assert_eq!(builder.filter_directive(), "debug");
    }

    #[test]
    fn test_builder_chain() {
        let builder = LoggingBuilder::new()
            .trace()
            .pretty()
            .with_file()
            .with_line_number()
            .portwire_only()
            .ignore_env();

        assert_eq!(builder.level, Level::TRACE);
        assert_eq!(builder.format, LogFormat::Pretty);
        assert!(builder.with_file);
        assert!(builder.with_line_number);
        assert!(!builder.env_override);
        assert_eq!(builder.target, Some("portwire"));
        assert_eq!(builder.filter_directive(), "portwire=trace");
    }

    #[test]
    fn test_custom_target_filter() {
        let builder = builder().warn().with_target_filter("my_app");
        assert_eq!(builder.filter_directive(), "my_app=warn");
    }
}
