//! Logging System
//!
//! Installs a `tracing` subscriber with:
//! - A global level plus per-module overrides
//! - Console and/or rolling file output
//! - Text or JSON formatting

mod config;


pub use self::config::{LogFormat, LogLevel, LogOutput, LoggingConfig, RotationStrategy};

use std::path::PathBuf;
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Logging system errors
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Failed to initialize logging: {0}")]
    InitializationError(String),

    #[error("Failed to create log directory: {0}")]
    DirectoryCreationError(String),

    #[error("Invalid log directive '{directive}': {reason}")]
    InvalidDirective { directive: String, reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for logging operations
pub type LoggingResult<T> = Result<T, LoggingError>;

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;
type FilteredRegistry = tracing_subscriber::layer::Layered<EnvFilter, tracing_subscriber::Registry>;

/// Installed logging state; dropping it flushes and stops the file writer
pub struct LoggingSystem {
    config: LoggingConfig,
    _guards: Vec<WorkerGuard>,
}

impl LoggingSystem {
    /// Initialize the global subscriber with the given configuration
    pub fn init(config: LoggingConfig) -> LoggingResult<Self> {
        let env_filter = Self::build_env_filter(&config)?;

        let mut guards = Vec::new();
        let mut layers: Vec<BoxedLayer<FilteredRegistry>> = Vec::new();

        if matches!(config.output, LogOutput::Console | LogOutput::Both) {
            layers.push(Self::create_console_layer(&config));
        }
        if config.output.writes_file() {
            let (file_layer, guard) = Self::create_file_layer(&config)?;
            layers.push(file_layer);
            guards.push(guard);
        }

        tracing_subscriber::registry()
            .with(env_filter)
            .with(layers)
            .try_init()
            .map_err(|e| LoggingError::InitializationError(e.to_string()))?;

        Ok(Self {
            config,
            _guards: guards,
        })
    }

    /// Build environment filter from configuration
    ///
    /// `RUST_LOG`, when set, is layered on top of the configured levels.
    pub(crate) fn build_env_filter(config: &LoggingConfig) -> LoggingResult<EnvFilter> {
        let mut filter = EnvFilter::new(config.level.as_str());

        let mut modules: Vec<_> = config.module_levels.iter().collect();
        modules.sort_by(|a, b| a.0.cmp(b.0));
        for (module, level) in modules {
            let directive = format!("{}={}", module, level);
            let parsed = directive
                .parse()
                .map_err(|e: tracing_subscriber::filter::ParseError| {
                    LoggingError::InvalidDirective {
                        directive: directive.clone(),
                        reason: e.to_string(),
                    }
                })?;
            filter = filter.add_directive(parsed);
        }

        if let Ok(overrides) = std::env::var(EnvFilter::DEFAULT_ENV) {
            for directive in overrides.split(',').filter(|d| !d.trim().is_empty()) {
                match directive.trim().parse() {
                    Ok(parsed) => filter = filter.add_directive(parsed),
                    Err(e) => eprintln!("Ignoring invalid RUST_LOG directive '{}': {}", directive, e),
                }
            }
        }

        Ok(filter)
    }

    /// Create console logging layer
    fn create_console_layer<S>(config: &LoggingConfig) -> BoxedLayer<S>
    where
        S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    {
        let layer = fmt::layer()
            .with_target(config.include_target)
            .with_thread_ids(config.include_thread_id)
            .with_file(config.include_file_info)
            .with_line_number(config.include_file_info);

        if config.format == LogFormat::Json {
            layer.json().boxed()
        } else {
            layer.boxed()
        }
    }

    /// Create file logging layer with rotation
    fn create_file_layer<S>(config: &LoggingConfig) -> LoggingResult<(BoxedLayer<S>, WorkerGuard)>
    where
        S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    {
        let log_dir = config
            .log_directory
            .clone()
            .unwrap_or_else(|| PathBuf::from("logs"));

        std::fs::create_dir_all(&log_dir).map_err(|e| {
            LoggingError::DirectoryCreationError(format!(
                "Failed to create log directory {:?}: {}",
                log_dir, e
            ))
        })?;

        let file_appender =
            RollingFileAppender::new(Self::rotation(config), &log_dir, &config.file_prefix);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        let layer = fmt::layer()
            .with_writer(non_blocking)
            .with_target(config.include_target)
            .with_thread_ids(config.include_thread_id)
            .with_file(config.include_file_info)
            .with_line_number(config.include_file_info)
            .with_ansi(false); // No ANSI colors in file output

        if config.format == LogFormat::Json {
            Ok((layer.json().boxed(), guard))
        } else {
            Ok((layer.boxed(), guard))
        }
    }

    pub(crate) fn rotation(config: &LoggingConfig) -> Rotation {
        match config.rotation {
            RotationStrategy::Daily => Rotation::DAILY,
            RotationStrategy::Hourly => Rotation::HOURLY,
            RotationStrategy::Never => Rotation::NEVER,
        }
    }

    /// Get current log directory, if file output is enabled
    pub fn log_directory(&self) -> Option<&PathBuf> {
        if self.config.output.writes_file() {
            self.config.log_directory.as_ref()
        } else {
            None
        }
    }

    /// Get current log level
    pub fn log_level(&self) -> LogLevel {
        self.config.level
    }
}

/// Install a plain console subscriber
///
/// Used when the configured system cannot be set up; errors are ignored if a
/// subscriber is already installed.
pub fn init_fallback_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();
}
