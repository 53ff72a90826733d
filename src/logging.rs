use std::path::PathBuf;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_core::{Level, Metadata};
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

use crate::error::HookError;

const ERROR_LOG_PREFIX: &str = "error";
const ERROR_LOG_SUFFIX: &str = "log";

/// Which of the four log channels are written. `debug` events ride the
/// trace channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogChannels {
    pub trace: bool,
    pub info: bool,
    pub warn: bool,
    pub error: bool,
}

impl Default for LogChannels {
    fn default() -> Self {
        Self {
            trace: false,
            info: true,
            warn: true,
            error: true,
        }
    }
}

impl LogChannels {
    pub fn none() -> Self {
        Self {
            trace: false,
            info: false,
            warn: false,
            error: false,
        }
    }

    /// Parse a comma separated channel list such as `"info,warn,error"`.
    /// Unknown names are ignored.
    pub fn parse(list: &str) -> Self {
        let mut channels = Self::none();
        for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match name.to_ascii_lowercase().as_str() {
                "trace" => channels.trace = true,
                "info" => channels.info = true,
                "warn" | "warning" => channels.warn = true,
                "error" => channels.error = true,
                _ => {}
            }
        }
        channels
    }

    pub fn allows(&self, level: &Level) -> bool {
        if *level == Level::ERROR {
            self.error
        } else if *level == Level::WARN {
            self.warn
        } else if *level == Level::INFO {
            self.info
        } else {
            self.trace
        }
    }
}

/// Append-only file that receives error-level events.
pub struct ErrorLogFile {
    log_directory: PathBuf,
}

impl ErrorLogFile {
    pub fn new(log_directory: impl Into<PathBuf>) -> Self {
        Self {
            log_directory: log_directory.into(),
        }
    }

    /// Path of the file errors are appended to.
    pub fn path(&self) -> PathBuf {
        self.log_directory
            .join(format!("{ERROR_LOG_PREFIX}.{ERROR_LOG_SUFFIX}"))
    }

    /// Open the file behind a non-blocking writer.
    /// The guard must live as long as logging does.
    pub fn open(&self) -> Result<(NonBlocking, WorkerGuard), HookError> {
        let log_file_error = |message: String| HookError::LogFile {
            path: self.log_directory.display().to_string(),
            message,
        };

        std::fs::create_dir_all(&self.log_directory)
            .map_err(|e| log_file_error(e.to_string()))?;

        let file_appender = RollingFileAppender::builder()
            .rotation(Rotation::NEVER)
            .filename_prefix(ERROR_LOG_PREFIX)
            .filename_suffix(ERROR_LOG_SUFFIX)
            .build(&self.log_directory)
            .map_err(|e| log_file_error(e.to_string()))?;

        Ok(tracing_appender::non_blocking(file_appender))
    }
}

fn is_error(metadata: &Metadata<'_>) -> bool {
    *metadata.level() == Level::ERROR
}

/// Install the global subscriber.
///
/// Trace, info and warn go to stdout; error goes to stderr and to the
/// error log file. `RUST_LOG` can narrow targets further.
pub fn setup_logging(channels: LogChannels, error_file: NonBlocking) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{}=trace,warn", env!("CARGO_CRATE_NAME")))
    });

    let stdout_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_file(true)
        .with_line_number(true)
        .with_filter(filter_fn(move |metadata| {
            !is_error(metadata) && channels.allows(metadata.level())
        }));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_file(true)
        .with_line_number(true)
        .with_filter(filter_fn(move |metadata| {
            is_error(metadata) && channels.error
        }));

    let file_layer = fmt::layer()
        .with_writer(error_file)
        .with_ansi(false) // Disable ANSI colors for file logs
        .with_file(true)
        .with_line_number(true)
        .with_filter(filter_fn(move |metadata| {
            is_error(metadata) && channels.error
        }));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(stderr_layer)
        .with(file_layer)
        .init();
}
