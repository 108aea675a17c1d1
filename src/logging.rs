// Logging
//
// Two layers:
// - `init_logging` wires the `log` facade to env_logger for process diagnostics
// - `Logger` is the explicitly constructed sink handed to components that
//   report on behalf of the driver (validation messages, fatal init errors)

use crate::config::LoggingConfig;
use log::LevelFilter;
use parking_lot::Mutex;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize env_logger once. `RUST_LOG` overrides the configured level.
pub fn init_logging(config: &LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();

        if let Ok(filter) = std::env::var("RUST_LOG") {
            builder.parse_filters(&filter);
        } else {
            let level = config.level.parse::<LevelFilter>().unwrap_or(LevelFilter::Info);
            builder.filter_level(level);
        }

        builder.init();
        log::debug!("logging initialized");
    });
}

/// Severity of a message written to a [`LogSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Verbose,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    /// Warnings and errors go to the high-priority stream.
    pub fn is_high_priority(self) -> bool {
        self > LogLevel::Info
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogLevel::Verbose => "VERBOSE",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        })
    }
}

/// Destination for leveled messages. Must tolerate calls from any thread.
pub trait LogSink: Send + Sync {
    fn log(&self, level: LogLevel, message: &str);
}

type Stream = Box<dyn Write + Send>;

/// Leveled sink with separate low/high priority streams and an optional file
/// mirror. Never panics and never reports write failures to the caller.
pub struct Logger {
    low: Mutex<Stream>,
    high: Mutex<Stream>,
    file: Mutex<Option<File>>,
}

impl Logger {
    /// stdout for verbose/info, stderr for warning/error.
    pub fn stdio(log_file: Option<&Path>) -> Self {
        let logger = Self::with_streams(Box::new(io::stdout()), Box::new(io::stderr()));
        match log_file {
            Some(path) => logger.with_file(path),
            None => logger,
        }
    }

    pub fn with_streams(low: Stream, high: Stream) -> Self {
        Self {
            low: Mutex::new(low),
            high: Mutex::new(high),
            file: Mutex::new(None),
        }
    }

    /// Mirror every line into `path`, truncating it first.
    pub fn with_file(self, path: &Path) -> Self {
        match OpenOptions::new().create(true).write(true).truncate(true).open(path) {
            Ok(file) => *self.file.lock() = Some(file),
            Err(e) => {
                let _ = writeln!(
                    self.high.lock(),
                    "[ERROR] could not open {} for logging: {}",
                    path.display(),
                    e
                );
            }
        }
        self
    }

    pub fn verbose(&self, message: &str) {
        self.log(LogLevel::Verbose, message);
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn warning(&self, message: &str) {
        self.log(LogLevel::Warning, message);
    }

    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }
}

impl LogSink for Logger {
    fn log(&self, level: LogLevel, message: &str) {
        let line = format!("[{}] {}", level, message);

        let stream = if level.is_high_priority() { &self.high } else { &self.low };
        {
            let mut stream = stream.lock();
            let _ = writeln!(stream, "{}", line);
            let _ = stream.flush();
        }

        let mut file = self.file.lock();
        if let Some(f) = file.as_mut() {
            if writeln!(f, "{}", line).is_err() {
                // Close the file so the failure is only reported once.
                *file = None;
                let _ = writeln!(self.high.lock(), "[ERROR] writing to log file failed");
            }
        }
    }
}
