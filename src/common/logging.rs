//! Logging for the storage engine
//!
//! All engine messages go to the `tempo` target so applications can filter
//! them with `RUST_LOG=tempo=debug`. [`init`] is optional; the engine only
//! emits through the `log` facade.

use env_logger::fmt::Formatter;
use log::{Level, LevelFilter, Record};
use std::io::Write;
use std::sync::Once;
use std::time::{Duration, Instant};

static INIT: Once = Once::new();

/// Environment variable overriding the level given to [`init_with_level`]
pub const LOG_ENV: &str = "TEMPO_LOG";

/// Operations slower than this are reported by [`Timer`] on drop
pub const DEFAULT_SLOW_THRESHOLD: Duration = Duration::from_millis(10);

fn level_label(level: Level, colored: bool) -> &'static str {
    match (level, colored) {
        (Level::Error, true) => "\x1b[31mERROR\x1b[0m",
        (Level::Warn, true) => "\x1b[33mWARN\x1b[0m",
        (Level::Info, true) => "\x1b[32mINFO\x1b[0m",
        (Level::Debug, true) => "\x1b[36mDEBUG\x1b[0m",
        (Level::Trace, true) => "\x1b[37mTRACE\x1b[0m",
        (level, false) => level.as_str(),
    }
}

fn write_record(buf: &mut Formatter, record: &Record<'_>, colored: bool) -> std::io::Result<()> {
    writeln!(
        buf,
        "{} [{}] {}: {}",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.6f"),
        level_label(record.level(), colored),
        record.target(),
        record.args()
    )
}

fn install(mut builder: env_logger::Builder, colored: bool) {
    // A logger installed by the application wins.
    let installed = builder
        .format(move |buf, record| write_record(buf, record, colored))
        .try_init()
        .is_ok();
    if installed {
        log::info!(target: "tempo", "logging initialized, max level {}", log::max_level());
    }
}

/// Install a colored logger reading its filter from `RUST_LOG`
///
/// Defaults to `info` when `RUST_LOG` is unset. Only the first call of
/// [`init`] or [`init_with_level`] has an effect.
pub fn init() {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();
        builder.filter_level(LevelFilter::Info);
        if let Ok(filters) = std::env::var("RUST_LOG") {
            builder.parse_filters(&filters);
        }
        install(builder, true);
    });
}

/// Install a plain logger at `level`, unless [`LOG_ENV`] names another filter
pub fn init_with_level(level: LevelFilter) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();
        builder.filter_level(level);
        if let Ok(filters) = std::env::var(LOG_ENV) {
            builder.parse_filters(&filters);
        }
        install(builder, false);
    });
}

/// Log an error to the `tempo` target
#[macro_export]
macro_rules! tempo_error {
    ($($arg:tt)*) => { log::error!(target: "tempo", $($arg)*) };
}

/// Log a warning to the `tempo` target
#[macro_export]
macro_rules! tempo_warn {
    ($($arg:tt)*) => { log::warn!(target: "tempo", $($arg)*) };
}

/// Log an info message to the `tempo` target
#[macro_export]
macro_rules! tempo_info {
    ($($arg:tt)*) => { log::info!(target: "tempo", $($arg)*) };
}

/// Log a debug message to the `tempo` target
#[macro_export]
macro_rules! tempo_debug {
    ($($arg:tt)*) => { log::debug!(target: "tempo", $($arg)*) };
}

/// Log a trace message to the `tempo` target
#[macro_export]
macro_rules! tempo_trace {
    ($($arg:tt)*) => { log::trace!(target: "tempo", $($arg)*) };
}

/// Measures an engine operation
///
/// [`Timer::stop`] logs the duration at debug level. A timer dropped after
/// running past its threshold logs a warning, whether or not it was stopped.
#[derive(Debug)]
pub struct Timer {
    start: Instant,
    operation: String,
    slow_threshold: Duration,
}

impl Timer {
    /// Start timing with the default slow threshold
    pub fn start<S: Into<String>>(operation: S) -> Self {
        Self::with_threshold(operation, DEFAULT_SLOW_THRESHOLD)
    }

    /// Start timing, warning on drop past `slow_threshold`
    pub fn with_threshold<S: Into<String>>(operation: S, slow_threshold: Duration) -> Self {
        let operation = operation.into();
        tempo_trace!("{operation}: started");
        Self {
            start: Instant::now(),
            operation,
            slow_threshold,
        }
    }

    /// Time since the start
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Log and return the elapsed time
    pub fn stop(self) -> Duration {
        let elapsed = self.start.elapsed();
        tempo_debug!("{}: done in {elapsed:?}", self.operation);
        elapsed
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        if elapsed > self.slow_threshold {
            tempo_warn!("{}: slow, took {elapsed:?}", self.operation);
        }
    }
}
