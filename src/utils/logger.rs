// src/utils/logger.rs

use log::{Level, LevelFilter, Metadata, Record, SetLoggerError};
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};

static LOGGER: ConsoleLogger = ConsoleLogger;
static MAX_LEVEL: AtomicUsize = AtomicUsize::new(LevelFilter::Debug as usize);

/// Console logger for embedding applications that have no log view of their own.
struct ConsoleLogger;

/// Install the console logger. Fails if another logger is already set.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
  MAX_LEVEL.store(level as usize, Ordering::Relaxed);
  log::set_logger(&LOGGER).map(|()| log::set_max_level(level))
}

/// Format one record the way the console prints it: "<glyph>  [target] message".
pub fn format_record(level: Level, target: &str, message: &str) -> String {
  let icon = match level {
    Level::Error => "🔴",
    Level::Warn => "🟠",
    Level::Info => "🔵",
    Level::Debug => "⚪",
    Level::Trace => "▫️",
  };
  format!("{}  [{}] {}", icon, target, message)
}

impl log::Log for ConsoleLogger {
  fn enabled(&self, metadata: &Metadata) -> bool {
    (metadata.level() as usize) <= MAX_LEVEL.load(Ordering::Relaxed)
  }

  fn log(&self, record: &Record) {
    if self.enabled(record.metadata()) {
      let msg = format_record(record.level(), record.target(), &record.args().to_string());
      let stderr = std::io::stderr();
      let mut handle = stderr.lock();
      let _ = writeln!(handle, "{}", msg);
    }
  }

  fn flush(&self) {
    let _ = std::io::stderr().flush();
  }
}
