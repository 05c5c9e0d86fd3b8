//! Process logger.
//!
//! Writes `[HH:MM:SS.mmm LEVEL] message` lines to stdout and appends them to
//! `<exe_dir>/logs/pick_reader.log`. Install once with [`init`].

use chrono::Local;
use log::{LevelFilter, Log, Metadata, Record};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::OnceLock;

const LOG_FILE_NAME: &str = "pick_reader.log";

struct CycleLogger {
    file: Option<PathBuf>,
}

impl Log for CycleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let line = format_line(&Local::now().format("%H:%M:%S%.3f").to_string(), record);
        print!("{}", line);

        if let Some(path) = &self.file {
            if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
                let _ = file.write_all(line.as_bytes());
            }
        }
    }

    fn flush(&self) {
        let _ = std::io::stdout().flush();
    }
}

fn format_line(timestamp: &str, record: &Record) -> String {
    format!("[{} {:>5}] {}\n", timestamp, record.level(), record.args())
}

static LOGGER: OnceLock<CycleLogger> = OnceLock::new();

/// Installs the logger. `log_dir` is usually the directory from
/// [`crate::paths::get_logs_dir`]; `None` logs to stdout only.
///
/// Calling this more than once is a no-op after the first successful
/// initialization.
pub fn init(level: LevelFilter, log_dir: Option<PathBuf>) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_none() {
        let logger = LOGGER.get_or_init(|| CycleLogger {
            file: log_dir.map(|dir| dir.join(LOG_FILE_NAME)),
        });
        log::set_logger(logger)?;
        log::set_max_level(level);
    }
    Ok(())
}

/// Changes the level after [`init`], e.g. once config.json has been read.
pub fn set_level(level: LevelFilter) {
    log::set_max_level(level);
}
