//! Run log
//!
//! [`RunLog`] mirrors every log record to the console (through `env_logger`,
//! colored and timestamped) and appends it to a plain text file. The file is
//! truncated once, when the log is opened; every record after that is appended.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::{LevelFilter, Log, Metadata, Record};
use thiserror::Error;

/// Run log errors
#[derive(Error, Debug)]
pub enum LogError {
    /// The log file could not be created or truncated
    #[error("Failed to open log file {path}: {source}")]
    Open {
        /// Path of the log file
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Another logger is already installed
    #[error("A logger is already installed: {0}")]
    AlreadyInstalled(#[from] log::SetLoggerError),
}

/// Console and file logger for one run of the demo
pub struct RunLog {
    console: env_logger::Logger,
    file: Mutex<File>,
    path: PathBuf,
}

impl RunLog {
    /// Truncate `path` and start a new run log
    ///
    /// Console filtering follows `RUST_LOG`, defaulting to `info`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LogError> {
        let console = env_logger::Builder::new()
            .filter_level(LevelFilter::Info)
            .parse_default_env()
            .build();
        Self::with_console(path, console)
    }

    /// Truncate `path` and log to it alongside an already configured console logger
    pub fn with_console(path: impl AsRef<Path>, console: env_logger::Logger) -> Result<Self, LogError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .map_err(|source| LogError::Open { path: path.clone(), source })?;

        Ok(Self {
            console,
            file: Mutex::new(file),
            path,
        })
    }

    /// Path of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Install as the process-wide `log` backend
    pub fn install(self) -> Result<(), LogError> {
        let max_level = self.console.filter();
        log::set_boxed_logger(Box::new(self))?;
        log::set_max_level(max_level);
        Ok(())
    }

    fn append(&self, record: &Record<'_>) {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        let Ok(mut file) = self.file.lock() else {
            return;
        };
        // A failing log file must never take the renderer down with it.
        let _ = writeln!(file, "[{}]\n [{}] {}", timestamp, record.level(), record.args());
    }
}

impl Log for RunLog {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        self.console.enabled(metadata)
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        self.console.log(record);
        self.append(record);
    }

    fn flush(&self) {
        self.console.flush();
        if let Ok(mut file) = self.file.lock() {
            let _ = file.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Level;

    fn quiet_console(level: LevelFilter) -> env_logger::Logger {
        env_logger::Builder::new()
            .filter_level(level)
            .is_test(true)
            .build()
    }

    fn emit(log: &RunLog, level: Level, message: &str) {
        log.log(
            &Record::builder()
                .level(level)
                .args(format_args!("{}", message))
                .build(),
        );
    }

    #[test]
    fn test_open_truncates_previous_run() {
        let path = std::env::temp_dir().join("quad_engine_run_log_truncate.txt");
        std::fs::write(&path, "stale contents from the last run\n").unwrap();

        let log = RunLog::with_console(&path, quiet_console(LevelFilter::Info)).unwrap();
        log.flush();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_records_are_appended_in_order() {
        let path = std::env::temp_dir().join("quad_engine_run_log_append.txt");
        let log = RunLog::with_console(&path, quiet_console(LevelFilter::Info)).unwrap();

        emit(&log, Level::Info, "Vulkan initialization.");
        emit(&log, Level::Error, "Failed to draw frame.");
        log.flush();

        let contents = std::fs::read_to_string(&path).unwrap();
        let info = contents.find(" [INFO] Vulkan initialization.").unwrap();
        let error = contents.find(" [ERROR] Failed to draw frame.").unwrap();
        assert!(info < error);
        assert!(contents.starts_with('['));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_filtered_records_skip_the_file() {
        let path = std::env::temp_dir().join("quad_engine_run_log_filter.txt");
        let log = RunLog::with_console(&path, quiet_console(LevelFilter::Warn)).unwrap();

        emit(&log, Level::Debug, "noise");
        emit(&log, Level::Warn, "kept");
        log.flush();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(!contents.contains("noise"));
        assert!(contents.contains("[WARN] kept"));
        let _ = std::fs::remove_file(path);
    }
}
