//! Pluggable logging sinks injected into workers and strategies.

use std::fs::File;

use chrono::{DateTime, Utc};
use log::Level;
use serde::Serialize;

pub trait Logger: Send {
    fn log_error(&mut self, component: &str, log: String);

    fn log_warn(&mut self, component: &str, log: String);

    fn log_info(&mut self, component: &str, log: String);

    fn log_debug(&mut self, component: &str, log: String);

    fn log_trace(&mut self, component: &str, log: String);

    fn save_log(&self, _path: &str) -> Result<(), std::io::Error>;
}

/// Forwards everything to the `log` facade, tagged with the component name.
#[derive(Default)]
pub struct StdoutLogger {}

impl StdoutLogger {
    pub fn new() -> Self {
        Self {}
    }
}

impl Logger for StdoutLogger {
    fn log_error(&mut self, component: &str, log: String) {
        log::log!(target: component, Level::Error, "{}", log);
    }

    fn log_warn(&mut self, component: &str, log: String) {
        log::log!(target: component, Level::Warn, "{}", log);
    }

    fn log_info(&mut self, component: &str, log: String) {
        log::log!(target: component, Level::Info, "{}", log);
    }

    fn log_debug(&mut self, component: &str, log: String) {
        log::log!(target: component, Level::Debug, "{}", log);
    }

    fn log_trace(&mut self, component: &str, log: String) {
        log::log!(target: component, Level::Trace, "{}", log);
    }

    fn save_log(&self, _path: &str) -> Result<(), std::io::Error> {
        Ok(())
    }
}

#[derive(Serialize)]
struct LogEntry {
    timestamp: DateTime<Utc>,
    component: String,
    message: String,
}

/// Buffers log records in memory and exports them as CSV for offline analysis.
pub struct FileLogger {
    log: Vec<LogEntry>,
    level: Level,
}

impl Default for FileLogger {
    fn default() -> Self {
        Self {
            log: Vec::new(),
            level: Level::Info,
        }
    }
}

impl FileLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(level: Level) -> Self {
        Self { log: Vec::new(), level }
    }

    fn log_internal(&mut self, component: &str, message: String, level: Level) {
        if self.level < level {
            return;
        }
        self.log.push(LogEntry {
            timestamp: Utc::now(),
            component: component.to_string(),
            message,
        });
    }
}

impl Logger for FileLogger {
    fn log_error(&mut self, component: &str, log: String) {
        self.log_internal(component, log, Level::Error)
    }

    fn log_warn(&mut self, component: &str, log: String) {
        self.log_internal(component, log, Level::Warn)
    }

    fn log_info(&mut self, component: &str, log: String) {
        self.log_internal(component, log, Level::Info)
    }

    fn log_debug(&mut self, component: &str, log: String) {
        self.log_internal(component, log, Level::Debug)
    }

    fn log_trace(&mut self, component: &str, log: String) {
        self.log_internal(component, log, Level::Trace)
    }

    fn save_log(&self, path: &str) -> Result<(), std::io::Error> {
        let file = File::create(path)?;
        let mut wtr = csv::Writer::from_writer(file);
        for entry in &self.log {
            wtr.serialize(entry)?;
        }
        wtr.flush()?;
        Ok(())
    }
}
