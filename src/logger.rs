use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use log::{LevelFilter, Log, SetLoggerError};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Last `N` log lines, oldest dropped first
#[derive(Debug)]
pub struct LogHistory<const N: usize> {
    lines: VecDeque<String>,
}

impl<const N: usize> Default for LogHistory<N> {
    fn default() -> Self {
        Self {
            lines: VecDeque::with_capacity(N),
        }
    }
}

impl<const N: usize> LogHistory<N> {
    pub fn append(&mut self, line: String) {
        if N == 0 || line.is_empty() {
            return;
        }
        if self.lines.len() == N {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

pub type SharedLogHistory = Arc<Mutex<LogHistory<64>>>;

/// Prints to the console and keeps recent lines so they can be dumped later
pub struct RingBufferLogger {
    pub history: SharedLogHistory,
    level: LevelFilter,
}

impl RingBufferLogger {
    pub fn new(level: LevelFilter) -> Self {
        Self {
            history: Default::default(),
            level,
        }
    }

    /// Installs a logger as the global one and returns its history
    pub fn init(level: LevelFilter) -> Result<SharedLogHistory, SetLoggerError> {
        let logger = Self::new(level);
        let history = logger.history.clone();
        log::set_boxed_logger(Box::new(logger))?;
        log::set_max_level(level);
        Ok(history)
    }
}

impl Log for RingBufferLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        println!("[{}] {}", record.level(), record.args());

        let timestamp = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();
        if let Ok(mut history) = self.history.lock() {
            history.append(format!(
                "{} [{}:{}] {}",
                timestamp,
                record.level(),
                record.target(),
                record.args()
            ));
        }
    }

    fn flush(&self) {}
}
