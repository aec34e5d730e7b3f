//! Last-resort line parsing.

use super::LineFormat;
use crate::record::{LogLevel, LogRecord};
use chrono::Utc;

/// Treats the whole line as the message. Never misses.
///
/// The level is guessed from the case-folded text: "error" wins over "warn",
/// everything else is Info.
pub struct LineFallback;

impl LineFallback {
    pub fn parse(&self, line: &str) -> LogRecord {
        let lowered = line.to_lowercase();
        let level = if lowered.contains("error") {
            LogLevel::Error
        } else if lowered.contains("warn") {
            LogLevel::Warn
        } else {
            LogLevel::Info
        };

        LogRecord::bare(Utc::now(), line.to_string(), level)
    }
}

impl LineFormat for LineFallback {
    fn try_parse(&self, line: &str) -> Option<LogRecord> {
        Some(self.parse(line))
    }
}
