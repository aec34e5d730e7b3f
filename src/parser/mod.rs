//! Line parsing.
//!
//! A raw line is run through an ordered chain of format candidates; the
//! first one that claims the line produces the [`LogRecord`]. The fallback
//! is held outside the chain so parsing is structurally infallible: every
//! line becomes a record.

mod access_log;
mod json;
mod line;

pub use access_log::AccessLogFormat;
pub use json::JsonFormat;
pub use line::LineFallback;

use crate::record::LogRecord;

/// One format candidate in the chain.
pub trait LineFormat: Send + Sync {
    /// Parse the line if this format claims it; `None` is a miss, not an
    /// error.
    fn try_parse(&self, line: &str) -> Option<LogRecord>;
}

/// The ordered chain: structured JSON, then access logs, then the fallback.
pub struct ParserChain {
    formats: Vec<Box<dyn LineFormat>>,
    fallback: LineFallback,
}

impl ParserChain {
    /// The standard chain used by the pipeline.
    pub fn standard() -> Self {
        Self {
            formats: vec![Box::new(JsonFormat), Box::new(AccessLogFormat::new())],
            fallback: LineFallback,
        }
    }

    /// Parse one line. Never fails; unmatched lines land in the fallback.
    pub fn parse(&self, line: &str) -> LogRecord {
        for format in &self.formats {
            if let Some(record) = format.try_parse(line) {
                return record;
            }
        }
        self.fallback.parse(line)
    }
}
