//! Structured JSON line parsing.

use super::LineFormat;
use crate::record::{LogLevel, LogRecord};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use std::time::Duration;

/// Accepts any line that parses as a JSON object and maps well-known keys
/// onto the record. Every original key is preserved in `fields`.
pub struct JsonFormat;

const TIMESTAMP_KEYS: [&str; 3] = ["timestamp", "ts", "time"];
const MESSAGE_KEYS: [&str; 2] = ["message", "msg"];
const STATUS_KEYS: [&str; 2] = ["status", "code"];
const ENDPOINT_KEYS: [&str; 2] = ["endpoint", "path"];

impl LineFormat for JsonFormat {
    fn try_parse(&self, line: &str) -> Option<LogRecord> {
        let raw: Map<String, Value> = serde_json::from_str(line).ok()?;

        let timestamp = TIMESTAMP_KEYS
            .iter()
            .find_map(|key| raw.get(*key))
            .map(parse_timestamp)
            .unwrap_or_else(Utc::now);

        let message = MESSAGE_KEYS
            .iter()
            .find_map(|key| raw.get(*key))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let level = match raw.get("level").and_then(Value::as_str) {
            Some(s) => LogLevel::parse(s),
            None => LogLevel::Info,
        };

        let status_code = STATUS_KEYS
            .iter()
            .find_map(|key| raw.get(*key))
            .and_then(Value::as_f64)
            .map(|v| v as u16)
            .unwrap_or(0);

        // Latency is interpreted as milliseconds
        let latency = raw
            .get("latency")
            .and_then(Value::as_f64)
            .filter(|v| *v >= 0.0)
            .map(|ms| Duration::from_millis(ms as u64))
            .unwrap_or(Duration::ZERO);

        let endpoint = ENDPOINT_KEYS
            .iter()
            .find_map(|key| raw.get(*key))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Some(LogRecord {
            timestamp,
            message,
            level,
            status_code,
            latency,
            endpoint,
            fields: raw.into_iter().collect(),
        })
    }
}

fn parse_timestamp(value: &Value) -> DateTime<Utc> {
    match value {
        Value::String(s) => parse_timestamp_str(s).unwrap_or_else(Utc::now),
        Value::Number(n) => n
            .as_f64()
            .and_then(|secs| DateTime::from_timestamp(secs as i64, 0))
            .unwrap_or_else(Utc::now),
        _ => Utc::now(),
    }
}

fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    // RFC 3339, with or without fractional seconds
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    // Naive "YYYY-MM-DD HH:MM:SS", taken as UTC
    if let Ok(t) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(t.and_utc());
    }
    // Unix seconds in a string
    if let Ok(secs) = s.parse::<i64>() {
        return DateTime::from_timestamp(secs, 0);
    }
    None
}
