//! Combined-format access log parsing.

use super::LineFormat;
use crate::record::{LogLevel, LogRecord};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::json;
use std::time::Duration;

/// Parses the canonical combined log format with a trailing request-time
/// field:
///
/// ```text
/// $remote_addr - $remote_user [$time_local] "$request" $status
/// $body_bytes_sent "$http_referer" "$http_user_agent" $request_time
/// ```
pub struct AccessLogFormat {
    pattern: Regex,
}

impl AccessLogFormat {
    pub fn new() -> Self {
        let pattern = Regex::new(
            r#"^(?P<remote_addr>\S+) - (?P<remote_user>\S+) \[(?P<time_local>[^\]]+)\] "(?P<request>\S+ \S+ \S+)" (?P<status>\d{3}) (?P<body_bytes_sent>\d+) "(?P<http_referer>[^"]*)" "(?P<http_user_agent>[^"]*)" (?P<request_time>\S+)$"#,
        )
        .expect("access log pattern is valid");

        Self { pattern }
    }
}

impl Default for AccessLogFormat {
    fn default() -> Self {
        Self::new()
    }
}

impl LineFormat for AccessLogFormat {
    fn try_parse(&self, line: &str) -> Option<LogRecord> {
        let caps = self.pattern.captures(line)?;

        let timestamp = DateTime::parse_from_str(&caps["time_local"], "%d/%b/%Y:%H:%M:%S %z")
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        let status: u16 = caps["status"].parse().unwrap_or(0);

        // Endpoint is the path token of "METHOD /path PROTO"
        let request = caps["request"].to_string();
        let endpoint = request
            .split_whitespace()
            .nth(1)
            .unwrap_or_default()
            .to_string();

        // Request time is in seconds
        let latency = caps["request_time"]
            .parse::<f64>()
            .ok()
            .filter(|v| *v >= 0.0)
            .map(Duration::from_secs_f64)
            .unwrap_or(Duration::ZERO);

        let user_agent = caps["http_user_agent"].to_string();
        let browser = sniff_user_agent(&user_agent);

        let level = if status >= 400 {
            LogLevel::Error
        } else {
            LogLevel::Info
        };

        let mut record = LogRecord::bare(timestamp, line.to_string(), level);
        record.status_code = status;
        record.latency = latency;
        record.endpoint = endpoint;
        record.fields.insert("remote_addr".into(), json!(&caps["remote_addr"]));
        record.fields.insert("remote_user".into(), json!(&caps["remote_user"]));
        record.fields.insert("request".into(), json!(request));
        record.fields.insert("http_referer".into(), json!(&caps["http_referer"]));
        record.fields.insert("user_agent".into(), json!(user_agent));
        record.fields.insert("browser_name".into(), json!(browser.name));
        record.fields.insert("browser_version".into(), json!(browser.version));
        record.fields.insert("is_mobile".into(), json!(browser.mobile));

        Some(record)
    }
}

struct Browser {
    name: String,
    version: String,
    mobile: bool,
}

/// Decompose a user-agent string into browser name, version and a mobile
/// flag. Token order matters: Chrome-family agents also advertise "Safari",
/// and Edge/Opera also advertise "Chrome".
fn sniff_user_agent(ua: &str) -> Browser {
    let mobile = ["Mobile", "Android", "iPhone", "iPad"]
        .iter()
        .any(|marker| ua.contains(marker));

    let known = [
        ("Edg/", "Edge"),
        ("OPR/", "Opera"),
        ("Chrome/", "Chrome"),
        ("Firefox/", "Firefox"),
        ("curl/", "curl"),
    ];
    for (token, name) in known {
        if let Some(version) = product_version(ua, token) {
            return Browser {
                name: name.to_string(),
                version,
                mobile,
            };
        }
    }

    if ua.contains("Safari/") {
        if let Some(version) = product_version(ua, "Version/") {
            return Browser {
                name: "Safari".to_string(),
                version,
                mobile,
            };
        }
    }

    // Generic "name/version" product token
    if let Some((name, rest)) = ua.split_once('/') {
        if !name.is_empty() && !name.contains(' ') {
            let version = rest.split_whitespace().next().unwrap_or_default();
            return Browser {
                name: name.to_string(),
                version: version.to_string(),
                mobile,
            };
        }
    }

    Browser {
        name: String::new(),
        version: String::new(),
        mobile,
    }
}

fn product_version(ua: &str, token: &str) -> Option<String> {
    let start = ua.find(token)? + token.len();
    let version = ua[start..]
        .split(|c: char| c.is_whitespace() || c == ';' || c == ')')
        .next()
        .unwrap_or_default();
    Some(version.to_string())
}
