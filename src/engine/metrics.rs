//! Windowed metric computation.

use crate::config::CustomMetric;
use crate::record::{LogRecord, WindowedMetrics};
use std::collections::HashMap;
use std::time::Duration;

/// Compute aggregates over one window's records.
///
/// A zero `horizon` means the synthetic whole-input window: totals and rates
/// are still computed, but RPS is not reported.
pub fn compute_windowed(
    records: &[LogRecord],
    horizon: Duration,
    custom_metrics: &[CustomMetric],
) -> WindowedMetrics {
    let mut top_endpoints: HashMap<String, u64> = HashMap::new();
    let mut status_dist: HashMap<String, u64> = HashMap::new();
    let mut custom: HashMap<String, u64> = custom_metrics
        .iter()
        .map(|metric| (metric.name.clone(), 0))
        .collect();
    let mut latencies: Vec<f64> = Vec::new();

    let total_requests = records.len() as u64;
    let mut total_errors = 0u64;

    for record in records {
        if record.is_error() {
            total_errors += 1;
        }
        if !record.endpoint.is_empty() {
            *top_endpoints.entry(record.endpoint.clone()).or_insert(0) += 1;
        }
        if record.has_valid_latency() {
            latencies.push(record.latency.as_millis() as f64);
        }
        *status_dist
            .entry(status_category(record.status_code).to_string())
            .or_insert(0) += 1;

        for metric in custom_metrics {
            if metric.pattern.is_match(&record.message) {
                *custom.entry(metric.name.clone()).or_insert(0) += 1;
            }
        }
    }

    let rps = if horizon > Duration::ZERO {
        total_requests as f64 / horizon.as_secs_f64()
    } else {
        0.0
    };
    let error_rate = if total_requests > 0 {
        total_errors as f64 / total_requests as f64 * 100.0
    } else {
        0.0
    };

    latencies.sort_by(|a, b| a.total_cmp(b));

    WindowedMetrics {
        rps,
        error_rate,
        p50_latency: percentile_ms(&latencies, 50.0),
        p90_latency: percentile_ms(&latencies, 90.0),
        p95_latency: percentile_ms(&latencies, 95.0),
        p99_latency: percentile_ms(&latencies, 99.0),
        total_requests,
        total_errors,
        top_endpoints,
        status_code_distribution: status_dist,
        custom,
    }
}

/// Bucket a status code by its hundreds digit.
pub fn status_category(code: u16) -> &'static str {
    match code {
        100..=199 => "1xx",
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        500..=599 => "5xx",
        _ => "Other",
    }
}

fn percentile_ms(sorted: &[f64], pct: f64) -> Duration {
    Duration::from_millis(percentile(sorted, pct) as u64)
}

/// Percentile over an ascending-sorted sample.
///
/// Rank is `pct/100 · n`: a whole-number rank takes the mean of the two
/// straddling samples, anything else the sample at the rank rounded up.
/// (So the median of 1..10 is 5.5.)
pub fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }

    let n = sorted.len();
    let index = pct / 100.0 * n as f64;

    let rounded = index.round();
    if (index - rounded).abs() < 1e-9 {
        let i = rounded as usize;
        if i == 0 {
            return sorted[0];
        }
        if i >= n {
            return sorted[n - 1];
        }
        (sorted[i - 1] + sorted[i]) / 2.0
    } else {
        let i = (index.ceil() as usize).clamp(1, n);
        sorted[i - 1]
    }
}
