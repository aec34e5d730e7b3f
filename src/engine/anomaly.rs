//! Statistical anomaly detection over the published history.
//!
//! Two families of tests run on each dirty tick, against the 1h window's
//! current values and the bounded history of previous samples:
//! z-score outliers (3 sigma) and baseline drift of the RPS moving mean.

use crate::record::{Anomaly, WindowedMetrics};
use chrono::Utc;

const ZSCORE_THRESHOLD: f64 = 3.0;
/// Z-score tests need strictly more than this many history samples.
const MIN_ZSCORE_SAMPLES: usize = 10;
/// Each drift segment compares the mean of this many samples.
const DRIFT_SEGMENT: usize = 10;
const DRIFT_RATIO_HIGH: f64 = 1.2;
const DRIFT_RATIO_LOW: f64 = 0.8;

/// Run every test; anomalies come back in detection order.
pub fn detect(
    current: &WindowedMetrics,
    rps_history: &[f64],
    error_rate_history: &[f64],
    latency_history: &[f64],
) -> Vec<Anomaly> {
    let now = Utc::now();
    let mut anomalies = Vec::new();

    if let Some((mean, std)) = outside_three_sigma(current.rps, rps_history) {
        anomalies.push(Anomaly {
            timestamp: now,
            kind: "RPS Anomaly".to_string(),
            message: format!(
                "RPS {:.2} is outside the 3-sigma range (mean {:.2}, std {:.2})",
                current.rps, mean, std
            ),
        });
    }

    if let Some((mean, std)) = outside_three_sigma(current.error_rate, error_rate_history) {
        anomalies.push(Anomaly {
            timestamp: now,
            kind: "Error Rate Anomaly".to_string(),
            message: format!(
                "Error rate {:.2}% is outside the 3-sigma range (mean {:.2}%, std {:.2}%)",
                current.error_rate, mean, std
            ),
        });
    }

    let current_p95 = current.p95_latency.as_millis() as f64;
    if let Some((mean, std)) = outside_three_sigma(current_p95, latency_history) {
        anomalies.push(Anomaly {
            timestamp: now,
            kind: "Latency Anomaly".to_string(),
            message: format!(
                "P95 latency {:.0}ms is outside the 3-sigma range (mean {:.2}ms, std {:.2}ms)",
                current_p95, mean, std
            ),
        });
    }

    if let Some(anomaly) = baseline_drift(rps_history) {
        anomalies.push(anomaly);
    }

    anomalies
}

fn outside_three_sigma(current: f64, history: &[f64]) -> Option<(f64, f64)> {
    if history.len() <= MIN_ZSCORE_SAMPLES {
        return None;
    }

    let (mean, std) = mean_std(history);
    if current > mean + ZSCORE_THRESHOLD * std || current < mean - ZSCORE_THRESHOLD * std {
        Some((mean, std))
    } else {
        None
    }
}

/// Compare the RPS mean of the last segment against the one before it; a
/// ratio outside [0.8, 1.2] is drift. Needs a full history (two segments).
fn baseline_drift(rps_history: &[f64]) -> Option<Anomaly> {
    if rps_history.len() < 2 * DRIFT_SEGMENT {
        return None;
    }

    let n = rps_history.len();
    let recent = mean(&rps_history[n - DRIFT_SEGMENT..]);
    let older = mean(&rps_history[n - 2 * DRIFT_SEGMENT..n - DRIFT_SEGMENT]);

    if recent > older * DRIFT_RATIO_HIGH || recent < older * DRIFT_RATIO_LOW {
        Some(Anomaly {
            timestamp: Utc::now(),
            kind: "Baseline Drift".to_string(),
            message: format!(
                "RPS baseline drift detected (recent mean {:.2}, previous mean {:.2})",
                recent, older
            ),
        })
    } else {
        None
    }
}

/// Mean and sample standard deviation (Bessel's correction).
pub fn mean_std(data: &[f64]) -> (f64, f64) {
    if data.is_empty() {
        return (0.0, 0.0);
    }

    let mean = mean(data);
    if data.len() < 2 {
        return (mean, 0.0);
    }

    let variance =
        data.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (data.len() - 1) as f64;
    (mean, variance.sqrt())
}

fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}
