//! One-shot report output.
//!
//! In initial-scan mode the pipeline publishes a single snapshot over the
//! whole input; this prints it as plain text instead of entering the
//! dashboard.

use crate::pipeline::Pipeline;
use crate::record::MetricsSnapshot;
use anyhow::Result;
use std::fmt::Write as _;

/// Await the single snapshot and print the report to stdout.
pub async fn run(mut pipeline: Pipeline) -> Result<()> {
    // The raw-log feed must keep draining or the fan-out would block on it
    let mut raw_rx = pipeline.raw_log_rx;
    tokio::spawn(async move { while raw_rx.recv().await.is_some() {} });

    match pipeline.metrics_rx.recv().await {
        Some(snapshot) => {
            print!("{}", format_report(&snapshot));
            Ok(())
        }
        None => anyhow::bail!("pipeline ended without producing a report"),
    }
}

/// Render the snapshot as plain text.
pub fn format_report(snapshot: &MetricsSnapshot) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "pulsewatch report");
    let _ = writeln!(out, "=================");

    for (name, wm) in &snapshot.windows {
        let _ = writeln!(out);
        let _ = writeln!(out, "Window: {}", name);
        let _ = writeln!(out, "  Requests:   {}", wm.total_requests);
        let _ = writeln!(
            out,
            "  Errors:     {} ({:.2}%)",
            wm.total_errors, wm.error_rate
        );
        if wm.rps > 0.0 {
            let _ = writeln!(out, "  RPS:        {:.2}", wm.rps);
        }
        let _ = writeln!(
            out,
            "  Latency:    p50 {}ms / p90 {}ms / p95 {}ms / p99 {}ms",
            wm.p50_latency.as_millis(),
            wm.p90_latency.as_millis(),
            wm.p95_latency.as_millis(),
            wm.p99_latency.as_millis()
        );

        if !wm.status_code_distribution.is_empty() {
            let mut categories: Vec<_> = wm.status_code_distribution.iter().collect();
            categories.sort_by(|a, b| a.0.cmp(b.0));
            let summary = categories
                .iter()
                .map(|(category, count)| format!("{} {}", category, count))
                .collect::<Vec<_>>()
                .join(", ");
            let _ = writeln!(out, "  Status:     {}", summary);
        }

        if !wm.top_endpoints.is_empty() {
            let mut endpoints: Vec<_> = wm.top_endpoints.iter().collect();
            endpoints.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
            let _ = writeln!(out, "  Top endpoints:");
            for (endpoint, count) in endpoints.iter().take(10) {
                let _ = writeln!(out, "    {:>6}  {}", count, endpoint);
            }
        }

        if !wm.custom.is_empty() {
            let mut custom: Vec<_> = wm.custom.iter().collect();
            custom.sort_by(|a, b| a.0.cmp(b.0));
            let _ = writeln!(out, "  Custom:");
            for (name, count) in custom {
                let _ = writeln!(out, "    {:>6}  {}", count, name);
            }
        }
    }

    if !snapshot.anomalies.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Anomalies:");
        for anomaly in &snapshot.anomalies {
            let _ = writeln!(
                out,
                "  [{}] {}: {}",
                anomaly.timestamp.format("%Y-%m-%d %H:%M:%S"),
                anomaly.kind,
                anomaly.message
            );
        }
    }

    out
}
