//! The analysis engine.
//!
//! Owns the recency buffer and the published metrics state, runs two
//! cooperating tasks — an insert loop consuming parsed records and a tick
//! loop on a one-second cadence — and publishes immutable snapshots on a
//! dirty-flag protocol: however many records arrive within a tick, at most
//! one snapshot is produced for them.

pub mod anomaly;
pub mod metrics;

use crate::config::CustomMetric;
use crate::record::{LogRecord, MetricsSnapshot, TrendPoint};
use crate::store::RecordStore;
use chrono::Utc;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot, Mutex};

/// Publish cadence.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);
/// How often the store is checked against the retention horizon.
pub const PRUNE_INTERVAL: Duration = Duration::from_secs(60 * 60);
/// Records older than this are deleted from the store.
pub const RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);
/// Bound on every history series.
pub const MAX_HISTORY: usize = 20;
/// Key of the synthetic whole-input window.
pub const ALL_WINDOW: &str = "all";

/// Window whose values feed anomaly detection.
const ANOMALY_WINDOW: &str = "1h";
/// Window whose values feed the dashboard trend series.
const TREND_WINDOW: &str = "1m";

const METRICS_BUFFER: usize = 32;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Compute a single `all` snapshot over the whole input instead of
    /// per-tick windows.
    pub one_shot: bool,
    pub custom_metrics: Vec<CustomMetric>,
    pub tick_interval: Duration,
    pub prune_interval: Duration,
    pub retention: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            one_shot: false,
            custom_metrics: Vec::new(),
            tick_interval: TICK_INTERVAL,
            prune_interval: PRUNE_INTERVAL,
            retention: RETENTION,
        }
    }
}

/// The tracked rolling horizons.
fn standard_windows() -> BTreeMap<String, Duration> {
    BTreeMap::from([
        ("1m".to_string(), Duration::from_secs(60)),
        ("5m".to_string(), Duration::from_secs(300)),
        ("1h".to_string(), Duration::from_secs(3600)),
    ])
}

/// Everything the engine mutates, behind one mutex held across insert,
/// prune, compute and publish.
struct EngineState {
    /// Records within the largest tracked horizon, oldest first.
    recent: VecDeque<LogRecord>,
    /// Valid latencies (integer milliseconds) of the recency buffer.
    latencies: Vec<f64>,
    /// Set by insert, cleared by a publishing tick.
    dirty: bool,
    /// The working snapshot; anomalies accumulate for the engine lifetime.
    snapshot: MetricsSnapshot,
    rps_history: Vec<f64>,
    error_rate_history: Vec<f64>,
    latency_history: Vec<f64>,
    last_prune: Instant,
}

pub struct AnalysisEngine {
    store: RecordStore,
    windows: BTreeMap<String, Duration>,
    config: EngineConfig,
    state: Arc<Mutex<EngineState>>,
}

impl AnalysisEngine {
    pub fn new(store: RecordStore, config: EngineConfig) -> Self {
        let state = EngineState {
            recent: VecDeque::new(),
            latencies: Vec::new(),
            dirty: false,
            snapshot: MetricsSnapshot::new(Utc::now()),
            rps_history: Vec::new(),
            error_rate_history: Vec::new(),
            latency_history: Vec::new(),
            last_prune: Instant::now(),
        };

        Self {
            store,
            windows: standard_windows(),
            config,
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Largest tracked horizon; the recency buffer is pruned to it.
    fn max_horizon(&self) -> Duration {
        self.windows.values().copied().max().unwrap_or(Duration::ZERO)
    }

    /// Start the engine loops; returns the metrics subscription.
    ///
    /// The stream closes after the final snapshot once the parsed stream
    /// closes. In one-shot mode exactly one snapshot is published, over the
    /// whole input.
    pub fn start(self, mut records: mpsc::Receiver<LogRecord>) -> mpsc::Receiver<MetricsSnapshot> {
        let (metrics_tx, metrics_rx) = mpsc::channel(METRICS_BUFFER);
        let engine = Arc::new(self);

        if engine.config.one_shot {
            tokio::spawn(async move {
                while let Some(record) = records.recv().await {
                    engine.insert(record).await;
                }
                engine.publish_one_shot(&metrics_tx).await;
                engine.store.close().await;
            });
            return metrics_rx;
        }

        let (done_tx, mut done_rx) = oneshot::channel::<()>();

        let insert_engine = engine.clone();
        tokio::spawn(async move {
            while let Some(record) = records.recv().await {
                insert_engine.insert(record).await;
            }
            // Upstream closed; the dirty flag already covers whatever is
            // still unpublished, so just trigger the final tick.
            let _ = done_tx.send(());
        });

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(engine.config.tick_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        engine.on_tick(&metrics_tx).await;
                    }
                    _ = &mut done_rx => {
                        engine.on_tick(&metrics_tx).await;
                        break;
                    }
                }
            }

            engine.store.close().await;
            // Dropping metrics_tx closes the stream
        });

        metrics_rx
    }

    /// Insert one record under the engine guard: append to the recency
    /// buffer, persist, track its latency, mark dirty, prune.
    async fn insert(&self, record: LogRecord) {
        let mut state = self.state.lock().await;

        state.recent.push_back(record.clone());

        if let Err(e) = self.store.insert(&record).await {
            // Not fatal; the record stays in the recency buffer
            tracing::warn!(error = %e, "Store insert failed");
        }

        if record.has_valid_latency() {
            state.latencies.push(record.latency.as_millis() as f64);
        }

        state.dirty = true;

        // In one-shot mode the only active window is `all`, which is
        // unbounded; nothing may be pruned.
        if !self.config.one_shot {
            Self::prune_recent(&mut state, self.max_horizon());
        }
    }

    /// Drop recency-buffer records older than the largest horizon and
    /// rebuild the latency vector from what remains.
    fn prune_recent(state: &mut EngineState, horizon: Duration) {
        let Ok(horizon) = chrono::Duration::from_std(horizon) else {
            return;
        };
        let cutoff = Utc::now() - horizon;

        let EngineState { recent, latencies, .. } = state;
        while recent.front().is_some_and(|r| r.timestamp < cutoff) {
            recent.pop_front();
        }

        latencies.clear();
        for record in recent.iter() {
            if record.has_valid_latency() {
                latencies.push(record.latency.as_millis() as f64);
            }
        }
    }

    /// One tick: publish if dirty, then check store retention.
    async fn on_tick(&self, metrics_tx: &mpsc::Sender<MetricsSnapshot>) {
        let mut state = self.state.lock().await;

        if state.dirty {
            let mut windows = BTreeMap::new();
            for (name, horizon) in &self.windows {
                match self.store.records_in_window(*horizon).await {
                    Ok(records) => {
                        windows.insert(
                            name.clone(),
                            metrics::compute_windowed(
                                &records,
                                *horizon,
                                &self.config.custom_metrics,
                            ),
                        );
                    }
                    Err(e) => {
                        // The window sits this tick out; the others publish
                        tracing::warn!(error = %e, window = %name, "Window query failed");
                    }
                }
            }
            state.snapshot.windows = windows;

            self.detect_and_record(&mut state);

            let snapshot = state.snapshot.clone();
            if metrics_tx.send(snapshot).await.is_err() {
                tracing::debug!("Metrics subscriber gone");
            }
            state.dirty = false;
        }

        if state.last_prune.elapsed() > self.config.prune_interval {
            if let Ok(retention) = chrono::Duration::from_std(self.config.retention) {
                match self.store.prune(Utc::now() - retention).await {
                    Ok(deleted) => {
                        tracing::debug!(deleted, "Store retention prune");
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Store retention prune failed");
                    }
                }
            }
            state.last_prune = Instant::now();
        }
    }

    /// Compute the whole-input report and publish the single snapshot.
    async fn publish_one_shot(&self, metrics_tx: &mpsc::Sender<MetricsSnapshot>) {
        let mut state = self.state.lock().await;

        let records: Vec<LogRecord> = state.recent.iter().cloned().collect();
        let all = metrics::compute_windowed(&records, Duration::ZERO, &self.config.custom_metrics);

        state.snapshot.windows = BTreeMap::from([(ALL_WINDOW.to_string(), all)]);
        self.detect_and_record(&mut state);
        state.dirty = false;

        let snapshot = state.snapshot.clone();
        drop(state);

        if metrics_tx.send(snapshot).await.is_err() {
            tracing::debug!("Metrics subscriber gone before the one-shot report");
        }
    }

    /// Run anomaly detection against the fresh windows, then record this
    /// tick's history and trend samples.
    fn detect_and_record(&self, state: &mut EngineState) {
        // Detection sees the history *before* this tick's sample
        if let Some(current) = state.snapshot.windows.get(ANOMALY_WINDOW).cloned() {
            let found = anomaly::detect(
                &current,
                &state.rps_history,
                &state.error_rate_history,
                &state.latency_history,
            );
            state.snapshot.anomalies.extend(found);

            push_bounded(&mut state.rps_history, current.rps);
            push_bounded(&mut state.error_rate_history, current.error_rate);
            push_bounded(
                &mut state.latency_history,
                current.p95_latency.as_millis() as f64,
            );
        }

        let trend = state
            .snapshot
            .windows
            .get(TREND_WINDOW)
            .or_else(|| state.snapshot.windows.get(ALL_WINDOW))
            .cloned();
        if let Some(wm) = trend {
            state.snapshot.trend_history.push(TrendPoint {
                rps: wm.rps,
                p95_latency: wm.p95_latency,
                error_rate: wm.error_rate,
            });
            if state.snapshot.trend_history.len() > MAX_HISTORY {
                state.snapshot.trend_history.remove(0);
            }
        }
    }
}

fn push_bounded(history: &mut Vec<f64>, value: f64) {
    history.push(value);
    if history.len() > MAX_HISTORY {
        history.remove(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{LogLevel, WindowedMetrics};
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    fn test_config(one_shot: bool) -> EngineConfig {
        EngineConfig {
            one_shot,
            tick_interval: Duration::from_millis(20),
            ..EngineConfig::default()
        }
    }

    fn record(status: u16, latency_ms: u64) -> LogRecord {
        let mut record = LogRecord::bare(Utc::now(), format!("status {}", status), LogLevel::Info);
        record.status_code = status;
        record.latency = Duration::from_millis(latency_ms);
        record.endpoint = "/api".to_string();
        record
    }

    async fn test_engine(one_shot: bool) -> AnalysisEngine {
        let store = RecordStore::open_in_memory().await.unwrap();
        AnalysisEngine::new(store, test_config(one_shot))
    }

    #[tokio::test]
    async fn test_streaming_publishes_once_per_burst() {
        let engine = test_engine(false).await;
        let (tx, rx) = mpsc::channel(64);
        let mut metrics_rx = engine.start(rx);

        for _ in 0..4 {
            tx.send(record(200, 5)).await.unwrap();
        }
        tx.send(record(500, 5)).await.unwrap();

        // A tick may fire mid-burst; poll until the totals settle
        let deadline = tokio::time::Instant::now() + WAIT;
        let wm = loop {
            assert!(tokio::time::Instant::now() < deadline, "burst never settled");
            let snapshot = timeout(WAIT, metrics_rx.recv()).await.unwrap().unwrap();
            let wm = snapshot.windows["1m"].clone();
            assert!(wm.total_errors <= wm.total_requests);
            if wm.total_requests == 5 {
                break wm;
            }
        };
        assert_eq!(wm.total_errors, 1);
        assert_eq!(wm.error_rate, 20.0);

        // Nothing new arrived, so no further snapshot is published
        let quiet = timeout(Duration::from_millis(200), metrics_rx.recv()).await;
        assert!(quiet.is_err());
    }

    #[tokio::test]
    async fn test_stream_closes_after_upstream_close() {
        let engine = test_engine(false).await;
        let (tx, rx) = mpsc::channel(64);
        let mut metrics_rx = engine.start(rx);

        tx.send(record(200, 1)).await.unwrap();
        drop(tx);

        // The pending record is published, then the stream closes
        let snapshot = timeout(WAIT, metrics_rx.recv()).await.unwrap().unwrap();
        assert_eq!(snapshot.windows["1m"].total_requests, 1);

        let mut extra = 0;
        while timeout(WAIT, metrics_rx.recv()).await.unwrap().is_some() {
            extra += 1;
        }
        assert!(extra <= 1, "{} snapshots after the final tick", extra);
    }

    #[tokio::test]
    async fn test_one_shot_publishes_exactly_one_all_snapshot() {
        let engine = test_engine(true).await;
        let (tx, rx) = mpsc::channel(64);
        let mut metrics_rx = engine.start(rx);

        for _ in 0..4 {
            tx.send(record(200, 5)).await.unwrap();
        }
        tx.send(record(500, 5)).await.unwrap();
        drop(tx);

        let snapshot = timeout(WAIT, metrics_rx.recv()).await.unwrap().unwrap();
        assert_eq!(snapshot.windows.len(), 1);

        let all = &snapshot.windows[ALL_WINDOW];
        assert_eq!(all.total_requests, 5);
        assert_eq!(all.error_rate, 20.0);
        // RPS is not reported for the synthetic window
        assert_eq!(all.rps, 0.0);

        assert!(timeout(WAIT, metrics_rx.recv()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_records_persist_to_store() {
        let store = RecordStore::open_in_memory().await.unwrap();
        let engine = AnalysisEngine::new(store.clone(), test_config(false));
        let (tx, rx) = mpsc::channel(64);
        let mut metrics_rx = engine.start(rx);

        tx.send(record(200, 1)).await.unwrap();
        let _ = timeout(WAIT, metrics_rx.recv()).await.unwrap().unwrap();

        let persisted = store
            .records_since(chrono::DateTime::from_timestamp_millis(0).unwrap())
            .await
            .unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].status_code, 200);
    }

    // Drive detect_and_record directly to cover the multi-tick anomaly
    // scenarios without waiting out real tick intervals.
    fn put_window(state: &mut EngineState, name: &str, rps: f64) {
        state.snapshot.windows.insert(
            name.to_string(),
            WindowedMetrics {
                rps,
                ..WindowedMetrics::default()
            },
        );
    }

    #[tokio::test]
    async fn test_rps_spike_flagged_on_21st_tick() {
        let engine = test_engine(false).await;
        let mut state = engine.state.lock().await;

        for _ in 0..20 {
            put_window(&mut state, ANOMALY_WINDOW, 1.0);
            engine.detect_and_record(&mut state);
        }
        assert!(state.snapshot.anomalies.is_empty());

        put_window(&mut state, ANOMALY_WINDOW, 50.0);
        engine.detect_and_record(&mut state);

        assert!(state
            .snapshot
            .anomalies
            .iter()
            .any(|a| a.kind == "RPS Anomaly"));
    }

    #[tokio::test]
    async fn test_baseline_drift_flagged_after_step_change() {
        let engine = test_engine(false).await;
        let mut state = engine.state.lock().await;

        for _ in 0..20 {
            put_window(&mut state, ANOMALY_WINDOW, 1.0);
            engine.detect_and_record(&mut state);
        }
        for _ in 0..10 {
            put_window(&mut state, ANOMALY_WINDOW, 2.0);
            engine.detect_and_record(&mut state);
        }

        assert!(state
            .snapshot
            .anomalies
            .iter()
            .any(|a| a.kind == "Baseline Drift"));
    }

    #[tokio::test]
    async fn test_trend_history_is_bounded() {
        let engine = test_engine(false).await;
        let mut state = engine.state.lock().await;

        for i in 0..50 {
            put_window(&mut state, TREND_WINDOW, i as f64);
            engine.detect_and_record(&mut state);
            assert!(state.snapshot.trend_history.len() <= MAX_HISTORY);
        }
        assert_eq!(state.snapshot.trend_history.len(), MAX_HISTORY);
        // Oldest samples fell off the front
        assert_eq!(state.snapshot.trend_history[0].rps, 30.0);
    }

    #[tokio::test]
    async fn test_recency_buffer_pruned_to_largest_horizon() {
        let engine = test_engine(false).await;

        let mut old = record(200, 5);
        old.timestamp = Utc::now() - chrono::Duration::hours(2);
        engine.insert(old).await;
        engine.insert(record(200, 7)).await;

        let state = engine.state.lock().await;
        assert_eq!(state.recent.len(), 1);
        assert_eq!(state.latencies, vec![7.0]);
    }
}
