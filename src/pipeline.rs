//! Pipeline wiring: ingest → fan-out → {parser → engine}, {raw-log feed}.
//!
//! Every stage is a long-lived task joined by bounded channels; end of
//! stream propagates by channel closure, cancellation by the shutdown
//! broadcast. Within one source, line order is preserved through fan-out
//! and parser, so the raw-log view and the metrics view always describe the
//! same prefix of input.

use crate::engine::{AnalysisEngine, EngineConfig};
use crate::error::PulseError;
use crate::ingest::Source;
use crate::parser::ParserChain;
use crate::record::{LogRecord, MetricsSnapshot};
use crate::store::RecordStore;
use tokio::sync::{broadcast, mpsc};

const CHANNEL_CAPACITY: usize = 1024;

/// The two subscriptions the dashboard consumes.
pub struct Pipeline {
    pub metrics_rx: mpsc::Receiver<MetricsSnapshot>,
    pub raw_log_rx: mpsc::Receiver<String>,
}

/// Open the source and wire up the pipeline tasks.
///
/// Fatal open errors surface here; afterwards the pipeline only emits
/// diagnostics and runs until the source ends or shutdown fires.
pub async fn start(
    source: Source,
    store: RecordStore,
    engine_config: EngineConfig,
    shutdown: broadcast::Sender<()>,
) -> Result<Pipeline, PulseError> {
    let lines_rx = source.open(shutdown.clone()).await?;

    let (parse_tx, parse_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (raw_tx, raw_log_rx) = mpsc::channel(CHANNEL_CAPACITY);
    tokio::spawn(fan_out(lines_rx, parse_tx, raw_tx, shutdown.subscribe()));

    let (record_tx, record_rx) = mpsc::channel(CHANNEL_CAPACITY);
    tokio::spawn(parse_task(parse_rx, record_tx));

    let engine = AnalysisEngine::new(store, engine_config);
    let metrics_rx = engine.start(record_rx);

    Ok(Pipeline {
        metrics_rx,
        raw_log_rx,
    })
}

/// Deliver each line to the parser feed first, then the raw-log feed,
/// before accepting the next line. Both outputs close together.
async fn fan_out(
    mut lines: mpsc::Receiver<String>,
    parse_tx: mpsc::Sender<String>,
    raw_tx: mpsc::Sender<String>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            next = lines.recv() => match next {
                Some(line) => {
                    if parse_tx.send(line.clone()).await.is_err() {
                        break;
                    }
                    if raw_tx.send(line).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
            _ = shutdown.recv() => break,
        }
    }
}

async fn parse_task(mut lines: mpsc::Receiver<String>, records: mpsc::Sender<LogRecord>) {
    let chain = ParserChain::standard();
    while let Some(line) = lines.recv().await {
        if records.send(chain.parse(&line)).await.is_err() {
            break;
        }
    }
}
