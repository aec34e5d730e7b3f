//! `replay` command: play a finished log file back through the pipeline.

use anyhow::Result;
use pulsewatch::config;
use pulsewatch::dashboard;
use pulsewatch::engine::EngineConfig;
use pulsewatch::ingest::Source;
use pulsewatch::pipeline;
use pulsewatch::store::RecordStore;
use std::path::PathBuf;
use tokio::sync::broadcast;

pub async fn execute(
    file: PathBuf,
    speed: f64,
    db: PathBuf,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let cfg = config::load_config(config_path.as_deref())?;
    let custom_metrics = config::compile_custom_metrics(&cfg)?;

    let (shutdown, _) = broadcast::channel(16);
    super::spawn_signal_handler(shutdown.clone());

    let store = RecordStore::open(&db).await?;
    let engine_config = EngineConfig {
        custom_metrics,
        ..EngineConfig::default()
    };

    let source = Source::Replay { path: file, speed };
    let pipeline = pipeline::start(source, store, engine_config, shutdown.clone()).await?;

    dashboard::run(pipeline, shutdown).await
}
