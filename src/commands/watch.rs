//! `watch` command: tail a file (or stdin) into the live pipeline.

use anyhow::Result;
use pulsewatch::config;
use pulsewatch::dashboard::{self, report};
use pulsewatch::engine::EngineConfig;
use pulsewatch::ingest::Source;
use pulsewatch::pipeline;
use pulsewatch::store::RecordStore;
use std::path::PathBuf;
use tokio::sync::broadcast;

pub async fn execute(
    file: Option<PathBuf>,
    initial_scan: bool,
    db: PathBuf,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let cfg = config::load_config(config_path.as_deref())?;
    let custom_metrics = config::compile_custom_metrics(&cfg)?;

    let source = match file {
        Some(path) => Source::File { path, initial_scan },
        None => Source::Stdin,
    };
    let one_shot = source.is_one_shot();

    let (shutdown, _) = broadcast::channel(16);
    super::spawn_signal_handler(shutdown.clone());

    let store = RecordStore::open(&db).await?;
    let engine_config = EngineConfig {
        one_shot,
        custom_metrics,
        ..EngineConfig::default()
    };

    let pipeline = pipeline::start(source, store, engine_config, shutdown.clone()).await?;

    if one_shot {
        report::run(pipeline).await
    } else {
        dashboard::run(pipeline, shutdown).await
    }
}
