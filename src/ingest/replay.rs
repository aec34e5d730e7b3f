//! Timed replay of a finished log file.

use crate::error::PulseError;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

/// Load the whole file, then emit lines one by one with an inter-line delay
/// of `1000 / speed` milliseconds. Cancellation is honored between
/// emissions.
pub async fn spawn(
    path: PathBuf,
    speed: f64,
    tx: mpsc::Sender<String>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), PulseError> {
    if !speed.is_finite() || speed <= 0.0 {
        return Err(PulseError::Config(format!(
            "replay speed must be positive, got {}",
            speed
        )));
    }

    let content = match tokio::fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(source) => return Err(PulseError::SourceOpen { path, source }),
    };

    let delay = Duration::from_secs_f64(1.0 / speed);

    tokio::spawn(async move {
        for line in content.lines() {
            tokio::select! {
                sent = tx.send(line.to_string()) => {
                    if sent.is_err() {
                        return;
                    }
                }
                _ = shutdown.recv() => return,
            }
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.recv() => return,
            }
        }
    });

    Ok(())
}
