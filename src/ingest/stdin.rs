//! Standard input ingestion. Reads to EOF; no follow.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};

pub fn spawn(tx: mpsc::Sender<String>, mut shutdown: broadcast::Receiver<()>) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            tokio::select! {
                next = lines.next_line() => match next {
                    Ok(Some(line)) => {
                        if tx.send(line).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::error!(error = %e, "Read from stdin failed");
                        break;
                    }
                },
                _ = shutdown.recv() => break,
            }
        }
    });
}
