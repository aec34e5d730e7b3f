//! File tailing: one-shot scan and polling follower.

use crate::error::PulseError;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio::sync::{broadcast, mpsc};

/// How often the follower checks the file for growth or rotation.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

async fn open_file(path: &Path) -> Result<File, PulseError> {
    File::open(path).await.map_err(|source| PulseError::SourceOpen {
        path: path.to_path_buf(),
        source,
    })
}

/// Read the file start to end once, then close the stream.
pub async fn spawn_scan(
    path: PathBuf,
    tx: mpsc::Sender<String>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), PulseError> {
    let file = open_file(&path).await?;

    tokio::spawn(async move {
        let mut lines = BufReader::new(file).lines();
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
                        tracing::error!(error = %e, path = %path.display(), "Read failed during scan");
                        break;
                    }
                },
                _ = shutdown.recv() => break,
            }
        }
    });

    Ok(())
}

/// Seek to the end of the file and emit newly appended lines, reopening
/// from offset zero when the file shrinks or is replaced.
pub async fn spawn_follow(
    path: PathBuf,
    tx: mpsc::Sender<String>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), PulseError> {
    let mut file = open_file(&path).await?;
    let mut pos = file
        .seek(SeekFrom::End(0))
        .await
        .map_err(|source| PulseError::SourceOpen {
            path: path.clone(),
            source,
        })?;

    tokio::spawn(async move {
        let mut reader = BufReader::new(file);
        let mut ticker = tokio::time::interval(POLL_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match tokio::fs::metadata(&path).await {
                        Ok(meta) if meta.len() < pos => {
                            // Rotated or truncated: reopen from the start
                            match File::open(&path).await {
                                Ok(f) => {
                                    tracing::info!(path = %path.display(), "Log file rotated, reopening");
                                    reader = BufReader::new(f);
                                    pos = 0;
                                }
                                Err(e) => {
                                    tracing::warn!(error = %e, path = %path.display(), "Reopen after rotation failed");
                                    continue;
                                }
                            }
                        }
                        Ok(_) => {}
                        // Mid-rotation gap; retry on the next poll
                        Err(_) => continue,
                    }

                    if !drain_new_lines(&mut reader, &mut pos, &tx).await {
                        return;
                    }
                }
                _ = shutdown.recv() => break,
            }
        }
    });

    Ok(())
}

/// Emit every complete line past `pos`. A trailing partial line is left in
/// place (the reader rewinds to `pos`) until the writer finishes it.
/// Returns false when the consumer is gone.
async fn drain_new_lines(
    reader: &mut BufReader<File>,
    pos: &mut u64,
    tx: &mpsc::Sender<String>,
) -> bool {
    loop {
        let mut buf = String::new();
        match reader.read_line(&mut buf).await {
            Ok(0) => return true,
            Ok(n) => {
                if buf.ends_with('\n') {
                    *pos += n as u64;
                    let line = buf.trim_end_matches(['\r', '\n']).to_string();
                    if tx.send(line).await.is_err() {
                        return false;
                    }
                } else {
                    return reader.seek(SeekFrom::Start(*pos)).await.is_ok();
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Read failed while tailing");
                return true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_scan_reads_whole_file_then_closes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "first").unwrap();
        writeln!(file, "second").unwrap();
        file.flush().unwrap();

        let (tx, mut rx) = mpsc::channel(16);
        let (shutdown, _) = broadcast::channel(1);
        spawn_scan(file.path().to_path_buf(), tx, shutdown.subscribe())
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap(), "first");
        assert_eq!(rx.recv().await.unwrap(), "second");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_follow_emits_appended_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "already there").unwrap();
        file.flush().unwrap();

        let (tx, mut rx) = mpsc::channel(16);
        let (shutdown, _) = broadcast::channel(1);
        spawn_follow(file.path().to_path_buf(), tx, shutdown.subscribe())
            .await
            .unwrap();

        // Pre-existing content is skipped; only appends show up
        writeln!(file, "appended").unwrap();
        file.flush().unwrap();

        let line = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(line, "appended");
    }

    #[tokio::test]
    async fn test_follow_stops_on_shutdown() {
        let file = tempfile::NamedTempFile::new().unwrap();

        let (tx, mut rx) = mpsc::channel(16);
        let (shutdown, _) = broadcast::channel(1);
        spawn_follow(file.path().to_path_buf(), tx, shutdown.subscribe())
            .await
            .unwrap();

        shutdown.send(()).unwrap();

        // Channel closes promptly once the follower observes the signal
        let closed = timeout(WAIT, rx.recv()).await.unwrap();
        assert!(closed.is_none());
    }
}
