//! Ingest sources.
//!
//! Each variant opens into a bounded stream of raw lines, emitted in source
//! order. Producers block when the buffer is full — lines are never dropped —
//! and observe the shutdown broadcast, emitting at most one pending line
//! after cancellation. End of input or cancellation closes the stream.

mod replay;
mod stdin;
mod tail;

use crate::error::PulseError;
use std::path::PathBuf;
use tokio::sync::{broadcast, mpsc};

/// Capacity of the line buffer between a source and the fan-out.
pub const LINE_BUFFER: usize = 1024;

/// A source of raw log lines.
#[derive(Debug, Clone)]
pub enum Source {
    /// Tail a file: scan it once, or seek to the end and follow appends
    /// (reopening transparently on rotation).
    File { path: PathBuf, initial_scan: bool },
    /// Read standard input to EOF.
    Stdin,
    /// Re-emit a file's lines with an inter-line delay of `1000 / speed`
    /// milliseconds.
    Replay { path: PathBuf, speed: f64 },
}

impl Source {
    /// True when the whole input is consumed up front and the pipeline
    /// should produce a single report over it.
    pub fn is_one_shot(&self) -> bool {
        matches!(self, Self::File { initial_scan: true, .. })
    }

    /// Open the source and start its producer task.
    ///
    /// Fatal problems (missing file, nonsensical replay speed) surface
    /// here, before anything runs.
    pub async fn open(
        self,
        shutdown: broadcast::Sender<()>,
    ) -> Result<mpsc::Receiver<String>, PulseError> {
        let (tx, rx) = mpsc::channel(LINE_BUFFER);

        match self {
            Self::File { path, initial_scan } => {
                if initial_scan {
                    tail::spawn_scan(path, tx, shutdown.subscribe()).await?;
                } else {
                    tail::spawn_follow(path, tx, shutdown.subscribe()).await?;
                }
            }
            Self::Stdin => stdin::spawn(tx, shutdown.subscribe()),
            Self::Replay { path, speed } => {
                replay::spawn(path, speed, tx, shutdown.subscribe()).await?;
            }
        }

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_missing_file_is_fatal() {
        let (shutdown, _) = broadcast::channel(1);
        let source = Source::File {
            path: PathBuf::from("/nonexistent/missing.log"),
            initial_scan: true,
        };

        let result = source.open(shutdown).await;
        assert!(matches!(result, Err(PulseError::SourceOpen { .. })));
    }

    #[tokio::test]
    async fn test_open_bad_replay_speed_is_fatal() {
        let (shutdown, _) = broadcast::channel(1);
        let source = Source::Replay {
            path: PathBuf::from("whatever.log"),
            speed: 0.0,
        };

        let result = source.open(shutdown).await;
        assert!(matches!(result, Err(PulseError::Config(_))));
    }

    #[test]
    fn test_one_shot_only_for_initial_scan() {
        assert!(Source::File {
            path: PathBuf::from("a.log"),
            initial_scan: true
        }
        .is_one_shot());
        assert!(!Source::File {
            path: PathBuf::from("a.log"),
            initial_scan: false
        }
        .is_one_shot());
        assert!(!Source::Stdin.is_one_shot());
        assert!(!Source::Replay {
            path: PathBuf::from("a.log"),
            speed: 1.0
        }
        .is_one_shot());
    }
}
