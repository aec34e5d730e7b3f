use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "pulsewatch",
    version,
    about = "Real-time log analytics with a live terminal dashboard"
)]
pub struct Cli {
    /// Custom-metrics configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Embedded database file
    #[arg(long, global = true, default_value = "pulsewatch.db")]
    pub db: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Watch a log file in real time (stdin when no file is given)
    Watch {
        /// Log file to tail
        file: Option<PathBuf>,

        /// Process the existing content once and print a report instead of
        /// following
        #[arg(short, long)]
        initial_scan: bool,
    },

    /// Replay a finished log file through the pipeline
    Replay {
        /// Log file to replay
        file: PathBuf,

        /// Speed multiplier for the emission rate
        #[arg(short, long, default_value = "1.0")]
        speed: f64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_defaults_to_stdin() {
        let cli = Cli::try_parse_from(["pulsewatch", "watch"]).unwrap();

        match cli.command {
            Commands::Watch { file, initial_scan } => {
                assert!(file.is_none());
                assert!(!initial_scan);
            }
            _ => panic!("Expected Watch command"),
        }
        assert_eq!(cli.db, PathBuf::from("pulsewatch.db"));
    }

    #[test]
    fn test_watch_with_initial_scan() {
        let cli =
            Cli::try_parse_from(["pulsewatch", "watch", "access.log", "--initial-scan"]).unwrap();

        match cli.command {
            Commands::Watch { file, initial_scan } => {
                assert_eq!(file, Some(PathBuf::from("access.log")));
                assert!(initial_scan);
            }
            _ => panic!("Expected Watch command"),
        }
    }

    #[test]
    fn test_replay_speed() {
        let cli =
            Cli::try_parse_from(["pulsewatch", "replay", "old.log", "--speed", "10"]).unwrap();

        match cli.command {
            Commands::Replay { file, speed } => {
                assert_eq!(file, PathBuf::from("old.log"));
                assert_eq!(speed, 10.0);
            }
            _ => panic!("Expected Replay command"),
        }
    }

    #[test]
    fn test_replay_requires_file() {
        assert!(Cli::try_parse_from(["pulsewatch", "replay"]).is_err());
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::try_parse_from([
            "pulsewatch",
            "watch",
            "--db",
            "/tmp/other.db",
            "--config",
            "metrics.yaml",
        ])
        .unwrap();

        assert_eq!(cli.db, PathBuf::from("/tmp/other.db"));
        assert_eq!(cli.config, Some(PathBuf::from("metrics.yaml")));
    }
}
