use std::fmt;
use std::path::PathBuf;

/// Pipeline-level error types.
///
/// Only source open and store open are fatal; everything else inside the
/// pipeline is contained to its unit and surfaced as a diagnostic.
#[derive(Debug)]
pub enum PulseError {
    /// Configuration error (bad custom-metric declaration, bad replay speed)
    Config(String),
    /// Ingest source could not be opened; fatal at startup
    SourceOpen { path: PathBuf, source: std::io::Error },
    /// Embedded store error
    Store(sqlx::Error),
    /// Internal invariant violated (e.g. negative window horizon)
    InvalidWindow(String),
}

impl fmt::Display for PulseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "Configuration error: {}", msg),
            Self::SourceOpen { path, source } => {
                write!(f, "Cannot open {}: {}", path.display(), source)
            }
            Self::Store(err) => write!(f, "Store error: {}", err),
            Self::InvalidWindow(msg) => write!(f, "Invalid window: {}", msg),
        }
    }
}

impl std::error::Error for PulseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::SourceOpen { source, .. } => Some(source),
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for PulseError {
    fn from(err: sqlx::Error) -> Self {
        Self::Store(err)
    }
}

impl From<regex::Error> for PulseError {
    fn from(err: regex::Error) -> Self {
        Self::Config(format!("invalid regex: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PulseError::Config("speed must be positive".to_string());
        assert_eq!(err.to_string(), "Configuration error: speed must be positive");
    }

    #[test]
    fn test_source_open_carries_path() {
        let err = PulseError::SourceOpen {
            path: PathBuf::from("/var/log/missing.log"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(err.to_string().contains("/var/log/missing.log"));
    }
}
