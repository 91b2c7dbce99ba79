use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EtymologyError>;

/// Errors that stop a run. Problems local to one markup line never surface
/// here; the interpreter leaves the affected fields unset and moves on.
#[derive(Debug, Error)]
pub enum EtymologyError {
    /// A required lookup table could not be opened or read
    #[error("Failed to read table {path}: {source}")]
    TableRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A lookup table row does not have the expected shape
    #[error("Malformed table {path} at line {line}: {reason}")]
    TableFormat {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// The run configuration file could not be read
    #[error("Failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The run configuration file is not valid YAML for our schema
    #[error("Failed to parse config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EtymologyError {
    pub fn table_format(path: impl Into<PathBuf>, line: usize, reason: impl Into<String>) -> Self {
        Self::TableFormat {
            path: path.into(),
            line,
            reason: reason.into(),
        }
    }

    /// True for errors that mean the lookup tables are unusable
    pub fn is_table_error(&self) -> bool {
        matches!(self, Self::TableRead { .. } | Self::TableFormat { .. })
    }
}
