use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LauncherError {
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("invalid glob pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("failed to start action '{program}': {source}")]
    ActionSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("action '{program}' {status}")]
    ActionFailed { program: String, status: String },

    #[error("history directory {path} could not be created: {source}")]
    HistoryDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("history backend error: {0}")]
    History(String),

    #[error("malformed history query output: {0}")]
    QueryOutput(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, LauncherError>;
