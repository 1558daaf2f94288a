use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexerError>;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid blog directory: {0}")]
    InvalidPath(String),

    #[error("Directory scan failed for {path}: {source}")]
    Scan {
        path: String,
        source: std::io::Error,
    },

    #[error("{0}")]
    Other(String),
}
