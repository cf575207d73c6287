use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("CSV file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("{0} already exists and overwrite is disabled")]
    FileExists(PathBuf),

    #[error("Failed to create directory '{0}'")]
    DirCreation(PathBuf, #[source] std::io::Error),

    #[error("I/O error on table file '{0}'")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Failed to read or write CSV table '{0}'")]
    Csv(PathBuf, #[source] PolarsError),

    #[error("Required column '{0}' not found in DataFrame")]
    MissingColumn(String, #[source] PolarsError),

    #[error("Failed processing DataFrame: {0}")]
    DataFrameProcessing(#[from] PolarsError),

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}
