use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures while reading or preparing a dataset.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unsupported data file {0}: expected .mat, .npz or .safetensors")]
    UnsupportedFormat(PathBuf),

    #[error("table '{0}' not found in data file")]
    MissingTable(String),

    #[error("table '{name}' must be two-dimensional, got shape {shape:?}")]
    NotMatrix { name: String, shape: Vec<usize> },

    #[error("sensor table has {features} rows but pose table has {labels}")]
    RowMismatch { features: usize, labels: usize },

    #[error("theta transform needs at least 4 pose columns, got {0}")]
    TooFewColumns(usize),

    #[error("train ratio must be within [0, 1], got {0}")]
    TrainRatio(f64),

    #[error("target column {column} is out of range for {available} pose columns")]
    TargetColumn { column: usize, available: usize },

    #[error("malformed data file: {0}")]
    Format(String),

    #[error(transparent)]
    Candle(#[from] candle_core::Error),
}

impl DataError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Candle(#[from] candle_core::Error),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("invalid network configuration: {0}")]
    InvalidConfig(String),

    #[error("training diverged in epoch {epoch}: loss is {loss}")]
    Diverged { epoch: usize, loss: f32 },
}

pub type Result<T> = std::result::Result<T, Error>;
