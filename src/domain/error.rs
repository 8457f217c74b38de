// Domain errors
use thiserror::Error;

pub type ChartResult<T> = Result<T, ChartError>;

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("unknown value type [{0}], expected one of: numeric, timestamp")]
    UnknownValueType(String),

    #[error("value type [{0}] is already registered")]
    DuplicateValueType(String),

    #[error("series index out of range: index={index}, len={len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("dataset requires at least one series")]
    NoSeries,

    #[error("invalid field path [{path}]: {reason}")]
    InvalidFieldPath { path: String, reason: String },

    #[error("event has no field at [{0}]")]
    MissingField(String),

    #[error("cannot decode {value} as {tag}: {reason}")]
    Decode {
        tag: String,
        value: String,
        reason: String,
    },

    #[error("chart geometry not initialized")]
    GeometryNotInitialized,

    #[error("chart was built for {expected} series, dataset has {actual}")]
    SeriesCountMismatch { expected: usize, actual: usize },
}
