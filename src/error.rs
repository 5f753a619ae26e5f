use std::io;
use std::path::PathBuf;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Load errors – raw acquisition files
// ---------------------------------------------------------------------------

/// A sample's raw files could not be turned into a [`Spectrum`](crate::data::model::Spectrum).
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("missing file {}", .0.display())]
    Missing(PathBuf),

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}: missing acquisition parameter {key}", .path.display())]
    MissingParameter { path: PathBuf, key: &'static str },

    #[error("{}: invalid value {value:?} for {key}", .path.display())]
    InvalidParameter {
        path: PathBuf,
        key: &'static str,
        value: String,
    },

    #[error("{}: {len} bytes is not a whole number of 32-bit samples", .path.display())]
    TruncatedTrace { path: PathBuf, len: u64 },

    #[error("{}: trace holds {found} points but parameters declare {declared}", .path.display())]
    TraceLength {
        path: PathBuf,
        declared: usize,
        found: usize,
    },

    #[error("{}: calibration produced an invalid mass axis: {source}", .path.display())]
    Calibration {
        path: PathBuf,
        #[source]
        source: ProcessingError,
    },
}

// ---------------------------------------------------------------------------
// Processing errors – a stage received or would produce an invalid spectrum
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProcessingError {
    #[error("spectrum is empty")]
    Empty,

    #[error("mz has {mz} values but intensity has {intensity}")]
    LengthMismatch { mz: usize, intensity: usize },

    #[error("mz is not strictly increasing at index {index}")]
    NonMonotonic { index: usize },

    #[error("non-finite {axis} value at index {index}")]
    NonFinite { axis: &'static str, index: usize },

    #[error("{stage}: spectrum has {len} points, at least {required} required")]
    TooShort {
        stage: &'static str,
        len: usize,
        required: usize,
    },

    #[error("{stage}: intensity norm is {norm}, cannot normalize")]
    DegenerateNorm { stage: &'static str, norm: f64 },

    #[error("{stage}: {message}")]
    InvalidParameter { stage: &'static str, message: String },

    #[error("feature row has {found} values, expected {expected}")]
    RowLength { expected: usize, found: usize },
}

// ---------------------------------------------------------------------------
// Per-sample outcome
// ---------------------------------------------------------------------------

/// Why a single sample was left out of the corpus.
#[derive(Debug, Error)]
pub enum SampleError {
    #[error("load failed: {0}")]
    Load(#[from] LoadError),

    #[error("processing failed: {0}")]
    Processing(#[from] ProcessingError),
}

// ---------------------------------------------------------------------------
// Embedding
// ---------------------------------------------------------------------------

/// Too few samples survived to run the embedding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("insufficient data: {found} sample(s) collected, at least {required} required")]
pub struct InsufficientDataError {
    pub found: usize,
    pub required: usize,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EmbeddingError {
    #[error("row {row} has {found} features, expected {expected}")]
    RaggedMatrix {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("feature rows are empty")]
    NoFeatures,

    #[error("non-finite feature at row {row}, column {column}")]
    NonFinite { row: usize, column: usize },

    #[error("{0} labels for {1} rows")]
    LabelMismatch(usize, usize),

    #[error("invalid embedding parameter: {0}")]
    InvalidParameter(String),
}
