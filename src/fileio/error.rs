use std::path::PathBuf;

use thiserror::Error;

use super::Order;

/// Failure to build, open or query a fingerprint file.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("could not open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file does not start with [`FORMAT_MAGIC`](super::FORMAT_MAGIC).
    #[error("{} is not a fingerprint file (magic {found:#010x})", path.display())]
    InvalidMagic { path: PathBuf, found: u32 },

    #[error("JSON header for {} does not contain '{field}' attribute", path.display())]
    MissingField { path: PathBuf, field: &'static str },

    #[error("invalid JSON header in {}: {source}", path.display())]
    InvalidHeader {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("{} is truncated: expected {expected} payload bytes, found {found}", path.display())]
    Truncated {
        path: PathBuf,
        expected: u64,
        found: u64,
    },

    /// Header fields that parse but contradict each other.
    #[error("inconsistent header in {}: {reason}", path.display())]
    InconsistentHeader { path: PathBuf, reason: String },

    #[error("{} is stored {found:?}, expected {expected:?}", path.display())]
    WrongOrder {
        path: PathBuf,
        expected: Order,
        found: Order,
    },

    /// A stored fingerprint has bits set past its declared width.
    #[error("fingerprint {index} in {} has bits set past its width", path.display())]
    CorruptFingerprint { path: PathBuf, index: usize },

    #[error("fingerprint width {found} does not match index width {expected}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("unsupported word size: {0} bits per word")]
    UnsupportedWordSize(u32),

    #[error("index holds at most {capacity} fingerprints")]
    CapacityExceeded { capacity: usize },
}

pub type Result<T> = std::result::Result<T, IndexError>;
