//! On-disk fingerprint storage.
//!
//! Two layouts are provided. [`row_major`] stores whole fingerprints back
//! to back for similarity searches. [`inverted`] stores one bitmap per
//! fingerprint bit for substructure pre-filtering. Row-major files use the
//! generic [`binary`] container with a JSON header; the inverted index has
//! a fixed native header. Both start with [`FORMAT_MAGIC`].

pub mod binary;
mod error;
pub mod header;
pub mod inverted;
pub mod row_major;

pub use binary::{BinaryInputFile, BinaryOutputFile, FileStatus};
pub use error::{IndexError, Result};
pub use header::{FingerprintHeader, FingerprintMetadata, Order, FORMAT_MAGIC};
pub use inverted::{
    CandidateSet, InvertedHeader, InvertedIndexCached, InvertedIndexReader, InvertedIndexWriter,
    InvertedSearch,
};
pub use row_major::{RowMajorFingerprintStore, RowMajorFingerprintWriter};
