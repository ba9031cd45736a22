//! Row-major fingerprint files: fingerprints stored back to back, each
//! `words_for_bits(num_bits)` little-endian words. Used for similarity
//! searches, which need every bit of every compared fingerprint.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{
    BinaryInputFile, BinaryOutputFile, FingerprintHeader, FingerprintMetadata, IndexError, Order,
    Result,
};
use crate::fingerprint::{tanimoto_words, words_for_bits, Fingerprint, BITS_PER_WORD};

/// Appends fingerprints to a new row-major file.
#[derive(Debug)]
pub struct RowMajorFingerprintWriter {
    file: BinaryOutputFile,
    num_bits: usize,
    metadata: FingerprintMetadata,
    count: usize,
}

impl RowMajorFingerprintWriter {
    pub fn create(
        path: impl AsRef<Path>,
        num_bits: usize,
        metadata: FingerprintMetadata,
    ) -> Result<Self> {
        let file = BinaryOutputFile::create(path)?;
        debug!(path = %file.path().display(), num_bits, "creating row-major fingerprint file");
        Ok(RowMajorFingerprintWriter {
            file,
            num_bits,
            metadata,
            count: 0,
        })
    }

    /// Writes `fp` and returns its index.
    pub fn append(&mut self, fp: &Fingerprint) -> Result<usize> {
        if fp.num_bits() != self.num_bits {
            return Err(IndexError::DimensionMismatch {
                expected: self.num_bits,
                found: fp.num_bits(),
            });
        }
        self.file.write_all(&fp.to_le_bytes())?;
        self.count += 1;
        Ok(self.count - 1)
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Writes the header with the final count and closes the file.
    pub fn finish(mut self) -> Result<()> {
        let header =
            FingerprintHeader::new(Order::RowMajor, self.num_bits, self.count, self.metadata);
        self.file.write_header(&header.to_json());
        debug!(
            path = %self.file.path().display(),
            num_fingerprints = self.count,
            "finished row-major fingerprint file"
        );
        self.file.finish()
    }
}

/// A row-major fingerprint file loaded into memory.
#[derive(Debug, Clone)]
pub struct RowMajorFingerprintStore {
    path: PathBuf,
    json: String,
    header: FingerprintHeader,
    words_per_fp: usize,
    words: Vec<u64>,
}

impl RowMajorFingerprintStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut file = BinaryInputFile::open(path)?;
        let path = file.path().to_path_buf();
        let header = FingerprintHeader::parse(&path, file.header())?;
        if let Some(found) = header.order.filter(|&order| order != Order::RowMajor) {
            return Err(IndexError::WrongOrder {
                path,
                expected: Order::RowMajor,
                found,
            });
        }

        let words_per_fp = words_for_bits(header.num_bits);
        let Some(expected) = words_per_fp
            .checked_mul(header.num_fingerprints)
            .and_then(|words| words.checked_mul(8))
            .and_then(|bytes| u64::try_from(bytes).ok())
        else {
            return Err(IndexError::InconsistentHeader {
                reason: format!(
                    "{} fingerprints of {} bits do not fit in memory",
                    header.num_fingerprints, header.num_bits
                ),
                path,
            });
        };
        if file.payload_len() < expected {
            return Err(IndexError::Truncated {
                path,
                expected,
                found: file.payload_len(),
            });
        }
        let mut bytes = vec![0u8; expected as usize];
        file.read_exact(&mut bytes)?;
        let words: Vec<u64> = bytes
            .chunks_exact(8)
            .map(|c| u64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
            .collect();
        check_padding(&path, &words, header.num_bits)?;

        debug!(
            path = %path.display(),
            num_bits = header.num_bits,
            num_fingerprints = header.num_fingerprints,
            "loaded row-major fingerprint file"
        );
        Ok(RowMajorFingerprintStore {
            json: file.header().to_owned(),
            path,
            header,
            words_per_fp,
            words,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw JSON header.
    pub fn header(&self) -> &str {
        &self.json
    }

    pub fn metadata(&self) -> &FingerprintHeader {
        &self.header
    }

    pub fn num_bits(&self) -> usize {
        self.header.num_bits
    }

    pub fn num_fingerprints(&self) -> usize {
        self.header.num_fingerprints
    }

    /// Words of fingerprint `index`.
    ///
    /// # Panics
    ///
    /// If `index >= num_fingerprints()`.
    pub fn words(&self, index: usize) -> &[u64] {
        assert!(index < self.num_fingerprints(), "fingerprint {index} out of range");
        let start = index * self.words_per_fp;
        &self.words[start..start + self.words_per_fp]
    }

    /// Fingerprint `index`, or `None` past the end.
    pub fn fingerprint(&self, index: usize) -> Option<Fingerprint> {
        if index >= self.num_fingerprints() {
            return None;
        }
        Fingerprint::from_words(self.num_bits(), self.words(index).to_vec())
    }

    /// Every stored fingerprint whose Tanimoto similarity to `query` is at
    /// least `threshold`, most similar first, ties by index.
    pub fn similarity_search(
        &self,
        query: &Fingerprint,
        threshold: f64,
    ) -> Result<Vec<(usize, f64)>> {
        if query.num_bits() != self.num_bits() {
            return Err(IndexError::DimensionMismatch {
                expected: self.num_bits(),
                found: query.num_bits(),
            });
        }
        let mut hits: Vec<(usize, f64)> = (0..self.num_fingerprints())
            .map(|i| (i, tanimoto_words(query.words(), self.words(i))))
            .filter(|&(_, sim)| sim >= threshold)
            .collect();
        hits.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        Ok(hits)
    }
}

/// Rejects any fingerprint with bits set past `num_bits` in its last word.
fn check_padding(path: &Path, words: &[u64], num_bits: usize) -> Result<()> {
    let used = num_bits % BITS_PER_WORD;
    if used == 0 {
        return Ok(());
    }
    let words_per_fp = words_for_bits(num_bits);
    match words
        .chunks_exact(words_per_fp)
        .position(|fp| fp[words_per_fp - 1] >> used != 0)
    {
        Some(index) => Err(IndexError::CorruptFingerprint {
            path: path.to_path_buf(),
            index,
        }),
        None => Ok(()),
    }
}
