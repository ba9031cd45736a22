//! Column-major (inverted) fingerprint index for substructure pre-filtering.
//!
//! For every fingerprint bit the file stores a bitmap over molecules: bit
//! `m` of the bitmap for bit `b` is set iff fingerprint `m` has bit `b`.
//! A search ANDs the bitmaps of the bits set in the query, leaving the
//! molecules whose fingerprint is a superset of the query's. That is
//! necessary for a substructure match but not sufficient.
//!
//! Layout: six little-endian `u32` ([`InvertedHeader`]) followed by
//! `bits_per_fingerprint * words_per_fpbit` little-endian `u64` words.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::{IndexError, Result, FORMAT_MAGIC};
use crate::fingerprint::{words_for_bits, Fingerprint, BITS_PER_WORD};

/// Size of the native header in bytes.
pub const HEADER_LEN: usize = 24;

// Bitmap offsets are computed in 64-bit words throughout.
const _: () = assert!(BITS_PER_WORD == 64);

/// Fixed header of an inverted index file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvertedHeader {
    pub magic: u32,
    pub bits_per_word: u32,
    pub bits_per_fingerprint: u32,
    pub words_per_fingerprint: u32,
    /// Length of one per-bit bitmap in words.
    pub words_per_fpbit: u32,
    pub num_fingerprints: u32,
}

impl InvertedHeader {
    pub fn new(num_bits: usize, num_fingerprints: usize) -> Result<Self> {
        let too_many = |_| IndexError::CapacityExceeded {
            capacity: u32::MAX as usize,
        };
        Ok(InvertedHeader {
            magic: FORMAT_MAGIC,
            bits_per_word: BITS_PER_WORD as u32,
            bits_per_fingerprint: u32::try_from(num_bits).map_err(too_many)?,
            words_per_fingerprint: words_for_bits(num_bits) as u32,
            words_per_fpbit: u32::try_from(words_for_bits(num_fingerprints)).map_err(too_many)?,
            num_fingerprints: u32::try_from(num_fingerprints).map_err(too_many)?,
        })
    }

    pub fn from_bytes(bytes: &[u8; HEADER_LEN]) -> Self {
        let field =
            |i: usize| u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
        InvertedHeader {
            magic: field(0),
            bits_per_word: field(4),
            bits_per_fingerprint: field(8),
            words_per_fingerprint: field(12),
            words_per_fpbit: field(16),
            num_fingerprints: field(20),
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[0..4].copy_from_slice(&self.magic.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.bits_per_word.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.bits_per_fingerprint.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.words_per_fingerprint.to_le_bytes());
        bytes[16..20].copy_from_slice(&self.words_per_fpbit.to_le_bytes());
        bytes[20..24].copy_from_slice(&self.num_fingerprints.to_le_bytes());
        bytes
    }

    pub fn validate_magic(&self) -> bool {
        self.magic == FORMAT_MAGIC
    }

    /// Describes the first derived width that disagrees with the counts.
    fn inconsistency(&self) -> Option<String> {
        let per_bit = words_for_bits(self.num_fingerprints as usize);
        if self.words_per_fpbit as usize != per_bit {
            return Some(format!(
                "words_per_fpbit is {}, but {} fingerprints need {per_bit}",
                self.words_per_fpbit, self.num_fingerprints
            ));
        }
        let per_fp = words_for_bits(self.bits_per_fingerprint as usize);
        if self.words_per_fingerprint as usize != per_fp {
            return Some(format!(
                "words_per_fingerprint is {}, but {} bits need {per_fp}",
                self.words_per_fingerprint, self.bits_per_fingerprint
            ));
        }
        None
    }

    fn bitmap_bytes(&self) -> u64 {
        self.words_per_fpbit as u64 * 8
    }

    fn payload_bytes(&self) -> u64 {
        self.bits_per_fingerprint as u64 * self.bitmap_bytes()
    }
}

/// Builds an inverted index. Every bitmap is only complete once all
/// fingerprints are seen, so the whole index is held in memory and written
/// once by [`finish`](Self::finish) or on drop.
#[derive(Debug)]
pub struct InvertedIndexWriter {
    path: PathBuf,
    file: Option<File>,
    header: InvertedHeader,
    bitmaps: Vec<u64>,
    current: usize,
}

impl InvertedIndexWriter {
    pub fn create(
        path: impl AsRef<Path>,
        num_bits: usize,
        num_fingerprints: usize,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let header = InvertedHeader::new(num_bits, num_fingerprints)?;
        let file = File::create(&path).map_err(|source| IndexError::Open {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), num_bits, num_fingerprints, "creating inverted index");
        Ok(InvertedIndexWriter {
            bitmaps: vec![0; num_bits * header.words_per_fpbit as usize],
            path,
            file: Some(file),
            header,
            current: 0,
        })
    }

    /// Adds the next molecule's fingerprint and returns its index.
    pub fn append(&mut self, fp: &Fingerprint) -> Result<usize> {
        let num_bits = self.header.bits_per_fingerprint as usize;
        if fp.num_bits() != num_bits {
            return Err(IndexError::DimensionMismatch {
                expected: num_bits,
                found: fp.num_bits(),
            });
        }
        let capacity = self.header.num_fingerprints as usize;
        if self.current == capacity {
            return Err(IndexError::CapacityExceeded { capacity });
        }
        let stride = self.header.words_per_fpbit as usize * 64;
        for bit in fp.ones() {
            let offset = bit * stride + self.current;
            self.bitmaps[offset / 64] |= 1u64 << (offset % 64);
        }
        self.current += 1;
        Ok(self.current - 1)
    }

    pub fn len(&self) -> usize {
        self.current
    }

    pub fn is_empty(&self) -> bool {
        self.current == 0
    }

    pub fn finish(mut self) -> Result<()> {
        self.flush_file()
    }

    fn flush_file(&mut self) -> Result<()> {
        let Some(file) = self.file.take() else {
            return Ok(());
        };
        let mut out = BufWriter::new(file);
        out.write_all(&self.header.to_bytes())?;
        for word in &self.bitmaps {
            out.write_all(&word.to_le_bytes())?;
        }
        out.flush()?;
        debug!(
            path = %self.path.display(),
            num_fingerprints = self.current,
            "finished inverted index"
        );
        Ok(())
    }
}

impl Drop for InvertedIndexWriter {
    fn drop(&mut self) {
        if let Err(err) = self.flush_file() {
            warn!(path = %self.path.display(), error = %err, "failed to write inverted index");
        }
    }
}

/// Molecules that survived the pre-filter, as a packed bitmap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateSet {
    words: Vec<u64>,
    num_fingerprints: usize,
}

impl CandidateSet {
    fn new(mut words: Vec<u64>, num_fingerprints: usize) -> Self {
        words.resize(words_for_bits(num_fingerprints), 0);
        let used = num_fingerprints % 64;
        if used != 0 {
            if let Some(last) = words.last_mut() {
                *last &= (1u64 << used) - 1;
            }
        }
        CandidateSet {
            words,
            num_fingerprints,
        }
    }

    fn all(num_fingerprints: usize) -> Self {
        Self::new(vec![u64::MAX; words_for_bits(num_fingerprints)], num_fingerprints)
    }

    pub fn contains(&self, index: usize) -> bool {
        index < self.num_fingerprints && (self.words[index / 64] >> (index % 64)) & 1 == 1
    }

    /// Number of candidates.
    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Candidate molecule indices, ascending.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.num_fingerprints).filter(|&i| self.contains(i))
    }

    pub fn words(&self) -> &[u64] {
        &self.words
    }

    pub fn num_fingerprints(&self) -> usize {
        self.num_fingerprints
    }
}

/// Pre-filter search over an inverted index.
pub trait InvertedSearch {
    fn num_bits(&self) -> usize;

    fn num_fingerprints(&self) -> usize;

    /// Molecules whose fingerprint has every bit set in `query`. A query
    /// with no bits set returns every molecule.
    fn search(&mut self, query: &Fingerprint) -> Result<CandidateSet>;
}

/// Shared AND loop; `bitmap` fetches one per-bit bitmap into a buffer.
fn intersect<F>(
    header: &InvertedHeader,
    query: &Fingerprint,
    mut bitmap: F,
) -> Result<CandidateSet>
where
    F: FnMut(usize, &mut [u64]) -> Result<()>,
{
    let expected = header.bits_per_fingerprint as usize;
    if query.num_bits() != expected {
        return Err(IndexError::DimensionMismatch {
            expected,
            found: query.num_bits(),
        });
    }
    let num_fingerprints = header.num_fingerprints as usize;
    let mut bits = query.ones();
    let Some(first) = bits.next() else {
        return Ok(CandidateSet::all(num_fingerprints));
    };

    let mut result = vec![0u64; header.words_per_fpbit as usize];
    bitmap(first, &mut result)?;
    let mut buffer = vec![0u64; result.len()];
    for bit in bits {
        bitmap(bit, &mut buffer)?;
        for (r, b) in result.iter_mut().zip(&buffer) {
            *r &= b;
        }
    }
    Ok(CandidateSet::new(result, num_fingerprints))
}

fn open_index(path: &Path) -> Result<(BufReader<File>, InvertedHeader)> {
    let file = File::open(path).map_err(|source| IndexError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let file_len = file.metadata()?.len();
    let mut reader = BufReader::new(file);

    let mut bytes = [0u8; HEADER_LEN];
    if file_len < HEADER_LEN as u64 {
        let mut head = Vec::new();
        reader.read_to_end(&mut head)?;
        let mut magic = [0u8; 4];
        for (m, b) in magic.iter_mut().zip(&head) {
            *m = *b;
        }
        let found = u32::from_le_bytes(magic);
        if found == FORMAT_MAGIC {
            return Err(IndexError::Truncated {
                path: path.to_path_buf(),
                expected: HEADER_LEN as u64,
                found: file_len,
            });
        }
        return Err(IndexError::InvalidMagic {
            path: path.to_path_buf(),
            found,
        });
    }
    reader.read_exact(&mut bytes)?;
    let header = InvertedHeader::from_bytes(&bytes);
    if !header.validate_magic() {
        return Err(IndexError::InvalidMagic {
            path: path.to_path_buf(),
            found: header.magic,
        });
    }
    if header.bits_per_word != 64 {
        return Err(IndexError::UnsupportedWordSize(header.bits_per_word));
    }
    if let Some(reason) = header.inconsistency() {
        return Err(IndexError::InconsistentHeader {
            path: path.to_path_buf(),
            reason,
        });
    }
    let found = file_len - HEADER_LEN as u64;
    if found < header.payload_bytes() {
        return Err(IndexError::Truncated {
            path: path.to_path_buf(),
            expected: header.payload_bytes(),
            found,
        });
    }
    debug!(
        path = %path.display(),
        num_bits = header.bits_per_fingerprint,
        num_fingerprints = header.num_fingerprints,
        "opened inverted index"
    );
    Ok((reader, header))
}

fn decode_words(bytes: &[u8], out: &mut [u64]) {
    for (word, chunk) in out.iter_mut().zip(bytes.chunks_exact(8)) {
        *word = u64::from_le_bytes([
            chunk[0], chunk[1], chunk[2], chunk[3], chunk[4], chunk[5], chunk[6], chunk[7],
        ]);
    }
}

/// Reads the bitmaps a query needs from disk, one seek per query bit.
#[derive(Debug)]
pub struct InvertedIndexReader {
    reader: BufReader<File>,
    header: InvertedHeader,
    scratch: Vec<u8>,
}

impl InvertedIndexReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let (reader, header) = open_index(path.as_ref())?;
        Ok(InvertedIndexReader {
            scratch: vec![0; header.bitmap_bytes() as usize],
            reader,
            header,
        })
    }

    pub fn header(&self) -> &InvertedHeader {
        &self.header
    }
}

impl InvertedSearch for InvertedIndexReader {
    fn num_bits(&self) -> usize {
        self.header.bits_per_fingerprint as usize
    }

    fn num_fingerprints(&self) -> usize {
        self.header.num_fingerprints as usize
    }

    fn search(&mut self, query: &Fingerprint) -> Result<CandidateSet> {
        let header = self.header;
        let (reader, scratch) = (&mut self.reader, &mut self.scratch);
        intersect(&header, query, |bit, out| {
            let offset = HEADER_LEN as u64 + bit as u64 * header.bitmap_bytes();
            reader.seek(SeekFrom::Start(offset))?;
            reader.read_exact(scratch)?;
            decode_words(scratch, out);
            Ok(())
        })
    }
}

/// Loads the whole index once and answers queries from memory.
#[derive(Debug, Clone)]
pub struct InvertedIndexCached {
    header: InvertedHeader,
    bitmaps: Vec<u64>,
}

impl InvertedIndexCached {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let (mut reader, header) = open_index(path.as_ref())?;
        let mut bytes = vec![0u8; header.payload_bytes() as usize];
        reader.read_exact(&mut bytes)?;
        let mut bitmaps = vec![0u64; bytes.len() / 8];
        decode_words(&bytes, &mut bitmaps);
        Ok(InvertedIndexCached { header, bitmaps })
    }

    pub fn header(&self) -> &InvertedHeader {
        &self.header
    }
}

impl InvertedSearch for InvertedIndexCached {
    fn num_bits(&self) -> usize {
        self.header.bits_per_fingerprint as usize
    }

    fn num_fingerprints(&self) -> usize {
        self.header.num_fingerprints as usize
    }

    fn search(&mut self, query: &Fingerprint) -> Result<CandidateSet> {
        let words = self.header.words_per_fpbit as usize;
        let bitmaps = &self.bitmaps;
        intersect(&self.header, query, |bit, out| {
            out.copy_from_slice(&bitmaps[bit * words..(bit + 1) * words]);
            Ok(())
        })
    }
}
