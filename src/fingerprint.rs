//! Fixed-width fingerprint bit vectors and Tanimoto similarity.

/// Bits per storage word. Every on-disk layout assumes this width.
pub const BITS_PER_WORD: usize = 64;

/// Number of `u64` words needed to hold `bits` bits.
pub fn words_for_bits(bits: usize) -> usize {
    bits.div_ceil(BITS_PER_WORD)
}

/// A fixed-size bit vector summarizing a molecule.
///
/// Bit `i` lives in word `i / 64` at position `i % 64`. Bits past
/// `num_bits` in the last word are always zero.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    words: Vec<u64>,
    num_bits: usize,
}

impl Fingerprint {
    /// An all-zero fingerprint of the given width.
    pub fn new(num_bits: usize) -> Self {
        Fingerprint {
            words: vec![0u64; words_for_bits(num_bits)],
            num_bits,
        }
    }

    /// Wraps existing words. Returns `None` if the word count does not fit
    /// `num_bits` or a padding bit is set.
    pub fn from_words(num_bits: usize, words: Vec<u64>) -> Option<Self> {
        if words.len() != words_for_bits(num_bits) {
            return None;
        }
        let fp = Fingerprint { words, num_bits };
        if fp.padding_is_clear() {
            Some(fp)
        } else {
            None
        }
    }

    /// Parses a string of `0`/`1` characters; character `i` is bit `i`.
    pub fn from_bit_str(s: &str) -> Option<Self> {
        let mut fp = Fingerprint::new(s.len());
        for (i, c) in s.bytes().enumerate() {
            match c {
                b'1' => fp.set(i),
                b'0' => {}
                _ => return None,
            }
        }
        Some(fp)
    }

    /// Decodes little-endian words, as written by the row-major layout.
    pub fn from_le_bytes(num_bits: usize, bytes: &[u8]) -> Option<Self> {
        if bytes.len() != words_for_bits(num_bits) * 8 {
            return None;
        }
        let words = bytes
            .chunks_exact(8)
            .map(|chunk| {
                let mut word = [0u8; 8];
                word.copy_from_slice(chunk);
                u64::from_le_bytes(word)
            })
            .collect();
        Self::from_words(num_bits, words)
    }

    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    /// Sets bit `pos`.
    ///
    /// # Panics
    ///
    /// If `pos >= num_bits()`.
    pub fn set(&mut self, pos: usize) {
        self.check(pos);
        self.words[pos / BITS_PER_WORD] |= 1u64 << (pos % BITS_PER_WORD);
    }

    /// Tests bit `pos`.
    ///
    /// # Panics
    ///
    /// If `pos >= num_bits()`.
    pub fn get(&self, pos: usize) -> bool {
        self.check(pos);
        (self.words[pos / BITS_PER_WORD] >> (pos % BITS_PER_WORD)) & 1 == 1
    }

    pub fn count_ones(&self) -> u32 {
        self.words.iter().map(|w| w.count_ones()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    pub fn words(&self) -> &[u64] {
        &self.words
    }

    pub fn num_bits(&self) -> usize {
        self.num_bits
    }

    /// Indices of the set bits, ascending.
    pub fn ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(w, &word)| {
            let mut rest = word;
            std::iter::from_fn(move || {
                if rest == 0 {
                    return None;
                }
                let bit = rest.trailing_zeros() as usize;
                rest &= rest - 1;
                Some(w * BITS_PER_WORD + bit)
            })
        })
    }

    /// True if every bit set here is also set in `other`.
    ///
    /// # Panics
    ///
    /// If the widths differ.
    pub fn is_subset_of(&self, other: &Fingerprint) -> bool {
        assert_eq!(self.num_bits, other.num_bits, "fingerprint width mismatch");
        self.words
            .iter()
            .zip(&other.words)
            .all(|(a, b)| a & !b == 0)
    }

    fn check(&self, pos: usize) {
        assert!(
            pos < self.num_bits,
            "bit {pos} out of range for {}-bit fingerprint",
            self.num_bits
        );
    }

    fn padding_is_clear(&self) -> bool {
        let used = self.num_bits % BITS_PER_WORD;
        match self.words.last() {
            Some(&last) if used != 0 => last >> used == 0,
            _ => true,
        }
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for i in 0..self.num_bits {
            f.write_str(if self.get(i) { "1" } else { "0" })?;
        }
        Ok(())
    }
}

/// Tanimoto coefficient `|A & B| / |A | B|`. Two empty fingerprints are
/// identical, so they score 1.0.
///
/// # Panics
///
/// If the widths differ.
pub fn tanimoto(a: &Fingerprint, b: &Fingerprint) -> f64 {
    assert_eq!(a.num_bits, b.num_bits, "fingerprint width mismatch");
    tanimoto_words(&a.words, &b.words)
}

pub(crate) fn tanimoto_words(a: &[u64], b: &[u64]) -> f64 {
    let (mut both, mut either) = (0u32, 0u32);
    for (x, y) in a.iter().zip(b) {
        both += (x & y).count_ones();
        either += (x | y).count_ones();
    }
    if either == 0 {
        1.0
    } else {
        both as f64 / either as f64
    }
}
