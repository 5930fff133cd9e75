//! Fixed-width index bitmaps.
//!
//! Bit `i` set means index `i` of a table may be used for lookups right now.
//! Positions at or beyond [`MAX_INDEXES`] are clamped: `set_prefix` and
//! `is_prefix` treat any `n > MAX_INDEXES` as `MAX_INDEXES`, while `set`,
//! `clear` and `is_set` ignore out-of-range positions.

/// Maximum number of indexes per table (bitmap width in bits).
pub const MAX_INDEXES: usize = 64;

const WORD_BITS: usize = 64;
const WORDS: usize = MAX_INDEXES.div_ceil(WORD_BITS);

/// Fixed-size bit vector of index ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct IndexBitmap {
    words: [u64; WORDS],
}

impl IndexBitmap {
    /// Width of every bitmap in bits.
    pub const WIDTH: usize = MAX_INDEXES;

    /// Creates an empty bitmap.
    pub const fn new() -> Self {
        Self { words: [0; WORDS] }
    }

    /// Creates a bitmap with every bit set.
    pub fn full() -> Self {
        let mut map = Self::new();
        map.set_prefix(Self::WIDTH);
        map
    }

    /// Creates a bitmap with bits `[0, n)` set.
    pub fn with_prefix(n: usize) -> Self {
        let mut map = Self::new();
        map.set_prefix(n);
        map
    }

    /// Mask for word `w` covering bits `[0, n)`.
    #[inline]
    fn prefix_word(w: usize, n: usize) -> u64 {
        let start = w * WORD_BITS;
        if n >= start + WORD_BITS {
            u64::MAX
        } else if n <= start {
            0
        } else {
            (1u64 << (n - start)) - 1
        }
    }

    /// Sets bit `i`.
    #[inline]
    pub fn set(&mut self, i: usize) {
        if i < Self::WIDTH {
            self.words[i / WORD_BITS] |= 1u64 << (i % WORD_BITS);
        }
    }

    /// Clears bit `i`.
    #[inline]
    pub fn clear(&mut self, i: usize) {
        if i < Self::WIDTH {
            self.words[i / WORD_BITS] &= !(1u64 << (i % WORD_BITS));
        }
    }

    /// Returns true if bit `i` is set.
    #[inline]
    pub fn is_set(&self, i: usize) -> bool {
        i < Self::WIDTH && self.words[i / WORD_BITS] & (1u64 << (i % WORD_BITS)) != 0
    }

    /// Returns true if no bit is set.
    pub fn is_clear_all(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    /// Number of set bits.
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// True iff every bit set in `self` is also set in `other`.
    pub fn is_subset(&self, other: &IndexBitmap) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .all(|(a, b)| a & !b == 0)
    }

    /// True iff `self AND other` is non-empty.
    pub fn is_overlapping(&self, other: &IndexBitmap) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .any(|(a, b)| a & b != 0)
    }

    /// Sets bits `[0, n)`, leaving the other bits untouched.
    pub fn set_prefix(&mut self, n: usize) {
        let n = n.min(Self::WIDTH);
        for (w, word) in self.words.iter_mut().enumerate() {
            *word |= Self::prefix_word(w, n);
        }
    }

    /// True iff bits `[0, n)` are all set and nothing at or above `n` is.
    ///
    /// `n == 0` is vacuously a prefix of any bitmap.
    pub fn is_prefix(&self, n: usize) -> bool {
        if n == 0 {
            return true;
        }
        let n = n.min(Self::WIDTH);
        self.words
            .iter()
            .enumerate()
            .all(|(w, word)| *word == Self::prefix_word(w, n))
    }

    /// Removes from `self` every bit present in `other`.
    pub fn subtract(&mut self, other: &IndexBitmap) {
        for (a, b) in self.words.iter_mut().zip(other.words.iter()) {
            *a &= !b;
        }
    }

    /// Keeps only the bits also present in `other`.
    pub fn intersect(&mut self, other: &IndexBitmap) {
        for (a, b) in self.words.iter_mut().zip(other.words.iter()) {
            *a &= b;
        }
    }

    /// Adds every bit present in `other`.
    pub fn union(&mut self, other: &IndexBitmap) {
        for (a, b) in self.words.iter_mut().zip(other.words.iter()) {
            *a |= b;
        }
    }

    /// Iterates over the set bit positions in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..Self::WIDTH).filter(move |i| self.is_set(*i))
    }
}

impl FromIterator<usize> for IndexBitmap {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut map = IndexBitmap::new();
        for i in iter {
            map.set(i);
        }
        map
    }
}

impl std::fmt::Display for IndexBitmap {
    // Binary, highest set bit first.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let top = self.iter().last().unwrap_or(0);
        f.write_str("0b")?;
        for i in (0..=top).rev() {
            f.write_str(if self.is_set(i) { "1" } else { "0" })?;
        }
        Ok(())
    }
}
