use fixedbitset::FixedBitSet;
use std::num::NonZeroUsize;

/// Set membership with no false negatives and tunable false positives.
#[derive(Debug, Clone)]
pub struct BloomFilter {
    bits: FixedBitSet,
    size: NonZeroUsize,
    hash_count: NonZeroUsize,
}

impl BloomFilter {
    pub fn new<I, S>(words: I, size: NonZeroUsize, hash_count: NonZeroUsize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut filter = Self {
            bits: FixedBitSet::with_capacity(size.get()),
            size,
            hash_count,
        };
        for word in words {
            filter.insert(word.as_ref());
        }
        filter
    }

    pub fn insert(&mut self, word: &str) {
        for shift in 0..self.hash_count.get() {
            self.bits.insert(djb2(word, shift, self.size));
        }
    }

    /// `false` means `word` was never inserted.
    pub fn check(&self, word: &str) -> bool {
        (0..self.hash_count.get()).all(|shift| self.bits.contains(djb2(word, shift, self.size)))
    }

    pub fn size(&self) -> usize {
        self.size.get()
    }

    pub fn hash_count(&self) -> usize {
        self.hash_count.get()
    }

    pub fn ones(&self) -> usize {
        self.bits.count_ones(..)
    }
}

/// djb2 seeded with `shift`, reduced modulo `size`.
///
/// The reduction is applied after every step, which gives the same result as
/// reducing the unbounded hash once at the end.
fn djb2(word: &str, shift: usize, size: NonZeroUsize) -> usize {
    let m = size.get() as u128;
    let step = |h: u128, x: u128| (h * 33 + x) % m;
    let h = step(5381 % m, shift as u128);
    word.chars().fold(h, |h, c| step(h, c as u128)) as usize
}
