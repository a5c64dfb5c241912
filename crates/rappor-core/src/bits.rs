//! Arbitrary-width bit vectors and the report byte layout.
//!
//! Bit `i` of a [`Bits`] value has weight `2^i`. Reports are serialized
//! big-endian into `ceil(num_bits / 8)` bytes: bit `i` lives in byte
//! `len - 1 - i / 8` at position `i % 8`, so its place never depends on how
//! many high bits happen to be zero.
//!
//! ```text
//! num_bits = 12, bits {0, 9}   →   [0b0000_0010, 0b0000_0001]
//! ```

const WORD_BITS: usize = 64;

/// A set of bit positions, stored as little-endian 64-bit words.
///
/// The representation is kept normalized (no trailing zero words), so derived
/// equality is value equality.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Bits {
    words: Vec<u64>,
}

impl Bits {
    /// The empty bit vector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bits of a 64-bit integer.
    pub fn from_u64(value: u64) -> Self {
        let mut bits = Self { words: vec![value] };
        bits.normalize();
        bits
    }

    /// A vector with only bit `index` set.
    pub fn one_hot(index: usize) -> Self {
        let mut bits = Self::new();
        bits.set(index);
        bits
    }

    /// Set bit `index`.
    pub fn set(&mut self, index: usize) {
        let word = index / WORD_BITS;
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1u64 << (index % WORD_BITS);
    }

    /// Clear bit `index`.
    pub fn clear(&mut self, index: usize) {
        if let Some(w) = self.words.get_mut(index / WORD_BITS) {
            *w &= !(1u64 << (index % WORD_BITS));
            self.normalize();
        }
    }

    /// Set or clear bit `index`.
    pub fn assign(&mut self, index: usize, value: bool) {
        if value {
            self.set(index);
        } else {
            self.clear(index);
        }
    }

    /// Whether bit `index` is set.
    pub fn get(&self, index: usize) -> bool {
        self.words
            .get(index / WORD_BITS)
            .is_some_and(|w| w & (1u64 << (index % WORD_BITS)) != 0)
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Position of the most significant set bit, or `None` when empty.
    pub fn highest_set_bit(&self) -> Option<usize> {
        let last = self.words.last()?;
        let top = WORD_BITS - 1 - last.leading_zeros() as usize;
        Some((self.words.len() - 1) * WORD_BITS + top)
    }

    /// Positions of the set bits, ascending.
    pub fn iter_ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(wi, &w)| {
            (0..WORD_BITS)
                .filter(move |b| w & (1u64 << b) != 0)
                .map(move |b| wi * WORD_BITS + b)
        })
    }

    /// Serialize the low `num_bits` bits into the report byte layout.
    ///
    /// Bits at or above `num_bits` are dropped.
    pub fn to_report_bytes(&self, num_bits: usize) -> Vec<u8> {
        let len = num_bits.div_ceil(8);
        let mut out = vec![0u8; len];
        for i in self.iter_ones().take_while(|&i| i < num_bits) {
            out[len - 1 - i / 8] |= 1u8 << (i % 8);
        }
        out
    }

    /// Parse the report byte layout back into bits.
    pub fn from_report_bytes(bytes: &[u8]) -> Self {
        let mut bits = Self::new();
        for (pos, &byte) in bytes.iter().rev().enumerate() {
            for b in 0..8 {
                if byte & (1u8 << b) != 0 {
                    bits.set(pos * 8 + b);
                }
            }
        }
        bits
    }

    /// Render the low `num_bits` bits, most significant first, with leading
    /// zeros (`"00000101"` for `{0, 2}` at width 8).
    pub fn bit_string(&self, num_bits: usize) -> String {
        (0..num_bits)
            .rev()
            .map(|i| if self.get(i) { '1' } else { '0' })
            .collect()
    }

    fn normalize(&mut self) {
        while self.words.last() == Some(&0) {
            self.words.pop();
        }
    }
}

impl From<u64> for Bits {
    fn from(value: u64) -> Self {
        Self::from_u64(value)
    }
}

impl FromIterator<usize> for Bits {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut bits = Self::new();
        for i in iter {
            bits.set(i);
        }
        bits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_u64_and_get() {
        let bits = Bits::from_u64(0b1111_1101);
        assert!(bits.get(0));
        assert!(!bits.get(1));
        assert!(bits.get(7));
        assert!(!bits.get(8));
        assert_eq!(bits.count_ones(), 7);
        assert_eq!(bits.highest_set_bit(), Some(7));
    }

    #[test]
    fn test_zero_is_empty() {
        assert!(Bits::from_u64(0).is_empty());
        assert_eq!(Bits::from_u64(0), Bits::new());
        assert_eq!(Bits::new().highest_set_bit(), None);
    }

    #[test]
    fn test_clear_normalizes() {
        let mut bits = Bits::one_hot(200);
        bits.clear(200);
        assert_eq!(bits, Bits::new());
    }

    #[test]
    fn test_wide_positions() {
        let bits: Bits = [3, 64, 4095].into_iter().collect();
        assert_eq!(bits.highest_set_bit(), Some(4095));
        assert_eq!(bits.iter_ones().collect::<Vec<_>>(), vec![3, 64, 4095]);
    }

    #[test]
    fn test_report_bytes_layout() {
        assert_eq!(Bits::from_u64(0b1111_1101).to_report_bytes(8), vec![0xFD]);
        assert_eq!(Bits::one_hot(9).to_report_bytes(12), vec![0x02, 0x00]);
        assert_eq!(Bits::from_u64(1).to_report_bytes(1), vec![0x01]);
        // High zero bits do not shift low bits.
        assert_eq!(Bits::from_u64(1).to_report_bytes(17), vec![0, 0, 1]);
    }

    #[test]
    fn test_report_bytes_drop_out_of_width_bits() {
        let bits: Bits = [0, 8].into_iter().collect();
        assert_eq!(bits.to_report_bytes(8), vec![0x01]);
    }

    #[test]
    fn test_from_report_bytes_inverts_layout() {
        let bits: Bits = [0, 9, 23].into_iter().collect();
        let bytes = bits.to_report_bytes(24);
        assert_eq!(Bits::from_report_bytes(&bytes), bits);
    }

    #[test]
    fn test_bit_string() {
        assert_eq!(Bits::from_u64(0b101).bit_string(8), "00000101");
        assert_eq!(Bits::new().bit_string(3), "000");
    }
}
