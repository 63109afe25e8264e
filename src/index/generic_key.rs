//! A fixed-width byte-string key, parameterized at compile time by its size
//! (4/8/16/32/64 bytes are the common instantiations). Comparison is plain
//! lexicographic byte order over the backing array.

use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GenericKey<const N: usize>([u8; N]);

impl<const N: usize> GenericKey<N> {
    pub const SIZE: usize = N;

    pub fn zeroed() -> Self {
        Self([0u8; N])
    }

    /// Zero-pads or truncates `bytes` to fit the `N`-byte array.
    pub fn from_slice(bytes: &[u8]) -> Self {
        let mut buf = [0u8; N];
        let len = bytes.len().min(N);
        buf[..len].copy_from_slice(&bytes[..len]);
        Self(buf)
    }

    pub fn as_bytes(&self) -> &[u8; N] {
        &self.0
    }

    /// Encodes `value` big-endian into the low-order bytes so that key
    /// ordering matches integer ordering for non-negative values. Handy for
    /// tests and for callers that just want an ordered integer index.
    pub fn from_i64(value: i64) -> Self {
        let mut buf = [0u8; N];
        let bytes = value.to_be_bytes();
        let copy_len = bytes.len().min(N);
        buf[N - copy_len..].copy_from_slice(&bytes[bytes.len() - copy_len..]);
        Self(buf)
    }
}

impl<const N: usize> Default for GenericKey<N> {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl<const N: usize> PartialOrd for GenericKey<N> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<const N: usize> Ord for GenericKey<N> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

pub type Key4 = GenericKey<4>;
pub type Key8 = GenericKey<8>;
pub type Key16 = GenericKey<16>;
pub type Key32 = GenericKey<32>;
pub type Key64 = GenericKey<64>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_encoding_preserves_numeric_order() {
        let a = Key8::from_i64(3);
        let b = Key8::from_i64(10);
        assert!(a < b);
    }

    #[test]
    fn from_slice_zero_pads() {
        let k = Key4::from_slice(&[1, 2]);
        assert_eq!(k.as_bytes(), &[1, 2, 0, 0]);
    }
}
