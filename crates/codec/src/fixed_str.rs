//! Fixed-width, zero-padded, zero-terminated string fields.
//!
//! Every variable-length field on the wire (usernames, channel names,
//! say text, endpoint strings) is actually a fixed-size byte array:
//! no length prefix, truncation to `N - 1` bytes, and a mandatory NUL
//! terminator. Bytes past the first NUL are undefined and ignored on
//! decode (spec §4.1).

use std::fmt;

/// A `N`-byte fixed string field.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct FixedStr<const N: usize>([u8; N]);

impl<const N: usize> FixedStr<N> {
    /// Build a field from `s`, truncating to `N - 1` bytes and
    /// zero-padding/terminating the remainder.
    pub fn new(s: &str) -> Self {
        let mut buf = [0u8; N];
        let bytes = s.as_bytes();
        let len = bytes.len().min(N.saturating_sub(1));
        buf[..len].copy_from_slice(&bytes[..len]);
        Self(buf)
    }

    /// Read a field out of `N` raw bytes, stopping at the first NUL.
    pub fn from_raw(raw: [u8; N]) -> Self {
        Self(raw)
    }

    pub fn as_bytes(&self) -> &[u8; N] {
        &self.0
    }

    /// The string content up to (not including) the first NUL byte.
    /// Lossy: the wire format makes no UTF-8 guarantee, and a peer
    /// sending garbage must never be able to crash this node.
    pub fn as_str(&self) -> std::borrow::Cow<'_, str> {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(N);
        String::from_utf8_lossy(&self.0[..end])
    }
}

impl<const N: usize> Default for FixedStr<N> {
    fn default() -> Self {
        Self([0u8; N])
    }
}

impl<const N: usize> From<&str> for FixedStr<N> {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl<const N: usize> fmt::Debug for FixedStr<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FixedStr({:?})", self.as_str())
    }
}
