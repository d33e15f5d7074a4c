//! Wire codec for the chat relay protocol.
//!
//! Every datagram begins with a 4-byte little-endian [`tag::Tag`].
//! Variable-length fields are fixed-size, zero-padded, zero-terminated
//! byte arrays (no length prefix); trailing arrays (LIST/WHO replies,
//! the S2S gather packets) carry their element count as a header
//! field, clamped against the actual datagram length on decode.

pub mod client;
pub mod fixed_str;
pub mod peer;
pub mod server;
pub mod tag;

use std::fmt;

pub use fixed_str::FixedStr;
pub use tag::Tag;

/// `USERNAME_MAX` (spec §6): bytes including the trailing NUL.
pub const USERNAME_MAX: usize = 32;
/// `CHANNEL_MAX` (spec §6): bytes including the trailing NUL.
pub const CHANNEL_MAX: usize = 32;
/// `SAY_MAX` (spec §6): bytes including the trailing NUL.
pub const SAY_MAX: usize = 64;
/// `IP_MAX` (spec §6): "<ip>:<port>" endpoint strings, including NUL.
pub const IP_MAX: usize = 64;

pub type Username = FixedStr<USERNAME_MAX>;
pub type ChannelName = FixedStr<CHANNEL_MAX>;
pub type SayText = FixedStr<SAY_MAX>;
pub type Endpoint = FixedStr<IP_MAX>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The first 4 bytes did not name a known [`Tag`].
    UnknownTag,
    /// The datagram was shorter than the fixed header for its tag.
    Truncated,
    /// A declared trailing-array count was negative, or the bytes it
    /// implies run past the end of the datagram.
    CountOverflow,
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Error::UnknownTag => "unknown packet tag",
            Error::Truncated => "datagram shorter than the fixed header",
            Error::CountOverflow => "declared element count exceeds datagram length",
        };
        f.write_str(msg)
    }
}

/// A tiny sequential byte-slice reader with bounds checking on every
/// read. Every decoder in this crate reads through one of these
/// instead of hand-indexing the buffer, so a malformed/truncated
/// datagram always yields `Err` rather than a panic (spec §7.3).
pub(crate) struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], Error> {
        if self.remaining() < n {
            return Err(Error::Truncated);
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_u32(&mut self) -> Result<u32, Error> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn read_i32(&mut self) -> Result<i32, Error> {
        Ok(i32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn read_u64(&mut self) -> Result<u64, Error> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    pub fn read_fixed<const N: usize>(&mut self) -> Result<FixedStr<N>, Error> {
        let raw: [u8; N] = self.take(N)?.try_into().unwrap();
        Ok(FixedStr::from_raw(raw))
    }

    /// Read a non-negative count, then check that `count * elem_size`
    /// more bytes actually remain (the codec's sole admission check,
    /// spec §4.1).
    pub fn read_count(&mut self, elem_size: usize) -> Result<usize, Error> {
        let count = self.read_i32()?;
        if count < 0 {
            return Err(Error::CountOverflow);
        }

        let count = count as usize;
        let needed = count.checked_mul(elem_size).ok_or(Error::CountOverflow)?;
        if needed > self.remaining() {
            return Err(Error::CountOverflow);
        }

        Ok(count)
    }

    pub fn read_vec<const N: usize>(&mut self, count: usize) -> Result<Vec<FixedStr<N>>, Error> {
        (0..count).map(|_| self.read_fixed::<N>()).collect()
    }
}

pub(crate) fn write_fixed<const N: usize>(bytes: &mut bytes::BytesMut, field: &FixedStr<N>) {
    use bytes::BufMut;
    bytes.put_slice(field.as_bytes());
}
