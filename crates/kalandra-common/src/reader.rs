//! Cursor over a borrowed byte slice.
//!
//! Every read is bounds-checked and little-endian. A failed read reports the
//! offset it was attempted at, which is usually all there is to go on when a
//! binary format turns out not to match its description.

use zerocopy::FromBytes;

use crate::{Error, Result};

/// A little-endian cursor over borrowed bytes.
///
/// Slices and strings handed out by the reader borrow from the input buffer.
/// The position may sit past the end of the buffer; reads from there fail
/// with [`Error::UnexpectedEof`] instead of panicking.
///
/// # Example
///
/// ```
/// use kalandra_common::BinaryReader;
///
/// let data = [0x2a, 0x00, 0x00, 0x00, b'o', b'k', 0x00];
/// let mut reader = BinaryReader::new(&data);
///
/// assert_eq!(reader.read_u32().unwrap(), 42);
/// assert_eq!(reader.read_cstring().unwrap(), "ok");
/// assert!(reader.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct BinaryReader<'a> {
    data: &'a [u8],
    position: usize,
}

macro_rules! read_le {
    ($($name:ident => $ty:ty),* $(,)?) => {
        $(
            #[doc = concat!("Read a `", stringify!($ty), "`.")]
            #[inline]
            pub fn $name(&mut self) -> Result<$ty> {
                self.read_array().map(<$ty>::from_le_bytes)
            }
        )*
    };
}

impl<'a> BinaryReader<'a> {
    #[inline]
    pub const fn new(data: &'a [u8]) -> Self {
        Self::new_at(data, 0)
    }

    /// Start reading at `position`.
    #[inline]
    pub const fn new_at(data: &'a [u8], position: usize) -> Self {
        Self { data, position }
    }

    /// A second cursor over the same bytes at `position`.
    ///
    /// The two cursors move independently; this is how pointer targets are
    /// followed without disturbing the caller's position.
    #[inline]
    pub const fn fork_at(&self, position: usize) -> Self {
        Self::new_at(self.data, position)
    }

    /// The whole underlying buffer, regardless of position.
    #[inline]
    pub const fn data(&self) -> &'a [u8] {
        self.data
    }

    #[inline]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Length of the whole buffer.
    #[inline]
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    /// Bytes left after the position; zero when past the end.
    #[inline]
    pub const fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Everything after the position, without consuming it.
    #[inline]
    pub fn remaining_bytes(&self) -> &'a [u8] {
        self.data.get(self.position..).unwrap_or_default()
    }

    /// Borrow the next `count` bytes without consuming them.
    #[inline]
    pub fn peek_bytes(&self, count: usize) -> Result<&'a [u8]> {
        let available = self.remaining();
        if count > available {
            return Err(Error::UnexpectedEof {
                offset: self.position,
                needed: count,
                available,
            });
        }
        Ok(&self.data[self.position..self.position + count])
    }

    /// Borrow and consume the next `count` bytes.
    #[inline]
    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        let bytes = self.peek_bytes(count)?;
        self.position += count;
        Ok(bytes)
    }

    #[inline]
    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    #[inline]
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    /// Read one byte; anything non-zero is `true`.
    #[inline]
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    read_le! {
        read_u16 => u16,
        read_i16 => i16,
        read_u32 => u32,
        read_i32 => i32,
        read_u64 => u64,
        read_i64 => i64,
        read_f32 => f32,
    }

    /// The next eight bytes as a `u64`, without consuming them.
    #[inline]
    pub fn peek_u64(&self) -> Result<u64> {
        self.clone().read_u64()
    }

    /// Read up to the next zero byte and consume it. The zero is not returned.
    pub fn read_cstring_bytes(&mut self) -> Result<&'a [u8]> {
        let start = self.position;
        let rest = self.remaining_bytes();
        let end = memchr::memchr(0, rest).ok_or(Error::MissingNullTerminator(start))?;

        self.position = start + end + 1;
        Ok(&rest[..end])
    }

    /// Zero-terminated UTF-8.
    pub fn read_cstring(&mut self) -> Result<&'a str> {
        Ok(std::str::from_utf8(self.read_cstring_bytes()?)?)
    }

    /// `length` bytes of UTF-8.
    pub fn read_string(&mut self, length: usize) -> Result<&'a str> {
        Ok(std::str::from_utf8(self.read_bytes(length)?)?)
    }

    /// Copy a plain-old-data struct out of the buffer.
    #[inline]
    pub fn read_struct<T: FromBytes>(&mut self) -> Result<T> {
        let offset = self.position;
        let size = std::mem::size_of::<T>();
        let bytes = self.read_bytes(size)?;
        T::read_from_bytes(bytes).map_err(|_| Error::UnexpectedEof {
            offset,
            needed: size,
            available: bytes.len(),
        })
    }
}
