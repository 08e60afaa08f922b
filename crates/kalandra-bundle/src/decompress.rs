//! Decompression primitives for bundle chunks.
//!
//! The container framing is independent of the codec that packed each chunk.
//! [`Decompressor`] is the seam where a codec plugs in: it receives one chunk's
//! compressed bytes and the exact size the chunk must decompress to.

use std::io::{self, Read};

use flate2::read::DeflateDecoder;

/// A chunk decompression primitive.
///
/// Implementations must return exactly `expected_len` bytes or an error.
/// Any `Fn(&[u8], usize) -> io::Result<Vec<u8>>` closure is a `Decompressor`.
pub trait Decompressor: Send + Sync {
    /// Decompress one chunk.
    fn decompress(&self, compressed: &[u8], expected_len: usize) -> io::Result<Vec<u8>>;
}

impl<F> Decompressor for F
where
    F: Fn(&[u8], usize) -> io::Result<Vec<u8>> + Send + Sync,
{
    #[inline]
    fn decompress(&self, compressed: &[u8], expected_len: usize) -> io::Result<Vec<u8>> {
        self(compressed, expected_len)
    }
}

/// Zstandard chunk decompressor.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZstdDecompressor;

impl Decompressor for ZstdDecompressor {
    fn decompress(&self, compressed: &[u8], expected_len: usize) -> io::Result<Vec<u8>> {
        let mut decoder = zstd::Decoder::new(compressed)?;
        read_sized(&mut decoder, expected_len)
    }
}

/// Raw DEFLATE chunk decompressor.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeflateDecompressor;

impl Decompressor for DeflateDecompressor {
    fn decompress(&self, compressed: &[u8], expected_len: usize) -> io::Result<Vec<u8>> {
        let mut decoder = DeflateDecoder::new(compressed);
        read_sized(&mut decoder, expected_len)
    }
}

/// Read a decoder to the end, refusing to grow past `expected_len + 1`.
///
/// The extra byte lets the caller detect overlong output without buffering it all.
fn read_sized<R: Read>(decoder: &mut R, expected_len: usize) -> io::Result<Vec<u8>> {
    let mut output = Vec::with_capacity(expected_len);
    decoder
        .take(expected_len as u64 + 1)
        .read_to_end(&mut output)?;
    Ok(output)
}
