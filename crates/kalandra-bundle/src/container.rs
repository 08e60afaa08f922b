//! Chunked container framing.
//!
//! A container starts with a fixed 60-byte header, followed by one `u32`
//! compressed size per chunk and then the compressed chunks back to back.
//! Every chunk except the last decompresses to [`CHUNK_SIZE`] bytes; the last
//! one holds whatever is left of `uncompressed_size`.

use kalandra_common::BinaryReader;
use tracing::{debug, trace};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::decompress::Decompressor;
use crate::{Error, Result};

/// Decompressed size of every chunk but the last.
pub const CHUNK_SIZE: usize = 262_144;

/// Fixed container header.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct ContainerHeader {
    /// Size of the fully decompressed payload.
    pub uncompressed_size: u32,
    /// Size of all compressed chunks together.
    pub total_payload_size: u32,
    /// Size of the header part that follows this field.
    pub head_payload_size: u32,
    /// Codec identifier of the first chunk.
    pub encoding: u32,
    pub unknown1: u32,
    /// 64-bit copy of `uncompressed_size`.
    pub uncompressed_size_long: u64,
    /// 64-bit copy of `total_payload_size`.
    pub total_payload_size_long: u64,
    /// Number of compressed chunks.
    pub chunk_count: u32,
    pub unknown2: [u32; 5],
}

impl ContainerHeader {
    /// Size of the header in bytes, excluding the chunk size table.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Codec of the first chunk.
    pub fn encoding(&self) -> ChunkEncoding {
        ChunkEncoding::from(self.encoding)
    }

    /// Decompressed size of each chunk, in order.
    ///
    /// The sizes always sum to `uncompressed_size`.
    pub fn chunk_sizes(&self) -> Result<Vec<usize>> {
        chunk_layout(self.uncompressed_size as usize, self.chunk_count as usize)
    }
}

/// Codec identifiers found in container headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkEncoding {
    Kraken,
    Mermaid,
    Leviathan,
    Other(u32),
}

impl From<u32> for ChunkEncoding {
    fn from(value: u32) -> Self {
        match value {
            8 => Self::Kraken,
            9 => Self::Mermaid,
            13 => Self::Leviathan,
            other => Self::Other(other),
        }
    }
}

impl std::fmt::Display for ChunkEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Kraken => write!(f, "Kraken"),
            Self::Mermaid => write!(f, "Mermaid"),
            Self::Leviathan => write!(f, "Leviathan"),
            Self::Other(v) => write!(f, "Unknown({})", v),
        }
    }
}

fn chunk_layout(uncompressed_size: usize, chunk_count: usize) -> Result<Vec<usize>> {
    if chunk_count == 0 {
        if uncompressed_size == 0 {
            return Ok(Vec::new());
        }
        return Err(Error::ChunkLayout(format!(
            "{} bytes declared but no chunks",
            uncompressed_size
        )));
    }

    let leading = (chunk_count - 1)
        .checked_mul(CHUNK_SIZE)
        .filter(|&n| n < uncompressed_size)
        .ok_or_else(|| {
            Error::ChunkLayout(format!(
                "{} chunks cannot hold {} bytes",
                chunk_count, uncompressed_size
            ))
        })?;

    let last = uncompressed_size - leading;
    if last > CHUNK_SIZE {
        return Err(Error::ChunkLayout(format!(
            "last chunk would hold {} bytes (max {})",
            last, CHUNK_SIZE
        )));
    }

    let mut sizes = vec![CHUNK_SIZE; chunk_count];
    sizes[chunk_count - 1] = last;
    Ok(sizes)
}

/// Parse a container header and its chunk size table.
///
/// Returns the header, the compressed size of each chunk and the offset at
/// which the first chunk begins.
pub fn read_header(data: &[u8]) -> Result<(ContainerHeader, Vec<u32>, usize)> {
    let mut reader = BinaryReader::new(data);
    let header: ContainerHeader = reader.read_struct()?;

    let count = header.chunk_count as usize;
    // Each entry is four bytes; bail out before allocating for a bogus count.
    reader.peek_bytes(count.saturating_mul(4))?;
    let mut compressed_sizes = Vec::with_capacity(count);
    for _ in 0..count {
        compressed_sizes.push(reader.read_u32()?);
    }

    Ok((header, compressed_sizes, reader.position()))
}

/// Decode a whole container into its decompressed payload.
pub fn decode(data: &[u8], decompressor: &dyn Decompressor) -> Result<Vec<u8>> {
    let (header, compressed_sizes, payload_start) = read_header(data)?;
    let chunk_sizes = header.chunk_sizes()?;

    debug!(
        uncompressed = { header.uncompressed_size },
        chunks = { header.chunk_count },
        encoding = %header.encoding(),
        "decoding container"
    );

    let mut output = vec![0u8; header.uncompressed_size as usize];
    let mut reader = BinaryReader::new_at(data, payload_start);
    let mut offset = 0usize;

    for (chunk, (&compressed_size, &expected)) in
        compressed_sizes.iter().zip(&chunk_sizes).enumerate()
    {
        let compressed = reader.read_bytes(compressed_size as usize)?;
        let decompressed = decompressor
            .decompress(compressed, expected)
            .map_err(|e| Error::Decompression {
                chunk,
                message: e.to_string(),
            })?;

        if decompressed.len() != expected {
            return Err(Error::SizeMismatch {
                chunk,
                expected,
                actual: decompressed.len(),
            });
        }

        trace!(chunk, compressed_size, expected, "chunk decompressed");
        output[offset..offset + expected].copy_from_slice(&decompressed);
        offset += expected;
    }

    Ok(output)
}


#[cfg(test)]
mod tests {
    use super::test_support::encode;
    use super::*;
    use crate::decompress::ZstdDecompressor;
    use proptest::prelude::*;

    #[test]
    fn test_header_size() {
        assert_eq!(ContainerHeader::SIZE, 60);
    }

    #[test]
    fn test_decode_single_chunk() {
        let payload = b"the quick brown fox".repeat(10);
        let container = encode(&payload);

        let decoded = decode(&container, &ZstdDecompressor).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_decode_multiple_chunks() {
        let payload: Vec<u8> = (0..CHUNK_SIZE * 2 + 1000).map(|i| (i % 251) as u8).collect();
        let container = encode(&payload);

        let (header, sizes, _) = read_header(&container).unwrap();
        assert_eq!({ header.chunk_count }, 3);
        assert_eq!(sizes.len(), 3);

        let decoded = decode(&container, &ZstdDecompressor).unwrap();
        assert_eq!(decoded.len(), payload.len());
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_decode_empty() {
        let container = encode(&[]);
        assert!(decode(&container, &ZstdDecompressor).unwrap().is_empty());
    }

    #[test]
    fn test_truncated_chunk_is_bounds_error() {
        let payload = vec![7u8; 1000];
        let mut container = encode(&payload);
        container.truncate(container.len() - 3);

        let err = decode(&container, &ZstdDecompressor).unwrap_err();
        assert!(err.is_out_of_bounds());
    }

    #[test]
    fn test_truncated_header_is_bounds_error() {
        let err = decode(&[0u8; 20], &ZstdDecompressor).unwrap_err();
        assert!(err.is_out_of_bounds());
    }

    #[test]
    fn test_decompressor_failure_is_reported() {
        let container = encode(b"payload");
        let failing = |_: &[u8], _: usize| -> std::io::Result<Vec<u8>> {
            Err(std::io::Error::other("codec unavailable"))
        };

        match decode(&container, &failing) {
            Err(Error::Decompression { chunk, message }) => {
                assert_eq!(chunk, 0);
                assert!(message.contains("codec unavailable"));
            }
            other => panic!("expected decompression error, got {:?}", other),
        }
    }

    #[test]
    fn test_short_output_is_size_mismatch() {
        let container = encode(b"payload");
        let short = |_: &[u8], n: usize| -> std::io::Result<Vec<u8>> { Ok(vec![0; n - 1]) };

        assert!(matches!(
            decode(&container, &short),
            Err(Error::SizeMismatch { expected: 7, actual: 6, .. })
        ));
    }

    #[test]
    fn test_layout_rejects_too_many_chunks() {
        assert!(matches!(chunk_layout(10, 2), Err(Error::ChunkLayout(_))));
        assert!(matches!(chunk_layout(10, 0), Err(Error::ChunkLayout(_))));
        assert!(matches!(
            chunk_layout(CHUNK_SIZE + 1, 1),
            Err(Error::ChunkLayout(_))
        ));
    }

    #[test]
    fn test_encoding_names() {
        assert_eq!(ChunkEncoding::from(8), ChunkEncoding::Kraken);
        assert_eq!(ChunkEncoding::from(13).to_string(), "Leviathan");
        assert_eq!(ChunkEncoding::from(99), ChunkEncoding::Other(99));
    }

    proptest! {
        #[test]
        fn prop_chunk_sizes_sum_to_total(size in 1usize..(CHUNK_SIZE * 8)) {
            let count = size.div_ceil(CHUNK_SIZE);
            let sizes = chunk_layout(size, count).unwrap();
            prop_assert_eq!(sizes.len(), count);
            prop_assert_eq!(sizes.iter().sum::<usize>(), size);
            prop_assert!(sizes.iter().all(|&s| s > 0 && s <= CHUNK_SIZE));
        }
    }
}
