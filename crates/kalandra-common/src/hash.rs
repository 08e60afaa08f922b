//! Content hash for archive paths.
//!
//! The master index stores only a 64-bit hash per file. Path strings decoded
//! from the catalog are hashed with [`path_hash`] and matched against it.
//! The hash is FNV-1a over the lowercased path followed by `"++"`.

/// FNV-1a 64-bit offset basis.
pub const FNV64_OFFSET_BASIS: u64 = 14695981039346656037;

/// FNV-1a 64-bit prime.
pub const FNV64_PRIME: u64 = 1099511628211;

const PATH_SUFFIX: &[u8] = b"++";

/// Compute FNV-1a over a byte slice, continuing from `state`.
#[inline]
pub fn fnv1a64_with_seed(data: &[u8], state: u64) -> u64 {
    data.iter()
        .fold(state, |h, &b| (h ^ b as u64).wrapping_mul(FNV64_PRIME))
}

/// Compute FNV-1a over a byte slice.
#[inline]
pub fn fnv1a64(data: &[u8]) -> u64 {
    fnv1a64_with_seed(data, FNV64_OFFSET_BASIS)
}

/// Hash an archive path.
///
/// Case-insensitive: the path is lowercased before hashing.
pub fn path_hash(path: &str) -> u64 {
    let lower = path.to_lowercase();
    let h = fnv1a64(lower.as_bytes());
    fnv1a64_with_seed(PATH_SUFFIX, h)
}
