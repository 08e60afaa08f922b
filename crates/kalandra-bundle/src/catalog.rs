//! Path catalog decoding.
//!
//! The index stores file paths as a small bytecode that shares common
//! prefixes. Each section is a sequence of `i32` commands:
//!
//! - `0` toggles between the *base* phase and the *result* phase. Entering
//!   the base phase discards every base collected so far.
//! - Any other value is followed by a null-terminated fragment. If
//!   `command - 1` indexes an existing base, that base is prepended to the
//!   fragment. The string is then added to the bases (base phase) or emitted
//!   as a path (result phase).

use kalandra_common::BinaryReader;

use crate::Result;

/// Decode one catalog section into the paths it emits.
pub fn decode_section(section: &[u8]) -> Result<Vec<String>> {
    let mut reader = BinaryReader::new(section);
    let mut bases: Vec<String> = Vec::new();
    let mut results = Vec::new();
    let mut base_phase = false;

    while !reader.is_empty() {
        let command = reader.read_i32()?;
        if command == 0 {
            base_phase = !base_phase;
            if base_phase {
                bases.clear();
            }
            continue;
        }

        let fragment = std::str::from_utf8(reader.read_cstring_bytes()?)
            .map_err(kalandra_common::Error::Utf8)?;

        let base = command
            .checked_sub(1)
            .and_then(|i| usize::try_from(i).ok())
            .and_then(|i| bases.get(i));
        let path = match base {
            Some(base) => {
                let mut s = String::with_capacity(base.len() + fragment.len());
                s.push_str(base);
                s.push_str(fragment);
                s
            }
            None => fragment.to_owned(),
        };

        if base_phase {
            bases.push(path);
        } else {
            results.push(path);
        }
    }

    Ok(results)
}

/// Decode every section of a catalog buffer.
///
/// `sections` are `(offset, size)` pairs into `data`. The paths are returned
/// in section order.
pub fn decode_catalog<I>(data: &[u8], sections: I) -> Result<Vec<String>>
where
    I: IntoIterator<Item = (usize, usize)>,
{
    let mut paths = Vec::new();
    for (offset, size) in sections {
        let section = BinaryReader::new_at(data, offset).read_bytes(size)?;
        paths.extend(decode_section(section)?);
    }
    Ok(paths)
}
