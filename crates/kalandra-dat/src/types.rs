//! Field types and their on-disk decoding.
//!
//! Type names follow a small prefix grammar:
//!
//! ```text
//! type     := primitive | "ref|" ref_tail
//! ref_tail := "list|" type      -> List(type)
//!           | type              -> Ref(type)
//! ```
//!
//! A `Ref` is a 4-byte pointer into the data section. A `List` is a 4-byte
//! count followed by a 4-byte pointer to `count` consecutive elements. Both
//! decode their target through a separate reader, so the caller's cursor only
//! ever moves past the inline pointer bytes.

use std::sync::Arc;

use kalandra_common::BinaryReader;

use crate::{Error, Result, Value};

const REF_PREFIX: &str = "ref|";
const LIST_PREFIX: &str = "list|";

/// Largest `byte[N]` width.
pub const MAX_BYTE_ARRAY: usize = 100;

/// Scalar and string field types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Bool,
    Byte,
    Short,
    UShort,
    Int,
    UInt,
    Float,
    Long,
    ULong,
    /// Zero-terminated UTF-16 text.
    String,
    /// Zero-terminated UTF-8 text.
    Utf8String,
    /// Fixed run of raw bytes (`byte[N]`).
    Bytes(u8),
    /// Untyped 32-bit key (`ref|generic`), read in place.
    Generic,
}

impl PrimitiveKind {
    /// Parse a primitive type name.
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name {
            "bool" => Self::Bool,
            "byte" => Self::Byte,
            "short" => Self::Short,
            "ushort" => Self::UShort,
            "int" => Self::Int,
            "uint" => Self::UInt,
            "float" => Self::Float,
            "long" => Self::Long,
            "ulong" => Self::ULong,
            "string" => Self::String,
            "utf8string" => Self::Utf8String,
            "ref|generic" => Self::Generic,
            _ => {
                let n: usize = name.strip_prefix("byte[")?.strip_suffix(']')?.parse().ok()?;
                if !(1..=MAX_BYTE_ARRAY).contains(&n) {
                    return None;
                }
                Self::Bytes(n as u8)
            }
        };
        Some(kind)
    }

    /// Bytes consumed at the cursor, or `None` for variable-width text.
    pub fn fixed_size(&self) -> Option<usize> {
        match self {
            Self::Bool | Self::Byte => Some(1),
            Self::Short | Self::UShort => Some(2),
            Self::Int | Self::UInt | Self::Float | Self::Generic => Some(4),
            Self::Long | Self::ULong => Some(8),
            Self::Bytes(n) => Some(*n as usize),
            Self::String | Self::Utf8String => None,
        }
    }

    /// Decode one value at the reader's position.
    pub fn decode(&self, reader: &mut BinaryReader<'_>) -> Result<Value> {
        let value = match self {
            Self::Bool => Value::Bool(reader.read_bool()?),
            Self::Byte => Value::UInt8(reader.read_u8()?),
            Self::Short => Value::Int16(reader.read_i16()?),
            Self::UShort => Value::UInt16(reader.read_u16()?),
            Self::Int | Self::Generic => Value::Int32(reader.read_i32()?),
            Self::UInt => Value::UInt32(reader.read_u32()?),
            Self::Float => Value::Float(reader.read_f32()?),
            Self::Long => Value::Int64(reader.read_i64()?),
            Self::ULong => Value::UInt64(reader.read_u64()?),
            Self::String => Value::String(read_utf16z(reader)?),
            Self::Utf8String => Value::String(reader.read_cstring()?.to_owned()),
            Self::Bytes(n) => Value::Bytes(reader.read_bytes(*n as usize)?.to_vec()),
        };
        Ok(value)
    }
}

impl std::fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Bool => "bool",
            Self::Byte => "byte",
            Self::Short => "short",
            Self::UShort => "ushort",
            Self::Int => "int",
            Self::UInt => "uint",
            Self::Float => "float",
            Self::Long => "long",
            Self::ULong => "ulong",
            Self::String => "string",
            Self::Utf8String => "utf8string",
            Self::Generic => "ref|generic",
            Self::Bytes(n) => return write!(f, "byte[{}]", n),
        };
        f.write_str(name)
    }
}

/// Read UTF-16 code units up to a zero unit; the next unit must be zero too.
fn read_utf16z(reader: &mut BinaryReader<'_>) -> Result<String> {
    let mut units = Vec::new();
    loop {
        let unit = reader.read_u16()?;
        if unit == 0 {
            break;
        }
        units.push(unit);
    }

    let offset = reader.position();
    if reader.read_u16()? != 0 {
        return Err(Error::UnterminatedString { offset });
    }

    Ok(String::from_utf16_lossy(&units))
}

/// A field type.
///
/// Nested types are shared behind [`Arc`] so a registry can hand out the
/// same descriptor for every occurrence of a name.
#[derive(Debug, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// Value stored in place.
    Primitive(PrimitiveKind),
    /// 4-byte pointer to one value in the data section.
    Ref(Arc<FieldType>),
    /// 4-byte count and 4-byte pointer to consecutive values in the data section.
    List(Arc<FieldType>),
}

impl FieldType {
    /// Parse a type name without caching.
    pub fn parse(name: &str) -> Result<Self> {
        Self::parse_with(name, &mut |inner| Self::parse(inner).map(Arc::new))
    }

    /// Parse one level of a type name, resolving nested names through `resolve`.
    pub(crate) fn parse_with<F>(name: &str, resolve: &mut F) -> Result<Self>
    where
        F: FnMut(&str) -> Result<Arc<FieldType>>,
    {
        if let Some(kind) = PrimitiveKind::from_name(name) {
            return Ok(Self::Primitive(kind));
        }

        let tail = name
            .strip_prefix(REF_PREFIX)
            .ok_or_else(|| Error::UnknownType(name.to_string()))?;

        match tail.strip_prefix(LIST_PREFIX) {
            Some(element) => Ok(Self::List(resolve(element)?)),
            None => Ok(Self::Ref(resolve(tail)?)),
        }
    }

    /// Bytes this type consumes at the cursor, or `None` if that depends on the data.
    pub fn inline_size(&self) -> Option<usize> {
        match self {
            Self::Primitive(kind) => kind.fixed_size(),
            Self::Ref(_) => Some(4),
            Self::List(_) => Some(8),
        }
    }

    /// Decode one value at the reader's position.
    ///
    /// `data_section_offset` is where pointer targets are measured from.
    /// For `Ref` and `List` the reader advances by exactly 4 and 8 bytes.
    pub fn decode(&self, reader: &mut BinaryReader<'_>, data_section_offset: usize) -> Result<Value> {
        match self {
            Self::Primitive(kind) => kind.decode(reader),
            Self::Ref(inner) => {
                let pointer = reader.read_u32()? as usize;
                let target = data_section_offset.saturating_add(pointer).min(reader.len());
                inner.decode_at(reader.data(), target, data_section_offset)
            }
            Self::List(element) => {
                let count = reader.read_u32()? as usize;
                let pointer = reader.read_u32()? as usize;
                if count == 0 {
                    return Ok(Value::List(Vec::new()));
                }

                let mut target = reader.fork_at(data_section_offset.saturating_add(pointer));
                let mut items = Vec::with_capacity(count.min(target.remaining()));
                for _ in 0..count {
                    items.push(element.decode(&mut target, data_section_offset)?);
                }
                Ok(Value::List(items))
            }
        }
    }

    /// Decode one value at an absolute position in `data`.
    pub fn decode_at(&self, data: &[u8], position: usize, data_section_offset: usize) -> Result<Value> {
        self.decode(&mut BinaryReader::new_at(data, position), data_section_offset)
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primitive(kind) => write!(f, "{}", kind),
            Self::Ref(inner) => write!(f, "{}{}", REF_PREFIX, inner),
            Self::List(element) => write!(f, "{}{}{}", REF_PREFIX, LIST_PREFIX, element),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn prim(kind: PrimitiveKind) -> Arc<FieldType> {
        Arc::new(FieldType::Primitive(kind))
    }

    #[test]
    fn test_parse_primitives() {
        assert_eq!(FieldType::parse("int").unwrap(), FieldType::Primitive(PrimitiveKind::Int));
        assert_eq!(
            FieldType::parse("byte[12]").unwrap(),
            FieldType::Primitive(PrimitiveKind::Bytes(12))
        );
        assert_eq!(
            FieldType::parse("ref|generic").unwrap(),
            FieldType::Primitive(PrimitiveKind::Generic)
        );
    }

    #[test]
    fn test_parse_nested() {
        let parsed = FieldType::parse("ref|list|ref|string").unwrap();
        let expected = FieldType::List(Arc::new(FieldType::Ref(prim(PrimitiveKind::String))));
        assert_eq!(parsed, expected);
        assert_eq!(parsed.to_string(), "ref|list|ref|string");

        let parsed = FieldType::parse("ref|ref|list|ulong").unwrap();
        let expected = FieldType::Ref(Arc::new(FieldType::List(prim(PrimitiveKind::ULong))));
        assert_eq!(parsed, expected);
    }

    #[test]
    fn test_parse_unknown() {
        for name in ["", "integer", "list|int", "ref|", "ref|list|", "ref|nope", "byte[0]", "byte[101]"] {
            assert!(
                matches!(FieldType::parse(name), Err(Error::UnknownType(_))),
                "{} should not parse",
                name
            );
        }
    }

    #[test]
    fn test_primitive_sizes() {
        let data: Vec<u8> = (0u8..16).collect();
        for (name, size) in [
            ("bool", 1),
            ("byte", 1),
            ("short", 2),
            ("ushort", 2),
            ("int", 4),
            ("uint", 4),
            ("float", 4),
            ("long", 8),
            ("ulong", 8),
            ("byte[3]", 3),
        ] {
            let ty = FieldType::parse(name).unwrap();
            let mut reader = BinaryReader::new(&data);
            ty.decode(&mut reader, 0).unwrap();
            assert_eq!(reader.position(), size, "{}", name);
            assert_eq!(ty.inline_size(), Some(size));
        }
    }

    #[test]
    fn test_utf16_string() {
        let mut data = Vec::new();
        for unit in "héllo".encode_utf16() {
            data.extend_from_slice(&unit.to_le_bytes());
        }
        data.extend_from_slice(&[0, 0, 0, 0]);

        let mut reader = BinaryReader::new(&data);
        let value = PrimitiveKind::String.decode(&mut reader).unwrap();
        assert_eq!(value, Value::String("héllo".into()));
        assert_eq!(reader.position(), data.len());
    }

    #[test]
    fn test_utf16_string_bad_terminator() {
        let data = [b'a', 0, 0, 0, b'b', 0];
        let mut reader = BinaryReader::new(&data);
        assert!(matches!(
            PrimitiveKind::String.decode(&mut reader),
            Err(Error::UnterminatedString { offset: 4 })
        ));
    }

    #[test]
    fn test_ref_string() {
        // Row: pointer 4. Data section at 8: 4 bytes padding, then "hi\0\0".
        let mut data = vec![4, 0, 0, 0, 0, 0, 0, 0];
        data.extend_from_slice(&[0xBB; 4]);
        data.extend_from_slice(&[b'h', 0, b'i', 0, 0, 0, 0, 0]);

        let ty = FieldType::parse("ref|string").unwrap();
        let mut reader = BinaryReader::new(&data);
        assert_eq!(ty.decode(&mut reader, 8).unwrap(), Value::String("hi".into()));
        assert_eq!(reader.position(), 4);
    }

    #[test]
    fn test_ref_pointer_is_clamped() {
        let data = [0xFF, 0xFF, 0xFF, 0x7F];
        let ty = FieldType::parse("ref|int").unwrap();
        let mut reader = BinaryReader::new(&data);

        let err = ty.decode(&mut reader, 0).unwrap_err();
        match err {
            Error::Common(kalandra_common::Error::UnexpectedEof { offset, .. }) => {
                assert_eq!(offset, data.len())
            }
            other => panic!("expected eof, got {:?}", other),
        }
        assert_eq!(reader.position(), 4);
    }

    #[test]
    fn test_list_of_ints() {
        let mut data = Vec::new();
        data.extend_from_slice(&3u32.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        for v in [10i32, -20, 30] {
            data.extend_from_slice(&v.to_le_bytes());
        }

        let ty = FieldType::parse("ref|list|int").unwrap();
        let mut reader = BinaryReader::new(&data);
        let value = ty.decode(&mut reader, 8).unwrap();
        assert_eq!(
            value,
            Value::List(vec![Value::Int32(10), Value::Int32(-20), Value::Int32(30)])
        );
        assert_eq!(reader.position(), 8);
    }

    #[test]
    fn test_list_truncated() {
        let mut data = Vec::new();
        data.extend_from_slice(&2u32.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&1u64.to_le_bytes());

        let ty = FieldType::parse("ref|list|ulong").unwrap();
        let err = ty.decode(&mut BinaryReader::new(&data), 8).unwrap_err();
        assert!(err.is_out_of_bounds());
    }

    /// Buffer layout for `ref|list|ref|int` at a given data section offset:
    /// a 4-byte pointer at 0, then the data section holding the list header,
    /// the element pointers and the ints.
    fn nested_buffer(dso: usize, pad: usize, values: &[i32]) -> Vec<u8> {
        let mut data = vec![0u8; dso];
        let list_header = pad as u32;
        data[0..4].copy_from_slice(&list_header.to_le_bytes());

        let mut section = vec![0xCD; pad];
        let elements_at = pad + 8;
        let ints_at = elements_at + 4 * values.len();
        section.extend_from_slice(&(values.len() as u32).to_le_bytes());
        section.extend_from_slice(&(elements_at as u32).to_le_bytes());
        for i in 0..values.len() {
            section.extend_from_slice(&((ints_at + 4 * i) as u32).to_le_bytes());
        }
        for v in values {
            section.extend_from_slice(&v.to_le_bytes());
        }

        data.extend_from_slice(&section);
        data
    }

    proptest! {
        #[test]
        fn prop_ref_moves_cursor_by_four(
            dso in 4usize..64,
            pad in 0usize..32,
            values in proptest::collection::vec(any::<i32>(), 0..8),
        ) {
            let data = nested_buffer(dso, pad, &values);
            let ty = FieldType::parse("ref|ref|list|ref|int").unwrap();

            let mut reader = BinaryReader::new(&data);
            let value = ty.decode(&mut reader, dso).unwrap();

            prop_assert_eq!(reader.position(), 4);
            let expected = Value::List(values.iter().copied().map(Value::Int32).collect());
            prop_assert_eq!(value, expected);
        }

        #[test]
        fn prop_empty_list_never_follows_pointer(pointer in any::<u32>(), dso in any::<u32>()) {
            let mut data = Vec::new();
            data.extend_from_slice(&0u32.to_le_bytes());
            data.extend_from_slice(&pointer.to_le_bytes());

            let ty = FieldType::parse("ref|list|ulong").unwrap();
            let mut reader = BinaryReader::new(&data);
            prop_assert_eq!(ty.decode(&mut reader, dso as usize).unwrap(), Value::List(vec![]));
            prop_assert_eq!(reader.position(), 8);
        }
    }
}
