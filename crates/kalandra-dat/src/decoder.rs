//! Dat table decoding.
//!
//! A dat buffer is laid out as:
//!
//! ```text
//! u32 row_count
//! row_count * stride bytes of fixed-size rows
//! u64 sentinel (0xBBBBBBBBBBBBBBBB)   <- data_section_offset
//! variable-length payloads addressed by pointers in the rows
//! ```
//!
//! The stride is not stored; it is found by scanning for the sentinel.

use std::sync::Arc;

use kalandra_common::BinaryReader;
use tracing::{debug, trace};

use crate::record::{Record, REMAINDER_KEY};
use crate::registry::TypeRegistry;
use crate::schema::RecordSchema;
use crate::types::{FieldType, PrimitiveKind};
use crate::{Error, Result, Value};

/// Sentinel separating the row table from the data section.
pub const MAGIC: u64 = 0xBBbb_BBbb_BBbb_BBbb;

/// Find the row stride by scanning for the sentinel.
///
/// Candidate stride `i` is accepted when the 8 bytes at `4 + i * row_count`
/// equal [`MAGIC`]. Zero rows give stride 0 without reading anything.
pub fn find_stride(data: &[u8], row_count: usize) -> Result<usize> {
    if row_count == 0 {
        return Ok(0);
    }

    let not_found = || Error::StrideNotFound {
        row_count,
        len: data.len(),
    };

    let mut stride = 0usize;
    loop {
        let offset = stride
            .checked_mul(row_count)
            .and_then(|n| n.checked_add(4))
            .ok_or_else(not_found)?;

        match BinaryReader::new_at(data, offset).peek_u64() {
            Ok(MAGIC) => return Ok(stride),
            Ok(_) => stride += 1,
            Err(_) => return Err(not_found()),
        }
    }
}

/// Compute the data section offset for a stride and check the sentinel there.
pub fn data_section_offset(data: &[u8], row_count: usize, stride: usize) -> Result<usize> {
    let offset = row_count.saturating_mul(stride).saturating_add(4);
    if row_count == 0 {
        return Ok(offset);
    }

    let found = BinaryReader::new_at(data, offset).peek_u64()?;
    if found != MAGIC {
        return Err(Error::MissingSentinel { offset, found });
    }
    Ok(offset)
}

/// A decoded dat table.
#[derive(Debug, Clone)]
pub struct DatFile {
    pub row_count: usize,
    /// Bytes per row.
    pub stride: usize,
    /// Offset of the sentinel; pointers are relative to it.
    pub data_section_offset: usize,
    pub records: Vec<Record>,
}

/// Decodes dat buffers into [`Record`]s.
///
/// The decoder holds no per-buffer state. It owns a [`TypeRegistry`] for
/// building schemas and the fixed set of shapes used to reinterpret
/// undeclared trailing row bytes.
#[derive(Debug)]
pub struct RecordDecoder {
    registry: Arc<TypeRegistry>,
    shapes: Vec<(&'static str, Arc<FieldType>)>,
}

impl Default for RecordDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordDecoder {
    /// Create a decoder with its own type registry.
    pub fn new() -> Self {
        Self::with_registry(Arc::new(TypeRegistry::new()))
    }

    /// Create a decoder sharing an existing type registry.
    pub fn with_registry(registry: Arc<TypeRegistry>) -> Self {
        Self {
            registry,
            shapes: remainder_shapes(),
        }
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// Build a schema from `(field id, type name)` pairs using this decoder's registry.
    pub fn schema<'a, I>(&self, name: &str, pairs: I) -> Result<RecordSchema>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        RecordSchema::from_pairs(name, pairs, &self.registry)
    }

    /// Decode every row of `data` with `schema`.
    pub fn decode(&self, data: &[u8], schema: &RecordSchema) -> Result<DatFile> {
        let row_count = BinaryReader::new(data).read_u32()? as usize;
        let stride = find_stride(data, row_count)?;
        let dso = data_section_offset(data, row_count, stride)?;

        debug!(
            schema = schema.name(),
            rows = row_count,
            stride,
            data_section_offset = dso,
            "decoding dat table"
        );

        let records = (0..row_count)
            .map(|row| self.decode_row(data, schema, row, 4 + row * stride, stride, dso))
            .collect::<Result<Vec<_>>>()?;

        Ok(DatFile {
            row_count,
            stride,
            data_section_offset: dso,
            records,
        })
    }

    /// Decode every row of `data`, keeping only the records.
    pub fn decode_records(&self, data: &[u8], schema: &RecordSchema) -> Result<Vec<Record>> {
        self.decode(data, schema).map(|dat| dat.records)
    }

    fn decode_row(
        &self,
        data: &[u8],
        schema: &RecordSchema,
        row: usize,
        row_start: usize,
        stride: usize,
        dso: usize,
    ) -> Result<Record> {
        let row_end = row_start + stride;
        let mut cursor = BinaryReader::new_at(data, row_start);
        let mut record = Record::with_capacity(schema.len() + 1);

        for (field_index, field) in schema.fields().iter().enumerate() {
            let overrun = |end: usize| Error::SchemaMismatch {
                row,
                field_index,
                field: field.id.clone(),
                overrun: end - row_end,
            };

            // Fixed-width fields are checked before reading so a field wider
            // than the rest of the buffer still reports the schema overrun.
            if let Some(size) = field.field_type.inline_size() {
                let end = cursor.position() + size;
                if end > row_end {
                    return Err(overrun(end));
                }
            }

            let value = field
                .field_type
                .decode(&mut cursor, dso)
                .map_err(|e| Error::Row {
                    row,
                    field: field.id.clone(),
                    source: Box::new(e),
                })?;

            if cursor.position() > row_end {
                return Err(overrun(cursor.position()));
            }

            record.push(field.id.as_str(), value);
        }

        let consumed = cursor.position() - row_start;
        if consumed < stride {
            self.recover_remainder(&mut record, data, row, row_start + consumed, row_end, dso);
        }

        Ok(record)
    }

    fn recover_remainder(
        &self,
        record: &mut Record,
        data: &[u8],
        row: usize,
        start: usize,
        row_end: usize,
        dso: usize,
    ) {
        let bytes = &data[start..row_end];
        record.push_with_remark(
            REMAINDER_KEY,
            Value::Bytes(bytes.to_vec()),
            format!("{} undeclared bytes at buffer offset {}", bytes.len(), start),
        );

        for (key, shape) in &self.shapes {
            let mut reader = BinaryReader::new_at(data, start);
            match shape.decode(&mut reader, dso) {
                Ok(value) if reader.position() <= row_end => record.push(*key, value),
                Ok(_) => trace!(row, key, "remainder shape overruns the row"),
                Err(e) => trace!(row, key, error = %e, "remainder shape does not decode"),
            }
        }
    }
}

fn remainder_shapes() -> Vec<(&'static str, Arc<FieldType>)> {
    let prim = |kind| Arc::new(FieldType::Primitive(kind));

    vec![
        ("_RemainderBool", prim(PrimitiveKind::Bool)),
        ("_RemainderByte", prim(PrimitiveKind::Byte)),
        ("_RemainderInt", prim(PrimitiveKind::Int)),
        ("_RemainderUInt", prim(PrimitiveKind::UInt)),
        ("_RemainderLong", prim(PrimitiveKind::Long)),
        ("_RemainderULong", prim(PrimitiveKind::ULong)),
        ("_RemainderFloat", prim(PrimitiveKind::Float)),
        ("_RemainderString", prim(PrimitiveKind::Utf8String)),
        (
            "_RemainderRefString",
            Arc::new(FieldType::Ref(prim(PrimitiveKind::Utf8String))),
        ),
        (
            "_RemainderListULong",
            Arc::new(FieldType::List(prim(PrimitiveKind::ULong))),
        ),
        (
            "_RemainderListInt",
            Arc::new(FieldType::List(prim(PrimitiveKind::Int))),
        ),
    ]
}
