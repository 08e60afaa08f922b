//! Row schemas.

use std::sync::Arc;

use crate::registry::TypeRegistry;
use crate::types::FieldType;
use crate::{FxHashMap, FxHashSet, Result};

/// One column of a [`RecordSchema`].
#[derive(Debug, Clone)]
pub struct FieldDefinition {
    pub id: String,
    pub field_type: Arc<FieldType>,
}

/// Ordered field layout for one kind of dat file.
///
/// Field order is both the on-disk decode order and the column order of
/// decoded records. Ids are unique: a repeated id gets a numeric suffix
/// (`Id`, `Id1`, `Id2`, ...).
#[derive(Debug, Clone)]
pub struct RecordSchema {
    name: String,
    fields: Vec<FieldDefinition>,
}

impl RecordSchema {
    /// Build a schema from already-resolved fields.
    pub fn new(name: impl Into<String>, fields: impl IntoIterator<Item = FieldDefinition>) -> Self {
        let mut seen: FxHashSet<String> = FxHashSet::default();
        let mut unique = Vec::new();

        for mut field in fields {
            if seen.contains(&field.id) {
                let base = std::mem::take(&mut field.id);
                field.id = (1..)
                    .map(|n| format!("{}{}", base, n))
                    .find(|candidate| !seen.contains(candidate))
                    .unwrap_or(base);
            }
            seen.insert(field.id.clone());
            unique.push(field);
        }

        Self {
            name: name.into(),
            fields: unique,
        }
    }

    /// Build a schema from `(field id, type name)` pairs.
    pub fn from_pairs<'a, I>(name: impl Into<String>, pairs: I, registry: &TypeRegistry) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let fields = pairs
            .into_iter()
            .map(|(id, type_name)| {
                Ok(FieldDefinition {
                    id: id.to_string(),
                    field_type: registry.resolve(type_name)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::new(name, fields))
    }

    /// Logical file name this schema describes.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Row bytes the declared fields occupy, if every field has a fixed inline size.
    pub fn inline_size(&self) -> Option<usize> {
        self.fields.iter().map(|f| f.field_type.inline_size()).sum()
    }
}

/// A collection of schemas keyed by file name.
#[derive(Debug, Clone, Default)]
pub struct SchemaSet {
    schemas: Vec<RecordSchema>,
    by_name: FxHashMap<String, usize>,
}

impl SchemaSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a schema, replacing any schema with the same name.
    pub fn insert(&mut self, schema: RecordSchema) {
        let key = schema.name.to_lowercase();
        match self.by_name.get(&key) {
            Some(&index) => self.schemas[index] = schema,
            None => {
                self.by_name.insert(key, self.schemas.len());
                self.schemas.push(schema);
            }
        }
    }

    /// Look up a schema by name, ignoring case.
    pub fn get(&self, name: &str) -> Option<&RecordSchema> {
        self.by_name
            .get(&name.to_lowercase())
            .map(|&index| &self.schemas[index])
    }

    /// Look up the schema for an archive path by its file-name component.
    pub fn for_path(&self, path: &str) -> Option<&RecordSchema> {
        let file_name = path.rsplit(['/', '\\']).next().unwrap_or(path);
        self.get(file_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RecordSchema> {
        self.schemas.iter()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

#[cfg(feature = "json")]
mod json {
    use serde::Deserialize;

    use super::*;

    #[derive(Deserialize)]
    struct SchemaEntry {
        name: String,
        fields: Vec<FieldEntry>,
    }

    #[derive(Deserialize)]
    struct FieldEntry {
        id: String,
        #[serde(rename = "type")]
        type_name: String,
    }

    impl SchemaSet {
        /// Load schemas from their JSON form:
        ///
        /// ```json
        /// [{"name": "Mods.dat64", "fields": [{"id": "Id", "type": "ref|string"}]}]
        /// ```
        ///
        /// Every type name is resolved through `registry`; an unknown type
        /// fails the whole load.
        pub fn from_json(json: &str, registry: &TypeRegistry) -> Result<Self> {
            let entries: Vec<SchemaEntry> = serde_json::from_str(json)?;

            let mut set = SchemaSet::new();
            for entry in entries {
                let pairs = entry
                    .fields
                    .iter()
                    .map(|f| (f.id.as_str(), f.type_name.as_str()));
                set.insert(RecordSchema::from_pairs(entry.name, pairs, registry)?);
            }

            tracing::debug!(schemas = set.len(), types = registry.len(), "loaded schema set");
            Ok(set)
        }
    }
}
