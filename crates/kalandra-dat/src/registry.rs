//! Shared cache of parsed field types.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::types::FieldType;
use crate::{FxHashMap, Result};

/// Resolves type names to shared [`FieldType`] descriptors.
///
/// Each name is parsed once. Nested names are resolved through the same
/// cache, so `ref|list|int` and `ref|list|ref|list|int` share one `int`.
/// The registry is safe to share between threads; when two threads race on
/// the same name, the first insert wins and both get the same descriptor.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: RwLock<FxHashMap<String, Arc<FieldType>>>,
}

impl TypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a type name, parsing and caching it on first use.
    pub fn resolve(&self, name: &str) -> Result<Arc<FieldType>> {
        if let Some(ty) = self.types.read().get(name) {
            return Ok(Arc::clone(ty));
        }

        let parsed = Arc::new(FieldType::parse_with(name, &mut |inner| self.resolve(inner))?);

        let mut types = self.types.write();
        let entry = types.entry(name.to_string()).or_insert(parsed);
        Ok(Arc::clone(entry))
    }

    /// Number of cached type names.
    pub fn len(&self) -> usize {
        self.types.read().len()
    }

    /// Whether nothing has been resolved yet.
    pub fn is_empty(&self) -> bool {
        self.types.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_resolve_is_cached() {
        let registry = TypeRegistry::new();
        let a = registry.resolve("ref|list|int").unwrap();
        let b = registry.resolve("ref|list|int").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_nested_names_share_descriptors() {
        let registry = TypeRegistry::new();
        let list = registry.resolve("ref|list|int").unwrap();
        let int = registry.resolve("int").unwrap();

        match &*list {
            FieldType::List(element) => assert!(Arc::ptr_eq(element, &int)),
            other => panic!("expected list, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_is_not_cached() {
        let registry = TypeRegistry::new();
        assert!(matches!(registry.resolve("ref|bogus"), Err(Error::UnknownType(_))));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_resolve_converges() {
        let registry = TypeRegistry::new();
        let resolved: Vec<_> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| registry.resolve("ref|list|ref|string").unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        for ty in &resolved[1..] {
            assert!(Arc::ptr_eq(ty, &resolved[0]));
        }
    }
}
