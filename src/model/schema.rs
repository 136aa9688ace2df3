use crate::logic::PathResolver;
use crate::model::{AttributeChain, AttributeKind, MappingError, StructuredType};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

type PathCache = HashMap<String, HashMap<String, Arc<AttributeChain>>>;

/// Registry of the entity types exposed by a service.
///
/// Besides the type lookups the schema owns a memoized path cache: every
/// primitive path of every reachable type is resolved once when the schema is
/// built, and any path missed there is resolved and published under the
/// write lock on first use. Converters share one schema across requests.
#[derive(Debug)]
pub struct Schema {
    entity_types: Vec<Arc<StructuredType>>,
    by_entity_set: HashMap<String, Arc<StructuredType>>,
    path_cache: RwLock<PathCache>,
}

impl Schema {
    pub fn new(entity_types: Vec<Arc<StructuredType>>) -> Self {
        let by_entity_set = entity_types
            .iter()
            .filter_map(|t| t.entity_set().map(|set| (set.to_string(), t.clone())))
            .collect();

        let schema = Self {
            entity_types,
            by_entity_set,
            path_cache: RwLock::new(HashMap::new()),
        };
        schema.warm_path_cache();
        schema
    }

    fn warm_path_cache(&self) {
        let mut visited = HashSet::new();
        let mut pending: Vec<Arc<StructuredType>> = self.entity_types.clone();
        let mut cache = self.path_cache.write();

        while let Some(structured_type) = pending.pop() {
            if !visited.insert(structured_type.fqn()) {
                continue;
            }

            let paths = cache.entry(structured_type.fqn()).or_default();
            for path in PathResolver::leaf_paths(&structured_type) {
                if let Ok(chain) = PathResolver::resolve(&structured_type, &path) {
                    paths.insert(path, Arc::new(chain));
                }
            }

            // Nested and target types are resolved against as well
            for attribute in structured_type.attributes() {
                match &attribute.kind {
                    AttributeKind::Complex(nested) => pending.push(nested.clone()),
                    AttributeKind::Association { target, .. } => pending.push(target.clone()),
                    AttributeKind::Primitive(_) => {}
                }
            }
        }

        log::debug!("Schema path cache warmed for {} types", cache.len());
    }

    pub fn entity_types(&self) -> &[Arc<StructuredType>] {
        &self.entity_types
    }

    pub fn entity_type_for_set(&self, entity_set: &str) -> Option<&Arc<StructuredType>> {
        self.by_entity_set.get(entity_set)
    }

    /// Find an entity type by simple or fully qualified name
    pub fn entity_type(&self, name: &str) -> Option<&Arc<StructuredType>> {
        self.entity_types
            .iter()
            .find(|t| t.name() == name || t.fqn() == name)
    }

    /// Resolve a path through the cache, falling back to the resolver
    pub fn resolve(
        &self,
        structured_type: &StructuredType,
        path: &str,
    ) -> Result<Arc<AttributeChain>, MappingError> {
        let fqn = structured_type.fqn();
        if let Some(chain) = self
            .path_cache
            .read()
            .get(&fqn)
            .and_then(|paths| paths.get(path))
        {
            return Ok(chain.clone());
        }

        let chain = Arc::new(PathResolver::resolve(structured_type, path)?);
        let mut cache = self.path_cache.write();
        let published = cache
            .entry(fqn)
            .or_default()
            .entry(path.to_string())
            .or_insert(chain);
        Ok(published.clone())
    }

    /// Number of cached paths across all types
    pub fn cached_paths(&self) -> usize {
        self.path_cache.read().values().map(HashMap::len).sum()
    }
}
