use crate::model::{Attribute, JoinColumn, StructuredType};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Ordered chain of attributes an attribute path resolves to. The last
/// attribute is the leaf, all others are complex attributes.
#[derive(Debug, Clone)]
pub struct AttributeChain {
    attributes: Vec<Attribute>,
}

impl AttributeChain {
    pub(crate) fn new(attributes: Vec<Attribute>) -> Self {
        debug_assert!(!attributes.is_empty());
        Self { attributes }
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn first(&self) -> &Attribute {
        &self.attributes[0]
    }

    pub fn leaf(&self) -> &Attribute {
        &self.attributes[self.attributes.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

/// A parent to child relationship seen from a root entity type.
///
/// Join columns carry parent-side paths that are absolute from the root type
/// and child-side paths relative to the target type.
#[derive(Debug, Clone)]
pub struct AssociationPath {
    root_type: String,
    alias: String,
    owner_prefix: String,
    name: String,
    target: Arc<StructuredType>,
    join_columns: Vec<JoinColumn>,
    collection: bool,
}

impl AssociationPath {
    pub(crate) fn new(
        root_type: String,
        owner_prefix: String,
        name: String,
        target: Arc<StructuredType>,
        join_columns: Vec<JoinColumn>,
        collection: bool,
    ) -> Self {
        let alias = crate::model::join_path(&owner_prefix, &name);
        Self {
            root_type,
            alias,
            owner_prefix,
            name,
            target,
            join_columns,
            collection,
        }
    }

    /// Full path of the association, e.g. "AdministrativeInformation/Created/User"
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Path of the complex container that owns the association, empty for the root
    pub fn owner_prefix(&self) -> &str {
        &self.owner_prefix
    }

    /// External name of the association attribute
    pub fn leaf_name(&self) -> &str {
        &self.name
    }

    pub fn root_type(&self) -> &str {
        &self.root_type
    }

    pub fn target(&self) -> &Arc<StructuredType> {
        &self.target
    }

    pub fn join_columns(&self) -> &[JoinColumn] {
        &self.join_columns
    }

    pub fn is_collection(&self) -> bool {
        self.collection
    }

    /// Parent-side aliases in join order
    pub fn source_aliases(&self) -> impl Iterator<Item = &str> {
        self.join_columns.iter().map(|c| c.source.as_str())
    }

    /// Child-side aliases in join order
    pub fn target_aliases(&self) -> impl Iterator<Item = &str> {
        self.join_columns.iter().map(|c| c.target.as_str())
    }
}

impl PartialEq for AssociationPath {
    fn eq(&self, other: &Self) -> bool {
        self.root_type == other.root_type && self.alias == other.alias
    }
}

impl Eq for AssociationPath {}

impl Hash for AssociationPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.root_type.hash(state);
        self.alias.hash(state);
    }
}

impl PartialOrd for AssociationPath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AssociationPath {
    fn cmp(&self, other: &Self) -> Ordering {
        (&self.root_type, &self.alias).cmp(&(&other.root_type, &other.alias))
    }
}
