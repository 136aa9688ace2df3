use crate::model::{internal_name, DataType, MappingError};
use std::collections::HashMap;
use std::sync::Arc;

/// One pair of a join condition. `source` is a path relative to the type that
/// declares the association, `target` a path relative to the target type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinColumn {
    pub source: String,
    pub target: String,
}

impl JoinColumn {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum AttributeKind {
    Primitive(DataType),
    Complex(Arc<StructuredType>),
    Association {
        target: Arc<StructuredType>,
        join_columns: Vec<JoinColumn>,
        collection: bool,
    },
}

impl AttributeKind {
    pub fn describe(&self) -> &'static str {
        match self {
            AttributeKind::Primitive(_) => "primitive",
            AttributeKind::Complex(_) => "complex",
            AttributeKind::Association { .. } => "navigation",
        }
    }
}

/// A single attribute of a structured type
#[derive(Debug, Clone)]
pub struct Attribute {
    /// Name used in row aliases, request paths and documents (e.g. "Address")
    pub external_name: String,

    /// Name used in write instructions handed to write handlers (e.g. "address")
    pub internal_name: String,

    pub kind: AttributeKind,
}

impl Attribute {
    pub fn primitive(name: impl Into<String>, data_type: DataType) -> Self {
        Self::with_kind(name.into(), AttributeKind::Primitive(data_type))
    }

    pub fn complex(name: impl Into<String>, structured_type: Arc<StructuredType>) -> Self {
        Self::with_kind(name.into(), AttributeKind::Complex(structured_type))
    }

    pub fn association(
        name: impl Into<String>,
        target: Arc<StructuredType>,
        join_columns: Vec<JoinColumn>,
        collection: bool,
    ) -> Self {
        Self::with_kind(
            name.into(),
            AttributeKind::Association {
                target,
                join_columns,
                collection,
            },
        )
    }

    fn with_kind(external_name: String, kind: AttributeKind) -> Self {
        Self {
            internal_name: internal_name(&external_name),
            external_name,
            kind,
        }
    }

    /// Override the derived internal name
    pub fn with_internal_name(mut self, name: impl Into<String>) -> Self {
        self.internal_name = name.into();
        self
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self.kind, AttributeKind::Primitive(_))
    }

    pub fn is_complex(&self) -> bool {
        matches!(self.kind, AttributeKind::Complex(_))
    }

    pub fn is_association(&self) -> bool {
        matches!(self.kind, AttributeKind::Association { .. })
    }

    /// Nested type of a complex attribute
    pub fn structured_type(&self) -> Option<&Arc<StructuredType>> {
        match &self.kind {
            AttributeKind::Complex(nested) => Some(nested),
            _ => None,
        }
    }

    pub fn target(&self) -> Option<&Arc<StructuredType>> {
        match &self.kind {
            AttributeKind::Association { target, .. } => Some(target),
            _ => None,
        }
    }

    pub fn data_type(&self) -> Option<DataType> {
        match self.kind {
            AttributeKind::Primitive(data_type) => Some(data_type),
            _ => None,
        }
    }
}

/// Metadata of an entity type or a complex type.
///
/// Instances are immutable once built and are shared between requests
/// through `Arc`.
#[derive(Debug)]
pub struct StructuredType {
    namespace: String,
    name: String,
    /// Entity set the type is exposed under; `None` for complex types
    entity_set: Option<String>,
    attributes: Vec<Attribute>,
    by_external_name: HashMap<String, usize>,
    /// External names of the key attributes in declared order
    key: Vec<String>,
}

impl StructuredType {
    pub fn entity(
        namespace: impl Into<String>,
        name: impl Into<String>,
        entity_set: impl Into<String>,
    ) -> StructuredTypeBuilder {
        StructuredTypeBuilder::new(namespace.into(), name.into(), Some(entity_set.into()))
    }

    pub fn complex(namespace: impl Into<String>, name: impl Into<String>) -> StructuredTypeBuilder {
        StructuredTypeBuilder::new(namespace.into(), name.into(), None)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Fully qualified name, e.g. "com.example.Organization"
    pub fn fqn(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }

    pub fn entity_set(&self) -> Option<&str> {
        self.entity_set.as_deref()
    }

    pub fn is_entity(&self) -> bool {
        self.entity_set.is_some()
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn attribute(&self, external_name: &str) -> Option<&Attribute> {
        self.by_external_name
            .get(external_name)
            .map(|index| &self.attributes[*index])
    }

    pub fn attribute_by_internal_name(&self, internal_name: &str) -> Option<&Attribute> {
        self.attributes
            .iter()
            .find(|a| a.internal_name == internal_name)
    }

    /// Association declared directly on this type (not on nested complex types)
    pub fn declared_association(&self, external_name: &str) -> Option<&Attribute> {
        self.attribute(external_name).filter(|a| a.is_association())
    }

    pub fn key_names(&self) -> &[String] {
        &self.key
    }
}

pub struct StructuredTypeBuilder {
    namespace: String,
    name: String,
    entity_set: Option<String>,
    attributes: Vec<Attribute>,
    key: Vec<String>,
}

impl StructuredTypeBuilder {
    fn new(namespace: String, name: String, entity_set: Option<String>) -> Self {
        Self {
            namespace,
            name,
            entity_set,
            attributes: Vec::new(),
            key: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn with_primitive(self, name: &str, data_type: DataType) -> Self {
        self.with_attribute(Attribute::primitive(name, data_type))
    }

    pub fn with_complex(self, name: &str, structured_type: &Arc<StructuredType>) -> Self {
        self.with_attribute(Attribute::complex(name, structured_type.clone()))
    }

    pub fn with_association(
        self,
        name: &str,
        target: &Arc<StructuredType>,
        join_columns: &[(&str, &str)],
        collection: bool,
    ) -> Self {
        let join_columns = join_columns
            .iter()
            .map(|(source, target)| JoinColumn::new(*source, *target))
            .collect();
        self.with_attribute(Attribute::association(name, target.clone(), join_columns, collection))
    }

    pub fn with_key<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.key = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn build(self) -> Result<Arc<StructuredType>, MappingError> {
        let mut by_external_name = HashMap::new();
        for (index, attribute) in self.attributes.iter().enumerate() {
            if by_external_name
                .insert(attribute.external_name.clone(), index)
                .is_some()
            {
                return Err(MappingError::DuplicateAttribute {
                    type_name: self.name,
                    name: attribute.external_name.clone(),
                });
            }
        }

        // Keys are primitives or an embedded (complex) key
        for key in &self.key {
            let valid = by_external_name
                .get(key)
                .map(|index| !self.attributes[*index].is_association())
                .unwrap_or(false);
            if !valid {
                return Err(MappingError::InvalidKey {
                    type_name: self.name,
                    name: key.clone(),
                });
            }
        }

        Ok(Arc::new(StructuredType {
            namespace: self.namespace,
            name: self.name,
            entity_set: self.entity_set,
            attributes: self.attributes,
            by_external_name,
            key: self.key,
        }))
    }
}
