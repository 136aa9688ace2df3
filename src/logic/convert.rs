use crate::logic::keys::build_identity;
use crate::logic::PathResolver;
use crate::model::{
    join_path, AttributeKind, Document, MappingError, Property, Row, Schema, StructuredType,
};
use serde_json::Value;
use std::collections::HashMap;

/// Turns flat, alias-keyed rows into nested documents.
///
/// Columns are converted in row order. Columns below a complex attribute are
/// collected into one complex value per nesting path, created where the first
/// of its columns appears. Aliases the type does not know are skipped.
pub struct DocumentConverter<'a> {
    schema: &'a Schema,
    service_root: &'a str,
}

impl<'a> DocumentConverter<'a> {
    pub fn new(schema: &'a Schema, service_root: &'a str) -> Self {
        Self {
            schema,
            service_root,
        }
    }

    pub fn service_root(&self) -> &str {
        self.service_root
    }

    /// Convert one row of `root` into a document carrying its identity.
    /// Any mapping error aborts the whole row.
    pub fn convert(&self, root: &StructuredType, row: &Row) -> Result<Document, MappingError> {
        // Nesting path -> index of the complex property in its parent's list
        let mut complex_buffer: HashMap<String, usize> = HashMap::new();
        let mut document = Document::new(root.fqn());

        for (alias, value) in row.columns() {
            self.convert_attribute(
                value,
                alias,
                "",
                root,
                &mut complex_buffer,
                &mut document.properties,
            )?;
        }

        document.id = Some(build_identity(self.service_root, root, row)?);
        log::debug!(
            "Converted row of {} into {} properties ({} complex values)",
            root.name(),
            document.properties.len(),
            complex_buffer.len()
        );
        Ok(document)
    }

    fn convert_attribute(
        &self,
        value: &Value,
        path: &str,
        prefix: &str,
        structured_type: &StructuredType,
        complex_buffer: &mut HashMap<String, usize>,
        properties: &mut Vec<Property>,
    ) -> Result<(), MappingError> {
        let chain = match self.schema.resolve(structured_type, path) {
            Ok(chain) => chain,
            Err(MappingError::AttributeNotFound { .. }) => {
                log::trace!("Skipping column '{}' unknown to {}", path, structured_type.name());
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        // Navigation targets are attached from expand results, never from columns
        if chain.leaf().is_association() {
            log::trace!("Skipping association column '{}' of {}", path, structured_type.name());
            return Ok(());
        }

        let attribute = chain.first();
        match &attribute.kind {
            AttributeKind::Primitive(_) => {
                properties.push(Property::primitive(path, value.clone()));
                Ok(())
            }
            AttributeKind::Complex(nested) => {
                let remainder = PathResolver::suffix(path, &attribute.external_name)
                    .ok_or_else(|| MappingError::NotPrimitive {
                        type_name: structured_type.name().to_string(),
                        path: path.to_string(),
                    })?;

                let buffer_key = join_path(prefix, &attribute.external_name);
                let index = match complex_buffer.get(&buffer_key) {
                    Some(index) => *index,
                    None => {
                        properties.push(Property::complex(
                            attribute.external_name.clone(),
                            nested.fqn(),
                        ));
                        let index = properties.len() - 1;
                        complex_buffer.insert(buffer_key.clone(), index);
                        index
                    }
                };

                let container = properties[index].as_complex_mut().ok_or_else(|| {
                    MappingError::AttributeNotFound {
                        type_name: structured_type.name().to_string(),
                        path: buffer_key.clone(),
                    }
                })?;

                self.convert_attribute(
                    value,
                    remainder,
                    &buffer_key,
                    nested,
                    complex_buffer,
                    &mut container.properties,
                )
            }
            AttributeKind::Association { .. } => Ok(()),
        }
    }
}
