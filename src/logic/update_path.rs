use crate::model::{
    internal_name, Attribute, AttributeKind, Headers, KeyPredicate, ModifyRequest, RequestError,
    RequestPathSegment, StructuredType, WriteContainer, WriteInstruction, WriteLeaf,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Projects an addressed property path onto a nested write instruction.
///
/// `Organizations('4')/AdministrativeInformation/Updated/By` becomes
/// `{ administrativeInformation: { updated: { by: <leaf> } } }`.
pub struct UpdatePathProjector;

impl UpdatePathProjector {
    pub fn project_request(
        request: &ModifyRequest,
        leaf: WriteLeaf,
    ) -> Result<WriteInstruction, RequestError> {
        Self::project(
            &request.entity_type,
            &request.segments,
            &request.key_predicates,
            &request.headers,
            leaf,
        )
    }

    pub fn project(
        root: &Arc<StructuredType>,
        segments: &[RequestPathSegment],
        key_predicates: &[KeyPredicate],
        headers: &Headers,
        leaf: WriteLeaf,
    ) -> Result<WriteInstruction, RequestError> {
        // A trailing $value addresses the raw value of the preceding primitive
        let (segments, raw_value) = match segments.split_last() {
            Some((RequestPathSegment::RawValue, rest)) => (rest, true),
            _ => (segments, false),
        };
        let Some((terminal, path)) = segments.split_last() else {
            return Err(if raw_value {
                RequestError::MisplacedRawValue
            } else {
                RequestError::EmptyPath
            });
        };

        let mut attributes = WriteContainer::default();
        let mut container = &mut attributes;
        let mut current: &StructuredType = root;

        for segment in path {
            let name = match segment {
                RequestPathSegment::Complex(name) => name,
                RequestPathSegment::Primitive(name) => {
                    return Err(RequestError::PrimitiveNotTerminal { name: name.clone() })
                }
                RequestPathSegment::RawValue => return Err(RequestError::MisplacedRawValue),
            };

            let attribute = Self::lookup(current, name)?;
            match &attribute.kind {
                AttributeKind::Complex(nested) => {
                    container = container.nested_mut(&attribute.internal_name);
                    current = nested.as_ref();
                }
                AttributeKind::Primitive(_) => {
                    return Err(RequestError::PrimitiveNotTerminal { name: name.clone() })
                }
                AttributeKind::Association { .. } => {
                    return Err(RequestError::NavigationNotSupported { name: name.clone() })
                }
            }
        }

        let (name, addressed_as) = match terminal {
            RequestPathSegment::Complex(name) => (name, "complex"),
            RequestPathSegment::Primitive(name) => (name, "primitive"),
            RequestPathSegment::RawValue => return Err(RequestError::MisplacedRawValue),
        };
        let attribute = Self::lookup(current, name)?;
        if !attribute.is_association() && attribute.kind.describe() != addressed_as {
            return Err(RequestError::KindMismatch {
                name: name.clone(),
                expected: addressed_as,
                actual: attribute.kind.describe(),
            });
        }

        match &attribute.kind {
            AttributeKind::Primitive(data_type) => {
                if let WriteLeaf::Set(value) = &leaf {
                    if !data_type.accepts(value) {
                        return Err(RequestError::TypeMismatch {
                            name: name.clone(),
                            value: value.to_string(),
                        });
                    }
                }
                container.values.insert(attribute.internal_name.clone(), leaf);
            }
            AttributeKind::Complex(_) => {
                if raw_value {
                    return Err(RequestError::MisplacedRawValue);
                }
                // Only the whole complex value can be cleared through its path
                if leaf != WriteLeaf::Clear {
                    return Err(RequestError::ComplexValueNotSupported { name: name.clone() });
                }
                container.values.insert(attribute.internal_name.clone(), WriteLeaf::Clear);
            }
            AttributeKind::Association { .. } => {
                return Err(RequestError::NavigationNotSupported { name: name.clone() })
            }
        }

        let keys: BTreeMap<String, serde_json::Value> = key_predicates
            .iter()
            .map(|predicate| {
                let name = root
                    .attribute(&predicate.name)
                    .map(|a| a.internal_name.clone())
                    .unwrap_or_else(|| internal_name(&predicate.name));
                (name, predicate.value.clone())
            })
            .collect();

        log::debug!(
            "Projected {} segments on {} into {} top-level write entries",
            segments.len(),
            root.name(),
            attributes.len()
        );

        Ok(WriteInstruction {
            entity_type: root.clone(),
            keys,
            attributes,
            headers: headers.clone(),
        })
    }

    fn lookup<'t>(
        structured_type: &'t StructuredType,
        name: &str,
    ) -> Result<&'t Attribute, RequestError> {
        structured_type
            .attribute(name)
            .ok_or_else(|| RequestError::UnknownProperty {
                type_name: structured_type.name().to_string(),
                name: name.to_string(),
            })
    }
}
