use crate::logic::PathResolver;
use crate::model::{
    join_path, Attribute, AttributeKind, MappingError, Row, StructuredType, PATH_SEPARATOR,
};
use itertools::Itertools;
use serde_json::Value;

/// Plain-text form of a value inside a join token. Null is empty.
pub fn token_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Concatenate the row values of the given aliases into a join token.
///
/// The separator is not escaped: a value that itself contains `/` yields a
/// token that cannot be split back unambiguously.
pub fn build_key<'a, I>(row: &Row, aliases: I) -> Result<String, MappingError>
where
    I: IntoIterator<Item = &'a str>,
{
    let parts = aliases
        .into_iter()
        .map(|alias| {
            row.get(alias)
                .map(token_value)
                .ok_or_else(|| MappingError::MissingJoinColumn {
                    alias: alias.to_string(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(parts.iter().join(&PATH_SEPARATOR.to_string()))
}

/// Key attributes of an entity type in declared order as (alias, leaf).
/// An embedded key is resolved into its primitive members.
pub fn key_attributes(
    entity_type: &StructuredType,
) -> Result<Vec<(String, Attribute)>, MappingError> {
    let mut keys = Vec::new();
    for name in entity_type.key_names() {
        let attribute = entity_type
            .attribute(name)
            .ok_or_else(|| MappingError::InvalidKey {
                type_name: entity_type.name().to_string(),
                name: name.clone(),
            })?;

        match &attribute.kind {
            AttributeKind::Primitive(_) => keys.push((name.clone(), attribute.clone())),
            AttributeKind::Complex(embedded) => {
                for member in PathResolver::leaf_paths(embedded) {
                    let chain = PathResolver::resolve(embedded, &member)?;
                    keys.push((join_path(name, &member), chain.leaf().clone()));
                }
            }
            AttributeKind::Association { .. } => {
                return Err(MappingError::InvalidKey {
                    type_name: entity_type.name().to_string(),
                    name: name.clone(),
                })
            }
        }
    }
    Ok(keys)
}

fn key_literal(value: &Value, attribute: &Attribute) -> String {
    let quoted = attribute.data_type().map(|t| t.is_quoted()).unwrap_or(false);
    match value {
        Value::Null => "null".to_string(),
        Value::String(s) if quoted => format!("'{}'", s.replace('\'', "''")),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Identity URI of the entity a row describes, e.g.
/// `http://host/odata/Organizations('35')` or
/// `http://host/odata/BusinessPartnerRoles(BusinessPartnerID='1',RoleCategory='A')`
pub fn build_identity(
    service_root: &str,
    entity_type: &StructuredType,
    row: &Row,
) -> Result<String, MappingError> {
    let keys = key_attributes(entity_type)?;
    let entity_set = entity_type.entity_set().unwrap_or_else(|| entity_type.name());

    let literals = keys
        .iter()
        .map(|(alias, attribute)| {
            row.get(alias)
                .map(|value| (attribute, key_literal(value, attribute)))
                .ok_or_else(|| MappingError::MissingKey {
                    type_name: entity_type.name().to_string(),
                    alias: alias.clone(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let predicate = match literals.as_slice() {
        [] => return Ok(format!("{}/{}", service_root, entity_set)),
        [(_, literal)] => literal.clone(),
        composite => composite
            .iter()
            .map(|(attribute, literal)| format!("{}={}", attribute.external_name, literal))
            .join(","),
    };

    Ok(format!("{}/{}({})", service_root, entity_set, predicate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DataType;
    use crate::seed;
    use serde_json::json;

    #[test]
    fn test_build_key_splits_back_into_values() {
        let values = vec![json!("1"), json!(42), json!("A"), json!(true)];
        let row: Row = values
            .iter()
            .enumerate()
            .map(|(i, v)| (format!("C{}", i), v.clone()))
            .collect();

        let token = build_key(&row, ["C0", "C1", "C2", "C3"]).unwrap();
        assert_eq!(token, "1/42/A/true");

        let parts: Vec<&str> = token.split(PATH_SEPARATOR).collect();
        let expected: Vec<String> = values.iter().map(token_value).collect();
        assert_eq!(parts, expected);
    }

    #[test]
    fn test_build_key_respects_column_order_and_nulls() {
        let row = Row::new()
            .with("A", json!("x"))
            .with("B", json!(null))
            .with("C", json!("z"));

        assert_eq!(build_key(&row, ["C", "A"]).unwrap(), "z/x");
        // A null keeps its position
        assert_eq!(build_key(&row, ["A", "B", "C"]).unwrap(), "x//z");
        assert_eq!(build_key(&row, ["A", "B"]).unwrap(), "x/");
        assert_ne!(build_key(&row, ["A", "B"]).unwrap(), build_key(&row, ["A"]).unwrap());
    }

    #[test]
    fn test_build_key_missing_column() {
        let row = Row::new().with("A", json!("x"));
        assert_eq!(
            build_key(&row, ["A", "Missing"]),
            Err(MappingError::MissingJoinColumn {
                alias: "Missing".to_string()
            })
        );
    }

    #[test]
    fn test_single_key_identity() {
        let organization = seed::organization_type().unwrap();
        let row = Row::new().with("ID", json!("35")).with("Name2", json!(null));

        let id = build_identity("http://localhost/odata", &organization, &row).unwrap();
        assert_eq!(id, "http://localhost/odata/Organizations('35')");
    }

    #[test]
    fn test_composite_key_identity() {
        let role = seed::business_partner_role_type().unwrap();
        let row = Row::new()
            .with("RoleCategory", json!("A"))
            .with("BusinessPartnerID", json!("O'1"));

        let id = build_identity("root", &role, &row).unwrap();
        assert_eq!(id, "root/BusinessPartnerRoles(BusinessPartnerID='O''1',RoleCategory='A')");
    }

    #[test]
    fn test_embedded_key_identity() {
        let embedded = StructuredType::complex("test", "DivisionKey")
            .with_primitive("CodePublisher", DataType::String)
            .with_primitive("Level", DataType::Number)
            .build()
            .unwrap();
        let division = StructuredType::entity("test", "Division", "Divisions")
            .with_complex("Key", &embedded)
            .with_primitive("Name", DataType::String)
            .with_key(["Key"])
            .build()
            .unwrap();

        let keys = key_attributes(&division).unwrap();
        let aliases: Vec<&str> = keys.iter().map(|(alias, _)| alias.as_str()).collect();
        assert_eq!(aliases, vec!["Key/CodePublisher", "Key/Level"]);

        let row = Row::new()
            .with("Key/CodePublisher", json!("ISO"))
            .with("Key/Level", json!(2))
            .with("Name", json!("Brussels"));
        let id = build_identity("root", &division, &row).unwrap();
        assert_eq!(id, "root/Divisions(CodePublisher='ISO',Level=2)");
    }

    #[test]
    fn test_missing_key_column() {
        let organization = seed::organization_type().unwrap();
        let row = Row::new().with("Name1", json!("First"));

        assert!(matches!(
            build_identity("root", &organization, &row),
            Err(MappingError::MissingKey { .. })
        ));
    }
}
