use crate::model::{DataType, MappingError, Row, Schema, StructuredType};
use crate::store::MemoryStore;
use serde_json::json;
use std::sync::Arc;

pub const NAMESPACE: &str = "com.example.odata";

pub fn person_type() -> Result<Arc<StructuredType>, MappingError> {
    StructuredType::entity(NAMESPACE, "Person", "Persons")
        .with_primitive("ID", DataType::String)
        .with_primitive("FirstName", DataType::String)
        .with_primitive("LastName", DataType::String)
        .with_key(["ID"])
        .build()
}

pub fn postal_address_type() -> Result<Arc<StructuredType>, MappingError> {
    StructuredType::complex(NAMESPACE, "PostalAddressData")
        .with_primitive("StreetName", DataType::String)
        .with_primitive("HouseNumber", DataType::String)
        .with_primitive("PostalCode", DataType::String)
        .with_primitive("CityName", DataType::String)
        .with_primitive("Country", DataType::String)
        .with_primitive("Region", DataType::String)
        .build()
}

/// Who changed an entity and when; `User` navigates to the person behind `By`
pub fn change_information_type(
    person: &Arc<StructuredType>,
) -> Result<Arc<StructuredType>, MappingError> {
    StructuredType::complex(NAMESPACE, "ChangeInformation")
        .with_primitive("By", DataType::String)
        .with_primitive("At", DataType::Timestamp)
        .with_association("User", person, &[("By", "ID")], false)
        .build()
}

pub fn administrative_information_type(
    person: &Arc<StructuredType>,
) -> Result<Arc<StructuredType>, MappingError> {
    let change = change_information_type(person)?;
    StructuredType::complex(NAMESPACE, "AdministrativeInformation")
        .with_complex("Created", &change)
        .with_complex("Updated", &change)
        .build()
}

pub fn role_category_type() -> Result<Arc<StructuredType>, MappingError> {
    StructuredType::entity(NAMESPACE, "RoleCategory", "RoleCategories")
        .with_primitive("Category", DataType::String)
        .with_primitive("Language", DataType::String)
        .with_primitive("Name", DataType::String)
        .with_key(["Category", "Language"])
        .build()
}

pub fn business_partner_role_type() -> Result<Arc<StructuredType>, MappingError> {
    let category = role_category_type()?;
    StructuredType::entity(NAMESPACE, "BusinessPartnerRole", "BusinessPartnerRoles")
        .with_primitive("BusinessPartnerID", DataType::String)
        .with_primitive("RoleCategory", DataType::String)
        .with_association("Descriptions", &category, &[("RoleCategory", "Category")], true)
        .with_key(["BusinessPartnerID", "RoleCategory"])
        .build()
}

pub fn organization_type() -> Result<Arc<StructuredType>, MappingError> {
    let person = person_type()?;
    organization_type_with(&person, &business_partner_role_type()?)
}

fn organization_type_with(
    person: &Arc<StructuredType>,
    role: &Arc<StructuredType>,
) -> Result<Arc<StructuredType>, MappingError> {
    StructuredType::entity(NAMESPACE, "Organization", "Organizations")
        .with_primitive("ID", DataType::String)
        .with_primitive("Name1", DataType::String)
        .with_primitive("Name2", DataType::String)
        .with_complex("Address", &postal_address_type()?)
        .with_complex("AdministrativeInformation", &administrative_information_type(person)?)
        .with_association("Roles", role, &[("ID", "BusinessPartnerID")], true)
        .with_key(["ID"])
        .build()
}

/// Organizations with their roles, the people who maintain them and the
/// role texts, all sharing one set of type instances
pub fn demo_schema() -> Result<Schema, MappingError> {
    let person = person_type()?;
    let role = business_partner_role_type()?;
    let category = role
        .declared_association("Descriptions")
        .and_then(|a| a.target())
        .cloned()
        .ok_or_else(|| MappingError::AssociationNotFound {
            type_name: role.name().to_string(),
            name: "Descriptions".to_string(),
        })?;
    let organization = organization_type_with(&person, &role)?;

    Ok(Schema::new(vec![organization, role, category, person]))
}

fn organization_row(
    id: &str,
    name1: &str,
    city: &str,
    country: &str,
    created_by: &str,
    updated_by: &str,
) -> Row {
    Row::new()
        .with("ID", json!(id))
        .with("Name1", json!(name1))
        .with("Name2", json!(null))
        .with("Address/StreetName", json!("Main Street"))
        .with("Address/HouseNumber", json!("1"))
        .with("Address/PostalCode", json!("10115"))
        .with("Address/CityName", json!(city))
        .with("Address/Country", json!(country))
        .with("Address/Region", json!(null))
        .with("AdministrativeInformation/Created/By", json!(created_by))
        .with("AdministrativeInformation/Created/At", json!("2016-01-20T09:21:23Z"))
        .with("AdministrativeInformation/Updated/By", json!(updated_by))
        .with("AdministrativeInformation/Updated/At", json!("2021-04-11T17:02:45Z"))
}

pub fn demo_rows() -> Vec<(&'static str, Vec<Row>)> {
    vec![
        (
            "Organizations",
            vec![
                organization_row("1", "First Org.", "Berlin", "DEU", "99", "98"),
                organization_row("2", "Second Org.", "Walldorf", "DEU", "98", "98"),
                organization_row("35", "Example Org.", "Chicago", "USA", "99", "99"),
            ],
        ),
        (
            "Persons",
            vec![
                Row::new()
                    .with("ID", json!("99"))
                    .with("FirstName", json!("Max"))
                    .with("LastName", json!("Mustermann")),
                Row::new()
                    .with("ID", json!("98"))
                    .with("FirstName", json!("Erika"))
                    .with("LastName", json!("Musterfrau")),
            ],
        ),
        (
            "BusinessPartnerRoles",
            vec![
                Row::new().with("BusinessPartnerID", json!("1")).with("RoleCategory", json!("A")),
                Row::new().with("BusinessPartnerID", json!("1")).with("RoleCategory", json!("B")),
                Row::new().with("BusinessPartnerID", json!("2")).with("RoleCategory", json!("A")),
            ],
        ),
        (
            "RoleCategories",
            vec![
                Row::new()
                    .with("Category", json!("A"))
                    .with("Language", json!("en"))
                    .with("Name", json!("Customer")),
                Row::new()
                    .with("Category", json!("B"))
                    .with("Language", json!("en"))
                    .with("Name", json!("Supplier")),
                Row::new()
                    .with("Category", json!("A"))
                    .with("Language", json!("de"))
                    .with("Name", json!("Kunde")),
            ],
        ),
    ]
}

/// In-memory store over the demo schema. People are maintained elsewhere,
/// so `Persons` rejects writes.
pub fn demo_store() -> anyhow::Result<MemoryStore> {
    let store = MemoryStore::new(demo_schema()?).with_read_only("Persons");
    for (entity_set, rows) in demo_rows() {
        store.insert_rows(entity_set, rows)?;
    }
    log::info!("Loaded demo data into {} entity sets", store.entity_sets().len());
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::keys::key_attributes;

    #[test]
    fn test_demo_rows_cover_every_key() {
        let schema = demo_schema().unwrap();
        for (entity_set, rows) in demo_rows() {
            let entity_type = schema.entity_type_for_set(entity_set).unwrap();
            let keys = key_attributes(entity_type).unwrap();
            for row in &rows {
                assert!(keys.iter().all(|(alias, _)| row.get(alias).is_some()));
            }
        }
    }

    #[test]
    fn test_demo_schema_shares_role_type() {
        let schema = demo_schema().unwrap();
        let organization = schema.entity_type_for_set("Organizations").unwrap();
        let role = schema.entity_type_for_set("BusinessPartnerRoles").unwrap();
        let target = organization.declared_association("Roles").unwrap().target().unwrap();
        assert!(Arc::ptr_eq(target, role));
        assert_eq!(schema.entity_types().len(), 4);
    }
}
