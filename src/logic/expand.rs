use crate::logic::keys::build_key;
use crate::logic::DocumentConverter;
use crate::model::{
    join_path, AssociationPath, Document, ExpandResult, Inline, MappingError, NavigationEdge,
    Property, PropertyValue, Row, Schema, StructuredType,
};
use std::collections::BTreeMap;

pub type ExpandChildren = BTreeMap<AssociationPath, ExpandResult>;

/// Converts query results and attaches expanded associations.
///
/// Associations hang off the root document or off any complex value: an
/// expand result is attached at the node whose nesting path equals the
/// association's owner prefix, and that node's type must declare it.
pub struct Expander<'a> {
    converter: DocumentConverter<'a>,
}

impl<'a> Expander<'a> {
    pub fn new(schema: &'a Schema, service_root: &'a str) -> Self {
        Self {
            converter: DocumentConverter::new(schema, service_root),
        }
    }

    /// Convert every root row of a query result
    pub fn convert_result(
        &self,
        entity_type: &StructuredType,
        result: &ExpandResult,
    ) -> Result<Vec<Document>, MappingError> {
        result
            .root_rows()
            .iter()
            .map(|row| self.convert_row(entity_type, row, result.children()))
            .collect()
    }

    pub fn convert_row(
        &self,
        entity_type: &StructuredType,
        row: &Row,
        children: &ExpandChildren,
    ) -> Result<Document, MappingError> {
        let mut document = self.converter.convert(entity_type, row)?;
        self.attach(&mut document, row, entity_type, children)?;
        Ok(document)
    }

    /// Attach the expand results to the document built from `row`
    pub fn attach(
        &self,
        document: &mut Document,
        row: &Row,
        root_type: &StructuredType,
        children: &ExpandChildren,
    ) -> Result<(), MappingError> {
        if children.is_empty() {
            return Ok(());
        }

        let parent_id = document.id.clone();
        let links = self.create_expand(row, parent_id.as_deref(), "", root_type, children)?;
        document.navigation_links.extend(links);

        self.attach_to_complex_values(
            &mut document.properties,
            row,
            parent_id.as_deref(),
            "",
            root_type,
            children,
        )
    }

    fn attach_to_complex_values(
        &self,
        properties: &mut [Property],
        row: &Row,
        parent_id: Option<&str>,
        prefix: &str,
        context: &StructuredType,
        children: &ExpandChildren,
    ) -> Result<(), MappingError> {
        for property in properties.iter_mut() {
            let PropertyValue::Complex(complex) = &mut property.value else {
                continue;
            };

            let nested = context
                .attribute(&property.name)
                .and_then(|a| a.structured_type())
                .ok_or_else(|| MappingError::AttributeNotFound {
                    type_name: context.name().to_string(),
                    path: property.name.clone(),
                })?;
            let path = join_path(prefix, &property.name);

            let links = self.create_expand(row, parent_id, &path, nested, children)?;
            complex.navigation_links.extend(links);

            self.attach_to_complex_values(
                &mut complex.properties,
                row,
                parent_id,
                &path,
                nested,
                children,
            )?;
        }
        Ok(())
    }

    /// Navigation edges owned by the node at `path_key` whose type is `context`
    fn create_expand(
        &self,
        row: &Row,
        parent_id: Option<&str>,
        path_key: &str,
        context: &StructuredType,
        children: &ExpandChildren,
    ) -> Result<Vec<NavigationEdge>, MappingError> {
        let mut links = Vec::new();
        for (association, result) in children {
            if association.owner_prefix() != path_key {
                continue;
            }
            if context.declared_association(association.leaf_name()).is_none() {
                return Err(MappingError::AssociationNotFound {
                    type_name: context.name().to_string(),
                    name: association.leaf_name().to_string(),
                });
            }
            links.push(self.expand_association(row, parent_id, association, result)?);
        }
        Ok(links)
    }

    fn expand_association(
        &self,
        row: &Row,
        parent_id: Option<&str>,
        association: &AssociationPath,
        result: &ExpandResult,
    ) -> Result<NavigationEdge, MappingError> {
        let join_token = build_key(row, association.source_aliases())?;
        let target = association.target();

        let documents = result
            .rows(&join_token)
            .iter()
            .map(|child| self.convert_row(target, child, result.children()))
            .collect::<Result<Vec<_>, _>>()?;

        log::debug!(
            "Expanded {} with {} {} rows for join key '{}'",
            association.alias(),
            documents.len(),
            target.name(),
            join_token
        );

        let inline = if association.is_collection() {
            Some(Inline::Collection(documents))
        } else {
            documents.into_iter().next().map(|d| Inline::Entity(Box::new(d)))
        };

        Ok(NavigationEdge {
            name: association.leaf_name().to_string(),
            href: parent_id.map(|id| format!("{}/{}", id, association.alias())),
            inline,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::PathResolver;
    use crate::model::DataType;
    use crate::seed;
    use serde_json::json;

    const ROOT: &str = "root";

    fn person_rows() -> Vec<Row> {
        vec![
            Row::new()
                .with("ID", json!("99"))
                .with("FirstName", json!("Max"))
                .with("LastName", json!("Mustermann")),
            Row::new()
                .with("ID", json!("98"))
                .with("FirstName", json!("Erika"))
                .with("LastName", json!("Musterfrau")),
        ]
    }

    #[test]
    fn test_root_collection_association() {
        let schema = seed::demo_schema().unwrap();
        let organization = schema.entity_type_for_set("Organizations").unwrap();
        let roles = PathResolver::association_path(organization, "Roles").unwrap();

        let role_rows = vec![
            Row::new().with("BusinessPartnerID", json!("1")).with("RoleCategory", json!("A")),
            Row::new().with("BusinessPartnerID", json!("1")).with("RoleCategory", json!("C")),
            Row::new().with("BusinessPartnerID", json!("2")).with("RoleCategory", json!("A")),
        ];
        let result = ExpandResult::root(vec![
            Row::new().with("ID", json!("1")),
            Row::new().with("ID", json!("3")),
        ])
        .with_child(roles.clone(), ExpandResult::from_rows(&roles, role_rows).unwrap());

        let expander = Expander::new(&schema, ROOT);
        let documents = expander.convert_result(organization, &result).unwrap();
        assert_eq!(documents.len(), 2);

        let link = documents[0].navigation_link("Roles").unwrap();
        assert_eq!(link.href.as_deref(), Some("root/Organizations('1')/Roles"));
        match &link.inline {
            Some(Inline::Collection(children)) => {
                assert_eq!(children.len(), 2);
                assert_eq!(
                    children[1].id.as_deref(),
                    Some("root/BusinessPartnerRoles(BusinessPartnerID='1',RoleCategory='C')")
                );
            }
            other => panic!("expected collection, got {:?}", other),
        }

        // No children for the second organization, but the edge is still there
        match &documents[1].navigation_link("Roles").unwrap().inline {
            Some(Inline::Collection(children)) => assert!(children.is_empty()),
            other => panic!("expected empty collection, got {:?}", other),
        }
    }

    #[test]
    fn test_association_on_nested_complex_type_lands_on_container() {
        let schema = seed::demo_schema().unwrap();
        let organization = schema.entity_type_for_set("Organizations").unwrap();
        let created_user =
            PathResolver::association_path(organization, "AdministrativeInformation/Created/User")
                .unwrap();

        let result = ExpandResult::root(vec![Row::new()
            .with("ID", json!("4"))
            .with("AdministrativeInformation/Created/By", json!("99"))
            .with("AdministrativeInformation/Updated/By", json!("98"))])
        .with_child(
            created_user.clone(),
            ExpandResult::from_rows(&created_user, person_rows()).unwrap(),
        );

        let expander = Expander::new(&schema, ROOT);
        let documents = expander.convert_result(organization, &result).unwrap();
        let document = &documents[0];

        assert!(document.navigation_links.is_empty());

        let admin = document.property("AdministrativeInformation").unwrap().as_complex().unwrap();
        assert!(admin.navigation_links.is_empty());

        let created = admin.property("Created").unwrap().as_complex().unwrap();
        let user = created.navigation_link("User").unwrap();
        assert_eq!(
            user.href.as_deref(),
            Some("root/Organizations('4')/AdministrativeInformation/Created/User")
        );
        match &user.inline {
            Some(Inline::Entity(person)) => {
                assert_eq!(person.id.as_deref(), Some("root/Persons('99')"));
                assert_eq!(
                    person.property("FirstName").unwrap().as_primitive(),
                    Some(&json!("Max"))
                );
            }
            other => panic!("expected single entity, got {:?}", other),
        }

        // Same complex type, different owner path: nothing attached
        let updated = admin.property("Updated").unwrap().as_complex().unwrap();
        assert!(updated.navigation_links.is_empty());
    }

    #[test]
    fn test_single_association_without_match() {
        let schema = seed::demo_schema().unwrap();
        let organization = schema.entity_type_for_set("Organizations").unwrap();
        let created_user =
            PathResolver::association_path(organization, "AdministrativeInformation/Created/User")
                .unwrap();

        let result = ExpandResult::root(vec![Row::new()
            .with("ID", json!("4"))
            .with("AdministrativeInformation/Created/By", json!("12"))])
        .with_child(
            created_user.clone(),
            ExpandResult::from_rows(&created_user, person_rows()).unwrap(),
        );

        let expander = Expander::new(&schema, ROOT);
        let documents = expander.convert_result(organization, &result).unwrap();
        let created = documents[0]
            .property("AdministrativeInformation")
            .and_then(|p| p.as_complex())
            .and_then(|c| c.property("Created"))
            .and_then(|p| p.as_complex())
            .unwrap();
        assert_eq!(created.navigation_link("User").unwrap().inline, None);
    }

    #[test]
    fn test_grandchildren_are_attached_recursively() {
        let schema = seed::demo_schema().unwrap();
        let organization = schema.entity_type_for_set("Organizations").unwrap();
        let role = schema.entity_type("BusinessPartnerRole").unwrap();
        let roles = PathResolver::association_path(organization, "Roles").unwrap();
        let descriptions = PathResolver::association_path(role, "Descriptions").unwrap();

        let role_result = ExpandResult::from_rows(
            &roles,
            vec![Row::new().with("BusinessPartnerID", json!("1")).with("RoleCategory", json!("A"))],
        )
        .unwrap()
        .with_child(
            descriptions.clone(),
            ExpandResult::from_rows(
                &descriptions,
                vec![
                    Row::new()
                        .with("Category", json!("A"))
                        .with("Language", json!("en"))
                        .with("Name", json!("Customer")),
                    Row::new()
                        .with("Category", json!("B"))
                        .with("Language", json!("en"))
                        .with("Name", json!("Supplier")),
                ],
            )
            .unwrap(),
        );

        let result = ExpandResult::root(vec![Row::new().with("ID", json!("1"))])
            .with_child(roles, role_result);

        let expander = Expander::new(&schema, ROOT);
        let documents = expander.convert_result(organization, &result).unwrap();

        let roles_link = documents[0].navigation_link("Roles").unwrap();
        let Some(Inline::Collection(role_documents)) = &roles_link.inline else {
            panic!("expected role collection");
        };
        let descriptions_link = role_documents[0].navigation_link("Descriptions").unwrap();
        let Some(Inline::Collection(texts)) = &descriptions_link.inline else {
            panic!("expected description collection");
        };
        assert_eq!(texts.len(), 1);
        assert_eq!(texts[0].property("Name").unwrap().as_primitive(), Some(&json!("Customer")));
        assert_eq!(texts[0].id.as_deref(), Some("root/RoleCategories(Category='A',Language='en')"));
    }

    #[test]
    fn test_undeclared_association_is_mapping_error() {
        let schema = seed::demo_schema().unwrap();
        let organization = schema.entity_type_for_set("Organizations").unwrap();
        let person = schema.entity_type("Person").unwrap();

        // Inconsistent metadata: an association path claiming to be owned by
        // the root while the root declares no such attribute
        let foreign_type =
            StructuredType::entity("com.example.odata", "Organization", "Organizations")
                .with_primitive("ID", DataType::String)
                .with_association("Manager", person, &[("ID", "ID")], false)
                .with_key(["ID"])
                .build()
                .unwrap();
        let manager = PathResolver::association_path(&foreign_type, "Manager").unwrap();

        let result = ExpandResult::root(vec![Row::new().with("ID", json!("1"))])
            .with_child(manager.clone(), ExpandResult::from_rows(&manager, person_rows()).unwrap());

        let expander = Expander::new(&schema, ROOT);
        assert!(matches!(
            expander.convert_result(organization, &result),
            Err(MappingError::AssociationNotFound { .. })
        ));
    }
}
