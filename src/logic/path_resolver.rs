use crate::model::{
    join_path, AssociationPath, Attribute, AttributeChain, AttributeKind, JoinColumn, MappingError,
    StructuredType, PATH_SEPARATOR,
};

/// Resolves `/`-separated attribute paths against structured type metadata
pub struct PathResolver;

impl PathResolver {
    /// Resolve a path such as "AdministrativeInformation/Created/By" into the
    /// chain of attributes it crosses. Every segment but the last must name a
    /// complex attribute.
    pub fn resolve(root: &StructuredType, path: &str) -> Result<AttributeChain, MappingError> {
        let not_found = || MappingError::AttributeNotFound {
            type_name: root.name().to_string(),
            path: path.to_string(),
        };

        let mut current = root;
        let mut chain: Vec<Attribute> = Vec::new();

        for segment in path.split(PATH_SEPARATOR) {
            // Only complex attributes can be descended into
            if chain.last().is_some_and(|previous| !previous.is_complex()) {
                return Err(not_found());
            }

            let attribute = current.attribute(segment).ok_or_else(not_found)?;
            if let AttributeKind::Complex(nested) = &attribute.kind {
                current = nested.as_ref();
            }
            chain.push(attribute.clone());
        }

        Ok(AttributeChain::new(chain))
    }

    /// Remainder of `path` below the attribute `prefix`, e.g.
    /// `suffix("Address/Country", "Address") == Some("Country")`
    pub fn suffix<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
        path.strip_prefix(prefix)?
            .strip_prefix(PATH_SEPARATOR)
            .filter(|rest| !rest.is_empty())
    }

    /// All primitive attribute paths of a type, descending into complex attributes
    pub fn leaf_paths(structured_type: &StructuredType) -> Vec<String> {
        let mut paths = Vec::new();
        Self::collect_leaf_paths(structured_type, "", &mut paths);
        paths
    }

    fn collect_leaf_paths(structured_type: &StructuredType, prefix: &str, paths: &mut Vec<String>) {
        for attribute in structured_type.attributes() {
            let path = join_path(prefix, &attribute.external_name);
            match &attribute.kind {
                AttributeKind::Primitive(_) => paths.push(path),
                AttributeKind::Complex(nested) => Self::collect_leaf_paths(nested, &path, paths),
                AttributeKind::Association { .. } => {}
            }
        }
    }

    /// Every association reachable from the root, including those declared on
    /// nested complex types
    pub fn association_paths(root: &StructuredType) -> Vec<AssociationPath> {
        let mut associations = Vec::new();
        Self::collect_associations(root, root, "", &mut associations);
        associations
    }

    fn collect_associations(
        root: &StructuredType,
        current: &StructuredType,
        prefix: &str,
        associations: &mut Vec<AssociationPath>,
    ) {
        for attribute in current.attributes() {
            match &attribute.kind {
                AttributeKind::Complex(nested) => {
                    let path = join_path(prefix, &attribute.external_name);
                    Self::collect_associations(root, nested, &path, associations);
                }
                AttributeKind::Association { .. } => {
                    if let Some(association) = Self::build_association(root, prefix, attribute) {
                        associations.push(association);
                    }
                }
                AttributeKind::Primitive(_) => {}
            }
        }
    }

    /// Build the association path for an alias such as "Roles" or
    /// "AdministrativeInformation/Created/User"
    pub fn association_path(
        root: &StructuredType,
        alias: &str,
    ) -> Result<AssociationPath, MappingError> {
        let (prefix, name) = alias.rsplit_once(PATH_SEPARATOR).unwrap_or(("", alias));

        let owner_chain;
        let owner: &StructuredType = if prefix.is_empty() {
            root
        } else {
            owner_chain = Self::resolve(root, prefix)?;
            owner_chain
                .leaf()
                .structured_type()
                .map(|nested| nested.as_ref())
                .ok_or_else(|| MappingError::AttributeNotFound {
                    type_name: root.name().to_string(),
                    path: prefix.to_string(),
                })?
        };

        owner
            .declared_association(name)
            .and_then(|attribute| Self::build_association(root, prefix, attribute))
            .ok_or_else(|| MappingError::AssociationNotFound {
                type_name: owner.name().to_string(),
                name: name.to_string(),
            })
    }

    fn build_association(
        root: &StructuredType,
        prefix: &str,
        attribute: &Attribute,
    ) -> Option<AssociationPath> {
        let AttributeKind::Association {
            target,
            join_columns,
            collection,
        } = &attribute.kind
        else {
            return None;
        };

        // Parent-side columns become absolute from the root
        let join_columns = join_columns
            .iter()
            .map(|c| JoinColumn::new(join_path(prefix, &c.source), c.target.clone()))
            .collect();

        Some(AssociationPath::new(
            root.fqn(),
            prefix.to_string(),
            attribute.external_name.clone(),
            target.clone(),
            join_columns,
            *collection,
        ))
    }
}
