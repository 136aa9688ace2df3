use crate::model::{AssociationPath, MappingError};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Key under which the rows of the top-level query are stored in an `ExpandResult`
pub const ROOT_RESULT_KEY: &str = "root";

/// One flat query result record: ordered (alias, value) pairs where each alias
/// is an attribute path of the queried type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style append, mostly used by tests and seed data
    pub fn with(mut self, alias: impl Into<String>, value: Value) -> Self {
        self.columns.push((alias.into(), value));
        self
    }

    pub fn get(&self, alias: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(name, _)| name == alias)
            .map(|(_, value)| value)
    }

    /// Replace the value of an existing column or append a new one
    pub fn set(&mut self, alias: &str, value: Value) {
        match self.columns.iter_mut().find(|(name, _)| name == alias) {
            Some((_, existing)) => *existing = value,
            None => self.columns.push((alias.to_string(), value)),
        }
    }

    pub fn columns(&self) -> &[(String, Value)] {
        &self.columns
    }

    pub fn columns_mut(&mut self) -> impl Iterator<Item = (&str, &mut Value)> {
        self.columns
            .iter_mut()
            .map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (S, Value)>>(iter: I) -> Self {
        Self {
            columns: iter
                .into_iter()
                .map(|(alias, value)| (alias.into(), value))
                .collect(),
        }
    }
}

/// Pre-computed result rows for one query level.
///
/// Rows are grouped by the join token of the child-side join columns so that
/// a parent row can pick its children by computing the same token from its
/// own parent-side columns. Grandchild associations are nested recursively.
#[derive(Debug, Clone, Default)]
pub struct ExpandResult {
    rows: HashMap<String, Vec<Row>>,
    children: BTreeMap<AssociationPath, ExpandResult>,
}

impl ExpandResult {
    /// Result of the top-level query
    pub fn root(rows: Vec<Row>) -> Self {
        let mut grouped = HashMap::new();
        grouped.insert(ROOT_RESULT_KEY.to_string(), rows);
        Self {
            rows: grouped,
            children: BTreeMap::new(),
        }
    }

    /// Group the rows of an association target by their child-side join token
    pub fn from_rows(association: &AssociationPath, rows: Vec<Row>) -> Result<Self, MappingError> {
        let mut grouped: HashMap<String, Vec<Row>> = HashMap::new();
        for row in rows {
            let token = crate::logic::keys::build_key(&row, association.target_aliases())?;
            grouped.entry(token).or_default().push(row);
        }
        Ok(Self {
            rows: grouped,
            children: BTreeMap::new(),
        })
    }

    pub fn with_child(mut self, association: AssociationPath, result: ExpandResult) -> Self {
        self.children.insert(association, result);
        self
    }

    pub fn insert_child(&mut self, association: AssociationPath, result: ExpandResult) {
        self.children.insert(association, result);
    }

    /// Rows stored under a join token; empty when nothing matched
    pub fn rows(&self, key: &str) -> &[Row] {
        self.rows.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn root_rows(&self) -> &[Row] {
        self.rows(ROOT_RESULT_KEY)
    }

    pub fn children(&self) -> &BTreeMap<AssociationPath, ExpandResult> {
        &self.children
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_row_set_replaces_or_appends() {
        let mut row = Row::new().with("ID", json!("3")).with("Name1", json!("Third"));
        row.set("Name1", json!(null));
        row.set("Name2", json!("x"));

        assert_eq!(row.get("Name1"), Some(&json!(null)));
        assert_eq!(row.get("Name2"), Some(&json!("x")));
        assert_eq!(row.len(), 3);
        assert_eq!(row.columns()[0].0, "ID");
    }

    #[test]
    fn test_root_result_keeps_rows() {
        let rows: Vec<Row> = vec![[("ID", json!("1"))].into_iter().collect()];
        let result = ExpandResult::root(rows);

        assert_eq!(result.root_rows().len(), 1);
        assert!(result.rows("unknown").is_empty());
        assert!(result.children().is_empty());
    }
}
