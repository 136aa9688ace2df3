use serde::{Deserialize, Serialize};

/// Separator between segments of an attribute path and between the values
/// of a concatenated join token.
pub const PATH_SEPARATOR: char = '/';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum DataType {
    String,
    Number,
    Boolean,
    Date,
    Timestamp,
}

impl DataType {
    /// Whether a JSON value can be stored in an attribute of this type.
    /// Null is accepted by every type.
    pub fn accepts(&self, value: &serde_json::Value) -> bool {
        use serde_json::Value;

        match (self, value) {
            (_, Value::Null) => true,
            (DataType::String, Value::String(_)) => true,
            (DataType::Number, Value::Number(_)) => true,
            (DataType::Boolean, Value::Bool(_)) => true,
            // Dates travel as ISO strings
            (DataType::Date | DataType::Timestamp, Value::String(_)) => true,
            _ => false,
        }
    }

    /// Whether key literals of this type are written with quotes
    pub fn is_quoted(&self) -> bool {
        matches!(self, DataType::String | DataType::Date | DataType::Timestamp)
    }
}

/// Derive the internal (write-side) name of an attribute from its external
/// name: the first character is lower-cased, the rest is kept.
///
/// `AdministrativeInformation` becomes `administrativeInformation`,
/// `ID` becomes `iD`.
pub fn internal_name(external_name: &str) -> String {
    let mut chars = external_name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Join two path fragments, treating an empty prefix as the root.
pub fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}{}{}", prefix, PATH_SEPARATOR, name)
    }
}
