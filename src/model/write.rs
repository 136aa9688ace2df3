use crate::model::{RequestError, StructuredType};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

pub type Headers = HashMap<String, Vec<String>>;

/// One hop of an addressed property path, e.g. `Address`, `Country`, `$value`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestPathSegment {
    Complex(String),
    Primitive(String),
    /// Raw value of the previously addressed primitive (`$value`)
    RawValue,
}

impl RequestPathSegment {
    pub fn complex(name: impl Into<String>) -> Self {
        RequestPathSegment::Complex(name.into())
    }

    pub fn primitive(name: impl Into<String>) -> Self {
        RequestPathSegment::Primitive(name.into())
    }
}

/// Key predicate of the addressed entity, e.g. `ID='35'`
#[derive(Debug, Clone, PartialEq)]
pub struct KeyPredicate {
    pub name: String,
    pub value: Value,
}

impl KeyPredicate {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    /// Parse a key literal as written in a resource path: `'35'` is the
    /// string `35` (with `''` standing for a single quote), `42` a number,
    /// `true`/`false` booleans and `null` the null value.
    pub fn parse(name: impl Into<String>, literal: &str) -> Result<Self, RequestError> {
        let literal = literal.trim();
        let value = if literal.len() >= 2 && literal.starts_with('\'') && literal.ends_with('\'') {
            Value::String(literal[1..literal.len() - 1].replace("''", "'"))
        } else {
            match serde_json::from_str::<Value>(literal) {
                Ok(value @ (Value::Number(_) | Value::Bool(_) | Value::Null)) => value,
                _ => {
                    return Err(RequestError::InvalidKeyPredicate {
                        text: literal.to_string(),
                    })
                }
            }
        };
        Ok(Self::new(name, value))
    }
}

/// Terminal write semantics of an addressed attribute
#[derive(Debug, Clone, PartialEq)]
pub enum WriteLeaf {
    /// Reset the attribute to absent / null
    Clear,
    Set(Value),
}

/// Nested write buffer mirroring the complex attribute structure, keyed by
/// internal attribute names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteContainer {
    pub values: BTreeMap<String, WriteLeaf>,
    pub nested: BTreeMap<String, WriteContainer>,
}

impl WriteContainer {
    /// Nested container for a complex attribute, created on first use
    pub fn nested_mut(&mut self, name: &str) -> &mut WriteContainer {
        self.nested.entry(name.to_string()).or_default()
    }

    pub fn nested(&self, name: &str) -> Option<&WriteContainer> {
        self.nested.get(name)
    }

    pub fn value(&self, name: &str) -> Option<&WriteLeaf> {
        self.values.get(name)
    }

    /// Number of direct entries (leaves and nested containers)
    pub fn len(&self) -> usize {
        self.values.len() + self.nested.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.nested.is_empty()
    }

    /// Names of all direct entries in sorted order
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self
            .values
            .keys()
            .chain(self.nested.keys())
            .map(String::as_str)
            .collect();
        keys.sort_unstable();
        keys
    }
}

/// Everything a write handler needs to apply a partial update
#[derive(Debug, Clone)]
pub struct WriteInstruction {
    pub entity_type: Arc<StructuredType>,
    /// Key values by internal attribute name
    pub keys: BTreeMap<String, Value>,
    pub attributes: WriteContainer,
    /// Inbound request headers, unmodified
    pub headers: Headers,
}

/// Inbound partial-update request against one entity
#[derive(Debug, Clone)]
pub struct ModifyRequest {
    pub entity_type: Arc<StructuredType>,
    pub key_predicates: Vec<KeyPredicate>,
    pub segments: Vec<RequestPathSegment>,
    pub headers: Headers,
}
