use serde_json::{Map, Value};

/// Materialized entity built from one flat row
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Fully qualified name of the entity type
    pub type_name: String,
    /// Identity URI, e.g. "http://localhost:3001/odata/Organizations('35')"
    pub id: Option<String>,
    pub properties: Vec<Property>,
    pub navigation_links: Vec<NavigationEdge>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    /// Fully qualified type name for complex properties, `None` for primitives
    pub type_name: Option<String>,
    pub name: String,
    pub value: PropertyValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Primitive(Value),
    Complex(ComplexValue),
}

/// Untyped container for the members of a complex attribute
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComplexValue {
    pub properties: Vec<Property>,
    pub navigation_links: Vec<NavigationEdge>,
}

/// Association result attached to a document or complex value
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationEdge {
    /// External name of the association attribute
    pub name: String,
    /// Navigation URI relative to the owning entity's identity
    pub href: Option<String>,
    pub inline: Option<Inline>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Inline {
    Entity(Box<Document>),
    Collection(Vec<Document>),
}

impl Property {
    pub fn primitive(name: impl Into<String>, value: Value) -> Self {
        Self {
            type_name: None,
            name: name.into(),
            value: PropertyValue::Primitive(value),
        }
    }

    pub fn complex(name: impl Into<String>, type_name: String) -> Self {
        Self {
            type_name: Some(type_name),
            name: name.into(),
            value: PropertyValue::Complex(ComplexValue::default()),
        }
    }

    pub fn as_primitive(&self) -> Option<&Value> {
        match &self.value {
            PropertyValue::Primitive(value) => Some(value),
            PropertyValue::Complex(_) => None,
        }
    }

    pub fn as_complex(&self) -> Option<&ComplexValue> {
        match &self.value {
            PropertyValue::Complex(complex) => Some(complex),
            PropertyValue::Primitive(_) => None,
        }
    }

    pub fn as_complex_mut(&mut self) -> Option<&mut ComplexValue> {
        match &mut self.value {
            PropertyValue::Complex(complex) => Some(complex),
            PropertyValue::Primitive(_) => None,
        }
    }
}

impl ComplexValue {
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn navigation_link(&self, name: &str) -> Option<&NavigationEdge> {
        self.navigation_links.iter().find(|l| l.name == name)
    }
}

impl Document {
    pub fn new(type_name: String) -> Self {
        Self {
            type_name,
            id: None,
            properties: Vec::new(),
            navigation_links: Vec::new(),
        }
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn navigation_link(&self, name: &str) -> Option<&NavigationEdge> {
        self.navigation_links.iter().find(|l| l.name == name)
    }

    /// Render the document as a JSON object. Inline expansions are embedded,
    /// unexpanded navigation edges are rendered as links.
    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        if let Some(id) = &self.id {
            object.insert("@odata.id".to_string(), Value::String(id.clone()));
        }
        write_members(&mut object, &self.properties, &self.navigation_links);
        Value::Object(object)
    }
}

fn write_members(
    object: &mut Map<String, Value>,
    properties: &[Property],
    links: &[NavigationEdge],
) {
    for property in properties {
        let value = match &property.value {
            PropertyValue::Primitive(value) => value.clone(),
            PropertyValue::Complex(complex) => {
                let mut nested = Map::new();
                write_members(&mut nested, &complex.properties, &complex.navigation_links);
                Value::Object(nested)
            }
        };
        object.insert(property.name.clone(), value);
    }

    for link in links {
        let value = match &link.inline {
            Some(Inline::Entity(document)) => document.to_json(),
            Some(Inline::Collection(documents)) => {
                Value::Array(documents.iter().map(Document::to_json).collect())
            }
            None => match &link.href {
                Some(href) => serde_json::json!({ "@odata.navigationLink": href }),
                None => Value::Null,
            },
        };
        object.insert(link.name.clone(), value);
    }
}
