//! Building XML request bodies from local attributes.
//!
//! | Value | Wire form |
//! |-------|-----------|
//! | [`Value::Scalar`] named `href` | attribute on the enclosing element |
//! | [`Value::Scalar`] | child element with text |
//! | [`Value::Record`] | child subtree, named by the record's element |
//! | [`Value::List`] | wrapper element holding one subtree per record |
//! | [`Value::Map`] | wrapper element; an `href` key becomes its attribute, other keys become text children |
//!
//! Names starting with `_` are private and never sent. All other names go
//! through [`crate::names::to_wire`].

use indexmap::IndexMap;

use crate::names::to_wire;
use crate::xml::DataNode;

/// A nested object: its element name and its attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub element: String,
    pub attributes: Attributes,
}

impl Record {
    pub fn new(element: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            element: element.into(),
            attributes,
        }
    }

    pub fn to_node(&self) -> DataNode {
        serialize(&self.attributes, &self.element)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(String),
    Record(Record),
    List(Vec<Record>),
    Map(IndexMap<String, String>),
}

impl Value {
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            Self::Scalar(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Scalar(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Scalar(v)
    }
}

macro_rules! scalar_from {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Self::Scalar(v.to_string())
            }
        })*
    };
}

scalar_from!(i32, i64, u32, u64, usize, f64, bool);

impl From<Record> for Value {
    fn from(v: Record) -> Self {
        Self::Record(v)
    }
}

impl From<Vec<Record>> for Value {
    fn from(v: Vec<Record>) -> Self {
        Self::List(v)
    }
}

impl From<IndexMap<String, String>> for Value {
    fn from(v: IndexMap<String, String>) -> Self {
        Self::Map(v)
    }
}

/// Ordered local attributes of an object, keyed by local name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes(IndexMap<String, Value>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Attributes::insert`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn scalar(&self, name: &str) -> Option<&str> {
        self.get(name)?.as_scalar()
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.0.shift_remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Build the wire element `element` from `attributes`.
pub fn serialize(attributes: &Attributes, element: &str) -> DataNode {
    let mut root = DataNode::new(element);

    for (name, value) in attributes.iter() {
        if name.starts_with('_') {
            continue;
        }
        let wire = to_wire(name);
        match value {
            Value::Scalar(v) if wire == "href" => root.set_attribute("href", v.as_str()),
            Value::Scalar(v) => root.push_child(DataNode::new(wire).with_text(v.as_str())),
            Value::Record(record) => root.push_child(record.to_node()),
            Value::List(records) => {
                let mut wrapper = DataNode::new(wire);
                for record in records {
                    wrapper.push_child(record.to_node());
                }
                root.push_child(wrapper);
            }
            Value::Map(map) => {
                let mut wrapper = DataNode::new(wire);
                for (key, v) in map {
                    if key == "href" {
                        wrapper.set_attribute("href", v.as_str());
                    } else {
                        wrapper.push_child(DataNode::new(to_wire(key)).with_text(v.as_str()));
                    }
                }
                root.push_child(wrapper);
            }
        }
    }

    root
}

// --- tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::deserialize;

    #[test]
    fn scalars_become_children_and_href_an_attribute() {
        let attrs = Attributes::new()
            .with("href", "/api/widgets/1")
            .with("name", "x")
            .with("count", 1);
        let xml = serialize(&attrs, "widget").to_xml();
        assert_eq!(
            xml,
            r#"<widget href="/api/widgets/1"><name>x</name><count>1</count></widget>"#
        );
    }

    #[test]
    fn parsed_fields_match_input() {
        let attrs = Attributes::new().with("name", "x").with("serial_number", "SN1");
        let node = deserialize(&serialize(&attrs, "widget").to_xml()).unwrap();
        assert_eq!(node.value("name"), Some("x"));
        assert_eq!(node.value("serial-number"), Some("SN1"));
    }

    #[test]
    fn private_names_are_skipped() {
        let attrs = Attributes::new().with("_cache", "x").with("name", "y");
        let node = serialize(&attrs, "w");
        assert!(node.child("_cache").is_none());
        assert_eq!(node.children().len(), 1);
    }

    #[test]
    fn nested_records_and_lists() {
        let owner = Record::new("user", Attributes::new().with("login", "ops"));
        let tags = vec![
            Record::new("tag", Attributes::new().with("label", "a")),
            Record::new("tag", Attributes::new().with("label", "b")),
        ];
        let attrs = Attributes::new().with("owner", owner).with("tags", tags);
        let node = serialize(&attrs, "device");

        assert_eq!(node.path("user.login").and_then(|f| f.text()), Some("ops"));
        let wrapper = node.child("tags").unwrap();
        assert_eq!(wrapper.children_named("tag").len(), 2);
    }

    #[test]
    fn maps_become_wrappers_with_href_attribute() {
        let mut domain = IndexMap::new();
        domain.insert("href".to_string(), "/api/domains/2".to_string());
        domain.insert("display_name".to_string(), "Global".to_string());
        let node = serialize(&Attributes::new().with("domain", domain), "device");

        let wrapper = node.child("domain").unwrap();
        assert_eq!(wrapper.attribute("href"), Some("/api/domains/2"));
        assert_eq!(wrapper.value("display-name"), Some("Global"));
    }
}
