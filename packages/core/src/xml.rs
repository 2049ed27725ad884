//! The navigable data tree built from XML response bodies.
//!
//! A [`DataNode`] is one element: its name, its attributes, its text, and
//! its child elements in document order. Attributes and child elements
//! share one lookup namespace through [`DataNode::get`]; repeated child
//! elements come back as a [`Field::Sequence`].

use std::fmt;

use indexmap::IndexMap;
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Serialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DataNode {
    name: String,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    attributes: IndexMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<DataNode>,
}

/// One entry of a node's merged attribute/element namespace.
#[derive(Debug, Clone, PartialEq)]
pub enum Field<'a> {
    Attribute(&'a str),
    Element(&'a DataNode),
    Sequence(Vec<&'a DataNode>),
}

impl<'a> Field<'a> {
    /// Scalar value: the attribute value, or the text of a single element.
    pub fn text(&self) -> Option<&'a str> {
        match *self {
            Self::Attribute(v) => Some(v),
            Self::Element(node) => node.text(),
            Self::Sequence(_) => None,
        }
    }

    pub fn to_owned_value(&self) -> FieldValue {
        match self {
            Self::Attribute(v) => FieldValue::Text(v.to_string()),
            Self::Element(node) if node.is_leaf() => {
                FieldValue::Text(node.text().unwrap_or_default().to_string())
            }
            Self::Element(node) => FieldValue::Node((*node).clone()),
            Self::Sequence(nodes) => {
                FieldValue::Sequence(nodes.iter().map(|n| (*n).clone()).collect())
            }
        }
    }
}

/// An owned [`Field`], detached from the tree it came from.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Node(DataNode),
    Sequence(Vec<DataNode>),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(t) => Some(t),
            Self::Node(node) => node.text(),
            Self::Sequence(_) => None,
        }
    }
}

impl DataNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_child(mut self, child: DataNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(name.into(), value.into());
    }

    pub fn push_child(&mut self, child: DataNode) {
        self.children.push(child);
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> &IndexMap<String, String> {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn children(&self) -> &[DataNode] {
        &self.children
    }

    /// No child elements.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// The first child element called `name`.
    pub fn child(&self, name: &str) -> Option<&DataNode> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &str) -> Vec<&'a DataNode> {
        self.children.iter().filter(|c| c.name == name).collect()
    }

    /// Look up `name` in the merged namespace. Attributes win over child
    /// elements of the same name.
    pub fn get(&self, name: &str) -> Option<Field<'_>> {
        if let Some(value) = self.attribute(name) {
            return Some(Field::Attribute(value));
        }
        let mut matches = self.children_named(name);
        match matches.len() {
            0 => None,
            1 => matches.pop().map(Field::Element),
            _ => Some(Field::Sequence(matches)),
        }
    }

    /// Scalar value of `name`: an attribute, or a child element's text.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.get(name)?.text()
    }

    /// Follow a dotted path such as `device.ip-address` through first
    /// matching children; the last segment may be an attribute.
    pub fn path(&self, dotted: &str) -> Option<Field<'_>> {
        let mut segments = dotted.split('.').peekable();
        let mut node = self;
        while let Some(segment) = segments.next() {
            if segments.peek().is_none() {
                return node.get(segment);
            }
            node = node.child(segment)?;
        }
        None
    }

    /// Serialize as an XML document fragment (no declaration).
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        write_node(self, &mut out);
        out
    }
}

impl fmt::Display for DataNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_xml())
    }
}

/// Parse an XML document into its root [`DataNode`].
///
/// Whitespace-only text is dropped. Returns [`Error::Marshalling`] for
/// malformed input or a document without a root element.
pub fn deserialize(xml: &str) -> Result<DataNode> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<DataNode> = Vec::new();
    let mut root: Option<DataNode> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => stack.push(open_element(&e)?),
            Ok(Event::Empty(e)) => {
                let node = open_element(&e)?;
                attach(&mut stack, &mut root, node)?;
            }
            Ok(Event::End(_)) => {
                let node = stack
                    .pop()
                    .ok_or_else(|| Error::Marshalling("unbalanced end tag".into()))?;
                attach(&mut stack, &mut root, node)?;
            }
            Ok(Event::Text(t)) => {
                let text = t.unescape().map_err(marshalling)?;
                if let Some(top) = stack.last_mut() {
                    append_text(top, &text);
                }
            }
            Ok(Event::CData(c)) => {
                let raw = c.into_inner();
                let text = String::from_utf8_lossy(&raw);
                if let Some(top) = stack.last_mut() {
                    append_text(top, &text);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(Error::Marshalling(format!(
                    "invalid XML at byte {}: {e}",
                    reader.buffer_position()
                )))
            }
        }
    }

    if let Some(open) = stack.last() {
        return Err(Error::Marshalling(format!(
            "element <{}> is never closed",
            open.name
        )));
    }
    root.ok_or_else(|| Error::Marshalling("document has no root element".into()))
}

/// Undo the entity escaping some services apply to XML embedded in a
/// response body, so the embedded markup parses as elements.
pub fn cleanup(body: &str) -> String {
    body.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
}

// --- helpers -----------------------------------------------------------------

fn marshalling(e: impl fmt::Display) -> Error {
    Error::Marshalling(e.to_string())
}

fn open_element(e: &BytesStart<'_>) -> Result<DataNode> {
    let mut node = DataNode::new(String::from_utf8_lossy(e.name().as_ref()).into_owned());
    for attr in e.attributes() {
        let attr = attr.map_err(marshalling)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(marshalling)?.into_owned();
        node.attributes.insert(key, value);
    }
    Ok(node)
}

fn attach(stack: &mut [DataNode], root: &mut Option<DataNode>, node: DataNode) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
        return Ok(());
    }
    if root.is_some() {
        return Err(Error::Marshalling(format!(
            "second root element <{}>",
            node.name
        )));
    }
    *root = Some(node);
    Ok(())
}

fn append_text(node: &mut DataNode, text: &str) {
    match &mut node.text {
        Some(existing) => existing.push_str(text),
        None => node.text = Some(text.to_string()),
    }
}

fn write_node(node: &DataNode, out: &mut String) {
    out.push('<');
    out.push_str(&node.name);
    for (key, value) in &node.attributes {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(&escape(value.as_str()));
        out.push('"');
    }
    if node.text.is_none() && node.children.is_empty() {
        out.push_str("/>");
        return;
    }
    out.push('>');
    if let Some(text) = &node.text {
        out.push_str(&escape(text.as_str()));
    }
    for child in &node.children {
        write_node(child, out);
    }
    out.push_str("</");
    out.push_str(&node.name);
    out.push('>');
}

// --- tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const DEVICE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<device href="/api/space/device-management/devices/42" key="42">
  <name>edge-1</name>
  <ip-address>10.0.0.1</ip-address>
  <interfaces>
    <interface name="ge-0/0/0"/>
    <interface name="ge-0/0/1"/>
  </interfaces>
</device>"#;

    #[test]
    fn attributes_and_elements_share_a_namespace() {
        let node = deserialize(DEVICE).unwrap();
        assert_eq!(node.name(), "device");
        assert_eq!(node.value("href"), Some("/api/space/device-management/devices/42"));
        assert_eq!(node.value("name"), Some("edge-1"));
        assert_eq!(node.value("ip-address"), Some("10.0.0.1"));
        assert!(node.get("missing").is_none());
    }

    #[test]
    fn lookup_outlives_the_name_it_was_given() {
        let node = deserialize(DEVICE).unwrap();
        let interfaces = node.child("interfaces").unwrap();
        let field = {
            let name = String::from("interface");
            interfaces.get(&name)
        };
        match field {
            Some(Field::Sequence(items)) => assert_eq!(items[0].attribute("name"), Some("ge-0/0/0")),
            other => panic!("expected sequence, got {other:?}"),
        }
        assert_eq!(interfaces.children_named("interface").len(), 2);
    }

    #[test]
    fn repeated_children_form_a_sequence() {
        let node = deserialize(DEVICE).unwrap();
        match node.path("interfaces.interface") {
            Some(Field::Sequence(items)) => {
                assert_eq!(items.len(), 2);
                assert_eq!(items[1].attribute("name"), Some("ge-0/0/1"));
            }
            other => panic!("expected sequence, got {other:?}"),
        }
    }

    #[test]
    fn entities_and_cdata_are_unescaped() {
        let node =
            deserialize("<m><a>x &amp; y</a><b><![CDATA[<raw/>]]></b></m>").unwrap();
        assert_eq!(node.value("a"), Some("x & y"));
        assert_eq!(node.value("b"), Some("<raw/>"));
    }

    #[test]
    fn malformed_input_is_a_marshalling_error() {
        assert!(matches!(deserialize("<a><b></a>"), Err(Error::Marshalling(_))));
        assert!(matches!(deserialize("<a>"), Err(Error::Marshalling(_))));
        assert!(matches!(deserialize(""), Err(Error::Marshalling(_))));
        assert!(matches!(deserialize("<a/><b/>"), Err(Error::Marshalling(_))));
    }

    #[test]
    fn written_xml_parses_back() {
        let node = DataNode::new("widget")
            .with_attribute("href", "/w/1")
            .with_child(DataNode::new("label").with_text("a < b"))
            .with_child(DataNode::new("empty"));
        let xml = node.to_xml();
        assert_eq!(
            xml,
            r#"<widget href="/w/1"><label>a &lt; b</label><empty/></widget>"#
        );
        assert_eq!(deserialize(&xml).unwrap(), node);
    }

    #[test]
    fn cleanup_unescapes_embedded_markup() {
        let body = "<output>&lt;rpc-reply attr=&quot;1&quot;&gt;ok&lt;/rpc-reply&gt;</output>";
        let node = deserialize(&cleanup(body)).unwrap();
        let reply = node.child("rpc-reply").unwrap();
        assert_eq!(reply.attribute("attr"), Some("1"));
        assert_eq!(reply.text(), Some("ok"));
    }

    #[test]
    fn json_form_omits_empty_parts() {
        let node = DataNode::new("device")
            .with_attribute("href", "/d/1")
            .with_child(DataNode::new("name").with_text("sw1"));
        assert_eq!(
            serde_json::to_value(&node).unwrap(),
            serde_json::json!({
                "name": "device",
                "attributes": { "href": "/d/1" },
                "children": [{ "name": "name", "text": "sw1" }]
            })
        );
    }
}
