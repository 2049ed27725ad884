//! Runtime navigation of an API: services, collections, resources and
//! methods, each holding its meta-object and the href it was reached by.
//!
//! Children are found by name with `lookup`, which resolves in a fixed
//! order: already-cached child, named member, nested collection, nested
//! method, data field, and finally [`Child::NotFound`]. Structural children
//! are cached on first lookup; data fields are read from the snapshot each
//! time.
//!
//! Parents are referenced by href only, so a subtree can outlive the node
//! it was reached from.

mod application;
mod collection;
mod method;
mod query;
mod resource;
mod service;

use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};

use indexmap::IndexMap;
use tracing::debug;

use crate::client::Client;
use crate::error::{Error, Result};
use crate::media;
use crate::task::{TaskMonitor, TaskRef};
use crate::transport::HttpRequest;
use crate::xml::{self, DataNode, FieldValue};

pub use application::Application;
pub use collection::{Collection, NewMembers};
pub use method::Method;
pub use query::{Filter, Paging, Query};
pub use resource::Resource;
pub use service::Service;

/// The result of resolving a name against a node.
#[derive(Debug, Clone)]
pub enum Child {
    NamedMember(Resource),
    NestedCollection(Collection),
    NestedMethod(Method),
    DataField(FieldValue),
    NotFound,
}

impl Child {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NamedMember(_) => "named member",
            Self::NestedCollection(_) => "collection",
            Self::NestedMethod(_) => "method",
            Self::DataField(_) => "field",
            Self::NotFound => "nothing",
        }
    }
}

/// The outcome of a POST that may run asynchronously.
#[derive(Debug, Clone)]
pub enum Posted<I, O> {
    /// 204: the server kept the input as sent.
    Echoed(I),
    /// The request was queued; progress arrives on the task monitor.
    Task(TaskRef),
    /// The server's response body.
    Returned(O),
}

impl<I, O> Posted<I, O> {
    pub fn task(&self) -> Option<&TaskRef> {
        match self {
            Self::Task(t) => Some(t),
            _ => None,
        }
    }

    pub fn returned(self) -> Option<O> {
        match self {
            Self::Returned(o) => Some(o),
            _ => None,
        }
    }
}

/// Per-request overrides shared by POST and PUT.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions<'a> {
    pub accept: Option<String>,
    pub content_type: Option<String>,
    /// A literal body, used instead of one built from objects or templates.
    pub request_body: Option<String>,
    /// Root element name for a posted body, replacing the declared one.
    pub xml_name: Option<String>,
    /// Run asynchronously, reporting progress to this monitor's queue.
    pub task: Option<&'a TaskMonitor>,
    /// Schedule expression forwarded with a queued request.
    pub schedule: Option<String>,
    pub version: Option<u32>,
}

impl<'a> RequestOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accept(mut self, media_type: impl Into<String>) -> Self {
        self.accept = Some(media_type.into());
        self
    }

    pub fn content_type(mut self, media_type: impl Into<String>) -> Self {
        self.content_type = Some(media_type.into());
        self
    }

    pub fn request_body(mut self, body: impl Into<String>) -> Self {
        self.request_body = Some(body.into());
        self
    }

    pub fn xml_name(mut self, name: impl Into<String>) -> Self {
        self.xml_name = Some(name.into());
        self
    }

    pub fn task(mut self, monitor: &'a TaskMonitor) -> Self {
        self.task = Some(monitor);
        self
    }

    pub fn schedule(mut self, schedule: impl Into<String>) -> Self {
        self.schedule = Some(schedule.into());
        self
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = Some(version);
        self
    }
}

/// Parameters for a method or resource invocation. They fill the request
/// template; an `id` parameter also extends a method's URL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MethodCall {
    pub params: IndexMap<String, String>,
}

impl MethodCall {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.params.get("id").map(String::as_str)
    }
}

/// A summary of a node and its declared children.
#[derive(Debug, Clone, PartialEq)]
pub struct Description {
    pub kind: &'static str,
    pub name: String,
    pub href: String,
    /// `(name, href)` of each declared collection.
    pub collections: Vec<(String, String)>,
    /// `(name, href)` of each declared method.
    pub methods: Vec<(String, String)>,
}

/// Nodes that can report where they live and what they contain.
pub trait Describe {
    fn href(&self) -> Result<String>;
    fn description(&self) -> Result<Description>;
}

// --- child cache -------------------------------------------------------------

/// Structural children resolved so far, by lookup name.
#[derive(Default)]
pub(crate) struct ChildCache(RwLock<HashMap<String, Child>>);

impl ChildCache {
    fn get(&self, name: &str) -> Option<Child> {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Store `child` unless another lookup got there first; return the
    /// stored one either way.
    fn insert(&self, name: &str, child: Child) -> Child {
        self.0
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name.to_string())
            .or_insert(child)
            .clone()
    }
}

impl Clone for ChildCache {
    fn clone(&self) -> Self {
        let map = self.0.read().unwrap_or_else(PoisonError::into_inner).clone();
        Self(RwLock::new(map))
    }
}

impl fmt::Debug for ChildCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let map = self.0.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_set().entries(map.keys()).finish()
    }
}

/// The per-kind pieces of child resolution.
pub(crate) trait Navigable {
    fn child_cache(&self) -> &ChildCache;

    fn named_member(&self, _name: &str) -> Result<Option<Resource>> {
        Ok(None)
    }

    fn nested_collection(&self, name: &str) -> Result<Option<Collection>>;

    fn nested_method(&self, name: &str) -> Result<Option<Method>>;

    fn data_field(&self, _name: &str) -> Option<FieldValue> {
        None
    }
}

pub(crate) fn resolve_child(node: &impl Navigable, name: &str) -> Result<Child> {
    let cache = node.child_cache();
    if let Some(found) = cache.get(name) {
        return Ok(found);
    }
    if let Some(member) = node.named_member(name)? {
        return Ok(cache.insert(name, Child::NamedMember(member)));
    }
    if let Some(collection) = node.nested_collection(name)? {
        return Ok(cache.insert(name, Child::NestedCollection(collection)));
    }
    if let Some(method) = node.nested_method(name)? {
        return Ok(cache.insert(name, Child::NestedMethod(method)));
    }
    Ok(match node.data_field(name) {
        Some(value) => Child::DataField(value),
        None => Child::NotFound,
    })
}

// --- request helpers ---------------------------------------------------------

/// Join a parent href and a child segment.
pub(crate) fn join(parent: &str, segment: &str) -> String {
    format!("{}/{}", parent.trim_end_matches('/'), segment)
}

/// Append `queue=` (and `schedule=`) when the request runs under a monitor.
pub(crate) fn queued_url(href: &str, options: &RequestOptions<'_>) -> String {
    let Some(monitor) = options.task else {
        return href.to_string();
    };
    let sep = if href.contains('?') { '&' } else { '?' };
    let mut url = format!("{href}{sep}queue={}", monitor.queue_url());
    if let Some(schedule) = &options.schedule {
        url.push_str("&schedule=");
        url.push_str(&urlencoding::encode(schedule));
    }
    url
}

/// The Accept header: an explicit override, else the declared type, with
/// `;charset=` removed unless the element keeps it.
pub(crate) fn accept_header(
    explicit: Option<&str>,
    declared: Option<String>,
    retain_charset: bool,
) -> Option<String> {
    explicit
        .map(str::to_string)
        .or(declared)
        .map(|t| media::accept_value(&t, retain_charset))
}

/// A POST to a method-like endpoint, whose response is free-form XML.
pub(crate) struct Invocation<'o, 'a> {
    pub href: String,
    pub accept: Option<String>,
    pub content_type: Option<String>,
    pub body: Option<String>,
    pub keep_xml_escaping: bool,
    pub options: &'o RequestOptions<'a>,
}

pub(crate) fn invoke(
    client: &Client,
    call: MethodCall,
    inv: Invocation<'_, '_>,
) -> Result<Posted<MethodCall, DataNode>> {
    let url = queued_url(&inv.href, inv.options);
    let mut request = HttpRequest::post(&url)
        .header_opt("Accept", inv.accept)
        .header_opt("Content-Type", inv.content_type);
    if let Some(body) = inv.body {
        request = request.body(body);
    }

    let response = client.send(request)?;
    match response.status {
        204 => return Ok(Posted::Echoed(call)),
        200 | 202 => {}
        _ => return Err(Error::api(format!("POST {url} failed"), response)),
    }

    if inv.options.task.is_some() {
        let task = TaskRef::parse(&response.body)?;
        debug!("navigator: POST {url} queued as task {}", task.id);
        return Ok(Posted::Task(task));
    }
    Ok(Posted::Returned(parse_reply(&response.body, inv.keep_xml_escaping)?))
}

/// Parse a free-form response body, unescaping embedded markup first
/// unless asked not to.
pub(crate) fn parse_reply(body: &str, keep_xml_escaping: bool) -> Result<DataNode> {
    if keep_xml_escaping {
        xml::deserialize(body)
    } else {
        xml::deserialize(&xml::cleanup(body))
    }
}

// --- tests -------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod fixtures {
    use std::sync::Arc;

    use hyperwire_schema::SchemaDocument;

    use crate::client::Client;
    use crate::transport::mock::MockTransport;

    pub const SCHEMA: &str = r#"
services:
  device_management:
    url: /api/space/device-management
    collections:
      devices:
        resource_type: device_management.device
        xml_name: devices
        media_type: application/vnd.devices+xml;version=2;charset=UTF-8
        content_type: application/vnd.devices-list+xml;version=1
        methods:
          export:
            name: export-devices
      summary:
        single_object_collection: true
        resource_type: device_management.summary
      counts:
        named_members:
          managed: { resource_type: device_management.count, xml_name: managed }
          unmanaged: { resource_type: device_management.count, xml_name: unmanaged }
    methods:
      discover_devices:
        name: discover-devices
        request_type: application/vnd.discover+xml;version=1
        response_type: application/vnd.task+xml;version=1
        request_template: "<discover><target>{{ ip }}</target></discover>"
      self_check:
        name: "-"
        media_type: application/vnd.health+xml
    resources:
      device:
        xml_name: device
        collection_name: devices
        service_url: /api/space/device-management
        media_type:
          1: application/vnd.device+xml;version=1
          2: application/vnd.device+xml;version=2
        collections:
          configurations:
            resource_type: device_management.configuration
        methods:
          exec_rpc:
            name: exec-rpc
            request_type: application/vnd.rpc+xml
            response_type: application/vnd.rpc-reply+xml
            request_template: "<rpc>{{ rpcCommand }}</rpc>"
          exec_raw:
            name: exec-raw
            keep_xml_escaping: true
      configuration:
        xml_name: configuration
      summary:
        xml_name: summary
      count:
        xml_name: count
      script:
        xml_name: script
        use_uri_for_delete: true
        request_type: application/vnd.exec+xml
        response_type: application/vnd.exec-reply+xml
        request_template: "<exec><name>{{ name }}</name></exec>"
"#;

    pub fn client() -> (Client, Arc<MockTransport>) {
        let mock = Arc::new(MockTransport::new());
        let doc = SchemaDocument::from_yaml_str(SCHEMA).expect("fixture schema");
        (Client::new(doc, mock.clone()), mock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_avoids_double_slash() {
        assert_eq!(join("/api/x/", "y"), "/api/x/y");
        assert_eq!(join("/api/x", "y"), "/api/x/y");
    }

    #[test]
    fn accept_prefers_explicit_and_strips_charset() {
        assert_eq!(
            accept_header(None, Some("a/b;charset=UTF-8".into()), false).as_deref(),
            Some("a/b")
        );
        assert_eq!(
            accept_header(Some("x/y;charset=UTF-8"), Some("a/b".into()), true).as_deref(),
            Some("x/y;charset=UTF-8")
        );
        assert_eq!(accept_header(None, None, false), None);
    }

    #[test]
    fn reply_cleanup_is_optional() {
        let body = "<out>&lt;ok/&gt;</out>";
        assert!(parse_reply(body, false).unwrap().child("ok").is_some());
        assert_eq!(parse_reply(body, true).unwrap().text(), Some("<ok/>"));
    }
}
