use std::sync::Arc;

use tracing::{debug, warn};

use crate::client::Client;
use crate::error::{Error, Result};
use crate::navigator::service::method_href;
use crate::navigator::{
    accept_header, join, queued_url, resolve_child, Child, ChildCache, Describe, Description,
    Method, Navigable, Posted, Query, RequestOptions, Resource,
};
use crate::registry::{MetaCollection, MetaResource};
use crate::task::TaskRef;
use crate::transport::HttpRequest;
use crate::xml::{self, DataNode};

/// A server-side list of resources.
#[derive(Debug, Clone)]
pub struct Collection {
    client: Client,
    meta: Arc<MetaCollection>,
    parent_href: String,
    children: ChildCache,
}

/// What to create with [`Collection::post`].
#[derive(Debug, Clone)]
pub enum NewMembers {
    /// Nothing; the body comes from [`RequestOptions::request_body`].
    None,
    One(Resource),
    Many(Vec<Resource>),
}

/// How one element of a list response was handled.
enum ItemOutcome {
    Item(Resource),
    /// Element name differs from the member type's; left out of the page.
    Skip { expected: String, found: String },
    Fail(Error),
}

impl Collection {
    pub(crate) fn new(client: Client, meta: Arc<MetaCollection>, parent_href: String) -> Self {
        Self {
            client,
            meta,
            parent_href,
            children: ChildCache::default(),
        }
    }

    pub fn meta(&self) -> &MetaCollection {
        &self.meta
    }

    /// The declared absolute URL, else parent href plus path segment.
    pub fn href(&self) -> String {
        match &self.meta.url {
            Some(url) => url.clone(),
            None => join(&self.parent_href, &self.meta.path_segment),
        }
    }

    pub fn lookup(&self, name: &str) -> Result<Child> {
        resolve_child(self, name)
    }

    /// A declared named member, e.g. `counts.member("managed")`.
    pub fn member(&self, name: &str) -> Result<Resource> {
        match self.lookup(name)? {
            Child::NamedMember(r) => Ok(r),
            _ => Err(self.missing(name)),
        }
    }

    pub fn method(&self, name: &str) -> Result<Method> {
        match self.lookup(name)? {
            Child::NestedMethod(m) => Ok(m),
            _ => Err(self.missing(name)),
        }
    }

    /// An unfetched member addressed by id, at `<href>/<id>`. Call
    /// [`Resource::get`] to load it.
    pub fn resource(&self, id: &str) -> Result<Resource> {
        let meta = self.member_meta()?.ok_or_else(|| {
            Error::Usage(format!("{} declares no member type", self.meta.name))
        })?;
        Ok(Resource::named(
            self.client.clone(),
            meta,
            None,
            self.href(),
            id.to_string(),
        ))
    }

    /// The URL [`Collection::get`] would fetch for `query`.
    pub fn url_for(&self, query: &Query) -> String {
        query.apply(&self.href())
    }

    /// Fetch one page of members.
    ///
    /// A 204 is an empty page. In a plain list, items whose element name
    /// does not match the member type are skipped with a warning; any other
    /// item failure fails the whole call.
    pub fn get(&self, query: &Query) -> Result<Vec<Resource>> {
        let url = self.url_for(query);
        let declared = match query.accept {
            Some(_) => None,
            None => self.meta.media_type_for(query.version)?,
        };
        let accept = accept_header(
            query.accept.as_deref(),
            declared,
            self.meta.retain_charset_in_accept,
        );

        let response = self
            .client
            .send(HttpRequest::get(&url).header_opt("Accept", accept))?;
        match response.status {
            204 => return Ok(Vec::new()),
            200 => {}
            _ => return Err(Error::api(format!("GET {url} failed"), response)),
        }

        let root = xml::deserialize(&response.body)?;
        let href = self.href();

        if self.meta.single_object_collection {
            return Ok(vec![self.typed_member(root)?]);
        }

        if !self.meta.named_members.is_empty() {
            let mut members = Vec::with_capacity(self.meta.named_members.len());
            for (key, nm) in &self.meta.named_members {
                let meta = self.client.registry().resource(&nm.resource_type)?;
                let state = root.child(&nm.xml_name).cloned();
                members.push(Resource::named(
                    self.client.clone(),
                    meta,
                    state,
                    href.clone(),
                    key.clone(),
                ));
            }
            return Ok(members);
        }

        let mut members = Vec::with_capacity(root.children().len());
        for item in root.children() {
            match self.parse_item(item, &href) {
                ItemOutcome::Item(r) => members.push(r),
                ItemOutcome::Skip { expected, found } => {
                    warn!("collection: {url}: skipping <{found}>, expected <{expected}>")
                }
                ItemOutcome::Fail(e) => return Err(e),
            }
        }
        debug!("collection: {url}: {} members", members.len());
        Ok(members)
    }

    /// Create members.
    ///
    /// The body is built from `members`, or taken from
    /// [`RequestOptions::request_body`]; supplying both is a usage error.
    /// A 204 echoes the input back. With [`RequestOptions::task`] set, a
    /// 200/202 yields the job reference. Otherwise a single posted member
    /// (or a literal body) yields the created resource, and a posted list
    /// is echoed.
    pub fn post(
        &self,
        members: NewMembers,
        options: &RequestOptions<'_>,
    ) -> Result<Posted<NewMembers, Resource>> {
        let version = options.version;
        let mut saved_root: Option<String> = None;

        let (body, content_type, accept) = match (&members, &options.request_body) {
            (NewMembers::None, None) => {
                return Err(Error::Usage("nothing to post: no members and no request body".into()))
            }
            (NewMembers::None, Some(body)) => {
                let content_type = match &options.content_type {
                    Some(ct) => Some(ct.clone()),
                    None => match self.member_meta()? {
                        Some(meta) => meta.media_type_for(version)?,
                        None => None,
                    },
                };
                let content_type = content_type.ok_or_else(|| {
                    Error::Usage("a literal request body needs a content type".into())
                })?;
                (body.clone(), Some(content_type), options.accept.clone())
            }
            (_, Some(_)) => {
                return Err(Error::Usage(
                    "supply either members or a request body, not both".into(),
                ))
            }
            (NewMembers::One(resource), None) => {
                let mut node = resource.to_node();
                if let Some(name) = &options.xml_name {
                    saved_root = Some(node.name().to_string());
                    node.rename(name.as_str());
                }
                let declared = if options.content_type.is_some() && options.accept.is_some() {
                    None
                } else {
                    resource.meta().media_type_for(version)?
                };
                let content_type = options.content_type.clone().or_else(|| declared.clone());
                let accept = accept_header(
                    options.accept.as_deref(),
                    declared,
                    resource.meta().retain_charset_in_accept,
                );
                (node.to_xml(), content_type, accept)
            }
            (NewMembers::Many(list), None) => {
                let root_name = options
                    .xml_name
                    .clone()
                    .or_else(|| self.meta.xml_name.clone())
                    .unwrap_or_else(|| self.meta.path_segment.clone());
                let mut root = DataNode::new(root_name);
                for resource in list {
                    root.push_child(resource.to_node());
                }
                let content_type = match &options.content_type {
                    Some(ct) => Some(ct.clone()),
                    None => self.meta.list_content_type(version)?,
                };
                (root.to_xml(), content_type, options.accept.clone())
            }
        };

        let url = queued_url(&self.href(), options);
        let request = HttpRequest::post(&url)
            .header_opt("Accept", accept)
            .header_opt("Content-Type", content_type)
            .body(body);

        let response = self.client.send(request)?;
        match response.status {
            204 => return Ok(Posted::Echoed(members)),
            200 | 202 => {}
            _ => return Err(Error::api(format!("POST {url} failed"), response)),
        }

        if options.task.is_some() {
            let task = TaskRef::parse(&response.body)?;
            debug!("collection: POST {url} queued as task {}", task.id);
            return Ok(Posted::Task(task));
        }

        match members {
            NewMembers::Many(_) => Ok(Posted::Echoed(members)),
            NewMembers::One(resource) => {
                let mut node = xml::deserialize(&response.body)?;
                if let Some(name) = saved_root {
                    node.rename(name);
                }
                let meta = resource.meta_arc();
                Ok(Posted::Returned(self.checked_member(meta, node)?))
            }
            NewMembers::None => {
                let node = xml::deserialize(&response.body)?;
                Ok(Posted::Returned(self.typed_member(node)?))
            }
        }
    }

    fn missing(&self, name: &str) -> Error {
        Error::NoSuchField {
            owner: self.meta.name.to_string(),
            name: name.to_string(),
        }
    }

    /// The declared member type, if any.
    fn member_meta(&self) -> Result<Option<Arc<MetaResource>>> {
        self.meta
            .resource_type
            .as_ref()
            .map(|name| self.client.registry().resource(name))
            .transpose()
    }

    /// The member type for `node`: the declared one, or a placeholder named
    /// after the element.
    fn meta_for(&self, node: &DataNode) -> Result<Arc<MetaResource>> {
        Ok(match self.member_meta()? {
            Some(meta) => meta,
            None => Arc::new(MetaResource::anonymous(&self.meta.name, node.name())),
        })
    }

    fn parse_item(&self, node: &DataNode, href: &str) -> ItemOutcome {
        let meta = match self.meta_for(node) {
            Ok(meta) => meta,
            Err(e) => return ItemOutcome::Fail(e),
        };
        if meta.xml_name != node.name() {
            return ItemOutcome::Skip {
                expected: meta.xml_name.clone(),
                found: node.name().to_string(),
            };
        }
        ItemOutcome::Item(Resource::from_snapshot(
            self.client.clone(),
            meta,
            Some(node.clone()),
            Some(href.to_string()),
        ))
    }

    /// Build a member where a mismatched element is an error, not a skip.
    fn typed_member(&self, node: DataNode) -> Result<Resource> {
        let meta = self.meta_for(&node)?;
        self.checked_member(meta, node)
    }

    fn checked_member(&self, meta: Arc<MetaResource>, node: DataNode) -> Result<Resource> {
        if meta.xml_name != node.name() {
            return Err(Error::Marshalling(format!(
                "expected <{}> from {}, got <{}>",
                meta.xml_name,
                self.href(),
                node.name()
            )));
        }
        Ok(Resource::from_snapshot(
            self.client.clone(),
            meta,
            Some(node),
            Some(self.href()),
        ))
    }
}

impl Navigable for Collection {
    fn child_cache(&self) -> &ChildCache {
        &self.children
    }

    fn named_member(&self, name: &str) -> Result<Option<Resource>> {
        let Some(nm) = self.meta.named_members.get(name) else {
            return Ok(None);
        };
        let meta = self.client.registry().resource(&nm.resource_type)?;
        Ok(Some(Resource::named(
            self.client.clone(),
            meta,
            None,
            self.href(),
            name.to_string(),
        )))
    }

    fn nested_collection(&self, _name: &str) -> Result<Option<Collection>> {
        Ok(None)
    }

    fn nested_method(&self, name: &str) -> Result<Option<Method>> {
        // Only service-level collections can be extended by a member name.
        if !self.meta.methods.contains_key(name) || self.meta.name.member_name().is_some() {
            return Ok(None);
        }
        let meta = self.client.registry().method(&self.meta.name.member(name))?;
        Ok(Some(Method::new(self.client.clone(), meta, self.href())))
    }
}

impl Describe for Collection {
    fn href(&self) -> Result<String> {
        Ok(Collection::href(self))
    }

    fn description(&self) -> Result<Description> {
        let href = Collection::href(self);
        Ok(Description {
            kind: "Collection",
            name: self.meta.name.to_string(),
            methods: self
                .meta
                .methods
                .iter()
                .map(|(k, seg)| (k.clone(), method_href(&href, seg)))
                .collect(),
            collections: Vec::new(),
            href,
        })
    }
}

// --- tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marshal::Attributes;
    use crate::navigator::fixtures;
    use crate::transport::{HttpMethod, HttpResponse};

    const PAGE: &str = r#"<devices total="3">
        <device href="/api/space/device-management/devices/1"><name>a</name></device>
        <script href="/api/space/script-management/scripts/9"/>
        <device href="/api/space/device-management/devices/2"><name>b</name></device>
    </devices>"#;

    fn devices() -> (Collection, std::sync::Arc<crate::transport::mock::MockTransport>) {
        let (client, mock) = fixtures::client();
        let c = client
            .service("device_management")
            .unwrap()
            .collection("devices")
            .unwrap();
        (c, mock)
    }

    #[test]
    fn get_parses_members_and_skips_mismatches() {
        let (devices, mock) = devices();
        mock.push(HttpResponse::new(200).with_body(PAGE));

        let members = devices.get(&Query::new()).unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members[1].field("name").unwrap().as_text(), Some("b"));
        assert_eq!(
            members[0].href().unwrap(),
            "/api/space/device-management/devices/1"
        );
    }

    #[test]
    fn get_sends_query_and_stripped_accept() {
        let (devices, mock) = devices();
        mock.push(HttpResponse::new(204));

        let q = Query::new().filter_eq("a", "1").filter_eq("b", "2").start(0).limit(10);
        assert!(devices.get(&q).unwrap().is_empty());

        let request = mock.last_request();
        assert_eq!(request.method, HttpMethod::Get);
        assert_eq!(
            request.url,
            "/api/space/device-management/devices?filter=((a eq '1') and (b eq '2'))&paging=(start eq 0, limit eq 10)"
        );
        assert_eq!(
            request.header_value("accept"),
            Some("application/vnd.devices+xml;version=2")
        );
    }

    #[test]
    fn get_error_status_is_api_error() {
        let (devices, mock) = devices();
        mock.push(HttpResponse::new(500).with_body("down"));
        let err = devices.get(&Query::new()).unwrap_err();
        assert_eq!(err.response().map(|r| r.body.as_str()), Some("down"));
    }

    #[test]
    fn single_object_collection_returns_root() {
        let (client, mock) = fixtures::client();
        let summary = client
            .service("device_management")
            .unwrap()
            .collection("summary")
            .unwrap();

        mock.push(HttpResponse::new(200).with_body("<summary><total>4</total></summary>"));
        let members = summary.get(&Query::new()).unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].field("total").unwrap().as_text(), Some("4"));

        mock.push(HttpResponse::new(200).with_body("<other/>"));
        assert!(matches!(summary.get(&Query::new()), Err(Error::Marshalling(_))));
    }

    #[test]
    fn named_members_built_from_children() {
        let (client, mock) = fixtures::client();
        let counts = client
            .service("device_management")
            .unwrap()
            .collection("counts")
            .unwrap();

        mock.push(HttpResponse::new(200).with_body(
            "<counts><managed><n>3</n></managed><unmanaged><n>1</n></unmanaged></counts>",
        ));
        let members = counts.get(&Query::new()).unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].id().as_deref(), Some("managed"));
        assert_eq!(members[1].field("n").unwrap().as_text(), Some("1"));
        assert_eq!(
            members[1].href().unwrap(),
            "/api/space/device-management/counts/unmanaged"
        );

        let managed = counts.member("managed").unwrap();
        assert_eq!(managed.href().unwrap(), "/api/space/device-management/counts/managed");
    }

    #[test]
    fn post_one_member_returns_created_resource() {
        let (devices, mock) = devices();
        let client = devices.client.clone();
        let device = client
            .new_resource(
                "device_management.device",
                Attributes::new().with("name", "edge-3").with("ip_address", "10.0.0.3"),
            )
            .unwrap();

        mock.push(HttpResponse::new(200).with_body(
            r#"<device href="/api/space/device-management/devices/3"><name>edge-3</name></device>"#,
        ));
        let options = RequestOptions::new().version(1);
        let created = devices
            .post(NewMembers::One(device), &options)
            .unwrap()
            .returned()
            .unwrap();
        assert_eq!(created.href().unwrap(), "/api/space/device-management/devices/3");

        let request = mock.last_request();
        assert_eq!(
            request.body.as_deref(),
            Some("<device><name>edge-3</name><ip-address>10.0.0.3</ip-address></device>")
        );
        assert_eq!(
            request.header_value("content-type"),
            Some("application/vnd.device+xml;version=1")
        );
    }

    #[test]
    fn post_with_xml_name_override_restores_root() {
        let (devices, mock) = devices();
        let device = devices
            .client
            .new_resource("device_management.device", Attributes::new().with("name", "x"))
            .unwrap();

        mock.push(HttpResponse::new(200).with_body("<managed-device><name>x</name></managed-device>"));
        let options = RequestOptions::new().version(2).xml_name("managed-device");
        let created = devices
            .post(NewMembers::One(device), &options)
            .unwrap()
            .returned()
            .unwrap();
        assert_eq!(created.state().unwrap().name(), "device");
        assert!(mock
            .last_request()
            .body
            .unwrap()
            .starts_with("<managed-device>"));
    }

    #[test]
    fn post_list_wraps_and_echoes() {
        let (devices, mock) = devices();
        let client = devices.client.clone();
        let list = vec![
            client
                .new_resource("device_management.device", Attributes::new().with("name", "a"))
                .unwrap(),
            client
                .new_resource("device_management.device", Attributes::new().with("name", "b"))
                .unwrap(),
        ];

        mock.push(HttpResponse::new(200).with_body("<ignored/>"));
        match devices.post(NewMembers::Many(list), &RequestOptions::new()).unwrap() {
            Posted::Echoed(NewMembers::Many(echoed)) => assert_eq!(echoed.len(), 2),
            other => panic!("expected echo, got {other:?}"),
        }
        let request = mock.last_request();
        assert_eq!(
            request.body.as_deref(),
            Some("<devices><device><name>a</name></device><device><name>b</name></device></devices>")
        );
        assert_eq!(
            request.header_value("content-type"),
            Some("application/vnd.devices-list+xml;version=1")
        );
    }

    #[test]
    fn post_no_content_echoes_input() {
        let (devices, mock) = devices();
        mock.push(HttpResponse::new(204));
        let options = RequestOptions::new()
            .request_body("<device/>")
            .content_type("application/xml");
        assert!(matches!(
            devices.post(NewMembers::None, &options).unwrap(),
            Posted::Echoed(NewMembers::None)
        ));
    }

    #[test]
    fn post_usage_errors() {
        let (devices, mock) = devices();
        let device = devices
            .client
            .new_resource("device_management.device", Attributes::new())
            .unwrap();
        let both = RequestOptions::new().request_body("<device/>");
        assert!(matches!(
            devices.post(NewMembers::One(device), &both),
            Err(Error::Usage(_))
        ));
        assert!(matches!(
            devices.post(NewMembers::None, &RequestOptions::new()),
            Err(Error::Usage(_))
        ));
        assert!(mock.requests().is_empty());
    }

    #[test]
    fn post_error_status_is_api_error() {
        let (devices, mock) = devices();
        mock.push(HttpResponse::new(409));
        let options = RequestOptions::new().request_body("<device/>").version(1);
        assert!(matches!(
            devices.post(NewMembers::None, &options),
            Err(Error::Api { .. })
        ));
    }

    #[test]
    fn collection_methods_resolve() {
        let (devices, _) = devices();
        let export = devices.method("export").unwrap();
        assert_eq!(export.href(), "/api/space/device-management/devices/export-devices");
        assert!(matches!(devices.lookup("export").unwrap(), Child::NestedMethod(_)));
    }

    #[test]
    fn member_by_id_is_fetched_at_collection_href() {
        let (devices, mock) = devices();
        let device = devices.resource("42").unwrap();
        assert!(device.state().is_none());
        assert_eq!(device.href().unwrap(), "/api/space/device-management/devices/42");

        mock.push(HttpResponse::new(200).with_body(r#"<device><name>sw42</name></device>"#));
        let loaded = device.get(None, Some(1)).unwrap();
        assert_eq!(loaded.field("name").unwrap().as_text(), Some("sw42"));
        assert_eq!(mock.last_request().url, "/api/space/device-management/devices/42");
    }
}
