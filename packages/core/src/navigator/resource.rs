use std::sync::Arc;

use crate::client::Client;
use crate::error::{Error, Result};
use crate::marshal::{self, Attributes, Record};
use crate::names::to_wire;
use crate::navigator::service::method_href;
use crate::navigator::{
    accept_header, invoke, join, resolve_child, Child, ChildCache, Collection, Describe,
    Description, Invocation, Method, MethodCall, Navigable, Posted, RequestOptions,
};
use crate::registry::MetaResource;
use crate::transport::HttpRequest;
use crate::xml::{self, DataNode, FieldValue};

/// One server-side object: its type, its last-fetched wire state, and any
/// local attributes set for creating or replacing it.
///
/// Snapshots are never refreshed in place. [`Resource::get`] and
/// [`Resource::put`] return new resources.
#[derive(Debug, Clone)]
pub struct Resource {
    client: Client,
    meta: Arc<MetaResource>,
    state: Option<DataNode>,
    attributes: Attributes,
    parent_href: Option<String>,
    id: Option<String>,
    children: ChildCache,
}

impl Resource {
    pub(crate) fn from_snapshot(
        client: Client,
        meta: Arc<MetaResource>,
        state: Option<DataNode>,
        parent_href: Option<String>,
    ) -> Self {
        Self {
            client,
            meta,
            state,
            attributes: Attributes::new(),
            parent_href,
            id: None,
            children: ChildCache::default(),
        }
    }

    /// A fixed member of a collection, identified by its declared key.
    pub(crate) fn named(
        client: Client,
        meta: Arc<MetaResource>,
        state: Option<DataNode>,
        parent_href: String,
        id: String,
    ) -> Self {
        Self {
            id: Some(id),
            ..Self::from_snapshot(client, meta, state, Some(parent_href))
        }
    }

    pub(crate) fn local(client: Client, meta: Arc<MetaResource>, attributes: Attributes) -> Self {
        Self {
            attributes,
            ..Self::from_snapshot(client, meta, None, None)
        }
    }

    pub fn meta(&self) -> &MetaResource {
        &self.meta
    }

    pub(crate) fn meta_arc(&self) -> Arc<MetaResource> {
        Arc::clone(&self.meta)
    }

    /// The wire state this resource was built from, if any.
    pub fn state(&self) -> Option<&DataNode> {
        self.state.as_ref()
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }

    /// The declared member key, else the `id` field.
    pub fn id(&self) -> Option<String> {
        self.id.clone().or_else(|| self.wire_value("id"))
    }

    /// Canonical location of this resource, by precedence:
    ///
    /// 1. the snapshot's `href` attribute
    /// 2. its `uri`, unless that names the collection rather than the item
    /// 3. parent href plus the `key` attribute or id
    /// 4. declared service URL plus collection name plus id
    pub fn href(&self) -> Result<String> {
        if let Some(href) = self.location_attribute("href") {
            return Ok(href);
        }
        if let Some(uri) = self.location_attribute("uri") {
            let names_collection = self
                .meta
                .collection_name
                .as_deref()
                .is_some_and(|c| uri.trim_end_matches('/').ends_with(c));
            if !names_collection {
                return Ok(uri);
            }
        }

        let identifier = self
            .location_attribute("key")
            .or_else(|| self.id())
            .ok_or_else(|| self.no_location())?;

        if let Some(parent) = &self.parent_href {
            return Ok(join(parent, &identifier));
        }
        match (&self.meta.service_url, &self.meta.collection_name) {
            (Some(service), Some(collection)) => Ok(join(&join(service, collection), &identifier)),
            _ => Err(self.no_location()),
        }
    }

    pub fn lookup(&self, name: &str) -> Result<Child> {
        resolve_child(self, name)
    }

    /// A data field of the snapshot or local attributes.
    pub fn field(&self, name: &str) -> Result<FieldValue> {
        match self.lookup(name)? {
            Child::DataField(v) => Ok(v),
            _ => Err(self.missing(name)),
        }
    }

    pub fn collection(&self, name: &str) -> Result<Collection> {
        match self.lookup(name)? {
            Child::NestedCollection(c) => Ok(c),
            _ => Err(self.missing(name)),
        }
    }

    pub fn method(&self, name: &str) -> Result<Method> {
        match self.lookup(name)? {
            Child::NestedMethod(m) => Ok(m),
            _ => Err(self.missing(name)),
        }
    }

    /// This resource as a nested value for another object's attributes.
    pub fn to_record(&self) -> Record {
        Record::new(self.meta.xml_name.clone(), self.attributes.clone())
    }

    /// Wire form: built from local attributes if any are set, else the
    /// snapshot, else an empty element.
    pub fn to_node(&self) -> DataNode {
        if !self.attributes.is_empty() {
            return marshal::serialize(&self.attributes, &self.meta.xml_name);
        }
        match &self.state {
            Some(state) => state.clone(),
            None => DataNode::new(self.meta.xml_name.as_str()),
        }
    }

    /// Fetch a fresh snapshot.
    pub fn get(&self, accept: Option<&str>, version: Option<u32>) -> Result<Resource> {
        let declared = match accept {
            Some(_) => None,
            None => self.meta.media_type_for(version)?,
        };
        let accept = accept_header(accept, declared, self.meta.retain_charset_in_accept);

        let href = self.href()?;
        let response = self
            .client
            .send(HttpRequest::get(&href).header_opt("Accept", accept))?;
        if response.status != 200 {
            return Err(Error::api(format!("GET {href} failed"), response));
        }
        Ok(self.with_state(xml::deserialize(&response.body)?))
    }

    /// Replace the server-side object.
    ///
    /// The body is [`RequestOptions::request_body`], else `replacement`'s
    /// wire form, else this resource's own. Requires 200 and returns the
    /// server's new state.
    pub fn put(
        &self,
        replacement: Option<&Resource>,
        options: &RequestOptions<'_>,
    ) -> Result<Resource> {
        let body = match (&options.request_body, replacement) {
            (Some(_), Some(_)) => {
                return Err(Error::Usage(
                    "supply either a replacement or a request body, not both".into(),
                ))
            }
            (Some(body), None) => body.clone(),
            (None, Some(r)) => r.to_node().to_xml(),
            (None, None) => self.to_node().to_xml(),
        };

        let declared = if options.content_type.is_some() && options.accept.is_some() {
            None
        } else {
            self.meta.media_type_for(options.version)?
        };
        let content_type = options.content_type.clone().or_else(|| declared.clone());
        let accept = accept_header(
            options.accept.as_deref(),
            declared,
            self.meta.retain_charset_in_accept,
        );

        let href = self.href()?;
        let response = self.client.send(
            HttpRequest::put(&href)
                .header_opt("Accept", accept)
                .header_opt("Content-Type", content_type)
                .body(body),
        )?;
        if response.status != 200 {
            return Err(Error::api(format!("PUT {href} failed"), response));
        }
        Ok(self.with_state(xml::deserialize(&response.body)?))
    }

    /// Delete the server-side object. Accepts 200, 202 and 204.
    ///
    /// Types declared with `use_uri_for_delete` are deleted at their `uri`,
    /// falling back to parent href plus id.
    pub fn delete(&self) -> Result<()> {
        let href = if self.meta.use_uri_for_delete {
            match self.location_attribute("uri") {
                Some(uri) => uri,
                None => match (&self.parent_href, self.id()) {
                    (Some(parent), Some(id)) => join(parent, &id),
                    _ => self.href()?,
                },
            }
        } else {
            self.href()?
        };

        let response = self.client.send(HttpRequest::delete(&href))?;
        match response.status {
            200 | 202 | 204 => Ok(()),
            _ => Err(Error::api(format!("DELETE {href} failed"), response)),
        }
    }

    /// POST directly to the resource, with a body rendered from the
    /// declared request template.
    pub fn post(
        &self,
        call: MethodCall,
        options: &RequestOptions<'_>,
    ) -> Result<Posted<MethodCall, DataNode>> {
        let body = match (&options.request_body, &self.meta.request_template) {
            (Some(_), _) if !call.params.is_empty() => {
                return Err(Error::Usage(
                    "supply either template parameters or a request body, not both".into(),
                ))
            }
            (Some(body), _) => Some(body.clone()),
            (None, Some(template)) => Some(template.render(&call.params)),
            (None, None) => None,
        };
        let content_type = match &options.content_type {
            Some(ct) => Some(ct.clone()),
            None => self.meta.request_type_for(options.version)?,
        };
        let accept = match &options.accept {
            Some(a) => Some(a.clone()),
            None => self.meta.response_type_for(options.version)?,
        };

        invoke(
            &self.client,
            call,
            Invocation {
                href: self.href()?,
                accept,
                content_type,
                body,
                keep_xml_escaping: false,
                options,
            },
        )
    }

    // --- helpers ---

    fn with_state(&self, state: DataNode) -> Resource {
        Resource {
            client: self.client.clone(),
            meta: Arc::clone(&self.meta),
            state: Some(state),
            attributes: Attributes::new(),
            parent_href: self.parent_href.clone(),
            id: self.id.clone(),
            children: ChildCache::default(),
        }
    }

    /// Scalar `name` from the snapshot, else from local attributes.
    fn wire_value(&self, name: &str) -> Option<String> {
        self.state
            .as_ref()
            .and_then(|s| s.value(name))
            .or_else(|| self.attributes.scalar(name))
            .map(str::to_string)
    }

    /// Location hints are XML attributes only, never child elements.
    fn location_attribute(&self, name: &str) -> Option<String> {
        match &self.state {
            Some(state) => state.attribute(name),
            None => self.attributes.scalar(name),
        }
        .map(str::to_string)
    }

    fn missing(&self, name: &str) -> Error {
        Error::NoSuchField {
            owner: self.meta.name.to_string(),
            name: name.to_string(),
        }
    }

    fn no_location(&self) -> Error {
        Error::Usage(format!(
            "cannot locate {}: no href, uri, key or id, and no declared service URL",
            self.meta.name
        ))
    }
}

impl Navigable for Resource {
    fn child_cache(&self) -> &ChildCache {
        &self.children
    }

    fn nested_collection(&self, name: &str) -> Result<Option<Collection>> {
        if !self.meta.collections.contains_key(name) {
            return Ok(None);
        }
        let meta = self.client.registry().collection(&self.meta.name.member(name))?;
        Ok(Some(Collection::new(self.client.clone(), meta, self.href()?)))
    }

    fn nested_method(&self, name: &str) -> Result<Option<Method>> {
        if !self.meta.methods.contains_key(name) {
            return Ok(None);
        }
        let meta = self.client.registry().method(&self.meta.name.member(name))?;
        Ok(Some(Method::new(self.client.clone(), meta, self.href()?)))
    }

    /// Exact name first (so bare attributes like `href` work), then the
    /// wire form, then local attributes.
    fn data_field(&self, name: &str) -> Option<FieldValue> {
        if let Some(state) = &self.state {
            if let Some(field) = state.get(name).or_else(|| state.get(&to_wire(name))) {
                return Some(field.to_owned_value());
            }
        }
        self.attributes
            .scalar(name)
            .map(|v| FieldValue::Text(v.to_string()))
    }
}

impl Describe for Resource {
    fn href(&self) -> Result<String> {
        Resource::href(self)
    }

    fn description(&self) -> Result<Description> {
        let href = Resource::href(self)?;
        Ok(Description {
            kind: "Resource",
            name: self.meta.name.to_string(),
            collections: self
                .meta
                .collections
                .iter()
                .map(|(k, seg)| (k.clone(), join(&href, seg)))
                .collect(),
            methods: self
                .meta
                .methods
                .iter()
                .map(|(k, seg)| (k.clone(), method_href(&href, seg)))
                .collect(),
            href,
        })
    }
}

// --- tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigator::fixtures;
    use crate::transport::{HttpMethod, HttpResponse};

    fn device(client: &Client, xml: &str, parent: Option<&str>) -> Resource {
        let meta = client
            .registry()
            .resource(&hyperwire_schema::QualifiedName::parse("device_management.device").unwrap())
            .unwrap();
        Resource::from_snapshot(
            client.clone(),
            meta,
            Some(xml::deserialize(xml).unwrap()),
            parent.map(str::to_string),
        )
    }

    #[test]
    fn href_precedence() {
        let (client, _) = fixtures::client();

        let r = device(&client, r#"<device href="/a/1" uri="/b/1" key="k"/>"#, Some("/p"));
        assert_eq!(r.href().unwrap(), "/a/1");

        let r = device(&client, r#"<device uri="/b/1" key="k"/>"#, Some("/p"));
        assert_eq!(r.href().unwrap(), "/b/1");

        // a uri naming the collection is not the item's location
        let r = device(&client, r#"<device uri="/x/devices" key="k"/>"#, Some("/p"));
        assert_eq!(r.href().unwrap(), "/p/k");

        let r = device(&client, "<device><id>7</id></device>", Some("/p"));
        assert_eq!(r.href().unwrap(), "/p/7");

        let r = device(&client, "<device><id>7</id></device>", None);
        assert_eq!(r.href().unwrap(), "/api/space/device-management/devices/7");
    }

    #[test]
    fn location_elements_are_not_hrefs() {
        let (client, _) = fixtures::client();
        let r = device(
            &client,
            "<device><href>/elsewhere/1</href><uri>/other/1</uri><id>7</id></device>",
            Some("/p"),
        );
        assert_eq!(r.href().unwrap(), "/p/7");
    }

    #[test]
    fn unlocatable_resource_is_an_error() {
        let (client, _) = fixtures::client();
        let meta = client
            .registry()
            .resource(&hyperwire_schema::QualifiedName::parse("device_management.configuration").unwrap())
            .unwrap();
        let r = Resource::from_snapshot(client, meta, None, None);
        assert!(matches!(r.href(), Err(Error::Usage(_))));
    }

    #[test]
    fn fields_translate_names() {
        let (client, _) = fixtures::client();
        let r = device(
            &client,
            r#"<device href="/d/1"><ip-address>10.0.0.1</ip-address><platform>MX</platform></device>"#,
            None,
        );
        assert_eq!(r.field("ip_address").unwrap().as_text(), Some("10.0.0.1"));
        assert_eq!(r.field("href").unwrap().as_text(), Some("/d/1"));
        assert!(matches!(
            r.field("serial_number"),
            Err(Error::NoSuchField { name, .. }) if name == "serial_number"
        ));
    }

    #[test]
    fn nested_collection_and_method_hang_off_href() {
        let (client, _) = fixtures::client();
        let r = device(&client, r#"<device href="/api/d/1"/>"#, None);

        let configs = r.collection("configurations").unwrap();
        assert_eq!(configs.href(), "/api/d/1/configurations");

        let rpc = r.method("exec_rpc").unwrap();
        assert_eq!(rpc.href(), "/api/d/1/exec-rpc");

        let d = r.description().unwrap();
        assert_eq!(d.collections, vec![("configurations".to_string(), "/api/d/1/configurations".to_string())]);
    }

    #[test]
    fn structural_children_win_over_fields() {
        let (client, _) = fixtures::client();
        let r = device(
            &client,
            r#"<device href="/api/d/1"><configurations>3</configurations></device>"#,
            None,
        );
        assert!(matches!(
            r.lookup("configurations").unwrap(),
            Child::NestedCollection(_)
        ));
    }

    #[test]
    fn get_returns_fresh_snapshot() {
        let (client, mock) = fixtures::client();
        let r = device(&client, r#"<device href="/api/d/1"><name>old</name></device>"#, None);

        mock.push(HttpResponse::new(200).with_body(r#"<device href="/api/d/1"><name>new</name></device>"#));
        let fresh = r.get(None, Some(2)).unwrap();
        assert_eq!(fresh.field("name").unwrap().as_text(), Some("new"));
        assert_eq!(r.field("name").unwrap().as_text(), Some("old"));

        let request = mock.last_request();
        assert_eq!(request.url, "/api/d/1");
        assert_eq!(
            request.header_value("accept"),
            Some("application/vnd.device+xml;version=2")
        );
    }

    #[test]
    fn get_without_version_on_versioned_type_is_ambiguous() {
        let (client, mock) = fixtures::client();
        let r = device(&client, r#"<device href="/api/d/1"/>"#, None);
        assert!(matches!(r.get(None, None), Err(Error::AmbiguousVersion { .. })));
        assert!(mock.requests().is_empty());
    }

    #[test]
    fn put_sends_local_state() {
        let (client, mock) = fixtures::client();
        let mut r = device(&client, r#"<device href="/api/d/1"><name>a</name></device>"#, None);
        r.attributes_mut().insert("name", "b");

        mock.push(HttpResponse::new(200).with_body(r#"<device href="/api/d/1"><name>b</name></device>"#));
        let updated = r.put(None, &RequestOptions::new().version(1)).unwrap();
        assert_eq!(updated.field("name").unwrap().as_text(), Some("b"));

        let request = mock.last_request();
        assert_eq!(request.method, HttpMethod::Put);
        assert_eq!(request.body.as_deref(), Some("<device><name>b</name></device>"));

        mock.push(HttpResponse::new(204));
        assert!(matches!(
            r.put(None, &RequestOptions::new().version(1)),
            Err(Error::Api { .. })
        ));
    }

    #[test]
    fn delete_accepts_success_statuses() {
        let (client, mock) = fixtures::client();
        let r = device(&client, r#"<device href="/api/d/1"/>"#, None);
        for status in [200, 202, 204] {
            mock.push(HttpResponse::new(status));
            r.delete().unwrap();
        }
        mock.push(HttpResponse::new(404));
        assert!(matches!(r.delete(), Err(Error::Api { .. })));
        assert_eq!(mock.last_request().method, HttpMethod::Delete);
    }

    #[test]
    fn delete_by_uri_when_declared() {
        let (client, mock) = fixtures::client();
        let meta = client
            .registry()
            .resource(&hyperwire_schema::QualifiedName::parse("device_management.script").unwrap())
            .unwrap();
        let r = Resource::from_snapshot(
            client,
            meta,
            Some(xml::deserialize(r#"<script href="/api/s/9" uri="/api/scripts/9"/>"#).unwrap()),
            None,
        );
        mock.push(HttpResponse::new(204));
        r.delete().unwrap();
        assert_eq!(mock.last_request().url, "/api/scripts/9");
    }

    #[test]
    fn post_renders_template_and_cleans_reply() {
        let (client, mock) = fixtures::client();
        let meta = client
            .registry()
            .resource(&hyperwire_schema::QualifiedName::parse("device_management.script").unwrap())
            .unwrap();
        let r = Resource::from_snapshot(
            client,
            meta,
            Some(xml::deserialize(r#"<script href="/api/s/9"/>"#).unwrap()),
            None,
        );

        mock.push(HttpResponse::new(200).with_body("<reply>&lt;done/&gt;</reply>"));
        let reply = r
            .post(MethodCall::new().param("name", "check"), &RequestOptions::new())
            .unwrap()
            .returned()
            .unwrap();
        assert!(reply.child("done").is_some());

        let request = mock.last_request();
        assert_eq!(request.body.as_deref(), Some("<exec><name>check</name></exec>"));
        assert_eq!(request.header_value("content-type"), Some("application/vnd.exec+xml"));
        assert_eq!(request.header_value("accept"), Some("application/vnd.exec-reply+xml"));
    }

    #[test]
    fn to_record_nests_in_other_objects() {
        let (client, _) = fixtures::client();
        let r = client
            .new_resource("device_management.device", Attributes::new().with("name", "x"))
            .unwrap();
        let node = marshal::serialize(&Attributes::new().with("target", r.to_record()), "job");
        assert_eq!(node.to_xml(), "<job><device><name>x</name></device></job>");
    }
}
