//! The meta-object registry.
//!
//! Meta-objects are the parsed, immutable form of schema declarations.
//! The [`Registry`] builds each one the first time it is asked for and then
//! hands out the same [`Arc`] for the life of the registry, so any number
//! of navigator nodes can share one description of their type.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use hyperwire_schema::{
    CollectionDecl, Declaration, MediaTypeDecl, MetaKind, MethodDecl, QualifiedName,
    ResourceDecl, SchemaSource,
};
use indexmap::IndexMap;
use tracing::debug;

use crate::error::{Error, Result};
use crate::media;
use crate::names::to_wire;
use crate::template::Template;

#[derive(Debug, Clone, PartialEq)]
pub struct MetaApplication {
    pub name: QualifiedName,
    pub url: String,
    /// Service keys, in declaration order.
    pub services: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetaService {
    pub name: QualifiedName,
    pub url: String,
    /// Collection key → wire path segment.
    pub collections: IndexMap<String, String>,
    /// Method key → wire path segment.
    pub methods: IndexMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NamedMember {
    pub resource_type: QualifiedName,
    pub xml_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetaCollection {
    pub name: QualifiedName,
    /// Appended to the parent's href.
    pub path_segment: String,
    pub xml_name: Option<String>,
    /// Absolute href that replaces the derived one.
    pub url: Option<String>,
    pub media_type: Option<MediaTypeDecl>,
    pub content_type: Option<MediaTypeDecl>,
    pub retain_charset_in_accept: bool,
    pub single_object_collection: bool,
    pub resource_type: Option<QualifiedName>,
    pub named_members: IndexMap<String, NamedMember>,
    pub methods: IndexMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetaResource {
    pub name: QualifiedName,
    pub xml_name: String,
    pub media_type: Option<MediaTypeDecl>,
    pub retain_charset_in_accept: bool,
    pub collection_name: Option<String>,
    pub service_url: Option<String>,
    pub use_uri_for_delete: bool,
    pub request_type: Option<MediaTypeDecl>,
    pub response_type: Option<MediaTypeDecl>,
    pub request_template: Option<Template>,
    pub collections: IndexMap<String, String>,
    pub methods: IndexMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetaMethod {
    pub name: QualifiedName,
    /// Wire path segment; `-` means the parent's href itself.
    pub path_segment: String,
    pub request_type: Option<MediaTypeDecl>,
    pub response_type: Option<MediaTypeDecl>,
    pub media_type: Option<MediaTypeDecl>,
    pub retain_charset_in_accept: bool,
    pub keep_xml_escaping: bool,
    pub request_template: Option<Template>,
}

/// A parsed meta-object of any kind.
#[derive(Debug, Clone)]
pub enum MetaObject {
    Application(Arc<MetaApplication>),
    Service(Arc<MetaService>),
    Collection(Arc<MetaCollection>),
    Resource(Arc<MetaResource>),
    Method(Arc<MetaMethod>),
}

impl MetaCollection {
    pub fn media_type_for(&self, version: Option<u32>) -> Result<Option<String>> {
        media::select(self.media_type.as_ref(), version, &self.name.to_string())
    }

    /// Content type for posting several members: the declared list content
    /// type, else the collection's own media type.
    pub fn list_content_type(&self, version: Option<u32>) -> Result<Option<String>> {
        match &self.content_type {
            Some(decl) => media::select(Some(decl), version, &self.name.to_string()),
            None => self.media_type_for(version),
        }
    }
}

impl MetaResource {
    /// Placeholder type for members of a collection that declares none.
    pub(crate) fn anonymous(collection: &QualifiedName, xml_name: &str) -> Self {
        Self {
            name: collection.member(xml_name),
            xml_name: xml_name.to_string(),
            media_type: None,
            retain_charset_in_accept: false,
            collection_name: None,
            service_url: None,
            use_uri_for_delete: false,
            request_type: None,
            response_type: None,
            request_template: None,
            collections: IndexMap::new(),
            methods: IndexMap::new(),
        }
    }

    pub fn media_type_for(&self, version: Option<u32>) -> Result<Option<String>> {
        media::select(self.media_type.as_ref(), version, &self.name.to_string())
    }

    pub fn request_type_for(&self, version: Option<u32>) -> Result<Option<String>> {
        media::select(self.request_type.as_ref(), version, &self.name.to_string())
    }

    pub fn response_type_for(&self, version: Option<u32>) -> Result<Option<String>> {
        media::select(self.response_type.as_ref(), version, &self.name.to_string())
    }
}

impl MetaMethod {
    pub fn media_type_for(&self, version: Option<u32>) -> Result<Option<String>> {
        media::select(self.media_type.as_ref(), version, &self.name.to_string())
    }

    pub fn request_type_for(&self, version: Option<u32>) -> Result<Option<String>> {
        media::select(self.request_type.as_ref(), version, &self.name.to_string())
    }

    pub fn response_type_for(&self, version: Option<u32>) -> Result<Option<String>> {
        media::select(self.response_type.as_ref(), version, &self.name.to_string())
    }
}

/// Lazily-populated cache of meta-objects, backed by a [`SchemaSource`].
pub struct Registry {
    source: Box<dyn SchemaSource>,
    cache: RwLock<HashMap<(MetaKind, QualifiedName), MetaObject>>,
}

impl Registry {
    pub fn new(source: impl SchemaSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// The meta-object for `(kind, name)`, parsing it on first use.
    ///
    /// Concurrent first lookups may both parse; the first to store wins and
    /// every caller receives that one.
    pub fn resolve(&self, kind: MetaKind, name: &QualifiedName) -> Result<MetaObject> {
        let key = (kind, name.clone());
        if let Some(found) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(found.clone());
        }

        let decl = self
            .source
            .resolve(kind, name)
            .ok_or_else(|| unknown(kind, name))?;
        let parsed = parse(name, decl)?;
        debug!("registry: parsed {kind} {name}");

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        Ok(cache.entry(key).or_insert(parsed).clone())
    }

    pub fn application(&self, name: &QualifiedName) -> Result<Arc<MetaApplication>> {
        match self.resolve(MetaKind::Application, name)? {
            MetaObject::Application(m) => Ok(m),
            _ => Err(unknown(MetaKind::Application, name)),
        }
    }

    pub fn service(&self, name: &QualifiedName) -> Result<Arc<MetaService>> {
        match self.resolve(MetaKind::Service, name)? {
            MetaObject::Service(m) => Ok(m),
            _ => Err(unknown(MetaKind::Service, name)),
        }
    }

    pub fn collection(&self, name: &QualifiedName) -> Result<Arc<MetaCollection>> {
        match self.resolve(MetaKind::Collection, name)? {
            MetaObject::Collection(m) => Ok(m),
            _ => Err(unknown(MetaKind::Collection, name)),
        }
    }

    pub fn resource(&self, name: &QualifiedName) -> Result<Arc<MetaResource>> {
        match self.resolve(MetaKind::Resource, name)? {
            MetaObject::Resource(m) => Ok(m),
            _ => Err(unknown(MetaKind::Resource, name)),
        }
    }

    pub fn method(&self, name: &QualifiedName) -> Result<Arc<MetaMethod>> {
        match self.resolve(MetaKind::Method, name)? {
            MetaObject::Method(m) => Ok(m),
            _ => Err(unknown(MetaKind::Method, name)),
        }
    }

    /// Number of meta-objects parsed so far.
    pub fn len(&self) -> usize {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// --- helpers -----------------------------------------------------------------

fn unknown(kind: MetaKind, name: &QualifiedName) -> Error {
    Error::UnknownSchemaReference {
        kind,
        name: name.to_string(),
    }
}

fn parse(name: &QualifiedName, decl: Declaration) -> Result<MetaObject> {
    Ok(match decl {
        Declaration::Application(d) => MetaObject::Application(Arc::new(MetaApplication {
            name: name.clone(),
            url: d.url,
            services: d.services.keys().cloned().collect(),
        })),
        Declaration::Service(d) => MetaObject::Service(Arc::new(MetaService {
            name: name.clone(),
            url: d.url,
            collections: collection_segments(&d.collections),
            methods: method_segments(&d.methods),
        })),
        Declaration::Collection(d) => MetaObject::Collection(Arc::new(parse_collection(name, d)?)),
        Declaration::Resource(d) => MetaObject::Resource(Arc::new(parse_resource(name, d))),
        Declaration::Method(d) => MetaObject::Method(Arc::new(parse_method(name, d))),
    })
}

fn parse_collection(name: &QualifiedName, d: CollectionDecl) -> Result<MetaCollection> {
    let resource_type = d
        .resource_type
        .as_deref()
        .map(QualifiedName::parse)
        .transpose()?;

    let mut named_members = IndexMap::new();
    for (key, member) in d.named_members {
        named_members.insert(
            key,
            NamedMember {
                resource_type: QualifiedName::parse(&member.resource_type)?,
                xml_name: member.xml_name,
            },
        );
    }

    Ok(MetaCollection {
        name: name.clone(),
        path_segment: d.name.unwrap_or_else(|| to_wire(name.leaf())),
        xml_name: d.xml_name,
        url: d.url,
        media_type: d.media_type,
        content_type: d.content_type,
        retain_charset_in_accept: d.retain_charset_in_accept,
        single_object_collection: d.single_object_collection,
        resource_type,
        named_members,
        methods: method_segments(&d.methods),
    })
}

fn parse_resource(name: &QualifiedName, d: ResourceDecl) -> MetaResource {
    MetaResource {
        name: name.clone(),
        xml_name: d.xml_name,
        media_type: d.media_type,
        retain_charset_in_accept: d.retain_charset_in_accept,
        collection_name: d.collection_name,
        service_url: d.service_url,
        use_uri_for_delete: d.use_uri_for_delete,
        request_type: d.request_type,
        response_type: d.response_type,
        request_template: d.request_template.map(Template::parse),
        collections: collection_segments(&d.collections),
        methods: method_segments(&d.methods),
    }
}

fn parse_method(name: &QualifiedName, d: MethodDecl) -> MetaMethod {
    MetaMethod {
        name: name.clone(),
        path_segment: d.name,
        request_type: d.request_type,
        response_type: d.response_type,
        media_type: d.media_type,
        retain_charset_in_accept: d.retain_charset_in_accept,
        keep_xml_escaping: d.keep_xml_escaping,
        request_template: d.request_template.map(Template::parse),
    }
}

fn collection_segments(decls: &IndexMap<String, CollectionDecl>) -> IndexMap<String, String> {
    decls
        .iter()
        .map(|(key, d)| (key.clone(), d.name.clone().unwrap_or_else(|| to_wire(key))))
        .collect()
}

fn method_segments(decls: &IndexMap<String, MethodDecl>) -> IndexMap<String, String> {
    decls
        .iter()
        .map(|(key, d)| (key.clone(), d.name.clone()))
        .collect()
}

// --- tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use hyperwire_schema::SchemaDocument;

    use super::*;

    const DOC: &str = r#"
services:
  svc:
    url: /api/svc
    collections:
      devices:
        resource_type: svc.device
        named_members:
          summary: { resource_type: svc.device, xml_name: summary }
    methods:
      discover_devices: { name: discover-devices }
    resources:
      device:
        xml_name: device
        request_template: "<rpc>{{ cmd }}</rpc>"
        media_type:
          1: T1
          2: T2
        collections:
          config_files: {}
      broken:
        xml_name: broken
    "#;

    /// Counts how often the registry reaches the source.
    struct CountingSource {
        inner: SchemaDocument,
        calls: Arc<AtomicUsize>,
    }

    impl SchemaSource for CountingSource {
        fn resolve(&self, kind: MetaKind, name: &QualifiedName) -> Option<Declaration> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.resolve(kind, name)
        }
    }

    fn registry() -> (Registry, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = CountingSource {
            inner: SchemaDocument::from_yaml_str(DOC).unwrap(),
            calls: Arc::clone(&calls),
        };
        (Registry::new(source), calls)
    }

    fn name(s: &str) -> QualifiedName {
        QualifiedName::parse(s).unwrap()
    }

    #[test]
    fn same_name_resolves_to_same_object() {
        let (reg, calls) = registry();
        let a = reg.resource(&name("svc.device")).unwrap();
        let b = reg.resource(&name("svc.device")).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn unknown_name_is_reported() {
        let (reg, _) = registry();
        match reg.collection(&name("svc.nope")) {
            Err(Error::UnknownSchemaReference { kind, name }) => {
                assert_eq!(kind, MetaKind::Collection);
                assert_eq!(name, "svc.nope");
            }
            other => panic!("expected UnknownSchemaReference, got {other:?}"),
        }
        assert!(reg.is_empty());
    }

    #[test]
    fn collection_parsed_with_defaults() {
        let (reg, _) = registry();
        let c = reg.collection(&name("svc.devices")).unwrap();
        assert_eq!(c.path_segment, "devices");
        assert_eq!(c.resource_type, Some(name("svc.device")));
        assert_eq!(c.named_members["summary"].xml_name, "summary");

        let nested = reg.collection(&name("svc.device:config_files")).unwrap();
        assert_eq!(nested.path_segment, "config-files");
    }

    #[test]
    fn resource_parsed_with_template_and_children() {
        let (reg, _) = registry();
        let r = reg.resource(&name("svc.device")).unwrap();
        let template = r.request_template.as_ref().unwrap();
        assert_eq!(template.placeholders(), &["cmd".to_string()]);
        assert_eq!(r.collections["config_files"], "config-files");
        assert_eq!(r.media_type_for(Some(2)).unwrap().as_deref(), Some("T2"));
        assert!(matches!(r.media_type_for(None), Err(Error::AmbiguousVersion { .. })));
    }

    #[test]
    fn service_lists_children_with_wire_segments() {
        let (reg, _) = registry();
        let s = reg.service(&name("svc")).unwrap();
        assert_eq!(s.url, "/api/svc");
        assert_eq!(s.methods["discover_devices"], "discover-devices");
        assert!(s.collections.contains_key("devices"));
    }
}
