//! Declaration types: the raw, as-written description of each schema element.
//!
//! Every map is an [`IndexMap`] so describe output and serialization follow
//! declaration order.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::media::MediaTypeDecl;

/// One declared element, as returned by [`crate::SchemaSource::resolve`].
#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    Application(ApplicationDecl),
    Service(ServiceDecl),
    Collection(CollectionDecl),
    Resource(ResourceDecl),
    Method(MethodDecl),
}

/// A named grouping of services under one URL prefix.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationDecl {
    pub url: String,

    #[serde(default)]
    pub services: IndexMap<String, ServiceDecl>,
}

/// A top-level REST service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceDecl {
    /// Absolute path (or URL) of the service root.
    pub url: String,

    #[serde(default)]
    pub collections: IndexMap<String, CollectionDecl>,

    #[serde(default)]
    pub methods: IndexMap<String, MethodDecl>,

    #[serde(default)]
    pub resources: IndexMap<String, ResourceDecl>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionDecl {
    /// Wire path segment. Defaults to the wire form of the declaration key.
    #[serde(default)]
    pub name: Option<String>,

    /// Element name wrapping a posted list, and of the list document root.
    #[serde(default)]
    pub xml_name: Option<String>,

    /// Absolute href, overriding `parent href + "/" + name`.
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub media_type: Option<MediaTypeDecl>,

    /// Content type used when posting several members at once.
    #[serde(default)]
    pub content_type: Option<MediaTypeDecl>,

    #[serde(default)]
    pub retain_charset_in_accept: bool,

    /// The response document root is itself the one member.
    #[serde(default)]
    pub single_object_collection: bool,

    /// Qualified name of the member resource type, e.g. `svc.device`.
    #[serde(default)]
    pub resource_type: Option<String>,

    /// Fixed members, keyed by the member id.
    #[serde(default)]
    pub named_members: IndexMap<String, NamedMemberDecl>,

    #[serde(default)]
    pub methods: IndexMap<String, MethodDecl>,
}

/// A fixed, named member of a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedMemberDecl {
    pub resource_type: String,
    pub xml_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceDecl {
    /// XML element name of the resource's wire form.
    pub xml_name: String,

    #[serde(default)]
    pub media_type: Option<MediaTypeDecl>,

    #[serde(default)]
    pub retain_charset_in_accept: bool,

    /// Path segment of the collection this resource lives in. Used to
    /// derive an href when the snapshot carries none.
    #[serde(default)]
    pub collection_name: Option<String>,

    #[serde(default)]
    pub service_url: Option<String>,

    /// Delete via the snapshot's `uri` instead of its href.
    #[serde(default)]
    pub use_uri_for_delete: bool,

    #[serde(default)]
    pub request_type: Option<MediaTypeDecl>,

    #[serde(default)]
    pub response_type: Option<MediaTypeDecl>,

    /// Body template for a direct POST on the resource.
    #[serde(default)]
    pub request_template: Option<String>,

    #[serde(default)]
    pub collections: IndexMap<String, CollectionDecl>,

    #[serde(default)]
    pub methods: IndexMap<String, MethodDecl>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MethodDecl {
    /// Wire path segment; `-` means the method lives at the parent's href.
    pub name: String,

    #[serde(default)]
    pub request_type: Option<MediaTypeDecl>,

    #[serde(default)]
    pub response_type: Option<MediaTypeDecl>,

    /// Accept type for a plain GET of the method URL.
    #[serde(default)]
    pub media_type: Option<MediaTypeDecl>,

    #[serde(default)]
    pub retain_charset_in_accept: bool,

    /// Leave `&lt;` `&gt;` `&quot;` in response bodies as written.
    #[serde(default)]
    pub keep_xml_escaping: bool,

    /// Body template, with `{{ name }}` placeholders.
    #[serde(default)]
    pub request_template: Option<String>,
}
