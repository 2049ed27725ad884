//! Declarative schema types for the hyperwire client.
//!
//! A schema describes the shape of a hypermedia REST API: which services it
//! exposes, which collections and methods hang off each service, which
//! resource types those collections contain, and which media types each
//! element speaks. The `hyperwire` crate never hard-codes any of this. It
//! asks a [`SchemaSource`] for a [`Declaration`] the first time a name is
//! needed and caches the parsed result.
//!
//! # Crate layout
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`decl`] | Declaration types: [`ServiceDecl`], [`CollectionDecl`], [`ResourceDecl`], [`MethodDecl`], [`ApplicationDecl`] |
//! | [`media`] | [`MediaTypeDecl`]: a single media type or a version-keyed table |
//! | [`name`] | [`QualifiedName`] and [`MetaKind`], the registry key |
//! | [`source`] | The [`SchemaSource`] trait and the in-memory [`SchemaDocument`] |
//! | [`error`] | [`SchemaError`] |
//!
//! # Document shape
//!
//! ```yaml
//! services:
//!   device_management:
//!     url: /api/space/device-management
//!     collections:
//!       devices:
//!         resource_type: device_management.device
//!         media_type: application/vnd.net.juniper.space.device-management.devices+xml;version=2
//!     resources:
//!       device:
//!         xml_name: device
//!         media_type:
//!           1: application/vnd.net.juniper.space.device-management.device+xml;version=1
//!           2: application/vnd.net.juniper.space.device-management.device+xml;version=2
//! applications:
//!   servicenow:
//!     url: /api/juniper/servicenow
//!     services: {}
//! ```

pub mod decl;
pub mod error;
pub mod media;
pub mod name;
pub mod source;

pub use decl::{
    ApplicationDecl, CollectionDecl, Declaration, MethodDecl, NamedMemberDecl, ResourceDecl,
    ServiceDecl,
};
pub use error::SchemaError;
pub use media::{MediaTypeDecl, MediaVersion};
pub use name::{MetaKind, QualifiedName};
pub use source::{SchemaDocument, SchemaSource};
