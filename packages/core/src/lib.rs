//! Schema-driven client for hypermedia REST management APIs.
//!
//! The API surface is not hard-coded. A schema document (see
//! `hyperwire-schema`) declares the services, collections, resources and
//! methods a server exposes; this crate turns those declarations into
//! navigable objects that issue the right HTTP requests with the right
//! media types, and marshal XML bodies to and from a generic tree.
//!
//! # Crate layout
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`client`] | [`Client`]: the entry point, holding a registry and a transport |
//! | [`registry`] | Lazily built, cached meta-objects for every schema declaration |
//! | [`navigator`] | Runtime nodes: [`Service`], [`Collection`], [`Resource`], [`Method`] |
//! | [`task`] | [`TaskMonitor`]: message-queue tracking of asynchronous jobs |
//! | [`xml`] | [`DataNode`] wire trees and their XML codec |
//! | [`marshal`] | Local [`Attributes`] to wire trees |
//! | [`media`] | Media-type version selection and Accept shaping |
//! | [`names`] | Local `snake_case` to wire `kebab-case` names |
//! | [`template`] | `{{ name }}` request body templates |
//! | [`transport`] | The HTTP boundary and its `reqwest` implementation |
//! | [`config`] | Transport and task monitor settings |
//! | [`render`] | Plain-text rendering for terminals |
//!
//! # Quick start
//!
//! ```rust,ignore
//! use hyperwire::{Client, Query, TransportConfig};
//! use hyperwire_schema::SchemaDocument;
//!
//! let schema = SchemaDocument::from_path("space.yaml")?;
//! let client = Client::connect(
//!     schema,
//!     TransportConfig::new("https://space.example.net").basic_auth("super", "secret"),
//! )?;
//!
//! let devices = client.service("device_management")?.collection("devices")?;
//! for device in devices.get(&Query::new().filter_eq("platform", "MX480").version(2))? {
//!     println!("{}", device.field("name")?.as_text().unwrap_or("-"));
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod marshal;
pub mod media;
pub mod names;
pub mod navigator;
pub mod registry;
pub mod render;
pub mod task;
pub mod template;
pub mod transport;
pub mod xml;

pub use client::Client;
pub use config::{Credentials, MonitorConfig, TransportConfig};
pub use error::{Error, Result};
pub use marshal::{Attributes, Record, Value};
pub use navigator::{
    Application, Child, Collection, Describe, Description, Method, MethodCall, NewMembers,
    Posted, Query, RequestOptions, Resource, Service,
};
pub use task::{MonitorState, ProgressUpdate, TaskMonitor, TaskRef};
pub use transport::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, Transport};
pub use xml::{DataNode, FieldValue};
