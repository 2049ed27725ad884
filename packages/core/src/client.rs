//! The top-level handle: a registry plus a transport.

use std::fmt;
use std::sync::Arc;

use hyperwire_schema::{QualifiedName, SchemaSource};

use crate::config::TransportConfig;
use crate::error::Result;
use crate::marshal::Attributes;
use crate::navigator::{Application, Resource, Service};
use crate::registry::Registry;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, Transport};

/// Entry point for navigating an API.
///
/// Cheap to clone; every navigator node holds one, and all clones share
/// the same registry and transport.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

struct Inner {
    registry: Registry,
    transport: Arc<dyn Transport>,
}

impl Client {
    pub fn new(source: impl SchemaSource + 'static, transport: Arc<dyn Transport>) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry: Registry::new(source),
                transport,
            }),
        }
    }

    /// A client over HTTP, configured by `config`.
    pub fn connect(source: impl SchemaSource + 'static, config: TransportConfig) -> Result<Self> {
        let transport = HttpTransport::new(config)?;
        Ok(Self::new(source, Arc::new(transport)))
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    /// A top-level service, by its declaration key.
    pub fn service(&self, name: &str) -> Result<Service> {
        let meta = self.registry().service(&QualifiedName::service(None, name))?;
        Ok(Service::new(self.clone(), meta))
    }

    pub fn application(&self, name: &str) -> Result<Application> {
        let meta = self.registry().application(&QualifiedName::application(name))?;
        Ok(Application::new(self.clone(), meta))
    }

    /// A new, unsaved resource of `type_name` (e.g. `svc.device`), built
    /// from local attributes. Post it to a collection to create it.
    pub fn new_resource(&self, type_name: &str, attributes: Attributes) -> Result<Resource> {
        let meta = self.registry().resource(&QualifiedName::parse(type_name)?)?;
        Ok(Resource::local(self.clone(), meta, attributes))
    }

    pub(crate) fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.inner.transport.send(&request)
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("meta_objects", &self.registry().len())
            .finish_non_exhaustive()
    }
}
