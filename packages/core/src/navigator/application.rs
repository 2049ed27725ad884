use std::sync::Arc;

use hyperwire_schema::QualifiedName;

use crate::client::Client;
use crate::error::Result;
use crate::navigator::{Describe, Description, Service};
use crate::registry::MetaApplication;

/// A named group of services under one URL prefix.
#[derive(Debug, Clone)]
pub struct Application {
    client: Client,
    meta: Arc<MetaApplication>,
}

impl Application {
    pub(crate) fn new(client: Client, meta: Arc<MetaApplication>) -> Self {
        Self { client, meta }
    }

    pub fn meta(&self) -> &MetaApplication {
        &self.meta
    }

    pub fn href(&self) -> &str {
        &self.meta.url
    }

    pub fn service(&self, name: &str) -> Result<Service> {
        let app = self.meta.name.app_name();
        let meta = self
            .client
            .registry()
            .service(&QualifiedName::service(app, name))?;
        Ok(Service::new(self.client.clone(), meta))
    }
}

impl Describe for Application {
    fn href(&self) -> Result<String> {
        Ok(self.meta.url.clone())
    }

    /// Services are listed in place of collections.
    fn description(&self) -> Result<Description> {
        let collections = self
            .meta
            .services
            .iter()
            .map(|s| {
                let href = self.service(s)?.href().to_string();
                Ok((s.clone(), href))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Description {
            kind: "Application",
            name: self.meta.name.to_string(),
            href: self.meta.url.clone(),
            collections,
            methods: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use hyperwire_schema::SchemaDocument;

    use crate::client::Client;
    use crate::navigator::Describe;
    use crate::transport::mock::MockTransport;

    const DOC: &str = r#"
applications:
  servicenow:
    url: /api/juniper/servicenow
    services:
      device_management:
        url: /api/juniper/servicenow/device-management
        collections:
          devices: {}
"#;

    #[test]
    fn services_are_scoped_to_the_application() {
        let client = Client::new(
            SchemaDocument::from_yaml_str(DOC).unwrap(),
            Arc::new(MockTransport::new()),
        );
        let app = client.application("servicenow").unwrap();
        assert_eq!(app.href(), "/api/juniper/servicenow");

        let svc = app.service("device_management").unwrap();
        assert_eq!(
            svc.collection("devices").unwrap().href(),
            "/api/juniper/servicenow/device-management/devices"
        );
        assert!(client.service("device_management").is_err());

        let d = app.description().unwrap();
        assert_eq!(d.collections.len(), 1);
    }
}
