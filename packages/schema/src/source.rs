//! Where declarations come from.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::decl::{ApplicationDecl, Declaration, ServiceDecl};
use crate::error::SchemaError;
use crate::name::{MetaKind, QualifiedName};

/// A lookup of declarations by kind and qualified name.
///
/// Implementations must be cheap to call repeatedly; the registry in
/// `hyperwire` caches parsed results, but may call `resolve` again for
/// names it has not seen.
pub trait SchemaSource: Send + Sync {
    /// The declaration for `name`, or `None` if nothing of that kind is
    /// declared under that name.
    fn resolve(&self, kind: MetaKind, name: &QualifiedName) -> Option<Declaration>;
}

/// A complete schema held in memory, loaded from YAML or JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaDocument {
    #[serde(default)]
    pub services: IndexMap<String, ServiceDecl>,

    #[serde(default)]
    pub applications: IndexMap<String, ApplicationDecl>,
}

impl SchemaDocument {
    pub fn from_yaml_str(s: &str) -> Result<Self, SchemaError> {
        Ok(serde_yaml::from_str(s)?)
    }

    pub fn from_json_str(s: &str) -> Result<Self, SchemaError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Load a document from disk. Files ending in `.json` are parsed as
    /// JSON; everything else as YAML.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SchemaError::Io {
            path: path.display().to_string(),
            source,
        })?;
        if path.extension().is_some_and(|ext| ext == "json") {
            Self::from_json_str(&text)
        } else {
            Self::from_yaml_str(&text)
        }
    }

    fn services_in(&self, app: Option<&str>) -> Option<&IndexMap<String, ServiceDecl>> {
        match app {
            None => Some(&self.services),
            Some(app) => self.applications.get(app).map(|a| &a.services),
        }
    }
}

impl SchemaSource for SchemaDocument {
    fn resolve(&self, kind: MetaKind, name: &QualifiedName) -> Option<Declaration> {
        if kind == MetaKind::Application {
            if name.service_name().is_some() {
                return None;
            }
            return self
                .applications
                .get(name.app_name()?)
                .cloned()
                .map(Declaration::Application);
        }

        let service = self
            .services_in(name.app_name())?
            .get(name.service_name()?)?;

        match (kind, name.item_name(), name.member_name()) {
            (MetaKind::Service, None, None) => Some(Declaration::Service(service.clone())),
            (MetaKind::Collection, Some(item), None) => service
                .collections
                .get(item)
                .cloned()
                .map(Declaration::Collection),
            (MetaKind::Collection, Some(item), Some(member)) => service
                .resources
                .get(item)?
                .collections
                .get(member)
                .cloned()
                .map(Declaration::Collection),
            (MetaKind::Resource, Some(item), None) => service
                .resources
                .get(item)
                .cloned()
                .map(Declaration::Resource),
            (MetaKind::Method, Some(item), None) => service
                .methods
                .get(item)
                .cloned()
                .map(Declaration::Method),
            (MetaKind::Method, Some(item), Some(member)) => service
                .resources
                .get(item)
                .and_then(|r| r.methods.get(member))
                .or_else(|| service.collections.get(item)?.methods.get(member))
                .cloned()
                .map(Declaration::Method),
            _ => None,
        }
    }
}

// --- tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaTypeDecl;

    const DOC: &str = r#"
services:
  device_management:
    url: /api/space/device-management
    collections:
      devices:
        resource_type: device_management.device
        media_type: application/vnd.devices+xml;version=2
        methods:
          export:
            name: export-devices
    methods:
      discover_devices:
        name: discover-devices
        request_type: application/vnd.discover+xml
    resources:
      device:
        xml_name: device
        media_type:
          1: application/vnd.device+xml;version=1
          2: application/vnd.device+xml;version=2
        collections:
          configurations:
            resource_type: device_management.configuration
        methods:
          exec_rpc:
            name: exec-rpc
applications:
  sn:
    url: /api/juniper/servicenow
    services:
      device_management:
        url: /api/juniper/servicenow/device-management
"#;

    fn doc() -> SchemaDocument {
        SchemaDocument::from_yaml_str(DOC).unwrap()
    }

    fn name(s: &str) -> QualifiedName {
        QualifiedName::parse(s).unwrap()
    }

    #[test]
    fn resolves_service() {
        match doc().resolve(MetaKind::Service, &name("device_management")) {
            Some(Declaration::Service(s)) => assert_eq!(s.url, "/api/space/device-management"),
            other => panic!("expected service, got {other:?}"),
        }
    }

    #[test]
    fn kinds_are_separate_namespaces() {
        let d = doc();
        assert!(d.resolve(MetaKind::Collection, &name("device_management.devices")).is_some());
        assert!(d.resolve(MetaKind::Method, &name("device_management.devices")).is_none());
        assert!(d.resolve(MetaKind::Method, &name("device_management.discover_devices")).is_some());
    }

    #[test]
    fn resolves_nested_members() {
        let d = doc();
        assert!(matches!(
            d.resolve(MetaKind::Collection, &name("device_management.device:configurations")),
            Some(Declaration::Collection(_))
        ));
        match d.resolve(MetaKind::Method, &name("device_management.device:exec_rpc")) {
            Some(Declaration::Method(m)) => assert_eq!(m.name, "exec-rpc"),
            other => panic!("expected method, got {other:?}"),
        }
        match d.resolve(MetaKind::Method, &name("device_management.devices:export")) {
            Some(Declaration::Method(m)) => assert_eq!(m.name, "export-devices"),
            other => panic!("expected collection method, got {other:?}"),
        }
    }

    #[test]
    fn versioned_media_type_loaded() {
        match doc().resolve(MetaKind::Resource, &name("device_management.device")) {
            Some(Declaration::Resource(r)) => {
                let media = r.media_type.unwrap();
                assert!(matches!(media, MediaTypeDecl::Versioned(_)));
                assert_eq!(media.versioned(2), Some("application/vnd.device+xml;version=2"));
            }
            other => panic!("expected resource, got {other:?}"),
        }
    }

    #[test]
    fn application_scoped_services() {
        let d = doc();
        assert!(matches!(
            d.resolve(MetaKind::Application, &QualifiedName::application("sn")),
            Some(Declaration::Application(_))
        ));
        match d.resolve(MetaKind::Service, &QualifiedName::service(Some("sn"), "device_management")) {
            Some(Declaration::Service(s)) => {
                assert_eq!(s.url, "/api/juniper/servicenow/device-management")
            }
            other => panic!("expected service, got {other:?}"),
        }
    }

    #[test]
    fn unknown_names_resolve_to_none() {
        let d = doc();
        assert!(d.resolve(MetaKind::Service, &name("nope")).is_none());
        assert!(d.resolve(MetaKind::Resource, &name("device_management.nope")).is_none());
        assert!(d.resolve(MetaKind::Application, &QualifiedName::application("nope")).is_none());
    }

    #[test]
    fn json_documents_load() {
        let d = SchemaDocument::from_json_str(
            r#"{"services": {"s": {"url": "/api/s", "methods": {"m": {"name": "-"}}}}}"#,
        )
        .unwrap();
        assert!(d.resolve(MetaKind::Method, &name("s.m")).is_some());
    }

    #[test]
    fn invalid_yaml_is_an_error() {
        assert!(matches!(
            SchemaDocument::from_yaml_str("services: [unclosed"),
            Err(SchemaError::Yaml(_))
        ));
    }
}
