//! Qualified names: the stable identity of a declared schema element.
//!
//! The textual form is `[application.]service[.item][:member]`:
//!
//! | Example | Meaning |
//! |---------|---------|
//! | `device_management` | a service |
//! | `servicenow.device_management` | a service inside an application |
//! | `device_management.devices` | a collection, resource or method of a service |
//! | `device_management.device:configurations` | a collection or method nested in `device` |

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::SchemaError;

/// Which kind of element a name refers to. Part of the registry key, so a
/// service-level collection and a service-level method may share a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetaKind {
    Application,
    Service,
    Collection,
    Resource,
    Method,
}

impl fmt::Display for MetaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Application => "application",
            Self::Service => "service",
            Self::Collection => "collection",
            Self::Resource => "resource",
            Self::Method => "method",
        };
        f.write_str(s)
    }
}

/// A fully-qualified schema name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedName {
    app: Option<String>,
    service: Option<String>,
    item: Option<String>,
    member: Option<String>,
}

impl QualifiedName {
    /// The name of an application.
    pub fn application(app: impl Into<String>) -> Self {
        Self {
            app: Some(app.into()),
            service: None,
            item: None,
            member: None,
        }
    }

    /// The name of a service, optionally scoped to an application.
    pub fn service(app: Option<&str>, service: impl Into<String>) -> Self {
        Self {
            app: app.map(str::to_string),
            service: Some(service.into()),
            item: None,
            member: None,
        }
    }

    /// Parse a type reference such as `device_management.device` or
    /// `servicenow.device_management.device:configurations`.
    ///
    /// Two dotted segments are `service.item`; three are
    /// `application.service.item`.
    pub fn parse(s: &str) -> Result<Self, SchemaError> {
        let caps = NAME_RE
            .captures(s)
            .ok_or_else(|| SchemaError::InvalidQualifiedName(s.to_string()))?;

        let dotted: Vec<&str> = caps[1].split('.').collect();
        let member = caps.get(2).map(|m| m.as_str().to_string());

        let (app, service, item) = match dotted.as_slice() {
            [service] => (None, *service, None),
            [service, item] => (None, *service, Some(*item)),
            [app, service, item] => (Some(*app), *service, Some(*item)),
            _ => return Err(SchemaError::InvalidQualifiedName(s.to_string())),
        };

        Ok(Self {
            app: app.map(str::to_string),
            service: Some(service.to_string()),
            item: item.map(str::to_string),
            member,
        })
    }

    /// This name extended by one dotted segment (`svc` → `svc.item`).
    pub fn item(&self, item: impl Into<String>) -> Self {
        Self {
            item: Some(item.into()),
            member: None,
            ..self.clone()
        }
    }

    /// This name extended by a `:member` suffix (`svc.device` → `svc.device:sub`).
    pub fn member(&self, member: impl Into<String>) -> Self {
        Self {
            member: Some(member.into()),
            ..self.clone()
        }
    }

    pub fn app_name(&self) -> Option<&str> {
        self.app.as_deref()
    }

    pub fn service_name(&self) -> Option<&str> {
        self.service.as_deref()
    }

    pub fn item_name(&self) -> Option<&str> {
        self.item.as_deref()
    }

    pub fn member_name(&self) -> Option<&str> {
        self.member.as_deref()
    }

    /// The final segment: the member, item, service or application name.
    pub fn leaf(&self) -> &str {
        self.member
            .as_deref()
            .or(self.item.as_deref())
            .or(self.service.as_deref())
            .or(self.app.as_deref())
            .unwrap_or_default()
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dotted: Vec<&str> = [&self.app, &self.service, &self.item]
            .into_iter()
            .filter_map(|s| s.as_deref())
            .collect();
        f.write_str(&dotted.join("."))?;
        if let Some(member) = &self.member {
            write!(f, ":{member}")?;
        }
        Ok(())
    }
}

// --- helpers -----------------------------------------------------------------

/// `^([\w-]+(?:\.[\w-]+){0,2})(?::([\w-]+))?$`
static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9_-]+(?:\.[A-Za-z0-9_-]+){0,2})(?::([A-Za-z0-9_-]+))?$")
        .expect("invalid qualified name regex")
});

// --- tests -------------------------------------------------------------------
