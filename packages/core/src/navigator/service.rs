use std::sync::Arc;

use crate::client::Client;
use crate::error::{Error, Result};
use crate::navigator::{
    join, resolve_child, Child, ChildCache, Collection, Describe, Description, Method, Navigable,
};
use crate::registry::MetaService;

/// A top-level REST service.
#[derive(Debug, Clone)]
pub struct Service {
    client: Client,
    meta: Arc<MetaService>,
    children: ChildCache,
}

impl Service {
    pub(crate) fn new(client: Client, meta: Arc<MetaService>) -> Self {
        Self {
            client,
            meta,
            children: ChildCache::default(),
        }
    }

    pub fn meta(&self) -> &MetaService {
        &self.meta
    }

    pub fn href(&self) -> &str {
        &self.meta.url
    }

    pub fn lookup(&self, name: &str) -> Result<Child> {
        resolve_child(self, name)
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

    fn missing(&self, name: &str) -> Error {
        Error::NoSuchField {
            owner: self.meta.name.to_string(),
            name: name.to_string(),
        }
    }
}

impl Navigable for Service {
    fn child_cache(&self) -> &ChildCache {
        &self.children
    }

    fn nested_collection(&self, name: &str) -> Result<Option<Collection>> {
        if !self.meta.collections.contains_key(name) {
            return Ok(None);
        }
        let meta = self.client.registry().collection(&self.meta.name.item(name))?;
        Ok(Some(Collection::new(
            self.client.clone(),
            meta,
            self.meta.url.clone(),
        )))
    }

    fn nested_method(&self, name: &str) -> Result<Option<Method>> {
        if !self.meta.methods.contains_key(name) {
            return Ok(None);
        }
        let meta = self.client.registry().method(&self.meta.name.item(name))?;
        Ok(Some(Method::new(self.client.clone(), meta, self.meta.url.clone())))
    }
}

impl Describe for Service {
    fn href(&self) -> Result<String> {
        Ok(self.meta.url.clone())
    }

    fn description(&self) -> Result<Description> {
        Ok(Description {
            kind: "Service",
            name: self.meta.name.to_string(),
            href: self.meta.url.clone(),
            collections: self
                .meta
                .collections
                .iter()
                .map(|(k, seg)| (k.clone(), join(&self.meta.url, seg)))
                .collect(),
            methods: self
                .meta
                .methods
                .iter()
                .map(|(k, seg)| (k.clone(), method_href(&self.meta.url, seg)))
                .collect(),
        })
    }
}

/// Where a method with path segment `segment` lives under `parent`.
pub(crate) fn method_href(parent: &str, segment: &str) -> String {
    if segment == "-" {
        parent.to_string()
    } else {
        join(parent, segment)
    }
}
