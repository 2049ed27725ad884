use std::sync::Arc;

use crate::client::Client;
use crate::error::{Error, Result};
use crate::navigator::service::method_href;
use crate::navigator::{
    accept_header, invoke, join, parse_reply, Describe, Description, Invocation, MethodCall,
    Posted, RequestOptions,
};
use crate::registry::MetaMethod;
use crate::transport::HttpRequest;
use crate::xml::DataNode;

/// A named RPC-style endpoint.
#[derive(Debug, Clone)]
pub struct Method {
    client: Client,
    meta: Arc<MetaMethod>,
    parent_href: String,
}

impl Method {
    pub(crate) fn new(client: Client, meta: Arc<MetaMethod>, parent_href: String) -> Self {
        Self {
            client,
            meta,
            parent_href,
        }
    }

    pub fn meta(&self) -> &MetaMethod {
        &self.meta
    }

    /// Parent href plus the method's path segment; a `-` segment means the
    /// parent's href itself.
    pub fn href(&self) -> String {
        method_href(&self.parent_href, &self.meta.path_segment)
    }

    /// Invoke the method.
    ///
    /// The body is the literal [`RequestOptions::request_body`] if given,
    /// else the request template rendered with `call`'s parameters. An `id`
    /// parameter is appended to the URL as one more path segment.
    pub fn post(
        &self,
        call: MethodCall,
        options: &RequestOptions<'_>,
    ) -> Result<Posted<MethodCall, DataNode>> {
        let template = self.meta.request_template.as_ref();
        let body = match (&options.request_body, template) {
            (Some(body), _) => {
                if call.params.keys().any(|k| k != "id") {
                    return Err(Error::Usage(
                        "supply either template parameters or a request body, not both".into(),
                    ));
                }
                Some(body.clone())
            }
            (None, Some(template)) => Some(template.render(&call.params)),
            (None, None) => None,
        };

        let content_type = match &options.content_type {
            Some(ct) => Some(ct.clone()),
            None if template.is_some() => self.meta.request_type_for(options.version)?,
            None => None,
        };
        let accept = match &options.accept {
            Some(a) => Some(a.clone()),
            None => self.meta.response_type_for(options.version)?,
        };

        let mut href = self.href();
        if let Some(id) = call.id() {
            href = join(&href, id);
        }

        invoke(
            &self.client,
            call,
            Invocation {
                href,
                accept,
                content_type,
                body,
                keep_xml_escaping: self.meta.keep_xml_escaping,
                options,
            },
        )
    }

    /// Fetch the method URL with GET.
    pub fn get(&self, accept: Option<&str>, version: Option<u32>) -> Result<DataNode> {
        let declared = match accept {
            Some(_) => None,
            None => self.meta.media_type_for(version)?,
        };
        let accept = accept_header(accept, declared, self.meta.retain_charset_in_accept);

        let href = self.href();
        let response = self
            .client
            .send(HttpRequest::get(&href).header_opt("Accept", accept))?;
        if response.status != 200 {
            return Err(Error::api(format!("GET {href} failed"), response));
        }
        parse_reply(&response.body, self.meta.keep_xml_escaping)
    }
}

impl Describe for Method {
    fn href(&self) -> Result<String> {
        Ok(Method::href(self))
    }

    fn description(&self) -> Result<Description> {
        Ok(Description {
            kind: "Method",
            name: self.meta.name.to_string(),
            href: Method::href(self),
            collections: Vec::new(),
            methods: Vec::new(),
        })
    }
}
