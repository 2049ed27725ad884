//! Collection query parameters and their URL rendering.

use indexmap::IndexMap;

/// Server-side filtering of a collection.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Passed through verbatim, e.g. `name starts-with 'edge'`.
    Expression(String),
    /// Equality terms joined with `and`, in insertion order.
    Fields(IndexMap<String, String>),
}

impl Filter {
    fn render(&self) -> String {
        match self {
            Self::Expression(expr) => format!("({expr})"),
            Self::Fields(fields) => {
                let terms: Vec<String> = fields
                    .iter()
                    .map(|(k, v)| format!("({k} eq '{v}')"))
                    .collect();
                format!("({})", terms.join(" and "))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Paging {
    pub start: Option<u64>,
    pub limit: Option<u64>,
}

impl Paging {
    fn render(&self) -> Option<String> {
        let terms: Vec<String> = [("start", self.start), ("limit", self.limit)]
            .into_iter()
            .filter_map(|(k, v)| v.map(|v| format!("{k} eq {v}")))
            .collect();
        (!terms.is_empty()).then(|| format!("({})", terms.join(", ")))
    }
}

/// Options for [`crate::navigator::Collection::get`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filter: Option<Filter>,
    /// Restrict results to one domain id.
    pub domain: Option<u64>,
    pub paging: Paging,
    pub sort_by: Vec<String>,
    /// Accept header override.
    pub accept: Option<String>,
    pub version: Option<u32>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter_expr(mut self, expr: impl Into<String>) -> Self {
        self.filter = Some(Filter::Expression(expr.into()));
        self
    }

    /// Add an equality term. Replaces any expression filter.
    pub fn filter_eq(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        let mut fields = match self.filter.take() {
            Some(Filter::Fields(fields)) => fields,
            _ => IndexMap::new(),
        };
        fields.insert(field.into(), value.into());
        self.filter = Some(Filter::Fields(fields));
        self
    }

    pub fn domain(mut self, id: u64) -> Self {
        self.domain = Some(id);
        self
    }

    pub fn start(mut self, start: u64) -> Self {
        self.paging.start = Some(start);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.paging.limit = Some(limit);
        self
    }

    pub fn sort_by(mut self, field: impl Into<String>) -> Self {
        self.sort_by.push(field.into());
        self
    }

    pub fn accept(mut self, media_type: impl Into<String>) -> Self {
        self.accept = Some(media_type.into());
        self
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = Some(version);
        self
    }

    /// `href` with the query string appended, parameters in the fixed
    /// order domain, filter, paging, sort.
    pub fn apply(&self, href: &str) -> String {
        let mut params: Vec<String> = Vec::new();
        if let Some(domain) = self.domain {
            params.push(format!("domainContext=(filterDomainIds eq {domain})"));
        }
        if let Some(filter) = &self.filter {
            params.push(format!("filter={}", filter.render()));
        }
        if let Some(paging) = self.paging.render() {
            params.push(format!("paging={paging}"));
        }
        if !self.sort_by.is_empty() {
            params.push(format!("sortby=({})", self.sort_by.join(",")));
        }

        if params.is_empty() {
            return href.to_string();
        }
        let sep = if href.contains('?') { '&' } else { '?' };
        format!("{href}{sep}{}", params.join("&"))
    }
}
