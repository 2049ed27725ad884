//! Request body templates with `{{ name }}` placeholders.

use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::{Captures, Regex};

/// A parsed request template.
///
/// Placeholders are `{{ name }}`, with optional inner whitespace. Rendering
/// substitutes each with the named parameter verbatim; parameters that are
/// not supplied render as the empty string.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    source: String,
    placeholders: Vec<String>,
}

impl Template {
    pub fn parse(source: impl Into<String>) -> Self {
        let source = source.into();
        let mut placeholders: Vec<String> = Vec::new();
        for caps in PLACEHOLDER_RE.captures_iter(&source) {
            let name = caps[1].to_string();
            if !placeholders.contains(&name) {
                placeholders.push(name);
            }
        }
        Self {
            source,
            placeholders,
        }
    }

    /// Placeholder names in order of first appearance.
    pub fn placeholders(&self) -> &[String] {
        &self.placeholders
    }

    pub fn render(&self, params: &IndexMap<String, String>) -> String {
        PLACEHOLDER_RE
            .replace_all(&self.source, |caps: &Captures<'_>| {
                params.get(&caps[1]).cloned().unwrap_or_default()
            })
            .into_owned()
    }
}

/// `{{ name }}`
static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("invalid placeholder regex")
});

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn placeholders_collected_once() {
        let t = Template::parse("<a>{{ x }}</a><b>{{y}}</b><c>{{ x }}</c>");
        assert_eq!(t.placeholders(), &["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn renders_supplied_and_missing_params() {
        let t = Template::parse("<rpc>{{ rpcCommand }}</rpc><n>{{ name }}</n>");
        let out = t.render(&params(&[("rpcCommand", "<get-system-information/>")]));
        assert_eq!(out, "<rpc><get-system-information/></rpc><n></n>");
    }
}
