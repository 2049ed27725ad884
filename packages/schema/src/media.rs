//! Media type declarations.
//!
//! An element may declare one media type, or a table keyed by API version.
//! Version keys are written either as integers (`1:`) or strings (`"1":`)
//! in YAML; both deserialize to the same [`MediaVersion`].

use std::fmt;

use indexmap::IndexMap;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A declared media type: either one value, or one value per API version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MediaTypeDecl {
    Single(String),
    Versioned(IndexMap<MediaVersion, String>),
}

impl MediaTypeDecl {
    /// The entry for `version`, if this is a versioned table that has one.
    pub fn versioned(&self, version: u32) -> Option<&str> {
        match self {
            Self::Single(_) => None,
            Self::Versioned(table) => table
                .get(&MediaVersion(version.to_string()))
                .map(String::as_str),
        }
    }

    /// Every declared value, in declaration order.
    pub fn values(&self) -> Vec<&str> {
        match self {
            Self::Single(v) => vec![v.as_str()],
            Self::Versioned(table) => table.values().map(String::as_str).collect(),
        }
    }
}

impl From<&str> for MediaTypeDecl {
    fn from(value: &str) -> Self {
        Self::Single(value.to_string())
    }
}

/// A version key in a [`MediaTypeDecl::Versioned`] table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MediaVersion(pub String);

impl fmt::Display for MediaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for MediaVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for MediaVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct VersionVisitor;

        impl Visitor<'_> for VersionVisitor {
            type Value = MediaVersion;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an integer or string version key")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(MediaVersion(v.to_string()))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(MediaVersion(v.to_string()))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(MediaVersion(v.trim().to_string()))
            }
        }

        deserializer.deserialize_any(VersionVisitor)
    }
}

// --- tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_value_from_yaml() {
        let decl: MediaTypeDecl = serde_yaml::from_str("application/xml").unwrap();
        assert_eq!(decl, MediaTypeDecl::Single("application/xml".into()));
        assert_eq!(decl.versioned(1), None);
    }

    #[test]
    fn integer_and_string_version_keys_are_equivalent() {
        let decl: MediaTypeDecl =
            serde_yaml::from_str("1: application/a+xml\n\"2\": application/b+xml\n").unwrap();
        assert_eq!(decl.versioned(1), Some("application/a+xml"));
        assert_eq!(decl.versioned(2), Some("application/b+xml"));
        assert_eq!(decl.versioned(3), None);
    }

    #[test]
    fn versioned_table_from_json() {
        let decl: MediaTypeDecl =
            serde_json::from_str(r#"{"1": "application/a+xml"}"#).unwrap();
        assert_eq!(decl.values(), vec!["application/a+xml"]);
    }
}
