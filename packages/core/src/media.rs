//! Media-type negotiation: version selection and Accept header shaping.

use hyperwire_schema::MediaTypeDecl;

use crate::error::{Error, Result};

/// Pick the media type to send for `version`.
///
/// - no declaration: `None` when no version was asked for, otherwise
///   [`Error::UnknownVersion`]
/// - a single declared type: that type, whatever the version
/// - a versioned table with `version` given: that entry, or
///   [`Error::UnknownVersion`]
/// - a versioned table without `version`: its only entry, or
///   [`Error::AmbiguousVersion`] when there are several
pub fn select(
    decl: Option<&MediaTypeDecl>,
    version: Option<u32>,
    owner: &str,
) -> Result<Option<String>> {
    let Some(decl) = decl else {
        return match version {
            None => Ok(None),
            Some(version) => Err(Error::UnknownVersion {
                owner: owner.to_string(),
                version,
            }),
        };
    };

    match (decl, version) {
        (MediaTypeDecl::Single(value), _) => Ok(Some(value.clone())),
        (MediaTypeDecl::Versioned(_), Some(version)) => decl
            .versioned(version)
            .map(|v| Some(v.to_string()))
            .ok_or_else(|| Error::UnknownVersion {
                owner: owner.to_string(),
                version,
            }),
        (MediaTypeDecl::Versioned(table), None) => match table.len() {
            1 => Ok(table.values().next().cloned()),
            _ => Err(Error::AmbiguousVersion {
                owner: owner.to_string(),
            }),
        },
    }
}

/// Shape a media type for use in an Accept header.
///
/// Servers reject `;charset=...` in Accept, so it is cut off unless the
/// element asks to keep it.
pub fn accept_value(media_type: &str, retain_charset: bool) -> String {
    if retain_charset {
        return media_type.to_string();
    }
    match media_type.find(";charset=") {
        Some(idx) => media_type[..idx].to_string(),
        None => media_type.to_string(),
    }
}

// --- tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use hyperwire_schema::MediaVersion;
    use indexmap::IndexMap;

    use super::*;

    fn table(entries: &[(&str, &str)]) -> MediaTypeDecl {
        let map: IndexMap<MediaVersion, String> = entries
            .iter()
            .map(|(k, v)| (MediaVersion(k.to_string()), v.to_string()))
            .collect();
        MediaTypeDecl::Versioned(map)
    }

    #[test]
    fn versioned_entry_selected() {
        let decl = table(&[("1", "T1"), ("2", "T2")]);
        assert_eq!(select(Some(&decl), Some(2), "x").unwrap().as_deref(), Some("T2"));
        assert_eq!(select(Some(&decl), Some(1), "x").unwrap().as_deref(), Some("T1"));
    }

    #[test]
    fn several_entries_without_version_is_ambiguous() {
        let decl = table(&[("1", "T1"), ("2", "T2")]);
        assert!(matches!(
            select(Some(&decl), None, "svc.device"),
            Err(Error::AmbiguousVersion { owner }) if owner == "svc.device"
        ));
    }

    #[test]
    fn single_entry_table_needs_no_version() {
        let decl = table(&[("1", "T1")]);
        assert_eq!(select(Some(&decl), None, "x").unwrap().as_deref(), Some("T1"));
    }

    #[test]
    fn missing_version_is_unknown() {
        let decl = table(&[("1", "T1"), ("2", "T2")]);
        assert!(matches!(
            select(Some(&decl), Some(3), "x"),
            Err(Error::UnknownVersion { version: 3, .. })
        ));
        assert!(matches!(
            select(None, Some(1), "x"),
            Err(Error::UnknownVersion { version: 1, .. })
        ));
    }

    #[test]
    fn single_type_ignores_version() {
        let decl = MediaTypeDecl::from("T");
        assert_eq!(select(Some(&decl), Some(7), "x").unwrap().as_deref(), Some("T"));
        assert_eq!(select(None, None, "x").unwrap(), None);
    }

    #[test]
    fn charset_stripped_from_accept() {
        let t = "application/vnd.x+xml;version=1;charset=UTF-8";
        assert_eq!(accept_value(t, false), "application/vnd.x+xml;version=1");
        assert_eq!(accept_value(t, true), t);
        assert_eq!(accept_value("application/xml", false), "application/xml");
    }
}
