//! Translation between local attribute names and wire (XML element) names.
//!
//! Local names use `_`, wire names use `-`. The mapping is not a bijection:
//! a wire name that already contains `_` comes back unchanged, and
//! `from_wire(to_wire(x)) == x` only when `x` has no `-`.

/// `device_family` → `device-family`.
pub fn to_wire(name: &str) -> String {
    name.replace('_', "-")
}

/// `device-family` → `device_family`.
pub fn from_wire(name: &str) -> String {
    name.replace('-', "_")
}

// --- tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_to_wire() {
        assert_eq!(to_wire("device_family"), "device-family");
        assert_eq!(to_wire("a_b_c"), "a-b-c");
        assert_eq!(to_wire("plain"), "plain");
    }

    #[test]
    fn wire_to_local() {
        assert_eq!(from_wire("device-family"), "device_family");
        assert_eq!(from_wire("plain"), "plain");
    }

    #[test]
    fn round_trip_only_without_hyphens() {
        assert_eq!(from_wire(&to_wire("serial_number")), "serial_number");
        assert_eq!(from_wire(&to_wire("odd-name")), "odd_name");
        assert_eq!(to_wire(&from_wire("has_underscore")), "has-underscore");
    }

    #[test]
    fn distinct_names_collide() {
        assert_eq!(to_wire("a_b"), to_wire("a-b"));
        assert_eq!(from_wire("a-b"), from_wire("a_b"));
    }
}
