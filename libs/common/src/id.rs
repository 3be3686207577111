use ulid::Ulid;

/// Generates a new ULID-based ID with the given prefix.
///
/// # Examples
/// ```
/// let id = lyceum_common::id::prefixed_ulid("room");
/// assert!(id.starts_with("room_"));
/// ```
pub fn prefixed_ulid(prefix: &str) -> String {
    format!("{}_{}", prefix, Ulid::new())
}

/// Well-known ID prefixes.
pub mod prefix {
    pub const USER: &str = "usr";
    pub const ROOM: &str = "room";
    pub const CONNECTION: &str = "conn";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixed_ulid_format() {
        let id = prefixed_ulid("room");
        assert!(id.starts_with("room_"));
        // ULID is 26 chars, plus prefix + underscore
        assert_eq!(id.len(), 5 + 26);
    }

    #[test]
    fn prefixed_ulid_is_unique() {
        let a = prefixed_ulid("usr");
        let b = prefixed_ulid("usr");
        assert_ne!(a, b);
    }
}
