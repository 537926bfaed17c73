//! Hierarchical datastore keys and key transforms.

use std::fmt;

/// A `/`-separated datastore key such as `/dbs/<id>`.
///
/// Keys always start with `/`, never end with one (except the root), and
/// never contain empty segments.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key(String);

impl Key {
    /// Build a key from a raw string, normalising separators.
    pub fn new(raw: impl AsRef<str>) -> Self {
        let segments: Vec<&str> = raw.as_ref().split('/').filter(|s| !s.is_empty()).collect();
        Self(format!("/{}", segments.join("/")))
    }

    /// The root key `/`.
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Append a child segment (or path).
    pub fn child(&self, segment: impl AsRef<str>) -> Self {
        Self::new(format!("{}/{}", self.0, segment.as_ref()))
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// True when `self` equals `prefix` or lives below it.
    pub fn is_descendant_of(&self, prefix: &Key) -> bool {
        if prefix.is_root() {
            return true;
        }
        match self.0.strip_prefix(prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Key {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// Bidirectional key mapping applied by a transformed datastore view.
pub trait KeyTransform: Send + Sync {
    /// Map a caller key to the underlying store key.
    fn convert(&self, key: &Key) -> Key;
    /// Map an underlying store key back to the caller key.
    fn invert(&self, key: &Key) -> Key;
}

/// Prepends a fixed prefix to every key.
#[derive(Debug, Clone)]
pub struct PrefixTransform {
    prefix: Key,
}

impl PrefixTransform {
    pub fn new(prefix: impl Into<Key>) -> Self {
        Self { prefix: prefix.into() }
    }
}

impl KeyTransform for PrefixTransform {
    fn convert(&self, key: &Key) -> Key {
        if key.is_root() {
            return self.prefix.clone();
        }
        self.prefix.child(key.as_str())
    }

    fn invert(&self, key: &Key) -> Key {
        if self.prefix.is_root() {
            return key.clone();
        }
        match key.as_str().strip_prefix(self.prefix.as_str()) {
            Some(rest) if rest.is_empty() => Key::root(),
            Some(rest) if rest.starts_with('/') => Key::new(rest),
            _ => key.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_normalised() {
        assert_eq!(Key::new("dbs//abc/").as_str(), "/dbs/abc");
        assert_eq!(Key::new("").as_str(), "/");
        assert_eq!(Key::root().child("a").child("b/c").as_str(), "/a/b/c");
    }

    #[test]
    fn descendant_check_respects_segments() {
        let prefix = Key::new("/dbs/abc");
        assert!(Key::new("/dbs/abc").is_descendant_of(&prefix));
        assert!(Key::new("/dbs/abc/x").is_descendant_of(&prefix));
        assert!(!Key::new("/dbs/abcd").is_descendant_of(&prefix));
        assert!(Key::new("/anything").is_descendant_of(&Key::root()));
    }

    #[test]
    fn prefix_transform_is_invertible() {
        let transform = PrefixTransform::new("/net");
        let converted = transform.convert(&Key::new("/host/key"));
        assert_eq!(converted.as_str(), "/net/host/key");
        assert_eq!(transform.invert(&converted), Key::new("/host/key"));
        assert_eq!(transform.convert(&Key::root()).as_str(), "/net");
        assert_eq!(transform.invert(&Key::new("/net")), Key::root());
    }
}
