//! Core types for secret handling.
//!
//! This module provides the identity and value types shared across the
//! secrets subsystem, plus [`SecretString`], a wrapper that keeps credentials
//! out of logs and zeroes them on drop.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::utils::{fnv32, FNV32_OFFSET_BASIS};

/// Vault KV engine kinds. The kind decides how a fetched body is unwrapped:
/// `kv_v1` payloads live at `data`, `kv_v2` payloads at `data/data`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VaultKind {
    KvV1,
    KvV2,
}

impl VaultKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KvV1 => "kv_v1",
            Self::KvV2 => "kv_v2",
        }
    }
}

impl Default for VaultKind {
    fn default() -> Self {
        Self::KvV2
    }
}

impl fmt::Display for VaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Composite identity of a cached secret.
///
/// Two requests with the same composite identity share one cache entry for
/// the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SecretKey {
    pub category: String,
    pub name: String,
    pub vault_id: Option<String>,
    pub version: Option<String>,
}

impl SecretKey {
    pub fn new(
        category: impl Into<String>,
        name: impl Into<String>,
        vault_id: Option<&str>,
        version: Option<&str>,
    ) -> Self {
        Self {
            category: category.into(),
            name: name.into(),
            vault_id: vault_id.map(str::to_string),
            version: version.map(str::to_string),
        }
    }
}

impl fmt::Display for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.category, self.name)?;
        if let Some(vault_id) = &self.vault_id {
            write!(f, "@{vault_id}")?;
        }
        if let Some(version) = &self.version {
            write!(f, "#{version}")?;
        }
        Ok(())
    }
}

/// A secret's contents: an ordered mapping from key name to value bytes.
///
/// Values may be arbitrary binary; string access decodes as UTF-8. Published
/// contents are immutable: the cache replaces whole snapshots, never edits
/// them in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretContents {
    entries: BTreeMap<String, Vec<u8>>,
}

impl SecretContents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build contents from a decoded JSON payload object.
    ///
    /// String values keep their exact bytes; numbers and booleans use their
    /// JSON text; nested structures are carried as compact JSON; nulls are
    /// dropped.
    pub fn from_json_object(object: &serde_json::Map<String, serde_json::Value>) -> Self {
        let mut contents = Self::new();
        for (key, value) in object {
            let bytes = match value {
                serde_json::Value::Null => continue,
                serde_json::Value::String(s) => s.clone().into_bytes(),
                other => other.to_string().into_bytes(),
            };
            contents.insert(key.clone(), bytes);
        }
        contents
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Vec<u8>) {
        self.entries.insert(key.into(), value);
    }

    /// Value bytes for a key, absent when the key is unknown.
    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    /// Value for a key decoded as UTF-8 text.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|bytes| std::str::from_utf8(bytes).ok())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Deterministic 32-bit hash of the contents.
    ///
    /// A pure function of the key/value pairs: equal contents hash equal on
    /// every run and platform, so consumers can use it as a change marker.
    pub fn content_hash(&self) -> u32 {
        let mut hash = FNV32_OFFSET_BASIS;
        for (key, value) in &self.entries {
            hash = fnv32(key.as_bytes(), hash);
            hash = fnv32(&[0], hash);
            hash = fnv32(value, hash);
            hash = fnv32(&[0], hash);
        }
        hash
    }
}

impl FromIterator<(String, Vec<u8>)> for SecretContents {
    fn from_iter<I: IntoIterator<Item = (String, Vec<u8>)>>(iter: I) -> Self {
        Self { entries: iter.into_iter().collect() }
    }
}

/// A string wrapper that redacts its contents in Debug, Display, and
/// serialization, and zeroes its memory on drop.
///
/// Used for vault tokens and other credentials held in memory. The actual
/// value is only reachable through [`SecretString::expose_secret`].
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Expose the underlying secret value. Never log the result.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for SecretString {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str("[REDACTED]")
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(SecretString(String::deserialize(deserializer)?))
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretString([REDACTED])")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for SecretString {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for SecretString {}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vault_kind_default_and_display() {
        assert_eq!(VaultKind::default(), VaultKind::KvV2);
        assert_eq!(VaultKind::KvV1.to_string(), "kv_v1");
        assert_eq!(VaultKind::KvV2.to_string(), "kv_v2");
    }

    #[test]
    fn test_vault_kind_serde_roundtrip() {
        assert_eq!(serde_json::to_string(&VaultKind::KvV1).unwrap(), "\"kv_v1\"");
        let kind: VaultKind = serde_json::from_str("\"kv_v2\"").unwrap();
        assert_eq!(kind, VaultKind::KvV2);
    }

    #[test]
    fn test_secret_key_display() {
        assert_eq!(SecretKey::new("system", "db", None, None).to_string(), "system/db");
        assert_eq!(SecretKey::new("system", "db", Some("v1"), None).to_string(), "system/db@v1");
        assert_eq!(SecretKey::new("system", "db", None, Some("2")).to_string(), "system/db#2");
        assert_eq!(
            SecretKey::new("system", "db", Some("v1"), Some("2")).to_string(),
            "system/db@v1#2"
        );
    }

    #[test]
    fn test_secret_key_identity() {
        let a = SecretKey::new("system", "db", None, None);
        let b = SecretKey::new("system", "db", None, None);
        let c = SecretKey::new("system", "db", Some("v1"), None);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_contents_binary_and_text_access() {
        let mut contents = SecretContents::new();
        contents.insert("password", b"hunter2".to_vec());
        contents.insert("blob", vec![0u8, 159, 146, 150]);

        assert_eq!(contents.get("password"), Some(&b"hunter2"[..]));
        assert_eq!(contents.get_str("password"), Some("hunter2"));
        // Binary values are preserved verbatim but do not decode as text.
        assert_eq!(contents.get("blob"), Some(&[0u8, 159, 146, 150][..]));
        assert_eq!(contents.get_str("blob"), None);
        assert_eq!(contents.get("missing"), None);
    }

    #[test]
    fn test_contents_from_json_object() {
        let value: serde_json::Value = serde_json::json!({
            "user": "admin",
            "port": 5432,
            "ssl": true,
            "skipped": null,
            "nested": {"a": 1}
        });
        let contents = SecretContents::from_json_object(value.as_object().unwrap());
        assert_eq!(contents.get_str("user"), Some("admin"));
        assert_eq!(contents.get_str("port"), Some("5432"));
        assert_eq!(contents.get_str("ssl"), Some("true"));
        assert_eq!(contents.get("skipped"), None);
        assert_eq!(contents.get_str("nested"), Some(r#"{"a":1}"#));
    }

    #[test]
    fn test_content_hash_tracks_contents() {
        let mut a = SecretContents::new();
        a.insert("k", b"v".to_vec());
        let mut b = SecretContents::new();
        b.insert("k", b"v".to_vec());
        assert_eq!(a.content_hash(), b.content_hash());

        let mut c = SecretContents::new();
        c.insert("k", b"w".to_vec());
        assert_ne!(a.content_hash(), c.content_hash());

        // Key and value boundaries matter.
        let mut d = SecretContents::new();
        d.insert("kv", b"".to_vec());
        assert_ne!(a.content_hash(), d.content_hash());
    }

    #[test]
    fn test_content_hash_stable_value() {
        // Hash must not drift between runs; empty contents hash to the seed.
        assert_eq!(SecretContents::new().content_hash(), 0x811C_9DC5);
    }

    #[test]
    fn test_secret_string_redacts() {
        let secret = SecretString::new("hvs.token-value");
        assert_eq!(format!("{secret:?}"), "SecretString([REDACTED])");
        assert_eq!(format!("{secret}"), "[REDACTED]");
        assert_eq!(serde_json::to_string(&secret).unwrap(), "\"[REDACTED]\"");
        assert_eq!(secret.expose_secret(), "hvs.token-value");
    }

    #[test]
    fn test_secret_string_deserializes_real_values() {
        let secret: SecretString = serde_json::from_str("\"actual-token\"").unwrap();
        assert_eq!(secret.expose_secret(), "actual-token");
    }
}
