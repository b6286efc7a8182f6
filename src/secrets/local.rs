//! Local filesystem secret source.
//!
//! Container orchestration mounts secrets as directories of files: one
//! directory per secret, one file per key, the file contents being the raw
//! value. This source reads `<mount>/<category>/<name>/` into a
//! [`SecretContents`] snapshot.

use std::path::Path;
use tracing::debug;

use crate::errors::Result;
use crate::secrets::types::SecretContents;
use crate::validation::is_valid_key_name;

/// Read a secret from the local mount.
///
/// Returns `None` when the directory is missing or has no entries. Files
/// whose names do not pass key validation are skipped, as are empty files
/// and anything that is not a regular file. Values are preserved verbatim,
/// binary included.
pub async fn read_local_secret(
    mount: &Path,
    category: &str,
    name: &str,
) -> Result<Option<SecretContents>> {
    let dir = mount.join(category).join(name);
    let mut entries = match tokio::fs::read_dir(&dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut contents = SecretContents::new();
    let mut seen_any = false;
    while let Some(entry) = entries.next_entry().await? {
        seen_any = true;
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let file_name = entry.file_name();
        let Some(key) = file_name.to_str() else {
            continue;
        };
        if !is_valid_key_name(key) {
            debug!(category, secret = name, file = key, "skipping file with invalid key name");
            continue;
        }
        let value = tokio::fs::read(entry.path()).await?;
        if value.is_empty() {
            continue;
        }
        contents.insert(key, value);
    }

    if !seen_any {
        return Ok(None);
    }
    Ok(Some(contents))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn write_key(mount: &Path, category: &str, name: &str, key: &str, value: &[u8]) {
        let dir = mount.join(category).join(name);
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join(key), value).await.unwrap();
    }

    #[tokio::test]
    async fn test_reads_one_file_per_key() {
        let mount = TempDir::new().unwrap();
        write_key(mount.path(), "appA", "db", "password", b"hunter2").await;
        write_key(mount.path(), "appA", "db", "username", b"admin").await;

        let contents = read_local_secret(mount.path(), "appA", "db").await.unwrap().unwrap();
        assert_eq!(contents.get_str("password"), Some("hunter2"));
        assert_eq!(contents.get_str("username"), Some("admin"));
        assert_eq!(contents.len(), 2);
    }

    #[tokio::test]
    async fn test_binary_values_roundtrip() {
        let mount = TempDir::new().unwrap();
        let blob: Vec<u8> = (0..=255u8).collect();
        write_key(mount.path(), "certs", "gw", "tls.key", &blob).await;

        let contents = read_local_secret(mount.path(), "certs", "gw").await.unwrap().unwrap();
        assert_eq!(contents.get("tls.key"), Some(blob.as_slice()));
    }

    #[tokio::test]
    async fn test_missing_directory_is_absent() {
        let mount = TempDir::new().unwrap();
        let result = read_local_secret(mount.path(), "nope", "missing").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_empty_directory_is_absent() {
        let mount = TempDir::new().unwrap();
        tokio::fs::create_dir_all(mount.path().join("appA").join("empty")).await.unwrap();
        let result = read_local_secret(mount.path(), "appA", "empty").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_invalid_key_names_skipped() {
        let mount = TempDir::new().unwrap();
        write_key(mount.path(), "appA", "db", "password", b"ok").await;
        write_key(mount.path(), "appA", "db", "..weird", b"skipped").await;
        write_key(mount.path(), "appA", "db", "bad name", b"skipped").await;

        let contents = read_local_secret(mount.path(), "appA", "db").await.unwrap().unwrap();
        assert_eq!(contents.len(), 1);
        assert_eq!(contents.get_str("password"), Some("ok"));
    }

    #[tokio::test]
    async fn test_empty_files_skipped() {
        let mount = TempDir::new().unwrap();
        write_key(mount.path(), "appA", "db", "password", b"ok").await;
        write_key(mount.path(), "appA", "db", "blank", b"").await;

        let contents = read_local_secret(mount.path(), "appA", "db").await.unwrap().unwrap();
        assert_eq!(contents.len(), 1);
        assert!(contents.get("blank").is_none());
    }

    #[tokio::test]
    async fn test_subdirectories_skipped() {
        let mount = TempDir::new().unwrap();
        write_key(mount.path(), "appA", "db", "password", b"ok").await;
        tokio::fs::create_dir_all(mount.path().join("appA").join("db").join("sub"))
            .await
            .unwrap();

        let contents = read_local_secret(mount.path(), "appA", "db").await.unwrap().unwrap();
        assert_eq!(contents.len(), 1);
    }
}
