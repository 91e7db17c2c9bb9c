use crate::core::Storage;
use crate::utils::error::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Storage backed by a local directory. Keys map to paths under `base_path`.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn full_path(&self, key: &str) -> PathBuf {
        self.base_path.join(key)
    }

    fn collect_files(&self, dir: &Path, suffix: &str, out: &mut Vec<String>) -> Result<()> {
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                self.collect_files(&path, suffix, out)?;
                continue;
            }
            let Ok(relative) = path.strip_prefix(&self.base_path) else {
                continue;
            };
            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if key.ends_with(suffix) {
                out.push(key);
            }
        }
        Ok(())
    }
}

impl Storage for LocalStorage {
    async fn list(&self, prefix: &str, suffix: &str) -> Result<Vec<String>> {
        let dir = self.full_path(prefix);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        self.collect_files(&dir, suffix, &mut files)?;
        files.sort();
        Ok(files)
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let data = fs::read(self.full_path(path))?;
        Ok(data)
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.full_path(path);

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(full_path, data)?;
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.full_path(path).is_file())
    }

    async fn delete(&self, path: &str) -> Result<bool> {
        let full_path = self.full_path(path);
        if !full_path.is_file() {
            return Ok(false);
        }
        fs::remove_file(full_path)?;
        Ok(true)
    }

    async fn copy(&self, from: &str, to: &str) -> Result<()> {
        let dest = self.full_path(to);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(self.full_path(from), dest)?;
        Ok(())
    }

    async fn public_url(&self, path: &str, _expires_in: Duration) -> Result<String> {
        let full_path = self.full_path(path);
        let absolute = fs::canonicalize(&full_path).unwrap_or(full_path);
        Ok(format!("file://{}", absolute.display()))
    }

    fn location(&self, path: &str) -> String {
        self.full_path(path).display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_list_copy_delete() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path());

        storage.write_file("emails/b.eml", b"b").await.unwrap();
        storage.write_file("emails/a.eml", b"a").await.unwrap();
        storage.write_file("emails/nested/c.eml", b"c").await.unwrap();
        storage.write_file("emails/notes.txt", b"x").await.unwrap();

        let listed = storage.list("emails/", ".eml").await.unwrap();
        assert_eq!(
            listed,
            vec!["emails/a.eml", "emails/b.eml", "emails/nested/c.eml"]
        );

        storage.copy("emails/a.eml", "inbox/a.eml").await.unwrap();
        assert_eq!(storage.read_file("inbox/a.eml").await.unwrap(), b"a");

        assert!(storage.delete("inbox/a.eml").await.unwrap());
        assert!(!storage.delete("inbox/a.eml").await.unwrap());
        assert!(!storage.exists("inbox/a.eml").await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_prefix_lists_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path());
        assert!(storage.list("emails/", ".eml").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_read_missing_file_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path());
        let err = storage.read_file("logs/latest.json").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_public_url_is_file_url() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path());
        storage.write_file("summaries/s.html", b"<html>").await.unwrap();
        let url = storage
            .public_url("summaries/s.html", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.ends_with("s.html"));
    }
}
