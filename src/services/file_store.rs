// src/services/file_store.rs

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum FileStoreError {
    #[error("erro de E/S: {0}")]
    Io(#[from] std::io::Error),

    #[error("caminho inválido: {0}")]
    InvalidPath(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub path: String,
    pub url: String,
}

/// Armazenamento dos arquivos enviados e gerados.
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn save(&self, entity: &str, filename: &str, bytes: &[u8]) -> Result<StoredFile, FileStoreError>;
    async fn read(&self, path: &str) -> Result<Vec<u8>, FileStoreError>;
    async fn exists(&self, path: &str) -> bool;
    async fn remove(&self, path: &str) -> Result<(), FileStoreError>;
}

// --- Disco local ---

#[derive(Clone)]
pub struct LocalFileStore {
    root: PathBuf,
    base_url: String,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>, base_url: &str) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn resolve(&self, relative: &str) -> Result<PathBuf, FileStoreError> {
        let path = Path::new(relative);
        let safe = path.components().all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(FileStoreError::InvalidPath(relative.to_string()));
        }
        Ok(self.root.join(path))
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn save(&self, entity: &str, filename: &str, bytes: &[u8]) -> Result<StoredFile, FileStoreError> {
        let relative = relative_path(entity, filename, Uuid::new_v4(), Utc::now());
        let absolute = self.resolve(&relative)?;

        if let Some(parent) = absolute.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&absolute, bytes).await?;

        tracing::debug!(path = %relative, size = bytes.len(), "Arquivo gravado");
        Ok(StoredFile {
            url: format!("{}/{}", self.base_url, relative),
            path: relative,
        })
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, FileStoreError> {
        Ok(tokio::fs::read(self.resolve(path)?).await?)
    }

    async fn exists(&self, path: &str) -> bool {
        match self.resolve(path) {
            Ok(absolute) => tokio::fs::try_exists(absolute).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn remove(&self, path: &str) -> Result<(), FileStoreError> {
        Ok(tokio::fs::remove_file(self.resolve(path)?).await?)
    }
}

/// `documents/<entidade>/<AAAA>/<MM>/<DD>/<uuid>_<arquivo>`
pub fn relative_path(entity: &str, filename: &str, id: Uuid, now: DateTime<Utc>) -> String {
    format!(
        "documents/{}/{}/{}_{}",
        sanitize(entity),
        now.format("%Y/%m/%d"),
        id,
        sanitize(filename)
    )
}

// Mantém só o nome final, com caracteres seguros
fn sanitize(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();

    if cleaned.trim_matches('.').is_empty() { "file".to_string() } else { cleaned }
}

/// Extensão em minúsculas, sem o ponto.
pub fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn path_is_partitioned_by_date() {
        let id = Uuid::nil();
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        assert_eq!(
            relative_path("receipts", "nota fiscal.pdf", id, now),
            format!("documents/receipts/2025/06/01/{id}_nota_fiscal.pdf")
        );
    }

    #[test]
    fn traversal_is_stripped_from_filenames() {
        assert_eq!(sanitize("../../etc/passwd"), "passwd");
        assert_eq!(sanitize(".."), "file");
        assert_eq!(extension_of("Scan.JPEG"), "jpeg");
        assert_eq!(extension_of("README"), "");
    }

    #[tokio::test]
    async fn save_then_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path(), "/media/");

        let stored = store.save("proformas", "quote.pdf", b"%PDF-1.4").await.unwrap();
        assert!(stored.url.starts_with("/media/documents/proformas/"));
        assert!(stored.path.ends_with("_quote.pdf"));
        assert!(store.exists(&stored.path).await);
        assert_eq!(store.read(&stored.path).await.unwrap(), b"%PDF-1.4");
    }

    #[tokio::test]
    async fn removed_file_is_gone() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path(), "/media");

        let stored = store.save("receipts", "nota.pdf", b"%PDF").await.unwrap();
        store.remove(&stored.path).await.unwrap();
        assert!(!store.exists(&stored.path).await);
        assert!(store.remove(&stored.path).await.is_err());
    }

    #[tokio::test]
    async fn rejects_paths_outside_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path(), "/media");
        assert!(matches!(store.read("../secret").await, Err(FileStoreError::InvalidPath(_))));
        assert!(!store.exists("/etc/passwd").await);
    }
}
