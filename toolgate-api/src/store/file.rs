//! File-based spec store
//!
//! Read-only fallback when no `DATABASE_URL` is configured: a directory scan
//! over `*.json` / `*.yaml` / `*.yml`. Names derive from file stems,
//! endpoints replace `_` with `-`, every spec is active, and no token is
//! attached. Mutating operations are rejected; the control plane for file
//! mode is the filesystem itself.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

use toolgate_core::{FileFormat, SpecRecord, StoreError};

use super::{CreateSpec, SpecStore};

/// Spec store over a directory of OpenAPI files.
#[derive(Debug, Clone)]
pub struct FileSpecStore {
    dir: PathBuf,
}

impl FileSpecStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Whether the directory currently holds at least one loadable spec.
    pub fn has_specs(&self) -> bool {
        self.scan().map(|records| !records.is_empty()).unwrap_or(false)
    }

    fn scan(&self) -> Result<Vec<SpecRecord>, StoreError> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| {
            StoreError::unavailable(format!("cannot read {}: {}", self.dir.display(), e))
        })?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .and_then(FileFormat::from_extension)
                    .is_some()
            })
            .collect();
        // Stable ids across rescans: position in name order.
        paths.sort();

        let mut records = Vec::with_capacity(paths.len());
        for (index, path) in paths.iter().enumerate() {
            match self.read_record(path, index as i64 + 1) {
                Ok(record) => records.push(record),
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping spec file");
                }
            }
        }
        Ok(records)
    }

    fn read_record(&self, path: &Path, id: i64) -> Result<SpecRecord, StoreError> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| StoreError::unavailable("unreadable file name"))?
            .to_string();
        let format = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(FileFormat::from_extension)
            .unwrap_or(FileFormat::Yaml);

        let content = std::fs::read_to_string(path)
            .map_err(|e| StoreError::unavailable(format!("cannot read spec file: {}", e)))?;

        let modified: DateTime<Utc> = std::fs::metadata(path)
            .and_then(|meta| meta.modified())
            .map(DateTime::from)
            .unwrap_or_else(|_| Utc::now());

        Ok(SpecRecord {
            id,
            endpoint_path: format!("/{}", stem.replace('_', "-")),
            name: stem,
            file_size: content.len() as i64,
            spec_content: content,
            file_format: format,
            api_key_token: None,
            active: true,
            title: None,
            version: None,
            created_at: modified,
            updated_at: modified,
        })
    }

    fn read_only<T>(&self) -> Result<T, StoreError> {
        Err(StoreError::unavailable(
            "file-based spec store is read-only; manage specs on disk",
        ))
    }
}

#[async_trait]
impl SpecStore for FileSpecStore {
    async fn list_active(&self) -> Result<Vec<SpecRecord>, StoreError> {
        self.scan()
    }

    async fn list_all(&self) -> Result<Vec<SpecRecord>, StoreError> {
        self.scan()
    }

    async fn get(&self, id: i64) -> Result<SpecRecord, StoreError> {
        self.scan()?
            .into_iter()
            .find(|record| record.id == id)
            .ok_or_else(|| StoreError::not_found(id))
    }

    async fn create_from_content(&self, _spec: CreateSpec) -> Result<SpecRecord, StoreError> {
        self.read_only()
    }

    async fn delete(&self, _id: i64) -> Result<(), StoreError> {
        self.read_only()
    }

    async fn set_active(&self, _id: i64, _active: bool) -> Result<SpecRecord, StoreError> {
        self.read_only()
    }

    async fn set_token(&self, _id: i64, _token: Option<String>) -> Result<SpecRecord, StoreError> {
        self.read_only()
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        if self.dir.is_dir() {
            Ok(())
        } else {
            Err(StoreError::unavailable(format!(
                "spec directory {} does not exist",
                self.dir.display()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_spec_dir(files: &[(&str, &str)]) -> tempdir::TempDirGuard {
        tempdir::make(files)
    }

    /// Minimal tempdir helper so the tests carry no extra dependency.
    mod tempdir {
        use std::path::PathBuf;

        pub struct TempDirGuard(pub PathBuf);

        impl Drop for TempDirGuard {
            fn drop(&mut self) {
                let _ = std::fs::remove_dir_all(&self.0);
            }
        }

        pub fn make(files: &[(&str, &str)]) -> TempDirGuard {
            let dir = std::env::temp_dir().join(format!(
                "toolgate-filestore-{}-{}",
                std::process::id(),
                uuid::Uuid::new_v4()
            ));
            std::fs::create_dir_all(&dir).expect("create temp dir");
            for (name, content) in files {
                std::fs::write(dir.join(name), content).expect("write spec file");
            }
            TempDirGuard(dir)
        }
    }

    const MINIMAL: &str = r#"{"openapi": "3.0.0", "info": {"title": "T", "version": "1"}, "paths": {}}"#;

    #[tokio::test]
    async fn test_scan_names_and_endpoints() {
        let guard = temp_spec_dir(&[
            ("weather_api.json", MINIMAL),
            ("petstore.yaml", "openapi: 3.0.0\npaths: {}\n"),
            ("notes.txt", "ignored"),
        ]);
        let store = FileSpecStore::new(&guard.0);

        let records = store.list_active().await.expect("scan");
        assert_eq!(records.len(), 2);
        // Sorted by file name: petstore before weather_api.
        assert_eq!(records[0].name, "petstore");
        assert_eq!(records[0].endpoint_path, "/petstore");
        assert_eq!(records[1].name, "weather_api");
        assert_eq!(records[1].endpoint_path, "/weather-api");
        assert!(records.iter().all(|r| r.active));
        assert!(records.iter().all(|r| r.api_key_token.is_none()));
    }

    #[tokio::test]
    async fn test_get_by_id() {
        let guard = temp_spec_dir(&[("only.json", MINIMAL)]);
        let store = FileSpecStore::new(&guard.0);

        let record = store.get(1).await.expect("record 1");
        assert_eq!(record.name, "only");
        assert!(matches!(
            store.get(99).await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_mutations_rejected() {
        let guard = temp_spec_dir(&[("only.json", MINIMAL)]);
        let store = FileSpecStore::new(&guard.0);

        assert!(matches!(
            store.delete(1).await,
            Err(StoreError::Unavailable { .. })
        ));
        assert!(matches!(
            store.set_active(1, false).await,
            Err(StoreError::Unavailable { .. })
        ));
        assert!(matches!(
            store.set_token(1, Some("t".to_string())).await,
            Err(StoreError::Unavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_directory_unavailable() {
        let store = FileSpecStore::new("/definitely/not/here");
        assert!(matches!(
            store.list_active().await,
            Err(StoreError::Unavailable { .. })
        ));
        assert!(!store.has_specs());
        assert!(store.health_check().await.is_err());
    }
}
