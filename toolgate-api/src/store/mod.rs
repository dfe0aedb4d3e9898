//! Spec Store Adapter
//!
//! The gateway's only interface to persisted spec records. Two
//! implementations exist: [`PgSpecStore`] over deadpool-postgres (selected
//! when `DATABASE_URL` is set) and [`FileSpecStore`] over a directory scan.
//! The adapter is the system's only writer to the persistent store; the
//! gateway itself never mutates `spec_content`.

mod file;
mod postgres;

pub use file::FileSpecStore;
pub use postgres::{PgConfig, PgSpecStore};

use async_trait::async_trait;

use toolgate_core::{FileFormat, SpecRecord, StoreError};

/// Payload for creating a record from raw content.
#[derive(Debug, Clone, Default)]
pub struct CreateSpec {
    pub name: String,
    pub endpoint_path: String,
    pub spec_content: String,
    /// Auto-detected from content when absent.
    pub file_format: Option<FileFormat>,
    pub api_key_token: Option<String>,
    pub title: Option<String>,
    pub version: Option<String>,
}

/// Capability set the loader and the management surface require.
#[async_trait]
pub trait SpecStore: Send + Sync {
    /// Records with `active = true`, in stable order.
    async fn list_active(&self) -> Result<Vec<SpecRecord>, StoreError>;

    /// All records, in stable order.
    async fn list_all(&self) -> Result<Vec<SpecRecord>, StoreError>;

    async fn get(&self, id: i64) -> Result<SpecRecord, StoreError>;

    async fn create_from_content(&self, spec: CreateSpec) -> Result<SpecRecord, StoreError>;

    async fn delete(&self, id: i64) -> Result<(), StoreError>;

    async fn set_active(&self, id: i64, active: bool) -> Result<SpecRecord, StoreError>;

    async fn set_token(&self, id: i64, token: Option<String>) -> Result<SpecRecord, StoreError>;

    /// Cheap connectivity probe for readiness checks.
    async fn health_check(&self) -> Result<(), StoreError>;
}
