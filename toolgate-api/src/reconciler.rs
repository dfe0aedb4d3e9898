//! Spec Reconciler
//!
//! Observes the spec store and keeps the mount table in sync. Two triggers
//! share one critical section: the periodic ticker (default 30 s, disabled
//! via `DISABLE_POLLING`) and explicit `POST /reload` / management mutations.
//! The fingerprint of the active record set is the change key; store
//! unavailability leaves the last good mount set in place.

use std::sync::Arc;
use tokio::sync::Mutex;

use serde::Serialize;
use toolgate_openapi::OperationFilter;

use crate::config::GatewayConfig;
use crate::error::{ApiError, ApiResult};
use crate::loader::build_mount_set;
use crate::mounts::MountTable;
use crate::store::SpecStore;

/// What one reconcile did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReloadOutcome {
    Unchanged,
    Reloaded { mounted_paths: Vec<String> },
}

pub struct Reconciler {
    store: Arc<dyn SpecStore>,
    mounts: Arc<MountTable>,
    config: Arc<GatewayConfig>,
    filter: OperationFilter,
    /// Serializes concurrent reconcile triggers.
    lock: Mutex<()>,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn SpecStore>,
        mounts: Arc<MountTable>,
        config: Arc<GatewayConfig>,
        filter: OperationFilter,
    ) -> Self {
        Self {
            store,
            mounts,
            config,
            filter,
            lock: Mutex::new(()),
        }
    }

    /// First load at startup. Unlike later reconciles this propagates store
    /// failures so the caller can decide between file fallback and exit.
    pub async fn initial_load(&self) -> ApiResult<usize> {
        let _guard = self.lock.lock().await;
        let records = self.list_active().await?;
        let set = build_mount_set(records, &self.filter);
        let mounted = set.mounts.len();
        self.mounts.swap(set).await;
        Ok(mounted)
    }

    /// Reconcile if the active record set changed since the last swap.
    pub async fn reload_if_changed(&self) -> ApiResult<ReloadOutcome> {
        self.reload(false).await
    }

    /// Reconcile; `force` rebuilds even on an unchanged fingerprint (used
    /// after management mutations, where content may differ under the same
    /// record identity).
    pub async fn reload(&self, force: bool) -> ApiResult<ReloadOutcome> {
        let _guard = self.lock.lock().await;

        let records = match self.list_active().await {
            Ok(records) => records,
            Err(err) => {
                tracing::warn!(error = %err, "reconcile skipped, keeping last good mount set");
                return Err(err);
            }
        };

        let next_fingerprint = crate::loader::fingerprint(&records);
        if !force && next_fingerprint == self.mounts.fingerprint().await {
            return Ok(ReloadOutcome::Unchanged);
        }

        let set = build_mount_set(records, &self.filter);
        let mounted_paths = set.mounted_paths();
        self.mounts.swap(set).await;
        tracing::info!(mounts = mounted_paths.len(), "mount set reloaded");
        Ok(ReloadOutcome::Reloaded { mounted_paths })
    }

    async fn list_active(&self) -> ApiResult<Vec<toolgate_core::SpecRecord>> {
        match tokio::time::timeout(self.config.reconcile_timeout, self.store.list_active()).await {
            Ok(result) => result.map_err(ApiError::from),
            Err(_) => Err(ApiError::unavailable(format!(
                "spec store did not answer within {:?}",
                self.config.reconcile_timeout
            ))),
        }
    }

    /// Periodic polling loop. Runs until the process exits.
    pub async fn run(self: Arc<Self>) {
        if self.config.polling_disabled {
            tracing::info!("spec polling disabled");
            return;
        }
        let mut ticker = tokio::time::interval(self.config.polling_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // interval fires immediately; the initial load already happened.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match self.reload_if_changed().await {
                Ok(ReloadOutcome::Unchanged) => {
                    tracing::debug!("reconcile: no change");
                }
                Ok(ReloadOutcome::Reloaded { mounted_paths }) => {
                    tracing::info!(?mounted_paths, "reconcile: remounted");
                }
                Err(err) => {
                    tracing::warn!(error = %err, "reconcile failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CreateSpec, SpecStore};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use toolgate_core::{FileFormat, SpecRecord, StoreError};

    const PETS: &str = r#"{
        "openapi": "3.0.0",
        "info": {"title": "Pets", "version": "1"},
        "paths": {"/pets": {"get": {"operationId": "listPets"}}}
    }"#;

    struct FakeStore {
        records: std::sync::Mutex<Vec<SpecRecord>>,
        unavailable: AtomicBool,
    }

    impl FakeStore {
        fn with(records: Vec<SpecRecord>) -> Self {
            Self {
                records: std::sync::Mutex::new(records),
                unavailable: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl SpecStore for FakeStore {
        async fn list_active(&self) -> Result<Vec<SpecRecord>, StoreError> {
            if self.unavailable.load(Ordering::SeqCst) {
                return Err(StoreError::unavailable("down"));
            }
            Ok(self
                .records
                .lock()
                .expect("lock")
                .iter()
                .filter(|r| r.active)
                .cloned()
                .collect())
        }

        async fn list_all(&self) -> Result<Vec<SpecRecord>, StoreError> {
            Ok(self.records.lock().expect("lock").clone())
        }

        async fn get(&self, id: i64) -> Result<SpecRecord, StoreError> {
            self.records
                .lock()
                .expect("lock")
                .iter()
                .find(|r| r.id == id)
                .cloned()
                .ok_or_else(|| StoreError::not_found(id))
        }

        async fn create_from_content(&self, _spec: CreateSpec) -> Result<SpecRecord, StoreError> {
            Err(StoreError::unavailable("not in this test"))
        }

        async fn delete(&self, _id: i64) -> Result<(), StoreError> {
            Err(StoreError::unavailable("not in this test"))
        }

        async fn set_active(&self, id: i64, active: bool) -> Result<SpecRecord, StoreError> {
            let mut records = self.records.lock().expect("lock");
            let record = records
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or_else(|| StoreError::not_found(id))?;
            record.active = active;
            Ok(record.clone())
        }

        async fn set_token(&self, _id: i64, _token: Option<String>) -> Result<SpecRecord, StoreError> {
            Err(StoreError::unavailable("not in this test"))
        }

        async fn health_check(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    fn record(id: i64, name: &str) -> SpecRecord {
        SpecRecord {
            id,
            name: name.to_string(),
            endpoint_path: format!("/{}", name),
            spec_content: PETS.to_string(),
            file_format: FileFormat::Json,
            api_key_token: None,
            active: true,
            title: None,
            version: None,
            file_size: PETS.len() as i64,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn reconciler(store: Arc<FakeStore>) -> (Arc<Reconciler>, Arc<MountTable>) {
        let mounts = Arc::new(MountTable::new());
        let reconciler = Arc::new(Reconciler::new(
            store,
            mounts.clone(),
            Arc::new(GatewayConfig::default()),
            OperationFilter::all(),
        ));
        (reconciler, mounts)
    }

    #[tokio::test]
    async fn test_reload_idempotent() {
        let store = Arc::new(FakeStore::with(vec![record(1, "pets")]));
        let (reconciler, _mounts) = reconciler(store);

        reconciler.initial_load().await.expect("initial load");
        assert_eq!(
            reconciler.reload_if_changed().await.expect("first"),
            ReloadOutcome::Unchanged
        );
        assert_eq!(
            reconciler.reload_if_changed().await.expect("second"),
            ReloadOutcome::Unchanged
        );
    }

    #[tokio::test]
    async fn test_deactivation_unmounts() {
        let store = Arc::new(FakeStore::with(vec![record(1, "pets"), record(2, "weather")]));
        let (reconciler, mounts) = reconciler(store.clone());

        assert_eq!(reconciler.initial_load().await.expect("load"), 2);

        store.set_active(2, false).await.expect("deactivate");
        let outcome = reconciler.reload_if_changed().await.expect("reload");
        assert_eq!(
            outcome,
            ReloadOutcome::Reloaded {
                mounted_paths: vec!["/pets".to_string()]
            }
        );
        let snapshot = mounts.snapshot().await;
        assert!(snapshot.match_path("/weather").is_none());
        assert!(snapshot.match_path("/pets").is_some());
    }

    #[tokio::test]
    async fn test_store_outage_keeps_last_set() {
        let store = Arc::new(FakeStore::with(vec![record(1, "pets")]));
        let (reconciler, mounts) = reconciler(store.clone());
        reconciler.initial_load().await.expect("load");

        store.unavailable.store(true, Ordering::SeqCst);
        assert!(reconciler.reload_if_changed().await.is_err());

        // The last good set still serves.
        assert!(mounts.snapshot().await.match_path("/pets").is_some());
    }

    #[tokio::test]
    async fn test_forced_reload_rebuilds() {
        let store = Arc::new(FakeStore::with(vec![record(1, "pets")]));
        let (reconciler, _mounts) = reconciler(store);
        reconciler.initial_load().await.expect("load");

        let outcome = reconciler.reload(true).await.expect("forced");
        assert!(matches!(outcome, ReloadOutcome::Reloaded { .. }));
    }
}
