//! Shared application state for Axum routers.

use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::invoke::Invoker;
use crate::mounts::MountTable;
use crate::reconciler::Reconciler;
use crate::routes::mcp::SessionRegistry;
use crate::store::SpecStore;

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SpecStore>,
    pub mounts: Arc<MountTable>,
    pub sessions: Arc<SessionRegistry>,
    pub invoker: Invoker,
    pub reconciler: Arc<Reconciler>,
    pub config: Arc<GatewayConfig>,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(
        store: Arc<dyn SpecStore>,
        mounts: Arc<MountTable>,
        reconciler: Arc<Reconciler>,
        config: Arc<GatewayConfig>,
    ) -> Self {
        Self {
            sessions: Arc::new(SessionRegistry::new(config.clone())),
            invoker: Invoker::new(config.clone()),
            store,
            mounts,
            reconciler,
            config,
            start_time: std::time::Instant::now(),
        }
    }
}
