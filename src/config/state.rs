// Application state module
// Holds the active deployment and runtime caches

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::types::Config;
use crate::app::SessionStore;
use crate::logger;
use crate::routing::{Deployment, DeploymentError};

/// Application state
pub struct AppState {
    pub config: Config,
    deployment: RwLock<Arc<Deployment>>,

    // Cached config values for fast access without locks
    pub cached_access_log: Arc<AtomicBool>,

    /// Sessions of the built-in application
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(config: &Config, deployment: Deployment) -> Self {
        Self {
            config: config.clone(),
            deployment: RwLock::new(Arc::new(deployment)),
            cached_access_log: Arc::new(AtomicBool::new(config.logging.access_log)),
            sessions: SessionStore::new(),
        }
    }

    /// Snapshot of the active deployment
    pub async fn deployment(&self) -> Arc<Deployment> {
        Arc::clone(&*self.deployment.read().await)
    }

    /// Re-read the manifest from disk and swap it in
    ///
    /// The active deployment is kept when the new manifest fails to load.
    pub async fn reload_deployment(&self) -> Result<(), DeploymentError> {
        let path = &self.config.deploy.manifest_path;
        let deployment = Deployment::load(path)?;
        logger::log_manifest_loaded(path, &deployment);
        *self.deployment.write().await = Arc::new(deployment);
        Ok(())
    }

    pub fn access_log_enabled(&self) -> bool {
        self.cached_access_log.load(Ordering::Relaxed)
    }
}
