//! UploadTask - host から呼ばれる 1 回分の仕事
//!
//! 保存済みの destination と credential をここで解決し、SyncConfig にして
//! synchronizer に渡す。synchronizer 自身はどちらも読みに行かない。

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::app::synchronizer::UploadSynchronizer;
use crate::domain::{LocalArtifact, PassReport, PassScope, SyncConfig, SyncError};
use crate::host::PassRunner;
use crate::ports::{CredentialProvider, DestinationStore};

pub struct UploadTask {
    synchronizer: Arc<UploadSynchronizer>,
    destinations: Arc<dyn DestinationStore>,
    credentials: Arc<dyn CredentialProvider>,
}

impl UploadTask {
    pub fn new(
        synchronizer: Arc<UploadSynchronizer>,
        destinations: Arc<dyn DestinationStore>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            synchronizer,
            destinations,
            credentials,
        }
    }

    pub fn synchronizer(&self) -> &UploadSynchronizer {
        &self.synchronizer
    }

    /// Resolve the persisted destination and a fresh token.
    ///
    /// destination が無ければ Configuration、token が取れなければ Auth。
    /// どちらも network には触れない。
    pub async fn prepare(&self) -> Result<SyncConfig, SyncError> {
        let destination = self
            .destinations
            .load()
            .map_err(|e| SyncError::Configuration(e.to_string()))?
            .ok_or_else(|| SyncError::Configuration("no destination folder selected".into()))?;
        let credential = self.credentials.access_token().await?;
        debug!(destination = %destination, "pass configuration resolved");
        Ok(SyncConfig::new(destination, credential))
    }

    pub async fn pending(&self, scope: &PassScope) -> Result<Vec<LocalArtifact>, SyncError> {
        let config = self.prepare().await?;
        self.synchronizer.pending(&config, scope).await
    }
}

#[async_trait]
impl PassRunner for UploadTask {
    async fn run(&self, scope: &PassScope) -> Result<PassReport, SyncError> {
        let config = match self.prepare().await {
            Ok(config) => config,
            Err(err) => {
                self.synchronizer.report_unstarted(&err);
                return Err(err);
            }
        };
        self.synchronizer.run_pass(&config, scope).await
    }
}
