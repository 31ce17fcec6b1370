//! SynchronizerBuilder - synchronizer の構築とワイヤリング
//!
//! # Fail-fast 設計
//! - catalog と remote store は必須
//! - build() 時に namespace / parent を検証し、不正なら BuildError を返す
//! - clock / id generator / status sink は省略時に本番用の実装を使う

use std::sync::Arc;

use crate::app::synchronizer::{SyncOptions, UploadSynchronizer};
use crate::domain::FolderId;
use crate::ports::{
    Clock, IdGenerator, LocalCatalog, NoopStatusSink, RemoteStore, StatusSink, SystemClock,
    UlidGenerator,
};

/// Default recording namespace inside the catalog.
pub const DEFAULT_NAMESPACE: &str = "Recordings/recsync";

/// Default parent of the destination folder.
pub const DEFAULT_PARENT: &str = "root";

/// # 使用例
/// ```ignore
/// let synchronizer = SynchronizerBuilder::new(catalog, remote)
///     .namespace("Recordings/recsync")
///     .status_sink(Arc::new(TracingStatusSink))
///     .build()?;
/// ```
pub struct SynchronizerBuilder {
    catalog: Arc<dyn LocalCatalog>,
    remote: Arc<dyn RemoteStore>,
    status: Arc<dyn StatusSink>,
    clock: Arc<dyn Clock>,
    ids: Option<Arc<dyn IdGenerator>>,
    namespace: String,
    parent: String,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("recording namespace must not be empty")]
    EmptyNamespace,

    #[error("destination parent folder id must not be empty")]
    EmptyParent,
}

impl SynchronizerBuilder {
    pub fn new(catalog: Arc<dyn LocalCatalog>, remote: Arc<dyn RemoteStore>) -> Self {
        Self {
            catalog,
            remote,
            status: Arc::new(NoopStatusSink),
            clock: Arc::new(SystemClock),
            ids: None,
            namespace: DEFAULT_NAMESPACE.to_string(),
            parent: DEFAULT_PARENT.to_string(),
        }
    }

    pub fn status_sink(mut self, status: Arc<dyn StatusSink>) -> Self {
        self.status = status;
        self
    }

    /// Also drives the id generator's timestamps unless `ids` is set.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = parent.into();
        self
    }

    pub fn build(self) -> Result<UploadSynchronizer, BuildError> {
        let namespace = self.namespace.trim().trim_matches('/').to_string();
        if namespace.is_empty() {
            return Err(BuildError::EmptyNamespace);
        }
        let parent = self.parent.trim().to_string();
        if parent.is_empty() {
            return Err(BuildError::EmptyParent);
        }
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(Arc::clone(&self.clock))));

        Ok(UploadSynchronizer::new(
            self.catalog,
            self.remote,
            self.status,
            self.clock,
            ids,
            SyncOptions {
                namespace,
                parent: FolderId::new(parent),
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::memory::{InMemoryCatalog, InMemoryRemoteStore};

    fn builder() -> SynchronizerBuilder {
        SynchronizerBuilder::new(
            Arc::new(InMemoryCatalog::new()),
            Arc::new(InMemoryRemoteStore::new()),
        )
    }

    #[test]
    fn test_build_with_defaults() {
        let sync = builder().build().unwrap();
        assert_eq!(sync.options().namespace, DEFAULT_NAMESPACE);
        assert_eq!(sync.options().parent.as_str(), DEFAULT_PARENT);
    }

    #[test]
    fn test_namespace_is_normalized() {
        let sync = builder().namespace("/Recordings/mine/").build().unwrap();
        assert_eq!(sync.options().namespace, "Recordings/mine");
    }

    #[test]
    fn test_build_rejects_empty_namespace() {
        let result = builder().namespace("  / ").build();
        assert!(matches!(result, Err(BuildError::EmptyNamespace)));
    }

    #[test]
    fn test_build_rejects_empty_parent() {
        let result = builder().parent("").build();
        assert!(matches!(result, Err(BuildError::EmptyParent)));
    }
}
