//! LocalCatalog port - 録音済みファイルの索引（Recording Source 側）
//!
//! catalog は外部協力者。recsync は読むだけで、書き換えも削除もしない。

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{ContentStream, LocalArtifact, SyncError};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("artifact content not found: {0}")]
    NotFound(String),

    #[error("catalog I/O: {0}")]
    Io(#[from] std::io::Error),
}

impl From<CatalogError> for SyncError {
    fn from(err: CatalogError) -> Self {
        SyncError::Transport(format!("local read failed: {err}"))
    }
}

/// Index of committed recordings.
///
/// # 設計原則
/// - `list_artifacts` は namespace 配下の committed なものだけを返す（pending は除外）
/// - 返す順序が「自然な列挙順」（作成時刻の降順）で、delta もこの順を保つ
/// - `open` は毎回新しいストリームを返す（1 attempt につき 1 回だけ読む）
#[async_trait]
pub trait LocalCatalog: Send + Sync {
    async fn list_artifacts(&self, namespace: &str) -> Result<Vec<LocalArtifact>, CatalogError>;

    async fn open(&self, artifact: &LocalArtifact) -> Result<ContentStream, CatalogError>;
}
