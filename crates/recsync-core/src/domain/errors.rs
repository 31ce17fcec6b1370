//! Errors - エラー型と分類
//!
//! pass の境界を越えるエラーは `SyncError` の 4 種類に閉じている。
//! 生の transport エラー（reqwest など）が host 側に漏れることはない。

use thiserror::Error;

/// ErrorKind は実行エラーの運用分類
///
/// - Transient: 一時的なエラー（host がリトライする）
/// - Permanent: 恒久的なエラー（ユーザー操作なしにリトライしても無意味）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    Permanent,
}

/// Closed set of failures a pass (or a single transfer inside it) can hit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// No destination folder has been chosen, or it is unusable.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// No identity established, or the bearer token was rejected.
    #[error("authentication error: {0}")]
    Auth(String),

    /// Network failure, timeout, non-2xx response, or a local read failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The upload finished but fewer (or different) bytes reached the remote store.
    #[error("partial content for {name}: expected {expected} bytes, got {actual}")]
    PartialContent {
        name: String,
        expected: u64,
        actual: u64,
    },
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Configuration(_) | SyncError::Auth(_) => ErrorKind::Permanent,
            SyncError::Transport(_) | SyncError::PartialContent { .. } => ErrorKind::Transient,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    /// Auth failures poison every later request in the same pass.
    pub fn aborts_pass(&self) -> bool {
        matches!(self, SyncError::Auth(_) | SyncError::Configuration(_))
    }

    /// Short reason for status text and notifications.
    pub fn short_reason(&self) -> &'static str {
        match self {
            SyncError::Configuration(_) => "no destination folder",
            SyncError::Auth(_) => "sign-in required",
            SyncError::Transport(_) => "network error",
            SyncError::PartialContent { .. } => "incomplete upload",
        }
    }
}
