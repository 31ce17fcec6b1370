//! RemoteStore port - 転送先のクラウドストレージ
//!
//! すべての呼び出しは pass ごとの bearer token を受け取る。
//! エラーはこの層で `SyncError` に写像済みであること（401 → Auth、その他 → Transport）。

use async_trait::async_trait;

use crate::domain::{AccessToken, ContentStream, FolderId, RemoteEntry, RemoteId, SyncError};

/// One page of a folder listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemotePage {
    pub entries: Vec<RemoteEntry>,

    /// Present when more pages follow.
    pub next_page_token: Option<String>,
}

/// Metadata sent alongside the content of a new file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRemoteFile {
    pub name: String,
    pub mime_type: String,

    /// Expected content length, when the catalog knows it.
    pub size: Option<u64>,
}

/// What the store reports back after an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub remote_id: RemoteId,

    /// Size as stored remotely, if the store reports it.
    pub size: Option<u64>,
}

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// First non-trashed folder named exactly `name` directly under `parent`.
    async fn find_folder(
        &self,
        token: &AccessToken,
        name: &str,
        parent: &FolderId,
    ) -> Result<Option<FolderId>, SyncError>;

    async fn create_folder(
        &self,
        token: &AccessToken,
        name: &str,
        parent: &FolderId,
    ) -> Result<FolderId, SyncError>;

    /// One page of the non-trashed children of `folder`.
    async fn list_page(
        &self,
        token: &AccessToken,
        folder: &FolderId,
        page_token: Option<&str>,
    ) -> Result<RemotePage, SyncError>;

    /// Create-and-upload in one non-resumable request. `content` is consumed once.
    async fn upload(
        &self,
        token: &AccessToken,
        folder: &FolderId,
        file: &NewRemoteFile,
        content: ContentStream,
    ) -> Result<UploadedFile, SyncError>;
}
