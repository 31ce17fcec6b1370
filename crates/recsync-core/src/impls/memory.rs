//! In-memory implementations (開発用・テスト用)
//!
//! # 含まれる実装
//! - **InMemoryRemoteStore**: フォルダとファイルを HashMap に持つ remote store。
//!   失敗の注入（transport / auth）、途中切れ、呼び出し回数の記録ができる
//! - **InMemoryCatalog**: namespace ごとの録音一覧
//! - **InMemoryDestinationStore**, **StaticCredential**, **RecordingStatusSink**

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use tokio::io::AsyncReadExt;
use tokio::sync::Mutex;

use crate::domain::{
    AccessToken, ContentLocator, ContentStream, FolderId, LocalArtifact, LocalId,
    RemoteEntry, RemoteFolderReference, RemoteId, SyncError, SyncEvent, mime_type_for,
};
use crate::ports::{
    AuthError, CatalogError, CredentialProvider, DestinationError, DestinationStore,
    LocalCatalog, NewRemoteFile, RemotePage, RemoteStore, StatusSink, UploadedFile,
};

#[derive(Debug, Clone)]
struct StoredFolder {
    id: FolderId,
    name: String,
    parent: FolderId,
}

#[derive(Debug, Clone)]
struct StoredFile {
    id: RemoteId,
    name: String,
    folder: FolderId,
    bytes: Vec<u8>,
}

#[derive(Debug, Default)]
struct RemoteState {
    folders: Vec<StoredFolder>,
    files: Vec<StoredFile>,
    next_id: u64,

    requests: usize,
    list_calls: usize,
    upload_attempts: HashMap<String, usize>,

    /// name → errors returned by the next uploads of that name
    upload_failures: HashMap<String, VecDeque<SyncError>>,
    listing_failures: VecDeque<SyncError>,

    /// name → bytes actually kept
    truncate: HashMap<String, usize>,
}

impl RemoteState {
    fn allocate(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    fn add_folder(&mut self, name: &str, parent: &FolderId) -> FolderId {
        let id = FolderId::new(self.allocate("folder"));
        self.folders.push(StoredFolder {
            id: id.clone(),
            name: name.to_string(),
            parent: parent.clone(),
        });
        id
    }

    fn add_file(&mut self, folder: &FolderId, name: &str, bytes: Vec<u8>) -> RemoteId {
        let id = RemoteId::new(self.allocate("file"));
        self.files.push(StoredFile {
            id: id.clone(),
            name: name.to_string(),
            folder: folder.clone(),
            bytes,
        });
        id
    }
}

/// Remote store kept in memory, with fault injection for tests.
#[derive(Debug)]
pub struct InMemoryRemoteStore {
    state: Mutex<RemoteState>,
    page_size: usize,

    /// When set, any other bearer is rejected with Auth.
    valid_token: Option<String>,
}

impl InMemoryRemoteStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RemoteState::default()),
            page_size: 100,
            valid_token: None,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_valid_token(mut self, bearer: impl Into<String>) -> Self {
        self.valid_token = Some(bearer.into());
        self
    }

    pub async fn seed_folder(&self, name: &str, parent: &FolderId) -> FolderId {
        self.state.lock().await.add_folder(name, parent)
    }

    pub async fn seed_file(&self, folder: &FolderId, name: &str, bytes: &[u8]) -> RemoteId {
        self.state.lock().await.add_file(folder, name, bytes.to_vec())
    }

    /// The next `times` uploads named `name` fail with `error`.
    pub async fn fail_uploads(&self, name: &str, error: SyncError, times: usize) {
        let mut state = self.state.lock().await;
        let queue = state.upload_failures.entry(name.to_string()).or_default();
        queue.extend(std::iter::repeat_n(error, times));
    }

    /// The next listing page request fails with `error`.
    pub async fn fail_listing(&self, error: SyncError) {
        self.state.lock().await.listing_failures.push_back(error);
    }

    /// Uploads named `name` keep only the first `keep` bytes, as an
    /// interrupted transfer would.
    pub async fn truncate_uploads(&self, name: &str, keep: usize) {
        self.state.lock().await.truncate.insert(name.to_string(), keep);
    }

    pub async fn folders_named(&self, name: &str) -> usize {
        let state = self.state.lock().await;
        state.folders.iter().filter(|f| f.name == name).count()
    }

    /// Names of the files in `folder`, in creation order.
    pub async fn file_names(&self, folder: &FolderId) -> Vec<String> {
        let state = self.state.lock().await;
        state
            .files
            .iter()
            .filter(|f| &f.folder == folder)
            .map(|f| f.name.clone())
            .collect()
    }

    pub async fn file_content(&self, folder: &FolderId, name: &str) -> Option<Vec<u8>> {
        let state = self.state.lock().await;
        state
            .files
            .iter()
            .find(|f| &f.folder == folder && f.name == name)
            .map(|f| f.bytes.clone())
    }

    pub async fn request_count(&self) -> usize {
        self.state.lock().await.requests
    }

    pub async fn list_calls(&self) -> usize {
        self.state.lock().await.list_calls
    }

    pub async fn upload_attempts(&self, name: &str) -> usize {
        let state = self.state.lock().await;
        state.upload_attempts.get(name).copied().unwrap_or(0)
    }

    pub async fn total_upload_attempts(&self) -> usize {
        self.state.lock().await.upload_attempts.values().sum()
    }

    fn authorize(&self, token: &AccessToken) -> Result<(), SyncError> {
        match &self.valid_token {
            Some(valid) if valid != token.bearer() => {
                Err(SyncError::Auth("bearer token rejected".to_string()))
            }
            _ => Ok(()),
        }
    }
}

impl Default for InMemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemoteStore {
    async fn find_folder(
        &self,
        token: &AccessToken,
        name: &str,
        parent: &FolderId,
    ) -> Result<Option<FolderId>, SyncError> {
        let mut state = self.state.lock().await;
        state.requests += 1;
        self.authorize(token)?;
        Ok(state
            .folders
            .iter()
            .find(|f| f.name == name && &f.parent == parent)
            .map(|f| f.id.clone()))
    }

    async fn create_folder(
        &self,
        token: &AccessToken,
        name: &str,
        parent: &FolderId,
    ) -> Result<FolderId, SyncError> {
        let mut state = self.state.lock().await;
        state.requests += 1;
        self.authorize(token)?;
        Ok(state.add_folder(name, parent))
    }

    async fn list_page(
        &self,
        token: &AccessToken,
        folder: &FolderId,
        page_token: Option<&str>,
    ) -> Result<RemotePage, SyncError> {
        let mut state = self.state.lock().await;
        state.requests += 1;
        state.list_calls += 1;
        self.authorize(token)?;
        if let Some(err) = state.listing_failures.pop_front() {
            return Err(err);
        }

        let offset = match page_token {
            Some(t) => t
                .parse::<usize>()
                .map_err(|_| SyncError::Transport(format!("invalid page token {t}")))?,
            None => 0,
        };
        let children: Vec<&StoredFile> =
            state.files.iter().filter(|f| &f.folder == folder).collect();
        let end = (offset + self.page_size).min(children.len());
        let entries = children
            .get(offset..end)
            .unwrap_or_default()
            .iter()
            .map(|f| RemoteEntry {
                remote_id: f.id.clone(),
                display_name: f.name.clone(),
            })
            .collect();
        let next_page_token = (end < children.len()).then(|| end.to_string());
        Ok(RemotePage {
            entries,
            next_page_token,
        })
    }

    async fn upload(
        &self,
        token: &AccessToken,
        folder: &FolderId,
        file: &NewRemoteFile,
        mut content: ContentStream,
    ) -> Result<UploadedFile, SyncError> {
        {
            let mut state = self.state.lock().await;
            state.requests += 1;
            *state.upload_attempts.entry(file.name.clone()).or_default() += 1;
            self.authorize(token)?;
            if let Some(err) = state
                .upload_failures
                .get_mut(&file.name)
                .and_then(VecDeque::pop_front)
            {
                return Err(err);
            }
        }

        let mut bytes = Vec::new();
        content
            .read_to_end(&mut bytes)
            .await
            .map_err(|e| SyncError::Transport(format!("upload stream failed: {e}")))?;

        let mut state = self.state.lock().await;
        if let Some(&keep) = state.truncate.get(&file.name) {
            bytes.truncate(keep);
        }
        let size = bytes.len() as u64;
        let remote_id = state.add_file(folder, &file.name, bytes);
        Ok(UploadedFile {
            remote_id,
            size: Some(size),
        })
    }
}

#[derive(Debug, Clone)]
struct CatalogEntry {
    namespace: String,
    artifact: LocalArtifact,
    bytes: Vec<u8>,
}

/// Catalog kept in memory. Lists newest first, like the filesystem catalog.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    entries: Mutex<Vec<CatalogEntry>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit a recording; its size is the content length.
    pub async fn add(&self, namespace: &str, name: &str, bytes: &[u8]) -> LocalId {
        self.add_with_size(namespace, name, bytes, bytes.len() as u64)
            .await
    }

    /// Commit a recording whose catalog size differs from its readable content.
    pub async fn add_with_size(&self, namespace: &str, name: &str, bytes: &[u8], size: u64) -> LocalId {
        let mut entries = self.entries.lock().await;
        let seq = entries.len() + 1;
        let local_id = LocalId::new(seq.to_string());
        let artifact = LocalArtifact {
            local_id: local_id.clone(),
            display_name: name.to_string(),
            mime_type: mime_type_for(name).to_string(),
            content: ContentLocator::new(format!("memory://{namespace}/{seq}")),
            size: Some(size),
            created_at: base_time() + Duration::seconds(seq as i64),
        };
        entries.push(CatalogEntry {
            namespace: namespace.to_string(),
            artifact,
            bytes: bytes.to_vec(),
        });
        local_id
    }
}

fn base_time() -> DateTime<Utc> {
    Utc.timestamp_opt(1_704_067_200, 0)
        .single()
        .unwrap_or_default()
}

#[async_trait]
impl LocalCatalog for InMemoryCatalog {
    async fn list_artifacts(&self, namespace: &str) -> Result<Vec<LocalArtifact>, CatalogError> {
        let entries = self.entries.lock().await;
        Ok(entries
            .iter()
            .rev()
            .filter(|e| e.namespace == namespace)
            .map(|e| e.artifact.clone())
            .collect())
    }

    async fn open(&self, artifact: &LocalArtifact) -> Result<ContentStream, CatalogError> {
        let entries = self.entries.lock().await;
        let entry = entries
            .iter()
            .find(|e| e.artifact.local_id == artifact.local_id)
            .ok_or_else(|| CatalogError::NotFound(artifact.local_id.to_string()))?;
        Ok(Box::new(std::io::Cursor::new(entry.bytes.clone())))
    }
}

#[derive(Debug, Default)]
pub struct InMemoryDestinationStore {
    value: StdMutex<Option<RemoteFolderReference>>,
}

impl InMemoryDestinationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DestinationStore for InMemoryDestinationStore {
    fn load(&self) -> Result<Option<RemoteFolderReference>, DestinationError> {
        Ok(self.value.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn save(&self, destination: &RemoteFolderReference) -> Result<(), DestinationError> {
        *self.value.lock().unwrap_or_else(|e| e.into_inner()) = Some(destination.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), DestinationError> {
        *self.value.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}

/// Fixed credential, or none at all.
#[derive(Debug, Clone)]
pub struct StaticCredential(Option<AccessToken>);

impl StaticCredential {
    pub fn token(bearer: impl Into<String>) -> Self {
        Self(Some(AccessToken::new(bearer)))
    }

    pub fn from_token(token: AccessToken) -> Self {
        Self(Some(token))
    }

    /// No identity established.
    pub fn signed_out() -> Self {
        Self(None)
    }
}

#[async_trait]
impl CredentialProvider for StaticCredential {
    async fn access_token(&self) -> Result<AccessToken, AuthError> {
        self.0
            .clone()
            .ok_or_else(|| AuthError("no signed-in account".to_string()))
    }
}

/// Keeps every event it receives.
#[derive(Debug, Default)]
pub struct RecordingStatusSink {
    events: StdMutex<Vec<SyncEvent>>,
}

impl RecordingStatusSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SyncEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl StatusSink for RecordingStatusSink {
    fn emit(&self, event: &SyncEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn catalog_lists_newest_first_per_namespace() {
        let catalog = InMemoryCatalog::new();
        catalog.add("ns", "a.m4a", b"a").await;
        catalog.add("other", "x.m4a", b"x").await;
        catalog.add("ns", "b.m4a", b"bb").await;

        let listed = catalog.list_artifacts("ns").await.unwrap();
        let names: Vec<_> = listed.iter().map(|a| a.display_name.as_str()).collect();
        assert_eq!(names, vec!["b.m4a", "a.m4a"]);
        assert!(listed[0].created_at > listed[1].created_at);
        assert_eq!(listed[0].size, Some(2));
    }

    #[tokio::test]
    async fn uploaded_content_is_stored() {
        let store = InMemoryRemoteStore::new();
        let token = AccessToken::new("t");
        let folder = store.seed_folder("recsync", &FolderId::new("root")).await;
        let file = NewRemoteFile {
            name: "a.m4a".into(),
            mime_type: "audio/mp4".into(),
            size: Some(3),
        };

        let uploaded = store
            .upload(&token, &folder, &file, Box::new(&b"abc"[..]))
            .await
            .unwrap();

        assert_eq!(uploaded.size, Some(3));
        assert_eq!(store.file_content(&folder, "a.m4a").await.unwrap(), b"abc");
        assert_eq!(store.file_names(&folder).await, vec!["a.m4a"]);
    }

    #[tokio::test]
    async fn injected_failures_are_consumed() {
        let store = InMemoryRemoteStore::new();
        let token = AccessToken::new("t");
        let folder = FolderId::new("f");
        let file = NewRemoteFile {
            name: "a.m4a".into(),
            mime_type: "audio/mp4".into(),
            size: None,
        };
        store
            .fail_uploads("a.m4a", SyncError::Transport("reset".into()), 1)
            .await;

        let first = store.upload(&token, &folder, &file, Box::new(&b"x"[..])).await;
        let second = store.upload(&token, &folder, &file, Box::new(&b"x"[..])).await;

        assert!(matches!(first, Err(SyncError::Transport(_))));
        assert!(second.is_ok());
        assert_eq!(store.upload_attempts("a.m4a").await, 2);
    }

    #[tokio::test]
    async fn signed_out_credential_is_an_auth_error() {
        let err = StaticCredential::signed_out().access_token().await.unwrap_err();
        assert_eq!(SyncError::from(err), SyncError::Auth("no signed-in account".into()));
    }
}
