//! FsCatalog - ディレクトリを録音 catalog として扱う
//!
//! `<root>/<namespace>` 配下を再帰的に列挙する。書き込み途中のファイルは
//! `.pending-` で始まる名前にしておき、rename で commit する。
//! 隠しファイルと pending は列挙しない。

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::domain::{
    ContentLocator, ContentStream, LocalArtifact, LocalId, mime_type_for, recording_display_name,
};
use crate::ports::{CatalogError, Clock, LocalCatalog, SystemClock};

pub const PENDING_PREFIX: &str = ".pending-";

pub struct FsCatalog {
    root: PathBuf,
    clock: Arc<dyn Clock>,
}

impl FsCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Clock used to name imported recordings.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn namespace_dir(&self, namespace: &str) -> PathBuf {
        namespace
            .split('/')
            .filter(|s| !s.is_empty())
            .fold(self.root.clone(), |dir, segment| dir.join(segment))
    }

    /// Copy `source` into `namespace` under a generated recording name.
    ///
    /// The copy is written to a pending name first and renamed once complete,
    /// so a listing never sees a half-written file.
    pub async fn import(&self, namespace: &str, source: &Path) -> Result<LocalArtifact, CatalogError> {
        let dir = self.namespace_dir(namespace);
        tokio::fs::create_dir_all(&dir).await?;

        let extension = source
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let name = recording_display_name(self.clock.now(), extension);
        let target = dir.join(&name);
        if tokio::fs::try_exists(&target).await? {
            return Err(CatalogError::Io(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("recording {name} already exists"),
            )));
        }

        let pending = dir.join(format!("{PENDING_PREFIX}{name}"));
        if let Err(err) = tokio::fs::copy(source, &pending).await {
            // 途中まで書けたファイルは残さない
            let _ = tokio::fs::remove_file(&pending).await;
            return Err(err.into());
        }
        tokio::fs::rename(&pending, &target).await?;
        info!(name = %name, source = %source.display(), "recording imported");

        let metadata = tokio::fs::metadata(&target).await?;
        Ok(self.artifact(&dir, &target, &metadata))
    }

    fn artifact(&self, dir: &Path, path: &Path, metadata: &std::fs::Metadata) -> LocalArtifact {
        let display_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let relative = path.strip_prefix(dir).unwrap_or(path);
        let local_id = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let created_at = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| self.clock.now());
        LocalArtifact {
            local_id: LocalId::new(local_id),
            mime_type: mime_type_for(&display_name).to_string(),
            display_name,
            content: ContentLocator::new(path.to_string_lossy()),
            size: Some(metadata.len()),
            created_at,
        }
    }
}

fn is_listed(name: &str) -> bool {
    !name.starts_with('.') && !name.starts_with(PENDING_PREFIX)
}

#[async_trait]
impl LocalCatalog for FsCatalog {
    async fn list_artifacts(&self, namespace: &str) -> Result<Vec<LocalArtifact>, CatalogError> {
        let dir = self.namespace_dir(namespace);
        if !tokio::fs::try_exists(&dir).await? {
            debug!(dir = %dir.display(), "namespace directory does not exist yet");
            return Ok(Vec::new());
        }

        let mut artifacts = Vec::new();
        let mut pending_dirs = vec![dir.clone()];
        while let Some(current) = pending_dirs.pop() {
            let mut entries = tokio::fs::read_dir(&current).await?;
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name();
                if !is_listed(&name.to_string_lossy()) {
                    continue;
                }
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending_dirs.push(entry.path());
                } else if file_type.is_file() {
                    let metadata = entry.metadata().await?;
                    artifacts.push(self.artifact(&dir, &entry.path(), &metadata));
                }
            }
        }

        // 作成時刻の新しい順。同時刻は名前順
        artifacts.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.display_name.cmp(&b.display_name))
        });
        debug!(namespace, count = artifacts.len(), "catalog listed");
        Ok(artifacts)
    }

    async fn open(&self, artifact: &LocalArtifact) -> Result<ContentStream, CatalogError> {
        match tokio::fs::File::open(artifact.content.as_str()).await {
            Ok(file) => Ok(Box::new(file)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Err(CatalogError::NotFound(artifact.content.as_str().to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }
}
