//! DirectoryRemoteStore - ローカル（またはマウント済み）ディレクトリを転送先にする
//!
//! Drive 以外の置き場、たとえば同期フォルダや NAS のマウントへ録音を押し出す。
//! folder id は root からの相対パス（`/` 区切り）。`root` は root 自身。
//! 書き込み中のファイルは `.partial-` 名で置き、完了後に rename する。
//! bearer token は使わない。

use std::io;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::app::DEFAULT_PARENT;
use crate::domain::{AccessToken, ContentStream, FolderId, RemoteEntry, RemoteId, SyncError};
use crate::ports::{NewRemoteFile, RemotePage, RemoteStore, UploadedFile};

pub const PARTIAL_PREFIX: &str = ".partial-";

#[derive(Debug, Clone)]
pub struct DirectoryRemoteStore {
    root: PathBuf,
}

impl DirectoryRemoteStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn folder_path(&self, folder: &FolderId) -> Result<PathBuf, SyncError> {
        if folder.as_str() == DEFAULT_PARENT {
            return Ok(self.root.clone());
        }
        let mut path = self.root.clone();
        for segment in folder.as_str().split('/') {
            path.push(checked_name(segment)?);
        }
        Ok(path)
    }

    fn child_id(parent: &FolderId, name: &str) -> String {
        if parent.as_str() == DEFAULT_PARENT {
            name.to_string()
        } else {
            format!("{parent}/{name}")
        }
    }
}

/// A single plain path component; anything that could escape the folder is rejected.
fn checked_name(name: &str) -> Result<&str, SyncError> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !name.contains(['/', '\\']) => Ok(name),
        _ => Err(SyncError::Configuration(format!(
            "{name:?} is not a plain file or folder name"
        ))),
    }
}

fn io_error(op: &str, path: &Path, err: io::Error) -> SyncError {
    SyncError::Transport(format!("{op} {}: {err}", path.display()))
}

#[async_trait]
impl RemoteStore for DirectoryRemoteStore {
    async fn find_folder(
        &self,
        _token: &AccessToken,
        name: &str,
        parent: &FolderId,
    ) -> Result<Option<FolderId>, SyncError> {
        let path = self.folder_path(parent)?.join(checked_name(name)?);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => Ok(Some(FolderId::new(Self::child_id(parent, name)))),
            Ok(_) => Ok(None),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_error("find folder", &path, err)),
        }
    }

    async fn create_folder(
        &self,
        _token: &AccessToken,
        name: &str,
        parent: &FolderId,
    ) -> Result<FolderId, SyncError> {
        let path = self.folder_path(parent)?.join(checked_name(name)?);
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|e| io_error("create folder", &path, e))?;
        info!(path = %path.display(), "destination folder created");
        Ok(FolderId::new(Self::child_id(parent, name)))
    }

    /// Whole folder in one page. Hidden and partially written files are not listed.
    async fn list_page(
        &self,
        _token: &AccessToken,
        folder: &FolderId,
        _page_token: Option<&str>,
    ) -> Result<RemotePage, SyncError> {
        let dir = self.folder_path(folder)?;
        let mut read_dir = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| io_error("list", &dir, e))?;

        let mut entries = Vec::new();
        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| io_error("list", &dir, e))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| io_error("list", &entry.path(), e))?;
            if !file_type.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                debug!(path = %entry.path().display(), "skipping non-UTF-8 name");
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            entries.push(RemoteEntry::new(Self::child_id(folder, &name), name));
        }
        entries.sort_by(|a, b| a.display_name.cmp(&b.display_name));

        Ok(RemotePage {
            entries,
            next_page_token: None,
        })
    }

    async fn upload(
        &self,
        _token: &AccessToken,
        folder: &FolderId,
        file: &NewRemoteFile,
        mut content: ContentStream,
    ) -> Result<UploadedFile, SyncError> {
        let dir = self.folder_path(folder)?;
        let name = checked_name(&file.name)?;
        let target = dir.join(name);
        if tokio::fs::try_exists(&target)
            .await
            .map_err(|e| io_error("upload", &target, e))?
        {
            return Err(SyncError::Transport(format!(
                "{} already exists",
                target.display()
            )));
        }

        let partial = dir.join(format!("{PARTIAL_PREFIX}{name}"));
        let written = async {
            let mut out = tokio::fs::File::create(&partial).await?;
            let copied = tokio::io::copy(&mut content, &mut out).await?;
            out.flush().await?;
            out.sync_all().await?;
            Ok::<_, io::Error>(copied)
        }
        .await;
        let size = match written {
            Ok(size) => size,
            Err(err) => {
                // 途中まで書けたファイルは残さない
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(io_error("upload", &target, err));
            }
        };
        tokio::fs::rename(&partial, &target)
            .await
            .map_err(|e| io_error("upload", &target, e))?;
        debug!(path = %target.display(), size, "file written");

        Ok(UploadedFile {
            remote_id: RemoteId::new(Self::child_id(folder, name)),
            size: Some(size),
        })
    }
}
