//! UploadSynchronizer - one pass of local → remote push.
//!
//! # フロー
//! 1. token の期限を確認（期限切れなら転送せずに Auth で終了）
//! 2. 転送先フォルダを get-or-create
//! 3. remote の一覧を全ページ取得（キャッシュしない）
//! 4. catalog を列挙して delta を計算
//! 5. delta の順に 1 件ずつ転送（並列化しない）
//! 6. 転送後にバイト数を検証し、pass の結果を分類して返す
//!
//! 再試行もバックオフもここではしない。host が `PassOutcome` を見て決める。

use std::sync::Arc;

use tracing::{Instrument, debug, info, info_span, warn};

use crate::app::remote::{list_remote_entries, resolve_folder};
use crate::domain::{
    AccessToken, CountingReader, FolderId, LocalArtifact, PassId, PassReport, PassScope,
    SyncConfig, SyncError, SyncEvent, TransferSet, TransferStatus, TransferSummary, UploadCheck,
    compute_delta, remote_names,
};
use crate::ports::{Clock, IdGenerator, LocalCatalog, NewRemoteFile, RemoteStore, StatusSink};

/// Static options fixed at construction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Catalog namespace holding this app's recordings.
    pub namespace: String,

    /// Parent under which the destination folder is resolved.
    pub parent: FolderId,
}

pub struct UploadSynchronizer {
    catalog: Arc<dyn LocalCatalog>,
    remote: Arc<dyn RemoteStore>,
    status: Arc<dyn StatusSink>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    options: SyncOptions,
}

impl UploadSynchronizer {
    pub fn new(
        catalog: Arc<dyn LocalCatalog>,
        remote: Arc<dyn RemoteStore>,
        status: Arc<dyn StatusSink>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        options: SyncOptions,
    ) -> Self {
        Self {
            catalog,
            remote,
            status,
            clock,
            ids,
            options,
        }
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Run one pass over `scope`.
    ///
    /// `Err` means the pass never finished its per-artifact loop: configuration and
    /// auth errors are terminal, transport errors before the loop are retryable.
    pub async fn run_pass(
        &self,
        config: &SyncConfig,
        scope: &PassScope,
    ) -> Result<PassReport, SyncError> {
        let pass_id = self.ids.generate_pass_id();
        let span = info_span!("pass", %pass_id, destination = %config.destination);
        async {
            let result = self.run_pass_inner(pass_id, config, scope).await;
            match &result {
                Ok(report) => info!(
                    outcome = ?report.outcome,
                    uploaded = report.uploaded(),
                    failed = report.failed(),
                    skipped = report.skipped(),
                    "pass finished"
                ),
                Err(err) => {
                    warn!(error = %err, retryable = err.is_retryable(), "pass aborted");
                    self.status.emit(&SyncEvent::failed(pass_id, err));
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Surface a failure that happened before a pass could start
    /// (no destination, no credential).
    pub fn report_unstarted(&self, error: &SyncError) {
        let pass_id = self.ids.generate_pass_id();
        warn!(%pass_id, error = %error, "pass not started");
        self.status.emit(&SyncEvent::failed(pass_id, error));
    }

    /// Artifacts a pass would transfer right now, without transferring anything.
    pub async fn pending(
        &self,
        config: &SyncConfig,
        scope: &PassScope,
    ) -> Result<Vec<LocalArtifact>, SyncError> {
        let token = &config.credential;
        self.check_token(token)?;
        let folder_id = resolve_folder(
            self.remote.as_ref(),
            token,
            config.destination.folder_name(),
            &self.options.parent,
        )
        .await?;
        let (_, delta) = self.delta(token, &folder_id, scope).await?;
        Ok(delta)
    }

    async fn run_pass_inner(
        &self,
        pass_id: PassId,
        config: &SyncConfig,
        scope: &PassScope,
    ) -> Result<PassReport, SyncError> {
        let started_at = self.clock.now();
        let token = &config.credential;
        self.status.emit(&SyncEvent::Connecting { pass_id });

        // fail fast: nothing below may touch the network with a dead token
        self.check_token(token)?;

        let folder_id = resolve_folder(
            self.remote.as_ref(),
            token,
            config.destination.folder_name(),
            &self.options.parent,
        )
        .await?;

        let (candidates, delta) = self.delta(token, &folder_id, scope).await?;
        let mut transfers = TransferSet::new(delta, &folder_id);
        let total = transfers.len();
        info!(folder_id = %folder_id, candidates, total, "delta computed");

        for index in 0..total {
            if !transfers.start(index, self.clock.now()) {
                // a same-named transfer is still marked in flight
                continue;
            }
            let Some(task) = transfers.get(index) else {
                continue;
            };
            let artifact = task.artifact.clone();
            self.status.emit(&SyncEvent::Uploading {
                pass_id,
                name: artifact.display_name.clone(),
                index: index + 1,
                total,
            });

            let attempt = self.transfer(token, &folder_id, &artifact).await;
            let now = self.clock.now();
            let Some(task) = transfers.get_mut(index) else {
                continue;
            };
            match attempt {
                Ok(bytes) => {
                    task.mark_succeeded(bytes, now);
                    debug!(name = %artifact.display_name, bytes, "uploaded");
                    self.status.emit(&SyncEvent::Uploaded {
                        pass_id,
                        name: artifact.display_name.clone(),
                        bytes,
                    });
                }
                Err((err, bytes)) => {
                    warn!(name = %artifact.display_name, error = %err, bytes, "transfer failed");
                    self.status.emit(&SyncEvent::TransferFailed {
                        pass_id,
                        name: artifact.display_name.clone(),
                        reason: err.short_reason().to_string(),
                    });
                    let abort = err.aborts_pass();
                    task.mark_failed(err.clone(), bytes, now);
                    if abort {
                        // every later request would be rejected the same way
                        info!(
                            uploaded = transfers.count(TransferStatus::Succeeded),
                            "aborting pass"
                        );
                        return Err(err);
                    }
                }
            }
        }

        let transfers: Vec<TransferSummary> =
            transfers.iter().map(TransferSummary::from).collect();
        let outcome = PassReport::outcome_for(&transfers);
        let report = PassReport {
            pass_id,
            scope: scope.clone(),
            folder_id,
            started_at,
            finished_at: self.clock.now(),
            candidates,
            transfers,
            outcome,
        };
        self.status.emit(&SyncEvent::Completed {
            pass_id,
            uploaded: report.uploaded(),
            failed: report.failed(),
        });
        Ok(report)
    }

    fn check_token(&self, token: &AccessToken) -> Result<(), SyncError> {
        if token.is_expired_at(self.clock.now()) {
            return Err(SyncError::Auth("access token expired".to_string()));
        }
        Ok(())
    }

    /// (artifacts in scope, artifacts still missing remotely)
    ///
    /// A single-artifact scope naming no local recording is a configuration error,
    /// not an empty success.
    async fn delta(
        &self,
        token: &AccessToken,
        folder_id: &FolderId,
        scope: &PassScope,
    ) -> Result<(usize, Vec<LocalArtifact>), SyncError> {
        let entries = list_remote_entries(self.remote.as_ref(), token, folder_id).await?;
        let local = self.catalog.list_artifacts(&self.options.namespace).await?;
        let candidates = local.iter().filter(|a| scope.admits(a)).count();
        if candidates == 0
            && let PassScope::Single(local_id) = scope
        {
            return Err(SyncError::Configuration(format!(
                "no recording with local id {local_id} in {}",
                self.options.namespace
            )));
        }
        let delta = compute_delta(local, &remote_names(&entries), scope);
        Ok((candidates, delta))
    }

    /// One create-and-upload attempt. Returns bytes streamed, on failure too.
    async fn transfer(
        &self,
        token: &AccessToken,
        folder_id: &FolderId,
        artifact: &LocalArtifact,
    ) -> Result<u64, (SyncError, u64)> {
        let content = self
            .catalog
            .open(artifact)
            .await
            .map_err(|e| (SyncError::from(e), 0))?;
        let (reader, counter) = CountingReader::new(content);
        let file = NewRemoteFile {
            name: artifact.display_name.clone(),
            mime_type: artifact.mime_type.clone(),
            size: artifact.size,
        };

        let uploaded = self
            .remote
            .upload(token, folder_id, &file, Box::new(reader))
            .await
            .map_err(|e| (e, counter.get()))?;

        let sent = counter.get();
        UploadCheck {
            name: &artifact.display_name,
            expected: artifact.size,
            sent,
            stored: uploaded.size,
        }
        .verify()
        .map_err(|e| (e, sent))?;
        debug!(remote_id = %uploaded.remote_id, "remote store accepted file");
        Ok(sent)
    }
}
