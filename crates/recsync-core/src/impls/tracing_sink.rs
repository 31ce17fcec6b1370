//! StatusSink that writes progress to the tracing log.

use tracing::{info, warn};

use crate::domain::SyncEvent;
use crate::ports::StatusSink;

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingStatusSink;

impl StatusSink for TracingStatusSink {
    fn emit(&self, event: &SyncEvent) {
        let pass_id = event.pass_id();
        match event {
            SyncEvent::TransferFailed { name, reason, .. } => {
                warn!(%pass_id, name = %name, reason = %reason, "transfer failed")
            }
            SyncEvent::Failed { reason, .. } => warn!(%pass_id, reason = %reason, "pass failed"),
            other => info!(%pass_id, status = %other.status_text(), "sync status"),
        }
    }
}
