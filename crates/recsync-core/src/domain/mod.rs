//! Domain model (ids, artifacts, delta, transfers, outcomes, events, errors).
//!
//! I/O を持たない。catalog / remote store / credential などの外部は ports 側。

pub mod artifact;
pub mod config;
pub mod content;
pub mod delta;
pub mod errors;
pub mod events;
pub mod ids;
pub mod outcome;
pub mod transfer;

pub use artifact::{ContentLocator, LocalArtifact, RemoteEntry, mime_type_for, recording_display_name};
pub use config::{AccessToken, RemoteFolderReference, SyncConfig};
pub use content::{ByteCounter, ContentStream, CountingReader};
pub use delta::{PassScope, compute_delta, remote_names};
pub use errors::{ErrorKind, SyncError};
pub use events::{Notification, SyncEvent};
pub use ids::{FolderId, LocalId, PassId, RemoteId, WorkId};
pub use outcome::{PassOutcome, PassReport, TransferSummary};
pub use transfer::{TransferSet, TransferStatus, TransferTask, UploadCheck};
