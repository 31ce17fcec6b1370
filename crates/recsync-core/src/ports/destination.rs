//! DestinationStore port - ユーザーが選んだ転送先の永続化
//!
//! 固定キーに不透明な文字列を 1 つ保存するだけ。バージョニングも移行もしない。

use thiserror::Error;

use crate::domain::RemoteFolderReference;

/// Fixed key the destination is stored under.
pub const DESTINATION_KEY: &str = "destination_folder";

#[derive(Debug, Error)]
pub enum DestinationError {
    #[error("destination store I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("destination store is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

pub trait DestinationStore: Send + Sync {
    fn load(&self) -> Result<Option<RemoteFolderReference>, DestinationError>;

    fn save(&self, destination: &RemoteFolderReference) -> Result<(), DestinationError>;

    fn clear(&self) -> Result<(), DestinationError>;
}
