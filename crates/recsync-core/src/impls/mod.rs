//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **DriveClient**: Google Drive v3 REST（本番用 RemoteStore）
//! - **DirectoryRemoteStore**: ディレクトリを転送先にする RemoteStore
//! - **FsCatalog**: ディレクトリを catalog として扱う
//! - **FileDestinationStore**: 転送先の JSON 永続化
//! - **EnvCredentialProvider** / **CommandCredentialProvider**
//! - **TracingStatusSink**: 進捗を tracing に流す
//! - **memory**: テスト・開発用の in-memory 実装

pub mod credential;
pub mod destination_file;
pub mod directory;
pub mod drive;
pub mod fs_catalog;
pub mod memory;
pub mod multipart;
pub mod tracing_sink;

pub use self::credential::{CommandCredentialProvider, DEFAULT_TOKEN_VAR, EnvCredentialProvider};
pub use self::destination_file::FileDestinationStore;
pub use self::directory::DirectoryRemoteStore;
pub use self::drive::{DriveClient, DriveConfig};
pub use self::fs_catalog::FsCatalog;
pub use self::tracing_sink::TracingStatusSink;
