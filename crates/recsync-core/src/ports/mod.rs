//! Ports - 抽象化レイヤー
//!
//! Hexagonal Architecture の「ポート」。synchronizer が依存する外部協力者
//! （録音 catalog、credential、remote store、永続化、通知）をここで trait として定義する。
//! 実装は `impls` にある。

pub mod catalog;
pub mod clock;
pub mod credential;
pub mod destination;
pub mod id_generator;
pub mod remote_store;
pub mod status_sink;

pub use self::catalog::{CatalogError, LocalCatalog};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::credential::{AuthError, CredentialProvider};
pub use self::destination::{DESTINATION_KEY, DestinationError, DestinationStore};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::remote_store::{NewRemoteFile, RemotePage, RemoteStore, UploadedFile};
pub use self::status_sink::{FanoutStatusSink, NoopStatusSink, StatusSink};
