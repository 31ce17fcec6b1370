//! recsync-core
//!
//! Pushes local audio recordings to a cloud folder, one idempotent pass at a time.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, artifact, delta, transfer, outcome, events, errors）
//! - **ports**: 抽象化レイヤー（LocalCatalog, RemoteStore, CredentialProvider, DestinationStore, StatusSink）
//! - **app**: 同期ロジック（builder, synchronizer, task）
//! - **host**: バックグラウンド実行（名前付き work、再試行、キャンセル）
//! - **impls**: 実装（Drive REST クライアント、ファイル catalog、in-memory 実装）
//! - **settings**: TOML 設定ファイル

pub mod app;
pub mod domain;
pub mod host;
pub mod impls;
pub mod ports;
pub mod settings;
