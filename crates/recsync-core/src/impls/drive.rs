//! DriveClient - Google Drive v3 REST の RemoteStore 実装
//!
//! - 検索: `files.list` に q を付けて親フォルダ直下のフォルダを探す
//! - 作成: `files.create`（JSON メタデータのみ）
//! - 一覧: `pageToken` で全ページを辿る（呼び出し側が辿る）
//! - アップロード: `uploadType=multipart`（multipart/related、media はストリーム）
//!
//! 401 は Auth、それ以外の失敗はすべて Transport に写像する。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use super::multipart::MultipartRelated;
use crate::domain::{
    AccessToken, ContentStream, FolderId, RemoteEntry, RemoteId, SyncError,
};
use crate::ports::{NewRemoteFile, RemotePage, RemoteStore, UploadedFile};

pub const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";
pub const DRIVE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

#[derive(Debug, Clone, PartialEq)]
pub struct DriveConfig {
    pub api_base: String,
    pub upload_base: String,
    pub timeout: Duration,

    /// `pageSize` for children listings.
    pub page_size: u32,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            api_base: DRIVE_API_BASE.to_string(),
            upload_base: DRIVE_UPLOAD_BASE.to_string(),
            timeout: Duration::from_secs(60),
            page_size: 100,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
    #[serde(default)]
    name: String,

    /// Drive reports sizes as decimal strings.
    size: Option<String>,
}

pub struct DriveClient {
    http: reqwest::Client,
    config: DriveConfig,
}

impl DriveClient {
    pub fn new(config: DriveConfig) -> Result<Self, SyncError> {
        // timeout は接続と各読み取りに掛ける。大きな録音のアップロード全体を打ち切らないように
        let http = reqwest::Client::builder()
            .connect_timeout(config.timeout)
            .read_timeout(config.timeout)
            .build()
            .map_err(|e| SyncError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            config: DriveConfig {
                api_base: config.api_base.trim_end_matches('/').to_string(),
                upload_base: config.upload_base.trim_end_matches('/').to_string(),
                ..config
            },
        })
    }

    pub fn config(&self) -> &DriveConfig {
        &self.config
    }

    fn files_url(&self) -> String {
        format!("{}/files", self.config.api_base)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        op: &str,
        request: RequestBuilder,
        token: &AccessToken,
    ) -> Result<T, SyncError> {
        let response = request
            .header(AUTHORIZATION, format!("Bearer {}", token.bearer()))
            .send()
            .await
            .map_err(|e| transport_error(op, e))?;
        let response = check_status(op, response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| SyncError::Transport(format!("{op}: unreadable response: {e}")))
    }
}

/// Literal for a Drive query string: single quotes and backslashes escaped.
fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{escaped}'")
}

fn folder_query(name: &str, parent: &FolderId) -> String {
    format!(
        "name = {} and mimeType = '{FOLDER_MIME_TYPE}' and {} in parents and trashed = false",
        quote(name),
        quote(parent.as_str()),
    )
}

fn children_query(folder: &FolderId) -> String {
    format!("{} in parents and trashed = false", quote(folder.as_str()))
}

fn transport_error(op: &str, err: reqwest::Error) -> SyncError {
    if err.is_timeout() {
        SyncError::Transport(format!("{op}: request timed out"))
    } else if let Some(status) = err.status() {
        status_error(op, status, "")
    } else {
        SyncError::Transport(format!("{op}: {err}"))
    }
}

/// Longest error-body excerpt carried in a `SyncError`.
const ERROR_EXCERPT_CHARS: usize = 200;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Drive の `error.message`、JSON でなければ本文そのもの。長すぎれば切り詰める。
fn error_excerpt(body: &str) -> String {
    let text = match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => parsed.error.message,
        Err(_) => body.split_whitespace().collect::<Vec<_>>().join(" "),
    };
    match text.char_indices().nth(ERROR_EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text,
    }
}

fn status_error(op: &str, status: StatusCode, body: &str) -> SyncError {
    let excerpt = error_excerpt(body);
    let detail = if excerpt.is_empty() {
        String::new()
    } else {
        format!(" ({excerpt})")
    };
    match status {
        StatusCode::UNAUTHORIZED => {
            SyncError::Auth(format!("{op}: bearer token rejected{detail}"))
        }
        _ => SyncError::Transport(format!("{op}: unexpected status {status}{detail}")),
    }
}

async fn check_status(op: &str, response: Response) -> Result<Response, SyncError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    debug!(op, %status, body = %body, "drive request failed");
    Err(status_error(op, status, &body))
}

#[async_trait]
impl RemoteStore for DriveClient {
    async fn find_folder(
        &self,
        token: &AccessToken,
        name: &str,
        parent: &FolderId,
    ) -> Result<Option<FolderId>, SyncError> {
        let request = self.http.get(self.files_url()).query(&[
            ("q", folder_query(name, parent).as_str()),
            ("fields", "files(id,name)"),
            ("spaces", "drive"),
        ]);
        let list: FileList = self.send_json("find folder", request, token).await?;
        Ok(list.files.into_iter().next().map(|f| FolderId::new(f.id)))
    }

    async fn create_folder(
        &self,
        token: &AccessToken,
        name: &str,
        parent: &FolderId,
    ) -> Result<FolderId, SyncError> {
        let request = self
            .http
            .post(self.files_url())
            .query(&[("fields", "id")])
            .json(&json!({
                "name": name,
                "mimeType": FOLDER_MIME_TYPE,
                "parents": [parent.as_str()],
            }));
        let created: DriveFile = self.send_json("create folder", request, token).await?;
        Ok(FolderId::new(created.id))
    }

    async fn list_page(
        &self,
        token: &AccessToken,
        folder: &FolderId,
        page_token: Option<&str>,
    ) -> Result<RemotePage, SyncError> {
        let page_size = self.config.page_size.to_string();
        let mut request = self.http.get(self.files_url()).query(&[
            ("q", children_query(folder).as_str()),
            ("fields", "nextPageToken,files(id,name)"),
            ("pageSize", page_size.as_str()),
            ("spaces", "drive"),
        ]);
        if let Some(page_token) = page_token {
            request = request.query(&[("pageToken", page_token)]);
        }
        let list: FileList = self.send_json("list folder", request, token).await?;
        Ok(RemotePage {
            entries: list
                .files
                .into_iter()
                .map(|f| RemoteEntry::new(f.id, f.name))
                .collect(),
            next_page_token: list.next_page_token,
        })
    }

    async fn upload(
        &self,
        token: &AccessToken,
        folder: &FolderId,
        file: &NewRemoteFile,
        content: ContentStream,
    ) -> Result<UploadedFile, SyncError> {
        let multipart = MultipartRelated::new();
        let metadata = json!({
            "name": file.name,
            "parents": [folder.as_str()],
        });
        let body = multipart.body(&metadata, &file.mime_type, content);
        let request = self
            .http
            .post(format!("{}/files", self.config.upload_base))
            .query(&[("uploadType", "multipart"), ("fields", "id,size")])
            .header(CONTENT_TYPE, multipart.content_type())
            .body(reqwest::Body::wrap_stream(body));

        let uploaded: DriveFile = self.send_json("upload", request, token).await?;
        let size = match uploaded.size.as_deref() {
            Some(s) => Some(s.parse::<u64>().map_err(|_| {
                SyncError::Transport(format!("upload: invalid size {s:?} in response"))
            })?),
            None => None,
        };
        debug!(name = %file.name, remote_id = %uploaded.id, ?size, "drive accepted upload");
        Ok(UploadedFile {
            remote_id: RemoteId::new(uploaded.id),
            size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server, ServerGuard};

    fn client(server: &ServerGuard) -> DriveClient {
        DriveClient::new(DriveConfig {
            api_base: server.url(),
            upload_base: format!("{}/upload", server.url()),
            timeout: Duration::from_secs(5),
            page_size: 2,
        })
        .unwrap()
    }

    fn token() -> AccessToken {
        AccessToken::new("secret")
    }

    #[test]
    fn query_literals_are_escaped() {
        assert_eq!(quote("it's"), r"'it\'s'");
        assert_eq!(quote(r"a\b"), r"'a\\b'");
        assert_eq!(
            folder_query("recsync", &FolderId::new("root")),
            "name = 'recsync' and mimeType = 'application/vnd.google-apps.folder' \
             and 'root' in parents and trashed = false"
        );
    }

    #[tokio::test]
    async fn find_folder_returns_first_match() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/files")
            .match_header("authorization", "Bearer secret")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("q".into(), folder_query("recsync", &FolderId::new("root"))),
                Matcher::UrlEncoded("fields".into(), "files(id,name)".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"files":[{"id":"F1","name":"recsync"},{"id":"F2","name":"recsync"}]}"#)
            .create_async()
            .await;

        let found = client(&server)
            .find_folder(&token(), "recsync", &FolderId::new("root"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(found, Some(FolderId::new("F1")));
    }

    #[tokio::test]
    async fn find_folder_with_no_match_is_none() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/files")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"files":[]}"#)
            .create_async()
            .await;

        let found = client(&server)
            .find_folder(&token(), "recsync", &FolderId::new("root"))
            .await
            .unwrap();
        assert_eq!(found, None);
    }

    #[tokio::test]
    async fn create_folder_posts_metadata() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/files")
            .match_query(Matcher::UrlEncoded("fields".into(), "id".into()))
            .match_body(Matcher::Json(serde_json::json!({
                "name": "recsync",
                "mimeType": FOLDER_MIME_TYPE,
                "parents": ["root"],
            })))
            .with_status(200)
            .with_body(r#"{"id":"NEW"}"#)
            .create_async()
            .await;

        let id = client(&server)
            .create_folder(&token(), "recsync", &FolderId::new("root"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(id, FolderId::new("NEW"));
    }

    #[tokio::test]
    async fn list_page_passes_page_token() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/files")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("pageToken".into(), "p2".into()),
                Matcher::UrlEncoded("pageSize".into(), "2".into()),
                Matcher::UrlEncoded("q".into(), "'F1' in parents and trashed = false".into()),
            ]))
            .with_status(200)
            .with_body(
                r#"{"nextPageToken":"p3","files":[{"id":"a","name":"rec_a.m4a"},{"id":"b","name":"rec_b.m4a"}]}"#,
            )
            .create_async()
            .await;

        let page = client(&server)
            .list_page(&token(), &FolderId::new("F1"), Some("p2"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(page.entries.len(), 2);
        assert_eq!(page.entries[1].display_name, "rec_b.m4a");
        assert_eq!(page.next_page_token.as_deref(), Some("p3"));
    }

    #[tokio::test]
    async fn upload_sends_multipart_related() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/upload/files")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("uploadType".into(), "multipart".into()),
                Matcher::UrlEncoded("fields".into(), "id,size".into()),
            ]))
            .match_header("content-type", Matcher::Regex("^multipart/related; boundary=".into()))
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex(r#""name":"rec_a.m4a""#.into()),
                Matcher::Regex(r#""parents":\["F1"\]"#.into()),
                Matcher::Regex("Content-Type: audio/mp4\r\n\r\nhello".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"id":"R1","size":"5"}"#)
            .create_async()
            .await;

        let file = NewRemoteFile {
            name: "rec_a.m4a".into(),
            mime_type: "audio/mp4".into(),
            size: Some(5),
        };
        let uploaded = client(&server)
            .upload(&token(), &FolderId::new("F1"), &file, Box::new(&b"hello"[..]))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(uploaded.remote_id, RemoteId::new("R1"));
        assert_eq!(uploaded.size, Some(5));
    }

    #[tokio::test]
    async fn unauthorized_is_auth_and_server_error_is_transport() {
        let mut server = Server::new_async().await;
        let _unauthorized = server
            .mock("GET", "/files")
            .match_query(Matcher::Any)
            .with_status(401)
            .create_async()
            .await;
        let _unavailable = server
            .mock("POST", "/files")
            .match_query(Matcher::Any)
            .with_status(503)
            .create_async()
            .await;
        let drive = client(&server);

        let err = drive
            .find_folder(&token(), "recsync", &FolderId::new("root"))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Auth(_)));

        let err = drive
            .create_folder(&token(), "recsync", &FolderId::new("root"))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Transport(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn error_message_from_the_body_is_kept() {
        let mut server = Server::new_async().await;
        let _quota = server
            .mock("POST", "/upload/files")
            .match_query(Matcher::Any)
            .with_status(403)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"error":{"code":403,"message":"The user's Drive storage quota has been exceeded.","errors":[{"reason":"storageQuotaExceeded"}]}}"#,
            )
            .create_async()
            .await;
        let _gateway = server
            .mock("GET", "/files")
            .match_query(Matcher::Any)
            .with_status(502)
            .with_body(format!("<html>\n<b>Bad Gateway</b>{}</html>", "x".repeat(500)))
            .create_async()
            .await;
        let drive = client(&server);
        let file = NewRemoteFile {
            name: "a.m4a".into(),
            mime_type: "audio/mp4".into(),
            size: Some(1),
        };

        let err = drive
            .upload(&token(), &FolderId::new("F1"), &file, Box::new(&b"x"[..]))
            .await
            .unwrap_err();
        let SyncError::Transport(message) = &err else {
            panic!("expected transport error, got {err:?}");
        };
        assert!(message.contains("403"), "{message}");
        assert!(message.contains("storage quota has been exceeded"), "{message}");

        let err = drive
            .list_page(&token(), &FolderId::new("F1"), None)
            .await
            .unwrap_err();
        let SyncError::Transport(message) = &err else {
            panic!("expected transport error, got {err:?}");
        };
        assert!(message.contains("<html> <b>Bad Gateway</b>"), "{message}");
        assert!(message.ends_with("...)"), "{message}");
        assert!(message.len() < 300, "{message}");
    }

    #[test]
    fn empty_body_adds_no_detail() {
        let err = status_error("list", StatusCode::INTERNAL_SERVER_ERROR, "");
        assert_eq!(
            err,
            SyncError::Transport("list: unexpected status 500 Internal Server Error".into())
        );
    }

    #[tokio::test]
    async fn unreachable_host_is_transport() {
        let drive = DriveClient::new(DriveConfig {
            api_base: "http://127.0.0.1:9".into(),
            upload_base: "http://127.0.0.1:9".into(),
            timeout: Duration::from_secs(2),
            page_size: 10,
        })
        .unwrap();

        let err = drive
            .list_page(&token(), &FolderId::new("F1"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Transport(_)));
    }
}
