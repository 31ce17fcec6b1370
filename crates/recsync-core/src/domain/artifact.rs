//! Artifact model: recorded files on both sides of the sync.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{LocalId, RemoteId};

/// Opaque handle the catalog understands for opening an artifact's bytes.
///
/// For the filesystem catalog it is a path; other catalogs may use URIs or keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentLocator(String);

impl ContentLocator {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One committed recording in the local catalog.
///
/// Immutable once committed. The core never mutates or deletes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalArtifact {
    pub local_id: LocalId,

    /// Unique within the recording namespace by convention only.
    pub display_name: String,

    pub mime_type: String,

    pub content: ContentLocator,

    /// Byte length as recorded by the catalog, when it knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    pub created_at: DateTime<Utc>,
}

/// One file already present in the destination container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    pub remote_id: RemoteId,
    pub display_name: String,
}

impl RemoteEntry {
    pub fn new(remote_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            remote_id: RemoteId::new(remote_id),
            display_name: display_name.into(),
        }
    }
}

/// Prefix of generated recording names.
pub const RECORDING_PREFIX: &str = "rec_";

/// Generated display name for a recording finished at `at`.
///
/// Second resolution: two recordings finished in the same second collide,
/// and collisions are treated as the same logical artifact.
pub fn recording_display_name(at: DateTime<Utc>, extension: &str) -> String {
    let extension = extension.trim_start_matches('.');
    format!(
        "{RECORDING_PREFIX}{}.{}",
        at.format("%Y%m%d_%H%M%S"),
        if extension.is_empty() { "m4a" } else { extension }
    )
}

/// MIME type for a recording file name, by extension.
pub fn mime_type_for(name: &str) -> &'static str {
    let ext = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "m4a" | "mp4" | "aac" => "audio/mp4",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" | "oga" | "opus" => "audio/ogg",
        "flac" => "audio/flac",
        "3gp" => "audio/3gpp",
        "amr" => "audio/amr",
        _ => "audio/mp4",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    #[test]
    fn recording_name_embeds_second_resolution_timestamp() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 5).unwrap();
        assert_eq!(recording_display_name(at, "m4a"), "rec_20240101_090005.m4a");
        assert_eq!(recording_display_name(at, ".wav"), "rec_20240101_090005.wav");
        assert_eq!(recording_display_name(at, ""), "rec_20240101_090005.m4a");
    }

    #[rstest]
    #[case("rec_1.m4a", "audio/mp4")]
    #[case("REC_1.MP3", "audio/mpeg")]
    #[case("take.opus", "audio/ogg")]
    #[case("noext", "audio/mp4")]
    fn mime_by_extension(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(mime_type_for(name), expected);
    }

    #[test]
    fn local_artifact_omits_unknown_size() {
        let artifact = LocalArtifact {
            local_id: LocalId::new("1"),
            display_name: "rec_20240101_090000.m4a".into(),
            mime_type: "audio/mp4".into(),
            content: ContentLocator::new("/tmp/rec.m4a"),
            size: None,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(),
        };
        let v = serde_json::to_value(&artifact).unwrap();
        assert!(v.get("size").is_none());
        assert_eq!(v["content"], "/tmp/rec.m4a");
    }
}
