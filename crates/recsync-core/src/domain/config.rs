//! Per-pass configuration injected into the synchronizer.
//!
//! pass ごとに明示的に渡す。グローバルな保存値（destination や credential）を
//! synchronizer が自分で読みに行くことはない。

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Destination container chosen once by the user.
///
/// Persisted as a single opaque string. Today that string is a folder name that
/// is resolved (get-or-create) under a fixed parent on every pass.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteFolderReference(String);

impl RemoteFolderReference {
    /// Blank references are rejected: they cannot name a folder.
    pub fn parse(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn folder_name(&self) -> &str {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteFolderReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Short-lived bearer credential. Held for one pass, never persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    bearer: String,
    expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    pub fn new(bearer: impl Into<String>) -> Self {
        Self {
            bearer: bearer.into(),
            expires_at: None,
        }
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn bearer(&self) -> &str {
        &self.bearer
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

// never print the bearer
impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("bearer", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Everything a single pass needs from the outside world.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub destination: RemoteFolderReference,
    pub credential: AccessToken,
}

impl SyncConfig {
    pub fn new(destination: RemoteFolderReference, credential: AccessToken) -> Self {
        Self {
            destination,
            credential,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn blank_folder_reference_is_rejected() {
        assert!(RemoteFolderReference::parse("   ").is_none());
        assert_eq!(
            RemoteFolderReference::parse(" recsync ").unwrap().folder_name(),
            "recsync"
        );
    }

    #[test]
    fn token_debug_is_redacted() {
        let token = AccessToken::new("ya29.secret");
        let dbg = format!("{token:?}");
        assert!(!dbg.contains("ya29.secret"));
        assert!(dbg.contains("redacted"));
    }

    #[test]
    fn token_expiry() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let token = AccessToken::new("t").with_expiry(at);
        assert!(token.is_expired_at(at));
        assert!(!token.is_expired_at(at - chrono::Duration::seconds(1)));
        assert!(!AccessToken::new("t").is_expired_at(at));
    }
}
