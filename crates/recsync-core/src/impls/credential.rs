//! Credential providers: bearer tokens from the environment or an external tool.
//!
//! identity の確立（同意・リフレッシュ）はどちらも外部に任せる。

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::domain::AccessToken;
use crate::ports::{AuthError, Clock, CredentialProvider, SystemClock};

/// Default variable read by `EnvCredentialProvider`.
pub const DEFAULT_TOKEN_VAR: &str = "RECSYNC_ACCESS_TOKEN";

/// Token taken verbatim from an environment variable.
#[derive(Debug, Clone)]
pub struct EnvCredentialProvider {
    var: String,
}

impl EnvCredentialProvider {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvCredentialProvider {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_VAR)
    }
}

#[async_trait]
impl CredentialProvider for EnvCredentialProvider {
    async fn access_token(&self) -> Result<AccessToken, AuthError> {
        match std::env::var(&self.var) {
            Ok(value) if !value.trim().is_empty() => Ok(AccessToken::new(value.trim())),
            _ => Err(AuthError(format!("no access token in ${}", self.var))),
        }
    }
}

/// JSON form a tool may print instead of a bare token.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
}

/// Token printed on stdout by a shell command (e.g. `gcloud auth print-access-token`).
///
/// The command may print either the bare token or
/// `{"access_token": "...", "expires_in": 3599}`.
pub struct CommandCredentialProvider {
    command: String,
    clock: Arc<dyn Clock>,
}

impl CommandCredentialProvider {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn expiry(&self, expires_in: i64) -> Result<DateTime<Utc>, AuthError> {
        if expires_in < 0 {
            return Err(AuthError(format!(
                "credential command printed negative expires_in {expires_in}"
            )));
        }
        Duration::try_seconds(expires_in)
            .and_then(|ttl| self.clock.now().checked_add_signed(ttl))
            .ok_or_else(|| {
                AuthError(format!(
                    "credential command printed expires_in {expires_in} out of range"
                ))
            })
    }

    fn parse(&self, stdout: &str) -> Result<AccessToken, AuthError> {
        let stdout = stdout.trim();
        if stdout.starts_with('{') {
            let response: TokenResponse = serde_json::from_str(stdout)
                .map_err(|e| AuthError(format!("credential command printed invalid JSON: {e}")))?;
            let token = AccessToken::new(response.access_token.trim());
            return match response.expires_in {
                Some(secs) => Ok(token.with_expiry(self.expiry(secs)?)),
                None => Ok(token),
            };
        }
        match stdout.lines().next().map(str::trim) {
            Some(line) if !line.is_empty() => Ok(AccessToken::new(line)),
            _ => Err(AuthError("credential command printed no token".to_string())),
        }
    }
}

#[async_trait]
impl CredentialProvider for CommandCredentialProvider {
    async fn access_token(&self) -> Result<AccessToken, AuthError> {
        debug!(command = %self.command, "running credential command");
        let output = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| AuthError(format!("failed to run credential command: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AuthError(format!(
                "credential command exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        self.parse(&String::from_utf8_lossy(&output.stdout))
    }
}
