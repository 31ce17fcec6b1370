//! CredentialProvider port - bearer token の取得
//!
//! identity の確立（同意フロー）は外部。ここでは確立済みの identity から
//! token を引き出すだけ。

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{AccessToken, SyncError};

/// No identity established, or the provider could not produce a token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct AuthError(pub String);

impl From<AuthError> for SyncError {
    fn from(err: AuthError) -> Self {
        SyncError::Auth(err.0)
    }
}

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn access_token(&self) -> Result<AccessToken, AuthError>;
}
