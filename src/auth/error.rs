use thiserror::Error;
use uuid::Uuid;

/// Failures of the credential lifecycle. All of them are terminal for the
/// call that produced them; nothing here is retried automatically.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("No active credential selected")]
    NoActiveCredential,

    #[error("Credential is not authorized")]
    NotAuthorized,

    #[error("Token refresh failed, reauthorization required: {0}")]
    RefreshFailed(String),

    #[error("Credential not found: {0}")]
    CredentialNotFound(Uuid),

    #[error("Authorization code exchange failed: {0}")]
    ExchangeFailed(String),

    #[error("Credential storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}
