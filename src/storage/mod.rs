mod keychain;
mod secrets;
mod store;
mod types;

use std::sync::Arc;

use anyhow::Result;

use crate::config::{Config, SecretBackend};

pub use keychain::KeyringSecretStore;
pub use secrets::{FileSecretStore, MemorySecretStore, SecretStore};
pub use store::{CredentialStatus, CredentialStore, APP_ID_KEY, APP_SECRET_KEY, CREDENTIALS_KEY};
pub use types::*;

/// Secret store selected by the config's `secret_backend`.
pub fn open_secret_store(config: &Config) -> Result<Arc<dyn SecretStore>> {
    Ok(match config.secret_backend {
        SecretBackend::File => Arc::new(FileSecretStore::new()?),
        SecretBackend::Keyring => Arc::new(KeyringSecretStore::default()),
    })
}
