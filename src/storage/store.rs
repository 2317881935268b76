use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::Context;
use chrono::{Duration, Utc};
use dashmap::DashMap;
use url::Url;
use uuid::Uuid;

use crate::auth::oauth::{self, Grant, OAuthClient};
use crate::auth::AuthError;

use super::types::*;
use super::SecretStore;

/// Secret store key holding the serialized [`CredentialCollection`].
pub const CREDENTIALS_KEY: &str = "credentials";
/// Secret store keys for the app's own default client identity.
pub const APP_ID_KEY: &str = "app_id";
pub const APP_SECRET_KEY: &str = "app_secret";

/// Per-credential guard so concurrent callers share one refresh round-trip.
type RefreshLocks = DashMap<Uuid, Arc<Mutex<()>>>;

type Result<T> = std::result::Result<T, AuthError>;

/// One row of [`CredentialStore::status_report`].
#[derive(Debug, Clone)]
pub struct CredentialStatus {
    pub id: Uuid,
    pub app_id: String,
    pub user_name: Option<String>,
    pub status: ValidationStatus,
    pub active: bool,
    pub token_age: Option<Duration>,
    pub token_fresh: bool,
}

/// Owns every credential, persists them through a [`SecretStore`], and hands
/// out bearer tokens, refreshing them when they go stale.
///
/// In-memory state is authoritative for the session; every mutation is
/// flushed to the secret store before the call returns.
pub struct CredentialStore {
    secrets: Arc<dyn SecretStore>,
    oauth: Arc<dyn OAuthClient>,
    redirect_uri: String,
    collection: RwLock<CredentialCollection>,
    refresh_locks: RefreshLocks,
}

impl CredentialStore {
    /// Load the persisted collection (or start empty).
    pub fn open(
        secrets: Arc<dyn SecretStore>,
        oauth: Arc<dyn OAuthClient>,
        redirect_uri: impl Into<String>,
    ) -> Result<Self> {
        let mut collection = match secrets.get(CREDENTIALS_KEY)? {
            Some(blob) => serde_json::from_str::<CredentialCollection>(&blob)
                .context("Corrupt credential collection in secret store")?,
            None => CredentialCollection::default(),
        };
        collection.normalize();

        tracing::debug!(
            credential_count = collection.credentials.len(),
            has_active = collection.active.is_some(),
            "Loaded credential collection"
        );

        Ok(Self {
            secrets,
            oauth,
            redirect_uri: redirect_uri.into(),
            collection: RwLock::new(collection),
            refresh_locks: DashMap::new(),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, CredentialCollection> {
        self.collection.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, CredentialCollection> {
        self.collection.write().unwrap_or_else(|e| e.into_inner())
    }

    fn persist(&self, collection: &CredentialCollection) -> Result<()> {
        let blob = serde_json::to_string(collection).context("Failed to serialize credentials")?;
        self.secrets.set(CREDENTIALS_KEY, &blob)?;
        tracing::debug!(
            credential_count = collection.credentials.len(),
            "Persisted credential collection"
        );
        Ok(())
    }

    // -- Queries --------------------------------------------------------------

    pub fn credentials(&self) -> Vec<Credential> {
        self.read().credentials.clone()
    }

    pub fn get(&self, id: Uuid) -> Option<Credential> {
        self.read().get(id).cloned()
    }

    pub fn active(&self) -> Option<Credential> {
        self.read().active().cloned()
    }

    pub fn active_id(&self) -> Option<Uuid> {
        self.read().active
    }

    pub fn status_report(&self) -> Vec<CredentialStatus> {
        let now = Utc::now();
        let collection = self.read();
        collection
            .credentials
            .iter()
            .map(|cred| CredentialStatus {
                id: cred.id(),
                app_id: cred.app_id().to_string(),
                user_name: cred.user_name().map(str::to_string),
                status: cred.validation_status(),
                active: collection.active == Some(cred.id()),
                token_age: cred.access_token().map(|t| t.age(now)),
                token_fresh: cred.access_token().is_some_and(|t| t.is_fresh(now)),
            })
            .collect()
    }

    // -- Mutations ------------------------------------------------------------

    /// Upsert. The first credential in an empty store becomes active.
    pub fn add(&self, credential: Credential) -> Result<()> {
        let mut collection = self.write();
        let id = credential.id();
        collection.upsert(credential);
        if collection.active.is_none() && collection.credentials.len() == 1 {
            collection.active = Some(id);
        }
        self.persist(&collection)
    }

    pub fn update(&self, credential: Credential) -> Result<()> {
        let mut collection = self.write();
        collection.upsert(credential);
        self.persist(&collection)
    }

    /// Remove by id. Removing the active credential leaves no selection.
    pub fn remove(&self, id: Uuid) -> Result<Credential> {
        let mut collection = self.write();
        let removed = collection.remove(id).ok_or(AuthError::CredentialNotFound(id))?;
        self.persist(&collection)?;
        drop(collection);

        self.refresh_locks.remove(&id);
        tracing::info!(credential_id = %id, "Removed credential");
        Ok(removed)
    }

    pub fn set_active(&self, id: Uuid) -> Result<()> {
        let mut collection = self.write();
        if !collection.set_active(id) {
            return Err(AuthError::CredentialNotFound(id));
        }
        self.persist(&collection)
    }

    /// Forget tokens and user for `id`, keeping its app identity.
    pub fn sign_out(&self, id: Uuid) -> Result<()> {
        let mut collection = self.write();
        let credential = collection
            .get_mut(id)
            .ok_or(AuthError::CredentialNotFound(id))?;
        credential.clear_identity();
        self.persist(&collection)?;
        tracing::info!(credential_id = %id, "Signed out credential");
        Ok(())
    }

    // -- App identity ---------------------------------------------------------

    /// The app's own client id/secret, used as a default for new credentials.
    pub fn saved_client_identity(&self) -> Result<Option<ClientIdentity>> {
        let Some(app_id) = self.secrets.get(APP_ID_KEY)? else {
            return Ok(None);
        };
        let app_secret = self.secrets.get(APP_SECRET_KEY)?;
        Ok(Some(ClientIdentity { app_id, app_secret }))
    }

    pub fn save_client_identity(&self, identity: &ClientIdentity) -> Result<()> {
        self.secrets.set(APP_ID_KEY, &identity.app_id)?;
        match &identity.app_secret {
            Some(secret) => self.secrets.set(APP_SECRET_KEY, secret)?,
            None => self.secrets.delete(APP_SECRET_KEY)?,
        }
        Ok(())
    }

    // -- Tokens ---------------------------------------------------------------

    /// Bearer token for the active credential, refreshed if stale.
    pub fn get_valid_access_token(&self) -> Result<AccessToken> {
        let id = self.active_id().ok_or(AuthError::NoActiveCredential)?;
        self.access_token_for(id)
    }

    /// Bearer token for a specific credential, refreshed if stale.
    ///
    /// A failed refresh wipes the credential's identity and is reported as
    /// [`AuthError::RefreshFailed`]; the caller has to reauthorize.
    pub fn access_token_for(&self, id: Uuid) -> Result<AccessToken> {
        if let Some(token) = self.cached_token(id)? {
            return Ok(token);
        }

        let lock = self
            .refresh_locks
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        // Another caller may have refreshed (or wiped) while we waited.
        if let Some(token) = self.cached_token(id)? {
            return Ok(token);
        }

        let credential = self.get(id).ok_or(AuthError::CredentialNotFound(id))?;
        let refresh_token = credential
            .refresh_token()
            .ok_or(AuthError::NotAuthorized)?
            .to_string();

        tracing::info!(credential_id = %id, "Access token stale, refreshing");

        let response = self
            .oauth
            .request_token(&credential.client_identity(), Grant::RefreshToken(&refresh_token));

        match response {
            Ok(response) => {
                let token = AccessToken::new(response.access_token, response.expires_in);
                let mut collection = self.write();
                match collection.get_mut(id) {
                    Some(current) if current.refresh_token() == Some(refresh_token.as_str()) => {
                        current.set_access_token(token.clone());
                    }
                    _ => {
                        tracing::warn!(
                            credential_id = %id,
                            "Credential changed during refresh, discarding new token"
                        );
                        return Err(AuthError::NotAuthorized);
                    }
                }
                self.persist(&collection)?;
                tracing::info!(
                    credential_id = %id,
                    expires_in = token.expires_in,
                    "Access token refreshed"
                );
                Ok(token)
            }
            Err(e) => {
                tracing::warn!(
                    credential_id = %id,
                    error = %e,
                    "Token refresh failed, clearing identity"
                );
                let mut collection = self.write();
                if let Some(current) = collection.get_mut(id) {
                    if current.refresh_token() == Some(refresh_token.as_str()) {
                        current.clear_identity();
                    }
                }
                if let Err(persist_err) = self.persist(&collection) {
                    tracing::error!(
                        credential_id = %id,
                        error = %persist_err,
                        "Failed to persist identity wipe"
                    );
                }
                Err(AuthError::RefreshFailed(format!("{:#}", e)))
            }
        }
    }

    /// `Some` on a cache hit, `None` when a refresh is needed.
    fn cached_token(&self, id: Uuid) -> Result<Option<AccessToken>> {
        let collection = self.read();
        let credential = collection.get(id).ok_or(AuthError::CredentialNotFound(id))?;

        if credential.refresh_token().is_none() || !credential.has_app_identity() {
            return Err(AuthError::NotAuthorized);
        }

        Ok(credential
            .access_token()
            .filter(|token| token.is_fresh(Utc::now()))
            .cloned())
    }

    // -- Authorization --------------------------------------------------------

    /// Browser URL that starts the authorization flow for `id`.
    pub fn authorize_url(&self, id: Uuid, scopes: &[String], state: &str) -> Result<Url> {
        let credential = self.get(id).ok_or(AuthError::CredentialNotFound(id))?;
        if !credential.has_app_identity() {
            return Err(AuthError::NotAuthorized);
        }
        Ok(oauth::authorize_url(
            credential.app_id(),
            &self.redirect_uri,
            scopes,
            state,
        )?)
    }

    /// Trade a one-time authorization code for tokens.
    ///
    /// Fills an existing, not yet authorized credential with the same app
    /// identity when there is one; otherwise creates a new credential.
    pub fn exchange_authorization_code(
        &self,
        app_id: &str,
        app_secret: Option<&str>,
        code: &str,
    ) -> Result<Credential> {
        let target = self
            .read()
            .credentials
            .iter()
            .find(|c| {
                c.app_id() == app_id && c.app_secret() == app_secret && c.refresh_token().is_none()
            })
            .map(Credential::id);

        let credential = match target.and_then(|id| self.get(id)) {
            Some(existing) => existing,
            None => Credential::new(app_id, app_secret.map(str::to_string)),
        };
        self.complete_exchange(credential, code)
    }

    /// Authorize (or re-authorize) a specific stored credential.
    pub fn reauthorize(&self, id: Uuid, code: &str) -> Result<Credential> {
        let credential = self.get(id).ok_or(AuthError::CredentialNotFound(id))?;
        self.complete_exchange(credential, code)
    }

    fn complete_exchange(&self, mut credential: Credential, code: &str) -> Result<Credential> {
        if !credential.has_app_identity() {
            return Err(AuthError::ExchangeFailed("missing app identity".to_string()));
        }

        let code = oauth::normalize_code(code.trim());
        let grant = Grant::AuthorizationCode {
            code,
            redirect_uri: &self.redirect_uri,
        };

        let response = self
            .oauth
            .request_token(&credential.client_identity(), grant)
            .map_err(|e| AuthError::ExchangeFailed(format!("{:#}", e)))?;
        let refresh_token = response.refresh_token.clone().ok_or_else(|| {
            AuthError::ExchangeFailed("response carried no refresh token".to_string())
        })?;
        let access_token = AccessToken::new(response.access_token, response.expires_in);

        let user = match self.oauth.fetch_identity(&access_token.token) {
            Ok(user) => Some(user),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to fetch user identity, continuing anyway");
                None
            }
        };

        credential.set_tokens(Some(access_token), Some(refresh_token));
        if let Some(user) = user {
            credential.set_user(Some(user.name), user.avatar_url);
        }

        let mut collection = self.write();
        collection.upsert(credential.clone());
        if collection.active.is_none() {
            collection.active = Some(credential.id());
        }
        self.persist(&collection)?;

        tracing::info!(
            credential_id = %credential.id(),
            user = credential.user_name().unwrap_or("unknown"),
            "Authorization code exchanged"
        );
        Ok(credential)
    }
}
