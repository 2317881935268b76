use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use redline::auth::{Grant, OAuthClient, TokenResponse, UserIdentity};
use redline::storage::{AccessToken, ClientIdentity, Credential, CredentialStore, MemorySecretStore};

pub const REDIRECT_URI: &str = "http://localhost:8484/callback";
pub const APP_ID: &str = "abcdefghijklmn";

/// Token endpoint double that counts calls and can be told to fail.
#[derive(Default)]
#[allow(dead_code)]
pub struct MockOAuth {
    pub refresh_calls: AtomicUsize,
    pub exchange_calls: AtomicUsize,
    pub identity_calls: AtomicUsize,
    pub fail_refresh: AtomicBool,
    pub fail_exchange: AtomicBool,
    pub fail_identity: AtomicBool,
    pub omit_refresh_token: AtomicBool,
    pub last_code: Mutex<Option<String>>,
    pub last_client: Mutex<Option<ClientIdentity>>,
    pub refresh_delay: Option<Duration>,
}

#[allow(dead_code)]
impl MockOAuth {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            refresh_delay: Some(delay),
            ..Self::default()
        })
    }

    pub fn refreshes(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

impl OAuthClient for MockOAuth {
    fn request_token(
        &self,
        client: &ClientIdentity,
        grant: Grant<'_>,
    ) -> anyhow::Result<TokenResponse> {
        *self.last_client.lock().unwrap() = Some(client.clone());
        match grant {
            Grant::RefreshToken(_) => {
                let n = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
                if let Some(delay) = self.refresh_delay {
                    std::thread::sleep(delay);
                }
                if self.fail_refresh.load(Ordering::SeqCst) {
                    anyhow::bail!("invalid_grant");
                }
                Ok(TokenResponse {
                    access_token: format!("fresh-{}", n),
                    expires_in: 3600,
                    refresh_token: None,
                    token_type: Some("bearer".into()),
                    scope: Some("identity read".into()),
                })
            }
            Grant::AuthorizationCode { code, .. } => {
                self.exchange_calls.fetch_add(1, Ordering::SeqCst);
                *self.last_code.lock().unwrap() = Some(code.to_string());
                if self.fail_exchange.load(Ordering::SeqCst) {
                    anyhow::bail!("HTTP 401");
                }
                let refresh_token = if self.omit_refresh_token.load(Ordering::SeqCst) {
                    None
                } else {
                    Some("refresh-initial".to_string())
                };
                Ok(TokenResponse {
                    access_token: "access-initial".into(),
                    expires_in: 3600,
                    refresh_token,
                    token_type: Some("bearer".into()),
                    scope: Some("identity read".into()),
                })
            }
        }
    }

    fn fetch_identity(&self, _access_token: &str) -> anyhow::Result<UserIdentity> {
        self.identity_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_identity.load(Ordering::SeqCst) {
            anyhow::bail!("HTTP 500");
        }
        Ok(UserIdentity {
            name: "spez".into(),
            avatar_url: Some("https://example.com/avatar.png".into()),
        })
    }
}

/// Store backed by a fresh in-memory secret store.
#[allow(dead_code)]
pub fn test_store(oauth: Arc<MockOAuth>) -> (CredentialStore, Arc<MemorySecretStore>) {
    let secrets = Arc::new(MemorySecretStore::new());
    let store = CredentialStore::open(secrets.clone(), oauth, REDIRECT_URI).unwrap();
    (store, secrets)
}

/// Reopen a store over the same secrets, as after a restart.
#[allow(dead_code)]
pub fn reopen(secrets: Arc<MemorySecretStore>, oauth: Arc<MockOAuth>) -> CredentialStore {
    CredentialStore::open(secrets, oauth, REDIRECT_URI).unwrap()
}

/// Authorized credential whose access token was obtained `age_secs` ago.
#[allow(dead_code)]
pub fn authorized_credential(age_secs: i64) -> Credential {
    let mut cred = Credential::new(APP_ID, None);
    let obtained_at = Utc::now() - chrono::Duration::seconds(age_secs);
    cred.set_tokens(
        Some(AccessToken::obtained("cached-token", 3600, obtained_at)),
        Some("refresh-1".to_string()),
    );
    cred.set_user(Some("spez".into()), None);
    cred
}
