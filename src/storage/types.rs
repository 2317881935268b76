use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Seconds shaved off `expires_in` before a token is considered stale.
pub const REFRESH_MARGIN_SECS: i64 = 100;

/// A bearer token and when we got it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub token: String,
    pub expires_in: i64,
    pub obtained_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(token: impl Into<String>, expires_in: i64) -> Self {
        Self::obtained(token, expires_in, Utc::now())
    }

    pub fn obtained(token: impl Into<String>, expires_in: i64, obtained_at: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires_in,
            obtained_at,
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.obtained_at
    }

    /// True while `now` is more than [`REFRESH_MARGIN_SECS`] away from expiry.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.age(now).num_seconds() < self.expires_in - REFRESH_MARGIN_SECS
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .field("obtained_at", &self.obtained_at)
            .finish()
    }
}

/// Heuristic health of a credential, derived from its current fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Empty,
    Invalid,
    MaybeValid,
    Valid,
    Authorized,
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValidationStatus::Empty => "empty",
            ValidationStatus::Invalid => "invalid",
            ValidationStatus::MaybeValid => "maybe valid",
            ValidationStatus::Valid => "valid",
            ValidationStatus::Authorized => "authorized",
        };
        f.write_str(s)
    }
}

/// Client identity used for Basic auth against the token endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub app_id: String,
    pub app_secret: Option<String>,
}

impl fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientIdentity")
            .field("app_id", &self.app_id)
            .field("app_secret", &self.app_secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// One OAuth2 account.
///
/// Identity fields (tokens, user name, avatar) are derived from the app key
/// (`app_id`, plus `app_secret` for two-legged apps). Changing the key wipes
/// them, which is why the key is only reachable through setters.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    id: Uuid,
    app_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    app_secret: Option<String>,
    #[serde(default)]
    access_token: Option<AccessToken>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    user_name: Option<String>,
    #[serde(default)]
    avatar_url: Option<String>,
}

impl Credential {
    /// `app_secret: None` is a one-legged (installed) app; `Some` is two-legged.
    pub fn new(app_id: impl Into<String>, app_secret: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            app_id: app_id.into(),
            app_secret,
            access_token: None,
            refresh_token: None,
            user_name: None,
            avatar_url: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn app_secret(&self) -> Option<&str> {
        self.app_secret.as_deref()
    }

    pub fn is_two_legged(&self) -> bool {
        self.app_secret.is_some()
    }

    pub fn access_token(&self) -> Option<&AccessToken> {
        self.access_token.as_ref()
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub fn user_name(&self) -> Option<&str> {
        self.user_name.as_deref()
    }

    pub fn avatar_url(&self) -> Option<&str> {
        self.avatar_url.as_deref()
    }

    pub fn client_identity(&self) -> ClientIdentity {
        ClientIdentity {
            app_id: self.app_id.clone(),
            app_secret: self.app_secret.clone(),
        }
    }

    /// App id present, and app secret too when the app is two-legged.
    pub fn has_app_identity(&self) -> bool {
        !self.app_id.is_empty() && self.app_secret.as_deref().map_or(true, |s| !s.is_empty())
    }

    pub fn set_app_id(&mut self, app_id: impl Into<String>) {
        let app_id = app_id.into();
        if app_id != self.app_id {
            self.app_id = app_id;
            self.clear_identity();
        }
    }

    pub fn set_app_secret(&mut self, app_secret: Option<String>) {
        if app_secret != self.app_secret {
            self.app_secret = app_secret;
            self.clear_identity();
        }
    }

    pub fn set_tokens(&mut self, access_token: Option<AccessToken>, refresh_token: Option<String>) {
        self.access_token = access_token;
        self.refresh_token = refresh_token;
    }

    pub fn set_access_token(&mut self, access_token: AccessToken) {
        self.access_token = Some(access_token);
    }

    pub fn set_user(&mut self, user_name: Option<String>, avatar_url: Option<String>) {
        self.user_name = user_name;
        self.avatar_url = avatar_url;
    }

    /// Drop everything derived from the app key.
    pub fn clear_identity(&mut self) {
        self.access_token = None;
        self.refresh_token = None;
        self.user_name = None;
        self.avatar_url = None;
    }

    /// Recomputed on every call; never stored.
    pub fn validation_status(&self) -> ValidationStatus {
        if self.refresh_token.is_some() {
            return ValidationStatus::Authorized;
        }

        let id_len = self.app_id.chars().count();
        match &self.app_secret {
            None => match id_len {
                0 => ValidationStatus::Empty,
                14 => ValidationStatus::Valid,
                n if n > 10 => ValidationStatus::MaybeValid,
                _ => ValidationStatus::Invalid,
            },
            Some(secret) => {
                let secret_len = secret.chars().count();
                if id_len == 0 && secret_len == 0 {
                    ValidationStatus::Empty
                } else if id_len == 22 && secret_len == 30 {
                    ValidationStatus::Valid
                } else if id_len > 10 && secret_len > 20 {
                    ValidationStatus::MaybeValid
                } else {
                    ValidationStatus::Invalid
                }
            }
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("app_id", &self.app_id)
            .field("two_legged", &self.is_two_legged())
            .field("access_token", &self.access_token)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("user_name", &self.user_name)
            .finish()
    }
}

/// Persisted blob: every credential plus the active selection.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialCollection {
    #[serde(default)]
    pub credentials: Vec<Credential>,
    #[serde(default)]
    pub active: Option<Uuid>,
}

impl CredentialCollection {
    pub fn get(&self, id: Uuid) -> Option<&Credential> {
        self.credentials.iter().find(|c| c.id == id)
    }

    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut Credential> {
        self.credentials.iter_mut().find(|c| c.id == id)
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.get(id).is_some()
    }

    /// Replace in place or append. Returns true when the credential is new.
    pub fn upsert(&mut self, credential: Credential) -> bool {
        match self.get_mut(credential.id) {
            Some(existing) => {
                *existing = credential;
                false
            }
            None => {
                self.credentials.push(credential);
                true
            }
        }
    }

    /// Remove by id. Clears the selection if it pointed at the removed entry.
    pub fn remove(&mut self, id: Uuid) -> Option<Credential> {
        let pos = self.credentials.iter().position(|c| c.id == id)?;
        if self.active == Some(id) {
            self.active = None;
        }
        Some(self.credentials.remove(pos))
    }

    pub fn active(&self) -> Option<&Credential> {
        self.active.and_then(|id| self.get(id))
    }

    pub fn set_active(&mut self, id: Uuid) -> bool {
        if self.contains(id) {
            self.active = Some(id);
            true
        } else {
            false
        }
    }

    /// Drop a selection that no longer points at a stored credential.
    pub fn normalize(&mut self) {
        if let Some(id) = self.active {
            if !self.contains(id) {
                self.active = None;
            }
        }
    }
}
