use std::time::Duration;

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use rand::Rng;
use serde::Deserialize;
use url::Url;

use crate::config::Config;
use crate::reddit;
use crate::storage::ClientIdentity;

const AUTH_URL: &str = "https://www.reddit.com/api/v1/authorize";
const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
const IDENTITY_URL: &str = "https://oauth.reddit.com/api/v1/me";

/// Artifact some browsers leave on the end of the redirected code.
const CODE_FRAGMENT_ARTIFACT: &str = "#_";

/// Grants accepted by the token endpoint.
#[derive(Clone, Copy)]
pub enum Grant<'a> {
    AuthorizationCode { code: &'a str, redirect_uri: &'a str },
    RefreshToken(&'a str),
}

impl Grant<'_> {
    fn form(&self) -> Vec<(&'static str, &str)> {
        match *self {
            Grant::AuthorizationCode { code, redirect_uri } => vec![
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
            ],
            Grant::RefreshToken(token) => {
                vec![("grant_type", "refresh_token"), ("refresh_token", token)]
            }
        }
    }
}

/// Successful token endpoint response.
#[derive(Clone)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: i64,
    pub refresh_token: Option<String>,
    pub token_type: Option<String>,
    pub scope: Option<String>,
}

/// The token endpoint answers some failures with HTTP 200 and an `error` body.
#[derive(Debug, Deserialize)]
struct RawTokenResponse {
    access_token: Option<String>,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
    token_type: Option<String>,
    scope: Option<String>,
    error: Option<serde_json::Value>,
    message: Option<String>,
}

impl RawTokenResponse {
    fn into_response(self) -> Result<TokenResponse> {
        if let Some(error) = self.error {
            let error = match error {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            anyhow::bail!("{} {}", error, self.message.unwrap_or_default());
        }
        Ok(TokenResponse {
            access_token: self.access_token.context("Missing access_token")?,
            expires_in: self.expires_in.context("Missing expires_in")?,
            refresh_token: self.refresh_token,
            token_type: self.token_type,
            scope: self.scope,
        })
    }
}

/// Result of the "who am I" call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub name: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MeResponse {
    name: String,
    #[serde(default)]
    icon_img: Option<String>,
    #[serde(default)]
    snoovatar_img: Option<String>,
}

impl From<MeResponse> for UserIdentity {
    fn from(me: MeResponse) -> Self {
        let avatar = [me.snoovatar_img, me.icon_img]
            .into_iter()
            .flatten()
            .find(|url| !url.is_empty())
            .map(|url| url.replace("&amp;", "&"));
        UserIdentity {
            name: me.name,
            avatar_url: avatar,
        }
    }
}

/// Token and identity endpoints the credential store talks to.
pub trait OAuthClient: Send + Sync {
    fn request_token(&self, client: &ClientIdentity, grant: Grant<'_>) -> Result<TokenResponse>;
    fn fetch_identity(&self, access_token: &str) -> Result<UserIdentity>;
}

/// Blocking reqwest implementation against reddit.com.
pub struct RedditOAuthClient {
    http: reqwest::blocking::Client,
    token_url: String,
    identity_url: String,
    bundle_id: String,
}

impl RedditOAuthClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            token_url: TOKEN_URL.to_string(),
            identity_url: IDENTITY_URL.to_string(),
            bundle_id: config.bundle_id.clone(),
        })
    }
}

impl OAuthClient for RedditOAuthClient {
    fn request_token(&self, client: &ClientIdentity, grant: Grant<'_>) -> Result<TokenResponse> {
        let response = self
            .http
            .post(&self.token_url)
            .header("Authorization", basic_auth_header(client))
            .header("User-Agent", reddit::user_agent(&self.bundle_id, None))
            .form(&grant.form())
            .send()
            .context("Token request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            anyhow::bail!("Token endpoint returned HTTP {}: {}", status, body);
        }

        let raw: RawTokenResponse = response.json().context("Malformed token response")?;
        raw.into_response()
    }

    fn fetch_identity(&self, access_token: &str) -> Result<UserIdentity> {
        let response = self
            .http
            .get(&self.identity_url)
            .bearer_auth(access_token)
            .header("User-Agent", reddit::user_agent(&self.bundle_id, None))
            .send()
            .context("Identity request failed")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Identity endpoint returned HTTP {}", status);
        }

        let me: MeResponse = response.json().context("Malformed identity response")?;
        Ok(me.into())
    }
}

/// `Basic base64(app_id:app_secret)`; one-legged apps send an empty secret.
pub fn basic_auth_header(client: &ClientIdentity) -> String {
    let pair = format!(
        "{}:{}",
        client.app_id,
        client.app_secret.as_deref().unwrap_or("")
    );
    format!("Basic {}", STANDARD.encode(pair))
}

pub fn authorize_url(
    app_id: &str,
    redirect_uri: &str,
    scopes: &[String],
    state: &str,
) -> Result<Url> {
    let mut url = Url::parse(AUTH_URL)?;
    url.query_pairs_mut()
        .append_pair("client_id", app_id)
        .append_pair("response_type", "code")
        .append_pair("state", state)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("duration", "permanent")
        .append_pair("scope", &scopes.join(" "));
    Ok(url)
}

pub fn random_state() -> String {
    rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

/// Trim the redirect artifact off an authorization code.
pub fn normalize_code(code: &str) -> &str {
    code.strip_suffix(CODE_FRAGMENT_ARTIFACT).unwrap_or(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_fragment_artifact() {
        assert_eq!(normalize_code("abc123#_"), "abc123");
        assert_eq!(normalize_code("abc123"), "abc123");
        assert_eq!(normalize_code("#_"), "");
    }

    #[test]
    fn basic_header_uses_empty_secret_for_installed_apps() {
        let client = ClientIdentity {
            app_id: "myapp".into(),
            app_secret: None,
        };
        // base64("myapp:")
        assert_eq!(basic_auth_header(&client), "Basic bXlhcHA6");
    }

    #[test]
    fn basic_header_includes_secret() {
        let client = ClientIdentity {
            app_id: "id".into(),
            app_secret: Some("secret".into()),
        };
        assert_eq!(basic_auth_header(&client), "Basic aWQ6c2VjcmV0");
    }

    #[test]
    fn authorize_url_carries_permanent_duration() {
        let scopes = vec!["identity".to_string(), "read".to_string()];
        let url = authorize_url("app", "http://localhost:8484/callback", &scopes, "xyz").unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("duration".into(), "permanent".into())));
        assert!(pairs.contains(&("scope".into(), "identity read".into())));
        assert!(pairs.contains(&("state".into(), "xyz".into())));
    }

    #[test]
    fn error_body_is_a_failure() {
        let raw: RawTokenResponse = serde_json::from_str(r#"{"error": "invalid_grant"}"#).unwrap();
        let err = raw.into_response().err().unwrap();
        assert!(err.to_string().contains("invalid_grant"));
    }

    #[test]
    fn numeric_error_body_is_a_failure() {
        let raw: RawTokenResponse =
            serde_json::from_str(r#"{"error": 401, "message": "Unauthorized"}"#).unwrap();
        let err = raw.into_response().err().unwrap();
        assert!(err.to_string().contains("401"));
    }

    #[test]
    fn identity_prefers_snoovatar_and_unescapes() {
        let me: MeResponse = serde_json::from_str(
            r#"{"name": "spez", "icon_img": "https://i/a.png?x=1&amp;y=2", "snoovatar_img": ""}"#,
        )
        .unwrap();
        let identity = UserIdentity::from(me);
        assert_eq!(identity.name, "spez");
        assert_eq!(identity.avatar_url.as_deref(), Some("https://i/a.png?x=1&y=2"));
    }

    #[test]
    fn state_is_alphanumeric() {
        let state = random_state();
        assert_eq!(state.len(), 32);
        assert!(state.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
