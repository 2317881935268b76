use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::comments::wire::{self, CommentsPage};
use crate::comments::{Thread, Vote};
use crate::config::Config;
use crate::storage::AccessToken;

use super::ApiError;

const API_BASE: &str = "https://oauth.reddit.com";

/// Bearer-authenticated client for the resource endpoints.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::blocking::Client,
    base_url: String,
    user_agent: String,
}

impl ApiClient {
    /// `user_name` only feeds the User-Agent.
    pub fn new(config: &Config, user_name: Option<&str>) -> Result<Self, ApiError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: API_BASE.to_string(),
            user_agent: super::user_agent(&config.bundle_id, user_name),
        })
    }

    /// GET `path` and decode the JSON body.
    pub fn get_json<T: DeserializeOwned>(
        &self,
        token: &AccessToken,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let body = self.get_text(token, path, query)?;
        wire::from_str_unbounded(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// Comments page for one post, decoded into a tree.
    pub fn fetch_comments(
        &self,
        token: &AccessToken,
        subreddit: &str,
        article: &str,
        sort: &str,
        depth: u32,
    ) -> Result<Thread, ApiError> {
        let article = article.strip_prefix("t3_").unwrap_or(article);
        let path = format!(
            "/r/{}/comments/{}",
            urlencoding::encode(subreddit),
            urlencoding::encode(article)
        );
        let query = [
            ("sort", sort.to_string()),
            ("depth", depth.to_string()),
            ("raw_json", "1".to_string()),
        ];

        let page: CommentsPage = self.get_json(token, &path, &query)?;
        let thread = page.into_thread();
        tracing::debug!(
            subreddit,
            article,
            top_level = thread.comments.len(),
            more_stubs = thread.more.len(),
            "Fetched comments"
        );
        Ok(thread)
    }

    /// Post a reply to `parent_fullname` (`t1_…` or `t3_…`).
    ///
    /// Callers typically show an optimistic placeholder and do not wait on
    /// or reconcile with the result.
    pub fn submit_comment(
        &self,
        token: &AccessToken,
        parent_fullname: &str,
        text: &str,
    ) -> Result<(), ApiError> {
        let form = [("api_type", "json"), ("thing_id", parent_fullname), ("text", text)];
        let body = self.post_form(token, "/api/comment", &form)?;
        check_json_errors(&body)
    }

    pub fn vote(&self, token: &AccessToken, fullname: &str, vote: Vote) -> Result<(), ApiError> {
        let dir = vote.direction().to_string();
        let form = [("id", fullname), ("dir", dir.as_str())];
        self.post_form(token, "/api/vote", &form)?;
        Ok(())
    }

    fn get_text(
        &self,
        token: &AccessToken,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<String, ApiError> {
        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(&token.token)
            .header("User-Agent", &self.user_agent)
            .query(query)
            .send()?;
        Self::check_response(response)
    }

    fn post_form(
        &self,
        token: &AccessToken,
        path: &str,
        form: &[(&str, &str)],
    ) -> Result<String, ApiError> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&token.token)
            .header("User-Agent", &self.user_agent)
            .form(form)
            .send()?;
        Self::check_response(response)
    }

    fn check_response(response: reqwest::blocking::Response) -> Result<String, ApiError> {
        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            if status.as_u16() == 429 {
                tracing::warn!("Reddit rate limit hit (429)");
            }
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

/// `api_type=json` endpoints report failures as `{"json": {"errors": [...]}}`.
fn check_json_errors(body: &str) -> Result<(), ApiError> {
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| ApiError::Decode(e.to_string()))?;
    let errors = value
        .pointer("/json/errors")
        .and_then(|e| e.as_array())
        .filter(|errors| !errors.is_empty());

    match errors {
        Some(errors) => {
            let message = errors
                .iter()
                .map(|e| match e.as_array() {
                    Some(parts) => parts
                        .iter()
                        .filter_map(|p| p.as_str())
                        .collect::<Vec<_>>()
                        .join(": "),
                    None => e.to_string(),
                })
                .collect::<Vec<_>>()
                .join("; ");
            Err(ApiError::Rejected(message))
        }
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepted_comment_response() {
        let body = r#"{"json": {"errors": [], "data": {"things": []}}}"#;
        assert!(check_json_errors(body).is_ok());
    }

    #[test]
    fn rejected_comment_response() {
        let body = r#"{"json": {"errors": [["RATELIMIT", "you are doing that too much", "ratelimit"]]}}"#;
        match check_json_errors(body) {
            Err(ApiError::Rejected(msg)) => assert!(msg.starts_with("RATELIMIT: you are doing")),
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn non_json_response_is_decode_error() {
        assert!(matches!(check_json_errors("<html>"), Err(ApiError::Decode(_))));
    }
}
