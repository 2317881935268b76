pub mod callback;
mod error;
pub mod oauth;

pub use error::AuthError;
pub use oauth::{Grant, OAuthClient, RedditOAuthClient, TokenResponse, UserIdentity};
