//! Authenticated access to the Reddit resource API.

mod client;
mod error;

pub use client::ApiClient;
pub use error::ApiError;

/// `platform:bundle-id:version (by /u/<name>)`
pub fn user_agent(bundle_id: &str, user_name: Option<&str>) -> String {
    format!(
        "{}:{}:{} (by /u/{})",
        std::env::consts::OS,
        bundle_id,
        env!("CARGO_PKG_VERSION"),
        user_name.filter(|n| !n.is_empty()).unwrap_or("unknown")
    )
}
