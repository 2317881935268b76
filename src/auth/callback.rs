use std::collections::HashMap;

use anyhow::{Context, Result};
use tiny_http::{Response, Server};
use url::Url;

const SUCCESS_HTML: &str = concat!(
    "<html><body><h1>Authorization complete</h1>",
    "<p>You can close this window and return to your terminal.</p></body></html>"
);

/// Open `authorize_url` in a browser and wait for the redirect on
/// `redirect_uri`. Returns the authorization code once `state` checks out.
pub fn wait_for_code(authorize_url: &Url, redirect_uri: &str, state: &str) -> Result<String> {
    let redirect = Url::parse(redirect_uri).context("Invalid redirect URI")?;
    let host = redirect.host_str().context("Redirect URI has no host")?;
    let port = redirect
        .port_or_known_default()
        .context("Redirect URI has no port")?;
    let bind_host = if host == "localhost" { "127.0.0.1" } else { host };

    let server = Server::http(format!("{}:{}", bind_host, port))
        .map_err(|e| anyhow::anyhow!("Failed to start local callback server: {}", e))?;

    eprintln!("Opening browser for Reddit authorization...");
    eprintln!("If the browser doesn't open, visit:\n{}", authorize_url);
    if let Err(e) = open_browser(authorize_url.as_str()) {
        tracing::warn!(error = %e, "Could not launch browser");
    }

    eprintln!("Waiting for authorization...");

    for request in server.incoming_requests() {
        let parsed = Url::parse(&format!("http://localhost{}", request.url()))?;
        if parsed.path() != redirect.path() {
            let _ = request.respond(Response::from_string("Not found").with_status_code(404));
            continue;
        }

        let params: HashMap<_, _> = parsed.query_pairs().collect();
        match extract_code(&params, state) {
            Ok(code) => {
                let response = Response::from_string(SUCCESS_HTML).with_header(
                    tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"text/html"[..])
                        .map_err(|_| anyhow::anyhow!("Invalid header"))?,
                );
                let _ = request.respond(response);
                return Ok(code);
            }
            Err(e) => {
                let page = format!("Authorization failed: {}", e);
                let _ = request.respond(Response::from_string(page));
                return Err(e);
            }
        }
    }

    anyhow::bail!("Callback server closed before authorization completed")
}

fn extract_code(
    params: &HashMap<std::borrow::Cow<'_, str>, std::borrow::Cow<'_, str>>,
    state: &str,
) -> Result<String> {
    if let Some(error) = params.get("error") {
        anyhow::bail!("Authorization denied: {}", error);
    }
    let received_state = params.get("state").context("Callback is missing state")?;
    if received_state.as_ref() != state {
        anyhow::bail!("OAuth state mismatch");
    }
    let code = params.get("code").context("Callback is missing code")?;
    Ok(code.to_string())
}

fn open_browser(url: &str) -> Result<()> {
    #[cfg(target_os = "macos")]
    std::process::Command::new("open").arg(url).spawn()?;

    #[cfg(target_os = "linux")]
    std::process::Command::new("xdg-open").arg(url).spawn()?;

    #[cfg(target_os = "windows")]
    std::process::Command::new("cmd")
        .args(["/C", "start", url])
        .spawn()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    fn params(
        pairs: &[(&'static str, &'static str)],
    ) -> HashMap<Cow<'static, str>, Cow<'static, str>> {
        pairs
            .iter()
            .map(|(k, v)| (Cow::Borrowed(*k), Cow::Borrowed(*v)))
            .collect()
    }

    #[test]
    fn accepts_matching_state() {
        let code = extract_code(&params(&[("state", "abc"), ("code", "xyz#_")]), "abc").unwrap();
        assert_eq!(code, "xyz#_");
    }

    #[test]
    fn rejects_state_mismatch() {
        let err = extract_code(&params(&[("state", "other"), ("code", "xyz")]), "abc").unwrap_err();
        assert!(err.to_string().contains("state mismatch"));
    }

    #[test]
    fn reports_denial() {
        let err = extract_code(&params(&[("error", "access_denied")]), "abc").unwrap_err();
        assert!(err.to_string().contains("access_denied"));
    }
}
