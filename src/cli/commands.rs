use std::sync::Arc;

use anyhow::{Context, Result};
use uuid::Uuid;

use redline::auth::{callback, oauth, RedditOAuthClient};
use redline::comments::{self, CollapseSet, FlatComment, Vote};
use redline::config::Config;
use redline::reddit::ApiClient;
use redline::storage::{self, ClientIdentity, Credential, CredentialStore, ValidationStatus};

fn open_store(config: &Config) -> Result<CredentialStore> {
    let secrets = storage::open_secret_store(config)?;
    let oauth = Arc::new(RedditOAuthClient::new(config)?);
    Ok(CredentialStore::open(secrets, oauth, &config.redirect_uri)?)
}

/// Full id or a unique prefix of one.
fn resolve_id(store: &CredentialStore, input: &str) -> Result<Uuid> {
    if let Ok(id) = Uuid::parse_str(input) {
        return Ok(id);
    }
    let matches: Vec<Uuid> = store
        .credentials()
        .iter()
        .map(Credential::id)
        .filter(|id| id.to_string().starts_with(input))
        .collect();
    match matches.as_slice() {
        [id] => Ok(*id),
        [] => anyhow::bail!("No credential matches '{}'", input),
        _ => anyhow::bail!("'{}' is ambiguous ({} credentials match)", input, matches.len()),
    }
}

fn resolve_or_active(store: &CredentialStore, input: Option<&str>) -> Result<Uuid> {
    match input {
        Some(id) => resolve_id(store, id),
        None => store
            .active_id()
            .context("No active credential. Run `redline use <id>` or pass an id."),
    }
}

fn short_id(id: Uuid) -> String {
    id.to_string()[..8].to_string()
}

/// Client for resource calls on behalf of the active credential.
fn api_session(config: &Config) -> Result<(ApiClient, redline::storage::AccessToken)> {
    let store = open_store(config)?;
    let token = store.get_valid_access_token()?;
    let user = store.active().and_then(|c| c.user_name().map(str::to_string));
    let client = ApiClient::new(config, user.as_deref())?;
    Ok((client, token))
}

pub fn cmd_list() -> Result<()> {
    let config = Config::load()?;
    let store = open_store(&config)?;
    let credentials = store.credentials();

    if credentials.is_empty() {
        eprintln!("No credentials configured. Run `redline add --app-id <id>` to get started.");
        return Ok(());
    }

    let active = store.active_id();
    for cred in &credentials {
        let marker = if Some(cred.id()) == active { " *" } else { "" };
        println!(
            "{}{} {} ({})",
            short_id(cred.id()),
            marker,
            cred.user_name().unwrap_or("-"),
            cred.validation_status()
        );
    }
    Ok(())
}

/// Flags win; without `--app-id` the saved identity is used, with
/// `--app-secret` replacing its secret when given.
fn resolve_identity(
    app_id: Option<&str>,
    app_secret: Option<&str>,
    saved: Option<ClientIdentity>,
) -> Result<ClientIdentity> {
    let app_secret = app_secret.map(|s| s.trim().to_string());
    match app_id {
        Some(app_id) => Ok(ClientIdentity {
            app_id: app_id.trim().to_string(),
            app_secret,
        }),
        None => {
            let mut identity = saved.context("No --app-id given and no saved app identity")?;
            if app_secret.is_some() {
                identity.app_secret = app_secret;
            }
            Ok(identity)
        }
    }
}

pub fn cmd_add(app_id: Option<&str>, app_secret: Option<&str>, save: bool) -> Result<()> {
    let config = Config::load()?;
    let store = open_store(&config)?;

    let saved = match app_id {
        Some(_) => None,
        None => store.saved_client_identity()?,
    };
    let identity = resolve_identity(app_id, app_secret, saved)?;

    let credential = Credential::new(identity.app_id.clone(), identity.app_secret.clone());
    match credential.validation_status() {
        ValidationStatus::Empty | ValidationStatus::Invalid => {
            anyhow::bail!("App id looks {}", credential.validation_status())
        }
        ValidationStatus::MaybeValid => {
            eprintln!("Warning: app id has an unexpected length; continuing anyway.")
        }
        ValidationStatus::Valid | ValidationStatus::Authorized => {}
    }

    if save {
        store.save_client_identity(&identity)?;
    }

    let id = credential.id();
    store.add(credential)?;
    eprintln!(
        "Added credential {}. Run `redline login {}` to authorize.",
        short_id(id),
        short_id(id)
    );
    Ok(())
}

pub fn cmd_remove(id: &str) -> Result<()> {
    let config = Config::load()?;
    let store = open_store(&config)?;
    let id = resolve_id(&store, id)?;
    store.remove(id)?;
    eprintln!("Removed {}.", short_id(id));
    Ok(())
}

pub fn cmd_use(id: &str) -> Result<()> {
    let config = Config::load()?;
    let store = open_store(&config)?;
    let id = resolve_id(&store, id)?;
    store.set_active(id)?;
    eprintln!("Active credential set to {}.", short_id(id));
    Ok(())
}

pub fn cmd_login(id: Option<&str>) -> Result<()> {
    let config = Config::load()?;
    let store = open_store(&config)?;
    let id = resolve_or_active(&store, id)?;

    let state = oauth::random_state();
    let url = store.authorize_url(id, &config.scopes, &state)?;
    let code = callback::wait_for_code(&url, &config.redirect_uri, &state)?;

    let credential = store.reauthorize(id, &code)?;
    eprintln!(
        "Authorized {} as /u/{}.",
        short_id(credential.id()),
        credential.user_name().unwrap_or("unknown")
    );
    Ok(())
}

pub fn cmd_logout(id: Option<&str>) -> Result<()> {
    let config = Config::load()?;
    let store = open_store(&config)?;
    let id = resolve_or_active(&store, id)?;
    store.sign_out(id)?;
    eprintln!("Signed out {}.", short_id(id));
    Ok(())
}

pub fn cmd_token() -> Result<()> {
    let config = Config::load()?;
    let store = open_store(&config)?;
    let token = store.get_valid_access_token()?;
    println!("{}", token.token);
    Ok(())
}

pub fn cmd_status() -> Result<()> {
    let config = Config::load()?;
    let store = open_store(&config)?;
    let report = store.status_report();

    if report.is_empty() {
        eprintln!("No credentials configured.");
        return Ok(());
    }

    for row in report {
        let marker = if row.active { " [active]" } else { "" };
        let token = match row.token_age {
            Some(age) if row.token_fresh => format!("token {}m old", age.num_minutes()),
            Some(_) => "token stale".to_string(),
            None => "no token".to_string(),
        };
        println!(
            "{}{} -- {} | {} | app {}",
            short_id(row.id),
            marker,
            row.user_name.as_deref().unwrap_or("-"),
            row.status,
            row.app_id
        );
        println!("    {}", token);
    }
    Ok(())
}

pub fn cmd_config(backend: Option<&str>, redirect_uri: Option<&str>) -> Result<()> {
    let mut config = Config::load()?;

    if backend.is_some() || redirect_uri.is_some() {
        if let Some(backend) = backend {
            config.secret_backend = backend.parse()?;
        }
        if let Some(uri) = redirect_uri {
            url::Url::parse(uri).with_context(|| format!("Invalid redirect URI '{}'", uri))?;
            config.redirect_uri = uri.to_string();
        }
        config.save()?;
        eprintln!("Configuration saved.");
    }

    println!("{}", toml::to_string_pretty(&config)?.trim_end());
    Ok(())
}

pub fn cmd_comments(
    subreddit: &str,
    article: &str,
    collapse: &[String],
    sort: Option<&str>,
    depth: Option<u32>,
) -> Result<()> {
    let config = Config::load()?;
    let (client, token) = api_session(&config)?;

    let thread = client.fetch_comments(
        &token,
        subreddit,
        article,
        sort.unwrap_or(&config.comment_sort),
        depth.unwrap_or(config.comment_depth),
    )?;

    if let Some(post) = &thread.post {
        println!("{} (by /u/{}, {} points)", post.title, post.author, post.score);
        println!();
    }

    let collapsed: CollapseSet = collapse.iter().cloned().collect();
    let flat = comments::flatten(&thread.comments);
    let visible = comments::apply_collapse(&flat, &collapsed);
    print!("{}", render_thread(&visible));

    let hidden_more: u64 = thread.more.iter().map(|m| m.count).sum();
    if hidden_more > 0 {
        println!("({} more comments not loaded)", hidden_more);
    }
    Ok(())
}

pub fn cmd_reply(parent: &str, text: &str) -> Result<()> {
    let config = Config::load()?;
    let (client, token) = api_session(&config)?;
    client.submit_comment(&token, parent, text)?;
    eprintln!("Reply submitted.");
    Ok(())
}

pub fn cmd_vote(fullname: &str, direction: &str) -> Result<()> {
    let vote = match direction {
        "up" => Vote::Up,
        "down" => Vote::Down,
        "none" | "clear" => Vote::None,
        other => anyhow::bail!("Unknown vote direction '{}'. Use up, down or none", other),
    };
    let config = Config::load()?;
    let (client, token) = api_session(&config)?;
    client.vote(&token, fullname, vote)?;
    Ok(())
}

fn render_thread(visible: &[FlatComment]) -> String {
    let mut out = String::new();
    for comment in visible {
        let indent = "  ".repeat(comment.depth as usize);
        let mut tags = Vec::new();
        if comment.info.is_submitter {
            tags.push("OP");
        }
        if comment.info.is_moderator {
            tags.push("MOD");
        }
        if comment.info.stickied {
            tags.push("pinned");
        }
        let tags = if tags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", tags.join(", "))
        };

        out.push_str(&format!(
            "{}{}{} ({} points) {}\n",
            indent, comment.info.author, tags, comment.info.score, comment.info.id
        ));
        if comment.is_collapsed {
            let label = comments::replies_label(comment.child_count);
            out.push_str(&format!("{}  {}\n", indent, label));
        } else {
            for line in comment.info.body.lines() {
                out.push_str(&format!("{}  {}\n", indent, line));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use redline::comments::decode_thread;

    fn saved() -> ClientIdentity {
        ClientIdentity {
            app_id: "abcdefghijklmn".to_string(),
            app_secret: Some("saved-secret".to_string()),
        }
    }

    #[test]
    fn explicit_app_id_ignores_saved_identity() {
        let identity = resolve_identity(Some(" nmlkjihgfedcba "), None, Some(saved())).unwrap();
        assert_eq!(identity.app_id, "nmlkjihgfedcba");
        assert_eq!(identity.app_secret, None);
    }

    #[test]
    fn app_secret_alone_overrides_saved_secret() {
        let identity = resolve_identity(None, Some("new-secret"), Some(saved())).unwrap();
        assert_eq!(identity.app_id, "abcdefghijklmn");
        assert_eq!(identity.app_secret.as_deref(), Some("new-secret"));
    }

    #[test]
    fn saved_identity_used_when_no_flags() {
        assert!(resolve_identity(None, None, Some(saved())).unwrap() == saved());
    }

    #[test]
    fn app_secret_without_any_app_id_is_rejected() {
        assert!(resolve_identity(None, Some("secret"), None).is_err());
    }

    #[test]
    fn renders_collapsed_label() {
        let body = r#"[
            {"kind": "Listing", "data": {"children": []}},
            {"kind": "Listing", "data": {"children": [
                {"kind": "t1", "data": {"id": "a", "author": "x", "body": "top", "depth": 0,
                    "replies": {"kind": "Listing", "data": {"children": [
                        {"kind": "t1", "data": {"id": "b", "author": "y", "body": "reply", "depth": 1, "replies": ""}}
                    ]}}}}
            ]}}
        ]"#;
        let thread = decode_thread(body).unwrap();
        let flat = comments::flatten(&thread.comments);
        let collapsed: CollapseSet = ["a".to_string()].into_iter().collect();
        let text = render_thread(&comments::apply_collapse(&flat, &collapsed));

        assert!(text.contains("[1 reply]"));
        assert!(!text.contains("reply\n  "));
        assert!(!text.contains("  y "));
    }
}
