use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod cli;

#[derive(Parser)]
#[command(name = "redline", about = "Reddit credentials and comment threads")]
struct Cli {
    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List credentials
    List,

    /// Add a credential for a Reddit app
    Add {
        /// App (client) id; defaults to the saved app identity
        #[arg(long)]
        app_id: Option<String>,
        /// App secret, for two-legged apps; replaces the saved secret
        #[arg(long)]
        app_secret: Option<String>,
        /// Remember this app identity as the default
        #[arg(long)]
        save: bool,
    },

    /// Delete a credential
    Remove {
        /// Credential id (or unique prefix)
        id: String,
    },

    /// Select the active credential
    Use {
        /// Credential id (or unique prefix)
        id: String,
    },

    /// Authorize a credential in the browser
    Login {
        /// Credential id (uses the active one if omitted)
        id: Option<String>,
    },

    /// Forget tokens for a credential
    Logout {
        /// Credential id (uses the active one if omitted)
        id: Option<String>,
    },

    /// Print a valid access token (refreshes if stale)
    Token,

    /// Credential health overview
    Status,

    /// Show the effective configuration, optionally updating it
    Config {
        /// Secret backend to persist (file or keyring)
        #[arg(long)]
        backend: Option<String>,
        /// Redirect URI to persist
        #[arg(long)]
        redirect_uri: Option<String>,
    },

    /// Show a post's comment thread
    Comments {
        subreddit: String,
        /// Post id (with or without t3_)
        article: String,
        /// Collapse this comment id (repeatable)
        #[arg(long = "collapse")]
        collapse: Vec<String>,
        /// Sort order (defaults to config)
        #[arg(long)]
        sort: Option<String>,
        /// Reply depth (defaults to config)
        #[arg(long)]
        depth: Option<u32>,
    },

    /// Reply to a post or comment
    Reply {
        /// Parent fullname (t1_… or t3_…)
        parent: String,
        text: String,
    },

    /// Vote on a post or comment
    Vote {
        /// Thing fullname
        fullname: String,
        /// up, down or none
        direction: String,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "redline=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match &cli.command {
        Commands::List => cli::commands::cmd_list(),
        Commands::Add {
            app_id,
            app_secret,
            save,
        } => cli::commands::cmd_add(app_id.as_deref(), app_secret.as_deref(), *save),
        Commands::Remove { id } => cli::commands::cmd_remove(id),
        Commands::Use { id } => cli::commands::cmd_use(id),
        Commands::Login { id } => cli::commands::cmd_login(id.as_deref()),
        Commands::Logout { id } => cli::commands::cmd_logout(id.as_deref()),
        Commands::Token => cli::commands::cmd_token(),
        Commands::Status => cli::commands::cmd_status(),
        Commands::Config {
            backend,
            redirect_uri,
        } => cli::commands::cmd_config(backend.as_deref(), redirect_uri.as_deref()),
        Commands::Comments {
            subreddit,
            article,
            collapse,
            sort,
            depth,
        } => cli::commands::cmd_comments(subreddit, article, collapse, sort.as_deref(), *depth),
        Commands::Reply { parent, text } => cli::commands::cmd_reply(parent, text),
        Commands::Vote {
            fullname,
            direction,
        } => cli::commands::cmd_vote(fullname, direction),
    };

    if let Err(e) = result {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}
