//! deskcli entry point

mod collaborators;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use collaborators::{SettingsCredentialReader, StdinPrompt, SystemBrowser};
use desk_auth::{
    AuthorizeRequest, Authorizer, Collaborators, HttpTokenExchanger, ManualStateStore,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "deskcli", about = "Desktop CLI for provider APIs", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Obtain a refresh token via an OAuth2 authorization flow
    Auth {
        #[command(subcommand)]
        action: Option<AuthAction>,

        #[command(flatten)]
        opts: AuthOpts,
    },
}

#[derive(Subcommand)]
enum AuthAction {
    /// Print the manual authorization URL without prompting or waiting
    Url {
        #[command(flatten)]
        opts: UrlOpts,
    },
}

#[derive(Args)]
struct AuthOpts {
    /// Named credentials entry from settings.yaml
    #[arg(long, default_value = "default")]
    client: String,

    /// Scope to request; repeat for multiple scopes
    #[arg(long = "scope")]
    scopes: Vec<String>,

    /// Always show the consent screen (guarantees a fresh refresh token)
    #[arg(long)]
    force_consent: bool,

    /// Use the manual copy/paste flow instead of a local callback server
    #[arg(long)]
    manual: bool,

    /// Pre-supplied authorization code (skips the browser step)
    #[arg(long, conflicts_with = "redirect_url")]
    code: Option<String>,

    /// Pre-supplied redirect URL to extract the code and state from
    #[arg(long)]
    redirect_url: Option<String>,

    /// Fail unless the returned state matches a stored in-flight attempt
    #[arg(long)]
    require_state: bool,

    /// Overall flow timeout in seconds
    #[arg(long, default_value_t = 120)]
    timeout_secs: u64,
}

#[derive(Args)]
struct UrlOpts {
    /// Named credentials entry from settings.yaml
    #[arg(long, default_value = "default")]
    client: String,

    /// Scope to request; repeat for multiple scopes
    #[arg(long = "scope")]
    scopes: Vec<String>,

    /// Always show the consent screen
    #[arg(long)]
    force_consent: bool,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

fn build_authorizer() -> Result<Authorizer> {
    let state_dir = desk_config::auth_state_dir()?;
    desk_config::ensure_dir_exists(&state_dir)?;

    let collaborators = Collaborators {
        credentials: Arc::new(SettingsCredentialReader::new(desk_config::settings_file()?)),
        exchanger: Arc::new(HttpTokenExchanger::new()),
        browser: Arc::new(SystemBrowser),
        prompt: Arc::new(StdinPrompt),
    };

    Ok(Authorizer::new(
        collaborators,
        ManualStateStore::new(state_dir),
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Auth {
            action: Some(AuthAction::Url { opts }),
            ..
        } => {
            let authorizer = build_authorizer()?;
            let issued = authorizer
                .manual_auth_url(&opts.client, &opts.scopes, opts.force_consent)
                .await?;
            if issued.reused {
                debug!("Reusing in-flight attempt {}", issued.state);
            }
            println!("{}", issued.auth_url);
        }
        Commands::Auth { action: None, opts } => {
            let authorizer = build_authorizer()?;

            let mut req = AuthorizeRequest::new(opts.client, opts.scopes);
            req.force_consent = opts.force_consent;
            req.manual = opts.manual;
            req.code = opts.code;
            req.redirect_url = opts.redirect_url;
            req.require_state = opts.require_state;
            req.timeout = Duration::from_secs(opts.timeout_secs);

            let cancel = CancellationToken::new();
            let ctrl_c_cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    ctrl_c_cancel.cancel();
                }
            });

            let refresh_token = authorizer.authorize(&req, cancel).await?;

            // The token is the command's output; everything else goes to
            // stderr.
            println!("{}", refresh_token);
        }
    }

    Ok(())
}
