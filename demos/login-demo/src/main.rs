//! Power BI Login Demo
//!
//! Signs in with one of the supported flows and prints what the session
//! exposes:
//! - `device`  - device-code flow, sign in from any browser
//! - `browser` - interactive flow through the local browser
//! - `token`   - wrap a token payload (JSON file) acquired elsewhere
//!
//! Run with:
//!   cargo run -p powerbi-login-demo -- device
//!   cargo run -p powerbi-login-demo -- browser --report-scopes
//!   cargo run -p powerbi-login-demo -- token payload.json --refresh

mod output;

use anyhow::Context;
use clap::{Parser, Subcommand};
use powerbi_auth::{
    AuthConfig, AuthenticationSession, Authenticator, CREATE_REPORT_SCOPES, TokenPayload,
};
use std::path::PathBuf;

/// Power BI sign-in demo
#[derive(Parser, Debug)]
#[command(name = "powerbi-login-demo")]
#[command(about = "Sign in to Power BI and inspect the resulting token")]
struct Args {
    #[command(subcommand)]
    flow: Flow,

    /// Application (client) id; defaults to the Azure CLI public client
    #[arg(long, global = true)]
    client_id: Option<String>,

    /// Authority URL, e.g. https://login.microsoftonline.com/<tenant>
    #[arg(long, global = true)]
    authority: Option<String>,

    /// Request the scopes needed to create reports
    #[arg(long, global = true)]
    report_scopes: bool,

    /// Refresh the token once after signing in
    #[arg(long, global = true)]
    refresh: bool,

    /// Print the raw access token
    #[arg(long, global = true)]
    show_token: bool,
}

#[derive(Subcommand, Debug)]
enum Flow {
    /// Device-code flow
    Device,
    /// Interactive flow through the local browser
    Browser {
        /// Print the sign-in URL instead of launching a browser
        #[arg(long)]
        no_browser: bool,
    },
    /// Wrap a token payload read from a JSON file
    Token {
        /// Path to the token payload
        path: PathBuf,
    },
}

/// Apply command-line overrides on top of `config` (normally read from the
/// environment)
fn build_config(args: &Args, mut config: AuthConfig) -> AuthConfig {
    if args.report_scopes {
        config.scopes = CREATE_REPORT_SCOPES.iter().map(ToString::to_string).collect();
    }
    if let Some(client_id) = &args.client_id {
        config.client_id = client_id.clone();
    }
    if let Some(authority) = &args.authority {
        config.authority = authority.clone();
    }
    if let Flow::Browser { no_browser: true } = args.flow {
        config.open_browser = false;
    }
    config
}

async fn sign_in(args: &Args, authenticator: &Authenticator) -> anyhow::Result<AuthenticationSession> {
    let session = match &args.flow {
        Flow::Device => authenticator.device_code_login().await?,
        Flow::Browser { .. } => authenticator.interactive_login().await?,
        Flow::Token { path } => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading token payload from {}", path.display()))?;
            authenticator.session_from_payload(TokenPayload::from_json(&raw)?)?
        }
    };
    Ok(session)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("powerbi_auth=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = build_config(&args, AuthConfig::from_env());
    let authenticator = Authenticator::new(&config)?;

    output::print_banner(&authenticator);

    let mut session = sign_in(&args, &authenticator).await?;
    output::print_session(&session, args.show_token);

    if args.refresh {
        session.refresh().await.context("refreshing token")?;
        output::print_refreshed(&session, args.show_token);
    }

    Ok(())
}
