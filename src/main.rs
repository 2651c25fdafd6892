//! questrade-token - inspect and maintain the local Questrade API token
//!
//! Without a subcommand, prints the stored token as JSON.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use questrade_token::auth::{
    print_token, write_token, AuthorizationFlow, QuestradeFlow, TokenStore,
};
use questrade_token::Config;

#[derive(Parser)]
#[command(name = "questrade-token")]
#[command(about = "Manage the locally stored Questrade API token", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Token file to use instead of ~/questrade_token.json
    #[arg(long, global = true)]
    token_file: Option<PathBuf>,

    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the stored token as JSON (default)
    Show,

    /// Open the Questrade sign-in page to authorize API access
    Login,

    /// Exchange a refresh token for a new token and print it
    Refresh {
        /// Refresh token to use (defaults to the stored one)
        refresh_token: Option<String>,

        /// Write the new token to the token file
        #[arg(short, long)]
        save: bool,
    },

    /// Show whether the stored token is valid and when it expires
    Status,

    /// Delete the token file
    Delete,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging on stderr; stdout is reserved for token JSON
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(path) = cli.token_file {
        config.token_file = Some(path);
    }
    let store = config.token_store()?;

    match cli.command.unwrap_or(Commands::Show) {
        Commands::Show => {
            show(&store, io::stdout().lock())?;
        }
        Commands::Login => {
            store.get_token(true)?;
            println!("Sign in and generate a token on the API access page, then run:");
            println!("  questrade-token refresh --save <TOKEN>");
        }
        Commands::Refresh {
            refresh_token,
            save,
        } => {
            refresh(&store, refresh_token, save).await?;
        }
        Commands::Status => {
            status(&store, io::stdout().lock())?;
        }
        Commands::Delete => {
            store
                .delete_token()
                .with_context(|| format!("Failed to delete {}", store.path().display()))?;
            println!("Token deleted.");
        }
    }

    Ok(())
}

async fn refresh(
    store: &TokenStore<QuestradeFlow>,
    refresh_token: Option<String>,
    save: bool,
) -> Result<()> {
    let refresh_token = match refresh_token {
        Some(rt) => rt,
        None => store
            .get_refresh_token(None)?
            .context("No stored token. Run 'questrade-token login' first.")?,
    };

    let token = store
        .refresh_token(&refresh_token)
        .await
        .context("Token refresh failed")?;

    if save {
        store.flow().save_token(&token)?;
    }
    print_token(Some(&token)).context("Failed to write token to stdout")?;
    Ok(())
}

/// Print the stored token as JSON, or `null` when there is none
fn show<F: AuthorizationFlow>(store: &TokenStore<F>, out: impl Write) -> Result<()> {
    let token = store.get_token(false)?;
    write_token(out, token.as_ref()).context("Failed to write token")?;
    Ok(())
}

fn status<F: AuthorizationFlow>(store: &TokenStore<F>, mut out: impl Write) -> Result<()> {
    writeln!(out, "Token file:  {}", store.path().display())?;

    let Some(token) = store.get_token(false)? else {
        writeln!(out, "Token:       none")?;
        writeln!(out, "\nRun 'questrade-token login' to authenticate.")?;
        return Ok(());
    };

    writeln!(out, "Token:       present")?;
    if let Ok(server) = token.api_server() {
        writeln!(out, "API server:  {}", server)?;
    }

    match store.expires_at(Some(&token))? {
        Some(deadline) if !store.is_token_expired(Some(&token))? => {
            writeln!(out, "Access tok:  valid")?;
            writeln!(out, "  expires_at: {}", deadline.to_rfc3339())?;
        }
        Some(deadline) => {
            writeln!(out, "Access tok:  expired")?;
            writeln!(out, "  expired_at: {}", deadline.to_rfc3339())?;
        }
        None => {
            writeln!(out, "Access tok:  expired (no expires_in)")?;
        }
    }

    Ok(())
}
