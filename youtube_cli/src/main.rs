use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tokio::sync::oneshot;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;
use youtube_sort::{
    auth::{self, FileTokenStore, OAuthClient, RedirectListener, TokenStore, TOKEN_FILE},
    config::{self, CONFIG_DIR_ENV, DEFAULT_REDIRECT_URL},
    url::{playlist_url, require_playlist_id},
    youtube::DEFAULT_MAX_RETRIES,
    Config, ConsoleProgress, NoProgress, PacingConfig, PipelineOptions, SortError,
    SortPipeline, UnresolvedPolicy, YouTubeClient,
};

#[derive(Parser)]
#[command(name = "sortyt", version, about = "Sort YouTube playlists by video upload date")]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Where credentials and tokens are kept [default: the platform config dir]
    #[arg(long, global = true, env = CONFIG_DIR_ENV)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Store the OAuth client credentials of your Google Cloud project
    Setup {
        #[arg(long)]
        client_id: Option<String>,
        #[arg(long)]
        client_secret: Option<String>,
        #[arg(long, default_value = DEFAULT_REDIRECT_URL)]
        redirect_url: String,
    },
    /// Authorize access to your YouTube account
    Auth,
    /// Create a private copy of a playlist ordered oldest to newest
    Sort {
        /// Playlist URL (or bare playlist id)
        url: String,
        /// Leave out videos whose upload date cannot be resolved
        #[arg(long)]
        drop_unresolved: bool,
        /// Minimum delay between paced API calls, in milliseconds
        #[arg(long, default_value_t = 100)]
        pace_ms: u64,
        /// Retries for rate-limited or failed requests
        #[arg(long, default_value_t = DEFAULT_MAX_RETRIES)]
        max_retries: u32,
        /// No progress bar
        #[arg(short, long)]
        quiet: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();

    let dir = match cli.config_dir {
        Some(dir) => dir,
        None => config::config_dir()?,
    };
    debug!("Using config directory {}", dir.display());

    match cli.command {
        Command::Setup {
            client_id,
            client_secret,
            redirect_url,
        } => setup(&dir, client_id, client_secret, redirect_url),
        Command::Auth => authorize(&dir).await,
        Command::Sort {
            url,
            drop_unresolved,
            pace_ms,
            max_retries,
            quiet,
        } => {
            let pacing = PacingConfig {
                interval: Duration::from_millis(pace_ms),
                ..PacingConfig::default()
            };
            let options = PipelineOptions {
                unresolved: if drop_unresolved {
                    UnresolvedPolicy::Drop
                } else {
                    UnresolvedPolicy::Keep
                },
                pacing,
                ..PipelineOptions::default()
            };
            sort(&dir, &url, options, max_retries, quiet).await
        }
    }
}

fn setup(
    dir: &Path,
    client_id: Option<String>,
    client_secret: Option<String>,
    redirect_url: String,
) -> anyhow::Result<()> {
    println!("Setting up YouTube API credentials.");
    println!();
    println!("1. Open https://console.cloud.google.com/ and select or create a project");
    println!("2. Enable the YouTube Data API v3");
    println!(
        "3. Configure the OAuth consent screen (External) and add your account as a test user"
    );
    println!("4. Create an OAuth client ID of type Desktop application");
    println!();

    let client_id = match client_id {
        Some(id) => id,
        None => prompt("Client ID: ")?,
    };
    let client_secret = match client_secret {
        Some(secret) => secret,
        None => prompt("Client Secret: ")?,
    };

    let config = Config {
        client_id,
        client_secret,
        redirect_url,
    };
    let path = config
        .save_to(dir)
        .context("failed to save configuration")?;
    println!("Configuration saved to {}", path.display());
    println!("Next, run `sortyt auth`.");
    Ok(())
}

async fn authorize(dir: &Path) -> anyhow::Result<()> {
    let oauth = OAuthClient::new(Config::load_from(dir)?)?;
    let store = FileTokenStore::new(dir.join(TOKEN_FILE));
    run_auth_flow(&oauth, &store).await?;
    Ok(())
}

/// Sends the user through consent and stores the resulting token.
///
/// The redirect is caught on the loopback address when the redirect URL's
/// port is free; pasting the code or the redirected URL works either way.
async fn run_auth_flow(oauth: &OAuthClient, store: &FileTokenStore) -> anyhow::Result<String> {
    let state = auth::new_state();
    let url = oauth.authorize_url(&state)?;
    println!("Visit this URL to authorize:\n{url}\n");

    let code = match RedirectListener::bind(oauth.redirect_url()).await {
        Ok(listener) => {
            println!("Waiting for the browser to return here.");
            println!("If it cannot, paste the code or the full URL you were redirected to.");
            let captured = listener.wait_for_code(&state);
            tokio::pin!(captured);
            tokio::select! {
                code = &mut captured => code?,
                input = pasted_line() => {
                    match input.ok().and_then(|line| auth::extract_auth_code(&line)) {
                        Some(code) => code,
                        None => captured.await?,
                    }
                }
            }
        }
        Err(e) => {
            warn!("Cannot listen on {} ({}); enter the code by hand", oauth.redirect_url(), e);
            println!("After approving, paste the code or the full URL you were redirected to.");
            let input = prompt("Code: ")?;
            let Some(code) = auth::extract_auth_code(&input) else {
                bail!("no authorization code found in input");
            };
            code
        }
    };

    let token = oauth
        .exchange_code(&code)
        .await
        .context("failed to exchange authorization code")?;
    store.save(&token)?;
    println!("Authorized. Token saved to {}", store.path().display());
    Ok(token.access_token)
}

/// One line from stdin, read on a plain thread so an unanswered prompt never
/// holds up shutdown.
fn pasted_line() -> oneshot::Receiver<String> {
    let (tx, rx) = oneshot::channel();
    std::thread::spawn(move || {
        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line).is_ok() {
            let _ = tx.send(line);
        }
    });
    rx
}

async fn sort(
    dir: &Path,
    url: &str,
    options: PipelineOptions,
    max_retries: u32,
    quiet: bool,
) -> anyhow::Result<()> {
    println!("Processing playlist: {url}");
    let playlist_id = require_playlist_id(url)?;

    let oauth = OAuthClient::new(Config::load_from(dir)?)?;
    let store = FileTokenStore::new(dir.join(TOKEN_FILE));
    let access_token = match auth::access_token(&oauth, &store).await {
        Ok(token) => token,
        Err(SortError::Unauthorized(reason)) => {
            println!("Authorization required: {reason}");
            run_auth_flow(&oauth, &store).await?
        }
        Err(e) => return Err(e.into()),
    };

    let client = YouTubeClient::new(&access_token)?.with_max_retries(max_retries);
    let pipeline = SortPipeline::new(&client, options);

    let result = if quiet {
        pipeline.run(&playlist_id, &mut NoProgress).await
    } else {
        pipeline.run(&playlist_id, &mut ConsoleProgress).await
    };
    let outcome = result.context("failed to sort playlist")?;

    let report = &outcome.report;
    println!(
        "Sorted {} of {} videos from \"{}\"",
        report.inserted, outcome.entries, outcome.source_title
    );
    for skipped in &report.skipped {
        println!("  skipped {} ({}): {}", skipped.video_id, skipped.title, skipped.reason);
    }
    println!("New playlist created: {}", playlist_url(&report.playlist_id));
    Ok(())
}

fn prompt(label: &str) -> anyhow::Result<String> {
    print!("{label}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let value = line.trim().to_string();
    if value.is_empty() {
        bail!("{} is required", label.trim_end_matches([':', ' ']));
    }
    Ok(value)
}
