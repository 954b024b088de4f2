//! 🚀 pgs-cli: the front door, the bouncer, the maitre d' of pgs.
//!
//! 📦 Thin wrapper: parse args, set up logging, load config, hand off to `pgs::run`,
//! and explain the failure in human words if there is one. 🦆

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use pgs::{ErrorKind, FetchError};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "pgs-cli")]
#[command(about = "Stream every page of a cursor-paginated source into a sink")]
struct Cli {
    /// TOML config file. If it doesn't exist, config comes from PGS_* env vars alone.
    #[arg(default_value = "pgs.toml")]
    config: PathBuf,
    /// Stop after this many pages (overrides runtime.max_pages).
    #[arg(long)]
    max_pages: Option<u64>,
    /// Cancel the stream after this many seconds (overrides runtime.timeout_secs).
    #[arg(long)]
    timeout_secs: Option<u64>,
    #[arg(long = "no-progress", action = ArgAction::SetTrue)]
    no_progress: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // 🔒 a missing file is fine (env-only); an unreadable path is not
    let config_file_exists = cli.config.try_exists().with_context(|| {
        format!(
            "💀 Couldn't tell whether the configuration file exists. If it's a relative path, \
             check your cwd, or use an absolute path. Was checking here: '{}'",
            cli.config.display()
        )
    })?;
    let config_file = config_file_exists.then_some(cli.config.as_path());

    let mut app_config = pgs::app_config::load_config(config_file)
        .context("💀 pgs-cli couldn't load the config. Make sure you didn't forget something obvious")?;
    if cli.max_pages.is_some() {
        app_config.runtime.max_pages = cli.max_pages;
    }
    if cli.timeout_secs.is_some() {
        app_config.runtime.timeout_secs = cli.timeout_secs;
    }
    if cli.no_progress {
        app_config.runtime.show_progress = false;
    }

    match pgs::run(app_config).await {
        Ok(summary) => {
            info!("🏁 done: {summary:?}");
            Ok(())
        }
        Err(err) => {
            error!("💀 error: {}", err);
            // -- 🧅 peel the onion, one layer at a time
            for cause in err.chain().skip(1) {
                error!("⚠️  cause: {}", cause);
            }
            if let Some(hint) = hint_for(&err) {
                error!("🔧 hint: {hint}");
            }
            std::process::exit(1);
        }
    }
}

/// 🔧 A human hint based on which way the stream failed, if it failed in the stream.
fn hint_for(err: &anyhow::Error) -> Option<&'static str> {
    let fetch_error = err.chain().find_map(|cause| cause.downcast_ref::<FetchError>())?;
    Some(match fetch_error.kind() {
        ErrorKind::ContextCanceled => {
            "the stream was cancelled (Ctrl-C or runtime.timeout_secs). Raise the timeout, \
             or set runtime.max_pages if you only wanted the first few pages."
        }
        ErrorKind::TransportError => {
            "the source could not be reached or refused the request. Check the URL, the \
             credentials, and that the service is actually running. Even servers need a nudge. ☕"
        }
        ErrorKind::UnmarshalError => {
            "a record wasn't valid JSON. Everything before it was written; the page and item \
             index above tell you where to look."
        }
    })
}
