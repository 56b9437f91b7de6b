//! Argument parsing and service wiring.

use crate::app::App;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use community_core::{
    init_logging, AppConfig, DocumentStore, FirebaseIdentityProvider, GeminiClient,
    GenerativeTextService, IdentityProvider, SqliteDocumentStore,
};
use log::info;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "community")]
#[command(about = "Community feed with AI-assisted posting")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the interactive feed
    Run {
        /// Config file (default: $COMMUNITY_CONFIG, then ./community.toml)
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Keep posts in memory only
        #[arg(long)]
        ephemeral: bool,
    },
    /// Print the core version
    Version,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Version => {
            println!("community_core version={}", community_core::core_version());
            Ok(())
        }
        Commands::Run { config, ephemeral } => run_interactive(config, ephemeral),
    }
}

fn run_interactive(config: Option<PathBuf>, ephemeral: bool) -> Result<()> {
    let config_path = AppConfig::resolve_path(config.as_deref());
    let config = AppConfig::load(&config_path)
        .with_context(|| format!("failed to load config {}", config_path.display()))?;

    if let Err(err) = init_logging(&config.log) {
        eprintln!("warning: logging disabled: {err}");
    }
    info!(
        "event=app_start module=cli status=ok config={} ephemeral={}",
        config_path.display(),
        ephemeral
    );

    let store = if ephemeral {
        SqliteDocumentStore::open_in_memory().context("failed to open memory store")?
    } else {
        SqliteDocumentStore::open(&config.store.path)
            .with_context(|| format!("failed to open store {}", config.store.path.display()))?
    };
    let store = Arc::new(store);
    let identity: Arc<dyn IdentityProvider> =
        Arc::new(FirebaseIdentityProvider::new(&config.identity));
    let generator: Arc<dyn GenerativeTextService> = Arc::new(GeminiClient::new(&config.assist));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build runtime")?;

    runtime.block_on(async move {
        if let Some(every) = config.store.watch_interval().filter(|_| !ephemeral) {
            let _ = store.watch_external_changes(every);
        }
        let store: Arc<dyn DocumentStore> = store;
        let app = App::new(&config, store, identity, generator);
        app.run().await
    })
}
