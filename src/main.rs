//! manga-rs server entry point.

use clap::Parser;
use manga_rs::{
    config::{Cli, Command, Config},
    library::CatalogBuilder,
    server,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "manga_rs=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Find or load config
    let config_path = cli.config.clone().or_else(Config::find_config_file);

    let config = if let Some(ref path) = config_path {
        tracing::debug!(path = %path.display(), "Loading config");
        Config::load(path)?
    } else {
        Config::default()
    };

    // Handle command
    match cli.command {
        Some(Command::Init { force }) => cmd_init(force),
        Some(Command::Scan { root }) => cmd_scan(config, root),
        Some(Command::Serve { bind, root }) => cmd_serve(config, bind, root).await,
        None => {
            // Default: start server
            cmd_serve(config, None, None).await
        }
    }
}

/// Write a default config file.
fn cmd_init(force: bool) -> anyhow::Result<()> {
    let config_path = PathBuf::from("config.toml");

    if config_path.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    std::fs::write(&config_path, Config::generate_default())?;
    println!("Created config file: {}", config_path.display());
    println!("\nEdit config.toml to point [library] root at your manga folder.");
    println!("Then run: manga-rs serve");

    Ok(())
}

/// Build the catalog once and print what was found.
fn cmd_scan(mut config: Config, root: Option<PathBuf>) -> anyhow::Result<()> {
    if let Some(root) = root {
        config.library.root = root;
    }

    let builder = CatalogBuilder::from_config(&config);
    let snapshot = builder.build()?;
    let stats = snapshot.stats();

    println!("Library: {}", config.library.root.display());
    println!(
        "{} entries, {} pages, {} bytes",
        stats.count, stats.total_pages, stats.total_bytes
    );

    if !snapshot.rejected().is_empty() {
        println!("\n{:<12} REASON", "NUMBER");
        println!("{}", "-".repeat(60));
        for rejected in snapshot.rejected() {
            println!("{:<12} {}", rejected.number, rejected.reason);
        }
    }

    Ok(())
}

/// Start the server.
async fn cmd_serve(
    mut config: Config,
    bind: Option<SocketAddr>,
    root: Option<PathBuf>,
) -> anyhow::Result<()> {
    // Override config from the command line
    if let Some(addr) = bind {
        config.server.bind = addr;
    }
    if let Some(root) = root {
        config.library.root = root;
    }

    tracing::info!(
        bind = %config.server.bind,
        root = %config.library.root.display(),
        "Starting manga-rs server"
    );

    let state = server::AppState::from_config(config.clone());

    // The first catalog is in place before the listener accepts requests
    if let Err(e) = state.rebuild().await {
        tracing::warn!(error = %e, "Initial library scan failed, serving an empty catalog");
    }

    state.start_scheduled_rescan();

    let app = server::create_router(state);

    let listener = TcpListener::bind(config.server.bind).await?;
    tracing::info!(address = %config.server.bind, "Server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
