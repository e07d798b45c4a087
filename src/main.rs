use anyhow::Result;
use clap::{Parser, Subcommand};
use sourcerer::Config;
use sourcerer::mcp_server::SourcererServer;
use std::path::PathBuf;

/// Sourcerer: semantic code navigation and project memory MCP server
#[derive(Parser)]
#[command(name = "sourcerer")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "MCP server for semantic code navigation with persistent project memory", long_about = None)]
struct Cli {
    /// Workspace root to index (defaults to the current directory)
    #[arg(long, global = true)]
    workspace: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the MCP server over stdio (default mode)
    Serve,

    /// Show version and configuration information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the MCP transport; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("sourcerer=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let workspace_root = match cli.workspace {
        Some(path) => path,
        None => std::env::current_dir()?,
    };

    match cli.command {
        Some(Commands::Version) => {
            show_version_info(&workspace_root);
            Ok(())
        }
        Some(Commands::Serve) | None => {
            let config = Config::from_env(&workspace_root);
            if let Err(e) = SourcererServer::serve_stdio(config).await {
                tracing::error!("Fatal error in MCP server: {e:#}");
                eprintln!("Fatal error: {e:#}");
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

fn show_version_info(workspace_root: &std::path::Path) {
    let config = Config::from_env(workspace_root);

    println!("sourcerer v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Workspace:");
    println!("  Root:            {}", config.workspace_root.display());
    println!("  Index store:     {}", config.db_path().display());
    println!();
    println!("Embedding provider:");
    match &config.embedding.provider {
        sourcerer::config::EmbeddingProvider::Remote { model, .. } => {
            println!("  Provider:        remote (EMBEDDING_PROVIDER_KEY set)");
            println!("  Model:           {model}");
        }
        sourcerer::config::EmbeddingProvider::Local { endpoint, model } => {
            println!("  Provider:        local endpoint");
            println!("  Endpoint:        {endpoint}");
            println!("  Model:           {model}");
        }
    }
    println!();
    println!("Indexing:");
    println!(
        "  Extensions:      {}",
        config.indexing.allowed_extensions.join(", ")
    );
    println!("  Workers:         {}", config.indexing.max_workers);
    println!(
        "  Rescan every:    {} s",
        config.indexing.rescan_interval_secs
    );
}
