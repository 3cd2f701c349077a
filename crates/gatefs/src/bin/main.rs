//! Binary entry point for the gatefs MCP server.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use gatefs::FilesystemGateway;
use gatefs::config::GatewayConfig;
use rmcp::ServiceExt;

/// GateFS — MCP filesystem gateway confined to allowed directories.
#[derive(Parser)]
#[command(name = "gatefs", version, about)]
struct Cli {
    /// Allowed directories the server may access; extends the config file's
    /// list.
    #[arg(num_args = 0..)]
    allowed_dirs: Vec<PathBuf>,

    /// TOML configuration file; defaults to config.toml next to the
    /// executable when present.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn load_config(cli: &Cli) -> anyhow::Result<GatewayConfig> {
    let mut config = match &cli.config {
        Some(path) => GatewayConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => {
            let beside_exe = std::env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(|dir| dir.join("config.toml")));
            match beside_exe {
                Some(path) if path.is_file() => GatewayConfig::load(&path)
                    .with_context(|| format!("loading config {}", path.display()))?,
                _ => GatewayConfig::default(),
            }
        }
    };
    config
        .directories
        .allowed
        .extend(cli.allowed_dirs.iter().cloned());
    Ok(config)
}

/// Stdout carries the MCP protocol, so logs go to stderr or to the
/// configured append-mode file.
fn init_tracing(config: &GatewayConfig) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match &config.logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            let writer = std::sync::Mutex::new(file);
            if config.logging.format == "json" {
                builder.json().with_writer(writer).init();
            } else {
                builder.with_writer(writer).with_ansi(false).init();
            }
        }
        None => {
            if config.logging.format == "json" {
                builder.json().with_writer(std::io::stderr).init();
            } else {
                builder.with_writer(std::io::stderr).init();
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_tracing(&config)?;

    if config.directories.allowed.is_empty() {
        anyhow::bail!(
            "no allowed directories configured; pass them as arguments or in the config file"
        );
    }
    tracing::info!(
        directories = ?config.directories.allowed,
        follow_symlinks = config.directories.follow_symlinks,
        "starting gatefs"
    );

    let server = FilesystemGateway::new(&config).context("invalid configuration")?;
    let transport = rmcp::transport::stdio();
    server
        .serve(transport)
        .await
        .context("failed to start server")?
        .waiting()
        .await
        .context("server error")?;
    Ok(())
}
